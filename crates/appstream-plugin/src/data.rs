//! Resource attribute data handed to lifecycle handlers

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Dynamic attribute map (`name -> value`)
pub type Attributes = serde_json::Map<String, Value>;

/// Persisted state of a single resource as owned by the plugin host
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    /// Local identifier; for AppStream resources this is the human-assigned name
    pub id: String,

    /// Attribute values as last read from the remote API
    #[serde(default)]
    pub attributes: Attributes,
}

impl ResourceState {
    pub fn new(id: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            id: id.into(),
            attributes,
        }
    }
}

/// Working view over a resource during one lifecycle call.
///
/// Holds the prior attribute values (empty on create) and the current ones.
/// Handlers read configuration with [`get_ok`](Self::get_ok), detect dirty
/// fields with [`has_change`](Self::has_change), and write refreshed values
/// back with [`set`](Self::set).
#[derive(Debug, Clone, Default)]
pub struct ResourceData {
    id: String,
    prior: Attributes,
    attributes: Attributes,
}

impl ResourceData {
    /// Data for a create call: no prior state
    pub fn new(planned: Attributes) -> Self {
        Self {
            id: String::new(),
            prior: Attributes::new(),
            attributes: planned,
        }
    }

    /// Data for read/delete: prior and current are the stored state
    pub fn from_state(state: ResourceState) -> Self {
        Self {
            id: state.id,
            prior: state.attributes.clone(),
            attributes: state.attributes,
        }
    }

    /// Data for an update: prior is the stored state, current is the plan
    pub fn for_update(prior: ResourceState, planned: Attributes) -> Self {
        Self {
            id: prior.id,
            prior: prior.attributes,
            attributes: planned,
        }
    }

    /// Data for an import: only the identifier is known
    pub fn for_import(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    /// Mark the resource as gone
    pub fn clear_id(&mut self) {
        self.id.clear();
    }

    pub fn is_gone(&self) -> bool {
        self.id.is_empty()
    }

    /// Current value, `None` when absent or null
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key).filter(|v| !v.is_null())
    }

    /// Current value, `None` when absent or a zero value
    /// (`""`, `0`, `false`, empty list or map)
    pub fn get_ok(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key).filter(|v| !is_zero(v))
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get_ok(key).and_then(Value::as_str).map(str::to_string)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get_ok(key).and_then(Value::as_i64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get_ok(key).and_then(Value::as_bool)
    }

    /// Value before this call, `None` when absent or null
    pub fn prior(&self, key: &str) -> Option<&Value> {
        self.prior.get(key).filter(|v| !v.is_null())
    }

    /// Whether the attribute differs from its prior value.
    /// Zero values and absence compare equal.
    pub fn has_change(&self, key: &str) -> bool {
        let before = self.prior.get(key).filter(|v| !is_zero(v));
        let after = self.attributes.get(key).filter(|v| !is_zero(v));
        before != after
    }

    pub fn has_changes(&self, keys: &[&str]) -> bool {
        keys.iter().any(|k| self.has_change(k))
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Final state, or `None` if the resource no longer exists
    pub fn into_state(self) -> Option<ResourceState> {
        if self.id.is_empty() {
            None
        } else {
            Some(ResourceState::new(self.id, self.attributes))
        }
    }
}

/// Zero values are treated as "not set"
pub fn is_zero(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}
