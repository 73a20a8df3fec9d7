//! Declarative attribute schema
//!
//! A [`Schema`] describes the attribute surface of a resource (or of the
//! provider block). It is used by the provider registry to validate
//! configuration, fill defaults, normalize set ordering and detect
//! attributes whose change forces replacement.

use crate::data::Attributes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Attribute value type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    String,
    Int,
    Bool,
    /// String-to-string map
    Map,
    /// Ordered collection
    List(ElementType),
    /// Unordered collection without duplicates
    Set(ElementType),
}

/// Element type of a list or set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    String,
    Block(Schema),
}

/// Definition of a single attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    #[serde(rename = "type")]
    pub ty: AttributeType,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    /// A change of this attribute cannot be applied in place
    pub force_new: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
}

impl Attribute {
    fn new(ty: AttributeType) -> Self {
        Self {
            ty,
            required: false,
            optional: false,
            computed: false,
            force_new: false,
            default: None,
            max_items: None,
        }
    }

    pub fn required(ty: AttributeType) -> Self {
        Self {
            required: true,
            ..Self::new(ty)
        }
    }

    pub fn optional(ty: AttributeType) -> Self {
        Self {
            optional: true,
            ..Self::new(ty)
        }
    }

    pub fn computed(ty: AttributeType) -> Self {
        Self {
            computed: true,
            ..Self::new(ty)
        }
    }

    /// Optional in configuration; the remote value is kept when left unset
    pub fn optional_computed(ty: AttributeType) -> Self {
        Self {
            optional: true,
            computed: true,
            ..Self::new(ty)
        }
    }

    pub fn required_string() -> Self {
        Self::required(AttributeType::String)
    }

    pub fn optional_string() -> Self {
        Self::optional(AttributeType::String)
    }

    pub fn optional_int() -> Self {
        Self::optional(AttributeType::Int)
    }

    pub fn optional_bool() -> Self {
        Self::optional(AttributeType::Bool)
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn max_items(mut self, max: usize) -> Self {
        self.max_items = Some(max);
        self
    }

    /// Collection of nested blocks
    pub fn is_block(&self) -> bool {
        matches!(
            self.ty,
            AttributeType::List(ElementType::Block(_)) | AttributeType::Set(ElementType::Block(_))
        )
    }
}

/// Severity of a validation diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// Validation finding, addressed by attribute path (`vpc_config.0.subnet_ids`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    pub fn error(attribute: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            summary: summary.into(),
            attribute: Some(attribute.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.attribute {
            Some(attr) => write!(f, "{}: {}", attr, self.summary),
            None => write!(f, "{}", self.summary),
        }
    }
}

/// Attribute set of a resource, of the provider block, or of a nested block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub attributes: BTreeMap<String, Attribute>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attribute(mut self, name: impl Into<String>, attribute: Attribute) -> Self {
        self.attributes.insert(name.into(), attribute);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// Validate a configuration against this schema
    pub fn validate(&self, config: &Attributes) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        self.validate_at("", config, &mut diagnostics);
        diagnostics
    }

    fn validate_at(&self, prefix: &str, config: &Attributes, out: &mut Vec<Diagnostic>) {
        for (name, attribute) in &self.attributes {
            let path = join_path(prefix, name);
            match config.get(name).filter(|v| !v.is_null()) {
                None if attribute.required => {
                    out.push(Diagnostic::error(path, "required attribute is missing"));
                }
                None => {}
                Some(_) if attribute.computed && !attribute.optional && !attribute.required => {
                    out.push(Diagnostic::error(path, "attribute is computed and cannot be set"));
                }
                Some(value) => check_value(&path, attribute, value, out),
            }
        }

        for name in config.keys() {
            if !self.attributes.contains_key(name) {
                out.push(Diagnostic::error(
                    join_path(prefix, name),
                    "unsupported attribute",
                ));
            }
        }
    }

    /// Fill schema defaults for attributes that are absent or null
    pub fn apply_defaults(&self, attributes: &mut Attributes) {
        for (name, attribute) in &self.attributes {
            let Some(default) = &attribute.default else {
                continue;
            };
            let missing = attributes.get(name).is_none_or(Value::is_null);
            if missing {
                attributes.insert(name.clone(), default.clone());
            }
        }
    }

    /// Drop values of computed-only attributes; the resource sets them on read
    pub fn strip_computed(&self, attributes: &mut Attributes) {
        for (name, attribute) in &self.attributes {
            if attribute.computed && !attribute.optional && !attribute.required {
                attributes.remove(name);
            }
        }
    }

    /// Carry prior values of computed attributes left unset in `planned`
    pub fn carry_computed(&self, prior: &Attributes, planned: &mut Attributes) {
        for (name, attribute) in &self.attributes {
            if !attribute.computed || !planned.get(name).is_none_or(Value::is_null) {
                continue;
            }
            if let Some(value) = prior.get(name).filter(|v| !v.is_null()) {
                planned.insert(name.clone(), value.clone());
            }
        }
    }

    /// Sort and deduplicate set-typed attributes, recursing into nested blocks.
    ///
    /// Inside a block every attribute is present: unset and empty
    /// collections are null, matching what a read writes back.
    pub fn normalize(&self, attributes: &mut Attributes) {
        for (name, attribute) in &self.attributes {
            let Some(Value::Array(items)) = attributes.get_mut(name) else {
                continue;
            };
            match &attribute.ty {
                AttributeType::List(ElementType::Block(block)) => {
                    normalize_blocks(block, items);
                }
                AttributeType::Set(element) => {
                    if let ElementType::Block(block) = element {
                        normalize_blocks(block, items);
                    }
                    items.sort_by_cached_key(|v| v.to_string());
                    items.dedup();
                }
                _ => {}
            }
        }
    }

    /// Names of force-new attributes that differ between two attribute maps
    pub fn requires_replace(&self, prior: &Attributes, planned: &Attributes) -> Vec<String> {
        self.attributes
            .iter()
            .filter(|(_, attribute)| attribute.force_new)
            .filter(|(name, _)| {
                let before = prior.get(name.as_str()).filter(|v| !v.is_null());
                let after = planned.get(name.as_str()).filter(|v| !v.is_null());
                before != after
            })
            .map(|(name, _)| name.clone())
            .collect()
    }
}

fn normalize_blocks(block: &Schema, items: &mut [Value]) {
    for item in items {
        let Value::Object(map) = item else {
            continue;
        };
        for name in block.attributes.keys() {
            let value = map.entry(name.clone()).or_insert(Value::Null);
            if value.as_array().is_some_and(Vec::is_empty) {
                *value = Value::Null;
            }
        }
        block.normalize(map);
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

fn check_value(path: &str, attribute: &Attribute, value: &Value, out: &mut Vec<Diagnostic>) {
    match &attribute.ty {
        AttributeType::String if !value.is_string() => {
            out.push(Diagnostic::error(path, "expected a string"));
        }
        AttributeType::Int if !(value.is_i64() || value.is_u64()) => {
            out.push(Diagnostic::error(path, "expected an integer"));
        }
        AttributeType::Bool if !value.is_boolean() => {
            out.push(Diagnostic::error(path, "expected a bool"));
        }
        AttributeType::Map => match value.as_object() {
            Some(map) if map.values().all(Value::is_string) => {}
            _ => out.push(Diagnostic::error(path, "expected a map of strings")),
        },
        AttributeType::List(element) | AttributeType::Set(element) => {
            let Some(items) = value.as_array() else {
                out.push(Diagnostic::error(path, "expected a list"));
                return;
            };
            if let Some(max) = attribute.max_items {
                if items.len() > max {
                    out.push(Diagnostic::error(
                        path,
                        format!("at most {} item(s) allowed, got {}", max, items.len()),
                    ));
                }
            }
            for (index, item) in items.iter().enumerate() {
                let item_path = format!("{}.{}", path, index);
                match element {
                    ElementType::String if !item.is_string() => {
                        out.push(Diagnostic::error(item_path, "expected a string"));
                    }
                    ElementType::String => {}
                    ElementType::Block(block) => match item.as_object() {
                        Some(map) => block.validate_at(&item_path, map, out),
                        None => out.push(Diagnostic::error(item_path, "expected a block")),
                    },
                }
            }
        }
        _ => {}
    }
}
