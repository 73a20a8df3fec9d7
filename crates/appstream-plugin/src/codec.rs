//! Plugin protocol 6 value encoding
//!
//! Terraform exchanges resource objects as msgpack-encoded `DynamicValue`s
//! and describes schemas with cty type expressions. This module converts
//! between those and the [`Attributes`] maps the resource handlers work on.
//!
//! Values that are not known until apply travel as a msgpack extension.
//! They decode to null and their top-level attribute name is recorded in
//! [`Decoded::unknown`].

use crate::data::{Attributes, ResourceState};
use crate::error::{ProviderError, Result};
use crate::generated::tfplugin6 as tf;
use crate::schema::{AttributeType, Diagnostic, ElementType, Schema, Severity};
use rmpv::Value as Msgpack;
use serde_json::{Number, Value, json};
use std::collections::BTreeSet;
use std::fmt::Display;

/// Key the resource id is stored under in a wire object
pub const ID_ATTRIBUTE: &str = "id";

/// Top-level attribute names whose value is not known yet
pub type Unknown = BTreeSet<String>;

/// A decoded `DynamicValue`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decoded {
    /// `None` when the value is null (no object)
    pub state: Option<ResourceState>,
    pub unknown: Unknown,
}

impl Decoded {
    /// Attribute map of the object, empty when null
    pub fn attributes(&self) -> Attributes {
        self.state
            .as_ref()
            .map(|s| s.attributes.clone())
            .unwrap_or_default()
    }
}

/// Decode a msgpack or JSON `DynamicValue` into a resource state
pub fn decode(value: Option<&tf::DynamicValue>) -> Result<Decoded> {
    let Some(value) = value else {
        return Ok(Decoded::default());
    };

    let mut unknown = Unknown::new();
    let object = if !value.msgpack.is_empty() {
        let raw = rmpv::decode::read_value(&mut value.msgpack.as_slice())
            .map_err(|e| ProviderError::Wire(format!("invalid msgpack value: {}", e)))?;
        match raw {
            Msgpack::Nil => None,
            Msgpack::Map(entries) => {
                let mut attributes = Attributes::new();
                for (key, item) in entries {
                    let key = key_string(key)?;
                    let mut item_unknown = false;
                    let item = to_json(item, &mut item_unknown);
                    if item_unknown {
                        unknown.insert(key.clone());
                    }
                    attributes.insert(key, item);
                }
                Some(attributes)
            }
            Msgpack::Ext(..) => {
                return Err(ProviderError::Wire("whole object is unknown".to_string()));
            }
            other => {
                return Err(ProviderError::Wire(format!("expected an object, got {}", other)));
            }
        }
    } else if !value.json.is_empty() {
        match serde_json::from_slice::<Value>(&value.json)
            .map_err(|e| ProviderError::Wire(format!("invalid JSON value: {}", e)))?
        {
            Value::Null => None,
            Value::Object(attributes) => Some(attributes),
            other => {
                return Err(ProviderError::Wire(format!("expected an object, got {}", other)));
            }
        }
    } else {
        None
    };

    Ok(Decoded {
        state: object.map(into_state),
        unknown,
    })
}

/// Split the id out of a wire object; empty collections read as unset
pub fn into_state(mut attributes: Attributes) -> ResourceState {
    let id = match attributes.remove(ID_ATTRIBUTE) {
        Some(Value::String(id)) => id,
        _ => String::new(),
    };
    for value in attributes.values_mut() {
        if value.as_array().is_some_and(Vec::is_empty) {
            *value = Value::Null;
        }
    }
    ResourceState::new(id, attributes)
}

/// Encode a resource state as msgpack, typed by `schema`.
///
/// Every schema attribute is present in the output. Attributes listed in
/// `unknown` are sent as unknown; the id is unknown when listed there too.
pub fn encode(
    schema: &Schema,
    state: Option<&ResourceState>,
    unknown: &Unknown,
) -> Result<tf::DynamicValue> {
    let value = match state {
        None => Msgpack::Nil,
        Some(state) => {
            let mut entries = encode_object(schema, &state.attributes, unknown);
            let id = if unknown.contains(ID_ATTRIBUTE) {
                unknown_value()
            } else if state.id.is_empty() {
                Msgpack::Nil
            } else {
                Msgpack::from(state.id.as_str())
            };
            entries.push((Msgpack::from(ID_ATTRIBUTE), id));
            Msgpack::Map(entries)
        }
    };

    let mut msgpack = Vec::new();
    rmpv::encode::write_value(&mut msgpack, &value)
        .map_err(|e| ProviderError::Wire(format!("failed to encode value: {}", e)))?;
    Ok(tf::DynamicValue {
        msgpack,
        json: Vec::new(),
    })
}

fn encode_object(
    schema: &Schema,
    attributes: &Attributes,
    unknown: &Unknown,
) -> Vec<(Msgpack, Msgpack)> {
    schema
        .attributes
        .iter()
        .map(|(name, attribute)| {
            let value = if unknown.contains(name) {
                unknown_value()
            } else {
                to_msgpack(&attribute.ty, attributes.get(name).unwrap_or(&Value::Null))
            };
            (Msgpack::from(name.as_str()), value)
        })
        .collect()
}

fn to_msgpack(ty: &AttributeType, value: &Value) -> Msgpack {
    if let Some(block) = block_of(ty) {
        return match value {
            Value::Null => Msgpack::Array(Vec::new()),
            Value::Array(items) => Msgpack::Array(
                items
                    .iter()
                    .map(|item| match item {
                        Value::Object(map) => {
                            Msgpack::Map(encode_object(block, map, &Unknown::new()))
                        }
                        other => from_json(other),
                    })
                    .collect(),
            ),
            other => from_json(other),
        };
    }

    from_json(value)
}

fn block_of(ty: &AttributeType) -> Option<&Schema> {
    match ty {
        AttributeType::List(ElementType::Block(block))
        | AttributeType::Set(ElementType::Block(block)) => Some(block),
        _ => None,
    }
}

fn from_json(value: &Value) -> Msgpack {
    match value {
        Value::Null => Msgpack::Nil,
        Value::Bool(b) => Msgpack::from(*b),
        Value::Number(n) => match (n.as_i64(), n.as_u64()) {
            (Some(i), _) => Msgpack::from(i),
            (None, Some(u)) => Msgpack::from(u),
            _ => Msgpack::from(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => Msgpack::from(s.as_str()),
        Value::Array(items) => Msgpack::Array(items.iter().map(from_json).collect()),
        Value::Object(map) => Msgpack::Map(
            map.iter()
                .map(|(k, v)| (Msgpack::from(k.as_str()), from_json(v)))
                .collect(),
        ),
    }
}

fn to_json(value: Msgpack, unknown: &mut bool) -> Value {
    match value {
        Msgpack::Nil => Value::Null,
        Msgpack::Boolean(b) => Value::Bool(b),
        Msgpack::Integer(i) => match (i.as_i64(), i.as_u64()) {
            (Some(i), _) => Value::from(i),
            (None, Some(u)) => Value::from(u),
            _ => Value::Null,
        },
        Msgpack::F32(f) => float(f64::from(f)),
        Msgpack::F64(f) => float(f),
        Msgpack::String(s) => s.into_str().map(Value::String).unwrap_or(Value::Null),
        Msgpack::Binary(bytes) => Value::String(String::from_utf8_lossy(&bytes).into_owned()),
        Msgpack::Array(items) => {
            Value::Array(items.into_iter().map(|v| to_json(v, unknown)).collect())
        }
        Msgpack::Map(entries) => Value::Object(
            entries
                .into_iter()
                .filter_map(|(k, v)| Some((k.as_str()?.to_string(), to_json(v, unknown))))
                .collect(),
        ),
        Msgpack::Ext(..) => {
            *unknown = true;
            Value::Null
        }
    }
}

/// Whole numbers come back as integers so `Int` attributes validate
fn float(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Value::from(f as i64)
    } else {
        Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
    }
}

fn key_string(key: Msgpack) -> Result<String> {
    match key {
        Msgpack::String(s) => s
            .into_str()
            .ok_or_else(|| ProviderError::Wire("object key is not UTF-8".to_string())),
        other => Err(ProviderError::Wire(format!("object key {} is not a string", other))),
    }
}

fn unknown_value() -> Msgpack {
    Msgpack::Ext(0, vec![0])
}

/// Protocol schema of the provider block
pub fn provider_schema(schema: &Schema) -> tf::Schema {
    tf::Schema {
        version: 0,
        block: Some(block(schema, false)),
    }
}

/// Protocol schema of a resource; the `id` attribute is added
pub fn resource_schema(schema: &Schema) -> tf::Schema {
    tf::Schema {
        version: 0,
        block: Some(block(schema, true)),
    }
}

fn block(schema: &Schema, with_id: bool) -> tf::schema::Block {
    let mut out = tf::schema::Block::default();

    for (name, attribute) in &schema.attributes {
        let (nesting, inner) = match (&attribute.ty, block_of(&attribute.ty)) {
            (AttributeType::List(_), Some(inner)) => {
                (tf::schema::nested_block::NestingMode::List, inner)
            }
            (_, Some(inner)) => (tf::schema::nested_block::NestingMode::Set, inner),
            (ty, None) => {
                out.attributes.push(tf::schema::Attribute {
                    name: name.clone(),
                    r#type: cty_type(ty).to_string().into_bytes(),
                    required: attribute.required,
                    optional: attribute.optional || attribute.default.is_some(),
                    computed: attribute.computed || attribute.default.is_some(),
                    ..Default::default()
                });
                continue;
            }
        };

        out.block_types.push(tf::schema::NestedBlock {
            type_name: name.clone(),
            block: Some(block(inner, false)),
            nesting: nesting as i32,
            min_items: i64::from(attribute.required),
            max_items: attribute.max_items.map_or(0, |max| max as i64),
        });
    }

    if with_id && !schema.attributes.contains_key(ID_ATTRIBUTE) {
        out.attributes.push(tf::schema::Attribute {
            name: ID_ATTRIBUTE.to_string(),
            r#type: cty_type(&AttributeType::String).to_string().into_bytes(),
            optional: true,
            computed: true,
            ..Default::default()
        });
    }

    out
}

/// cty type expression of a non-block attribute
fn cty_type(ty: &AttributeType) -> Value {
    match ty {
        AttributeType::String => json!("string"),
        AttributeType::Int => json!("number"),
        AttributeType::Bool => json!("bool"),
        AttributeType::Map => json!(["map", "string"]),
        AttributeType::List(_) => json!(["list", "string"]),
        AttributeType::Set(_) => json!(["set", "string"]),
    }
}

pub fn diagnostic(d: &Diagnostic) -> tf::Diagnostic {
    let severity = match d.severity {
        Severity::Error => tf::diagnostic::Severity::Error,
        Severity::Warning => tf::diagnostic::Severity::Warning,
    };
    tf::Diagnostic {
        severity: severity as i32,
        summary: d.summary.clone(),
        detail: String::new(),
        attribute: d.attribute.as_deref().map(attribute_path),
    }
}

pub fn error_diagnostic(err: impl Display) -> tf::Diagnostic {
    tf::Diagnostic {
        severity: tf::diagnostic::Severity::Error as i32,
        summary: err.to_string(),
        detail: String::new(),
        attribute: None,
    }
}

/// Convert a dotted path (`vpc_config.0.subnet_ids`) into protocol steps
pub fn attribute_path(path: &str) -> tf::AttributePath {
    use tf::attribute_path::{Step, step::Selector};

    let steps = path
        .split('.')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let selector = match segment.parse::<i64>() {
                Ok(index) => Selector::ElementKeyInt(index),
                Err(_) => Selector::AttributeName(segment.to_string()),
            };
            Step {
                selector: Some(selector),
            }
        })
        .collect();
    tf::AttributePath { steps }
}
