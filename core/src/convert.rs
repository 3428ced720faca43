//! Mapping between the control plane's wire schema and the tool-facing schema.
//!
//! Every converted type declares an explicit table of field decisions instead
//! of probing attributes at runtime. `to_wire_model` only transfers fields
//! that are set on the tool side; `to_tool_model` never yields null for a
//! typed field and substitutes the type's zero value instead.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

use crate::error::{ControlPlaneError, Result};

/// Value category of a mapped field; decides the zero value used when the
/// wire omits the field or sends null.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Flag,
    Integer,
    Float,
    List,
    /// Free-form JSON. Absent stays null.
    Json,
}

impl FieldKind {
    pub fn zero(self) -> Value {
        match self {
            FieldKind::Text => json!(""),
            FieldKind::Flag => json!(false),
            FieldKind::Integer => json!(0),
            FieldKind::Float => json!(0.0),
            FieldKind::List => json!([]),
            FieldKind::Json => Value::Null,
        }
    }
}

/// One row of a mapping table: tool-facing name, wire name, kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMapping {
    pub tool: &'static str,
    pub wire: &'static str,
    pub kind: FieldKind,
}

impl FieldMapping {
    pub const fn new(tool: &'static str, wire: &'static str, kind: FieldKind) -> Self {
        Self { tool, wire, kind }
    }
}

/// A tool-facing model with a declared wire counterpart.
pub trait WireSchema {
    /// Schema name used in error messages.
    const NAME: &'static str;
    const FIELDS: &'static [FieldMapping];
    /// Wire fields deliberately not surfaced to agents.
    const IGNORED_WIRE_FIELDS: &'static [&'static str] = &[];
}

/// Build the wire representation from the fields explicitly set on `model`.
///
/// A field counts as set when it serializes to a non-null value, so models use
/// `Option<T>` for everything a caller may leave out.
pub fn to_wire_model<T: Serialize + WireSchema>(model: &T) -> Result<Map<String, Value>> {
    let Value::Object(tool_fields) = serde_json::to_value(model).map_err(|e| {
        ControlPlaneError::validation(T::NAME, format!("Failed to encode {}: {e}", T::NAME))
    })?
    else {
        return Err(ControlPlaneError::validation(
            T::NAME,
            format!("{} must encode to a JSON object", T::NAME),
        ));
    };

    let mut wire = Map::new();
    for (name, value) in tool_fields {
        if value.is_null() {
            continue;
        }
        let target = T::FIELDS
            .iter()
            .find(|mapping| mapping.tool == name)
            .map(|mapping| mapping.wire.to_string())
            .unwrap_or(name);
        wire.insert(target, value);
    }
    Ok(wire)
}

/// Build the tool-facing model from a wire object, zero-filling absent fields.
pub fn to_tool_model<T: DeserializeOwned + WireSchema>(wire: &Value) -> Result<T> {
    let wire = wire.as_object().ok_or_else(|| {
        ControlPlaneError::remote(
            format!("decode {}", T::NAME),
            format!("expected a JSON object, got {}", json_type_name(wire)),
        )
    })?;

    let mut tool = Map::new();
    for mapping in T::FIELDS {
        let value = wire
            .get(mapping.wire)
            .filter(|value| !value.is_null())
            .cloned()
            .unwrap_or_else(|| mapping.kind.zero());
        tool.insert(mapping.tool.to_string(), value);
    }

    serde_json::from_value(Value::Object(tool)).map_err(|e| {
        ControlPlaneError::remote(
            format!("decode {}", T::NAME),
            format!("wire payload does not match the {} schema: {e}", T::NAME),
        )
    })
}

/// Wire fields of `sample` that have neither a mapping nor an ignore decision.
pub fn unmapped_wire_fields<T: WireSchema>(sample: &Map<String, Value>) -> Vec<String> {
    sample
        .keys()
        .filter(|key| {
            !T::FIELDS.iter().any(|mapping| mapping.wire == key.as_str())
                && !T::IGNORED_WIRE_FIELDS.contains(&key.as_str())
        })
        .cloned()
        .collect()
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
