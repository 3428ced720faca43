use cpgenie_core::error::{ControlPlaneError, Result};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

pub type Args = Map<String, Value>;

pub fn arg_bool(args: &Args, key: &str, default: bool) -> Result<bool> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Bool(v)) => Ok(*v),
        Some(_) => Err(ControlPlaneError::validation(
            key,
            format!("'{key}' must be a boolean"),
        )),
    }
}

pub fn arg_string(args: &Args, key: &str, default: &str) -> Result<String> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(default.to_string()),
        Some(Value::String(v)) => Ok(v.clone()),
        Some(_) => Err(ControlPlaneError::validation(
            key,
            format!("'{key}' must be a string"),
        )),
    }
}

pub fn required_string(args: &Args, key: &str) -> Result<String> {
    let value = args.get(key).ok_or_else(|| {
        ControlPlaneError::validation(key, format!("Missing required field '{key}'"))
    })?;
    match value {
        Value::String(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        Value::String(_) => Err(ControlPlaneError::validation(
            key,
            format!("'{key}' must not be empty"),
        )),
        _ => Err(ControlPlaneError::validation(
            key,
            format!("'{key}' must be a string"),
        )),
    }
}

pub fn arg_optional_string(args: &Args, key: &str) -> Result<Option<String>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(v)) if v.trim().is_empty() => Ok(None),
        Some(Value::String(v)) => Ok(Some(v.trim().to_string())),
        Some(_) => Err(ControlPlaneError::validation(
            key,
            format!("'{key}' must be a string"),
        )),
    }
}

pub fn required_object(args: &Args, key: &str) -> Result<Map<String, Value>> {
    match args.get(key) {
        None | Some(Value::Null) => Err(ControlPlaneError::validation(
            key,
            format!("Missing required field '{key}'"),
        )),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(_) => Err(ControlPlaneError::validation(
            key,
            format!("'{key}' must be an object"),
        )),
    }
}

pub fn arg_optional_object(args: &Args, key: &str) -> Result<Option<Map<String, Value>>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map.clone())),
        Some(_) => Err(ControlPlaneError::validation(
            key,
            format!("'{key}' must be an object"),
        )),
    }
}

pub fn required_string_array(args: &Args, key: &str) -> Result<Vec<String>> {
    let items = args
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| {
            ControlPlaneError::validation(key, format!("'{key}' must be an array of strings"))
        })?;
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let text = item.as_str().ok_or_else(|| {
            ControlPlaneError::validation(key, format!("'{key}' items must be strings"))
        })?;
        let normalized = text.trim();
        if !normalized.is_empty() {
            out.push(normalized.to_string());
        }
    }
    if out.is_empty() {
        return Err(ControlPlaneError::validation(
            key,
            format!("'{key}' must list at least one name"),
        ));
    }
    Ok(out)
}

/// Decode one argument into a typed value, reporting the field on failure.
pub fn decode_value<T: DeserializeOwned>(value: Value, field: &str) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| ControlPlaneError::validation(field, format!("Invalid '{field}': {e}")))
}
