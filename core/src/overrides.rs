//! Editing of environment override documents.

use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathRemoval {
    /// The property existed and was removed; emptied parents were pruned.
    Removed,
    /// Some segment of the path does not exist in the document.
    NotFound,
}

/// Remove the property at dotted `path` (e.g. `spec.resources.limits.memory`)
/// from `document`. Objects left empty along the path are removed too, so
/// removing the only leaf collapses the document to `{}`.
pub fn remove_property_path(document: &mut Value, path: &str) -> PathRemoval {
    let segments: Vec<&str> = path.split('.').map(str::trim).collect();
    if segments.iter().any(|segment| segment.is_empty()) {
        return PathRemoval::NotFound;
    }
    let Value::Object(root) = document else {
        return PathRemoval::NotFound;
    };
    if remove_segments(root, &segments) {
        PathRemoval::Removed
    } else {
        PathRemoval::NotFound
    }
}

fn remove_segments(node: &mut Map<String, Value>, segments: &[&str]) -> bool {
    match segments {
        [] => false,
        [leaf] => node.remove(*leaf).is_some(),
        [head, rest @ ..] => {
            let Some(Value::Object(child)) = node.get_mut(*head) else {
                return false;
            };
            let removed = remove_segments(child, rest);
            if removed && child.is_empty() {
                node.remove(*head);
            }
            removed
        }
    }
}

/// Whether an override document carries nothing: null, `{}`, or an empty string.
pub fn is_empty_document(document: &Value) -> bool {
    match document {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::String(raw) => raw.trim().is_empty(),
        _ => false,
    }
}
