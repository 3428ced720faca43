use serde::Serialize;

/// Error codes surfaced to agents in tool error payloads.
pub mod codes {
    pub const CONFIGURATION_ERROR: &str = "configuration_error";
    pub const PRECONDITION_FAILED: &str = "precondition_failed";
    pub const REMOTE_CALL_FAILED: &str = "remote_call_failed";
    pub const NOT_FOUND: &str = "not_found";
    pub const VALIDATION_FAILED: &str = "validation_failed";
    pub const UNKNOWN_TOOL: &str = "unknown_tool";
}

/// Everything that can go wrong between a tool call and the control plane.
///
/// Each variant maps to one machine-readable code in [`codes`]; the tool
/// boundary turns these into a single structured payload.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ControlPlaneError {
    /// Missing or incomplete connection settings. Fatal at startup.
    #[error("{0}")]
    Configuration(String),

    /// Required session state is absent or a guarded workflow rejected its input.
    #[error("{message}")]
    Precondition {
        message: String,
        docs_hint: Option<String>,
    },

    /// The remote API failed: transport error, non-2xx status or unreadable body.
    #[error("{operation} failed: {message}")]
    RemoteCall {
        operation: String,
        status: Option<u16>,
        message: String,
    },

    /// A named entity does not exist on the server or in the cached state.
    #[error("{entity} '{name}' not found{}", scope_suffix(.scope))]
    NotFound {
        entity: &'static str,
        name: String,
        scope: Option<String>,
    },

    /// Tool arguments are malformed.
    #[error("{message}")]
    Validation { field: String, message: String },
}

fn scope_suffix(scope: &Option<String>) -> String {
    scope
        .as_deref()
        .map(|scope| format!(" in {scope}"))
        .unwrap_or_default()
}

fn not_found_hint(entity: &str) -> Option<&'static str> {
    match entity {
        "project" => Some("Use get_all_projects to list available projects."),
        "environment" => Some("Use get_all_environments to list environments of the current project."),
        "resource" => Some("Use get_all_resources_by_project to list existing resources."),
        "variable" => Some(
            "Use get_secrets_and_vars to list existing variables, or create_variables to add new ones.",
        ),
        _ => None,
    }
}

impl ControlPlaneError {
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
            docs_hint: None,
        }
    }

    pub fn precondition_with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
            docs_hint: Some(hint.into()),
        }
    }

    pub fn remote(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RemoteCall {
            operation: operation.into(),
            status: None,
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            name: name.into(),
            scope: None,
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => codes::CONFIGURATION_ERROR,
            Self::Precondition { .. } => codes::PRECONDITION_FAILED,
            Self::RemoteCall { .. } => codes::REMOTE_CALL_FAILED,
            Self::NotFound { .. } => codes::NOT_FOUND,
            Self::Validation { .. } => codes::VALIDATION_FAILED,
        }
    }

    /// Re-labels a remote failure with the workflow step that triggered it,
    /// keeping the original status. Other variants pass through untouched.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        match self {
            Self::RemoteCall {
                operation,
                status,
                message,
            } => Self::RemoteCall {
                operation: context.into(),
                status,
                message: format!("{operation}: {message}"),
            },
            other => other,
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        let mut payload = ErrorPayload {
            error: self.code().to_string(),
            message: self.to_string(),
            field: None,
            docs_hint: None,
            status: None,
        };
        match self {
            Self::Precondition { docs_hint, .. } => payload.docs_hint = docs_hint.clone(),
            Self::RemoteCall { status, .. } => payload.status = *status,
            Self::Validation { field, .. } => payload.field = Some(field.clone()),
            Self::Configuration(_) => {
                payload.docs_hint = Some(
                    "Set CONTROL_PLANE_URL, FACETS_USERNAME and FACETS_TOKEN, or FACETS_PROFILE with a matching section in ~/.facets/credentials."
                        .to_string(),
                )
            }
            Self::NotFound { entity, .. } => {
                payload.docs_hint = not_found_hint(entity).map(str::to_string)
            }
        }
        payload
    }
}

/// Structured error object returned to agents. Designed to be read by a model:
/// a stable code plus enough text to decide the next call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorPayload {
    /// Machine-readable code (see [`codes`])
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs_hint: Option<String>,
    /// HTTP status of the failed remote call, when there was one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

pub type Result<T, E = ControlPlaneError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_includes_scope() {
        let err = ControlPlaneError::NotFound {
            entity: "environment",
            name: "prod".to_string(),
            scope: Some("project 'shop'".to_string()),
        };
        assert_eq!(err.to_string(), "environment 'prod' not found in project 'shop'");
        assert_eq!(err.code(), codes::NOT_FOUND);
        assert!(err.to_payload().docs_hint.unwrap().contains("get_all_environments"));
    }

    #[test]
    fn with_context_relabels_remote_failures_only() {
        let remote = ControlPlaneError::RemoteCall {
            operation: "GET /cc-ui/v1/stacks/shop".to_string(),
            status: Some(502),
            message: "bad gateway".to_string(),
        }
        .with_context("Failed to update resource 'api' of type 'service' in project 'shop'");
        match &remote {
            ControlPlaneError::RemoteCall {
                operation,
                status,
                message,
            } => {
                assert!(operation.contains("resource 'api'"));
                assert_eq!(*status, Some(502));
                assert!(message.contains("GET /cc-ui/v1/stacks/shop"));
            }
            other => panic!("unexpected variant: {other:?}"),
        }

        let precondition = ControlPlaneError::precondition("no project").with_context("ignored");
        assert_eq!(precondition.to_string(), "no project");
    }

    #[test]
    fn payload_carries_field_and_hint() {
        let payload = ControlPlaneError::validation("flavor", "'flavor' must be a string").to_payload();
        assert_eq!(payload.error, codes::VALIDATION_FAILED);
        assert_eq!(payload.field.as_deref(), Some("flavor"));

        let payload =
            ControlPlaneError::precondition_with_hint("No current project is set.", "Call use_project")
                .to_payload();
        assert_eq!(payload.error, codes::PRECONDITION_FAILED);
        assert_eq!(payload.docs_hint.as_deref(), Some("Call use_project"));
    }
}
