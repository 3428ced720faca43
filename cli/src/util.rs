use cpgenie_core::config::Configuration;
use cpgenie_core::error::ControlPlaneError;
use cpgenie_mcp_runtime::ConnectionArgs;
use serde_json::{Value, json};

pub fn exit_error(message: &str, docs_hint: Option<&str>) -> ! {
    let mut err = json!({
        "error": "cli_error",
        "message": message
    });
    if let Some(hint) = docs_hint {
        err["docs_hint"] = json!(hint);
    }
    eprintln!("{}", cpgenie_mcp_runtime::to_pretty_json(&err));
    std::process::exit(1);
}

pub fn print_json(value: &Value) {
    println!("{}", cpgenie_mcp_runtime::to_pretty_json(value));
}

/// Exit codes: 1 remote or tool failure, 2 bad configuration, 3 control plane unreachable.
pub fn exit_code_for(err: &ControlPlaneError) -> i32 {
    match err {
        ControlPlaneError::Configuration(_) => 2,
        ControlPlaneError::RemoteCall { status: None, .. } => 3,
        _ => 1,
    }
}

/// Print the structured error on stderr and return its exit code.
pub fn report_error(err: &ControlPlaneError) -> i32 {
    eprintln!("{}", cpgenie_mcp_runtime::to_pretty_json(&json!(err.to_payload())));
    exit_code_for(err)
}

pub fn resolve_config(connection: &ConnectionArgs) -> Result<Configuration, i32> {
    connection.resolve().map_err(|err| report_error(&err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_kind() {
        assert_eq!(
            exit_code_for(&ControlPlaneError::Configuration("missing token".to_string())),
            2
        );
        assert_eq!(
            exit_code_for(&ControlPlaneError::RemoteCall {
                operation: "GET /api/me".to_string(),
                status: None,
                message: "connection refused".to_string(),
            }),
            3
        );
        assert_eq!(
            exit_code_for(&ControlPlaneError::RemoteCall {
                operation: "GET /api/me".to_string(),
                status: Some(401),
                message: "HTTP 401".to_string(),
            }),
            1
        );
    }
}
