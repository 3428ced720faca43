//! Startup connectivity check against the control plane.

use chrono::Utc;
use cpgenie_core::error::Result;
use serde_json::{Value, json};
use tracing::{error, info};

use crate::api::ClientFactory;

fn identity_name(identity: &Value) -> &str {
    ["userName", "username", "name", "email"]
        .iter()
        .find_map(|key| identity.get(*key).and_then(Value::as_str))
        .unwrap_or("<unknown>")
}

/// Call the identity endpoint once. The server refuses to start when this fails.
pub async fn verify_connectivity(factory: &dyn ClientFactory) -> Result<Value> {
    let api = factory.client()?;
    match api.me().await {
        Ok(identity) => {
            info!(user = identity_name(&identity), "connected to control plane");
            Ok(identity)
        }
        Err(err) => {
            error!(error = %err, "control plane connectivity check failed");
            Err(err.with_context("Connectivity self-test"))
        }
    }
}

/// Identity plus a release stream count; the report printed by `cpgenie check`.
pub async fn connection_report(factory: &dyn ClientFactory) -> Result<Value> {
    let identity = verify_connectivity(factory).await?;
    let api = factory.client()?;
    let streams = api
        .list_release_streams()
        .await
        .map_err(|e| e.with_context("Failed to list release streams"))?;
    Ok(json!({
        "status": "ok",
        "user": identity_name(&identity),
        "release_streams": streams.len(),
        "checked_at": Utc::now().to_rfc3339(),
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cpgenie_core::error::ControlPlaneError;

    use super::*;
    use crate::api::HttpClientFactory;
    use crate::testing::{MockControlPlane, MockFactory};

    #[tokio::test]
    async fn success_returns_identity() {
        let factory = MockFactory(Arc::new(MockControlPlane::default()));
        let identity = verify_connectivity(&factory).await.unwrap();
        assert_eq!(identity_name(&identity), "alice");

        let report = connection_report(&factory).await.unwrap();
        assert_eq!(report["release_streams"], 0);
        let checked_at = report["checked_at"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(checked_at).is_ok());
    }

    #[tokio::test]
    async fn remote_failure_is_reported_with_context() {
        let api = MockControlPlane::default();
        *api.me_error.lock().unwrap() = Some(ControlPlaneError::RemoteCall {
            operation: "GET /api/me".to_string(),
            status: Some(401),
            message: "HTTP 401 Unauthorized".to_string(),
        });
        let factory = MockFactory(Arc::new(api));
        let err = verify_connectivity(&factory).await.unwrap_err();
        assert_eq!(err.code(), "remote_call_failed");
        assert!(err.to_string().starts_with("Connectivity self-test failed"));
    }

    #[tokio::test]
    async fn unconfigured_factory_fails_without_a_client() {
        let err = verify_connectivity(&HttpClientFactory::unconfigured())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "configuration_error");
    }
}
