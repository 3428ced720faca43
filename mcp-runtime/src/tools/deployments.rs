//! Deployment reads and the guarded deployment workflows.
//!
//! Every guarded workflow checks the requested release type and its
//! type-specific fields before touching the session or the network.

use cpgenie_core::convert::to_wire_model;
use cpgenie_core::error::{ControlPlaneError, Result};
use cpgenie_core::models::{DeploymentRequest, ReleaseType};
use serde_json::{Map, Value, json};
use tracing::info;

use super::args::decode_value;
use super::environments::refresh_current_environment;
use crate::api::ControlPlaneApi;
use crate::session::SessionContext;

fn current_environment_ref(session: &SessionContext) -> Result<(String, String)> {
    let (_, environment) = session.require_project_and_environment()?;
    Ok((environment.id.clone(), environment.name.clone()))
}

fn deployment_list(listing: &Value) -> Vec<Value> {
    match listing {
        Value::Array(items) => items.clone(),
        Value::Object(map) => map
            .get("deployments")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn deployment_status(deployment: &Value) -> Option<&str> {
    deployment
        .get("status")
        .or_else(|| deployment.get("deploymentStatus"))
        .and_then(Value::as_str)
}

pub async fn get_deployments(api: &dyn ControlPlaneApi, session: &SessionContext) -> Result<Value> {
    let (id, name) = current_environment_ref(session)?;
    api.list_deployments(&id).await.map_err(|e| {
        e.with_context(format!("Failed to list deployments of environment '{name}'"))
    })
}

pub async fn get_deployment_details(
    api: &dyn ControlPlaneApi,
    session: &SessionContext,
    deployment_id: &str,
) -> Result<Value> {
    let (id, name) = current_environment_ref(session)?;
    api.get_deployment(&id, deployment_id)
        .await
        .map_err(|e| {
            super::projects::not_found_on_404(
                e,
                "deployment",
                deployment_id,
                Some(format!("environment '{name}'")),
            )
        })
        .map_err(|e| e.with_context(format!("Failed to load deployment '{deployment_id}'")))
}

pub async fn get_deployment_logs(
    api: &dyn ControlPlaneApi,
    session: &SessionContext,
    deployment_id: &str,
) -> Result<Value> {
    let (id, _) = current_environment_ref(session)?;
    api.get_deployment_logs(&id, deployment_id)
        .await
        .map_err(|e| e.with_context(format!("Failed to load logs of deployment '{deployment_id}'")))
}

pub async fn get_latest_deployment(
    api: &dyn ControlPlaneApi,
    session: &SessionContext,
) -> Result<Value> {
    let (_, name) = current_environment_ref(session)?;
    let listing = get_deployments(api, session).await?;
    deployment_list(&listing)
        .pop()
        .ok_or_else(|| ControlPlaneError::NotFound {
            entity: "deployment",
            name: "latest".to_string(),
            scope: Some(format!("environment '{name}'")),
        })
}

async fn active_deployments(
    api: &dyn ControlPlaneApi,
    session: &mut SessionContext,
) -> Result<Vec<Value>> {
    let environment = refresh_current_environment(api, session).await?;
    if !environment.is_running() {
        return Err(ControlPlaneError::precondition(format!(
            "Environment '{}' is not running (state: '{}'); active deployments are only tracked for RUNNING environments",
            environment.name, environment.cluster_state
        )));
    }
    let listing = get_deployments(api, session).await?;
    Ok(deployment_list(&listing)
        .into_iter()
        .filter(|deployment| deployment_status(deployment) == Some("RUNNING"))
        .collect())
}

pub async fn get_active_deployments(
    api: &dyn ControlPlaneApi,
    session: &mut SessionContext,
) -> Result<Value> {
    let active = active_deployments(api, session).await?;
    Ok(json!({ "count": active.len(), "deployments": active }))
}

pub async fn get_active_deployment_logs(
    api: &dyn ControlPlaneApi,
    session: &mut SessionContext,
) -> Result<Value> {
    let active = active_deployments(api, session).await?;
    let (id, _) = current_environment_ref(session)?;
    let mut logs = Vec::with_capacity(active.len());
    for deployment in active {
        let Some(deployment_id) = deployment.get("id").and_then(Value::as_str) else {
            continue;
        };
        let entry = api
            .get_deployment_logs(&id, deployment_id)
            .await
            .map_err(|e| {
                e.with_context(format!("Failed to load logs of deployment '{deployment_id}'"))
            })?;
        logs.push(json!({ "deployment_id": deployment_id, "logs": entry }));
    }
    Ok(json!({ "count": logs.len(), "deployments": logs }))
}

/// Submit a deployment for the current environment. Unset build steps and
/// force flags go out as `[]` and `false`.
pub async fn create_deployment(
    api: &dyn ControlPlaneApi,
    session: &SessionContext,
    request: &DeploymentRequest,
) -> Result<Value> {
    let (id, name) = current_environment_ref(session)?;
    let release_type = request
        .release_type
        .map(ReleaseType::as_str)
        .unwrap_or("UNSPECIFIED");

    let mut wire = to_wire_model(request)?;
    for (key, default) in [
        ("hotfixResources", json!([])),
        ("overrideBuildSteps", json!([])),
        ("forceRelease", Value::Bool(false)),
    ] {
        if matches!(wire.get(key), None | Some(Value::Null)) {
            wire.insert(key.to_string(), default);
        }
    }

    let deployment = api.create_deployment(&id, &wire).await.map_err(|e| {
        e.with_context(format!(
            "Failed to create {release_type} deployment for environment '{name}'"
        ))
    })?;
    let deployment_id = deployment.get("id").cloned().unwrap_or(Value::Null);
    info!(environment = %name, release_type, deployment = %deployment_id, "deployment created");
    Ok(json!({
        "message": format!("{release_type} deployment started for environment '{name}'"),
        "deployment_id": deployment_id,
        "deployment": deployment,
    }))
}

/// Validate `properties` for a workflow that only accepts `expected`.
pub fn guarded_request(
    expected: ReleaseType,
    properties: Map<String, Value>,
) -> Result<DeploymentRequest> {
    let requested = properties
        .get("releaseType")
        .or_else(|| properties.get("release_type"))
        .and_then(Value::as_str);
    if requested != Some(expected.as_str()) {
        return Err(ControlPlaneError::precondition(format!(
            "Release type must be {expected}"
        )));
    }

    let mut request: DeploymentRequest = decode_value(Value::Object(properties), "properties")?;
    match expected {
        ReleaseType::HotfixPlan | ReleaseType::Hotfix => {
            if request.hotfix_resources.as_ref().is_none_or(Vec::is_empty) {
                return Err(ControlPlaneError::precondition(format!(
                    "Hotfix resources must be provided for {expected}"
                )));
            }
        }
        ReleaseType::Custom => {
            if request.override_build_steps.as_ref().is_none_or(Vec::is_empty) {
                return Err(ControlPlaneError::precondition(
                    "Override build steps must be provided for CUSTOM",
                ));
            }
        }
        ReleaseType::UnlockState => {
            if request.lock_id.as_deref().is_none_or(|id| id.trim().is_empty()) {
                return Err(ControlPlaneError::precondition(
                    "Lock id must be provided for UNLOCK_STATE",
                ));
            }
        }
        ReleaseType::Destroy => request.force_release = Some(true),
        _ => {}
    }
    Ok(request)
}

pub async fn run_guarded_deployment(
    api: &dyn ControlPlaneApi,
    session: &SessionContext,
    expected: ReleaseType,
    properties: Map<String, Value>,
) -> Result<Value> {
    let request = guarded_request(expected, properties)?;
    create_deployment(api, session, &request).await
}
