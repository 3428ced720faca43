//! Project variables and secrets.
//!
//! Existence checks run against the cached project; every successful write
//! refreshes it so the next check sees the change.

use cpgenie_core::convert::{to_tool_model, to_wire_model};
use cpgenie_core::error::{ControlPlaneError, Result};
use cpgenie_core::models::Variable;
use serde_json::{Map, Value, json};
use tracing::{info, warn};

use super::args::decode_value;
use crate::api::ControlPlaneApi;
use crate::session::SessionContext;

pub fn get_secrets_and_vars(session: &SessionContext) -> Result<Value> {
    let project = session.require_project()?;
    let mut variables = Map::new();
    for (name, wire) in &project.cluster_variables_meta {
        let variable: Variable = to_tool_model(wire)?;
        variables.insert(name.clone(), json!(variable));
    }
    Ok(json!({
        "project": project.name,
        "count": variables.len(),
        "variables": variables,
    }))
}

fn decode_variables(variables: &Map<String, Value>) -> Result<Map<String, Value>> {
    if variables.is_empty() {
        return Err(ControlPlaneError::validation(
            "variables",
            "'variables' must name at least one variable",
        ));
    }
    let mut wire = Map::new();
    for (name, value) in variables {
        let variable: Variable = decode_value(value.clone(), &format!("variables.{name}"))?;
        wire.insert(name.clone(), Value::Object(to_wire_model(&variable)?));
    }
    Ok(wire)
}

fn check_existence<'a>(
    session: &SessionContext,
    names: impl IntoIterator<Item = &'a String>,
    must_exist: bool,
) -> Result<String> {
    let project = session.require_project()?;
    let offenders: Vec<&str> = names
        .into_iter()
        .filter(|name| project.has_variable(name) != must_exist)
        .map(String::as_str)
        .collect();
    if offenders.is_empty() {
        return Ok(project.name.clone());
    }
    if must_exist {
        return Err(ControlPlaneError::NotFound {
            entity: "variable",
            name: offenders.join(", "),
            scope: Some(format!("project '{}'", project.name)),
        });
    }
    Err(ControlPlaneError::precondition_with_hint(
        format!(
            "Variables already exist in project '{}': {}",
            project.name,
            offenders.join(", ")
        ),
        "Use update_variables to change existing variables.",
    ))
}

/// The write is already committed when this runs, so a failed refresh only
/// leaves the cache stale and is reported as a warning.
async fn refresh_after_write(
    api: &dyn ControlPlaneApi,
    session: &mut SessionContext,
    result: &mut Value,
) {
    if let Err(err) = session.refresh_current_project(api).await {
        warn!(error = %err, "project refresh after variable write failed");
        result["warning"] = json!(format!(
            "{err}. Cached variables may be stale; call refresh_current_project."
        ));
    }
}

pub async fn create_variables(
    api: &dyn ControlPlaneApi,
    session: &mut SessionContext,
    variables: &Map<String, Value>,
) -> Result<Value> {
    let wire = decode_variables(variables)?;
    let project = check_existence(session, variables.keys(), false)?;
    api.add_variables(&project, &wire).await.map_err(|e| {
        e.with_context(format!("Failed to create variables in project '{project}'"))
    })?;
    let names: Vec<&String> = variables.keys().collect();
    info!(project = %project, count = names.len(), "variables created");
    let mut result = json!({
        "message": format!("Created {} variable(s) in project '{project}'", names.len()),
        "created": names,
    });
    refresh_after_write(api, session, &mut result).await;
    Ok(result)
}

pub async fn update_variables(
    api: &dyn ControlPlaneApi,
    session: &mut SessionContext,
    variables: &Map<String, Value>,
) -> Result<Value> {
    let wire = decode_variables(variables)?;
    let project = check_existence(session, variables.keys(), true)?;
    api.update_variables(&project, &wire).await.map_err(|e| {
        e.with_context(format!("Failed to update variables in project '{project}'"))
    })?;
    let names: Vec<&String> = variables.keys().collect();
    info!(project = %project, count = names.len(), "variables updated");
    let mut result = json!({
        "message": format!("Updated {} variable(s) in project '{project}'", names.len()),
        "updated": names,
    });
    refresh_after_write(api, session, &mut result).await;
    Ok(result)
}

pub async fn delete_variables(
    api: &dyn ControlPlaneApi,
    session: &mut SessionContext,
    names: &[String],
) -> Result<Value> {
    let project = check_existence(session, names, true)?;
    api.delete_variables(&project, names).await.map_err(|e| {
        e.with_context(format!("Failed to delete variables in project '{project}'"))
    })?;
    info!(project = %project, count = names.len(), "variables deleted");
    let mut result = json!({
        "message": format!("Deleted {} variable(s) from project '{project}'", names.len()),
        "deleted": names,
    });
    refresh_after_write(api, session, &mut result).await;
    Ok(result)
}
