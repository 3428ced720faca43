//! Module catalog lookups and blueprint resource workflows.

use std::collections::BTreeMap;

use cpgenie_core::error::{ControlPlaneError, Result};
use cpgenie_core::models::{
    CompatibleResource, ModuleDetail, ModuleInputSlot, ResourceFileRequest, ResourceView,
    WireResource,
};
use serde_json::{Map, Value, json};
use tracing::info;

use super::args::decode_value;
use super::projects::not_found_on_404;
use crate::api::ControlPlaneApi;
use crate::session::{ModuleKey, SessionContext};

/// Arguments of `add_resource` after argument decoding.
#[derive(Debug, Clone)]
pub struct NewResource {
    pub resource_type: String,
    pub resource_name: String,
    pub flavor: Option<String>,
    pub version: Option<String>,
    pub content: Map<String, Value>,
    pub inputs: Map<String, Value>,
}

fn resource_context(operation: &str, resource_type: &str, name: &str, project: &str) -> String {
    format!("Failed to {operation} resource '{name}' of type '{resource_type}' in project '{project}'")
}

async fn project_branch(api: &dyn ControlPlaneApi, project: &str) -> Result<Option<String>> {
    let project = api
        .get_project(project)
        .await
        .map_err(|e| e.with_context(format!("Failed to load branch of project '{project}'")))?;
    Ok(project.branch)
}

async fn load_module(
    api: &dyn ControlPlaneApi,
    session: &mut SessionContext,
    project: &str,
    intent: &str,
    flavor: &str,
    version: &str,
) -> Result<ModuleDetail> {
    let key = ModuleKey::new(project, intent, flavor, version);
    if let Some(detail) = session.cached_module(&key) {
        return Ok(detail.clone());
    }
    let detail = api
        .get_module(project, intent, flavor, version)
        .await
        .map_err(|e| {
            not_found_on_404(
                e,
                "module",
                &format!("{intent}/{flavor}/{version}"),
                Some(format!("project '{project}'")),
            )
        })
        .map_err(|e| {
            e.with_context(format!(
                "Failed to load module {intent}/{flavor}/{version} for project '{project}'"
            ))
        })?;
    session.cache_module(key, detail.clone());
    Ok(detail)
}

async fn fetch_resource(
    api: &dyn ControlPlaneApi,
    project: &str,
    resource_type: &str,
    resource_name: &str,
    operation: &str,
) -> Result<WireResource> {
    api.get_resource(project, resource_type, resource_name)
        .await
        .map_err(|e| {
            not_found_on_404(
                e,
                "resource",
                &format!("{resource_type}/{resource_name}"),
                Some(format!("project '{project}'")),
            )
        })
        .map_err(|e| {
            e.with_context(resource_context(operation, resource_type, resource_name, project))
        })
}

/// Explicit `project` wins; otherwise the session's current project.
pub fn target_project(session: &SessionContext, explicit: Option<&str>) -> Result<String> {
    match explicit {
        Some(project) => Ok(project.to_string()),
        None => Ok(session.require_project()?.name.clone()),
    }
}

pub async fn list_available_resources(api: &dyn ControlPlaneApi, project: &str) -> Result<Value> {
    let modules = api.list_modules(project).await.map_err(|e| {
        e.with_context(format!("Failed to list available modules of project '{project}'"))
    })?;
    Ok(json!({ "project": project, "count": modules.len(), "modules": modules }))
}

pub async fn get_module_inputs(
    api: &dyn ControlPlaneApi,
    project: &str,
    intent: &str,
    flavor: &str,
) -> Result<Value> {
    let inputs = fetch_module_inputs(api, project, intent, flavor).await?;
    Ok(json!({ "intent": intent, "flavor": flavor, "inputs": inputs }))
}

async fn fetch_module_inputs(
    api: &dyn ControlPlaneApi,
    project: &str,
    intent: &str,
    flavor: &str,
) -> Result<BTreeMap<String, ModuleInputSlot>> {
    api.get_module_inputs(project, intent, flavor)
        .await
        .map_err(|e| {
            e.with_context(format!(
                "Failed to load inputs of module {intent}/{flavor} for project '{project}'"
            ))
        })
}

pub async fn get_spec_for_module(
    api: &dyn ControlPlaneApi,
    session: &mut SessionContext,
    project: &str,
    intent: &str,
    flavor: &str,
    version: &str,
) -> Result<Value> {
    let detail = load_module(api, session, project, intent, flavor, version).await?;
    Ok(json!({
        "intent": intent,
        "flavor": flavor,
        "version": version,
        "spec": detail.spec_json(),
    }))
}

pub async fn get_sample_for_module(
    api: &dyn ControlPlaneApi,
    session: &mut SessionContext,
    project: &str,
    intent: &str,
    flavor: &str,
    version: &str,
) -> Result<Value> {
    let detail = load_module(api, session, project, intent, flavor, version).await?;
    Ok(json!({
        "intent": intent,
        "flavor": flavor,
        "version": version,
        "sample": detail.sample(),
    }))
}

pub async fn get_all_resources_by_project(
    api: &dyn ControlPlaneApi,
    project: &str,
) -> Result<Value> {
    let resources = api
        .list_resources(project)
        .await
        .map_err(|e| e.with_context(format!("Failed to list resources of project '{project}'")))?;
    let views: Vec<ResourceView> = resources.iter().map(ResourceView::from).collect();
    Ok(json!({ "project": project, "count": views.len(), "resources": views }))
}

pub async fn get_resource_by_project(
    api: &dyn ControlPlaneApi,
    project: &str,
    resource_type: &str,
    resource_name: &str,
) -> Result<Value> {
    let resource = fetch_resource(api, project, resource_type, resource_name, "load").await?;
    Ok(json!(ResourceView::from(&resource)))
}

pub async fn get_spec_for_resource(
    api: &dyn ControlPlaneApi,
    session: &mut SessionContext,
    project: &str,
    resource_type: &str,
    resource_name: &str,
) -> Result<Value> {
    let resource = fetch_resource(api, project, resource_type, resource_name, "load").await?;
    let info = resource.info.as_ref();
    let (Some(flavor), Some(version)) = (
        info.and_then(|info| info.flavour.clone()),
        info.and_then(|info| info.version.clone()),
    ) else {
        return Err(ControlPlaneError::precondition(format!(
            "Resource '{resource_name}' of type '{resource_type}' has no flavor and version; its module spec cannot be determined"
        )));
    };
    let detail = load_module(api, session, project, resource_type, &flavor, &version).await?;
    Ok(json!({
        "resource_type": resource_type,
        "resource_name": resource_name,
        "flavor": flavor,
        "version": version,
        "spec": detail.spec_json(),
    }))
}

fn describe_candidates(candidates: &[CompatibleResource]) -> String {
    candidates
        .iter()
        .map(|candidate| format!("{} ({})", candidate.resource_name, candidate.resource_type))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Check supplied input wiring against the module's declared slots and build
/// the `inputs` block written into the resource document.
pub fn resolve_inputs(
    project: &str,
    slots: &BTreeMap<String, ModuleInputSlot>,
    supplied: &Map<String, Value>,
) -> Result<Map<String, Value>> {
    for (slot_name, slot) in slots {
        if slot.optional {
            continue;
        }
        if slot.compatible_resources.is_empty() {
            return Err(ControlPlaneError::precondition_with_hint(
                format!(
                    "Required input '{slot_name}' has no compatible resource in project '{project}'"
                ),
                format!("Create a resource that satisfies '{slot_name}' first, then retry."),
            ));
        }
        if !supplied.contains_key(slot_name) {
            return Err(ControlPlaneError::precondition(format!(
                "Required input '{slot_name}' was not supplied; choose one of: {}",
                describe_candidates(&slot.compatible_resources)
            )));
        }
    }

    let mut resolved = Map::new();
    for (slot_name, value) in supplied {
        let slot = slots.get(slot_name).ok_or_else(|| {
            ControlPlaneError::validation(
                "inputs",
                format!(
                    "Unknown input '{slot_name}'; the module declares: {}",
                    slots.keys().cloned().collect::<Vec<_>>().join(", ")
                ),
            )
        })?;
        let choice: CompatibleResource =
            decode_value(value.clone(), &format!("inputs.{slot_name}"))?;
        let matched = slot
            .compatible_resources
            .iter()
            .find(|candidate| {
                candidate.resource_name == choice.resource_name
                    && candidate.resource_type == choice.resource_type
            })
            .ok_or_else(|| {
                ControlPlaneError::precondition(format!(
                    "Resource '{}' of type '{}' is not compatible with input '{slot_name}'; choose one of: {}",
                    choice.resource_name,
                    choice.resource_type,
                    describe_candidates(&slot.compatible_resources)
                ))
            })?;
        resolved.insert(
            slot_name.clone(),
            json!({
                "resource_name": matched.resource_name,
                "resource_type": matched.resource_type,
                "output_name": choice.output_name.clone().or_else(|| matched.output_name.clone()),
            }),
        );
    }
    Ok(resolved)
}

fn stamp_field(content: &mut Map<String, Value>, key: &str, expected: &str) -> Result<()> {
    match content.get(key) {
        None | Some(Value::Null) => {
            content.insert(key.to_string(), Value::String(expected.to_string()));
            Ok(())
        }
        Some(Value::String(existing)) if existing == expected => Ok(()),
        Some(other) => Err(ControlPlaneError::precondition(format!(
            "Content field '{key}' is {other} but the resource is being created as '{expected}'"
        ))),
    }
}

/// Wiring already present in `content.inputs`, overlaid by the `inputs`
/// argument.
fn merged_inputs(
    content: &Map<String, Value>,
    supplied: Map<String, Value>,
) -> Result<Map<String, Value>> {
    let mut merged = match content.get("inputs") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(existing)) => existing.clone(),
        Some(_) => {
            return Err(ControlPlaneError::validation(
                "content.inputs",
                "'content.inputs' must be an object",
            ));
        }
    };
    merged.extend(supplied);
    Ok(merged)
}

pub async fn add_resource(
    api: &dyn ControlPlaneApi,
    project: &str,
    resource: NewResource,
) -> Result<Value> {
    let NewResource {
        resource_type,
        resource_name,
        flavor,
        version,
        mut content,
        inputs,
    } = resource;
    let (Some(flavor), Some(version)) = (flavor, version) else {
        return Err(ControlPlaneError::precondition_with_hint(
            "Both flavor and version are required to add a resource",
            "Use list_available_resources to find the module's flavor and version.",
        ));
    };
    let inputs = merged_inputs(&content, inputs)?;

    let slots = fetch_module_inputs(api, project, &resource_type, &flavor).await?;
    let wiring = resolve_inputs(project, &slots, &inputs)?;

    stamp_field(&mut content, "kind", &resource_type)?;
    stamp_field(&mut content, "flavor", &flavor)?;
    stamp_field(&mut content, "version", &version)?;
    if !wiring.is_empty() {
        content.insert("inputs".to_string(), Value::Object(wiring));
    }

    let branch = project_branch(api, project).await?;
    let request = ResourceFileRequest {
        resource_name: resource_name.clone(),
        resource_type: resource_type.clone(),
        content: Value::Object(content),
        directory: None,
        filename: None,
        flavor: Some(flavor.clone()),
    };
    api.add_resources(project, branch.as_deref(), std::slice::from_ref(&request))
        .await
        .map_err(|e| {
            e.with_context(resource_context("add", &resource_type, &resource_name, project))
        })?;
    info!(project = %project, resource_type = %resource_type, resource = %resource_name, "resource added");
    Ok(json!({
        "message": format!("Resource '{resource_name}' of type '{resource_type}' added to project '{project}'"),
        "flavor": flavor,
        "version": version,
        "content": request.content,
    }))
}

pub async fn update_resource(
    api: &dyn ControlPlaneApi,
    project: &str,
    resource_type: &str,
    resource_name: &str,
    content: Map<String, Value>,
) -> Result<Value> {
    let existing = fetch_resource(api, project, resource_type, resource_name, "update").await?;
    let branch = project_branch(api, project).await?;
    let request = ResourceFileRequest {
        resource_name: resource_name.to_string(),
        resource_type: resource_type.to_string(),
        content: Value::Object(content),
        directory: existing.directory.clone(),
        filename: existing.filename.clone(),
        flavor: existing.info.as_ref().and_then(|info| info.flavour.clone()),
    };
    api.update_resources(project, branch.as_deref(), std::slice::from_ref(&request))
        .await
        .map_err(|e| {
            e.with_context(resource_context("update", resource_type, resource_name, project))
        })?;
    info!(project = %project, resource_type, resource = resource_name, "resource updated");
    Ok(json!({
        "message": format!("Resource '{resource_name}' of type '{resource_type}' updated in project '{project}'"),
    }))
}

pub async fn delete_resource(
    api: &dyn ControlPlaneApi,
    project: &str,
    resource_type: &str,
    resource_name: &str,
) -> Result<Value> {
    let existing = fetch_resource(api, project, resource_type, resource_name, "delete").await?;
    let branch = project_branch(api, project).await?;
    let request = ResourceFileRequest {
        resource_name: resource_name.to_string(),
        resource_type: resource_type.to_string(),
        content: existing.content_json(),
        directory: existing.directory.clone(),
        filename: existing.filename.clone(),
        flavor: existing.info.as_ref().and_then(|info| info.flavour.clone()),
    };
    api.delete_resources(project, branch.as_deref(), std::slice::from_ref(&request))
        .await
        .map_err(|e| {
            e.with_context(resource_context("delete", resource_type, resource_name, project))
        })?;
    info!(project = %project, resource_type, resource = resource_name, "resource deleted");
    Ok(json!({
        "message": format!("Resource '{resource_name}' of type '{resource_type}' deleted from project '{project}'"),
    }))
}
