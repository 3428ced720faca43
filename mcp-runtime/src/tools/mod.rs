//! Tool catalog and dispatch.
//!
//! Handlers return [`cpgenie_core::error::Result`]; the server turns errors
//! into structured tool errors.

pub mod args;
pub mod deployments;
pub mod environments;
pub mod overrides;
pub mod projects;
pub mod release_streams;
pub mod resources;
pub mod variables;

use cpgenie_core::error::{ControlPlaneError, Result};
use cpgenie_core::models::{ReleaseStreamRequest, ReleaseType};
use serde_json::{Map, Value, json};

use self::args::{
    Args, arg_bool, arg_optional_object, arg_optional_string, arg_string, required_object,
    required_string, required_string_array,
};
use self::resources::NewResource;
use crate::api::ControlPlaneApi;
use crate::session::SessionContext;

#[derive(Debug)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

/// Deployment workflows and the release type each one accepts.
const GUARDED_DEPLOYMENTS: [(&str, ReleaseType); 10] = [
    ("launch_environment", ReleaseType::Launch),
    ("destroy_environment", ReleaseType::Destroy),
    ("create_hotfix_plan", ReleaseType::HotfixPlan),
    ("create_hotfix", ReleaseType::Hotfix),
    ("create_full_release_plan", ReleaseType::FullPlan),
    ("create_full_release", ReleaseType::Release),
    ("create_custom_release", ReleaseType::Custom),
    ("unlock_state", ReleaseType::UnlockState),
    ("scale_up_environment", ReleaseType::ScaleUp),
    ("scale_down_environment", ReleaseType::ScaleDown),
];

fn guarded_release_type(name: &str) -> Option<ReleaseType> {
    GUARDED_DEPLOYMENTS
        .iter()
        .find(|(tool, _)| *tool == name)
        .map(|(_, release_type)| *release_type)
}

fn no_args() -> Value {
    json!({ "type": "object", "properties": {} })
}

fn string_props(fields: &[(&str, &str)], required: &[&str]) -> Value {
    let mut properties = Map::new();
    for (name, description) in fields {
        properties.insert(
            name.to_string(),
            json!({ "type": "string", "description": description }),
        );
    }
    json!({ "type": "object", "properties": properties, "required": required })
}

/// Resource workflow tools target the session's current project unless the
/// caller names one.
fn with_project_arg(mut schema: Value) -> Value {
    schema["properties"]["project_name"] = json!({
        "type": "string",
        "description": "Project to act on; defaults to the current project"
    });
    schema
}

fn resource_ref_schema() -> Value {
    string_props(
        &[
            ("resource_type", "Resource type (module intent), e.g. service"),
            ("resource_name", "Resource name within the project"),
        ],
        &["resource_type", "resource_name"],
    )
}

fn module_ref_schema(with_version: bool) -> Value {
    let mut fields = vec![
        ("intent", "Module intent, e.g. service"),
        ("flavor", "Module flavor, e.g. k8s"),
    ];
    let mut required = vec!["intent", "flavor"];
    if with_version {
        fields.push(("version", "Module version"));
        required.push("version");
    }
    string_props(&fields, &required)
}

fn deployment_schema(release_type: ReleaseType) -> Value {
    let mut required = vec!["releaseType"];
    match release_type {
        ReleaseType::HotfixPlan | ReleaseType::Hotfix => required.push("hotfixResources"),
        ReleaseType::Custom => required.push("overrideBuildSteps"),
        ReleaseType::UnlockState => required.push("lockId"),
        _ => {}
    }
    json!({
        "type": "object",
        "properties": {
            "properties": {
                "type": "object",
                "description": "Deployment request properties",
                "properties": {
                    "releaseType": { "type": "string", "const": release_type.as_str() },
                    "forceRelease": { "type": "boolean" },
                    "allowDestroy": { "type": "boolean" },
                    "withRefresh": { "type": "boolean" },
                    "hotfixResources": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "resourceType": { "type": "string" },
                                "resourceName": { "type": "string" }
                            },
                            "required": ["resourceType", "resourceName"]
                        }
                    },
                    "overrideBuildSteps": { "type": "array", "items": { "type": "string" } },
                    "lockId": { "type": "string" }
                },
                "required": required
            }
        },
        "required": ["properties"]
    })
}

fn variable_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "value": { "type": "string" },
            "description": { "type": "string" },
            "is_secret": { "type": "boolean" },
            "is_global": { "type": "boolean" }
        }
    })
}

fn deployment_description(release_type: ReleaseType) -> &'static str {
    match release_type {
        ReleaseType::Launch => {
            "Launch the current environment (releaseType LAUNCH). Expected when the environment is not yet running."
        }
        ReleaseType::Destroy => {
            "Destroy the current environment (releaseType DESTROY, always forced). Expected when the environment is running."
        }
        ReleaseType::HotfixPlan => {
            "Plan a hotfix of selected resources (releaseType HOTFIX_PLAN, hotfixResources required)."
        }
        ReleaseType::Hotfix => {
            "Apply a hotfix to selected resources (releaseType HOTFIX, hotfixResources required). Expected on a running environment."
        }
        ReleaseType::FullPlan => "Plan a full release of the current environment (releaseType FULL_PLAN).",
        ReleaseType::Release => {
            "Run a full release of the current environment (releaseType RELEASE). Expected on a running environment."
        }
        ReleaseType::Custom => {
            "Run a custom release with explicit build steps (releaseType CUSTOM, overrideBuildSteps required)."
        }
        ReleaseType::UnlockState => {
            "Release a stuck state lock (releaseType UNLOCK_STATE, lockId required)."
        }
        ReleaseType::ScaleUp => {
            "Scale the current environment up (releaseType SCALE_UP). Expected when the environment is scaled down."
        }
        ReleaseType::ScaleDown => {
            "Scale the current environment down (releaseType SCALE_DOWN). Expected on a running environment."
        }
    }
}

pub fn tool_definitions() -> Vec<ToolDefinition> {
    let mut tools = vec![
        ToolDefinition {
            name: "get_all_projects",
            description: "List all projects (stacks) visible to the configured user.",
            input_schema: no_args(),
        },
        ToolDefinition {
            name: "use_project",
            description: "Select the current project. Selecting a different project clears the current environment.",
            input_schema: string_props(&[("project_name", "Project name")], &["project_name"]),
        },
        ToolDefinition {
            name: "get_current_project",
            description: "Show the current project and environment selection.",
            input_schema: no_args(),
        },
        ToolDefinition {
            name: "refresh_current_project",
            description: "Re-fetch the current project, including its variable metadata.",
            input_schema: no_args(),
        },
        ToolDefinition {
            name: "get_all_environments",
            description: "List environments of the current project.",
            input_schema: no_args(),
        },
        ToolDefinition {
            name: "use_environment",
            description: "Select the current environment by name within the current project.",
            input_schema: string_props(
                &[("environment_name", "Environment name")],
                &["environment_name"],
            ),
        },
        ToolDefinition {
            name: "get_current_environment_details",
            description: "Re-fetch the current environment with its lifecycle state (cluster_state).",
            input_schema: no_args(),
        },
        ToolDefinition {
            name: "check_if_environment_is_running",
            description: "Whether the current environment's lifecycle state is RUNNING.",
            input_schema: no_args(),
        },
        ToolDefinition {
            name: "get_deployments",
            description: "List deployments of the current environment.",
            input_schema: no_args(),
        },
        ToolDefinition {
            name: "get_deployment_details",
            description: "Fetch one deployment of the current environment.",
            input_schema: string_props(&[("deployment_id", "Deployment id")], &["deployment_id"]),
        },
        ToolDefinition {
            name: "get_deployment_logs",
            description: "Fetch the logs of one deployment of the current environment.",
            input_schema: string_props(&[("deployment_id", "Deployment id")], &["deployment_id"]),
        },
        ToolDefinition {
            name: "get_latest_deployment",
            description: "Most recent deployment of the current environment.",
            input_schema: no_args(),
        },
        ToolDefinition {
            name: "get_active_deployments",
            description: "Deployments currently RUNNING. Requires the environment to be RUNNING; an empty list is a valid result.",
            input_schema: no_args(),
        },
        ToolDefinition {
            name: "get_active_deployment_logs",
            description: "Logs of every RUNNING deployment. Requires the environment to be RUNNING.",
            input_schema: no_args(),
        },
        ToolDefinition {
            name: "list_available_resources",
            description: "Modules (intent, flavor, version) available to the current project.",
            input_schema: with_project_arg(no_args()),
        },
        ToolDefinition {
            name: "get_module_inputs",
            description: "Input slots of a module and the existing resources compatible with each slot.",
            input_schema: with_project_arg(module_ref_schema(false)),
        },
        ToolDefinition {
            name: "get_spec_for_module",
            description: "JSON schema of a module's resource document.",
            input_schema: with_project_arg(module_ref_schema(true)),
        },
        ToolDefinition {
            name: "get_sample_for_module",
            description: "Sample resource document for a module; a starting point for add_resource.",
            input_schema: with_project_arg(module_ref_schema(true)),
        },
        ToolDefinition {
            name: "get_all_resources_by_project",
            description: "All resources of the current project with their documents.",
            input_schema: with_project_arg(no_args()),
        },
        ToolDefinition {
            name: "get_resource_by_project",
            description: "One resource of the current project.",
            input_schema: with_project_arg(resource_ref_schema()),
        },
        ToolDefinition {
            name: "get_spec_for_resource",
            description: "JSON schema for an existing resource, from its flavor and version.",
            input_schema: with_project_arg(resource_ref_schema()),
        },
        ToolDefinition {
            name: "add_resource",
            description: "Add a resource to the current project. flavor and version are required; every required module input must be wired explicitly in 'inputs'.",
            input_schema: with_project_arg(json!({
                "type": "object",
                "properties": {
                    "resource_type": { "type": "string", "description": "Module intent" },
                    "resource_name": { "type": "string" },
                    "flavor": { "type": "string" },
                    "version": { "type": "string" },
                    "content": { "type": "object", "description": "Resource document" },
                    "inputs": {
                        "type": "object",
                        "description": "Slot name -> { resource_name, resource_type, output_name? }",
                        "additionalProperties": { "type": "object" }
                    }
                },
                "required": ["resource_type", "resource_name", "flavor", "version", "content"]
            })),
        },
        ToolDefinition {
            name: "update_resource",
            description: "Replace the document of an existing resource in the current project.",
            input_schema: with_project_arg(json!({
                "type": "object",
                "properties": {
                    "resource_type": { "type": "string" },
                    "resource_name": { "type": "string" },
                    "content": { "type": "object" }
                },
                "required": ["resource_type", "resource_name", "content"]
            })),
        },
        ToolDefinition {
            name: "delete_resource",
            description: "Delete a resource from the current project.",
            input_schema: with_project_arg(resource_ref_schema()),
        },
        ToolDefinition {
            name: "get_secrets_and_vars",
            description: "Variables and secrets of the current project.",
            input_schema: no_args(),
        },
        ToolDefinition {
            name: "create_variables",
            description: "Create variables in the current project. Fails naming every variable that already exists.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "variables": { "type": "object", "additionalProperties": variable_schema() }
                },
                "required": ["variables"]
            }),
        },
        ToolDefinition {
            name: "update_variables",
            description: "Update existing variables in the current project. Fails naming every variable that does not exist.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "variables": { "type": "object", "additionalProperties": variable_schema() }
                },
                "required": ["variables"]
            }),
        },
        ToolDefinition {
            name: "delete_variables",
            description: "Delete variables from the current project.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "names": { "type": "array", "items": { "type": "string" } }
                },
                "required": ["names"]
            }),
        },
        ToolDefinition {
            name: "create_variable",
            description: "Create one variable in the current project.",
            input_schema: single_variable_schema(),
        },
        ToolDefinition {
            name: "update_variable",
            description: "Update one existing variable in the current project.",
            input_schema: single_variable_schema(),
        },
        ToolDefinition {
            name: "delete_variable",
            description: "Delete one variable from the current project.",
            input_schema: string_props(&[("name", "Variable name")], &["name"]),
        },
        ToolDefinition {
            name: "get_resource_overrides",
            description: "Environment-level overrides of a resource in the current environment.",
            input_schema: resource_ref_schema(),
        },
        ToolDefinition {
            name: "override_resource",
            description: "Replace the override document of a resource in the current environment.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "resource_type": { "type": "string" },
                    "resource_name": { "type": "string" },
                    "override_data": { "type": "object" },
                    "sync": { "type": "boolean", "default": true }
                },
                "required": ["resource_type", "resource_name", "override_data"]
            }),
        },
        ToolDefinition {
            name: "remove_resource_override",
            description: "Remove one dotted property (e.g. spec.replicas) from a resource's overrides, or all overrides when no path is given.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "resource_type": { "type": "string" },
                    "resource_name": { "type": "string" },
                    "property_path": { "type": "string" },
                    "sync": { "type": "boolean", "default": true }
                },
                "required": ["resource_type", "resource_name"]
            }),
        },
        ToolDefinition {
            name: "list_release_streams",
            description: "List release streams.",
            input_schema: no_args(),
        },
        ToolDefinition {
            name: "create_release_stream",
            description: "Create a release stream.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "is_prod": { "type": "boolean", "default": false },
                    "description": { "type": "string", "default": "" }
                },
                "required": ["name"]
            }),
        },
    ];

    tools.extend(
        GUARDED_DEPLOYMENTS
            .iter()
            .map(|(name, release_type)| ToolDefinition {
                name: *name,
                description: deployment_description(*release_type),
                input_schema: deployment_schema(*release_type),
            }),
    );
    tools
}

fn single_variable_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "name": { "type": "string" },
            "value": { "type": "string" },
            "description": { "type": "string" },
            "is_secret": { "type": "boolean" },
            "is_global": { "type": "boolean" }
        },
        "required": ["name"]
    })
}

pub fn is_known_tool(name: &str) -> bool {
    tool_definitions().iter().any(|tool| tool.name == name)
}

fn single_variable(args: &Args) -> Result<Map<String, Value>> {
    let name = required_string(args, "name")?;
    let mut variable = args.clone();
    variable.remove("name");
    Ok(Map::from_iter([(name, Value::Object(variable))]))
}

/// Run one tool against a fresh API handle and the session.
fn project_arg(args: &Args, session: &SessionContext) -> Result<String> {
    let explicit = arg_optional_string(args, "project_name")?;
    resources::target_project(session, explicit.as_deref())
}

pub async fn execute(
    name: &str,
    api: &dyn ControlPlaneApi,
    session: &mut SessionContext,
    args: &Args,
) -> Result<Value> {
    if let Some(release_type) = guarded_release_type(name) {
        let properties = required_object(args, "properties")?;
        return deployments::run_guarded_deployment(api, session, release_type, properties).await;
    }

    match name {
        "get_all_projects" => projects::get_all_projects(api).await,
        "use_project" => {
            let project = required_string(args, "project_name")?;
            projects::use_project(api, session, &project).await
        }
        "get_current_project" => projects::get_current_project(session),
        "refresh_current_project" => projects::refresh_current_project(api, session).await,

        "get_all_environments" => environments::get_all_environments(api, session).await,
        "use_environment" => {
            let environment = required_string(args, "environment_name")?;
            environments::use_environment(api, session, &environment).await
        }
        "get_current_environment_details" => {
            environments::get_current_environment_details(api, session).await
        }
        "check_if_environment_is_running" => {
            environments::check_if_environment_is_running(api, session).await
        }

        "get_deployments" => deployments::get_deployments(api, session).await,
        "get_deployment_details" => {
            let id = required_string(args, "deployment_id")?;
            deployments::get_deployment_details(api, session, &id).await
        }
        "get_deployment_logs" => {
            let id = required_string(args, "deployment_id")?;
            deployments::get_deployment_logs(api, session, &id).await
        }
        "get_latest_deployment" => deployments::get_latest_deployment(api, session).await,
        "get_active_deployments" => deployments::get_active_deployments(api, session).await,
        "get_active_deployment_logs" => {
            deployments::get_active_deployment_logs(api, session).await
        }

        "list_available_resources" => {
            let project = project_arg(args, session)?;
            resources::list_available_resources(api, &project).await
        }
        "get_module_inputs" => {
            let intent = required_string(args, "intent")?;
            let flavor = required_string(args, "flavor")?;
            let project = project_arg(args, session)?;
            resources::get_module_inputs(api, &project, &intent, &flavor).await
        }
        "get_spec_for_module" | "get_sample_for_module" => {
            let intent = required_string(args, "intent")?;
            let flavor = required_string(args, "flavor")?;
            let version = required_string(args, "version")?;
            let project = project_arg(args, session)?;
            if name == "get_spec_for_module" {
                resources::get_spec_for_module(api, session, &project, &intent, &flavor, &version)
                    .await
            } else {
                resources::get_sample_for_module(api, session, &project, &intent, &flavor, &version)
                    .await
            }
        }
        "get_all_resources_by_project" => {
            let project = project_arg(args, session)?;
            resources::get_all_resources_by_project(api, &project).await
        }
        "get_resource_by_project" => {
            let resource_type = required_string(args, "resource_type")?;
            let resource_name = required_string(args, "resource_name")?;
            let project = project_arg(args, session)?;
            resources::get_resource_by_project(api, &project, &resource_type, &resource_name).await
        }
        "get_spec_for_resource" => {
            let resource_type = required_string(args, "resource_type")?;
            let resource_name = required_string(args, "resource_name")?;
            let project = project_arg(args, session)?;
            resources::get_spec_for_resource(api, session, &project, &resource_type, &resource_name)
                .await
        }
        "add_resource" => {
            let resource = NewResource {
                resource_type: required_string(args, "resource_type")?,
                resource_name: required_string(args, "resource_name")?,
                flavor: arg_optional_string(args, "flavor")?,
                version: arg_optional_string(args, "version")?,
                content: arg_optional_object(args, "content")?.unwrap_or_default(),
                inputs: arg_optional_object(args, "inputs")?.unwrap_or_default(),
            };
            let project = project_arg(args, session)?;
            resources::add_resource(api, &project, resource).await
        }
        "update_resource" => {
            let resource_type = required_string(args, "resource_type")?;
            let resource_name = required_string(args, "resource_name")?;
            let content = required_object(args, "content")?;
            let project = project_arg(args, session)?;
            resources::update_resource(api, &project, &resource_type, &resource_name, content)
                .await
        }
        "delete_resource" => {
            let resource_type = required_string(args, "resource_type")?;
            let resource_name = required_string(args, "resource_name")?;
            let project = project_arg(args, session)?;
            resources::delete_resource(api, &project, &resource_type, &resource_name).await
        }

        "get_secrets_and_vars" => variables::get_secrets_and_vars(session),
        "create_variables" => {
            let batch = required_object(args, "variables")?;
            variables::create_variables(api, session, &batch).await
        }
        "update_variables" => {
            let batch = required_object(args, "variables")?;
            variables::update_variables(api, session, &batch).await
        }
        "delete_variables" => {
            let names = required_string_array(args, "names")?;
            variables::delete_variables(api, session, &names).await
        }
        "create_variable" => variables::create_variables(api, session, &single_variable(args)?).await,
        "update_variable" => variables::update_variables(api, session, &single_variable(args)?).await,
        "delete_variable" => {
            let name = required_string(args, "name")?;
            variables::delete_variables(api, session, &[name]).await
        }

        "get_resource_overrides" => {
            let resource_type = required_string(args, "resource_type")?;
            let resource_name = required_string(args, "resource_name")?;
            overrides::get_resource_overrides(api, session, &resource_type, &resource_name).await
        }
        "override_resource" => {
            let resource_type = required_string(args, "resource_type")?;
            let resource_name = required_string(args, "resource_name")?;
            let document = required_object(args, "override_data")?;
            let sync = arg_bool(args, "sync", true)?;
            overrides::override_resource(
                api,
                session,
                &resource_type,
                &resource_name,
                document,
                sync,
            )
            .await
        }
        "remove_resource_override" => {
            let resource_type = required_string(args, "resource_type")?;
            let resource_name = required_string(args, "resource_name")?;
            let path = arg_optional_string(args, "property_path")?;
            let sync = arg_bool(args, "sync", true)?;
            overrides::remove_resource_override(
                api,
                session,
                &resource_type,
                &resource_name,
                path.as_deref(),
                sync,
            )
            .await
        }

        "list_release_streams" => release_streams::list_release_streams(api).await,
        "create_release_stream" => {
            let request = ReleaseStreamRequest {
                name: required_string(args, "name")?,
                description: arg_string(args, "description", "")?,
                prod: arg_bool(args, "is_prod", false)?,
            };
            release_streams::create_release_stream(api, request).await
        }

        _ => Err(ControlPlaneError::validation(
            "name",
            format!("Unknown tool '{name}'"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::testing::{MockControlPlane, environment_wire, metadata, project};

    fn args(value: Value) -> Args {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn tool_names_are_unique_and_schemas_are_objects() {
        let tools = tool_definitions();
        let mut seen = HashSet::new();
        for tool in &tools {
            assert!(seen.insert(tool.name), "duplicate tool {}", tool.name);
            assert_eq!(tool.input_schema["type"], "object", "{}", tool.name);
        }
        assert!(is_known_tool("launch_environment"));
        assert!(!is_known_tool("create_deployment"));
    }

    #[tokio::test]
    async fn every_session_tool_fails_fast_on_empty_session() {
        let api = MockControlPlane::default();
        let session_free = [
            "get_all_projects",
            "use_project",
            "list_release_streams",
            "create_release_stream",
        ];
        for tool in tool_definitions() {
            if session_free.contains(&tool.name) {
                continue;
            }
            let mut session = SessionContext::new();
            let arguments = args(json!({
                "environment_name": "prod",
                "deployment_id": "d-1",
                "intent": "service",
                "flavor": "k8s",
                "version": "0.1",
                "resource_type": "service",
                "resource_name": "api",
                "content": {},
                "override_data": {},
                "variables": { "DB_HOST": { "value": "x" } },
                "names": ["DB_HOST"],
                "name": "DB_HOST",
                "properties": {
                    "releaseType": guarded_release_type(tool.name).map(ReleaseType::as_str),
                    "hotfixResources": [{ "resourceType": "service", "resourceName": "api" }],
                    "overrideBuildSteps": ["plan"],
                    "lockId": "lock-1"
                }
            }));
            let err = execute(tool.name, &api, &mut session, &arguments)
                .await
                .unwrap_err();
            assert_eq!(err.code(), "precondition_failed", "{}", tool.name);
        }
        assert_eq!(api.count(), 0);
    }

    #[tokio::test]
    async fn project_environment_details_flow() {
        let api = MockControlPlane::default();
        api.insert_project(project("shop"));
        *api.environments.lock().unwrap() = vec![environment_wire("c-1", "prod", None)];
        *api.metadata.lock().unwrap() = vec![metadata("c-1", "RUNNING")];
        let mut session = SessionContext::new();

        execute("use_project", &api, &mut session, &args(json!({ "project_name": "shop" })))
            .await
            .unwrap();
        execute(
            "use_environment",
            &api,
            &mut session,
            &args(json!({ "environment_name": "prod" })),
        )
        .await
        .unwrap();
        let details = execute("get_current_environment_details", &api, &mut session, &Map::new())
            .await
            .unwrap();
        assert_eq!(details["cluster_state"], "RUNNING");
    }

    #[tokio::test]
    async fn single_variable_tools_delegate_to_batch() {
        let api = MockControlPlane::default();
        api.insert_project(project("shop"));
        let mut session = SessionContext::new();
        session.set_current_project(project("shop"));

        execute(
            "create_variable",
            &api,
            &mut session,
            &args(json!({ "name": "DB_HOST", "value": "db", "is_secret": false })),
        )
        .await
        .unwrap();
        assert_eq!(
            api.writes()[0].1,
            json!({ "DB_HOST": { "value": "db", "secret": false } })
        );

        let err = execute(
            "create_variable",
            &api,
            &mut session,
            &args(json!({ "name": "DB_HOST", "value": "db2" })),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("DB_HOST"));
    }

    #[tokio::test]
    async fn resource_tools_honour_an_explicit_project() {
        let api = MockControlPlane::default();
        api.insert_project(project("shop"));
        api.insert_project(project("billing"));
        let mut session = SessionContext::new();
        session.set_current_project(project("billing"));

        execute(
            "add_resource",
            &api,
            &mut session,
            &args(json!({
                "project_name": "shop",
                "resource_type": "service",
                "resource_name": "api",
                "flavor": "k8s",
                "version": "0.1",
                "content": {}
            })),
        )
        .await
        .unwrap();
        let writes = api.writes();
        assert_eq!(writes[0].0, "add_resources");
        assert_eq!(writes[0].1["project"], "shop");

        let listing = execute(
            "get_all_resources_by_project",
            &api,
            &mut SessionContext::new(),
            &args(json!({ "project_name": "shop" })),
        )
        .await
        .unwrap();
        assert_eq!(listing["project"], "shop");

        let schema = tool_definitions()
            .into_iter()
            .find(|tool| tool.name == "delete_resource")
            .unwrap()
            .input_schema;
        assert_eq!(schema["properties"]["project_name"]["type"], "string");
    }

    #[tokio::test]
    async fn launch_with_release_type_release_is_rejected() {
        let api = MockControlPlane::default();
        let mut session = SessionContext::new();
        let err = execute(
            "launch_environment",
            &api,
            &mut session,
            &args(json!({ "properties": { "releaseType": "RELEASE" } })),
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Release type must be LAUNCH");
        assert_eq!(api.count(), 0);
    }

    #[tokio::test]
    async fn malformed_arguments_are_validation_errors() {
        let api = MockControlPlane::default();
        let mut session = SessionContext::new();
        let err = execute("use_project", &api, &mut session, &args(json!({ "project_name": 7 })))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "validation_failed");
    }
}
