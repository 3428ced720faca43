//! Wire and tool-facing models for the control-plane API.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::convert::{FieldKind, FieldMapping, WireSchema};

/// Treats an explicit JSON null like an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A project (stack). Fields the tool layer does not interpret are kept in
/// `extra` so they round-trip to the agent unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub name: String,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cluster_variables_meta: BTreeMap<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Project {
    pub fn has_variable(&self, name: &str) -> bool {
        self.cluster_variables_meta.contains_key(name)
    }
}

/// A project variable or secret as the agent sees it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        default,
        alias = "secret",
        alias = "isSecret",
        skip_serializing_if = "Option::is_none"
    )]
    pub is_secret: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(
        default,
        alias = "global",
        alias = "isGlobal",
        skip_serializing_if = "Option::is_none"
    )]
    pub is_global: Option<bool>,
}

impl WireSchema for Variable {
    const NAME: &'static str = "variable";
    const FIELDS: &'static [FieldMapping] = &[
        FieldMapping::new("description", "description", FieldKind::Text),
        FieldMapping::new("is_secret", "secret", FieldKind::Flag),
        FieldMapping::new("value", "value", FieldKind::Text),
        FieldMapping::new("is_global", "global", FieldKind::Flag),
    ];
}

/// An environment (cluster) with every field non-null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub id: String,
    pub name: String,
    pub stack_name: String,
    pub cloud: String,
    pub region: String,
    pub release_stream: String,
    pub cluster_state: String,
    pub cluster_code: String,
    pub tz: String,
    pub base_domain: String,
    pub k8s_version: String,
    pub auto_sign_off_schedule: String,
    pub created_by: String,
    pub last_modified_by: String,
    pub creation_date: String,
    pub last_modified_date: String,
    pub is_ephemeral: bool,
    pub enable_auto_sign_off: bool,
    pub pause_releases: bool,
    pub require_sign_off: bool,
    pub is_schedule_enabled: bool,
    pub number_of_versions: i64,
    pub cost_budget: f64,
}

impl Environment {
    pub fn is_running(&self) -> bool {
        self.cluster_state == RUNNING_STATE
    }
}

pub const RUNNING_STATE: &str = "RUNNING";

impl WireSchema for Environment {
    const NAME: &'static str = "environment";
    const FIELDS: &'static [FieldMapping] = &[
        FieldMapping::new("id", "id", FieldKind::Text),
        FieldMapping::new("name", "name", FieldKind::Text),
        FieldMapping::new("stack_name", "stackName", FieldKind::Text),
        FieldMapping::new("cloud", "cloud", FieldKind::Text),
        FieldMapping::new("region", "region", FieldKind::Text),
        FieldMapping::new("release_stream", "releaseStream", FieldKind::Text),
        FieldMapping::new("cluster_state", "clusterState", FieldKind::Text),
        FieldMapping::new("cluster_code", "clusterCode", FieldKind::Text),
        FieldMapping::new("tz", "tz", FieldKind::Text),
        FieldMapping::new("base_domain", "baseDomain", FieldKind::Text),
        FieldMapping::new("k8s_version", "k8sVersion", FieldKind::Text),
        FieldMapping::new(
            "auto_sign_off_schedule",
            "autoSignOffSchedule",
            FieldKind::Text,
        ),
        FieldMapping::new("created_by", "createdBy", FieldKind::Text),
        FieldMapping::new("last_modified_by", "lastModifiedBy", FieldKind::Text),
        FieldMapping::new("creation_date", "creationDate", FieldKind::Text),
        FieldMapping::new("last_modified_date", "lastModifiedDate", FieldKind::Text),
        FieldMapping::new("is_ephemeral", "ephemeral", FieldKind::Flag),
        FieldMapping::new("enable_auto_sign_off", "enableAutoSignOff", FieldKind::Flag),
        FieldMapping::new("pause_releases", "pauseReleases", FieldKind::Flag),
        FieldMapping::new("require_sign_off", "requireSignOff", FieldKind::Flag),
        FieldMapping::new("is_schedule_enabled", "scheduleEnabled", FieldKind::Flag),
        FieldMapping::new("number_of_versions", "numberOfVersions", FieldKind::Integer),
        FieldMapping::new("cost_budget", "costBudget", FieldKind::Float),
    ];
    // Variable and secret maps carry values agents must not see in listings;
    // the rest are launch internals with no tool counterpart.
    const IGNORED_WIRE_FIELDS: &'static [&'static str] = &[
        "variables",
        "secrets",
        "commonEnvironmentVariables",
        "globalVariables",
        "cloudAccountSecretId",
        "componentVersions",
        "dynamicLaunch",
    ];
}

/// Lifecycle state of one environment, from the per-project metadata list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentMetadata {
    #[serde(default)]
    pub cluster_id: Option<String>,
    #[serde(default)]
    pub cluster_state: Option<String>,
}

/// Kind of deployment the control plane should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReleaseType {
    Launch,
    Destroy,
    HotfixPlan,
    Hotfix,
    FullPlan,
    Release,
    Custom,
    UnlockState,
    ScaleUp,
    ScaleDown,
}

impl ReleaseType {
    pub const ALL: [ReleaseType; 10] = [
        ReleaseType::Launch,
        ReleaseType::Destroy,
        ReleaseType::HotfixPlan,
        ReleaseType::Hotfix,
        ReleaseType::FullPlan,
        ReleaseType::Release,
        ReleaseType::Custom,
        ReleaseType::UnlockState,
        ReleaseType::ScaleUp,
        ReleaseType::ScaleDown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReleaseType::Launch => "LAUNCH",
            ReleaseType::Destroy => "DESTROY",
            ReleaseType::HotfixPlan => "HOTFIX_PLAN",
            ReleaseType::Hotfix => "HOTFIX",
            ReleaseType::FullPlan => "FULL_PLAN",
            ReleaseType::Release => "RELEASE",
            ReleaseType::Custom => "CUSTOM",
            ReleaseType::UnlockState => "UNLOCK_STATE",
            ReleaseType::ScaleUp => "SCALE_UP",
            ReleaseType::ScaleDown => "SCALE_DOWN",
        }
    }
}

impl fmt::Display for ReleaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resource targeted by a hotfix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotfixResource {
    #[serde(alias = "resource_type")]
    pub resource_type: String,
    #[serde(alias = "resource_name")]
    pub resource_name: String,
}

/// Properties of a deployment as supplied by the agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentRequest {
    #[serde(default, alias = "releaseType", skip_serializing_if = "Option::is_none")]
    pub release_type: Option<ReleaseType>,
    #[serde(default, alias = "forceRelease", skip_serializing_if = "Option::is_none")]
    pub force_release: Option<bool>,
    #[serde(default, alias = "allowDestroy", skip_serializing_if = "Option::is_none")]
    pub allow_destroy: Option<bool>,
    #[serde(default, alias = "withRefresh", skip_serializing_if = "Option::is_none")]
    pub with_refresh: Option<bool>,
    #[serde(
        default,
        alias = "hotfixResources",
        skip_serializing_if = "Option::is_none"
    )]
    pub hotfix_resources: Option<Vec<HotfixResource>>,
    #[serde(
        default,
        alias = "overrideBuildSteps",
        skip_serializing_if = "Option::is_none"
    )]
    pub override_build_steps: Option<Vec<String>>,
    #[serde(default, alias = "lockId", skip_serializing_if = "Option::is_none")]
    pub lock_id: Option<String>,
}

impl WireSchema for DeploymentRequest {
    const NAME: &'static str = "deployment request";
    const FIELDS: &'static [FieldMapping] = &[
        FieldMapping::new("release_type", "releaseType", FieldKind::Text),
        FieldMapping::new("force_release", "forceRelease", FieldKind::Flag),
        FieldMapping::new("allow_destroy", "allowDestroy", FieldKind::Flag),
        FieldMapping::new("with_refresh", "withRefresh", FieldKind::Flag),
        FieldMapping::new("hotfix_resources", "hotfixResources", FieldKind::List),
        FieldMapping::new("override_build_steps", "overrideBuildSteps", FieldKind::List),
        FieldMapping::new("lock_id", "lockId", FieldKind::Text),
    ];
}

/// Location and info block of a resource as returned by the API.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireResource {
    pub resource_name: String,
    pub resource_type: String,
    #[serde(default)]
    pub directory: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    /// JSON document, usually delivered as an encoded string.
    #[serde(default)]
    pub content: Value,
    #[serde(default)]
    pub info: Option<ResourceInfo>,
}

impl WireResource {
    /// The resource document as JSON, decoding string-encoded content.
    pub fn content_json(&self) -> Value {
        decode_embedded_json(&self.content)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInfo {
    #[serde(default, alias = "flavor")]
    pub flavour: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub ui_metadata: Option<Value>,
}

/// Tool-facing resource view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceView {
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub directory: Option<String>,
    pub filename: Option<String>,
    pub content: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<ResourceInfoView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceInfoView {
    pub flavor: Option<String>,
    pub version: Option<String>,
    pub ui_metadata: Option<Value>,
}

impl From<&WireResource> for ResourceView {
    fn from(resource: &WireResource) -> Self {
        Self {
            name: resource.resource_name.clone(),
            resource_type: resource.resource_type.clone(),
            directory: resource.directory.clone(),
            filename: resource.filename.clone(),
            content: resource.content_json(),
            info: resource.info.as_ref().map(|info| ResourceInfoView {
                flavor: info.flavour.clone(),
                version: info.version.clone(),
                ui_metadata: info.ui_metadata.clone(),
            }),
        }
    }
}

/// Body element of the blueprint resource create/update/delete calls.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceFileRequest {
    pub resource_name: String,
    pub resource_type: String,
    pub content: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flavor: Option<String>,
}

/// Catalog entry listing for a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleSummary {
    pub intent: String,
    #[serde(alias = "flavour")]
    pub flavor: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Full catalog entry with the spec schema and sample document.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleDetail {
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default, alias = "flavour")]
    pub flavor: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub spec: Value,
    #[serde(default, alias = "sample")]
    pub sample_json: Value,
}

impl ModuleDetail {
    pub fn spec_json(&self) -> Value {
        decode_embedded_json(&self.spec)
    }

    pub fn sample(&self) -> Value {
        decode_embedded_json(&self.sample_json)
    }
}

/// One declared input of a module and the existing resources that satisfy it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleInputSlot {
    #[serde(default)]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub compatible_resources: Vec<CompatibleResource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibleResource {
    #[serde(alias = "resource_name")]
    pub resource_name: String,
    #[serde(alias = "resource_type")]
    pub resource_type: String,
    #[serde(default, alias = "output_name", skip_serializing_if = "Option::is_none")]
    pub output_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReleaseStreamRequest {
    pub name: String,
    pub description: String,
    pub prod: bool,
}

/// Decode a JSON document that the API may embed as a string.
/// Strings that are not valid JSON are returned unchanged.
pub fn decode_embedded_json(value: &Value) -> Value {
    match value {
        Value::String(raw) if raw.trim().is_empty() => Value::Null,
        Value::String(raw) => serde_json::from_str(raw).unwrap_or_else(|_| value.clone()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn project_tolerates_null_variable_map_and_keeps_extra_fields() {
        let project: Project = serde_json::from_value(json!({
            "name": "shop",
            "branch": "main",
            "clusterVariablesMeta": null,
            "vcsUrl": "git@example.com:shop.git"
        }))
        .unwrap();
        assert!(project.cluster_variables_meta.is_empty());
        assert_eq!(project.extra["vcsUrl"], "git@example.com:shop.git");
    }

    #[test]
    fn environment_metadata_tolerates_a_missing_cluster_id() {
        let entries: Vec<EnvironmentMetadata> = serde_json::from_value(json!([
            { "clusterId": null, "clusterState": "RUNNING" },
            { "clusterId": "c-1" }
        ]))
        .unwrap();
        assert_eq!(entries[0].cluster_id, None);
        assert_eq!(entries[1].cluster_id.as_deref(), Some("c-1"));
        assert_eq!(entries[1].cluster_state, None);
    }

    #[test]
    fn variable_accepts_wire_and_camel_case_aliases() {
        let from_wire: Variable =
            serde_json::from_value(json!({ "secret": true, "global": false })).unwrap();
        let from_camel: Variable =
            serde_json::from_value(json!({ "isSecret": true, "isGlobal": false })).unwrap();
        assert_eq!(from_wire, from_camel);
        assert_eq!(from_wire.is_secret, Some(true));
    }

    #[test]
    fn deployment_request_accepts_camel_case_properties() {
        let request: DeploymentRequest = serde_json::from_value(json!({
            "releaseType": "UNLOCK_STATE",
            "lockId": "lock-42",
            "hotfixResources": [{ "resourceType": "service", "resourceName": "api" }]
        }))
        .unwrap();
        assert_eq!(request.release_type, Some(ReleaseType::UnlockState));
        assert_eq!(request.lock_id.as_deref(), Some("lock-42"));
        assert_eq!(request.hotfix_resources.unwrap()[0].resource_name, "api");
    }

    #[test]
    fn release_type_strings_match_serde_names() {
        for release_type in ReleaseType::ALL {
            assert_eq!(
                serde_json::to_value(release_type).unwrap(),
                json!(release_type.as_str())
            );
        }
    }

    #[test]
    fn resource_view_decodes_string_content_and_info() {
        let wire: WireResource = serde_json::from_value(json!({
            "resourceName": "api",
            "resourceType": "service",
            "directory": "service",
            "filename": "api.json",
            "content": "{\"kind\":\"service\",\"spec\":{\"replicas\":2}}",
            "info": { "flavour": "k8s", "version": "0.1", "uiMetadata": null }
        }))
        .unwrap();
        let view = ResourceView::from(&wire);
        assert_eq!(view.content["spec"]["replicas"], 2);
        assert_eq!(view.info.unwrap().flavor.as_deref(), Some("k8s"));
    }

    #[test]
    fn decode_embedded_json_keeps_plain_strings() {
        assert_eq!(decode_embedded_json(&json!("not json")), json!("not json"));
        assert_eq!(decode_embedded_json(&json!("")), Value::Null);
        assert_eq!(decode_embedded_json(&json!({"a": 1})), json!({"a": 1}));
    }
}
