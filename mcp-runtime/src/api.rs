//! Typed access to the control-plane REST API.
//!
//! Tool handlers only see [`ControlPlaneApi`]; [`HttpControlPlaneClient`] is
//! the production implementation. A [`ClientFactory`] hands out a fresh handle
//! per tool call so no call ever shares mutable client state with another.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use cpgenie_core::config::Configuration;
use cpgenie_core::error::{ControlPlaneError, Result};
use cpgenie_core::models::{
    EnvironmentMetadata, ModuleDetail, ModuleInputSlot, ModuleSummary, Project,
    ReleaseStreamRequest, ResourceFileRequest, WireResource,
};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};
use url::Url;

const UI_PREFIX: [&str; 2] = ["cc-ui", "v1"];
const ERROR_BODY_PREVIEW_CHARS: usize = 400;

#[async_trait]
pub trait ControlPlaneApi: Send + Sync {
    /// Identity of the configured user.
    async fn me(&self) -> Result<Value>;

    async fn list_projects(&self) -> Result<Vec<Value>>;
    async fn get_project(&self, project: &str) -> Result<Project>;

    /// Raw (wire) environments of a project.
    async fn list_environments(&self, project: &str) -> Result<Vec<Value>>;
    async fn list_environment_metadata(&self, project: &str) -> Result<Vec<EnvironmentMetadata>>;

    async fn list_deployments(&self, environment_id: &str) -> Result<Value>;
    async fn get_deployment(&self, environment_id: &str, deployment_id: &str) -> Result<Value>;
    async fn get_deployment_logs(&self, environment_id: &str, deployment_id: &str)
    -> Result<Value>;
    async fn create_deployment(
        &self,
        environment_id: &str,
        request: &Map<String, Value>,
    ) -> Result<Value>;

    async fn list_resources(&self, project: &str) -> Result<Vec<WireResource>>;
    async fn get_resource(
        &self,
        project: &str,
        resource_type: &str,
        resource_name: &str,
    ) -> Result<WireResource>;

    async fn list_modules(&self, project: &str) -> Result<Vec<ModuleSummary>>;
    async fn get_module(
        &self,
        project: &str,
        intent: &str,
        flavor: &str,
        version: &str,
    ) -> Result<ModuleDetail>;
    async fn get_module_inputs(
        &self,
        project: &str,
        intent: &str,
        flavor: &str,
    ) -> Result<BTreeMap<String, ModuleInputSlot>>;

    async fn add_resources(
        &self,
        project: &str,
        branch: Option<&str>,
        resources: &[ResourceFileRequest],
    ) -> Result<Value>;
    async fn update_resources(
        &self,
        project: &str,
        branch: Option<&str>,
        resources: &[ResourceFileRequest],
    ) -> Result<Value>;
    async fn delete_resources(
        &self,
        project: &str,
        branch: Option<&str>,
        resources: &[ResourceFileRequest],
    ) -> Result<Value>;

    async fn add_variables(&self, project: &str, variables: &Map<String, Value>) -> Result<Value>;
    async fn update_variables(&self, project: &str, variables: &Map<String, Value>)
    -> Result<Value>;
    async fn delete_variables(&self, project: &str, names: &[String]) -> Result<Value>;

    async fn get_resource_override(
        &self,
        environment_id: &str,
        resource_type: &str,
        resource_name: &str,
    ) -> Result<Value>;
    /// Replace the override document; `None` deletes all overrides.
    async fn set_resource_override(
        &self,
        environment_id: &str,
        resource_type: &str,
        resource_name: &str,
        overrides: Option<&Value>,
        sync: bool,
    ) -> Result<Value>;

    async fn list_release_streams(&self) -> Result<Vec<Value>>;
    async fn create_release_stream(&self, request: &ReleaseStreamRequest) -> Result<Value>;
}

/// Source of API handles for tool calls.
pub trait ClientFactory: Send + Sync {
    fn client(&self) -> Result<Arc<dyn ControlPlaneApi>>;
}

/// Builds [`HttpControlPlaneClient`]s from the resolved configuration.
#[derive(Debug, Clone, Default)]
pub struct HttpClientFactory {
    config: Option<Configuration>,
}

impl HttpClientFactory {
    pub fn new(config: Configuration) -> Self {
        Self {
            config: Some(config),
        }
    }

    /// A factory that refuses to build clients until configured.
    pub fn unconfigured() -> Self {
        Self::default()
    }

    pub fn configuration(&self) -> Option<&Configuration> {
        self.config.as_ref()
    }
}

impl ClientFactory for HttpClientFactory {
    fn client(&self) -> Result<Arc<dyn ControlPlaneApi>> {
        let config = self.config.clone().ok_or_else(|| {
            ControlPlaneError::Configuration(
                "Client configuration not set; resolve the connection settings before calling the control plane"
                    .to_string(),
            )
        })?;
        Ok(Arc::new(HttpControlPlaneClient::new(config)))
    }
}

/// Basic-auth JSON client for the control-plane REST API.
#[derive(Debug, Clone)]
pub struct HttpControlPlaneClient {
    config: Configuration,
    http: reqwest::Client,
}

impl HttpControlPlaneClient {
    pub fn new(config: Configuration) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, segments: &[&str], query: &[(&str, String)]) -> Result<Url> {
        let mut url = Url::parse(&self.config.api_base_url).map_err(|e| {
            ControlPlaneError::Configuration(format!(
                "Invalid control plane URL '{}': {e}",
                self.config.api_base_url
            ))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                ControlPlaneError::Configuration(format!(
                    "Control plane URL '{}' cannot carry a path",
                    self.config.api_base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<Value> {
        let operation = format!("{method} /{}", segments.join("/"));
        let url = self.url(segments, query)?;

        let mut request = self
            .http
            .request(method, url)
            .basic_auth(&self.config.username, Some(&self.config.token))
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(body) = body {
            request = request.json(&body);
        }

        debug!(%operation, "control plane request");
        let response = request.send().await.map_err(|e| ControlPlaneError::RemoteCall {
            operation: operation.clone(),
            status: None,
            message: format!(
                "Failed to reach control plane at {}: {e}",
                self.config.api_base_url
            ),
        })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| ControlPlaneError::RemoteCall {
            operation: operation.clone(),
            status: Some(status.as_u16()),
            message: format!("Failed to read response body: {e}"),
        })?;
        let body = parse_response_body(&bytes);

        if !status.is_success() {
            warn!(%operation, status = status.as_u16(), "control plane request failed");
            return Err(ControlPlaneError::RemoteCall {
                operation,
                status: Some(status.as_u16()),
                message: format!("HTTP {status}: {}", preview_body(&body)),
            });
        }
        Ok(body)
    }

    async fn send_as<T: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<T> {
        let operation = format!("{method} /{}", segments.join("/"));
        let value = self.send(method, segments, query, body).await?;
        serde_json::from_value(value).map_err(|e| ControlPlaneError::RemoteCall {
            operation,
            status: None,
            message: format!("Unexpected response shape: {e}"),
        })
    }
}

fn ui_path<'a>(rest: &[&'a str]) -> Vec<&'a str> {
    UI_PREFIX.iter().copied().chain(rest.iter().copied()).collect()
}

fn branch_query(branch: Option<&str>) -> Vec<(&'static str, String)> {
    branch
        .map(|branch| vec![("branch", branch.to_string())])
        .unwrap_or_default()
}

#[async_trait]
impl ControlPlaneApi for HttpControlPlaneClient {
    async fn me(&self) -> Result<Value> {
        self.send(Method::GET, &["api", "me"], &[], None).await
    }

    async fn list_projects(&self) -> Result<Vec<Value>> {
        self.send_as(Method::GET, &ui_path(&["stacks"]), &[], None)
            .await
    }

    async fn get_project(&self, project: &str) -> Result<Project> {
        self.send_as(Method::GET, &ui_path(&["stacks", project]), &[], None)
            .await
    }

    async fn list_environments(&self, project: &str) -> Result<Vec<Value>> {
        self.send_as(
            Method::GET,
            &ui_path(&["stacks", project, "clusters"]),
            &[],
            None,
        )
        .await
    }

    async fn list_environment_metadata(&self, project: &str) -> Result<Vec<EnvironmentMetadata>> {
        self.send_as(
            Method::GET,
            &ui_path(&["stacks", project, "cluster-metadata"]),
            &[],
            None,
        )
        .await
    }

    async fn list_deployments(&self, environment_id: &str) -> Result<Value> {
        self.send(
            Method::GET,
            &ui_path(&["clusters", environment_id, "deployments"]),
            &[],
            None,
        )
        .await
    }

    async fn get_deployment(&self, environment_id: &str, deployment_id: &str) -> Result<Value> {
        self.send(
            Method::GET,
            &ui_path(&["clusters", environment_id, "deployments", deployment_id]),
            &[],
            None,
        )
        .await
    }

    async fn get_deployment_logs(
        &self,
        environment_id: &str,
        deployment_id: &str,
    ) -> Result<Value> {
        self.send(
            Method::GET,
            &ui_path(&[
                "clusters",
                environment_id,
                "deployments",
                deployment_id,
                "logs",
            ]),
            &[],
            None,
        )
        .await
    }

    async fn create_deployment(
        &self,
        environment_id: &str,
        request: &Map<String, Value>,
    ) -> Result<Value> {
        self.send(
            Method::POST,
            &ui_path(&["clusters", environment_id, "deployments"]),
            &[],
            Some(Value::Object(request.clone())),
        )
        .await
    }

    async fn list_resources(&self, project: &str) -> Result<Vec<WireResource>> {
        self.send_as(
            Method::GET,
            &ui_path(&["dropdown", "stack", project, "resources-info"]),
            &[("includeContent", "true".to_string())],
            None,
        )
        .await
    }

    async fn get_resource(
        &self,
        project: &str,
        resource_type: &str,
        resource_name: &str,
    ) -> Result<WireResource> {
        self.send_as(
            Method::GET,
            &ui_path(&["dropdown", "stack", project, "resource-by-stack"]),
            &[
                ("resourceType", resource_type.to_string()),
                ("resourceName", resource_name.to_string()),
            ],
            None,
        )
        .await
    }

    async fn list_modules(&self, project: &str) -> Result<Vec<ModuleSummary>> {
        self.send_as(
            Method::GET,
            &ui_path(&["modules", "stack", project, "available"]),
            &[],
            None,
        )
        .await
    }

    async fn get_module(
        &self,
        project: &str,
        intent: &str,
        flavor: &str,
        version: &str,
    ) -> Result<ModuleDetail> {
        self.send_as(
            Method::GET,
            &ui_path(&[
                "modules", "stack", project, "intent", intent, "flavor", flavor, "version",
                version,
            ]),
            &[],
            None,
        )
        .await
    }

    async fn get_module_inputs(
        &self,
        project: &str,
        intent: &str,
        flavor: &str,
    ) -> Result<BTreeMap<String, ModuleInputSlot>> {
        self.send_as(
            Method::GET,
            &ui_path(&[
                "modules", "stack", project, "intent", intent, "flavor", flavor, "inputs",
            ]),
            &[],
            None,
        )
        .await
    }

    async fn add_resources(
        &self,
        project: &str,
        branch: Option<&str>,
        resources: &[ResourceFileRequest],
    ) -> Result<Value> {
        self.send(
            Method::POST,
            &ui_path(&["blueprint", project, "resources"]),
            &branch_query(branch),
            Some(json!(resources)),
        )
        .await
    }

    async fn update_resources(
        &self,
        project: &str,
        branch: Option<&str>,
        resources: &[ResourceFileRequest],
    ) -> Result<Value> {
        self.send(
            Method::PUT,
            &ui_path(&["blueprint", project, "resources"]),
            &branch_query(branch),
            Some(json!(resources)),
        )
        .await
    }

    async fn delete_resources(
        &self,
        project: &str,
        branch: Option<&str>,
        resources: &[ResourceFileRequest],
    ) -> Result<Value> {
        self.send(
            Method::DELETE,
            &ui_path(&["blueprint", project, "resources"]),
            &branch_query(branch),
            Some(json!(resources)),
        )
        .await
    }

    async fn add_variables(&self, project: &str, variables: &Map<String, Value>) -> Result<Value> {
        self.send(
            Method::POST,
            &ui_path(&["blueprint", project, "variables"]),
            &[],
            Some(Value::Object(variables.clone())),
        )
        .await
    }

    async fn update_variables(
        &self,
        project: &str,
        variables: &Map<String, Value>,
    ) -> Result<Value> {
        self.send(
            Method::PUT,
            &ui_path(&["blueprint", project, "variables"]),
            &[],
            Some(Value::Object(variables.clone())),
        )
        .await
    }

    async fn delete_variables(&self, project: &str, names: &[String]) -> Result<Value> {
        self.send(
            Method::DELETE,
            &ui_path(&["blueprint", project, "variables"]),
            &[],
            Some(json!(names)),
        )
        .await
    }

    async fn get_resource_override(
        &self,
        environment_id: &str,
        resource_type: &str,
        resource_name: &str,
    ) -> Result<Value> {
        self.send(
            Method::GET,
            &ui_path(&[
                "clusters",
                environment_id,
                "overrides",
                resource_type,
                resource_name,
            ]),
            &[],
            None,
        )
        .await
    }

    async fn set_resource_override(
        &self,
        environment_id: &str,
        resource_type: &str,
        resource_name: &str,
        overrides: Option<&Value>,
        sync: bool,
    ) -> Result<Value> {
        // The API stores the override document as an encoded JSON string.
        let body = json!({ "overrides": overrides.map(Value::to_string) });
        self.send(
            Method::POST,
            &ui_path(&[
                "clusters",
                environment_id,
                "overrides",
                resource_type,
                resource_name,
            ]),
            &[("doSync", sync.to_string())],
            Some(body),
        )
        .await
    }

    async fn list_release_streams(&self) -> Result<Vec<Value>> {
        self.send_as(Method::GET, &ui_path(&["release-stream"]), &[], None)
            .await
    }

    async fn create_release_stream(&self, request: &ReleaseStreamRequest) -> Result<Value> {
        self.send(
            Method::POST,
            &ui_path(&["release-stream"]),
            &[],
            Some(json!(request)),
        )
        .await
    }
}

pub(crate) fn parse_response_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).to_string()))
}

fn preview_body(body: &Value) -> String {
    let text = match body {
        Value::String(text) => text.clone(),
        Value::Null => "<empty body>".to_string(),
        other => other.to_string(),
    };
    if text.chars().count() > ERROR_BODY_PREVIEW_CHARS {
        let head: String = text.chars().take(ERROR_BODY_PREVIEW_CHARS).collect();
        format!("{head}...")
    } else {
        text
    }
}
