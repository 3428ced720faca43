//! In-memory control plane used by the runtime's unit tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cpgenie_core::error::{ControlPlaneError, Result};
use cpgenie_core::models::{
    Environment, EnvironmentMetadata, ModuleDetail, ModuleInputSlot, ModuleSummary, Project,
    ReleaseStreamRequest, ResourceFileRequest, WireResource,
};
use serde_json::{Map, Value, json};

use crate::api::{ClientFactory, ControlPlaneApi};

/// Canned responses plus a record of every call and every write body.
#[derive(Default)]
pub struct MockControlPlane {
    pub call_count: AtomicUsize,
    pub calls: Mutex<Vec<String>>,
    pub writes: Mutex<Vec<(String, Value)>>,
    pub projects: Mutex<BTreeMap<String, Project>>,
    pub environments: Mutex<Vec<Value>>,
    pub metadata: Mutex<Vec<EnvironmentMetadata>>,
    pub deployments: Mutex<Vec<Value>>,
    pub resources: Mutex<Vec<WireResource>>,
    pub modules: Mutex<Vec<ModuleSummary>>,
    pub module_details: Mutex<BTreeMap<(String, String, String), ModuleDetail>>,
    pub module_inputs: Mutex<BTreeMap<String, ModuleInputSlot>>,
    pub overrides: Mutex<Value>,
    pub release_streams: Mutex<Vec<Value>>,
    pub me_error: Mutex<Option<ControlPlaneError>>,
}

fn missing(operation: &str) -> ControlPlaneError {
    ControlPlaneError::RemoteCall {
        operation: operation.to_string(),
        status: Some(404),
        message: "HTTP 404 Not Found: <empty body>".to_string(),
    }
}

impl MockControlPlane {
    fn record(&self, call: &str) {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(call.to_string());
    }

    fn write(&self, call: &str, body: Value) {
        self.writes.lock().unwrap().push((call.to_string(), body));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<(String, Value)> {
        self.writes.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn insert_project(&self, project: Project) {
        self.projects
            .lock()
            .unwrap()
            .insert(project.name.clone(), project);
    }

    pub fn insert_module(&self, intent: &str, flavor: &str, version: &str, detail: ModuleDetail) {
        self.module_details.lock().unwrap().insert(
            (intent.to_string(), flavor.to_string(), version.to_string()),
            detail,
        );
    }
}

#[async_trait]
impl ControlPlaneApi for MockControlPlane {
    async fn me(&self) -> Result<Value> {
        self.record("me");
        match self.me_error.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(json!({ "userName": "alice" })),
        }
    }

    async fn list_projects(&self) -> Result<Vec<Value>> {
        self.record("list_projects");
        Ok(self
            .projects
            .lock()
            .unwrap()
            .values()
            .map(|project| json!(project))
            .collect())
    }

    async fn get_project(&self, project: &str) -> Result<Project> {
        self.record("get_project");
        self.projects
            .lock()
            .unwrap()
            .get(project)
            .cloned()
            .ok_or_else(|| missing("get_project"))
    }

    async fn list_environments(&self, _project: &str) -> Result<Vec<Value>> {
        self.record("list_environments");
        Ok(self.environments.lock().unwrap().clone())
    }

    async fn list_environment_metadata(&self, _project: &str) -> Result<Vec<EnvironmentMetadata>> {
        self.record("list_environment_metadata");
        Ok(self.metadata.lock().unwrap().clone())
    }

    async fn list_deployments(&self, _environment_id: &str) -> Result<Value> {
        self.record("list_deployments");
        Ok(json!({ "deployments": self.deployments.lock().unwrap().clone() }))
    }

    async fn get_deployment(&self, _environment_id: &str, deployment_id: &str) -> Result<Value> {
        self.record("get_deployment");
        self.deployments
            .lock()
            .unwrap()
            .iter()
            .find(|deployment| deployment["id"] == deployment_id)
            .cloned()
            .ok_or_else(|| missing("get_deployment"))
    }

    async fn get_deployment_logs(
        &self,
        _environment_id: &str,
        deployment_id: &str,
    ) -> Result<Value> {
        self.record("get_deployment_logs");
        Ok(json!({ "logs": [format!("log line for {deployment_id}")] }))
    }

    async fn create_deployment(
        &self,
        environment_id: &str,
        request: &Map<String, Value>,
    ) -> Result<Value> {
        self.record("create_deployment");
        self.write(
            "create_deployment",
            json!({ "environment": environment_id, "request": request }),
        );
        Ok(json!({ "id": "d-new", "releaseType": request.get("releaseType") }))
    }

    async fn list_resources(&self, _project: &str) -> Result<Vec<WireResource>> {
        self.record("list_resources");
        Ok(self.resources.lock().unwrap().clone())
    }

    async fn get_resource(
        &self,
        _project: &str,
        resource_type: &str,
        resource_name: &str,
    ) -> Result<WireResource> {
        self.record("get_resource");
        self.resources
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.resource_type == resource_type && r.resource_name == resource_name)
            .cloned()
            .ok_or_else(|| missing("get_resource"))
    }

    async fn list_modules(&self, _project: &str) -> Result<Vec<ModuleSummary>> {
        self.record("list_modules");
        Ok(self.modules.lock().unwrap().clone())
    }

    async fn get_module(
        &self,
        _project: &str,
        intent: &str,
        flavor: &str,
        version: &str,
    ) -> Result<ModuleDetail> {
        self.record("get_module");
        self.module_details
            .lock()
            .unwrap()
            .get(&(intent.to_string(), flavor.to_string(), version.to_string()))
            .cloned()
            .ok_or_else(|| missing("get_module"))
    }

    async fn get_module_inputs(
        &self,
        _project: &str,
        _intent: &str,
        _flavor: &str,
    ) -> Result<BTreeMap<String, ModuleInputSlot>> {
        self.record("get_module_inputs");
        Ok(self.module_inputs.lock().unwrap().clone())
    }

    async fn add_resources(
        &self,
        project: &str,
        branch: Option<&str>,
        resources: &[ResourceFileRequest],
    ) -> Result<Value> {
        self.record("add_resources");
        self.write(
            "add_resources",
            json!({ "project": project, "branch": branch, "resources": resources }),
        );
        Ok(Value::Null)
    }

    async fn update_resources(
        &self,
        project: &str,
        branch: Option<&str>,
        resources: &[ResourceFileRequest],
    ) -> Result<Value> {
        self.record("update_resources");
        self.write(
            "update_resources",
            json!({ "project": project, "branch": branch, "resources": resources }),
        );
        Ok(Value::Null)
    }

    async fn delete_resources(
        &self,
        project: &str,
        branch: Option<&str>,
        resources: &[ResourceFileRequest],
    ) -> Result<Value> {
        self.record("delete_resources");
        self.write(
            "delete_resources",
            json!({ "project": project, "branch": branch, "resources": resources }),
        );
        Ok(Value::Null)
    }

    async fn add_variables(&self, project: &str, variables: &Map<String, Value>) -> Result<Value> {
        self.record("add_variables");
        self.write("add_variables", Value::Object(variables.clone()));
        if let Some(stored) = self.projects.lock().unwrap().get_mut(project) {
            for (name, value) in variables {
                stored
                    .cluster_variables_meta
                    .insert(name.clone(), value.clone());
            }
        }
        Ok(Value::Null)
    }

    async fn update_variables(
        &self,
        _project: &str,
        variables: &Map<String, Value>,
    ) -> Result<Value> {
        self.record("update_variables");
        self.write("update_variables", Value::Object(variables.clone()));
        Ok(Value::Null)
    }

    async fn delete_variables(&self, project: &str, names: &[String]) -> Result<Value> {
        self.record("delete_variables");
        self.write("delete_variables", json!(names));
        if let Some(stored) = self.projects.lock().unwrap().get_mut(project) {
            for name in names {
                stored.cluster_variables_meta.remove(name);
            }
        }
        Ok(Value::Null)
    }

    async fn get_resource_override(
        &self,
        _environment_id: &str,
        _resource_type: &str,
        _resource_name: &str,
    ) -> Result<Value> {
        self.record("get_resource_override");
        Ok(json!({ "overrides": self.overrides.lock().unwrap().clone() }))
    }

    async fn set_resource_override(
        &self,
        _environment_id: &str,
        _resource_type: &str,
        _resource_name: &str,
        overrides: Option<&Value>,
        sync: bool,
    ) -> Result<Value> {
        self.record("set_resource_override");
        self.write(
            "set_resource_override",
            json!({ "overrides": overrides, "sync": sync }),
        );
        let stored = overrides.cloned().unwrap_or(Value::Null);
        *self.overrides.lock().unwrap() = stored.clone();
        Ok(json!({ "overrides": stored }))
    }

    async fn list_release_streams(&self) -> Result<Vec<Value>> {
        self.record("list_release_streams");
        Ok(self.release_streams.lock().unwrap().clone())
    }

    async fn create_release_stream(&self, request: &ReleaseStreamRequest) -> Result<Value> {
        self.record("create_release_stream");
        self.write("create_release_stream", json!(request));
        Ok(json!({ "id": "rs-1", "name": request.name }))
    }
}

pub struct MockFactory(pub Arc<MockControlPlane>);

impl ClientFactory for MockFactory {
    fn client(&self) -> Result<Arc<dyn ControlPlaneApi>> {
        let api: Arc<dyn ControlPlaneApi> = self.0.clone();
        Ok(api)
    }
}

pub fn project(name: &str) -> Project {
    Project {
        name: name.to_string(),
        branch: Some("main".to_string()),
        cluster_variables_meta: BTreeMap::new(),
        extra: Map::new(),
    }
}

pub fn environment(id: &str, name: &str) -> Environment {
    Environment {
        id: id.to_string(),
        name: name.to_string(),
        ..Environment::default()
    }
}

pub fn environment_wire(id: &str, name: &str, state: Option<&str>) -> Value {
    json!({
        "id": id,
        "name": name,
        "stackName": "shop",
        "cloud": "AWS",
        "clusterState": state,
        "numberOfVersions": null,
        "variables": { "DB_PASSWORD": "hidden" }
    })
}

pub fn metadata(id: &str, state: &str) -> EnvironmentMetadata {
    EnvironmentMetadata {
        cluster_id: Some(id.to_string()),
        cluster_state: Some(state.to_string()),
    }
}
