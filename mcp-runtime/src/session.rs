//! Per-session selection of the current project and environment.

use std::collections::HashMap;

use cpgenie_core::error::{ControlPlaneError, Result};
use cpgenie_core::models::{Environment, ModuleDetail, Project};
use serde_json::{Value, json};
use tracing::info;

use crate::api::ControlPlaneApi;

pub const NO_PROJECT_MESSAGE: &str = "No current project is set. Call use_project first.";
pub const NO_ENVIRONMENT_MESSAGE: &str =
    "No current project or environment is set. Call use_project and then use_environment first.";

/// Cache key of a catalog module entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleKey {
    pub project: String,
    pub intent: String,
    pub flavor: String,
    pub version: String,
}

impl ModuleKey {
    pub fn new(project: &str, intent: &str, flavor: &str, version: &str) -> Self {
        Self {
            project: project.to_string(),
            intent: intent.to_string(),
            flavor: flavor.to_string(),
            version: version.to_string(),
        }
    }
}

/// Session state shared by every tool call of one MCP connection.
///
/// The environment always belongs to the current project: selecting a
/// different project drops it.
#[derive(Debug, Default)]
pub struct SessionContext {
    current_project: Option<Project>,
    current_environment: Option<Environment>,
    module_cache: HashMap<ModuleKey, ModuleDetail>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_project(&self) -> Option<&Project> {
        self.current_project.as_ref()
    }

    pub fn current_environment(&self) -> Option<&Environment> {
        self.current_environment.as_ref()
    }

    pub fn set_current_project(&mut self, project: Project) {
        let switched = self
            .current_project
            .as_ref()
            .is_some_and(|current| current.name != project.name);
        if switched && self.current_environment.take().is_some() {
            info!(project = %project.name, "project changed, cleared current environment");
        }
        info!(project = %project.name, "current project set");
        self.current_project = Some(project);
    }

    pub fn set_current_environment(&mut self, environment: Environment) {
        info!(environment = %environment.name, id = %environment.id, "current environment set");
        self.current_environment = Some(environment);
    }

    pub fn is_project_and_environment_set(&self) -> bool {
        self.current_project.is_some() && self.current_environment.is_some()
    }

    pub fn require_project(&self) -> Result<&Project> {
        self.current_project.as_ref().ok_or_else(|| {
            ControlPlaneError::precondition_with_hint(
                NO_PROJECT_MESSAGE,
                "List projects with get_all_projects, then select one with use_project.",
            )
        })
    }

    pub fn require_project_and_environment(&self) -> Result<(&Project, &Environment)> {
        match (&self.current_project, &self.current_environment) {
            (Some(project), Some(environment)) => Ok((project, environment)),
            _ => Err(ControlPlaneError::precondition_with_hint(
                NO_ENVIRONMENT_MESSAGE,
                "Select a project with use_project, list environments with get_all_environments, then call use_environment.",
            )),
        }
    }

    /// Re-fetch the current project so cached variable metadata is fresh.
    /// The current environment is kept since the project name is unchanged.
    pub async fn refresh_current_project(&mut self, api: &dyn ControlPlaneApi) -> Result<&Project> {
        let name = self.require_project()?.name.clone();
        let project = api.get_project(&name).await.map_err(|e| {
            e.with_context(format!("Failed to refresh project '{name}'"))
        })?;
        Ok(self.current_project.insert(project))
    }

    pub fn cached_module(&self, key: &ModuleKey) -> Option<&ModuleDetail> {
        self.module_cache.get(key)
    }

    pub fn cache_module(&mut self, key: ModuleKey, detail: ModuleDetail) {
        self.module_cache.insert(key, detail);
    }

    /// Summary exposed through the session MCP resource.
    pub fn snapshot(&self) -> Value {
        json!({
            "project": self.current_project.as_ref().map(|project| json!({
                "name": project.name,
                "branch": project.branch,
                "variables": project.cluster_variables_meta.keys().collect::<Vec<_>>(),
            })),
            "environment": self.current_environment.as_ref().map(|environment| json!({
                "id": environment.id,
                "name": environment.name,
                "cluster_state": environment.cluster_state,
            })),
            "cached_modules": self.module_cache.len(),
        })
    }
}
