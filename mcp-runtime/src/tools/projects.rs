use cpgenie_core::error::{ControlPlaneError, Result};
use cpgenie_core::models::Project;
use serde_json::{Value, json};

use crate::api::ControlPlaneApi;
use crate::session::SessionContext;

/// Maps a 404 from a lookup call to a not-found error naming the entity.
pub(crate) fn not_found_on_404(
    err: ControlPlaneError,
    entity: &'static str,
    name: &str,
    scope: Option<String>,
) -> ControlPlaneError {
    match err {
        ControlPlaneError::RemoteCall {
            status: Some(404), ..
        } => ControlPlaneError::NotFound {
            entity,
            name: name.to_string(),
            scope,
        },
        other => other,
    }
}

fn project_summary(project: &Project) -> Value {
    let mut summary = json!({
        "name": project.name,
        "branch": project.branch,
        "variables": project.cluster_variables_meta.keys().collect::<Vec<_>>(),
    });
    for (key, value) in &project.extra {
        summary[key.as_str()] = value.clone();
    }
    summary
}

pub async fn get_all_projects(api: &dyn ControlPlaneApi) -> Result<Value> {
    let projects = api
        .list_projects()
        .await
        .map_err(|e| e.with_context("Failed to list projects"))?;
    let names: Vec<Value> = projects
        .iter()
        .map(|project| {
            json!({
                "name": project.get("name").cloned().unwrap_or(Value::Null),
                "branch": project.get("branch").cloned().unwrap_or(Value::Null),
            })
        })
        .collect();
    Ok(json!({ "count": names.len(), "projects": names }))
}

pub async fn use_project(
    api: &dyn ControlPlaneApi,
    session: &mut SessionContext,
    project_name: &str,
) -> Result<Value> {
    let project = api
        .get_project(project_name)
        .await
        .map_err(|e| not_found_on_404(e, "project", project_name, None))
        .map_err(|e| e.with_context(format!("Failed to load project '{project_name}'")))?;
    let summary = project_summary(&project);
    session.set_current_project(project);
    Ok(json!({
        "message": format!("Current project set to '{project_name}'"),
        "project": summary,
    }))
}

pub fn get_current_project(session: &SessionContext) -> Result<Value> {
    let project = session.require_project()?;
    Ok(json!({
        "project": project_summary(project),
        "environment": session.current_environment().map(|environment| json!({
            "id": environment.id,
            "name": environment.name,
        })),
    }))
}

pub async fn refresh_current_project(
    api: &dyn ControlPlaneApi,
    session: &mut SessionContext,
) -> Result<Value> {
    let project = session.refresh_current_project(api).await?;
    Ok(json!({
        "message": format!("Project '{}' refreshed", project.name),
        "project": project_summary(project),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockControlPlane, environment, project};

    #[tokio::test]
    async fn get_all_projects_lists_names() {
        let api = MockControlPlane::default();
        api.insert_project(project("shop"));
        api.insert_project(project("billing"));
        let listing = get_all_projects(&api).await.unwrap();
        assert_eq!(listing["count"], 2);
        assert_eq!(listing["projects"][0]["name"], "billing");
    }

    #[tokio::test]
    async fn use_project_sets_session_and_unknown_project_is_not_found() {
        let api = MockControlPlane::default();
        api.insert_project(project("shop"));
        let mut session = SessionContext::new();

        use_project(&api, &mut session, "shop").await.unwrap();
        assert_eq!(session.current_project().unwrap().name, "shop");

        let err = use_project(&api, &mut session, "ghost").await.unwrap_err();
        assert!(matches!(err, ControlPlaneError::NotFound { entity: "project", .. }));
        assert_eq!(session.current_project().unwrap().name, "shop");
    }

    #[tokio::test]
    async fn switching_project_through_tool_drops_environment() {
        let api = MockControlPlane::default();
        api.insert_project(project("shop"));
        api.insert_project(project("billing"));
        let mut session = SessionContext::new();
        use_project(&api, &mut session, "shop").await.unwrap();
        session.set_current_environment(environment("c-1", "prod"));

        use_project(&api, &mut session, "billing").await.unwrap();
        assert!(session.current_environment().is_none());
    }

    #[test]
    fn current_project_requires_selection() {
        let session = SessionContext::new();
        let err = get_current_project(&session).unwrap_err();
        assert_eq!(err.code(), "precondition_failed");
    }
}
