use cpgenie_core::convert::to_tool_model;
use cpgenie_core::error::{ControlPlaneError, Result};
use cpgenie_core::models::Environment;
use serde_json::{Value, json};
use tracing::debug;

use crate::api::ControlPlaneApi;
use crate::session::SessionContext;

async fn load_environments(api: &dyn ControlPlaneApi, project: &str) -> Result<Vec<Environment>> {
    let wire = api
        .list_environments(project)
        .await
        .map_err(|e| e.with_context(format!("Failed to list environments of project '{project}'")))?;
    wire.iter().map(to_tool_model::<Environment>).collect()
}

pub async fn get_all_environments(
    api: &dyn ControlPlaneApi,
    session: &SessionContext,
) -> Result<Value> {
    let project = session.require_project()?.name.clone();
    let environments = load_environments(api, &project).await?;
    Ok(json!({
        "project": project,
        "count": environments.len(),
        "environments": environments,
    }))
}

pub async fn use_environment(
    api: &dyn ControlPlaneApi,
    session: &mut SessionContext,
    environment_name: &str,
) -> Result<Value> {
    let project = session.require_project()?.name.clone();
    let environment = load_environments(api, &project)
        .await?
        .into_iter()
        .find(|environment| environment.name == environment_name)
        .ok_or_else(|| ControlPlaneError::NotFound {
            entity: "environment",
            name: environment_name.to_string(),
            scope: Some(format!("project '{project}'")),
        })?;
    let id = environment.id.clone();
    session.set_current_environment(environment);
    Ok(json!({
        "message": format!("Current environment set to '{environment_name}'"),
        "environment": { "id": id, "name": environment_name, "project": project },
    }))
}

/// Re-read the current environment and merge its lifecycle state from the
/// metadata listing. When metadata has no entry for the environment the state
/// keeps its previous value. The refreshed record replaces the session copy.
pub(crate) async fn refresh_current_environment(
    api: &dyn ControlPlaneApi,
    session: &mut SessionContext,
) -> Result<Environment> {
    let (project, cached) = {
        let (project, environment) = session.require_project_and_environment()?;
        (project.name.clone(), environment.clone())
    };

    let mut environment = load_environments(api, &project)
        .await?
        .into_iter()
        .find(|environment| environment.id == cached.id)
        .ok_or_else(|| ControlPlaneError::NotFound {
            entity: "environment",
            name: cached.name.clone(),
            scope: Some(format!("project '{project}'")),
        })?;

    let metadata = api.list_environment_metadata(&project).await.map_err(|e| {
        e.with_context(format!(
            "Failed to load environment metadata of project '{project}'"
        ))
    })?;
    match metadata
        .iter()
        .find(|entry| entry.cluster_id.as_deref() == Some(environment.id.as_str()))
        .and_then(|entry| entry.cluster_state.clone())
    {
        Some(state) => environment.cluster_state = state,
        None => {
            debug!(environment = %environment.id, "no lifecycle metadata, keeping previous state");
            if environment.cluster_state.is_empty() {
                environment.cluster_state = cached.cluster_state;
            }
        }
    }

    session.set_current_environment(environment.clone());
    Ok(environment)
}

pub async fn get_current_environment_details(
    api: &dyn ControlPlaneApi,
    session: &mut SessionContext,
) -> Result<Value> {
    let environment = refresh_current_environment(api, session).await?;
    Ok(json!(environment))
}

pub async fn check_if_environment_is_running(
    api: &dyn ControlPlaneApi,
    session: &mut SessionContext,
) -> Result<Value> {
    let environment = refresh_current_environment(api, session).await?;
    Ok(json!({
        "environment": environment.name,
        "cluster_state": environment.cluster_state,
        "running": environment.is_running(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockControlPlane, environment_wire, metadata, project};

    fn api_with_prod() -> MockControlPlane {
        let api = MockControlPlane::default();
        api.insert_project(project("shop"));
        *api.environments.lock().unwrap() = vec![
            environment_wire("c-1", "prod", None),
            environment_wire("c-2", "staging", Some("STOPPED")),
        ];
        api
    }

    fn session_with_project() -> SessionContext {
        let mut session = SessionContext::new();
        session.set_current_project(project("shop"));
        session
    }

    #[tokio::test]
    async fn environments_are_zero_filled_and_hide_variables() {
        let api = api_with_prod();
        let listing = get_all_environments(&api, &session_with_project())
            .await
            .unwrap();
        assert_eq!(listing["count"], 2);
        let prod = &listing["environments"][0];
        assert_eq!(prod["cluster_state"], "");
        assert_eq!(prod["number_of_versions"], 0);
        assert!(prod.get("variables").is_none());
    }

    #[tokio::test]
    async fn listing_without_project_makes_no_call() {
        let api = api_with_prod();
        let err = get_all_environments(&api, &SessionContext::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "precondition_failed");
        assert_eq!(api.count(), 0);
    }

    #[tokio::test]
    async fn unknown_environment_names_the_project() {
        let api = api_with_prod();
        let mut session = session_with_project();
        let err = use_environment(&api, &mut session, "qa").await.unwrap_err();
        assert_eq!(err.to_string(), "environment 'qa' not found in project 'shop'");
        assert!(session.current_environment().is_none());
    }

    #[tokio::test]
    async fn details_merge_state_from_metadata() {
        let api = api_with_prod();
        *api.metadata.lock().unwrap() = vec![metadata("c-1", "RUNNING")];
        let mut session = session_with_project();
        use_environment(&api, &mut session, "prod").await.unwrap();

        let details = get_current_environment_details(&api, &mut session)
            .await
            .unwrap();
        assert_eq!(details["cluster_state"], "RUNNING");
        assert_eq!(details["name"], "prod");
        assert!(session.current_environment().unwrap().is_running());
        assert_eq!(
            api.calls(),
            vec![
                "list_environments",
                "list_environments",
                "list_environment_metadata"
            ]
        );
    }

    #[tokio::test]
    async fn details_keep_state_when_metadata_lacks_the_environment() {
        let api = api_with_prod();
        *api.metadata.lock().unwrap() = vec![metadata("c-9", "RUNNING")];
        let mut session = session_with_project();
        use_environment(&api, &mut session, "prod").await.unwrap();

        let details = get_current_environment_details(&api, &mut session)
            .await
            .unwrap();
        assert_eq!(details["cluster_state"], "");

        let running = check_if_environment_is_running(&api, &mut session)
            .await
            .unwrap();
        assert_eq!(running["running"], false);
    }

    #[tokio::test]
    async fn metadata_entries_without_an_id_are_skipped() {
        let api = api_with_prod();
        let listing: Vec<cpgenie_core::models::EnvironmentMetadata> = serde_json::from_value(json!([
            { "clusterId": null, "clusterState": "STOPPED" },
            { "clusterState": "STOPPED" },
            { "clusterId": "c-1", "clusterState": "RUNNING" }
        ]))
        .unwrap();
        *api.metadata.lock().unwrap() = listing;
        let mut session = session_with_project();
        use_environment(&api, &mut session, "prod").await.unwrap();

        let details = get_current_environment_details(&api, &mut session)
            .await
            .unwrap();
        assert_eq!(details["cluster_state"], "RUNNING");
    }
}
