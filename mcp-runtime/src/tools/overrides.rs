use cpgenie_core::error::Result;
use cpgenie_core::models::decode_embedded_json;
use cpgenie_core::overrides::{PathRemoval, is_empty_document, remove_property_path};
use serde_json::{Map, Value, json};
use tracing::info;

use crate::api::ControlPlaneApi;
use crate::session::SessionContext;

struct Target {
    environment_id: String,
    environment: String,
    resource_type: String,
    resource_name: String,
}

impl Target {
    fn from_session(
        session: &SessionContext,
        resource_type: &str,
        resource_name: &str,
    ) -> Result<Self> {
        let (_, environment) = session.require_project_and_environment()?;
        Ok(Self {
            environment_id: environment.id.clone(),
            environment: environment.name.clone(),
            resource_type: resource_type.to_string(),
            resource_name: resource_name.to_string(),
        })
    }

    fn context(&self, operation: &str) -> String {
        format!(
            "Failed to {operation} overrides of resource '{}' of type '{}' in environment '{}'",
            self.resource_name, self.resource_type, self.environment
        )
    }

    fn describe(&self) -> String {
        format!(
            "resource '{}' of type '{}' in environment '{}'",
            self.resource_name, self.resource_type, self.environment
        )
    }
}

/// Current override document, or `None` when nothing is overridden.
async fn fetch_overrides(api: &dyn ControlPlaneApi, target: &Target) -> Result<Option<Value>> {
    let body = api
        .get_resource_override(
            &target.environment_id,
            &target.resource_type,
            &target.resource_name,
        )
        .await
        .map_err(|e| e.with_context(target.context("load")))?;
    let document = decode_embedded_json(body.get("overrides").unwrap_or(&Value::Null));
    Ok((!is_empty_document(&document)).then_some(document))
}

async fn write_overrides(
    api: &dyn ControlPlaneApi,
    target: &Target,
    document: Option<&Value>,
    sync: bool,
) -> Result<Value> {
    api.set_resource_override(
        &target.environment_id,
        &target.resource_type,
        &target.resource_name,
        document,
        sync,
    )
    .await
    .map_err(|e| e.with_context(target.context("write")))
}

pub async fn get_resource_overrides(
    api: &dyn ControlPlaneApi,
    session: &SessionContext,
    resource_type: &str,
    resource_name: &str,
) -> Result<Value> {
    let target = Target::from_session(session, resource_type, resource_name)?;
    Ok(match fetch_overrides(api, &target).await? {
        Some(document) => json!({
            "resource_type": resource_type,
            "resource_name": resource_name,
            "environment": target.environment,
            "overrides": document,
        }),
        None => json!({
            "message": format!("No overrides set for {}", target.describe()),
            "overrides": {},
        }),
    })
}

/// Replace the whole override document of a resource.
pub async fn override_resource(
    api: &dyn ControlPlaneApi,
    session: &SessionContext,
    resource_type: &str,
    resource_name: &str,
    document: Map<String, Value>,
    sync: bool,
) -> Result<Value> {
    let target = Target::from_session(session, resource_type, resource_name)?;
    let document = Value::Object(document);
    write_overrides(api, &target, Some(&document), sync).await?;
    info!(environment = %target.environment, resource_type, resource = resource_name, "overrides replaced");
    Ok(json!({
        "message": format!("Overrides updated for {}", target.describe()),
        "overrides": document,
    }))
}

/// Remove one dotted property from the overrides, or all overrides when no
/// path is given. A document left empty is deleted instead of written back.
pub async fn remove_resource_override(
    api: &dyn ControlPlaneApi,
    session: &SessionContext,
    resource_type: &str,
    resource_name: &str,
    property_path: Option<&str>,
    sync: bool,
) -> Result<Value> {
    let target = Target::from_session(session, resource_type, resource_name)?;
    let Some(mut document) = fetch_overrides(api, &target).await? else {
        return Ok(json!({
            "message": format!("No overrides set for {}; nothing to remove", target.describe()),
        }));
    };

    let Some(path) = property_path else {
        write_overrides(api, &target, None, sync).await?;
        info!(environment = %target.environment, resource_type, resource = resource_name, "all overrides removed");
        return Ok(json!({
            "message": format!("Removed all overrides for {}", target.describe()),
        }));
    };

    if remove_property_path(&mut document, path) == PathRemoval::NotFound {
        return Ok(json!({
            "message": format!("Property '{path}' is not overridden for {}", target.describe()),
            "overrides": document,
        }));
    }

    if is_empty_document(&document) {
        write_overrides(api, &target, None, sync).await?;
        info!(environment = %target.environment, resource_type, resource = resource_name, "last override removed");
        return Ok(json!({
            "message": format!(
                "Removed '{path}'; no overrides remain, so all overrides were deleted for {}",
                target.describe()
            ),
        }));
    }

    write_overrides(api, &target, Some(&document), sync).await?;
    info!(environment = %target.environment, resource_type, resource = resource_name, path, "override removed");
    Ok(json!({
        "message": format!("Removed '{path}' from overrides of {}", target.describe()),
        "overrides": document,
    }))
}
