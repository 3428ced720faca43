use cpgenie_core::error::Result;
use cpgenie_core::models::ReleaseStreamRequest;
use serde_json::{Value, json};
use tracing::info;

use crate::api::ControlPlaneApi;

pub async fn list_release_streams(api: &dyn ControlPlaneApi) -> Result<Value> {
    let streams = api
        .list_release_streams()
        .await
        .map_err(|e| e.with_context("Failed to list release streams"))?;
    Ok(json!({ "count": streams.len(), "release_streams": streams }))
}

pub async fn create_release_stream(
    api: &dyn ControlPlaneApi,
    request: ReleaseStreamRequest,
) -> Result<Value> {
    let created = api
        .create_release_stream(&request)
        .await
        .map_err(|e| e.with_context(format!("Failed to create release stream '{}'", request.name)))?;
    info!(name = %request.name, prod = request.prod, "release stream created");
    Ok(json!({
        "message": format!("Release stream '{}' created", request.name),
        "release_stream": created,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockControlPlane;

    #[tokio::test]
    async fn create_sends_prod_flag() {
        let api = MockControlPlane::default();
        create_release_stream(
            &api,
            ReleaseStreamRequest {
                name: "hotfixes".to_string(),
                description: String::new(),
                prod: true,
            },
        )
        .await
        .unwrap();
        assert_eq!(
            api.writes()[0].1,
            json!({ "name": "hotfixes", "description": "", "prod": true })
        );
        assert_eq!(list_release_streams(&api).await.unwrap()["count"], 0);
    }
}
