use std::sync::Arc;

use cpgenie_mcp_runtime::ConnectionArgs;
use cpgenie_mcp_runtime::api::{ClientFactory, HttpClientFactory};
use cpgenie_mcp_runtime::tools::projects::get_all_projects;

use crate::util::{print_json, report_error, resolve_config};

pub async fn list(connection: &ConnectionArgs) -> i32 {
    let config = match resolve_config(connection) {
        Ok(config) => config,
        Err(code) => return code,
    };
    let factory: Arc<dyn ClientFactory> = Arc::new(HttpClientFactory::new(config));
    let result = match factory.client() {
        Ok(api) => get_all_projects(api.as_ref()).await,
        Err(err) => Err(err),
    };
    match result {
        Ok(projects) => {
            print_json(&projects);
            0
        }
        Err(err) => report_error(&err),
    }
}
