use std::sync::Arc;

use cpgenie_mcp_runtime::ConnectionArgs;
use cpgenie_mcp_runtime::api::{ClientFactory, HttpClientFactory};
use cpgenie_mcp_runtime::selftest::connection_report;

use crate::util::{print_json, report_error, resolve_config};

/// Same self-test the MCP server runs at startup, plus a release stream count.
pub async fn run(connection: &ConnectionArgs) -> i32 {
    let config = match resolve_config(connection) {
        Ok(config) => config,
        Err(code) => return code,
    };
    let factory: Arc<dyn ClientFactory> = Arc::new(HttpClientFactory::new(config));
    match connection_report(factory.as_ref()).await {
        Ok(report) => {
            print_json(&report);
            0
        }
        Err(err) => report_error(&err),
    }
}
