use cpgenie_core::config::{self, Configuration};
use cpgenie_mcp_runtime::ConnectionArgs;
use serde_json::{Value, json};

use crate::util::{print_json, resolve_config};

fn describe(config: &Configuration, connection: &ConnectionArgs) -> Value {
    let credentials_file = connection
        .credentials_file
        .clone()
        .or_else(config::default_credentials_path)
        .map(|path| path.display().to_string());
    json!({
        "control_plane_url": config.api_base_url,
        "username": config.username,
        "token": config.masked_token(),
        "profile": config.profile,
        "credentials_file": credentials_file,
    })
}

pub fn show(connection: &ConnectionArgs) -> i32 {
    match resolve_config(connection) {
        Ok(config) => {
            print_json(&describe(&config, connection));
            0
        }
        Err(code) => code,
    }
}
