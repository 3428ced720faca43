//! MCP server exposing control-plane workflows as tools over stdio.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Subcommand};
use cpgenie_core::config::{self, ConfigSource, Configuration};
use cpgenie_core::error::{ControlPlaneError, codes};
use serde_json::{Map, Value, json};
use tokio::io::{self, AsyncBufRead, AsyncWrite, BufReader};
use tracing::{info, warn};
use uuid::Uuid;

pub mod api;
pub mod selftest;
pub mod session;
pub mod tools;
pub mod transport;

#[cfg(test)]
mod testing;

use api::{ClientFactory, HttpClientFactory};
use session::SessionContext;
use transport::{Payload, read_message, write_message};

const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
const MCP_SERVER_NAME: &str = "cpgenie-mcp";
const SESSION_RESOURCE_URI: &str = "cpgenie://session/current";

/// Connection settings shared by every binary.
#[derive(Args, Clone, Debug, Default)]
pub struct ConnectionArgs {
    /// Profile section of the credentials file used to fill missing settings
    #[arg(long, env = config::PROFILE_ENV)]
    pub profile: Option<String>,
    /// Control plane base URL
    #[arg(long, env = config::URL_ENV)]
    pub control_plane_url: Option<String>,
    #[arg(long, env = config::USERNAME_ENV)]
    pub username: Option<String>,
    /// API token
    #[arg(long, env = config::TOKEN_ENV, hide_env_values = true)]
    pub token: Option<String>,
    /// Credentials file (default: ~/.facets/credentials)
    #[arg(long)]
    pub credentials_file: Option<PathBuf>,
}

impl ConnectionArgs {
    pub fn source(&self) -> ConfigSource {
        ConfigSource {
            profile: self.profile.clone(),
            api_base_url: self.control_plane_url.clone(),
            username: self.username.clone(),
            token: self.token.clone(),
        }
    }

    pub fn resolve(&self) -> Result<Configuration, ControlPlaneError> {
        let path = self
            .credentials_file
            .clone()
            .or_else(config::default_credentials_path);
        config::resolve(&self.source(), path.as_deref())
    }
}

#[derive(Subcommand)]
pub enum McpCommands {
    /// Run the control-plane MCP server over stdio
    Serve(McpServeArgs),
}

#[derive(Args, Clone, Debug)]
pub struct McpServeArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,
}

pub async fn run(command: McpCommands) -> i32 {
    match command {
        McpCommands::Serve(args) => serve(&args.connection).await,
    }
}

/// Resolve configuration, run the connectivity self-test, then serve stdio
/// until the client disconnects. Returns the process exit code.
pub async fn serve(connection: &ConnectionArgs) -> i32 {
    let config = match connection.resolve() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", to_pretty_json(&json!(err.to_payload())));
            return 1;
        }
    };
    info!(url = %config.api_base_url, user = %config.username, profile = ?config.profile, "configuration resolved");

    let factory: Arc<dyn ClientFactory> = Arc::new(HttpClientFactory::new(config));
    if let Err(err) = selftest::verify_connectivity(factory.as_ref()).await {
        eprintln!("{}", to_pretty_json(&json!(err.to_payload())));
        return 1;
    }

    let mut server = McpServer::new(factory);
    match server.serve_stdio().await {
        Ok(()) => 0,
        Err(err) => {
            let payload = json!({
                "error": "mcp_server_error",
                "message": err,
            });
            eprintln!("{}", to_pretty_json(&payload));
            1
        }
    }
}

/// One MCP connection. Messages are handled strictly one at a time, so tool
/// calls never observe a half-updated session.
pub struct McpServer {
    factory: Arc<dyn ClientFactory>,
    session: SessionContext,
    session_id: String,
}

impl McpServer {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            factory,
            session: SessionContext::new(),
            session_id: format!("stdio-{}", Uuid::now_v7()),
        }
    }

    async fn serve_stdio(&mut self) -> Result<(), String> {
        let reader = BufReader::new(io::stdin());
        let writer = io::stdout();
        self.serve(reader, writer).await
    }

    pub async fn serve<R, W>(&mut self, mut reader: R, mut writer: W) -> Result<(), String>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!(session = %self.session_id, "MCP session started");
        loop {
            let incoming = read_message(&mut reader)
                .await
                .map_err(|e| format!("Failed to read MCP message: {e}"))?;
            let Some((incoming, framing)) = incoming else {
                break;
            };

            let responses = match incoming {
                Payload::Json(message) => self.handle_incoming_message(message).await,
                Payload::Malformed(reason) => {
                    warn!(session = %self.session_id, %reason, "rejected MCP message");
                    vec![error_response(Value::Null, RpcError::parse_error(reason))]
                }
            };
            for response in responses {
                write_message(&mut writer, &response, framing)
                    .await
                    .map_err(|e| format!("Failed to write MCP response: {e}"))?;
            }
        }
        info!(session = %self.session_id, "MCP session ended");
        Ok(())
    }

    async fn handle_incoming_message(&mut self, incoming: Value) -> Vec<Value> {
        let mut responses = Vec::new();

        if let Some(batch) = incoming.as_array() {
            if batch.is_empty() {
                responses.push(error_response(
                    Value::Null,
                    RpcError::invalid_request("Batch request must not be empty"),
                ));
                return responses;
            }
            for item in batch {
                if let Some(response) = self.handle_single_message(item.clone()).await {
                    responses.push(response);
                }
            }
            return responses;
        }

        if let Some(response) = self.handle_single_message(incoming).await {
            responses.push(response);
        }
        responses
    }

    async fn handle_single_message(&mut self, incoming: Value) -> Option<Value> {
        let Some(obj) = incoming.as_object() else {
            return Some(error_response(
                Value::Null,
                RpcError::invalid_request("Request must be a JSON object"),
            ));
        };

        if obj.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
            let id = obj.get("id").cloned().unwrap_or(Value::Null);
            return Some(error_response(
                id,
                RpcError::invalid_request("jsonrpc must be '2.0'"),
            ));
        }

        // Responses from the client carry no method; this server never asks.
        let method = obj.get("method").and_then(Value::as_str)?;

        let params = obj.get("params").cloned().unwrap_or(Value::Null);
        let id = obj.get("id").cloned()?;
        let result = self.handle_request(method, params).await;
        Some(match result {
            Ok(payload) => success_response(id, payload),
            Err(err) => error_response(id, err),
        })
    }

    async fn handle_request(&mut self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            "initialize" => Ok(self.initialize_payload()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(self.tools_list_payload()),
            "tools/call" => self.handle_tools_call(params).await,
            "resources/list" => Ok(self.resources_list_payload()),
            "resources/read" => self.handle_resources_read(params),
            "prompts/list" => Ok(json!({ "prompts": [] })),
            _ => Err(RpcError::method_not_found(method)),
        }
    }

    fn initialize_payload(&self) -> Value {
        json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {
                "tools": { "listChanged": false },
                "resources": { "listChanged": false },
                "prompts": { "listChanged": false }
            },
            "serverInfo": {
                "name": MCP_SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            },
            "instructions": "Select a project with get_all_projects and use_project, then an environment with get_all_environments and use_environment. Project tools (resources, variables) need a current project; deployment and override tools also need a current environment. Check get_current_environment_details before launching, destroying or releasing. Read get_sample_for_module and get_module_inputs before add_resource."
        })
    }

    fn tools_list_payload(&self) -> Value {
        let tools: Vec<Value> = tools::tool_definitions()
            .into_iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "inputSchema": tool.input_schema,
                })
            })
            .collect();
        json!({ "tools": tools })
    }

    async fn handle_tools_call(&mut self, params: Value) -> Result<Value, RpcError> {
        let params = params
            .as_object()
            .ok_or_else(|| RpcError::invalid_params("tools/call params must be an object"))?;

        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::invalid_params("tools/call requires string field 'name'"))?;

        let args = match params.get("arguments") {
            Some(Value::Object(map)) => map.clone(),
            Some(Value::Null) | None => Map::new(),
            Some(_) => {
                return Err(RpcError::invalid_params(
                    "tools/call 'arguments' must be an object",
                ));
            }
        };

        if !tools::is_known_tool(name) {
            let error = ToolError::new(codes::UNKNOWN_TOOL, format!("Unknown tool '{name}'"))
                .with_field("name")
                .with_docs_hint("Call tools/list for the available tools.");
            return Ok(error_envelope(name, &error));
        }

        info!(session = %self.session_id, tool = name, "tool call");
        let outcome = match self.factory.client() {
            Ok(api) => tools::execute(name, api.as_ref(), &mut self.session, &args).await,
            Err(err) => Err(err),
        };

        Ok(match outcome {
            Ok(data) => build_tool_call_response(
                json!({
                    "status": "complete",
                    "phase": "final",
                    "tool": name,
                    "data": data
                }),
                false,
            ),
            Err(err) => {
                warn!(tool = name, code = err.code(), error = %err, "tool call failed");
                error_envelope(name, &ToolError::from(err))
            }
        })
    }

    fn resources_list_payload(&self) -> Value {
        let resources: Vec<Value> = resource_definitions()
            .into_iter()
            .map(|res| {
                json!({
                    "uri": res.uri,
                    "name": res.name,
                    "description": res.description,
                    "mimeType": "application/json"
                })
            })
            .collect();
        json!({ "resources": resources })
    }

    fn handle_resources_read(&self, params: Value) -> Result<Value, RpcError> {
        let params = params
            .as_object()
            .ok_or_else(|| RpcError::invalid_params("resources/read params must be an object"))?;
        let uri = params.get("uri").and_then(Value::as_str).ok_or_else(|| {
            RpcError::invalid_params("resources/read requires string field 'uri'")
        })?;

        let content_payload = match uri {
            SESSION_RESOURCE_URI => self.session.snapshot(),
            _ => {
                return Err(RpcError::invalid_params(format!("Unknown resource '{uri}'")));
            }
        };

        Ok(json!({
            "contents": [{
                "uri": uri,
                "mimeType": "application/json",
                "text": to_pretty_json(&content_payload)
            }]
        }))
    }
}

#[derive(Debug)]
struct RpcError {
    code: i64,
    message: String,
    data: Option<Value>,
}

impl RpcError {
    fn parse_error(message: impl Into<String>) -> Self {
        Self {
            code: -32700,
            message: format!("Parse error: {}", message.into()),
            data: None,
        }
    }

    fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            code: -32600,
            message: message.into(),
            data: None,
        }
    }

    fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: format!("Method not found: {method}"),
            data: Some(json!({ "method": method })),
        }
    }

    fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: -32602,
            message: message.into(),
            data: None,
        }
    }
}

/// Error object returned inside a tool result envelope.
#[derive(Debug, Clone)]
struct ToolError {
    code: String,
    message: String,
    field: Option<String>,
    docs_hint: Option<String>,
    details: Option<Value>,
}

impl ToolError {
    fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            field: None,
            docs_hint: None,
            details: None,
        }
    }

    fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    fn with_docs_hint(mut self, docs_hint: impl Into<String>) -> Self {
        self.docs_hint = Some(docs_hint.into());
        self
    }

    fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    fn to_value(&self) -> Value {
        let mut payload = json!({
            "error": self.code,
            "message": self.message
        });
        if let Some(field) = &self.field {
            payload["field"] = Value::String(field.clone());
        }
        if let Some(docs_hint) = &self.docs_hint {
            payload["docs_hint"] = Value::String(docs_hint.clone());
        }
        if let Some(details) = &self.details {
            payload["details"] = details.clone();
        }
        payload
    }
}

impl From<ControlPlaneError> for ToolError {
    fn from(err: ControlPlaneError) -> Self {
        let payload = err.to_payload();
        let mut tool_error = ToolError::new(payload.error, payload.message);
        tool_error.field = payload.field;
        tool_error.docs_hint = payload.docs_hint;
        if let Some(status) = payload.status {
            tool_error = tool_error.with_details(json!({ "status": status }));
        }
        tool_error
    }
}

#[derive(Debug)]
struct ResourceDefinition {
    uri: &'static str,
    name: &'static str,
    description: &'static str,
}

fn resource_definitions() -> Vec<ResourceDefinition> {
    vec![ResourceDefinition {
        uri: SESSION_RESOURCE_URI,
        name: "Current session",
        description: "Current project and environment selection of this MCP session.",
    }]
}

fn error_envelope(tool: &str, error: &ToolError) -> Value {
    build_tool_call_response(
        json!({
            "status": "error",
            "phase": "final",
            "tool": tool,
            "error": error.to_value()
        }),
        true,
    )
}

fn build_tool_call_response(envelope: Value, is_error: bool) -> Value {
    // Agents read the text block, so it carries the whole envelope.
    let text = to_pretty_json(&envelope);
    if is_error {
        json!({
            "isError": true,
            "content": [{ "type": "text", "text": text }],
            "structuredContent": envelope
        })
    } else {
        json!({
            "content": [{ "type": "text", "text": text }],
            "structuredContent": envelope
        })
    }
}

fn success_response(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

fn error_response(id: Value, error: RpcError) -> Value {
    let mut payload = json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": error.code,
            "message": error.message
        }
    });
    if let Some(data) = error.data {
        payload["error"]["data"] = data;
    }
    payload
}

pub fn to_pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}
