//! The tool server: scans a tool directory into a dispatch table and
//! answers JSON-RPC 2.0 requests (`initialize`, `tools/list`, `tools/call`).
//!
//! The table is immutable once built; hot reload builds a fresh server and
//! swaps the shared pointer, so an in-flight call always finishes against
//! the snapshot it loaded.

use std::{io, path::{Path, PathBuf}, sync::Arc};

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::warn;

use scriptling::{Interp, run_tool_script};

use crate::sidecar::{ToolSidecar, load_sidecar};

/// Builds one fresh interpreter per invocation.
pub type InterpFactory = Arc<dyn Fn() -> Interp + Send + Sync>;

/// The built-in unrestricted execution tool, registered only when the host
/// passes `--mcp-exec-script`.
pub const EXEC_TOOL_NAME: &str = "execute_script";

/// One registered tool: descriptor plus the sibling script path.
#[derive(Debug, Clone)]
pub struct ToolEntry {
    pub name: String,
    pub sidecar: ToolSidecar,
    pub script_path: PathBuf,
}

/// An immutable snapshot of the registered tools.
#[derive(Debug, Default)]
pub struct ToolServer {
    tools: IndexMap<String, ToolEntry>,
    exec_enabled: bool,
}

impl ToolServer {
    /// Scans `dir` for `*.toml` sidecars with sibling `*.py` scripts.
    ///
    /// A sidecar without a script (or one that fails to parse) is skipped
    /// with a warning rather than failing the whole scan, so one broken
    /// tool cannot take the server down on reload.
    pub fn scan(dir: &Path, exec_enabled: bool) -> io::Result<Self> {
        let mut tools = IndexMap::new();
        let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
            .collect();
        entries.sort();

        for sidecar_path in entries {
            let Some(stem) = sidecar_path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let script_path = sidecar_path.with_extension("py");
            if !script_path.is_file() {
                warn!(tool = stem, "sidecar has no matching .py script, skipping");
                continue;
            }
            match load_sidecar(&sidecar_path) {
                Ok(sidecar) => {
                    tools.insert(
                        stem.to_string(),
                        ToolEntry {
                            name: stem.to_string(),
                            sidecar,
                            script_path,
                        },
                    );
                }
                Err(err) => warn!(tool = stem, error = %err, "invalid sidecar, skipping"),
            }
        }
        Ok(Self { tools, exec_enabled })
    }

    /// An empty server, used when no tool directory is configured.
    #[must_use]
    pub fn empty(exec_enabled: bool) -> Self {
        Self {
            tools: IndexMap::new(),
            exec_enabled,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    #[must_use]
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// The `tools/list` payload: discoverable tools with JSON-schema-style
    /// parameter descriptions.
    #[must_use]
    pub fn list_tools(&self) -> Value {
        let mut out = Vec::new();
        for entry in self.tools.values() {
            if !entry.sidecar.discoverable {
                continue;
            }
            let mut properties = Map::new();
            let mut required = Vec::new();
            for param in &entry.sidecar.parameters {
                properties.insert(
                    param.name.clone(),
                    json!({ "type": param.json_type(), "description": param.description }),
                );
                if param.required {
                    required.push(Value::String(param.name.clone()));
                }
            }
            out.push(json!({
                "name": entry.name,
                "description": entry.sidecar.description,
                "keywords": entry.sidecar.keywords,
                "inputSchema": {
                    "type": "object",
                    "properties": properties,
                    "required": required,
                },
            }));
        }
        if self.exec_enabled {
            out.push(json!({
                "name": EXEC_TOOL_NAME,
                "description": "Evaluate an arbitrary script and return its response.",
                "keywords": ["execute", "script"],
                "inputSchema": {
                    "type": "object",
                    "properties": { "script": { "type": "string", "description": "Source to evaluate." } },
                    "required": ["script"],
                },
            }));
        }
        json!(out)
    }

    /// Invokes one tool on a fresh interpreter. `Err` carries the message
    /// for the RPC error envelope.
    pub fn call_tool(&self, factory: &InterpFactory, name: &str, arguments: &Value) -> Result<String, String> {
        let empty = Map::new();
        let params = arguments.as_object().unwrap_or(&empty);

        let source = if name == EXEC_TOOL_NAME {
            if !self.exec_enabled {
                return Err(format!("unknown tool '{name}'"));
            }
            match params.get("script").and_then(Value::as_str) {
                Some(script) => script.to_string(),
                None => return Err("execute_script requires a 'script' argument".to_string()),
            }
        } else {
            let entry = self
                .tools
                .get(name)
                .ok_or_else(|| format!("unknown tool '{name}'"))?;
            for param in &entry.sidecar.parameters {
                if param.required && !params.contains_key(&param.name) {
                    return Err(format!("missing required parameter '{}'", param.name));
                }
            }
            std::fs::read_to_string(&entry.script_path)
                .map_err(|err| format!("cannot read tool script: {err}"))?
        };

        let mut interp = factory();
        let outcome = run_tool_script(&mut interp, &source, name, params);
        if outcome.is_success() {
            Ok(outcome.response)
        } else if outcome.response.is_empty() {
            Err(outcome
                .error
                .map_or_else(|| "tool failed".to_string(), |e| e.to_string()))
        } else {
            Err(outcome.response)
        }
    }
}

// ----------------------------------------------------------------------
// JSON-RPC envelope
// ----------------------------------------------------------------------

/// JSON-RPC request payload accepted by the `/mcp` endpoint.
#[derive(Debug, Deserialize)]
struct RpcRequest {
    id: Value,
    method: String,
    #[serde(default)]
    params: Value,
}

/// Returns true when the payload is a JSON-RPC 2.0 notification.
///
/// Notifications contain a string `method` and intentionally omit `id`;
/// the server must not produce any response for them.
fn is_json_rpc_notification(payload: &Value) -> bool {
    let Some(object) = payload.as_object() else {
        return false;
    };
    object.get("jsonrpc").and_then(Value::as_str) == Some("2.0")
        && object.get("method").is_some_and(Value::is_string)
        && !object.contains_key("id")
}

/// Dispatches one JSON-RPC message body. `None` means no response is due
/// (the message was a notification).
pub fn handle_rpc(server: &ToolServer, factory: &InterpFactory, body: &[u8]) -> Option<Value> {
    let raw_message = match serde_json::from_slice::<Value>(body) {
        Ok(message) => message,
        Err(err) => {
            return Some(error_response(&Value::Null, -32700, &format!("parse error: {err}")));
        }
    };

    if is_json_rpc_notification(&raw_message) {
        return None;
    }

    let request = match serde_json::from_value::<RpcRequest>(raw_message) {
        Ok(request) => request,
        Err(err) => {
            return Some(error_response(&Value::Null, -32700, &format!("parse error: {err}")));
        }
    };

    Some(handle_request(server, factory, request))
}

fn handle_request(server: &ToolServer, factory: &InterpFactory, request: RpcRequest) -> Value {
    match request.method.as_str() {
        "initialize" => success_response(
            &request.id,
            &json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {
                    "tools": {}
                },
                "serverInfo": {
                    "name": "scriptling-mcp",
                    "version": env!("CARGO_PKG_VERSION")
                }
            }),
        ),
        "notifications/initialized" => success_response(&request.id, &json!({})),
        "tools/list" => success_response(&request.id, &json!({ "tools": server.list_tools() })),
        "tools/call" => {
            #[derive(Deserialize)]
            struct CallParams {
                name: String,
                #[serde(default)]
                arguments: Value,
            }

            let params: Result<CallParams, _> = serde_json::from_value(request.params);
            match params {
                Ok(params) => match server.call_tool(factory, &params.name, &params.arguments) {
                    Ok(result) => success_response(
                        &request.id,
                        &json!({ "content": [{ "type": "text", "text": result }] }),
                    ),
                    Err(err) => error_response(&request.id, -32000, &err),
                },
                Err(err) => error_response(&request.id, -32602, &format!("invalid params: {err}")),
            }
        }
        _ => error_response(&request.id, -32601, "method not found"),
    }
}

fn success_response(id: &Value, result: &Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result,
    })
}

fn error_response(id: &Value, code: i32, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": code,
            "message": message,
        },
    })
}
