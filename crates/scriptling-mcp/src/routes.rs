//! Per-request dispatch for script routes and static routes.
//!
//! Every script-route invocation runs on a fresh interpreter from the
//! factory; the only state shared with other requests is the process-level
//! `RuntimeState`. Dispatch is deliberately manual (instead of axum's
//! router) so the spec's resolution rules — trailing-slash retry, 405 on
//! method mismatch, static prefix stripping — stay in one place.

use std::{path::{Component, Path, PathBuf}, rc::Rc, sync::Arc};

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use indexmap::IndexMap;
use serde_json::json;
use tracing::{debug, error};

use scriptling::{CallArgs, Dict, Exception, Instance, Interp, Value, value_to_json};

use crate::{
    state::{RouteSpec, RuntimeState},
    toolserver::InterpFactory,
};

/// Shared state for the HTTP handlers.
pub struct AppState {
    pub runtime: Arc<RuntimeState>,
    /// Snapshot of the route table, taken after the setup phase.
    pub routes: IndexMap<String, RouteSpec>,
    pub middleware: Option<String>,
    pub factory: InterpFactory,
    /// Atomic pointer to the current tool-server snapshot.
    pub tools: crate::reload::ToolServerHandle,
    /// Expected `Authorization: Bearer <token>` value, when configured.
    pub bearer_token: Option<String>,
}

/// A handler's response, host-side.
#[derive(Debug, PartialEq)]
pub struct ScriptResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl IntoResponse for ScriptResponse {
    fn into_response(self) -> Response {
        let mut builder = Response::builder().status(self.status);
        for (name, value) in &self.headers {
            builder = builder.header(name, value);
        }
        builder
            .body(Body::from(self.body))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
    }
}

fn json_error(status: u16, message: &str) -> ScriptResponse {
    ScriptResponse {
        status,
        headers: vec![(header::CONTENT_TYPE.to_string(), "application/json".to_string())],
        body: serde_json::to_vec(&json!({ "error": message })).unwrap_or_default(),
    }
}

/// The axum fallback handler: resolves script and static routes.
pub async fn dispatch(
    State(app): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    let path = uri.path().to_string();

    // Exact match, then trailing-slash retry.
    let resolved = app
        .routes
        .get_key_value(&path)
        .or_else(|| app.routes.get_key_value(&format!("{path}/")))
        .map(|(p, spec)| (p.clone(), spec.clone()));

    let (route_path, spec) = match resolved {
        Some(found) => found,
        None => {
            // Static routes match by prefix.
            match static_match(&app.routes, &path) {
                Some((prefix, dir)) => return serve_static(&dir, &prefix, &path, &method).await,
                None => return json_error(404, "not found").into_response(),
            }
        }
    };

    if let Some(dir) = spec.static_dir.clone() {
        return serve_static(&dir, &route_path, &path, &method).await;
    }

    if !spec.methods.iter().any(|m| m.as_str() == method.as_str()) {
        return json_error(405, "method not allowed").into_response();
    }

    let request_fields = RequestFields {
        method: method.as_str().to_string(),
        path,
        body: String::from_utf8_lossy(&body).to_string(),
        headers: headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_lowercase(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect(),
        query: parse_query(uri.query().unwrap_or_default()),
    };

    let factory = app.factory.clone();
    let middleware = app.middleware.clone();
    let handler = spec.handler.clone();
    let result = tokio::task::spawn_blocking(move || {
        run_script_route(&factory, middleware.as_deref(), &handler, &request_fields)
    })
    .await;

    match result {
        Ok(response) => response.into_response(),
        Err(err) => {
            error!(error = %err, "route handler task failed");
            json_error(500, "internal error").into_response()
        }
    }
}

/// Raw request data handed to the blocking interpreter thread.
#[derive(Debug, Clone)]
pub struct RequestFields {
    pub method: String,
    pub path: String,
    pub body: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
}

/// Runs middleware and the route handler on a fresh interpreter.
pub fn run_script_route(
    factory: &InterpFactory,
    middleware: Option<&str>,
    handler: &str,
    fields: &RequestFields,
) -> ScriptResponse {
    let mut interp = factory();
    match dispatch_script(&mut interp, middleware, handler, fields) {
        Ok(response) => response,
        Err(err) => {
            debug!(handler, error = %err, "route handler raised");
            json_error(500, &err.to_string())
        }
    }
}

fn dispatch_script(
    interp: &mut Interp,
    middleware: Option<&str>,
    handler: &str,
    fields: &RequestFields,
) -> Result<ScriptResponse, Exception> {
    let request = build_request(interp, fields)?;

    if let Some(mw) = middleware {
        let mw_fn = resolve_handler(interp, mw)?;
        let result = interp.call(mw_fn, CallArgs::positional(vec![request.clone()]))?;
        // A dict from middleware short-circuits the route handler.
        if matches!(result, Value::Dict(_)) {
            return response_from_dict(&result);
        }
    }

    let handler_fn = resolve_handler(interp, handler)?;
    let result = interp.call(handler_fn, CallArgs::positional(vec![request]))?;
    response_from_dict(&result)
}

/// Builds the `Request` instance handlers receive.
fn build_request(interp: &mut Interp, fields: &RequestFields) -> Result<Value, Exception> {
    let server_lib = interp.import_library("scriptling.http.server")?;
    let Value::Library(lib) = &server_lib else {
        return Err(Exception::type_error("scriptling.http.server is not a library"));
    };
    let Some(Value::Class(class)) = lib.get("Request") else {
        return Err(Exception::type_error("Request class missing from scriptling.http.server"));
    };

    let mut headers = Dict::new();
    for (name, value) in &fields.headers {
        headers.insert_str(name, Value::str(value));
    }
    let mut query = Dict::new();
    for (name, value) in &fields.query {
        query.insert_str(name, Value::str(value));
    }

    let instance = Instance::new(class);
    {
        let mut f = instance.fields.borrow_mut();
        f.insert("method".to_string(), Value::str(&fields.method));
        f.insert("path".to_string(), Value::str(&fields.path));
        f.insert("body".to_string(), Value::str(&fields.body));
        f.insert("headers".to_string(), Value::dict(headers));
        f.insert("query".to_string(), Value::dict(query));
    }
    Ok(Value::Instance(Rc::new(instance)))
}

/// Resolves a dotted `lib.function` path on the interpreter.
pub(crate) fn resolve_handler(interp: &mut Interp, dotted: &str) -> Result<Value, Exception> {
    let (lib_name, fn_name) = dotted.rsplit_once('.').ok_or_else(|| {
        Exception::value_error(format!("handler '{dotted}' is not a dotted lib.function path"))
    })?;
    let library = interp.import_library(lib_name)?;
    let Value::Library(lib) = &library else {
        return Err(Exception::type_error(format!("'{lib_name}' is not a library")));
    };
    lib.get(fn_name).ok_or_else(|| {
        Exception::value_error(format!("library '{lib_name}' has no function '{fn_name}'"))
    })
}

/// Maps the handler's `{status, headers, body}` dict onto an HTTP response.
fn response_from_dict(value: &Value) -> Result<ScriptResponse, Exception> {
    let Value::Dict(dict) = value else {
        return Err(Exception::type_error(format!(
            "handler must return a dict, not '{}'",
            value.type_name()
        )));
    };
    let dict = dict.borrow();

    let status = match dict.get_str("status") {
        Some(Value::Int(code)) => u16::try_from(code)
            .ok()
            .filter(|c| (100..=599).contains(c))
            .ok_or_else(|| Exception::value_error(format!("invalid status code {code}")))?,
        None => 200,
        Some(other) => {
            return Err(Exception::type_error(format!(
                "status must be an int, not '{}'",
                other.type_name()
            )));
        }
    };

    let mut headers: Vec<(String, String)> = Vec::new();
    if let Some(Value::Dict(header_dict)) = dict.get_str("headers") {
        for (name, value) in header_dict.borrow().iter() {
            headers.push((name.str_value().to_lowercase(), value.str_value()));
        }
    }

    let body_value = dict.get_str("body").unwrap_or(Value::None);
    let body = match &body_value {
        Value::Str(s) => s.as_bytes().to_vec(),
        Value::None => Vec::new(),
        other => {
            // Non-string bodies are JSON-encoded with a JSON content type
            // unless the handler already set one.
            if !headers.iter().any(|(name, _)| name == "content-type") {
                headers.push(("content-type".to_string(), "application/json".to_string()));
            }
            serde_json::to_vec(&value_to_json(other)?)
                .map_err(|err| Exception::value_error(format!("cannot encode body: {err}")))?
        }
    };

    Ok(ScriptResponse { status, headers, body })
}

// ----------------------------------------------------------------------
// Static files
// ----------------------------------------------------------------------

fn static_match(routes: &IndexMap<String, RouteSpec>, path: &str) -> Option<(String, PathBuf)> {
    for (prefix, spec) in routes {
        if let Some(dir) = &spec.static_dir {
            let normalized = prefix.trim_end_matches('/');
            if path == normalized || path.starts_with(&format!("{normalized}/")) {
                return Some((prefix.clone(), dir.clone()));
            }
        }
    }
    None
}

async fn serve_static(dir: &Path, prefix: &str, path: &str, method: &Method) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return json_error(405, "method not allowed").into_response();
    }
    let remainder = path
        .strip_prefix(prefix.trim_end_matches('/'))
        .unwrap_or("")
        .trim_start_matches('/');
    let remainder = if remainder.is_empty() { "index.html" } else { remainder };

    // Reject traversal before touching the filesystem.
    let relative = Path::new(remainder);
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return json_error(404, "not found").into_response();
    }

    let full = dir.join(relative);
    match tokio::fs::read(&full).await {
        Ok(contents) => {
            let content_type = content_type_for(&full);
            let body = if method == Method::HEAD { Vec::new() } else { contents };
            ScriptResponse {
                status: 200,
                headers: vec![(header::CONTENT_TYPE.to_string(), content_type.to_string())],
                body,
            }
            .into_response()
        }
        Err(_) => json_error(404, "not found").into_response(),
    }
}

fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).unwrap_or_default() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css",
        "js" => "text/javascript",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "svg" => "image/svg+xml",
        "txt" => "text/plain; charset=utf-8",
        "ico" => "image/x-icon",
        _ => "application/octet-stream",
    }
}

// ----------------------------------------------------------------------
// Query strings
// ----------------------------------------------------------------------

/// Minimal `a=1&b=x%20y` parsing with percent and `+` decoding.
pub(crate) fn parse_query(raw: &str) -> Vec<(String, String)> {
    raw.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (url_decode(key), url_decode(value)),
            None => (url_decode(pair), String::new()),
        })
        .collect()
}

fn url_decode(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => {
                let hex = bytes.get(i + 1..i + 3);
                match hex.and_then(|h| u8::from_str_radix(std::str::from_utf8(h).ok()?, 16).ok()) {
                    Some(byte) => {
                        out.push(byte);
                        i += 3;
                    }
                    None => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_parsing() {
        assert_eq!(
            parse_query("a=1&b=x%20y&flag&c=a+b"),
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "x y".to_string()),
                ("flag".to_string(), String::new()),
                ("c".to_string(), "a b".to_string()),
            ]
        );
        assert!(parse_query("").is_empty());
    }

    #[test]
    fn static_prefix_matching() {
        let mut routes = IndexMap::new();
        routes.insert(
            "/assets/".to_string(),
            RouteSpec {
                methods: vec!["GET".to_string()],
                handler: String::new(),
                static_dir: Some(PathBuf::from("/srv/assets")),
            },
        );
        assert!(static_match(&routes, "/assets/app.css").is_some());
        assert!(static_match(&routes, "/assets").is_some());
        assert!(static_match(&routes, "/other").is_none());
    }
}
