//! Serving-host tests: JSON-RPC dispatch, route handling, middleware,
//! request isolation, and the shared kv store.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use scriptling::{Interp, LibraryRegistry};
use scriptling_mcp::{
    InterpFactory, RequestFields, RuntimeState, ToolServer, handle_rpc, libs::register_server_libs,
    run_script_route,
};

fn factory_with(state: &Arc<RuntimeState>, app_source: Option<&str>) -> InterpFactory {
    let registry = Arc::new(LibraryRegistry::with_defaults());
    register_server_libs(&registry, state);
    if let Some(source) = app_source {
        registry.register_script("app", source);
    }
    Arc::new(move || Interp::builder().registry(registry.clone()).build())
}

fn factory() -> InterpFactory {
    factory_with(&Arc::new(RuntimeState::new()), None)
}

fn rpc(server: &ToolServer, factory: &InterpFactory, body: Value) -> Value {
    handle_rpc(server, factory, body.to_string().as_bytes()).expect("rpc response")
}

fn write_tool(dir: &std::path::Path, name: &str, sidecar: &str, script: &str) {
    std::fs::write(dir.join(format!("{name}.toml")), sidecar).unwrap();
    std::fs::write(dir.join(format!("{name}.py")), script).unwrap();
}

// ----------------------------------------------------------------------
// JSON-RPC tool dispatch
// ----------------------------------------------------------------------

#[test]
fn tools_list_reports_schema() {
    let dir = tempfile::tempdir().unwrap();
    write_tool(
        dir.path(),
        "greet",
        "description = \"Greets\"\nkeywords = [\"demo\"]\n\n[[parameters]]\nname = \"name\"\ntype = \"string\"\nrequired = true\n",
        "pass",
    );
    let server = ToolServer::scan(dir.path(), false).unwrap();

    let response = rpc(
        &server,
        &factory(),
        json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}),
    );
    let tools = &response["result"]["tools"];
    assert_eq!(tools[0]["name"], "greet");
    assert_eq!(tools[0]["inputSchema"]["type"], "object");
    assert_eq!(tools[0]["inputSchema"]["required"][0], "name");
    assert_eq!(
        tools[0]["inputSchema"]["properties"]["name"]["type"],
        "string"
    );
}

#[test]
fn undiscoverable_tools_are_hidden_but_callable() {
    let dir = tempfile::tempdir().unwrap();
    write_tool(
        dir.path(),
        "hidden",
        "description = \"secret\"\ndiscoverable = false\n",
        "import scriptling.mcp.tool as t\nt.return_string(\"found me\")",
    );
    let server = ToolServer::scan(dir.path(), false).unwrap();

    let listed = rpc(
        &server,
        &factory(),
        json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}),
    );
    assert_eq!(listed["result"]["tools"].as_array().unwrap().len(), 0);

    let called = rpc(
        &server,
        &factory(),
        json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call",
               "params": {"name": "hidden", "arguments": {}}}),
    );
    assert_eq!(called["result"]["content"][0]["text"], "found me");
}

#[test]
fn tools_call_success_and_error_paths() {
    let dir = tempfile::tempdir().unwrap();
    write_tool(
        dir.path(),
        "adder",
        "description = \"Adds\"\n\n[[parameters]]\nname = \"a\"\ntype = \"int\"\nrequired = true\n\n[[parameters]]\nname = \"b\"\ntype = \"int\"\n",
        "import scriptling.mcp.tool as t\nt.return_object({\"sum\": t.get_int(\"a\") + t.get_int(\"b\")})",
    );
    write_tool(
        dir.path(),
        "fails",
        "description = \"Always errors\"\n",
        "import scriptling.mcp.tool as t\nt.return_error(\"nope\")",
    );
    let server = ToolServer::scan(dir.path(), false).unwrap();
    let factory = factory();

    let ok = rpc(
        &server,
        &factory,
        json!({"jsonrpc": "2.0", "id": 1, "method": "tools/call",
               "params": {"name": "adder", "arguments": {"a": 2, "b": "40"}}}),
    );
    let text = ok["result"]["content"][0]["text"].as_str().unwrap();
    assert_eq!(
        serde_json::from_str::<Value>(text).unwrap(),
        json!({"sum": 42})
    );

    // Missing required parameter.
    let missing = rpc(
        &server,
        &factory,
        json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call",
               "params": {"name": "adder", "arguments": {"b": 1}}}),
    );
    assert_eq!(missing["error"]["code"], -32000);

    // Nonzero exit maps to an RPC error carrying the tool's error body.
    let failed = rpc(
        &server,
        &factory,
        json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call",
               "params": {"name": "fails", "arguments": {}}}),
    );
    assert_eq!(failed["error"]["code"], -32000);
    assert!(failed["error"]["message"].as_str().unwrap().contains("nope"));
}

#[test]
fn rpc_envelope_behaviour() {
    let server = ToolServer::empty(false);
    let factory = factory();

    let init = rpc(
        &server,
        &factory,
        json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"}),
    );
    assert_eq!(init["result"]["serverInfo"]["name"], "scriptling-mcp");

    let unknown = rpc(
        &server,
        &factory,
        json!({"jsonrpc": "2.0", "id": 2, "method": "bogus/method"}),
    );
    assert_eq!(unknown["error"]["code"], -32601);

    // Notifications (no id) produce no response.
    let none = handle_rpc(
        &server,
        &factory,
        json!({"jsonrpc": "2.0", "method": "notifications/initialized"})
            .to_string()
            .as_bytes(),
    );
    assert!(none.is_none());

    // Garbage is a parse error.
    let parse = handle_rpc(&server, &factory, b"{not json").expect("response");
    assert_eq!(parse["error"]["code"], -32700);
}

#[test]
fn exec_tool_is_disabled_by_default() {
    let server = ToolServer::empty(false);
    let factory = factory();
    let response = rpc(
        &server,
        &factory,
        json!({"jsonrpc": "2.0", "id": 1, "method": "tools/call",
               "params": {"name": "execute_script", "arguments": {"script": "1 + 1"}}}),
    );
    assert_eq!(response["error"]["code"], -32000);

    let enabled = ToolServer::empty(true);
    let listed = rpc(
        &enabled,
        &factory,
        json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
    );
    assert_eq!(listed["result"]["tools"][0]["name"], "execute_script");
}

#[test]
fn tool_calls_are_isolated_between_invocations() {
    let dir = tempfile::tempdir().unwrap();
    // The script observes whether a previous invocation leaked state.
    write_tool(
        dir.path(),
        "probe",
        "description = \"state probe\"\n",
        "import scriptling.mcp.tool as t\n\
         try:\n    seen = leaked\nexcept NameError:\n    seen = False\n\
         leaked = True\n\
         t.return_object({\"leaked\": bool(seen)})",
    );
    let server = ToolServer::scan(dir.path(), false).unwrap();
    let factory = factory();

    for id in 0..3 {
        let response = rpc(
            &server,
            &factory,
            json!({"jsonrpc": "2.0", "id": id, "method": "tools/call",
                   "params": {"name": "probe", "arguments": {}}}),
        );
        let text = response["result"]["content"][0]["text"].as_str().unwrap();
        assert_eq!(
            serde_json::from_str::<Value>(text).unwrap(),
            json!({"leaked": false}),
            "invocation {id} saw leaked module state"
        );
    }
}

// ----------------------------------------------------------------------
// HTTP route dispatch
// ----------------------------------------------------------------------

fn get_request(path: &str) -> RequestFields {
    RequestFields {
        method: "GET".to_string(),
        path: path.to_string(),
        body: String::new(),
        headers: vec![("x-test".to_string(), "yes".to_string())],
        query: vec![("who".to_string(), "world".to_string())],
    }
}

#[test]
fn route_handler_receives_request_and_returns_dict() {
    let state = Arc::new(RuntimeState::new());
    let factory = factory_with(
        &state,
        Some(
            "def handle(req):\n\
             \x20   body = req.method + ' ' + req.path + ' ' + req.query['who'] + ' ' + req.headers['x-test']\n\
             \x20   return {'status': 200, 'headers': {'X-Served': 'route'}, 'body': body}\n",
        ),
    );
    let response = run_script_route(&factory, None, "app.handle", &get_request("/hello"));
    assert_eq!(response.status, 200);
    assert_eq!(String::from_utf8(response.body).unwrap(), "GET /hello world yes");
    assert!(response
        .headers
        .iter()
        .any(|(k, v)| k == "x-served" && v == "route"));
}

#[test]
fn non_string_body_is_json_encoded() {
    let state = Arc::new(RuntimeState::new());
    let factory = factory_with(
        &state,
        Some("def handle(req):\n    return {'status': 201, 'body': {'ok': True}}\n"),
    );
    let response = run_script_route(&factory, None, "app.handle", &get_request("/json"));
    assert_eq!(response.status, 201);
    assert!(response
        .headers
        .iter()
        .any(|(k, v)| k == "content-type" && v == "application/json"));
    assert_eq!(
        serde_json::from_slice::<Value>(&response.body).unwrap(),
        json!({"ok": true})
    );
}

#[test]
fn middleware_short_circuits_with_a_dict() {
    let state = Arc::new(RuntimeState::new());
    let factory = factory_with(
        &state,
        Some(
            "def mw(req):\n\
             \x20   if req.headers.get('x-test') == 'yes':\n\
             \x20       return {'status': 403, 'body': 'blocked'}\n\
             \x20   return None\n\
             def handle(req):\n\
             \x20   return {'status': 200, 'body': 'handled'}\n",
        ),
    );
    let blocked = run_script_route(&factory, Some("app.mw"), "app.handle", &get_request("/x"));
    assert_eq!(blocked.status, 403);
    assert_eq!(String::from_utf8(blocked.body).unwrap(), "blocked");

    let mut passthrough = get_request("/x");
    passthrough.headers.clear();
    let handled = run_script_route(&factory, Some("app.mw"), "app.handle", &passthrough);
    assert_eq!(handled.status, 200);
    assert_eq!(String::from_utf8(handled.body).unwrap(), "handled");
}

#[test]
fn handler_failure_maps_to_500_json_error() {
    let state = Arc::new(RuntimeState::new());
    let factory = factory_with(
        &state,
        Some("def handle(req):\n    raise ValueError('broken handler')\n"),
    );
    let response = run_script_route(&factory, None, "app.handle", &get_request("/x"));
    assert_eq!(response.status, 500);
    let body: Value = serde_json::from_slice(&response.body).unwrap();
    assert!(body["error"].as_str().unwrap().contains("broken handler"));
}

#[test]
fn handler_module_state_does_not_leak_between_requests() {
    let state = Arc::new(RuntimeState::new());
    let factory = factory_with(
        &state,
        Some(
            "hits = 0\n\
             def handle(req):\n\
             \x20   global hits\n\
             \x20   hits = hits + 1\n\
             \x20   return {'status': 200, 'body': str(hits)}\n",
        ),
    );
    for _ in 0..3 {
        let response = run_script_route(&factory, None, "app.handle", &get_request("/count"));
        // Fresh interpreter per request: the counter never accumulates.
        assert_eq!(String::from_utf8(response.body).unwrap(), "1");
    }
}

// ----------------------------------------------------------------------
// Setup-phase libraries and shared kv
// ----------------------------------------------------------------------

#[test]
fn setup_script_registers_routes_until_sealed() {
    let state = Arc::new(RuntimeState::new());
    let factory = factory_with(&state, None);

    let mut interp = factory();
    interp
        .run(
            "import scriptling.http.server as srv\n\
             srv.route('/api', 'app.handle', methods=['GET', 'POST'])\n\
             srv.static_route('/assets/', '/srv/static')\n\
             srv.middleware('app.mw')\n\
             import scriptling.tasks as tasks\n\
             tasks.spawn('app.warm_cache')\n",
            "<setup>",
        )
        .unwrap();

    let routes = state.routes_snapshot();
    assert_eq!(routes.len(), 2);
    assert_eq!(routes["/api"].methods, vec!["GET", "POST"]);
    assert!(routes["/assets/"].static_dir.is_some());
    assert_eq!(state.middleware().as_deref(), Some("app.mw"));
    assert_eq!(state.take_background_tasks(), vec!["app.warm_cache"]);

    // After sealing, registration from a request-phase interpreter fails.
    state.seal();
    let mut late = factory();
    let err = late
        .run("import scriptling.http.server as srv\nsrv.route('/late', 'app.h')", "<late>")
        .unwrap_err();
    assert!(err.to_string().contains("sealed"));
}

#[test]
fn kv_store_is_shared_across_interpreters() {
    let state = Arc::new(RuntimeState::new());
    let factory = factory_with(&state, None);

    let mut writer = factory();
    writer
        .run("import scriptling.kv as kv\nkv.set('greeting', {'text': 'hi'})", "<w>")
        .unwrap();
    drop(writer);

    let mut reader = factory();
    let value = reader
        .run(
            "import scriptling.kv as kv\nkv.get('greeting')['text']",
            "<r>",
        )
        .unwrap();
    assert_eq!(value.repr(), "'hi'");

    let mut lister = factory();
    let keys = lister.run("import scriptling.kv as kv\nkv.keys()", "<k>").unwrap();
    assert_eq!(keys.repr(), "['greeting']");
}
