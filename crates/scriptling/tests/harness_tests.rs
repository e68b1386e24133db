//! Tool-harness tests: parameter injection, typed accessors, and the
//! `return_*` early-exit protocol.

use serde_json::{Map, Value as JsonValue, json};

use scriptling::{Interp, run_tool_script};

fn params(value: JsonValue) -> Map<String, JsonValue> {
    match value {
        JsonValue::Object(map) => map,
        other => panic!("expected object params, got {other}"),
    }
}

fn run_tool(source: &str, arguments: JsonValue) -> scriptling::ToolOutcome {
    let mut interp = Interp::new();
    run_tool_script(&mut interp, source, "<tool>", &params(arguments))
}

#[test]
fn typed_accessor_coercion() {
    // Spec end-to-end scenario 4.
    let outcome = run_tool(
        "import scriptling.mcp.tool as t\n\
         t.return_object({\"c\": t.get_int(\"count\",0), \"l\": t.get_int(\"limit\",0), \"m\": t.get_int(\"missing\",7)})",
        json!({"count": 42, "limit": "100"}),
    );
    assert_eq!(outcome.exit_code, 0);
    assert!(outcome.error.is_none());
    let decoded: JsonValue = serde_json::from_str(&outcome.response).unwrap();
    assert_eq!(decoded, json!({"c": 42, "l": 100, "m": 7}));
}

#[test]
fn early_return_stops_execution() {
    // Spec end-to-end scenario 5: code after return_string is unreachable.
    let outcome = run_tool(
        "import scriptling.mcp.tool as t\n\
         t.return_string(\"ok\")\n\
         raise Exception(\"unreachable\")",
        json!({}),
    );
    assert_eq!(outcome.exit_code, 0);
    assert_eq!(outcome.response, "ok");
    assert!(outcome.error.is_none());
}

#[test]
fn first_return_wins() {
    let outcome = run_tool(
        "import scriptling.mcp.tool as t\n\
         t.return_string(\"first\")\n\
         t.return_string(\"second\")",
        json!({}),
    );
    assert_eq!(outcome.response, "first");
    assert_eq!(outcome.exit_code, 0);
}

#[test]
fn get_int_default_for_every_missing_shape() {
    // Spec invariant: default for missing, None, "", "   ", non-numeric.
    let script = "import scriptling.mcp.tool as t\n\
                  t.return_object([\n\
                      t.get_int(\"missing\", 99),\n\
                      t.get_int(\"none\", 99),\n\
                      t.get_int(\"empty\", 99),\n\
                      t.get_int(\"blank\", 99),\n\
                      t.get_int(\"words\", 99),\n\
                  ])";
    let outcome = run_tool(
        script,
        json!({"none": null, "empty": "", "blank": "   ", "words": "abc"}),
    );
    assert_eq!(outcome.exit_code, 0);
    let decoded: JsonValue = serde_json::from_str(&outcome.response).unwrap();
    assert_eq!(decoded, json!([99, 99, 99, 99, 99]));
}

#[test]
fn string_accessor_trims_and_defaults() {
    let outcome = run_tool(
        "import scriptling.mcp.tool as t\n\
         t.return_object([t.get_string(\"a\", \"dflt\"), t.get_string(\"b\", \"dflt\"), t.get_string(\"n\", \"dflt\")])",
        json!({"a": "  padded  ", "b": "   ", "n": 42}),
    );
    let decoded: JsonValue = serde_json::from_str(&outcome.response).unwrap();
    assert_eq!(decoded, json!(["padded", "dflt", "42"]));
}

#[test]
fn bool_and_float_accessors() {
    let outcome = run_tool(
        "import scriptling.mcp.tool as t\n\
         t.return_object([\n\
             t.get_bool(\"t1\"), t.get_bool(\"t2\"), t.get_bool(\"f1\"),\n\
             t.get_bool(\"bad\", True), t.get_float(\"x\"), t.get_float(\"s\"),\n\
         ])",
        json!({"t1": true, "t2": " TRUE ", "f1": "0", "bad": "maybe", "x": 3, "s": "2.5"}),
    );
    let decoded: JsonValue = serde_json::from_str(&outcome.response).unwrap();
    assert_eq!(decoded, json!([true, true, false, true, 3.0, 2.5]));
}

#[test]
fn list_accessors() {
    let outcome = run_tool(
        "import scriptling.mcp.tool as t\n\
         t.return_object([\n\
             t.get_list(\"csv\"),\n\
             t.get_int_list(\"nums\"),\n\
             t.get_string_list(\"mixed\"),\n\
         ])",
        json!({
            "csv": "a, b ,c",
            "nums": [1, "2", 2.9, "x", null],
            "mixed": ["keep", 7, "", null],
        }),
    );
    let decoded: JsonValue = serde_json::from_str(&outcome.response).unwrap();
    // Typed lists drop elements that fail their coercion.
    assert_eq!(
        decoded,
        json!([["a", "b", "c"], [1, 2, 2], ["keep", "7"]])
    );
}

#[test]
fn return_error_sets_exit_code_one() {
    let outcome = run_tool(
        "import scriptling.mcp.tool as t\nt.return_error(\"went wrong\")",
        json!({}),
    );
    assert_eq!(outcome.exit_code, 1);
    assert!(outcome.error.is_some());
    let decoded: JsonValue = serde_json::from_str(&outcome.response).unwrap();
    assert_eq!(decoded, json!({"error": "went wrong"}));
}

#[test]
fn uncaught_exception_is_an_error_outcome() {
    let outcome = run_tool("raise ValueError(\"boom\")", json!({}));
    assert_eq!(outcome.exit_code, 1);
    let err = outcome.error.expect("error recorded");
    assert!(err.to_string().contains("boom"));
}

#[test]
fn fallthrough_without_return_is_empty_success() {
    let outcome = run_tool("x = 1 + 1", json!({}));
    assert_eq!(outcome.exit_code, 0);
    assert_eq!(outcome.response, "");
    assert!(outcome.error.is_none());
}

#[test]
fn return_object_preserves_dict_order() {
    let outcome = run_tool(
        "import scriptling.mcp.tool as t\n\
         t.return_object({\"z\": 1, \"a\": 2, \"m\": 3})",
        json!({}),
    );
    assert_eq!(outcome.response, "{\"z\":1,\"a\":2,\"m\":3}");
}

#[test]
fn return_toon_encodes_compact_form() {
    let outcome = run_tool(
        "import scriptling.mcp.tool as t\n\
         t.return_toon({\"name\": \"demo\", \"tags\": [\"a\", \"b\"]})",
        json!({}),
    );
    assert_eq!(outcome.exit_code, 0);
    assert_eq!(outcome.response, "name: demo\ntags[2]: a,b\n");
}

#[test]
fn system_exit_cannot_be_intercepted_by_scripts() {
    // A tool script cannot swallow the harness sentinel with except Exception.
    let outcome = run_tool(
        "import scriptling.mcp.tool as t\n\
         try:\n    t.return_string(\"done\")\nexcept Exception:\n    t.return_string(\"swallowed\")",
        json!({}),
    );
    assert_eq!(outcome.response, "done");
    assert_eq!(outcome.exit_code, 0);
}

#[test]
fn params_dict_is_visible_to_scripts() {
    let outcome = run_tool(
        "import scriptling.mcp.tool as t\n\
         t.return_string(str(__mcp_params[\"direct\"]))",
        json!({"direct": [1, 2]}),
    );
    assert_eq!(outcome.response, "[1, 2]");
}
