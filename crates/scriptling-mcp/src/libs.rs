//! Server-side script libraries: `scriptling.http.server`, `scriptling.kv`,
//! and `scriptling.tasks`.
//!
//! These close over the process-wide [`RuntimeState`]. Route and task
//! registration only works during the setup-script phase; the kv store is
//! shared across every interpreter the host creates.

use std::{cell::RefCell, rc::Rc, sync::Arc};

use indexmap::IndexMap;

use scriptling::{
    Builtin, CallArgs, Class, ExcType, Exception, Interp, Library, LibraryRegistry, Value,
    json_to_value, value_to_json,
};

use crate::state::{RouteSpec, RuntimeState};

/// Registers the serving libraries on `registry`, bound to `state`.
pub fn register_server_libs(registry: &LibraryRegistry, state: &Arc<RuntimeState>) {
    {
        let state = state.clone();
        registry.register_native("scriptling.http.server", move |interp| {
            build_http_server(interp, &state)
        });
    }
    {
        let state = state.clone();
        registry.register_native("scriptling.kv", move |interp| build_kv(interp, &state));
    }
    {
        let state = state.clone();
        registry.register_native("scriptling.tasks", move |interp| build_tasks(interp, &state));
    }
}

/// The class route handlers receive; fields are populated by the dispatcher.
pub(crate) fn request_class() -> Rc<Class> {
    Rc::new(Class {
        name: "Request".to_string(),
        parent: None,
        base_exc: None,
        members: RefCell::new(IndexMap::new()),
        line: 0,
    })
}

fn sealed_error(err: &crate::state::StateError) -> Exception {
    Exception::new(ExcType::RuntimeError, err.to_string())
}

fn build_http_server(_interp: &mut Interp, state: &Arc<RuntimeState>) -> Result<Value, Exception> {
    let lib = Library::new(
        "scriptling.http.server",
        "HTTP route registration, used by the setup script.",
    );

    lib.set("Request", Value::Class(request_class()));

    {
        let state = state.clone();
        lib.set(
            "route",
            Value::Builtin(Rc::new(Builtin::new(
                "route",
                "Register a script route: route(path, handler, methods=[\"GET\"]).",
                move |_interp: &mut Interp, args: CallArgs| {
                    let path = args.str_arg(0, "route")?;
                    let handler = args.str_arg(1, "route")?;
                    let methods = parse_methods(args.pos_or_kw(2, "methods"))?;
                    state
                        .add_route(
                            &path,
                            RouteSpec {
                                methods,
                                handler,
                                static_dir: None,
                            },
                        )
                        .map_err(|e| sealed_error(&e))?;
                    Ok(Value::None)
                },
            ))),
        );
    }

    {
        let state = state.clone();
        lib.set(
            "static_route",
            Value::Builtin(Rc::new(Builtin::new(
                "static_route",
                "Serve a directory of files under a path prefix.",
                move |_interp: &mut Interp, args: CallArgs| {
                    let path = args.str_arg(0, "static_route")?;
                    let dir = args.str_arg(1, "static_route")?;
                    state
                        .add_route(
                            &path,
                            RouteSpec {
                                methods: vec!["GET".to_string(), "HEAD".to_string()],
                                handler: String::new(),
                                static_dir: Some(dir.into()),
                            },
                        )
                        .map_err(|e| sealed_error(&e))?;
                    Ok(Value::None)
                },
            ))),
        );
    }

    {
        let state = state.clone();
        lib.set(
            "middleware",
            Value::Builtin(Rc::new(Builtin::new(
                "middleware",
                "Install a middleware handler called before every script route.",
                move |_interp: &mut Interp, args: CallArgs| {
                    let handler = args.str_arg(0, "middleware")?;
                    state.set_middleware(&handler).map_err(|e| sealed_error(&e))?;
                    Ok(Value::None)
                },
            ))),
        );
    }

    Ok(Value::Library(Rc::new(lib)))
}

fn parse_methods(value: Option<Value>) -> Result<Vec<String>, Exception> {
    let Some(value) = value else {
        return Ok(vec!["GET".to_string()]);
    };
    let Value::List(items) = &value else {
        return Err(Exception::type_error("methods must be a list of strings"));
    };
    let mut methods = Vec::new();
    for item in items.borrow().iter() {
        match item {
            Value::Str(s) => methods.push(s.to_uppercase()),
            other => {
                return Err(Exception::type_error(format!(
                    "methods must be strings, not '{}'",
                    other.type_name()
                )));
            }
        }
    }
    if methods.is_empty() {
        methods.push("GET".to_string());
    }
    Ok(methods)
}

fn build_kv(_interp: &mut Interp, state: &Arc<RuntimeState>) -> Result<Value, Exception> {
    let lib = Library::new(
        "scriptling.kv",
        "Process-wide key-value store shared across interpreters.",
    );

    {
        let state = state.clone();
        lib.set(
            "set",
            Value::Builtin(Rc::new(Builtin::new(
                "set",
                "Store a JSON-representable value under a key.",
                move |_interp: &mut Interp, args: CallArgs| {
                    let key = args.str_arg(0, "set")?;
                    let value = args.require(1, "set")?;
                    state.kv_set(&key, value_to_json(&value)?);
                    Ok(Value::None)
                },
            ))),
        );
    }

    {
        let state = state.clone();
        lib.set(
            "get",
            Value::Builtin(Rc::new(Builtin::new(
                "get",
                "Read a stored value, or a default when the key is absent.",
                move |_interp: &mut Interp, args: CallArgs| {
                    let key = args.str_arg(0, "get")?;
                    match state.kv_get(&key) {
                        Some(value) => Ok(json_to_value(&value)),
                        None => Ok(args.pos_or_kw(1, "default").unwrap_or(Value::None)),
                    }
                },
            ))),
        );
    }

    {
        let state = state.clone();
        lib.set(
            "delete",
            Value::Builtin(Rc::new(Builtin::new(
                "delete",
                "Remove a key; returns whether it existed.",
                move |_interp: &mut Interp, args: CallArgs| {
                    let key = args.str_arg(0, "delete")?;
                    Ok(Value::Bool(state.kv_delete(&key)))
                },
            ))),
        );
    }

    {
        let state = state.clone();
        lib.set(
            "keys",
            Value::Builtin(Rc::new(Builtin::new(
                "keys",
                "Sorted list of stored keys.",
                move |_interp: &mut Interp, _args: CallArgs| {
                    Ok(Value::list(state.kv_keys().into_iter().map(Value::str).collect()))
                },
            ))),
        );
    }

    Ok(Value::Library(Rc::new(lib)))
}

fn build_tasks(_interp: &mut Interp, state: &Arc<RuntimeState>) -> Result<Value, Exception> {
    let lib = Library::new(
        "scriptling.tasks",
        "Background tasks released when the server starts.",
    );

    {
        let state = state.clone();
        lib.set(
            "spawn",
            Value::Builtin(Rc::new(Builtin::new(
                "spawn",
                "Register a background task by dotted handler path.",
                move |_interp: &mut Interp, args: CallArgs| {
                    let handler = args.str_arg(0, "spawn")?;
                    state.add_background_task(&handler).map_err(|e| sealed_error(&e))?;
                    Ok(Value::None)
                },
            ))),
        );
    }

    Ok(Value::Library(Rc::new(lib)))
}
