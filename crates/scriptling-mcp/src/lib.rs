#![doc = include_str!("../../../README.md")]

pub mod libs;
pub mod reload;
pub mod routes;
pub mod serve;
pub mod sidecar;
pub mod state;
pub mod toolserver;

pub use crate::{
    reload::{DEBOUNCE_WINDOW, ToolServerHandle},
    routes::{AppState, RequestFields, ScriptResponse, run_script_route},
    serve::{INTERP_STACK_SIZE, ServeConfig, ServeError, TlsConfig, make_factory, serve},
    sidecar::{SidecarError, ToolParam, ToolSidecar, load_sidecar},
    state::{RouteSpec, RuntimeState, StateError},
    toolserver::{EXEC_TOOL_NAME, InterpFactory, ToolEntry, ToolServer, handle_rpc},
};
