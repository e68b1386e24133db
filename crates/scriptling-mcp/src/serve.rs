//! The serving host: startup sequence, HTTP mux, and graceful shutdown.
//!
//! Startup order matters and follows a fixed sequence: reset the runtime
//! state, build the interpreter factory, run the setup script, seal the
//! state, scan the tool directory, start the watcher, build the mux,
//! release background tasks, then serve until a terminating signal.

use std::{net::{SocketAddr, ToSocketAddrs}, path::PathBuf, sync::Arc, time::Duration};

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_server::tls_rustls::RustlsConfig;
use serde_json::json;
use tracing::{error, info, warn};

use scriptling::{
    CallArgs, DirLoader, Interp, LibraryLoader, LibraryRegistry, PathPolicy, RunLimits,
};

use crate::{
    libs::register_server_libs,
    reload::{ToolServerHandle, spawn_watcher},
    routes::{self, AppState},
    state::RuntimeState,
    toolserver::{InterpFactory, ToolServer, handle_rpc},
};

/// Stack reserved for threads that run an interpreter. The tree-walking
/// evaluator needs real stack headroom at the default call-depth limit.
pub const INTERP_STACK_SIZE: usize = 64 * 1024 * 1024;

/// Time allowed for in-flight requests after a termination signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// TLS certificate/key pair paths.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Serving configuration, assembled by the CLI from flags and environment.
#[derive(Clone)]
pub struct ServeConfig {
    /// `host:port` to bind.
    pub addr: String,
    /// Directory of `*.toml` + `*.py` tools; enables `/mcp`.
    pub tool_dir: Option<PathBuf>,
    /// Registers the unrestricted `execute_script` tool. Off by default.
    pub exec_script_tool: bool,
    /// Required `Authorization: Bearer` token, when set.
    pub bearer_token: Option<String>,
    /// Filesystem restriction applied to every interpreter.
    pub path_policy: PathPolicy,
    pub tls: Option<TlsConfig>,
    /// Root for on-demand `*.py` library loading.
    pub libdir: Option<PathBuf>,
    /// Script run once at startup to register routes and tasks.
    pub setup_script: Option<PathBuf>,
    /// Per-invocation deadline for tool calls and route handlers.
    pub tool_timeout: Duration,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8080".to_string(),
            tool_dir: None,
            exec_script_tool: false,
            bearer_token: None,
            path_policy: PathPolicy::default(),
            tls: None,
            libdir: None,
            setup_script: None,
            tool_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("invalid listen address '{0}'")]
    Address(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("filesystem watcher error: {0}")]
    Watcher(#[from] notify_debouncer_full::notify::Error),
    #[error("setup script failed: {0}")]
    Setup(String),
    #[error("interpreter thread panicked")]
    ThreadPanic,
}

/// Builds the per-invocation interpreter factory: shared registry, the
/// serving libraries bound to `state`, the libdir loader, the path policy,
/// and the per-call deadline.
pub fn make_factory(config: &ServeConfig, state: &Arc<RuntimeState>) -> InterpFactory {
    let registry = Arc::new(LibraryRegistry::with_defaults());
    register_server_libs(&registry, state);

    let loader: Option<Arc<dyn LibraryLoader>> = config
        .libdir
        .clone()
        .map(|dir| Arc::new(DirLoader::new(dir)) as Arc<dyn LibraryLoader>);
    let policy = config.path_policy.clone();
    let timeout = config.tool_timeout;

    Arc::new(move || {
        let mut builder = Interp::builder()
            .registry(registry.clone())
            .limits(RunLimits::new().timeout(timeout))
            .path_policy(policy.clone());
        if let Some(loader) = &loader {
            builder = builder.loader(loader.clone());
        }
        builder.build()
    })
}

/// Runs the full serving host until a terminating signal.
pub async fn serve(config: ServeConfig) -> Result<(), ServeError> {
    let addr = resolve_addr(&config.addr)?;

    // 1. Reset process-wide state.
    let state = Arc::new(RuntimeState::new());
    state.reset();

    // 2. Interpreter factory for tools, routes, middleware, and tasks.
    let factory = make_factory(&config, &state);

    // 3. One-shot setup script: the only phase where routes mutate.
    if let Some(setup) = &config.setup_script {
        run_setup_script(&factory, setup)?;
        info!(script = %setup.display(), routes = state.routes_snapshot().len(), "setup script completed");
    }

    // 4. Seal the route table before traffic starts.
    state.seal();

    // 5. Initial tool scan.
    let initial = match &config.tool_dir {
        Some(dir) => ToolServer::scan(dir, config.exec_script_tool)?,
        None => ToolServer::empty(config.exec_script_tool),
    };
    info!(tools = initial.len(), "tool server ready");
    let tools = ToolServerHandle::new(initial, config.tool_dir.clone(), config.exec_script_tool);

    // 6. Debounced watcher; the debouncer must stay alive while serving.
    let _debouncer = spawn_watcher(tools.clone())?;
    spawn_signal_reload(&tools);

    // 7. The mux.
    let app_state = Arc::new(AppState {
        runtime: state.clone(),
        routes: state.routes_snapshot(),
        middleware: state.middleware(),
        factory: factory.clone(),
        tools: tools.clone(),
        bearer_token: config.bearer_token.clone(),
    });
    let router = build_router(app_state, config.tool_dir.is_some() || config.exec_script_tool);

    // 8. Release background tasks now that serving state is final.
    release_background_tasks(&state, &factory);

    // 9. Serve until SIGINT/SIGTERM, then drain with a bounded grace.
    let handle = axum_server::Handle::new();
    tokio::spawn(shutdown_listener(handle.clone()));

    info!(%addr, tls = config.tls.is_some(), "serving");
    match &config.tls {
        Some(tls) => {
            let rustls = RustlsConfig::from_pem_file(&tls.cert, &tls.key).await?;
            axum_server::bind_rustls(addr, rustls)
                .handle(handle)
                .serve(router.into_make_service())
                .await?;
        }
        None => {
            axum_server::bind(addr)
                .handle(handle)
                .serve(router.into_make_service())
                .await?;
        }
    }
    info!("server stopped");
    Ok(())
}

fn resolve_addr(raw: &str) -> Result<SocketAddr, ServeError> {
    raw.to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| ServeError::Address(raw.to_string()))
}

/// Builds the HTTP mux: `/health`, optionally `/mcp`, and the route
/// dispatcher as the fallback. The bearer layer wraps everything except
/// `/health`.
fn build_router(app_state: Arc<AppState>, mcp_enabled: bool) -> Router {
    let mut protected = Router::new();
    if mcp_enabled {
        protected = protected.route("/mcp", post(mcp_handler));
    }
    let protected = protected
        .fallback(routes::dispatch)
        .layer(middleware::from_fn_with_state(app_state.clone(), bearer_auth))
        .with_state(app_state);

    Router::new().route("/health", get(health)).merge(protected)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// `/mcp`: JSON-RPC over HTTP POST, answered against the snapshot loaded
/// at the start of the request.
async fn mcp_handler(State(app): State<Arc<AppState>>, body: Bytes) -> Response {
    let server = app.tools.load();
    let factory = app.factory.clone();
    let result =
        tokio::task::spawn_blocking(move || handle_rpc(&server, &factory, &body)).await;
    match result {
        Ok(Some(response)) => Json(response).into_response(),
        // Notifications get no JSON-RPC response body.
        Ok(None) => StatusCode::ACCEPTED.into_response(),
        Err(err) => {
            error!(error = %err, "mcp task failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn bearer_auth(
    State(app): State<Arc<AppState>>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let Some(expected) = &app.bearer_token else {
        return next.run(request).await;
    };
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| token == expected);
    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "unauthorized" })),
        )
            .into_response();
    }
    next.run(request).await
}

/// Runs the setup script on a dedicated interpreter thread with no
/// deadline; route registration happens through the serving libraries.
fn run_setup_script(factory: &InterpFactory, path: &std::path::Path) -> Result<(), ServeError> {
    let source = std::fs::read_to_string(path)?;
    let name = path.display().to_string();
    let factory = factory.clone();
    let result = std::thread::Builder::new()
        .name("setup-script".to_string())
        .stack_size(INTERP_STACK_SIZE)
        .spawn(move || {
            let mut interp = factory();
            interp.set_limits(RunLimits::new());
            interp.run(&source, &name).map(|_| ()).map_err(|e| e.to_string())
        })?
        .join()
        .map_err(|_| ServeError::ThreadPanic)?;
    result.map_err(ServeError::Setup)
}

/// Releases registered background tasks, each on its own thread with a
/// fresh interpreter.
fn release_background_tasks(state: &Arc<RuntimeState>, factory: &InterpFactory) {
    for task in state.take_background_tasks() {
        let factory = factory.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("task-{task}"))
            .stack_size(INTERP_STACK_SIZE)
            .spawn(move || {
                let mut interp = factory();
                interp.set_limits(RunLimits::new());
                let result = routes::resolve_handler(&mut interp, &task)
                    .and_then(|handler| interp.call(handler, CallArgs::empty()));
                match result {
                    Ok(_) => info!(task, "background task finished"),
                    Err(err) => warn!(task, error = %err, "background task failed"),
                }
            });
        if let Err(err) = spawned {
            warn!(error = %err, "failed to spawn background task thread");
        }
    }
}

/// Forces a tool reload on SIGHUP or SIGUSR1 where supported.
fn spawn_signal_reload(tools: &ToolServerHandle) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        for kind in [SignalKind::hangup(), SignalKind::user_defined1()] {
            let tools = tools.clone();
            tokio::spawn(async move {
                let Ok(mut stream) = signal(kind) else { return };
                while stream.recv().await.is_some() {
                    info!("manual tool reload requested by signal");
                    tools.reload();
                }
            });
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tools;
    }
}

async fn shutdown_listener(handle: axum_server::Handle) {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!(grace = ?SHUTDOWN_GRACE, "shutting down");
    handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
}
