//! Process-wide runtime state: routes, middleware, the shared key-value
//! store, and registered background tasks.
//!
//! The route table and task list are writable only during the setup-script
//! phase; `seal()` closes them before the server starts accepting traffic.
//! The kv store stays writable for the process lifetime behind its mutex.

use std::{
    path::PathBuf,
    sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use ahash::AHashMap;
use indexmap::IndexMap;
use serde_json::Value as JsonValue;

/// Errors from mutating the runtime state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("route table is sealed; routes can only be registered by the setup script")]
    Sealed,
    #[error("route '{0}' is already registered")]
    DuplicateRoute(String),
}

/// One registered HTTP route.
#[derive(Debug, Clone)]
pub struct RouteSpec {
    /// Allowed methods, uppercase.
    pub methods: Vec<String>,
    /// Dotted `lib.function` handler path. Unused for static routes.
    pub handler: String,
    /// Serve files from this directory instead of a script handler.
    pub static_dir: Option<PathBuf>,
}

/// The process-singleton consumed by the serving host.
#[derive(Debug, Default)]
pub struct RuntimeState {
    routes: Mutex<IndexMap<String, RouteSpec>>,
    middleware: Mutex<Option<String>>,
    kv: Mutex<AHashMap<String, JsonValue>>,
    background: Mutex<Vec<String>>,
    sealed: AtomicBool,
}

impl RuntimeState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears everything; called once at server start before the setup
    /// script runs.
    pub fn reset(&self) {
        self.routes.lock().expect("routes lock").clear();
        *self.middleware.lock().expect("middleware lock") = None;
        self.kv.lock().expect("kv lock").clear();
        self.background.lock().expect("background lock").clear();
        self.sealed.store(false, Ordering::SeqCst);
    }

    /// Closes the route table and task list after the setup phase.
    pub fn seal(&self) {
        self.sealed.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::SeqCst)
    }

    pub fn add_route(&self, path: &str, spec: RouteSpec) -> Result<(), StateError> {
        if self.is_sealed() {
            return Err(StateError::Sealed);
        }
        let mut routes = self.routes.lock().expect("routes lock");
        if routes.contains_key(path) {
            return Err(StateError::DuplicateRoute(path.to_string()));
        }
        routes.insert(path.to_string(), spec);
        Ok(())
    }

    pub fn set_middleware(&self, handler: &str) -> Result<(), StateError> {
        if self.is_sealed() {
            return Err(StateError::Sealed);
        }
        *self.middleware.lock().expect("middleware lock") = Some(handler.to_string());
        Ok(())
    }

    pub fn add_background_task(&self, handler: &str) -> Result<(), StateError> {
        if self.is_sealed() {
            return Err(StateError::Sealed);
        }
        self.background.lock().expect("background lock").push(handler.to_string());
        Ok(())
    }

    /// A consistent copy of the route table for request dispatch.
    #[must_use]
    pub fn routes_snapshot(&self) -> IndexMap<String, RouteSpec> {
        self.routes.lock().expect("routes lock").clone()
    }

    #[must_use]
    pub fn middleware(&self) -> Option<String> {
        self.middleware.lock().expect("middleware lock").clone()
    }

    /// Drains the registered background tasks for release.
    #[must_use]
    pub fn take_background_tasks(&self) -> Vec<String> {
        std::mem::take(&mut *self.background.lock().expect("background lock"))
    }

    // ------------------------------------------------------------------
    // Shared key-value store
    // ------------------------------------------------------------------

    pub fn kv_set(&self, key: &str, value: JsonValue) {
        self.kv.lock().expect("kv lock").insert(key.to_string(), value);
    }

    #[must_use]
    pub fn kv_get(&self, key: &str) -> Option<JsonValue> {
        self.kv.lock().expect("kv lock").get(key).cloned()
    }

    pub fn kv_delete(&self, key: &str) -> bool {
        self.kv.lock().expect("kv lock").remove(key).is_some()
    }

    #[must_use]
    pub fn kv_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.kv.lock().expect("kv lock").keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route() -> RouteSpec {
        RouteSpec {
            methods: vec!["GET".to_string()],
            handler: "app.index".to_string(),
            static_dir: None,
        }
    }

    #[test]
    fn sealing_blocks_route_mutation() {
        let state = RuntimeState::new();
        state.add_route("/a", route()).unwrap();
        state.seal();
        assert!(matches!(state.add_route("/b", route()), Err(StateError::Sealed)));
        assert!(matches!(state.set_middleware("app.mw"), Err(StateError::Sealed)));
        assert_eq!(state.routes_snapshot().len(), 1);
    }

    #[test]
    fn duplicate_routes_are_rejected() {
        let state = RuntimeState::new();
        state.add_route("/a", route()).unwrap();
        assert!(matches!(
            state.add_route("/a", route()),
            Err(StateError::DuplicateRoute(_))
        ));
    }

    #[test]
    fn kv_survives_reset_boundaries_within_run() {
        let state = RuntimeState::new();
        state.kv_set("k", serde_json::json!({"n": 1}));
        assert_eq!(state.kv_get("k"), Some(serde_json::json!({"n": 1})));
        assert!(state.kv_delete("k"));
        assert!(!state.kv_delete("k"));
    }

    #[test]
    fn reset_clears_everything() {
        let state = RuntimeState::new();
        state.add_route("/a", route()).unwrap();
        state.kv_set("k", JsonValue::Null);
        state.seal();
        state.reset();
        assert!(state.routes_snapshot().is_empty());
        assert!(state.kv_get("k").is_none());
        assert!(!state.is_sealed());
    }
}
