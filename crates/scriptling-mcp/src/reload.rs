//! Hot reload: a debounced filesystem watcher over the tool directory that
//! rebuilds the tool server and atomically swaps the shared pointer.
//!
//! Readers (`/mcp` requests) load the pointer once per request and keep
//! using that snapshot; a reload mid-call never mixes old and new tools.

use std::{path::PathBuf, sync::Arc, time::Duration};

use arc_swap::ArcSwap;
use notify_debouncer_full::{
    DebounceEventResult, Debouncer, RecommendedCache, new_debouncer,
    notify::{self, RecursiveMode},
};
use tracing::{info, warn};

use crate::toolserver::ToolServer;

/// Filesystem events within this window coalesce to one reload.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

/// Shared handle to the current tool-server snapshot.
#[derive(Clone)]
pub struct ToolServerHandle {
    current: Arc<ArcSwap<ToolServer>>,
    dir: Option<PathBuf>,
    exec_enabled: bool,
}

impl ToolServerHandle {
    #[must_use]
    pub fn new(initial: ToolServer, dir: Option<PathBuf>, exec_enabled: bool) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(initial)),
            dir,
            exec_enabled,
        }
    }

    /// The snapshot for one request.
    #[must_use]
    pub fn load(&self) -> Arc<ToolServer> {
        self.current.load_full()
    }

    /// Rescans the tool directory and swaps in the result. Keeps the old
    /// snapshot when the scan fails.
    pub fn reload(&self) {
        let Some(dir) = &self.dir else { return };
        match ToolServer::scan(dir, self.exec_enabled) {
            Ok(server) => {
                info!(tools = server.len(), dir = %dir.display(), "tool server reloaded");
                self.current.store(Arc::new(server));
            }
            Err(err) => {
                warn!(error = %err, dir = %dir.display(), "tool rescan failed; keeping previous tool set");
            }
        }
    }
}

/// Starts the debounced watcher. The returned debouncer must be kept alive
/// for the watch to stay active.
pub fn spawn_watcher(
    handle: ToolServerHandle,
) -> Result<Option<Debouncer<notify::RecommendedWatcher, RecommendedCache>>, notify::Error> {
    let Some(dir) = handle.dir.clone() else {
        return Ok(None);
    };

    let reload_handle = handle.clone();
    let mut debouncer = new_debouncer(
        DEBOUNCE_WINDOW,
        None,
        move |result: DebounceEventResult| match result {
            Ok(_events) => reload_handle.reload(),
            Err(errors) => {
                for err in errors {
                    warn!(error = %err, "filesystem watcher error");
                }
            }
        },
    )?;
    debouncer.watch(&dir, RecursiveMode::Recursive)?;
    info!(dir = %dir.display(), "watching tool directory for changes");
    Ok(Some(debouncer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reload_swaps_the_snapshot_atomically() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("greet.toml"), "description = \"hi\"").unwrap();
        std::fs::write(dir.path().join("greet.py"), "pass").unwrap();

        let initial = ToolServer::scan(dir.path(), false).unwrap();
        let handle = ToolServerHandle::new(initial, Some(dir.path().to_path_buf()), false);
        let before = handle.load();
        assert_eq!(before.tool_names(), vec!["greet"]);

        // A new tool appears; a reload picks it up while the old snapshot
        // keeps answering for in-flight calls.
        std::fs::write(dir.path().join("echo.toml"), "description = \"echo\"").unwrap();
        std::fs::write(dir.path().join("echo.py"), "pass").unwrap();
        handle.reload();

        let after = handle.load();
        assert_eq!(after.tool_names(), vec!["echo", "greet"]);
        // The pre-reload snapshot is unchanged.
        assert_eq!(before.tool_names(), vec!["greet"]);
    }

    #[test]
    fn failed_rescan_keeps_previous_set() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.toml"), "description = \"a\"").unwrap();
        std::fs::write(dir.path().join("a.py"), "pass").unwrap();
        let initial = ToolServer::scan(dir.path(), false).unwrap();

        let handle = ToolServerHandle::new(initial, Some(dir.path().join("missing")), false);
        handle.reload();
        assert_eq!(handle.load().tool_names(), vec!["a"]);
    }
}
