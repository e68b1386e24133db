//! The library registry: named bundles of builtins reachable via `import`.
//!
//! The process-wide registry maps dotted names to *builders*. Each
//! interpreter instantiates a library on first import and caches the result
//! for its own lifetime, so script libraries run their module-level side
//! effects exactly once per interpreter.

use std::{
    path::PathBuf,
    sync::{Arc, RwLock},
};

use ahash::AHashMap;

use crate::{exception::Exception, interp::Interp, libs, value::Value};

/// How a library is materialized inside an interpreter.
#[derive(Clone)]
pub enum LibraryBuilder {
    /// Host-implemented: builds the value table directly.
    Native(Arc<dyn Fn(&mut Interp) -> Result<Value, Exception> + Send + Sync>),
    /// A source string evaluated once per interpreter; the final module
    /// bindings become the library's value table.
    Script(Arc<str>),
}

/// Process-wide mapping of dotted library name to builder.
///
/// Populated before interpreters are handed to user code; after that it is
/// effectively read-only (the lock exists for registration-time use from
/// multiple host threads).
#[derive(Default)]
pub struct LibraryRegistry {
    builders: RwLock<AHashMap<String, LibraryBuilder>>,
}

impl LibraryRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-populated with the standard catalogue.
    #[must_use]
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        libs::register_defaults(&registry);
        registry
    }

    /// Registers a native library under `name`.
    pub fn register_native(
        &self,
        name: &str,
        build: impl Fn(&mut Interp) -> Result<Value, Exception> + Send + Sync + 'static,
    ) {
        self.builders
            .write()
            .expect("library registry lock poisoned")
            .insert(name.to_string(), LibraryBuilder::Native(Arc::new(build)));
    }

    /// Registers a script library from source text.
    pub fn register_script(&self, name: &str, source: &str) {
        self.builders
            .write()
            .expect("library registry lock poisoned")
            .insert(name.to_string(), LibraryBuilder::Script(Arc::from(source)));
    }

    /// Looks up the builder for a dotted name.
    #[must_use]
    pub fn builder(&self, name: &str) -> Option<LibraryBuilder> {
        self.builders
            .read()
            .expect("library registry lock poisoned")
            .get(name)
            .cloned()
    }

    /// Registered dotted names, for diagnostics.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .builders
            .read()
            .expect("library registry lock poisoned")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

/// On-demand library source provider, consulted after a registry miss.
///
/// The spec-level `name -> bool` loader callback is realised as "return the
/// source on success": registration needs the source, and `Some`/`None`
/// carries the boolean.
pub trait LibraryLoader: Send + Sync {
    fn load(&self, name: &str) -> Option<String>;
}

/// Loads `<root>/<name>.py` script libraries, mapping dots to directories.
#[derive(Debug, Clone)]
pub struct DirLoader {
    root: PathBuf,
}

impl DirLoader {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

impl LibraryLoader for DirLoader {
    fn load(&self, name: &str) -> Option<String> {
        // Dotted names map to subdirectories: `a.b` -> `<root>/a/b.py`.
        if name.contains("..") || name.contains('/') || name.contains('\\') {
            return None;
        }
        let mut path = self.root.clone();
        for part in name.split('.') {
            path.push(part);
        }
        path.set_extension("py");
        std::fs::read_to_string(path).ok()
    }
}
