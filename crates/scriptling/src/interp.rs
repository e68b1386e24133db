//! The interpreter: one isolated execution environment.
//!
//! An `Interp` owns a module-level frame, a per-interpreter library cache,
//! the execution limits, and the print writer. Hosts construct a fresh
//! interpreter per tool call or HTTP request so no script-level state leaks
//! between invocations; the library registry itself is shared and read-only.

use std::{
    rc::Weak,
    sync::Arc,
};

use ahash::{AHashMap, AHashSet};

use crate::{
    ast::StmtKind,
    env::Env,
    eval::{Flow, exec_stmt, expr::eval_expr},
    exception::{ExcType, Exception},
    io::{PrintWriter, StdPrint},
    library::{LibraryBuilder, LibraryLoader, LibraryRegistry},
    limits::RunLimits,
    parser,
    policy::PathPolicy,
    value::{Library, Value},
};

/// A single-threaded interpreter instance.
///
/// Evaluation is strictly sequential within one `Interp`; hosts get
/// parallelism by running many instances on separate threads.
pub struct Interp {
    registry: Arc<LibraryRegistry>,
    loader: Option<Arc<dyn LibraryLoader>>,
    /// Per-interpreter cache of built libraries, keyed by dotted name.
    loaded: AHashMap<String, Value>,
    /// Names the loader has already failed on; it is invoked once per name.
    import_failures: AHashSet<String>,
    /// Dotted names currently being built, for circular-import detection.
    importing: AHashSet<String>,
    pub(crate) limits: RunLimits,
    pub(crate) depth: usize,
    pub(crate) print: Box<dyn PrintWriter>,
    pub(crate) path_policy: PathPolicy,
    globals: Env,
    /// Frames captured by closures/class bodies; cleared on drop to break
    /// reference cycles.
    tracked: Vec<Weak<crate::env::Frame>>,
    /// Stack of exceptions currently being handled, for bare `raise`.
    handling: Vec<Exception>,
}

impl Interp {
    /// Creates an interpreter over the default library registry.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    #[must_use]
    pub fn builder() -> InterpBuilder {
        InterpBuilder::default()
    }

    /// The module-level frame.
    #[must_use]
    pub fn globals(&self) -> &Env {
        &self.globals
    }

    /// Reads a module-level variable.
    #[must_use]
    pub fn get_global(&self, name: &str) -> Option<Value> {
        self.globals.get_here(name)
    }

    /// Binds a module-level variable.
    pub fn set_global(&mut self, name: &str, value: Value) {
        self.globals.set_here(name, value);
    }

    /// Parses and executes `source`. Returns the value of a trailing
    /// expression statement, or `None` when the script ends otherwise.
    pub fn run(&mut self, source: &str, name: &str) -> Result<Value, Exception> {
        let (module, errors) = parser::parse(source);
        if let Some(err) = errors.first() {
            return Err(Exception::new(
                ExcType::SyntaxError,
                format!("{name}:{}:{}: {}", err.line, err.column, err.message),
            )
            .note_line(err.line));
        }

        let globals = self.globals.clone();
        let mut last = Value::None;
        for stmt in &module.body {
            if let StmtKind::Expr(expr) = &stmt.node {
                self.limits
                    .check_interrupt()
                    .map_err(|e| e.note_line(stmt.line))?;
                last = eval_expr(self, &globals, expr)?;
                continue;
            }
            last = Value::None;
            match exec_stmt(self, &globals, stmt)? {
                Flow::Normal => {}
                Flow::Return(_) => {
                    return Err(Exception::new(ExcType::SyntaxError, "'return' outside function")
                        .note_line(stmt.line));
                }
                Flow::Break | Flow::Continue => {
                    return Err(Exception::new(ExcType::SyntaxError, "'break' outside loop")
                        .note_line(stmt.line));
                }
            }
        }
        Ok(last)
    }

    // ------------------------------------------------------------------
    // Imports
    // ------------------------------------------------------------------

    /// Resolves the library registered under the full dotted `name`,
    /// building and caching it on first use.
    pub fn import_library(&mut self, name: &str) -> Result<Value, Exception> {
        if let Some(value) = self.loaded.get(name) {
            return Ok(value.clone());
        }
        if self.import_failures.contains(name) {
            return Err(import_error(name));
        }
        if !self.importing.insert(name.to_string()) {
            return Err(Exception::new(
                ExcType::ImportError,
                format!("circular import of '{name}'"),
            ));
        }
        let result = self.build_library(name);
        self.importing.remove(name);
        match result {
            Ok(value) => {
                self.loaded.insert(name.to_string(), value.clone());
                Ok(value)
            }
            Err(err) => {
                if err.kind.root() == ExcType::ImportError {
                    self.import_failures.insert(name.to_string());
                }
                Err(err)
            }
        }
    }

    fn build_library(&mut self, name: &str) -> Result<Value, Exception> {
        let builder = match self.registry.builder(name) {
            Some(builder) => builder,
            None => {
                // Registry miss: consult the on-demand loader once.
                let Some(loader) = self.loader.clone() else {
                    return Err(import_error(name));
                };
                let Some(source) = loader.load(name) else {
                    return Err(import_error(name));
                };
                LibraryBuilder::Script(Arc::from(source.as_str()))
            }
        };
        match builder {
            LibraryBuilder::Native(build) => build(self),
            LibraryBuilder::Script(source) => self.build_script_library(name, &source),
        }
    }

    /// Evaluates a script library once; its module bindings become the
    /// library's value table.
    fn build_script_library(&mut self, name: &str, source: &str) -> Result<Value, Exception> {
        let outer_globals = self.globals.clone();
        let lib_env = Env::module();
        self.track_frame(&lib_env);
        self.globals = lib_env.clone();
        let result = self.run(source, name);
        self.globals = outer_globals;
        result?;

        let library = Library::new(name, format!("script library '{name}'"));
        for (binding, value) in lib_env.bindings() {
            library.set(binding, value);
        }
        Ok(Value::Library(std::rc::Rc::new(library)))
    }

    /// Executes `import module [as alias]` binding rules.
    pub(crate) fn bind_import(&mut self, env: &Env, module: &str, alias: Option<&str>) -> Result<(), Exception> {
        let leaf = self.import_library(module)?;
        match alias {
            // `import a.b as x` binds the leaf.
            Some(alias) => env.assign(alias, leaf),
            None => {
                let (top_name, top_value) = self.namespace_for(module, &leaf)?;
                env.assign(&top_name, top_value)
            }
        }
    }

    /// Executes `from module import x [as y], ...`.
    pub(crate) fn bind_from_import(
        &mut self,
        env: &Env,
        module: &str,
        names: &[(String, Option<String>)],
    ) -> Result<(), Exception> {
        let leaf = self.import_library(module)?;
        let Value::Library(lib) = &leaf else {
            return Err(import_error(module));
        };
        for (name, alias) in names {
            let value = lib.get(name).ok_or_else(|| {
                Exception::new(
                    ExcType::ImportError,
                    format!("cannot import name '{name}' from '{module}'"),
                )
            })?;
            env.assign(alias.as_deref().unwrap_or(name), value)?;
        }
        Ok(())
    }

    /// For `import a.b.c`, produces the top-level binding `a` with namespace
    /// libraries chained down to the leaf.
    fn namespace_for(&mut self, dotted: &str, leaf: &Value) -> Result<(String, Value), Exception> {
        let parts: Vec<&str> = dotted.split('.').collect();
        if parts.len() == 1 {
            return Ok((dotted.to_string(), leaf.clone()));
        }

        // Build (or reuse) a namespace library per dotted prefix, so
        // `import a.b.c` and `import a.b.d` share the same `a` and `a.b`.
        let mut chain: Vec<Value> = Vec::with_capacity(parts.len());
        for depth in 1..parts.len() {
            let prefix = parts[..depth].join(".");
            let value = if let Some(existing) = self.loaded.get(&prefix) {
                existing.clone()
            } else if self.registry.builder(&prefix).is_some() {
                self.import_library(&prefix)?
            } else {
                let namespace = Value::Library(std::rc::Rc::new(Library::new(
                    prefix.clone(),
                    format!("namespace '{prefix}'"),
                )));
                self.loaded.insert(prefix, namespace.clone());
                namespace
            };
            chain.push(value);
        }
        chain.push(leaf.clone());

        // Attach each element to its parent namespace.
        for (i, child) in chain.iter().enumerate().skip(1) {
            if let Value::Library(parent) = &chain[i - 1] {
                parent.set(parts[i], child.clone());
            }
        }
        Ok((parts[0].to_string(), chain[0].clone()))
    }

    // ------------------------------------------------------------------
    // Evaluator support
    // ------------------------------------------------------------------

    /// Registers a frame for teardown clearing; called whenever a closure
    /// or class body captures it.
    pub(crate) fn track_frame(&mut self, env: &Env) {
        self.tracked.push(env.downgrade());
    }

    pub(crate) fn push_handling(&mut self, exc: Exception) {
        self.handling.push(exc);
    }

    pub(crate) fn pop_handling(&mut self) {
        self.handling.pop();
    }

    /// The exception a bare `raise` re-raises.
    #[must_use]
    pub(crate) fn current_exception(&self) -> Option<Exception> {
        self.handling.last().cloned()
    }

    /// Replaces the print writer, returning the old one.
    pub fn set_print_writer(&mut self, writer: Box<dyn PrintWriter>) -> Box<dyn PrintWriter> {
        std::mem::replace(&mut self.print, writer)
    }

    /// Invokes a callable value — the host-side entry for dispatching into
    /// script functions (route handlers, middleware, background tasks).
    pub fn call(&mut self, callee: Value, args: crate::eval::call::CallArgs) -> Result<Value, Exception> {
        crate::eval::call::call_value(self, callee, args, 0)
    }

    /// Replaces the execution limits for subsequent runs, e.g. to lift a
    /// factory's per-call deadline for a long-lived background task.
    pub fn set_limits(&mut self, limits: RunLimits) {
        self.limits = limits;
    }
}

impl Default for Interp {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Interp {
    fn drop(&mut self) {
        // Break closure <-> frame cycles so the arena of values allocated by
        // this interpreter is actually released.
        for weak in &self.tracked {
            Env::clear_weak(weak);
        }
        self.globals.clear();
    }
}

fn import_error(name: &str) -> Exception {
    Exception::new(ExcType::ImportError, format!("no library named '{name}'"))
}

/// Builder for [`Interp`].
#[derive(Default)]
pub struct InterpBuilder {
    registry: Option<Arc<LibraryRegistry>>,
    loader: Option<Arc<dyn LibraryLoader>>,
    limits: RunLimits,
    print: Option<Box<dyn PrintWriter>>,
    path_policy: PathPolicy,
}

impl InterpBuilder {
    /// Shares a pre-built library registry; defaults to the standard
    /// catalogue.
    #[must_use]
    pub fn registry(mut self, registry: Arc<LibraryRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Installs an on-demand library loader (e.g. the `--libdir` loader).
    #[must_use]
    pub fn loader(mut self, loader: Arc<dyn LibraryLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    #[must_use]
    pub fn limits(mut self, limits: RunLimits) -> Self {
        self.limits = limits;
        self
    }

    #[must_use]
    pub fn print_writer(mut self, writer: Box<dyn PrintWriter>) -> Self {
        self.print = Some(writer);
        self
    }

    #[must_use]
    pub fn path_policy(mut self, policy: PathPolicy) -> Self {
        self.path_policy = policy;
        self
    }

    #[must_use]
    pub fn build(self) -> Interp {
        Interp {
            registry: self.registry.unwrap_or_else(|| Arc::new(LibraryRegistry::with_defaults())),
            loader: self.loader,
            loaded: AHashMap::new(),
            import_failures: AHashSet::new(),
            importing: AHashSet::new(),
            limits: self.limits,
            depth: 0,
            print: self.print.unwrap_or_else(|| Box::new(StdPrint)),
            path_policy: self.path_policy,
            globals: Env::module(),
            tracked: Vec::new(),
            handling: Vec::new(),
        }
    }
}
