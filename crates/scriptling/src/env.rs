//! Lexical environments.
//!
//! An environment is a tree of frames. Each frame maps names to values and
//! points at its enclosing frame; the module frame is the root. Free
//! variables resolve by walking enclosing frames, skipping class frames
//! (class bodies are not enclosing scopes for the functions defined inside
//! them). `global` and `nonlocal` declarations are per-frame sets consulted
//! on assignment and lookup.

use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use ahash::AHashSet;
use indexmap::IndexMap;

use crate::{
    exception::{ExcType, Exception},
    value::Value,
};

/// What kind of scope a frame represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Module,
    Function,
    Class,
    Comprehension,
}

#[derive(Debug)]
pub(crate) struct Frame {
    kind: FrameKind,
    /// Bindings in insertion order; class bodies and script libraries read
    /// this order back out.
    vars: RefCell<IndexMap<String, Value>>,
    parent: Option<Env>,
    declared_global: RefCell<AHashSet<String>>,
    declared_nonlocal: RefCell<AHashSet<String>>,
}

/// A shared handle to one frame.
#[derive(Debug, Clone)]
pub struct Env(Rc<Frame>);

impl Env {
    /// Creates a fresh module-level frame.
    #[must_use]
    pub fn module() -> Self {
        Self(Rc::new(Frame {
            kind: FrameKind::Module,
            vars: RefCell::new(IndexMap::new()),
            parent: None,
            declared_global: RefCell::new(AHashSet::new()),
            declared_nonlocal: RefCell::new(AHashSet::new()),
        }))
    }

    /// Creates a child frame enclosed by `self`.
    #[must_use]
    pub fn child(&self, kind: FrameKind) -> Self {
        Self(Rc::new(Frame {
            kind,
            vars: RefCell::new(IndexMap::new()),
            parent: Some(self.clone()),
            declared_global: RefCell::new(AHashSet::new()),
            declared_nonlocal: RefCell::new(AHashSet::new()),
        }))
    }

    #[must_use]
    pub fn kind(&self) -> FrameKind {
        self.0.kind
    }

    /// The module frame at the root of this chain.
    #[must_use]
    pub fn globals(&self) -> Self {
        let mut current = self.clone();
        loop {
            match &current.0.parent {
                Some(parent) => current = parent.clone(),
                None => return current,
            }
        }
    }

    #[must_use]
    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Looks up `name`, honouring `global`/`nonlocal` declarations, then the
    /// frame chain (skipping class frames), and raising `NameError` on miss.
    pub fn lookup(&self, name: &str) -> Result<Value, Exception> {
        if self.0.declared_global.borrow().contains(name) {
            return self
                .globals()
                .get_here(name)
                .ok_or_else(|| Exception::name_error(name));
        }
        if self.0.declared_nonlocal.borrow().contains(name) {
            return match self.nonlocal_frame(name) {
                Some(frame) => frame
                    .get_here(name)
                    .ok_or_else(|| Exception::name_error(name)),
                None => Err(Exception::name_error(name)),
            };
        }
        if let Some(value) = self.get_here(name) {
            return Ok(value);
        }
        let mut current = self.0.parent.clone();
        while let Some(env) = current {
            // Class frames enclose lexically but are invisible to nested
            // function bodies.
            if env.0.kind != FrameKind::Class {
                if let Some(value) = env.get_here(name) {
                    return Ok(value);
                }
            }
            current = env.0.parent.clone();
        }
        Err(Exception::name_error(name))
    }

    /// Looks up `name` without raising.
    #[must_use]
    pub fn try_lookup(&self, name: &str) -> Option<Value> {
        self.lookup(name).ok()
    }

    /// Binds `name` in the appropriate frame: the declared `global`/
    /// `nonlocal` target if present, otherwise the current frame.
    pub fn assign(&self, name: &str, value: Value) -> Result<(), Exception> {
        if self.0.declared_global.borrow().contains(name) {
            self.globals().set_here(name, value);
            return Ok(());
        }
        if self.0.declared_nonlocal.borrow().contains(name) {
            return match self.nonlocal_frame(name) {
                Some(frame) => {
                    frame.set_here(name, value);
                    Ok(())
                }
                None => Err(Exception::new(
                    ExcType::SyntaxError,
                    format!("no binding for nonlocal '{name}' found"),
                )),
            };
        }
        self.set_here(name, value);
        Ok(())
    }

    /// Reads a binding from this frame only.
    #[must_use]
    pub fn get_here(&self, name: &str) -> Option<Value> {
        self.0.vars.borrow().get(name).cloned()
    }

    /// Writes a binding into this frame only.
    pub fn set_here(&self, name: &str, value: Value) {
        self.0.vars.borrow_mut().insert(name.to_string(), value);
    }

    /// Marks `name` as referring to the module frame.
    pub fn declare_global(&self, name: &str) {
        self.0.declared_global.borrow_mut().insert(name.to_string());
    }

    /// Marks `name` as referring to the nearest enclosing function frame
    /// that binds it. Errors when no such frame exists.
    pub fn declare_nonlocal(&self, name: &str) -> Result<(), Exception> {
        if self.nonlocal_frame(name).is_none() {
            return Err(Exception::new(
                ExcType::SyntaxError,
                format!("no binding for nonlocal '{name}' found"),
            ));
        }
        self.0.declared_nonlocal.borrow_mut().insert(name.to_string());
        Ok(())
    }

    /// The nearest enclosing function frame that binds `name`.
    fn nonlocal_frame(&self, name: &str) -> Option<Self> {
        let mut current = self.0.parent.clone();
        while let Some(env) = current {
            if env.0.kind == FrameKind::Function && env.0.vars.borrow().contains_key(name) {
                return Some(env);
            }
            if env.0.kind == FrameKind::Module {
                return None;
            }
            current = env.0.parent.clone();
        }
        None
    }

    /// Snapshot of this frame's bindings in insertion order. Used for class
    /// bodies and script-library collection.
    #[must_use]
    pub fn bindings(&self) -> Vec<(String, Value)> {
        self.0
            .vars
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub(crate) fn downgrade(&self) -> Weak<Frame> {
        Rc::downgrade(&self.0)
    }

    /// Clears every binding in the frame behind `weak`, breaking
    /// closure/frame reference cycles at interpreter teardown.
    pub(crate) fn clear_weak(weak: &Weak<Frame>) {
        if let Some(frame) = weak.upgrade() {
            frame.vars.borrow_mut().clear();
        }
    }

    /// Clears this frame's bindings.
    pub(crate) fn clear(&self) {
        self.0.vars.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignment_binds_in_current_frame() {
        let module = Env::module();
        let func = module.child(FrameKind::Function);
        func.assign("x", Value::Int(1)).unwrap();
        assert!(func.get_here("x").is_some());
        assert!(module.get_here("x").is_none());
    }

    #[test]
    fn free_variables_resolve_outward() {
        let module = Env::module();
        module.set_here("x", Value::Int(10));
        let func = module.child(FrameKind::Function);
        assert_eq!(func.lookup("x").unwrap().repr(), "10");
    }

    #[test]
    fn lookup_never_falls_off_root() {
        let module = Env::module();
        let err = module.lookup("missing").unwrap_err();
        assert!(err.to_string().contains("NameError"));
    }

    #[test]
    fn global_declaration_rebinds_module_frame() {
        let module = Env::module();
        module.set_here("x", Value::Int(1));
        let func = module.child(FrameKind::Function);
        func.declare_global("x");
        func.assign("x", Value::Int(2)).unwrap();
        assert_eq!(module.get_here("x").unwrap().repr(), "2");
        assert!(func.get_here("x").is_none());
    }

    #[test]
    fn nonlocal_targets_nearest_function_frame() {
        let module = Env::module();
        let outer = module.child(FrameKind::Function);
        outer.set_here("x", Value::Int(1));
        let inner = outer.child(FrameKind::Function);
        inner.declare_nonlocal("x").unwrap();
        inner.assign("x", Value::Int(2)).unwrap();
        assert_eq!(outer.get_here("x").unwrap().repr(), "2");
        assert!(inner.get_here("x").is_none());
    }

    #[test]
    fn nonlocal_without_binding_errors() {
        let module = Env::module();
        let func = module.child(FrameKind::Function);
        assert!(func.declare_nonlocal("missing").is_err());
    }

    #[test]
    fn class_frames_are_skipped_in_lookup() {
        let module = Env::module();
        let class = module.child(FrameKind::Class);
        class.set_here("attr", Value::Int(1));
        let method = class.child(FrameKind::Function);
        assert!(method.lookup("attr").is_err());
    }
}
