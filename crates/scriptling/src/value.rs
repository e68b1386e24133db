//! Runtime values.
//!
//! The value universe is a tagged sum type. Containers and user objects are
//! reference-shared via `Rc`; cloning a `Value` is always cheap. Dicts and
//! sets are insertion-ordered (`IndexMap`/`IndexSet`), which several JSON
//! paths rely on.

use std::{
    cell::RefCell,
    fmt,
    hash::{Hash, Hasher},
    rc::Rc,
};

use indexmap::{IndexMap, IndexSet};

use crate::{
    ast::Stmt,
    env::Env,
    eval::call::CallArgs,
    exception::{ExcType, Exception},
    interp::Interp,
};

/// Maximum nesting depth for repr/str of data structures. Guards against
/// self-referential containers blowing the host stack.
const MAX_REPR_DEPTH: usize = 16;

/// Signature of a host-implemented builtin.
pub type NativeFn = Rc<dyn Fn(&mut Interp, CallArgs) -> Result<Value, Exception>>;

/// A runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<RefCell<Vec<Value>>>),
    Tuple(Rc<Vec<Value>>),
    Dict(Rc<RefCell<Dict>>),
    Set(Rc<RefCell<Set>>),
    /// Lazy integer range produced by `range()`.
    Range(Range),
    Function(Rc<Function>),
    Builtin(Rc<Builtin>),
    /// A method bound to its receiver.
    Bound(Rc<Bound>),
    Class(Rc<Class>),
    Instance(Rc<Instance>),
    /// A built-in exception class such as `ValueError`.
    ExcClass(ExcType),
    /// A raised built-in exception bound by `except ... as e`.
    ExcValue(Rc<Exception>),
    Library(Rc<Library>),
    /// Host-owned handle visible to scripts as an opaque object.
    Opaque(Rc<Opaque>),
}

impl Value {
    #[must_use]
    pub fn str(text: impl AsRef<str>) -> Self {
        Self::Str(Rc::from(text.as_ref()))
    }

    #[must_use]
    pub fn list(items: Vec<Self>) -> Self {
        Self::List(Rc::new(RefCell::new(items)))
    }

    #[must_use]
    pub fn tuple(items: Vec<Self>) -> Self {
        Self::Tuple(Rc::new(items))
    }

    #[must_use]
    pub fn dict(dict: Dict) -> Self {
        Self::Dict(Rc::new(RefCell::new(dict)))
    }

    #[must_use]
    pub fn set(set: Set) -> Self {
        Self::Set(Rc::new(RefCell::new(set)))
    }

    /// The type name used in error messages and by `type()`.
    #[must_use]
    pub fn type_name(&self) -> String {
        match self {
            Self::None => "NoneType".to_string(),
            Self::Bool(_) => "bool".to_string(),
            Self::Int(_) => "int".to_string(),
            Self::Float(_) => "float".to_string(),
            Self::Str(_) => "str".to_string(),
            Self::List(_) => "list".to_string(),
            Self::Tuple(_) => "tuple".to_string(),
            Self::Dict(_) => "dict".to_string(),
            Self::Set(_) => "set".to_string(),
            Self::Range(_) => "range".to_string(),
            Self::Function(_) | Self::Bound(_) => "function".to_string(),
            Self::Builtin(_) => "builtin_function_or_method".to_string(),
            Self::Class(class) => class.name.clone(),
            Self::Instance(instance) => instance.class.name.clone(),
            Self::ExcClass(t) => t.to_string(),
            Self::ExcValue(exc) => exc.kind.name(),
            Self::Library(lib) => format!("library '{}'", lib.name),
            Self::Opaque(opaque) => opaque.type_tag.to_string(),
        }
    }

    /// Python truthiness: `False`, `None`, numeric zero, and empty
    /// containers are falsy.
    #[must_use]
    pub fn truthy(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::List(items) => !items.borrow().is_empty(),
            Self::Tuple(items) => !items.is_empty(),
            Self::Dict(dict) => dict.borrow().len() != 0,
            Self::Set(set) => set.borrow().len() != 0,
            Self::Range(range) => range.len() != 0,
            _ => true,
        }
    }

    /// `repr()` of the value.
    #[must_use]
    pub fn repr(&self) -> String {
        let mut out = String::new();
        self.write_repr(&mut out, 0);
        out
    }

    /// `str()` of the value: strings render bare, everything else as repr.
    #[must_use]
    pub fn str_value(&self) -> String {
        match self {
            Self::Str(s) => s.to_string(),
            Self::ExcValue(exc) => exc.message.clone().unwrap_or_default(),
            _ => self.repr(),
        }
    }

    fn write_repr(&self, out: &mut String, depth: usize) {
        use fmt::Write;
        if depth > MAX_REPR_DEPTH {
            out.push_str("...");
            return;
        }
        match self {
            Self::None => out.push_str("None"),
            Self::Bool(true) => out.push_str("True"),
            Self::Bool(false) => out.push_str("False"),
            Self::Int(i) => {
                let _ = write!(out, "{i}");
            }
            Self::Float(f) => out.push_str(&format_float(*f)),
            Self::Str(s) => {
                let _ = write!(out, "{}", StrRepr(s));
            }
            Self::List(items) => {
                out.push('[');
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.write_repr(out, depth + 1);
                }
                out.push(']');
            }
            Self::Tuple(items) => {
                out.push('(');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.write_repr(out, depth + 1);
                }
                if items.len() == 1 {
                    out.push(',');
                }
                out.push(')');
            }
            Self::Dict(dict) => {
                out.push('{');
                for (i, (key, value)) in dict.borrow().iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    key.write_repr(out, depth + 1);
                    out.push_str(": ");
                    value.write_repr(out, depth + 1);
                }
                out.push('}');
            }
            Self::Set(set) => {
                if set.borrow().len() == 0 {
                    out.push_str("set()");
                    return;
                }
                out.push('{');
                for (i, item) in set.borrow().iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.write_repr(out, depth + 1);
                }
                out.push('}');
            }
            Self::Range(range) => {
                if range.step == 1 {
                    let _ = write!(out, "range({}, {})", range.start, range.stop);
                } else {
                    let _ = write!(out, "range({}, {}, {})", range.start, range.stop, range.step);
                }
            }
            Self::Function(func) => {
                let _ = write!(out, "<function {}>", func.name);
            }
            Self::Builtin(builtin) => {
                let _ = write!(out, "<built-in function {}>", builtin.name);
            }
            Self::Bound(bound) => {
                let _ = write!(out, "<bound method {}>", bound.name());
            }
            Self::Class(class) => {
                let _ = write!(out, "<class '{}'>", class.name);
            }
            Self::Instance(instance) => {
                let _ = write!(out, "<{} object>", instance.class.name);
            }
            Self::ExcClass(t) => {
                let _ = write!(out, "<class '{t}'>");
            }
            Self::ExcValue(exc) => {
                let _ = write!(out, "{}({})", exc.kind.name(), StrRepr(exc.message.as_deref().unwrap_or("")));
            }
            Self::Library(lib) => {
                let _ = write!(out, "<library '{}'>", lib.name);
            }
            Self::Opaque(opaque) => {
                let _ = write!(out, "<{} object>", opaque.type_tag);
            }
        }
    }

    /// Whether the value may be used as a dict key or set element.
    #[must_use]
    pub fn is_hashable(&self) -> bool {
        match self {
            Self::List(_) | Self::Dict(_) | Self::Set(_) => false,
            Self::Tuple(items) => items.iter().all(Self::is_hashable),
            _ => true,
        }
    }
}

/// Python-style shortest float formatting; whole floats keep a `.0`.
#[must_use]
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf".to_string() } else { "-inf".to_string() };
    }
    let mut buffer = ryu::Buffer::new();
    buffer.format(f).to_string()
}

/// Helper that renders a string with Python repr quoting.
struct StrRepr<'a>(&'a str);

impl fmt::Display for StrRepr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let quote = if self.0.contains('\'') && !self.0.contains('"') { '"' } else { '\'' };
        f.write_str(&quote.to_string())?;
        for c in self.0.chars() {
            match c {
                '\n' => f.write_str("\\n")?,
                '\t' => f.write_str("\\t")?,
                '\r' => f.write_str("\\r")?,
                '\\' => f.write_str("\\\\")?,
                c if c == quote => write!(f, "\\{c}")?,
                c => write!(f, "{c}")?,
            }
        }
        f.write_str(&quote.to_string())
    }
}

/// Structural equality with Python semantics: numeric values compare across
/// `bool`/`int`/`float`, containers compare element-wise, everything else
/// compares by identity.
#[must_use]
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::None, Value::None) => true,
        (
            Value::Bool(_) | Value::Int(_) | Value::Float(_),
            Value::Bool(_) | Value::Int(_) | Value::Float(_),
        ) => match (numeric_value(a), numeric_value(b)) {
            ((Some(x), _), (Some(y), _)) => x == y,
            ((Some(x), _), (None, Some(y))) | ((None, Some(y)), (Some(x), _)) => (x as f64) == y,
            ((None, Some(x)), (None, Some(y))) => x == y,
            _ => false,
        },
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::List(x), Value::List(y)) => {
            if Rc::ptr_eq(x, y) {
                return true;
            }
            let (x, y) = (x.borrow(), y.borrow());
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(a, b)| values_equal(a, b))
        }
        (Value::Tuple(x), Value::Tuple(y)) => {
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(a, b)| values_equal(a, b))
        }
        (Value::Dict(x), Value::Dict(y)) => {
            if Rc::ptr_eq(x, y) {
                return true;
            }
            let (x, y) = (x.borrow(), y.borrow());
            x.len() == y.len()
                && x.iter().all(|(key, value)| {
                    y.get_ok(key).is_some_and(|other| values_equal(value, &other))
                })
        }
        (Value::Set(x), Value::Set(y)) => {
            if Rc::ptr_eq(x, y) {
                return true;
            }
            let (x, y) = (x.borrow(), y.borrow());
            x.len() == y.len() && x.iter().all(|item| y.contains_ok(item))
        }
        (Value::Range(x), Value::Range(y)) => x == y,
        (Value::Function(x), Value::Function(y)) => Rc::ptr_eq(x, y),
        (Value::Builtin(x), Value::Builtin(y)) => Rc::ptr_eq(x, y),
        (Value::Bound(x), Value::Bound(y)) => Rc::ptr_eq(x, y),
        (Value::Class(x), Value::Class(y)) => Rc::ptr_eq(x, y),
        (Value::Instance(x), Value::Instance(y)) => Rc::ptr_eq(x, y),
        (Value::ExcClass(x), Value::ExcClass(y)) => x == y,
        (Value::ExcValue(x), Value::ExcValue(y)) => Rc::ptr_eq(x, y),
        (Value::Library(x), Value::Library(y)) => Rc::ptr_eq(x, y),
        (Value::Opaque(x), Value::Opaque(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

/// Splits a numeric value into `(int, float)` alternatives for mixed
/// comparison; booleans count as integers.
fn numeric_value(v: &Value) -> (Option<i64>, Option<f64>) {
    match v {
        Value::Bool(b) => (Some(i64::from(*b)), None),
        Value::Int(i) => (Some(*i), None),
        Value::Float(f) => (None, Some(*f)),
        _ => (None, None),
    }
}

/// A hashable dict key / set element.
///
/// Construction goes through [`Key::try_new`], which rejects unhashable
/// variants, so the `Hash` impl only ever sees hashable values.
#[derive(Debug, Clone)]
pub struct Key(Value);

impl Key {
    pub fn try_new(value: Value) -> Result<Self, Exception> {
        if value.is_hashable() {
            Ok(Self(value))
        } else {
            Err(Exception::type_error(format!(
                "unhashable type: '{}'",
                value.type_name()
            )))
        }
    }

    #[must_use]
    pub fn value(&self) -> &Value {
        &self.0
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        self.0
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        values_equal(&self.0, &other.0)
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_value(&self.0, state);
    }
}

fn hash_value<H: Hasher>(value: &Value, state: &mut H) {
    match value {
        Value::None => state.write_u8(0),
        // Numeric unification: True, 1, and 1.0 must hash identically.
        Value::Bool(b) => {
            state.write_u8(1);
            state.write_i64(i64::from(*b));
        }
        Value::Int(i) => {
            state.write_u8(1);
            state.write_i64(*i);
        }
        Value::Float(f) => {
            if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                state.write_u8(1);
                state.write_i64(*f as i64);
            } else {
                state.write_u8(2);
                state.write_u64(f.to_bits());
            }
        }
        Value::Str(s) => {
            state.write_u8(3);
            s.hash(state);
        }
        Value::Tuple(items) => {
            state.write_u8(4);
            state.write_usize(items.len());
            for item in items.iter() {
                hash_value(item, state);
            }
        }
        Value::Range(range) => {
            state.write_u8(5);
            range.start.hash(state);
            range.stop.hash(state);
            range.step.hash(state);
        }
        Value::ExcClass(t) => {
            state.write_u8(6);
            t.hash(state);
        }
        Value::Function(rc) => ptr_hash(rc, 7, state),
        Value::Builtin(rc) => ptr_hash(rc, 8, state),
        Value::Bound(rc) => ptr_hash(rc, 9, state),
        Value::Class(rc) => ptr_hash(rc, 10, state),
        Value::Instance(rc) => ptr_hash(rc, 11, state),
        Value::ExcValue(rc) => ptr_hash(rc, 12, state),
        Value::Library(rc) => ptr_hash(rc, 13, state),
        Value::Opaque(rc) => ptr_hash(rc, 14, state),
        // Unhashable variants are rejected by Key::try_new.
        Value::List(_) | Value::Dict(_) | Value::Set(_) => state.write_u8(255),
    }
}

fn ptr_hash<T, H: Hasher>(rc: &Rc<T>, tag: u8, state: &mut H) {
    state.write_u8(tag);
    state.write_usize(Rc::as_ptr(rc) as usize);
}

/// An insertion-ordered mapping with hashable keys.
#[derive(Debug, Clone, Default)]
pub struct Dict {
    entries: IndexMap<Key, Value>,
}

impl Dict {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: Value, value: Value) -> Result<(), Exception> {
        self.entries.insert(Key::try_new(key)?, value);
        Ok(())
    }

    /// Inserts a string key; infallible since strings always hash.
    pub fn insert_str(&mut self, key: &str, value: Value) {
        self.entries.insert(Key(Value::str(key)), value);
    }

    pub fn get(&self, key: &Value) -> Result<Option<Value>, Exception> {
        Ok(self.get_key(&Key::try_new(key.clone())?))
    }

    fn get_key(&self, key: &Key) -> Option<Value> {
        self.entries.get(key).cloned()
    }

    /// Lookup that treats an unhashable probe as missing.
    #[must_use]
    pub(crate) fn get_ok(&self, key: &Value) -> Option<Value> {
        Key::try_new(key.clone()).ok().and_then(|k| self.get_key(&k))
    }

    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<Value> {
        self.get_key(&Key(Value::str(key)))
    }

    /// Removes a key, preserving the order of remaining entries.
    pub fn remove(&mut self, key: &Value) -> Result<Option<Value>, Exception> {
        Ok(self.entries.shift_remove(&Key::try_new(key.clone())?))
    }

    pub fn contains(&self, key: &Value) -> Result<bool, Exception> {
        Ok(self.entries.contains_key(&Key::try_new(key.clone())?))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|(k, v)| (&k.0, v))
    }

    #[must_use]
    pub fn keys(&self) -> Vec<Value> {
        self.entries.keys().map(|k| k.0.clone()).collect()
    }

    #[must_use]
    pub fn values(&self) -> Vec<Value> {
        self.entries.values().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// An insertion-ordered collection with set semantics.
#[derive(Debug, Clone, Default)]
pub struct Set {
    entries: IndexSet<Key>,
}

impl Set {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, value: Value) -> Result<(), Exception> {
        self.entries.insert(Key::try_new(value)?);
        Ok(())
    }

    pub fn remove(&mut self, value: &Value) -> Result<bool, Exception> {
        Ok(self.entries.shift_remove(&Key::try_new(value.clone())?))
    }

    pub fn contains(&self, value: &Value) -> Result<bool, Exception> {
        Ok(self.entries.contains(&Key::try_new(value.clone())?))
    }

    #[must_use]
    pub(crate) fn contains_ok(&self, value: &Value) -> bool {
        Key::try_new(value.clone()).is_ok_and(|k| self.entries.contains(&k))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|k| &k.0)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// A lazy `range()` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: i64,
    pub stop: i64,
    pub step: i64,
}

impl Range {
    /// Number of values the range yields.
    #[must_use]
    pub fn len(&self) -> usize {
        if self.step > 0 {
            if self.stop > self.start {
                ((self.stop - self.start - 1) / self.step + 1) as usize
            } else {
                0
            }
        } else if self.start > self.stop {
            ((self.start - self.stop - 1) / (-self.step) + 1) as usize
        } else {
            0
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn contains(&self, value: i64) -> bool {
        if self.step > 0 {
            value >= self.start && value < self.stop && (value - self.start) % self.step == 0
        } else {
            value <= self.start && value > self.stop && (self.start - value) % (-self.step) == 0
        }
    }
}

/// A default-valued function parameter.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    /// Default evaluated at `def` time.
    pub default: Option<Value>,
}

/// A user-defined function: parameters, body, and the environment captured at
/// its `def` site.
#[derive(Debug)]
pub struct Function {
    pub name: String,
    pub params: Vec<Param>,
    pub vararg: Option<String>,
    pub kwarg: Option<String>,
    pub body: Rc<Vec<Stmt>>,
    pub env: Env,
    pub line: u32,
}

/// A host-implemented callable with metadata for help text.
pub struct Builtin {
    pub name: String,
    pub doc: String,
    pub func: NativeFn,
}

impl Builtin {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        doc: impl Into<String>,
        func: impl Fn(&mut Interp, CallArgs) -> Result<Value, Exception> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            doc: doc.into(),
            func: Rc::new(func),
        }
    }
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builtin").field("name", &self.name).finish_non_exhaustive()
    }
}

/// A method bound to its receiver.
#[derive(Debug)]
pub struct Bound {
    pub recv: Value,
    pub target: BoundTarget,
}

#[derive(Debug)]
pub enum BoundTarget {
    /// A user-defined method from a class table.
    Function(Rc<Function>),
    /// A built-in container/string method, dispatched by name.
    Method(String),
}

impl Bound {
    #[must_use]
    pub fn name(&self) -> &str {
        match &self.target {
            BoundTarget::Function(func) => &func.name,
            BoundTarget::Method(name) => name,
        }
    }
}

/// A user-defined class with an ordered member table and single inheritance.
#[derive(Debug)]
pub struct Class {
    pub name: String,
    pub parent: Option<Rc<Class>>,
    /// Set when the chain roots in a built-in exception class.
    pub base_exc: Option<ExcType>,
    pub members: RefCell<IndexMap<String, Value>>,
    pub line: u32,
}

impl Class {
    /// Resolves a member by climbing the parent chain.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.members.borrow().get(name) {
            return Some(value.clone());
        }
        self.parent.as_ref().and_then(|parent| parent.lookup(name))
    }

    /// The built-in exception kind this class derives from, if any.
    #[must_use]
    pub fn exc_root(&self) -> Option<ExcType> {
        self.base_exc
            .or_else(|| self.parent.as_ref().and_then(|parent| parent.exc_root()))
    }
}

/// True when `class` is `target` or a subclass of it.
#[must_use]
pub fn class_derives(class: &Rc<Class>, target: &Rc<Class>) -> bool {
    let mut current = Some(class.clone());
    while let Some(c) = current {
        if Rc::ptr_eq(&c, target) {
            return true;
        }
        current = c.parent.clone();
    }
    false
}

/// An object instance: a class pointer plus a field map.
#[derive(Debug)]
pub struct Instance {
    pub class: Rc<Class>,
    pub fields: RefCell<IndexMap<String, Value>>,
}

impl Instance {
    #[must_use]
    pub fn new(class: Rc<Class>) -> Self {
        Self {
            class,
            fields: RefCell::new(IndexMap::new()),
        }
    }
}

/// A named bundle of builtins, constants, and classes reachable via `import`.
///
/// Members are rebindable from script code: `lib.attr = x` replaces the
/// member, which the interactive-agent monkey-patch pattern relies on.
#[derive(Debug)]
pub struct Library {
    pub name: String,
    pub description: String,
    pub members: RefCell<IndexMap<String, Value>>,
}

impl Library {
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            members: RefCell::new(IndexMap::new()),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        self.members.borrow().get(name).cloned()
    }

    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.members.borrow_mut().insert(name.into(), value);
    }
}

/// A host-owned handle exposed to scripts as an opaque object.
pub struct Opaque {
    pub type_tag: &'static str,
    pub handle: RefCell<Box<dyn std::any::Any>>,
}

impl Opaque {
    #[must_use]
    pub fn new(type_tag: &'static str, handle: Box<dyn std::any::Any>) -> Self {
        Self {
            type_tag,
            handle: RefCell::new(handle),
        }
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Opaque").field("type_tag", &self.type_tag).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_table() {
        assert!(!Value::None.truthy());
        assert!(!Value::Bool(false).truthy());
        assert!(!Value::Int(0).truthy());
        assert!(!Value::Float(0.0).truthy());
        assert!(!Value::str("").truthy());
        assert!(!Value::list(vec![]).truthy());
        assert!(!Value::dict(Dict::new()).truthy());
        assert!(Value::Int(-1).truthy());
        assert!(Value::str("x").truthy());
    }

    #[test]
    fn dict_preserves_insertion_order() {
        let mut dict = Dict::new();
        dict.insert_str("z", Value::Int(1));
        dict.insert_str("a", Value::Int(2));
        dict.insert_str("m", Value::Int(3));
        let keys: Vec<String> = dict.iter().map(|(k, _)| k.str_value()).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn numeric_keys_unify() {
        let mut dict = Dict::new();
        dict.insert(Value::Int(1), Value::str("int")).unwrap();
        dict.insert(Value::Float(1.0), Value::str("float")).unwrap();
        dict.insert(Value::Bool(true), Value::str("bool")).unwrap();
        assert_eq!(dict.len(), 1);
        assert_eq!(dict.get(&Value::Int(1)).unwrap().unwrap().str_value(), "bool");
    }

    #[test]
    fn unhashable_keys_are_rejected() {
        let mut dict = Dict::new();
        let err = dict.insert(Value::list(vec![]), Value::None).unwrap_err();
        assert!(err.to_string().contains("unhashable"));
    }

    #[test]
    fn structural_equality() {
        let a = Value::list(vec![Value::Int(1), Value::str("x")]);
        let b = Value::list(vec![Value::Int(1), Value::str("x")]);
        assert!(values_equal(&a, &b));
        assert!(values_equal(&Value::Int(1), &Value::Float(1.0)));
        assert!(!values_equal(&Value::Int(1), &Value::str("1")));
    }

    #[test]
    fn repr_formats() {
        assert_eq!(Value::Float(1.0).repr(), "1.0");
        assert_eq!(Value::str("a'b").repr(), "\"a'b\"");
        assert_eq!(Value::tuple(vec![Value::Int(1)]).repr(), "(1,)");
        assert_eq!(
            Value::list(vec![Value::Int(1), Value::Int(2)]).repr(),
            "[1, 2]"
        );
        assert_eq!(Value::set(Set::new()).repr(), "set()");
    }

    #[test]
    fn range_len_and_contains() {
        let r = Range { start: 0, stop: 10, step: 3 };
        assert_eq!(r.len(), 4);
        assert!(r.contains(9));
        assert!(!r.contains(10));
        let r = Range { start: 10, stop: 0, step: -2 };
        assert_eq!(r.len(), 5);
        assert!(r.contains(2));
        assert!(!r.contains(0));
        let r = Range { start: 5, stop: 5, step: 1 };
        assert_eq!(r.len(), 0);
    }

    #[test]
    fn self_referential_list_repr_terminates() {
        let list = Rc::new(RefCell::new(vec![Value::Int(1)]));
        let value = Value::List(list.clone());
        list.borrow_mut().push(value.clone());
        let repr = value.repr();
        assert!(repr.contains("..."));
    }
}
