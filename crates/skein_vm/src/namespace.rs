//! Name-to-value bindings for module globals and builtins.

use std::collections::HashMap;
use std::sync::Arc;

use skein_foundation::{ErrorClass, NativeFn, Type, Value};

use crate::native::{
    native_abs, native_isinstance, native_len, native_max, native_min, native_str, native_type,
};

/// A flat set of name bindings.
#[derive(Clone, Debug, Default)]
pub struct Namespace {
    bindings: HashMap<Arc<str>, Value>,
}

impl Namespace {
    /// Creates an empty namespace.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    /// Returns true if `name` is bound.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Binds `name`, returning the previous value.
    pub fn define(&mut self, name: impl Into<Arc<str>>, value: Value) -> Option<Value> {
        self.bindings.insert(name.into(), value)
    }

    /// Binds a native function under its own name.
    pub fn define_native(&mut self, func: NativeFn) -> Value {
        let value = Value::from(func);
        self.define(func.name, value.clone());
        value
    }

    /// Number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns true if nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Iterates over bound names in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(|k| &**k)
    }

    /// The builtin namespace: every builtin error class plus the builtin
    /// native functions.
    #[must_use]
    pub fn builtins() -> Self {
        let mut ns = Self::new();
        for class in ErrorClass::builtins() {
            ns.define(class.name(), Value::Type(Type::Error(class.clone())));
        }
        for func in [
            NativeFn::new("len", native_len),
            NativeFn::new("str", native_str),
            NativeFn::new("abs", native_abs),
            NativeFn::new("min", native_min),
            NativeFn::new("max", native_max),
            NativeFn::new("isinstance", native_isinstance),
            NativeFn::new("type", native_type),
        ] {
            ns.define_native(func);
        }
        ns
    }
}
