//! Modules: a unit table plus the namespaces its units resolve names in.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use skein_foundation::{Error, ErrorKind, ManagedFn, NativeFn, Result, Value};

use crate::entry;
use crate::frame::Frame;
use crate::namespace::Namespace;
use crate::unit::Unit;

static NEXT_MODULE_ID: AtomicU64 = AtomicU64::new(1);

/// A loaded module.
///
/// Modules are immutable once built and shared between frames by `Arc`.
#[derive(Debug)]
pub struct Module {
    id: u64,
    name: Arc<str>,
    units: Vec<Arc<Unit>>,
    globals: Namespace,
    builtins: Arc<Namespace>,
}

impl Module {
    /// Returns the module name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Process-unique module identity, carried by its managed callables.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Resolves a managed callable to its unit.
    ///
    /// Callables built by another module raise a `TypeError` instead of
    /// running whatever unit shares their index here.
    pub fn resolve(&self, func: &ManagedFn) -> Result<&Arc<Unit>> {
        if func.module != self.id {
            return Err(Error::new(ErrorKind::ForeignUnit {
                name: func.name.to_string(),
                module: self.name.to_string(),
            }));
        }
        self.unit(func.index)
    }

    /// Looks up a unit by its table index.
    pub fn unit(&self, index: u32) -> Result<&Arc<Unit>> {
        self.units
            .get(index as usize)
            .ok_or_else(|| Error::new(ErrorKind::InvalidOperand { what: "unit", operand: index }))
    }

    /// Number of units.
    #[must_use]
    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Resolves a name through the module namespace, then the builtins.
    #[must_use]
    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name).or_else(|| self.builtins.get(name))
    }

    /// Returns the module namespace.
    #[must_use]
    pub fn globals(&self) -> &Namespace {
        &self.globals
    }

    /// Returns the builtin namespace.
    #[must_use]
    pub fn builtins(&self) -> &Namespace {
        &self.builtins
    }

    /// Creates a pending top-level frame for the global `name`.
    pub fn spawn(self: &Arc<Self>, name: &str, args: Vec<Value>) -> Result<Frame> {
        let callable = self
            .global(name)
            .cloned()
            .ok_or_else(|| Error::unresolved_name(name))?;
        entry::spawn(self, &callable, args)
    }
}

/// Assembles a [`Module`].
#[derive(Debug)]
pub struct ModuleBuilder {
    id: u64,
    name: Arc<str>,
    units: Vec<Arc<Unit>>,
    globals: Namespace,
    builtins: Option<Arc<Namespace>>,
}

impl ModuleBuilder {
    /// Starts an empty module.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            id: NEXT_MODULE_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            units: Vec::new(),
            globals: Namespace::new(),
            builtins: None,
        }
    }

    /// Registers a managed unit and binds it as a global under its name.
    ///
    /// Returns the callable value.
    pub fn add_unit(&mut self, unit: Unit) -> Value {
        let index = u32::try_from(self.units.len()).unwrap_or(u32::MAX);
        let name = unit.shared_name();
        self.units.push(Arc::new(unit));
        let value = Value::from(ManagedFn {
            module: self.id,
            index,
            name: Arc::clone(&name),
        });
        self.globals.define(name, value.clone());
        value
    }

    /// Registers a native function and binds it as a global under its name.
    pub fn add_native(
        &mut self,
        name: &'static str,
        func: fn(&[Value]) -> Result<Value>,
    ) -> Value {
        self.globals.define_native(NativeFn::new(name, func))
    }

    /// Binds any other value as a global.
    pub fn define(&mut self, name: impl Into<Arc<str>>, value: Value) -> &mut Self {
        self.globals.define(name, value);
        self
    }

    /// Replaces the default builtin namespace.
    pub fn with_builtins(&mut self, builtins: Arc<Namespace>) -> &mut Self {
        self.builtins = Some(builtins);
        self
    }

    /// Finishes the module.
    #[must_use]
    pub fn build(self) -> Arc<Module> {
        Arc::new(Module {
            id: self.id,
            name: self.name,
            units: self.units,
            globals: self.globals,
            builtins: self
                .builtins
                .unwrap_or_else(|| Arc::new(Namespace::builtins())),
        })
    }
}
