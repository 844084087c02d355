//! Core value type for all Skein data.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::collections::LtVec;
use crate::exception::{ErrorValue, Traceback};
use crate::types::Type;

/// Core value type flowing through operand stacks, locals, and namespaces.
///
/// Values are immutable and cheaply cloneable (O(1) for every variant).
#[derive(Clone)]
pub enum Value {
    /// The nil value (represents absence).
    Nil,
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit floating point.
    Float(f64),
    /// String value.
    String(Arc<str>),
    /// Persistent tuple.
    Tuple(LtVec<Value>),
    /// A runtime type, used to name error classes in guarded regions.
    Type(Type),
    /// An error instance.
    Error(ErrorValue),
    /// A captured traceback chain.
    Traceback(Traceback),
    /// Function reference.
    Fn(LtFn),
}

/// Function reference.
///
/// The variant is the call classification, fixed when the callable is
/// registered: native functions always complete inside the caller's turn,
/// managed functions run in their own frame and may suspend.
#[derive(Clone)]
pub enum LtFn {
    /// Native function implemented in Rust.
    Native(NativeFn),
    /// Managed unit (index into a module's unit table).
    Managed(ManagedFn),
}

/// Native function callable from Skein.
#[derive(Clone, Copy)]
pub struct NativeFn {
    /// Function name for debugging.
    pub name: &'static str,
    /// Function pointer.
    pub func: fn(&[Value]) -> crate::Result<Value>,
}

impl NativeFn {
    /// Wraps a function pointer.
    #[must_use]
    pub const fn new(name: &'static str, func: fn(&[Value]) -> crate::Result<Value>) -> Self {
        Self { name, func }
    }

    /// Invokes the function to completion.
    pub fn call(&self, args: &[Value]) -> crate::Result<Value> {
        (self.func)(args)
    }
}

/// Managed unit reference.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ManagedFn {
    /// Identity of the module that owns the unit.
    pub module: u64,
    /// Index into the owning module's unit table.
    pub index: u32,
    /// Unit name for debugging.
    pub name: Arc<str>,
}

impl Value {
    /// Returns the type of this value.
    #[must_use]
    pub fn value_type(&self) -> Type {
        match self {
            Self::Nil => Type::Nil,
            Self::Bool(_) => Type::Bool,
            Self::Int(_) => Type::Int,
            Self::Float(_) => Type::Float,
            Self::String(_) => Type::String,
            Self::Tuple(_) => Type::Tuple,
            Self::Type(_) => Type::Type,
            Self::Error(e) => Type::Error(e.class().clone()),
            Self::Traceback(_) => Type::Traceback,
            Self::Fn(_) => Type::Fn,
        }
    }

    /// Returns true if this value is nil.
    #[must_use]
    pub const fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// Returns true if this value is truthy.
    ///
    /// `nil`, `false`, zero, the empty string, and the empty tuple are falsy.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Nil => false,
            Self::Bool(b) => *b,
            Self::Int(n) => *n != 0,
            Self::Float(n) => *n != 0.0,
            Self::String(s) => !s.is_empty(),
            Self::Tuple(t) => !t.is_empty(),
            _ => true,
        }
    }

    /// Attempts to extract a boolean value.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Attempts to extract an integer value.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Attempts to extract a float value.
    #[must_use]
    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Attempts to extract a number as f64 (converts int to float).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Int(n) => Some(*n as f64),
            Self::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Attempts to extract a string reference.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Attempts to extract a tuple reference.
    #[must_use]
    pub const fn as_tuple(&self) -> Option<&LtVec<Value>> {
        match self {
            Self::Tuple(t) => Some(t),
            _ => None,
        }
    }

    /// Attempts to extract a type.
    #[must_use]
    pub const fn as_type(&self) -> Option<&Type> {
        match self {
            Self::Type(t) => Some(t),
            _ => None,
        }
    }

    /// Attempts to extract an error instance.
    #[must_use]
    pub const fn as_error(&self) -> Option<&ErrorValue> {
        match self {
            Self::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Attempts to extract a traceback.
    #[must_use]
    pub const fn as_traceback(&self) -> Option<&Traceback> {
        match self {
            Self::Traceback(tb) => Some(tb),
            _ => None,
        }
    }

    /// Attempts to extract a function reference.
    #[must_use]
    pub const fn as_fn(&self) -> Option<&LtFn> {
        match self {
            Self::Fn(f) => Some(f),
            _ => None,
        }
    }

    /// Creates a tuple value.
    #[must_use]
    pub fn tuple(items: impl IntoIterator<Item = Value>) -> Self {
        Self::Tuple(items.into_iter().collect())
    }
}

// Implement PartialEq manually to handle float comparison
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Nil, Self::Nil) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Tuple(a), Self::Tuple(b)) => a == b,
            (Self::Type(a), Self::Type(b)) => a == b,
            (Self::Error(a), Self::Error(b)) => a == b,
            (Self::Traceback(a), Self::Traceback(b)) => a == b,
            (Self::Fn(a), Self::Fn(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Nil => {}
            Self::Bool(b) => b.hash(state),
            Self::Int(n) => n.hash(state),
            Self::Float(n) => n.to_bits().hash(state),
            Self::String(s) => s.hash(state),
            Self::Tuple(t) => t.hash(state),
            Self::Type(t) => t.hash(state),
            Self::Error(e) => e.hash(state),
            Self::Traceback(tb) => tb.hash(state),
            Self::Fn(f) => f.hash(state),
        }
    }
}

impl PartialOrd for Value {
    #[allow(clippy::cast_precision_loss)]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Nil, Self::Nil) => Some(Ordering::Equal),
            (Self::Bool(a), Self::Bool(b)) => a.partial_cmp(b),
            (Self::Int(a), Self::Int(b)) => a.partial_cmp(b),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(b),
            // Cross-type numeric comparison intentionally loses precision for large i64
            (Self::Int(a), Self::Float(b)) => (*a as f64).partial_cmp(b),
            (Self::Float(a), Self::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Self::String(a), Self::String(b)) => a.partial_cmp(b),
            (Self::Tuple(a), Self::Tuple(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.partial_cmp(y)? {
                        Ordering::Equal => {}
                        ord => return Some(ord),
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            _ => None, // Different types or non-comparable
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s:?}"),
            Self::Tuple(t) => write_tuple(f, t, |f, item| write!(f, "{item:?}")),
            Self::Error(e) => write!(f, "{e:?}"),
            _ => fmt::Display::fmt(self, f),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => write!(f, "nil"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(n) => {
                if n.is_finite() && n.fract() == 0.0 {
                    write!(f, "{n:.1}")
                } else {
                    write!(f, "{n}")
                }
            }
            Self::String(s) => write!(f, "{s}"),
            Self::Tuple(t) => write_tuple(f, t, |f, item| write!(f, "{item}")),
            Self::Type(t) => write!(f, "<type {t}>"),
            Self::Error(e) => write!(f, "{e}"),
            Self::Traceback(tb) => write!(f, "<traceback of {} frame(s)>", tb.len()),
            Self::Fn(func) => write!(f, "{func}"),
        }
    }
}

fn write_tuple(
    f: &mut fmt::Formatter<'_>,
    items: &LtVec<Value>,
    mut item: impl FnMut(&mut fmt::Formatter<'_>, &Value) -> fmt::Result,
) -> fmt::Result {
    write!(f, "(")?;
    for (i, v) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        item(f, v)?;
    }
    if items.len() == 1 {
        write!(f, ",")?;
    }
    write!(f, ")")
}

// LtFn implementations

impl PartialEq for LtFn {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Native(a), Self::Native(b)) => std::ptr::fn_addr_eq(a.func, b.func),
            (Self::Managed(a), Self::Managed(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for LtFn {}

impl Hash for LtFn {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Native(f) => {
                (f.func as usize).hash(state);
            }
            Self::Managed(f) => f.hash(state),
        }
    }
}

impl fmt::Debug for LtFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native(func) => write!(f, "<native fn {}>", func.name),
            Self::Managed(func) => write!(f, "<fn {} #{}>", func.name, func.index),
        }
    }
}

impl fmt::Display for LtFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFn({})", self.name)
    }
}

// Convenience From implementations

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s.into())
    }
}

impl From<Arc<str>> for Value {
    fn from(s: Arc<str>) -> Self {
        Self::String(s)
    }
}

impl From<Type> for Value {
    fn from(t: Type) -> Self {
        Self::Type(t)
    }
}

impl From<ErrorValue> for Value {
    fn from(e: ErrorValue) -> Self {
        Self::Error(e)
    }
}

impl From<NativeFn> for Value {
    fn from(f: NativeFn) -> Self {
        Self::Fn(LtFn::Native(f))
    }
}

impl From<ManagedFn> for Value {
    fn from(f: ManagedFn) -> Self {
        Self::Fn(LtFn::Managed(f))
    }
}
