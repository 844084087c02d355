//! Runtime type descriptors and the error class hierarchy.

use std::fmt;
use std::iter;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Runtime type of a [`Value`](crate::Value).
///
/// Types are themselves values (`Value::Type`), which is how guarded regions
/// name the error classes they catch.
#[derive(Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Type {
    /// Top type; every type is a subtype of `Any`.
    Any,
    /// The nil type (only value: nil).
    Nil,
    /// Boolean type.
    Bool,
    /// 64-bit signed integer.
    Int,
    /// 64-bit floating point.
    Float,
    /// String type.
    String,
    /// Heterogeneous tuple.
    Tuple,
    /// The type of types.
    Type,
    /// A captured traceback chain.
    Traceback,
    /// Callable (native or managed).
    Fn,
    /// An error class.
    Error(ErrorClass),
}

impl Type {
    /// Returns true if this type is `Any`.
    #[must_use]
    pub const fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    /// Returns the error class if this is an error type.
    #[must_use]
    pub const fn as_error_class(&self) -> Option<&ErrorClass> {
        match self {
            Self::Error(class) => Some(class),
            _ => None,
        }
    }

    /// Checks whether `self` is `other` or descends from it.
    ///
    /// - every type is a subtype of `Any`
    /// - error classes follow their base chain
    /// - all other types only match themselves
    #[must_use]
    pub fn is_subtype_of(&self, other: &Type) -> bool {
        match (self, other) {
            (_, Self::Any) => true,
            (Self::Error(sub), Self::Error(sup)) => sub.is_subclass_of(sup),
            _ => self == other,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "any"),
            Self::Nil => write!(f, "nil"),
            Self::Bool => write!(f, "bool"),
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::String => write!(f, "string"),
            Self::Tuple => write!(f, "tuple"),
            Self::Type => write!(f, "type"),
            Self::Traceback => write!(f, "traceback"),
            Self::Fn => write!(f, "fn"),
            Self::Error(class) => write!(f, "{}", class.name()),
        }
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

// =============================================================================
// Error Classes
// =============================================================================

/// A named error class with single inheritance.
///
/// Classes compare structurally (name and full base chain), so two
/// independently constructed `ValueError` classes are the same class.
#[derive(Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ErrorClass(Arc<ClassDef>);

#[derive(PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
struct ClassDef {
    name: Arc<str>,
    base: Option<ErrorClass>,
}

impl ErrorClass {
    /// Creates a class with an optional base class.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>, base: Option<ErrorClass>) -> Self {
        Self(Arc::new(ClassDef {
            name: name.into(),
            base,
        }))
    }

    /// Derives a new class from this one.
    #[must_use]
    pub fn subclass(&self, name: impl Into<Arc<str>>) -> Self {
        Self::new(name, Some(self.clone()))
    }

    /// Returns the class name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Returns the direct base class.
    #[must_use]
    pub fn base(&self) -> Option<&ErrorClass> {
        self.0.base.as_ref()
    }

    /// Iterates from this class up to the root, this class first.
    pub fn ancestors(&self) -> impl Iterator<Item = &ErrorClass> {
        iter::successors(Some(self), |class| class.base())
    }

    /// Returns true if this class is `other` or derives from it.
    #[must_use]
    pub fn is_subclass_of(&self, other: &ErrorClass) -> bool {
        self.ancestors().any(|class| class == other)
    }

    /// The root of the hierarchy.
    #[must_use]
    pub fn base_error() -> Self {
        Self::new("BaseError", None)
    }

    /// Base of every ordinary, catchable error.
    #[must_use]
    pub fn error() -> Self {
        Self::base_error().subclass("Error")
    }

    /// An argument had the right type but an unacceptable value.
    #[must_use]
    pub fn value_error() -> Self {
        Self::error().subclass("ValueError")
    }

    /// An operation was applied to a value of the wrong type.
    #[must_use]
    pub fn type_error() -> Self {
        Self::error().subclass("TypeError")
    }

    /// A call supplied more arguments than the callee has slots for.
    #[must_use]
    pub fn arity_error() -> Self {
        Self::type_error().subclass("ArityError")
    }

    /// A name could not be resolved.
    #[must_use]
    pub fn name_error() -> Self {
        Self::error().subclass("NameError")
    }

    /// A global or local name was read before it was bound.
    #[must_use]
    pub fn unresolved_name_error() -> Self {
        Self::name_error().subclass("UnresolvedNameError")
    }

    /// Generic runtime failure.
    #[must_use]
    pub fn runtime_error() -> Self {
        Self::error().subclass("RuntimeError")
    }

    /// The call chain grew past the configured depth.
    #[must_use]
    pub fn recursion_error() -> Self {
        Self::runtime_error().subclass("RecursionError")
    }

    /// Base of numeric failures.
    #[must_use]
    pub fn arithmetic_error() -> Self {
        Self::error().subclass("ArithmeticError")
    }

    /// Division or modulo by zero.
    #[must_use]
    pub fn zero_division_error() -> Self {
        Self::arithmetic_error().subclass("ZeroDivisionError")
    }

    /// Every builtin class, roots first.
    #[must_use]
    pub fn builtins() -> Vec<ErrorClass> {
        vec![
            Self::base_error(),
            Self::error(),
            Self::value_error(),
            Self::type_error(),
            Self::arity_error(),
            Self::name_error(),
            Self::unresolved_name_error(),
            Self::runtime_error(),
            Self::recursion_error(),
            Self::arithmetic_error(),
            Self::zero_division_error(),
        ]
    }
}

impl fmt::Debug for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<class {}>", self.name())
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
