//! Error types for the Skein system.
//!
//! Uses `thiserror` for ergonomic error definition with rich context.
//!
//! Kinds fall into two groups. User-domain kinds describe failures of the
//! program being run; they are converted into a [`Raised`] record and can be
//! caught by a guarded region. Fatal kinds describe a broken interpreter
//! invariant and abort the offending task.

use std::fmt;

use thiserror::Error;

use crate::exception::{ErrorValue, Raised};
use crate::types::{ErrorClass, Type};

/// The main error type for Skein operations.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional context about where the error occurred.
    pub context: Option<ErrorContext>,
}

/// Result type alias using Skein's Error.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Adds context to this error.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Wraps a raised error record.
    #[must_use]
    pub fn raised(raised: Raised) -> Self {
        Self::new(ErrorKind::Raised(Box::new(raised)))
    }

    /// Creates a type mismatch error.
    #[must_use]
    pub fn type_mismatch(expected: Type, actual: Type) -> Self {
        Self::new(ErrorKind::TypeMismatch { expected, actual })
    }

    /// Creates an unresolved name error.
    #[must_use]
    pub fn unresolved_name(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnresolvedName(name.into()))
    }

    /// Creates an arity mismatch error.
    #[must_use]
    pub fn arity_mismatch(unit: impl Into<String>, slots: usize, actual: usize) -> Self {
        Self::new(ErrorKind::ArityMismatch {
            unit: unit.into(),
            slots,
            actual,
        })
    }

    /// Creates an invalid value error.
    #[must_use]
    pub fn invalid_value(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidValue(message.into()))
    }

    /// Creates an invalid state error.
    #[must_use]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidState(message.into()))
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal(message.into()))
    }

    /// Returns true if this error is an interpreter invariant violation.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.kind.is_fatal()
    }

    /// Returns the raised record if this error carries one.
    #[must_use]
    pub fn as_raised(&self) -> Option<&Raised> {
        match &self.kind {
            ErrorKind::Raised(raised) => Some(raised),
            _ => None,
        }
    }

    /// Converts a user-domain error into a raised record.
    ///
    /// Fatal errors are handed back unchanged.
    pub fn into_raised(self) -> std::result::Result<Raised, Error> {
        if let ErrorKind::Raised(raised) = self.kind {
            return Ok(*raised);
        }
        let class = match &self.kind {
            ErrorKind::TypeMismatch { .. }
            | ErrorKind::UnsupportedOperand { .. }
            | ErrorKind::UnsupportedOperands { .. }
            | ErrorKind::NotCallable(_)
            | ErrorKind::ForeignUnit { .. } => ErrorClass::type_error(),
            ErrorKind::DivisionByZero => ErrorClass::zero_division_error(),
            ErrorKind::Overflow(_) => ErrorClass::arithmetic_error(),
            ErrorKind::UnresolvedName(_) => ErrorClass::unresolved_name_error(),
            ErrorKind::ArityMismatch { .. } => ErrorClass::arity_error(),
            ErrorKind::InvalidValue(_) => ErrorClass::value_error(),
            ErrorKind::RecursionLimit { .. } => ErrorClass::recursion_error(),
            _ => return Err(self),
        };
        Ok(Raised::new(ErrorValue::new(class, self.kind.to_string())))
    }
}

impl From<Raised> for Error {
    fn from(raised: Raised) -> Self {
        Self::raised(raised)
    }
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Error)]
pub enum ErrorKind {
    // -------------------------------------------------------------------------
    // User-domain
    // -------------------------------------------------------------------------
    /// A value raised inside the VM that no guard caught.
    #[error("{0}")]
    Raised(Box<Raised>),

    /// Type mismatch during runtime type checking.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// The expected type.
        expected: Type,
        /// The actual type encountered.
        actual: Type,
    },

    /// Unary operator applied to an unsupported operand.
    #[error("unsupported operand type for {op}: {operand}")]
    UnsupportedOperand {
        /// Operator symbol.
        op: &'static str,
        /// Type of the operand.
        operand: Type,
    },

    /// Binary operator applied to unsupported operands.
    #[error("unsupported operand types for {op}: {left} and {right}")]
    UnsupportedOperands {
        /// Operator symbol.
        op: &'static str,
        /// Type of the left operand.
        left: Type,
        /// Type of the right operand.
        right: Type,
    },

    /// Division by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// Integer arithmetic overflowed.
    #[error("integer overflow in {0}")]
    Overflow(&'static str),

    /// A local or global name was not bound.
    #[error("unresolved name: {0}")]
    UnresolvedName(String),

    /// More arguments than the callee has local slots.
    #[error("{unit} takes at most {slots} argument(s), got {actual}")]
    ArityMismatch {
        /// Name of the callee.
        unit: String,
        /// Declared local-slot count.
        slots: usize,
        /// Number of arguments supplied.
        actual: usize,
    },

    /// Attempted to call a value that is not callable.
    #[error("{0} is not callable")]
    NotCallable(Type),

    /// A managed function was called from a module that does not own it.
    #[error("{name} belongs to another module and cannot be called from {module}")]
    ForeignUnit {
        /// The function name.
        name: String,
        /// The calling module.
        module: String,
    },

    /// An argument had the right type but an unacceptable value.
    #[error("{0}")]
    InvalidValue(String),

    /// The call chain grew past the configured depth.
    #[error("maximum call depth ({limit}) exceeded")]
    RecursionLimit {
        /// The configured limit.
        limit: usize,
    },

    // -------------------------------------------------------------------------
    // Interpreter invariant violations
    // -------------------------------------------------------------------------
    /// Pop from an empty operand stack.
    #[error("operand stack underflow")]
    StackUnderflow,

    /// Push past the declared maximum stack depth.
    #[error("operand stack overflow (limit {limit})")]
    StackOverflow {
        /// Declared maximum depth.
        limit: usize,
    },

    /// Instruction byte with no handler.
    #[error("unknown opcode {opcode:#04x} at instruction {index}")]
    UnknownOpcode {
        /// The raw byte.
        opcode: u8,
        /// Instruction index.
        index: usize,
    },

    /// Jump target outside the instruction sequence.
    #[error("jump target {target} out of range (unit has {len} instructions)")]
    InvalidJump {
        /// The raw target.
        target: u32,
        /// Number of instructions in the unit.
        len: usize,
    },

    /// Operand does not index a valid table entry.
    #[error("invalid {what} operand: {operand}")]
    InvalidOperand {
        /// What the operand was supposed to index.
        what: &'static str,
        /// The raw operand.
        operand: u32,
    },

    /// Operation attempted in a state that forbids it.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Every remaining frame waits on a wake that can never arrive.
    #[error("deadlock: {parked} frame(s) suspended with no outstanding wakers")]
    Deadlock {
        /// Number of parked frames.
        parked: usize,
    },

    /// Internal error (should not happen).
    #[error("internal error: {0}")]
    Internal(String),
}

impl ErrorKind {
    /// Returns true for interpreter invariant violations.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::StackUnderflow
                | Self::StackOverflow { .. }
                | Self::UnknownOpcode { .. }
                | Self::InvalidJump { .. }
                | Self::InvalidOperand { .. }
                | Self::InvalidState(_)
                | Self::Deadlock { .. }
                | Self::Internal(_)
        )
    }
}

/// Context about where an error occurred.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// Name of the unit that was executing.
    pub unit: Option<String>,
    /// Index of the offending instruction.
    pub index: Option<usize>,
    /// Rendered offending instruction.
    pub instruction: Option<String>,
    /// Rendered frame snapshot.
    pub snapshot: Option<String>,
    /// Enclosing frames, outermost first.
    pub stack: Vec<String>,
}

impl ErrorContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the unit name.
    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Sets the instruction index and its rendering.
    #[must_use]
    pub fn with_instruction(mut self, index: usize, instruction: impl Into<String>) -> Self {
        self.index = Some(index);
        self.instruction = Some(instruction.into());
        self
    }

    /// Sets the frame snapshot.
    #[must_use]
    pub fn with_snapshot(mut self, snapshot: impl Into<String>) -> Self {
        self.snapshot = Some(snapshot.into());
        self
    }

    /// Adds an enclosing frame.
    #[must_use]
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.stack.push(frame.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(unit) = &self.unit {
            write!(f, "in {unit}")?;
            if let Some(index) = self.index {
                write!(f, " at instruction {index}")?;
            }
            if let Some(instruction) = &self.instruction {
                write!(f, ": {instruction}")?;
            }
        }
        if let Some(snapshot) = &self.snapshot {
            writeln!(f)?;
            write!(f, "{snapshot}")?;
        }
        if !self.stack.is_empty() {
            writeln!(f)?;
            for frame in &self.stack {
                writeln!(f, "  in {frame}")?;
            }
        }
        Ok(())
    }
}
