//! Raised errors and traceback chains.
//!
//! A [`Raised`] record is what travels with a user-domain error while it
//! unwinds: the raised value, an optional explicit cause, and the
//! [`Traceback`] built so far. Tracebacks are immutable linked chains so
//! prepending a frame never copies the frames already recorded.

use std::fmt;
use std::sync::Arc;

use crate::types::ErrorClass;
use crate::value::Value;

// =============================================================================
// Error Instances
// =============================================================================

/// An instance of an [`ErrorClass`] carrying a message.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ErrorValue {
    class: ErrorClass,
    message: Arc<str>,
}

impl ErrorValue {
    /// Creates an error instance.
    #[must_use]
    pub fn new(class: ErrorClass, message: impl Into<Arc<str>>) -> Self {
        Self {
            class,
            message: message.into(),
        }
    }

    /// Returns the class of this error.
    #[must_use]
    pub fn class(&self) -> &ErrorClass {
        &self.class
    }

    /// Returns the message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns true if this error is an instance of `class` or a subclass.
    #[must_use]
    pub fn is_instance_of(&self, class: &ErrorClass) -> bool {
        self.class.is_subclass_of(class)
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.class)
        } else {
            write!(f, "{}: {}", self.class, self.message)
        }
    }
}

impl fmt::Debug for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", self.class, &*self.message)
    }
}

// =============================================================================
// Tracebacks
// =============================================================================

/// Location of one frame an error unwound through.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TraceEntry {
    /// Name of the unit the frame was executing.
    pub unit: Arc<str>,
    /// Id of the frame.
    pub frame: u64,
    /// Index of the instruction that was executing.
    pub index: usize,
    /// Source offset of that instruction.
    pub offset: u32,
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "in {} (frame {}) at instruction {}, offset {}",
            self.unit, self.frame, self.index, self.offset
        )
    }
}

/// One link of a traceback chain.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct TracebackNode {
    /// The frame this node describes.
    pub entry: TraceEntry,
    /// The node for the next frame deeper in the call chain.
    pub next: Option<Traceback>,
}

/// Immutable chain of frames, outermost first.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Traceback(Arc<TracebackNode>);

impl Traceback {
    /// Creates a chain holding a single frame.
    #[must_use]
    pub fn new(entry: TraceEntry) -> Self {
        Self::prepend(entry, None)
    }

    /// Creates a chain with `entry` as the outermost frame, followed by `rest`.
    #[must_use]
    pub fn prepend(entry: TraceEntry, rest: Option<Traceback>) -> Self {
        Self(Arc::new(TracebackNode { entry, next: rest }))
    }

    /// Returns the outermost node.
    #[must_use]
    pub fn head(&self) -> &TracebackNode {
        &self.0
    }

    /// Iterates the recorded frames in call order.
    pub fn entries(&self) -> impl Iterator<Item = &TraceEntry> {
        std::iter::successors(Some(self), |tb| tb.0.next.as_ref()).map(|tb| &tb.0.entry)
    }

    /// Returns the frame where the error was first raised.
    #[must_use]
    pub fn innermost(&self) -> &TraceEntry {
        self.entries().last().unwrap_or(&self.0.entry)
    }

    /// Number of frames in the chain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().count()
    }

    /// A chain always holds at least one frame.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }
}

impl fmt::Debug for Traceback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries()).finish()
    }
}

impl fmt::Display for Traceback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Traceback (outermost first):")?;
        for entry in self.entries() {
            writeln!(f, "  {entry}")?;
        }
        Ok(())
    }
}

// =============================================================================
// Raised
// =============================================================================

/// Diagnostic record of a raised user-domain error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Raised {
    /// The raised value, normally a [`Value::Error`].
    pub error: Value,
    /// Explicit cause given by a two-operand raise.
    pub cause: Option<Value>,
    /// Frames unwound so far; `None` until the first frame records itself.
    pub traceback: Option<Traceback>,
}

impl Raised {
    /// Creates a record with no cause and no traceback.
    #[must_use]
    pub fn new(error: impl Into<Value>) -> Self {
        Self {
            error: error.into(),
            cause: None,
            traceback: None,
        }
    }

    /// Creates a record for a fresh instance of `class`.
    #[must_use]
    pub fn of(class: ErrorClass, message: impl Into<Arc<str>>) -> Self {
        Self::new(ErrorValue::new(class, message))
    }

    /// Attaches an explicit cause.
    #[must_use]
    pub fn with_cause(mut self, cause: Value) -> Self {
        self.cause = Some(cause);
        self
    }

    /// Records one more frame as the new outermost entry.
    pub fn record_frame(&mut self, entry: TraceEntry) {
        self.traceback = Some(Traceback::prepend(entry, self.traceback.take()));
    }

    /// Returns the raised error instance, if the raised value is one.
    #[must_use]
    pub fn error_value(&self) -> Option<&ErrorValue> {
        self.error.as_error()
    }

    /// Returns the class of the raised error, if it is an error instance.
    #[must_use]
    pub fn class(&self) -> Option<&ErrorClass> {
        self.error_value().map(ErrorValue::class)
    }

    /// Returns true if the raised value is an instance of `class`.
    #[must_use]
    pub fn is_instance_of(&self, class: &ErrorClass) -> bool {
        self.error_value().is_some_and(|e| e.is_instance_of(class))
    }
}

impl fmt::Display for Raised {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(tb) = &self.traceback {
            write!(f, "{tb}")?;
        }
        write!(f, "{}", self.error)?;
        if let Some(cause) = &self.cause {
            write!(f, " (caused by {cause})")?;
        }
        Ok(())
    }
}
