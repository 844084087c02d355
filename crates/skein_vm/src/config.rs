//! Configuration for the scheduler and interpreter.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default bound on the managed call chain.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 1000;

/// How a frame tracks guarded regions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum GuardMode {
    /// Guards form a stack; an inner region's handler runs before the
    /// enclosing one's.
    #[default]
    Nested,
    /// One guard slot per frame; entering a region replaces any active guard.
    Single,
}

/// Configuration for a [`Scheduler`](crate::Scheduler).
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SchedulerConfig {
    /// Maximum depth of the managed call chain before `RecursionError`.
    pub max_call_depth: usize,

    /// Guard bookkeeping for frames the scheduler runs.
    pub guard_mode: GuardMode,

    /// Emit a `TRACE` event for every executed instruction.
    pub trace_instructions: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            guard_mode: GuardMode::Nested,
            trace_instructions: false,
        }
    }
}

impl SchedulerConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration that traces every instruction.
    #[must_use]
    pub fn debug() -> Self {
        Self {
            trace_instructions: true,
            ..Self::default()
        }
    }

    /// Builder method to set the maximum call depth.
    #[must_use]
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    /// Builder method to set the guard mode.
    #[must_use]
    pub fn with_guard_mode(mut self, mode: GuardMode) -> Self {
        self.guard_mode = mode;
        self
    }

    /// Builder method to enable/disable instruction tracing.
    #[must_use]
    pub fn with_trace_instructions(mut self, trace: bool) -> Self {
        self.trace_instructions = trace;
        self
    }
}
