//! Raising errors inside frames.
//!
//! [`safe_raise`] is the single entry point for user-domain errors: it records
//! the current frame in the error's traceback and then either redirects the
//! frame to its innermost active guard or marks it `Errored`. An errored
//! frame's exception callback carries the error on to its caller when the
//! scheduler finalizes it, where the same procedure repeats one frame further
//! out.

use skein_foundation::{Error, ErrorClass, ErrorValue, Raised, Result, Type, Value};

use crate::config::GuardMode;
use crate::frame::{Frame, FrameState, Guard};

/// Records `frame` in the traceback of `raised` and injects it.
///
/// # Errors
///
/// Fails with `StackOverflow` when the frame's declared stack depth cannot
/// hold the error values a handler receives.
pub fn safe_raise(frame: &mut Frame, mut raised: Raised) -> Result<()> {
    raised.record_frame(frame.trace_entry());
    inject_exception(frame, raised)
}

/// Routes a handler failure: user-domain errors are raised in `frame`,
/// fatal errors are returned.
pub(crate) fn raise_error(frame: &mut Frame, err: Error) -> Result<()> {
    let raised = err.into_raised()?;
    safe_raise(frame, raised)
}

/// Delivers `raised` to the innermost guard that can take it, or errors the
/// frame.
///
/// When a guard takes the error, the operand stack is cut back to its depth
/// at guard entry and the error, its cause (or nil) and its traceback are
/// pushed, traceback on top. This happens for guards in called frames too,
/// not only in top-level ones. A frame with no caller gets the same triple
/// even when it errors, so the values stay inspectable. An errored frame
/// that has a caller keeps its stack as it was.
///
/// The triple goes through [`Frame::push`], so it counts against the unit's
/// declared stack depth.
pub(crate) fn inject_exception(frame: &mut Frame, raised: Raised) -> Result<()> {
    // An error raised inside a handler escapes that handler's region.
    while frame.guards.last().is_some_and(|guard| guard.handling) {
        frame.guards.pop();
    }

    let guard = frame.guards.last_mut().map(|guard| {
        guard.handling = true;
        *guard
    });

    if let Some(Guard { depth, .. }) = guard {
        frame.stack.truncate(depth);
    }
    if guard.is_some() || frame.parent.is_none() {
        push_triple(frame, &raised)?;
    }
    frame.exception = Some(raised);

    match guard {
        Some(guard) => {
            frame.ip = guard.handler;
            frame.state = FrameState::Pending;
        }
        None => raise_exception(frame),
    }
    Ok(())
}

fn push_triple(frame: &mut Frame, raised: &Raised) -> Result<()> {
    frame.push(raised.error.clone())?;
    frame.push(raised.cause.clone().unwrap_or(Value::Nil))?;
    frame.push(
        raised
            .traceback
            .clone()
            .map_or(Value::Nil, Value::Traceback),
    )
}

/// Marks the frame errored. Its exception callback fires when the scheduler
/// finalizes it.
fn raise_exception(frame: &mut Frame) {
    frame.guards.clear();
    frame.state = FrameState::Errored;
}

/// Re-raises the frame's active exception without recording a new frame.
pub(crate) fn reraise(frame: &mut Frame) -> Result<()> {
    match frame.exception.clone() {
        Some(raised) => inject_exception(frame, raised),
        None => safe_raise(
            frame,
            Raised::of(ErrorClass::runtime_error(), "no active exception to re-raise"),
        ),
    }
}

/// Builds the record for an explicit raise of `value`.
///
/// Raising an error class instantiates it with an empty message. Raising
/// anything that is not an error is itself a `TypeError`.
pub(crate) fn raised_from(value: Value, cause: Option<Value>) -> Raised {
    let Some(error) = instantiate(value) else {
        return Raised::of(
            ErrorClass::type_error(),
            "exceptions must be instances or subclasses of BaseError",
        );
    };
    let raised = Raised::new(error);
    match cause {
        Some(Value::Nil) | None => raised,
        Some(cause) => raised.with_cause(instantiate(cause.clone()).unwrap_or(cause)),
    }
}

fn instantiate(value: Value) -> Option<Value> {
    match value {
        Value::Error(_) => Some(value),
        Value::Type(Type::Error(class)) => Some(Value::Error(ErrorValue::new(class, ""))),
        _ => None,
    }
}

/// Enters a guarded region whose handler starts at `handler`.
pub(crate) fn enter_guard(frame: &mut Frame, handler: usize) {
    if frame.guard_mode == GuardMode::Single {
        frame.guards.clear();
    }
    frame.guards.push(Guard {
        handler,
        depth: frame.stack.len(),
        handling: false,
    });
}

/// Leaves the innermost guarded region and marks its error handled.
pub(crate) fn exit_guard(frame: &mut Frame) {
    frame.guards.pop();
    frame.exception = None;
}
