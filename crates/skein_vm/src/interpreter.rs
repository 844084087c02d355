//! Drives a single frame through one turn.
//!
//! A turn runs instructions until the frame reaches a boundary: a managed
//! call, a suspension, completion, or a guard redirect. The interpreter never
//! touches the ready queue; it reports the boundary as a [`Turn`] and the
//! scheduler acts on it.

use skein_foundation::{Error, ErrorKind, Result};
use tracing::trace;

use crate::config::SchedulerConfig;
use crate::frame::{Awaiting, Frame, FrameState, PendingCall};
use crate::opcode::Opcode;
use crate::table;
use crate::unwind::raise_error;

/// How a turn ended.
#[derive(Debug)]
pub enum Turn {
    /// The frame made a managed call; the caller is suspended awaiting this
    /// child.
    Call(Frame),
    /// The frame suspended pending an external wake.
    Suspended,
    /// A guard took an error; the frame is pending at its handler.
    Yielded,
    /// The frame finished with a result.
    Finished,
    /// The frame errored.
    Errored,
}

/// Executes frames one turn at a time.
#[derive(Clone, Debug)]
pub struct Interpreter {
    max_call_depth: usize,
    trace_instructions: bool,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(&SchedulerConfig::default())
    }
}

impl Interpreter {
    /// Creates an interpreter for the given configuration.
    #[must_use]
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            max_call_depth: config.max_call_depth,
            trace_instructions: config.trace_instructions,
        }
    }

    /// Runs `frame` until its next boundary.
    ///
    /// # Errors
    ///
    /// Returns an error only for interpreter invariant violations: the frame
    /// was not pending, an opcode byte is unknown, execution ran past the
    /// last instruction, or a handler reported a fatal fault.
    pub fn run_turn(&self, frame: &mut Frame) -> Result<Turn> {
        if frame.state != FrameState::Pending {
            return Err(Error::invalid_state(format!(
                "cannot run frame {} while {:?}",
                frame.id, frame.state
            )));
        }
        frame.state = FrameState::Running;

        loop {
            let index = frame.ip;
            let Some(instr) = frame.unit.instruction(index).copied() else {
                return Err(Error::invalid_state(format!(
                    "execution ran past the end of {} ({} instructions)",
                    frame.unit.name(),
                    frame.unit.len()
                )));
            };
            frame.current = index;
            frame.ip = index + 1;

            let Some(op) = Opcode::from_byte(instr.opcode) else {
                return Err(Error::new(ErrorKind::UnknownOpcode {
                    opcode: instr.opcode,
                    index,
                }));
            };
            if self.trace_instructions {
                trace!(
                    frame = %frame.id,
                    unit = frame.unit.name(),
                    index,
                    instruction = %instr,
                    depth = frame.stack.len(),
                    "execute"
                );
            }

            table::handler(op)(frame, &instr)?;

            if let Some(turn) = self.boundary(frame)? {
                return Ok(turn);
            }
        }
    }

    /// Maps the frame's state after an instruction to the end of the turn,
    /// or `None` to keep going.
    fn boundary(&self, frame: &mut Frame) -> Result<Option<Turn>> {
        Ok(Some(match frame.state {
            FrameState::Running => return Ok(None),
            FrameState::Pending => Turn::Yielded,
            FrameState::Suspended => match frame.outgoing.take() {
                Some(call) => match self.start_call(frame, call)? {
                    Some(child) => Turn::Call(child),
                    None => return self.boundary(frame),
                },
                None => Turn::Suspended,
            },
            FrameState::Finished => Turn::Finished,
            FrameState::Errored => Turn::Errored,
        }))
    }

    /// Builds the child for a managed call.
    ///
    /// Depth and arity failures are raised in the caller, which is then left
    /// running, pending at a handler, or errored.
    fn start_call(&self, frame: &mut Frame, call: PendingCall) -> Result<Option<Frame>> {
        frame.state = FrameState::Running;
        if frame.depth + 1 >= self.max_call_depth {
            raise_error(
                frame,
                Error::new(ErrorKind::RecursionLimit {
                    limit: self.max_call_depth,
                }),
            )?;
            return Ok(None);
        }
        match frame.child(call) {
            Ok(child) => {
                frame.state = FrameState::Suspended;
                frame.awaiting = Awaiting::Child(child.id);
                Ok(Some(child))
            }
            Err(err) => {
                raise_error(frame, err)?;
                Ok(None)
            }
        }
    }
}
