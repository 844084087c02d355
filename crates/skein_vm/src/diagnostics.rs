//! Human-readable frame dumps attached to fatal faults.

use std::fmt;

use crate::frame::{Awaiting, Frame, FrameId, FrameState};

/// A point-in-time copy of the interesting parts of a frame.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameSnapshot {
    /// Frame id.
    pub id: FrameId,
    /// Unit name.
    pub unit: String,
    /// Lifecycle state.
    pub state: FrameState,
    /// Next instruction index.
    pub ip: usize,
    /// The instruction being executed, rendered.
    pub instruction: Option<String>,
    /// Operand stack, bottom first.
    pub stack: Vec<String>,
    /// Local slots; `None` for unset slots.
    pub locals: Vec<Option<String>>,
    /// Active guard count.
    pub guards: usize,
    /// Call depth.
    pub depth: usize,
    /// Calling frame.
    pub parent: Option<FrameId>,
    /// What the frame was waiting for.
    pub awaiting: Awaiting,
}

impl FrameSnapshot {
    /// Captures `frame`.
    #[must_use]
    pub fn capture(frame: &Frame) -> Self {
        Self {
            id: frame.id,
            unit: frame.unit.name().to_string(),
            state: frame.state,
            ip: frame.ip,
            instruction: frame.current_instruction().map(ToString::to_string),
            stack: frame.stack.iter().map(ToString::to_string).collect(),
            locals: frame
                .locals
                .iter()
                .map(|slot| slot.as_ref().map(ToString::to_string))
                .collect(),
            guards: frame.guards.len(),
            depth: frame.depth,
            parent: frame.parent,
            awaiting: frame.awaiting,
        }
    }
}

impl fmt::Display for FrameSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "frame {} in {} ({:?})", self.id, self.unit, self.state)?;
        writeln!(f, "  ip: {}", self.ip)?;
        if let Some(instr) = &self.instruction {
            writeln!(f, "  at: {instr}")?;
        }
        writeln!(f, "  stack: [{}]", self.stack.join(", "))?;
        let locals: Vec<&str> = self
            .locals
            .iter()
            .map(|slot| slot.as_deref().unwrap_or("<unset>"))
            .collect();
        writeln!(f, "  locals: [{}]", locals.join(", "))?;
        writeln!(f, "  guards: {}", self.guards)?;
        write!(f, "  depth: {}", self.depth)?;
        if let Some(parent) = self.parent {
            write!(f, "\n  parent: {parent}")?;
        }
        if self.awaiting != Awaiting::Nothing {
            write!(f, "\n  awaiting: {:?}", self.awaiting)?;
        }
        Ok(())
    }
}
