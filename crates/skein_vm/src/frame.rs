//! Execution frames.
//!
//! A [`Frame`] is one activation of a managed unit: instruction pointer,
//! operand stack, local slots, lifecycle state, and the guard and exception
//! bookkeeping used while unwinding. Frames are plain owned values. The
//! scheduler moves them between its ready queue and its parked set, and a
//! finished frame hands its result to its parent through the callbacks
//! registered when the parent created it.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use skein_foundation::{
    Error, ErrorKind, ManagedFn, Raised, Result, TraceEntry, Value,
};

use crate::config::GuardMode;
use crate::module::Module;
use crate::opcode::Instruction;
use crate::unit::{DEFAULT_STACK_SIZE, Unit};
use crate::unwind;

static NEXT_FRAME_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique frame identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(u64);

impl FrameId {
    fn next() -> Self {
        Self(NEXT_FRAME_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw id.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrameState {
    /// Ready to run its next turn.
    Pending,
    /// Executing under the interpreter.
    Running,
    /// Waiting on a child frame or an external wake.
    Suspended,
    /// Completed with a result.
    Finished,
    /// Completed with an unhandled error.
    Errored,
}

impl FrameState {
    /// Returns true for `Finished` and `Errored`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Errored)
    }
}

/// What a suspended frame is waiting for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Awaiting {
    /// Not waiting.
    Nothing,
    /// Waiting for a child frame to complete.
    Child(FrameId),
    /// Waiting for an external wake.
    Wake,
}

/// An active guarded region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Guard {
    /// Handler entry point.
    pub handler: usize,
    /// Operand-stack depth when the region was entered.
    pub depth: usize,
    /// Set once the handler has taken an error.
    pub handling: bool,
}

/// A managed call requested by the `Call` handler, carried out by the
/// interpreter.
#[derive(Debug)]
pub(crate) struct PendingCall {
    pub func: ManagedFn,
    pub args: Vec<Value>,
}

type DoneCallback = Box<dyn FnOnce(Option<&mut Frame>, &Value) -> Result<()> + Send>;
type ExceptionCallback = Box<dyn FnOnce(Option<&mut Frame>, &Raised) -> Result<()> + Send>;

/// One activation of a managed unit.
pub struct Frame {
    pub(crate) id: FrameId,
    pub(crate) unit: Arc<Unit>,
    pub(crate) module: Arc<Module>,
    pub(crate) ip: usize,
    /// Index of the instruction most recently fetched.
    pub(crate) current: usize,
    pub(crate) stack: Vec<Value>,
    pub(crate) locals: Vec<Option<Value>>,
    pub(crate) state: FrameState,
    pub(crate) result: Option<Value>,
    pub(crate) exception: Option<Raised>,
    pub(crate) guards: Vec<Guard>,
    pub(crate) guard_mode: GuardMode,
    pub(crate) parent: Option<FrameId>,
    pub(crate) awaiting: Awaiting,
    pub(crate) outgoing: Option<PendingCall>,
    pub(crate) depth: usize,
    done_callback: Option<DoneCallback>,
    exception_callback: Option<ExceptionCallback>,
}

impl Frame {
    /// Creates a pending frame for `func` with positional arguments.
    ///
    /// Arguments fill the first local slots; the rest stay unset.
    pub(crate) fn new(
        module: Arc<Module>,
        func: &ManagedFn,
        args: Vec<Value>,
        parent: Option<FrameId>,
        depth: usize,
    ) -> Result<Self> {
        let unit = Arc::clone(module.resolve(func)?);
        let slots = unit.local_count();
        if args.len() > slots {
            return Err(Error::arity_mismatch(unit.name(), slots, args.len()));
        }
        let mut locals = vec![None; slots];
        for (slot, arg) in locals.iter_mut().zip(args) {
            *slot = Some(arg);
        }
        Ok(Self {
            id: FrameId::next(),
            stack: Vec::with_capacity(unit.max_stack().min(DEFAULT_STACK_SIZE)),
            unit,
            module,
            ip: 0,
            current: 0,
            locals,
            state: FrameState::Pending,
            result: None,
            exception: None,
            guards: Vec::new(),
            guard_mode: GuardMode::default(),
            parent,
            awaiting: Awaiting::Nothing,
            outgoing: None,
            depth,
            done_callback: None,
            exception_callback: None,
        })
    }

    /// Creates the child frame for a managed call made by this frame.
    ///
    /// The child's callbacks deliver its outcome back into this frame.
    pub(crate) fn child(&self, call: PendingCall) -> Result<Frame> {
        let mut child = Frame::new(
            Arc::clone(&self.module),
            &call.func,
            call.args,
            Some(self.id),
            self.depth + 1,
        )?;
        child.guard_mode = self.guard_mode;
        child.done_callback = Some(Box::new(|parent: Option<&mut Frame>, value: &Value| {
            parent
                .ok_or_else(|| Error::internal("child finished without a parent"))?
                .resume_with(value.clone())
        }));
        child.exception_callback = Some(Box::new(|parent: Option<&mut Frame>, raised: &Raised| {
            parent
                .ok_or_else(|| Error::internal("child errored without a parent"))?
                .resume_raising(raised.clone())
        }));
        Ok(child)
    }

    // =========================================================================
    // Read surface
    // =========================================================================

    /// Returns the frame id.
    #[must_use]
    pub fn id(&self) -> FrameId {
        self.id
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Returns the result of a finished frame.
    pub fn result(&self) -> Result<&Value> {
        match (&self.state, &self.result) {
            (FrameState::Finished, Some(value)) => Ok(value),
            _ => Err(Error::invalid_state(format!(
                "result of frame {} is not available while {:?}",
                self.id, self.state
            ))),
        }
    }

    /// Returns the active or terminal exception.
    #[must_use]
    pub fn exception(&self) -> Option<&Raised> {
        self.exception.as_ref()
    }

    /// Index of the next instruction to execute.
    #[must_use]
    pub fn instruction_pointer(&self) -> usize {
        self.ip
    }

    /// Handler of the innermost guard that has not yet taken an error.
    #[must_use]
    pub fn handler_pointer(&self) -> Option<usize> {
        self.guards
            .last()
            .filter(|guard| !guard.handling)
            .map(|guard| guard.handler)
    }

    /// Number of active guarded regions.
    #[must_use]
    pub fn guard_depth(&self) -> usize {
        self.guards.len()
    }

    /// Returns the operand stack, bottom first.
    #[must_use]
    pub fn stack(&self) -> &[Value] {
        &self.stack
    }

    /// Returns a local slot, `None` if unset or out of range.
    #[must_use]
    pub fn local(&self, slot: usize) -> Option<&Value> {
        self.locals.get(slot).and_then(Option::as_ref)
    }

    /// Returns the id of the calling frame.
    #[must_use]
    pub fn parent(&self) -> Option<FrameId> {
        self.parent
    }

    /// Returns what a suspended frame waits for.
    #[must_use]
    pub fn awaiting(&self) -> Awaiting {
        self.awaiting
    }

    /// Call depth; top-level frames are at depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Returns the unit this frame executes.
    #[must_use]
    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    /// Returns the module this frame resolves globals in.
    #[must_use]
    pub fn module(&self) -> &Arc<Module> {
        &self.module
    }

    /// Returns the guard mode.
    #[must_use]
    pub fn guard_mode(&self) -> GuardMode {
        self.guard_mode
    }

    /// Returns the instruction most recently fetched.
    #[must_use]
    pub fn current_instruction(&self) -> Option<&Instruction> {
        self.unit.instruction(self.current)
    }

    // =========================================================================
    // Callbacks
    // =========================================================================

    /// Registers the callback invoked with the result once the frame finishes.
    pub fn add_done_callback(&mut self, callback: impl FnOnce(&Value) + Send + 'static) -> Result<()> {
        self.check_callback_slot("done", self.done_callback.is_some())?;
        self.done_callback = Some(Box::new(move |_: Option<&mut Frame>, value: &Value| {
            callback(value);
            Ok(())
        }));
        Ok(())
    }

    /// Registers the callback invoked with the error once the frame errors.
    pub fn add_exception_callback(
        &mut self,
        callback: impl FnOnce(&Raised) + Send + 'static,
    ) -> Result<()> {
        self.check_callback_slot("exception", self.exception_callback.is_some())?;
        self.exception_callback = Some(Box::new(move |_: Option<&mut Frame>, raised: &Raised| {
            callback(raised);
            Ok(())
        }));
        Ok(())
    }

    fn check_callback_slot(&self, kind: &str, taken: bool) -> Result<()> {
        if self.state.is_terminal() {
            return Err(Error::invalid_state(format!(
                "frame {} already completed ({:?})",
                self.id, self.state
            )));
        }
        if taken {
            return Err(Error::invalid_state(format!(
                "{kind} callback already registered on frame {}",
                self.id
            )));
        }
        Ok(())
    }

    /// Fires the callback matching the terminal state.
    ///
    /// `parent` is the calling frame, if it is still alive. A missing
    /// callback is not an error.
    pub(crate) fn notify(&mut self, parent: Option<&mut Frame>) -> Result<()> {
        match self.state {
            FrameState::Finished => match (self.done_callback.take(), &self.result) {
                (Some(callback), Some(result)) => callback(parent, result),
                (None, _) => Ok(()),
                (Some(_), None) => Err(Error::internal("finished frame has no result")),
            },
            FrameState::Errored => match (self.exception_callback.take(), &self.exception) {
                (Some(callback), Some(raised)) => callback(parent, raised),
                (None, _) => Ok(()),
                (Some(_), None) => Err(Error::internal("errored frame has no exception")),
            },
            state => Err(Error::invalid_state(format!(
                "cannot notify from frame {} while {state:?}",
                self.id
            ))),
        }
    }

    // =========================================================================
    // Resumption
    // =========================================================================

    fn expect_suspended(&self) -> Result<()> {
        if self.state == FrameState::Suspended {
            Ok(())
        } else {
            Err(Error::invalid_state(format!(
                "cannot resume frame {} while {:?}",
                self.id, self.state
            )))
        }
    }

    /// Resumes a suspended frame with `value` pushed onto its stack.
    pub(crate) fn resume_with(&mut self, value: Value) -> Result<()> {
        self.expect_suspended()?;
        self.push(value)?;
        self.awaiting = Awaiting::Nothing;
        self.state = FrameState::Pending;
        Ok(())
    }

    /// Resumes a suspended frame by raising `raised` at its suspension point.
    pub(crate) fn resume_raising(&mut self, raised: Raised) -> Result<()> {
        self.expect_suspended()?;
        self.awaiting = Awaiting::Nothing;
        self.state = FrameState::Running;
        unwind::safe_raise(self, raised)
    }

    // =========================================================================
    // Operand stack and names
    // =========================================================================

    /// Pushes onto the operand stack, bounded by the unit's declared depth.
    pub(crate) fn push(&mut self, value: Value) -> Result<()> {
        let limit = self.unit.max_stack();
        if self.stack.len() >= limit {
            return Err(Error::new(ErrorKind::StackOverflow { limit }));
        }
        self.stack.push(value);
        Ok(())
    }

    /// Pops the top of the operand stack.
    pub(crate) fn pop(&mut self) -> Result<Value> {
        self.stack
            .pop()
            .ok_or_else(|| Error::new(ErrorKind::StackUnderflow))
    }

    /// Returns the top of the operand stack.
    pub(crate) fn peek(&self) -> Result<&Value> {
        self.stack
            .last()
            .ok_or_else(|| Error::new(ErrorKind::StackUnderflow))
    }

    /// Resolves a global through the module namespace, then the builtins.
    #[must_use]
    pub fn get_global(&self, name: &str) -> Option<Value> {
        self.module.global(name).cloned()
    }

    /// Describes the current instruction for a traceback.
    pub(crate) fn trace_entry(&self) -> TraceEntry {
        TraceEntry {
            unit: self.unit.shared_name(),
            frame: self.id.as_u64(),
            index: self.current,
            offset: self.current_instruction().map_or(0, |instr| instr.offset),
        }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("id", &self.id)
            .field("unit", &self.unit.name())
            .field("state", &self.state)
            .field("ip", &self.ip)
            .field("stack", &self.stack)
            .field("guards", &self.guards)
            .field("parent", &self.parent)
            .field("awaiting", &self.awaiting)
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}
