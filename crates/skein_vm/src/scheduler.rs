//! Cooperative scheduler.
//!
//! The scheduler owns every live frame. Runnable frames wait in a single FIFO
//! ready queue; frames waiting on a child or on an external wake sit in the
//! parked set, keyed by id. One frame runs at a time, for one turn, on the
//! thread that called [`Scheduler::run`].
//!
//! External sources resume suspended frames through [`Waker`]s, which are the
//! only part of the scheduler that may cross threads.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use skein_foundation::{Error, ErrorContext, ErrorKind, Raised, Result, Value};
use tracing::{debug, error, trace, warn};

use crate::config::SchedulerConfig;
use crate::diagnostics::FrameSnapshot;
use crate::frame::{Awaiting, Frame, FrameId, FrameState};
use crate::interpreter::{Interpreter, Turn};


/// How long the scheduler blocks on the wake channel before re-checking
/// whether any waker is still alive.
const WAKE_POLL: Duration = Duration::from_millis(10);

/// What an external wake delivers.
#[derive(Debug)]
enum Signal {
    Resume(Value),
    Raise(Raised),
}

#[derive(Debug)]
struct Wake {
    frame: FrameId,
    signal: Signal,
}

/// A cloneable, thread-safe handle for resuming suspended frames.
///
/// The scheduler only blocks waiting for a wake while at least one `Waker`
/// is alive.
#[derive(Clone, Debug)]
pub struct Waker {
    tx: Sender<Wake>,
    _token: Arc<()>,
}

impl Waker {
    /// Resumes `frame` with `value` pushed onto its stack.
    ///
    /// If the frame has not suspended yet, the wake is kept and consumed at
    /// its next suspension. Returns false once the scheduler is gone.
    pub fn wake(&self, frame: FrameId, value: impl Into<Value>) -> bool {
        self.send(frame, Signal::Resume(value.into()))
    }

    /// Resumes `frame` by raising `raised` at its suspension point.
    ///
    /// This is how a suspended task is cancelled: a guard around the
    /// suspension can take the error like any other.
    pub fn throw(&self, frame: FrameId, raised: Raised) -> bool {
        self.send(frame, Signal::Raise(raised))
    }

    fn send(&self, frame: FrameId, signal: Signal) -> bool {
        self.tx.send(Wake { frame, signal }).is_ok()
    }
}

/// Counters describing the scheduler's work so far.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Turns executed.
    pub turns: usize,
    /// Frames enqueued, top-level and child.
    pub frames_spawned: usize,
    /// Frames that finished with a result.
    pub frames_finished: usize,
    /// Frames that finished with an unhandled error.
    pub frames_errored: usize,
    /// Frames discarded by fatal faults or deadlock.
    pub frames_aborted: usize,
}

/// Runs frames to completion on a single ready queue.
pub struct Scheduler {
    config: SchedulerConfig,
    interpreter: Interpreter,
    ready: VecDeque<Frame>,
    parked: HashMap<FrameId, Frame>,
    /// Wakes that arrived before their frame suspended.
    permits: HashMap<FrameId, Wake>,
    wake_tx: Sender<Wake>,
    wake_rx: Receiver<Wake>,
    /// One strong reference per live waker, plus ours.
    wakers: Arc<()>,
    root: Option<FrameId>,
    outcome: Option<Frame>,
    root_fault: Option<Error>,
    running: bool,
    closed: bool,
    stats: SchedulerStats,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl Scheduler {
    /// Creates a scheduler.
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        let (wake_tx, wake_rx) = channel::unbounded();
        Self {
            interpreter: Interpreter::new(&config),
            config,
            ready: VecDeque::new(),
            parked: HashMap::new(),
            permits: HashMap::new(),
            wake_tx,
            wake_rx,
            wakers: Arc::new(()),
            root: None,
            outcome: None,
            root_fault: None,
            running: false,
            closed: false,
            stats: SchedulerStats::default(),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Returns the work counters.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// Number of frames waiting in the ready queue.
    #[must_use]
    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    /// Number of frames parked on a child or a wake.
    #[must_use]
    pub fn parked_len(&self) -> usize {
        self.parked.len()
    }

    /// Returns true once [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Hands out a waker for frames run by this scheduler.
    #[must_use]
    pub fn waker(&self) -> Waker {
        Waker {
            tx: self.wake_tx.clone(),
            _token: Arc::clone(&self.wakers),
        }
    }

    /// Discards all queued work and rejects further runs.
    pub fn close(&mut self) {
        let dropped = self.ready.len() + self.parked.len();
        if dropped > 0 {
            debug!(dropped, "closing scheduler with queued frames");
        }
        self.ready.clear();
        self.parked.clear();
        self.permits.clear();
        self.closed = true;
    }

    // =========================================================================
    // Entry points
    // =========================================================================

    /// Runs `frame` and every frame it depends on, returning its result.
    ///
    /// # Errors
    ///
    /// An unhandled error in the task is returned as `ErrorKind::Raised`
    /// carrying the error value, cause and traceback. Fatal faults in the
    /// task, deadlock, and misuse (a closed or busy scheduler, a frame that
    /// is not pending) are returned as their own kinds.
    pub fn run(&mut self, frame: Frame) -> Result<Value> {
        let frame = self.drive(frame)?;
        match frame.state {
            FrameState::Finished => frame.result().cloned(),
            FrameState::Errored => match frame.exception {
                Some(raised) => Err(Error::raised(raised)),
                None => Err(Error::internal("errored frame has no exception")),
            },
            state => Err(Error::invalid_state(format!(
                "task {} ended while {state:?}",
                frame.id
            ))),
        }
    }

    /// Like [`run`](Self::run), but returns the terminal frame itself.
    ///
    /// The frame is `Finished` or `Errored`; an unhandled error is not turned
    /// into an `Err`.
    ///
    /// # Errors
    ///
    /// See [`run`](Self::run) for fatal faults and misuse.
    pub fn drive(&mut self, mut frame: Frame) -> Result<Frame> {
        self.check_idle()?;
        Self::check_pending(&frame)?;
        frame.guard_mode = self.config.guard_mode;

        let root = frame.id;
        debug!(frame = %root, unit = frame.unit.name(), "run started");
        self.root = Some(root);
        self.outcome = None;
        self.root_fault = None;
        self.stats.frames_spawned += 1;
        self.ready.push_back(frame);

        self.running = true;
        let drained = self.drain();
        self.running = false;
        self.root = None;
        let outcome = self.outcome.take();
        let fault = self.root_fault.take();

        drained?;
        if let Some(fault) = fault {
            return Err(fault);
        }
        let frame = outcome
            .ok_or_else(|| Error::invalid_state(format!("task {root} never completed")))?;
        debug!(frame = %root, state = ?frame.state, "run finished");
        Ok(frame)
    }

    /// Enqueues an independent top-level task without running it.
    ///
    /// Submitted tasks interleave with the next [`run`](Self::run) or
    /// [`run_pending`](Self::run_pending). Their outcome is observed through
    /// the frame's callbacks.
    ///
    /// # Errors
    ///
    /// Fails on a closed scheduler or a frame that is not pending.
    pub fn submit(&mut self, mut frame: Frame) -> Result<FrameId> {
        if self.closed {
            return Err(Error::invalid_state("scheduler is closed"));
        }
        Self::check_pending(&frame)?;
        frame.guard_mode = self.config.guard_mode;
        let id = frame.id;
        trace!(frame = %id, unit = frame.unit.name(), "submitted");
        self.stats.frames_spawned += 1;
        self.ready.push_back(frame);
        Ok(id)
    }

    /// Runs submitted tasks until nothing is left.
    ///
    /// # Errors
    ///
    /// Fails on misuse or deadlock. Faults inside tasks are logged and the
    /// tasks aborted; they are not returned.
    pub fn run_pending(&mut self) -> Result<()> {
        self.check_idle()?;
        self.running = true;
        let drained = self.drain();
        self.running = false;
        drained
    }

    fn check_idle(&self) -> Result<()> {
        if self.closed {
            return Err(Error::invalid_state("scheduler is closed"));
        }
        if self.running {
            return Err(Error::invalid_state("scheduler is already running"));
        }
        Ok(())
    }

    fn check_pending(frame: &Frame) -> Result<()> {
        if frame.state == FrameState::Pending {
            Ok(())
        } else {
            Err(Error::invalid_state(format!(
                "cannot schedule frame {} while {:?}",
                frame.id, frame.state
            )))
        }
    }

    // =========================================================================
    // Main loop
    // =========================================================================

    fn drain(&mut self) -> Result<()> {
        loop {
            while let Ok(wake) = self.wake_rx.try_recv() {
                self.handle_wake(wake);
            }
            if self.step() {
                continue;
            }
            if self.parked.is_empty() {
                self.permits.clear();
                return Ok(());
            }
            if !self.wakeable() {
                // A waker may have sent and then dropped since the last poll.
                if let Ok(wake) = self.wake_rx.try_recv() {
                    self.handle_wake(wake);
                    continue;
                }
                return Err(self.deadlock());
            }
            match self.wake_rx.recv_timeout(WAKE_POLL) {
                Ok(wake) => self.handle_wake(wake),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(Error::internal("wake channel disconnected"));
                }
            }
        }
    }

    /// Takes one frame off the ready queue and advances it. Returns false
    /// when the queue is empty.
    pub(crate) fn step(&mut self) -> bool {
        let Some(frame) = self.ready.pop_front() else {
            return false;
        };
        match frame.state {
            FrameState::Suspended => self.park(frame),
            FrameState::Running => {
                let err = Error::invalid_state(format!(
                    "frame {} was queued while running",
                    frame.id
                ));
                self.abort(frame, err);
            }
            FrameState::Pending => self.run_one_turn(frame),
            FrameState::Finished | FrameState::Errored => self.finalize(frame),
        }
        true
    }

    fn run_one_turn(&mut self, mut frame: Frame) {
        self.stats.turns += 1;
        trace!(frame = %frame.id, unit = frame.unit.name(), ip = frame.ip, "turn");
        match self.interpreter.run_turn(&mut frame) {
            Ok(Turn::Call(child)) => {
                trace!(parent = %frame.id, child = %child.id, unit = child.unit.name(), "call");
                self.stats.frames_spawned += 1;
                self.ready.push_back(child);
                self.park(frame);
            }
            Ok(Turn::Suspended) => self.park(frame),
            Ok(Turn::Yielded) => self.ready.push_back(frame),
            Ok(Turn::Finished | Turn::Errored) => self.finalize(frame),
            Err(err) => self.abort(frame, err),
        }
    }

    // =========================================================================
    // Parking and waking
    // =========================================================================

    fn park(&mut self, frame: Frame) {
        if frame.awaiting == Awaiting::Wake {
            if let Some(permit) = self.permits.remove(&frame.id) {
                trace!(frame = %frame.id, "consumed early wake");
                self.resume(frame, permit.signal);
                return;
            }
        }
        debug!(frame = %frame.id, awaiting = ?frame.awaiting, "parked");
        self.parked.insert(frame.id, frame);
    }

    fn handle_wake(&mut self, wake: Wake) {
        let waiting = self
            .parked
            .get(&wake.frame)
            .is_some_and(|frame| frame.awaiting == Awaiting::Wake);
        if waiting {
            if let Some(frame) = self.parked.remove(&wake.frame) {
                trace!(frame = %frame.id, "woken");
                self.resume(frame, wake.signal);
            }
        } else if self.permits.contains_key(&wake.frame) {
            warn!(frame = %wake.frame, "ignoring second wake for a frame that has not suspended");
        } else {
            trace!(frame = %wake.frame, "holding wake until the frame suspends");
            self.permits.insert(wake.frame, wake);
        }
    }

    fn resume(&mut self, mut frame: Frame, signal: Signal) {
        let resumed = match signal {
            Signal::Resume(value) => frame.resume_with(value),
            Signal::Raise(raised) => frame.resume_raising(raised),
        };
        match resumed {
            Ok(()) => self.ready.push_back(frame),
            Err(err) => self.abort(frame, err),
        }
    }

    fn wakeable(&self) -> bool {
        Arc::strong_count(&self.wakers) > 1
            && self
                .parked
                .values()
                .any(|frame| frame.awaiting == Awaiting::Wake)
    }

    fn deadlock(&mut self) -> Error {
        let parked = self.parked.len();
        let frames: Vec<String> = self
            .parked
            .values()
            .map(|frame| format!("{} in {} ({:?})", frame.id, frame.unit.name(), frame.awaiting))
            .collect();
        error!(parked, frames = ?frames, "deadlock: parked frames can never be woken");
        self.stats.frames_aborted += parked;
        self.parked.clear();
        self.permits.clear();
        Error::new(ErrorKind::Deadlock { parked })
    }

    // =========================================================================
    // Completion
    // =========================================================================

    /// Hands a terminal frame's outcome to its caller, or records it as the
    /// run's outcome.
    fn finalize(&mut self, mut frame: Frame) {
        match frame.state {
            FrameState::Finished => self.stats.frames_finished += 1,
            _ => self.stats.frames_errored += 1,
        }
        self.permits.remove(&frame.id);
        debug!(frame = %frame.id, unit = frame.unit.name(), state = ?frame.state, "frame completed");

        let Some(parent_id) = frame.parent else {
            if let Err(err) = frame.notify(None) {
                self.abort(frame, err);
            } else if self.root == Some(frame.id) {
                self.outcome = Some(frame);
            }
            return;
        };

        let Some(mut parent) = self.parked.remove(&parent_id) else {
            warn!(frame = %frame.id, parent = %parent_id, "caller is gone; dropping outcome");
            return;
        };
        match frame.notify(Some(&mut parent)) {
            Ok(()) if parent.state == FrameState::Suspended => self.park(parent),
            Ok(()) => self.ready.push_back(parent),
            Err(err) => self.abort(parent, err),
        }
    }

    /// Discards the task containing `frame` after a fatal fault.
    ///
    /// The fault is logged with a snapshot of the frame. It is kept for
    /// [`run`](Self::run) only when the task is the run's root.
    fn abort(&mut self, frame: Frame, err: Error) {
        let snapshot = FrameSnapshot::capture(&frame);
        let mut context = ErrorContext::new()
            .with_unit(frame.unit.name())
            .with_snapshot(snapshot.to_string());
        if let Some(instr) = frame.current_instruction() {
            context = context.with_instruction(frame.current, instr.to_string());
        }

        let mut callers = Vec::new();
        let mut top = frame.id;
        let mut next = frame.parent;
        while let Some(id) = next {
            let Some(caller) = self.parked.remove(&id) else {
                break;
            };
            callers.push(format!("{} in {}", caller.id, caller.unit.name()));
            self.permits.remove(&caller.id);
            top = caller.id;
            next = caller.parent;
        }
        for caller in callers.iter().rev() {
            context = context.with_frame(caller.clone());
        }
        self.permits.remove(&frame.id);
        self.stats.frames_aborted += 1 + callers.len();

        let err = if err.context.is_some() {
            err
        } else {
            err.with_context(context)
        };
        error!(
            task = %top,
            frame = %frame.id,
            error = %err,
            snapshot = %snapshot,
            "task aborted"
        );
        if self.root == Some(top) {
            self.root_fault = Some(err);
        }
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.config)
            .field("ready", &self.ready.len())
            .field("parked", &self.parked.len())
            .field("permits", &self.permits.len())
            .field("running", &self.running)
            .field("closed", &self.closed)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
