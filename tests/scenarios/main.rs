//! End-to-end scenarios
//!
//! Small programs run through the public API the way an embedding host would
//! use it: build units, spawn a task, run it, inspect the outcome.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crossbeam::channel;
use skein::foundation::{ErrorClass, ErrorKind, Raised, Type, Value};
use skein::vm::{
    FrameState, Module, ModuleBuilder, Opcode, Scheduler, SchedulerConfig, Unit, UnitBuilder,
};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn module(units: impl IntoIterator<Item = Unit>) -> Arc<Module> {
    let mut mb = ModuleBuilder::new("scenario");
    for unit in units {
        mb.add_unit(unit);
    }
    mb.build()
}

fn error_class(class: ErrorClass) -> Value {
    Value::Type(Type::Error(class))
}

/// `def a(): return 1`
fn unit_a() -> Unit {
    let mut u = UnitBuilder::new("a");
    let one = u.constant(1);
    u.emit(Opcode::PushConst, one);
    u.emit(Opcode::ReturnValue, 0);
    u.build()
}

/// `def b(): try: raise ValueError except: return 2`
fn unit_b() -> Unit {
    let mut u = UnitBuilder::new("b");
    let err = u.constant(error_class(ErrorClass::value_error()));
    let two = u.constant(2);
    let guard = u.emit_jump(Opcode::EnterGuard);
    u.emit(Opcode::PushConst, err);
    u.emit(Opcode::Raise, 1);
    u.patch_jump(guard);
    for _ in 0..3 {
        u.emit(Opcode::Pop, 0);
    }
    u.emit(Opcode::ExitGuard, 0);
    u.emit(Opcode::PushConst, two);
    u.emit(Opcode::ReturnValue, 0);
    u.build()
}

/// `def <name>(): return <callee>()`
fn caller(name: &str, callee: &str) -> Unit {
    let mut u = UnitBuilder::new(name);
    let f = u.name(callee);
    u.emit(Opcode::LoadGlobal, f);
    u.emit(Opcode::Call, 0);
    u.emit(Opcode::ReturnValue, 0);
    u.build()
}

// =============================================================================
// Core scenarios
// =============================================================================

#[test]
fn returning_a_constant() {
    init_tracing();
    let m = module([unit_a()]);
    let mut scheduler = Scheduler::default();
    assert_eq!(scheduler.run(m.spawn("a", vec![]).unwrap()).unwrap(), Value::Int(1));
}

#[test]
fn catching_an_error() {
    init_tracing();
    let m = module([unit_b()]);
    let mut scheduler = Scheduler::default();
    assert_eq!(scheduler.run(m.spawn("b", vec![]).unwrap()).unwrap(), Value::Int(2));
}

#[test]
fn calling_a_managed_function() {
    init_tracing();
    let m = module([unit_b(), caller("a", "b")]);
    let mut scheduler = Scheduler::default();
    let frame = scheduler.drive(m.spawn("a", vec![]).unwrap()).unwrap();

    assert_eq!(frame.state(), FrameState::Finished);
    assert_eq!(frame.result().unwrap(), &Value::Int(2));
    assert_eq!(scheduler.ready_len(), 0);
    assert_eq!(scheduler.parked_len(), 0);
}

#[test]
fn too_many_arguments() {
    init_tracing();
    let mut u = UnitBuilder::new("one");
    u.local("x");
    u.emit(Opcode::LoadLocal, 0);
    u.emit(Opcode::ReturnValue, 0);
    let m = module([u.build(), {
        let mut u = UnitBuilder::new("main");
        let f = u.name("one");
        let c = u.constant(0);
        u.emit(Opcode::LoadGlobal, f);
        u.emit(Opcode::PushConst, c);
        u.emit(Opcode::PushConst, c);
        u.emit(Opcode::Call, 2);
        u.emit(Opcode::ReturnValue, 0);
        u.build()
    }]);

    // At the top level there is no caller to raise into.
    let err = m.spawn("one", vec![Value::Int(1), Value::Int(2)]).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::ArityMismatch { slots: 1, actual: 2, .. }));

    // Nested, it is an ordinary catchable error.
    let mut scheduler = Scheduler::default();
    let err = scheduler.run(m.spawn("main", vec![]).unwrap()).unwrap_err();
    assert!(err.as_raised().unwrap().is_instance_of(&ErrorClass::arity_error()));
}

// =============================================================================
// Faults and errors across tasks
// =============================================================================

#[test]
fn unknown_opcode_aborts_only_its_task() {
    init_tracing();
    let mut bad = UnitBuilder::new("bad");
    bad.emit_raw(0xfa, 0);
    let m = module([bad.build(), unit_b()]);
    let mut scheduler = Scheduler::default();

    let finished = Arc::new(Mutex::new(None));
    let mut healthy = m.spawn("b", vec![]).unwrap();
    let slot = Arc::clone(&finished);
    healthy
        .add_done_callback(move |value| *slot.lock().unwrap() = Some(value.clone()))
        .unwrap();
    scheduler.submit(healthy).unwrap();

    let err = scheduler.run(m.spawn("bad", vec![]).unwrap()).unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err.kind, ErrorKind::UnknownOpcode { opcode: 0xfa, .. }));
    assert_eq!(*finished.lock().unwrap(), Some(Value::Int(2)));

    // Later runs are unaffected.
    assert_eq!(scheduler.run(m.spawn("b", vec![]).unwrap()).unwrap(), Value::Int(2));
}

#[test]
fn traceback_lists_frames_in_call_order() {
    init_tracing();
    let mut leaf = UnitBuilder::new("leaf");
    let err = leaf.constant(error_class(ErrorClass::value_error()));
    leaf.emit(Opcode::Nop, 0);
    leaf.emit(Opcode::PushConst, err);
    leaf.emit(Opcode::Raise, 1);
    let m = module([leaf.build(), caller("middle", "leaf"), caller("outer", "middle")]);

    let mut scheduler = Scheduler::default();
    let err = scheduler.run(m.spawn("outer", vec![]).unwrap()).unwrap_err();
    let raised = err.as_raised().unwrap();
    let tb = raised.traceback.as_ref().unwrap();

    let units: Vec<_> = tb.entries().map(|e| e.unit.to_string()).collect();
    assert_eq!(units, vec!["outer", "middle", "leaf"]);
    assert_eq!(tb.innermost().index, 2);
    assert!(raised.to_string().contains("ValueError"));
}

#[test]
fn recursion_limit() {
    init_tracing();
    let m = module([caller("forever", "forever")]);
    let mut scheduler = Scheduler::new(SchedulerConfig::new().with_max_call_depth(25));
    let err = scheduler.run(m.spawn("forever", vec![]).unwrap()).unwrap_err();
    assert!(err.as_raised().unwrap().is_instance_of(&ErrorClass::recursion_error()));
    assert_eq!(scheduler.stats().frames_errored, 25);
}

// =============================================================================
// Multiple tasks
// =============================================================================

#[test]
fn children_run_after_already_queued_tasks() {
    init_tracing();
    let m = module([unit_a(), caller("calls_a", "a")]);
    let mut scheduler = Scheduler::default();
    let order = Arc::new(Mutex::new(Vec::new()));

    for name in ["calls_a", "a"] {
        let mut frame = m.spawn(name, vec![]).unwrap();
        let order = Arc::clone(&order);
        frame
            .add_done_callback(move |_| order.lock().unwrap().push(name))
            .unwrap();
        scheduler.submit(frame).unwrap();
    }
    scheduler.run_pending().unwrap();

    assert_eq!(*order.lock().unwrap(), vec!["a", "calls_a"]);
}

// =============================================================================
// External wakes
// =============================================================================

/// `def wait(): return suspend() * 2`
fn waiter() -> Unit {
    let mut u = UnitBuilder::new("wait");
    let two = u.constant(2);
    u.emit(Opcode::Suspend, 0);
    u.emit(Opcode::PushConst, two);
    u.emit(Opcode::Mul, 0);
    u.emit(Opcode::ReturnValue, 0);
    u.build()
}

#[test]
fn external_wake_resumes_suspended_frame() {
    init_tracing();
    let m = module([waiter()]);
    let mut scheduler = Scheduler::default();
    let frame = m.spawn("wait", vec![]).unwrap();

    let (ids_tx, ids_rx) = channel::bounded(1);
    ids_tx.send(frame.id()).unwrap();
    let waker = scheduler.waker();
    let source = thread::spawn(move || {
        let id = ids_rx.recv().unwrap();
        thread::sleep(Duration::from_millis(25));
        waker.wake(id, 21)
    });

    assert_eq!(scheduler.run(frame).unwrap(), Value::Int(42));
    assert!(source.join().unwrap());
}

#[test]
fn cancellation_is_an_injected_error() {
    init_tracing();
    let mut u = UnitBuilder::new("cancellable");
    let cancelled = u.constant("cancelled");
    let guard = u.emit_jump(Opcode::EnterGuard);
    u.emit(Opcode::Suspend, 0);
    u.emit(Opcode::ReturnValue, 0);
    u.patch_jump(guard);
    u.emit(Opcode::PushConst, cancelled);
    u.emit(Opcode::ReturnValue, 0);
    let m = module([u.build()]);

    let mut scheduler = Scheduler::default();
    let frame = m.spawn("cancellable", vec![]).unwrap();
    let id = frame.id();
    let waker = scheduler.waker();
    let source = thread::spawn(move || {
        thread::sleep(Duration::from_millis(10));
        waker.throw(id, Raised::of(ErrorClass::runtime_error(), "stop"));
    });

    assert_eq!(scheduler.run(frame).unwrap(), Value::from("cancelled"));
    source.join().unwrap();
}

#[test]
fn suspension_nobody_can_wake_is_deadlock() {
    init_tracing();
    let m = module([waiter()]);
    let mut scheduler = Scheduler::default();
    let err = scheduler.run(m.spawn("wait", vec![]).unwrap()).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Deadlock { parked: 1 }));
}

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn closed_scheduler_rejects_work() {
    init_tracing();
    let m = module([unit_a()]);
    let mut scheduler = Scheduler::default();
    assert_eq!(scheduler.run(m.spawn("a", vec![]).unwrap()).unwrap(), Value::Int(1));

    scheduler.close();
    let err = scheduler.run(m.spawn("a", vec![]).unwrap()).unwrap_err();
    assert!(err.is_fatal());
}

#[test]
fn callbacks_cannot_be_registered_twice() {
    let m = module([unit_a()]);
    let mut frame = m.spawn("a", vec![]).unwrap();
    frame.add_done_callback(|_| {}).unwrap();
    assert!(frame.add_done_callback(|_| {}).is_err());
    frame.add_exception_callback(|_| {}).unwrap();
}
