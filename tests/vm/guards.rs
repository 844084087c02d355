//! Integration tests for guarded regions and raising

use skein_foundation::{ErrorClass, ErrorValue, Type, Value};
use skein_vm::{GuardMode, ModuleBuilder, Opcode, Scheduler, SchedulerConfig, UnitBuilder};

use crate::{assert_raises, run_main};

fn class(class: ErrorClass) -> Value {
    Value::Type(Type::Error(class))
}

/// Handler prologue: drops traceback and cause, leaving the error on top.
fn drop_tb_and_cause(u: &mut UnitBuilder) {
    u.emit(Opcode::Pop, 0);
    u.emit(Opcode::Pop, 0);
}

#[test]
fn guard_exit_on_normal_path() {
    let result = run_main(|u| {
        let one = u.constant(1);
        let two = u.constant(2);
        let guard = u.emit_jump(Opcode::EnterGuard);
        u.emit(Opcode::PushConst, one);
        u.emit(Opcode::ExitGuard, 0);
        u.emit(Opcode::ReturnValue, 0);
        u.patch_jump(guard);
        u.emit(Opcode::PushConst, two);
        u.emit(Opcode::ReturnValue, 0);
    })
    .unwrap();
    assert_eq!(result, Value::Int(1));
}

#[test]
fn error_after_guard_exit_is_not_caught() {
    assert_raises(&ErrorClass::value_error(), |u| {
        let err = u.constant(class(ErrorClass::value_error()));
        let guard = u.emit_jump(Opcode::EnterGuard);
        u.emit(Opcode::ExitGuard, 0);
        u.emit(Opcode::PushConst, err);
        u.emit(Opcode::Raise, 1);
        u.patch_jump(guard);
        u.emit(Opcode::ReturnValue, 0);
    });
}

/// `try: raise <raised> except <caught>: return "caught"`, re-raising on a
/// mismatch.
fn match_and_handle(raised: ErrorClass, caught: Value) -> Result<Value, skein_foundation::Error> {
    run_main(|u| {
        let err = u.constant(class(raised));
        let candidates = u.constant(caught);
        let ok = u.constant("caught");

        let guard = u.emit_jump(Opcode::EnterGuard);
        u.emit(Opcode::PushConst, err);
        u.emit(Opcode::Raise, 1);
        u.patch_jump(guard);
        drop_tb_and_cause(u);
        u.emit(Opcode::Dup, 0);
        u.emit(Opcode::PushConst, candidates);
        u.emit(Opcode::CompareExceptionMatch, 0);
        let no_match = u.emit_jump(Opcode::JumpIfFalsy);
        u.emit(Opcode::Pop, 0);
        u.emit(Opcode::ExitGuard, 0);
        u.emit(Opcode::PushConst, ok);
        u.emit(Opcode::ReturnValue, 0);
        u.patch_jump(no_match);
        u.emit(Opcode::Raise, 0);
    })
}

#[test]
fn handler_matches_base_class() {
    let result = match_and_handle(ErrorClass::zero_division_error(), class(ErrorClass::arithmetic_error()));
    assert_eq!(result.unwrap(), Value::from("caught"));
}

#[test]
fn handler_matches_any_of_a_tuple() {
    let candidates = Value::tuple([class(ErrorClass::type_error()), class(ErrorClass::value_error())]);
    let result = match_and_handle(ErrorClass::value_error(), candidates);
    assert_eq!(result.unwrap(), Value::from("caught"));
}

#[test]
fn mismatch_reraises_without_new_traceback_entry() {
    let err = match_and_handle(ErrorClass::value_error(), class(ErrorClass::type_error())).unwrap_err();
    let raised = err.as_raised().unwrap();
    assert!(raised.is_instance_of(&ErrorClass::value_error()));
    assert_eq!(raised.traceback.as_ref().unwrap().len(), 1);
}

#[test]
fn matching_against_a_non_type_raises_type_error() {
    let err = match_and_handle(ErrorClass::value_error(), Value::Int(3)).unwrap_err();
    assert!(err.as_raised().unwrap().is_instance_of(&ErrorClass::type_error()));
}

#[test]
fn raise_with_cause() {
    let err = run_main(|u| {
        let err = u.constant(class(ErrorClass::value_error()));
        let cause = u.constant(class(ErrorClass::type_error()));
        u.emit(Opcode::PushConst, err);
        u.emit(Opcode::PushConst, cause);
        u.emit(Opcode::Raise, 2);
    })
    .unwrap_err();
    let raised = err.as_raised().unwrap();
    let cause = raised.cause.as_ref().and_then(Value::as_error).unwrap();
    assert_eq!(cause.class(), &ErrorClass::type_error());
}

#[test]
fn raising_a_non_error_is_type_error() {
    assert_raises(&ErrorClass::type_error(), |u| {
        let five = u.constant(5);
        u.emit(Opcode::PushConst, five);
        u.emit(Opcode::Raise, 1);
    });
}

#[test]
fn bare_reraise_without_active_error() {
    assert_raises(&ErrorClass::runtime_error(), |u| {
        u.emit(Opcode::Raise, 0);
    });
}

#[test]
fn calling_an_error_class_constructs_an_instance() {
    let result = run_main(|u| {
        let ctor = u.name("ValueError");
        let msg = u.constant("bad thing");
        let guard = u.emit_jump(Opcode::EnterGuard);
        u.emit(Opcode::LoadGlobal, ctor);
        u.emit(Opcode::PushConst, msg);
        u.emit(Opcode::Call, 1);
        u.emit(Opcode::Raise, 1);
        u.patch_jump(guard);
        drop_tb_and_cause(u);
        u.emit(Opcode::ExitGuard, 0);
        u.emit(Opcode::ReturnValue, 0);
    })
    .unwrap();
    assert_eq!(
        result,
        Value::Error(ErrorValue::new(ErrorClass::value_error(), "bad thing"))
    );
}

/// Outer guard returns "outer"; the inner handler re-raises.
fn nested_program(mode: GuardMode) -> Result<Value, skein_foundation::Error> {
    let mut u = UnitBuilder::new("main");
    let err = u.constant(class(ErrorClass::value_error()));
    let outer_result = u.constant("outer");

    let outer = u.emit_jump(Opcode::EnterGuard);
    let inner = u.emit_jump(Opcode::EnterGuard);
    u.emit(Opcode::PushConst, err);
    u.emit(Opcode::Raise, 1);
    u.patch_jump(inner);
    u.emit(Opcode::Raise, 0);
    u.patch_jump(outer);
    u.emit(Opcode::PushConst, outer_result);
    u.emit(Opcode::ReturnValue, 0);

    let mut module = ModuleBuilder::new("test");
    module.add_unit(u.build());
    let module = module.build();
    let mut scheduler = Scheduler::new(SchedulerConfig::new().with_guard_mode(mode));
    scheduler.run(module.spawn("main", vec![])?)
}

#[test]
fn nested_guards_unwind_to_enclosing_handler() {
    assert_eq!(nested_program(GuardMode::Nested).unwrap(), Value::from("outer"));
}

#[test]
fn single_guard_mode_replaces_enclosing_guard() {
    let err = nested_program(GuardMode::Single).unwrap_err();
    assert!(err.as_raised().unwrap().is_instance_of(&ErrorClass::value_error()));
}
