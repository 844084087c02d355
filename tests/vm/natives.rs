//! Integration tests for builtin native functions

use skein_foundation::{ErrorClass, Type, Value};
use skein_vm::Opcode;

use crate::{assert_raises, run_main};

/// Calls the builtin `name` with constant arguments.
fn call(name: &str, args: Vec<Value>) -> Result<Value, skein_foundation::Error> {
    let name = name.to_string();
    run_main(move |u| {
        let f = u.name(&name);
        u.emit(Opcode::LoadGlobal, f);
        let argc = u32::try_from(args.len()).unwrap();
        for arg in args {
            let c = u.constant(arg);
            u.emit(Opcode::PushConst, c);
        }
        u.emit(Opcode::Call, argc);
        u.emit(Opcode::ReturnValue, 0);
    })
}

#[test]
fn len_counts_chars_and_items() {
    assert_eq!(call("len", vec![Value::from("héllo")]).unwrap(), Value::Int(5));
    let t = Value::tuple([Value::Nil, Value::Nil]);
    assert_eq!(call("len", vec![t]).unwrap(), Value::Int(2));
}

#[test]
fn str_and_abs() {
    assert_eq!(call("str", vec![Value::Float(1.0)]).unwrap(), Value::from("1.0"));
    assert_eq!(call("abs", vec![Value::Int(-4)]).unwrap(), Value::Int(4));
}

#[test]
fn min_and_max() {
    let args = vec![Value::Int(3), Value::Float(1.5), Value::Int(2)];
    assert_eq!(call("min", args.clone()).unwrap(), Value::Float(1.5));
    assert_eq!(call("max", args).unwrap(), Value::Int(3));

    let t = Value::tuple([Value::from("b"), Value::from("a")]);
    assert_eq!(call("min", vec![t]).unwrap(), Value::from("a"));
}

#[test]
fn min_of_nothing_raises_value_error() {
    let err = call("min", vec![Value::tuple([])]).unwrap_err();
    assert!(err.as_raised().unwrap().is_instance_of(&ErrorClass::value_error()));
}

#[test]
fn isinstance_and_type() {
    let int = Value::Type(Type::Int);
    assert_eq!(call("isinstance", vec![Value::Int(1), int.clone()]).unwrap(), Value::Bool(true));
    assert_eq!(call("isinstance", vec![Value::from("x"), int]).unwrap(), Value::Bool(false));
    assert_eq!(call("type", vec![Value::Nil]).unwrap(), Value::Type(Type::Nil));
}

#[test]
fn wrong_argument_count_raises_arity_error() {
    let err = call("len", vec![]).unwrap_err();
    assert!(err.as_raised().unwrap().is_instance_of(&ErrorClass::arity_error()));
}

#[test]
fn calling_a_non_callable_raises_type_error() {
    assert_raises(&ErrorClass::type_error(), |u| {
        let c = u.constant(42);
        u.emit(Opcode::PushConst, c);
        u.emit(Opcode::Call, 0);
        u.emit(Opcode::ReturnValue, 0);
    });
}
