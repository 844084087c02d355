//! Integration tests for individual opcodes

use skein_foundation::{ErrorClass, Value};
use skein_vm::Opcode;

use crate::{assert_raises, run_main};

/// Pushes `a` and `b`, applies `op`, returns the result.
fn binary(op: Opcode, a: impl Into<Value>, b: impl Into<Value>) -> Value {
    let (a, b) = (a.into(), b.into());
    run_main(|u| {
        let a = u.constant(a);
        let b = u.constant(b);
        u.emit(Opcode::PushConst, a);
        u.emit(Opcode::PushConst, b);
        u.emit(op, 0);
        u.emit(Opcode::ReturnValue, 0);
    })
    .unwrap()
}

// =============================================================================
// Stack and locals
// =============================================================================

#[test]
fn store_then_load_local_round_trips() {
    let values = [
        Value::Nil,
        Value::Int(i64::MIN),
        Value::Float(-0.5),
        Value::from("text"),
        Value::tuple([Value::Int(1), Value::tuple([])]),
    ];
    for value in values {
        let expected = value.clone();
        let result = run_main(|u| {
            let slot = u.local("x");
            let c = u.constant(value);
            u.emit(Opcode::PushConst, c);
            u.emit(Opcode::StoreLocal, slot);
            u.emit(Opcode::LoadLocal, slot);
            u.emit(Opcode::ReturnValue, 0);
        })
        .unwrap();
        assert_eq!(result, expected);
    }
}

#[test]
fn unset_local_raises_unresolved_name() {
    assert_raises(&ErrorClass::unresolved_name_error(), |u| {
        let slot = u.local("never_set");
        u.emit(Opcode::LoadLocal, slot);
        u.emit(Opcode::ReturnValue, 0);
    });
}

#[test]
fn dup_and_build_tuple() {
    let result = run_main(|u| {
        let c = u.constant(7);
        u.emit(Opcode::PushConst, c);
        u.emit(Opcode::Dup, 0);
        u.emit(Opcode::BuildTuple, 2);
        u.emit(Opcode::ReturnValue, 0);
    })
    .unwrap();
    assert_eq!(result, Value::tuple([Value::Int(7), Value::Int(7)]));
}

#[test]
fn missing_global_raises_unresolved_name() {
    assert_raises(&ErrorClass::name_error(), |u| {
        let n = u.name("nowhere");
        u.emit(Opcode::LoadGlobal, n);
        u.emit(Opcode::ReturnValue, 0);
    });
}

// =============================================================================
// Arithmetic and comparison
// =============================================================================

#[test]
fn integer_arithmetic() {
    assert_eq!(binary(Opcode::Add, 2, 3), Value::Int(5));
    assert_eq!(binary(Opcode::Sub, 2, 3), Value::Int(-1));
    assert_eq!(binary(Opcode::Mul, 4, 3), Value::Int(12));
    assert_eq!(binary(Opcode::Div, -7, 2), Value::Int(-4));
    assert_eq!(binary(Opcode::Mod, -7, 2), Value::Int(1));
}

#[test]
fn mixed_arithmetic_promotes_to_float() {
    assert_eq!(binary(Opcode::Add, 1, 0.5), Value::Float(1.5));
    assert_eq!(binary(Opcode::Mul, 2.0, 3), Value::Float(6.0));
}

#[test]
fn string_and_tuple_concatenation() {
    assert_eq!(binary(Opcode::Add, "ab", "cd"), Value::from("abcd"));
    let joined = binary(
        Opcode::Add,
        Value::tuple([Value::Int(1)]),
        Value::tuple([Value::Int(2)]),
    );
    assert_eq!(joined, Value::tuple([Value::Int(1), Value::Int(2)]));
}

#[test]
fn division_by_zero_raises() {
    assert_raises(&ErrorClass::zero_division_error(), |u| {
        let a = u.constant(1);
        let b = u.constant(0);
        u.emit(Opcode::PushConst, a);
        u.emit(Opcode::PushConst, b);
        u.emit(Opcode::Div, 0);
        u.emit(Opcode::ReturnValue, 0);
    });
}

#[test]
fn overflow_raises_arithmetic_error() {
    assert_raises(&ErrorClass::arithmetic_error(), |u| {
        let a = u.constant(i64::MAX);
        let b = u.constant(1);
        u.emit(Opcode::PushConst, a);
        u.emit(Opcode::PushConst, b);
        u.emit(Opcode::Add, 0);
        u.emit(Opcode::ReturnValue, 0);
    });
}

#[test]
fn unsupported_operands_raise_type_error() {
    assert_raises(&ErrorClass::type_error(), |u| {
        let a = u.constant(1);
        let b = u.constant("1");
        u.emit(Opcode::PushConst, a);
        u.emit(Opcode::PushConst, b);
        u.emit(Opcode::Sub, 0);
        u.emit(Opcode::ReturnValue, 0);
    });
}

#[test]
fn comparisons() {
    assert_eq!(binary(Opcode::Eq, 1, 1.0), Value::Bool(true));
    assert_eq!(binary(Opcode::Ne, "a", "b"), Value::Bool(true));
    assert_eq!(binary(Opcode::Lt, 1, 2), Value::Bool(true));
    assert_eq!(binary(Opcode::Ge, 1, 2), Value::Bool(false));
    assert_eq!(binary(Opcode::Le, "a", "a"), Value::Bool(true));
    assert_eq!(binary(Opcode::Gt, 2.5, 2), Value::Bool(true));
}

#[test]
fn not_and_neg() {
    let result = run_main(|u| {
        let c = u.constant(5);
        u.emit(Opcode::PushConst, c);
        u.emit(Opcode::Neg, 0);
        u.emit(Opcode::Not, 0);
        u.emit(Opcode::ReturnValue, 0);
    })
    .unwrap();
    assert_eq!(result, Value::Bool(false));
}

// =============================================================================
// Control flow
// =============================================================================

#[test]
fn loop_sums_to_ten() {
    // total = 0; i = 0; while i < 5 { total += i; i += 1 }; total
    let result = run_main(|u| {
        let total = u.local("total");
        let i = u.local("i");
        let zero = u.constant(0);
        let one = u.constant(1);
        let five = u.constant(5);

        u.emit(Opcode::PushConst, zero);
        u.emit(Opcode::StoreLocal, total);
        u.emit(Opcode::PushConst, zero);
        u.emit(Opcode::StoreLocal, i);
        let top = u.here();
        u.emit(Opcode::LoadLocal, i);
        u.emit(Opcode::PushConst, five);
        u.emit(Opcode::Lt, 0);
        let exit = u.emit_jump(Opcode::JumpIfFalsy);
        u.emit(Opcode::LoadLocal, total);
        u.emit(Opcode::LoadLocal, i);
        u.emit(Opcode::Add, 0);
        u.emit(Opcode::StoreLocal, total);
        u.emit(Opcode::LoadLocal, i);
        u.emit(Opcode::PushConst, one);
        u.emit(Opcode::Add, 0);
        u.emit(Opcode::StoreLocal, i);
        let back = u.emit_jump(Opcode::Jump);
        u.patch_jump_to(back, top);
        u.patch_jump(exit);
        u.emit(Opcode::LoadLocal, total);
        u.emit(Opcode::ReturnValue, 0);
    })
    .unwrap();
    assert_eq!(result, Value::Int(10));
}

#[test]
fn jump_if_truthy_skips() {
    let result = run_main(|u| {
        let yes = u.constant("yes");
        let no = u.constant("no");
        u.emit(Opcode::PushConst, yes);
        u.emit(Opcode::Dup, 0);
        let skip = u.emit_jump(Opcode::JumpIfTruthy);
        u.emit(Opcode::Pop, 0);
        u.emit(Opcode::PushConst, no);
        u.patch_jump(skip);
        u.emit(Opcode::ReturnValue, 0);
    })
    .unwrap();
    assert_eq!(result, Value::from("yes"));
}

#[test]
fn jump_out_of_range_is_fatal() {
    let err = run_main(|u| {
        u.emit(Opcode::Jump, 99);
    })
    .unwrap_err();
    assert!(err.is_fatal());
}

#[test]
fn stack_overflow_is_fatal() {
    let err = run_main(|u| {
        u.stack_size(2);
        let c = u.constant(1);
        for _ in 0..3 {
            u.emit(Opcode::PushConst, c);
        }
        u.emit(Opcode::ReturnValue, 0);
    })
    .unwrap_err();
    assert!(err.is_fatal());
}

mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn any_value() -> impl Strategy<Value = Value> {
        let scalar = prop_oneof![
            Just(Value::Nil),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Int),
            any::<f64>().prop_map(Value::Float),
            "[a-z ]{0,12}".prop_map(|s| Value::from(s.as_str())),
        ];
        scalar.prop_recursive(2, 16, 4, |inner| {
            prop::collection::vec(inner, 0..4).prop_map(Value::tuple)
        })
    }

    proptest! {
        #[test]
        fn local_slots_hold_any_value(value in any_value()) {
            let expected = value.clone();
            let result = run_main(|u| {
                let slot = u.local("x");
                let c = u.constant(value);
                u.emit(Opcode::PushConst, c);
                u.emit(Opcode::StoreLocal, slot);
                u.emit(Opcode::LoadLocal, slot);
                u.emit(Opcode::ReturnValue, 0);
            })
            .unwrap();
            prop_assert_eq!(result, expected);
        }

        #[test]
        fn build_tuple_preserves_order(items in prop::collection::vec(any::<i64>(), 0..8)) {
            let expected = Value::tuple(items.iter().copied().map(Value::Int));
            let result = run_main(|u| {
                for n in &items {
                    let c = u.constant(*n);
                    u.emit(Opcode::PushConst, c);
                }
                u.emit(Opcode::BuildTuple, u32::try_from(items.len()).unwrap());
                u.emit(Opcode::ReturnValue, 0);
            })
            .unwrap();
            prop_assert_eq!(result, expected);
        }
    }
}
