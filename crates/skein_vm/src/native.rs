//! Native function implementations for the VM.
//!
//! This module contains the builtin functions and the arithmetic and
//! comparison helpers behind the operator opcodes. Every helper reports
//! failures as user-domain errors; the opcode table routes them through
//! safe-raise.

#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::cast_precision_loss)]

use std::cmp::Ordering;

use skein_foundation::{Error, ErrorKind, Result, Type, Value};

// =============================================================================
// Arithmetic and Comparison Helpers
// =============================================================================

fn unsupported(op: &'static str, a: &Value, b: &Value) -> Error {
    Error::new(ErrorKind::UnsupportedOperands {
        op,
        left: a.value_type(),
        right: b.value_type(),
    })
}

fn overflow(op: &'static str) -> Error {
    Error::new(ErrorKind::Overflow(op))
}

/// Adds two values.
pub(crate) fn add_values(a: Value, b: Value) -> Result<Value> {
    match (&a, &b) {
        (Value::Int(x), Value::Int(y)) => x.checked_add(*y).map(Value::Int).ok_or_else(|| overflow("+")),
        (Value::Float(x), Value::Float(y)) => Ok(Value::Float(x + y)),
        (Value::Int(x), Value::Float(y)) => Ok(Value::Float(*x as f64 + y)),
        (Value::Float(x), Value::Int(y)) => Ok(Value::Float(x + *y as f64)),
        (Value::String(x), Value::String(y)) => Ok(Value::String(format!("{x}{y}").into())),
        (Value::Tuple(x), Value::Tuple(y)) => Ok(Value::tuple(x.iter().chain(y.iter()).cloned())),
        _ => Err(unsupported("+", &a, &b)),
    }
}

/// Subtracts two values.
pub(crate) fn sub_values(a: Value, b: Value) -> Result<Value> {
    match (&a, &b) {
        (Value::Int(x), Value::Int(y)) => x.checked_sub(*y).map(Value::Int).ok_or_else(|| overflow("-")),
        (Value::Float(x), Value::Float(y)) => Ok(Value::Float(x - y)),
        (Value::Int(x), Value::Float(y)) => Ok(Value::Float(*x as f64 - y)),
        (Value::Float(x), Value::Int(y)) => Ok(Value::Float(x - *y as f64)),
        _ => Err(unsupported("-", &a, &b)),
    }
}

/// Multiplies two values.
pub(crate) fn mul_values(a: Value, b: Value) -> Result<Value> {
    match (&a, &b) {
        (Value::Int(x), Value::Int(y)) => x.checked_mul(*y).map(Value::Int).ok_or_else(|| overflow("*")),
        (Value::Float(x), Value::Float(y)) => Ok(Value::Float(x * y)),
        (Value::Int(x), Value::Float(y)) => Ok(Value::Float(*x as f64 * y)),
        (Value::Float(x), Value::Int(y)) => Ok(Value::Float(x * *y as f64)),
        _ => Err(unsupported("*", &a, &b)),
    }
}

/// Divides two values.
///
/// Integer division floors, matching `%`.
pub(crate) fn div_values(a: Value, b: Value) -> Result<Value> {
    match (&a, &b) {
        (Value::Int(_) | Value::Float(_), Value::Int(0)) => {
            Err(Error::new(ErrorKind::DivisionByZero))
        }
        (Value::Int(x), Value::Int(y)) => x
            .checked_div_euclid(*y)
            .map(|q| Value::Int(floor_div(*x, *y, q)))
            .ok_or_else(|| overflow("/")),
        (Value::Float(x), Value::Float(y)) => {
            if *y == 0.0 {
                Err(Error::new(ErrorKind::DivisionByZero))
            } else {
                Ok(Value::Float(x / y))
            }
        }
        (Value::Int(x), Value::Float(y)) => {
            if *y == 0.0 {
                Err(Error::new(ErrorKind::DivisionByZero))
            } else {
                Ok(Value::Float(*x as f64 / y))
            }
        }
        (Value::Float(x), Value::Int(y)) => Ok(Value::Float(x / *y as f64)),
        _ => Err(unsupported("/", &a, &b)),
    }
}

// Euclidean and floored division differ only for negative divisors.
fn floor_div(x: i64, y: i64, euclid: i64) -> i64 {
    if y < 0 && x.rem_euclid(y) != 0 {
        euclid - 1
    } else {
        euclid
    }
}

/// Modulo of two values; the result takes the sign of the divisor.
pub(crate) fn mod_values(a: Value, b: Value) -> Result<Value> {
    match (&a, &b) {
        (Value::Int(_), Value::Int(0)) => Err(Error::new(ErrorKind::DivisionByZero)),
        (Value::Int(x), Value::Int(y)) => {
            let r = x.checked_rem(*y).ok_or_else(|| overflow("%"))?;
            Ok(Value::Int(if r != 0 && (r < 0) != (*y < 0) { r + y } else { r }))
        }
        (Value::Float(x), Value::Float(y)) => float_mod(*x, *y),
        (Value::Int(x), Value::Float(y)) => float_mod(*x as f64, *y),
        (Value::Float(x), Value::Int(y)) => float_mod(*x, *y as f64),
        _ => Err(unsupported("%", &a, &b)),
    }
}

fn float_mod(x: f64, y: f64) -> Result<Value> {
    if y == 0.0 {
        Err(Error::new(ErrorKind::DivisionByZero))
    } else {
        Ok(Value::Float(x - y * (x / y).floor()))
    }
}

/// Negates a value.
pub(crate) fn neg_value(a: Value) -> Result<Value> {
    match a {
        Value::Int(x) => x.checked_neg().map(Value::Int).ok_or_else(|| overflow("-")),
        Value::Float(x) => Ok(Value::Float(-x)),
        _ => Err(Error::new(ErrorKind::UnsupportedOperand {
            op: "-",
            operand: a.value_type(),
        })),
    }
}

/// Compares two values with the given predicate.
pub(crate) fn compare_values<F>(op: &'static str, a: Value, b: Value, pred: F) -> Result<Value>
where
    F: FnOnce(Ordering) -> bool,
{
    match a.partial_cmp(&b) {
        Some(ord) => Ok(Value::Bool(pred(ord))),
        None => Err(unsupported(op, &a, &b)),
    }
}

/// Equality; numbers compare by value across int and float.
pub(crate) fn eq_values(a: Value, b: Value) -> Result<Value> {
    Ok(Value::Bool(values_equal(&a, &b)))
}

/// Inequality; the negation of [`eq_values`].
pub(crate) fn ne_values(a: Value, b: Value) -> Result<Value> {
    Ok(Value::Bool(!values_equal(&a, &b)))
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Float(_), Value::Float(_) | Value::Int(_)) | (Value::Int(_), Value::Float(_)) => {
            a.partial_cmp(b) == Some(Ordering::Equal)
        }
        _ => a == b,
    }
}

// =============================================================================
// Type Matching
// =============================================================================

/// Checks `ty` against a candidate type or a (possibly nested) tuple of them.
///
/// A candidate that is not a type is a `TypeError`.
pub(crate) fn type_matches(ty: &Type, candidates: &Value) -> Result<bool> {
    match candidates {
        Value::Type(candidate) => Ok(ty.is_subtype_of(candidate)),
        Value::Tuple(group) => {
            for candidate in group {
                if type_matches(ty, candidate)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        other => Err(Error::type_mismatch(Type::Type, other.value_type())),
    }
}

/// Checks a raised value (or an error type) against handler candidates.
pub(crate) fn exception_matches(tested: &Value, candidates: &Value) -> Result<bool> {
    match tested {
        Value::Type(ty) => type_matches(ty, candidates),
        other => type_matches(&other.value_type(), candidates),
    }
}

// =============================================================================
// Builtin Functions
// =============================================================================

fn expect_args(name: &str, args: &[Value], count: usize) -> Result<()> {
    if args.len() == count {
        Ok(())
    } else {
        Err(Error::arity_mismatch(name, count, args.len()))
    }
}

/// `len(x)`: characters in a string or items in a tuple.
pub(crate) fn native_len(args: &[Value]) -> Result<Value> {
    expect_args("len", args, 1)?;
    let len = match &args[0] {
        Value::String(s) => s.chars().count(),
        Value::Tuple(t) => t.len(),
        other => return Err(Error::type_mismatch(Type::Tuple, other.value_type())),
    };
    i64::try_from(len)
        .map(Value::Int)
        .map_err(|_| overflow("len"))
}

/// `str(x)`: display form of any value.
pub(crate) fn native_str(args: &[Value]) -> Result<Value> {
    expect_args("str", args, 1)?;
    Ok(match &args[0] {
        Value::String(_) => args[0].clone(),
        other => Value::from(other.to_string()),
    })
}

/// `abs(x)`.
pub(crate) fn native_abs(args: &[Value]) -> Result<Value> {
    expect_args("abs", args, 1)?;
    match &args[0] {
        Value::Int(n) => n.checked_abs().map(Value::Int).ok_or_else(|| overflow("abs")),
        Value::Float(n) => Ok(Value::Float(n.abs())),
        other => Err(Error::new(ErrorKind::UnsupportedOperand {
            op: "abs",
            operand: other.value_type(),
        })),
    }
}

fn extremum(name: &'static str, args: &[Value], keep: Ordering) -> Result<Value> {
    let items: Vec<Value> = match args {
        [Value::Tuple(t)] => t.iter().cloned().collect(),
        _ => args.to_vec(),
    };
    let mut iter = items.into_iter();
    let Some(mut best) = iter.next() else {
        return Err(Error::invalid_value(format!("{name}() arg is an empty sequence")));
    };
    for item in iter {
        match item.partial_cmp(&best) {
            Some(ord) if ord == keep => best = item,
            Some(_) => {}
            None => return Err(unsupported(name, &item, &best)),
        }
    }
    Ok(best)
}

/// `min(a, b, ...)` or `min(tuple)`.
pub(crate) fn native_min(args: &[Value]) -> Result<Value> {
    extremum("min", args, Ordering::Less)
}

/// `max(a, b, ...)` or `max(tuple)`.
pub(crate) fn native_max(args: &[Value]) -> Result<Value> {
    extremum("max", args, Ordering::Greater)
}

/// `isinstance(value, type_or_tuple)`.
pub(crate) fn native_isinstance(args: &[Value]) -> Result<Value> {
    expect_args("isinstance", args, 2)?;
    type_matches(&args[0].value_type(), &args[1]).map(Value::Bool)
}

/// `type(value)`.
pub(crate) fn native_type(args: &[Value]) -> Result<Value> {
    expect_args("type", args, 1)?;
    Ok(Value::Type(args[0].value_type()))
}
