//! The opcode table: one handler per [`Opcode`].
//!
//! A handler mutates its frame in place. `Err` from a handler is always an
//! interpreter invariant violation; user-domain failures are raised inside
//! the frame through [`safe_raise`](crate::unwind::safe_raise) and the
//! handler returns `Ok`.

use std::cmp::Ordering;
use std::sync::Arc;

use skein_foundation::{Error, ErrorKind, ErrorValue, LtFn, Result, Type, Value};

use crate::frame::{Awaiting, Frame, FrameState, PendingCall};
use crate::native::{
    add_values, compare_values, div_values, eq_values, exception_matches, mod_values, mul_values,
    ne_values, neg_value, sub_values,
};
use crate::opcode::{Instruction, Opcode, RaiseMode};
use crate::unwind::{enter_guard, exit_guard, raise_error, raised_from, reraise, safe_raise};

/// Signature shared by every opcode handler.
pub type Handler = fn(&mut Frame, &Instruction) -> Result<()>;

/// Returns the handler for `op`.
#[must_use]
pub fn handler(op: Opcode) -> Handler {
    match op {
        Opcode::Nop => nop,
        Opcode::PushConst => push_const,
        Opcode::LoadLocal => load_local,
        Opcode::StoreLocal => store_local,
        Opcode::LoadGlobal => load_global,
        Opcode::Pop => pop,
        Opcode::Dup => dup,
        Opcode::CompareExceptionMatch => compare_exception_match,
        Opcode::Jump => jump,
        Opcode::JumpIfFalsy => jump_if_falsy,
        Opcode::JumpIfTruthy => jump_if_truthy,
        Opcode::EnterGuard => guard_enter,
        Opcode::ExitGuard => guard_exit,
        Opcode::Raise => raise,
        Opcode::ReturnValue => return_value,
        Opcode::Call => call,
        Opcode::Suspend => suspend,
        Opcode::BuildTuple => build_tuple,
        Opcode::Add => |f, _| binary(f, add_values),
        Opcode::Sub => |f, _| binary(f, sub_values),
        Opcode::Mul => |f, _| binary(f, mul_values),
        Opcode::Div => |f, _| binary(f, div_values),
        Opcode::Mod => |f, _| binary(f, mod_values),
        Opcode::Neg => neg,
        Opcode::Not => not,
        Opcode::Eq => |f, _| binary(f, eq_values),
        Opcode::Ne => |f, _| binary(f, ne_values),
        Opcode::Lt => |f, _| binary(f, |a, b| compare_values("<", a, b, Ordering::is_lt)),
        Opcode::Le => |f, _| binary(f, |a, b| compare_values("<=", a, b, Ordering::is_le)),
        Opcode::Gt => |f, _| binary(f, |a, b| compare_values(">", a, b, Ordering::is_gt)),
        Opcode::Ge => |f, _| binary(f, |a, b| compare_values(">=", a, b, Ordering::is_ge)),
    }
}

/// Returns the handler for a raw opcode byte, `None` if the byte is unknown.
#[must_use]
pub fn lookup(byte: u8) -> Option<Handler> {
    Opcode::from_byte(byte).map(handler)
}

// =============================================================================
// Stack and Names
// =============================================================================

fn nop(_: &mut Frame, _: &Instruction) -> Result<()> {
    Ok(())
}

fn push_const(frame: &mut Frame, instr: &Instruction) -> Result<()> {
    let value = frame.unit.constant(instr.arg)?.clone();
    frame.push(value)
}

fn local_slot(frame: &Frame, instr: &Instruction) -> Result<usize> {
    let slot = instr.index();
    if slot < frame.locals.len() {
        Ok(slot)
    } else {
        Err(Error::new(ErrorKind::InvalidOperand {
            what: "local",
            operand: instr.arg,
        }))
    }
}

fn load_local(frame: &mut Frame, instr: &Instruction) -> Result<()> {
    let slot = local_slot(frame, instr)?;
    match frame.locals[slot].clone() {
        Some(value) => frame.push(value),
        None => {
            let name = frame
                .unit
                .local_name(slot)
                .map_or_else(|| format!("local #{slot}"), str::to_string);
            raise_error(frame, Error::unresolved_name(name))
        }
    }
}

fn store_local(frame: &mut Frame, instr: &Instruction) -> Result<()> {
    let slot = local_slot(frame, instr)?;
    let value = frame.pop()?;
    frame.locals[slot] = Some(value);
    Ok(())
}

fn load_global(frame: &mut Frame, instr: &Instruction) -> Result<()> {
    let name = frame.unit.name_at(instr.arg)?;
    match frame.get_global(name) {
        Some(value) => frame.push(value),
        None => {
            let err = Error::unresolved_name(&**name);
            raise_error(frame, err)
        }
    }
}

fn pop(frame: &mut Frame, _: &Instruction) -> Result<()> {
    frame.pop().map(drop)
}

fn dup(frame: &mut Frame, _: &Instruction) -> Result<()> {
    let value = frame.peek()?.clone();
    frame.push(value)
}

fn build_tuple(frame: &mut Frame, instr: &Instruction) -> Result<()> {
    let count = instr.index();
    let len = frame.stack.len();
    if count > len {
        return Err(Error::new(ErrorKind::StackUnderflow));
    }
    let items = frame.stack.split_off(len - count);
    frame.push(Value::tuple(items))
}

// =============================================================================
// Operators
// =============================================================================

fn binary(frame: &mut Frame, op: fn(Value, Value) -> Result<Value>) -> Result<()> {
    let b = frame.pop()?;
    let a = frame.pop()?;
    match op(a, b) {
        Ok(value) => frame.push(value),
        Err(err) => raise_error(frame, err),
    }
}

fn neg(frame: &mut Frame, _: &Instruction) -> Result<()> {
    let a = frame.pop()?;
    match neg_value(a) {
        Ok(value) => frame.push(value),
        Err(err) => raise_error(frame, err),
    }
}

fn not(frame: &mut Frame, _: &Instruction) -> Result<()> {
    let a = frame.pop()?;
    frame.push(Value::Bool(!a.is_truthy()))
}

// =============================================================================
// Control Flow
// =============================================================================

fn jump(frame: &mut Frame, instr: &Instruction) -> Result<()> {
    frame.ip = frame.unit.resolve(instr)?;
    Ok(())
}

fn jump_if_falsy(frame: &mut Frame, instr: &Instruction) -> Result<()> {
    if !frame.pop()?.is_truthy() {
        frame.ip = frame.unit.resolve(instr)?;
    }
    Ok(())
}

fn jump_if_truthy(frame: &mut Frame, instr: &Instruction) -> Result<()> {
    if frame.pop()?.is_truthy() {
        frame.ip = frame.unit.resolve(instr)?;
    }
    Ok(())
}

fn return_value(frame: &mut Frame, _: &Instruction) -> Result<()> {
    let value = frame.pop()?;
    frame.result = Some(value);
    frame.guards.clear();
    frame.exception = None;
    frame.state = FrameState::Finished;
    Ok(())
}

/// Pops `argc` arguments and the callee beneath them, then dispatches on the
/// callee's classification.
fn call(frame: &mut Frame, instr: &Instruction) -> Result<()> {
    let argc = instr.index();
    let len = frame.stack.len();
    if argc >= len {
        return Err(Error::new(ErrorKind::StackUnderflow));
    }
    let args = frame.stack.split_off(len - argc);
    let callee = frame.pop()?;

    match callee {
        Value::Fn(LtFn::Native(func)) => match func.call(&args) {
            Ok(value) => frame.push(value),
            Err(err) => raise_error(frame, err),
        },
        Value::Fn(LtFn::Managed(func)) => {
            frame.outgoing = Some(PendingCall { func, args });
            frame.state = FrameState::Suspended;
            Ok(())
        }
        Value::Type(Type::Error(class)) => match args.as_slice() {
            [] => frame.push(Value::Error(ErrorValue::new(class, ""))),
            [message] => {
                let message = match message {
                    Value::String(s) => Arc::clone(s),
                    other => other.to_string().into(),
                };
                frame.push(Value::Error(ErrorValue::new(class, message)))
            }
            _ => raise_error(frame, Error::arity_mismatch(class.name(), 1, args.len())),
        },
        other => raise_error(frame, Error::new(ErrorKind::NotCallable(other.value_type()))),
    }
}

fn suspend(frame: &mut Frame, _: &Instruction) -> Result<()> {
    frame.state = FrameState::Suspended;
    frame.awaiting = Awaiting::Wake;
    Ok(())
}

// =============================================================================
// Guards and Raising
// =============================================================================

fn guard_enter(frame: &mut Frame, instr: &Instruction) -> Result<()> {
    let handler = frame.unit.resolve(instr)?;
    enter_guard(frame, handler);
    Ok(())
}

fn guard_exit(frame: &mut Frame, _: &Instruction) -> Result<()> {
    exit_guard(frame);
    Ok(())
}

fn compare_exception_match(frame: &mut Frame, _: &Instruction) -> Result<()> {
    let candidates = frame.pop()?;
    let tested = frame.pop()?;
    match exception_matches(&tested, &candidates) {
        Ok(matched) => frame.push(Value::Bool(matched)),
        Err(err) => raise_error(frame, err),
    }
}

fn raise(frame: &mut Frame, instr: &Instruction) -> Result<()> {
    let mode = RaiseMode::from_arg(instr.arg).ok_or_else(|| {
        Error::new(ErrorKind::InvalidOperand {
            what: "raise mode",
            operand: instr.arg,
        })
    })?;
    match mode {
        RaiseMode::Reraise => reraise(frame),
        RaiseMode::Value => {
            let value = frame.pop()?;
            safe_raise(frame, raised_from(value, None))
        }
        RaiseMode::WithCause => {
            let cause = frame.pop()?;
            let value = frame.pop()?;
            safe_raise(frame, raised_from(value, Some(cause)))
        }
    }
}
