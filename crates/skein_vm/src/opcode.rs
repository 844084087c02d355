//! Bytecode instruction set for the Skein VM.
//!
//! The VM is stack-based. Most operations consume operands from the stack
//! and push results back. Instructions keep their raw opcode byte so that a
//! unit containing a byte with no handler can still be loaded; the fault is
//! raised only when that instruction executes.

use std::fmt;

/// Operation selected by an instruction's opcode byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    // === Stack Operations ===
    /// No operation.
    Nop = 0,
    /// Push a constant from the constant pool.
    PushConst = 1,
    /// Push a local slot; unset slots raise `UnresolvedNameError`.
    LoadLocal = 2,
    /// Pop into a local slot.
    StoreLocal = 3,
    /// Push a global resolved through the module then builtin namespace.
    LoadGlobal = 4,
    /// Pop and discard the top of stack.
    Pop = 5,
    /// Duplicate the top of stack.
    Dup = 6,

    // === Exceptions ===
    /// Match an error against a type or tuple of types: `[value, types] -> [bool]`
    CompareExceptionMatch = 7,

    // === Control Flow ===
    /// Unconditional jump to an absolute index.
    Jump = 8,
    /// Pop; jump if falsy.
    JumpIfFalsy = 9,
    /// Pop; jump if truthy.
    JumpIfTruthy = 10,
    /// Enter a guarded region whose handler starts at the target index.
    EnterGuard = 11,
    /// Leave the innermost guarded region.
    ExitGuard = 12,
    /// Raise; the operand selects a [`RaiseMode`].
    Raise = 13,
    /// Finish the frame with the top of stack as its result.
    ReturnValue = 14,
    /// Call: `[callee, arg1, ..., argN] -> [result]`
    Call = 15,
    /// Suspend until an external wake; the wake value is pushed on resume.
    Suspend = 16,
    /// Build a tuple from the top N values: `[a, b, c] -> [(a, b, c)]`
    BuildTuple = 17,

    // === Arithmetic ===
    /// Add: `[a, b] -> [a + b]`
    Add = 20,
    /// Subtract: `[a, b] -> [a - b]`
    Sub = 21,
    /// Multiply: `[a, b] -> [a * b]`
    Mul = 22,
    /// Divide: `[a, b] -> [a / b]`
    Div = 23,
    /// Modulo: `[a, b] -> [a % b]`
    Mod = 24,
    /// Negate: `[a] -> [-a]`
    Neg = 25,

    // === Logic ===
    /// Logical not: `[a] -> [!a]`
    Not = 26,

    // === Comparison ===
    /// Equal: `[a, b] -> [a == b]`
    Eq = 27,
    /// Not equal: `[a, b] -> [a != b]`
    Ne = 28,
    /// Less than: `[a, b] -> [a < b]`
    Lt = 29,
    /// Less than or equal: `[a, b] -> [a <= b]`
    Le = 30,
    /// Greater than: `[a, b] -> [a > b]`
    Gt = 31,
    /// Greater than or equal: `[a, b] -> [a >= b]`
    Ge = 32,
}

impl Opcode {
    /// Every opcode, in byte order.
    pub const ALL: [Opcode; 31] = [
        Self::Nop,
        Self::PushConst,
        Self::LoadLocal,
        Self::StoreLocal,
        Self::LoadGlobal,
        Self::Pop,
        Self::Dup,
        Self::CompareExceptionMatch,
        Self::Jump,
        Self::JumpIfFalsy,
        Self::JumpIfTruthy,
        Self::EnterGuard,
        Self::ExitGuard,
        Self::Raise,
        Self::ReturnValue,
        Self::Call,
        Self::Suspend,
        Self::BuildTuple,
        Self::Add,
        Self::Sub,
        Self::Mul,
        Self::Div,
        Self::Mod,
        Self::Neg,
        Self::Not,
        Self::Eq,
        Self::Ne,
        Self::Lt,
        Self::Le,
        Self::Gt,
        Self::Ge,
    ];

    /// Decodes a raw opcode byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0 => Self::Nop,
            1 => Self::PushConst,
            2 => Self::LoadLocal,
            3 => Self::StoreLocal,
            4 => Self::LoadGlobal,
            5 => Self::Pop,
            6 => Self::Dup,
            7 => Self::CompareExceptionMatch,
            8 => Self::Jump,
            9 => Self::JumpIfFalsy,
            10 => Self::JumpIfTruthy,
            11 => Self::EnterGuard,
            12 => Self::ExitGuard,
            13 => Self::Raise,
            14 => Self::ReturnValue,
            15 => Self::Call,
            16 => Self::Suspend,
            17 => Self::BuildTuple,
            20 => Self::Add,
            21 => Self::Sub,
            22 => Self::Mul,
            23 => Self::Div,
            24 => Self::Mod,
            25 => Self::Neg,
            26 => Self::Not,
            27 => Self::Eq,
            28 => Self::Ne,
            29 => Self::Lt,
            30 => Self::Le,
            31 => Self::Gt,
            32 => Self::Ge,
            _ => return None,
        })
    }

    /// Returns the raw byte.
    #[must_use]
    pub const fn byte(self) -> u8 {
        self as u8
    }

    /// Returns true if the operand is an instruction index.
    #[must_use]
    pub const fn is_jump(self) -> bool {
        matches!(
            self,
            Self::Jump | Self::JumpIfFalsy | Self::JumpIfTruthy | Self::EnterGuard
        )
    }
}

/// Operand of [`Opcode::Raise`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RaiseMode {
    /// Re-raise the frame's active exception.
    Reraise = 0,
    /// Pop the value to raise.
    Value = 1,
    /// Pop the cause, then the value to raise.
    WithCause = 2,
}

impl RaiseMode {
    /// Decodes a raise operand.
    #[must_use]
    pub const fn from_arg(arg: u32) -> Option<Self> {
        match arg {
            0 => Some(Self::Reraise),
            1 => Some(Self::Value),
            2 => Some(Self::WithCause),
            _ => None,
        }
    }
}

/// A decoded instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Instruction {
    /// Raw opcode byte.
    pub opcode: u8,
    /// Operand: pool index, jump target, argument count, or raise mode.
    pub arg: u32,
    /// Offset in the source the unit was decoded from.
    pub offset: u32,
}

impl Instruction {
    /// Creates an instruction.
    #[must_use]
    pub const fn new(op: Opcode, arg: u32) -> Self {
        Self::raw(op.byte(), arg)
    }

    /// Creates an instruction from a raw byte, valid or not.
    #[must_use]
    pub const fn raw(opcode: u8, arg: u32) -> Self {
        Self {
            opcode,
            arg,
            offset: 0,
        }
    }

    /// Sets the source offset.
    #[must_use]
    pub const fn at(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    /// Decodes the opcode byte.
    #[must_use]
    pub const fn op(&self) -> Option<Opcode> {
        Opcode::from_byte(self.opcode)
    }

    /// The operand as a table index.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.arg as usize
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op() {
            Some(op) => write!(f, "{op:?} {}", self.arg)?,
            None => write!(f, "<unknown {:#04x}> {}", self.opcode, self.arg)?,
        }
        write!(f, " @{}", self.offset)
    }
}
