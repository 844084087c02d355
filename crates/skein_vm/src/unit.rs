//! Decoded units of bytecode.
//!
//! A [`Unit`] is everything the VM needs to run one function body: the
//! instruction sequence, constant pool, name table, local-slot layout and
//! maximum operand-stack depth. [`UnitBuilder`] assembles units
//! programmatically.

use std::sync::Arc;

use skein_foundation::{Error, ErrorKind, Result, Value};

use crate::opcode::{Instruction, Opcode};

/// Default maximum operand-stack depth.
pub const DEFAULT_STACK_SIZE: usize = 32;

/// Placeholder operand for a jump whose target is not yet known.
const UNPATCHED: u32 = u32::MAX;

/// A decoded, immutable function body.
#[derive(Clone, Debug)]
pub struct Unit {
    name: Arc<str>,
    instructions: Vec<Instruction>,
    constants: Vec<Value>,
    names: Vec<Arc<str>>,
    local_names: Vec<Option<Arc<str>>>,
    max_stack: usize,
}

impl Unit {
    /// Returns the unit name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the shared unit name.
    #[must_use]
    pub fn shared_name(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    /// Returns the instruction sequence.
    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Returns the instruction at `index`.
    #[must_use]
    pub fn instruction(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    /// Number of instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns true if the unit has no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Looks up a constant.
    pub fn constant(&self, index: u32) -> Result<&Value> {
        self.constants
            .get(index as usize)
            .ok_or_else(|| invalid_operand("constant", index))
    }

    /// Looks up a name.
    pub fn name_at(&self, index: u32) -> Result<&Arc<str>> {
        self.names
            .get(index as usize)
            .ok_or_else(|| invalid_operand("name", index))
    }

    /// Declared number of local slots.
    #[must_use]
    pub fn local_count(&self) -> usize {
        self.local_names.len()
    }

    /// Diagnostic name of a local slot.
    #[must_use]
    pub fn local_name(&self, slot: usize) -> Option<&str> {
        self.local_names.get(slot).and_then(|n| n.as_deref())
    }

    /// Declared maximum operand-stack depth.
    #[must_use]
    pub fn max_stack(&self) -> usize {
        self.max_stack
    }

    /// Resolves the jump target of `instruction` to an instruction index.
    ///
    /// Targets are absolute; resolution only checks bounds.
    pub fn resolve(&self, instruction: &Instruction) -> Result<usize> {
        let target = instruction.index();
        if target < self.instructions.len() {
            Ok(target)
        } else {
            Err(Error::new(ErrorKind::InvalidJump {
                target: instruction.arg,
                len: self.instructions.len(),
            }))
        }
    }
}

fn invalid_operand(what: &'static str, operand: u32) -> Error {
    Error::new(ErrorKind::InvalidOperand { what, operand })
}

// =============================================================================
// Builder
// =============================================================================

/// Assembles a [`Unit`].
///
/// ```
/// use skein_vm::{Opcode, UnitBuilder};
///
/// let mut b = UnitBuilder::new("one");
/// let one = b.constant(1);
/// b.emit(Opcode::PushConst, one);
/// b.emit(Opcode::ReturnValue, 0);
/// let unit = b.build();
/// assert_eq!(unit.len(), 2);
/// ```
#[derive(Clone, Debug)]
pub struct UnitBuilder {
    name: Arc<str>,
    instructions: Vec<Instruction>,
    constants: Vec<Value>,
    names: Vec<Arc<str>>,
    local_names: Vec<Option<Arc<str>>>,
    max_stack: usize,
    offset: Option<u32>,
}

impl UnitBuilder {
    /// Starts an empty unit.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            instructions: Vec::new(),
            constants: Vec::new(),
            names: Vec::new(),
            local_names: Vec::new(),
            max_stack: DEFAULT_STACK_SIZE,
            offset: None,
        }
    }

    /// Index the next emitted instruction will get.
    #[must_use]
    pub fn here(&self) -> u32 {
        u32::try_from(self.instructions.len()).unwrap_or(UNPATCHED)
    }

    /// Sets the source offset recorded for subsequent instructions.
    ///
    /// Without an explicit offset each instruction records its own index.
    pub fn at(&mut self, offset: u32) -> &mut Self {
        self.offset = Some(offset);
        self
    }

    /// Adds an instruction and returns its index.
    pub fn emit(&mut self, op: Opcode, arg: u32) -> usize {
        self.emit_raw(op.byte(), arg)
    }

    /// Adds an instruction with a raw opcode byte and returns its index.
    pub fn emit_raw(&mut self, opcode: u8, arg: u32) -> usize {
        let idx = self.instructions.len();
        let offset = self.offset.unwrap_or_else(|| self.here());
        self.instructions
            .push(Instruction::raw(opcode, arg).at(offset));
        idx
    }

    /// Adds a jump whose target is patched later.
    ///
    /// # Panics
    /// Panics if `op` does not take a jump target.
    pub fn emit_jump(&mut self, op: Opcode) -> usize {
        assert!(op.is_jump(), "Cannot emit {op:?} as a jump");
        self.emit(op, UNPATCHED)
    }

    /// Points the jump at `idx` to the next instruction to be emitted.
    ///
    /// # Panics
    /// Panics if the instruction at `idx` is not a jump instruction.
    pub fn patch_jump(&mut self, idx: usize) {
        let target = self.here();
        self.patch_jump_to(idx, target);
    }

    /// Points the jump at `idx` to `target`.
    ///
    /// # Panics
    /// Panics if the instruction at `idx` is not a jump instruction.
    pub fn patch_jump_to(&mut self, idx: usize, target: u32) {
        let instr = &mut self.instructions[idx];
        match instr.op() {
            Some(op) if op.is_jump() => instr.arg = target,
            _ => panic!("Cannot patch non-jump instruction: {instr}"),
        }
    }

    /// Adds a constant (deduplicated) and returns its index.
    pub fn constant(&mut self, value: impl Into<Value>) -> u32 {
        let value = value.into();
        let idx = match self.constants.iter().position(|c| *c == value) {
            Some(idx) => idx,
            None => {
                self.constants.push(value);
                self.constants.len() - 1
            }
        };
        to_operand(idx)
    }

    /// Adds a name (deduplicated) and returns its index.
    pub fn name(&mut self, name: &str) -> u32 {
        let idx = match self.names.iter().position(|n| &**n == name) {
            Some(idx) => idx,
            None => {
                self.names.push(name.into());
                self.names.len() - 1
            }
        };
        to_operand(idx)
    }

    /// Declares a named local slot and returns its index.
    pub fn local(&mut self, name: &str) -> u32 {
        self.local_names.push(Some(name.into()));
        to_operand(self.local_names.len() - 1)
    }

    /// Ensures at least `count` local slots exist.
    pub fn locals(&mut self, count: usize) -> &mut Self {
        if self.local_names.len() < count {
            self.local_names.resize(count, None);
        }
        self
    }

    /// Sets the maximum operand-stack depth.
    pub fn stack_size(&mut self, size: usize) -> &mut Self {
        self.max_stack = size;
        self
    }

    /// Finishes the unit.
    #[must_use]
    pub fn build(self) -> Unit {
        Unit {
            name: self.name,
            instructions: self.instructions,
            constants: self.constants,
            names: self.names,
            local_names: self.local_names,
            max_stack: self.max_stack,
        }
    }
}

fn to_operand(idx: usize) -> u32 {
    u32::try_from(idx).unwrap_or(UNPATCHED)
}
