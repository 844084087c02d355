//! Skein - Cooperative-scheduling bytecode VM
//!
//! This crate re-exports all layers of the Skein system for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 1: skein_vm         - Frames, opcode table, interpreter, scheduler
//! Layer 0: skein_foundation - Core types (Value, ErrorClass, Raised, Error)
//! ```

pub use skein_foundation as foundation;
pub use skein_vm as vm;
