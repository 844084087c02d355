//! Frames, opcode table, interpreter, and cooperative scheduler for Skein.
//!
//! This crate provides:
//! - [`UnitBuilder`] and [`ModuleBuilder`] - Assembling decoded bytecode units
//! - [`Frame`] - One suspendable activation of a unit
//! - [`Interpreter`] - Runs a frame for one turn
//! - [`Scheduler`] - The single ready queue that drives frames to completion
//! - [`spawn`] - Turning a managed callable into a pending frame
//!
//! ```
//! use skein_vm::{ModuleBuilder, Opcode, Scheduler, UnitBuilder};
//! use skein_foundation::Value;
//!
//! let mut unit = UnitBuilder::new("main");
//! let one = unit.constant(1);
//! unit.emit(Opcode::PushConst, one);
//! unit.emit(Opcode::ReturnValue, 0);
//!
//! let mut module = ModuleBuilder::new("demo");
//! module.add_unit(unit.build());
//! let module = module.build();
//!
//! let mut scheduler = Scheduler::default();
//! let result = scheduler.run(module.spawn("main", vec![]).unwrap()).unwrap();
//! assert_eq!(result, Value::Int(1));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod diagnostics;
pub mod entry;
pub mod frame;
pub mod interpreter;
pub mod module;
pub mod namespace;
mod native;
pub mod opcode;
pub mod scheduler;
pub mod table;
pub mod unit;
pub mod unwind;

pub use config::{GuardMode, SchedulerConfig};
pub use diagnostics::FrameSnapshot;
pub use entry::spawn;
pub use frame::{Awaiting, Frame, FrameId, FrameState};
pub use interpreter::{Interpreter, Turn};
pub use module::{Module, ModuleBuilder};
pub use namespace::Namespace;
pub use opcode::{Instruction, Opcode, RaiseMode};
pub use scheduler::{Scheduler, SchedulerStats, Waker};
pub use table::Handler;
pub use unit::{Unit, UnitBuilder};
pub use unwind::safe_raise;
