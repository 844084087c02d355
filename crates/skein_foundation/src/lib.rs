//! Core values, runtime types, error classes, and tracebacks for Skein.
//!
//! This crate provides:
//! - [`Value`] - The dynamically typed datum flowing through frames
//! - [`Type`] and [`ErrorClass`] - Runtime types and the error class hierarchy
//! - [`Raised`] and [`Traceback`] - The diagnostic record carried by raised errors
//! - [`Error`] - Rich error types with context
//! - Persistent collections ([`LtVec`])

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod collections;
pub mod error;
pub mod exception;
pub mod types;
pub mod value;

pub use collections::LtVec;
pub use error::{Error, ErrorContext, ErrorKind, Result};
pub use exception::{ErrorValue, Raised, TraceEntry, Traceback, TracebackNode};
pub use types::{ErrorClass, Type};
pub use value::{LtFn, ManagedFn, NativeFn, Value};
