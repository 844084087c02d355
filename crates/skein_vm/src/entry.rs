//! Top-level task creation.

use std::sync::Arc;

use skein_foundation::{Error, ErrorKind, LtFn, Result, Value};

use crate::frame::Frame;
use crate::module::Module;

/// Creates a pending top-level frame for `callable` applied to `args`.
///
/// Only managed functions can start a task. A top-level frame has no caller
/// to raise into, so an argument count that exceeds the unit's slots is
/// returned as an error rather than raised.
///
/// # Errors
///
/// Returns `NotCallable` for anything but a managed function, `ForeignUnit`
/// for a managed function built by another module, and `ArityMismatch` when
/// `args` does not fit the unit's local slots.
pub fn spawn(module: &Arc<Module>, callable: &Value, args: Vec<Value>) -> Result<Frame> {
    match callable {
        Value::Fn(LtFn::Managed(func)) => Frame::new(Arc::clone(module), func, args, None, 0),
        other => Err(Error::new(ErrorKind::NotCallable(other.value_type()))),
    }
}
