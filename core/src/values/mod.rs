//! Runtime values.
//!
//! `Val` is what frames, globals and constants hold. Managed variants are
//! reference counted; see [`Val::is_managed`].

mod aggregate;
mod func;
pub mod ops;
mod val;

pub use aggregate::{RecordVal, TableKey, TableVal, VectorVal, empty_aggregate};
pub use func::{
    Body, BuiltinFn, BuiltinFunc, BuiltinRegistry, Builtins, EventLog, EventSink, Func,
    QueuedEvent, ScriptFunc,
};
pub use val::{Port, Proto, Subnet, Val};
pub(crate) use val::{addr_bits, addr_key};

#[cfg(test)]
mod val_test;
