//! The ZAM bytecode engine.
//!
//! A compiled body is a flat array of register-style instructions over a
//! frame of value slots. [`ZBody::exec`] runs one to completion;
//! [`ZBody::exec_resumable`] and [`ZBody::resume`] let an invocation park
//! at an unmet `when` condition and continue later in the same frame.

mod code;
mod frame;
mod instruction_set;
mod runtime;
pub mod vector_ops;

pub use code::ZBody;
pub use frame::{GlobalState, ZFrame};
pub use instruction_set::{Access, AuxItem, OpFlavor, OperandKind, ZAux, ZInst, ZOp};
pub use runtime::{Outcome, Resumption};

#[cfg(test)]
mod vm_test;
