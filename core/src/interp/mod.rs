//! Tree interpreter and the runtime context shared with compiled bodies.
//!
//! The interpreter runs bodies the code generator cannot handle, and its
//! expression evaluator doubles as the reducer's constant folder.

mod error;
mod eval;
mod exec;
mod runtime;

pub use error::{ExecError, RuntimeError};
pub use eval::{Frame, eval, eval_const};
pub use exec::{Flow, Interpreter, exec};
pub use runtime::{Runtime, TreeBodies};

pub(crate) use eval::{
    any_index, clash, load_field, load_index, store_field, store_index,
};
pub(crate) use exec::loop_items;

#[cfg(test)]
mod interp_test;
