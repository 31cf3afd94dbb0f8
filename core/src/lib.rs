#![cfg_attr(all(not(feature = "std"), not(test)), no_std)]

extern crate alloc;

// Re-export for convenience so other modules don't need alloc:: prefix
#[allow(unused_imports)]
pub(crate) use alloc::{
    boxed::Box, format, rc::Rc, string::String, string::ToString, vec, vec::Vec,
};

/// Aborts on a violated compiler invariant.
///
/// These signal a bug in the reducer, code generator or optimizer rather
/// than bad input, so there is nothing sensible to recover to.
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        panic!("internal error: {}", format_args!($($arg)*))
    };
}

pub mod api;
pub mod ast;
pub mod codegen;
pub mod diagnostics;
pub mod interp;
pub mod optimizer;
pub mod reduce;
pub mod stdlib;
pub mod types;
pub mod usedefs;
pub mod values;
pub mod vm;
