//! Built-in functions shipped with the engine.
//!
//! Each package registers plain functions into a [`Builtins`] registry.
//! Functions without side effects are marked pure, and those whose result
//! depends only on their arguments are also foldable, so the reducer may
//! evaluate calls with constant arguments at compile time.

use crate::interp::RuntimeError;
use crate::values::{Builtins, Val};
use crate::{String, format};

pub mod net;
pub mod string;

pub use net::{NetworkClock, register_net};
pub use string::register_string;

#[cfg(test)]
mod net_test;
#[cfg(test)]
mod string_test;

/// Register every standard package.
///
/// `clock` backs `network_time()`; the host advances it as packets arrive.
pub fn register_stdlib(builtins: &mut Builtins, clock: &NetworkClock) {
    register_string(builtins);
    register_net(builtins, clock);
}

pub(crate) fn str_arg<'v>(func: &str, args: &'v [Val], n: usize) -> Result<&'v str, RuntimeError> {
    match args.get(n) {
        Some(Val::Str(s)) => Ok(s),
        other => Err(bad_arg(func, n, "string", other)),
    }
}

pub(crate) fn bad_arg(func: &str, n: usize, wanted: &str, got: Option<&Val>) -> RuntimeError {
    let got = match got {
        Some(v) => format!("{:?}", v.tag()),
        None => String::from("nothing"),
    };
    RuntimeError::builtin(format!("{}: argument {} should be {}, got {}", func, n + 1, wanted, got))
}
