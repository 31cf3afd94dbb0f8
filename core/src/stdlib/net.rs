//! Address predicates and the packet clock.

use core::cell::Cell;
use core::net::IpAddr;

use super::bad_arg;
use crate::Rc;
use crate::types;
use crate::values::{BuiltinFunc, Builtins, Val};
use crate::{String, vec};

/// Timestamp of the most recent packet, shared with `network_time()`.
#[derive(Debug, Clone, Default)]
pub struct NetworkClock(Rc<Cell<f64>>);

impl NetworkClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> f64 {
        self.0.get()
    }

    /// Move the clock to `t`. Time never runs backwards.
    pub fn advance(&self, t: f64) {
        if t > self.0.get() {
            self.0.set(t);
        }
    }
}

fn addr_arg(func: &str, args: &[Val]) -> Result<IpAddr, crate::interp::RuntimeError> {
    match args.first() {
        Some(Val::Addr(a)) => Ok(*a),
        other => Err(bad_arg(func, 0, "addr", other)),
    }
}

pub fn register_net(builtins: &mut Builtins, clock: &NetworkClock) {
    let addr_pred = || types::function(vec![(String::from("a"), types::addr())], types::bool());

    builtins.register(
        BuiltinFunc::new("is_v4_addr", addr_pred(), |args| {
            Ok(Val::Bool(addr_arg("is_v4_addr", args)?.is_ipv4()))
        })
        .foldable(),
    );

    builtins.register(
        BuiltinFunc::new("is_v6_addr", addr_pred(), |args| {
            Ok(Val::Bool(addr_arg("is_v6_addr", args)?.is_ipv6()))
        })
        .foldable(),
    );

    // Reads the clock, so never folded, but dropping an unused call is fine.
    let clock = clock.clone();
    builtins.register(
        BuiltinFunc::new("network_time", types::function(vec![], types::time()), move |_| {
            Ok(Val::Time(clock.now()))
        })
        .pure(),
    );
}
