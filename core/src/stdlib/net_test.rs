use core::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use bumpalo::Bump;
use pretty_assertions::assert_eq;

use super::{NetworkClock, register_stdlib};
use crate::api::CompilationOptions;
use crate::ast::{Tree, declare_func, new_local};
use crate::diagnostics::Reporter;
use crate::interp::{Interpreter, Runtime};
use crate::reduce::{Pre, Reducer};
use crate::types;
use crate::usedefs::remove_unused;
use crate::values::{BuiltinRegistry, Builtins, EventLog, Val};
use crate::{ToString, vec};

#[test]
fn test_address_family() {
    let mut b = Builtins::new();
    register_stdlib(&mut b, &NetworkClock::new());
    let v4 = Val::Addr(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)));
    let v6 = Val::Addr(IpAddr::V6(Ipv6Addr::LOCALHOST));

    let is_v4 = b.lookup("is_v4_addr").unwrap();
    let is_v6 = b.lookup("is_v6_addr").unwrap();
    assert_eq!(is_v4.call(&[v4.clone()]).unwrap(), Val::Bool(true));
    assert_eq!(is_v4.call(&[v6.clone()]).unwrap(), Val::Bool(false));
    assert_eq!(is_v6.call(&[v6]).unwrap(), Val::Bool(true));
    assert!(is_v4.call(&[Val::Count(4)]).is_err());
}

#[test]
fn test_clock_only_moves_forward() {
    let clock = NetworkClock::new();
    let mut b = Builtins::new();
    register_stdlib(&mut b, &clock);
    let now = b.lookup("network_time").unwrap();

    clock.advance(12.5);
    assert_eq!(now.call(&[]).unwrap(), Val::Time(12.5));
    clock.advance(3.0);
    assert_eq!(now.call(&[]).unwrap(), Val::Time(12.5));
}

#[test]
fn test_network_time_never_folds() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let mut b = Builtins::new();
    register_stdlib(&mut b, &NetworkClock::new());
    let f = declare_func("f", &[], types::time());
    let now = b.id("network_time").unwrap();

    let r = Reducer::new(t, &b, &f, &CompilationOptions::default());
    let mut pre = Pre::new();
    let reduced = r.reduce_expr(t.call_global(&now, &[]), &mut pre);
    assert_eq!(reduced.const_val(), None);
}

#[test]
fn test_unused_clock_read_is_dropped() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let clock = NetworkClock::new();
    let mut b = Builtins::new();
    register_stdlib(&mut b, &clock);
    let f = declare_func("f", &[], types::count());
    let stamp = new_local(&f, "stamp", types::time());
    let now = b.id("network_time").unwrap();
    let body = t.block(&[
        t.assign_stmt(t.name(&stamp), t.call_global(&now, &[])),
        t.return_stmt(Some(t.count(1))),
    ]);

    let options = CompilationOptions::default();
    let r = Reducer::new(t, &b, &f, &options);
    let reduced = remove_unused(&r, r.reduce_body(body), &options);
    assert!(!reduced.to_string().contains("network_time"));

    let interp = Interpreter::new();
    interp.attach(&f, reduced);
    let events = EventLog::new();
    let rt = Runtime::new(&b, &events).with_trees(&interp);
    assert_eq!(rt.invoke(&f, vec![]).unwrap(), Val::Count(1));
}
