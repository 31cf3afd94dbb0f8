use bumpalo::Bump;
use pretty_assertions::assert_eq;

use super::{NetworkClock, register_stdlib};
use crate::api::CompilationOptions;
use crate::ast::{Tree, declare_func};
use crate::diagnostics::Reporter;
use crate::interp::RuntimeError;
use crate::reduce::{Pre, Reducer};
use crate::types;
use crate::values::{BuiltinRegistry, Builtins, Val};
use crate::ToString;

fn stdlib() -> Builtins {
    let mut builtins = Builtins::new();
    register_stdlib(&mut builtins, &NetworkClock::new());
    builtins
}

fn call(builtins: &Builtins, name: &str, args: &[Val]) -> Result<Val, RuntimeError> {
    builtins.lookup(name).unwrap().call(args)
}

#[test]
fn test_case_mapping_is_ascii_only() {
    let b = stdlib();
    assert_eq!(call(&b, "to_upper", &[Val::str("GeT /ä")]).unwrap(), Val::str("GET /ä"));
    assert_eq!(call(&b, "to_lower", &[Val::str("HTTP/1.1")]).unwrap(), Val::str("http/1.1"));
}

#[test]
fn test_strlen_counts_bytes() {
    let b = stdlib();
    assert_eq!(call(&b, "strlen", &[Val::str("")]).unwrap(), Val::Count(0));
    assert_eq!(call(&b, "strlen", &[Val::str("ä")]).unwrap(), Val::Count(2));
}

#[test]
fn test_sub_bytes() {
    let b = stdlib();
    let sub = |start: u64, n: i64| {
        call(&b, "sub_bytes", &[Val::str("hello"), Val::Count(start), Val::Int(n)]).unwrap()
    };
    assert_eq!(sub(1, 2), Val::str("he"));
    assert_eq!(sub(2, 100), Val::str("ello"));
    assert_eq!(sub(3, -1), Val::str("llo"));
    assert_eq!(sub(9, 1), Val::str(""));
}

#[test]
fn test_wrong_argument_is_an_error() {
    let b = stdlib();
    let err = call(&b, "starts_with", &[Val::str("abc"), Val::Count(1)]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "starts_with: argument 2 should be string, got Count"
    );
}

#[test]
fn test_string_functions_fold() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let f = declare_func("f", &[], types::void());
    let b = stdlib();
    let upper = b.id("to_upper").unwrap();
    let strlen = b.id("strlen").unwrap();
    let e = t.call_global(&strlen, &[t.call_global(&upper, &[t.string("abc")])]);

    let r = Reducer::new(t, &b, &f, &CompilationOptions::default());
    let mut pre = Pre::new();
    let folded = r.reduce_expr(e, &mut pre);
    assert_eq!(folded.const_val(), Some(&Val::Count(3)));
    assert!(pre.is_empty());
}
