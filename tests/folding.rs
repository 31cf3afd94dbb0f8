//! Reduction-time folding, observed through the compiled pipeline.

mod cases;

use std::cell::RefCell;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::rc::Rc;

use bumpalo::Bump;
use pretty_assertions::assert_eq;
use zam::ast::{BinaryOp, StmtKind, Tree, declare_func};
use zam::diagnostics::Reporter;
use zam::interp::{Frame, Runtime, eval};
use zam::types::{self, TypeRef};
use zam::values::{EventLog, Subnet, TableKey, TableVal, Val};
use zam::{CompilationOptions, FuncDecl};

fn no_pruning() -> CompilationOptions {
    CompilationOptions {
        remove_unused: false,
        ..CompilationOptions::default()
    }
}

#[test]
fn add_zero_folds_to_constant() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let f = declare_func("one", &[], types::count());
    let body = t.return_stmt(Some(t.binary(BinaryOp::Add, t.count(1), t.count(0))));
    let (engine, _) = cases::engine();

    let compiled = engine.compile(t, FuncDecl::new(&f, body)).unwrap();
    assert_eq!(compiled.reduced.to_string(), "return 1;\n");
    let z = cases::bytecode(&f, compiled.body_index);
    assert_eq!(z.len(), 1);
}

#[test]
fn self_subtraction_folds_only_for_scalars() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let (engine, _) = cases::engine();

    let f = declare_func("zero", &[("x", types::int())], types::int());
    let x = &f.params[0];
    let body = t.return_stmt(Some(t.binary(BinaryOp::Sub, t.name(x), t.name(x))));
    let compiled = engine.compile(t, FuncDecl::new(&f, body)).unwrap();
    assert_eq!(compiled.reduced.to_string(), "return 0;\n");

    let vty = types::vector_of(types::count());
    let g = declare_func("diff", &[("v", vty.clone())], vty.clone());
    let v = &g.params[0];
    let body = t.return_stmt(Some(t.binary_typed(BinaryOp::Sub, t.name(v), t.name(v), vty)));
    let compiled = engine.compile(t, FuncDecl::new(&g, body)).unwrap();
    assert!(compiled.reduced.to_string().contains("v - v"));

    let events = EventLog::new();
    let arg = Val::vector(types::count(), vec![Val::Count(3), Val::Count(4)]);
    let Val::Vector(out) = engine.run(&g, vec![arg], &events).unwrap() else {
        panic!("expected a vector");
    };
    assert_eq!(out.borrow().get(1), Some(&Val::Count(0)));
}

#[test]
fn and_true_drops_only_effect_free_operands() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let (engine, hits) = cases::engine();
    let hit = engine.builtins().id("hit").unwrap();

    let f = declare_func("plain", &[("a", types::bool())], types::bool());
    let a = &f.params[0];
    let body = t.return_stmt(Some(t.and(t.name(a), t.boolean(true))));
    let compiled = engine.compile_with_options(t, FuncDecl::new(&f, body), &no_pruning()).unwrap();
    assert_eq!(compiled.reduced.to_string(), "return a;\n");

    let g = declare_func("counted", &[], types::bool());
    let called = t.binary(BinaryOp::Gt, t.call_global(&hit, &[]), t.count(0));
    let body = t.return_stmt(Some(t.and(called, t.boolean(true))));
    let compiled = engine.compile(t, FuncDecl::new(&g, body)).unwrap();
    assert!(compiled.reduced.to_string().contains("hit()"));

    let events = EventLog::new();
    assert_eq!(engine.run(&g, vec![], &events).unwrap(), Val::Bool(true));
    assert_eq!(hits.get(), 1);
}

#[test]
fn nested_foldable_builtins_fold_through() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let (engine, _) = cases::engine();
    let strlen = engine.builtins().id("strlen").unwrap();
    let upper = engine.builtins().id("to_upper").unwrap();
    let f = declare_func("len", &[], types::count());
    let body = t.return_stmt(Some(t.call_global(
        &strlen,
        &[t.call_global(&upper, &[t.string("zeek")])],
    )));

    let compiled = engine.compile(t, FuncDecl::new(&f, body)).unwrap();
    assert_eq!(compiled.reduced.to_string(), "return 4;\n");

    let unfolded = declare_func("len2", &[], types::count());
    let options = CompilationOptions {
        fold_builtins: false,
        ..CompilationOptions::default()
    };
    let body = t.return_stmt(Some(t.call_global(&strlen, &[t.string("zeek")])));
    let compiled = engine
        .compile_with_options(t, FuncDecl::new(&unfolded, body), &options)
        .unwrap();
    assert!(compiled.reduced.to_string().contains("strlen(\"zeek\")"));

    let events = EventLog::new();
    assert_eq!(engine.run(&unfolded, vec![], &events).unwrap(), Val::Count(4));
}

fn count_set(items: &[u64]) -> Val {
    let mut set = TableVal::new(types::set_of(vec![types::count()]));
    for c in items {
        set.add(TableKey::single(Val::Count(*c)));
    }
    Val::Table(Rc::new(RefCell::new(set)))
}

fn v4(a: u8, b: u8, c: u8, d: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(a, b, c, d))
}

#[test]
fn folds_agree_with_evaluation() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let (engine, _) = cases::engine();

    let set_ty = types::set_of(vec![types::count()]);
    let c = |v: Val, ty: TypeRef| t.constant(v, ty);
    let s = |text: &str| t.string(text);
    let set = |items: &[u64]| c(count_set(items), set_ty.clone());
    let addr = |a: IpAddr| c(Val::Addr(a), types::addr());
    let net = |a: IpAddr, w: u8| c(Val::Subnet(Subnet::new(a, w)), types::subnet());
    let pat = |text: &str| c(Val::pattern(text), types::pattern());
    let mapped = IpAddr::V6(Ipv4Addr::new(10, 0, 0, 1).to_ipv6_mapped());

    let cases = [
        (BinaryOp::Add, s("ab"), s("cd")),
        (BinaryOp::Lt, s("abc"), s("abd")),
        (BinaryOp::Lt, s("b"), s("ab")),
        (BinaryOp::Or, set(&[1, 2]), set(&[2, 3])),
        (BinaryOp::And, set(&[1, 2]), set(&[2, 3])),
        (BinaryOp::Sub, set(&[1, 2]), set(&[2, 3])),
        (BinaryOp::Lt, addr(v4(10, 0, 0, 1)), addr(v4(10, 0, 0, 2))),
        (BinaryOp::Lt, addr(v4(10, 0, 0, 1)), addr(IpAddr::V6(Ipv6Addr::LOCALHOST))),
        (BinaryOp::Eq, addr(v4(10, 0, 0, 1)), addr(mapped)),
        (BinaryOp::Eq, net(v4(10, 1, 2, 3), 8), net(v4(10, 0, 0, 0), 8)),
        (BinaryOp::Eq, net(v4(10, 0, 0, 0), 8), net(v4(10, 0, 0, 0), 16)),
        (BinaryOp::And, pat("ab"), pat("cd")),
        (BinaryOp::Or, pat("ab"), pat("cd")),
    ];

    for (n, (op, lhs, rhs)) in cases.into_iter().enumerate() {
        let e = t.binary(op, lhs, rhs);
        assert!(!e.is_error(), "case {}", n);
        let f = declare_func(&format!("fold{}", n), &[], e.ty.clone());
        let compiled = engine.compile(t, FuncDecl::new(&f, t.return_stmt(Some(e)))).unwrap();
        let StmtKind::Return(Some(value)) = &compiled.reduced.kind else {
            panic!("case {}: {}", n, compiled.reduced);
        };
        assert!(value.is_const(), "case {} did not fold: {}", n, compiled.reduced);

        let events = EventLog::new();
        let folded = engine.run(&f, vec![], &events).unwrap();
        let rt = Runtime::new(engine.builtins(), &events);
        let evaluated = eval(e, &mut Frame::default(), &rt).unwrap();
        assert_eq!(folded, evaluated, "case {}", n);
    }
}
