use bumpalo::Bump;
use indoc::indoc;
use pretty_assertions::assert_eq;

use crate::ast::{
    BinaryOp, ExprKind, ExprTag, Traversal, TraversalCode, Tree, UnaryOp, declare_func,
    new_global, new_local, traverse_stmt,
};
use crate::diagnostics::Reporter;
use crate::types::{self, FieldDecl, Type};
use crate::values::Val;
use crate::{String, ToString, Vec, vec};

#[test]
fn test_mixed_arithmetic_coerces_to_widest() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let f = declare_func("f", &[("c", types::count()), ("d", types::double())], types::void());
    let (c, d) = (&f.params[0], &f.params[1]);

    let sum = t.binary(BinaryOp::Add, t.name(c), t.name(d));
    assert_eq!(*sum.ty, Type::Double);
    let ExprKind::Binary { lhs, rhs, .. } = &sum.kind else {
        panic!("expected binary");
    };
    assert_eq!(lhs.tag(), ExprTag::Unary(UnaryOp::ArithCoerce));
    assert!(rhs.is_name());
    assert_eq!(sum.to_string(), "((double)c) + d");

    let diff = t.binary(BinaryOp::Sub, t.name(c), t.int(1));
    assert_eq!(*diff.ty, Type::Int);
}

#[test]
fn test_temporal_arithmetic() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let now = new_global("now", types::time());
    let then = new_global("then", types::time());

    let gap = t.binary(BinaryOp::Sub, t.name(&now), t.name(&then));
    assert_eq!(*gap.ty, Type::Interval);
    let later = t.binary(BinaryOp::Add, t.name(&now), gap);
    assert_eq!(*later.ty, Type::Time);
    assert!(!reporter.has_errors());
}

#[test]
fn test_type_clash_reported_once() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter).at(4, 9);
    let bad = t.binary(BinaryOp::Add, t.string("a"), t.count(1));
    assert!(bad.is_error());

    // Building on top of an error node stays silent.
    let worse = t.binary(BinaryOp::Times, bad, t.count(2));
    assert!(worse.is_error());
    let cmp = t.binary(BinaryOp::Lt, worse, t.count(3));
    assert!(cmp.is_error());

    let diagnostics = reporter.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].message, "type clash: string + count");
    assert_eq!(diagnostics[0].span.range(), 4..9);
}

#[test]
fn test_field_lookup() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let conn = types::record(
        "conn",
        vec![
            FieldDecl::new("orig", types::addr()),
            FieldDecl::new("bytes", types::count()),
        ],
    );
    let c = new_global("c", conn);
    let bytes = t.field(t.name(&c), "bytes");
    assert_eq!(*bytes.ty, Type::Count);
    assert_eq!(bytes.to_string(), "c$bytes");

    let missing = t.field(t.name(&c), "resp");
    assert!(missing.is_error());
    assert_eq!(reporter.error_count(), 1);
}

#[test]
fn test_duplicate_shares_leaves_but_not_compounds() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let x = new_global("x", types::int());
    let e = t.binary(BinaryOp::Times, t.name(&x), t.int(3));
    let copy = t.duplicate(e);
    assert!(!core::ptr::eq(e, copy));
    assert!(e.same_as(copy));

    let leaf = t.name(&x);
    assert!(core::ptr::eq(leaf, t.duplicate(leaf)));
}

#[test]
fn test_statement_rendering() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let f = declare_func("f", &[("n", types::count())], types::count());
    let n = &f.params[0];
    let total = new_local(&f, "total", types::count());
    let body = t.block(&[
        t.assign_stmt(t.name(&total), t.count(0)),
        t.while_loop(
            t.binary(BinaryOp::Gt, t.name(n), t.count(0)),
            t.block(&[
                t.expr_stmt(t.add_to(t.name(&total), t.name(n))),
                t.expr_stmt(t.decr(t.name(n))),
            ]),
        ),
        t.if_then(
            t.binary(BinaryOp::Eq, t.name(&total), t.count(0)),
            t.print(&[t.string("empty")]),
        ),
        t.return_stmt(Some(t.name(&total))),
    ]);
    assert_eq!(
        body.to_string(),
        indoc! {r#"
            total = 0;
            while (n > 0) {
                total += n;
                --n;
            }
            if (total == 0) {
                print "empty";
            }
            return total;
        "#}
    );
}

#[test]
fn test_traversal_visits_in_order_and_aborts() {
    struct Names(Vec<String>);

    impl<'a> Traversal<'a> for Names {
        fn pre_expr(&mut self, expr: &'a crate::ast::Expr<'a>) -> TraversalCode {
            match &expr.kind {
                ExprKind::Name(id) if id.name == "stop" => TraversalCode::AbortAll,
                ExprKind::Name(id) => {
                    self.0.push(id.name.clone());
                    TraversalCode::Continue
                }
                _ => TraversalCode::Continue,
            }
        }
    }

    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let (a, b, stop, c) = (
        new_global("a", types::int()),
        new_global("b", types::int()),
        new_global("stop", types::int()),
        new_global("c", types::int()),
    );
    let body = t.block(&[
        t.assign_stmt(t.name(&a), t.binary(BinaryOp::Add, t.name(&b), t.int(1))),
        t.expr_stmt(t.name(&stop)),
        t.expr_stmt(t.name(&c)),
    ]);
    let mut names = Names(Vec::new());
    assert_eq!(traverse_stmt(body, &mut names), TraversalCode::AbortAll);
    assert_eq!(names.0, vec!["a", "b"]);
}

#[test]
fn test_constant_display_quotes_strings() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let e = t.constant(Val::str("x\"y"), types::string());
    assert_eq!(e.to_string(), r#""x\"y""#);
}
