use bumpalo::Bump;
use indoc::indoc;
use pretty_assertions::assert_eq;

use crate::api::CompilationOptions;
use crate::ast::{BinaryOp, Tree, UnaryOp, declare_func, new_local};
use crate::diagnostics::Reporter;
use crate::reduce::{Pre, Reducer};
use crate::types::{self, Type};
use crate::values::{BuiltinFunc, Builtins, Val};
use crate::{String, ToString, vec};

fn test_builtins() -> Builtins {
    let mut builtins = Builtins::new();
    builtins.register(BuiltinFunc::new(
        "side",
        types::function(vec![], types::bool()),
        |_| Ok(Val::Bool(true)),
    ));
    builtins.register(
        BuiltinFunc::new(
            "strlen",
            types::function(vec![(String::from("s"), types::string())], types::count()),
            |args| match &args[0] {
                Val::Str(s) => Ok(Val::Count(s.len() as u64)),
                _ => Ok(Val::Count(0)),
            },
        )
        .foldable(),
    );
    builtins
}

#[test]
fn test_constant_operands_fold() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let f = declare_func("f", &[], types::void());
    let builtins = test_builtins();
    let r = Reducer::new(t, &builtins, &f, &CompilationOptions::default());

    let mut pre = Pre::new();
    let e = t.binary(
        BinaryOp::Add,
        t.binary(BinaryOp::Times, t.count(2), t.count(3)),
        t.count(0),
    );
    assert_eq!(r.reduce_expr(e, &mut pre).to_string(), "6");

    let picked = t.cond(t.boolean(true), t.int(7), t.int(8));
    assert_eq!(r.reduce_expr(picked, &mut pre).to_string(), "7");
    assert!(pre.is_empty());
    assert_eq!(r.temps_created(), 0);
}

#[test]
fn test_self_subtraction_only_zeroes_scalars() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let f = declare_func("f", &[("c", types::count()), ("d", types::double())], types::void());
    let builtins = test_builtins();
    let r = Reducer::new(t, &builtins, &f, &CompilationOptions::default());
    let (c, d) = (&f.params[0], &f.params[1]);
    let mut pre = Pre::new();

    let counts = t.binary(BinaryOp::Sub, t.name(c), t.name(c));
    let zero = r.reduce_expr(counts, &mut pre);
    assert_eq!(zero.const_val(), Some(&Val::Count(0)));

    // NaN - NaN is not zero.
    let doubles = t.binary(BinaryOp::Sub, t.name(d), t.name(d));
    assert!(core::ptr::eq(r.reduce_expr(doubles, &mut pre), doubles));

    let vty = types::vector_of(types::count());
    let v = new_local(&f, "v", vty.clone());
    let elementwise = t.binary_typed(BinaryOp::Sub, t.name(&v), t.name(&v), vty);
    assert_eq!(r.reduce_expr(elementwise, &mut pre).to_string(), "v - v");

    let sty = types::set_of(vec![types::string()]);
    let s = new_local(&f, "s", sty.clone());
    let difference = t.binary_typed(BinaryOp::Sub, t.name(&s), t.name(&s), sty);
    assert_eq!(r.reduce_expr(difference, &mut pre).to_string(), "s - s");
    assert!(pre.is_empty());
}

#[test]
fn test_algebraic_identities() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let f = declare_func(
        "f",
        &[("i", types::int()), ("c", types::count()), ("b", types::bool())],
        types::void(),
    );
    let builtins = test_builtins();
    let r = Reducer::new(t, &builtins, &f, &CompilationOptions::default());
    let (i, c, b) = (&f.params[0], &f.params[1], &f.params[2]);
    let mut pre = Pre::new();

    let cases = [
        (t.binary(BinaryOp::Times, t.name(i), t.int(1)), "i"),
        (t.binary(BinaryOp::Times, t.int(1), t.name(i)), "i"),
        (t.binary(BinaryOp::Times, t.name(i), t.int(0)), "0"),
        (t.binary(BinaryOp::Times, t.count(0), t.name(c)), "0"),
        (t.binary(BinaryOp::Divide, t.name(i), t.int(1)), "i"),
        (t.unary(UnaryOp::Neg, t.unary(UnaryOp::Neg, t.name(i))), "i"),
        (t.unary(UnaryOp::Not, t.unary(UnaryOp::Not, t.name(b))), "b"),
        (t.unary(UnaryOp::Complement, t.unary(UnaryOp::Complement, t.name(c))), "c"),
        (t.binary(BinaryOp::Eq, t.name(c), t.name(c)), "T"),
        (t.binary(BinaryOp::Ge, t.name(i), t.name(i)), "T"),
        (t.binary(BinaryOp::Ne, t.name(c), t.name(c)), "F"),
        (t.binary(BinaryOp::Lt, t.name(i), t.name(i)), "F"),
        (t.binary(BinaryOp::And, t.name(c), t.name(c)), "c"),
        (t.binary(BinaryOp::Or, t.name(c), t.name(c)), "c"),
    ];
    for (e, want) in cases {
        assert_eq!(r.reduce_expr(e, &mut pre).to_string(), want, "{}", e);
    }
    assert!(pre.is_empty());
    assert_eq!(r.temps_created(), 0);
    assert!(!reporter.has_errors());
}

#[test]
fn test_identities_refuse_doubles_and_aggregates() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let f = declare_func("f", &[("d", types::double()), ("k", types::count())], types::void());
    let builtins = test_builtins();
    let r = Reducer::new(t, &builtins, &f, &CompilationOptions::default());
    let (d, k) = (&f.params[0], &f.params[1]);
    let vty = types::vector_of(types::count());
    let v = new_local(&f, "v", vty.clone());
    let mut pre = Pre::new();

    let kept = [
        // Infinity times zero is NaN.
        t.binary(BinaryOp::Times, t.name(d), t.double(0.0)),
        // NaN is not equal to itself.
        t.binary(BinaryOp::Eq, t.name(d), t.name(d)),
        t.binary_typed(BinaryOp::Times, t.name(&v), t.count(0), vty.clone()),
        t.binary_typed(BinaryOp::Times, t.name(&v), t.count(1), vty.clone()),
        t.binary_typed(BinaryOp::Eq, t.name(&v), t.name(&v), types::bool()),
        // Bitwise identities hold for counts only.
        t.binary_typed(BinaryOp::And, t.name(&v), t.name(&v), vty),
        t.binary(BinaryOp::Times, t.name(k), t.count(2)),
    ];
    for e in kept {
        assert!(core::ptr::eq(r.reduce_expr(e, &mut pre), e), "{}", e);
    }
    assert!(pre.is_empty());
}

#[test]
fn test_and_true_keeps_left_effects() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let f = declare_func("f", &[("a", types::bool())], types::void());
    let builtins = test_builtins();
    let r = Reducer::new(t, &builtins, &f, &CompilationOptions::default());
    let a = &f.params[0];

    let mut pre = Pre::new();
    let plain = t.and(t.name(a), t.boolean(true));
    assert_eq!(r.reduce_expr(plain, &mut pre).to_string(), "a");
    assert!(pre.is_empty());

    let side = builtins.id("side").unwrap();
    let effectful = t.and(t.call_global(&side, &[]), t.boolean(true));
    assert_eq!(r.reduce_expr(effectful, &mut pre).to_string(), "#0");
    assert_eq!(pre.len(), 1);
    assert_eq!(pre[0].to_string(), "#0 = side();\n");

    let mut pre = Pre::new();
    let never = t.or(t.call_global(&side, &[]), t.boolean(true));
    assert_eq!(r.reduce_expr(never, &mut pre).to_string(), "T");
    assert_eq!(pre[0].to_string(), "#1 = side();\n");
}

#[test]
fn test_short_circuit_becomes_if() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let f = declare_func("f", &[("a", types::bool())], types::void());
    let builtins = test_builtins();
    let r = Reducer::new(t, &builtins, &f, &CompilationOptions::default());
    let a = &f.params[0];
    let side = builtins.id("side").unwrap();

    let mut pre = Pre::new();
    let e = t.and(t.name(a), t.call_global(&side, &[]));
    assert_eq!(r.reduce_expr(e, &mut pre).to_string(), "#0");
    assert_eq!(pre.len(), 1);
    assert_eq!(
        pre[0].to_string(),
        indoc! {"
            if (a) {
                #0 = side();
            } else {
                #0 = F;
            }
        "}
    );

    let mut pre = Pre::new();
    let e = t.or(t.name(a), t.call_global(&side, &[]));
    r.reduce_expr(e, &mut pre);
    assert_eq!(
        pre[0].to_string(),
        indoc! {"
            if (a) {
                #1 = T;
            } else {
                #1 = side();
            }
        "}
    );
}

#[test]
fn test_conditional_branches_assign_the_result_directly() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let f = declare_func(
        "f",
        &[("b", types::bool()), ("x", types::int()), ("y", types::int())],
        types::void(),
    );
    let builtins = test_builtins();
    let r = Reducer::new(t, &builtins, &f, &CompilationOptions::default());
    let (b, x, y) = (&f.params[0], &f.params[1], &f.params[2]);

    let mut pre = Pre::new();
    let e = t.cond(
        t.name(b),
        t.binary(BinaryOp::Add, t.name(x), t.int(1)),
        t.binary(
            BinaryOp::Times,
            t.binary(BinaryOp::Sub, t.name(y), t.int(2)),
            t.name(x),
        ),
    );
    assert_eq!(r.reduce_expr(e, &mut pre).to_string(), "#1");
    assert_eq!(
        pre[0].to_string(),
        indoc! {"
            if (b) {
                #1 = x + 1;
            } else {
                #0 = y - 2;
                #1 = #0 * x;
            }
        "}
    );
    assert_eq!(r.temps_created(), 2);

    // Singleton branches stay a conditional expression.
    let mut pre = Pre::new();
    let plain = t.cond(t.name(b), t.name(x), t.name(y));
    assert!(core::ptr::eq(r.reduce_expr(plain, &mut pre), plain));
    assert!(pre.is_empty());
}

#[test]
fn test_nested_arithmetic_spills_into_temps() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let f = declare_func("f", &[("x", types::int()), ("y", types::int())], types::void());
    let builtins = test_builtins();
    let r = Reducer::new(t, &builtins, &f, &CompilationOptions::default());
    let (x, y) = (&f.params[0], &f.params[1]);
    let out = new_local(&f, "out", types::int());
    let frame_before = f.frame_size();

    let body = t.block(&[t.assign_stmt(
        t.name(&out),
        t.binary(
            BinaryOp::Times,
            t.binary(BinaryOp::Add, t.name(x), t.int(1)),
            t.binary(BinaryOp::Sub, t.name(y), t.int(2)),
        ),
    )]);
    let reduced = r.reduce_body(body);
    assert_eq!(
        reduced.to_string(),
        indoc! {"
            #0 = x + 1;
            #1 = y - 2;
            out = #0 * #1;
        "}
    );
    assert_eq!(r.temps_created(), 2);
    assert_eq!(f.frame_size(), frame_before + 2);

    // Reduced trees come back untouched.
    let again = r.reduce_body(reduced);
    assert!(core::ptr::eq(again, reduced));
    assert_eq!(r.temps_created(), 2);
}

#[test]
fn test_unsigned_comparison_with_zero_warns() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter).at(3, 8);
    let f = declare_func("f", &[("c", types::count())], types::void());
    let builtins = test_builtins();
    let r = Reducer::new(t, &builtins, &f, &CompilationOptions::default());
    let c = &f.params[0];

    let mut pre = Pre::new();
    let e = t.binary(BinaryOp::Lt, t.name(c), t.count(0));
    let reduced = r.reduce_expr(e, &mut pre);
    assert_eq!(reduced.const_val(), Some(&Val::Bool(false)));
    assert_eq!(reporter.warning_count(), 1);
    assert_eq!(
        reporter.diagnostics()[0].message,
        "comparison of count with 0 using '<' is always false"
    );
    assert!(!reporter.has_errors());
}

#[test]
fn test_increment_becomes_assignment() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let f = declare_func("f", &[("x", types::int())], types::void());
    let builtins = test_builtins();
    let r = Reducer::new(t, &builtins, &f, &CompilationOptions::default());
    let x = &f.params[0];

    let reduced = r.reduce_stmt(t.expr_stmt(t.incr(t.name(x))));
    assert_eq!(reduced.to_string(), "x = x + 1;\n");

    let reduced = r.reduce_stmt(t.expr_stmt(t.add_to(t.name(x), t.int(5))));
    assert_eq!(reduced.to_string(), "x = x + 5;\n");
}

#[test]
fn test_index_assignment_reduces_index() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let f = declare_func("f", &[("k", types::int()), ("v", types::string())], types::void());
    let builtins = test_builtins();
    let r = Reducer::new(t, &builtins, &f, &CompilationOptions::default());
    let (k, v) = (&f.params[0], &f.params[1]);
    let tbl = new_local(&f, "tbl", types::table_of(vec![types::int()], types::string()));

    let target = t.index(t.name(&tbl), &[t.binary(BinaryOp::Add, t.name(k), t.int(1))]);
    let reduced = r.reduce_stmt(t.assign_stmt(target, t.name(v)));
    assert_eq!(
        reduced.to_string(),
        indoc! {"
            #0 = k + 1;
            tbl[#0] = v;
        "}
    );
}

#[test]
fn test_destructuring_checks_length() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let lty = types::list_of(vec![types::int(), types::string()]);
    let f = declare_func("f", &[("l", lty)], types::void());
    let builtins = test_builtins();
    let r = Reducer::new(t, &builtins, &f, &CompilationOptions::default());
    let l = &f.params[0];
    let a = new_local(&f, "a", types::int());
    let b = new_local(&f, "b", types::string());

    let assign = t.assign_list(&[t.name(&a), t.name(&b)], t.name(l));
    let reduced = r.reduce_stmt(t.expr_stmt(assign));
    assert_eq!(
        reduced.to_string(),
        indoc! {"
            check-any-len l, 2;
            a = l<any>[0];
            b = l<any>[1];
        "}
    );
}

#[test]
fn test_foldable_builtin_with_constant_args() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let f = declare_func("f", &[], types::void());
    let builtins = test_builtins();
    let strlen = builtins.id("strlen").unwrap();
    let call = t.call_global(&strlen, &[t.string("abc")]);

    let folding = Reducer::new(t, &builtins, &f, &CompilationOptions::default());
    let mut pre = Pre::new();
    let folded = folding.reduce_expr(call, &mut pre);
    assert_eq!(folded.const_val(), Some(&Val::Count(3)));
    assert_eq!(*folded.ty, Type::Count);

    let options = CompilationOptions {
        fold_builtins: false,
        ..CompilationOptions::default()
    };
    let literal = Reducer::new(t, &builtins, &f, &options);
    assert!(core::ptr::eq(literal.reduce_expr(call, &mut pre), call));
    assert!(!literal.is_reduced(t.binary(BinaryOp::Add, t.count(1), t.count(2))));
}

#[test]
fn test_loop_condition_companions_move_into_prefix() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let f = declare_func("f", &[("x", types::int()), ("y", types::int())], types::void());
    let builtins = test_builtins();
    let r = Reducer::new(t, &builtins, &f, &CompilationOptions::default());
    let (x, y) = (&f.params[0], &f.params[1]);

    let cond = t.binary(
        BinaryOp::Gt,
        t.binary(BinaryOp::Add, t.name(x), t.int(1)),
        t.name(y),
    );
    let reduced = r.reduce_stmt(t.while_loop(cond, t.print(&[t.name(x)])));
    assert_eq!(
        reduced.to_string(),
        indoc! {"
            while ({
                #0 = x + 1;
            } #0 > y) {
                print x;
            }
        "}
    );

    let never = t.while_loop(t.boolean(false), t.print(&[t.name(x)]));
    assert!(r.reduce_stmt(never).is_null());
}

#[test]
fn test_omitted_statements_disappear() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let f = declare_func("f", &[("x", types::int())], types::int());
    let builtins = test_builtins();
    let r = Reducer::new(t, &builtins, &f, &CompilationOptions::default());
    let x = &f.params[0];
    let dead = new_local(&f, "dead", types::int());

    let unused = t.assign_stmt(t.name(&dead), t.name(x));
    let body = t.block(&[unused, t.return_stmt(Some(t.name(x)))]);
    let reduced = r.reduce_body(body);
    assert!(core::ptr::eq(reduced, body));

    r.omit(unused.key());
    assert_eq!(r.reduce_body(body).to_string(), "return x;\n");
}
