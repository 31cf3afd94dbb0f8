use bumpalo::Bump;
use indoc::indoc;
use pretty_assertions::assert_eq;

use crate::api::CompilationOptions;
use crate::ast::{BinaryOp, Tree, declare_func, new_local};
use crate::diagnostics::Reporter;
use crate::reduce::Reducer;
use crate::types;
use crate::usedefs::{UseDefs, remove_unused};
use crate::values::{BuiltinFunc, Builtins, Val};
use crate::{Rc, String, ToString, vec};

fn test_builtins() -> Builtins {
    let mut builtins = Builtins::new();
    builtins.register(BuiltinFunc::new(
        "side",
        types::function(vec![], types::count()),
        |_| Ok(Val::Count(7)),
    ));
    builtins.register(
        BuiltinFunc::new(
            "twice",
            types::function(vec![(String::from("n"), types::count())], types::count()),
            |args| match &args[0] {
                Val::Count(n) => Ok(Val::Count(n * 2)),
                _ => Ok(Val::Count(0)),
            },
        )
        .pure(),
    );
    builtins
}

#[test]
fn test_dead_store_removed() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let f = declare_func("f", &[("a", types::count())], types::count());
    let builtins = test_builtins();
    let options = CompilationOptions::default();
    let r = Reducer::new(t, &builtins, &f, &options);
    let a = &f.params[0];
    let x = new_local(&f, "x", types::count());
    let y = new_local(&f, "y", types::count());

    let body = r.reduce_body(t.block(&[
        t.assign_stmt(t.name(&x), t.binary(BinaryOp::Add, t.name(a), t.count(1))),
        t.assign_stmt(t.name(&y), t.count(5)),
        t.return_stmt(Some(t.name(&x))),
    ]));
    let pruned = remove_unused(&r, body, &options);
    assert_eq!(
        pruned.to_string(),
        indoc! {"
            x = a + 1;
            return x;
        "}
    );
}

#[test]
fn test_removal_iterates_through_chains() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let f = declare_func("f", &[("a", types::count())], types::count());
    let builtins = test_builtins();
    let options = CompilationOptions {
        usage_warnings: true,
        ..CompilationOptions::default()
    };
    let r = Reducer::new(t, &builtins, &f, &options);
    let a = &f.params[0];
    let t1 = new_local(&f, "t1", types::count());
    let t2 = new_local(&f, "t2", types::count());

    let body = t.block(&[
        t.assign_stmt(t.name(&t1), t.name(a)),
        t.assign_stmt(t.name(&t2), t.name(&t1)),
        t.return_stmt(Some(t.name(a))),
    ]);
    let pruned = remove_unused(&r, body, &options);
    assert_eq!(pruned.to_string(), "return a;\n");

    // Only the first round warns; t1 became dead as a consequence.
    assert_eq!(reporter.warning_count(), 1);
    assert_eq!(
        reporter.diagnostics()[0].message,
        "t2 assignment unused: t2 = t1"
    );
}

#[test]
fn test_impure_calls_survive() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let f = declare_func("f", &[("a", types::count())], types::count());
    let builtins = test_builtins();
    let options = CompilationOptions::default();
    let r = Reducer::new(t, &builtins, &f, &options);
    let a = &f.params[0];
    let r1 = new_local(&f, "r1", types::count());
    let r2 = new_local(&f, "r2", types::count());
    let side = builtins.id("side").unwrap();
    let twice = builtins.id("twice").unwrap();

    let body = t.block(&[
        t.assign_stmt(t.name(&r1), t.call_global(&side, &[])),
        t.assign_stmt(t.name(&r2), t.call_global(&twice, &[t.name(a)])),
        t.return_stmt(Some(t.name(a))),
    ]);
    let pruned = remove_unused(&r, body, &options);
    assert_eq!(
        pruned.to_string(),
        indoc! {"
            r1 = side();
            return a;
        "}
    );
}

#[test]
fn test_loop_carried_values_kept() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let f = declare_func("f", &[("n", types::count())], types::count());
    let builtins = test_builtins();
    let options = CompilationOptions::default();
    let r = Reducer::new(t, &builtins, &f, &options);
    let n = &f.params[0];
    let total = new_local(&f, "total", types::count());
    let scratch = new_local(&f, "scratch", types::count());

    let body = r.reduce_body(t.block(&[
        t.assign_stmt(t.name(&total), t.count(0)),
        t.while_loop(
            t.binary(BinaryOp::Gt, t.name(n), t.count(0)),
            t.block(&[
                t.assign_stmt(t.name(&scratch), t.name(n)),
                t.assign_stmt(
                    t.name(&total),
                    t.binary(BinaryOp::Add, t.name(&total), t.name(n)),
                ),
                t.assign_stmt(t.name(n), t.binary(BinaryOp::Sub, t.name(n), t.count(1))),
            ]),
        ),
        t.return_stmt(Some(t.name(&total))),
    ]));
    let pruned = remove_unused(&r, body, &options);
    assert_eq!(
        pruned.to_string(),
        indoc! {"
            total = 0;
            while (n > 0) {
                total = total + n;
                n = n - 1;
            }
            return total;
        "}
    );
}

#[test]
fn test_assignment_read_only_by_loop_condition() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let f = declare_func("f", &[("flag", types::bool())], types::void());
    let builtins = test_builtins();
    let options = CompilationOptions::default();
    let r = Reducer::new(t, &builtins, &f, &options);
    let flag = &f.params[0];

    let clear = t.assign_stmt(t.name(flag), t.boolean(false));
    let body = r.reduce_body(t.while_loop(
        t.name(flag),
        t.block(&[t.print(&[t.count(1)]), clear]),
    ));
    let ud = UseDefs::analyze(body);
    assert!(ud.is_live_after(clear, flag));
    assert!(core::ptr::eq(remove_unused(&r, body, &options), body));
}

#[test]
fn test_break_keeps_values_read_after_loop() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let f = declare_func("f", &[("n", types::count())], types::count());
    let builtins = test_builtins();
    let options = CompilationOptions::default();
    let r = Reducer::new(t, &builtins, &f, &options);
    let n = &f.params[0];
    let x = new_local(&f, "x", types::count());

    let body = r.reduce_body(t.block(&[
        t.assign_stmt(t.name(&x), t.count(0)),
        t.while_loop(
            t.binary(BinaryOp::Gt, t.name(n), t.count(0)),
            t.block(&[
                t.assign_stmt(t.name(&x), t.name(n)),
                t.if_then(
                    t.binary(BinaryOp::Gt, t.name(n), t.count(5)),
                    t.block(&[t.break_stmt()]),
                ),
                t.assign_stmt(t.name(n), t.binary(BinaryOp::Sub, t.name(n), t.count(1))),
                t.assign_stmt(t.name(&x), t.count(0)),
            ]),
        ),
        t.return_stmt(Some(t.name(&x))),
    ]));
    let pruned = remove_unused(&r, body, &options);
    assert!(core::ptr::eq(pruned, body));
}

#[test]
fn test_for_loop_definitions_reach_past_loop() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let f = declare_func(
        "f",
        &[("s", types::set_of(vec![types::count()])), ("c", types::bool())],
        types::count(),
    );
    let (s, c) = (&f.params[0], &f.params[1]);
    let k = new_local(&f, "k", types::count());
    let x = new_local(&f, "x", types::count());

    let from_key = t.assign_stmt(t.name(&x), t.name(&k));
    let from_const = t.assign_stmt(t.name(&x), t.count(0));
    let body = t.block(&[
        t.for_loop(
            &[k.clone()],
            None,
            t.name(s),
            t.if_else(t.name(c), from_key, from_const),
        ),
        t.return_stmt(Some(t.name(&x))),
    ]);
    let ud = UseDefs::analyze(body);
    assert!(ud.is_live_after(from_key, &x));
    assert!(ud.is_live_after(from_const, &x));
    assert!(!ud.usage(body).unwrap().contains(&k));
}

#[test]
fn test_fallthrough_carries_liveness() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let f = declare_func("f", &[("a", types::count())], types::void());
    let a = &f.params[0];
    let x = new_local(&f, "x", types::count());

    let set_x = t.assign_stmt(t.name(&x), t.count(1));
    let body = t.switch(
        t.name(a),
        vec![
            t.case(&[t.count(1)], t.block(&[set_x, t.fallthrough()])),
            t.case(&[t.count(2)], t.print(&[t.name(&x)])),
        ],
        None,
    );
    let ud = UseDefs::analyze(body);
    assert!(ud.is_live_after(set_x, &x));
    assert_eq!(ud.usage(body).unwrap().to_string(), "a x");
}

#[test]
fn test_init_drops_unused_aggregates() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let f = declare_func("f", &[], types::count());
    let builtins = test_builtins();
    let options = CompilationOptions::default();
    let r = Reducer::new(t, &builtins, &f, &options);
    let tbl = new_local(&f, "tbl", types::table_of(vec![types::string()], types::count()));
    let c = new_local(&f, "c", types::count());

    let body = t.block(&[t.init(&[tbl, c]), t.return_stmt(Some(t.count(1)))]);
    let pruned = remove_unused(&r, body, &options);
    assert_eq!(
        pruned.to_string(),
        indoc! {"
            init c;
            return 1;
        "}
    );
}

#[test]
fn test_equal_sets_are_shared() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let f = declare_func("f", &[("a", types::count())], types::void());
    let a = &f.params[0];

    let first = t.print(&[t.name(a)]);
    let second = t.print(&[t.name(a)]);
    let body = t.block(&[first, second]);
    let ud = UseDefs::analyze(body);
    let (u1, u2) = (ud.usage(first).unwrap(), ud.usage(second).unwrap());
    assert!(Rc::ptr_eq(u1, u2));
    assert!(Rc::ptr_eq(u1, ud.usage(body).unwrap()));
    assert_eq!(u1.to_string(), "a");
    assert_eq!(ud.statements().len(), 3);
}
