//! Frame slots are shared only between values whose lifetimes are disjoint.

mod cases;

use bumpalo::Bump;
use pretty_assertions::assert_eq;
use zam::ast::{BinaryOp, Stmt, Tree, declare_func, new_local};
use zam::codegen::generate;
use zam::diagnostics::Reporter;
use zam::optimizer::{Lifetime, compute_lifetimes, remap_slots};
use zam::reduce::Reducer;
use zam::types;
use zam::usedefs::remove_unused;
use zam::values::{Builtins, EventLog, ScriptFunc, Val};
use zam::{CompilationOptions, FuncDecl};

/// x = a*2 + 1; y = x*3 + 2; return y;
fn chain<'a>(t: Tree<'a>, f: &ScriptFunc) -> &'a Stmt<'a> {
    let a = &f.params[0];
    let x = new_local(f, "x", types::count());
    let y = new_local(f, "y", types::count());
    t.block(&[
        t.assign_stmt(
            t.name(&x),
            t.binary(BinaryOp::Add, t.binary(BinaryOp::Times, t.name(a), t.count(2)), t.count(1)),
        ),
        t.assign_stmt(
            t.name(&y),
            t.binary(BinaryOp::Add, t.binary(BinaryOp::Times, t.name(&x), t.count(3)), t.count(2)),
        ),
        t.return_stmt(Some(t.name(&y))),
    ])
}

#[test]
fn temporaries_with_disjoint_lifetimes_share() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let (engine, _) = cases::engine();

    let plain = declare_func("plain", &[("a", types::count())], types::count());
    let options = CompilationOptions {
        optimize: false,
        ..CompilationOptions::default()
    };
    let body = chain(t, &plain);
    let compiled = engine.compile_with_options(t, FuncDecl::new(&plain, body), &options).unwrap();
    let unshared = cases::bytecode(&plain, compiled.body_index);

    let shared = declare_func("shared", &[("a", types::count())], types::count());
    let body = chain(t, &shared);
    let compiled = engine.compile(t, FuncDecl::new(&shared, body)).unwrap();
    let z = cases::bytecode(&shared, compiled.body_index);

    // Two temporaries plus x and y collapse onto one slot next to `a`.
    assert!(unshared.frame_size >= 5);
    assert_eq!(z.frame_size, 2);
    assert_eq!(z.slot_names[0], "a");

    let events = EventLog::new();
    for a in [0, 1, 7] {
        let want = Val::Count((a * 2 + 1) * 3 + 2);
        assert_eq!(engine.run(&plain, vec![Val::Count(a)], &events).unwrap(), want);
        assert_eq!(engine.run(&shared, vec![Val::Count(a)], &events).unwrap(), want);
    }
}

fn overlap(a: Lifetime, b: Lifetime) -> bool {
    a.begin < b.end && b.begin < a.end
}

#[test]
fn merged_identifiers_never_overlap() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let f = declare_func("mix", &[("a", types::count())], types::count());
    let a = &f.params[0];
    let x = new_local(&f, "x", types::count());
    let y = new_local(&f, "y", types::count());
    let i = new_local(&f, "i", types::count());
    let body = t.block(&[
        t.assign_stmt(t.name(&x), t.binary(BinaryOp::Add, t.name(a), t.count(1))),
        t.assign_stmt(t.name(&i), t.count(0)),
        t.while_loop(
            t.binary(BinaryOp::Lt, t.name(&i), t.name(&x)),
            t.expr_stmt(t.incr(t.name(&i))),
        ),
        t.assign_stmt(t.name(&y), t.binary(BinaryOp::Times, t.name(&i), t.count(2))),
        t.return_stmt(Some(t.binary(BinaryOp::Add, t.name(&y), t.count(1)))),
    ]);

    let builtins = Builtins::new();
    let options = CompilationOptions::default();
    let r = Reducer::new(t, &builtins, &f, &options);
    let reduced = remove_unused(&r, r.reduce_body(body), &options);
    let mut code = generate(&f, reduced).unwrap();

    let lifetimes = compute_lifetimes(&code);
    let before: Vec<(String, Option<Lifetime>)> = code
        .slots
        .iter()
        .zip(&lifetimes)
        .map(|(s, lt)| (s.name.clone(), *lt))
        .collect();
    let lifetime_of = |name: &str| {
        before
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, lt)| *lt)
    };

    let slots = remap_slots(&mut code, &lifetimes);
    assert!(slots < before.len());
    for slot in &code.slots {
        let names: Vec<&str> = slot.name.split('/').collect();
        for (n, first) in names.iter().enumerate() {
            for second in &names[n + 1..] {
                let (Some(l1), Some(l2)) = (lifetime_of(first), lifetime_of(second)) else {
                    continue;
                };
                assert!(!overlap(l1, l2), "{} {:?} overlaps {} {:?}", first, l1, second, l2);
            }
        }
    }
}
