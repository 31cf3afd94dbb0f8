use bumpalo::Bump;
use pretty_assertions::assert_eq;

use crate::api::{CompilationOptions, ExecutionOptions};
use crate::ast::{BinaryOp, Stmt, Tree, UnaryOp, declare_func, new_global, new_local};
use crate::codegen::generate;
use crate::diagnostics::Reporter;
use crate::interp::{Runtime, RuntimeError};
use crate::optimizer::{compact, optimize};
use crate::reduce::Reducer;
use crate::types;
use crate::usedefs::remove_unused;
use crate::values::{Builtins, EventLog, ScriptFunc, Val};
use crate::vm::{Outcome, ZBody};
use crate::vec;

fn lower<'a>(f: &ScriptFunc, body: &'a Stmt<'a>) -> ZBody {
    compact(generate(f, body).unwrap())
}

/// The whole pipeline, from tree to optimized body.
fn compile<'a>(t: Tree<'a>, builtins: &Builtins, f: &ScriptFunc, body: &'a Stmt<'a>) -> ZBody {
    let options = CompilationOptions::default();
    let r = Reducer::new(t, builtins, f, &options);
    let reduced = r.reduce_body(body);
    let reduced = remove_unused(&r, reduced, &options);
    let mut code = generate(f, reduced).unwrap();
    optimize(&mut code);
    compact(code)
}

#[test]
fn test_when_suspends_until_condition_holds() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let ready = new_global("ready", types::bool());
    ready.set_value(Val::Bool(false));
    let f = declare_func("waiter", &[], types::count());
    let body = t.block(&[
        t.print(&[t.string("before")]),
        t.when(t.name(&ready), t.print(&[t.string("fired")])),
        t.return_stmt(Some(t.count(1))),
    ]);
    let zbody = lower(&f, body);

    let builtins = Builtins::new();
    let events = EventLog::new();
    let rt = Runtime::new(&builtins, &events);
    let mut frame = zbody.new_frame(vec![]);
    let Outcome::Suspended(at) = zbody.exec_resumable(&mut frame, &rt).unwrap() else {
        panic!("expected suspension");
    };
    assert_eq!(events.printed(), vec!["before"]);

    // Still false: parks again at the same place.
    assert_eq!(
        zbody.resume(&mut frame, at, &rt).unwrap(),
        Outcome::Suspended(at)
    );

    ready.set_value(Val::Bool(true));
    assert_eq!(
        zbody.resume(&mut frame, at, &rt).unwrap(),
        Outcome::Returned(Val::Count(1))
    );
    assert_eq!(events.printed(), vec!["before", "fired"]);
}

#[test]
fn test_when_without_resumption_skips_body() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let f = declare_func("waiter", &[("go", types::bool())], types::void());
    let go = &f.params[0];
    let body = t.when(t.name(go), t.print(&[t.string("fired")]));
    let zbody = lower(&f, body);

    let builtins = Builtins::new();
    let events = EventLog::new();
    let rt = Runtime::new(&builtins, &events);
    zbody.exec(vec![Val::Bool(false)], &rt).unwrap();
    assert!(events.printed().is_empty());
    zbody.exec(vec![Val::Bool(true)], &rt).unwrap();
    assert_eq!(events.printed(), vec!["fired"]);
}

#[test]
fn test_profile_counts_instructions() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let f = declare_func("count3", &[], types::count());
    let i = new_local(&f, "i", types::count());
    let body = t.block(&[
        t.assign_stmt(t.name(&i), t.count(0)),
        t.while_loop(
            t.binary(BinaryOp::Lt, t.name(&i), t.count(3)),
            t.expr_stmt(t.add_to(t.name(&i), t.count(1))),
        ),
        t.return_stmt(Some(t.name(&i))),
    ]);
    let zbody = lower(&f, body);

    let builtins = Builtins::new();
    let events = EventLog::new();
    let rt = Runtime::new(&builtins, &events).with_options(ExecutionOptions {
        profile: true,
        ..Default::default()
    });
    assert_eq!(zbody.exec(vec![], &rt).unwrap(), Val::Count(3));
    // assign, test, add, back edge, return, trailing return
    assert_eq!(zbody.profile(), vec![1, 4, 3, 3, 1, 0]);

    zbody.reset_profile();
    assert!(zbody.profile().iter().all(|&n| n == 0));
}

#[test]
fn test_iteration_limit_stops_runaway_loops() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let f = declare_func("spin", &[], types::void());
    let body = t.while_loop(t.boolean(true), t.null());
    let zbody = lower(&f, body);

    let builtins = Builtins::new();
    let events = EventLog::new();
    let rt = Runtime::new(&builtins, &events).with_options(ExecutionOptions {
        max_iterations: Some(100),
        ..Default::default()
    });
    let err = zbody.exec(vec![], &rt).unwrap_err();
    assert!(matches!(err, RuntimeError::IterationLimit { limit: 100, .. }));
}

#[test]
fn test_unset_local_names_the_variable() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let f = declare_func("f", &[], types::count());
    let x = new_local(&f, "x", types::count());
    let zbody = lower(&f, t.return_stmt(Some(t.name(&x))));

    let builtins = Builtins::new();
    let events = EventLog::new();
    let rt = Runtime::new(&builtins, &events);
    let err = zbody.exec(vec![], &rt).unwrap_err();
    assert!(matches!(err, RuntimeError::ValueNotSet { ref name, .. } if name == "x"));
}

#[test]
fn test_unset_global_names_the_global() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let g = new_global("limit", types::count());
    let f = declare_func("f", &[], types::count());
    let zbody = lower(&f, t.return_stmt(Some(t.name(&g))));

    let builtins = Builtins::new();
    let events = EventLog::new();
    let rt = Runtime::new(&builtins, &events);
    let err = zbody.exec(vec![], &rt).unwrap_err();
    assert!(matches!(err, RuntimeError::ValueNotSet { ref name, .. } if name == "limit"));
}

#[test]
fn test_release_all_clears_managed_slots() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let vty = types::vector_of(types::count());
    let f = declare_func("len", &[("v", vty.clone())], types::count());
    let v = &f.params[0];
    let body = t.return_stmt(Some(t.unary(UnaryOp::Size, t.name(v))));
    let zbody = lower(&f, body);
    assert_eq!(zbody.managed_slots, vec![0]);

    let arg = Val::vector(types::count(), vec![Val::Count(1), Val::Count(2)]);
    let Val::Vector(rc) = &arg else { unreachable!() };

    let builtins = Builtins::new();
    let events = EventLog::new();
    let rt = Runtime::new(&builtins, &events);
    let mut frame = zbody.new_frame(vec![arg.clone()]);
    assert_eq!(
        zbody.exec_resumable(&mut frame, &rt).unwrap(),
        Outcome::Returned(Val::Count(2))
    );
    assert_eq!(crate::Rc::strong_count(rc), 2);
    frame.release_all();
    assert_eq!(frame.get(0), &Val::Void);
    assert_eq!(crate::Rc::strong_count(rc), 1);
}

#[test]
fn test_vector_arithmetic_leaves_operands_alone() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let vty = types::vector_of(types::count());
    let f = declare_func("double_it", &[("v", vty.clone())], vty.clone());
    let v = &f.params[0];
    let w = new_local(&f, "w", vty);
    let body = t.block(&[
        t.assign_stmt(t.name(&w), t.binary(BinaryOp::Add, t.name(v), t.name(v))),
        t.return_stmt(Some(t.name(&w))),
    ]);
    let zbody = lower(&f, body);

    let arg = Val::vector(types::count(), vec![Val::Count(1), Val::Count(2)]);
    let builtins = Builtins::new();
    let events = EventLog::new();
    let rt = Runtime::new(&builtins, &events);
    let out = zbody.exec(vec![arg.clone()], &rt).unwrap();

    let (Val::Vector(a), Val::Vector(b)) = (&arg, &out) else {
        panic!("expected vectors");
    };
    assert!(!crate::Rc::ptr_eq(a, b));
    assert_eq!(a.borrow().get(1), Some(&Val::Count(2)));
    assert_eq!(b.borrow().get(0), Some(&Val::Count(2)));
    assert_eq!(b.borrow().get(1), Some(&Val::Count(4)));
}

#[test]
fn test_table_loop_through_full_pipeline() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let tty = types::table_of(vec![types::string()], types::count());
    let f = declare_func("sum_table", &[], types::count());
    let tbl = new_local(&f, "tbl", tty);
    let k = new_local(&f, "k", types::string());
    let v = new_local(&f, "v", types::count());
    let total = new_local(&f, "total", types::count());
    let body = t.block(&[
        t.init(&[tbl.clone()]),
        t.assign_stmt(t.index(t.name(&tbl), &[t.string("a")]), t.count(3)),
        t.assign_stmt(t.index(t.name(&tbl), &[t.string("b")]), t.count(5)),
        t.assign_stmt(t.name(&total), t.count(0)),
        t.for_loop(
            &[k.clone()],
            Some(v.clone()),
            t.name(&tbl),
            t.expr_stmt(t.add_to(t.name(&total), t.name(&v))),
        ),
        t.return_stmt(Some(t.name(&total))),
    ]);
    let builtins = Builtins::new();
    let zbody = compile(t, &builtins, &f, body);
    assert!(!reporter.has_errors());

    let events = EventLog::new();
    let rt = Runtime::new(&builtins, &events);
    assert_eq!(zbody.exec(vec![], &rt).unwrap(), Val::Count(8));
}

#[test]
fn test_errors_carry_the_instruction_location() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let f = declare_func("ratio", &[("d", types::count())], types::count());
    let d = &f.params[0];
    let at = t.at(3, 20);
    let body = at.return_stmt(Some(at.binary(BinaryOp::Divide, at.count(100), at.name(d))));
    let builtins = Builtins::new();
    let zbody = compile(t, &builtins, &f, body);

    let events = EventLog::new();
    let rt = Runtime::new(&builtins, &events);
    assert_eq!(zbody.exec(vec![Val::Count(4)], &rt).unwrap(), Val::Count(25));
    let err = zbody.exec(vec![Val::Count(0)], &rt).unwrap_err();
    assert_eq!(err, RuntimeError::DivisionByZero {
        span: Some(crate::api::Span::new(3, 20))
    });
}
