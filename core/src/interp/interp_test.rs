use bumpalo::Bump;
use pretty_assertions::assert_eq;

use crate::ast::{BinaryOp, IdPtr, Tree, declare_event, declare_func, new_const, new_global, new_local};
use crate::diagnostics::{Context, Reporter};
use crate::interp::{Interpreter, Runtime, RuntimeError};
use crate::types::{self, FieldDecl};
use crate::values::{Builtins, EventLog, Func, ScriptFunc, Val};
use crate::{Rc, String, vec};

fn callable(func: &Rc<ScriptFunc>) -> IdPtr {
    new_const(
        &func.name,
        func.ty.clone(),
        Val::Func(Rc::new(Func::Script(func.clone()))),
        false,
    )
}

#[test]
fn test_while_loop_sums() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let f = declare_func("sum_to", &[("n", types::count())], types::count());
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
        t.return_stmt(Some(t.name(&total))),
    ]);

    let interp = Interpreter::new();
    interp.attach(&f, body);
    let builtins = Builtins::new();
    let events = EventLog::new();
    let rt = Runtime::new(&builtins, &events).with_trees(&interp);
    assert_eq!(rt.invoke(&f, vec![Val::Count(4)]).unwrap(), Val::Count(10));
}

#[test]
fn test_error_carries_call_stack() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let inner = declare_func("ratio", &[("d", types::count())], types::count());
    let inner_body = t.at(10, 15).return_stmt(Some(t.at(17, 22).binary(
        BinaryOp::Divide,
        t.count(100),
        t.name(&inner.params[0]),
    )));
    let outer = declare_func("outer", &[], types::count());
    let call = t.at(40, 48).call_global(&callable(&inner), &[t.count(0)]);
    let outer_body = t.return_stmt(Some(call));

    let interp = Interpreter::new();
    interp.attach(&inner, inner_body);
    interp.attach(&outer, outer_body);
    let builtins = Builtins::new();
    let events = EventLog::new();
    let rt = Runtime::new(&builtins, &events).with_trees(&interp);

    let err = rt.invoke(&outer, vec![]).unwrap_err();
    assert_eq!(err.error, RuntimeError::DivisionByZero {
        span: Some(crate::api::Span::new(17, 22))
    });
    let names: crate::Vec<&str> = err
        .call_stack
        .iter()
        .map(|c| match c {
            Context::CalledFrom { func, .. } => func.as_str(),
            _ => "?",
        })
        .collect();
    assert_eq!(names, vec!["ratio", "outer"]);
    assert_eq!(rt.depth(), 0);
}

#[test]
fn test_switch_fallthrough_and_default() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let f = declare_func("classify", &[("x", types::count())], types::string());
    let x = &f.params[0];
    let out = new_local(&f, "out", types::string());
    let body = t.block(&[
        t.assign_stmt(t.name(&out), t.string("")),
        t.switch(
            t.name(x),
            vec![
                t.case(
                    &[t.count(1)],
                    t.block(&[
                        t.assign_stmt(t.name(&out), t.string("one")),
                        t.fallthrough(),
                    ]),
                ),
                t.case(
                    &[t.count(2)],
                    t.block(&[
                        t.expr_stmt(t.add_to(t.name(&out), t.string("+two"))),
                        t.break_stmt(),
                    ]),
                ),
                t.case(&[], t.assign_stmt(t.name(&out), t.string("many"))),
            ],
            Some(2),
        ),
        t.return_stmt(Some(t.name(&out))),
    ]);

    let interp = Interpreter::new();
    interp.attach(&f, body);
    let builtins = Builtins::new();
    let events = EventLog::new();
    let rt = Runtime::new(&builtins, &events).with_trees(&interp);
    assert_eq!(rt.invoke(&f, vec![Val::Count(1)]).unwrap(), Val::str("one+two"));
    assert_eq!(rt.invoke(&f, vec![Val::Count(2)]).unwrap(), Val::str("+two"));
    assert_eq!(rt.invoke(&f, vec![Val::Count(7)]).unwrap(), Val::str("many"));
}

#[test]
fn test_for_over_table_and_events() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let counts = new_global("counts", types::table_of(vec![types::string()], types::count()));
    let seen = declare_event("seen", &[("k", types::string()), ("v", types::count())]);
    let seen_id = callable(&seen);
    let f = declare_func("report", &[], types::void());
    let k = new_local(&f, "k", types::string());
    let v = new_local(&f, "v", types::count());
    let body = t.block(&[
        t.expr_stmt(t.assign(t.index(t.name(&counts), &[t.string("a")]), t.count(3))),
        t.expr_stmt(t.assign(t.index(t.name(&counts), &[t.string("b")]), t.count(5))),
        t.for_loop(
            &[k.clone()],
            Some(v.clone()),
            t.name(&counts),
            t.event_stmt(&seen_id, &[t.name(&k), t.name(&v)]),
        ),
        t.print(&[t.unary(crate::ast::UnaryOp::Size, t.name(&counts))]),
    ]);
    counts.set_value(crate::values::empty_aggregate(&counts.ty).unwrap());

    let interp = Interpreter::new();
    interp.attach(&f, body);
    let builtins = Builtins::new();
    let events = EventLog::new();
    let rt = Runtime::new(&builtins, &events).with_trees(&interp);
    rt.invoke(&f, vec![]).unwrap();

    let delivered = events.events();
    assert_eq!(delivered.len(), 2);
    assert_eq!(delivered[0].args, vec![Val::str("a"), Val::Count(3)]);
    assert_eq!(delivered[1].args, vec![Val::str("b"), Val::Count(5)]);
    assert_eq!(events.printed(), vec![String::from("2")]);
}

#[test]
fn test_unset_field_without_default() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let info = types::record(
        "info",
        vec![
            FieldDecl::new("hits", types::count()).with_default(Val::Count(0)),
            FieldDecl::new("note", types::string()).optional(),
        ],
    );
    let f = declare_func("peek", &[], types::string());
    let r = new_local(&f, "r", info.clone());
    let body = t.block(&[
        t.assign_stmt(t.name(&r), t.record_ctor(&info, &[])),
        t.if_then(
            t.has_field(t.name(&r), "hits"),
            t.expr_stmt(t.incr(t.field(t.name(&r), "hits"))),
        ),
        t.return_stmt(Some(t.field(t.name(&r), "note"))),
    ]);

    let interp = Interpreter::new();
    interp.attach(&f, body);
    let builtins = Builtins::new();
    let events = EventLog::new();
    let rt = Runtime::new(&builtins, &events).with_trees(&interp);
    let err = rt.invoke(&f, vec![]).unwrap_err();
    assert!(matches!(
        err.error,
        RuntimeError::FieldNotSet { ref field, .. } if field == "note"
    ));
}

#[test]
fn test_iteration_limit() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let f = declare_func("spin", &[], types::void());
    let body = t.while_loop(t.boolean(true), t.null());

    let interp = Interpreter::new();
    interp.attach(&f, body);
    let builtins = Builtins::new();
    let events = EventLog::new();
    let rt = Runtime::new(&builtins, &events)
        .with_trees(&interp)
        .with_options(crate::api::ExecutionOptions {
            max_iterations: Some(100),
            ..Default::default()
        });
    let err = rt.invoke(&f, vec![]).unwrap_err();
    assert!(matches!(err.error, RuntimeError::IterationLimit { limit: 100, .. }));
}
