use bumpalo::Bump;
use pretty_assertions::assert_eq;

use crate::api::{CompilationOptions, Engine, EngineOptions, Error, FuncDecl, Severity, Span};
use crate::ast::{BinaryOp, Tree, declare_func, new_local};
use crate::diagnostics::Reporter;
use crate::stdlib::{NetworkClock, register_stdlib};
use crate::types;
use crate::values::{EventLog, Val};
use crate::vec;

#[test]
fn test_compiles_to_bytecode() {
    crate::test_utils::init_test_logging();
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let f = declare_func("shout", &[("s", types::string())], types::count());
    let s = &f.params[0];
    let upper = new_local(&f, "upper", types::string());
    let engine = Engine::new(EngineOptions::default(), |b| {
        register_stdlib(b, &NetworkClock::new())
    });
    let to_upper = engine.builtins().id("to_upper").unwrap();
    let strlen = engine.builtins().id("strlen").unwrap();
    let body = t.block(&[
        t.assign_stmt(t.name(&upper), t.call_global(&to_upper, &[t.name(s)])),
        t.print(&[t.name(&upper)]),
        t.return_stmt(Some(t.call_global(&strlen, &[t.name(&upper)]))),
    ]);

    let compiled = engine.compile(t, FuncDecl::new(&f, body)).unwrap();
    assert!(compiled.is_compiled());
    assert!(compiled.warnings.is_empty());
    assert!(compiled.stats.is_some());

    let events = EventLog::new();
    let out = engine.run(&f, vec![Val::str("hey")], &events).unwrap();
    assert_eq!(out, Val::Count(3));
    assert_eq!(events.printed(), vec!["HEY"]);
}

#[test]
fn test_unoptimized_skips_the_optimizer() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let f = declare_func("inc", &[("a", types::count())], types::count());
    let body = t.return_stmt(Some(t.binary(BinaryOp::Add, t.name(&f.params[0]), t.count(1))));
    let engine = Engine::new(EngineOptions::default(), |_| {});
    let options = CompilationOptions {
        optimize: false,
        ..CompilationOptions::default()
    };

    let compiled = engine.compile_with_options(t, FuncDecl::new(&f, body), &options).unwrap();
    assert!(compiled.is_compiled());
    assert!(compiled.stats.is_none());
    let events = EventLog::new();
    assert_eq!(engine.run(&f, vec![Val::Count(1)], &events).unwrap(), Val::Count(2));
}

#[test]
fn test_type_switch_falls_back_to_the_interpreter() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let f = declare_func("kind", &[("v", types::any())], types::void());
    let v = &f.params[0];
    let body = t.switch(
        t.name(v),
        vec![
            t.type_case(&[(None, types::count())], t.print(&[t.string("count")])),
            t.type_case(&[(None, types::string())], t.print(&[t.string("string")])),
        ],
        None,
    );
    let engine = Engine::new(EngineOptions::default(), |_| {});

    let compiled = engine.compile(t, FuncDecl::new(&f, body)).unwrap();
    assert!(!compiled.is_compiled());
    assert_eq!(compiled.warnings.len(), 1);
    assert_eq!(compiled.warnings[0].severity, Severity::Warning);
    assert!(compiled.warnings[0].message.contains("type switch"));

    let events = EventLog::new();
    engine.run(&f, vec![Val::str("x")], &events).unwrap();
    assert_eq!(events.printed(), vec!["string"]);
}

#[test]
fn test_semantic_errors_stop_compilation() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let f = declare_func("bad", &[], types::count());
    let sum = t.at(7, 14).binary(BinaryOp::Add, t.string("a"), t.count(1));
    let body = t.return_stmt(Some(sum));
    let engine = Engine::new(EngineOptions::default(), |_| {});

    let err = engine.compile(t, FuncDecl::new(&f, body)).unwrap_err();
    let Error::Compilation { diagnostics } = err else {
        panic!("expected a compilation error, got {:?}", err);
    };
    assert_eq!(diagnostics[0].span, Span::new(7, 14));
    assert!(f.bodies().is_empty());
}

#[test]
fn test_usage_warnings_reach_the_caller() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let f = declare_func("f", &[("a", types::count())], types::count());
    let a = &f.params[0];
    let x = new_local(&f, "x", types::count());
    let body = t.block(&[
        t.at(0, 9).assign_stmt(t.name(&x), t.binary(BinaryOp::Add, t.name(a), t.count(1))),
        t.return_stmt(Some(t.name(a))),
    ]);
    let engine = Engine::new(EngineOptions::default(), |_| {});
    let options = CompilationOptions {
        usage_warnings: true,
        ..CompilationOptions::default()
    };

    let compiled = engine.compile_with_options(t, FuncDecl::new(&f, body), &options).unwrap();
    assert_eq!(compiled.warnings.len(), 1);
    assert!(compiled.warnings[0].message.starts_with("x assignment unused"));
    assert_eq!(compiled.warnings[0].span, Span::new(0, 9));
}

#[test]
fn test_runtime_errors_become_diagnostics() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let f = declare_func("ratio", &[("d", types::count())], types::count());
    let at = t.at(10, 17);
    let body = at.return_stmt(Some(at.binary(BinaryOp::Divide, at.count(1), at.name(&f.params[0]))));
    let engine = Engine::new(EngineOptions::default(), |_| {});
    engine.compile(t, FuncDecl::new(&f, body)).unwrap();

    let events = EventLog::new();
    let err = engine.run(&f, vec![Val::Count(0)], &events).unwrap_err();
    let Error::Runtime { diagnostic } = err else {
        panic!("expected a runtime error, got {:?}", err);
    };
    assert_eq!(diagnostic.message, "division by zero");
    assert_eq!(diagnostic.span, Span::new(10, 17));
}
