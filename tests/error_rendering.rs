//! Diagnostics from compilation and execution, rendered against source.

mod cases;

use bumpalo::Bump;
use indoc::indoc;
use pretty_assertions::assert_eq;
use zam::ast::{BinaryOp, Tree, declare_func};
use zam::diagnostics::Reporter;
use zam::types;
use zam::values::{EventLog, Val};
use zam::{Error, FuncDecl, render_error_to_string_no_color};

const SOURCE: &str = indoc! {r#"
    function ratio(d: count): count
        {
        return 100 / d;
        }
"#};

#[test]
fn runtime_error_points_at_the_division() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let (engine, _) = cases::engine();
    let f = declare_func("ratio", &[("d", types::count())], types::count());
    let start = SOURCE.find("100 / d").unwrap();
    let at = t.at(start, start + 7);
    let body = at.return_stmt(Some(at.binary(BinaryOp::Divide, at.count(100), at.name(&f.params[0]))));
    engine.compile(t, FuncDecl::new(&f, body)).unwrap();

    let events = EventLog::new();
    let err = engine.run(&f, vec![Val::Count(0)], &events).unwrap_err();
    assert!(matches!(err, Error::Runtime { .. }));

    let output = render_error_to_string_no_color(&err, SOURCE);
    assert!(output.starts_with("Error: division by zero\n"));
    assert!(output.contains("<script>:3:12"));
    assert!(output.contains("    return 100 / d;"));
    assert_eq!(output.matches("division by zero").count(), 2);
}

#[test]
fn compilation_errors_render_each_diagnostic() {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let (engine, _) = cases::engine();
    let f = declare_func("bad", &[], types::count());
    let source = "return \"a\" + 1;";
    let sum = t.at(7, 14).binary(BinaryOp::Add, t.string("a"), t.count(1));
    let body = t.return_stmt(Some(sum));

    let err = engine.compile(t, FuncDecl::new(&f, body)).unwrap_err();
    let output = render_error_to_string_no_color(&err, source);
    assert!(output.starts_with("Error: "));
    assert!(output.contains("return \"a\" + 1;"));
}
