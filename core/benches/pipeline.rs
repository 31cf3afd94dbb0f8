//! Benchmarks for the compilation pipeline and the bytecode engine.
//!
//! Run with: `cargo bench` in the core/ directory.
//!
//! Benchmark groups:
//! 1. execution: the same loop run through the tree interpreter, unoptimized
//!    bytecode and optimized bytecode
//! 2. compile: reduce + RemoveUnused + codegen + optimize for one body

use std::rc::Rc;

use bumpalo::Bump;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use zam_core::{
    api::{CompilationOptions, FuncDecl, compile_function},
    ast::{BinaryOp, Stmt, Tree, declare_func, new_local},
    diagnostics::Reporter,
    interp::{Interpreter, Runtime},
    types,
    values::{Builtins, EventLog, ScriptFunc, Val},
};

/// total = 0; i = 0; while (i < n) { total += i * 2; ++i; } return total;
fn sum_loop<'a>(t: Tree<'a>) -> (Rc<ScriptFunc>, &'a Stmt<'a>) {
    let f = declare_func("sum", &[("n", types::count())], types::count());
    let n = &f.params[0];
    let total = new_local(&f, "total", types::count());
    let i = new_local(&f, "i", types::count());
    let body = t.block(&[
        t.assign_stmt(t.name(&total), t.count(0)),
        t.assign_stmt(t.name(&i), t.count(0)),
        t.while_loop(
            t.binary(BinaryOp::Lt, t.name(&i), t.name(n)),
            t.block(&[
                t.expr_stmt(t.add_to(
                    t.name(&total),
                    t.binary(BinaryOp::Times, t.name(&i), t.count(2)),
                )),
                t.expr_stmt(t.incr(t.name(&i))),
            ]),
        ),
        t.return_stmt(Some(t.name(&total))),
    ]);
    (f, body)
}

fn bench_execution(c: &mut Criterion) {
    let mut group = c.benchmark_group("execution");
    let builtins = Builtins::new();
    let events = EventLog::new();

    for size in [100u64, 1000, 10000] {
        group.throughput(Throughput::Elements(size));

        for (label, optimize) in [("bytecode", true), ("bytecode_unoptimized", false)] {
            let arena = Bump::new();
            let reporter = Reporter::new();
            let t = Tree::new(&arena, &reporter);
            let (f, body) = sum_loop(t);
            let interp = Interpreter::new();
            let options = CompilationOptions {
                optimize,
                ..CompilationOptions::default()
            };
            compile_function(t, &builtins, &interp, FuncDecl::new(&f, body), &options)
                .expect("compile failed");
            let rt = Runtime::new(&builtins, &events).with_trees(&interp);

            group.bench_with_input(BenchmarkId::new(label, size), &size, |b, &size| {
                b.iter(|| black_box(rt.invoke(&f, vec![Val::Count(black_box(size))]).unwrap()))
            });
        }

        let arena = Bump::new();
        let reporter = Reporter::new();
        let t = Tree::new(&arena, &reporter);
        let (f, body) = sum_loop(t);
        let interp = Interpreter::new();
        interp.attach(&f, body);
        let rt = Runtime::new(&builtins, &events).with_trees(&interp);
        group.bench_with_input(BenchmarkId::new("interpreted", size), &size, |b, &size| {
            b.iter(|| black_box(rt.invoke(&f, vec![Val::Count(black_box(size))]).unwrap()))
        });
    }

    group.finish();
}

fn bench_compile(c: &mut Criterion) {
    let builtins = Builtins::new();
    c.bench_function("compile_sum_loop", |b| {
        b.iter(|| {
            let arena = Bump::new();
            let reporter = Reporter::new();
            let t = Tree::new(&arena, &reporter);
            let (f, body) = sum_loop(t);
            let interp = Interpreter::new();
            let compiled = compile_function(
                t,
                &builtins,
                &interp,
                FuncDecl::new(&f, body),
                &CompilationOptions::default(),
            )
            .expect("compile failed");
            black_box(compiled.stats)
        })
    });
}

criterion_group!(benches, bench_execution, bench_compile);
criterion_main!(benches);
