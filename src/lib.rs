//! ZAM - an optimizing compiler and bytecode engine for script function bodies
//!
//! # Overview
//!
//! ZAM takes type-checked script function bodies, rewrites them into a
//! reduced form, removes assignments nobody reads, lowers them to a
//! register-style bytecode and runs that bytecode. Bodies the code
//! generator cannot express keep running through the tree interpreter.
//!
//! # Quick Start
//!
//! ```
//! use bumpalo::Bump;
//! use zam::{Engine, EngineOptions, FuncDecl};
//! use zam::ast::{BinaryOp, Tree, declare_func, new_local};
//! use zam::diagnostics::Reporter;
//! use zam::types;
//! use zam::values::{EventLog, Val};
//!
//! let arena = Bump::new();
//! let reporter = Reporter::new();
//! let t = Tree::new(&arena, &reporter);
//!
//! // function double_plus_one(a: count): count
//! let f = declare_func("double_plus_one", &[("a", types::count())], types::count());
//! let a = &f.params[0];
//! let x = new_local(&f, "x", types::count());
//! let body = t.block(&[
//!     t.assign_stmt(t.name(&x), t.binary(BinaryOp::Times, t.name(a), t.count(2))),
//!     t.return_stmt(Some(t.binary(BinaryOp::Add, t.name(&x), t.count(1)))),
//! ]);
//!
//! let engine = Engine::new(EngineOptions::default(), |_| {});
//! engine.compile(t, FuncDecl::new(&f, body)).unwrap();
//!
//! let events = EventLog::new();
//! assert_eq!(engine.run(&f, vec![Val::Count(20)], &events).unwrap(), Val::Count(41));
//! ```
//!
//! # Built-ins
//!
//! Register host functions through the `Engine::new` closure. Mark them
//! `pure` when calls may be dropped if unused, and `foldable` when calls
//! with constant arguments may be evaluated at compile time:
//!
//! ```
//! use zam::{Engine, EngineOptions};
//! use zam::types;
//! use zam::values::{BuiltinFunc, Val};
//!
//! let engine = Engine::new(EngineOptions::default(), |b| {
//!     b.register(
//!         BuiltinFunc::new("answer", types::function(vec![], types::count()), |_| {
//!             Ok(Val::Count(42))
//!         })
//!         .foldable(),
//!     );
//! });
//! assert!(engine.builtins().id("answer").is_some());
//! ```

mod error_renderer;

pub use error_renderer::{
    render_error, render_error_to, render_error_to_string, render_error_to_string_no_color,
};

// Re-export public API from zam_core
pub use zam_core::api::{
    CompilationOptions, CompiledFunc, Diagnostic, Engine, EngineOptions, Error, ExecutionOptions,
    FuncDecl, RelatedInfo, Severity, Span, compile_function,
};

pub use zam_core::{
    ast, codegen, diagnostics, interp, optimizer, reduce, stdlib, types, usedefs, values, vm,
};
