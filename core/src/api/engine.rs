//! The compilation pipeline and the engine that owns its inputs.

use tracing::debug;

use super::{CompilationOptions, Diagnostic, EngineOptions, Error, ExecutionOptions};
use crate::ast::{Stmt, Tree};
use crate::codegen::generate;
use crate::interp::{Interpreter, Runtime};
use crate::optimizer::{OptimizeStats, compact, optimize};
use crate::reduce::Reducer;
use crate::usedefs::remove_unused;
use crate::values::{Body, Builtins, EventSink, ScriptFunc, Val};
use crate::{Rc, Vec};

/// A script function paired with the type-checked tree of one of its bodies.
#[derive(Clone)]
pub struct FuncDecl<'a> {
    pub func: Rc<ScriptFunc>,
    pub body: &'a Stmt<'a>,
}

impl<'a> FuncDecl<'a> {
    pub fn new(func: &Rc<ScriptFunc>, body: &'a Stmt<'a>) -> Self {
        FuncDecl {
            func: func.clone(),
            body,
        }
    }
}

/// What [`compile_function`] produced for one body.
#[derive(Debug)]
pub struct CompiledFunc<'a> {
    pub func: Rc<ScriptFunc>,
    /// Index of the new body in `func.bodies()`.
    pub body_index: usize,
    /// The tree after reduction (and `RemoveUnused`, if enabled).
    pub reduced: &'a Stmt<'a>,
    /// Present when the optimizer ran.
    pub stats: Option<OptimizeStats>,
    /// Warnings from reduction, plus a note when the body fell back to
    /// the interpreter.
    pub warnings: Vec<Diagnostic>,
}

impl CompiledFunc<'_> {
    /// Whether the body runs as bytecode.
    pub fn is_compiled(&self) -> bool {
        self.func.bodies()[self.body_index].is_compiled()
    }
}

/// Reduce `decl`, then lower it to bytecode and attach it to the function.
///
/// The reduced tree is always registered with `interpreter`. If the code
/// generator cannot express the body, the function keeps running it
/// through the interpreter and a warning says why. Semantic errors found
/// during reduction abort with [`Error::Compilation`].
pub fn compile_function<'a>(
    t: Tree<'a>,
    builtins: &Builtins,
    interpreter: &Interpreter<'a>,
    decl: FuncDecl<'a>,
    options: &CompilationOptions,
) -> Result<CompiledFunc<'a>, Error> {
    let FuncDecl { func, body } = decl;
    let reducer = Reducer::new(t, builtins, &func, options);
    let mut reduced = reducer.reduce_body(body);
    if options.remove_unused {
        reduced = remove_unused(&reducer, reduced, options);
    }
    if t.reporter.has_errors() {
        return Err(Error::Compilation {
            diagnostics: t.reporter.take(),
        });
    }
    let mut warnings = t.reporter.take();

    let body_index = interpreter.attach(&func, reduced);
    let mut stats = None;
    match generate(&func, reduced) {
        Ok(mut code) => {
            if options.optimize {
                stats = Some(optimize(&mut code));
            }
            let zbody = compact(code);
            debug!(
                func = %func.name,
                insts = zbody.len(),
                frame_size = zbody.frame_size,
                "compiled"
            );
            func.replace_body(body_index, Body::Compiled(Rc::new(zbody)));
        }
        Err(e) => {
            debug!(func = %func.name, reason = %e, "left to the interpreter");
            warnings.push(e.to_diagnostic());
        }
    }

    Ok(CompiledFunc {
        func,
        body_index,
        reduced,
        stats,
        warnings,
    })
}

/// Compiles function bodies and runs them.
///
/// The engine owns the built-in registry and keeps the reduced trees of
/// every body it compiled, so bodies that could not be lowered to
/// bytecode still run.
///
/// # Example
///
/// ```
/// use bumpalo::Bump;
/// use zam_core::api::{Engine, EngineOptions, FuncDecl};
/// use zam_core::ast::{BinaryOp, Tree, declare_func};
/// use zam_core::diagnostics::Reporter;
/// use zam_core::types;
/// use zam_core::values::{EventLog, Val};
///
/// let arena = Bump::new();
/// let reporter = Reporter::new();
/// let t = Tree::new(&arena, &reporter);
/// let f = declare_func("inc", &[("a", types::count())], types::count());
/// let body = t.return_stmt(Some(t.binary(BinaryOp::Add, t.name(&f.params[0]), t.count(1))));
///
/// let engine = Engine::new(EngineOptions::default(), |_| {});
/// let compiled = engine.compile(t, FuncDecl::new(&f, body)).unwrap();
/// assert!(compiled.is_compiled());
///
/// let events = EventLog::new();
/// assert_eq!(engine.run(&f, vec![Val::Count(41)], &events).unwrap(), Val::Count(42));
/// ```
pub struct Engine<'a> {
    options: EngineOptions,
    builtins: Builtins,
    interpreter: Interpreter<'a>,
}

impl<'a> Engine<'a> {
    /// Create an engine; `init` registers the built-in functions.
    pub fn new(options: EngineOptions, init: impl FnOnce(&mut Builtins)) -> Self {
        let mut builtins = Builtins::new();
        init(&mut builtins);
        Engine {
            options,
            builtins,
            interpreter: Interpreter::new(),
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn builtins(&self) -> &Builtins {
        &self.builtins
    }

    pub fn interpreter(&self) -> &Interpreter<'a> {
        &self.interpreter
    }

    /// Compile with the engine's default compilation options.
    pub fn compile(&self, t: Tree<'a>, decl: FuncDecl<'a>) -> Result<CompiledFunc<'a>, Error> {
        self.compile_with_options(t, decl, &self.options.default_compilation_options)
    }

    pub fn compile_with_options(
        &self,
        t: Tree<'a>,
        decl: FuncDecl<'a>,
        options: &CompilationOptions,
    ) -> Result<CompiledFunc<'a>, Error> {
        compile_function(t, &self.builtins, &self.interpreter, decl, options)
    }

    /// Call `func` with the engine's default execution options.
    pub fn run(&self, func: &Rc<ScriptFunc>, args: Vec<Val>, events: &dyn EventSink) -> Result<Val, Error> {
        self.run_with_options(func, args, events, &self.options.default_execution_options)
    }

    pub fn run_with_options(
        &self,
        func: &Rc<ScriptFunc>,
        args: Vec<Val>,
        events: &dyn EventSink,
        options: &ExecutionOptions,
    ) -> Result<Val, Error> {
        let rt = Runtime::new(&self.builtins, events)
            .with_options(options.clone())
            .with_trees(&self.interpreter);
        Ok(rt.invoke(func, args)?)
    }
}
