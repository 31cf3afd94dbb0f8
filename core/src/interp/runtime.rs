//! Per-call execution context shared by interpreted and compiled bodies.

use core::cell::{Cell, RefCell};

use tracing::debug;

use crate::api::{ExecutionOptions, Span};
use crate::diagnostics::Context;
use crate::interp::{ExecError, RuntimeError};
use crate::values::{Body, BuiltinRegistry, EventSink, Func, ScriptFunc, Val};
use crate::{Rc, String, Vec, format};

/// Access to bodies that still run as trees.
///
/// The interpreter owns the arena the trees live in; runtime values only
/// know a body is interpreted. Calls from compiled code into such a body
/// route through here.
pub trait TreeBodies {
    fn call_tree(
        &self,
        func: &Rc<ScriptFunc>,
        body: usize,
        args: Vec<Val>,
        rt: &Runtime<'_>,
    ) -> Result<Val, RuntimeError>;
}

/// Collaborators and bookkeeping for one top-level invocation.
pub struct Runtime<'r> {
    pub builtins: &'r dyn BuiltinRegistry,
    pub events: &'r dyn EventSink,
    trees: Option<&'r dyn TreeBodies>,
    pub options: ExecutionOptions,
    depth: Cell<usize>,
    call_stack: RefCell<Vec<Context>>,
    /// Call stack captured where the first error surfaced.
    error_stack: RefCell<Option<Vec<Context>>>,
}

impl<'r> Runtime<'r> {
    pub fn new(builtins: &'r dyn BuiltinRegistry, events: &'r dyn EventSink) -> Self {
        Runtime {
            builtins,
            events,
            trees: None,
            options: ExecutionOptions::default(),
            depth: Cell::new(0),
            call_stack: RefCell::new(Vec::new()),
            error_stack: RefCell::new(None),
        }
    }

    pub fn with_trees(mut self, trees: &'r dyn TreeBodies) -> Self {
        self.trees = Some(trees);
        self
    }

    pub fn with_options(mut self, options: ExecutionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn depth(&self) -> usize {
        self.depth.get()
    }

    /// Innermost call first.
    pub fn call_stack(&self) -> Vec<Context> {
        self.call_stack.borrow().iter().rev().cloned().collect()
    }

    /// Run `func` as the outermost call, attaching the call stack to any
    /// error.
    pub fn invoke(&self, func: &Rc<ScriptFunc>, args: Vec<Val>) -> Result<Val, ExecError> {
        self.error_stack.replace(None);
        self.call_script(func, args, Span::default())
            .map_err(|error| ExecError {
                error,
                call_stack: self.error_stack.take().unwrap_or_default(),
            })
    }

    pub fn call(&self, func: &Func, args: Vec<Val>, span: Span) -> Result<Val, RuntimeError> {
        match func {
            Func::Builtin(b) => b.call(&args).map_err(|e| e.at(span)),
            Func::Script(f) => self.call_script(f, args, span),
        }
    }

    /// Run every body of `func`. Functions have one; event handlers and
    /// hooks run all of theirs, and yield nothing.
    pub fn call_script(
        &self,
        func: &Rc<ScriptFunc>,
        args: Vec<Val>,
        span: Span,
    ) -> Result<Val, RuntimeError> {
        let depth = self.depth.get() + 1;
        if depth > self.options.max_depth {
            return Err(RuntimeError::CallDepthExceeded {
                depth,
                max_depth: self.options.max_depth,
                span: Some(span),
            });
        }
        self.depth.set(depth);
        self.call_stack.borrow_mut().push(Context::CalledFrom {
            func: func.name.clone(),
            span,
        });
        debug!(func = %func.name, depth, "call");

        let result = self.run_bodies(func, args);

        if result.is_err() && self.error_stack.borrow().is_none() {
            self.error_stack.replace(Some(self.call_stack()));
        }
        self.call_stack.borrow_mut().pop();
        self.depth.set(depth - 1);
        result
    }

    fn run_bodies(&self, func: &Rc<ScriptFunc>, args: Vec<Val>) -> Result<Val, RuntimeError> {
        // Snapshot so a body may replace itself while running.
        let bodies: Vec<Body> = func.bodies().clone();
        let mut result = Val::Void;
        for (index, body) in bodies.iter().enumerate() {
            let args = args.clone();
            result = match body {
                Body::Compiled(zbody) => zbody.exec(args, self)?,
                Body::Interpreted => match self.trees {
                    Some(trees) => trees.call_tree(func, index, args, self)?,
                    None => {
                        return Err(RuntimeError::builtin(missing_body(&func.name)));
                    }
                },
            };
        }
        Ok(result)
    }
}

fn missing_body(name: &str) -> String {
    format!("no interpreter available for body of '{}'", name)
}
