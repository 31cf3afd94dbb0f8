//! Callable values and the narrow interfaces to the built-in registry and
//! the event subsystem.

use core::cell::{Cell, Ref, RefCell};
use core::fmt;

use hashbrown::HashMap;

use crate::ast::{Id, IdPtr, Scope};
use crate::interp::RuntimeError;
use crate::types::TypeRef;
use crate::values::Val;
use crate::vm::ZBody;
use crate::{Box, Rc, String, Vec};

/// One body of a script function.
#[derive(Debug, Clone)]
pub enum Body {
    /// Runs through the tree interpreter, which owns the tree for it.
    Interpreted,
    Compiled(Rc<ZBody>),
}

impl Body {
    pub fn is_compiled(&self) -> bool {
        matches!(self, Body::Compiled(_))
    }
}

/// A function, event handler or hook written in script.
///
/// Event handlers and hooks may have several bodies; calling one runs
/// them all in order. Plain functions have exactly one.
#[derive(Debug)]
pub struct ScriptFunc {
    pub name: String,
    pub ty: TypeRef,
    pub params: Vec<IdPtr>,
    frame_size: Cell<usize>,
    bodies: RefCell<Vec<Body>>,
}

impl ScriptFunc {
    pub fn new(name: &str, ty: TypeRef, params: Vec<IdPtr>) -> Self {
        let frame_size = params.len();
        ScriptFunc {
            name: String::from(name),
            ty,
            params,
            frame_size: Cell::new(frame_size),
            bodies: RefCell::new(Vec::new()),
        }
    }

    /// Frame size for interpreted execution: one slot per local.
    pub fn frame_size(&self) -> usize {
        self.frame_size.get()
    }

    /// Reserve the next interpreter slot, returning its offset.
    pub fn grow_frame(&self) -> usize {
        let offset = self.frame_size.get();
        self.frame_size.set(offset + 1);
        offset
    }

    pub fn bodies(&self) -> Ref<'_, Vec<Body>> {
        self.bodies.borrow()
    }

    pub fn add_body(&self, body: Body) -> usize {
        let mut bodies = self.bodies.borrow_mut();
        bodies.push(body);
        bodies.len() - 1
    }

    /// Swap in a compiled version of body `index`.
    pub fn replace_body(&self, index: usize, body: Body) {
        self.bodies.borrow_mut()[index] = body;
    }
}

pub type BuiltinFn = Box<dyn Fn(&[Val]) -> Result<Val, RuntimeError>>;

pub struct BuiltinFunc {
    pub name: String,
    pub ty: TypeRef,
    /// No externally visible effect: calls may be dropped if unused.
    pub pure: bool,
    /// Pure and deterministic: calls with constant arguments fold.
    pub foldable: bool,
    imp: BuiltinFn,
}

impl BuiltinFunc {
    pub fn new(
        name: &str,
        ty: TypeRef,
        imp: impl Fn(&[Val]) -> Result<Val, RuntimeError> + 'static,
    ) -> Self {
        BuiltinFunc {
            name: String::from(name),
            ty,
            pure: false,
            foldable: false,
            imp: Box::new(imp),
        }
    }

    pub fn pure(mut self) -> Self {
        self.pure = true;
        self
    }

    pub fn foldable(mut self) -> Self {
        self.pure = true;
        self.foldable = true;
        self
    }

    pub fn call(&self, args: &[Val]) -> Result<Val, RuntimeError> {
        (self.imp)(args)
    }
}

impl fmt::Debug for BuiltinFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltinFunc")
            .field("name", &self.name)
            .field("pure", &self.pure)
            .field("foldable", &self.foldable)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub enum Func {
    Script(Rc<ScriptFunc>),
    Builtin(Rc<BuiltinFunc>),
}

impl Func {
    pub fn name(&self) -> &str {
        match self {
            Func::Script(f) => &f.name,
            Func::Builtin(b) => &b.name,
        }
    }
}

/// Lookup of built-in functions by name.
///
/// The reducer consults it to decide whether a call can be dropped or
/// folded; execution calls the function held in the callee's value.
pub trait BuiltinRegistry {
    fn lookup(&self, name: &str) -> Option<Rc<BuiltinFunc>>;
}

/// A plain name-keyed registry.
#[derive(Debug, Default)]
pub struct Builtins {
    funcs: HashMap<String, Rc<BuiltinFunc>>,
}

impl Builtins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, func: BuiltinFunc) -> Rc<BuiltinFunc> {
        let func = Rc::new(func);
        self.funcs.insert(func.name.clone(), func.clone());
        func
    }

    /// A constant identifier bound to built-in `name`, for use as a callee.
    pub fn id(&self, name: &str) -> Option<IdPtr> {
        let func = self.funcs.get(name)?;
        let id = Id::new(name, Scope::Const, func.ty.clone());
        id.set_value(Val::Func(Rc::new(Func::Builtin(func.clone()))));
        Some(IdPtr::new(id))
    }

    pub fn len(&self) -> usize {
        self.funcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.funcs.is_empty()
    }
}

impl BuiltinRegistry for Builtins {
    fn lookup(&self, name: &str) -> Option<Rc<BuiltinFunc>> {
        self.funcs.get(name).cloned()
    }
}

/// Where `event` statements and `schedule` expressions deliver their work.
pub trait EventSink {
    fn enqueue(&self, event: &str, args: Vec<Val>);

    /// Arrange for `event` to fire after `delay` seconds; returns a timer id.
    fn schedule(&self, delay: f64, event: &str, args: Vec<Val>) -> u64;

    /// Output of a `print` statement.
    fn print(&self, line: &str) {
        tracing::info!(target: "zam::print", "{}", line);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueuedEvent {
    pub name: String,
    pub args: Vec<Val>,
    /// Delay for scheduled events, `None` for immediate ones.
    pub delay: Option<f64>,
}

/// Sink that just remembers what was sent, in order.
#[derive(Debug, Default)]
pub struct EventLog {
    events: RefCell<Vec<QueuedEvent>>,
    printed: RefCell<Vec<String>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<QueuedEvent> {
        self.events.borrow().clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.events.borrow().iter().map(|e| e.name.clone()).collect()
    }

    pub fn printed(&self) -> Vec<String> {
        self.printed.borrow().clone()
    }
}

impl EventSink for EventLog {
    fn enqueue(&self, event: &str, args: Vec<Val>) {
        self.events.borrow_mut().push(QueuedEvent {
            name: String::from(event),
            args,
            delay: None,
        });
    }

    fn schedule(&self, delay: f64, event: &str, args: Vec<Val>) -> u64 {
        let mut events = self.events.borrow_mut();
        events.push(QueuedEvent {
            name: String::from(event),
            args,
            delay: Some(delay),
        });
        events.len() as u64
    }

    fn print(&self, line: &str) {
        self.printed.borrow_mut().push(String::from(line));
    }
}
