//! Rewriting trees into reduced form.
//!
//! A reduced expression is a singleton (a bare name or a constant) or a
//! single operator applied to singletons. Reduction gets there by
//! introducing temporaries: every nested computation is hoisted into a
//! companion statement that assigns a fresh `#N` temporary, and the
//! companions of a statement run, in evaluation order, just before it.
//!
//! Along the way constants fold, algebraic identities simplify, short
//! circuits become explicit `if`s and assignments to indices, fields and
//! destructuring lists become dedicated assignment kinds. The result is
//! what code generation lowers one instruction per node.

mod expr;
mod simplify;
mod stmt;

#[cfg(test)]
mod reduce_test;

use core::cell::{Cell, RefCell};

use hashbrown::{HashMap, HashSet};
use tracing::debug;

use crate::api::CompilationOptions;
use crate::ast::{Expr, ExprKind, Id, IdPtr, Scope, Stmt, StmtKey, StmtKind, Tree};
use crate::values::{BuiltinFunc, BuiltinRegistry, Func, ScriptFunc, Val};
use crate::{Rc, Vec, format};

pub use simplify::Simplification;

/// Statements that must run before the expression they were split from.
pub type Pre<'a> = Vec<&'a Stmt<'a>>;

/// Reduction state for one function body.
///
/// Temporaries are numbered across the whole compilation, so rounds of
/// `RemoveUnused` never reuse a name for a different temporary.
pub struct Reducer<'a, 'r> {
    pub t: Tree<'a>,
    pub builtins: &'r dyn BuiltinRegistry,
    func: &'r ScriptFunc,
    fold_builtins: bool,
    next_temp: Cell<usize>,
    /// Expression statements dropped by the next reduction.
    omitted: RefCell<HashSet<StmtKey>>,
    /// Replacement identifier lists for `init` statements.
    init_trims: RefCell<HashMap<StmtKey, Vec<IdPtr>>>,
}

impl<'a, 'r> Reducer<'a, 'r> {
    pub fn new(
        t: Tree<'a>,
        builtins: &'r dyn BuiltinRegistry,
        func: &'r ScriptFunc,
        options: &CompilationOptions,
    ) -> Self {
        Reducer {
            t,
            builtins,
            func,
            fold_builtins: options.fold_builtins,
            next_temp: Cell::new(0),
            omitted: RefCell::new(HashSet::new()),
            init_trims: RefCell::new(HashMap::new()),
        }
    }

    /// Reduce a whole body.
    pub fn reduce_body(&self, body: &'a Stmt<'a>) -> &'a Stmt<'a> {
        let before = self.next_temp.get();
        let reduced = self.reduce_stmt(body);
        debug!(
            func = %self.func.name,
            temps = self.next_temp.get() - before,
            "reduced body"
        );
        reduced
    }

    /// Have the next reduction drop the expression statement `key`.
    pub fn omit(&self, key: StmtKey) {
        self.omitted.borrow_mut().insert(key);
    }

    /// Have the next reduction replace the identifiers of `init`
    /// statement `key`.
    pub fn trim_init(&self, key: StmtKey, ids: Vec<IdPtr>) {
        self.init_trims.borrow_mut().insert(key, ids);
    }

    pub fn temps_created(&self) -> usize {
        self.next_temp.get()
    }

    // ------------------------------------------------------------------
    // Building blocks
    // ------------------------------------------------------------------

    pub(crate) fn new_temp(&self, ty: crate::types::TypeRef) -> IdPtr {
        let n = self.next_temp.get();
        self.next_temp.set(n + 1);
        let id = Id::new(&format!("#{}", n), Scope::Temp, ty);
        id.set_offset(self.func.grow_frame());
        IdPtr::new(id)
    }

    pub(crate) fn name_of(&self, from: &'a Expr<'a>, id: &IdPtr) -> &'a Expr<'a> {
        self.t.derived(from, ExprKind::Name(id.clone()), id.ty.clone())
    }

    pub(crate) fn constant(&self, from: &'a Expr<'a>, val: Val, ty: crate::types::TypeRef) -> &'a Expr<'a> {
        self.t.derived(from, ExprKind::Const(val), ty)
    }

    /// `id = rhs` as an expression, located at `from`.
    pub(crate) fn assign_to(&self, from: &'a Expr<'a>, id: &IdPtr, rhs: &'a Expr<'a>) -> &'a Expr<'a> {
        let target = self.name_of(from, id);
        let lhs = self.t.derived(from, ExprKind::Ref(target), id.ty.clone());
        self.t.derived(
            from,
            ExprKind::Assign {
                lhs,
                rhs,
                is_temp: id.is_temp(),
            },
            id.ty.clone(),
        )
    }

    pub(crate) fn expr_stmt(&self, e: &'a Expr<'a>) -> &'a Stmt<'a> {
        self.t.with_span(e.span).alloc_stmt(StmtKind::Expr(e))
    }

    /// A fresh temporary holding `value`, assigned by a companion.
    pub(crate) fn temp_for(&self, value: &'a Expr<'a>, pre: &mut Pre<'a>) -> &'a Expr<'a> {
        let id = self.new_temp(value.ty.clone());
        pre.push(self.expr_stmt(self.assign_to(value, &id, value)));
        self.name_of(value, &id)
    }

    /// `pre` followed by `main`, as one statement.
    pub(crate) fn with_pre(
        &self,
        from: &'a Stmt<'a>,
        mut pre: Pre<'a>,
        main: Option<&'a Stmt<'a>>,
    ) -> &'a Stmt<'a> {
        if pre.is_empty() {
            return main.unwrap_or_else(|| self.t.derived_stmt(from, StmtKind::Null));
        }
        pre.extend(main);
        self.t.derived_stmt(from, StmtKind::List(self.t.slice(&pre)))
    }

    // ------------------------------------------------------------------
    // Purity
    // ------------------------------------------------------------------

    /// The built-in a callee expression refers to, if any. Calls of
    /// script functions never resolve here and count as impure.
    pub(crate) fn callee_builtin(&self, callee: &Expr<'_>) -> Option<Rc<BuiltinFunc>> {
        let val = match &callee.kind {
            ExprKind::Name(id) if id.scope == Scope::Const => id.value()?,
            ExprKind::Const(v) => v.clone(),
            _ => return None,
        };
        match val {
            Val::Func(f) => match &*f {
                Func::Builtin(b) => self.builtins.lookup(&b.name),
                Func::Script(_) => None,
            },
            _ => None,
        }
    }

    pub fn is_pure_call(&self, callee: &Expr<'_>) -> bool {
        self.callee_builtin(callee).is_some_and(|b| b.pure)
    }

    /// Whether evaluating `e` can change state visible outside it:
    /// assignments, impure calls, events and schedules.
    pub fn has_side_effects(&self, e: &Expr<'_>) -> bool {
        let own = match &e.kind {
            ExprKind::Call { func, .. } => !self.is_pure_call(func),
            ExprKind::Event { .. } | ExprKind::Schedule { .. } => true,
            ExprKind::Assign { .. } | ExprKind::IndexAssign { .. } | ExprKind::FieldLhsAssign { .. } => {
                true
            }
            ExprKind::Unary { op, .. } => op.is_assigning(),
            ExprKind::Binary { op, .. } => op.is_assigning(),
            _ => false,
        };
        own || e.children().iter().any(|c| self.has_side_effects(c))
    }

    // ------------------------------------------------------------------
    // Reduced-form predicates
    // ------------------------------------------------------------------

    /// Every direct operand of `e` is a singleton, looking through index
    /// lists, references and field initializers.
    pub fn has_reduced_ops(&self, e: &Expr<'_>) -> bool {
        e.children().iter().all(|c| operand_reduced(c))
    }

    /// Whether reducing `e` again would change nothing.
    pub fn is_reduced(&self, e: &Expr<'_>) -> bool {
        if e.is_error() {
            return true;
        }
        match &e.kind {
            ExprKind::Name(id) => id.folded_constant().is_none(),
            ExprKind::Const(_) | ExprKind::Nop | ExprKind::Lambda(_) => true,
            ExprKind::Unary { op, operand } => {
                !op.is_assigning()
                    && operand.is_singleton()
                    && !(operand.is_const() && simplify::folds_unary(*op, &e.ty))
            }
            ExprKind::Binary { op, lhs, rhs } => {
                if op.is_assigning() {
                    return matches!(lhs.kind, ExprKind::Ref(t) if t.is_name()) && rhs.is_singleton();
                }
                lhs.is_singleton()
                    && rhs.is_singleton()
                    && simplify::will_transform(*op, lhs, rhs, &e.ty).is_none()
                    && !(lhs.is_const() && rhs.is_const())
            }
            ExprKind::Cond {
                cond,
                then_expr,
                else_expr,
            } => {
                self.has_reduced_ops(e) && !cond.is_const() && !then_expr.same_as(else_expr)
            }
            ExprKind::Assign { lhs, rhs, .. } => match &lhs.kind {
                ExprKind::Ref(target) if target.is_name() => {
                    self.is_reduced(rhs)
                        && !is_assignment(rhs)
                        && target.ty.is_any() == rhs.ty.is_any()
                }
                _ => false,
            },
            ExprKind::FieldLhsAssign { record, value, .. } => {
                record.is_singleton() && (value.is_singleton() || field_assignable(value))
            }
            ExprKind::Call { func, args } => {
                self.has_reduced_ops(e)
                    && !(self.fold_builtins
                        && args.iter().all(|a| a.is_const())
                        && self.callee_builtin(func).is_some_and(|b| b.foldable))
            }
            _ => self.has_reduced_ops(e),
        }
    }
}

/// Assignment forms whose value is their target rather than a computed
/// result.
pub(crate) fn is_assignment(e: &Expr<'_>) -> bool {
    match &e.kind {
        ExprKind::Assign { .. } | ExprKind::IndexAssign { .. } | ExprKind::FieldLhsAssign { .. } => {
            true
        }
        ExprKind::Binary { op, .. } => op.is_assigning(),
        _ => false,
    }
}

/// Right-hand sides a `FieldLhsAssign` may keep inline.
pub(crate) fn field_assignable(e: &Expr<'_>) -> bool {
    let inline = match &e.kind {
        ExprKind::Unary { op, .. } => !op.is_assigning() && *op != crate::ast::UnaryOp::Clone,
        ExprKind::Binary { op, .. } => !op.is_assigning() && !op.is_short_circuit(),
        ExprKind::Field { .. } | ExprKind::HasField { .. } => true,
        _ => false,
    };
    inline && e.children().iter().all(|c| c.is_singleton())
}

fn operand_reduced(c: &Expr<'_>) -> bool {
    match &c.kind {
        ExprKind::Name(_) | ExprKind::Const(_) => true,
        ExprKind::List(elems) => elems.iter().all(|e| e.is_singleton()),
        ExprKind::Ref(target) => match &target.kind {
            ExprKind::Name(_) => true,
            _ => target.children().iter().all(|t| operand_reduced(t)),
        },
        ExprKind::FieldAssign { value, .. } => value.is_singleton(),
        ExprKind::Event { args, .. } => args.iter().all(|a| a.is_singleton()),
        _ => false,
    }
}
