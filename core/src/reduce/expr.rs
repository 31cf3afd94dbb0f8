//! Expression reduction.

use core::ptr;

use tracing::trace;

use crate::ast::{BinaryOp, Expr, ExprKind, IdPtr, StmtKind, UnaryOp};
use crate::interp::eval_const;
use crate::reduce::simplify::{self, Simplification};
use crate::reduce::{Pre, Reducer, field_assignable, is_assignment};
use crate::types::{self, Type, TypeRef};
use crate::values::{Val, ops};
use crate::Vec;

fn same<'a>(a: &'a Expr<'a>, b: &'a Expr<'a>) -> bool {
    ptr::eq(a, b)
}

impl<'a> Reducer<'a, '_> {
    /// Reduce `e`, appending the statements that must run first to `pre`.
    ///
    /// The result is a singleton or one operator over singletons. Nodes
    /// that are already reduced come back as the same node.
    pub fn reduce_expr(&self, e: &'a Expr<'a>, pre: &mut Pre<'a>) -> &'a Expr<'a> {
        if e.is_error() {
            return e;
        }
        let reduced = self.reduce_kind(e, pre);
        if !same(reduced, e) {
            trace!(from = %e, to = %reduced, "reduce");
        }
        reduced
    }

    /// Reduce `e` all the way to a name or constant.
    pub fn reduce_to_singleton(&self, e: &'a Expr<'a>, pre: &mut Pre<'a>) -> &'a Expr<'a> {
        if e.is_error() {
            return e;
        }
        let reduced = self.reduce_expr(e, pre);
        self.spill(reduced, pre)
    }

    /// Turn a reduced compound into a singleton by moving it into a
    /// companion statement.
    ///
    /// Assignments keep their own target as the value; anything else
    /// lands in a fresh temporary.
    pub(crate) fn spill(&self, r: &'a Expr<'a>, pre: &mut Pre<'a>) -> &'a Expr<'a> {
        if r.is_singleton() || r.is_error() {
            return r;
        }
        match &r.kind {
            ExprKind::Assign { lhs, .. } => {
                pre.push(self.expr_stmt(r));
                lhs.target()
            }
            ExprKind::Binary { op, lhs, .. } if op.is_assigning() => {
                pre.push(self.expr_stmt(r));
                lhs.target()
            }
            ExprKind::IndexAssign { value, .. } if value.is_singleton() => {
                pre.push(self.expr_stmt(r));
                *value
            }
            ExprKind::FieldLhsAssign {
                record,
                field,
                value,
            } => {
                let value = self.spill(value, pre);
                let assign = self.t.derived(
                    r,
                    ExprKind::FieldLhsAssign {
                        record: *record,
                        field: *field,
                        value,
                    },
                    r.ty.clone(),
                );
                pre.push(self.expr_stmt(assign));
                value
            }
            _ if r.ty.is_void() => {
                pre.push(self.expr_stmt(r));
                self.t.derived(r, ExprKind::Nop, types::void())
            }
            _ => self.temp_for(r, pre),
        }
    }

    fn reduce_kind(&self, e: &'a Expr<'a>, pre: &mut Pre<'a>) -> &'a Expr<'a> {
        match &e.kind {
            ExprKind::Name(id) => match id.folded_constant() {
                Some(v) => self.constant(e, v, e.ty.clone()),
                None => e,
            },
            ExprKind::Const(_) | ExprKind::Nop | ExprKind::Lambda(_) => e,
            ExprKind::Unary { op, operand } => self.reduce_unary(e, *op, operand, pre),
            ExprKind::Binary { op, lhs, rhs } => self.reduce_binary(e, *op, lhs, rhs, pre),
            ExprKind::Cond {
                cond,
                then_expr,
                else_expr,
            } => self.reduce_cond(e, cond, then_expr, else_expr, pre),
            ExprKind::Ref(target) => {
                let loc = self.reduce_location(target, pre);
                self.rebuilt(e, !same(loc, target), || ExprKind::Ref(loc))
            }
            ExprKind::Assign { lhs, rhs, is_temp } => self.reduce_assign(e, lhs, rhs, *is_temp, pre),
            ExprKind::IndexAssign { aggr, index, value } => {
                let a = self.reduce_to_singleton(aggr, pre);
                let i = self.reduce_index_list(index, pre);
                let v = self.reduce_to_singleton(value, pre);
                let changed = !same(a, aggr) || !same(i, index) || !same(v, value);
                self.rebuilt(e, changed, || ExprKind::IndexAssign {
                    aggr: a,
                    index: i,
                    value: v,
                })
            }
            ExprKind::FieldLhsAssign {
                record,
                field,
                value,
            } => {
                let r = self.reduce_to_singleton(record, pre);
                let v = self.reduce_field_rhs(value, pre);
                self.rebuilt(e, !same(r, record) || !same(v, value), || {
                    ExprKind::FieldLhsAssign {
                        record: r,
                        field: *field,
                        value: v,
                    }
                })
            }
            ExprKind::Index { aggr, index } => {
                let a = self.reduce_to_singleton(aggr, pre);
                let i = self.reduce_index_list(index, pre);
                self.rebuilt(e, !same(a, aggr) || !same(i, index), || ExprKind::Index {
                    aggr: a,
                    index: i,
                })
            }
            ExprKind::AnyIndex { operand, index } => {
                let o = self.reduce_to_singleton(operand, pre);
                self.rebuilt(e, !same(o, operand), || ExprKind::AnyIndex {
                    operand: o,
                    index: *index,
                })
            }
            ExprKind::Field { record, field } => {
                let r = self.reduce_to_singleton(record, pre);
                self.rebuilt(e, !same(r, record), || ExprKind::Field {
                    record: r,
                    field: *field,
                })
            }
            ExprKind::HasField { record, field } => {
                let r = self.reduce_to_singleton(record, pre);
                self.rebuilt(e, !same(r, record), || ExprKind::HasField {
                    record: r,
                    field: *field,
                })
            }
            ExprKind::RecordCtor(fields) => {
                let mut changed = false;
                let reduced: Vec<&'a Expr<'a>> = fields
                    .iter()
                    .map(|f| {
                        let r = self.reduce_expr(f, pre);
                        changed |= !same(r, f);
                        r
                    })
                    .collect();
                self.rebuilt(e, changed, || ExprKind::RecordCtor(self.t.slice(&reduced)))
            }
            ExprKind::FieldAssign { field, value } => {
                let v = self.reduce_to_singleton(value, pre);
                self.rebuilt(e, !same(v, value), || ExprKind::FieldAssign {
                    field: *field,
                    value: v,
                })
            }
            ExprKind::TableCtor(entries) => {
                let mut changed = false;
                let reduced: Vec<(&'a Expr<'a>, &'a Expr<'a>)> = entries
                    .iter()
                    .map(|(k, v)| {
                        let k2 = self.reduce_index_list(k, pre);
                        let v2 = self.reduce_to_singleton(v, pre);
                        changed |= !same(k2, k) || !same(v2, v);
                        (k2, v2)
                    })
                    .collect();
                self.rebuilt(e, changed, || ExprKind::TableCtor(self.t.slice(&reduced)))
            }
            ExprKind::SetCtor(elems) => {
                let (elems, changed) = self.reduce_all(elems, pre);
                self.rebuilt(e, changed, || ExprKind::SetCtor(elems))
            }
            ExprKind::VectorCtor(elems) => {
                let (elems, changed) = self.reduce_all(elems, pre);
                self.rebuilt(e, changed, || ExprKind::VectorCtor(elems))
            }
            ExprKind::List(elems) => {
                let (elems, changed) = self.reduce_all(elems, pre);
                self.rebuilt(e, changed, || ExprKind::List(elems))
            }
            ExprKind::Call { func, args } => self.reduce_call(e, func, args, pre),
            ExprKind::Event { handler, args } => {
                let (args, changed) = self.reduce_all(args, pre);
                self.rebuilt(e, changed, || ExprKind::Event {
                    handler: handler.clone(),
                    args,
                })
            }
            ExprKind::Schedule { delay, event } => {
                let d = self.reduce_to_singleton(delay, pre);
                let ev = self.reduce_expr(event, pre);
                self.rebuilt(e, !same(d, delay) || !same(ev, event), || ExprKind::Schedule {
                    delay: d,
                    event: ev,
                })
            }
            ExprKind::Cast(operand) => {
                let o = self.reduce_to_singleton(operand, pre);
                self.rebuilt(e, !same(o, operand), || ExprKind::Cast(o))
            }
            ExprKind::Is { operand, test_ty } => {
                let o = self.reduce_to_singleton(operand, pre);
                self.rebuilt(e, !same(o, operand), || ExprKind::Is {
                    operand: o,
                    test_ty: test_ty.clone(),
                })
            }
        }
    }

    /// `e` itself when nothing changed, otherwise a node derived from it.
    fn rebuilt(
        &self,
        e: &'a Expr<'a>,
        changed: bool,
        kind: impl FnOnce() -> ExprKind<'a>,
    ) -> &'a Expr<'a> {
        if changed {
            self.t.derived(e, kind(), e.ty.clone())
        } else {
            e
        }
    }

    fn reduce_all(
        &self,
        exprs: &'a [&'a Expr<'a>],
        pre: &mut Pre<'a>,
    ) -> (&'a [&'a Expr<'a>], bool) {
        let mut changed = false;
        let reduced: Vec<&'a Expr<'a>> = exprs
            .iter()
            .map(|x| {
                let r = self.reduce_to_singleton(x, pre);
                changed |= !same(r, x);
                r
            })
            .collect();
        if changed {
            (self.t.slice(&reduced), true)
        } else {
            (exprs, false)
        }
    }

    fn reduce_index_list(&self, index: &'a Expr<'a>, pre: &mut Pre<'a>) -> &'a Expr<'a> {
        match &index.kind {
            ExprKind::List(_) => self.reduce_expr(index, pre),
            _ => self.reduce_to_singleton(index, pre),
        }
    }

    /// Reduce the pieces of an assignable location, leaving the location
    /// itself in place.
    pub(crate) fn reduce_location(&self, target: &'a Expr<'a>, pre: &mut Pre<'a>) -> &'a Expr<'a> {
        match &target.kind {
            ExprKind::Name(_) => target,
            ExprKind::Index { .. } | ExprKind::Field { .. } => self.reduce_expr(target, pre),
            ExprKind::Ref(inner) => self.reduce_location(inner, pre),
            _ => internal_error!("assignment to {}", target.tag().describe()),
        }
    }

    // ------------------------------------------------------------------
    // Operators
    // ------------------------------------------------------------------

    fn reduce_unary(
        &self,
        e: &'a Expr<'a>,
        op: UnaryOp,
        operand: &'a Expr<'a>,
        pre: &mut Pre<'a>,
    ) -> &'a Expr<'a> {
        if op.is_assigning() {
            return self.reduce_incr(e, op, operand, pre);
        }
        if let Some(inner) = simplify::double_negation(op, operand, &e.ty) {
            return self.reduce_expr(inner, pre);
        }

        let o = self.reduce_to_singleton(operand, pre);
        if o.is_error() {
            return e;
        }
        if matches!(op, UnaryOp::ArithCoerce | UnaryOp::Pos) && types::same_type(&o.ty, &e.ty) {
            return o;
        }
        if let Some(v) = o.const_val() {
            if simplify::folds_unary(op, &e.ty) {
                if let Ok(folded) = ops::unary(op, v, &e.ty, Some(e.span)) {
                    return self.constant(e, folded, e.ty.clone());
                }
            }
        }
        self.rebuilt(e, !same(o, operand), || ExprKind::Unary { op, operand: o })
    }

    /// `++x` becomes `x = x + 1` over the reduced location.
    fn reduce_incr(
        &self,
        e: &'a Expr<'a>,
        op: UnaryOp,
        operand: &'a Expr<'a>,
        pre: &mut Pre<'a>,
    ) -> &'a Expr<'a> {
        let loc = self.reduce_location(operand, pre);
        let scalar = match &*loc.ty {
            Type::Vector(elem) => elem.clone(),
            _ => loc.ty.clone(),
        };
        let one = match *scalar {
            Type::Int => Val::Int(1),
            _ => Val::Count(1),
        };
        let arith_op = if op == UnaryOp::Incr {
            BinaryOp::Add
        } else {
            BinaryOp::Sub
        };
        let step = self.constant(e, one, scalar);
        let arith = self.t.derived(
            e,
            ExprKind::Binary {
                op: arith_op,
                lhs: self.t.duplicate(loc),
                rhs: step,
            },
            loc.ty.clone(),
        );
        self.assign_location(e, loc, arith, pre)
    }

    fn reduce_binary(
        &self,
        e: &'a Expr<'a>,
        op: BinaryOp,
        lhs: &'a Expr<'a>,
        rhs: &'a Expr<'a>,
        pre: &mut Pre<'a>,
    ) -> &'a Expr<'a> {
        if op.is_short_circuit() {
            return self.reduce_short_circuit(e, op, lhs, rhs, pre);
        }
        if op.is_assigning() {
            return self.reduce_compound(e, op, lhs, rhs, pre);
        }

        let l = self.reduce_to_singleton(lhs, pre);
        let r = self.reduce_to_singleton(rhs, pre);
        if l.is_error() || r.is_error() {
            return e;
        }
        if let Some(s) = simplify::will_transform(op, l, r, &e.ty) {
            return self.apply_simplification(e, op, s, l, r);
        }
        if let (Some(a), Some(b)) = (l.const_val(), r.const_val()) {
            // Errors such as division by zero are left for run time.
            if let Ok(folded) = ops::binary(op, a, b, &e.ty, Some(e.span)) {
                return self.constant(e, folded, e.ty.clone());
            }
        }
        self.rebuilt(e, !same(l, lhs) || !same(r, rhs), || ExprKind::Binary {
            op,
            lhs: l,
            rhs: r,
        })
    }

    fn apply_simplification(
        &self,
        e: &'a Expr<'a>,
        op: BinaryOp,
        s: Simplification,
        l: &'a Expr<'a>,
        r: &'a Expr<'a>,
    ) -> &'a Expr<'a> {
        match s {
            Simplification::Left => l,
            Simplification::Right => r,
            Simplification::Zero => match Val::zero_of(&e.ty) {
                Some(zero) => self.constant(e, zero, e.ty.clone()),
                None => internal_error!("no zero for {}", e.ty),
            },
            Simplification::Bool(b) => self.constant(e, Val::Bool(b), types::bool()),
            Simplification::Degenerate(b) => {
                self.t
                    .reporter
                    .warning(e.span, simplify::degenerate_message(op, b));
                self.constant(e, Val::Bool(b), types::bool())
            }
        }
    }

    /// `&&` and `||`. The right operand is reduced only once it is known
    /// to be needed, and its companions end up guarded by an `if`.
    fn reduce_short_circuit(
        &self,
        e: &'a Expr<'a>,
        op: BinaryOp,
        lhs: &'a Expr<'a>,
        rhs: &'a Expr<'a>,
        pre: &mut Pre<'a>,
    ) -> &'a Expr<'a> {
        let is_and = op == BinaryOp::AndAnd;
        let l = self.reduce_to_singleton(lhs, pre);

        // `true && r` is r, `false && r` is false; dually for `||`.
        if let Some(v) = l.const_val() {
            return if v.as_bool() == is_and {
                self.reduce_expr(rhs, pre)
            } else {
                self.constant(e, Val::Bool(!is_and), types::bool())
            };
        }
        // `l && true` is l, `l && false` is false once l has run.
        if let Some(v) = rhs.const_val() {
            return if v.as_bool() == is_and {
                l
            } else {
                self.constant(e, Val::Bool(!is_and), types::bool())
            };
        }

        let mut guarded = Pre::new();
        let r = self.reduce_expr(rhs, &mut guarded);
        if guarded.is_empty() && r.is_singleton() {
            if let Some(v) = r.const_val() {
                return if v.as_bool() == is_and {
                    l
                } else {
                    self.constant(e, Val::Bool(!is_and), types::bool())
                };
            }
            return self.rebuilt(e, !same(l, lhs) || !same(r, rhs), || ExprKind::Binary {
                op,
                lhs: l,
                rhs: r,
            });
        }

        let tmp = self.new_temp(types::bool());
        self.settle(e, &tmp, r, &mut guarded);
        let evaluate = self.t.with_span(e.span).alloc_stmt(StmtKind::List(self.t.slice(&guarded)));
        let settled = self.expr_stmt(self.assign_to(
            e,
            &tmp,
            self.constant(e, Val::Bool(!is_and), types::bool()),
        ));
        let (then_branch, else_branch) = if is_and {
            (evaluate, settled)
        } else {
            (settled, evaluate)
        };
        pre.push(self.t.with_span(e.span).alloc_stmt(StmtKind::If {
            cond: l,
            then_branch,
            else_branch,
        }));
        self.name_of(e, &tmp)
    }

    /// `x op= y`. Tables and vector appends modify the aggregate in
    /// place; everything else is `x = x op y`.
    fn reduce_compound(
        &self,
        e: &'a Expr<'a>,
        op: BinaryOp,
        lhs: &'a Expr<'a>,
        rhs: &'a Expr<'a>,
        pre: &mut Pre<'a>,
    ) -> &'a Expr<'a> {
        let target = lhs.target();
        let in_place = op == BinaryOp::AppendTo || matches!(*target.ty, Type::Table { .. });
        if in_place {
            let aggr = self.reduce_to_singleton(target, pre);
            let r = self.reduce_to_singleton(rhs, pre);
            let changed = !same(aggr, target) || !same(r, rhs);
            if !changed {
                return e;
            }
            let reference = self.t.derived(lhs, ExprKind::Ref(aggr), aggr.ty.clone());
            return self.t.derived(
                e,
                ExprKind::Binary {
                    op,
                    lhs: reference,
                    rhs: r,
                },
                e.ty.clone(),
            );
        }

        let loc = self.reduce_location(target, pre);
        let arith = self.t.derived(
            e,
            ExprKind::Binary {
                op: op.underlying(),
                lhs: self.t.duplicate(loc),
                rhs,
            },
            loc.ty.clone(),
        );
        self.assign_location(e, loc, arith, pre)
    }

    fn reduce_cond(
        &self,
        e: &'a Expr<'a>,
        cond: &'a Expr<'a>,
        then_expr: &'a Expr<'a>,
        else_expr: &'a Expr<'a>,
        pre: &mut Pre<'a>,
    ) -> &'a Expr<'a> {
        let c = self.reduce_to_singleton(cond, pre);
        if let Some(v) = c.const_val() {
            let chosen = if v.as_bool() { then_expr } else { else_expr };
            return self.reduce_expr(chosen, pre);
        }
        // The condition's effects, if any, are already in `pre`.
        if then_expr.same_as(else_expr) {
            return self.reduce_expr(then_expr, pre);
        }

        let mut then_pre = Pre::new();
        let t = self.reduce_expr(then_expr, &mut then_pre);
        let mut else_pre = Pre::new();
        let f = self.reduce_expr(else_expr, &mut else_pre);
        if then_pre.is_empty() && else_pre.is_empty() && t.is_singleton() && f.is_singleton() {
            let changed = !same(c, cond) || !same(t, then_expr) || !same(f, else_expr);
            return self.rebuilt(e, changed, || ExprKind::Cond {
                cond: c,
                then_expr: t,
                else_expr: f,
            });
        }

        let tmp = self.new_temp(e.ty.clone());
        self.settle(e, &tmp, t, &mut then_pre);
        self.settle(e, &tmp, f, &mut else_pre);
        let at = self.t.with_span(e.span);
        pre.push(at.alloc_stmt(StmtKind::If {
            cond: c,
            then_branch: at.alloc_stmt(StmtKind::List(self.t.slice(&then_pre))),
            else_branch: at.alloc_stmt(StmtKind::List(self.t.slice(&else_pre))),
        }));
        self.name_of(e, &tmp)
    }

    /// End a branch with `tmp = value`. A reduced operator goes straight
    /// into `tmp`; anything else is spilled first.
    fn settle(&self, e: &'a Expr<'a>, tmp: &IdPtr, value: &'a Expr<'a>, branch: &mut Pre<'a>) {
        let direct = value.is_singleton()
            || (!is_assignment(value)
                && !value.ty.is_void()
                && value.ty.is_any() == tmp.ty.is_any()
                && self.is_reduced(value));
        let value = if direct { value } else { self.spill(value, branch) };
        branch.push(self.expr_stmt(self.assign_to(e, tmp, value)));
    }

    fn reduce_call(
        &self,
        e: &'a Expr<'a>,
        func: &'a Expr<'a>,
        args: &'a [&'a Expr<'a>],
        pre: &mut Pre<'a>,
    ) -> &'a Expr<'a> {
        let f = self.reduce_to_singleton(func, pre);
        let (a, args_changed) = self.reduce_all(args, pre);
        let call = self.rebuilt(e, !same(f, func) || args_changed, || ExprKind::Call {
            func: f,
            args: a,
        });

        let foldable = self.fold_builtins
            && e.ty.is_atomic()
            && a.iter().all(|x| x.is_const())
            && self.callee_builtin(f).is_some_and(|b| b.foldable);
        if foldable {
            if let Ok(v) = eval_const(call, self.builtins) {
                return self.constant(e, v, e.ty.clone());
            }
        }
        call
    }

    // ------------------------------------------------------------------
    // Assignment
    // ------------------------------------------------------------------

    fn reduce_assign(
        &self,
        e: &'a Expr<'a>,
        lhs: &'a Expr<'a>,
        rhs: &'a Expr<'a>,
        is_temp: bool,
        pre: &mut Pre<'a>,
    ) -> &'a Expr<'a> {
        if let ExprKind::List(targets) = &lhs.kind {
            return self.reduce_destructure(e, targets, rhs, pre);
        }
        let target = lhs.target();
        match &target.kind {
            ExprKind::Name(_) => {
                let coerced = self.erasure_coerced(rhs, &target.ty);
                let r = self.reduce_expr(coerced, pre);
                // `a = b = c`: run the inner assignment first.
                let r = if is_assignment(r) { self.spill(r, pre) } else { r };
                if same(r, rhs) {
                    return e;
                }
                self.t.derived(e, ExprKind::Assign { lhs, rhs: r, is_temp }, e.ty.clone())
            }
            ExprKind::Index { .. } | ExprKind::Field { .. } => {
                let loc = self.reduce_location(target, pre);
                self.assign_location(e, loc, rhs, pre)
            }
            _ => internal_error!("assignment to {}", target.tag().describe()),
        }
    }

    /// Assign `value` to the already-reduced location `loc`.
    fn assign_location(
        &self,
        e: &'a Expr<'a>,
        loc: &'a Expr<'a>,
        value: &'a Expr<'a>,
        pre: &mut Pre<'a>,
    ) -> &'a Expr<'a> {
        let value = self.erasure_coerced(value, &loc.ty);
        match &loc.kind {
            ExprKind::Name(_) => {
                let r = self.reduce_expr(value, pre);
                let r = if is_assignment(r) { self.spill(r, pre) } else { r };
                let lhs = self.t.derived(e, ExprKind::Ref(loc), loc.ty.clone());
                self.t.derived(
                    e,
                    ExprKind::Assign {
                        lhs,
                        rhs: r,
                        is_temp: false,
                    },
                    loc.ty.clone(),
                )
            }
            ExprKind::Index { aggr, index } => {
                let v = self.reduce_to_singleton(value, pre);
                self.t.derived(
                    e,
                    ExprKind::IndexAssign {
                        aggr: *aggr,
                        index: *index,
                        value: v,
                    },
                    loc.ty.clone(),
                )
            }
            ExprKind::Field { record, field } => {
                let v = self.reduce_field_rhs(value, pre);
                self.t.derived(
                    e,
                    ExprKind::FieldLhsAssign {
                        record: *record,
                        field: *field,
                        value: v,
                    },
                    loc.ty.clone(),
                )
            }
            _ => internal_error!("assignment to {}", loc.tag().describe()),
        }
    }

    /// `[a, b] = v` becomes a length check on `v` followed by one
    /// assignment per element.
    fn reduce_destructure(
        &self,
        e: &'a Expr<'a>,
        targets: &'a [&'a Expr<'a>],
        rhs: &'a Expr<'a>,
        pre: &mut Pre<'a>,
    ) -> &'a Expr<'a> {
        let r = self.reduce_to_singleton(rhs, pre);
        pre.push(self.t.with_span(e.span).alloc_stmt(StmtKind::CheckAnyLen {
            expr: r,
            len: targets.len(),
        }));
        for (i, target_ref) in targets.iter().enumerate() {
            let elem_ty: TypeRef = match &*r.ty {
                Type::List(elems) => elems.get(i).cloned().unwrap_or_else(types::any),
                _ => types::any(),
            };
            let elem = self.t.derived(e, ExprKind::AnyIndex { operand: r, index: i }, elem_ty);
            let loc = self.reduce_location(target_ref.target(), pre);
            let assign = self.assign_location(e, loc, elem, pre);
            pre.push(self.expr_stmt(assign));
        }
        r
    }

    /// Insert a to-any or from-any coercion when exactly one side of an
    /// assignment is `any`.
    fn erasure_coerced(&self, value: &'a Expr<'a>, target_ty: &TypeRef) -> &'a Expr<'a> {
        if value.is_error() || target_ty.is_error() || target_ty.is_any() == value.ty.is_any() {
            return value;
        }
        let (op, ty) = if target_ty.is_any() {
            (UnaryOp::ToAny, types::any())
        } else {
            (UnaryOp::FromAny, target_ty.clone())
        };
        self.t.derived(value, ExprKind::Unary { op, operand: value }, ty)
    }

    /// A field assignment keeps simple computations inline instead of
    /// spilling them.
    fn reduce_field_rhs(&self, value: &'a Expr<'a>, pre: &mut Pre<'a>) -> &'a Expr<'a> {
        let r = self.reduce_expr(value, pre);
        if r.is_singleton() || field_assignable(r) {
            r
        } else {
            self.spill(r, pre)
        }
    }

    /// Reduce an `if` or loop condition. Comparisons over singletons stay
    /// whole, so code generation can branch on them directly.
    pub fn reduce_condition(&self, cond: &'a Expr<'a>, pre: &mut Pre<'a>) -> &'a Expr<'a> {
        let r = self.reduce_expr(cond, pre);
        let branchable = match &r.kind {
            ExprKind::Binary { op, lhs, rhs } => {
                (op.is_relational() || *op == BinaryOp::In)
                    && lhs.is_singleton()
                    && rhs.is_singleton()
                    && matches!(*r.ty, Type::Bool)
            }
            _ => false,
        };
        if branchable { r } else { self.spill(r, pre) }
    }
}
