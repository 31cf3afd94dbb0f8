//! Lowering of reduced expressions.

use crate::ast::{BinaryOp, Expr, ExprKind, IdPtr, Scope};
use crate::codegen::{CompileError, Generator, Label, Opnd};
use crate::types::{Type, TypeRef};
use crate::values::{Func, Val};
use crate::vm::{AuxItem, OpFlavor, ZAux, ZInst, ZOp};
use crate::{Box, Rc, Vec, vec};

/// Value of a constant identifier that is safe to embed in code.
pub(super) fn embedded_value(id: &IdPtr) -> Option<Val> {
    if id.scope != Scope::Const || id.redefinable {
        return None;
    }
    id.value()
}

fn unsupported(e: &Expr<'_>) -> CompileError {
    CompileError::unsupported(e.tag().describe(), e.span)
}

impl Generator {
    /// A singleton as an operand; anything else is computed into a
    /// scratch slot first.
    pub(super) fn operand(&mut self, e: &Expr<'_>) -> Result<Opnd, CompileError> {
        match &e.kind {
            ExprKind::Const(v) => Ok(Opnd::Const(v.clone())),
            ExprKind::Name(id) => match embedded_value(id) {
                Some(v) => Ok(Opnd::Const(v)),
                None => Ok(Opnd::Slot(self.read_id(id))),
            },
            _ => {
                let slot = self.scratch(&e.ty);
                self.eval_into(e, slot)?;
                Ok(Opnd::Slot(slot))
            }
        }
    }

    /// Like `operand`, but always a slot.
    pub(super) fn slot_operand(&mut self, e: &Expr<'_>) -> Result<i32, CompileError> {
        let opnd = self.operand(e)?;
        Ok(self.materialize(opnd, Some(e.ty.clone())))
    }

    pub(super) fn aux_items(&mut self, exprs: &[&Expr<'_>]) -> Result<Vec<AuxItem>, CompileError> {
        exprs
            .iter()
            .map(|e| self.operand(e).map(Opnd::aux))
            .collect()
    }

    /// Index operands: the components of an index list, or a lone index.
    pub(super) fn index_aux(&mut self, index: &Expr<'_>) -> Result<ZAux, CompileError> {
        Ok(match &index.kind {
            ExprKind::List(elems) => ZAux {
                as_list: true,
                ..ZAux::items(self.aux_items(elems)?)
            },
            _ => ZAux::items(vec![self.operand(index)?.aux()]),
        })
    }

    /// An expression evaluated for its effect.
    pub(super) fn expr_stmt(&mut self, e: &Expr<'_>) -> Result<(), CompileError> {
        self.loc = e.span;
        match &e.kind {
            ExprKind::Assign { lhs, rhs, .. } => {
                let ExprKind::Ref(target) = &lhs.kind else {
                    return Err(CompileError::unsupported("destructuring assignment", e.span));
                };
                let Some(id) = target.as_name() else {
                    return Err(CompileError::unsupported("assignment to a compound target", e.span));
                };
                let slot = self.slot_for(id);
                self.eval_into(rhs, slot)?;
                self.wrote(slot);
            }
            ExprKind::IndexAssign { aggr, index, value } => {
                let aggr = self.slot_operand(aggr)?;
                let value = self.operand(value)?;
                let aux = self.index_aux(index)?;
                let at = self.emit_op(ZOp::IndexAssign, None, vec![Opnd::Slot(aggr), value], None);
                self.code.insts[at].aux = Some(Box::new(aux));
            }
            ExprKind::FieldLhsAssign {
                record,
                field,
                value,
            } => {
                let record = self.slot_operand(record)?;
                let value = self.operand(value)?;
                let mut inst = match value {
                    Opnd::Slot(s) => {
                        let mut inst = ZInst::new(ZOp::FieldAssign, OpFlavor::RIR);
                        inst.v3 = s;
                        inst
                    }
                    Opnd::Const(v) => {
                        let mut inst = ZInst::new(ZOp::FieldAssign, OpFlavor::RIC);
                        inst.c = Some(v);
                        inst
                    }
                };
                inst.v1 = record;
                inst.v2 = *field as i32;
                self.emit(inst);
            }
            ExprKind::Binary { op, lhs, rhs } if op.is_assigning() => {
                self.compound_assign(*op, lhs.target(), rhs)?;
            }
            ExprKind::Unary { op, operand } if op.is_assigning() => {
                let target = operand.target();
                let Some(id) = target.as_name() else {
                    return Err(unsupported(e));
                };
                let current = self.read_id(id);
                let slot = self.slot_for(id);
                self.emit_op(
                    ZOp::Unary(*op),
                    Some(slot),
                    vec![Opnd::Slot(current)],
                    Some(target.ty.clone()),
                );
                self.wrote(slot);
            }
            ExprKind::Call { func, args } => self.call(None, func, args)?,
            ExprKind::Event { handler, args } => {
                let items = self.aux_items(args)?;
                self.sync_globals();
                let mut inst = ZInst::new(ZOp::Event, OpFlavor::X);
                inst.aux = Some(Box::new(ZAux {
                    name: Some(handler.name.clone()),
                    ..ZAux::items(items)
                }));
                self.emit(inst);
            }
            ExprKind::Schedule { delay, event } => self.schedule(None, delay, event)?,
            ExprKind::Nop => {}
            _ => {
                // Effect-free; the optimizer drops the unread result.
                let slot = self.scratch(&e.ty);
                self.eval_into(e, slot)?;
            }
        }
        Ok(())
    }

    /// `target op= rhs` for a named target.
    fn compound_assign(
        &mut self,
        op: BinaryOp,
        target: &Expr<'_>,
        rhs: &Expr<'_>,
    ) -> Result<(), CompileError> {
        let Some(id) = target.as_name() else {
            return Err(CompileError::unsupported("compound assignment to a compound target", target.span));
        };
        let in_place = matches!(&*target.ty, Type::Table { .. }) || op == BinaryOp::AppendTo;
        let current = self.read_id(id);
        let r = self.operand(rhs)?;
        if in_place {
            self.emit_op(
                ZOp::CompoundTo(op),
                None,
                vec![Opnd::Slot(current), r],
                Some(target.ty.clone()),
            );
        } else {
            let slot = self.slot_for(id);
            self.emit_op(
                ZOp::Binary(op.underlying()),
                Some(slot),
                vec![Opnd::Slot(current), r],
                Some(target.ty.clone()),
            );
            self.wrote(slot);
        }
        Ok(())
    }

    /// Compute `e` into `dest`.
    pub(super) fn eval_into(&mut self, e: &Expr<'_>, dest: i32) -> Result<(), CompileError> {
        let ty = Some(e.ty.clone());
        match &e.kind {
            ExprKind::Name(_) | ExprKind::Const(_) => {
                let v = self.operand(e)?;
                self.emit_op(ZOp::Assign, Some(dest), vec![v], ty);
            }
            ExprKind::Unary { op, operand } if !op.is_assigning() => {
                let v = self.operand(operand)?;
                self.emit_op(ZOp::Unary(*op), Some(dest), vec![v], ty);
            }
            ExprKind::Binary { op, lhs, rhs } if op.is_short_circuit() => {
                self.short_circuit(*op, lhs, rhs, dest)?;
            }
            ExprKind::Binary { op, lhs, rhs } if !op.is_assigning() => {
                let l = self.operand(lhs)?;
                let r = self.operand(rhs)?;
                self.emit_op(ZOp::Binary(*op), Some(dest), vec![l, r], ty);
            }
            ExprKind::Cond {
                cond,
                then_expr,
                else_expr,
            } => {
                let otherwise = self.new_label();
                let end = self.new_label();
                self.branch_unless(cond, otherwise)?;
                self.eval_into(then_expr, dest)?;
                self.goto(end);
                self.place(otherwise);
                self.eval_into(else_expr, dest)?;
                self.place(end);
            }
            ExprKind::Index { aggr, index } => {
                let aggr = self.operand(aggr)?;
                let aux = self.index_aux(index)?;
                let at = self.emit_op(ZOp::Index, Some(dest), vec![aggr], ty);
                self.code.insts[at].aux = Some(Box::new(aux));
            }
            ExprKind::AnyIndex { operand, index } => {
                self.emit_wri(ZOp::AnyIndex, dest, operand, *index, ty)?;
            }
            ExprKind::Field { record, field } => {
                self.emit_wri(ZOp::Field, dest, record, *field, ty)?;
            }
            ExprKind::HasField { record, field } => {
                self.emit_wri(ZOp::HasField, dest, record, *field, ty)?;
            }
            ExprKind::RecordCtor(fields) => {
                let mut aux = ZAux::default();
                for assign in fields.iter() {
                    let ExprKind::FieldAssign { field, value } = &assign.kind else {
                        return Err(unsupported(assign));
                    };
                    aux.items.push(self.operand(value)?.aux());
                    aux.ints.push(*field);
                }
                self.emit_ctor(ZOp::RecordCtor, dest, aux, e.ty.clone());
            }
            ExprKind::TableCtor(entries) => {
                let mut aux = ZAux::default();
                for (key, value) in entries.iter() {
                    let width = self.push_key(&mut aux, key)?;
                    aux.items.push(self.operand(value)?.aux());
                    aux.ints.push(width);
                }
                self.emit_ctor(ZOp::TableCtor, dest, aux, e.ty.clone());
            }
            ExprKind::SetCtor(elems) => {
                let mut aux = ZAux::default();
                for elem in elems.iter() {
                    let width = self.push_key(&mut aux, elem)?;
                    aux.ints.push(width);
                }
                self.emit_ctor(ZOp::SetCtor, dest, aux, e.ty.clone());
            }
            ExprKind::VectorCtor(elems) => {
                let aux = ZAux::items(self.aux_items(elems)?);
                self.emit_ctor(ZOp::VectorCtor, dest, aux, e.ty.clone());
            }
            ExprKind::List(elems) => {
                let aux = ZAux::items(self.aux_items(elems)?);
                self.emit_ctor(ZOp::ListCtor, dest, aux, e.ty.clone());
            }
            ExprKind::Call { func, args } => self.call(Some(dest), func, args)?,
            ExprKind::Lambda(func) => {
                let val = Val::Func(Rc::new(Func::Script(func.clone())));
                self.emit_op(ZOp::Assign, Some(dest), vec![Opnd::Const(val)], ty);
            }
            ExprKind::Schedule { delay, event } => self.schedule(Some(dest), delay, event)?,
            ExprKind::Cast(operand) => {
                let v = self.operand(operand)?;
                self.emit_op(ZOp::Cast, Some(dest), vec![v], ty);
            }
            ExprKind::Is { operand, test_ty } => {
                let v = self.operand(operand)?;
                self.emit_op(ZOp::Is, Some(dest), vec![v], Some(test_ty.clone()));
            }
            _ => return Err(unsupported(e)),
        }
        Ok(())
    }

    fn emit_wri(
        &mut self,
        op: ZOp,
        dest: i32,
        operand: &Expr<'_>,
        n: usize,
        ty: Option<TypeRef>,
    ) -> Result<(), CompileError> {
        let src = self.slot_operand(operand)?;
        let mut inst = ZInst::new(op, OpFlavor::WRI);
        inst.v1 = dest;
        inst.v2 = src;
        inst.v3 = n as i32;
        inst.t = ty;
        self.emit(inst);
        Ok(())
    }

    fn emit_ctor(&mut self, op: ZOp, dest: i32, aux: ZAux, ty: TypeRef) {
        let mut inst = ZInst::new(op, OpFlavor::W);
        inst.v1 = dest;
        inst.t = Some(ty);
        inst.aux = Some(Box::new(aux));
        self.emit(inst);
    }

    /// Append the components of a table key, returning how many there are.
    fn push_key(&mut self, aux: &mut ZAux, key: &Expr<'_>) -> Result<usize, CompileError> {
        match &key.kind {
            ExprKind::List(parts) => {
                let items = self.aux_items(parts)?;
                let width = items.len();
                aux.items.extend(items);
                Ok(width)
            }
            _ => {
                aux.items.push(self.operand(key)?.aux());
                Ok(1)
            }
        }
    }

    /// `&&` and `||` over singletons, which only evaluate the right side
    /// when it decides the result.
    fn short_circuit(
        &mut self,
        op: BinaryOp,
        lhs: &Expr<'_>,
        rhs: &Expr<'_>,
        dest: i32,
    ) -> Result<(), CompileError> {
        // `dest` may be one of the operands, so the result is built apart.
        let result = self.scratch(&lhs.ty);
        let end = self.new_label();
        self.eval_into(lhs, result)?;
        let mut test = ZInst::new(ZOp::IfFalse, OpFlavor::RB);
        test.v1 = result;
        if op == BinaryOp::AndAnd {
            self.emit_branch(test, &[end]);
            self.eval_into(rhs, result)?;
        } else {
            let right = self.new_label();
            self.emit_branch(test, &[right]);
            self.goto(end);
            self.place(right);
            self.eval_into(rhs, result)?;
        }
        self.place(end);
        self.emit_op(ZOp::Assign, Some(dest), vec![Opnd::Slot(result)], Some(lhs.ty.clone()));
        Ok(())
    }

    fn call(
        &mut self,
        dest: Option<i32>,
        func: &Expr<'_>,
        args: &[&Expr<'_>],
    ) -> Result<(), CompileError> {
        let callee = self.operand(func)?;
        let items = self.aux_items(args)?;
        self.sync_globals();
        let op = if dest.is_some() { ZOp::Call } else { ZOp::CallX };
        let at = self.emit_op(op, dest, vec![callee], None);
        self.code.insts[at].aux = Some(Box::new(ZAux::items(items)));
        Ok(())
    }

    fn schedule(
        &mut self,
        dest: Option<i32>,
        delay: &Expr<'_>,
        event: &Expr<'_>,
    ) -> Result<(), CompileError> {
        let ExprKind::Event { handler, args } = &event.kind else {
            return Err(unsupported(event));
        };
        let delay = self.operand(delay)?;
        let items = self.aux_items(args)?;
        self.sync_globals();
        let op = if dest.is_some() { ZOp::Schedule } else { ZOp::ScheduleX };
        let at = self.emit_op(op, dest, vec![delay], None);
        self.code.insts[at].aux = Some(Box::new(ZAux {
            name: Some(handler.name.clone()),
            ..ZAux::items(items)
        }));
        Ok(())
    }

    /// Branch to `target` unless `cond` holds.
    pub(super) fn branch_unless(&mut self, cond: &Expr<'_>, target: Label) -> Result<(), CompileError> {
        if let ExprKind::Binary { op, lhs, rhs } = &cond.kind {
            if (op.is_relational() || *op == BinaryOp::In) && lhs.is_singleton() && rhs.is_singleton() {
                let l = self.operand(lhs)?;
                let r = self.operand(rhs)?;
                self.cmp_branch(*op, l, r, cond.ty.clone(), target);
                return Ok(());
            }
        }
        let c = self.slot_operand(cond)?;
        let mut test = ZInst::new(ZOp::IfFalse, OpFlavor::RB);
        test.v1 = c;
        self.emit_branch(test, &[target]);
        Ok(())
    }

    /// Branch to `target` unless `l op r`.
    pub(super) fn cmp_branch(&mut self, op: BinaryOp, l: Opnd, r: Opnd, ty: TypeRef, target: Label) {
        let l = match (&l, &r) {
            (Opnd::Const(_), Opnd::Const(_)) => Opnd::Slot(self.materialize(l, None)),
            _ => l,
        };
        let mut inst = match (l, r) {
            (Opnd::Slot(a), Opnd::Slot(b)) => {
                let mut inst = ZInst::new(ZOp::CmpBranch(op), OpFlavor::RRB);
                inst.v1 = a;
                inst.v2 = b;
                inst
            }
            (Opnd::Slot(a), Opnd::Const(v)) => {
                let mut inst = ZInst::new(ZOp::CmpBranch(op), OpFlavor::RCB);
                inst.v1 = a;
                inst.c = Some(v);
                inst
            }
            (Opnd::Const(v), Opnd::Slot(b)) => {
                let mut inst = ZInst::new(ZOp::CmpBranch(op), OpFlavor::CRB);
                inst.v1 = b;
                inst.c = Some(v);
                inst
            }
            (Opnd::Const(_), Opnd::Const(_)) => internal_error!("comparison of two constants"),
        };
        inst.t = Some(ty);
        self.emit_branch(inst, &[target]);
    }
}
