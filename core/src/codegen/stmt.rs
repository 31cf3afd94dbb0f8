//! Lowering of statements and control flow.

use crate::ast::{BinaryOp, Expr, ExprKind, Stmt, StmtKind};
use crate::codegen::{CompileError, Context, Generator, Label, LoopRange, Opnd};
use crate::types;
use crate::values::empty_aggregate;
use crate::vm::{AuxItem, OpFlavor, ZAux, ZInst, ZOp};
use crate::{Box, Vec, vec};

impl Generator {
    pub(super) fn stmt(&mut self, s: &Stmt<'_>) -> Result<(), CompileError> {
        self.loc = s.span;
        match &s.kind {
            StmtKind::List(stmts) => {
                for stmt in stmts.iter() {
                    self.stmt(stmt)?;
                }
            }
            StmtKind::Expr(e) | StmtKind::Event(e) => self.expr_stmt(e)?,
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let otherwise = self.new_label();
                self.branch_unless(cond, otherwise)?;
                self.stmt(then_branch)?;
                if else_branch.is_null() {
                    self.place(otherwise);
                } else {
                    let end = self.new_label();
                    if !then_branch.no_flow_after() {
                        self.goto(end);
                    }
                    self.place(otherwise);
                    self.stmt(else_branch)?;
                    self.place(end);
                }
            }
            StmtKind::While {
                cond,
                cond_stmt,
                body,
            } => self.while_loop(s, cond, *cond_stmt, body)?,
            StmtKind::For {
                vars,
                value_var,
                over,
                body,
            } => {
                let over = self.slot_operand(over)?;
                let iter = self.code.num_iters;
                self.code.num_iters += 1;
                let mut start = ZInst::new(ZOp::LoopStart, OpFlavor::RI);
                start.v1 = over;
                start.v2 = iter as i32;
                self.emit(start);

                let mut targets: Vec<i32> = vars.iter().map(|v| self.slot_for(v)).collect();
                let has_value = value_var.is_some();
                if let Some(v) = value_var {
                    targets.push(self.slot_for(v));
                }

                let top = self.new_label();
                let exit = self.new_label();
                self.loop_depth += 1;
                let first = self.code.insts.len();
                self.place(top);
                let mut next = ZInst::new(ZOp::LoopNext, OpFlavor::IB);
                next.v1 = iter as i32;
                next.aux = Some(Box::new(ZAux {
                    ints: vec![has_value as usize],
                    ..ZAux::items(targets.iter().map(|t| AuxItem::Slot(*t)).collect())
                }));
                self.emit_branch(next, &[exit]);
                for t in &targets {
                    self.wrote(*t);
                }

                self.contexts.push(Context::Loop { cont: top, exit });
                self.stmt(body)?;
                self.contexts.pop();

                self.loc = s.span;
                let last = self.code.insts.len();
                self.goto(top);
                self.code.loops.push(LoopRange {
                    start: first,
                    end: last,
                    depth: self.loop_depth,
                    pinned: targets.iter().copied().chain([over]).collect(),
                });
                self.loop_depth -= 1;
                self.place(exit);
            }
            StmtKind::Switch {
                expr,
                cases,
                default,
            } => {
                if let Some(case) = cases.iter().find(|c| c.is_type_case()) {
                    return Err(CompileError::unsupported("type switch", case.body.span));
                }
                let value = self.operand(expr)?;
                let exit = self.new_label();
                let bodies: Vec<Label> = cases.iter().map(|_| self.new_label()).collect();
                for (case, body) in cases.iter().zip(&bodies) {
                    for e in case.exprs.iter() {
                        let candidate = self.operand(e)?;
                        // Falls through on a mismatch, jumps to the body on a match.
                        self.cmp_branch(BinaryOp::Ne, value.clone(), candidate, types::bool(), *body);
                    }
                }
                match default {
                    Some(d) => self.goto(bodies[*d]),
                    None => self.goto(exit),
                }

                self.contexts.push(Context::Switch { exit, fall: exit });
                for (i, case) in cases.iter().enumerate() {
                    let fall = bodies.get(i + 1).copied().unwrap_or(exit);
                    if let Some(Context::Switch { fall: f, .. }) = self.contexts.last_mut() {
                        *f = fall;
                    }
                    self.place(bodies[i]);
                    self.stmt(case.body)?;
                    if !case.body.no_flow_after() {
                        self.goto(exit);
                    }
                }
                self.contexts.pop();
                self.place(exit);
            }
            StmtKind::Return(value) => self.return_stmt(s, *value)?,
            StmtKind::Next => {
                let Some(cont) = self.contexts.iter().rev().find_map(|c| match c {
                    Context::Loop { cont, .. } => Some(*cont),
                    _ => None,
                }) else {
                    return Err(CompileError::unsupported("next outside a loop", s.span));
                };
                self.goto(cont);
            }
            StmtKind::Break => {
                let Some(exit) = self.contexts.iter().rev().find_map(|c| match c {
                    Context::Loop { exit, .. } | Context::Switch { exit, .. } => Some(*exit),
                    Context::Catch { .. } => None,
                }) else {
                    return Err(CompileError::unsupported("break outside a loop or switch", s.span));
                };
                self.goto(exit);
            }
            StmtKind::Fallthrough => {
                let Some(fall) = self.contexts.iter().rev().find_map(|c| match c {
                    Context::Switch { fall, .. } => Some(*fall),
                    _ => None,
                }) else {
                    return Err(CompileError::unsupported("fallthrough outside a switch", s.span));
                };
                self.goto(fall);
            }
            StmtKind::Null => {}
            StmtKind::Print(args) => {
                let items = self.aux_items(args)?;
                let mut inst = ZInst::new(ZOp::Print, OpFlavor::X);
                inst.aux = Some(Box::new(ZAux::items(items)));
                self.emit(inst);
            }
            StmtKind::Add(target) => {
                let ExprKind::Index { aggr, index } = &target.kind else {
                    return Err(CompileError::unsupported("add of a non-index", s.span));
                };
                let set = self.slot_operand(aggr)?;
                let aux = self.index_aux(index)?;
                let mut inst = ZInst::new(ZOp::AddMember, OpFlavor::R);
                inst.v1 = set;
                inst.aux = Some(Box::new(aux));
                self.emit(inst);
            }
            StmtKind::Delete(target) => match &target.kind {
                ExprKind::Index { aggr, index } => {
                    let table = self.slot_operand(aggr)?;
                    let aux = self.index_aux(index)?;
                    let mut inst = ZInst::new(ZOp::DeleteIndex, OpFlavor::R);
                    inst.v1 = table;
                    inst.aux = Some(Box::new(aux));
                    self.emit(inst);
                }
                ExprKind::Field { record, field } => {
                    let record = self.slot_operand(record)?;
                    let mut inst = ZInst::new(ZOp::DeleteField, OpFlavor::RI);
                    inst.v1 = record;
                    inst.v2 = *field as i32;
                    self.emit(inst);
                }
                _ => return Err(CompileError::unsupported("delete of this target", s.span)),
            },
            StmtKind::Init(ids) => {
                for id in ids.iter() {
                    let slot = self.slot_for(id);
                    let op = if empty_aggregate(&id.ty).is_some() {
                        ZOp::InitAggr
                    } else {
                        ZOp::Clear
                    };
                    let mut inst = ZInst::new(op, OpFlavor::W);
                    inst.v1 = slot;
                    inst.t = Some(id.ty.clone());
                    self.emit(inst);
                    self.wrote(slot);
                }
            }
            StmtKind::CheckAnyLen { expr, len } => {
                let list = self.slot_operand(expr)?;
                let mut inst = ZInst::new(ZOp::CheckAnyLen, OpFlavor::RI);
                inst.v1 = list;
                inst.v2 = *len as i32;
                self.emit(inst);
            }
            StmtKind::CatchReturn { body, ret_var } => {
                let end = self.new_label();
                let ret = ret_var.as_ref().map(|v| self.slot_for(v));
                self.contexts.push(Context::Catch { ret, end });
                self.stmt(body)?;
                self.contexts.pop();
                self.place(end);
            }
            StmtKind::When {
                cond,
                cond_stmt,
                body,
            } => {
                let resume = self.new_label();
                let skip = self.new_label();
                self.place(resume);
                if let Some(cs) = cond_stmt {
                    self.stmt(cs)?;
                }
                self.loc = s.span;
                let c = self.slot_operand(cond)?;
                let mut suspend = ZInst::new(ZOp::SuspendIfNot, OpFlavor::RBB);
                suspend.v1 = c;
                self.emit_branch(suspend, &[skip, resume]);
                self.stmt(body)?;
                self.place(skip);
            }
        }
        Ok(())
    }

    /// ```text
    /// top:  [cond_stmt]
    ///       branch-unless cond -> exit
    ///       body
    ///       goto top
    /// exit:
    /// ```
    fn while_loop<'a>(
        &mut self,
        s: &Stmt<'a>,
        cond: &Expr<'a>,
        cond_stmt: Option<&Stmt<'a>>,
        body: &Stmt<'a>,
    ) -> Result<(), CompileError> {
        let top = self.new_label();
        let exit = self.new_label();
        self.loop_depth += 1;
        let first = self.code.insts.len();
        self.place(top);
        if let Some(cs) = cond_stmt {
            self.stmt(cs)?;
        }
        self.loc = s.span;
        self.branch_unless(cond, exit)?;

        self.contexts.push(Context::Loop { cont: top, exit });
        self.stmt(body)?;
        self.contexts.pop();

        self.loc = s.span;
        let last = self.code.insts.len();
        self.goto(top);
        self.code.loops.push(LoopRange {
            start: first,
            end: last,
            depth: self.loop_depth,
            pinned: Vec::new(),
        });
        self.loop_depth -= 1;
        self.place(exit);
        Ok(())
    }

    fn return_stmt(
        &mut self,
        s: &Stmt<'_>,
        value: Option<&Expr<'_>>,
    ) -> Result<(), CompileError> {
        let catch = self.contexts.iter().rev().find_map(|c| match c {
            Context::Catch { ret, end } => Some((*ret, *end)),
            _ => None,
        });
        if let Some((ret, end)) = catch {
            if let (Some(slot), Some(v)) = (ret, value) {
                self.eval_into(v, slot)?;
                self.wrote(slot);
            }
            self.goto(end);
            return Ok(());
        }

        let value = value.map(|v| self.operand(v)).transpose()?;
        self.sync_globals();
        self.loc = s.span;
        self.emit_op(ZOp::Return, None, value.into_iter().collect::<Vec<Opnd>>(), None);
        Ok(())
    }
}
