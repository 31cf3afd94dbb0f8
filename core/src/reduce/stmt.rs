//! Statement reduction.

use core::ptr;

use crate::ast::{Case, Expr, ExprKind, Stmt, StmtKind};
use crate::reduce::{Pre, Reducer};
use crate::Vec;

fn same<'a>(a: &'a Stmt<'a>, b: &'a Stmt<'a>) -> bool {
    ptr::eq(a, b)
}

fn same_expr<'a>(a: &'a Expr<'a>, b: &'a Expr<'a>) -> bool {
    ptr::eq(a, b)
}

impl<'a> Reducer<'a, '_> {
    /// Reduce `s` and everything under it. Unchanged statements come back
    /// as the same node.
    pub fn reduce_stmt(&self, s: &'a Stmt<'a>) -> &'a Stmt<'a> {
        match &s.kind {
            StmtKind::List(stmts) => self.reduce_list(s, stmts),
            StmtKind::Expr(e) => {
                if self.omitted.borrow().contains(&s.key()) {
                    return self.t.derived_stmt(s, StmtKind::Null);
                }
                let mut pre = Pre::new();
                let r = self.reduce_expr(e, &mut pre);
                let main = self.statement_expr(r).map(|r| {
                    if same_expr(r, e) {
                        s
                    } else {
                        self.t.derived_stmt(s, StmtKind::Expr(r))
                    }
                });
                self.with_pre(s, pre, main)
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let mut pre = Pre::new();
                let c = self.reduce_condition(cond, &mut pre);
                if let Some(v) = c.const_val() {
                    let chosen = if v.as_bool() { then_branch } else { else_branch };
                    let branch = self.reduce_stmt(chosen);
                    return self.with_pre(s, pre, Some(branch));
                }
                let t = self.reduce_stmt(then_branch);
                let f = self.reduce_stmt(else_branch);
                if t.is_null() && f.is_null() {
                    return self.with_pre(s, pre, None);
                }
                let main = if same_expr(c, cond) && same(t, then_branch) && same(f, else_branch) {
                    s
                } else {
                    self.t.derived_stmt(
                        s,
                        StmtKind::If {
                            cond: c,
                            then_branch: t,
                            else_branch: f,
                        },
                    )
                };
                self.with_pre(s, pre, Some(main))
            }
            StmtKind::While {
                cond,
                cond_stmt,
                body,
            } => {
                let prior = cond_stmt.map(|cs| self.reduce_stmt(cs));
                let mut pre = Pre::new();
                let c = self.reduce_condition(cond, &mut pre);
                let false_at_entry = matches!(c.const_val(), Some(v) if !v.as_bool());
                if false_at_entry && prior.is_none() && pre.is_empty() {
                    return self.t.derived_stmt(s, StmtKind::Null);
                }
                let b = self.reduce_stmt(body);
                let new_cond_stmt = self.merge_prefix(s, prior, pre);
                let unchanged = same_expr(c, cond)
                    && same(b, body)
                    && match (new_cond_stmt, cond_stmt) {
                        (None, None) => true,
                        (Some(a), Some(b)) => same(a, b),
                        _ => false,
                    };
                if unchanged {
                    return s;
                }
                self.t.derived_stmt(
                    s,
                    StmtKind::While {
                        cond: c,
                        cond_stmt: new_cond_stmt,
                        body: b,
                    },
                )
            }
            StmtKind::For {
                vars,
                value_var,
                over,
                body,
            } => {
                let mut pre = Pre::new();
                let o = self.reduce_to_singleton(over, &mut pre);
                let b = self.reduce_stmt(body);
                let main = if same_expr(o, over) && same(b, body) {
                    s
                } else {
                    self.t.derived_stmt(
                        s,
                        StmtKind::For {
                            vars: *vars,
                            value_var: value_var.clone(),
                            over: o,
                            body: b,
                        },
                    )
                };
                self.with_pre(s, pre, Some(main))
            }
            StmtKind::Switch {
                expr,
                cases,
                default,
            } => {
                let mut pre = Pre::new();
                let x = self.reduce_to_singleton(expr, &mut pre);
                let mut changed = !same_expr(x, expr);
                let bodies: Vec<&'a Stmt<'a>> = cases
                    .iter()
                    .map(|c| {
                        let b = self.reduce_stmt(c.body);
                        changed |= !same(b, c.body);
                        b
                    })
                    .collect();
                let main = if changed {
                    let new_cases = cases.iter().zip(bodies).map(|(c, body)| Case {
                        exprs: c.exprs,
                        types: c.types,
                        body,
                    });
                    self.t.derived_stmt(
                        s,
                        StmtKind::Switch {
                            expr: x,
                            cases: self.t.arena.alloc_slice_fill_iter(new_cases),
                            default: *default,
                        },
                    )
                } else {
                    s
                };
                self.with_pre(s, pre, Some(main))
            }
            StmtKind::Return(Some(e)) => {
                let mut pre = Pre::new();
                let v = self.reduce_to_singleton(e, &mut pre);
                let main = if same_expr(v, e) {
                    s
                } else {
                    self.t.derived_stmt(s, StmtKind::Return(Some(v)))
                };
                self.with_pre(s, pre, Some(main))
            }
            StmtKind::Return(None)
            | StmtKind::Next
            | StmtKind::Break
            | StmtKind::Fallthrough
            | StmtKind::Null => s,
            StmtKind::Print(args) => {
                let mut pre = Pre::new();
                let mut changed = false;
                let reduced: Vec<&'a Expr<'a>> = args
                    .iter()
                    .map(|a| {
                        let r = self.reduce_to_singleton(a, &mut pre);
                        changed |= !same_expr(r, a);
                        r
                    })
                    .collect();
                let main = if changed {
                    self.t.derived_stmt(s, StmtKind::Print(self.t.slice(&reduced)))
                } else {
                    s
                };
                self.with_pre(s, pre, Some(main))
            }
            StmtKind::Event(e) => self.reduce_wrapped(s, e, StmtKind::Event),
            StmtKind::Add(target) => self.reduce_wrapped(s, target, StmtKind::Add),
            StmtKind::Delete(target) => self.reduce_wrapped(s, target, StmtKind::Delete),
            StmtKind::Init(ids) => match self.init_trims.borrow().get(&s.key()) {
                Some(kept) if kept.is_empty() => self.t.derived_stmt(s, StmtKind::Null),
                Some(kept) if kept.len() != ids.len() => {
                    self.t.derived_stmt(s, StmtKind::Init(self.t.ids(kept)))
                }
                _ => s,
            },
            StmtKind::CheckAnyLen { expr, len } => {
                let mut pre = Pre::new();
                let x = self.reduce_to_singleton(expr, &mut pre);
                let main = if same_expr(x, expr) {
                    s
                } else {
                    self.t
                        .derived_stmt(s, StmtKind::CheckAnyLen { expr: x, len: *len })
                };
                self.with_pre(s, pre, Some(main))
            }
            StmtKind::CatchReturn { body, ret_var } => {
                let b = self.reduce_stmt(body);
                if same(b, body) {
                    return s;
                }
                self.t.derived_stmt(
                    s,
                    StmtKind::CatchReturn {
                        body: b,
                        ret_var: ret_var.clone(),
                    },
                )
            }
            StmtKind::When {
                cond,
                cond_stmt,
                body,
            } => {
                let prior = cond_stmt.map(|cs| self.reduce_stmt(cs));
                let mut pre = Pre::new();
                let c = self.reduce_to_singleton(cond, &mut pre);
                let b = self.reduce_stmt(body);
                let new_cond_stmt = self.merge_prefix(s, prior, pre);
                let unchanged = same_expr(c, cond)
                    && same(b, body)
                    && match (new_cond_stmt, cond_stmt) {
                        (None, None) => true,
                        (Some(a), Some(b)) => same(a, b),
                        _ => false,
                    };
                if unchanged {
                    return s;
                }
                self.t.derived_stmt(
                    s,
                    StmtKind::When {
                        cond: c,
                        cond_stmt: new_cond_stmt,
                        body: b,
                    },
                )
            }
        }
    }

    /// Reduce the members of a list, splicing nested lists and dropping
    /// null statements.
    fn reduce_list(&self, s: &'a Stmt<'a>, stmts: &'a [&'a Stmt<'a>]) -> &'a Stmt<'a> {
        let mut out: Vec<&'a Stmt<'a>> = Vec::with_capacity(stmts.len());
        let mut changed = false;
        for st in stmts.iter() {
            let r = self.reduce_stmt(st);
            changed |= !same(r, st);
            match &r.kind {
                StmtKind::List(inner) => {
                    changed = true;
                    out.extend(inner.iter().copied());
                }
                StmtKind::Null => changed = true,
                _ => out.push(r),
            }
        }
        if !changed {
            return s;
        }
        self.t.derived_stmt(s, StmtKind::List(self.t.slice(&out)))
    }

    /// The expression to keep as a statement, if it does anything.
    /// Non-void calls land in a temporary so their result has a home.
    fn statement_expr(&self, r: &'a Expr<'a>) -> Option<&'a Expr<'a>> {
        if r.is_error() {
            return Some(r);
        }
        if !self.has_side_effects(r) {
            return None;
        }
        match &r.kind {
            ExprKind::Call { .. } if !r.ty.is_void() => {
                let id = self.new_temp(r.ty.clone());
                Some(self.assign_to(r, &id, r))
            }
            _ => Some(r),
        }
    }

    /// Statements whose single operand is an expression reduced in place.
    fn reduce_wrapped(
        &self,
        s: &'a Stmt<'a>,
        e: &'a Expr<'a>,
        wrap: fn(&'a Expr<'a>) -> StmtKind<'a>,
    ) -> &'a Stmt<'a> {
        let mut pre = Pre::new();
        let r = match &e.kind {
            ExprKind::Index { .. } | ExprKind::Field { .. } => self.reduce_location(e, &mut pre),
            _ => self.reduce_expr(e, &mut pre),
        };
        let main = if same_expr(r, e) {
            s
        } else {
            self.t.derived_stmt(s, wrap(r))
        };
        self.with_pre(s, pre, Some(main))
    }

    /// Combine a loop's existing condition prefix with new companions of
    /// its condition.
    fn merge_prefix(
        &self,
        s: &'a Stmt<'a>,
        prior: Option<&'a Stmt<'a>>,
        pre: Pre<'a>,
    ) -> Option<&'a Stmt<'a>> {
        if pre.is_empty() {
            return prior;
        }
        let mut all: Vec<&'a Stmt<'a>> = Vec::new();
        if let Some(p) = prior {
            match &p.kind {
                StmtKind::List(inner) => all.extend(inner.iter().copied()),
                _ => all.push(p),
            }
        }
        all.extend(pre);
        Some(self.t.derived_stmt(s, StmtKind::List(self.t.slice(&all))))
    }
}
