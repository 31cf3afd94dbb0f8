//! Generic pre/post-order walk over statements and expressions.
//!
//! Passes that only need to look at nodes (profiling which names appear,
//! scanning for constructs the code generator cannot express) implement
//! [`Traversal`]; the walk itself lives here so every pass visits
//! children in the same order.

use crate::ast::{Expr, ExprKind, Stmt, StmtKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalCode {
    Continue,
    /// Skip the children of the current node but keep walking its siblings.
    AbortStmt,
    /// Stop the whole walk.
    AbortAll,
}

pub trait Traversal<'a> {
    fn pre_stmt(&mut self, _stmt: &'a Stmt<'a>) -> TraversalCode {
        TraversalCode::Continue
    }

    fn post_stmt(&mut self, _stmt: &'a Stmt<'a>) -> TraversalCode {
        TraversalCode::Continue
    }

    fn pre_expr(&mut self, _expr: &'a Expr<'a>) -> TraversalCode {
        TraversalCode::Continue
    }

    fn post_expr(&mut self, _expr: &'a Expr<'a>) -> TraversalCode {
        TraversalCode::Continue
    }
}

macro_rules! walk {
    ($e:expr) => {
        if $e == TraversalCode::AbortAll {
            return TraversalCode::AbortAll;
        }
    };
}

pub fn traverse_stmt<'a, T: Traversal<'a> + ?Sized>(
    stmt: &'a Stmt<'a>,
    t: &mut T,
) -> TraversalCode {
    match t.pre_stmt(stmt) {
        TraversalCode::AbortAll => return TraversalCode::AbortAll,
        TraversalCode::AbortStmt => return TraversalCode::Continue,
        TraversalCode::Continue => {}
    }

    let mut code = TraversalCode::Continue;
    stmt.for_each_child(|child| {
        if code == TraversalCode::Continue {
            code = match child {
                Child::Stmt(s) => traverse_stmt(s, t),
                Child::Expr(e) => traverse_expr(e, t),
            };
        }
    });
    walk!(code);

    match t.post_stmt(stmt) {
        TraversalCode::AbortAll => TraversalCode::AbortAll,
        _ => TraversalCode::Continue,
    }
}

pub fn traverse_expr<'a, T: Traversal<'a> + ?Sized>(
    expr: &'a Expr<'a>,
    t: &mut T,
) -> TraversalCode {
    match t.pre_expr(expr) {
        TraversalCode::AbortAll => return TraversalCode::AbortAll,
        TraversalCode::AbortStmt => return TraversalCode::Continue,
        TraversalCode::Continue => {}
    }

    for child in expr.children() {
        walk!(traverse_expr(child, t));
    }

    match t.post_expr(expr) {
        TraversalCode::AbortAll => TraversalCode::AbortAll,
        _ => TraversalCode::Continue,
    }
}

/// A direct child of a statement.
#[derive(Clone, Copy)]
pub(crate) enum Child<'a> {
    Stmt(&'a Stmt<'a>),
    Expr(&'a Expr<'a>),
}

impl<'a> Expr<'a> {
    /// Direct subexpressions, in evaluation order.
    pub fn children(&self) -> smallvec::SmallVec<[&'a Expr<'a>; 4]> {
        let mut out = smallvec::SmallVec::new();
        match &self.kind {
            ExprKind::Name(_) | ExprKind::Const(_) | ExprKind::Lambda(_) | ExprKind::Nop => {}
            ExprKind::Unary { operand, .. }
            | ExprKind::AnyIndex { operand, .. }
            | ExprKind::Is { operand, .. }
            | ExprKind::Cast(operand)
            | ExprKind::Ref(operand)
            | ExprKind::Field {
                record: operand, ..
            }
            | ExprKind::HasField {
                record: operand, ..
            }
            | ExprKind::FieldAssign { value: operand, .. } => out.push(*operand),
            ExprKind::Binary { lhs, rhs, .. } | ExprKind::Assign { lhs, rhs, .. } => {
                out.push(*lhs);
                out.push(*rhs);
            }
            ExprKind::Cond {
                cond,
                then_expr,
                else_expr,
            } => out.extend([*cond, *then_expr, *else_expr]),
            ExprKind::IndexAssign { aggr, index, value } => out.extend([*aggr, *index, *value]),
            ExprKind::FieldLhsAssign { record, value, .. } => out.extend([*record, *value]),
            ExprKind::Index { aggr, index } => out.extend([*aggr, *index]),
            ExprKind::RecordCtor(elems)
            | ExprKind::SetCtor(elems)
            | ExprKind::VectorCtor(elems)
            | ExprKind::List(elems)
            | ExprKind::Event { args: elems, .. } => out.extend(elems.iter().copied()),
            ExprKind::TableCtor(entries) => {
                for (k, v) in entries.iter() {
                    out.push(*k);
                    out.push(*v);
                }
            }
            ExprKind::Call { func, args } => {
                out.push(*func);
                out.extend(args.iter().copied());
            }
            ExprKind::Schedule { delay, event } => out.extend([*delay, *event]),
        }
        out
    }
}

impl<'a> Stmt<'a> {
    pub(crate) fn for_each_child(&self, mut f: impl FnMut(Child<'a>)) {
        match &self.kind {
            StmtKind::List(stmts) => stmts.iter().for_each(|s| f(Child::Stmt(*s))),
            StmtKind::Expr(e)
            | StmtKind::Event(e)
            | StmtKind::Add(e)
            | StmtKind::Delete(e)
            | StmtKind::CheckAnyLen { expr: e, .. } => f(Child::Expr(*e)),
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                f(Child::Expr(*cond));
                f(Child::Stmt(*then_branch));
                f(Child::Stmt(*else_branch));
            }
            StmtKind::While {
                cond,
                cond_stmt,
                body,
            } => {
                if let Some(cs) = cond_stmt {
                    f(Child::Stmt(*cs));
                }
                f(Child::Expr(*cond));
                f(Child::Stmt(*body));
            }
            StmtKind::For { over, body, .. } => {
                f(Child::Expr(*over));
                f(Child::Stmt(*body));
            }
            StmtKind::Switch { expr, cases, .. } => {
                f(Child::Expr(*expr));
                for case in cases.iter() {
                    case.exprs.iter().for_each(|e| f(Child::Expr(*e)));
                    f(Child::Stmt(case.body));
                }
            }
            StmtKind::Return(value) => {
                if let Some(v) = value {
                    f(Child::Expr(*v));
                }
            }
            StmtKind::Print(args) => args.iter().for_each(|e| f(Child::Expr(*e))),
            StmtKind::CatchReturn { body, .. } => f(Child::Stmt(*body)),
            StmtKind::When {
                cond,
                cond_stmt,
                body,
            } => {
                if let Some(cs) = cond_stmt {
                    f(Child::Stmt(*cs));
                }
                f(Child::Expr(*cond));
                f(Child::Stmt(*body));
            }
            StmtKind::Next
            | StmtKind::Break
            | StmtKind::Fallthrough
            | StmtKind::Null
            | StmtKind::Init(_) => {}
        }
    }
}
