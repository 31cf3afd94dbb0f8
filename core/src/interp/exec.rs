//! Statement execution and the tree interpreter.

use core::cell::RefCell;

use hashbrown::HashMap;
use tracing::trace;

use crate::api::Span;
use crate::ast::{ExprKind, IdPtr, Stmt, StmtKind};
use crate::interp::eval::{self, Frame, count_iteration, eval, eval_all, write_id};
use crate::interp::{Runtime, RuntimeError, TreeBodies};
use crate::values::{Body, ScriptFunc, TableKey, Val, empty_aggregate};
use crate::{Rc, String, ToString, Vec};

/// How control leaves a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal,
    Next,
    Break,
    Fallthrough,
    Return(Val),
}

/// Runs bodies that are still trees.
///
/// Keeps each interpreted body keyed by function and body index, so a
/// runtime `ScriptFunc` can dispatch to it without knowing about arenas.
#[derive(Default)]
pub struct Interpreter<'a> {
    bodies: RefCell<HashMap<(usize, usize), &'a Stmt<'a>>>,
}

fn func_key(func: &Rc<ScriptFunc>) -> usize {
    Rc::as_ptr(func) as usize
}

impl<'a> Interpreter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `body` as a new interpreted body of `func`.
    pub fn attach(&self, func: &Rc<ScriptFunc>, body: &'a Stmt<'a>) -> usize {
        let index = func.add_body(Body::Interpreted);
        self.bodies.borrow_mut().insert((func_key(func), index), body);
        index
    }

    /// Replace the tree for an existing body, e.g. after reduction.
    pub fn set_body(&self, func: &Rc<ScriptFunc>, index: usize, body: &'a Stmt<'a>) {
        self.bodies.borrow_mut().insert((func_key(func), index), body);
    }

    pub fn body(&self, func: &Rc<ScriptFunc>, index: usize) -> Option<&'a Stmt<'a>> {
        self.bodies.borrow().get(&(func_key(func), index)).copied()
    }
}

impl TreeBodies for Interpreter<'_> {
    fn call_tree(
        &self,
        func: &Rc<ScriptFunc>,
        body: usize,
        args: Vec<Val>,
        rt: &Runtime<'_>,
    ) -> Result<Val, RuntimeError> {
        let Some(stmt) = self.body(func, body) else {
            internal_error!("no tree for body {} of {}", body, func.name);
        };
        let mut frame = Frame::new(func.frame_size());
        for (param, arg) in func.params.iter().zip(args) {
            frame.set(param.offset(), arg);
        }
        match exec(stmt, &mut frame, rt)? {
            Flow::Return(v) => Ok(v),
            _ => Ok(Val::Void),
        }
    }
}

pub fn exec(stmt: &Stmt<'_>, frame: &mut Frame, rt: &Runtime<'_>) -> Result<Flow, RuntimeError> {
    trace!(stmt = stmt.describe(), "exec");
    exec_kind(stmt, frame, rt).map_err(|err| err.at(stmt.span))
}

fn exec_kind(stmt: &Stmt<'_>, frame: &mut Frame, rt: &Runtime<'_>) -> Result<Flow, RuntimeError> {
    match &stmt.kind {
        StmtKind::List(stmts) => {
            for s in stmts.iter() {
                let flow = exec(s, frame, rt)?;
                if flow != Flow::Normal {
                    return Ok(flow);
                }
            }
            Ok(Flow::Normal)
        }
        StmtKind::Expr(e) | StmtKind::Event(e) => {
            eval(e, frame, rt)?;
            Ok(Flow::Normal)
        }
        StmtKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            if eval(cond, frame, rt)?.as_bool() {
                exec(then_branch, frame, rt)
            } else {
                exec(else_branch, frame, rt)
            }
        }
        StmtKind::While {
            cond,
            cond_stmt,
            body,
        } => {
            loop {
                if let Some(cs) = cond_stmt {
                    exec(cs, frame, rt)?;
                }
                if !eval(cond, frame, rt)?.as_bool() {
                    break;
                }
                match exec(body, frame, rt)? {
                    Flow::Break => break,
                    Flow::Return(v) => return Ok(Flow::Return(v)),
                    _ => {}
                }
                count_iteration(frame, rt)?;
            }
            Ok(Flow::Normal)
        }
        StmtKind::For {
            vars,
            value_var,
            over,
            body,
        } => {
            let aggr = eval(over, frame, rt)?;
            for (keys, value) in loop_items(&aggr, Some(stmt.span))? {
                for (var, key) in vars.iter().zip(keys) {
                    write_id(var, key, frame);
                }
                if let (Some(var), Some(value)) = (value_var, value) {
                    write_id(var, value, frame);
                }
                match exec(body, frame, rt)? {
                    Flow::Break => break,
                    Flow::Return(v) => return Ok(Flow::Return(v)),
                    _ => {}
                }
                count_iteration(frame, rt)?;
            }
            Ok(Flow::Normal)
        }
        StmtKind::Switch {
            expr,
            cases,
            default,
        } => {
            let v = eval(expr, frame, rt)?;
            let mut start = None;
            'cases: for (i, case) in cases.iter().enumerate() {
                for e in case.exprs.iter() {
                    if eval(e, frame, rt)? == v {
                        start = Some(i);
                        break 'cases;
                    }
                }
                for (binding, ty) in case.types.iter() {
                    if v.conforms_to(ty) {
                        if let Some(b) = binding {
                            write_id(b, v.clone(), frame);
                        }
                        start = Some(i);
                        break 'cases;
                    }
                }
            }
            let Some(start) = start.or(*default) else {
                return Ok(Flow::Normal);
            };
            for case in &cases[start..] {
                match exec(case.body, frame, rt)? {
                    Flow::Fallthrough => continue,
                    Flow::Break | Flow::Normal => return Ok(Flow::Normal),
                    other => return Ok(other),
                }
            }
            Ok(Flow::Normal)
        }
        StmtKind::Return(value) => Ok(Flow::Return(match value {
            Some(e) => eval(e, frame, rt)?,
            None => Val::Void,
        })),
        StmtKind::Next => Ok(Flow::Next),
        StmtKind::Break => Ok(Flow::Break),
        StmtKind::Fallthrough => Ok(Flow::Fallthrough),
        StmtKind::Null => Ok(Flow::Normal),
        StmtKind::Print(args) => {
            let vals = eval_all(args, frame, rt)?;
            let line: Vec<String> = vals.iter().map(ToString::to_string).collect();
            rt.events.print(&line.join(", "));
            Ok(Flow::Normal)
        }
        StmtKind::Add(target) => {
            let ExprKind::Index { aggr, index } = &target.kind else {
                internal_error!("add of {:?}", target.tag());
            };
            let set = eval(aggr, frame, rt)?;
            let key = eval(index, frame, rt)?;
            let Val::Table(t) = &set else {
                return Err(eval::clash("set", &set, Some(target.span)));
            };
            t.borrow_mut().add(TableKey::from_val(&key));
            Ok(Flow::Normal)
        }
        StmtKind::Delete(target) => {
            match &target.kind {
                ExprKind::Index { aggr, index } => {
                    let table = eval(aggr, frame, rt)?;
                    let key = eval(index, frame, rt)?;
                    let Val::Table(t) = &table else {
                        return Err(eval::clash("table", &table, Some(target.span)));
                    };
                    t.borrow_mut().remove(&TableKey::from_val(&key));
                }
                ExprKind::Field { record, field } => {
                    let r = eval(record, frame, rt)?;
                    let Val::Record(r) = &r else {
                        return Err(eval::clash("record", &r, Some(target.span)));
                    };
                    r.borrow_mut().fields[*field] = None;
                }
                _ => internal_error!("delete of {:?}", target.tag()),
            }
            Ok(Flow::Normal)
        }
        StmtKind::Init(ids) => {
            for id in ids.iter() {
                init_local(id, frame);
            }
            Ok(Flow::Normal)
        }
        StmtKind::CheckAnyLen { expr, len } => {
            let v = eval(expr, frame, rt)?;
            let actual = match &v {
                Val::List(items) => items.len(),
                other => return Err(eval::clash("list", other, Some(expr.span))),
            };
            if actual != *len {
                return Err(RuntimeError::LengthMismatch {
                    left: *len,
                    right: actual,
                    span: Some(expr.span),
                });
            }
            Ok(Flow::Normal)
        }
        StmtKind::CatchReturn { body, ret_var } => match exec(body, frame, rt)? {
            Flow::Return(v) => {
                if let Some(var) = ret_var {
                    write_id(var, v, frame);
                }
                Ok(Flow::Normal)
            }
            other => Ok(other),
        },
        // Without a trigger manager there is nothing to re-evaluate the
        // condition later, so an unsatisfied `when` is skipped.
        StmtKind::When {
            cond,
            cond_stmt,
            body,
        } => {
            if let Some(cs) = cond_stmt {
                exec(cs, frame, rt)?;
            }
            if eval(cond, frame, rt)?.as_bool() {
                exec(body, frame, rt)
            } else {
                Ok(Flow::Normal)
            }
        }
    }
}

fn init_local(id: &IdPtr, frame: &mut Frame) {
    match empty_aggregate(&id.ty) {
        Some(v) => frame.set(id.offset(), v),
        None => frame.clear(id.offset()),
    }
}

/// Iteration items of a loop: the index components, plus the element
/// for loops that bind a value.
pub(crate) fn loop_items(
    aggr: &Val,
    span: Option<Span>,
) -> Result<Vec<(Vec<Val>, Option<Val>)>, RuntimeError> {
    Ok(match aggr {
        Val::Vector(v) => v
            .borrow()
            .elems
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|e| (vec_of(Val::Count(i as u64)), Some(e.clone()))))
            .collect(),
        Val::Table(t) => {
            let t = t.borrow();
            let is_set = t.is_set();
            t.iter()
                .map(|(k, v)| (k.0.to_vec(), (!is_set).then(|| v.clone())))
                .collect()
        }
        Val::Str(s) => s
            .chars()
            .map(|c| {
                let mut buf = [0u8; 4];
                (vec_of(Val::str(c.encode_utf8(&mut buf))), None)
            })
            .collect(),
        other => return Err(eval::clash("iterable", other, span)),
    })
}

fn vec_of(v: Val) -> Vec<Val> {
    let mut out = Vec::with_capacity(1);
    out.push(v);
    out
}
