//! Direct evaluation of expression trees.

use core::cell::RefCell;

use crate::api::Span;
use crate::ast::{BinaryOp, Expr, ExprKind, IdPtr};
use crate::interp::{Runtime, RuntimeError};
use crate::types::Type;
use crate::values::{
    BuiltinRegistry, EventSink, Func, RecordVal, TableKey, TableVal, Val, VectorVal, ops,
};
use crate::{Rc, String, ToString, Vec};

/// Interpreter frame: one slot per local, parameter and temporary.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    slots: Vec<Option<Val>>,
    /// Backward branches taken so far, for the iteration limit.
    pub(crate) iterations: usize,
}

impl Frame {
    pub fn new(size: usize) -> Self {
        Frame {
            slots: (0..size).map(|_| None).collect(),
            iterations: 0,
        }
    }

    pub fn get(&self, offset: usize) -> Option<&Val> {
        self.slots.get(offset).and_then(Option::as_ref)
    }

    pub fn set(&mut self, offset: usize, val: Val) {
        if offset >= self.slots.len() {
            self.slots.resize(offset + 1, None);
        }
        self.slots[offset] = Some(val);
    }

    pub fn clear(&mut self, offset: usize) {
        if let Some(slot) = self.slots.get_mut(offset) {
            *slot = None;
        }
    }
}

pub fn eval(e: &Expr<'_>, frame: &mut Frame, rt: &Runtime<'_>) -> Result<Val, RuntimeError> {
    eval_kind(e, frame, rt).map_err(|err| err.at(e.span))
}

/// Evaluate an expression with no frame and no event delivery: the
/// folding entry point. Only constants and calls to foldable built-ins
/// can appear.
pub fn eval_const(e: &Expr<'_>, builtins: &dyn BuiltinRegistry) -> Result<Val, RuntimeError> {
    let rt = Runtime::new(builtins, &Discard);
    eval(e, &mut Frame::default(), &rt)
}

struct Discard;

impl EventSink for Discard {
    fn enqueue(&self, _event: &str, _args: Vec<Val>) {}

    fn schedule(&self, _delay: f64, _event: &str, _args: Vec<Val>) -> u64 {
        0
    }
}

fn eval_kind(e: &Expr<'_>, frame: &mut Frame, rt: &Runtime<'_>) -> Result<Val, RuntimeError> {
    let span = Some(e.span);
    Ok(match &e.kind {
        ExprKind::Name(id) => read_id(id, frame, span)?,
        ExprKind::Const(v) => v.clone(),
        ExprKind::Unary { op, operand } if op.is_assigning() => {
            let target = operand.target();
            let old = eval(target, frame, rt)?;
            let new = ops::unary(*op, &old, &e.ty, span)?;
            assign(target, new.clone(), frame, rt)?;
            new
        }
        ExprKind::Unary { op, operand } => {
            let v = eval(operand, frame, rt)?;
            ops::unary(*op, &v, &e.ty, span)?
        }
        ExprKind::Binary {
            op: BinaryOp::AndAnd,
            lhs,
            rhs,
        } => Val::Bool(eval(lhs, frame, rt)?.as_bool() && eval(rhs, frame, rt)?.as_bool()),
        ExprKind::Binary {
            op: BinaryOp::OrOr,
            lhs,
            rhs,
        } => Val::Bool(eval(lhs, frame, rt)?.as_bool() || eval(rhs, frame, rt)?.as_bool()),
        ExprKind::Binary { op, lhs, rhs } if op.is_assigning() => {
            let target = lhs.target();
            let current = eval(target, frame, rt)?;
            let r = eval(rhs, frame, rt)?;
            compound_assign(*op, target, current, &r, frame, rt, span)?
        }
        ExprKind::Binary { op, lhs, rhs } => {
            let l = eval(lhs, frame, rt)?;
            let r = eval(rhs, frame, rt)?;
            ops::binary(*op, &l, &r, &e.ty, span)?
        }
        ExprKind::Cond {
            cond,
            then_expr,
            else_expr,
        } => {
            if eval(cond, frame, rt)?.as_bool() {
                eval(then_expr, frame, rt)?
            } else {
                eval(else_expr, frame, rt)?
            }
        }
        ExprKind::Ref(target) => eval(target, frame, rt)?,
        ExprKind::Assign { lhs, rhs, .. } => {
            let v = eval(rhs, frame, rt)?;
            match &lhs.kind {
                ExprKind::List(targets) => {
                    let Val::List(items) = &v else {
                        return Err(clash("list", &v, span));
                    };
                    if items.len() != targets.len() {
                        return Err(RuntimeError::LengthMismatch {
                            left: targets.len(),
                            right: items.len(),
                            span,
                        });
                    }
                    for (t, item) in targets.iter().zip(items.iter()) {
                        assign(t.target(), item.clone(), frame, rt)?;
                    }
                }
                _ => assign(lhs.target(), v.clone(), frame, rt)?,
            }
            v
        }
        ExprKind::IndexAssign { aggr, index, value } => {
            let a = eval(aggr, frame, rt)?;
            let idx = eval(index, frame, rt)?;
            let v = eval(value, frame, rt)?;
            store_index(&a, &idx, v.clone(), span)?;
            v
        }
        ExprKind::FieldLhsAssign {
            record,
            field,
            value,
        } => {
            let r = eval(record, frame, rt)?;
            let v = eval(value, frame, rt)?;
            store_field(&r, *field, v.clone(), span)?;
            v
        }
        ExprKind::Index { aggr, index } => {
            let a = eval(aggr, frame, rt)?;
            let idx = eval(index, frame, rt)?;
            load_index(&a, &idx, &e.ty, span)?
        }
        ExprKind::AnyIndex { operand, index } => {
            let v = eval(operand, frame, rt)?;
            any_index(&v, *index, span)?
        }
        ExprKind::Field { record, field } => {
            let r = eval(record, frame, rt)?;
            load_field(&r, *field, span)?
        }
        ExprKind::HasField { record, field } => {
            let r = eval(record, frame, rt)?;
            let Val::Record(r) = &r else {
                return Err(clash("record", &r, span));
            };
            Val::Bool(r.borrow().get(*field).is_some())
        }
        ExprKind::RecordCtor(fields) => {
            let Type::Record(rt_ty) = &*e.ty else {
                internal_error!("record constructor of type {}", e.ty);
            };
            let mut rec = RecordVal::with_defaults(rt_ty.clone());
            for assign in fields.iter() {
                let ExprKind::FieldAssign { field, value } = &assign.kind else {
                    internal_error!("record constructor item {:?}", assign.tag());
                };
                rec.set(*field, eval(value, frame, rt)?);
            }
            Val::Record(Rc::new(RefCell::new(rec)))
        }
        ExprKind::TableCtor(entries) => {
            let mut table = TableVal::new(e.ty.clone());
            for (key, value) in entries.iter() {
                let k = eval(key, frame, rt)?;
                let v = eval(value, frame, rt)?;
                table.insert(TableKey::from_val(&k), v);
            }
            Val::Table(Rc::new(RefCell::new(table)))
        }
        ExprKind::SetCtor(elems) => {
            let mut set = TableVal::new(e.ty.clone());
            for elem in elems.iter() {
                set.add(TableKey::from_val(&eval(elem, frame, rt)?));
            }
            Val::Table(Rc::new(RefCell::new(set)))
        }
        ExprKind::VectorCtor(elems) => {
            let elem_ty = e.ty.yield_type().cloned().unwrap_or_else(crate::types::any);
            let mut vals = Vec::with_capacity(elems.len());
            for elem in elems.iter() {
                vals.push(eval(elem, frame, rt)?);
            }
            Val::vector(elem_ty, vals)
        }
        ExprKind::FieldAssign { value, .. } => eval(value, frame, rt)?,
        ExprKind::List(elems) => Val::list(eval_all(elems, frame, rt)?),
        ExprKind::Call { func, args } => {
            let callee = eval(func, frame, rt)?;
            let args = eval_all(args, frame, rt)?;
            let Val::Func(callee) = &callee else {
                return Err(clash("function", &callee, span));
            };
            rt.call(callee, args, e.span)?
        }
        ExprKind::Lambda(func) => Val::Func(Rc::new(Func::Script(func.clone()))),
        ExprKind::Event { handler, args } => {
            let args = eval_all(args, frame, rt)?;
            rt.events.enqueue(&handler.name, args);
            Val::Void
        }
        ExprKind::Schedule { delay, event } => {
            let delay = eval(delay, frame, rt)?.as_double();
            let ExprKind::Event { handler, args } = &event.kind else {
                internal_error!("schedule of {:?}", event.tag());
            };
            let args = eval_all(args, frame, rt)?;
            Val::Timer(rt.events.schedule(delay, &handler.name, args))
        }
        ExprKind::Cast(operand) => {
            let v = eval(operand, frame, rt)?;
            if !v.conforms_to(&e.ty) {
                return Err(RuntimeError::TypeClash {
                    expected: e.ty.to_string(),
                    found: v.tag().to_string(),
                    span,
                });
            }
            v
        }
        ExprKind::Is { operand, test_ty } => Val::Bool(eval(operand, frame, rt)?.conforms_to(test_ty)),
        ExprKind::Nop => Val::Void,
    })
}

pub(crate) fn eval_all(
    exprs: &[&Expr<'_>],
    frame: &mut Frame,
    rt: &Runtime<'_>,
) -> Result<Vec<Val>, RuntimeError> {
    exprs.iter().map(|e| eval(e, frame, rt)).collect()
}

pub(crate) fn read_id(id: &IdPtr, frame: &Frame, span: Option<Span>) -> Result<Val, RuntimeError> {
    let found = if id.is_global() {
        id.value()
    } else {
        frame.get(id.offset()).cloned()
    };
    found.ok_or_else(|| RuntimeError::ValueNotSet {
        name: id.name.clone(),
        span,
    })
}

pub(crate) fn write_id(id: &IdPtr, val: Val, frame: &mut Frame) {
    if id.is_global() {
        id.set_value(val);
    } else {
        frame.set(id.offset(), val);
    }
}

/// Store `val` into the location `target` denotes.
pub(crate) fn assign(
    target: &Expr<'_>,
    val: Val,
    frame: &mut Frame,
    rt: &Runtime<'_>,
) -> Result<(), RuntimeError> {
    match &target.kind {
        ExprKind::Name(id) => {
            write_id(id, val, frame);
            Ok(())
        }
        ExprKind::Index { aggr, index } => {
            let a = eval(aggr, frame, rt)?;
            let idx = eval(index, frame, rt)?;
            store_index(&a, &idx, val, Some(target.span))
        }
        ExprKind::Field { record, field } => {
            let r = eval(record, frame, rt)?;
            store_field(&r, *field, val, Some(target.span))
        }
        _ => internal_error!("assignment to {:?}", target.tag()),
    }
}

fn compound_assign(
    op: BinaryOp,
    target: &Expr<'_>,
    current: Val,
    r: &Val,
    frame: &mut Frame,
    rt: &Runtime<'_>,
    span: Option<Span>,
) -> Result<Val, RuntimeError> {
    match (&current, op) {
        (Val::Vector(v), BinaryOp::AppendTo) => {
            v.borrow_mut().push(r.clone());
            Ok(current)
        }
        (Val::Table(_), _) => {
            ops::binary(op, &current, r, &target.ty, span)?;
            Ok(current)
        }
        _ => {
            let new = ops::binary(op.underlying(), &current, r, &target.ty, span)?;
            assign(target, new.clone(), frame, rt)?;
            Ok(new)
        }
    }
}

/// Resolve a possibly negative vector index against `len`.
pub(crate) fn vector_slot(index: i64, len: usize, span: Option<Span>) -> Result<usize, RuntimeError> {
    let resolved = if index < 0 { index + len as i64 } else { index };
    if resolved < 0 || resolved as usize >= len {
        return Err(RuntimeError::IndexOutOfRange { index, len, span });
    }
    Ok(resolved as usize)
}

fn single_index(idx: &Val) -> &Val {
    match idx {
        Val::List(items) if items.len() == 1 => &items[0],
        other => other,
    }
}

pub(crate) fn load_index(
    aggr: &Val,
    idx: &Val,
    ty: &Type,
    span: Option<Span>,
) -> Result<Val, RuntimeError> {
    match aggr {
        Val::Vector(v) => {
            let v = v.borrow();
            match single_index(idx) {
                Val::Vector(selector) => select(&v, &selector.borrow(), ty, span),
                i => {
                    let Some(i) = i.as_index() else {
                        return Err(clash("index", i, span));
                    };
                    let slot = vector_slot(i, v.len(), span)?;
                    v.get(slot)
                        .cloned()
                        .ok_or(RuntimeError::IndexOutOfRange { index: i, len: v.len(), span })
                }
            }
        }
        Val::Table(t) => {
            let t = t.borrow();
            let key = TableKey::from_val(idx);
            if t.is_set() {
                return Ok(Val::Bool(t.contains(&key)));
            }
            t.get(&key).cloned().ok_or(RuntimeError::NoSuchIndex { span })
        }
        Val::Str(s) => substring(s, idx, span),
        other => Err(clash("indexable value", other, span)),
    }
}

/// `v[sel]`: a boolean selector keeps elements where it is true, an
/// index vector gathers the named elements.
fn select(
    v: &VectorVal,
    selector: &VectorVal,
    ty: &Type,
    span: Option<Span>,
) -> Result<Val, RuntimeError> {
    let elem_ty = match ty {
        Type::Vector(elem) => elem.clone(),
        _ => v.elem_type.clone(),
    };
    let mut out = VectorVal::new(elem_ty);
    let by_mask = selector.elems.iter().flatten().all(|s| matches!(s, Val::Bool(_)));
    if by_mask {
        if selector.len() != v.len() {
            return Err(RuntimeError::LengthMismatch {
                left: v.len(),
                right: selector.len(),
                span,
            });
        }
        for (elem, keep) in v.elems.iter().zip(&selector.elems) {
            if matches!(keep, Some(Val::Bool(true))) {
                out.elems.push(elem.clone());
            }
        }
    } else {
        for s in selector.elems.iter().flatten() {
            let Some(i) = s.as_index() else {
                return Err(clash("index", s, span));
            };
            let slot = vector_slot(i, v.len(), span)?;
            out.elems.push(v.elems[slot].clone());
        }
    }
    Ok(Val::Vector(Rc::new(RefCell::new(out))))
}

fn substring(s: &str, idx: &Val, span: Option<Span>) -> Result<Val, RuntimeError> {
    let len = s.len() as i64;
    let clamp = |i: i64| -> usize {
        let i = if i < 0 { i + len } else { i };
        i.clamp(0, len) as usize
    };
    let (start, end) = match idx {
        Val::List(items) if items.len() == 2 => {
            let (Some(a), Some(b)) = (items[0].as_index(), items[1].as_index()) else {
                return Err(clash("index", idx, span));
            };
            (clamp(a), clamp(b))
        }
        other => {
            let Some(i) = single_index(other).as_index() else {
                return Err(clash("index", other, span));
            };
            let start = clamp(i);
            (start, (start + 1).min(s.len()))
        }
    };
    Ok(Val::str(s.get(start..end.max(start)).unwrap_or("")))
}

pub(crate) fn store_index(
    aggr: &Val,
    idx: &Val,
    val: Val,
    span: Option<Span>,
) -> Result<(), RuntimeError> {
    match aggr {
        Val::Vector(v) => {
            let Some(i) = single_index(idx).as_index() else {
                return Err(clash("index", idx, span));
            };
            let mut v = v.borrow_mut();
            // Assigning past the end grows the vector, leaving holes.
            let slot = if i < 0 { vector_slot(i, v.len(), span)? } else { i as usize };
            v.set(slot, val);
            Ok(())
        }
        Val::Table(t) => {
            t.borrow_mut().insert(TableKey::from_val(idx), val);
            Ok(())
        }
        other => Err(clash("assignable aggregate", other, span)),
    }
}

pub(crate) fn load_field(r: &Val, field: usize, span: Option<Span>) -> Result<Val, RuntimeError> {
    let Val::Record(r) = r else {
        return Err(clash("record", r, span));
    };
    let r = r.borrow();
    r.get(field).cloned().ok_or_else(|| RuntimeError::FieldNotSet {
        field: r.ty.fields[field].name.clone(),
        span,
    })
}

pub(crate) fn store_field(
    r: &Val,
    field: usize,
    val: Val,
    span: Option<Span>,
) -> Result<(), RuntimeError> {
    let Val::Record(r) = r else {
        return Err(clash("record", r, span));
    };
    r.borrow_mut().set(field, val);
    Ok(())
}

pub(crate) fn any_index(v: &Val, index: usize, span: Option<Span>) -> Result<Val, RuntimeError> {
    let Val::List(items) = v else {
        return Err(clash("list", v, span));
    };
    items
        .get(index)
        .cloned()
        .ok_or(RuntimeError::IndexOutOfRange {
            index: index as i64,
            len: items.len(),
            span,
        })
}

pub(crate) fn clash(expected: &str, found: &Val, span: Option<Span>) -> RuntimeError {
    RuntimeError::TypeClash {
        expected: String::from(expected),
        found: found.tag().to_string(),
        span,
    }
}

/// Increment for loop-carried bookkeeping; errors once the configured
/// limit is passed.
pub(crate) fn count_iteration(frame: &mut Frame, rt: &Runtime<'_>) -> Result<(), RuntimeError> {
    frame.iterations += 1;
    match rt.options.max_iterations {
        Some(limit) if frame.iterations > limit => {
            Err(RuntimeError::IterationLimit { limit, span: None })
        }
        _ => Ok(()),
    }
}
