//! Operator semantics shared by constant folding, the tree interpreter
//! and the bytecode engine.
//!
//! Operands arrive already coerced to a common internal representation,
//! so dispatch is on the pair of value variants; `ty` is the result type
//! of the node being evaluated and picks the flavor of double results
//! (time, interval or plain double).

use core::cell::RefCell;
use core::cmp::Ordering;

use crate::api::Span;
use crate::ast::{BinaryOp, UnaryOp};
use crate::interp::RuntimeError;
use crate::types::{InternalType, Type};
use crate::values::{RecordVal, TableKey, TableVal, Val, VectorVal, addr_bits, addr_key};
use crate::vm::vector_ops;
use crate::{Rc, String, ToString, format};

pub fn unary(op: UnaryOp, v: &Val, ty: &Type, span: Option<Span>) -> Result<Val, RuntimeError> {
    if matches!((v, ty), (Val::Vector(_), Type::Vector(_))) && op.is_elementwise() {
        return vector_ops::vector_unary(op, v, ty, span);
    }

    Ok(match op {
        UnaryOp::Not => Val::Bool(!v.as_bool()),
        UnaryOp::Complement => Val::Count(!v.as_count()),
        UnaryOp::Pos | UnaryOp::ArithCoerce => coerce_arith(v, ty),
        UnaryOp::Neg => match coerce_arith(v, ty) {
            Val::Int(i) => Val::Int(i.wrapping_neg()),
            Val::Count(c) => Val::Count(c.wrapping_neg()),
            Val::Double(d) | Val::Time(d) | Val::Interval(d) => Val::from_double(ty, -d),
            other => return Err(clash("arithmetic value", &other, span)),
        },
        UnaryOp::Incr | UnaryOp::Decr => {
            let delta = if op == UnaryOp::Incr { 1 } else { -1 };
            match v {
                Val::Int(i) => Val::Int(i.wrapping_add(delta)),
                Val::Count(c) => Val::Count(c.wrapping_add_signed(delta)),
                other => return Err(clash("int or count", other, span)),
            }
        }
        UnaryOp::Size => size(v),
        UnaryOp::Clone => v.deep_clone(),
        UnaryOp::RecordCoerce => coerce_record(v, ty, span)?,
        UnaryOp::TableCoerce => match (v, ty) {
            (Val::Table(t), Type::Table { .. }) => {
                let t = t.borrow();
                let mut fresh = TableVal::new(Rc::new(ty.clone()));
                for (key, val) in t.iter() {
                    fresh.insert(key.clone(), val.clone());
                }
                Val::Table(Rc::new(RefCell::new(fresh)))
            }
            (other, _) => return Err(clash("table", other, span)),
        },
        UnaryOp::VectorCoerce => match (v, ty) {
            (Val::Vector(vv), Type::Vector(elem)) => Val::Vector(Rc::new(RefCell::new(VectorVal {
                elem_type: elem.clone(),
                elems: vv.borrow().elems.clone(),
            }))),
            (other, _) => return Err(clash("vector", other, span)),
        },
        UnaryOp::ToAny => v.clone(),
        UnaryOp::FromAny => {
            if !v.conforms_to(ty) {
                return Err(RuntimeError::TypeClash {
                    expected: ty.to_string(),
                    found: describe(v),
                    span,
                });
            }
            v.clone()
        }
    })
}

pub fn binary(
    op: BinaryOp,
    l: &Val,
    r: &Val,
    ty: &Type,
    span: Option<Span>,
) -> Result<Val, RuntimeError> {
    if matches!(ty, Type::Vector(_))
        && (matches!(l, Val::Vector(_)) || matches!(r, Val::Vector(_)))
        && op != BinaryOp::AppendTo
    {
        return vector_ops::vector_binary(op, l, r, ty, span);
    }

    let op = match op {
        BinaryOp::AddTo if !matches!(l, Val::Table(_)) => BinaryOp::Add,
        BinaryOp::RemoveFrom if !matches!(l, Val::Table(_)) => BinaryOp::Sub,
        other => other,
    };

    if op == BinaryOp::In {
        return contains(l, r, span).map(Val::Bool);
    }

    match (l, r) {
        (Val::Int(a), Val::Int(b)) => int_op(op, *a, *b, span),
        (Val::Count(a), Val::Count(b)) => count_op(op, *a, *b, span),
        (Val::Double(a), Val::Double(b))
        | (Val::Time(a), Val::Time(b))
        | (Val::Interval(a), Val::Interval(b))
        | (Val::Time(a), Val::Interval(b))
        | (Val::Interval(a), Val::Time(b))
        | (Val::Double(a), Val::Interval(b))
        | (Val::Interval(a), Val::Double(b)) => double_op(op, *a, *b, ty, span),
        (Val::Bool(a), Val::Bool(b)) => bool_op(op, *a, *b, span),
        (Val::Str(a), Val::Str(b)) => match op {
            BinaryOp::Add => {
                let mut s = String::with_capacity(a.len() + b.len());
                s.push_str(a);
                s.push_str(b);
                Ok(Val::Str(Rc::from(s.as_str())))
            }
            _ => ordered(op, a.as_ref().cmp(b.as_ref()), l, span),
        },
        (Val::Pattern(a), Val::Pattern(b)) => match op {
            BinaryOp::And => Ok(Val::pattern(&format!("({})({})", a, b))),
            BinaryOp::Or => Ok(Val::pattern(&format!("({})|({})", a, b))),
            BinaryOp::Eq => Ok(Val::Bool(a == b)),
            BinaryOp::Ne => Ok(Val::Bool(a != b)),
            _ => Err(unsupported(op, l, span)),
        },
        (Val::Addr(a), Val::Addr(b)) => ordered(op, addr_key(a).cmp(&addr_key(b)), l, span),
        (Val::Port(a), Val::Port(b)) => ordered(op, a.cmp(b), l, span),
        (Val::Enum(a), Val::Enum(b)) => ordered(op, a.cmp(b), l, span),
        (Val::Subnet(a), Val::Subnet(b)) => match op {
            BinaryOp::Eq => Ok(Val::Bool(a == b)),
            BinaryOp::Ne => Ok(Val::Bool(a != b)),
            _ => Err(unsupported(op, l, span)),
        },
        (Val::Table(a), Val::Table(b)) => table_op(op, a, b, l, span),
        (Val::Vector(v), elem) if op == BinaryOp::AppendTo => {
            v.borrow_mut().push(elem.clone());
            Ok(l.clone())
        }
        _ => Err(clash(&type_name(l), r, span)),
    }
}

fn int_op(op: BinaryOp, a: i64, b: i64, span: Option<Span>) -> Result<Val, RuntimeError> {
    Ok(match op {
        BinaryOp::Add => Val::Int(a.wrapping_add(b)),
        BinaryOp::Sub => Val::Int(a.wrapping_sub(b)),
        BinaryOp::Times => Val::Int(a.wrapping_mul(b)),
        BinaryOp::Divide => {
            if b == 0 {
                return Err(RuntimeError::DivisionByZero { span });
            }
            Val::Int(a.wrapping_div(b))
        }
        BinaryOp::Mod => {
            if b == 0 {
                return Err(RuntimeError::DivisionByZero { span });
            }
            Val::Int(a.wrapping_rem(b))
        }
        _ => return ordered(op, a.cmp(&b), &Val::Int(a), span),
    })
}

fn count_op(op: BinaryOp, a: u64, b: u64, span: Option<Span>) -> Result<Val, RuntimeError> {
    Ok(match op {
        BinaryOp::Add => Val::Count(a.wrapping_add(b)),
        BinaryOp::Sub => Val::Count(a.wrapping_sub(b)),
        BinaryOp::Times => Val::Count(a.wrapping_mul(b)),
        BinaryOp::Divide => {
            if b == 0 {
                return Err(RuntimeError::DivisionByZero { span });
            }
            Val::Count(a / b)
        }
        BinaryOp::Mod => {
            if b == 0 {
                return Err(RuntimeError::DivisionByZero { span });
            }
            Val::Count(a % b)
        }
        BinaryOp::And => Val::Count(a & b),
        BinaryOp::Or => Val::Count(a | b),
        BinaryOp::Xor => Val::Count(a ^ b),
        _ => return ordered(op, a.cmp(&b), &Val::Count(a), span),
    })
}

fn double_op(
    op: BinaryOp,
    a: f64,
    b: f64,
    ty: &Type,
    span: Option<Span>,
) -> Result<Val, RuntimeError> {
    let d = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Times => a * b,
        BinaryOp::Divide => {
            if b == 0.0 {
                return Err(RuntimeError::DivisionByZero { span });
            }
            a / b
        }
        BinaryOp::Mod => {
            if b == 0.0 {
                return Err(RuntimeError::DivisionByZero { span });
            }
            a % b
        }
        _ => {
            return match a.partial_cmp(&b) {
                Some(ord) => ordered(op, ord, &Val::Double(a), span),
                // NaN compares unequal to everything.
                None => Ok(Val::Bool(op == BinaryOp::Ne)),
            };
        }
    };
    Ok(Val::from_double(ty, d))
}

fn bool_op(op: BinaryOp, a: bool, b: bool, span: Option<Span>) -> Result<Val, RuntimeError> {
    Ok(Val::Bool(match op {
        BinaryOp::And | BinaryOp::AndAnd => a && b,
        BinaryOp::Or | BinaryOp::OrOr => a || b,
        BinaryOp::Xor => a != b,
        BinaryOp::Eq => a == b,
        BinaryOp::Ne => a != b,
        _ => return Err(unsupported(op, &Val::Bool(a), span)),
    }))
}

fn ordered(op: BinaryOp, ord: Ordering, l: &Val, span: Option<Span>) -> Result<Val, RuntimeError> {
    Ok(Val::Bool(match op {
        BinaryOp::Lt => ord == Ordering::Less,
        BinaryOp::Le => ord != Ordering::Greater,
        BinaryOp::Eq => ord == Ordering::Equal,
        BinaryOp::Ne => ord != Ordering::Equal,
        BinaryOp::Ge => ord != Ordering::Less,
        BinaryOp::Gt => ord == Ordering::Greater,
        _ => return Err(unsupported(op, l, span)),
    }))
}

fn table_op(
    op: BinaryOp,
    a: &Rc<RefCell<TableVal>>,
    b: &Rc<RefCell<TableVal>>,
    l: &Val,
    span: Option<Span>,
) -> Result<Val, RuntimeError> {
    let fresh = |t: TableVal| Ok(Val::Table(Rc::new(RefCell::new(t))));
    match op {
        BinaryOp::Or => {
            let mut union = a.borrow().clone();
            for (key, val) in b.borrow().iter() {
                union.insert(key.clone(), val.clone());
            }
            fresh(union)
        }
        BinaryOp::And => {
            let b = b.borrow();
            fresh(a.borrow().filtered(|k| b.contains(k)))
        }
        BinaryOp::Sub => {
            let b = b.borrow();
            fresh(a.borrow().filtered(|k| !b.contains(k)))
        }
        BinaryOp::AddTo => {
            if !Rc::ptr_eq(a, b) {
                let source = b.borrow();
                let mut target = a.borrow_mut();
                for (key, val) in source.iter() {
                    target.insert(key.clone(), val.clone());
                }
            }
            Ok(l.clone())
        }
        BinaryOp::RemoveFrom => {
            let keys = b.borrow().keys();
            let mut target = a.borrow_mut();
            for key in &keys {
                target.remove(key);
            }
            Ok(l.clone())
        }
        BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let (a, b) = (a.borrow(), b.borrow());
            let sub = a.is_subset_of(&b);
            let sup = b.is_subset_of(&a);
            Ok(Val::Bool(match op {
                BinaryOp::Eq => sub && sup,
                BinaryOp::Ne => !(sub && sup),
                BinaryOp::Lt => sub && !sup,
                BinaryOp::Le => sub,
                BinaryOp::Gt => sup && !sub,
                _ => sup,
            }))
        }
        _ => Err(unsupported(op, l, span)),
    }
}

/// `l in r`.
pub fn contains(l: &Val, r: &Val, span: Option<Span>) -> Result<bool, RuntimeError> {
    match r {
        Val::Table(t) => Ok(t.borrow().contains(&TableKey::from_val(l))),
        Val::Subnet(s) => match l {
            Val::Addr(a) => Ok(s.contains(a)),
            Val::Subnet(inner) => Ok(inner.width >= s.width && s.contains(&inner.prefix)),
            other => Err(clash("addr", other, span)),
        },
        Val::Str(haystack) => match l {
            Val::Str(needle) => Ok(haystack.contains(needle.as_ref())),
            other => Err(clash("string", other, span)),
        },
        Val::Vector(v) => match l.as_index() {
            Some(i) if i >= 0 => Ok(v.borrow().get(i as usize).is_some()),
            Some(_) => Ok(false),
            None => Err(clash("index", l, span)),
        },
        other => Err(clash("container", other, span)),
    }
}

/// Convert an arithmetic value to the internal representation of `ty`.
pub fn coerce_arith(v: &Val, ty: &Type) -> Val {
    let target = match ty {
        Type::Vector(elem) => elem.internal_type(),
        _ => ty.internal_type(),
    };
    match (target, v) {
        (InternalType::Int, Val::Int(i)) => Val::Int(*i),
        (InternalType::Int, Val::Count(c)) => Val::Int(*c as i64),
        (InternalType::Int, Val::Double(d)) => Val::Int(*d as i64),
        (InternalType::Unsigned, Val::Count(c)) => Val::Count(*c),
        (InternalType::Unsigned, Val::Int(i)) => Val::Count(*i as u64),
        (InternalType::Unsigned, Val::Double(d)) => Val::Count(*d as u64),
        (InternalType::Double, Val::Int(i)) => Val::from_double(ty, *i as f64),
        (InternalType::Double, Val::Count(c)) => Val::from_double(ty, *c as f64),
        (InternalType::Double, Val::Double(d) | Val::Time(d) | Val::Interval(d)) => {
            Val::from_double(ty, *d)
        }
        (_, other) => other.clone(),
    }
}

fn coerce_record(v: &Val, ty: &Type, span: Option<Span>) -> Result<Val, RuntimeError> {
    let (Val::Record(source), Type::Record(target)) = (v, ty) else {
        return Err(clash("record", v, span));
    };
    let source = source.borrow();
    let mut fresh = RecordVal::with_defaults(target.clone());
    for (i, decl) in target.fields.iter().enumerate() {
        let from = source
            .ty
            .field_offset(&decl.name)
            .and_then(|off| source.get(off));
        match from {
            Some(val) => fresh.set(i, val.clone()),
            None if decl.default.is_some() || decl.optional => {}
            None => {
                return Err(RuntimeError::FieldNotSet {
                    field: decl.name.clone(),
                    span,
                });
            }
        }
    }
    Ok(Val::Record(Rc::new(RefCell::new(fresh))))
}

fn size(v: &Val) -> Val {
    match v {
        Val::Str(s) | Val::Pattern(s) => Val::Count(s.len() as u64),
        Val::Vector(vv) => Val::Count(vv.borrow().len() as u64),
        Val::Table(t) => Val::Count(t.borrow().len() as u64),
        Val::List(l) => Val::Count(l.len() as u64),
        Val::Record(r) => Val::Count(r.borrow().fields.len() as u64),
        Val::Int(i) => Val::Count(i.unsigned_abs()),
        Val::Count(c) => Val::Count(*c),
        Val::Bool(b) => Val::Count(u64::from(*b)),
        Val::Double(d) | Val::Time(d) | Val::Interval(d) => {
            let magnitude = if *d < 0.0 { -*d } else { *d };
            Val::Double(magnitude)
        }
        Val::Addr(a) => Val::Count(u64::from(addr_bits(a))),
        Val::Subnet(s) => Val::Double(s.size()),
        Val::Port(p) => Val::Count(u64::from(p.number)),
        Val::Enum(e) => Val::Count(e.unsigned_abs()),
        other => internal_error!("size of {:?}", other),
    }
}

fn type_name(v: &Val) -> String {
    format!("{:?}", v.tag()).to_lowercase()
}

fn describe(v: &Val) -> String {
    match v {
        Val::Record(r) => format!("record {}", r.borrow().ty.name),
        other => type_name(other),
    }
}

fn clash(expected: &str, found: &Val, span: Option<Span>) -> RuntimeError {
    RuntimeError::TypeClash {
        expected: String::from(expected),
        found: describe(found),
        span,
    }
}

fn unsupported(op: BinaryOp, l: &Val, span: Option<Span>) -> RuntimeError {
    RuntimeError::TypeClash {
        expected: format!("operand supporting '{}'", op),
        found: describe(l),
        span,
    }
}
