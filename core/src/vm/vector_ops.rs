//! Element-wise vector operations.
//!
//! Every operation allocates a fresh result vector; operands are never
//! modified, so a vector shared by several slots cannot change under
//! another holder. Holes in either operand stay holes in the result.

use core::cell::RefCell;

use crate::api::Span;
use crate::ast::{BinaryOp, UnaryOp};
use crate::interp::RuntimeError;
use crate::types::Type;
use crate::values::{Val, VectorVal, ops};
use crate::{Rc, Vec};

pub fn vector_unary(
    op: UnaryOp,
    v: &Val,
    ty: &Type,
    span: Option<Span>,
) -> Result<Val, RuntimeError> {
    let (Val::Vector(vec), Type::Vector(elem_ty)) = (v, ty) else {
        internal_error!("vector_unary on {:?}", v.tag());
    };
    let source = vec.borrow();
    let mut elems = Vec::with_capacity(source.len());
    for elem in &source.elems {
        elems.push(match elem {
            Some(e) => Some(ops::unary(op, e, elem_ty, span)?),
            None => None,
        });
    }
    Ok(fresh(elem_ty.clone(), elems))
}

/// Apply `op` pairwise, or broadcast a scalar operand across the vector.
pub fn vector_binary(
    op: BinaryOp,
    l: &Val,
    r: &Val,
    ty: &Type,
    span: Option<Span>,
) -> Result<Val, RuntimeError> {
    let Type::Vector(elem_ty) = ty else {
        internal_error!("vector_binary producing {}", ty);
    };
    let elems = match (l, r) {
        (Val::Vector(a), Val::Vector(b)) => {
            let (a, b) = (a.borrow(), b.borrow());
            if a.len() != b.len() {
                return Err(RuntimeError::LengthMismatch {
                    left: a.len(),
                    right: b.len(),
                    span,
                });
            }
            let mut elems = Vec::with_capacity(a.len());
            for (x, y) in a.elems.iter().zip(&b.elems) {
                elems.push(match (x, y) {
                    (Some(x), Some(y)) => Some(ops::binary(op, x, y, elem_ty, span)?),
                    _ => None,
                });
            }
            elems
        }
        (Val::Vector(a), scalar) => broadcast(&a.borrow(), |x| {
            ops::binary(op, x, scalar, elem_ty, span)
        })?,
        (scalar, Val::Vector(b)) => broadcast(&b.borrow(), |y| {
            ops::binary(op, scalar, y, elem_ty, span)
        })?,
        _ => internal_error!("vector_binary without a vector operand"),
    };
    Ok(fresh(elem_ty.clone(), elems))
}

fn broadcast(
    source: &VectorVal,
    mut f: impl FnMut(&Val) -> Result<Val, RuntimeError>,
) -> Result<Vec<Option<Val>>, RuntimeError> {
    source
        .elems
        .iter()
        .map(|e| e.as_ref().map(&mut f).transpose())
        .collect()
}

fn fresh(elem_type: crate::types::TypeRef, elems: Vec<Option<Val>>) -> Val {
    Val::Vector(Rc::new(RefCell::new(VectorVal { elem_type, elems })))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::types;
    use crate::vec;

    fn counts(items: &[u64]) -> Val {
        Val::vector(types::count(), items.iter().map(|c| Val::Count(*c)).collect())
    }

    #[test]
    fn test_pairwise_add_allocates_fresh_result() {
        let a = counts(&[1, 2, 3]);
        let b = counts(&[10, 20, 30]);
        let ty = types::vector_of(types::count());
        let sum = vector_binary(BinaryOp::Add, &a, &b, &ty, None).unwrap();
        assert_eq!(sum, counts(&[11, 22, 33]));
        assert!(!sum.same_as(&a));
        assert_eq!(a, counts(&[1, 2, 3]));
    }

    #[test]
    fn test_scalar_broadcast() {
        let a = counts(&[1, 2, 3]);
        let ty = types::vector_of(types::count());
        let scaled = vector_binary(BinaryOp::Times, &Val::Count(2), &a, &ty, None).unwrap();
        assert_eq!(scaled, counts(&[2, 4, 6]));
    }

    #[test]
    fn test_comparison_yields_bool_vector() {
        let a = counts(&[1, 5]);
        let b = counts(&[3, 3]);
        let ty = types::vector_of(types::bool());
        let lt = vector_binary(BinaryOp::Lt, &a, &b, &ty, None).unwrap();
        assert_eq!(
            lt,
            Val::vector(types::bool(), vec![Val::Bool(true), Val::Bool(false)])
        );
    }

    #[test]
    fn test_length_mismatch() {
        let ty = types::vector_of(types::count());
        let result = vector_binary(BinaryOp::Add, &counts(&[1]), &counts(&[1, 2]), &ty, None);
        assert!(matches!(
            result,
            Err(RuntimeError::LengthMismatch { left: 1, right: 2, .. })
        ));
    }

    #[test]
    fn test_holes_propagate() {
        let mut holey = VectorVal::new(types::int());
        holey.set(1, Val::Int(4));
        let v = Val::Vector(Rc::new(RefCell::new(holey)));
        let ty = types::vector_of(types::int());
        let neg = vector_unary(UnaryOp::Neg, &v, &ty, None).unwrap();
        let Val::Vector(neg) = neg else { unreachable!() };
        assert_eq!(neg.borrow().elems, vec![None, Some(Val::Int(-4))]);
    }
}
