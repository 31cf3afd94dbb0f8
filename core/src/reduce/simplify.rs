//! Algebraic simplification and constant folding over singletons.

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::types::{self, InternalType, Type};

/// What an algebraic identity turns `lhs op rhs` into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Simplification {
    /// The left operand unchanged: `x + 0`, `x * 1`, `x & x`.
    Left,
    /// The right operand unchanged: `0 + x`, `1 * x`.
    Right,
    /// The zero of the result type: `x - x`, `x * 0`.
    Zero,
    /// A constant truth value: `x == x`, `x < x`.
    Bool(bool),
    /// A constant truth value from comparing an unsigned value against
    /// zero. Legal but almost certainly a mistake, so it warns.
    Degenerate(bool),
}

/// The identity that applies to `lhs op rhs` (operands already reduced to
/// singletons, `ty` the result type), if any.
///
/// Only scalar results simplify: `x - x` over vectors or tables is an
/// element-wise or set operation and keeps its meaning. Identities that
/// produce zero skip doubles, where NaN and infinity break them.
pub fn will_transform(
    op: BinaryOp,
    lhs: &Expr<'_>,
    rhs: &Expr<'_>,
    ty: &Type,
) -> Option<Simplification> {
    use Simplification::*;

    let scalar = ty.is_arithmetic();
    let keeps = |e: &Expr<'_>| types::same_type(&e.ty, ty);
    let same = lhs.same_name(rhs);

    match op {
        BinaryOp::Add if scalar => {
            if rhs.is_zero() && keeps(lhs) {
                Some(Left)
            } else if lhs.is_zero() && keeps(rhs) {
                Some(Right)
            } else {
                None
            }
        }
        BinaryOp::Sub if scalar => {
            if rhs.is_zero() && keeps(lhs) {
                Some(Left)
            } else if same && ty.internal_type() != InternalType::Double {
                Some(Zero)
            } else {
                None
            }
        }
        BinaryOp::Times if scalar => {
            if rhs.is_one() && keeps(lhs) {
                Some(Left)
            } else if lhs.is_one() && keeps(rhs) {
                Some(Right)
            } else if (lhs.is_zero() || rhs.is_zero()) && ty.internal_type() != InternalType::Double {
                Some(Zero)
            } else {
                None
            }
        }
        BinaryOp::Divide if scalar && rhs.is_one() && keeps(lhs) => Some(Left),
        BinaryOp::And | BinaryOp::Or if same && matches!(ty, Type::Count) => Some(Left),
        BinaryOp::Eq | BinaryOp::Le | BinaryOp::Ge if same && self_comparable(lhs) => Some(Bool(true)),
        BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Gt if same && self_comparable(lhs) => {
            Some(Bool(false))
        }
        BinaryOp::Lt if unsigned(lhs) && rhs.is_zero() => Some(Degenerate(false)),
        BinaryOp::Ge if unsigned(lhs) && rhs.is_zero() => Some(Degenerate(true)),
        BinaryOp::Gt if lhs.is_zero() && unsigned(rhs) => Some(Degenerate(false)),
        BinaryOp::Le if lhs.is_zero() && unsigned(rhs) => Some(Degenerate(true)),
        _ => None,
    }
}

/// Atomic values other than doubles equal themselves; NaN does not.
fn self_comparable(e: &Expr<'_>) -> bool {
    e.ty.is_atomic() && e.ty.internal_type() != InternalType::Double
}

fn unsigned(e: &Expr<'_>) -> bool {
    !e.is_const() && matches!(*e.ty, Type::Count)
}

/// Unary operators that fold over a constant operand into an atomic
/// result.
pub(crate) fn folds_unary(op: UnaryOp, ty: &Type) -> bool {
    matches!(
        op,
        UnaryOp::Not
            | UnaryOp::Complement
            | UnaryOp::Pos
            | UnaryOp::Neg
            | UnaryOp::ArithCoerce
            | UnaryOp::Size
    ) && ty.is_atomic()
}

/// `op(op(x))` for the self-inverse operators, when it gives back `x`.
pub(crate) fn double_negation<'a>(op: UnaryOp, operand: &'a Expr<'a>, ty: &Type) -> Option<&'a Expr<'a>> {
    if !matches!(op, UnaryOp::Neg | UnaryOp::Not | UnaryOp::Complement) {
        return None;
    }
    match &operand.kind {
        crate::ast::ExprKind::Unary {
            op: inner_op,
            operand: inner,
        } if *inner_op == op && types::same_type(&inner.ty, ty) => Some(*inner),
        _ => None,
    }
}

/// Message for a comparison that can only go one way.
pub(crate) fn degenerate_message(op: BinaryOp, outcome: bool) -> crate::String {
    crate::format!(
        "comparison of count with 0 using '{}' is always {}",
        op.symbol(),
        outcome
    )
}
