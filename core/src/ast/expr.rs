use core::cell::Cell;
use core::fmt;

use crate::api::Span;
use crate::ast::IdPtr;
use crate::types::{Type, TypeRef};
use crate::values::{ScriptFunc, Val};
use crate::Rc;

#[derive(Debug)]
pub struct Expr<'a> {
    pub kind: ExprKind<'a>,
    pub ty: TypeRef,
    pub span: Span,
    /// The node this one was rewritten from, for diagnostics.
    pub original: Cell<Option<&'a Expr<'a>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Clone,
    Incr,
    Decr,
    Not,
    Complement,
    Pos,
    Neg,
    Size,
    ArithCoerce,
    RecordCoerce,
    TableCoerce,
    VectorCoerce,
    ToAny,
    FromAny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    AddTo,
    AppendTo,
    RemoveFrom,
    Times,
    Divide,
    Mod,
    And,
    Or,
    Xor,
    AndAnd,
    OrOr,
    Lt,
    Le,
    Eq,
    Ne,
    Ge,
    Gt,
    In,
}

#[derive(Debug)]
pub enum ExprKind<'a> {
    Name(IdPtr),
    Const(Val),
    Unary {
        op: UnaryOp,
        operand: &'a Expr<'a>,
    },
    Binary {
        op: BinaryOp,
        lhs: &'a Expr<'a>,
        rhs: &'a Expr<'a>,
    },
    Cond {
        cond: &'a Expr<'a>,
        then_expr: &'a Expr<'a>,
        else_expr: &'a Expr<'a>,
    },
    /// An assignable location: a name, index or field.
    Ref(&'a Expr<'a>),
    /// `lhs` is a `Ref`, or a `List` of them for destructuring.
    Assign {
        lhs: &'a Expr<'a>,
        rhs: &'a Expr<'a>,
        is_temp: bool,
    },
    /// `aggr[index] = value` over singletons.
    IndexAssign {
        aggr: &'a Expr<'a>,
        index: &'a Expr<'a>,
        value: &'a Expr<'a>,
    },
    /// `record$field = value` with `record` a name.
    FieldLhsAssign {
        record: &'a Expr<'a>,
        field: usize,
        value: &'a Expr<'a>,
    },
    /// `aggr[index]`; `index` is a `List`.
    Index {
        aggr: &'a Expr<'a>,
        index: &'a Expr<'a>,
    },
    /// Element `index` of an `any`-typed list, as produced by
    /// destructuring.
    AnyIndex {
        operand: &'a Expr<'a>,
        index: usize,
    },
    Field {
        record: &'a Expr<'a>,
        field: usize,
    },
    HasField {
        record: &'a Expr<'a>,
        field: usize,
    },
    /// Fields are `FieldAssign` nodes.
    RecordCtor(&'a [&'a Expr<'a>]),
    /// Keys are `List` nodes.
    TableCtor(&'a [(&'a Expr<'a>, &'a Expr<'a>)]),
    SetCtor(&'a [&'a Expr<'a>]),
    VectorCtor(&'a [&'a Expr<'a>]),
    FieldAssign {
        field: usize,
        value: &'a Expr<'a>,
    },
    List(&'a [&'a Expr<'a>]),
    Call {
        func: &'a Expr<'a>,
        args: &'a [&'a Expr<'a>],
    },
    /// An anonymous function. Captures are not supported: the body may
    /// only refer to its own parameters, locals and globals.
    Lambda(Rc<ScriptFunc>),
    Event {
        handler: IdPtr,
        args: &'a [&'a Expr<'a>],
    },
    Schedule {
        delay: &'a Expr<'a>,
        event: &'a Expr<'a>,
    },
    /// `operand as ty`, checked at run time.
    Cast(&'a Expr<'a>),
    Is {
        operand: &'a Expr<'a>,
        test_ty: TypeRef,
    },
    Nop,
}

/// Flat discriminant of `ExprKind`, with unary and binary operators
/// spread out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExprTag {
    Name,
    Const,
    Unary(UnaryOp),
    Binary(BinaryOp),
    Cond,
    Ref,
    Assign,
    IndexAssign,
    FieldLhsAssign,
    Index,
    AnyIndex,
    Field,
    HasField,
    RecordCtor,
    TableCtor,
    SetCtor,
    VectorCtor,
    FieldAssign,
    List,
    Call,
    Lambda,
    Event,
    Schedule,
    Cast,
    Is,
    Nop,
}

impl UnaryOp {
    /// Operators applied element by element to vector operands.
    pub fn is_elementwise(self) -> bool {
        matches!(
            self,
            UnaryOp::Not
                | UnaryOp::Complement
                | UnaryOp::Pos
                | UnaryOp::Neg
                | UnaryOp::ArithCoerce
                | UnaryOp::Incr
                | UnaryOp::Decr
        )
    }

    pub fn is_coercion(self) -> bool {
        matches!(
            self,
            UnaryOp::ArithCoerce
                | UnaryOp::RecordCoerce
                | UnaryOp::TableCoerce
                | UnaryOp::VectorCoerce
                | UnaryOp::ToAny
                | UnaryOp::FromAny
        )
    }

    /// `++x` and `--x` write their operand.
    pub fn is_assigning(self) -> bool {
        matches!(self, UnaryOp::Incr | UnaryOp::Decr)
    }
}

impl BinaryOp {
    pub fn is_relational(self) -> bool {
        matches!(
            self,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Ge | BinaryOp::Gt
        )
    }

    /// Compound assignments: `+=`, `-=` and vector append.
    pub fn is_assigning(self) -> bool {
        matches!(self, BinaryOp::AddTo | BinaryOp::AppendTo | BinaryOp::RemoveFrom)
    }

    pub fn is_short_circuit(self) -> bool {
        matches!(self, BinaryOp::AndAnd | BinaryOp::OrOr)
    }

    pub fn is_commutative(self) -> bool {
        matches!(
            self,
            BinaryOp::Add
                | BinaryOp::Times
                | BinaryOp::And
                | BinaryOp::Or
                | BinaryOp::Xor
                | BinaryOp::Eq
                | BinaryOp::Ne
        )
    }

    /// The relation with its operands swapped: `a < b` is `b > a`.
    pub fn flipped(self) -> BinaryOp {
        match self {
            BinaryOp::Lt => BinaryOp::Gt,
            BinaryOp::Le => BinaryOp::Ge,
            BinaryOp::Ge => BinaryOp::Le,
            BinaryOp::Gt => BinaryOp::Lt,
            other => other,
        }
    }

    /// The plain operator a compound assignment applies.
    pub fn underlying(self) -> BinaryOp {
        match self {
            BinaryOp::AddTo => BinaryOp::Add,
            BinaryOp::RemoveFrom => BinaryOp::Sub,
            other => other,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::AddTo => "+=",
            BinaryOp::AppendTo => "+=",
            BinaryOp::RemoveFrom => "-=",
            BinaryOp::Times => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Mod => "%",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
            BinaryOp::AndAnd => "&&",
            BinaryOp::OrOr => "||",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Ge => ">=",
            BinaryOp::Gt => ">",
            BinaryOp::In => "in",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl<'a> Expr<'a> {
    pub fn new(kind: ExprKind<'a>, ty: TypeRef, span: Span) -> Self {
        Expr {
            kind,
            ty,
            span,
            original: Cell::new(None),
        }
    }

    pub fn tag(&self) -> ExprTag {
        match &self.kind {
            ExprKind::Name(_) => ExprTag::Name,
            ExprKind::Const(_) => ExprTag::Const,
            ExprKind::Unary { op, .. } => ExprTag::Unary(*op),
            ExprKind::Binary { op, .. } => ExprTag::Binary(*op),
            ExprKind::Cond { .. } => ExprTag::Cond,
            ExprKind::Ref(_) => ExprTag::Ref,
            ExprKind::Assign { .. } => ExprTag::Assign,
            ExprKind::IndexAssign { .. } => ExprTag::IndexAssign,
            ExprKind::FieldLhsAssign { .. } => ExprTag::FieldLhsAssign,
            ExprKind::Index { .. } => ExprTag::Index,
            ExprKind::AnyIndex { .. } => ExprTag::AnyIndex,
            ExprKind::Field { .. } => ExprTag::Field,
            ExprKind::HasField { .. } => ExprTag::HasField,
            ExprKind::RecordCtor(_) => ExprTag::RecordCtor,
            ExprKind::TableCtor(_) => ExprTag::TableCtor,
            ExprKind::SetCtor(_) => ExprTag::SetCtor,
            ExprKind::VectorCtor(_) => ExprTag::VectorCtor,
            ExprKind::FieldAssign { .. } => ExprTag::FieldAssign,
            ExprKind::List(_) => ExprTag::List,
            ExprKind::Call { .. } => ExprTag::Call,
            ExprKind::Lambda(_) => ExprTag::Lambda,
            ExprKind::Event { .. } => ExprTag::Event,
            ExprKind::Schedule { .. } => ExprTag::Schedule,
            ExprKind::Cast(_) => ExprTag::Cast,
            ExprKind::Is { .. } => ExprTag::Is,
            ExprKind::Nop => ExprTag::Nop,
        }
    }

    pub fn is_error(&self) -> bool {
        self.ty.is_error()
    }

    pub fn is_const(&self) -> bool {
        matches!(self.kind, ExprKind::Const(_))
    }

    pub fn is_name(&self) -> bool {
        matches!(self.kind, ExprKind::Name(_))
    }

    /// A bare name or a constant.
    pub fn is_singleton(&self) -> bool {
        self.is_const() || self.is_name()
    }

    pub fn const_val(&self) -> Option<&Val> {
        match &self.kind {
            ExprKind::Const(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&IdPtr> {
        match &self.kind {
            ExprKind::Name(id) => Some(id),
            _ => None,
        }
    }

    /// Same variable, for names; always false otherwise.
    pub fn same_name(&self, other: &Expr<'_>) -> bool {
        match (self.as_name(), other.as_name()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Strip a `Ref` wrapper.
    pub fn target(&self) -> &'a Expr<'a> {
        match &self.kind {
            ExprKind::Ref(inner) => *inner,
            _ => internal_error!("target() on non-ref {:?}", self.tag()),
        }
    }

    /// Whether the constant is the zero of its type.
    pub fn is_zero(&self) -> bool {
        matches!(
            self.const_val(),
            Some(Val::Int(0)) | Some(Val::Count(0))
        ) || matches!(self.const_val(), Some(Val::Double(d)) if *d == 0.0)
    }

    pub fn is_one(&self) -> bool {
        matches!(
            self.const_val(),
            Some(Val::Int(1)) | Some(Val::Count(1))
        ) || matches!(self.const_val(), Some(Val::Double(d)) if *d == 1.0)
    }

    /// Name of field `idx` of this (record-typed) expression.
    pub fn field_name(&self, idx: usize) -> &str {
        match &*self.ty {
            Type::Record(rt) => &rt.fields[idx].name,
            _ => "<field>",
        }
    }

    /// Whether `self` and `other` denote the same computation: names of the
    /// same id, equal constants, or structurally identical compounds over
    /// those.
    pub fn same_as(&self, other: &Expr<'_>) -> bool {
        match (&self.kind, &other.kind) {
            (ExprKind::Name(a), ExprKind::Name(b)) => a == b,
            (ExprKind::Const(a), ExprKind::Const(b)) => a == b,
            (
                ExprKind::Unary { op: o1, operand: a },
                ExprKind::Unary { op: o2, operand: b },
            ) => o1 == o2 && a.same_as(b),
            (
                ExprKind::Binary {
                    op: o1,
                    lhs: l1,
                    rhs: r1,
                },
                ExprKind::Binary {
                    op: o2,
                    lhs: l2,
                    rhs: r2,
                },
            ) => o1 == o2 && l1.same_as(l2) && r1.same_as(r2),
            (
                ExprKind::Field {
                    record: a,
                    field: f1,
                },
                ExprKind::Field {
                    record: b,
                    field: f2,
                },
            ) => f1 == f2 && a.same_as(b),
            (ExprKind::Index { aggr: a1, index: i1 }, ExprKind::Index { aggr: a2, index: i2 }) => {
                a1.same_as(a2) && i1.same_as(i2)
            }
            (ExprKind::List(a), ExprKind::List(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.same_as(y))
            }
            _ => false,
        }
    }
}

impl ExprTag {
    /// Short description used in diagnostics.
    pub fn describe(self) -> &'static str {
        match self {
            ExprTag::Name => "name",
            ExprTag::Const => "constant",
            ExprTag::Unary(UnaryOp::Clone) => "copy",
            ExprTag::Unary(UnaryOp::Incr) => "increment",
            ExprTag::Unary(UnaryOp::Decr) => "decrement",
            ExprTag::Unary(UnaryOp::Not) => "negation",
            ExprTag::Unary(UnaryOp::Complement) => "complement",
            ExprTag::Unary(UnaryOp::Pos) => "unary plus",
            ExprTag::Unary(UnaryOp::Neg) => "unary minus",
            ExprTag::Unary(UnaryOp::Size) => "size",
            ExprTag::Unary(_) => "coercion",
            ExprTag::Binary(op) if op.is_relational() => "comparison",
            ExprTag::Binary(BinaryOp::In) => "membership",
            ExprTag::Binary(op) if op.is_assigning() => "compound assignment",
            ExprTag::Binary(op) if op.is_short_circuit() => "logical",
            ExprTag::Binary(_) => "arithmetic",
            ExprTag::Cond => "conditional",
            ExprTag::Ref => "reference",
            ExprTag::Assign | ExprTag::IndexAssign | ExprTag::FieldLhsAssign => "assignment",
            ExprTag::Index | ExprTag::AnyIndex => "index",
            ExprTag::Field => "field access",
            ExprTag::HasField => "field test",
            ExprTag::RecordCtor
            | ExprTag::TableCtor
            | ExprTag::SetCtor
            | ExprTag::VectorCtor => "constructor",
            ExprTag::FieldAssign => "field initializer",
            ExprTag::List => "list",
            ExprTag::Call => "call",
            ExprTag::Lambda => "lambda",
            ExprTag::Event => "event",
            ExprTag::Schedule => "schedule",
            ExprTag::Cast => "cast",
            ExprTag::Is => "type test",
            ExprTag::Nop => "no-op",
        }
    }
}
