use crate::api::Span;
use crate::ast::{Expr, IdPtr};
use crate::types::TypeRef;

#[derive(Debug)]
pub struct Stmt<'a> {
    pub kind: StmtKind<'a>,
    pub span: Span,
}

#[derive(Debug)]
pub enum StmtKind<'a> {
    List(&'a [&'a Stmt<'a>]),
    Expr(&'a Expr<'a>),
    If {
        cond: &'a Expr<'a>,
        then_branch: &'a Stmt<'a>,
        else_branch: &'a Stmt<'a>,
    },
    /// `cond_stmt`, when present, recomputes the pieces of `cond` before
    /// every test.
    While {
        cond: &'a Expr<'a>,
        cond_stmt: Option<&'a Stmt<'a>>,
        body: &'a Stmt<'a>,
    },
    /// `for ( [vars], value_var in over )`. Vectors and strings bind a
    /// single index variable; tables bind one per index component.
    For {
        vars: &'a [IdPtr],
        value_var: Option<IdPtr>,
        over: &'a Expr<'a>,
        body: &'a Stmt<'a>,
    },
    Switch {
        expr: &'a Expr<'a>,
        cases: &'a [Case<'a>],
        /// Index into `cases` of the `default` arm.
        default: Option<usize>,
    },
    Return(Option<&'a Expr<'a>>),
    Next,
    Break,
    Fallthrough,
    Null,
    Print(&'a [&'a Expr<'a>]),
    /// Operand is an `Event` expression.
    Event(&'a Expr<'a>),
    /// `add s[idx]`; operand is an `Index` expression.
    Add(&'a Expr<'a>),
    /// `delete t[idx]` or `delete r$f`.
    Delete(&'a Expr<'a>),
    /// Reset locals to their default (empty aggregate or unset).
    Init(&'a [IdPtr]),
    /// Abort with a run-time error unless the `any` list has `len` items.
    CheckAnyLen {
        expr: &'a Expr<'a>,
        len: usize,
    },
    /// An inlined body: a `return` inside it assigns `ret_var` and leaves
    /// the block instead of the enclosing function.
    CatchReturn {
        body: &'a Stmt<'a>,
        ret_var: Option<IdPtr>,
    },
    /// Runs `body` once `cond` holds. Compiled bodies suspend until then;
    /// `cond_stmt` recomputes the pieces of `cond` on every attempt.
    When {
        cond: &'a Expr<'a>,
        cond_stmt: Option<&'a Stmt<'a>>,
        body: &'a Stmt<'a>,
    },
}

#[derive(Debug)]
pub struct Case<'a> {
    /// Constants matched by value.
    pub exprs: &'a [&'a Expr<'a>],
    /// Types matched by `case type T as v`. The binding is optional.
    pub types: &'a [(Option<IdPtr>, TypeRef)],
    pub body: &'a Stmt<'a>,
}

impl Case<'_> {
    pub fn is_type_case(&self) -> bool {
        !self.types.is_empty()
    }
}

/// Stable identity of a statement, for side tables keyed by statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StmtKey(usize);

impl<'a> Stmt<'a> {
    pub fn new(kind: StmtKind<'a>, span: Span) -> Self {
        Stmt { kind, span }
    }

    pub fn key(&self) -> StmtKey {
        StmtKey(self as *const Stmt<'_> as usize)
    }

    pub fn is_null(&self) -> bool {
        matches!(self.kind, StmtKind::Null)
    }

    /// Statements after which control never reaches the next one.
    pub fn no_flow_after(&self) -> bool {
        match &self.kind {
            StmtKind::Return(_) | StmtKind::Next | StmtKind::Break | StmtKind::Fallthrough => true,
            StmtKind::List(stmts) => stmts.last().is_some_and(|s| s.no_flow_after()),
            StmtKind::If {
                then_branch,
                else_branch,
                ..
            } => then_branch.no_flow_after() && else_branch.no_flow_after(),
            _ => false,
        }
    }

    pub fn describe(&self) -> &'static str {
        match &self.kind {
            StmtKind::List(_) => "statement list",
            StmtKind::Expr(_) => "expression statement",
            StmtKind::If { .. } => "if",
            StmtKind::While { .. } => "while",
            StmtKind::For { .. } => "for",
            StmtKind::Switch { .. } => "switch",
            StmtKind::Return(_) => "return",
            StmtKind::Next => "next",
            StmtKind::Break => "break",
            StmtKind::Fallthrough => "fallthrough",
            StmtKind::Null => "null",
            StmtKind::Print(_) => "print",
            StmtKind::Event(_) => "event",
            StmtKind::Add(_) => "add",
            StmtKind::Delete(_) => "delete",
            StmtKind::Init(_) => "init",
            StmtKind::CheckAnyLen { .. } => "check-any-length",
            StmtKind::CatchReturn { .. } => "catch-return",
            StmtKind::When { .. } => "when",
        }
    }
}
