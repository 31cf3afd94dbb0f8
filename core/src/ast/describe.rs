//! Script-like rendering of trees, for dumps and test expectations.

use core::fmt::{self, Display, Formatter, Write};

use crate::ast::{Expr, ExprKind, Stmt, StmtKind, UnaryOp};
use crate::values::Val;

impl Display for Expr<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Name(id) => write!(f, "{}", id.name),
            ExprKind::Const(val) => write_const(f, val),
            ExprKind::Unary { op, operand } => match op {
                UnaryOp::Clone => write!(f, "copy({})", operand),
                UnaryOp::Incr => write!(f, "++{}", operand),
                UnaryOp::Decr => write!(f, "--{}", operand),
                UnaryOp::Not => write!(f, "!{}", Operand(operand)),
                UnaryOp::Complement => write!(f, "~{}", Operand(operand)),
                UnaryOp::Pos => write!(f, "+{}", Operand(operand)),
                UnaryOp::Neg => write!(f, "-{}", Operand(operand)),
                UnaryOp::Size => write!(f, "|{}|", operand),
                UnaryOp::ArithCoerce => write!(f, "({}){}", self.ty, Operand(operand)),
                UnaryOp::RecordCoerce | UnaryOp::TableCoerce | UnaryOp::VectorCoerce => {
                    write!(f, "coerce({}) to {}", operand, self.ty)
                }
                UnaryOp::ToAny => write!(f, "to_any({})", operand),
                UnaryOp::FromAny => write!(f, "from_any({}) as {}", operand, self.ty),
            },
            ExprKind::Binary { op, lhs, rhs } => {
                write!(f, "{} {} {}", Operand(lhs), op, Operand(rhs))
            }
            ExprKind::Cond {
                cond,
                then_expr,
                else_expr,
            } => write!(
                f,
                "{} ? {} : {}",
                Operand(cond),
                Operand(then_expr),
                Operand(else_expr)
            ),
            ExprKind::Ref(target) => write!(f, "{}", target),
            ExprKind::Assign { lhs, rhs, .. } => match &lhs.kind {
                ExprKind::List(_) => write!(f, "[{}] = {}", lhs, rhs),
                _ => write!(f, "{} = {}", lhs, rhs),
            },
            ExprKind::IndexAssign { aggr, index, value } => {
                write!(f, "{}[{}] = {}", aggr, index, value)
            }
            ExprKind::FieldLhsAssign {
                record,
                field,
                value,
            } => write!(f, "{}${} = {}", record, record.field_name(*field), value),
            ExprKind::Index { aggr, index } => write!(f, "{}[{}]", Operand(aggr), index),
            ExprKind::AnyIndex { operand, index } => write!(f, "{}<any>[{}]", operand, index),
            ExprKind::Field { record, field } => {
                write!(f, "{}${}", Operand(record), record.field_name(*field))
            }
            ExprKind::HasField { record, field } => {
                write!(f, "{}?${}", Operand(record), record.field_name(*field))
            }
            ExprKind::RecordCtor(fields) => {
                f.write_char('[')?;
                for (i, assign) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    if let ExprKind::FieldAssign { field, value } = &assign.kind {
                        write!(f, "${}={}", self.field_name(*field), value)?;
                    }
                }
                f.write_char(']')
            }
            ExprKind::TableCtor(entries) => {
                f.write_str("table(")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "[{}] = {}", key, value)?;
                }
                f.write_char(')')
            }
            ExprKind::SetCtor(elems) => write!(f, "set({})", List(elems)),
            ExprKind::VectorCtor(elems) => write!(f, "vector({})", List(elems)),
            ExprKind::FieldAssign { field, value } => write!(f, "$#{}={}", field, value),
            ExprKind::List(elems) => write!(f, "{}", List(elems)),
            ExprKind::Call { func, args } => write!(f, "{}({})", func, List(args)),
            ExprKind::Lambda(func) => write!(f, "function {}", func.name),
            ExprKind::Event { handler, args } => write!(f, "{}({})", handler.name, List(args)),
            ExprKind::Schedule { delay, event } => write!(f, "schedule {} {{ {} }}", delay, event),
            ExprKind::Cast(operand) => write!(f, "{} as {}", Operand(operand), self.ty),
            ExprKind::Is { operand, test_ty } => write!(f, "{} is {}", Operand(operand), test_ty),
            ExprKind::Nop => f.write_str("nop"),
        }
    }
}

fn write_const(f: &mut Formatter<'_>, val: &Val) -> fmt::Result {
    match val {
        Val::Str(s) => write!(f, "{:?}", &**s),
        Val::Func(func) => f.write_str(func.name()),
        other => write!(f, "{}", other),
    }
}

/// Parenthesizes compound operands.
struct Operand<'e, 'a>(&'e Expr<'a>);

impl Display for Operand<'_, '_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.0.kind {
            ExprKind::Name(_)
            | ExprKind::Const(_)
            | ExprKind::Field { .. }
            | ExprKind::Index { .. }
            | ExprKind::Call { .. }
            | ExprKind::Ref(_) => write!(f, "{}", self.0),
            _ => write!(f, "({})", self.0),
        }
    }
}

struct List<'e, 'a>(&'e [&'a Expr<'a>]);

impl Display for List<'_, '_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", e)?;
        }
        Ok(())
    }
}

const INDENT: &str = "    ";

impl Display for Stmt<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write_stmt(f, self, 0)
    }
}

fn indent(f: &mut Formatter<'_>, depth: usize) -> fmt::Result {
    for _ in 0..depth {
        f.write_str(INDENT)?;
    }
    Ok(())
}

/// Body of a compound statement: lists open a block, anything else is
/// wrapped in one.
fn write_block(f: &mut Formatter<'_>, stmt: &Stmt<'_>, depth: usize) -> fmt::Result {
    f.write_str("{\n")?;
    match &stmt.kind {
        StmtKind::List(stmts) => {
            for s in stmts.iter() {
                write_stmt(f, s, depth + 1)?;
            }
        }
        _ => write_stmt(f, stmt, depth + 1)?,
    }
    indent(f, depth)?;
    f.write_char('}')
}

fn write_stmt(f: &mut Formatter<'_>, stmt: &Stmt<'_>, depth: usize) -> fmt::Result {
    if let StmtKind::List(stmts) = &stmt.kind {
        for s in stmts.iter() {
            write_stmt(f, s, depth)?;
        }
        return Ok(());
    }
    indent(f, depth)?;
    match &stmt.kind {
        StmtKind::List(_) => {}
        StmtKind::Expr(e) => write!(f, "{};", e)?,
        StmtKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            write!(f, "if ({}) ", cond)?;
            write_block(f, then_branch, depth)?;
            if !else_branch.is_null() {
                f.write_str(" else ")?;
                write_block(f, else_branch, depth)?;
            }
        }
        StmtKind::While {
            cond,
            cond_stmt,
            body,
        } => {
            match cond_stmt {
                Some(cs) => {
                    f.write_str("while ({\n")?;
                    write_stmt(f, cs, depth + 1)?;
                    indent(f, depth)?;
                    write!(f, "}} {}) ", cond)?;
                }
                None => write!(f, "while ({}) ", cond)?,
            }
            write_block(f, body, depth)?;
        }
        StmtKind::For {
            vars,
            value_var,
            over,
            body,
        } => {
            f.write_str("for (")?;
            if vars.len() == 1 {
                write!(f, "{}", vars[0])?;
            } else {
                f.write_char('[')?;
                for (i, v) in vars.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                f.write_char(']')?;
            }
            if let Some(v) = value_var {
                write!(f, ", {}", v)?;
            }
            write!(f, " in {}) ", over)?;
            write_block(f, body, depth)?;
        }
        StmtKind::Switch {
            expr,
            cases,
            default,
        } => {
            writeln!(f, "switch ({}) {{", expr)?;
            for (i, case) in cases.iter().enumerate() {
                indent(f, depth)?;
                if Some(i) == *default {
                    f.write_str("default:")?;
                } else if case.is_type_case() {
                    f.write_str("case ")?;
                    for (j, (binding, ty)) in case.types.iter().enumerate() {
                        if j > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "type {}", ty)?;
                        if let Some(b) = binding {
                            write!(f, " as {}", b)?;
                        }
                    }
                    f.write_char(':')?;
                } else {
                    write!(f, "case {}:", List(case.exprs))?;
                }
                f.write_char('\n')?;
                write_stmt(f, case.body, depth + 1)?;
            }
            indent(f, depth)?;
            f.write_char('}')?;
        }
        StmtKind::Return(value) => match value {
            Some(v) => write!(f, "return {};", v)?,
            None => f.write_str("return;")?,
        },
        StmtKind::Next => f.write_str("next;")?,
        StmtKind::Break => f.write_str("break;")?,
        StmtKind::Fallthrough => f.write_str("fallthrough;")?,
        StmtKind::Null => f.write_str(";")?,
        StmtKind::Print(args) => write!(f, "print {};", List(args))?,
        StmtKind::Event(e) => write!(f, "event {};", e)?,
        StmtKind::Add(e) => write!(f, "add {};", e)?,
        StmtKind::Delete(e) => write!(f, "delete {};", e)?,
        StmtKind::Init(ids) => {
            f.write_str("init")?;
            for id in ids.iter() {
                write!(f, " {}", id)?;
            }
            f.write_char(';')?;
        }
        StmtKind::CheckAnyLen { expr, len } => write!(f, "check-any-len {}, {};", expr, len)?,
        StmtKind::CatchReturn { body, ret_var } => {
            f.write_str("catch-return")?;
            if let Some(v) = ret_var {
                write!(f, " -> {}", v)?;
            }
            f.write_char(' ')?;
            write_block(f, body, depth)?;
        }
        StmtKind::When {
            cond,
            cond_stmt,
            body,
        } => {
            match cond_stmt {
                Some(cs) => {
                    f.write_str("when ({\n")?;
                    write_stmt(f, cs, depth + 1)?;
                    indent(f, depth)?;
                    write!(f, "}} {}) ", cond)?;
                }
                None => write!(f, "when ({}) ", cond)?,
            }
            write_block(f, body, depth)?;
        }
    }
    f.write_char('\n')
}
