//! Arena builder for expression and statement trees.
//!
//! Trees normally come from the script parser; here they are built
//! programmatically. The builder resolves result types the way the
//! script type checker does for the constructs it knows, inserting
//! arithmetic coercions where operands differ, and marks nodes it cannot
//! type with the error sentinel after reporting once.

use bumpalo::Bump;

use crate::api::Span;
use crate::ast::{Case, Expr, ExprKind, Id, IdPtr, Scope, Stmt, StmtKind, BinaryOp, UnaryOp};
use crate::diagnostics::Reporter;
use crate::types::{self, Type, TypeRef};
use crate::values::{ScriptFunc, Val};
use crate::{Rc, String, Vec, format};

#[derive(Clone, Copy)]
pub struct Tree<'a> {
    pub arena: &'a Bump,
    pub reporter: &'a Reporter,
    span: Span,
}

/// Declare a script function with fresh parameter ids.
pub fn declare_func(name: &str, params: &[(&str, TypeRef)], yield_type: TypeRef) -> Rc<ScriptFunc> {
    let ids: Vec<IdPtr> = params
        .iter()
        .enumerate()
        .map(|(i, (pname, ty))| {
            let id = Id::new(pname, Scope::Param, ty.clone());
            id.set_offset(i);
            IdPtr::new(id)
        })
        .collect();
    let ty = types::function(
        params
            .iter()
            .map(|(n, t)| (String::from(*n), t.clone()))
            .collect(),
        yield_type,
    );
    Rc::new(ScriptFunc::new(name, ty, ids))
}

/// Declare an event handler: a void function whose bodies all run.
pub fn declare_event(name: &str, params: &[(&str, TypeRef)]) -> Rc<ScriptFunc> {
    let func = declare_func(name, params, types::void());
    let ty = types::event(
        params
            .iter()
            .map(|(n, t)| (String::from(*n), t.clone()))
            .collect(),
    );
    Rc::new(ScriptFunc::new(name, ty, func.params.clone()))
}

/// A local of `func`, with the next interpreter slot.
pub fn new_local(func: &ScriptFunc, name: &str, ty: TypeRef) -> IdPtr {
    let id = Id::new(name, Scope::Local, ty);
    id.set_offset(func.grow_frame());
    IdPtr::new(id)
}

pub fn new_global(name: &str, ty: TypeRef) -> IdPtr {
    IdPtr::new(Id::new(name, Scope::Global, ty))
}

/// A global constant. Atomic, non-redefinable constants fold into uses.
pub fn new_const(name: &str, ty: TypeRef, val: Val, redefinable: bool) -> IdPtr {
    let mut id = Id::new(name, Scope::Const, ty);
    id.redefinable = redefinable;
    id.set_value(val);
    IdPtr::new(id)
}

impl<'a> Tree<'a> {
    pub fn new(arena: &'a Bump, reporter: &'a Reporter) -> Self {
        Tree {
            arena,
            reporter,
            span: Span::default(),
        }
    }

    /// Builder whose nodes carry `span`.
    pub fn at(self, start: usize, end: usize) -> Self {
        Tree {
            span: Span::new(start, end),
            ..self
        }
    }

    pub fn with_span(self, span: Span) -> Self {
        Tree { span, ..self }
    }

    pub fn span(&self) -> Span {
        self.span
    }

    // ------------------------------------------------------------------
    // Allocation
    // ------------------------------------------------------------------

    pub fn alloc(&self, kind: ExprKind<'a>, ty: TypeRef) -> &'a Expr<'a> {
        self.arena.alloc(Expr::new(kind, ty, self.span))
    }

    pub fn alloc_stmt(&self, kind: StmtKind<'a>) -> &'a Stmt<'a> {
        self.arena.alloc(Stmt::new(kind, self.span))
    }

    pub fn slice<T: Copy>(&self, items: &[T]) -> &'a [T] {
        self.arena.alloc_slice_copy(items)
    }

    pub fn ids(&self, ids: &[IdPtr]) -> &'a [IdPtr] {
        self.arena.alloc_slice_clone(ids)
    }

    /// A node rewritten from `from`: same location, linked back to the
    /// node as first written.
    pub fn derived(&self, from: &'a Expr<'a>, kind: ExprKind<'a>, ty: TypeRef) -> &'a Expr<'a> {
        let e = self.arena.alloc(Expr::new(kind, ty, from.span));
        e.original.set(Some(from.original.get().unwrap_or(from)));
        e
    }

    pub fn derived_stmt(&self, from: &Stmt<'a>, kind: StmtKind<'a>) -> &'a Stmt<'a> {
        self.arena.alloc(Stmt::new(kind, from.span))
    }

    fn error_expr(&self, kind: ExprKind<'a>, message: String) -> &'a Expr<'a> {
        self.reporter.error(self.span, message);
        self.alloc(kind, types::error())
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    pub fn name(&self, id: &IdPtr) -> &'a Expr<'a> {
        self.alloc(ExprKind::Name(id.clone()), id.ty.clone())
    }

    pub fn constant(&self, val: Val, ty: TypeRef) -> &'a Expr<'a> {
        self.alloc(ExprKind::Const(val), ty)
    }

    pub fn int(&self, i: i64) -> &'a Expr<'a> {
        self.constant(Val::Int(i), types::int())
    }

    pub fn count(&self, c: u64) -> &'a Expr<'a> {
        self.constant(Val::Count(c), types::count())
    }

    pub fn double(&self, d: f64) -> &'a Expr<'a> {
        self.constant(Val::Double(d), types::double())
    }

    pub fn boolean(&self, b: bool) -> &'a Expr<'a> {
        self.constant(Val::Bool(b), types::bool())
    }

    pub fn string(&self, s: &str) -> &'a Expr<'a> {
        self.constant(Val::str(s), types::string())
    }

    pub fn unary(&self, op: UnaryOp, operand: &'a Expr<'a>) -> &'a Expr<'a> {
        let kind = ExprKind::Unary { op, operand };
        if operand.is_error() {
            return self.alloc(kind, types::error());
        }
        let ty = match op {
            UnaryOp::Not => types::bool(),
            UnaryOp::Complement => types::count(),
            UnaryOp::Neg if matches!(*operand.ty, Type::Count) => types::int(),
            UnaryOp::Size => match &*operand.ty {
                Type::Double | Type::Time | Type::Interval | Type::Subnet => types::double(),
                _ => types::count(),
            },
            UnaryOp::Incr | UnaryOp::Decr => match &operand.kind {
                ExprKind::Ref(target) => target.ty.clone(),
                _ => operand.ty.clone(),
            },
            _ => operand.ty.clone(),
        };
        self.alloc(kind, ty)
    }

    /// A coercion to an explicit type.
    pub fn coerce(&self, op: UnaryOp, operand: &'a Expr<'a>, ty: TypeRef) -> &'a Expr<'a> {
        self.alloc(ExprKind::Unary { op, operand }, ty)
    }

    /// `op` over `lhs` and `rhs`, with the result type resolved and
    /// arithmetic operands coerced to a common representation.
    pub fn binary(&self, op: BinaryOp, lhs: &'a Expr<'a>, rhs: &'a Expr<'a>) -> &'a Expr<'a> {
        if lhs.is_error() || rhs.is_error() {
            return self.alloc(ExprKind::Binary { op, lhs, rhs }, types::error());
        }
        if op.is_assigning() {
            return self.compound_assign(op, lhs, rhs);
        }
        let Some((ty, operand_ty)) = binary_result(op, &lhs.ty, &rhs.ty) else {
            return self.error_expr(
                ExprKind::Binary { op, lhs, rhs },
                format!(
                    "type clash: {} {} {}",
                    lhs.ty,
                    op.symbol(),
                    rhs.ty
                ),
            );
        };
        let (lhs, rhs) = match operand_ty {
            Some(target) => (self.arith_to(lhs, &target), self.arith_to(rhs, &target)),
            None => (lhs, rhs),
        };
        self.alloc(ExprKind::Binary { op, lhs, rhs }, ty)
    }

    /// A binary node with an explicit result type and no coercions.
    pub fn binary_typed(
        &self,
        op: BinaryOp,
        lhs: &'a Expr<'a>,
        rhs: &'a Expr<'a>,
        ty: TypeRef,
    ) -> &'a Expr<'a> {
        self.alloc(ExprKind::Binary { op, lhs, rhs }, ty)
    }

    fn compound_assign(&self, op: BinaryOp, target: &'a Expr<'a>, rhs: &'a Expr<'a>) -> &'a Expr<'a> {
        let lhs = self.reference(target);
        let ty = target.ty.clone();
        let rhs = match (&*ty, op) {
            (Type::Vector(elem), BinaryOp::AppendTo) => self.arith_to(rhs, elem),
            (t, _) if t.is_arithmetic() => self.arith_to(rhs, &ty),
            _ => rhs,
        };
        self.alloc(ExprKind::Binary { op, lhs, rhs }, ty)
    }

    /// Wrap `e` in an arithmetic coercion if its representation differs
    /// from `target`'s.
    fn arith_to(&self, e: &'a Expr<'a>, target: &TypeRef) -> &'a Expr<'a> {
        let (from, to) = match (&*e.ty, &**target) {
            (Type::Vector(a), Type::Vector(b)) => (a.clone(), b.clone()),
            (Type::Vector(a), _) => (a.clone(), target.clone()),
            (_, Type::Vector(b)) => (e.ty.clone(), b.clone()),
            _ => (e.ty.clone(), target.clone()),
        };
        if !from.is_arithmetic() || !to.is_arithmetic() || from.internal_type() == to.internal_type()
        {
            return e;
        }
        let ty = match &*e.ty {
            Type::Vector(_) => types::vector_of(to),
            _ => to,
        };
        self.with_span(e.span)
            .alloc(ExprKind::Unary { op: UnaryOp::ArithCoerce, operand: e }, ty)
    }

    pub fn and(&self, lhs: &'a Expr<'a>, rhs: &'a Expr<'a>) -> &'a Expr<'a> {
        self.binary(BinaryOp::AndAnd, lhs, rhs)
    }

    pub fn or(&self, lhs: &'a Expr<'a>, rhs: &'a Expr<'a>) -> &'a Expr<'a> {
        self.binary(BinaryOp::OrOr, lhs, rhs)
    }

    pub fn cond(
        &self,
        cond: &'a Expr<'a>,
        then_expr: &'a Expr<'a>,
        else_expr: &'a Expr<'a>,
    ) -> &'a Expr<'a> {
        let ty = if cond.is_error() || then_expr.is_error() || else_expr.is_error() {
            types::error()
        } else {
            then_expr.ty.clone()
        };
        self.alloc(
            ExprKind::Cond {
                cond,
                then_expr,
                else_expr,
            },
            ty,
        )
    }

    pub fn reference(&self, target: &'a Expr<'a>) -> &'a Expr<'a> {
        if let ExprKind::Ref(_) = target.kind {
            return target;
        }
        self.alloc(ExprKind::Ref(target), target.ty.clone())
    }

    /// `target = value`, with arithmetic coercion of `value` if needed.
    pub fn assign(&self, target: &'a Expr<'a>, value: &'a Expr<'a>) -> &'a Expr<'a> {
        let lhs = self.reference(target);
        if target.is_error() || value.is_error() {
            return self.alloc(
                ExprKind::Assign {
                    lhs,
                    rhs: value,
                    is_temp: false,
                },
                types::error(),
            );
        }
        let rhs = if target.ty.is_arithmetic() {
            self.arith_to(value, &target.ty)
        } else {
            value
        };
        if !assignable(&target.ty, &rhs.ty) {
            return self.error_expr(
                ExprKind::Assign {
                    lhs,
                    rhs,
                    is_temp: false,
                },
                format!("type clash in assignment: {} = {}", target.ty, rhs.ty),
            );
        }
        self.alloc(
            ExprKind::Assign {
                lhs,
                rhs,
                is_temp: false,
            },
            target.ty.clone(),
        )
    }

    /// `[a, b, c] = value` for a list- or `any`-valued right side.
    pub fn assign_list(&self, targets: &[&'a Expr<'a>], value: &'a Expr<'a>) -> &'a Expr<'a> {
        let refs: Vec<&'a Expr<'a>> = targets.iter().map(|t| self.reference(t)).collect();
        let lhs = self.list(&refs);
        self.alloc(
            ExprKind::Assign {
                lhs,
                rhs: value,
                is_temp: false,
            },
            lhs.ty.clone(),
        )
    }

    pub fn incr(&self, target: &'a Expr<'a>) -> &'a Expr<'a> {
        self.unary(UnaryOp::Incr, self.reference(target))
    }

    pub fn decr(&self, target: &'a Expr<'a>) -> &'a Expr<'a> {
        self.unary(UnaryOp::Decr, self.reference(target))
    }

    pub fn add_to(&self, target: &'a Expr<'a>, value: &'a Expr<'a>) -> &'a Expr<'a> {
        let op = if matches!(*target.ty, Type::Vector(_)) && !matches!(*value.ty, Type::Vector(_)) {
            BinaryOp::AppendTo
        } else {
            BinaryOp::AddTo
        };
        self.binary(op, target, value)
    }

    pub fn remove_from(&self, target: &'a Expr<'a>, value: &'a Expr<'a>) -> &'a Expr<'a> {
        self.binary(BinaryOp::RemoveFrom, target, value)
    }

    pub fn list(&self, elems: &[&'a Expr<'a>]) -> &'a Expr<'a> {
        let ty = if elems.iter().any(|e| e.is_error()) {
            types::error()
        } else {
            types::list_of(elems.iter().map(|e| e.ty.clone()).collect())
        };
        self.alloc(ExprKind::List(self.slice(elems)), ty)
    }

    pub fn index(&self, aggr: &'a Expr<'a>, indices: &[&'a Expr<'a>]) -> &'a Expr<'a> {
        let index = self.list(indices);
        let kind = ExprKind::Index { aggr, index };
        if aggr.is_error() || index.is_error() {
            return self.alloc(kind, types::error());
        }
        let ty = match &*aggr.ty {
            Type::Vector(elem) if indices.len() == 1 => {
                if matches!(*indices[0].ty, Type::Vector(_)) {
                    aggr.ty.clone()
                } else {
                    elem.clone()
                }
            }
            Type::Table {
                yield_type: Some(y),
                ..
            } => y.clone(),
            Type::Table {
                yield_type: None, ..
            } => types::bool(),
            Type::String => types::string(),
            _ => {
                return self.error_expr(kind, format!("cannot index a value of type {}", aggr.ty));
            }
        };
        self.alloc(kind, ty)
    }

    pub fn any_index(&self, operand: &'a Expr<'a>, index: usize, ty: TypeRef) -> &'a Expr<'a> {
        self.alloc(ExprKind::AnyIndex { operand, index }, ty)
    }

    fn lookup_field(&self, record: &'a Expr<'a>, name: &str) -> Result<(usize, TypeRef), String> {
        let Type::Record(rt) = &*record.ty else {
            return Err(format!("field access on non-record type {}", record.ty));
        };
        rt.field_offset(name)
            .map(|i| (i, rt.fields[i].ty.clone()))
            .ok_or_else(|| format!("no field '{}' in record {}", name, rt.name))
    }

    pub fn field(&self, record: &'a Expr<'a>, name: &str) -> &'a Expr<'a> {
        if record.is_error() {
            return self.alloc(ExprKind::Field { record, field: 0 }, types::error());
        }
        match self.lookup_field(record, name) {
            Ok((field, ty)) => self.alloc(ExprKind::Field { record, field }, ty),
            Err(msg) => self.error_expr(ExprKind::Field { record, field: 0 }, msg),
        }
    }

    pub fn has_field(&self, record: &'a Expr<'a>, name: &str) -> &'a Expr<'a> {
        if record.is_error() {
            return self.alloc(ExprKind::HasField { record, field: 0 }, types::error());
        }
        match self.lookup_field(record, name) {
            Ok((field, _)) => self.alloc(ExprKind::HasField { record, field }, types::bool()),
            Err(msg) => self.error_expr(ExprKind::HasField { record, field: 0 }, msg),
        }
    }

    pub fn record_ctor(&self, ty: &TypeRef, fields: &[(&str, &'a Expr<'a>)]) -> &'a Expr<'a> {
        let Type::Record(rt) = &**ty else {
            return self.error_expr(ExprKind::RecordCtor(&[]), format!("{} is not a record type", ty));
        };
        let mut assigns = Vec::with_capacity(fields.len());
        for (name, value) in fields {
            let Some(field) = rt.field_offset(name) else {
                return self.error_expr(
                    ExprKind::RecordCtor(&[]),
                    format!("no field '{}' in record {}", name, rt.name),
                );
            };
            let value = self.arith_to(value, &rt.fields[field].ty);
            assigns.push(self.alloc(ExprKind::FieldAssign { field, value }, value.ty.clone()));
        }
        self.alloc(ExprKind::RecordCtor(self.slice(&assigns)), ty.clone())
    }

    pub fn table_ctor(
        &self,
        ty: &TypeRef,
        entries: &[(&[&'a Expr<'a>], &'a Expr<'a>)],
    ) -> &'a Expr<'a> {
        let pairs: Vec<(&'a Expr<'a>, &'a Expr<'a>)> =
            entries.iter().map(|(k, v)| (self.list(k), *v)).collect();
        self.alloc(ExprKind::TableCtor(self.arena.alloc_slice_copy(&pairs)), ty.clone())
    }

    pub fn set_ctor(&self, ty: &TypeRef, elems: &[&'a Expr<'a>]) -> &'a Expr<'a> {
        self.alloc(ExprKind::SetCtor(self.slice(elems)), ty.clone())
    }

    pub fn vector_ctor(&self, ty: &TypeRef, elems: &[&'a Expr<'a>]) -> &'a Expr<'a> {
        let elem_ty = ty.yield_type().cloned().unwrap_or_else(types::any);
        let elems: Vec<&'a Expr<'a>> = elems.iter().map(|e| self.arith_to(e, &elem_ty)).collect();
        self.alloc(ExprKind::VectorCtor(self.slice(&elems)), ty.clone())
    }

    pub fn call(&self, func: &'a Expr<'a>, args: &[&'a Expr<'a>]) -> &'a Expr<'a> {
        let kind = ExprKind::Call {
            func,
            args: self.slice(args),
        };
        let Some(ft) = func.ty.as_func() else {
            if func.is_error() {
                return self.alloc(kind, types::error());
            }
            return self.error_expr(kind, format!("call of non-function type {}", func.ty));
        };
        if ft.params.len() != args.len() {
            return self.error_expr(
                kind,
                format!(
                    "wrong number of arguments: expected {}, got {}",
                    ft.params.len(),
                    args.len()
                ),
            );
        }
        let args: Vec<&'a Expr<'a>> = args
            .iter()
            .zip(&ft.params)
            .map(|(a, (_, pty))| self.arith_to(a, pty))
            .collect();
        let ty = if args.iter().any(|a| a.is_error()) {
            types::error()
        } else {
            ft.yield_type.clone()
        };
        self.alloc(
            ExprKind::Call {
                func,
                args: self.slice(&args),
            },
            ty,
        )
    }

    /// Call a function held in global `id`.
    pub fn call_global(&self, id: &IdPtr, args: &[&'a Expr<'a>]) -> &'a Expr<'a> {
        self.call(self.name(id), args)
    }

    pub fn lambda(&self, func: &Rc<ScriptFunc>) -> &'a Expr<'a> {
        self.alloc(ExprKind::Lambda(func.clone()), func.ty.clone())
    }

    pub fn event(&self, handler: &IdPtr, args: &[&'a Expr<'a>]) -> &'a Expr<'a> {
        self.alloc(
            ExprKind::Event {
                handler: handler.clone(),
                args: self.slice(args),
            },
            types::void(),
        )
    }

    pub fn schedule(&self, delay: &'a Expr<'a>, event: &'a Expr<'a>) -> &'a Expr<'a> {
        self.alloc(ExprKind::Schedule { delay, event }, types::timer())
    }

    pub fn cast(&self, operand: &'a Expr<'a>, ty: TypeRef) -> &'a Expr<'a> {
        self.alloc(ExprKind::Cast(operand), ty)
    }

    pub fn is(&self, operand: &'a Expr<'a>, test_ty: TypeRef) -> &'a Expr<'a> {
        self.alloc(ExprKind::Is { operand, test_ty }, types::bool())
    }

    pub fn nop(&self) -> &'a Expr<'a> {
        self.alloc(ExprKind::Nop, types::void())
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    pub fn block(&self, stmts: &[&'a Stmt<'a>]) -> &'a Stmt<'a> {
        self.alloc_stmt(StmtKind::List(self.slice(stmts)))
    }

    pub fn expr_stmt(&self, e: &'a Expr<'a>) -> &'a Stmt<'a> {
        self.alloc_stmt(StmtKind::Expr(e))
    }

    /// `target = value;`
    pub fn assign_stmt(&self, target: &'a Expr<'a>, value: &'a Expr<'a>) -> &'a Stmt<'a> {
        self.expr_stmt(self.assign(target, value))
    }

    pub fn if_else(
        &self,
        cond: &'a Expr<'a>,
        then_branch: &'a Stmt<'a>,
        else_branch: &'a Stmt<'a>,
    ) -> &'a Stmt<'a> {
        self.alloc_stmt(StmtKind::If {
            cond,
            then_branch,
            else_branch,
        })
    }

    pub fn if_then(&self, cond: &'a Expr<'a>, then_branch: &'a Stmt<'a>) -> &'a Stmt<'a> {
        self.if_else(cond, then_branch, self.null())
    }

    pub fn while_loop(&self, cond: &'a Expr<'a>, body: &'a Stmt<'a>) -> &'a Stmt<'a> {
        self.alloc_stmt(StmtKind::While {
            cond,
            cond_stmt: None,
            body,
        })
    }

    pub fn for_loop(
        &self,
        vars: &[IdPtr],
        value_var: Option<IdPtr>,
        over: &'a Expr<'a>,
        body: &'a Stmt<'a>,
    ) -> &'a Stmt<'a> {
        self.alloc_stmt(StmtKind::For {
            vars: self.ids(vars),
            value_var,
            over,
            body,
        })
    }

    pub fn case(&self, exprs: &[&'a Expr<'a>], body: &'a Stmt<'a>) -> Case<'a> {
        Case {
            exprs: self.slice(exprs),
            types: &[],
            body,
        }
    }

    pub fn type_case(&self, types: &[(Option<IdPtr>, TypeRef)], body: &'a Stmt<'a>) -> Case<'a> {
        Case {
            exprs: &[],
            types: self.arena.alloc_slice_clone(types),
            body,
        }
    }

    pub fn switch(&self, expr: &'a Expr<'a>, cases: Vec<Case<'a>>, default: Option<usize>) -> &'a Stmt<'a> {
        let cases = self.arena.alloc_slice_fill_iter(cases);
        self.alloc_stmt(StmtKind::Switch {
            expr,
            cases,
            default,
        })
    }

    pub fn return_stmt(&self, value: Option<&'a Expr<'a>>) -> &'a Stmt<'a> {
        self.alloc_stmt(StmtKind::Return(value))
    }

    pub fn next(&self) -> &'a Stmt<'a> {
        self.alloc_stmt(StmtKind::Next)
    }

    pub fn break_stmt(&self) -> &'a Stmt<'a> {
        self.alloc_stmt(StmtKind::Break)
    }

    pub fn fallthrough(&self) -> &'a Stmt<'a> {
        self.alloc_stmt(StmtKind::Fallthrough)
    }

    pub fn null(&self) -> &'a Stmt<'a> {
        self.alloc_stmt(StmtKind::Null)
    }

    pub fn print(&self, args: &[&'a Expr<'a>]) -> &'a Stmt<'a> {
        self.alloc_stmt(StmtKind::Print(self.slice(args)))
    }

    pub fn event_stmt(&self, handler: &IdPtr, args: &[&'a Expr<'a>]) -> &'a Stmt<'a> {
        self.alloc_stmt(StmtKind::Event(self.event(handler, args)))
    }

    pub fn add_stmt(&self, index: &'a Expr<'a>) -> &'a Stmt<'a> {
        self.alloc_stmt(StmtKind::Add(index))
    }

    pub fn delete_stmt(&self, target: &'a Expr<'a>) -> &'a Stmt<'a> {
        self.alloc_stmt(StmtKind::Delete(target))
    }

    pub fn init(&self, ids: &[IdPtr]) -> &'a Stmt<'a> {
        self.alloc_stmt(StmtKind::Init(self.ids(ids)))
    }

    pub fn check_any_len(&self, expr: &'a Expr<'a>, len: usize) -> &'a Stmt<'a> {
        self.alloc_stmt(StmtKind::CheckAnyLen { expr, len })
    }

    pub fn catch_return(&self, body: &'a Stmt<'a>, ret_var: Option<IdPtr>) -> &'a Stmt<'a> {
        self.alloc_stmt(StmtKind::CatchReturn { body, ret_var })
    }

    pub fn when(&self, cond: &'a Expr<'a>, body: &'a Stmt<'a>) -> &'a Stmt<'a> {
        self.alloc_stmt(StmtKind::When {
            cond,
            cond_stmt: None,
            body,
        })
    }

    // ------------------------------------------------------------------
    // Copying
    // ------------------------------------------------------------------

    /// Copy of `e` for use at a second site. Names and constants alias;
    /// compound nodes are rebuilt so each copy is a distinct node.
    pub fn duplicate(&self, e: &'a Expr<'a>) -> &'a Expr<'a> {
        let kind = match &e.kind {
            ExprKind::Name(_) | ExprKind::Const(_) | ExprKind::Nop => return e,
            ExprKind::Unary { op, operand } => ExprKind::Unary {
                op: *op,
                operand: self.duplicate(operand),
            },
            ExprKind::Binary { op, lhs, rhs } => ExprKind::Binary {
                op: *op,
                lhs: self.duplicate(lhs),
                rhs: self.duplicate(rhs),
            },
            ExprKind::Cond {
                cond,
                then_expr,
                else_expr,
            } => ExprKind::Cond {
                cond: self.duplicate(cond),
                then_expr: self.duplicate(then_expr),
                else_expr: self.duplicate(else_expr),
            },
            ExprKind::Ref(inner) => ExprKind::Ref(self.duplicate(inner)),
            ExprKind::Assign { lhs, rhs, is_temp } => ExprKind::Assign {
                lhs: self.duplicate(lhs),
                rhs: self.duplicate(rhs),
                is_temp: *is_temp,
            },
            ExprKind::IndexAssign { aggr, index, value } => ExprKind::IndexAssign {
                aggr: self.duplicate(aggr),
                index: self.duplicate(index),
                value: self.duplicate(value),
            },
            ExprKind::FieldLhsAssign {
                record,
                field,
                value,
            } => ExprKind::FieldLhsAssign {
                record: self.duplicate(record),
                field: *field,
                value: self.duplicate(value),
            },
            ExprKind::Index { aggr, index } => ExprKind::Index {
                aggr: self.duplicate(aggr),
                index: self.duplicate(index),
            },
            ExprKind::AnyIndex { operand, index } => ExprKind::AnyIndex {
                operand: self.duplicate(operand),
                index: *index,
            },
            ExprKind::Field { record, field } => ExprKind::Field {
                record: self.duplicate(record),
                field: *field,
            },
            ExprKind::HasField { record, field } => ExprKind::HasField {
                record: self.duplicate(record),
                field: *field,
            },
            ExprKind::RecordCtor(fields) => ExprKind::RecordCtor(self.duplicate_all(fields)),
            ExprKind::TableCtor(entries) => {
                let pairs: Vec<(&'a Expr<'a>, &'a Expr<'a>)> = entries
                    .iter()
                    .map(|(k, v)| (self.duplicate(k), self.duplicate(v)))
                    .collect();
                ExprKind::TableCtor(self.arena.alloc_slice_copy(&pairs))
            }
            ExprKind::SetCtor(elems) => ExprKind::SetCtor(self.duplicate_all(elems)),
            ExprKind::VectorCtor(elems) => ExprKind::VectorCtor(self.duplicate_all(elems)),
            ExprKind::FieldAssign { field, value } => ExprKind::FieldAssign {
                field: *field,
                value: self.duplicate(value),
            },
            ExprKind::List(elems) => ExprKind::List(self.duplicate_all(elems)),
            ExprKind::Call { func, args } => ExprKind::Call {
                func: self.duplicate(func),
                args: self.duplicate_all(args),
            },
            ExprKind::Lambda(func) => ExprKind::Lambda(func.clone()),
            ExprKind::Event { handler, args } => ExprKind::Event {
                handler: handler.clone(),
                args: self.duplicate_all(args),
            },
            ExprKind::Schedule { delay, event } => ExprKind::Schedule {
                delay: self.duplicate(delay),
                event: self.duplicate(event),
            },
            ExprKind::Cast(operand) => ExprKind::Cast(self.duplicate(operand)),
            ExprKind::Is { operand, test_ty } => ExprKind::Is {
                operand: self.duplicate(operand),
                test_ty: test_ty.clone(),
            },
        };
        let copy = self.arena.alloc(Expr::new(kind, e.ty.clone(), e.span));
        copy.original.set(e.original.get());
        copy
    }

    fn duplicate_all(&self, exprs: &[&'a Expr<'a>]) -> &'a [&'a Expr<'a>] {
        let copies: Vec<&'a Expr<'a>> = exprs.iter().map(|e| self.duplicate(e)).collect();
        self.slice(&copies)
    }
}

/// Result type of `op` over operands of type `l` and `r`, plus the common
/// arithmetic type both operands should be coerced to, if any.
fn binary_result(op: BinaryOp, l: &TypeRef, r: &TypeRef) -> Option<(TypeRef, Option<TypeRef>)> {
    use BinaryOp::*;

    if matches!(**l, Type::Vector(_)) || matches!(**r, Type::Vector(_)) {
        if op == In {
            return Some((types::bool(), None));
        }
        let le = match &**l {
            Type::Vector(e) => e,
            _ => l,
        };
        let re = match &**r {
            Type::Vector(e) => e,
            _ => r,
        };
        let (elem, common) = binary_result(op, le, re)?;
        return Some((types::vector_of(elem), common.map(types::vector_of)));
    }

    match op {
        AndAnd | OrOr => {
            (matches!(**l, Type::Bool) && matches!(**r, Type::Bool)).then(|| (types::bool(), None))
        }
        In => Some((types::bool(), None)),
        Lt | Le | Eq | Ne | Ge | Gt => {
            if l.is_arithmetic() && r.is_arithmetic() {
                let common = arith_common(l, r);
                let coerce = (l.internal_type() != r.internal_type()).then_some(common);
                Some((types::bool(), coerce))
            } else if types::same_type(l, r) {
                Some((types::bool(), None))
            } else {
                None
            }
        }
        Add | Sub | Times | Divide | Mod => {
            if l.is_arithmetic() && r.is_arithmetic() {
                return Some(temporal_result(op, l, r).unwrap_or_else(|| {
                    let common = arith_common(l, r);
                    let coerce = (l.internal_type() != r.internal_type()).then(|| common.clone());
                    (common, coerce)
                }));
            }
            match (&**l, &**r) {
                (Type::String, Type::String) if op == Add => Some((types::string(), None)),
                (Type::Table { .. }, Type::Table { .. }) if op == Sub && types::same_type(l, r) => {
                    Some((l.clone(), None))
                }
                _ => None,
            }
        }
        And | Or | Xor => match (&**l, &**r) {
            (Type::Count, Type::Count) | (Type::Bool, Type::Bool) => Some((l.clone(), None)),
            (Type::Pattern, Type::Pattern) if op != Xor => Some((types::pattern(), None)),
            (Type::Table { .. }, Type::Table { .. }) if op != Xor && types::same_type(l, r) => {
                Some((l.clone(), None))
            }
            _ => None,
        },
        AddTo | AppendTo | RemoveFrom => Some((l.clone(), None)),
    }
}

/// Time and interval arithmetic, which keeps its own result types.
fn temporal_result(op: BinaryOp, l: &TypeRef, r: &TypeRef) -> Option<(TypeRef, Option<TypeRef>)> {
    use BinaryOp::*;
    let ty = match (op, &**l, &**r) {
        (Sub, Type::Time, Type::Time) => types::interval(),
        (Add | Sub, Type::Time, Type::Interval) | (Add, Type::Interval, Type::Time) => types::time(),
        (Add | Sub, Type::Interval, Type::Interval) => types::interval(),
        (Divide, Type::Interval, Type::Interval) => types::double(),
        (Times | Divide, Type::Interval, Type::Double) | (Times, Type::Double, Type::Interval) => {
            types::interval()
        }
        (Times | Divide, Type::Interval, Type::Int | Type::Count) => {
            return Some((types::interval(), Some(types::double())));
        }
        _ => return None,
    };
    Some((ty, None))
}

/// Widest of two arithmetic types: double over int over count.
fn arith_common(l: &TypeRef, r: &TypeRef) -> TypeRef {
    use crate::types::InternalType;
    match (l.internal_type(), r.internal_type()) {
        (InternalType::Double, _) | (_, InternalType::Double) => types::double(),
        (InternalType::Int, _) | (_, InternalType::Int) => types::int(),
        _ => types::count(),
    }
}

/// Whether a value of type `from` can be stored in a location of type `to`
/// (possibly through a coercion inserted during reduction).
fn assignable(to: &Type, from: &Type) -> bool {
    if to.is_any() || from.is_any() {
        return true;
    }
    if to.is_arithmetic() && from.is_arithmetic() {
        return true;
    }
    match (to, from) {
        (Type::Record(a), Type::Record(b)) => a.name == b.name || b.fields.is_empty(),
        (Type::Table { .. }, Type::Table { indices, .. }) => indices.is_empty() || types::same_type(to, from),
        (Type::Vector(_), Type::Vector(e)) => matches!(**e, Type::Any) || types::same_type(to, from),
        _ => types::same_type(to, from),
    }
}

