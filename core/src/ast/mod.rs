//! Expression and statement trees.
//!
//! Nodes live in a `bumpalo` arena and refer to their children by `&'a`
//! reference. Reduction never mutates a node in place; it builds new
//! nodes in the same arena, linking each back to the node it came from.

mod describe;
mod expr;
mod ident;
mod stmt;
mod traverse;
mod tree;

pub use expr::{BinaryOp, Expr, ExprKind, ExprTag, UnaryOp};
pub use ident::{Id, IdPtr, Scope};
pub use stmt::{Case, Stmt, StmtKey, StmtKind};
pub use traverse::{Traversal, TraversalCode, traverse_expr, traverse_stmt};
pub use tree::{Tree, declare_event, declare_func, new_const, new_global, new_local};

#[cfg(test)]
mod tree_test;
