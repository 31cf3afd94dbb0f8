//! Liveness of identifiers over reduced bodies, and the pass that uses it
//! to drop assignments whose values are never read.
//!
//! The analysis runs backwards over the statement tree. Every statement
//! gets the set of identifiers live on entry to it, and statements that
//! define something also remember their successor, so the set live just
//! after them can be looked up. Identical sets are shared rather than
//! copied.

mod analysis;
mod remove_unused;

#[cfg(test)]
mod usedefs_test;

pub use analysis::{UDs, UseDefSet, UseDefs};
pub use remove_unused::remove_unused;
