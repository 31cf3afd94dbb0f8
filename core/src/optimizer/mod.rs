//! Frame allocation and peephole optimization.
//!
//! Code generation hands over one slot per identifier or temporary and
//! plenty of redundant branches. [`optimize`] cleans that up in place on
//! the intermediate arena, and [`compact`] flattens what survives into a
//! [`ZBody`](crate::vm::ZBody).

mod compact;
mod lifetimes;
mod peephole;
mod remap;


pub use compact::compact;
pub use lifetimes::{Lifetime, compute_lifetimes};
pub use remap::remap_slots;

use tracing::debug;

use crate::codegen::ZCode;

/// Result of one [`optimize`] run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimizeStats {
    pub rounds: usize,
    pub insts_before: usize,
    pub insts_after: usize,
    pub slots_before: usize,
    pub slots_after: usize,
}

/// Rounds of the local passes before giving up on a fixpoint.
const MAX_ROUNDS: usize = 64;

fn local_passes(code: &mut ZCode) -> usize {
    let mut rounds = 0;
    loop {
        rounds += 1;
        let mut changed = peephole::dead_code(code);
        changed |= peephole::prune(code);
        changed |= peephole::collapse_branches(code);
        if !changed || rounds >= MAX_ROUNDS {
            return rounds;
        }
    }
}

/// Run the local passes to a fixpoint, then share frame slots between
/// values whose lifetimes do not overlap.
pub fn optimize(code: &mut ZCode) -> OptimizeStats {
    let insts_before = code.live_count();
    let slots_before = code.slots.len();

    let mut rounds = local_passes(code);
    let lifetimes = compute_lifetimes(code);
    let slots_after = remap_slots(code, &lifetimes);
    // Sharing turns copies between merged slots into no-ops.
    if peephole::kill_self_assigns(code) {
        rounds += local_passes(code);
    }
    code.count_labels();

    let stats = OptimizeStats {
        rounds,
        insts_before,
        insts_after: code.live_count(),
        slots_before,
        slots_after,
    };
    debug!(
        func = %code.name,
        rounds = stats.rounds,
        insts_before = stats.insts_before,
        insts_after = stats.insts_after,
        slots_before = stats.slots_before,
        slots_after = stats.slots_after,
        "optimized"
    );
    stats
}
