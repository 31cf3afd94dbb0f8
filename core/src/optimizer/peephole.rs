//! Local rewrites over the intermediate arena.
//!
//! Every pass only clears `live` flags or rewrites operands in place, so
//! branch operands keep pointing into the same arena until compaction.

use hashbrown::HashMap;
use tracing::trace;

use crate::Vec;
use crate::codegen::{SlotKind, ZCode};
use crate::vm::{OpFlavor, ZOp};

/// Kill instructions control cannot reach: those after a goto or return
/// that no branch lands on. Also merge back-to-back global syncs.
pub(super) fn dead_code(code: &mut ZCode) -> bool {
    code.count_labels();
    let mut changed = false;
    let mut reachable = true;
    let mut prev_sync = false;
    for i in 0..code.insts.len() {
        let inst = &mut code.insts[i];
        if !inst.live {
            continue;
        }
        let landed = inst.num_labels > 0;
        if !reachable && !landed {
            trace!(index = i, op = ?inst.op, "unreachable");
            inst.live = false;
            changed = true;
            continue;
        }
        if inst.op == ZOp::SyncGlobals && prev_sync && !landed {
            inst.live = false;
            changed = true;
            continue;
        }
        prev_sync = inst.op == ZOp::SyncGlobals;
        reachable = !inst.op.is_terminal();
    }
    changed
}

/// Whether a value written to `slot` at `at` can still be read.
///
/// That takes a read later in the arena, or a read anywhere inside a
/// range a backward branch around `at` re-enters.
fn read_after(
    reads: &HashMap<i32, Vec<usize>>,
    reentries: &[(usize, usize)],
    slot: i32,
    at: usize,
) -> bool {
    let Some(positions) = reads.get(&slot) else {
        return false;
    };
    let read_in = |lo: usize, hi: usize| {
        let first = positions.partition_point(|&p| p < lo);
        positions.get(first).is_some_and(|&p| p <= hi)
    };
    read_in(at + 1, usize::MAX)
        || reentries
            .iter()
            .any(|&(begin, end)| (begin..=end).contains(&at) && read_in(begin, end))
}

/// Drop computations whose result is never read afterwards.
///
/// Instructions with effects lose only their destination, when the
/// opcode has a variant without one.
pub(super) fn prune(code: &mut ZCode) -> bool {
    let reads = code.read_positions();
    let reentries = code.reentry_ranges();
    let mut changed = false;
    for i in 0..code.insts.len() {
        let Some(dest) = code.insts[i].live.then(|| code.insts[i].written_slot()).flatten() else {
            continue;
        };
        // Global slots are read back by synchronization.
        if matches!(code.slots[dest as usize].kind, SlotKind::Global(_))
            && code.insts[i].op != ZOp::LoadGlobal
        {
            continue;
        }
        if read_after(&reads, &reentries, dest, i) {
            continue;
        }
        let inst = &mut code.insts[i];
        if !inst.op.has_side_effects() {
            trace!(index = i, op = ?inst.op, slot = dest, "prune");
            inst.live = false;
            changed = true;
        } else if let (Some(op), Some(flavor)) = (inst.op.without_result(), inst.flavor.without_write()) {
            trace!(index = i, op = ?inst.op, slot = dest, "drop result");
            inst.op = op;
            inst.flavor = flavor;
            inst.v1 = inst.v2;
            inst.v2 = inst.v3;
            inst.v3 = inst.v4;
            inst.v4 = 0;
            changed = true;
        }
    }
    changed
}

/// Follow goto chains, skip dead targets, and drop gotos to the very
/// next instruction.
pub(super) fn collapse_branches(code: &mut ZCode) -> bool {
    let mut changed = false;
    for i in 0..code.insts.len() {
        if !code.insts[i].live {
            continue;
        }
        let targets = code.insts[i].targets();
        for (which, target) in targets.into_iter().enumerate() {
            let resolved = resolve(code, i, target);
            if resolved != target {
                code.insts[i].set_target(which, resolved);
                changed = true;
            }
        }
        if code.insts[i].op == ZOp::Goto && code.next_live(i + 1) == Some(code.insts[i].v1 as usize) {
            trace!(index = i, "goto next");
            code.insts[i].live = false;
            changed = true;
        }
    }
    if changed {
        code.count_labels();
    }
    changed
}

/// Final destination of a branch from `from` to `target`.
fn resolve(code: &ZCode, from: usize, target: usize) -> usize {
    let mut t = target;
    // Bounded, since a goto may loop to itself.
    for _ in 0..code.insts.len() {
        let Some(n) = code.next_live(t) else {
            return t;
        };
        let inst = &code.insts[n];
        if inst.op == ZOp::Goto && n != from && inst.v1 as usize != n {
            t = inst.v1 as usize;
        } else {
            return n;
        }
    }
    t
}

/// Kill `s = s` left behind when slot sharing merged both sides.
pub(super) fn kill_self_assigns(code: &mut ZCode) -> bool {
    let mut changed = false;
    for inst in code.insts.iter_mut().filter(|i| i.live) {
        if inst.op == ZOp::Assign && inst.flavor == OpFlavor::WR && inst.v1 == inst.v2 {
            inst.live = false;
            changed = true;
        }
    }
    changed
}
