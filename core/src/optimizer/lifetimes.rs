//! Slot lifetimes over the live instructions.

use hashbrown::HashSet;

use crate::codegen::{LoopRange, ZCode};
use crate::{Vec, vec};

/// Inclusive range of instruction indices over which a slot's value must
/// survive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifetime {
    pub begin: usize,
    pub end: usize,
}

impl Lifetime {
    fn cover(&mut self, begin: usize, end: usize) {
        self.begin = self.begin.min(begin);
        self.end = self.end.max(end);
    }

    pub fn contains(&self, index: usize) -> bool {
        (self.begin..=self.end).contains(&index)
    }
}

fn cover(lt: &mut Option<Lifetime>, begin: usize, end: usize) {
    match lt {
        Some(l) => l.cover(begin, end),
        None => *lt = Some(Lifetime { begin, end }),
    }
}

/// Lifetime of every slot, `None` for slots no live instruction touches.
///
/// A straight-line lifetime runs from first to last access. Inside a loop
/// a value can flow from the bottom of one iteration to the top of the
/// next, so variables touched in a loop live across all of it. Temporaries
/// are single-assignment and only need that when read in a loop they were
/// not computed in.
pub fn compute_lifetimes(code: &ZCode) -> Vec<Option<Lifetime>> {
    let mut lifetimes: Vec<Option<Lifetime>> = vec![None; code.slots.len()];
    for (i, inst) in code.insts.iter().enumerate().filter(|(_, i)| i.live) {
        for s in inst.read_slots().into_iter().chain(inst.write_slots()) {
            cover(&mut lifetimes[s as usize], i, i);
        }
    }

    // Parameters arrive before the first instruction.
    for &s in &code.param_slots {
        if let Some(lt) = &mut lifetimes[s as usize] {
            lt.cover(0, lt.end);
        }
    }

    let loops: Vec<&LoopRange> = code
        .loops
        .iter()
        .filter(|l| (l.start..=l.end).any(|i| code.insts.get(i).is_some_and(|i| i.live)))
        .collect();

    for range in loops {
        let (reads, writes) = accesses(code, range);
        for s in reads.union(&writes) {
            if !code.slots[*s as usize].is_temp() || !writes.contains(s) {
                cover(&mut lifetimes[*s as usize], range.start, range.end);
            }
        }
        for &s in &range.pinned {
            cover(&mut lifetimes[s as usize], range.start, range.end);
        }
    }
    lifetimes
}

fn accesses(code: &ZCode, range: &LoopRange) -> (HashSet<i32>, HashSet<i32>) {
    let mut reads = HashSet::new();
    let mut writes = HashSet::new();
    let end = range.end.min(code.insts.len().saturating_sub(1));
    for inst in code.insts[range.start..=end].iter().filter(|i| i.live) {
        reads.extend(inst.read_slots());
        writes.extend(inst.write_slots());
    }
    (reads, writes)
}
