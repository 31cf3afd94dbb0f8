//! Frame slot sharing.
//!
//! Slots whose lifetimes do not overlap are folded onto one frame slot,
//! first fit in order of birth. Parameters and globals are placed first
//! and never shared, and a slot holding managed values only shares with
//! other managed ones so the release list stays exact.

use tracing::debug;

use crate::codegen::{SlotInfo, ZCode};
use crate::optimizer::Lifetime;
use crate::{String, Vec, format, vec};

/// Occupant history of one frame slot.
struct Denizen {
    info: SlotInfo,
    /// Last instruction the current occupant needs.
    end: usize,
    /// Original slot of the current occupant.
    last: i32,
    pinned: bool,
}

/// Rewrite every live instruction onto shared frame slots. Returns the
/// new frame size.
pub fn remap_slots(code: &mut ZCode, lifetimes: &[Option<Lifetime>]) -> usize {
    let mut mapping: Vec<Option<i32>> = vec![None; code.slots.len()];
    let mut frame: Vec<Denizen> = Vec::new();

    let pinned = code
        .param_slots
        .iter()
        .copied()
        .chain(code.globals.iter().map(|g| g.slot));
    for slot in pinned {
        let info = code.slots[slot as usize].clone();
        mapping[slot as usize] = Some(frame.len() as i32);
        frame.push(Denizen {
            info,
            end: usize::MAX,
            last: slot,
            pinned: true,
        });
    }

    let mut order: Vec<(usize, i32)> = lifetimes
        .iter()
        .enumerate()
        .filter(|(s, _)| mapping[*s].is_none())
        .filter_map(|(s, lt)| lt.map(|lt| (lt.begin, s as i32)))
        .collect();
    order.sort_unstable();

    for (begin, slot) in order {
        let lt = lifetimes[slot as usize].unwrap_or(Lifetime { begin, end: begin });
        let info = &code.slots[slot as usize];
        let fits = |d: &Denizen| {
            !d.pinned
                && d.info.managed == info.managed
                && (d.end < begin || (d.end == begin && hands_over(code, begin, d.last, slot)))
        };
        // An occupant dying exactly where this one is born packs tightest.
        let pick = frame
            .iter()
            .position(|d| d.end == begin && fits(d))
            .or_else(|| frame.iter().position(fits));
        match pick {
            Some(n) => {
                let d = &mut frame[n];
                d.info.name = join_names(&d.info.name, &info.name);
                d.end = lt.end;
                d.last = slot;
                mapping[slot as usize] = Some(n as i32);
            }
            None => {
                mapping[slot as usize] = Some(frame.len() as i32);
                frame.push(Denizen {
                    info: info.clone(),
                    end: lt.end,
                    last: slot,
                    pinned: false,
                });
            }
        }
    }

    for inst in code.insts.iter_mut().filter(|i| i.live) {
        inst.map_slots(|s| match mapping[s as usize] {
            Some(n) => n,
            None => internal_error!("live instruction uses slot {} with no lifetime", s),
        });
    }
    let remap = |s: i32| mapping[s as usize].unwrap_or(s);
    for s in &mut code.param_slots {
        *s = remap(*s);
    }
    for g in &mut code.globals {
        g.slot = remap(g.slot);
    }
    for range in &mut code.loops {
        for s in &mut range.pinned {
            *s = remap(*s);
        }
    }

    debug!(before = code.slots.len(), after = frame.len(), "remapped frame");
    code.slots = frame.into_iter().map(|d| d.info).collect();
    code.slots.len()
}

/// Whether `old` can give its slot to `new` at instruction `at`: the
/// instruction reads the old occupant before writing the new one.
fn hands_over(code: &ZCode, at: usize, old: i32, new: i32) -> bool {
    let inst = &code.insts[at];
    let writes = inst.write_slots();
    inst.read_slots().contains(&old)
        && !writes.contains(&old)
        && writes.contains(&new)
        && !inst.read_slots().contains(&new)
        && !inst.op.aux_writes()
}

fn join_names(a: &str, b: &str) -> String {
    if a.split('/').any(|n| n == b) {
        String::from(a)
    } else {
        format!("{}/{}", a, b)
    }
}
