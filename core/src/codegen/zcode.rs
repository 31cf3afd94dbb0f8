//! Intermediate code: instructions plus the bookkeeping the optimizer
//! needs before everything is flattened into a `ZBody`.

use core::fmt;
use core::ops::{Deref, DerefMut};

use hashbrown::HashMap;

use crate::ast::IdPtr;
use crate::vm::ZInst;
use crate::{String, Vec, format};

/// An instruction in the intermediate arena.
///
/// Instructions are never removed from the arena; the optimizer clears
/// `live` instead, so branch operands (indices into the arena) stay valid
/// until compaction.
#[derive(Debug, Clone)]
pub struct ZInstI {
    pub inst: ZInst,
    pub live: bool,
    /// How many live branches land here.
    pub num_labels: usize,
    /// Number of loops enclosing the instruction.
    pub loop_depth: usize,
}

impl ZInstI {
    pub fn new(inst: ZInst, loop_depth: usize) -> Self {
        ZInstI {
            inst,
            live: true,
            num_labels: 0,
            loop_depth,
        }
    }

    /// Branch targets, in operand order.
    pub fn targets(&self) -> Vec<usize> {
        self.inst
            .branch_operands()
            .into_iter()
            .map(|n| self.inst.operand(n) as usize)
            .collect()
    }

    pub fn set_target(&mut self, which: usize, target: usize) {
        let operands = self.inst.branch_operands();
        *self.inst.operand_mut(operands[which]) = target as i32;
    }
}

impl Deref for ZInstI {
    type Target = ZInst;

    fn deref(&self) -> &ZInst {
        &self.inst
    }
}

impl DerefMut for ZInstI {
    fn deref_mut(&mut self) -> &mut ZInst {
        &mut self.inst
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    Param,
    /// Holds global number `n` while it is loaded.
    Global(usize),
    Local,
    Temp,
    /// Holds a constant or intermediate result the code generator needed
    /// in a slot.
    Scratch,
}

#[derive(Debug, Clone)]
pub struct SlotInfo {
    /// Names of the identifiers sharing the slot, joined with `/`.
    pub name: String,
    pub kind: SlotKind,
    /// Holds reference-counted values that must be released.
    pub managed: bool,
}

impl SlotInfo {
    /// Parameters and globals keep their own slot through remapping.
    pub fn is_pinned(&self) -> bool {
        matches!(self.kind, SlotKind::Param | SlotKind::Global(_))
    }

    /// Assigned once and invisible to the script.
    pub fn is_temp(&self) -> bool {
        matches!(self.kind, SlotKind::Temp | SlotKind::Scratch)
    }
}

/// A global the body reads or writes, with the slot it is loaded into.
#[derive(Debug, Clone)]
pub struct GlobalInfo {
    pub id: IdPtr,
    pub slot: i32,
}

/// The instructions of one loop: `start` is the first instruction run
/// on every iteration, `end` the branch back to it.
#[derive(Debug, Clone)]
pub struct LoopRange {
    pub start: usize,
    pub end: usize,
    pub depth: usize,
    /// Iteration variables and the aggregate iterated over, which must
    /// keep their slots for the whole loop.
    pub pinned: Vec<i32>,
}

impl LoopRange {
    pub fn contains(&self, index: usize) -> bool {
        (self.start..=self.end).contains(&index)
    }
}

/// A function body as generated, before compaction.
#[derive(Debug, Clone)]
pub struct ZCode {
    pub name: String,
    pub insts: Vec<ZInstI>,
    pub slots: Vec<SlotInfo>,
    pub param_slots: Vec<i32>,
    pub globals: Vec<GlobalInfo>,
    pub loops: Vec<LoopRange>,
    /// Iteration states `for` loops need.
    pub num_iters: usize,
}

impl ZCode {
    pub fn live_count(&self) -> usize {
        self.insts.iter().filter(|i| i.live).count()
    }

    /// Index of the first live instruction at or after `index`.
    pub fn next_live(&self, index: usize) -> Option<usize> {
        (index..self.insts.len()).find(|&i| self.insts[i].live)
    }

    /// Recount the live branches landing on each instruction.
    pub fn count_labels(&mut self) {
        for inst in &mut self.insts {
            inst.num_labels = 0;
        }
        let targets: Vec<usize> = self
            .insts
            .iter()
            .filter(|i| i.live)
            .flat_map(|i| i.targets())
            .collect();
        for t in targets {
            self.insts[t].num_labels += 1;
        }
    }

    /// Whether any live instruction reads `slot`.
    pub fn is_read(&self, slot: i32) -> bool {
        self.insts
            .iter()
            .any(|i| i.live && i.read_slots().contains(&slot))
    }

    /// Where each slot is read, as ascending indices of live instructions.
    pub fn read_positions(&self) -> HashMap<i32, Vec<usize>> {
        let mut positions: HashMap<i32, Vec<usize>> = HashMap::new();
        for (i, inst) in self.insts.iter().enumerate().filter(|(_, i)| i.live) {
            for s in inst.read_slots() {
                positions.entry(s).or_default().push(i);
            }
        }
        positions
    }

    /// Ranges `[target, from]` of live backward branches: loop back edges
    /// and resumption points. Control may re-enter any of them.
    pub fn reentry_ranges(&self) -> Vec<(usize, usize)> {
        let mut ranges = Vec::new();
        for (i, inst) in self.insts.iter().enumerate().filter(|(_, i)| i.live) {
            ranges.extend(inst.targets().into_iter().filter(|&t| t <= i).map(|t| (t, i)));
        }
        ranges
    }
}

impl fmt::Display for ZCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({} slots):", self.name, self.slots.len())?;
        for (index, inst) in self.insts.iter().enumerate() {
            let mark = if inst.live { ' ' } else { 'x' };
            let text = inst.render(&|t| format!("-> {}", t));
            writeln!(f, "  {:4} {} {}", index, mark, text)?;
        }
        Ok(())
    }
}
