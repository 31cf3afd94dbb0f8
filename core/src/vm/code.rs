use core::cell::Cell;
use core::fmt;

use hashbrown::{HashMap, HashSet};

use crate::ast::IdPtr;
use crate::vm::ZInst;
use crate::{String, Vec, format};

/// A compiled function body: the flat instruction array plus what an
/// invocation needs to size and tear down its frame.
pub struct ZBody {
    pub name: String,
    pub insts: Vec<ZInst>,
    pub frame_size: usize,
    /// Slots holding reference-counted values.
    pub managed_slots: Vec<usize>,
    /// Where each argument goes, in parameter order.
    pub param_slots: Vec<i32>,
    /// Globals by the index `LoadGlobal` and `DirtyGlobal` refer to, with
    /// the slot each one is loaded into.
    pub globals: Vec<(IdPtr, i32)>,
    /// Iteration states `for` loops need.
    pub num_iters: usize,
    /// What each slot holds, for error messages and listings.
    pub slot_names: Vec<String>,
    pub(crate) counts: Vec<Cell<u64>>,
}

impl ZBody {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: String,
        insts: Vec<ZInst>,
        frame_size: usize,
        managed_slots: Vec<usize>,
        param_slots: Vec<i32>,
        globals: Vec<(IdPtr, i32)>,
        num_iters: usize,
        slot_names: Vec<String>,
    ) -> Self {
        let counts = insts.iter().map(|_| Cell::new(0)).collect();
        ZBody {
            name,
            insts,
            frame_size,
            managed_slots,
            param_slots,
            globals,
            num_iters,
            slot_names,
            counts,
        }
    }

    /// Times each instruction ran, if execution profiling was on.
    pub fn profile(&self) -> Vec<u64> {
        self.counts.iter().map(Cell::get).collect()
    }

    pub fn reset_profile(&self) {
        for count in &self.counts {
            count.set(0);
        }
    }

    pub fn len(&self) -> usize {
        self.insts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }
}

impl fmt::Debug for ZBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ZBody {} {{", self.name)?;
        writeln!(f, "  frame_size: {}", self.frame_size)?;

        if !self.slot_names.is_empty() {
            writeln!(f, "  slots: [")?;
            for (i, name) in self.slot_names.iter().enumerate() {
                let managed = if self.managed_slots.contains(&i) { " (managed)" } else { "" };
                writeln!(f, "    s{} = {}{}", i, name, managed)?;
            }
            writeln!(f, "  ]")?;
        } else {
            writeln!(f, "  slots: []")?;
        }

        // First pass: collect branch targets so they can be labeled.
        let targets: HashSet<usize> = self
            .insts
            .iter()
            .flat_map(|inst| {
                inst.branch_operands()
                    .into_iter()
                    .map(|n| inst.operand(n) as usize)
            })
            .collect();
        let mut sorted: Vec<usize> = targets.into_iter().collect();
        sorted.sort_unstable();
        let labels: HashMap<usize, usize> =
            sorted.into_iter().enumerate().map(|(i, pc)| (pc, i)).collect();

        // Second pass: print instructions with labels.
        writeln!(f, "  instructions:")?;
        for (pc, inst) in self.insts.iter().enumerate() {
            let prefix = labels
                .get(&pc)
                .map(|l| format!("L{}:", l))
                .unwrap_or_default();
            let text = inst.render(&|t| match labels.get(&t) {
                Some(l) => format!("L{}", l),
                None => format!("@{}", t),
            });
            writeln!(f, "    {:4} {:>4}  {}", pc, prefix, text)?;
        }

        write!(f, "}}")
    }
}
