use core::mem;

use crate::interp::RuntimeError;
use crate::values::Val;
use crate::vm::ZBody;
use crate::{Vec, vec};

/// Where a global's current value lives during one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalState {
    /// The slot holds nothing useful; the next read loads the global.
    Unloaded,
    /// The slot matches the global.
    Clean,
    /// The slot is newer than the global and must be written back.
    Dirty,
}

/// Progress of one `for` loop.
#[derive(Debug, Default)]
pub(crate) struct LoopState {
    /// Index components and element of each remaining iteration.
    pub items: Vec<(Vec<Val>, Option<Val>)>,
    pub next: usize,
}

/// Storage for one invocation of a compiled body.
///
/// Slots are sized once from the body. `Val::Void` marks a slot that has
/// not been assigned. A frame outlives a suspended invocation: the caller
/// keeps it and hands it back on resumption.
#[derive(Debug)]
pub struct ZFrame {
    slots: Vec<Val>,
    managed: Vec<usize>,
    pub(crate) loops: Vec<LoopState>,
    pub(crate) globals: Vec<GlobalState>,
    /// Backward branches taken so far.
    pub(crate) iterations: usize,
}

impl ZFrame {
    pub fn new(body: &ZBody) -> Self {
        ZFrame {
            slots: vec![Val::Void; body.frame_size],
            managed: body.managed_slots.clone(),
            loops: (0..body.num_iters).map(|_| LoopState::default()).collect(),
            globals: vec![GlobalState::Unloaded; body.globals.len()],
            iterations: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Raw slot contents, `Val::Void` when unset.
    pub fn get(&self, slot: usize) -> &Val {
        &self.slots[slot]
    }

    /// Slot contents, or `ValueNotSet` naming what the slot holds.
    pub(crate) fn read(&self, slot: i32, body: &ZBody) -> Result<&Val, RuntimeError> {
        match &self.slots[slot as usize] {
            Val::Void => Err(RuntimeError::ValueNotSet {
                name: body.slot_names[slot as usize].clone(),
                span: None,
            }),
            v => Ok(v),
        }
    }

    /// Store into a slot. The previous value is released first.
    pub fn set(&mut self, slot: usize, val: Val) {
        let old = mem::replace(&mut self.slots[slot], val);
        drop(old);
    }

    pub fn clear(&mut self, slot: usize) {
        self.set(slot, Val::Void);
    }

    /// Drop the reference a managed slot holds.
    pub fn release(&mut self, slot: usize) {
        if self.slots[slot].is_managed() {
            self.slots[slot] = Val::Void;
        }
    }

    /// Release every managed slot, at the end of an invocation.
    pub fn release_all(&mut self) {
        for i in 0..self.managed.len() {
            let slot = self.managed[i];
            self.release(slot);
        }
        for state in &mut self.loops {
            *state = LoopState::default();
        }
    }

    pub fn managed_slots(&self) -> &[usize] {
        &self.managed
    }
}
