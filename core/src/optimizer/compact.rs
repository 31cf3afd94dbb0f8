use crate::codegen::ZCode;
use crate::vm::ZBody;
use crate::{Vec, vec};

/// Flatten the live instructions into an executable body.
///
/// A branch to a dead instruction lands on the next live one after it.
pub fn compact(code: ZCode) -> ZBody {
    let mut new_pc = vec![0usize; code.insts.len() + 1];
    let mut pc = 0;
    for (i, inst) in code.insts.iter().enumerate() {
        new_pc[i] = pc;
        if inst.live {
            pc += 1;
        }
    }
    new_pc[code.insts.len()] = pc;

    let insts = code
        .insts
        .into_iter()
        .filter(|i| i.live)
        .map(|mut i| {
            for (which, target) in i.targets().into_iter().enumerate() {
                i.set_target(which, new_pc[target]);
            }
            i.inst
        })
        .collect();

    let managed_slots: Vec<usize> = code
        .slots
        .iter()
        .enumerate()
        .filter(|(_, s)| s.managed)
        .map(|(n, _)| n)
        .collect();
    let slot_names = code.slots.iter().map(|s| s.name.clone()).collect();
    let globals = code.globals.into_iter().map(|g| (g.id, g.slot)).collect();

    ZBody::new(
        code.name,
        insts,
        code.slots.len(),
        managed_slots,
        code.param_slots,
        globals,
        code.num_iters,
        slot_names,
    )
}
