//! Lowering of reduced bodies into ZAM instructions.
//!
//! Code generation is deliberately naive. Every identifier and temporary
//! gets its own frame slot, globals are loaded right before each read and
//! marked dirty right after each write, and control flow becomes forward
//! branches plus one backward branch per loop. The optimizer cleans this
//! up afterwards.
//!
//! Branches are emitted against labels and patched once the whole body
//! has been lowered, the same way forward jumps are patched in a
//! single-pass compiler.

mod error;
mod expr;
mod stmt;
mod zcode;


use hashbrown::HashMap;
use tracing::debug;

use crate::api::Span;
use crate::ast::{
    Expr, ExprKind, IdPtr, Scope, Stmt, StmtKind, Traversal, TraversalCode, traverse_stmt,
};
use crate::types::TypeRef;
use crate::values::{ScriptFunc, Val};
use crate::vm::{AuxItem, OpFlavor, ZInst, ZOp};
use crate::{String, Vec, format};

pub use error::CompileError;
pub use zcode::{GlobalInfo, LoopRange, SlotInfo, SlotKind, ZCode, ZInstI};

/// Frame slots addressable by an instruction operand.
pub const MAX_SLOTS: usize = 1 << 16;

/// Lower a reduced body of `func`.
pub fn generate<'a>(func: &ScriptFunc, body: &'a Stmt<'a>) -> Result<ZCode, CompileError> {
    let mut scan = GlobalScan::default();
    traverse_stmt(body, &mut scan);
    let mut g = Generator::new(func, scan.found);
    g.stmt(body)?;
    let code = g.finish()?;
    debug!(
        func = %code.name,
        insts = code.insts.len(),
        slots = code.slots.len(),
        globals = code.globals.len(),
        "generated code"
    );
    Ok(code)
}

/// Finds whether a body touches any global, which decides if calls and
/// returns need to synchronize them.
#[derive(Default)]
struct GlobalScan {
    found: bool,
}

fn is_global_storage(id: &IdPtr) -> bool {
    match id.scope {
        Scope::Global => true,
        Scope::Const => expr::embedded_value(id).is_none(),
        _ => false,
    }
}

impl<'a> Traversal<'a> for GlobalScan {
    fn pre_stmt(&mut self, stmt: &'a Stmt<'a>) -> TraversalCode {
        let ids: &[IdPtr] = match &stmt.kind {
            StmtKind::Init(ids) => ids,
            StmtKind::For { vars, .. } => vars,
            _ => &[],
        };
        if ids.iter().any(is_global_storage) {
            self.found = true;
            return TraversalCode::AbortAll;
        }
        TraversalCode::Continue
    }

    fn pre_expr(&mut self, expr: &'a Expr<'a>) -> TraversalCode {
        match &expr.kind {
            ExprKind::Name(id) if is_global_storage(id) => {
                self.found = true;
                TraversalCode::AbortAll
            }
            _ => TraversalCode::Continue,
        }
    }
}

/// A place branches can refer to before it is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Label(usize);

/// A singleton operand: a frame slot or an embedded constant.
#[derive(Debug, Clone)]
pub(crate) enum Opnd {
    Slot(i32),
    Const(Val),
}

impl Opnd {
    fn aux(self) -> AuxItem {
        match self {
            Opnd::Slot(s) => AuxItem::Slot(s),
            Opnd::Const(v) => AuxItem::Const(v),
        }
    }
}

/// Where `break`, `next`, `fallthrough` and `return` go.
enum Context {
    Loop { cont: Label, exit: Label },
    Switch { exit: Label, fall: Label },
    Catch { ret: Option<i32>, end: Label },
}

pub(crate) struct Generator {
    code: ZCode,
    slot_of: HashMap<IdPtr, i32>,
    global_of: HashMap<IdPtr, usize>,
    labels: Vec<Option<usize>>,
    /// Branch operands to patch: instruction, which branch, label.
    fixups: Vec<(usize, usize, Label)>,
    contexts: Vec<Context>,
    loop_depth: usize,
    /// The body touches globals, so calls and returns synchronize them.
    sync: bool,
    loc: Span,
}

impl Generator {
    fn new(func: &ScriptFunc, sync: bool) -> Self {
        let mut g = Generator {
            code: ZCode {
                name: func.name.clone(),
                insts: Vec::new(),
                slots: Vec::new(),
                param_slots: Vec::new(),
                globals: Vec::new(),
                loops: Vec::new(),
                num_iters: 0,
            },
            slot_of: HashMap::new(),
            global_of: HashMap::new(),
            labels: Vec::new(),
            fixups: Vec::new(),
            contexts: Vec::new(),
            loop_depth: 0,
            sync,
            loc: Span::default(),
        };
        for param in &func.params {
            let slot = g.slot_for(param);
            g.code.param_slots.push(slot);
        }
        g
    }

    fn finish(mut self) -> Result<ZCode, CompileError> {
        self.sync_globals();
        self.emit(ZInst::new(ZOp::Return, OpFlavor::X));
        for (index, which, label) in core::mem::take(&mut self.fixups) {
            let Some(target) = self.labels[label.0] else {
                internal_error!("branch to unplaced label {}", label.0);
            };
            self.code.insts[index].set_target(which, target);
        }
        if self.code.slots.len() > MAX_SLOTS {
            return Err(CompileError::TooManySlots {
                needed: self.code.slots.len(),
                limit: MAX_SLOTS,
            });
        }
        self.code.count_labels();
        Ok(self.code)
    }

    // ------------------------------------------------------------------
    // Emission
    // ------------------------------------------------------------------

    fn emit(&mut self, mut inst: ZInst) -> usize {
        if inst.loc.is_none() {
            inst.loc = Some(self.loc);
        }
        self.code.insts.push(ZInstI::new(inst, self.loop_depth));
        self.code.insts.len() - 1
    }

    /// Emit a branching instruction whose targets are `targets`, in
    /// operand order.
    fn emit_branch(&mut self, inst: ZInst, targets: &[Label]) -> usize {
        let index = self.emit(inst);
        for (which, label) in targets.iter().enumerate() {
            self.fixups.push((index, which, *label));
        }
        index
    }

    fn goto(&mut self, label: Label) {
        self.emit_branch(ZInst::new(ZOp::Goto, OpFlavor::B), &[label]);
    }

    fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Bind `label` to the next instruction emitted.
    fn place(&mut self, label: Label) {
        self.labels[label.0] = Some(self.code.insts.len());
    }

    fn sync_globals(&mut self) {
        if self.sync {
            self.emit(ZInst::new(ZOp::SyncGlobals, OpFlavor::X));
        }
    }

    /// Emit `op` writing `dest` (if any) from `inputs`, picking the flavor
    /// from where the inputs live.
    fn emit_op(
        &mut self,
        op: ZOp,
        dest: Option<i32>,
        inputs: Vec<Opnd>,
        ty: Option<TypeRef>,
    ) -> usize {
        let mut inputs = inputs;
        // One embedded constant per instruction.
        if inputs.len() == 2 && matches!(inputs[0], Opnd::Const(_)) {
            if let Opnd::Const(_) = inputs[1] {
                let first = inputs.remove(0);
                let slot = self.materialize(first, ty.clone());
                inputs.insert(0, Opnd::Slot(slot));
            }
        }
        let (flavor, slots, c) = match (dest, inputs.as_slice()) {
            (Some(d), []) => (OpFlavor::W, [d, 0, 0], None),
            (Some(d), [Opnd::Slot(a)]) => (OpFlavor::WR, [d, *a, 0], None),
            (Some(d), [Opnd::Const(v)]) => (OpFlavor::WC, [d, 0, 0], Some(v.clone())),
            (Some(d), [Opnd::Slot(a), Opnd::Slot(b)]) => (OpFlavor::WRR, [d, *a, *b], None),
            (Some(d), [Opnd::Slot(a), Opnd::Const(v)]) => {
                (OpFlavor::WRC, [d, *a, 0], Some(v.clone()))
            }
            (Some(d), [Opnd::Const(v), Opnd::Slot(b)]) => {
                (OpFlavor::WCR, [d, *b, 0], Some(v.clone()))
            }
            (None, []) => (OpFlavor::X, [0, 0, 0], None),
            (None, [Opnd::Slot(a)]) => (OpFlavor::R, [*a, 0, 0], None),
            (None, [Opnd::Const(v)]) => (OpFlavor::C, [0, 0, 0], Some(v.clone())),
            (None, [Opnd::Slot(a), Opnd::Slot(b)]) => (OpFlavor::RR, [*a, *b, 0], None),
            (None, [Opnd::Slot(a), Opnd::Const(v)]) => (OpFlavor::RC, [*a, 0, 0], Some(v.clone())),
            _ => internal_error!("no flavor for {} with {} inputs", op.name(), inputs.len()),
        };
        let mut inst = ZInst::new(op, flavor);
        inst.v1 = slots[0];
        inst.v2 = slots[1];
        inst.v3 = slots[2];
        inst.c = c;
        inst.t = ty;
        self.emit(inst)
    }

    /// Put a constant in a scratch slot.
    fn materialize(&mut self, v: Opnd, ty: Option<TypeRef>) -> i32 {
        match v {
            Opnd::Slot(s) => s,
            Opnd::Const(val) => {
                let managed = val.is_managed();
                let slot = self.new_slot(String::from("<const>"), SlotKind::Scratch, managed);
                let mut inst = ZInst::new(ZOp::Assign, OpFlavor::WC);
                inst.v1 = slot;
                inst.c = Some(val);
                inst.t = ty;
                self.emit(inst);
                slot
            }
        }
    }

    // ------------------------------------------------------------------
    // Slots
    // ------------------------------------------------------------------

    fn new_slot(&mut self, name: String, kind: SlotKind, managed: bool) -> i32 {
        self.code.slots.push(SlotInfo {
            name,
            kind,
            managed,
        });
        (self.code.slots.len() - 1) as i32
    }

    fn scratch(&mut self, ty: &TypeRef) -> i32 {
        let n = self.code.slots.len();
        self.new_slot(format!("<tmp{}>", n), SlotKind::Scratch, ty.is_managed())
    }

    /// The slot holding `id`, allocating one on first sight.
    fn slot_for(&mut self, id: &IdPtr) -> i32 {
        if let Some(slot) = self.slot_of.get(id) {
            return *slot;
        }
        let kind = match id.scope {
            Scope::Param => SlotKind::Param,
            Scope::Local => SlotKind::Local,
            Scope::Temp => SlotKind::Temp,
            Scope::Global | Scope::Const => SlotKind::Global(self.code.globals.len()),
        };
        let slot = self.new_slot(id.name.clone(), kind, id.ty.is_managed());
        if let SlotKind::Global(index) = kind {
            self.code.globals.push(GlobalInfo {
                id: id.clone(),
                slot,
            });
            self.global_of.insert(id.clone(), index);
        }
        self.slot_of.insert(id.clone(), slot);
        slot
    }

    /// The slot of `id`, loading it first if it is a global.
    fn read_id(&mut self, id: &IdPtr) -> i32 {
        let slot = self.slot_for(id);
        if let Some(&index) = self.global_of.get(id) {
            let mut load = ZInst::new(ZOp::LoadGlobal, OpFlavor::WI);
            load.v1 = slot;
            load.v2 = index as i32;
            self.emit(load);
        }
        slot
    }

    /// Note a write to `slot`; globals become dirty.
    fn wrote(&mut self, slot: i32) {
        if let SlotKind::Global(index) = self.code.slots[slot as usize].kind {
            let mut dirty = ZInst::new(ZOp::DirtyGlobal, OpFlavor::I);
            dirty.v1 = index as i32;
            self.emit(dirty);
        }
    }
}
