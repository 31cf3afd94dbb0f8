//! The dispatch loop.

use core::cell::RefCell;

use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::ast::BinaryOp;
use crate::interp::{
    Runtime, RuntimeError, any_index, clash, load_field, load_index, loop_items, store_field,
    store_index,
};
use crate::types::{Type, TypeRef};
use crate::values::{RecordVal, TableKey, TableVal, Val, empty_aggregate, ops};
use crate::vm::frame::{GlobalState, LoopState};
use crate::vm::{AuxItem, OpFlavor, OperandKind, ZAux, ZBody, ZFrame, ZInst, ZOp};
use crate::{Rc, String, ToString, Vec};

/// Where a suspended invocation picks up again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resumption {
    pub pc: usize,
}

/// How a resumable invocation stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Returned(Val),
    Suspended(Resumption),
}

enum Step {
    Next,
    Jump(usize),
    Return(Val),
    Suspend(usize),
}

type Inputs = SmallVec<[Val; 2]>;

impl ZBody {
    /// A frame with the arguments in their parameter slots.
    pub fn new_frame(&self, args: Vec<Val>) -> ZFrame {
        let mut frame = ZFrame::new(self);
        for (slot, arg) in self.param_slots.iter().zip(args) {
            frame.set(*slot as usize, arg);
        }
        frame
    }

    /// Run to completion. A `when` whose condition does not hold skips
    /// its body, as there is nobody to resume the invocation later.
    pub fn exec(&self, args: Vec<Val>, rt: &Runtime<'_>) -> Result<Val, RuntimeError> {
        let mut frame = self.new_frame(args);
        let result = self.run(&mut frame, 0, false, rt);
        frame.release_all();
        match result? {
            Outcome::Returned(v) => Ok(v),
            Outcome::Suspended(r) => internal_error!("{} suspended at {} without resumption", self.name, r.pc),
        }
    }

    /// Run from the start in a caller-owned frame, parking the invocation
    /// at the first unmet `when` condition.
    pub fn exec_resumable(&self, frame: &mut ZFrame, rt: &Runtime<'_>) -> Result<Outcome, RuntimeError> {
        self.run(frame, 0, true, rt)
    }

    /// Continue a parked invocation. Globals are reloaded, since they may
    /// have changed in the meantime.
    pub fn resume(
        &self,
        frame: &mut ZFrame,
        resumption: Resumption,
        rt: &Runtime<'_>,
    ) -> Result<Outcome, RuntimeError> {
        debug!(func = %self.name, pc = resumption.pc, "resume");
        for state in &mut frame.globals {
            *state = GlobalState::Unloaded;
        }
        self.run(frame, resumption.pc, true, rt)
    }

    fn run(
        &self,
        frame: &mut ZFrame,
        start: usize,
        resumable: bool,
        rt: &Runtime<'_>,
    ) -> Result<Outcome, RuntimeError> {
        let profiling = rt.options.profile;
        let mut pc = start;
        loop {
            let Some(inst) = self.insts.get(pc) else {
                internal_error!("{}: pc {} past the end", self.name, pc);
            };
            trace!(pc, op = ?inst.op, "dispatch");
            if profiling {
                let count = &self.counts[pc];
                count.set(count.get() + 1);
            }
            let step = self
                .step(inst, frame, resumable, rt)
                .map_err(|err| match inst.loc {
                    Some(loc) => err.at(loc),
                    None => err,
                })?;
            match step {
                Step::Next => pc += 1,
                Step::Jump(target) => {
                    if target <= pc {
                        count_iteration(frame, rt)?;
                    }
                    pc = target;
                }
                Step::Return(v) => return Ok(Outcome::Returned(v)),
                Step::Suspend(at) => {
                    self.sync_globals(frame);
                    debug!(func = %self.name, pc = at, "suspend");
                    return Ok(Outcome::Suspended(Resumption { pc: at }));
                }
            }
        }
    }

    /// Values of the read and constant operands, in flavor order.
    fn inputs(&self, inst: &ZInst, frame: &ZFrame) -> Result<Inputs, RuntimeError> {
        let mut out = Inputs::new();
        let mut n = 0;
        for kind in inst.flavor.layout() {
            match kind {
                OperandKind::Const => {
                    out.push(constant(inst));
                    continue;
                }
                OperandKind::Read => out.push(frame.read(inst.operand(n), self)?.clone()),
                _ => {}
            }
            n += 1;
        }
        Ok(out)
    }

    fn aux_vals(&self, aux: &ZAux, frame: &ZFrame) -> Result<Vec<Val>, RuntimeError> {
        aux.items
            .iter()
            .map(|item| match item {
                AuxItem::Slot(s) => frame.read(*s, self).cloned(),
                AuxItem::Const(v) => Ok(load_const(v)),
            })
            .collect()
    }

    /// The index an `Index`, `AddMember` or `DeleteIndex` carries.
    fn index_val(&self, inst: &ZInst, frame: &ZFrame) -> Result<Val, RuntimeError> {
        let aux = aux(inst);
        let mut vals = self.aux_vals(aux, frame)?;
        if aux.as_list || vals.len() != 1 {
            return Ok(Val::list(vals));
        }
        Ok(vals.remove(0))
    }

    fn sync_globals(&self, frame: &mut ZFrame) {
        for (i, (id, slot)) in self.globals.iter().enumerate() {
            if frame.globals[i] == GlobalState::Dirty {
                match frame.get(*slot as usize) {
                    Val::Void => *id.value.borrow_mut() = None,
                    v => id.set_value(v.clone()),
                }
            }
            frame.globals[i] = GlobalState::Unloaded;
        }
    }

    fn step(
        &self,
        inst: &ZInst,
        frame: &mut ZFrame,
        resumable: bool,
        rt: &Runtime<'_>,
    ) -> Result<Step, RuntimeError> {
        let dest = inst.v1 as usize;
        match inst.op {
            ZOp::Nop => {}
            ZOp::Assign => {
                let mut inputs = self.inputs(inst, frame)?;
                frame.set(dest, inputs.remove(0));
            }
            ZOp::Unary(op) => {
                let inputs = self.inputs(inst, frame)?;
                let v = ops::unary(op, &inputs[0], ty(inst), None)?;
                frame.set(dest, v);
            }
            ZOp::Binary(op) => {
                let inputs = self.inputs(inst, frame)?;
                let v = ops::binary(op, &inputs[0], &inputs[1], ty(inst), None)?;
                frame.set(dest, v);
            }
            ZOp::CompoundTo(op) => {
                let inputs = self.inputs(inst, frame)?;
                match (&inputs[0], op) {
                    (Val::Vector(v), BinaryOp::AppendTo) => v.borrow_mut().push(inputs[1].clone()),
                    (Val::Table(_), _) => {
                        ops::binary(op, &inputs[0], &inputs[1], ty(inst), None)?;
                    }
                    (other, _) => return Err(clash("aggregate", other, None)),
                }
            }
            ZOp::Index => {
                let inputs = self.inputs(inst, frame)?;
                let idx = self.index_val(inst, frame)?;
                let v = load_index(&inputs[0], &idx, ty(inst), None)?;
                frame.set(dest, v);
            }
            ZOp::IndexAssign => {
                let inputs = self.inputs(inst, frame)?;
                let idx = self.index_val(inst, frame)?;
                store_index(&inputs[0], &idx, inputs[1].clone(), None)?;
            }
            ZOp::Field => {
                let v = load_field(frame.read(inst.v2, self)?, inst.v3 as usize, None)?;
                frame.set(dest, v);
            }
            ZOp::HasField => {
                let r = frame.read(inst.v2, self)?;
                let Val::Record(rec) = r else {
                    return Err(clash("record", r, None));
                };
                let has = rec.borrow().get(inst.v3 as usize).is_some();
                frame.set(dest, Val::Bool(has));
            }
            ZOp::FieldAssign => {
                let inputs = self.inputs(inst, frame)?;
                store_field(&inputs[0], inst.v2 as usize, inputs[1].clone(), None)?;
            }
            ZOp::AnyIndex => {
                let v = any_index(frame.read(inst.v2, self)?, inst.v3 as usize, None)?;
                frame.set(dest, v);
            }
            ZOp::RecordCtor => {
                let Type::Record(rt_ty) = ty(inst) else {
                    internal_error!("record constructor of type {}", ty(inst));
                };
                let aux = aux(inst);
                let vals = self.aux_vals(aux, frame)?;
                let mut rec = RecordVal::with_defaults(rt_ty.clone());
                for (field, v) in aux.ints.iter().zip(vals) {
                    rec.set(*field, v);
                }
                frame.set(dest, Val::Record(Rc::new(RefCell::new(rec))));
            }
            ZOp::TableCtor | ZOp::SetCtor => {
                let aux = aux(inst);
                let vals = self.aux_vals(aux, frame)?;
                let is_table = inst.op == ZOp::TableCtor;
                let mut table = TableVal::new(type_ref(inst).clone());
                let mut pos = 0;
                for &width in &aux.ints {
                    let key = TableKey(vals[pos..pos + width].iter().cloned().collect());
                    pos += width;
                    if is_table {
                        table.insert(key, vals[pos].clone());
                        pos += 1;
                    } else {
                        table.add(key);
                    }
                }
                frame.set(dest, Val::Table(Rc::new(RefCell::new(table))));
            }
            ZOp::VectorCtor => {
                let vals = self.aux_vals(aux(inst), frame)?;
                let elem_ty = ty(inst).yield_type().cloned().unwrap_or_else(crate::types::any);
                frame.set(dest, Val::vector(elem_ty, vals));
            }
            ZOp::ListCtor => {
                let vals = self.aux_vals(aux(inst), frame)?;
                frame.set(dest, Val::list(vals));
            }
            ZOp::Call | ZOp::CallX => {
                let inputs = self.inputs(inst, frame)?;
                let args = self.aux_vals(aux(inst), frame)?;
                let Val::Func(callee) = &inputs[0] else {
                    return Err(clash("function", &inputs[0], None));
                };
                let v = rt.call(callee, args, inst.loc.unwrap_or_default())?;
                if inst.op == ZOp::Call {
                    frame.set(dest, v);
                }
            }
            ZOp::Event => {
                let aux = aux(inst);
                let args = self.aux_vals(aux, frame)?;
                rt.events.enqueue(handler(aux), args);
            }
            ZOp::Schedule | ZOp::ScheduleX => {
                let inputs = self.inputs(inst, frame)?;
                let aux = aux(inst);
                let args = self.aux_vals(aux, frame)?;
                let timer = rt.events.schedule(inputs[0].as_double(), handler(aux), args);
                if inst.op == ZOp::Schedule {
                    frame.set(dest, Val::Timer(timer));
                }
            }
            ZOp::Cast => {
                let mut inputs = self.inputs(inst, frame)?;
                let v = inputs.remove(0);
                if !v.conforms_to(ty(inst)) {
                    return Err(RuntimeError::TypeClash {
                        expected: ty(inst).to_string(),
                        found: v.tag().to_string(),
                        span: None,
                    });
                }
                frame.set(dest, v);
            }
            ZOp::Is => {
                let inputs = self.inputs(inst, frame)?;
                frame.set(dest, Val::Bool(inputs[0].conforms_to(ty(inst))));
            }
            ZOp::Goto => return Ok(Step::Jump(inst.v1 as usize)),
            ZOp::IfFalse => {
                let inputs = self.inputs(inst, frame)?;
                if !inputs[0].as_bool() {
                    return Ok(Step::Jump(inst.v2 as usize));
                }
            }
            ZOp::CmpBranch(op) => {
                let inputs = self.inputs(inst, frame)?;
                let holds = ops::binary(op, &inputs[0], &inputs[1], ty(inst), None)?;
                if !holds.as_bool() {
                    let target = match inst.flavor {
                        OpFlavor::RRB => inst.v3,
                        _ => inst.v2,
                    };
                    return Ok(Step::Jump(target as usize));
                }
            }
            ZOp::Return => {
                let mut inputs = self.inputs(inst, frame)?;
                let v = if inputs.is_empty() { Val::Void } else { inputs.remove(0) };
                return Ok(Step::Return(v));
            }
            ZOp::Print => {
                let vals = self.aux_vals(aux(inst), frame)?;
                let line: Vec<String> = vals.iter().map(ToString::to_string).collect();
                rt.events.print(&line.join(", "));
            }
            ZOp::AddMember => {
                let set = frame.read(inst.v1, self)?.clone();
                let key = self.index_val(inst, frame)?;
                let Val::Table(t) = &set else {
                    return Err(clash("set", &set, None));
                };
                t.borrow_mut().add(TableKey::from_val(&key));
            }
            ZOp::DeleteIndex => {
                let table = frame.read(inst.v1, self)?.clone();
                let key = self.index_val(inst, frame)?;
                let Val::Table(t) = &table else {
                    return Err(clash("table", &table, None));
                };
                t.borrow_mut().remove(&TableKey::from_val(&key));
            }
            ZOp::DeleteField => {
                let r = frame.read(inst.v1, self)?;
                let Val::Record(rec) = r else {
                    return Err(clash("record", r, None));
                };
                rec.borrow_mut().fields[inst.v2 as usize] = None;
            }
            ZOp::InitAggr => match empty_aggregate(type_ref(inst)) {
                Some(v) => frame.set(dest, v),
                None => internal_error!("init-aggr of non-aggregate {}", ty(inst)),
            },
            ZOp::Clear => frame.clear(dest),
            ZOp::CheckAnyLen => {
                let v = frame.read(inst.v1, self)?;
                let actual = match v {
                    Val::List(items) => items.len(),
                    other => return Err(clash("list", other, None)),
                };
                let expected = inst.v2 as usize;
                if actual != expected {
                    return Err(RuntimeError::LengthMismatch {
                        left: expected,
                        right: actual,
                        span: None,
                    });
                }
            }
            ZOp::LoopStart => {
                let items = loop_items(frame.read(inst.v1, self)?, None)?;
                frame.loops[inst.v2 as usize] = LoopState { items, next: 0 };
            }
            ZOp::LoopNext => {
                let iter = inst.v1 as usize;
                let state = &mut frame.loops[iter];
                if state.next >= state.items.len() {
                    *state = LoopState::default();
                    return Ok(Step::Jump(inst.v2 as usize));
                }
                let (keys, value) = core::mem::take(&mut state.items[state.next]);
                state.next += 1;

                let aux = aux(inst);
                let has_value = aux.ints.first().is_some_and(|&v| v != 0);
                let mut slots: Vec<usize> = aux.slots().map(|s| s as usize).collect();
                let value_slot = if has_value { slots.pop() } else { None };
                for (slot, key) in slots.into_iter().zip(keys) {
                    frame.set(slot, key);
                }
                if let (Some(slot), Some(v)) = (value_slot, value) {
                    frame.set(slot, v);
                }
            }
            ZOp::SyncGlobals => self.sync_globals(frame),
            ZOp::LoadGlobal => {
                let index = inst.v2 as usize;
                if frame.globals[index] == GlobalState::Unloaded {
                    let (id, _) = &self.globals[index];
                    let Some(v) = id.value() else {
                        return Err(RuntimeError::ValueNotSet {
                            name: id.name.clone(),
                            span: None,
                        });
                    };
                    frame.set(dest, v);
                    frame.globals[index] = GlobalState::Clean;
                }
            }
            ZOp::DirtyGlobal => frame.globals[inst.v1 as usize] = GlobalState::Dirty,
            ZOp::SuspendIfNot => {
                let holds = frame.read(inst.v1, self)?.as_bool();
                if !holds {
                    if resumable {
                        return Ok(Step::Suspend(inst.v3 as usize));
                    }
                    return Ok(Step::Jump(inst.v2 as usize));
                }
            }
        }
        Ok(Step::Next)
    }
}

fn count_iteration(frame: &mut ZFrame, rt: &Runtime<'_>) -> Result<(), RuntimeError> {
    frame.iterations += 1;
    match rt.options.max_iterations {
        Some(limit) if frame.iterations > limit => {
            Err(RuntimeError::IterationLimit { limit, span: None })
        }
        _ => Ok(()),
    }
}

/// Aggregate constants are copied on load so code cannot modify the
/// instruction's own value.
fn load_const(v: &Val) -> Val {
    match v {
        Val::Vector(_) | Val::Table(_) | Val::Record(_) => v.deep_clone(),
        other => other.clone(),
    }
}

fn constant(inst: &ZInst) -> Val {
    match &inst.c {
        Some(v) => load_const(v),
        None => internal_error!("{} without its constant", inst.op.name()),
    }
}

fn type_ref(inst: &ZInst) -> &TypeRef {
    match &inst.t {
        Some(t) => t,
        None => internal_error!("{} without a type", inst.op.name()),
    }
}

fn ty(inst: &ZInst) -> &Type {
    type_ref(inst)
}

fn aux(inst: &ZInst) -> &ZAux {
    match &inst.aux {
        Some(aux) => aux,
        None => internal_error!("{} without operands", inst.op.name()),
    }
}

fn handler(aux: &ZAux) -> &str {
    match &aux.name {
        Some(name) => name,
        None => internal_error!("event without a handler"),
    }
}
