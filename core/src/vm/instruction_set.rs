//! ZAM instructions.
//!
//! Every instruction has the same shape: an opcode, an operand-layout
//! flavor, four integer operands, an optional embedded constant, a type
//! and an optional auxiliary block for variadic operands.
//!
//! # Flavors
//!
//! The flavor spells out the operands left to right, one letter each:
//!
//! ```text
//! W  frame slot the instruction writes
//! R  frame slot the instruction reads
//! C  the embedded constant (takes no integer operand)
//! I  small integer: field number, global index, loop state, length
//! B  branch target
//! ```
//!
//! Integer operands are consumed in order by every letter except `C`, so
//! `WCR` writes `v1` from the constant and slot `v2`, while `WRC` writes
//! `v1` from slot `v2` and the constant. Binary operators over two
//! constants never reach code generation, so one constant is enough.
//!
//! Branch targets are instruction indices in the intermediate code and
//! absolute program counters once compacted.

use core::fmt;

use crate::api::Span;
use crate::ast::{BinaryOp, UnaryOp};
use crate::types::TypeRef;
use crate::values::Val;
use crate::{Box, String, ToString, Vec, format};

/// How an instruction uses one of its integer operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Unused,
    Read,
    Write,
    Int,
    Branch,
}

/// One letter of a flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    Write,
    Read,
    Const,
    Int,
    Branch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpFlavor {
    X,
    W,
    R,
    C,
    I,
    B,
    WR,
    WC,
    WI,
    RR,
    RC,
    RI,
    RB,
    IB,
    WRR,
    WRC,
    WCR,
    WRI,
    RIR,
    RIC,
    RRB,
    RCB,
    CRB,
    RBB,
}

impl OpFlavor {
    pub fn layout(self) -> &'static [OperandKind] {
        use OperandKind::{Branch as B, Const as C, Int as I, Read as R, Write as W};
        match self {
            OpFlavor::X => &[],
            OpFlavor::W => &[W],
            OpFlavor::R => &[R],
            OpFlavor::C => &[C],
            OpFlavor::I => &[I],
            OpFlavor::B => &[B],
            OpFlavor::WR => &[W, R],
            OpFlavor::WC => &[W, C],
            OpFlavor::WI => &[W, I],
            OpFlavor::RR => &[R, R],
            OpFlavor::RC => &[R, C],
            OpFlavor::RI => &[R, I],
            OpFlavor::RB => &[R, B],
            OpFlavor::IB => &[I, B],
            OpFlavor::WRR => &[W, R, R],
            OpFlavor::WRC => &[W, R, C],
            OpFlavor::WCR => &[W, C, R],
            OpFlavor::WRI => &[W, R, I],
            OpFlavor::RIR => &[R, I, R],
            OpFlavor::RIC => &[R, I, C],
            OpFlavor::RRB => &[R, R, B],
            OpFlavor::RCB => &[R, C, B],
            OpFlavor::CRB => &[C, R, B],
            OpFlavor::RBB => &[R, B, B],
        }
    }

    /// Access mode of `v1` through `v4`.
    pub fn kinds(self) -> [Access; 4] {
        let mut kinds = [Access::Unused; 4];
        let mut slot = 0;
        for kind in self.layout() {
            let access = match kind {
                OperandKind::Const => continue,
                OperandKind::Write => Access::Write,
                OperandKind::Read => Access::Read,
                OperandKind::Int => Access::Int,
                OperandKind::Branch => Access::Branch,
            };
            kinds[slot] = access;
            slot += 1;
        }
        kinds
    }

    pub fn writes(self) -> bool {
        self.layout().first() == Some(&OperandKind::Write)
    }

    pub fn has_const(self) -> bool {
        self.layout().contains(&OperandKind::Const)
    }

    /// The same layout without the written slot, for instructions whose
    /// result nobody reads but whose effect must stay.
    pub fn without_write(self) -> Option<OpFlavor> {
        Some(match self {
            OpFlavor::W => OpFlavor::X,
            OpFlavor::WR => OpFlavor::R,
            OpFlavor::WC => OpFlavor::C,
            OpFlavor::WRR => OpFlavor::RR,
            OpFlavor::WRC => OpFlavor::RC,
            OpFlavor::WRI => OpFlavor::RI,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZOp {
    Nop,
    Assign,
    Unary(UnaryOp),
    Binary(BinaryOp),
    /// Table `+=`/`-=` and vector append, modifying the aggregate itself.
    CompoundTo(BinaryOp),
    Index,
    IndexAssign,
    Field,
    HasField,
    FieldAssign,
    AnyIndex,
    RecordCtor,
    TableCtor,
    SetCtor,
    VectorCtor,
    ListCtor,
    Call,
    /// A call whose result is discarded.
    CallX,
    Event,
    Schedule,
    ScheduleX,
    Cast,
    Is,
    Goto,
    IfFalse,
    /// Branch when `lhs op rhs` does not hold.
    CmpBranch(BinaryOp),
    Return,
    Print,
    AddMember,
    DeleteIndex,
    DeleteField,
    InitAggr,
    Clear,
    CheckAnyLen,
    LoopStart,
    /// Bind the next loop item, or branch out once the items run out.
    LoopNext,
    /// Write back modified globals and forget the loaded ones.
    SyncGlobals,
    LoadGlobal,
    DirtyGlobal,
    /// Park the invocation unless the operand holds.
    SuspendIfNot,
}

// Operator payloads must not widen the opcode.
static_assertions::const_assert!(core::mem::size_of::<ZOp>() <= 2);

impl ZOp {
    /// Control never reaches the following instruction.
    pub fn is_terminal(self) -> bool {
        matches!(self, ZOp::Goto | ZOp::Return)
    }

    pub fn is_branch(self) -> bool {
        matches!(
            self,
            ZOp::Goto | ZOp::IfFalse | ZOp::CmpBranch(_) | ZOp::LoopNext | ZOp::SuspendIfNot
        )
    }

    /// Auxiliary slots are destinations rather than sources.
    pub fn aux_writes(self) -> bool {
        self == ZOp::LoopNext
    }

    /// Whether removing the instruction can change anything besides its
    /// written slot.
    pub fn has_side_effects(self) -> bool {
        matches!(
            self,
            ZOp::CompoundTo(_)
                | ZOp::IndexAssign
                | ZOp::FieldAssign
                | ZOp::Call
                | ZOp::CallX
                | ZOp::Event
                | ZOp::Schedule
                | ZOp::ScheduleX
                | ZOp::Return
                | ZOp::Print
                | ZOp::AddMember
                | ZOp::DeleteIndex
                | ZOp::DeleteField
                | ZOp::CheckAnyLen
                | ZOp::LoopStart
                | ZOp::LoopNext
                | ZOp::SyncGlobals
                | ZOp::DirtyGlobal
                | ZOp::SuspendIfNot
        ) || self.is_branch()
    }

    /// The opcode to use once the result is no longer wanted.
    pub fn without_result(self) -> Option<ZOp> {
        match self {
            ZOp::Call => Some(ZOp::CallX),
            ZOp::Schedule => Some(ZOp::ScheduleX),
            _ => None,
        }
    }

    pub fn name(self) -> String {
        match self {
            ZOp::Nop => String::from("nop"),
            ZOp::Assign => String::from("assign"),
            ZOp::Unary(op) => format!("unary-{}", unary_name(op)),
            ZOp::Binary(op) => format!("binary{}", op.symbol()),
            ZOp::CompoundTo(op) => format!("compound{}", op.symbol()),
            ZOp::Index => String::from("index"),
            ZOp::IndexAssign => String::from("index-assign"),
            ZOp::Field => String::from("field"),
            ZOp::HasField => String::from("has-field"),
            ZOp::FieldAssign => String::from("field-assign"),
            ZOp::AnyIndex => String::from("any-index"),
            ZOp::RecordCtor => String::from("record-ctor"),
            ZOp::TableCtor => String::from("table-ctor"),
            ZOp::SetCtor => String::from("set-ctor"),
            ZOp::VectorCtor => String::from("vector-ctor"),
            ZOp::ListCtor => String::from("list-ctor"),
            ZOp::Call => String::from("call"),
            ZOp::CallX => String::from("call-x"),
            ZOp::Event => String::from("event"),
            ZOp::Schedule => String::from("schedule"),
            ZOp::ScheduleX => String::from("schedule-x"),
            ZOp::Cast => String::from("cast"),
            ZOp::Is => String::from("is"),
            ZOp::Goto => String::from("goto"),
            ZOp::IfFalse => String::from("if-false"),
            ZOp::CmpBranch(op) => format!("branch-unless{}", op.symbol()),
            ZOp::Return => String::from("return"),
            ZOp::Print => String::from("print"),
            ZOp::AddMember => String::from("add-member"),
            ZOp::DeleteIndex => String::from("delete-index"),
            ZOp::DeleteField => String::from("delete-field"),
            ZOp::InitAggr => String::from("init-aggr"),
            ZOp::Clear => String::from("clear"),
            ZOp::CheckAnyLen => String::from("check-any-len"),
            ZOp::LoopStart => String::from("loop-start"),
            ZOp::LoopNext => String::from("loop-next"),
            ZOp::SyncGlobals => String::from("sync-globals"),
            ZOp::LoadGlobal => String::from("load-global"),
            ZOp::DirtyGlobal => String::from("dirty-global"),
            ZOp::SuspendIfNot => String::from("suspend-if-not"),
        }
    }
}

fn unary_name(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Clone => "clone",
        UnaryOp::Incr => "incr",
        UnaryOp::Decr => "decr",
        UnaryOp::Not => "not",
        UnaryOp::Complement => "complement",
        UnaryOp::Pos => "pos",
        UnaryOp::Neg => "neg",
        UnaryOp::Size => "size",
        UnaryOp::ArithCoerce => "arith-coerce",
        UnaryOp::RecordCoerce => "record-coerce",
        UnaryOp::TableCoerce => "table-coerce",
        UnaryOp::VectorCoerce => "vector-coerce",
        UnaryOp::ToAny => "to-any",
        UnaryOp::FromAny => "from-any",
    }
}

/// A variadic operand.
#[derive(Debug, Clone, PartialEq)]
pub enum AuxItem {
    Slot(i32),
    Const(Val),
}

impl fmt::Display for AuxItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuxItem::Slot(s) => write!(f, "s{}", s),
            AuxItem::Const(v) => write_const(f, v),
        }
    }
}

/// Operands that do not fit the fixed fields.
///
/// `items` holds call arguments, index components, constructor members,
/// print arguments or loop variables. `ints` carries the per-item shape:
/// record field numbers, table key widths, or for loops whether the last
/// item binds the element value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZAux {
    pub items: Vec<AuxItem>,
    pub ints: Vec<usize>,
    /// Event handler for events and schedules.
    pub name: Option<String>,
    /// Index operands form a list value rather than a lone index.
    pub as_list: bool,
}

impl ZAux {
    pub fn items(items: Vec<AuxItem>) -> Self {
        ZAux {
            items,
            ..ZAux::default()
        }
    }

    pub fn slots(&self) -> impl Iterator<Item = i32> + '_ {
        self.items.iter().filter_map(|item| match item {
            AuxItem::Slot(s) => Some(*s),
            AuxItem::Const(_) => None,
        })
    }

    pub fn slots_mut(&mut self) -> impl Iterator<Item = &mut i32> + '_ {
        self.items.iter_mut().filter_map(|item| match item {
            AuxItem::Slot(s) => Some(s),
            AuxItem::Const(_) => None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ZInst {
    pub op: ZOp,
    pub flavor: OpFlavor,
    pub v1: i32,
    pub v2: i32,
    pub v3: i32,
    pub v4: i32,
    pub c: Option<Val>,
    pub t: Option<TypeRef>,
    pub aux: Option<Box<ZAux>>,
    pub loc: Option<Span>,
}

impl ZInst {
    pub fn new(op: ZOp, flavor: OpFlavor) -> Self {
        ZInst {
            op,
            flavor,
            v1: 0,
            v2: 0,
            v3: 0,
            v4: 0,
            c: None,
            t: None,
            aux: None,
            loc: None,
        }
    }

    pub fn operand(&self, n: usize) -> i32 {
        match n {
            0 => self.v1,
            1 => self.v2,
            2 => self.v3,
            _ => self.v4,
        }
    }

    pub fn operand_mut(&mut self, n: usize) -> &mut i32 {
        match n {
            0 => &mut self.v1,
            1 => &mut self.v2,
            2 => &mut self.v3,
            _ => &mut self.v4,
        }
    }

    /// Slot written through `v1`, if the flavor has one.
    pub fn written_slot(&self) -> Option<i32> {
        self.flavor.writes().then_some(self.v1)
    }

    /// Every slot the instruction reads, auxiliary ones included.
    pub fn read_slots(&self) -> Vec<i32> {
        let mut out: Vec<i32> = self
            .flavor
            .kinds()
            .iter()
            .enumerate()
            .filter(|(_, k)| **k == Access::Read)
            .map(|(n, _)| self.operand(n))
            .collect();
        if let Some(aux) = &self.aux {
            if !self.op.aux_writes() {
                out.extend(aux.slots());
            }
        }
        out
    }

    /// Every slot the instruction writes, auxiliary ones included.
    pub fn write_slots(&self) -> Vec<i32> {
        let mut out: Vec<i32> = self.written_slot().into_iter().collect();
        if let Some(aux) = &self.aux {
            if self.op.aux_writes() {
                out.extend(aux.slots());
            }
        }
        out
    }

    /// Apply `f` to every slot operand, fixed and auxiliary.
    pub fn map_slots(&mut self, mut f: impl FnMut(i32) -> i32) {
        let kinds = self.flavor.kinds();
        for (n, kind) in kinds.iter().enumerate() {
            if matches!(kind, Access::Read | Access::Write) {
                let v = self.operand_mut(n);
                *v = f(*v);
            }
        }
        if let Some(aux) = &mut self.aux {
            for s in aux.slots_mut() {
                *s = f(*s);
            }
        }
    }

    /// Positions of the branch operands, in flavor order.
    pub fn branch_operands(&self) -> Vec<usize> {
        self.flavor
            .kinds()
            .iter()
            .enumerate()
            .filter(|(_, k)| **k == Access::Branch)
            .map(|(n, _)| n)
            .collect()
    }

    /// Render the instruction, showing branch targets through `label`.
    pub fn render(&self, label: &dyn Fn(usize) -> String) -> String {
        let mut parts: Vec<String> = Vec::new();
        let mut slot = 0;
        for kind in self.flavor.layout() {
            match kind {
                OperandKind::Const => {
                    let c = match &self.c {
                        Some(v) => const_text(v),
                        None => String::from("<none>"),
                    };
                    parts.push(c);
                    continue;
                }
                OperandKind::Write | OperandKind::Read => {
                    parts.push(format!("s{}", self.operand(slot)));
                }
                OperandKind::Int => parts.push(self.operand(slot).to_string()),
                OperandKind::Branch => parts.push(label(self.operand(slot) as usize)),
            }
            slot += 1;
        }
        let mut text = self.op.name();
        if let Some(aux) = &self.aux {
            if let Some(name) = &aux.name {
                text.push(' ');
                text.push_str(name);
            }
        }
        if !parts.is_empty() {
            text.push(' ');
            text.push_str(&parts.join(", "));
        }
        if let Some(aux) = &self.aux {
            if !aux.items.is_empty() {
                let items: Vec<String> = aux.items.iter().map(|i| i.to_string()).collect();
                text.push_str(&format!(" [{}]", items.join(", ")));
            }
        }
        if let Some(t) = &self.t {
            text.push_str(&format!(" : {}", t));
        }
        text
    }
}

impl fmt::Display for ZInst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(&|pc| format!("@{}", pc)))
    }
}

fn const_text(v: &Val) -> String {
    match v {
        Val::Str(s) => format!("{:?}", s),
        other => other.to_string(),
    }
}

fn write_const(f: &mut fmt::Formatter<'_>, v: &Val) -> fmt::Result {
    f.write_str(&const_text(v))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::vec;

    #[test]
    fn test_constant_takes_no_integer_operand() {
        assert_eq!(
            OpFlavor::WCR.kinds(),
            [Access::Write, Access::Read, Access::Unused, Access::Unused]
        );
        assert_eq!(
            OpFlavor::RCB.kinds(),
            [Access::Read, Access::Branch, Access::Unused, Access::Unused]
        );
        assert_eq!(
            OpFlavor::RBB.kinds(),
            [Access::Read, Access::Branch, Access::Branch, Access::Unused]
        );
    }

    #[test]
    fn test_dropping_the_result_keeps_the_reads() {
        assert_eq!(OpFlavor::WRC.without_write(), Some(OpFlavor::RC));
        assert_eq!(OpFlavor::WC.without_write(), Some(OpFlavor::C));
        assert_eq!(OpFlavor::RR.without_write(), None);
    }

    #[test]
    fn test_render() {
        let mut inst = ZInst::new(ZOp::Binary(BinaryOp::Add), OpFlavor::WRC);
        inst.v1 = 3;
        inst.v2 = 1;
        inst.c = Some(Val::Count(1));
        assert_eq!(inst.to_string(), "binary+ s3, s1, 1");

        let mut branch = ZInst::new(ZOp::CmpBranch(BinaryOp::Lt), OpFlavor::RRB);
        branch.v1 = 0;
        branch.v2 = 2;
        branch.v3 = 7;
        assert_eq!(branch.to_string(), "branch-unless< s0, s2, @7");

        let mut call = ZInst::new(ZOp::Call, OpFlavor::WR);
        call.v1 = 4;
        call.v2 = 0;
        call.aux = Some(Box::new(ZAux::items(vec![
            AuxItem::Slot(1),
            AuxItem::Const(Val::str("x")),
        ])));
        assert_eq!(call.to_string(), "call s4, s0 [s1, \"x\"]");
        assert_eq!(call.read_slots(), vec![0, 1]);
    }
}
