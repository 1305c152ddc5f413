// SPDX-License-Identifier: Apache-2.0

//! The netlist intermediate representation: typed cells connected by bit-level
//! references, stored in an arena indexed by cell id.
//!
//! Invariants maintained across passes (see `ir_validate`):
//! - every `BitRef::Net` resolves to exactly one producing cell output bit or
//!   module input port bit;
//! - the producer-of relation restricted to combinational cells is acyclic;
//! - cell ids are never reused within one optimization run, even after
//!   removal.

use std::collections::BTreeMap;
use std::fmt;

use crate::logic::Lv;
use crate::subst::SubstitutionMap;

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct CellId(pub u32);

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// A single-bit wire, unique within one module.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct NetId(pub u32);

impl fmt::Display for NetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// A reference to one wire's value: a literal constant or a net.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum BitRef {
    Const(Lv),
    Net(NetId),
}

impl BitRef {
    pub fn as_net(self) -> Option<NetId> {
        match self {
            BitRef::Net(n) => Some(n),
            BitRef::Const(_) => None,
        }
    }

    pub fn as_const(self) -> Option<Lv> {
        match self {
            BitRef::Const(lv) => Some(lv),
            BitRef::Net(_) => None,
        }
    }

    pub fn is_const(self) -> bool {
        matches!(self, BitRef::Const(_))
    }
}

impl From<NetId> for BitRef {
    fn from(n: NetId) -> Self {
        BitRef::Net(n)
    }
}

impl From<Lv> for BitRef {
    fn from(lv: Lv) -> Self {
        BitRef::Const(lv)
    }
}

/// Returns the constant values of a bus if every bit is constant.
pub fn const_bits(bits: &[BitRef]) -> Option<Vec<Lv>> {
    bits.iter().map(|b| b.as_const()).collect()
}

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum UnaryOp {
    Not,
    Pos,
    Neg,
    ReduceAnd,
    ReduceOr,
    ReduceXor,
    ReduceXnor,
    ReduceBool,
    LogicNot,
}

impl UnaryOp {
    pub fn cell_type(self) -> &'static str {
        match self {
            UnaryOp::Not => "$not",
            UnaryOp::Pos => "$pos",
            UnaryOp::Neg => "$neg",
            UnaryOp::ReduceAnd => "$reduce_and",
            UnaryOp::ReduceOr => "$reduce_or",
            UnaryOp::ReduceXor => "$reduce_xor",
            UnaryOp::ReduceXnor => "$reduce_xnor",
            UnaryOp::ReduceBool => "$reduce_bool",
            UnaryOp::LogicNot => "$logic_not",
        }
    }

    pub fn from_cell_type(ty: &str) -> Option<Self> {
        Some(match ty {
            "$not" => UnaryOp::Not,
            "$pos" => UnaryOp::Pos,
            "$neg" => UnaryOp::Neg,
            "$reduce_and" => UnaryOp::ReduceAnd,
            "$reduce_or" => UnaryOp::ReduceOr,
            "$reduce_xor" => UnaryOp::ReduceXor,
            "$reduce_xnor" => UnaryOp::ReduceXnor,
            "$reduce_bool" => UnaryOp::ReduceBool,
            "$logic_not" => UnaryOp::LogicNot,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum BinaryOp {
    And,
    Or,
    Xor,
    Xnor,
    Shl,
    Shr,
    Sshl,
    Sshr,
    LogicAnd,
    LogicOr,
    EqX,
    NeX,
    Lt,
    Le,
    Eq,
    Ne,
    Ge,
    Gt,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

impl BinaryOp {
    pub fn cell_type(self) -> &'static str {
        match self {
            BinaryOp::And => "$and",
            BinaryOp::Or => "$or",
            BinaryOp::Xor => "$xor",
            BinaryOp::Xnor => "$xnor",
            BinaryOp::Shl => "$shl",
            BinaryOp::Shr => "$shr",
            BinaryOp::Sshl => "$sshl",
            BinaryOp::Sshr => "$sshr",
            BinaryOp::LogicAnd => "$logic_and",
            BinaryOp::LogicOr => "$logic_or",
            BinaryOp::EqX => "$eqx",
            BinaryOp::NeX => "$nex",
            BinaryOp::Lt => "$lt",
            BinaryOp::Le => "$le",
            BinaryOp::Eq => "$eq",
            BinaryOp::Ne => "$ne",
            BinaryOp::Ge => "$ge",
            BinaryOp::Gt => "$gt",
            BinaryOp::Add => "$add",
            BinaryOp::Sub => "$sub",
            BinaryOp::Mul => "$mul",
            BinaryOp::Div => "$div",
            BinaryOp::Mod => "$mod",
            BinaryOp::Pow => "$pow",
        }
    }

    pub fn from_cell_type(ty: &str) -> Option<Self> {
        Some(match ty {
            "$and" => BinaryOp::And,
            "$or" => BinaryOp::Or,
            "$xor" => BinaryOp::Xor,
            "$xnor" => BinaryOp::Xnor,
            "$shl" => BinaryOp::Shl,
            "$shr" => BinaryOp::Shr,
            "$sshl" => BinaryOp::Sshl,
            "$sshr" => BinaryOp::Sshr,
            "$logic_and" => BinaryOp::LogicAnd,
            "$logic_or" => BinaryOp::LogicOr,
            "$eqx" => BinaryOp::EqX,
            "$nex" => BinaryOp::NeX,
            "$lt" => BinaryOp::Lt,
            "$le" => BinaryOp::Le,
            "$eq" => BinaryOp::Eq,
            "$ne" => BinaryOp::Ne,
            "$ge" => BinaryOp::Ge,
            "$gt" => BinaryOp::Gt,
            "$add" => BinaryOp::Add,
            "$sub" => BinaryOp::Sub,
            "$mul" => BinaryOp::Mul,
            "$div" => BinaryOp::Div,
            "$mod" => BinaryOp::Mod,
            "$pow" => BinaryOp::Pow,
            _ => return None,
        })
    }

    /// Operand order does not affect the result; the merge pass canonicalizes
    /// these before hashing.
    pub fn is_commutative(self) -> bool {
        matches!(
            self,
            BinaryOp::And
                | BinaryOp::Or
                | BinaryOp::Xor
                | BinaryOp::Xnor
                | BinaryOp::LogicAnd
                | BinaryOp::LogicOr
                | BinaryOp::Eq
                | BinaryOp::Ne
                | BinaryOp::EqX
                | BinaryOp::NeX
                | BinaryOp::Add
                | BinaryOp::Mul
        )
    }

    /// Ops the chain finalization pass coalesces into n-ary cells. `$xnor` is
    /// excluded: the pairwise composition is associative but an n-ary xnor has
    /// no agreed reading.
    pub fn is_chainable(self) -> bool {
        matches!(
            self,
            BinaryOp::And
                | BinaryOp::Or
                | BinaryOp::Xor
                | BinaryOp::Add
                | BinaryOp::Mul
                | BinaryOp::LogicAnd
                | BinaryOp::LogicOr
        )
    }

    /// `$logic_and`/`$logic_or` reduce their operands to booleans first, so
    /// their operand buses may have arbitrary widths.
    pub fn is_logic(self) -> bool {
        matches!(self, BinaryOp::LogicAnd | BinaryOp::LogicOr)
    }
}

/// Provenance/debug metadata. Passes preserve this where a cell survives;
/// losing it on a merge is acceptable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellAttrs {
    pub src: Option<String>,
    pub full_case: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnaryCell {
    pub op: UnaryOp,
    pub a_signed: bool,
    pub a: Vec<BitRef>,
    pub y: Vec<NetId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryCell {
    pub op: BinaryOp,
    pub a_signed: bool,
    pub b_signed: bool,
    pub a: Vec<BitRef>,
    pub b: Vec<BitRef>,
    pub y: Vec<NetId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuxCell {
    pub a: Vec<BitRef>,
    pub b: Vec<BitRef>,
    pub s: BitRef,
    pub y: Vec<NetId>,
}

/// Parallel mux: `y = a` when no select bit is set, else the `b` slice of the
/// (unique) set select bit. Multiple set bits yield undefined output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PmuxCell {
    pub a: Vec<BitRef>,
    /// `s.len()` slices of `a.len()` bits each, concatenated LSB-first.
    pub b: Vec<BitRef>,
    pub s: Vec<BitRef>,
    pub y: Vec<NetId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrCell {
    pub set_polarity: bool,
    pub clr_polarity: bool,
    pub set: Vec<BitRef>,
    pub clr: Vec<BitRef>,
    pub q: Vec<NetId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsyncReset {
    pub polarity: bool,
    pub value: Vec<Lv>,
    pub arst: BitRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReset {
    pub polarity: bool,
    pub value: Vec<Lv>,
    pub srst: BitRef,
    /// When set, the clock enable gates the synchronous reset (`$sdffce`).
    pub ce_over_srst: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetClear {
    pub set_polarity: bool,
    pub clr_polarity: bool,
    pub set: Vec<BitRef>,
    pub clr: Vec<BitRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockEnable {
    pub polarity: bool,
    pub en: BitRef,
}

/// Clocked register. The twelve yosys register variants (`$dff`, `$dffe`,
/// `$adff`, `$adffe`, `$sdff`, `$sdffe`, `$sdffce`, `$dffsr`, `$dffsre`, ...)
/// are one struct with orthogonal optional features.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DffCell {
    pub clk_polarity: bool,
    pub clk: BitRef,
    pub en: Option<ClockEnable>,
    pub arst: Option<AsyncReset>,
    pub srst: Option<SyncReset>,
    pub sr: Option<SetClear>,
    pub d: Vec<BitRef>,
    pub q: Vec<NetId>,
}

impl DffCell {
    /// The yosys cell type this configuration corresponds to.
    pub fn cell_type(&self) -> &'static str {
        match (
            self.en.is_some(),
            self.arst.is_some(),
            self.srst.as_ref(),
            self.sr.is_some(),
        ) {
            (_, _, _, true) => {
                if self.en.is_some() {
                    "$dffsre"
                } else {
                    "$dffsr"
                }
            }
            (_, true, _, _) => {
                if self.en.is_some() {
                    "$adffe"
                } else {
                    "$adff"
                }
            }
            (en, _, Some(srst), _) => {
                if srst.ce_over_srst {
                    "$sdffce"
                } else if en {
                    "$sdffe"
                } else {
                    "$sdff"
                }
            }
            (true, _, _, _) => "$dffe",
            _ => "$dff",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemReadPort {
    pub clocked: bool,
    pub clk_polarity: bool,
    pub clk: BitRef,
    pub en: BitRef,
    pub addr: Vec<BitRef>,
    pub data: Vec<NetId>,
    pub arst: BitRef,
    pub srst: BitRef,
    pub init_value: Vec<Lv>,
    pub arst_value: Vec<Lv>,
    pub srst_value: Vec<Lv>,
    /// One flag per write port: reads see same-cycle writes through this port.
    pub transparency_mask: Vec<bool>,
    /// One flag per write port: a same-cycle address collision reads X.
    pub collision_x_mask: Vec<bool>,
    pub ce_over_srst: bool,
    pub wide_continuation: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemWritePort {
    pub clocked: bool,
    pub clk_polarity: bool,
    pub clk: BitRef,
    /// Per-data-bit write enable.
    pub en: Vec<BitRef>,
    pub addr: Vec<BitRef>,
    pub data: Vec<BitRef>,
    /// One flag per write port: this port loses same-cycle collisions to it.
    pub priority_mask: Vec<bool>,
    pub wide_continuation: bool,
}

/// `$mem_v2`: a memory with parameterized read/write ports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemCell {
    pub memid: String,
    pub size: u32,
    pub abits: u32,
    pub width: u32,
    pub offset: i32,
    pub init: Vec<Lv>,
    pub read_ports: Vec<MemReadPort>,
    pub write_ports: Vec<MemWritePort>,
}

/// `$print`: an observation sink with no outputs, kept alive unconditionally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintCell {
    pub format: String,
    pub priority: i32,
    pub trg_enable: bool,
    pub trg_polarity: Vec<bool>,
    pub en: BitRef,
    pub trg: Vec<BitRef>,
    pub args: Vec<BitRef>,
}

/// N-ary associative cell produced by chain finalization. Leaf operand buses
/// are listed left-to-right as encountered walking from the chain's root
/// consumer down to the leaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainCell {
    pub op: BinaryOp,
    pub signed: bool,
    pub operands: Vec<Vec<BitRef>>,
    pub y: Vec<NetId>,
}

/// Raw parameter value carried through for cells this version does not
/// recognize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawParam {
    Int(i64),
    Str(String),
}

/// A cell whose type/parameter combination the import layer does not
/// recognize. Passed through unmodified: excluded from folding and merging,
/// treated as an always-live sink by dead-code elimination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCell {
    pub cell_type: String,
    pub parameters: BTreeMap<String, RawParam>,
    pub inputs: Vec<(String, Vec<BitRef>)>,
    pub outputs: Vec<(String, Vec<NetId>)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellKind {
    Unary(UnaryCell),
    Binary(BinaryCell),
    Mux(MuxCell),
    Pmux(PmuxCell),
    Sr(SrCell),
    Dff(DffCell),
    Mem(MemCell),
    Print(PrintCell),
    Chain(ChainCell),
    Unknown(UnknownCell),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub id: CellId,
    pub name: String,
    pub kind: CellKind,
    pub attrs: CellAttrs,
}

impl Cell {
    /// Combinational cells participate in the acyclicity requirement; clocked
    /// and latch cells break cycles. `Unknown` is conservatively treated as
    /// cycle-breaking since its semantics are not known.
    pub fn is_combinational(&self) -> bool {
        matches!(
            self.kind,
            CellKind::Unary(_)
                | CellKind::Binary(_)
                | CellKind::Mux(_)
                | CellKind::Pmux(_)
                | CellKind::Chain(_)
        )
    }

    /// Sinks are live regardless of fan-out.
    pub fn is_sink(&self) -> bool {
        matches!(self.kind, CellKind::Print(_) | CellKind::Unknown(_))
    }

    pub fn for_each_input<F: FnMut(&BitRef)>(&self, mut f: F) {
        self.visit_inputs(&mut f);
    }

    fn visit_inputs<F: FnMut(&BitRef)>(&self, f: &mut F) {
        let each = |bits: &[BitRef], f: &mut F| {
            for b in bits {
                f(b);
            }
        };
        match &self.kind {
            CellKind::Unary(c) => each(&c.a, f),
            CellKind::Binary(c) => {
                each(&c.a, f);
                each(&c.b, f);
            }
            CellKind::Mux(c) => {
                each(&c.a, f);
                each(&c.b, f);
                f(&c.s);
            }
            CellKind::Pmux(c) => {
                each(&c.a, f);
                each(&c.b, f);
                each(&c.s, f);
            }
            CellKind::Sr(c) => {
                each(&c.set, f);
                each(&c.clr, f);
            }
            CellKind::Dff(c) => {
                f(&c.clk);
                if let Some(en) = &c.en {
                    f(&en.en);
                }
                if let Some(arst) = &c.arst {
                    f(&arst.arst);
                }
                if let Some(srst) = &c.srst {
                    f(&srst.srst);
                }
                if let Some(sr) = &c.sr {
                    each(&sr.set, f);
                    each(&sr.clr, f);
                }
                each(&c.d, f);
            }
            CellKind::Mem(c) => {
                for rd in &c.read_ports {
                    f(&rd.clk);
                    f(&rd.en);
                    each(&rd.addr, f);
                    f(&rd.arst);
                    f(&rd.srst);
                }
                for wr in &c.write_ports {
                    f(&wr.clk);
                    each(&wr.en, f);
                    each(&wr.addr, f);
                    each(&wr.data, f);
                }
            }
            CellKind::Print(c) => {
                f(&c.en);
                each(&c.trg, f);
                each(&c.args, f);
            }
            CellKind::Chain(c) => {
                for operand in &c.operands {
                    each(operand, f);
                }
            }
            CellKind::Unknown(c) => {
                for (_, bits) in &c.inputs {
                    each(bits, f);
                }
            }
        }
    }

    pub fn for_each_input_mut<F: FnMut(&mut BitRef)>(&mut self, mut f: F) {
        let each = |bits: &mut Vec<BitRef>, f: &mut F| {
            for b in bits.iter_mut() {
                f(b);
            }
        };
        match &mut self.kind {
            CellKind::Unary(c) => each(&mut c.a, &mut f),
            CellKind::Binary(c) => {
                each(&mut c.a, &mut f);
                each(&mut c.b, &mut f);
            }
            CellKind::Mux(c) => {
                each(&mut c.a, &mut f);
                each(&mut c.b, &mut f);
                f(&mut c.s);
            }
            CellKind::Pmux(c) => {
                each(&mut c.a, &mut f);
                each(&mut c.b, &mut f);
                each(&mut c.s, &mut f);
            }
            CellKind::Sr(c) => {
                each(&mut c.set, &mut f);
                each(&mut c.clr, &mut f);
            }
            CellKind::Dff(c) => {
                f(&mut c.clk);
                if let Some(en) = &mut c.en {
                    f(&mut en.en);
                }
                if let Some(arst) = &mut c.arst {
                    f(&mut arst.arst);
                }
                if let Some(srst) = &mut c.srst {
                    f(&mut srst.srst);
                }
                if let Some(sr) = &mut c.sr {
                    each(&mut sr.set, &mut f);
                    each(&mut sr.clr, &mut f);
                }
                each(&mut c.d, &mut f);
            }
            CellKind::Mem(c) => {
                for rd in &mut c.read_ports {
                    f(&mut rd.clk);
                    f(&mut rd.en);
                    each(&mut rd.addr, &mut f);
                    f(&mut rd.arst);
                    f(&mut rd.srst);
                }
                for wr in &mut c.write_ports {
                    f(&mut wr.clk);
                    each(&mut wr.en, &mut f);
                    each(&mut wr.addr, &mut f);
                    each(&mut wr.data, &mut f);
                }
            }
            CellKind::Print(c) => {
                f(&mut c.en);
                each(&mut c.trg, &mut f);
                each(&mut c.args, &mut f);
            }
            CellKind::Chain(c) => {
                for operand in &mut c.operands {
                    each(operand, &mut f);
                }
            }
            CellKind::Unknown(c) => {
                for (_, bits) in &mut c.inputs {
                    each(bits, &mut f);
                }
            }
        }
    }

    pub fn for_each_output<F: FnMut(NetId)>(&self, mut f: F) {
        let each = |nets: &[NetId], f: &mut F| {
            for n in nets {
                f(*n);
            }
        };
        match &self.kind {
            CellKind::Unary(c) => each(&c.y, &mut f),
            CellKind::Binary(c) => each(&c.y, &mut f),
            CellKind::Mux(c) => each(&c.y, &mut f),
            CellKind::Pmux(c) => each(&c.y, &mut f),
            CellKind::Sr(c) => each(&c.q, &mut f),
            CellKind::Dff(c) => each(&c.q, &mut f),
            CellKind::Mem(c) => {
                for rd in &c.read_ports {
                    each(&rd.data, &mut f);
                }
            }
            CellKind::Print(_) => {}
            CellKind::Chain(c) => each(&c.y, &mut f),
            CellKind::Unknown(c) => {
                for (_, nets) in &c.outputs {
                    each(nets, &mut f);
                }
            }
        }
    }

    pub fn output_nets(&self) -> Vec<NetId> {
        let mut out = Vec::new();
        self.for_each_output(|n| out.push(n));
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
    Inout,
}

/// A module boundary port. Input port bits produce nets; output port bits are
/// references and always-live sinks. Inout bits are treated as both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModulePort {
    pub name: String,
    pub direction: PortDirection,
    pub bits: Vec<BitRef>,
}

/// The per-module entity collection the optimizer operates on.
///
/// Cells live in a dense arena indexed by `CellId`; removed slots stay `None`
/// so ids are never reused within a run.
#[derive(Debug, Clone)]
pub struct Netlist {
    pub name: String,
    pub attributes: BTreeMap<String, String>,
    pub ports: Vec<ModulePort>,
    /// Default parameter values of the source module, carried through for
    /// re-emission.
    pub parameter_defaults: Option<BTreeMap<String, RawParam>>,
    /// Net name metadata carried through for debugging; never consulted for
    /// correctness.
    pub netnames: BTreeMap<String, serde_json::Value>,
    cells: Vec<Option<Cell>>,
}

impl Netlist {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: BTreeMap::new(),
            ports: Vec::new(),
            parameter_defaults: None,
            netnames: BTreeMap::new(),
            cells: Vec::new(),
        }
    }

    /// The id the next added cell will receive.
    pub fn next_id(&self) -> CellId {
        CellId(self.cells.len() as u32)
    }

    pub fn add_cell(&mut self, name: impl Into<String>, kind: CellKind, attrs: CellAttrs) -> CellId {
        let id = self.next_id();
        self.cells.push(Some(Cell {
            id,
            name: name.into(),
            kind,
            attrs,
        }));
        id
    }

    pub fn remove_cell(&mut self, id: CellId) -> Cell {
        self.cells[id.0 as usize]
            .take()
            .unwrap_or_else(|| panic!("remove_cell: {} is not present", id))
    }

    pub fn contains(&self, id: CellId) -> bool {
        self.cells
            .get(id.0 as usize)
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    pub fn get(&self, id: CellId) -> &Cell {
        self.try_get(id)
            .unwrap_or_else(|| panic!("get: {} is not present", id))
    }

    pub fn try_get(&self, id: CellId) -> Option<&Cell> {
        self.cells.get(id.0 as usize).and_then(|slot| slot.as_ref())
    }

    pub fn get_mut(&mut self, id: CellId) -> &mut Cell {
        self.cells[id.0 as usize]
            .as_mut()
            .unwrap_or_else(|| panic!("get_mut: cell is not present"))
    }

    /// Iterates live cells in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter().filter_map(|slot| slot.as_ref())
    }

    /// Snapshot of live ids, for loops that mutate the arena while walking.
    pub fn ids(&self) -> Vec<CellId> {
        self.iter().map(|c| c.id).collect()
    }

    pub fn cell_count(&self) -> usize {
        self.iter().count()
    }

    /// Exclusive upper bound on ids ever allocated; sizes liveness bitmaps.
    pub fn id_bound(&self) -> usize {
        self.cells.len()
    }

    pub fn find_port(&self, name: &str) -> Option<&ModulePort> {
        self.ports.iter().find(|p| p.name == name)
    }

    /// Rewrites every reference to a substituted net, across cell inputs and
    /// output/inout port bits. Input port bits are producers, never
    /// references, and are left alone.
    pub fn apply_substitution(&mut self, subst: &SubstitutionMap) {
        if subst.is_empty() {
            return;
        }
        for slot in self.cells.iter_mut() {
            if let Some(cell) = slot {
                cell.for_each_input_mut(|r| {
                    if let BitRef::Net(n) = r {
                        if let Some(new) = subst.get(*n) {
                            *r = new;
                        }
                    }
                });
            }
        }
        for port in self.ports.iter_mut() {
            if port.direction == PortDirection::Input {
                continue;
            }
            for bit in port.bits.iter_mut() {
                if let BitRef::Net(n) = bit {
                    if let Some(new) = subst.get(*n) {
                        *bit = new;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_not_reused_after_removal() {
        let mut n = Netlist::new("t");
        let a = n.add_cell(
            "a",
            CellKind::Unary(UnaryCell {
                op: UnaryOp::Not,
                a_signed: false,
                a: vec![BitRef::Const(Lv::Zero)],
                y: vec![NetId(0)],
            }),
            CellAttrs::default(),
        );
        n.remove_cell(a);
        let b = n.add_cell(
            "b",
            CellKind::Unary(UnaryCell {
                op: UnaryOp::Not,
                a_signed: false,
                a: vec![BitRef::Const(Lv::Zero)],
                y: vec![NetId(1)],
            }),
            CellAttrs::default(),
        );
        assert_ne!(a, b);
        assert!(!n.contains(a));
        assert!(n.contains(b));
        assert_eq!(n.cell_count(), 1);
    }

    #[test]
    fn test_dff_cell_type_mapping() {
        let base = DffCell {
            clk_polarity: true,
            clk: BitRef::Net(NetId(0)),
            en: None,
            arst: None,
            srst: None,
            sr: None,
            d: vec![],
            q: vec![],
        };
        assert_eq!(base.cell_type(), "$dff");
        let mut dffe = base.clone();
        dffe.en = Some(ClockEnable {
            polarity: true,
            en: BitRef::Net(NetId(1)),
        });
        assert_eq!(dffe.cell_type(), "$dffe");
        let mut sdffce = dffe.clone();
        sdffce.srst = Some(SyncReset {
            polarity: true,
            value: vec![],
            srst: BitRef::Net(NetId(2)),
            ce_over_srst: true,
        });
        assert_eq!(sdffce.cell_type(), "$sdffce");
        let mut adff = base.clone();
        adff.arst = Some(AsyncReset {
            polarity: true,
            value: vec![],
            arst: BitRef::Net(NetId(2)),
        });
        assert_eq!(adff.cell_type(), "$adff");
    }
}
