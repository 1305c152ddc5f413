// SPDX-License-Identifier: Apache-2.0

//! Programmatic netlist construction.
//!
//! The import layer builds netlists from yosys documents; this builder exists
//! for everything else: tests, doc examples, and synthetic fixtures. Net ids
//! are allocated densely starting from zero.

use crate::ir::{
    BinaryCell, BinaryOp, BitRef, CellAttrs, CellId, CellKind, DffCell, ModulePort, MuxCell,
    NetId, Netlist, PmuxCell, PortDirection, PrintCell, UnaryCell, UnaryOp,
};
use crate::logic::{self, Lv};

pub struct NetlistBuilder {
    n: Netlist,
    next_net: u32,
}

impl NetlistBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            n: Netlist::new(name),
            next_net: 0,
        }
    }

    pub fn fresh_nets(&mut self, width: usize) -> Vec<NetId> {
        (0..width)
            .map(|_| {
                let id = NetId(self.next_net);
                self.next_net += 1;
                id
            })
            .collect()
    }

    fn net_refs(nets: &[NetId]) -> Vec<BitRef> {
        nets.iter().map(|n| BitRef::Net(*n)).collect()
    }

    /// Declares an input port and returns references to its freshly-produced
    /// nets.
    pub fn add_input(&mut self, name: impl Into<String>, width: usize) -> Vec<BitRef> {
        let nets = self.fresh_nets(width);
        let bits = Self::net_refs(&nets);
        self.n.ports.push(ModulePort {
            name: name.into(),
            direction: PortDirection::Input,
            bits: bits.clone(),
        });
        bits
    }

    pub fn add_output(&mut self, name: impl Into<String>, bits: Vec<BitRef>) {
        self.n.ports.push(ModulePort {
            name: name.into(),
            direction: PortDirection::Output,
            bits,
        });
    }

    /// A fully-constant bus holding `value`, LSB-first.
    pub fn constant(&self, value: i128, width: usize) -> Vec<BitRef> {
        logic::from_value(value, width)
            .into_iter()
            .map(BitRef::Const)
            .collect()
    }

    fn add(&mut self, tag: &str, kind: CellKind) -> CellId {
        let name = format!("${}${}", tag, self.n.next_id());
        self.n.add_cell(name, kind, CellAttrs::default())
    }

    pub fn unary(&mut self, op: UnaryOp, a: Vec<BitRef>, y_width: usize) -> Vec<BitRef> {
        self.unary_signed(op, false, a, y_width)
    }

    pub fn unary_signed(
        &mut self,
        op: UnaryOp,
        a_signed: bool,
        a: Vec<BitRef>,
        y_width: usize,
    ) -> Vec<BitRef> {
        let y = self.fresh_nets(y_width);
        let refs = Self::net_refs(&y);
        self.add(
            op.cell_type().trim_start_matches('$'),
            CellKind::Unary(UnaryCell {
                op,
                a_signed,
                a,
                y,
            }),
        );
        refs
    }

    pub fn binary(
        &mut self,
        op: BinaryOp,
        a: Vec<BitRef>,
        b: Vec<BitRef>,
        y_width: usize,
    ) -> Vec<BitRef> {
        self.binary_signed(op, false, a, false, b, y_width)
    }

    pub fn binary_signed(
        &mut self,
        op: BinaryOp,
        a_signed: bool,
        a: Vec<BitRef>,
        b_signed: bool,
        b: Vec<BitRef>,
        y_width: usize,
    ) -> Vec<BitRef> {
        let y = self.fresh_nets(y_width);
        let refs = Self::net_refs(&y);
        self.add(
            op.cell_type().trim_start_matches('$'),
            CellKind::Binary(BinaryCell {
                op,
                a_signed,
                b_signed,
                a,
                b,
                y,
            }),
        );
        refs
    }

    pub fn mux(&mut self, a: Vec<BitRef>, b: Vec<BitRef>, s: BitRef) -> Vec<BitRef> {
        let width = a.len();
        let y = self.fresh_nets(width);
        let refs = Self::net_refs(&y);
        self.add("mux", CellKind::Mux(MuxCell { a, b, s, y }));
        refs
    }

    pub fn pmux(&mut self, a: Vec<BitRef>, b: Vec<BitRef>, s: Vec<BitRef>) -> Vec<BitRef> {
        let width = a.len();
        let y = self.fresh_nets(width);
        let refs = Self::net_refs(&y);
        self.add("pmux", CellKind::Pmux(PmuxCell { a, b, s, y }));
        refs
    }

    /// Plain positive-edge register with no reset or enable.
    pub fn dff(&mut self, clk: BitRef, d: Vec<BitRef>) -> Vec<BitRef> {
        let q = self.fresh_nets(d.len());
        let refs = Self::net_refs(&q);
        self.add(
            "dff",
            CellKind::Dff(DffCell {
                clk_polarity: true,
                clk,
                en: None,
                arst: None,
                srst: None,
                sr: None,
                d,
                q,
            }),
        );
        refs
    }

    /// Observation sink over `args`, unconditionally enabled.
    pub fn print(&mut self, args: Vec<BitRef>) -> CellId {
        let kind = CellKind::Print(PrintCell {
            format: String::new(),
            priority: 0,
            trg_enable: false,
            trg_polarity: vec![],
            en: BitRef::Const(Lv::One),
            trg: vec![],
            args,
        });
        self.add("print", kind)
    }

    pub fn finish(self) -> Netlist {
        self.n
    }
}
