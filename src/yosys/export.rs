// SPDX-License-Identifier: Apache-2.0

//! Netlist emission: re-encodes the (optimized) IR as a yosys-style JSON
//! module, the hand-off format for downstream consumers.
//!
//! Chain cells have no yosys primitive; they are emitted as `$chain$<op>`
//! with `SLICES`/`WIDTH`/`SIGNED` parameters and `A0..An`/`Y` connections.

use std::collections::BTreeMap;

use crate::ir::{
    BinaryCell, BitRef, Cell, CellKind, ChainCell, DffCell, MemCell, MuxCell, NetId, Netlist,
    PmuxCell, PortDirection, PrintCell, RawParam, SrCell, UnaryCell, UnknownCell,
};
use crate::logic::Lv;
use crate::yosys::json::{ParamValue, RawCell, RawDirection, RawModule, RawPort, SigBit};

fn sig_bits(bits: &[BitRef]) -> Vec<SigBit> {
    bits.iter()
        .map(|bit| match bit {
            BitRef::Net(n) => SigBit::Net(n.0 as u64),
            BitRef::Const(lv) => SigBit::from_lv(*lv),
        })
        .collect()
}

fn sig_nets(nets: &[NetId]) -> Vec<SigBit> {
    nets.iter().map(|n| SigBit::Net(n.0 as u64)).collect()
}

fn flag(b: bool) -> ParamValue {
    ParamValue::Int(b as i64)
}

fn lvs_param(lvs: &[Lv]) -> ParamValue {
    ParamValue::Str(lvs.iter().rev().map(|lv| lv.as_char()).collect())
}

fn mask_param(mask: &[bool]) -> ParamValue {
    ParamValue::Str(
        mask.iter()
            .rev()
            .map(|b| if *b { '1' } else { '0' })
            .collect(),
    )
}

struct CellWriter {
    rc: RawCell,
}

impl CellWriter {
    fn new(cell_type: &str) -> Self {
        Self {
            rc: RawCell {
                hide_name: 0,
                cell_type: cell_type.to_string(),
                parameters: BTreeMap::new(),
                attributes: BTreeMap::new(),
                port_directions: BTreeMap::new(),
                connections: BTreeMap::new(),
            },
        }
    }

    fn param(&mut self, name: &str, value: ParamValue) -> &mut Self {
        self.rc.parameters.insert(name.to_string(), value);
        self
    }

    fn input(&mut self, port: &str, bits: Vec<SigBit>) -> &mut Self {
        self.rc
            .port_directions
            .insert(port.to_string(), RawDirection::Input);
        self.rc.connections.insert(port.to_string(), bits);
        self
    }

    fn output(&mut self, port: &str, bits: Vec<SigBit>) -> &mut Self {
        self.rc
            .port_directions
            .insert(port.to_string(), RawDirection::Output);
        self.rc.connections.insert(port.to_string(), bits);
        self
    }
}

fn export_unary(c: &UnaryCell) -> RawCell {
    let mut w = CellWriter::new(c.op.cell_type());
    w.param("A_SIGNED", flag(c.a_signed))
        .param("A_WIDTH", ParamValue::Int(c.a.len() as i64))
        .param("Y_WIDTH", ParamValue::Int(c.y.len() as i64))
        .input("A", sig_bits(&c.a))
        .output("Y", sig_nets(&c.y));
    w.rc
}

fn export_binary(c: &BinaryCell) -> RawCell {
    let mut w = CellWriter::new(c.op.cell_type());
    w.param("A_SIGNED", flag(c.a_signed))
        .param("A_WIDTH", ParamValue::Int(c.a.len() as i64))
        .param("B_SIGNED", flag(c.b_signed))
        .param("B_WIDTH", ParamValue::Int(c.b.len() as i64))
        .param("Y_WIDTH", ParamValue::Int(c.y.len() as i64))
        .input("A", sig_bits(&c.a))
        .input("B", sig_bits(&c.b))
        .output("Y", sig_nets(&c.y));
    w.rc
}

fn export_mux(c: &MuxCell) -> RawCell {
    let mut w = CellWriter::new("$mux");
    w.param("WIDTH", ParamValue::Int(c.y.len() as i64))
        .input("A", sig_bits(&c.a))
        .input("B", sig_bits(&c.b))
        .input("S", sig_bits(&[c.s]))
        .output("Y", sig_nets(&c.y));
    w.rc
}

fn export_pmux(c: &PmuxCell) -> RawCell {
    let mut w = CellWriter::new("$pmux");
    w.param("WIDTH", ParamValue::Int(c.y.len() as i64))
        .param("S_WIDTH", ParamValue::Int(c.s.len() as i64))
        .input("A", sig_bits(&c.a))
        .input("B", sig_bits(&c.b))
        .input("S", sig_bits(&c.s))
        .output("Y", sig_nets(&c.y));
    w.rc
}

fn export_sr(c: &SrCell) -> RawCell {
    let mut w = CellWriter::new("$sr");
    w.param("WIDTH", ParamValue::Int(c.q.len() as i64))
        .param("SET_POLARITY", flag(c.set_polarity))
        .param("CLR_POLARITY", flag(c.clr_polarity))
        .input("SET", sig_bits(&c.set))
        .input("CLR", sig_bits(&c.clr))
        .output("Q", sig_nets(&c.q));
    w.rc
}

fn export_dff(c: &DffCell) -> RawCell {
    let mut w = CellWriter::new(c.cell_type());
    w.param("WIDTH", ParamValue::Int(c.q.len() as i64))
        .param("CLK_POLARITY", flag(c.clk_polarity))
        .input("CLK", sig_bits(&[c.clk]))
        .input("D", sig_bits(&c.d))
        .output("Q", sig_nets(&c.q));
    if let Some(en) = &c.en {
        w.param("EN_POLARITY", flag(en.polarity))
            .input("EN", sig_bits(&[en.en]));
    }
    if let Some(arst) = &c.arst {
        w.param("ARST_POLARITY", flag(arst.polarity))
            .param("ARST_VALUE", lvs_param(&arst.value))
            .input("ARST", sig_bits(&[arst.arst]));
    }
    if let Some(srst) = &c.srst {
        w.param("SRST_POLARITY", flag(srst.polarity))
            .param("SRST_VALUE", lvs_param(&srst.value))
            .input("SRST", sig_bits(&[srst.srst]));
    }
    if let Some(sr) = &c.sr {
        w.param("SET_POLARITY", flag(sr.set_polarity))
            .param("CLR_POLARITY", flag(sr.clr_polarity))
            .input("SET", sig_bits(&sr.set))
            .input("CLR", sig_bits(&sr.clr));
    }
    w.rc
}

fn export_mem(c: &MemCell) -> RawCell {
    let mut w = CellWriter::new("$mem_v2");
    let rd = &c.read_ports;
    let wr = &c.write_ports;
    w.param("MEMID", ParamValue::Str(c.memid.clone()))
        .param("SIZE", ParamValue::Int(c.size as i64))
        .param("ABITS", ParamValue::Int(c.abits as i64))
        .param("WIDTH", ParamValue::Int(c.width as i64))
        .param("OFFSET", ParamValue::Int(c.offset as i64))
        .param("INIT", lvs_param(&c.init))
        .param("RD_PORTS", ParamValue::Int(rd.len() as i64))
        .param(
            "RD_CLK_ENABLE",
            mask_param(&rd.iter().map(|p| p.clocked).collect::<Vec<_>>()),
        )
        .param(
            "RD_CLK_POLARITY",
            mask_param(&rd.iter().map(|p| p.clk_polarity).collect::<Vec<_>>()),
        )
        .param(
            "RD_CE_OVER_SRST",
            mask_param(&rd.iter().map(|p| p.ce_over_srst).collect::<Vec<_>>()),
        )
        .param(
            "RD_WIDE_CONTINUATION",
            mask_param(&rd.iter().map(|p| p.wide_continuation).collect::<Vec<_>>()),
        )
        .param(
            "RD_TRANSPARENCY_MASK",
            mask_param(
                &rd.iter()
                    .flat_map(|p| p.transparency_mask.iter().copied())
                    .collect::<Vec<_>>(),
            ),
        )
        .param(
            "RD_COLLISION_X_MASK",
            mask_param(
                &rd.iter()
                    .flat_map(|p| p.collision_x_mask.iter().copied())
                    .collect::<Vec<_>>(),
            ),
        )
        .param(
            "RD_INIT_VALUE",
            lvs_param(
                &rd.iter()
                    .flat_map(|p| p.init_value.iter().copied())
                    .collect::<Vec<_>>(),
            ),
        )
        .param(
            "RD_ARST_VALUE",
            lvs_param(
                &rd.iter()
                    .flat_map(|p| p.arst_value.iter().copied())
                    .collect::<Vec<_>>(),
            ),
        )
        .param(
            "RD_SRST_VALUE",
            lvs_param(
                &rd.iter()
                    .flat_map(|p| p.srst_value.iter().copied())
                    .collect::<Vec<_>>(),
            ),
        )
        .param("WR_PORTS", ParamValue::Int(wr.len() as i64))
        .param(
            "WR_CLK_ENABLE",
            mask_param(&wr.iter().map(|p| p.clocked).collect::<Vec<_>>()),
        )
        .param(
            "WR_CLK_POLARITY",
            mask_param(&wr.iter().map(|p| p.clk_polarity).collect::<Vec<_>>()),
        )
        .param(
            "WR_WIDE_CONTINUATION",
            mask_param(&wr.iter().map(|p| p.wide_continuation).collect::<Vec<_>>()),
        )
        .param(
            "WR_PRIORITY_MASK",
            mask_param(
                &wr.iter()
                    .flat_map(|p| p.priority_mask.iter().copied())
                    .collect::<Vec<_>>(),
            ),
        );
    w.input(
        "RD_CLK",
        sig_bits(&rd.iter().map(|p| p.clk).collect::<Vec<_>>()),
    )
    .input(
        "RD_EN",
        sig_bits(&rd.iter().map(|p| p.en).collect::<Vec<_>>()),
    )
    .input(
        "RD_ADDR",
        sig_bits(
            &rd.iter()
                .flat_map(|p| p.addr.iter().copied())
                .collect::<Vec<_>>(),
        ),
    )
    .input(
        "RD_ARST",
        sig_bits(&rd.iter().map(|p| p.arst).collect::<Vec<_>>()),
    )
    .input(
        "RD_SRST",
        sig_bits(&rd.iter().map(|p| p.srst).collect::<Vec<_>>()),
    )
    .output(
        "RD_DATA",
        sig_nets(
            &rd.iter()
                .flat_map(|p| p.data.iter().copied())
                .collect::<Vec<_>>(),
        ),
    )
    .input(
        "WR_CLK",
        sig_bits(&wr.iter().map(|p| p.clk).collect::<Vec<_>>()),
    )
    .input(
        "WR_EN",
        sig_bits(
            &wr.iter()
                .flat_map(|p| p.en.iter().copied())
                .collect::<Vec<_>>(),
        ),
    )
    .input(
        "WR_ADDR",
        sig_bits(
            &wr.iter()
                .flat_map(|p| p.addr.iter().copied())
                .collect::<Vec<_>>(),
        ),
    )
    .input(
        "WR_DATA",
        sig_bits(
            &wr.iter()
                .flat_map(|p| p.data.iter().copied())
                .collect::<Vec<_>>(),
        ),
    );
    w.rc
}

fn export_print(c: &PrintCell) -> RawCell {
    let mut w = CellWriter::new("$print");
    w.param("FORMAT", ParamValue::Str(c.format.clone()))
        .param("PRIORITY", ParamValue::Int(c.priority as i64))
        .param("TRG_ENABLE", flag(c.trg_enable))
        .param("TRG_WIDTH", ParamValue::Int(c.trg.len() as i64))
        .param("TRG_POLARITY", mask_param(&c.trg_polarity))
        .param("ARGS_WIDTH", ParamValue::Int(c.args.len() as i64))
        .input("EN", sig_bits(&[c.en]))
        .input("TRG", sig_bits(&c.trg))
        .input("ARGS", sig_bits(&c.args));
    w.rc
}

fn export_chain(c: &ChainCell) -> RawCell {
    let mut w = CellWriter::new(&format!("$chain{}", c.op.cell_type()));
    w.param("SLICES", ParamValue::Int(c.operands.len() as i64))
        .param("WIDTH", ParamValue::Int(c.y.len() as i64))
        .param("SIGNED", flag(c.signed));
    for (i, operand) in c.operands.iter().enumerate() {
        w.input(&format!("A{}", i), sig_bits(operand));
    }
    w.output("Y", sig_nets(&c.y));
    w.rc
}

fn export_unknown(c: &UnknownCell) -> RawCell {
    let mut w = CellWriter::new(&c.cell_type);
    for (name, value) in &c.parameters {
        let pv = match value {
            RawParam::Int(i) => ParamValue::Int(*i),
            RawParam::Str(s) => ParamValue::Str(s.clone()),
        };
        w.param(name, pv);
    }
    for (port, bits) in &c.inputs {
        w.input(port, sig_bits(bits));
    }
    for (port, nets) in &c.outputs {
        w.output(port, sig_nets(nets));
    }
    w.rc
}

fn export_cell(cell: &Cell) -> RawCell {
    let mut rc = match &cell.kind {
        CellKind::Unary(c) => export_unary(c),
        CellKind::Binary(c) => export_binary(c),
        CellKind::Mux(c) => export_mux(c),
        CellKind::Pmux(c) => export_pmux(c),
        CellKind::Sr(c) => export_sr(c),
        CellKind::Dff(c) => export_dff(c),
        CellKind::Mem(c) => export_mem(c),
        CellKind::Print(c) => export_print(c),
        CellKind::Chain(c) => export_chain(c),
        CellKind::Unknown(c) => export_unknown(c),
    };
    rc.hide_name = cell.name.starts_with('$') as u8;
    if let Some(src) = &cell.attrs.src {
        rc.attributes
            .insert("src".to_string(), ParamValue::Str(src.clone()));
    }
    if cell.attrs.full_case {
        rc.attributes
            .insert("full_case".to_string(), ParamValue::Str("1".to_string()));
    }
    rc
}

pub fn export_module(n: &Netlist) -> RawModule {
    let mut raw = RawModule::default();
    raw.attributes = n
        .attributes
        .iter()
        .map(|(k, v)| (k.clone(), ParamValue::Str(v.clone())))
        .collect();
    raw.parameter_default_values = n.parameter_defaults.as_ref().map(|defaults| {
        defaults
            .iter()
            .map(|(k, v)| {
                let pv = match v {
                    RawParam::Int(i) => ParamValue::Int(*i),
                    RawParam::Str(s) => ParamValue::Str(s.clone()),
                };
                (k.clone(), pv)
            })
            .collect()
    });
    raw.netnames = n.netnames.clone();
    for port in &n.ports {
        let direction = match port.direction {
            PortDirection::Input => RawDirection::Input,
            PortDirection::Output => RawDirection::Output,
            PortDirection::Inout => RawDirection::Inout,
        };
        raw.ports.insert(
            port.name.clone(),
            RawPort {
                direction,
                bits: sig_bits(&port.bits),
            },
        );
    }
    for cell in n.iter() {
        raw.cells.insert(cell.name.clone(), export_cell(cell));
    }
    raw
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::yosys::import;
    use crate::yosys::json::Document;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_import_export_import_is_stable() {
        let text = r#"{
            "creator": "test",
            "modules": {"m": {
                "attributes": {"top": "1"},
                "ports": {
                    "a": {"direction": "input", "bits": [2, 3]},
                    "y": {"direction": "output", "bits": [6, 7]}
                },
                "cells": {
                    "inv": {
                        "type": "$not",
                        "parameters": {"A_SIGNED": 0, "A_WIDTH": 2, "Y_WIDTH": 2},
                        "connections": {"A": [2, 3], "Y": [4, 5]}
                    },
                    "buf": {
                        "type": "$not",
                        "parameters": {"A_SIGNED": 0, "A_WIDTH": 2, "Y_WIDTH": 2},
                        "connections": {"A": [4, 5], "Y": [6, 7]}
                    }
                },
                "netnames": {"a": {"bits": [2, 3]}}
            }}
        }"#;
        let doc: Document = serde_json::from_str(text).unwrap();
        let n = import::import_module("m", &doc.modules["m"]).unwrap();
        let raw = export_module(&n);
        let n2 = import::import_module("m", &raw).unwrap();
        let cells1: Vec<_> = n.iter().map(|c| (&c.name, &c.kind)).collect();
        let cells2: Vec<_> = n2.iter().map(|c| (&c.name, &c.kind)).collect();
        assert_eq!(cells1, cells2);
        assert_eq!(n.ports, n2.ports);
        assert_eq!(n.netnames, n2.netnames);
    }

    #[test]
    fn test_chain_cell_export_shape() {
        use crate::builder::NetlistBuilder;
        use crate::ir::BinaryOp;

        let mut b = NetlistBuilder::new("t");
        let a = b.add_input("a", 2);
        let c = b.add_input("b", 2);
        let d = b.add_input("c", 2);
        let s1 = b.binary(BinaryOp::Add, a, c, 2);
        let s2 = b.binary(BinaryOp::Add, s1, d, 2);
        b.add_output("y", s2);
        let mut n = b.finish();
        crate::opt::opt_chain(&mut n);
        let raw = export_module(&n);
        let (_, rc) = raw
            .cells
            .iter()
            .find(|(_, rc)| rc.cell_type.starts_with("$chain"))
            .unwrap();
        assert_eq!(rc.cell_type, "$chain$add");
        assert_eq!(rc.parameters["SLICES"], ParamValue::Int(3));
        assert!(rc.connections.contains_key("A0"));
        assert!(rc.connections.contains_key("A2"));
        assert_eq!(rc.port_directions["Y"], RawDirection::Output);
    }
}
