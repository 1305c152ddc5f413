// SPDX-License-Identifier: Apache-2.0

//! IR construction: normalizes raw yosys cells into the typed cell payloads.
//!
//! A cell whose type/parameter shape this version does not recognize is not
//! an error: it degrades to an `Unknown` passthrough cell with a per-instance
//! warning, and is excluded from optimization. Structural malformation (a
//! constant on an output connection, a missing required port) is a defect in
//! the ingested netlist and fails the module.

use std::collections::BTreeMap;

use anyhow::{Context, Result, anyhow, bail};

use crate::ir::{
    AsyncReset, BinaryCell, BinaryOp, BitRef, CellAttrs, CellKind, ClockEnable, DffCell, MemCell,
    MemReadPort, MemWritePort, ModulePort, MuxCell, NetId, Netlist, PmuxCell, PortDirection,
    PrintCell, RawParam, SetClear, SrCell, SyncReset, UnaryCell, UnaryOp, UnknownCell,
};
use crate::logic::Lv;
use crate::yosys::json::{ParamValue, RawCell, RawDirection, RawModule, SigBit};

fn bit_ref(bit: &SigBit) -> Result<BitRef> {
    match bit {
        SigBit::Net(id) => {
            let id = u32::try_from(*id).map_err(|_| anyhow!("net id {} out of range", id))?;
            Ok(BitRef::Net(NetId(id)))
        }
        SigBit::Const(_) => bit
            .as_lv()
            .map(BitRef::Const)
            .ok_or_else(|| anyhow!("unrecognized constant bit {:?}", bit)),
    }
}

fn in_bus(rc: &RawCell, port: &str) -> Result<Vec<BitRef>> {
    rc.connections
        .get(port)
        .with_context(|| format!("missing connection {}", port))?
        .iter()
        .map(bit_ref)
        .collect()
}

fn in_bit(rc: &RawCell, port: &str) -> Result<BitRef> {
    let bus = in_bus(rc, port)?;
    if bus.len() != 1 {
        bail!("connection {} must be one bit, got {}", port, bus.len());
    }
    Ok(bus[0])
}

fn out_bus(rc: &RawCell, port: &str) -> Result<Vec<NetId>> {
    in_bus(rc, port)?
        .into_iter()
        .map(|bit| {
            bit.as_net()
                .ok_or_else(|| anyhow!("constant bit on output connection {}", port))
        })
        .collect()
}

fn param<'a>(rc: &'a RawCell, name: &str) -> Result<&'a ParamValue> {
    rc.parameters
        .get(name)
        .with_context(|| format!("missing parameter {}", name))
}

fn param_u32(rc: &RawCell, name: &str) -> Result<u32> {
    param(rc, name)?
        .as_u32()
        .with_context(|| format!("parameter {} is not a u32", name))
}

fn param_bool(rc: &RawCell, name: &str) -> Result<bool> {
    param(rc, name)?
        .as_bool()
        .with_context(|| format!("parameter {} is not a flag", name))
}

fn param_lvs(rc: &RawCell, name: &str, width: usize) -> Result<Vec<Lv>> {
    Ok(param(rc, name)?.as_lv_vec(width))
}

fn param_mask(rc: &RawCell, name: &str, len: usize) -> Result<Vec<bool>> {
    Ok(param(rc, name)?.as_mask(len))
}

fn attrs(rc: &RawCell) -> CellAttrs {
    CellAttrs {
        src: rc
            .attributes
            .get("src")
            .map(ParamValue::as_display_string),
        full_case: rc
            .attributes
            .get("full_case")
            .and_then(ParamValue::as_bool)
            .unwrap_or(false),
    }
}

fn import_dff(rc: &RawCell) -> Result<DffCell> {
    let width = param_u32(rc, "WIDTH")? as usize;
    let ty = rc.cell_type.as_str();
    let mut cell = DffCell {
        clk_polarity: param_bool(rc, "CLK_POLARITY")?,
        clk: in_bit(rc, "CLK")?,
        en: None,
        arst: None,
        srst: None,
        sr: None,
        d: in_bus(rc, "D")?,
        q: out_bus(rc, "Q")?,
    };
    if cell.d.len() != width || cell.q.len() != width {
        bail!("register D/Q width mismatch against WIDTH={}", width);
    }
    if matches!(ty, "$dffe" | "$adffe" | "$sdffe" | "$sdffce" | "$dffsre") {
        cell.en = Some(ClockEnable {
            polarity: param_bool(rc, "EN_POLARITY")?,
            en: in_bit(rc, "EN")?,
        });
    }
    if matches!(ty, "$adff" | "$adffe") {
        cell.arst = Some(AsyncReset {
            polarity: param_bool(rc, "ARST_POLARITY")?,
            value: param_lvs(rc, "ARST_VALUE", width)?,
            arst: in_bit(rc, "ARST")?,
        });
    }
    if matches!(ty, "$sdff" | "$sdffe" | "$sdffce") {
        cell.srst = Some(SyncReset {
            polarity: param_bool(rc, "SRST_POLARITY")?,
            value: param_lvs(rc, "SRST_VALUE", width)?,
            srst: in_bit(rc, "SRST")?,
            ce_over_srst: ty == "$sdffce",
        });
    }
    if matches!(ty, "$dffsr" | "$dffsre") {
        cell.sr = Some(SetClear {
            set_polarity: param_bool(rc, "SET_POLARITY")?,
            clr_polarity: param_bool(rc, "CLR_POLARITY")?,
            set: in_bus(rc, "SET")?,
            clr: in_bus(rc, "CLR")?,
        });
    }
    Ok(cell)
}

fn import_mem(rc: &RawCell) -> Result<MemCell> {
    let size = param_u32(rc, "SIZE")?;
    let abits = param_u32(rc, "ABITS")? as usize;
    let width = param_u32(rc, "WIDTH")? as usize;
    let rd_ports = param_u32(rc, "RD_PORTS")? as usize;
    let wr_ports = param_u32(rc, "WR_PORTS")? as usize;

    let slice = |bus: &[BitRef], i: usize, w: usize| bus[i * w..(i + 1) * w].to_vec();
    let slice_nets = |bus: &[NetId], i: usize, w: usize| bus[i * w..(i + 1) * w].to_vec();
    let slice_lvs = |lvs: &[Lv], i: usize, w: usize| lvs[i * w..(i + 1) * w].to_vec();
    let slice_mask =
        |mask: &[bool], i: usize, w: usize| mask[i * w..(i + 1) * w].to_vec();

    let rd_clk = in_bus(rc, "RD_CLK")?;
    let rd_en = in_bus(rc, "RD_EN")?;
    let rd_addr = in_bus(rc, "RD_ADDR")?;
    let rd_data = out_bus(rc, "RD_DATA")?;
    let rd_arst = in_bus(rc, "RD_ARST")?;
    let rd_srst = in_bus(rc, "RD_SRST")?;
    if rd_clk.len() != rd_ports
        || rd_en.len() != rd_ports
        || rd_addr.len() != rd_ports * abits
        || rd_data.len() != rd_ports * width
    {
        bail!("memory read port connections disagree with RD_PORTS={}", rd_ports);
    }
    let rd_clk_enable = param_mask(rc, "RD_CLK_ENABLE", rd_ports)?;
    let rd_clk_polarity = param_mask(rc, "RD_CLK_POLARITY", rd_ports)?;
    let rd_ce_over_srst = param_mask(rc, "RD_CE_OVER_SRST", rd_ports)?;
    let rd_wide = param_mask(rc, "RD_WIDE_CONTINUATION", rd_ports)?;
    let rd_transparency = param_mask(rc, "RD_TRANSPARENCY_MASK", rd_ports * wr_ports)?;
    let rd_collision = param_mask(rc, "RD_COLLISION_X_MASK", rd_ports * wr_ports)?;
    let rd_init = param_lvs(rc, "RD_INIT_VALUE", rd_ports * width)?;
    let rd_arst_value = param_lvs(rc, "RD_ARST_VALUE", rd_ports * width)?;
    let rd_srst_value = param_lvs(rc, "RD_SRST_VALUE", rd_ports * width)?;

    let mut read_ports = Vec::with_capacity(rd_ports);
    for i in 0..rd_ports {
        read_ports.push(MemReadPort {
            clocked: rd_clk_enable[i],
            clk_polarity: rd_clk_polarity[i],
            clk: rd_clk[i],
            en: rd_en[i],
            addr: slice(&rd_addr, i, abits),
            data: slice_nets(&rd_data, i, width),
            arst: rd_arst[i],
            srst: rd_srst[i],
            init_value: slice_lvs(&rd_init, i, width),
            arst_value: slice_lvs(&rd_arst_value, i, width),
            srst_value: slice_lvs(&rd_srst_value, i, width),
            transparency_mask: slice_mask(&rd_transparency, i, wr_ports),
            collision_x_mask: slice_mask(&rd_collision, i, wr_ports),
            ce_over_srst: rd_ce_over_srst[i],
            wide_continuation: rd_wide[i],
        });
    }

    let wr_clk = in_bus(rc, "WR_CLK")?;
    let wr_en = in_bus(rc, "WR_EN")?;
    let wr_addr = in_bus(rc, "WR_ADDR")?;
    let wr_data = in_bus(rc, "WR_DATA")?;
    if wr_clk.len() != wr_ports
        || wr_en.len() != wr_ports * width
        || wr_addr.len() != wr_ports * abits
        || wr_data.len() != wr_ports * width
    {
        bail!("memory write port connections disagree with WR_PORTS={}", wr_ports);
    }
    let wr_clk_enable = param_mask(rc, "WR_CLK_ENABLE", wr_ports)?;
    let wr_clk_polarity = param_mask(rc, "WR_CLK_POLARITY", wr_ports)?;
    let wr_wide = param_mask(rc, "WR_WIDE_CONTINUATION", wr_ports)?;
    let wr_priority = param_mask(rc, "WR_PRIORITY_MASK", wr_ports * wr_ports)?;

    let mut write_ports = Vec::with_capacity(wr_ports);
    for i in 0..wr_ports {
        write_ports.push(MemWritePort {
            clocked: wr_clk_enable[i],
            clk_polarity: wr_clk_polarity[i],
            clk: wr_clk[i],
            en: slice(&wr_en, i, width),
            addr: slice(&wr_addr, i, abits),
            data: slice(&wr_data, i, width),
            priority_mask: slice_mask(&wr_priority, i, wr_ports),
            wide_continuation: wr_wide[i],
        });
    }

    Ok(MemCell {
        memid: param(rc, "MEMID")?.as_display_string(),
        size,
        abits: abits as u32,
        width: width as u32,
        offset: param(rc, "OFFSET")?.as_i64().unwrap_or(0) as i32,
        init: param(rc, "INIT")?.as_lv_vec(size as usize * width),
        read_ports,
        write_ports,
    })
}

fn import_print(rc: &RawCell) -> Result<PrintCell> {
    let trg_width = param_u32(rc, "TRG_WIDTH").unwrap_or(0) as usize;
    Ok(PrintCell {
        format: rc
            .parameters
            .get("FORMAT")
            .map(ParamValue::as_display_string)
            .unwrap_or_default(),
        priority: rc
            .parameters
            .get("PRIORITY")
            .and_then(ParamValue::as_i64)
            .unwrap_or(0) as i32,
        trg_enable: rc
            .parameters
            .get("TRG_ENABLE")
            .and_then(ParamValue::as_bool)
            .unwrap_or(false),
        trg_polarity: rc
            .parameters
            .get("TRG_POLARITY")
            .map(|p| p.as_mask(trg_width))
            .unwrap_or_default(),
        en: in_bit(rc, "EN")?,
        trg: in_bus(rc, "TRG").unwrap_or_default(),
        args: in_bus(rc, "ARGS").unwrap_or_default(),
    })
}

/// Falls back to a passthrough cell, using `port_directions` to split
/// connections into inputs and outputs (unlisted ports are conservatively
/// inputs).
fn import_unknown(rc: &RawCell) -> Result<UnknownCell> {
    let mut inputs = Vec::new();
    let mut outputs = Vec::new();
    for (port, bits) in &rc.connections {
        match rc.port_directions.get(port) {
            Some(RawDirection::Output) => outputs.push((port.clone(), out_bus(rc, port)?)),
            _ => inputs.push((port.clone(), in_bus(rc, port)?)),
        }
    }
    let parameters: BTreeMap<String, RawParam> = rc
        .parameters
        .iter()
        .map(|(k, v)| {
            let raw = match v {
                ParamValue::Int(i) => RawParam::Int(*i),
                ParamValue::Str(s) => RawParam::Str(s.clone()),
            };
            (k.clone(), raw)
        })
        .collect();
    Ok(UnknownCell {
        cell_type: rc.cell_type.clone(),
        parameters,
        inputs,
        outputs,
    })
}

fn import_cell(module: &str, name: &str, rc: &RawCell) -> Result<CellKind> {
    if let Some(op) = UnaryOp::from_cell_type(&rc.cell_type) {
        return Ok(CellKind::Unary(UnaryCell {
            op,
            a_signed: param_bool(rc, "A_SIGNED")?,
            a: in_bus(rc, "A")?,
            y: out_bus(rc, "Y")?,
        }));
    }
    if let Some(op) = BinaryOp::from_cell_type(&rc.cell_type) {
        return Ok(CellKind::Binary(BinaryCell {
            op,
            a_signed: param_bool(rc, "A_SIGNED")?,
            b_signed: param_bool(rc, "B_SIGNED")?,
            a: in_bus(rc, "A")?,
            b: in_bus(rc, "B")?,
            y: out_bus(rc, "Y")?,
        }));
    }
    match rc.cell_type.as_str() {
        "$mux" => Ok(CellKind::Mux(MuxCell {
            a: in_bus(rc, "A")?,
            b: in_bus(rc, "B")?,
            s: in_bit(rc, "S")?,
            y: out_bus(rc, "Y")?,
        })),
        "$pmux" => Ok(CellKind::Pmux(PmuxCell {
            a: in_bus(rc, "A")?,
            b: in_bus(rc, "B")?,
            s: in_bus(rc, "S")?,
            y: out_bus(rc, "Y")?,
        })),
        "$sr" => Ok(CellKind::Sr(SrCell {
            set_polarity: param_bool(rc, "SET_POLARITY")?,
            clr_polarity: param_bool(rc, "CLR_POLARITY")?,
            set: in_bus(rc, "SET")?,
            clr: in_bus(rc, "CLR")?,
            q: out_bus(rc, "Q")?,
        })),
        "$dff" | "$dffe" | "$adff" | "$adffe" | "$sdff" | "$sdffe" | "$sdffce" | "$dffsr"
        | "$dffsre" => Ok(CellKind::Dff(import_dff(rc)?)),
        "$mem_v2" => Ok(CellKind::Mem(import_mem(rc)?)),
        "$print" => Ok(CellKind::Print(import_print(rc)?)),
        other => {
            log::warn!(
                "module {}: cell {} has unsupported type {}; passing through unoptimized",
                module,
                name,
                other
            );
            Ok(CellKind::Unknown(import_unknown(rc)?))
        }
    }
}

/// Builds the typed netlist for one raw module.
pub fn import_module(name: &str, raw: &RawModule) -> Result<Netlist> {
    let mut n = Netlist::new(name);
    n.attributes = raw
        .attributes
        .iter()
        .map(|(k, v)| (k.clone(), v.as_display_string()))
        .collect();
    n.parameter_defaults = raw.parameter_default_values.as_ref().map(|defaults| {
        defaults
            .iter()
            .map(|(k, v)| {
                let raw = match v {
                    ParamValue::Int(i) => RawParam::Int(*i),
                    ParamValue::Str(s) => RawParam::Str(s.clone()),
                };
                (k.clone(), raw)
            })
            .collect()
    });
    n.netnames = raw.netnames.clone();

    for (port_name, port) in &raw.ports {
        let direction = match port.direction {
            RawDirection::Input => PortDirection::Input,
            RawDirection::Output => PortDirection::Output,
            RawDirection::Inout => PortDirection::Inout,
        };
        let bits = port
            .bits
            .iter()
            .map(bit_ref)
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("port {}", port_name))?;
        n.ports.push(ModulePort {
            name: port_name.clone(),
            direction,
            bits,
        });
    }

    for (cell_name, rc) in &raw.cells {
        let kind = import_cell(name, cell_name, rc)
            .with_context(|| format!("cell {} (type {})", cell_name, rc.cell_type))?;
        n.add_cell(cell_name.clone(), kind, attrs(rc));
    }
    Ok(n)
}
