// SPDX-License-Identifier: Apache-2.0

//! Common-subexpression merge: collapses structurally identical cells onto
//! one representative.
//!
//! The structural key is a blake3 hash over the cell's kind discriminant,
//! parameters, and input buses; commutative binary operators have their two
//! operand encodings sorted first so `a op b` and `b op a` collide. The
//! representative is the lowest-id member of each group (the arena iterates
//! in id order, so the first cell seen wins), which keeps merges
//! deterministic.

use ahash::AHashMap;

use crate::ir::{BitRef, Cell, CellId, CellKind, Netlist};
use crate::logic::Lv;
use crate::subst::SubstitutionMap;

fn update_u32(h: &mut blake3::Hasher, v: u32) {
    h.update(&v.to_le_bytes());
}

fn update_usize(h: &mut blake3::Hasher, v: usize) {
    h.update(&(v as u64).to_le_bytes());
}

fn update_str(h: &mut blake3::Hasher, s: &str) {
    update_usize(h, s.len());
    h.update(s.as_bytes());
}

fn update_bool(h: &mut blake3::Hasher, b: bool) {
    h.update(&[b as u8]);
}

fn encode_bit(out: &mut Vec<u8>, bit: &BitRef) {
    match bit {
        BitRef::Net(n) => {
            out.push(0);
            out.extend_from_slice(&n.0.to_le_bytes());
        }
        BitRef::Const(lv) => {
            out.push(1);
            out.push(*lv as u8);
        }
    }
}

fn encode_bus(bits: &[BitRef]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + bits.len() * 5);
    out.extend_from_slice(&(bits.len() as u32).to_le_bytes());
    for bit in bits {
        encode_bit(&mut out, bit);
    }
    out
}

fn update_bus(h: &mut blake3::Hasher, bits: &[BitRef]) {
    h.update(&encode_bus(bits));
}

fn update_lvs(h: &mut blake3::Hasher, lvs: &[Lv]) {
    update_usize(h, lvs.len());
    for lv in lvs {
        h.update(&[*lv as u8]);
    }
}

/// Structural key for mergeable cells; `None` for cells that never merge
/// (sinks and unsupported shapes).
fn cell_key(cell: &Cell) -> Option<blake3::Hash> {
    let mut h = blake3::Hasher::new();
    match &cell.kind {
        CellKind::Unary(c) => {
            update_str(&mut h, "unary");
            update_str(&mut h, c.op.cell_type());
            update_bool(&mut h, c.a_signed);
            update_bus(&mut h, &c.a);
            update_usize(&mut h, c.y.len());
        }
        CellKind::Binary(c) => {
            update_str(&mut h, "binary");
            update_str(&mut h, c.op.cell_type());
            let mut lhs = vec![c.a_signed as u8];
            lhs.extend(encode_bus(&c.a));
            let mut rhs = vec![c.b_signed as u8];
            rhs.extend(encode_bus(&c.b));
            if c.op.is_commutative() && rhs < lhs {
                std::mem::swap(&mut lhs, &mut rhs);
            }
            h.update(&lhs);
            h.update(&rhs);
            update_usize(&mut h, c.y.len());
        }
        CellKind::Mux(c) => {
            update_str(&mut h, "mux");
            update_bus(&mut h, &c.a);
            update_bus(&mut h, &c.b);
            update_bus(&mut h, &[c.s]);
            update_usize(&mut h, c.y.len());
        }
        CellKind::Pmux(c) => {
            update_str(&mut h, "pmux");
            update_bus(&mut h, &c.a);
            update_bus(&mut h, &c.b);
            update_bus(&mut h, &c.s);
            update_usize(&mut h, c.y.len());
        }
        CellKind::Sr(c) => {
            update_str(&mut h, "sr");
            update_bool(&mut h, c.set_polarity);
            update_bool(&mut h, c.clr_polarity);
            update_bus(&mut h, &c.set);
            update_bus(&mut h, &c.clr);
            update_usize(&mut h, c.q.len());
        }
        CellKind::Dff(c) => {
            update_str(&mut h, "dff");
            update_bool(&mut h, c.clk_polarity);
            update_bus(&mut h, &[c.clk]);
            match &c.en {
                Some(en) => {
                    update_bool(&mut h, true);
                    update_bool(&mut h, en.polarity);
                    update_bus(&mut h, &[en.en]);
                }
                None => update_bool(&mut h, false),
            }
            match &c.arst {
                Some(arst) => {
                    update_bool(&mut h, true);
                    update_bool(&mut h, arst.polarity);
                    update_lvs(&mut h, &arst.value);
                    update_bus(&mut h, &[arst.arst]);
                }
                None => update_bool(&mut h, false),
            }
            match &c.srst {
                Some(srst) => {
                    update_bool(&mut h, true);
                    update_bool(&mut h, srst.polarity);
                    update_bool(&mut h, srst.ce_over_srst);
                    update_lvs(&mut h, &srst.value);
                    update_bus(&mut h, &[srst.srst]);
                }
                None => update_bool(&mut h, false),
            }
            match &c.sr {
                Some(sr) => {
                    update_bool(&mut h, true);
                    update_bool(&mut h, sr.set_polarity);
                    update_bool(&mut h, sr.clr_polarity);
                    update_bus(&mut h, &sr.set);
                    update_bus(&mut h, &sr.clr);
                }
                None => update_bool(&mut h, false),
            }
            update_bus(&mut h, &c.d);
            update_usize(&mut h, c.q.len());
        }
        CellKind::Mem(c) => {
            // MEMID is an identity label, not a parameter that changes
            // behavior; two memories that agree on everything else hold the
            // same contents and may merge.
            update_str(&mut h, "mem");
            update_u32(&mut h, c.size);
            update_u32(&mut h, c.abits);
            update_u32(&mut h, c.width);
            h.update(&c.offset.to_le_bytes());
            update_lvs(&mut h, &c.init);
            update_usize(&mut h, c.read_ports.len());
            for rd in &c.read_ports {
                update_bool(&mut h, rd.clocked);
                update_bool(&mut h, rd.clk_polarity);
                update_bus(&mut h, &[rd.clk]);
                update_bus(&mut h, &[rd.en]);
                update_bus(&mut h, &rd.addr);
                update_bus(&mut h, &[rd.arst]);
                update_bus(&mut h, &[rd.srst]);
                update_lvs(&mut h, &rd.init_value);
                update_lvs(&mut h, &rd.arst_value);
                update_lvs(&mut h, &rd.srst_value);
                for flag in rd.transparency_mask.iter().chain(&rd.collision_x_mask) {
                    update_bool(&mut h, *flag);
                }
                update_bool(&mut h, rd.ce_over_srst);
                update_bool(&mut h, rd.wide_continuation);
                update_usize(&mut h, rd.data.len());
            }
            update_usize(&mut h, c.write_ports.len());
            for wr in &c.write_ports {
                update_bool(&mut h, wr.clocked);
                update_bool(&mut h, wr.clk_polarity);
                update_bus(&mut h, &[wr.clk]);
                update_bus(&mut h, &wr.en);
                update_bus(&mut h, &wr.addr);
                update_bus(&mut h, &wr.data);
                for flag in &wr.priority_mask {
                    update_bool(&mut h, *flag);
                }
                update_bool(&mut h, wr.wide_continuation);
            }
        }
        // Chain cells exist only after finalization, which is also when this
        // pass stops running; merging them would destabilize the fixed point
        // on a re-run (two differently-shaped chains can coalesce to equal
        // n-ary cells).
        CellKind::Chain(_) => return None,
        CellKind::Print(_) | CellKind::Unknown(_) => return None,
    }
    Some(h.finalize())
}

pub fn opt_merge(n: &mut Netlist) -> bool {
    let mut representatives: AHashMap<blake3::Hash, CellId> = AHashMap::new();
    let mut victims: Vec<(CellId, CellId)> = Vec::new();

    for cell in n.iter() {
        let Some(key) = cell_key(cell) else {
            continue;
        };
        match representatives.get(&key) {
            Some(rep) => victims.push((cell.id, *rep)),
            None => {
                representatives.insert(key, cell.id);
            }
        }
    }
    if victims.is_empty() {
        return false;
    }

    let mut subst = SubstitutionMap::new();
    for (victim, rep) in &victims {
        let victim_outs = n.get(*victim).output_nets();
        let rep_outs = n.get(*rep).output_nets();
        assert_eq!(
            victim_outs.len(),
            rep_outs.len(),
            "merge: {} and {} share a key but differ in output arity",
            victim,
            rep
        );
        for (from, to) in victim_outs.iter().zip(rep_outs.iter()) {
            subst.add(*from, BitRef::Net(*to));
        }
    }
    n.apply_substitution(&subst);
    for (victim, rep) in &victims {
        let removed = n.remove_cell(*victim);
        log::trace!(
            "opt_merge: module {}: merged {} ({}) into {}",
            n.name,
            victim,
            removed.name,
            rep
        );
    }
    log::debug!(
        "opt_merge: module {}: merged {} cells",
        n.name,
        victims.len()
    );
    true
}
