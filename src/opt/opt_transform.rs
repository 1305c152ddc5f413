// SPDX-License-Identifier: Apache-2.0

//! Algebraic transform: a fixed catalogue of peephole rewrites, each locally
//! checked and applied independently. Every rewrite preserves bit-exact
//! behavior including undefined-value propagation, and none creates cells
//! (chain finalization is the only pass allowed to do that).
//!
//! Termination is not argued from the catalogue shape; it is enforced by an
//! explicit per-cell rewrite budget owned by the driver. Each applied rewrite
//! charges the rewritten cell, and an exhausted cell is skipped with a
//! diagnostic.

use ahash::AHashMap;

use crate::connectivity::{self, Producer};
use crate::ir::{
    BinaryOp, BitRef, CellId, CellKind, NetId, Netlist, UnaryOp,
};
use crate::logic::{self, Lv};
use crate::subst::SubstitutionMap;

/// How many transform rewrites one cell may receive over a whole run. High
/// enough for any cascade the catalogue can produce on a cell, low enough to
/// bound a buggy catalogue.
const PER_CELL_BUDGET: u32 = 16;

#[derive(Debug)]
pub struct TransformBudget {
    remaining: AHashMap<CellId, u32>,
    exhausted_reported: bool,
}

impl TransformBudget {
    pub fn new(n: &Netlist) -> Self {
        Self {
            remaining: n.iter().map(|c| (c.id, PER_CELL_BUDGET)).collect(),
            exhausted_reported: false,
        }
    }

    /// True when `id` may not be rewritten any further; diagnoses once.
    fn is_exhausted(&mut self, id: CellId, module: &str) -> bool {
        let slot = self.remaining.entry(id).or_insert(PER_CELL_BUDGET);
        if *slot > 0 {
            return false;
        }
        if !self.exhausted_reported {
            log::error!(
                "opt_transform: module {}: rewrite budget exhausted on {}; \
                 the catalogue is not converging on this cell",
                module,
                id
            );
            self.exhausted_reported = true;
        }
        true
    }

    /// Charges one applied rewrite against `id`.
    fn charge(&mut self, id: CellId) {
        let slot = self.remaining.get_mut(&id).expect("charge after is_exhausted");
        assert!(*slot > 0, "charge on exhausted cell {}", id);
        *slot -= 1;
    }

    pub fn total_remaining(&self) -> usize {
        self.remaining.values().map(|v| *v as usize).sum()
    }
}

/// The producing unary cell of a bus, when every bit comes from the same cell
/// in output order with no extension on either side.
fn exact_unary_producer<'a>(
    n: &'a Netlist,
    producers: &AHashMap<NetId, Producer>,
    bits: &[BitRef],
) -> Option<&'a crate::ir::UnaryCell> {
    let first = bits.first()?.as_net()?;
    let Producer::Cell(id) = producers.get(&first)? else {
        return None;
    };
    let CellKind::Unary(inner) = &n.try_get(*id)?.kind else {
        return None;
    };
    if inner.y.len() != bits.len() || inner.a.len() != inner.y.len() {
        return None;
    }
    let matches = bits
        .iter()
        .zip(inner.y.iter())
        .all(|(bit, net)| bit.as_net() == Some(*net));
    if matches { Some(inner) } else { None }
}

/// `not(not(x)) -> x`, positionally, with no width change anywhere.
fn rule_double_negation(
    n: &Netlist,
    producers: &AHashMap<NetId, Producer>,
    id: CellId,
    subst: &mut SubstitutionMap,
) -> bool {
    let CellKind::Unary(outer) = &n.get(id).kind else {
        return false;
    };
    if outer.op != UnaryOp::Not || outer.a.len() != outer.y.len() {
        return false;
    }
    let Some(inner) = exact_unary_producer(n, producers, &outer.a) else {
        return false;
    };
    if inner.op != UnaryOp::Not {
        return false;
    }
    for (net, source) in outer.y.iter().zip(inner.a.iter()) {
        subst.add(*net, *source);
    }
    true
}

/// and/or/xor with a uniform constant operand at equal widths: identity
/// operands vanish, annihilator operands constant-fill the output.
fn rule_const_identity(n: &Netlist, id: CellId, subst: &mut SubstitutionMap) -> bool {
    let CellKind::Binary(c) = &n.get(id).kind else {
        return false;
    };
    if !matches!(c.op, BinaryOp::And | BinaryOp::Or | BinaryOp::Xor) {
        return false;
    }
    if c.a.len() != c.y.len() || c.b.len() != c.y.len() || c.y.is_empty() {
        return false;
    }
    let uniform = |bits: &[BitRef]| -> Option<Lv> {
        let lv = bits.first()?.as_const()?;
        if !lv.is_defined() {
            return None;
        }
        if bits.iter().all(|b| b.as_const() == Some(lv)) {
            Some(lv)
        } else {
            None
        }
    };
    let (const_lv, other) = match (uniform(&c.a), uniform(&c.b)) {
        (Some(lv), _) => (lv, &c.b),
        (_, Some(lv)) => (lv, &c.a),
        _ => return false,
    };
    enum Outcome {
        Other,
        Fill(Lv),
    }
    let outcome = match (c.op, const_lv) {
        (BinaryOp::And, Lv::One) => Outcome::Other,
        (BinaryOp::And, Lv::Zero) => Outcome::Fill(Lv::Zero),
        (BinaryOp::Or, Lv::Zero) => Outcome::Other,
        (BinaryOp::Or, Lv::One) => Outcome::Fill(Lv::One),
        (BinaryOp::Xor, Lv::Zero) => Outcome::Other,
        _ => return false,
    };
    match outcome {
        Outcome::Other => {
            for (net, bit) in c.y.iter().zip(other.iter()) {
                subst.add(*net, *bit);
            }
        }
        Outcome::Fill(lv) => {
            for net in &c.y {
                subst.add(*net, BitRef::Const(lv));
            }
        }
    }
    true
}

/// `sub(a, const) -> add(a, -const)`: fewer operator kinds for the next
/// merge round. Constant operand only, since transform may not create cells.
fn rule_sub_to_add(n: &mut Netlist, id: CellId) -> bool {
    let CellKind::Binary(c) = &n.get(id).kind else {
        return false;
    };
    if c.op != BinaryOp::Sub || c.b.len() != c.y.len() {
        return false;
    }
    let Some(b) = crate::ir::const_bits(&c.b) else {
        return false;
    };
    let Some(negated) = logic::negate(&b) else {
        return false;
    };
    let CellKind::Binary(c) = &mut n.get_mut(id).kind else {
        unreachable!();
    };
    c.op = BinaryOp::Add;
    c.b = negated.into_iter().map(BitRef::Const).collect();
    true
}

/// Width narrowing where extension makes high output bits provably constant:
/// equal-width `pos` is the identity, zero-extending `pos` and zero-extended
/// bitwise ops pin their high bits and narrow the output bus.
fn rule_narrow(n: &mut Netlist, id: CellId, subst: &mut SubstitutionMap) -> bool {
    enum Action {
        Forward(Vec<(NetId, BitRef)>),
        Narrow { pinned: Vec<(NetId, BitRef)>, keep: usize },
    }
    let action = match &n.get(id).kind {
        CellKind::Unary(c) if c.op == UnaryOp::Pos && !c.a.is_empty() => {
            if c.a.len() == c.y.len() {
                Action::Forward(c.y.iter().copied().zip(c.a.iter().copied()).collect())
            } else if !c.a_signed && c.a.len() < c.y.len() {
                Action::Narrow {
                    pinned: c.y[c.a.len()..]
                        .iter()
                        .map(|net| (*net, BitRef::Const(Lv::Zero)))
                        .collect(),
                    keep: c.a.len(),
                }
            } else {
                return false;
            }
        }
        CellKind::Binary(c)
            if matches!(
                c.op,
                BinaryOp::And | BinaryOp::Or | BinaryOp::Xor | BinaryOp::Xnor
            ) && !c.a_signed
                && !c.b_signed
                && !c.a.is_empty()
                && !c.b.is_empty()
                && c.a.len().max(c.b.len()) < c.y.len() =>
        {
            let keep = c.a.len().max(c.b.len());
            let hi = if c.op == BinaryOp::Xnor { Lv::One } else { Lv::Zero };
            Action::Narrow {
                pinned: c.y[keep..]
                    .iter()
                    .map(|net| (*net, BitRef::Const(hi)))
                    .collect(),
                keep,
            }
        }
        _ => return false,
    };
    match action {
        Action::Forward(pairs) => {
            for (net, bit) in pairs {
                subst.add(net, bit);
            }
        }
        Action::Narrow { pinned, keep } => {
            for (net, bit) in pinned {
                subst.add(net, bit);
            }
            match &mut n.get_mut(id).kind {
                CellKind::Unary(c) => c.y.truncate(keep),
                CellKind::Binary(c) => c.y.truncate(keep),
                _ => unreachable!(),
            }
        }
    }
    true
}

/// A mux select driven by a one-bit inverter reads the inverter's source with
/// the data inputs swapped, maximizing merge hits on the next round.
fn rule_mux_select_invert(
    n: &mut Netlist,
    producers: &AHashMap<NetId, Producer>,
    id: CellId,
) -> bool {
    let CellKind::Mux(c) = &n.get(id).kind else {
        return false;
    };
    let Some(sel_net) = c.s.as_net() else {
        return false;
    };
    let Some(Producer::Cell(inv_id)) = producers.get(&sel_net) else {
        return false;
    };
    let Some(inv_cell) = n.try_get(*inv_id) else {
        return false;
    };
    let CellKind::Unary(inv) = &inv_cell.kind else {
        return false;
    };
    if !matches!(inv.op, UnaryOp::Not | UnaryOp::LogicNot) {
        return false;
    }
    if inv.a.len() != 1 || inv.y.len() != 1 || inv.y[0] != sel_net {
        return false;
    }
    let source = inv.a[0];
    let CellKind::Mux(c) = &mut n.get_mut(id).kind else {
        unreachable!();
    };
    c.s = source;
    std::mem::swap(&mut c.a, &mut c.b);
    true
}

pub fn opt_transform(n: &mut Netlist, budget: &mut TransformBudget) -> bool {
    let producers = connectivity::producer_index(n);
    let mut subst = SubstitutionMap::new();
    let mut applied = 0usize;

    for id in n.ids() {
        if budget.is_exhausted(id, &n.name) {
            continue;
        }
        let fired = rule_double_negation(n, &producers, id, &mut subst)
            || rule_const_identity(n, id, &mut subst)
            || rule_sub_to_add(n, id)
            || rule_narrow(n, id, &mut subst)
            || rule_mux_select_invert(n, &producers, id);
        if fired {
            budget.charge(id);
            applied += 1;
        }
    }

    if !subst.is_empty() {
        n.apply_substitution(&subst);
    }
    if applied > 0 {
        log::debug!(
            "opt_transform: module {}: applied {} rewrites",
            n.name,
            applied
        );
    }
    applied > 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::NetlistBuilder;
    use crate::opt::opt_clean::opt_clean;
    use pretty_assertions::assert_eq;

    fn run(n: &mut Netlist) -> bool {
        let mut budget = TransformBudget::new(n);
        opt_transform(n, &mut budget)
    }

    #[test]
    fn test_double_negation_forwards_source() {
        let mut b = NetlistBuilder::new("t");
        let a = b.add_input("a", 2);
        let inv1 = b.unary(UnaryOp::Not, a.clone(), 2);
        let inv2 = b.unary(UnaryOp::Not, inv1, 2);
        b.add_output("y", inv2);
        let mut n = b.finish();
        assert!(run(&mut n));
        assert_eq!(n.find_port("y").unwrap().bits, a);
        // Both inverters are now dead.
        assert!(opt_clean(&mut n));
        assert_eq!(n.cell_count(), 0);
    }

    #[test]
    fn test_and_with_all_ones_is_identity() {
        let mut b = NetlistBuilder::new("t");
        let a = b.add_input("a", 2);
        let ones = vec![BitRef::Const(Lv::One), BitRef::Const(Lv::One)];
        let y = b.binary(BinaryOp::And, a.clone(), ones, 2);
        b.add_output("y", y);
        let mut n = b.finish();
        assert!(run(&mut n));
        assert_eq!(n.find_port("y").unwrap().bits, a);
    }

    #[test]
    fn test_or_with_all_ones_annihilates() {
        let mut b = NetlistBuilder::new("t");
        let a = b.add_input("a", 2);
        let ones = vec![BitRef::Const(Lv::One), BitRef::Const(Lv::One)];
        let y = b.binary(BinaryOp::Or, ones, a, 2);
        b.add_output("y", y);
        let mut n = b.finish();
        assert!(run(&mut n));
        assert_eq!(
            n.find_port("y").unwrap().bits,
            vec![BitRef::Const(Lv::One), BitRef::Const(Lv::One)]
        );
    }

    #[test]
    fn test_mixed_constant_operand_is_not_identity() {
        let mut b = NetlistBuilder::new("t");
        let a = b.add_input("a", 2);
        let mixed = vec![BitRef::Const(Lv::One), BitRef::Const(Lv::Zero)];
        let y = b.binary(BinaryOp::And, a, mixed, 2);
        b.add_output("y", y.clone());
        let mut n = b.finish();
        assert!(!run(&mut n));
        assert_eq!(n.find_port("y").unwrap().bits, y);
    }

    #[test]
    fn test_sub_constant_becomes_add() {
        let mut b = NetlistBuilder::new("t");
        let a = b.add_input("a", 3);
        let y = b.binary(BinaryOp::Sub, a, b.constant(1, 3), 3);
        b.add_output("y", y);
        let mut n = b.finish();
        assert!(run(&mut n));
        let cell = n.iter().next().unwrap();
        let CellKind::Binary(bin) = &cell.kind else {
            panic!("expected binary cell");
        };
        assert_eq!(bin.op, BinaryOp::Add);
        // -1 in 3 bits.
        assert_eq!(
            bin.b,
            logic::from_value(-1, 3)
                .into_iter()
                .map(BitRef::Const)
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_equal_width_pos_is_identity() {
        let mut b = NetlistBuilder::new("t");
        let a = b.add_input("a", 2);
        let y = b.unary(UnaryOp::Pos, a.clone(), 2);
        b.add_output("y", y);
        let mut n = b.finish();
        assert!(run(&mut n));
        assert_eq!(n.find_port("y").unwrap().bits, a);
    }

    #[test]
    fn test_zero_extending_pos_narrows() {
        let mut b = NetlistBuilder::new("t");
        let a = b.add_input("a", 2);
        let y = b.unary(UnaryOp::Pos, a.clone(), 4);
        b.add_output("y", y);
        let mut n = b.finish();
        assert!(run(&mut n));
        let port = n.find_port("y").unwrap();
        assert_eq!(port.bits[2], BitRef::Const(Lv::Zero));
        assert_eq!(port.bits[3], BitRef::Const(Lv::Zero));
        let CellKind::Unary(u) = &n.iter().next().unwrap().kind else {
            panic!("expected unary cell");
        };
        assert_eq!(u.y.len(), 2);
        // A second invocation finishes the job via the identity rule.
        assert!(run(&mut n));
        assert_eq!(n.find_port("y").unwrap().bits[..2], a[..]);
    }

    #[test]
    fn test_zero_extended_and_narrows() {
        let mut b = NetlistBuilder::new("t");
        let a = b.add_input("a", 2);
        let c = b.add_input("b", 2);
        let y = b.binary(BinaryOp::And, a, c, 4);
        b.add_output("y", y);
        let mut n = b.finish();
        assert!(run(&mut n));
        let port = n.find_port("y").unwrap();
        assert_eq!(port.bits[2], BitRef::Const(Lv::Zero));
        assert_eq!(port.bits[3], BitRef::Const(Lv::Zero));
    }

    #[test]
    fn test_mux_select_inverter_swaps_inputs() {
        let mut b = NetlistBuilder::new("t");
        let s = b.add_input("s", 1);
        let a = b.add_input("a", 1);
        let c = b.add_input("b", 1);
        let ns = b.unary(UnaryOp::Not, s.clone(), 1);
        let y = b.mux(a.clone(), c.clone(), ns[0]);
        b.add_output("y", y);
        let mut n = b.finish();
        assert!(run(&mut n));
        let mux = n
            .iter()
            .find(|cell| matches!(cell.kind, CellKind::Mux(_)))
            .unwrap();
        let CellKind::Mux(m) = &mux.kind else {
            unreachable!();
        };
        assert_eq!(m.s, s[0]);
        assert_eq!(m.a, c);
        assert_eq!(m.b, a);
    }

    #[test]
    fn test_budget_stops_a_cell() {
        let mut b = NetlistBuilder::new("t");
        let a = b.add_input("a", 2);
        let y = b.unary(UnaryOp::Pos, a, 2);
        b.add_output("y", y);
        let mut n = b.finish();
        let mut budget = TransformBudget::new(&n);
        // Drain the cell's budget by hand.
        let id = n.ids()[0];
        for _ in 0..PER_CELL_BUDGET {
            assert!(!budget.is_exhausted(id, "t"));
            budget.charge(id);
        }
        assert!(!opt_transform(&mut n, &mut budget));
    }
}
