// SPDX-License-Identifier: Apache-2.0

//! The fixed-point optimizer driver.
//!
//! One round is Const, Clean, Merge, Transform, in that fixed order: folding
//! creates dead code for Clean, folding and cleaning increase structural
//! collisions for Merge, and Transform's canonicalized shapes feed the next
//! round's Const and Merge. The driver loops while any pass reports a change,
//! then runs chain finalization exactly once.
//!
//! Whether this pass order is confluent is an accepted open question; the
//! fixed order above is the contract, not an optimization hint. Termination
//! does not rely on confluence: every changed round strictly decreases an
//! explicit potential (live cell count plus remaining transform budget),
//! which is tracked and checked, and a round ceiling turns a violation of
//! that argument into a diagnostic instead of a hang.

pub mod opt_chain;
pub mod opt_clean;
pub mod opt_const;
pub mod opt_merge;
pub mod opt_transform;

pub use opt_chain::opt_chain;
pub use opt_clean::opt_clean;
pub use opt_const::opt_const;
pub use opt_merge::opt_merge;
pub use opt_transform::{TransformBudget, opt_transform};

use crate::ir::Netlist;
use crate::ir_validate;

/// Ceiling on optimization rounds; reaching it is diagnosed as a defect in
/// the rewrite catalogue rather than looping forever.
pub const MAX_ROUNDS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DriverState {
    Iterating,
    Finalized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptStats {
    pub rounds: usize,
    pub cells_before: usize,
    pub cells_after: usize,
    pub hit_round_ceiling: bool,
}

fn debug_validate(n: &Netlist, context: &str) {
    if cfg!(debug_assertions) {
        ir_validate::assert_valid(n, context);
    }
}

/// Optimizes the module in place to a fixed point, then finalizes chains.
/// Returns only once finalized; the input collection is the output artifact.
pub fn optimize(n: &mut Netlist) -> OptStats {
    ir_validate::assert_valid(n, "optimize entry");
    let cells_before = n.cell_count();
    let mut budget = TransformBudget::new(n);
    let mut state = DriverState::Iterating;
    let mut rounds = 0usize;
    let mut hit_round_ceiling = false;

    while state == DriverState::Iterating {
        if rounds >= MAX_ROUNDS {
            log::error!(
                "optimize: module {}: no fixed point after {} rounds; finalizing anyway",
                n.name,
                MAX_ROUNDS
            );
            hit_round_ceiling = true;
            state = DriverState::Finalized;
            break;
        }
        let potential_before = n.cell_count() + budget.total_remaining();
        let mut changed = false;
        changed |= opt_const(n);
        debug_validate(n, "opt_const");
        changed |= opt_clean(n);
        debug_validate(n, "opt_clean");
        changed |= opt_merge(n);
        debug_validate(n, "opt_merge");
        changed |= opt_transform(n, &mut budget);
        debug_validate(n, "opt_transform");
        rounds += 1;
        log::debug!(
            "optimize: module {}: round {}: {} cells, changed={}",
            n.name,
            rounds,
            n.cell_count(),
            changed
        );
        if changed {
            let potential_after = n.cell_count() + budget.total_remaining();
            debug_assert!(
                potential_after < potential_before,
                "optimize: module {}: round {} reported change without decreasing \
                 potential ({} -> {})",
                n.name,
                rounds,
                potential_before,
                potential_after
            );
        } else {
            state = DriverState::Finalized;
        }
    }

    opt_chain(n);
    ir_validate::assert_valid(n, "opt_chain");

    let stats = OptStats {
        rounds,
        cells_before,
        cells_after: n.cell_count(),
        hit_round_ceiling,
    };
    log::info!(
        "optimize: module {}: {} -> {} cells in {} rounds",
        n.name,
        stats.cells_before,
        stats.cells_after,
        stats.rounds
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::NetlistBuilder;
    use crate::ir::{BinaryOp, BitRef, CellKind, UnaryOp};
    use crate::logic::Lv;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_converged_input_takes_one_round() {
        let mut b = NetlistBuilder::new("t");
        let a = b.add_input("a", 1);
        let c = b.add_input("b", 1);
        let y = b.binary(BinaryOp::And, a, c, 1);
        b.add_output("y", y);
        let mut n = b.finish();
        let stats = optimize(&mut n);
        assert_eq!(stats.rounds, 1);
        assert_eq!(stats.cells_after, 1);
        assert!(!stats.hit_round_ceiling);
    }

    #[test]
    fn test_fold_then_clean_then_merge_compose() {
        let mut b = NetlistBuilder::new("t");
        let x = b.add_input("x", 1);
        // Two structurally-equal ands appear only after the muxes
        // short-circuit, exercising cross-pass iteration.
        let s0 = b.mux(x.clone(), vec![BitRef::Const(Lv::Zero)], BitRef::Const(Lv::Zero));
        let s1 = b.mux(x.clone(), vec![BitRef::Const(Lv::One)], BitRef::Const(Lv::Zero));
        let a0 = b.binary(BinaryOp::And, s0, x.clone(), 1);
        let a1 = b.binary(BinaryOp::And, x.clone(), s1, 1);
        b.add_output("y0", a0);
        b.add_output("y1", a1);
        let mut n = b.finish();
        let stats = optimize(&mut n);
        // One and survives; the muxes fold away and the swapped-operand and
        // merges into it.
        assert_eq!(stats.cells_after, 1);
        assert!(matches!(
            n.iter().next().unwrap().kind,
            CellKind::Binary(_)
        ));
        assert_eq!(
            n.find_port("y0").unwrap().bits,
            n.find_port("y1").unwrap().bits
        );
    }

    #[test]
    fn test_optimize_is_idempotent() {
        let mut b = NetlistBuilder::new("t");
        let a = b.add_input("a", 3);
        let c = b.add_input("b", 3);
        let d = b.add_input("c", 3);
        let s1 = b.binary(BinaryOp::Add, a.clone(), c, 3);
        let s2 = b.binary(BinaryOp::Add, s1, d, 3);
        let inv1 = b.unary(UnaryOp::Not, a.clone(), 3);
        let inv2 = b.unary(UnaryOp::Not, inv1, 3);
        b.add_output("sum", s2);
        b.add_output("back", inv2);
        let mut n = b.finish();
        let first = optimize(&mut n);
        assert!(first.rounds > 1);
        let snapshot: Vec<_> = n.iter().cloned().collect();
        let second = optimize(&mut n);
        // A single no-op round, no structural change, chain pass finds
        // nothing new.
        assert_eq!(second.rounds, 1);
        assert_eq!(second.cells_before, second.cells_after);
        let after: Vec<_> = n.iter().cloned().collect();
        assert_eq!(snapshot, after);
    }
}
