// SPDX-License-Identifier: Apache-2.0

//! Dead-code elimination: iterative mark-and-sweep backward from the always-
//! live sinks (module output/inout ports, `$print` cells, unknown cells).
//!
//! Runs to a local fixed point by construction: marking propagates along
//! input references until no new producer is reached, then everything
//! unmarked is deleted in one sweep.

use bitvec::bitvec;

use crate::connectivity::{self, Producer};
use crate::ir::{CellId, Netlist, PortDirection};

pub fn opt_clean(n: &mut Netlist) -> bool {
    let producers = connectivity::producer_index(n);
    let mut live = bitvec![0; n.id_bound()];
    let mut worklist: Vec<CellId> = Vec::new();

    let mark = |id: CellId, live: &mut bitvec::vec::BitVec, worklist: &mut Vec<CellId>| {
        if !live[id.0 as usize] {
            live.set(id.0 as usize, true);
            worklist.push(id);
        }
    };

    for cell in n.iter() {
        if cell.is_sink() {
            mark(cell.id, &mut live, &mut worklist);
        }
    }
    for port in &n.ports {
        if port.direction == PortDirection::Input {
            continue;
        }
        for bit in &port.bits {
            if let Some(net) = bit.as_net() {
                if let Some(Producer::Cell(id)) = producers.get(&net) {
                    mark(*id, &mut live, &mut worklist);
                }
            }
        }
    }

    while let Some(id) = worklist.pop() {
        n.get(id).for_each_input(|r| {
            if let Some(net) = r.as_net() {
                if let Some(Producer::Cell(p)) = producers.get(&net) {
                    mark(*p, &mut live, &mut worklist);
                }
            }
        });
    }

    let mut removed = 0usize;
    for id in n.ids() {
        if !live[id.0 as usize] {
            let cell = n.remove_cell(id);
            log::trace!(
                "opt_clean: module {}: removing dead cell {} ({})",
                n.name,
                id,
                cell.name
            );
            removed += 1;
        }
    }
    if removed > 0 {
        log::debug!("opt_clean: module {}: removed {} dead cells", n.name, removed);
    }
    removed > 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::NetlistBuilder;
    use crate::ir::BinaryOp;

    #[test]
    fn test_unreferenced_cell_is_removed() {
        let mut b = NetlistBuilder::new("t");
        let a = b.add_input("a", 1);
        let c = b.add_input("b", 1);
        let _orphan = b.binary(BinaryOp::And, a.clone(), c.clone(), 1);
        let y = b.binary(BinaryOp::Or, a, c, 1);
        b.add_output("y", y);
        let mut n = b.finish();
        assert_eq!(n.cell_count(), 2);
        assert!(opt_clean(&mut n));
        assert_eq!(n.cell_count(), 1);
        assert!(matches!(
            n.iter().next().unwrap().kind,
            crate::ir::CellKind::Binary(crate::ir::BinaryCell {
                op: BinaryOp::Or,
                ..
            })
        ));
        assert!(!opt_clean(&mut n));
    }

    #[test]
    fn test_dead_chains_are_swept_transitively() {
        let mut b = NetlistBuilder::new("t");
        let a = b.add_input("a", 1);
        let c = b.add_input("b", 1);
        // x feeds only y; y feeds nothing. Both must go in one invocation.
        let x = b.binary(BinaryOp::And, a.clone(), c.clone(), 1);
        let _y = b.binary(BinaryOp::Or, x, c.clone(), 1);
        let kept = b.binary(BinaryOp::Xor, a, c, 1);
        b.add_output("y", kept);
        let mut n = b.finish();
        assert!(opt_clean(&mut n));
        assert_eq!(n.cell_count(), 1);
    }

    #[test]
    fn test_print_sink_and_its_cone_are_retained() {
        let mut b = NetlistBuilder::new("t");
        let a = b.add_input("a", 1);
        let c = b.add_input("b", 1);
        let x = b.binary(BinaryOp::And, a, c, 1);
        b.print(x);
        let mut n = b.finish();
        // No output ports at all; the print keeps its cone alive.
        assert!(!opt_clean(&mut n));
        assert_eq!(n.cell_count(), 2);
    }
}
