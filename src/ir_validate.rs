// SPDX-License-Identifier: Apache-2.0

//! Defensive checks for the IR invariants: referential integrity and
//! combinational acyclicity. Violations are defects in the ingested netlist
//! or in a prior pass, never tolerated silently.

use std::collections::VecDeque;

use ahash::AHashMap;

use crate::connectivity::{self, Producer};
use crate::ir::{CellId, Netlist, PortDirection};

/// Every non-constant bit reference must resolve to a producing cell output
/// or module input port bit, and every net must be driven exactly once.
pub fn check_referential_integrity(n: &Netlist) -> Result<(), String> {
    let producers = connectivity::try_producer_index(n)?;
    for cell in n.iter() {
        let mut missing = None;
        cell.for_each_input(|r| {
            if missing.is_some() {
                return;
            }
            if let Some(net) = r.as_net() {
                if !producers.contains_key(&net) {
                    missing = Some(net);
                }
            }
        });
        if let Some(net) = missing {
            return Err(format!(
                "dangling reference: cell {} ({}) reads undriven net {}",
                cell.id, cell.name, net
            ));
        }
    }
    for port in &n.ports {
        if port.direction == PortDirection::Input {
            continue;
        }
        for (bit_idx, bit) in port.bits.iter().enumerate() {
            if let Some(net) = bit.as_net() {
                if !producers.contains_key(&net) {
                    return Err(format!(
                        "dangling reference: output port {}[{}] reads undriven net {}",
                        port.name, bit_idx, net
                    ));
                }
            }
        }
    }
    Ok(())
}

/// Kahn's algorithm over the combinational subgraph. Returns a topological
/// order of the combinational cells, or the cells stuck on a cycle. Clocked
/// and latch cells break paths, so a legal cycle never appears here.
pub fn combinational_topo_order(n: &Netlist) -> Result<Vec<CellId>, Vec<CellId>> {
    let producers = connectivity::producer_index(n);
    let comb: Vec<CellId> = n
        .iter()
        .filter(|c| c.is_combinational())
        .map(|c| c.id)
        .collect();
    let mut indegree: AHashMap<CellId, usize> = comb.iter().map(|id| (*id, 0)).collect();
    let mut dependents: AHashMap<CellId, Vec<CellId>> = AHashMap::new();
    for id in &comb {
        n.get(*id).for_each_input(|r| {
            if let Some(net) = r.as_net() {
                if let Some(Producer::Cell(p)) = producers.get(&net) {
                    if indegree.contains_key(p) {
                        *indegree.get_mut(id).unwrap() += 1;
                        dependents.entry(*p).or_default().push(*id);
                    }
                }
            }
        });
    }
    let mut queue: VecDeque<CellId> = comb
        .iter()
        .filter(|id| indegree[*id] == 0)
        .copied()
        .collect();
    let mut order = Vec::with_capacity(comb.len());
    while let Some(id) = queue.pop_front() {
        order.push(id);
        if let Some(deps) = dependents.get(&id) {
            for dep in deps.clone() {
                let entry = indegree.get_mut(&dep).unwrap();
                *entry -= 1;
                if *entry == 0 {
                    queue.push_back(dep);
                }
            }
        }
    }
    if order.len() != comb.len() {
        let stuck: Vec<CellId> = comb
            .into_iter()
            .filter(|id| !order.contains(id))
            .collect();
        Err(stuck)
    } else {
        Ok(order)
    }
}

/// Panics with entity-identifying diagnostics if either invariant is broken.
/// `context` names the pass that just ran.
pub fn assert_valid(n: &Netlist, context: &str) {
    if let Err(msg) = check_referential_integrity(n) {
        log::error!("[{}] module {}: {}", context, n.name, msg);
        panic!("[{}] module {}: {}", context, n.name, msg);
    }
    if let Err(stuck) = combinational_topo_order(n) {
        for id in &stuck {
            log::error!(
                "[{}] module {}: cell {} ({}) is on a combinational cycle",
                context,
                n.name,
                id,
                n.get(*id).name
            );
        }
        panic!(
            "[{}] module {}: combinational cycle through {} cells (see logs)",
            context,
            n.name,
            stuck.len()
        );
    }
}
