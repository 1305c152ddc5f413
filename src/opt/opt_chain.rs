// SPDX-License-Identifier: Apache-2.0

//! Chain finalization: coalesces maximal runs of same-kind associative binary
//! cells connected output-to-input with single-consumer fan-out into one
//! n-ary chain cell per run, leaf operands listed left-to-right.
//!
//! Runs exactly once, after the fixed point: coalescing earlier would hide
//! pairwise structural duplication from the merge pass. This is the only pass
//! that creates cells.

use ahash::AHashMap;

use crate::connectivity::{self, Consumer, Producer};
use crate::ir::{BinaryCell, CellId, CellKind, ChainCell, NetId, Netlist};

/// Interior links must agree on operand and output widths (bitwise and
/// arithmetic chains stay width-uniform; logic chains are single-bit at every
/// link, with operand buses free).
fn link_widths_ok(child: &BinaryCell, parent: &BinaryCell) -> bool {
    if child.op.is_logic() {
        child.y.len() == 1
    } else {
        let w = child.y.len();
        child.a.len() == w
            && child.b.len() == w
            && parent.a.len() == w
            && parent.b.len() == w
            && parent.y.len() == w
    }
}

fn as_chainable_binary(n: &Netlist, id: CellId) -> Option<&BinaryCell> {
    match &n.try_get(id)?.kind {
        CellKind::Binary(c) if c.op.is_chainable() => Some(c),
        _ => None,
    }
}

/// The parent this cell's whole output bus feeds, when that parent is a
/// same-kind chainable binary cell, consumes the bus as exactly one operand,
/// and is the bus's only consumer.
fn absorb_parent(
    n: &Netlist,
    consumers: &AHashMap<NetId, Vec<Consumer>>,
    id: CellId,
) -> Option<CellId> {
    let child = as_chainable_binary(n, id)?;
    let first = child.y.first()?;
    let users = consumers.get(first)?;
    let [Consumer::Cell(parent_id)] = users.as_slice() else {
        return None;
    };
    let parent_id = *parent_id;
    if parent_id == id {
        return None;
    }
    let parent = as_chainable_binary(n, parent_id)?;
    if parent.op != child.op || !link_widths_ok(child, parent) {
        return None;
    }
    let feeds_side = |side: &[crate::ir::BitRef]| {
        side.len() == child.y.len()
            && side
                .iter()
                .zip(child.y.iter())
                .all(|(bit, net)| bit.as_net() == Some(*net))
    };
    if !feeds_side(&parent.a) && !feeds_side(&parent.b) {
        return None;
    }
    // Every output bit must have that single consumer.
    for net in &child.y {
        let sole = matches!(
            consumers.get(net).map(|u| u.as_slice()),
            Some([Consumer::Cell(p)]) if *p == parent_id
        );
        if !sole {
            return None;
        }
    }
    Some(parent_id)
}

/// Walks from the root down to the leaves, A side first, collecting leaf
/// operand buses and the interior cells absorbed along the way.
fn gather_leaves(
    n: &Netlist,
    producers: &AHashMap<NetId, Producer>,
    consumers: &AHashMap<NetId, Vec<Consumer>>,
    id: CellId,
    leaves: &mut Vec<Vec<crate::ir::BitRef>>,
    absorbed: &mut Vec<CellId>,
) {
    let cell = as_chainable_binary(n, id).expect("gather_leaves on non-chainable cell");
    for side in [&cell.a, &cell.b] {
        let child = side
            .first()
            .and_then(|bit| bit.as_net())
            .and_then(|net| producers.get(&net))
            .and_then(|p| match p {
                Producer::Cell(c) => Some(*c),
                Producer::Port { .. } => None,
            })
            .filter(|child_id| absorb_parent(n, consumers, *child_id) == Some(id));
        match child {
            Some(child_id) => {
                absorbed.push(child_id);
                gather_leaves(n, producers, consumers, child_id, leaves, absorbed);
            }
            None => leaves.push(side.clone()),
        }
    }
}

pub fn opt_chain(n: &mut Netlist) {
    let producers = connectivity::producer_index(n);
    let consumers = connectivity::consumer_index(n);
    let mut chains = 0usize;

    for id in n.ids() {
        if as_chainable_binary(n, id).is_none() {
            // May have been absorbed into an earlier chain, or was never a
            // chain candidate.
            continue;
        }
        if absorb_parent(n, &consumers, id).is_some() {
            // Interior cell; its root will pick it up.
            continue;
        }
        let mut leaves = Vec::new();
        let mut absorbed = Vec::new();
        gather_leaves(n, &producers, &consumers, id, &mut leaves, &mut absorbed);
        if absorbed.is_empty() {
            continue;
        }
        let root = n.remove_cell(id);
        let CellKind::Binary(root_bin) = root.kind else {
            unreachable!();
        };
        for interior in &absorbed {
            n.remove_cell(*interior);
        }
        let op = root_bin.op;
        let name = format!("$chain${}", n.next_id());
        n.add_cell(
            name,
            CellKind::Chain(ChainCell {
                op,
                signed: root_bin.a_signed,
                operands: leaves,
                y: root_bin.y,
            }),
            root.attrs,
        );
        chains += 1;
    }
    if chains > 0 {
        log::debug!(
            "opt_chain: module {}: coalesced {} chains",
            n.name,
            chains
        );
    }
}
