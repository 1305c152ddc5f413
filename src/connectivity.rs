// SPDX-License-Identifier: Apache-2.0

//! Producer and consumer indexes over a netlist's bit-reference graph.
//!
//! These are rebuilt once per pass invocation rather than maintained per
//! mutation; merges and deletions rewrite many-to-one backward references, so
//! incremental upkeep would cost more than it saves.

use ahash::AHashMap;

use crate::ir::{CellId, NetId, Netlist, PortDirection};

/// Who drives a net: a cell output bit or a module input/inout port bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Producer {
    Cell(CellId),
    Port { port: usize, bit: usize },
}

/// Who reads a net: a cell input or an output/inout port bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consumer {
    Cell(CellId),
    Port(usize),
}

/// Builds the net -> producer map, reporting the first double-driven net.
pub fn try_producer_index(n: &Netlist) -> Result<AHashMap<NetId, Producer>, String> {
    let mut index = AHashMap::new();
    for (port_idx, port) in n.ports.iter().enumerate() {
        if port.direction == PortDirection::Output {
            continue;
        }
        for (bit_idx, bit) in port.bits.iter().enumerate() {
            if let Some(net) = bit.as_net() {
                if let Some(prev) = index.insert(
                    net,
                    Producer::Port {
                        port: port_idx,
                        bit: bit_idx,
                    },
                ) {
                    return Err(format!(
                        "net {} driven by both {:?} and input port {}[{}]",
                        net, prev, port.name, bit_idx
                    ));
                }
            }
        }
    }
    for cell in n.iter() {
        let mut duplicate = None;
        cell.for_each_output(|net| {
            if duplicate.is_some() {
                return;
            }
            if let Some(prev) = index.insert(net, Producer::Cell(cell.id)) {
                duplicate = Some((net, prev));
            }
        });
        if let Some((net, prev)) = duplicate {
            return Err(format!(
                "net {} driven by both {:?} and cell {} ({})",
                net, prev, cell.id, cell.name
            ));
        }
    }
    Ok(index)
}

/// As `try_producer_index`, but a double-driven net is a defect.
pub fn producer_index(n: &Netlist) -> AHashMap<NetId, Producer> {
    match try_producer_index(n) {
        Ok(index) => index,
        Err(msg) => {
            log::error!("module {}: {}", n.name, msg);
            panic!("module {}: {}", n.name, msg);
        }
    }
}

/// Builds the net -> consumers map. A cell referencing the same net twice
/// contributes two entries, so `len()` of an entry is the net's fan-out.
pub fn consumer_index(n: &Netlist) -> AHashMap<NetId, Vec<Consumer>> {
    let mut index: AHashMap<NetId, Vec<Consumer>> = AHashMap::new();
    for cell in n.iter() {
        cell.for_each_input(|r| {
            if let Some(net) = r.as_net() {
                index.entry(net).or_default().push(Consumer::Cell(cell.id));
            }
        });
    }
    for (port_idx, port) in n.ports.iter().enumerate() {
        if port.direction == PortDirection::Input {
            continue;
        }
        for bit in &port.bits {
            if let Some(net) = bit.as_net() {
                index.entry(net).or_default().push(Consumer::Port(port_idx));
            }
        }
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::NetlistBuilder;
    use crate::ir::BinaryOp;

    #[test]
    fn test_producer_and_consumer_index() {
        let mut b = NetlistBuilder::new("t");
        let a = b.add_input("a", 2);
        let c = b.add_input("b", 2);
        let y = b.binary(BinaryOp::And, a.clone(), c, 2);
        b.add_output("y", y.clone());
        let n = b.finish();

        let producers = producer_index(&n);
        let and_id = n.iter().next().unwrap().id;
        assert_eq!(
            producers.get(&y[0].as_net().unwrap()),
            Some(&Producer::Cell(and_id))
        );
        assert!(matches!(
            producers.get(&a[0].as_net().unwrap()),
            Some(Producer::Port { .. })
        ));

        let consumers = consumer_index(&n);
        // Each and-output net is read by exactly the output port.
        for bit in &y {
            let users = &consumers[&bit.as_net().unwrap()];
            assert_eq!(users.len(), 1);
            assert!(matches!(users[0], Consumer::Port(_)));
        }
        // Each input net is read by exactly the and cell.
        for bit in &a {
            let users = &consumers[&bit.as_net().unwrap()];
            assert_eq!(users, &vec![Consumer::Cell(and_id)]);
        }
    }
}
