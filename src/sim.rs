// SPDX-License-Identifier: Apache-2.0

//! Combinational four-valued interpreter.
//!
//! This exists for the test suite: it lets equivalence properties compare a
//! netlist before and after optimization, including undefined-value
//! propagation. Sequential and unknown cells evaluate to undefined outputs
//! (one combinational snapshot, no state), so it is not a general simulator.

use std::collections::BTreeMap;

use ahash::AHashMap;

use crate::eval;
use crate::ir::{BitRef, CellId, CellKind, NetId, Netlist, PortDirection};
use crate::ir_validate;
use crate::logic::Lv;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimResult {
    /// Output/inout port values, LSB-first.
    pub ports: BTreeMap<String, Vec<Lv>>,
    /// Evaluated argument values of each `$print` observation sink.
    pub sinks: BTreeMap<CellId, Vec<Lv>>,
}

fn read_bit(env: &AHashMap<NetId, Lv>, r: &BitRef) -> Lv {
    match r {
        BitRef::Const(lv) => *lv,
        BitRef::Net(n) => env.get(n).copied().unwrap_or(Lv::X),
    }
}

fn read_bus(env: &AHashMap<NetId, Lv>, bits: &[BitRef]) -> Vec<Lv> {
    bits.iter().map(|r| read_bit(env, r)).collect()
}

/// Evaluates one combinational snapshot of `n` with the given input port
/// assignments (missing ports and bits read as undefined).
pub fn eval_netlist(n: &Netlist, inputs: &BTreeMap<String, Vec<Lv>>) -> SimResult {
    let order = match ir_validate::combinational_topo_order(n) {
        Ok(order) => order,
        Err(stuck) => panic!(
            "eval_netlist: module {} has a combinational cycle through {} cells",
            n.name,
            stuck.len()
        ),
    };

    let mut env: AHashMap<NetId, Lv> = AHashMap::new();
    for port in &n.ports {
        if port.direction == PortDirection::Output {
            continue;
        }
        let values = inputs.get(&port.name);
        for (i, bit) in port.bits.iter().enumerate() {
            if let Some(net) = bit.as_net() {
                let value = values
                    .and_then(|v| v.get(i).copied())
                    .unwrap_or(Lv::X);
                env.insert(net, value);
            }
        }
    }

    for id in order {
        let cell = n.get(id);
        match &cell.kind {
            CellKind::Unary(c) => {
                let a = read_bus(&env, &c.a);
                let y = eval::eval_unary(c.op, &a, c.a_signed, c.y.len());
                for (net, value) in c.y.iter().zip(y) {
                    env.insert(*net, value);
                }
            }
            CellKind::Binary(c) => {
                let a = read_bus(&env, &c.a);
                let b = read_bus(&env, &c.b);
                let y = eval::eval_binary(c.op, &a, c.a_signed, &b, c.b_signed, c.y.len());
                for (net, value) in c.y.iter().zip(y) {
                    env.insert(*net, value);
                }
            }
            CellKind::Mux(c) => {
                let a = read_bus(&env, &c.a);
                let b = read_bus(&env, &c.b);
                let y = eval::eval_mux(&a, &b, read_bit(&env, &c.s));
                for (net, value) in c.y.iter().zip(y) {
                    env.insert(*net, value);
                }
            }
            CellKind::Pmux(c) => {
                let a = read_bus(&env, &c.a);
                let b = read_bus(&env, &c.b);
                let s = read_bus(&env, &c.s);
                let y = eval::eval_pmux(&a, &b, &s);
                for (net, value) in c.y.iter().zip(y) {
                    env.insert(*net, value);
                }
            }
            CellKind::Chain(c) => {
                let mut acc = read_bus(&env, &c.operands[0]);
                for operand in &c.operands[1..] {
                    let rhs = read_bus(&env, operand);
                    acc = eval::eval_binary(c.op, &acc, c.signed, &rhs, c.signed, c.y.len());
                }
                for (net, value) in c.y.iter().zip(acc) {
                    env.insert(*net, value);
                }
            }
            // Sequential and unknown cells produce undefined snapshot values;
            // they are not in the topo order, so handled below.
            _ => unreachable!("non-combinational cell in topo order"),
        }
    }

    let mut ports = BTreeMap::new();
    for port in &n.ports {
        if port.direction == PortDirection::Input {
            continue;
        }
        ports.insert(port.name.clone(), read_bus(&env, &port.bits));
    }
    let mut sinks = BTreeMap::new();
    for cell in n.iter() {
        if let CellKind::Print(p) = &cell.kind {
            sinks.insert(cell.id, read_bus(&env, &p.args));
        }
    }
    SimResult { ports, sinks }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::NetlistBuilder;
    use crate::ir::{BinaryOp, UnaryOp};
    use crate::logic;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_eval_add_then_not() {
        let mut b = NetlistBuilder::new("t");
        let a = b.add_input("a", 3);
        let c = b.add_input("b", 3);
        let sum = b.binary(BinaryOp::Add, a, c, 3);
        let inv = b.unary(UnaryOp::Not, sum, 3);
        b.add_output("y", inv);
        let n = b.finish();

        let mut inputs = BTreeMap::new();
        inputs.insert("a".to_string(), logic::from_value(2, 3));
        inputs.insert("b".to_string(), logic::from_value(1, 3));
        let result = eval_netlist(&n, &inputs);
        // not(2 + 1) = not(011) = 100.
        assert_eq!(result.ports["y"], logic::from_value(4, 3));
    }

    #[test]
    fn test_missing_input_reads_undefined() {
        let mut b = NetlistBuilder::new("t");
        let a = b.add_input("a", 1);
        let c = b.add_input("b", 1);
        let y = b.binary(BinaryOp::And, a, c, 1);
        b.add_output("y", y);
        let n = b.finish();

        let mut inputs = BTreeMap::new();
        inputs.insert("a".to_string(), vec![Lv::Zero]);
        let result = eval_netlist(&n, &inputs);
        // and(0, x) = 0.
        assert_eq!(result.ports["y"], vec![Lv::Zero]);
    }

    #[test]
    fn test_sequential_outputs_are_undefined() {
        let mut b = NetlistBuilder::new("t");
        let clk = b.add_input("clk", 1);
        let d = b.add_input("d", 2);
        let q = b.dff(clk[0], d);
        b.add_output("q", q);
        let n = b.finish();
        let result = eval_netlist(&n, &BTreeMap::new());
        assert_eq!(result.ports["q"], vec![Lv::X, Lv::X]);
    }

    #[test]
    fn test_print_sink_values_collected() {
        let mut b = NetlistBuilder::new("t");
        let a = b.add_input("a", 2);
        let inv = b.unary(UnaryOp::Not, a, 2);
        let sink = b.print(inv);
        let n = b.finish();
        let mut inputs = BTreeMap::new();
        inputs.insert("a".to_string(), logic::from_value(1, 2));
        let result = eval_netlist(&n, &inputs);
        assert_eq!(result.sinks[&sink], logic::from_value(2, 2));
    }
}
