// SPDX-License-Identifier: Apache-2.0

//! Constant folding: evaluates combinational cells whose inputs are fully
//! constant and redirects every reference to their outputs at the computed
//! constants. Muxes with a constant select short-circuit to the selected data
//! bus instead, even when that bus is not constant.
//!
//! This pass only rewrites references; the folded cells become unreachable
//! and are deleted by the next clean pass, keeping graph surgery in one
//! place.

use crate::eval;
use crate::ir::{self, BitRef, CellKind, Netlist};
use crate::logic::{self, Lv};
use crate::subst::SubstitutionMap;

pub fn opt_const(n: &mut Netlist) -> bool {
    let mut subst = SubstitutionMap::new();
    let mut folded = 0usize;
    let mut short_circuited = 0usize;

    for cell in n.iter() {
        match &cell.kind {
            CellKind::Unary(c) => {
                let Some(a) = ir::const_bits(&c.a) else {
                    continue;
                };
                let Some(y) = eval::fold_unary(c.op, &a, c.a_signed, c.y.len()) else {
                    continue;
                };
                for (net, value) in c.y.iter().zip(y) {
                    subst.add(*net, BitRef::Const(value));
                }
                folded += 1;
            }
            CellKind::Binary(c) => {
                let (Some(a), Some(b)) = (ir::const_bits(&c.a), ir::const_bits(&c.b)) else {
                    continue;
                };
                let Some(y) =
                    eval::fold_binary(c.op, &a, c.a_signed, &b, c.b_signed, c.y.len())
                else {
                    continue;
                };
                for (net, value) in c.y.iter().zip(y) {
                    subst.add(*net, BitRef::Const(value));
                }
                folded += 1;
            }
            CellKind::Mux(c) => {
                // Selection short-circuit, not an arithmetic fold: the chosen
                // bus may be anything.
                let selected = match c.s.as_const().and_then(Lv::to_bool) {
                    Some(false) => &c.a,
                    Some(true) => &c.b,
                    None => continue,
                };
                for (net, bit) in c.y.iter().zip(selected.iter()) {
                    subst.add(*net, *bit);
                }
                short_circuited += 1;
            }
            CellKind::Pmux(c) => {
                let Some(s) = ir::const_bits(&c.s) else {
                    continue;
                };
                let width = c.a.len();
                if !logic::all_defined(&s) || c.b.len() < c.s.len() * width {
                    continue;
                }
                let hot: Vec<usize> = s
                    .iter()
                    .enumerate()
                    .filter(|(_, bit)| **bit == Lv::One)
                    .map(|(i, _)| i)
                    .collect();
                match hot.as_slice() {
                    [] => {
                        for (net, bit) in c.y.iter().zip(c.a.iter()) {
                            subst.add(*net, *bit);
                        }
                        short_circuited += 1;
                    }
                    [i] => {
                        let slice = &c.b[i * width..(i + 1) * width];
                        for (net, bit) in c.y.iter().zip(slice.iter()) {
                            subst.add(*net, *bit);
                        }
                        short_circuited += 1;
                    }
                    _ => {
                        for net in &c.y {
                            subst.add(*net, BitRef::Const(Lv::X));
                        }
                        folded += 1;
                    }
                }
            }
            CellKind::Chain(c) => {
                let operands: Option<Vec<Vec<Lv>>> =
                    c.operands.iter().map(|bus| ir::const_bits(bus)).collect();
                let Some(operands) = operands else {
                    continue;
                };
                let width = c.y.len();
                let mut acc = operands[0].clone();
                let mut ok = true;
                for rhs in &operands[1..] {
                    match eval::fold_binary(c.op, &acc, c.signed, rhs, c.signed, width) {
                        Some(next) => acc = next,
                        None => {
                            ok = false;
                            break;
                        }
                    }
                }
                if !ok {
                    continue;
                }
                for (net, value) in c.y.iter().zip(acc) {
                    subst.add(*net, BitRef::Const(value));
                }
                folded += 1;
            }
            _ => {}
        }
    }

    let changed = !subst.is_empty();
    if changed {
        log::debug!(
            "opt_const: module {}: folded {} cells, short-circuited {} muxes",
            n.name,
            folded,
            short_circuited
        );
        n.apply_substitution(&subst);
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::NetlistBuilder;
    use crate::ir::{BinaryOp, UnaryOp};
    use crate::logic;
    use pretty_assertions::assert_eq;

    fn output_bits(n: &Netlist, name: &str) -> Vec<BitRef> {
        n.find_port(name).unwrap().bits.clone()
    }

    #[test]
    fn test_fold_constant_add() {
        let mut b = NetlistBuilder::new("t");
        let y = b.binary(
            BinaryOp::Add,
            b.constant(2, 3),
            b.constant(1, 3),
            3,
        );
        b.add_output("y", y);
        let mut n = b.finish();
        assert!(opt_const(&mut n));
        let want: Vec<BitRef> = logic::from_value(3, 3)
            .into_iter()
            .map(BitRef::Const)
            .collect();
        assert_eq!(output_bits(&n, "y"), want);
        // The add cell itself is left for the clean pass.
        assert_eq!(n.cell_count(), 1);
    }

    #[test]
    fn test_mux_constant_select_short_circuits_nonconst_input() {
        let mut b = NetlistBuilder::new("t");
        let a = b.add_input("a", 2);
        let other = b.constant(3, 2);
        let y = b.mux(a.clone(), other, BitRef::Const(Lv::Zero));
        b.add_output("y", y);
        let mut n = b.finish();
        assert!(opt_const(&mut n));
        assert_eq!(output_bits(&n, "y"), a);
    }

    #[test]
    fn test_mux_undefined_select_is_left_alone() {
        let mut b = NetlistBuilder::new("t");
        let a = b.add_input("a", 2);
        let c = b.add_input("b", 2);
        let y = b.mux(a, c, BitRef::Const(Lv::X));
        b.add_output("y", y.clone());
        let mut n = b.finish();
        assert!(!opt_const(&mut n));
        assert_eq!(output_bits(&n, "y"), y);
    }

    #[test]
    fn test_pmux_one_hot_select() {
        let mut b = NetlistBuilder::new("t");
        let a = b.add_input("a", 2);
        let b0 = b.add_input("b0", 2);
        let b1 = b.add_input("b1", 2);
        let mut packed = b0;
        packed.extend(b1.clone());
        let s = b.constant(2, 2); // second select bit hot
        let y = b.pmux(a, packed, s);
        b.add_output("y", y);
        let mut n = b.finish();
        assert!(opt_const(&mut n));
        assert_eq!(output_bits(&n, "y"), b1);
    }

    #[test]
    fn test_fold_propagates_x() {
        let mut b = NetlistBuilder::new("t");
        let a = vec![BitRef::Const(Lv::X), BitRef::Const(Lv::One)];
        let y = b.binary(BinaryOp::Add, a, b.constant(1, 2), 2);
        b.add_output("y", y);
        let mut n = b.finish();
        assert!(opt_const(&mut n));
        assert_eq!(
            output_bits(&n, "y"),
            vec![BitRef::Const(Lv::X), BitRef::Const(Lv::X)]
        );
    }

    #[test]
    fn test_unary_reduce_fold() {
        let mut b = NetlistBuilder::new("t");
        let y = b.unary(UnaryOp::ReduceAnd, b.constant(7, 3), 1);
        b.add_output("y", y);
        let mut n = b.finish();
        assert!(opt_const(&mut n));
        assert_eq!(output_bits(&n, "y"), vec![BitRef::Const(Lv::One)]);
    }

    #[test]
    fn test_references_from_other_cells_are_rewritten() {
        let mut b = NetlistBuilder::new("t");
        let a = b.add_input("a", 1);
        let ones = b.unary(UnaryOp::ReduceOr, b.constant(1, 1), 1);
        let y = b.binary(BinaryOp::And, a, ones, 1);
        b.add_output("y", y);
        let mut n = b.finish();
        assert!(opt_const(&mut n));
        // The and cell now reads the constant directly.
        let and_cell = n
            .iter()
            .find(|c| matches!(&c.kind, CellKind::Binary(_)))
            .unwrap();
        if let CellKind::Binary(bin) = &and_cell.kind {
            assert_eq!(bin.b, vec![BitRef::Const(Lv::One)]);
        }
    }
}
