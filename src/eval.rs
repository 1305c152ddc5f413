// SPDX-License-Identifier: Apache-2.0

//! Operator semantics over four-valued bit vectors.
//!
//! Shared between the constant-folding pass and the test simulator so the two
//! cannot disagree. `fold_*` return `None` only when a result cannot be
//! computed exactly (arithmetic over defined operands wider than 64 bits);
//! `eval_*` approximate that case with all-undefined, which is acceptable for
//! simulation but must never be folded into the netlist.

use crate::ir::{BinaryOp, UnaryOp};
use crate::logic::{self, Lv};

fn reduce_and(bits: &[Lv]) -> Lv {
    if bits.iter().any(|b| *b == Lv::Zero) {
        Lv::Zero
    } else if logic::all_defined(bits) {
        Lv::One
    } else {
        Lv::X
    }
}

fn reduce_or(bits: &[Lv]) -> Lv {
    if bits.iter().any(|b| *b == Lv::One) {
        Lv::One
    } else if logic::all_defined(bits) {
        Lv::Zero
    } else {
        Lv::X
    }
}

fn reduce_xor(bits: &[Lv]) -> Lv {
    if !logic::all_defined(bits) {
        return Lv::X;
    }
    Lv::from_bool(bits.iter().filter(|b| **b == Lv::One).count() % 2 == 1)
}

/// A single-bit result zero-extended to the output width.
fn bit_result(bit: Lv, y_width: usize) -> Vec<Lv> {
    let mut out = vec![Lv::Zero; y_width];
    if y_width > 0 {
        out[0] = bit;
    }
    out
}

pub fn eval_unary(op: UnaryOp, a: &[Lv], a_signed: bool, y_width: usize) -> Vec<Lv> {
    match op {
        UnaryOp::Not => logic::extend(a, y_width, a_signed)
            .into_iter()
            .map(Lv::not)
            .collect(),
        UnaryOp::Pos => logic::extend(a, y_width, a_signed),
        UnaryOp::Neg => match logic::to_value(a, a_signed) {
            Some(v) if a.len() <= 64 && y_width <= 64 => logic::from_value(-v, y_width),
            _ => logic::undef(y_width),
        },
        UnaryOp::ReduceAnd => bit_result(reduce_and(a), y_width),
        UnaryOp::ReduceOr | UnaryOp::ReduceBool => bit_result(reduce_or(a), y_width),
        UnaryOp::ReduceXor => bit_result(reduce_xor(a), y_width),
        UnaryOp::ReduceXnor => bit_result(reduce_xor(a).not(), y_width),
        UnaryOp::LogicNot => bit_result(reduce_or(a).not(), y_width),
    }
}

/// Exact unary fold; `None` when the result would be an approximation.
pub fn fold_unary(op: UnaryOp, a: &[Lv], a_signed: bool, y_width: usize) -> Option<Vec<Lv>> {
    match op {
        UnaryOp::Neg => {
            // All-X is the exact answer for an undefined operand; only a wide
            // defined operand is unfoldable.
            if logic::all_defined(a) && (a.len() > 64 || y_width > 64) {
                return None;
            }
            Some(eval_unary(op, a, a_signed, y_width))
        }
        _ => Some(eval_unary(op, a, a_signed, y_width)),
    }
}

fn bitwise(op: BinaryOp, a: Lv, b: Lv) -> Lv {
    match op {
        BinaryOp::And => a.and(b),
        BinaryOp::Or => a.or(b),
        BinaryOp::Xor => a.xor(b),
        BinaryOp::Xnor => a.xnor(b),
        _ => unreachable!("not a bitwise op: {:?}", op),
    }
}

/// `$eq`/`$ne` over extended operands: a defined mismatch decides the result
/// even in the presence of undefined bits elsewhere.
fn eq_bit(a: &[Lv], b: &[Lv]) -> Lv {
    let mut undefined = false;
    for (x, y) in a.iter().zip(b.iter()) {
        match (x.to_bool(), y.to_bool()) {
            (Some(p), Some(q)) if p != q => return Lv::Zero,
            (Some(_), Some(_)) => {}
            _ => undefined = true,
        }
    }
    if undefined { Lv::X } else { Lv::One }
}

/// `$eqx`: exact pattern match, `X`/`Z` compare literally.
fn eqx_bit(a: &[Lv], b: &[Lv]) -> Lv {
    Lv::from_bool(a.iter().zip(b.iter()).all(|(x, y)| x == y))
}

fn shift_amount(b: &[Lv]) -> Option<u64> {
    if !logic::all_defined(b) {
        return None;
    }
    let mut amount: u64 = 0;
    for (i, bit) in b.iter().enumerate() {
        if *bit == Lv::One {
            if i >= 63 {
                return Some(u64::MAX);
            }
            amount |= 1u64 << i;
        }
    }
    Some(amount)
}

fn shift(op: BinaryOp, a: &[Lv], a_signed: bool, b: &[Lv], y_width: usize) -> Vec<Lv> {
    let Some(amount) = shift_amount(b) else {
        return logic::undef(y_width);
    };
    let fill = if op == BinaryOp::Sshr && a_signed {
        a.last().copied().unwrap_or(Lv::Zero)
    } else {
        Lv::Zero
    };
    match op {
        BinaryOp::Shl | BinaryOp::Sshl => {
            let mut out = Vec::with_capacity(y_width);
            for i in 0..y_width {
                let src = (i as u64).checked_sub(amount);
                out.push(match src {
                    Some(j) if (j as usize) < a.len() => a[j as usize],
                    Some(_) => {
                        // Beyond the extended operand: its extension fill.
                        if a_signed {
                            a.last().copied().unwrap_or(Lv::Zero)
                        } else {
                            Lv::Zero
                        }
                    }
                    None => Lv::Zero,
                });
            }
            out
        }
        BinaryOp::Shr | BinaryOp::Sshr => {
            // Operand is extended to the output width before shifting.
            let ext = logic::extend(a, y_width.max(a.len()), a_signed);
            let mut out = Vec::with_capacity(y_width);
            for i in 0..y_width {
                let src = (i as u64).saturating_add(amount) as usize;
                out.push(if src < ext.len() && amount < ext.len() as u64 {
                    ext[src]
                } else {
                    fill
                });
            }
            out
        }
        _ => unreachable!("not a shift op: {:?}", op),
    }
}

enum Folded {
    Exact(Vec<Lv>),
    TooWide,
}

fn arith(
    op: BinaryOp,
    a: &[Lv],
    a_signed: bool,
    b: &[Lv],
    b_signed: bool,
    y_width: usize,
) -> Folded {
    if !logic::all_defined(a) || !logic::all_defined(b) {
        return Folded::Exact(logic::undef(y_width));
    }
    if a.len() > 64 || b.len() > 64 || y_width > 64 {
        return Folded::TooWide;
    }
    let av = logic::to_value(a, a_signed).unwrap();
    let bv = logic::to_value(b, b_signed).unwrap();
    let value = match op {
        BinaryOp::Add => av.wrapping_add(bv),
        BinaryOp::Sub => av.wrapping_sub(bv),
        BinaryOp::Mul => av.wrapping_mul(bv),
        BinaryOp::Div => {
            if bv == 0 {
                return Folded::Exact(logic::undef(y_width));
            }
            av.wrapping_div(bv)
        }
        BinaryOp::Mod => {
            if bv == 0 {
                return Folded::Exact(logic::undef(y_width));
            }
            av.wrapping_rem(bv)
        }
        BinaryOp::Pow => {
            if bv < 0 {
                return Folded::Exact(logic::undef(y_width));
            }
            // Modular exponentiation; the result is truncated to y_width
            // anyway, so square-and-multiply over u128 suffices.
            let mut base = av as u128;
            let mut exp = bv as u128;
            let mut acc: u128 = 1;
            while exp > 0 {
                if exp & 1 == 1 {
                    acc = acc.wrapping_mul(base);
                }
                base = base.wrapping_mul(base);
                exp >>= 1;
            }
            acc as i128
        }
        BinaryOp::Lt => return Folded::Exact(bit_result(Lv::from_bool(av < bv), y_width)),
        BinaryOp::Le => return Folded::Exact(bit_result(Lv::from_bool(av <= bv), y_width)),
        BinaryOp::Ge => return Folded::Exact(bit_result(Lv::from_bool(av >= bv), y_width)),
        BinaryOp::Gt => return Folded::Exact(bit_result(Lv::from_bool(av > bv), y_width)),
        _ => unreachable!("not an arithmetic op: {:?}", op),
    };
    Folded::Exact(logic::from_value(value, y_width))
}

fn binary_impl(
    op: BinaryOp,
    a: &[Lv],
    a_signed: bool,
    b: &[Lv],
    b_signed: bool,
    y_width: usize,
) -> Folded {
    match op {
        BinaryOp::And | BinaryOp::Or | BinaryOp::Xor | BinaryOp::Xnor => {
            let ea = logic::extend(a, y_width, a_signed);
            let eb = logic::extend(b, y_width, b_signed);
            Folded::Exact(
                ea.iter()
                    .zip(eb.iter())
                    .map(|(x, y)| bitwise(op, *x, *y))
                    .collect(),
            )
        }
        BinaryOp::LogicAnd => {
            Folded::Exact(bit_result(reduce_or(a).and(reduce_or(b)), y_width))
        }
        BinaryOp::LogicOr => Folded::Exact(bit_result(reduce_or(a).or(reduce_or(b)), y_width)),
        BinaryOp::Eq | BinaryOp::Ne | BinaryOp::EqX | BinaryOp::NeX => {
            let w = a.len().max(b.len());
            let ea = logic::extend(a, w, a_signed && b_signed);
            let eb = logic::extend(b, w, a_signed && b_signed);
            let bit = match op {
                BinaryOp::Eq => eq_bit(&ea, &eb),
                BinaryOp::Ne => eq_bit(&ea, &eb).not(),
                BinaryOp::EqX => eqx_bit(&ea, &eb),
                BinaryOp::NeX => eqx_bit(&ea, &eb).not(),
                _ => unreachable!(),
            };
            Folded::Exact(bit_result(bit, y_width))
        }
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Ge | BinaryOp::Gt => {
            if !logic::all_defined(a) || !logic::all_defined(b) {
                return Folded::Exact(bit_result(Lv::X, y_width));
            }
            let w = a.len().max(b.len());
            let signed = a_signed && b_signed;
            let ea = logic::extend(a, w, a_signed);
            let eb = logic::extend(b, w, b_signed);
            arith(op, &ea, signed, &eb, signed, y_width)
        }
        BinaryOp::Shl | BinaryOp::Shr | BinaryOp::Sshl | BinaryOp::Sshr => {
            Folded::Exact(shift(op, a, a_signed, b, y_width))
        }
        BinaryOp::Add
        | BinaryOp::Sub
        | BinaryOp::Mul
        | BinaryOp::Div
        | BinaryOp::Mod
        | BinaryOp::Pow => arith(op, a, a_signed, b, b_signed, y_width),
    }
}

/// Exact binary fold; `None` when arithmetic over defined operands exceeds
/// the 64-bit folding bound.
pub fn fold_binary(
    op: BinaryOp,
    a: &[Lv],
    a_signed: bool,
    b: &[Lv],
    b_signed: bool,
    y_width: usize,
) -> Option<Vec<Lv>> {
    match binary_impl(op, a, a_signed, b, b_signed, y_width) {
        Folded::Exact(v) => Some(v),
        Folded::TooWide => None,
    }
}

/// Simulation semantics: like `fold_binary` but wide arithmetic degrades to
/// all-undefined instead of failing.
pub fn eval_binary(
    op: BinaryOp,
    a: &[Lv],
    a_signed: bool,
    b: &[Lv],
    b_signed: bool,
    y_width: usize,
) -> Vec<Lv> {
    fold_binary(op, a, a_signed, b, b_signed, y_width).unwrap_or_else(|| logic::undef(y_width))
}

/// Two-way mux with Verilog merge semantics on an undefined select: bits
/// where both data inputs agree keep their value, all others go undefined.
pub fn eval_mux_bit(a: Lv, b: Lv, s: Lv) -> Lv {
    match s.to_bool() {
        Some(false) => a,
        Some(true) => b,
        None => {
            if a == b && a.is_defined() {
                a
            } else {
                Lv::X
            }
        }
    }
}

pub fn eval_mux(a: &[Lv], b: &[Lv], s: Lv) -> Vec<Lv> {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| eval_mux_bit(*x, *y, s))
        .collect()
}

/// Parallel mux: `a` when no select bit is set, the matching `b` slice for a
/// single set bit, undefined for multiple set bits or an undefined select.
pub fn eval_pmux(a: &[Lv], b: &[Lv], s: &[Lv]) -> Vec<Lv> {
    let width = a.len();
    if !logic::all_defined(s) || b.len() < s.len() * width {
        return logic::undef(width);
    }
    let hot: Vec<usize> = s
        .iter()
        .enumerate()
        .filter(|(_, bit)| **bit == Lv::One)
        .map(|(i, _)| i)
        .collect();
    match hot.as_slice() {
        [] => a.to_vec(),
        [i] => b[i * width..(i + 1) * width].to_vec(),
        _ => logic::undef(width),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn bits(s: &str) -> Vec<Lv> {
        // MSB-first string for readability, stored LSB-first.
        s.chars().rev().map(|c| Lv::from_char(c).unwrap()).collect()
    }

    #[test_case(BinaryOp::Add, "010", "001", "011"; "add")]
    #[test_case(BinaryOp::Sub, "001", "010", "111"; "sub wraps")]
    #[test_case(BinaryOp::Mul, "011", "011", "001"; "mul truncates")]
    #[test_case(BinaryOp::And, "011", "101", "001"; "and")]
    #[test_case(BinaryOp::Or, "011", "101", "111"; "or")]
    #[test_case(BinaryOp::Xor, "011", "101", "110"; "xor")]
    #[test_case(BinaryOp::Xnor, "011", "101", "001"; "xnor")]
    fn test_binary_unsigned(op: BinaryOp, a: &str, b: &str, want: &str) {
        assert_eq!(
            fold_binary(op, &bits(a), false, &bits(b), false, want.len()),
            Some(bits(want))
        );
    }

    #[test]
    fn test_and_x_propagation_is_bitwise() {
        // and(0, x) = 0 but and(1, x) = x.
        assert_eq!(
            fold_binary(BinaryOp::And, &bits("x0"), false, &bits("xx"), false, 2),
            Some(bits("x0"))
        );
    }

    #[test]
    fn test_add_x_propagation_is_total() {
        assert_eq!(
            fold_binary(BinaryOp::Add, &bits("0x1"), false, &bits("001"), false, 3),
            Some(bits("xxx"))
        );
    }

    #[test]
    fn test_div_by_zero_is_undefined() {
        assert_eq!(
            fold_binary(BinaryOp::Div, &bits("101"), false, &bits("000"), false, 3),
            Some(bits("xxx"))
        );
    }

    #[test]
    fn test_signed_compare() {
        // -2 < 1 signed, but 6 > 1 unsigned.
        let a = bits("110");
        let b = bits("001");
        assert_eq!(
            fold_binary(BinaryOp::Lt, &a, true, &b, true, 1),
            Some(bits("1"))
        );
        assert_eq!(
            fold_binary(BinaryOp::Lt, &a, false, &b, false, 1),
            Some(bits("0"))
        );
    }

    #[test]
    fn test_eq_defined_mismatch_beats_x() {
        assert_eq!(
            fold_binary(BinaryOp::Eq, &bits("x1"), false, &bits("x0"), false, 1),
            Some(bits("0"))
        );
        assert_eq!(
            fold_binary(BinaryOp::Eq, &bits("x1"), false, &bits("01"), false, 1),
            Some(bits("x"))
        );
    }

    #[test]
    fn test_eqx_matches_x_literally() {
        assert_eq!(
            fold_binary(BinaryOp::EqX, &bits("x1"), false, &bits("x1"), false, 1),
            Some(bits("1"))
        );
        assert_eq!(
            fold_binary(BinaryOp::EqX, &bits("x1"), false, &bits("z1"), false, 1),
            Some(bits("0"))
        );
    }

    #[test_case("0110", 1, "1100"; "shl by one")]
    #[test_case("0110", 2, "1000"; "shl by two")]
    fn test_shl(a: &str, amount: u64, want: &str) {
        let b = logic::from_value(amount as i128, 3);
        assert_eq!(
            fold_binary(BinaryOp::Shl, &bits(a), false, &b, false, want.len()),
            Some(bits(want))
        );
    }

    #[test]
    fn test_sshr_sign_fills() {
        let a = bits("100");
        let b = logic::from_value(1, 2);
        assert_eq!(
            fold_binary(BinaryOp::Sshr, &a, true, &b, false, 3),
            Some(bits("110"))
        );
        assert_eq!(
            fold_binary(BinaryOp::Shr, &a, false, &b, false, 3),
            Some(bits("010"))
        );
    }

    #[test]
    fn test_shift_undefined_amount() {
        assert_eq!(
            fold_binary(BinaryOp::Shl, &bits("01"), false, &bits("x0"), false, 2),
            Some(bits("xx"))
        );
    }

    #[test]
    fn test_pow() {
        // 3^4 = 81 = 0b1010001, truncated to 5 bits = 17.
        let a = logic::from_value(3, 4);
        let b = logic::from_value(4, 4);
        assert_eq!(
            fold_binary(BinaryOp::Pow, &a, false, &b, false, 5),
            Some(logic::from_value(17, 5))
        );
    }

    #[test]
    fn test_wide_arith_does_not_fold() {
        let a = vec![Lv::One; 65];
        let b = vec![Lv::One; 65];
        assert_eq!(fold_binary(BinaryOp::Add, &a, false, &b, false, 65), None);
        // But wide bitwise ops still fold.
        assert!(fold_binary(BinaryOp::And, &a, false, &b, false, 65).is_some());
    }

    #[test_case(UnaryOp::ReduceAnd, "111", "1")]
    #[test_case(UnaryOp::ReduceAnd, "1x1", "x")]
    #[test_case(UnaryOp::ReduceAnd, "0x1", "0")]
    #[test_case(UnaryOp::ReduceOr, "000", "0")]
    #[test_case(UnaryOp::ReduceOr, "0x0", "x")]
    #[test_case(UnaryOp::ReduceOr, "0x1", "1")]
    #[test_case(UnaryOp::ReduceXor, "011", "0")]
    #[test_case(UnaryOp::ReduceXnor, "011", "1")]
    #[test_case(UnaryOp::LogicNot, "000", "1")]
    fn test_reductions(op: UnaryOp, a: &str, want: &str) {
        assert_eq!(
            fold_unary(op, &bits(a), false, want.len()),
            Some(bits(want))
        );
    }

    #[test]
    fn test_not_extends_before_inverting() {
        // Signed extension of 10 to 4 bits is 1110; inverted 0001.
        assert_eq!(
            fold_unary(UnaryOp::Not, &bits("10"), true, 4),
            Some(bits("0001"))
        );
    }

    #[test]
    fn test_neg() {
        assert_eq!(
            fold_unary(UnaryOp::Neg, &bits("011"), false, 3),
            Some(bits("101"))
        );
        assert_eq!(
            fold_unary(UnaryOp::Neg, &bits("0x1"), false, 3),
            Some(bits("xxx"))
        );
    }

    #[test]
    fn test_mux_undefined_select_merges_agreeing_bits() {
        assert_eq!(
            eval_mux(&bits("10"), &bits("11"), Lv::X),
            bits("1x")
        );
        assert_eq!(eval_mux(&bits("10"), &bits("11"), Lv::Zero), bits("10"));
        assert_eq!(eval_mux(&bits("10"), &bits("11"), Lv::One), bits("11"));
    }

    #[test]
    fn test_pmux() {
        let a = bits("00");
        let b = bits("1101"); // slice 0 = 01, slice 1 = 11
        assert_eq!(eval_pmux(&a, &b, &bits("00")), bits("00"));
        assert_eq!(eval_pmux(&a, &b, &bits("01")), bits("01"));
        assert_eq!(eval_pmux(&a, &b, &bits("10")), bits("11"));
        assert_eq!(eval_pmux(&a, &b, &bits("11")), bits("xx"));
    }
}
