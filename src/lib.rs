// SPDX-License-Identifier: Apache-2.0

//! netopt: a fixed-point optimizer for yosys-lowered gate/register netlists.
//!
//! The flow is: GHDL + yosys lower VHDL sources to a JSON netlist document
//! (`yosys::runner`), the document is normalized into a typed IR
//! (`yosys::import`), each module is reduced by the multi-pass fixed-point
//! optimizer (`opt::optimize`), and the finalized netlist is re-emitted as a
//! document (`yosys::export`).

pub mod builder;
pub mod connectivity;
pub mod eval;
pub mod ir;
pub mod ir_validate;
pub mod logic;
pub mod opt;
pub mod sim;
pub mod subst;
pub mod yosys;
