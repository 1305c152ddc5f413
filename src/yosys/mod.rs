// SPDX-License-Identifier: Apache-2.0

//! The yosys boundary: document schema, IR construction/emission, and
//! front-end invocation.

pub mod export;
pub mod import;
pub mod json;
pub mod runner;
