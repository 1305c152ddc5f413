// SPDX-License-Identifier: Apache-2.0

//! Serde model of the yosys `write_json` netlist document.
//!
//! Parameter values arrive as opaque scalars: plain integers, or strings of
//! `0/1/x/z` characters for values that do not fit 32 bits (and occasionally
//! for ones that do). Normalizing them into typed IR parameters is the import
//! layer's job; this module only carries them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::logic::Lv;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub creator: String,
    #[serde(default)]
    pub modules: BTreeMap<String, RawModule>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawModule {
    #[serde(default)]
    pub attributes: BTreeMap<String, ParamValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter_default_values: Option<BTreeMap<String, ParamValue>>,
    #[serde(default)]
    pub ports: BTreeMap<String, RawPort>,
    #[serde(default)]
    pub cells: BTreeMap<String, RawCell>,
    #[serde(default)]
    pub netnames: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPort {
    pub direction: RawDirection,
    pub bits: Vec<SigBit>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawDirection {
    Input,
    Output,
    Inout,
}

/// One connection bit: a net number or a constant `"0"/"1"/"x"/"z"` string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SigBit {
    Net(u64),
    Const(String),
}

impl SigBit {
    pub fn from_lv(lv: Lv) -> Self {
        SigBit::Const(lv.as_char().to_string())
    }

    pub fn as_lv(&self) -> Option<Lv> {
        match self {
            SigBit::Const(s) if s.len() == 1 => Lv::from_char(s.chars().next().unwrap()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawCell {
    #[serde(default)]
    pub hide_name: u8,
    #[serde(rename = "type")]
    pub cell_type: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, ParamValue>,
    #[serde(default)]
    pub attributes: BTreeMap<String, ParamValue>,
    #[serde(default)]
    pub port_directions: BTreeMap<String, RawDirection>,
    #[serde(default)]
    pub connections: BTreeMap<String, Vec<SigBit>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Str(String),
}

impl Default for ParamValue {
    fn default() -> Self {
        ParamValue::Int(0)
    }
}

impl ParamValue {
    /// Numeric reading: integers directly, strings as binary digit vectors.
    /// `None` for strings containing undefined digits.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(i) => Some(*i),
            ParamValue::Str(s) => {
                if s.is_empty() || !s.chars().all(|c| c == '0' || c == '1') {
                    return None;
                }
                let mut value: i64 = 0;
                for c in s.chars() {
                    value = value.checked_mul(2)?;
                    if c == '1' {
                        value = value.checked_add(1)?;
                    }
                }
                Some(value)
            }
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        self.as_i64().and_then(|v| u32::try_from(v).ok())
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_i64().map(|v| v != 0)
    }

    /// Reads the value as `width` logic levels, LSB-first. Strings are
    /// MSB-first digit vectors and may contain `x`/`z`; integers are
    /// two's-complement encoded. Truncates or zero-pads to `width`.
    pub fn as_lv_vec(&self, width: usize) -> Vec<Lv> {
        match self {
            ParamValue::Int(i) => crate::logic::from_value(*i as i128, width),
            ParamValue::Str(s) => {
                let mut bits: Vec<Lv> = s
                    .chars()
                    .rev()
                    .filter_map(Lv::from_char)
                    .collect();
                bits.resize(width, Lv::Zero);
                bits.truncate(width);
                bits
            }
        }
    }

    /// Per-index boolean mask reading (yosys packs per-port flags into one
    /// integer or digit-vector parameter).
    pub fn as_mask(&self, len: usize) -> Vec<bool> {
        self.as_lv_vec(len)
            .into_iter()
            .map(|lv| lv == Lv::One)
            .collect()
    }

    pub fn as_display_string(&self) -> String {
        match self {
            ParamValue::Int(i) => i.to_string(),
            ParamValue::Str(s) => s.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sigbit_untagged_parse() {
        let bits: Vec<SigBit> = serde_json::from_str(r#"[2, "0", 5, "x"]"#).unwrap();
        assert_eq!(
            bits,
            vec![
                SigBit::Net(2),
                SigBit::Const("0".to_string()),
                SigBit::Net(5),
                SigBit::Const("x".to_string()),
            ]
        );
        assert_eq!(bits[1].as_lv(), Some(Lv::Zero));
        assert_eq!(bits[3].as_lv(), Some(Lv::X));
    }

    #[test]
    fn test_param_value_numeric_readings() {
        assert_eq!(ParamValue::Int(5).as_u32(), Some(5));
        assert_eq!(ParamValue::Str("00000101".to_string()).as_u32(), Some(5));
        assert_eq!(ParamValue::Str("0x1".to_string()).as_u32(), None);
        assert_eq!(ParamValue::Int(1).as_bool(), Some(true));
    }

    #[test]
    fn test_param_value_lv_vec() {
        assert_eq!(
            ParamValue::Str("1x0".to_string()).as_lv_vec(3),
            vec![Lv::Zero, Lv::X, Lv::One]
        );
        assert_eq!(
            ParamValue::Int(2).as_lv_vec(3),
            vec![Lv::Zero, Lv::One, Lv::Zero]
        );
    }

    #[test]
    fn test_module_document_roundtrip() {
        let text = r#"{
            "creator": "Yosys 0.38",
            "modules": {
                "top": {
                    "attributes": {"src": "top.vhd:1"},
                    "ports": {
                        "a": {"direction": "input", "bits": [2]},
                        "y": {"direction": "output", "bits": [3]}
                    },
                    "cells": {
                        "$not$top.vhd:3$1": {
                            "hide_name": 1,
                            "type": "$not",
                            "parameters": {"A_SIGNED": 0, "A_WIDTH": 1, "Y_WIDTH": 1},
                            "attributes": {"src": "top.vhd:3"},
                            "port_directions": {"A": "input", "Y": "output"},
                            "connections": {"A": [2], "Y": [3]}
                        }
                    },
                    "netnames": {"a": {"bits": [2], "hide_name": 0}}
                }
            }
        }"#;
        let doc: Document = serde_json::from_str(text).unwrap();
        assert_eq!(doc.creator, "Yosys 0.38");
        let module = &doc.modules["top"];
        assert_eq!(module.ports["a"].direction, RawDirection::Input);
        let cell = &module.cells["$not$top.vhd:3$1"];
        assert_eq!(cell.cell_type, "$not");
        assert_eq!(cell.connections["Y"], vec![SigBit::Net(3)]);
        // Round-trips through serialization.
        let text2 = serde_json::to_string(&doc).unwrap();
        let doc2: Document = serde_json::from_str(&text2).unwrap();
        assert_eq!(doc2.modules["top"].cells.len(), 1);
    }
}
