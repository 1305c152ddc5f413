// SPDX-License-Identifier: Apache-2.0

//! Front-end invocation: GHDL analyzes the VHDL sources, then yosys (with the
//! ghdl plugin) lowers them and writes a JSON netlist document to an
//! ephemeral file, which is read back and deleted.
//!
//! The flow runs yosys twice: once with a minimal script to discover the
//! top-level module names, then once per module with the full lowering
//! script. A module that fails to elaborate is logged and omitted; the batch
//! continues.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};

use crate::yosys::json::Document;

/// The fixed lowering pipeline that produces the gate/register-level netlist
/// the optimizer consumes.
const LOWER_SCRIPT: &str = "ghdl; proc; flatten; wreduce; opt; fsm; opt; \
                            memory -nomap -nordff; opt; muxpack; peepopt; \
                            async2sync; wreduce; opt -mux_bool";

const DISCOVER_SCRIPT: &str = "ghdl; proc";

fn log_stderr(tool: &str, stderr: &[u8]) {
    for line in String::from_utf8_lossy(stderr).lines() {
        if !line.trim().is_empty() {
            log::info!("[{}] {}", tool, line);
        }
    }
}

fn run_ghdl_analysis(files: &[PathBuf]) -> Result<()> {
    let output = Command::new("ghdl")
        .arg("-a")
        .args(files)
        .output()
        .context("failed to spawn ghdl; is it installed?")?;
    log_stderr("ghdl", &output.stderr);
    if !output.status.success() {
        bail!("ghdl failed to analyze the design ({})", output.status);
    }
    Ok(())
}

/// One yosys invocation: lowers `files` with `script`, hands the result over
/// through a temporary JSON file that does not outlive this call.
fn exec_yosys(files: &[PathBuf], script: &str) -> Result<Document> {
    run_ghdl_analysis(files)?;

    let handoff = tempfile::Builder::new()
        .prefix("netopt")
        .suffix(".json")
        .tempfile()
        .context("failed to create hand-off file")?;
    let output = Command::new("yosys")
        .arg("-m")
        .arg("ghdl")
        .arg("-o")
        .arg(handoff.path())
        .arg("-p")
        .arg(script)
        .output()
        .context("failed to spawn yosys; is it installed?")?;
    log_stderr("yosys", &output.stderr);
    if !output.status.success() {
        bail!("yosys failed to compile the design ({})", output.status);
    }
    let text = std::fs::read_to_string(handoff.path())
        .context("failed to read yosys hand-off file")?;
    // `handoff` is dropped (and the file deleted) on return.
    serde_json::from_str(&text).context("failed to parse yosys netlist document")
}

/// Lowers the design to one netlist document, one fully-lowered module per
/// discovered top-level module.
pub fn generate_netlist(files: &[PathBuf]) -> Result<Document> {
    let missing: Vec<&Path> = files
        .iter()
        .map(PathBuf::as_path)
        .filter(|f| !f.exists())
        .collect();
    if !missing.is_empty() {
        for f in &missing {
            log::error!("file {} not found", f.display());
        }
        bail!("{} input file(s) not found", missing.len());
    }

    let discovered = exec_yosys(files, DISCOVER_SCRIPT)?;
    let module_names: Vec<String> = discovered.modules.keys().cloned().collect();
    log::info!("discovered {} module(s): {:?}", module_names.len(), module_names);

    let mut result = Document {
        creator: discovered.creator.clone(),
        modules: Default::default(),
    };
    for name in &module_names {
        match exec_yosys(files, LOWER_SCRIPT) {
            Ok(mut lowered) => match lowered.modules.remove(name) {
                Some(module) => {
                    result.modules.insert(name.clone(), module);
                }
                None => {
                    log::warn!(
                        "module {} disappeared during lowering; omitting it",
                        name
                    );
                }
            },
            Err(e) => {
                log::warn!("failed to elaborate design for module {}: {:#}", name, e);
            }
        }
    }
    Ok(result)
}
