// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use clap::Parser;

use netopt::opt;
use netopt::yosys::{export, import, json::Document, runner};

/// Lower VHDL sources through GHDL + yosys and reduce each module's netlist
/// to a minimal canonical form.
#[derive(Parser, Debug)]
struct Args {
    /// Skip the fixed-point optimizer and emit the raw lowered netlist.
    #[arg(long, default_value_t = false)]
    #[arg(action = clap::ArgAction::Set)]
    skip_opt: bool,

    /// Where to write the resulting netlist document (stdout when omitted).
    #[arg(long)]
    output: Option<PathBuf>,

    /// The VHDL source files.
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let _ = env_logger::builder().try_init();
    let args = Args::parse();

    let document = runner::generate_netlist(&args.files)?;
    let mut result = Document {
        creator: document.creator.clone(),
        modules: Default::default(),
    };
    for (name, raw) in &document.modules {
        let mut netlist = match import::import_module(name, raw) {
            Ok(netlist) => netlist,
            Err(e) => {
                log::warn!("module {}: import failed, omitting it: {:#}", name, e);
                continue;
            }
        };
        if !args.skip_opt {
            let stats = opt::optimize(&mut netlist);
            log::info!(
                "module {}: {} -> {} cells in {} rounds",
                name,
                stats.cells_before,
                stats.cells_after,
                stats.rounds
            );
        }
        result.modules.insert(name.clone(), export::export_module(&netlist));
    }

    let text = serde_json::to_string_pretty(&result)?;
    match &args.output {
        Some(path) => std::fs::write(path, text)?,
        None => println!("{}", text),
    }
    Ok(())
}
