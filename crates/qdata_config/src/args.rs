use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Which half of the fabric this process should run. Defaults to both,
/// matching the original service's single-process deployment. Value
/// names (`request_handler` / `data_processor`) match the original
/// `argparse --module` choices exactly; internally these are the
/// session gateway (C5) and worker pool (C4) respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "snake_case")]
pub enum Module {
    /// Session gateway: ingress + egress (C5).
    RequestHandler,
    /// Worker pool: startup drain + steady-state processing (C4).
    DataProcessor,
}

#[derive(Debug, Parser)]
#[command(name = "qdata-server", about = "Request-coalescing dispatch fabric")]
pub struct Args {
    /// Path to the TOML configuration file.
    #[arg(short = 'c', long)]
    pub config: PathBuf,

    /// Which module(s) to run. Repeat to run more than one in-process.
    /// Defaults to running both if omitted.
    #[arg(short = 'm', long = "module", value_enum)]
    pub modules: Vec<Module>,

    /// Raise the console log filter to match the file filter.
    #[arg(long)]
    pub verbose: bool,
}

impl Args {
    pub fn modules(&self) -> Vec<Module> {
        if self.modules.is_empty() {
            vec![Module::RequestHandler, Module::DataProcessor]
        } else {
            self.modules.clone()
        }
    }
}
