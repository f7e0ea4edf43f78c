//! Searchkind CLI: classify every query in a file and write per-category results.

use anyhow::Result;
use clap::Parser;
use searchkind::engine::arg_parser::Cli;
use searchkind::engine::handle_run;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    handle_run(&cli)
}
