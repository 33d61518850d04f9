//! Main entry point for the aiomerge CLI tool

use aiomerge::cli::{Args, run_cli};
use clap::Parser;

fn main() -> anyhow::Result<()> {
    run_cli(Args::parse())
}
