//! Tour CLI - runs UI tours from scenario files
//!
//! Each scenario bundles a page fixture, its scripted behaviour and the tours
//! to drive through it; the CLI runs them and reports which ones met their
//! expected outcome.

use clap::Parser;
use tour::commands::Commands;
use tour::{cli, common::logging};

#[derive(Parser)]
#[command(name = "tour", about = "Step-by-step UI tour runner")]
#[command(version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    logging::init_cli(cli.command.debug());

    if let Err(e) = cli::dispatch(cli.command).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
