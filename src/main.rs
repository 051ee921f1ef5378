//! CLI entry point for the shdl tool.

use clap::Parser;

mod app;
mod cli;

use app::exit_handler::ProcessExit;
use cli::Args;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    let exit = app::runtime::run(args).await;
    if exit != ProcessExit::Success {
        std::process::exit(exit.code());
    }
}
