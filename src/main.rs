//! CLI entry point for hb-downloader.

use std::process::ExitCode;

use clap::Parser;

mod app;
mod cli;

use app::exit_handler::ProcessExit;
use cli::Args;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse before tracing so --help works without logs
    let args = Args::parse();

    match app::runtime::run_sync(args).await {
        Ok(exit) => exit.into(),
        Err(error) => {
            eprintln!("Error: {error:#}");
            ProcessExit::Failure.into()
        }
    }
}
