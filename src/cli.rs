//! CLI argument parsing for the vrptw-worker binary.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "vrptw-worker", about = "CVRPTW routing worker")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the worker server (default if no subcommand given)
    Serve,
}
