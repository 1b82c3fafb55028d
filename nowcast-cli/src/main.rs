//! Binary crate for the `nowcast` weather dashboard.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Interactive configuration
//! - Drawing the dashboard in the terminal and feeding key presses back

use clap::Parser;

mod cli;
mod configure;
mod dashboard;
mod logging;
mod render;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cmd = cli::Cli::parse();
    logging::init(&cmd.log_level, cmd.log_file.as_deref())?;
    cmd.run().await
}
