//! BlogMate CLI: draft, illustrate and publish blog posts from the terminal.
//!
//! Generates a post from a title or a reference URL (or takes hand-written
//! HTML), attaches a generated featured image and publishes to WordPress.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
