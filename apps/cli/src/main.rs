//! dictindex CLI: builds and purges dictionary search indexes.
//!
//! Fetches or locates each dictionary's archive, unpacks and reshapes its
//! records, and loads them into a search engine.

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
