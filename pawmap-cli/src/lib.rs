//! Pawmap CLI library.
//!
//! Types and command handlers behind the `pawmap` binary: one-shot map
//! queries, list browsing, the protection application workflow and a
//! headless `watch` mode that runs a full map page.

pub mod cli;
pub mod commands;
pub mod context;
pub mod error;
pub mod output;

use std::time::Duration;

use cli::{Cli, Commands};
use context::CommandContext;

/// Dispatch a parsed [`Cli`] to the appropriate command handler.
pub async fn run(cli: Cli) -> error::CliResult<()> {
    let ctx = CommandContext::new(cli.map)?;

    match cli.command {
        Commands::Watch { duration_secs } => {
            commands::watch::run(&ctx, duration_secs.map(Duration::from_secs), cli.quiet).await
        }
        Commands::Nearby { format } => commands::nearby::run(&ctx, format).await,
        Commands::Browse {
            size,
            pages,
            format,
        } => commands::browse::run(&ctx, size, pages, format).await,
        Commands::Application { action } => commands::application::run(&ctx, action).await,
    }
}
