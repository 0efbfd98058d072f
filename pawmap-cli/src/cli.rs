use clap::{Parser, Subcommand, ValueEnum};
use pawmap_sync::MapConfig;

#[derive(Parser)]
#[command(name = "pawmap", about = "Pawmap lost/found pet map client", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output (also respects NO_COLOR env var)
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(flatten)]
    pub map: MapConfig,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a headless map page and print markers and notifications
    Watch {
        /// Stop after this many seconds (default: until Ctrl-C)
        #[arg(long)]
        duration_secs: Option<u64>,
    },

    /// Query entities around --center within --radius once
    Nearby {
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Page through the list view of --page
    Browse {
        /// Page size
        #[arg(long, default_value = "20")]
        size: u32,

        /// Maximum number of pages to load
        #[arg(long, default_value = "1")]
        pages: u32,

        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Protection application workflow
    Application {
        #[command(subcommand)]
        action: ApplicationCommand,
    },
}

#[derive(Subcommand)]
pub enum ApplicationCommand {
    /// Accept a protection application
    Accept { protection_id: i64 },

    /// Reject a protection application
    Reject { protection_id: i64 },

    /// Cancel your own application
    Cancel { protection_id: i64 },

    /// Apply to protect a pet or shelter animal
    Apply {
        #[arg(value_enum)]
        target: ApplyKind,

        /// Pet post or shelter animal id
        id: i64,

        /// Message to the owner / shelter
        #[arg(long, short = 'm')]
        message: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ApplyKind {
    Pet,
    Shelter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}
