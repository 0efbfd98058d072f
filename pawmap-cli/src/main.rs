use clap::Parser;
use pawmap_cli::cli::Cli;
use pawmap_cli::error::exit_with_error;
use pawmap_sync::{init_logging, TelemetryConfig};

fn init_tracing(cli: &Cli) {
    // --quiet → "off" always; otherwise RUST_LOG, then LOG_LEVEL, then
    // "debug" with --verbose or "warn" without
    let mut config = if cli.verbose {
        TelemetryConfig::from_env(Some("debug"))
    } else {
        TelemetryConfig::from_env(Some("warn"))
    };
    if cli.quiet {
        config.log_filter = "off".to_string();
    }
    init_logging(&config);
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.no_color || std::env::var_os("NO_COLOR").is_some() {
        colored::control::set_override(false);
    }

    init_tracing(&cli);

    if let Err(e) = pawmap_cli::run(cli).await {
        exit_with_error(e);
    }
}
