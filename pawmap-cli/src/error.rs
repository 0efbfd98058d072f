use colored::Colorize;
use std::fmt;
use std::process;

/// Exit codes for the CLI.
pub const EXIT_ERROR: i32 = 1;
pub const EXIT_USAGE: i32 = 2;

/// Unified error type for CLI operations.
pub enum CliError {
    /// Error from the backend API client.
    Api(pawmap_api::ApiError),
    /// Invalid configuration (endpoints, timings).
    Config(String),
    /// Unreadable token file, bad output encoding.
    Input(String),
    /// Argument / usage errors.
    Usage(String),
    /// Backend accepted the request but refused the action.
    Rejected { code: i32, message: String },
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Api(e) if e.is_transient() => write!(
                f,
                "{} {e}\n  {} the backend may be restarting; try again shortly",
                "error:".red().bold(),
                "help:".cyan().bold(),
            ),
            CliError::Api(e) => write!(f, "{} {e}", "error:".red().bold()),
            CliError::Config(msg) => write!(f, "{} {msg}", "error:".red().bold()),
            CliError::Input(msg) => write!(f, "{} {msg}", "error:".red().bold()),
            CliError::Usage(msg) => write!(f, "{} {msg}", "error:".red().bold()),
            CliError::Rejected { code, message } => write!(
                f,
                "{} request rejected ({code}): {message}",
                "error:".red().bold()
            ),
        }
    }
}

impl fmt::Debug for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl From<pawmap_api::ApiError> for CliError {
    fn from(e: pawmap_api::ApiError) -> Self {
        match e {
            pawmap_api::ApiError::ResultCode { code, message } => {
                CliError::Rejected { code, message }
            }
            pawmap_api::ApiError::InvalidPosition { .. } | pawmap_api::ApiError::InvalidRadius(_) => {
                CliError::Usage(e.to_string())
            }
            other => CliError::Api(other),
        }
    }
}

impl From<pawmap_sync::SyncError> for CliError {
    fn from(e: pawmap_sync::SyncError) -> Self {
        match e {
            pawmap_sync::SyncError::Config(msg) => CliError::Config(msg),
            pawmap_sync::SyncError::Api(e) => CliError::from(e),
            pawmap_sync::SyncError::Io(e) => CliError::Input(format!("failed to read token: {e}")),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Input(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Input(format!("JSON encode error: {e}"))
    }
}

impl From<tokio::task::JoinError> for CliError {
    fn from(e: tokio::task::JoinError) -> Self {
        CliError::Input(format!("map page task failed: {e}"))
    }
}

/// Print error and exit with the appropriate code.
pub fn exit_with_error(err: CliError) -> ! {
    eprintln!("{err}");
    let code = match &err {
        CliError::Usage(_) | CliError::Config(_) => EXIT_USAGE,
        _ => EXIT_ERROR,
    };
    process::exit(code)
}

pub type CliResult<T> = std::result::Result<T, CliError>;
