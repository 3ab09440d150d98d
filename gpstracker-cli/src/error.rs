//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::io;
use std::process;

use gpstracker::{ConfigFileError, ErrorKind, TrackerError};

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Invalid command-line or configuration value
    Config(String),
    /// Configuration file could not be loaded
    ConfigFile(ConfigFileError),
    /// Track file could not be read
    TrackRead { path: String, error: io::Error },
    /// Track file is not valid JSON
    TrackParse {
        path: String,
        error: serde_json::Error,
    },
    /// Failed to install the Ctrl-C handler
    Signal(String),
    /// Failed to build the async runtime
    Runtime(io::Error),
    /// Tracker handle operation failed
    Tracker(TrackerError),
    /// The tracking session ended in `Failed`
    TrackingFailed(ErrorKind),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::TrackParse { .. } => {
                eprintln!();
                eprintln!("A track file is a JSON array of points, for example:");
                eprintln!(
                    r#"  [{{"latitude": 37.5665, "longitude": 126.978, "accuracy": 8, "offsetMs": 0}}]"#
                );
                eprintln!("Optional fields: altitude, speed, bearing");
            }
            CliError::TrackingFailed(ErrorKind::Timeout) => {
                eprintln!();
                eprintln!("No fix arrived within the configured timeout.");
                eprintln!("Raise --timeout-ms or timeout_ms in [tracking], or leave it unset.");
            }
            CliError::ConfigFile(_) => {
                eprintln!();
                eprintln!("Validate the file with: gpstracker check-config <file>");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ConfigFile(e) => write!(f, "Failed to load configuration: {}", e),
            CliError::TrackRead { path, error } => {
                write!(f, "Failed to read track '{}': {}", path, error)
            }
            CliError::TrackParse { path, error } => {
                write!(f, "Failed to parse track '{}': {}", path, error)
            }
            CliError::Signal(msg) => write!(f, "Failed to set signal handler: {}", msg),
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
            CliError::Tracker(e) => write!(f, "Tracker error: {}", e),
            CliError::TrackingFailed(kind) => write!(f, "Tracking failed: {}", kind),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ConfigFile(e) => Some(e),
            CliError::TrackRead { error, .. } => Some(error),
            CliError::TrackParse { error, .. } => Some(error),
            CliError::Runtime(e) => Some(e),
            CliError::Tracker(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<TrackerError> for CliError {
    fn from(e: TrackerError) -> Self {
        CliError::Tracker(e)
    }
}
