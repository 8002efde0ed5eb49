//! CLI error handling with user-friendly messages.

use std::fmt;
use std::path::PathBuf;
use std::process;

use xtraffic::config::ConfigFileError;
use xtraffic::report::ReplayError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(std::io::Error),
    /// Pipeline or flight model configuration error
    Config(ConfigFileError),
    /// Failed to read the recording
    Recording { path: PathBuf, error: ReplayError },
    /// Failed to start the registry worker
    Startup(std::io::Error),
    /// Failed to install the Ctrl+C handler
    SignalHandler(String),
    /// Failed to write output
    Output(std::io::Error),
}

impl CliError {
    /// Exit the process with an error message and code 1.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        if let CliError::Recording {
            error: ReplayError::Parse { .. },
            ..
        } = self
        {
            eprintln!();
            eprintln!("Each line must be one JSON object with \"kind\": \"position\" or \"attributes\".");
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(e) => write!(f, "Failed to initialize logging: {}", e),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::Recording { path, error } => {
                write!(f, "Failed to read recording '{}': {}", path.display(), error)
            }
            CliError::Startup(e) => write!(f, "Failed to start pipeline: {}", e),
            CliError::SignalHandler(msg) => write!(f, "Failed to set signal handler: {}", msg),
            CliError::Output(e) => write!(f, "Failed to write output: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::LoggingInit(e) => Some(e),
            CliError::Config(e) => Some(e),
            CliError::Recording { error, .. } => Some(error),
            CliError::Startup(e) => Some(e),
            CliError::Output(e) => Some(e),
            CliError::SignalHandler(_) => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e)
    }
}
