//! CLI runner for common setup.
//!
//! Loads the pipeline configuration and flight models and keeps logging
//! alive while a command runs.

use std::path::Path;

use tracing::info;
use xtraffic::config::{config_directory, config_file_path, PipelineConfig};
use xtraffic::flight_model::FlightModelCatalog;
use xtraffic::logging::{default_log_dir, default_log_file, init_logging, LoggingGuard};

use crate::error::CliError;

/// Default flight model file name in the config directory.
const MODELS_FILE: &str = "models.ini";

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard - keeps logging active while runner exists
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    config: PipelineConfig,
    models: FlightModelCatalog,
}

impl CliRunner {
    /// Initialize logging, then load configuration and flight models.
    ///
    /// Paths default to `~/.xtraffic/config.ini` and
    /// `~/.xtraffic/models.ini`; missing files mean defaults.
    pub fn new(config_path: Option<&Path>, models_path: Option<&Path>, log_stdout: bool) -> Result<Self, CliError> {
        let logging_guard =
            init_logging(&default_log_dir(), default_log_file(), log_stdout).map_err(CliError::LoggingInit)?;

        let config_path = config_path.map_or_else(config_file_path, Path::to_path_buf);
        let config = PipelineConfig::load_from(&config_path)?;
        info!(path = %config_path.display(), "Pipeline configuration loaded");

        let models_path = models_path.map_or_else(|| config_directory().join(MODELS_FILE), Path::to_path_buf);
        let models = FlightModelCatalog::load_from(&models_path)?;
        info!(path = %models_path.display(), models = models.len(), "Flight models loaded");

        Ok(Self {
            logging_guard,
            config,
            models,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn models(&self) -> &FlightModelCatalog {
        &self.models
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("XTraffic v{}", xtraffic::VERSION);
        info!("XTraffic CLI: {} command", command);
    }
}
