//! `xtraffic config`: print or write the pipeline configuration.

use std::io;
use std::path::PathBuf;

use clap::Args;
use xtraffic::config::{config_file_path, PipelineConfig};

use crate::error::CliError;

#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Configuration file (default: ~/.xtraffic/config.ini)
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// Write the defaults to the file instead of printing the effective values
    #[arg(long)]
    pub init: bool,
}

pub fn run(args: ConfigArgs) -> Result<(), CliError> {
    let path = args.path.unwrap_or_else(config_file_path);

    if args.init {
        PipelineConfig::default().save_to(&path)?;
        println!("Default configuration written to {}", path.display());
        return Ok(());
    }

    let config = PipelineConfig::load_from(&path)?;
    println!("# effective configuration, from {}", path.display());
    config
        .to_ini()
        .write_to(&mut io::stdout())
        .map_err(CliError::Output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_writes_loadable_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        run(ConfigArgs {
            path: Some(path.clone()),
            init: true,
        })
        .unwrap();

        assert_eq!(PipelineConfig::load_from(&path).unwrap(), PipelineConfig::default());
    }
}
