//! Logger setup shared by the binaries

use crate::config::LoggingConfig;
use crate::{InventoryError, Result};
use env_logger::{Builder, Env, Target};
use std::fs::{self, OpenOptions};

/// Install the global logger.
///
/// The configured level is the baseline; `RUST_LOG` wins when set. With a
/// log file configured, records go there instead of stderr.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let mut builder = Builder::new();
    builder.parse_filters(&config.level);
    builder.parse_env(Env::default());
    builder.format_timestamp_secs();

    if let Some(path) = &config.file {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        builder.target(Target::Pipe(Box::new(file)));
    }

    builder
        .try_init()
        .map_err(|e| InventoryError::ConfigError(format!("Logger already initialised: {}", e)))
}
