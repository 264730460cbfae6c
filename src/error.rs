//! Error handling for the inventory tools
//!
//! Every failure is classified so the batch loops can decide whether it
//! skips one host, one group, one upload, or stops the run at startup.

use std::net::IpAddr;
use thiserror::Error;

/// Main error type for discovery and collection
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Resume point {next} is not inside {network}")]
    ResumeOutOfRange { next: IpAddr, network: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("SNMP error: {0}")]
    SnmpError(String),

    #[error("Timeout error: {0}")]
    TimeoutError(String),

    #[error("Session error: {0}")]
    SessionError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("No usable output received from {0}")]
    NoUsableOutput(String),

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Upload error: {0}")]
    UploadError(String),
}

impl InventoryError {
    /// Errors that only cost us the current host; the batch carries on.
    pub fn is_per_host(&self) -> bool {
        matches!(
            self,
            InventoryError::SnmpError(_)
                | InventoryError::TimeoutError(_)
                | InventoryError::SessionError(_)
                | InventoryError::NoUsableOutput(_)
                | InventoryError::ParseError(_)
        )
    }

    /// Errors raised before any host is touched that must stop the run.
    pub fn is_fatal_at_startup(&self) -> bool {
        matches!(
            self,
            InventoryError::ResumeOutOfRange { .. } | InventoryError::InvalidTarget(_)
        )
    }
}

impl From<reqwest::Error> for InventoryError {
    fn from(err: reqwest::Error) -> Self {
        InventoryError::UploadError(err.to_string())
    }
}

impl From<toml::de::Error> for InventoryError {
    fn from(err: toml::de::Error) -> Self {
        InventoryError::ConfigError(format!("Failed to parse TOML: {}", err))
    }
}

impl From<serde_json::Error> for InventoryError {
    fn from(err: serde_json::Error) -> Self {
        InventoryError::ConfigError(format!("Failed to parse JSON: {}", err))
    }
}
