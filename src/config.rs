//! Configuration module for the collector

use crate::{InventoryError, Result};
use log::error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default location of the collector configuration
pub const DEFAULT_CONFIG_PATH: &str = "conf/junos-inventory.toml";

/// Domain value shipped in the sample config until the operator fills it in
pub const PLACEHOLDER_DOMAIN: &str = "obtainThisFromXON";

pub const DEFAULT_API_URL: &str = "https://quark.xon.co.za/api";

/// How the collector reaches a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginMethod {
    /// RANCID's `jlogin` expect wrapper, needed behind a jumphost
    Jlogin,
    /// Direct SSH exec sessions
    #[serde(alias = "paramiko")]
    Ssh,
}

/// What to keep when the device hostname never shows up in a transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedHostname {
    Empty,
    CaptureAll,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Main configuration structure for a collection run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    #[serde(default = "default_login_method")]
    pub login_method: LoginMethod,

    #[serde(default)]
    pub ssh_username: Option<String>,

    #[serde(default)]
    pub ssh_password: Option<String>,

    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,

    /// Executable used for the jlogin method
    #[serde(default = "default_jlogin_path")]
    pub jlogin_path: String,

    /// Group name to router.db style host-list path
    #[serde(default)]
    pub groups: BTreeMap<String, PathBuf>,

    /// One command per line; the built-in hardware query is used when unset
    #[serde(default)]
    pub commands_file: Option<PathBuf>,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Upper bound for one host, connect through last command
    #[serde(default = "default_session_timeout")]
    pub session_timeout_secs: u64,

    /// Concatenate every artifact of the run into install_base_<date>.txt
    #[serde(default)]
    pub aggregate: bool,

    #[serde(default = "default_unresolved_hostname")]
    pub unresolved_hostname: UnresolvedHostname,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default)]
    pub api_username: Option<String>,

    #[serde(default)]
    pub api_password: Option<String>,

    #[serde(default)]
    pub domain: Option<String>,

    #[serde(default = "default_upload_path")]
    pub api_upload_path: String,

    #[serde(default = "default_api_timeout")]
    pub api_timeout_secs: u64,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Everything needed to authenticate against the inventory API
#[derive(Debug, Clone, PartialEq)]
pub struct UploadCredentials {
    pub url: String,
    pub username: String,
    pub password: String,
    pub domain: String,
    pub upload_path: String,
    pub timeout: Duration,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_login_method() -> LoginMethod {
    LoginMethod::Jlogin
}

fn default_ssh_port() -> u16 {
    22
}

fn default_jlogin_path() -> String {
    "jlogin".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_session_timeout() -> u64 {
    120
}

fn default_unresolved_hostname() -> UnresolvedHostname {
    UnresolvedHostname::Empty
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_upload_path() -> String {
    "/inventory/devices".to_string()
}

fn default_api_timeout() -> u64 {
    30
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            login_method: default_login_method(),
            ssh_username: None,
            ssh_password: None,
            ssh_port: default_ssh_port(),
            jlogin_path: default_jlogin_path(),
            groups: BTreeMap::new(),
            commands_file: None,
            output_dir: default_output_dir(),
            session_timeout_secs: default_session_timeout(),
            aggregate: false,
            unresolved_hostname: default_unresolved_hostname(),
            api_url: default_api_url(),
            api_username: None,
            api_password: None,
            domain: None,
            api_upload_path: default_upload_path(),
            api_timeout_secs: default_api_timeout(),
            logging: LoggingConfig::default(),
        }
    }
}

impl CollectorConfig {
    /// Load configuration from a TOML file, or JSON when the extension says so
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            InventoryError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.groups.is_empty() {
            return Err(InventoryError::ConfigError(
                "No groups configured".to_string(),
            ));
        }

        if self.login_method == LoginMethod::Ssh
            && (self.ssh_username.is_none() || self.ssh_password.is_none())
        {
            return Err(InventoryError::ConfigError(
                "ssh_username and ssh_password are required for the ssh login method"
                    .to_string(),
            ));
        }

        if self.session_timeout_secs == 0 || self.api_timeout_secs == 0 {
            return Err(InventoryError::ConfigError(
                "Timeouts must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    /// Upload is enabled only when every credential is present and the
    /// sample domain has been replaced.
    pub fn upload_credentials(&self) -> Option<UploadCredentials> {
        let (username, password, domain) = match (
            self.api_username.as_ref(),
            self.api_password.as_ref(),
            self.domain.as_ref(),
        ) {
            (Some(u), Some(p), Some(d)) => (u, p, d),
            _ => return None,
        };

        if domain == PLACEHOLDER_DOMAIN {
            error!("Please update the domain entry in the configuration - it needs to be obtained from XON");
            return None;
        }

        Some(UploadCredentials {
            url: self.api_url.trim_end_matches('/').to_string(),
            username: username.clone(),
            password: password.clone(),
            domain: domain.clone(),
            upload_path: self.api_upload_path.clone(),
            timeout: Duration::from_secs(self.api_timeout_secs),
        })
    }
}
