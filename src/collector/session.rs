//! Device sessions: RANCID jlogin or direct SSH

use super::extract::hostname_from_version;
use crate::{InventoryError, Result};
use async_ssh2_tokio::{AuthMethod, Client, ServerCheckMethod};
use log::{debug, warn};
use std::fs;
use std::net::IpAddr;
use std::path::Path;
use tokio::process::Command;

/// Hardware inventory query used when no command file is configured
pub const DEFAULT_COMMAND: &str = "show chassis hardware detail | display xml | no-more";

/// What a session hands back for one device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCapture {
    /// Raw interactive transcript; output still has to be extracted
    Transcript(String),
    /// Command output without prompts, plus the hostname if the device told us
    Exec {
        hostname: Option<String>,
        output: String,
    },
}

#[async_trait::async_trait]
pub trait DeviceSession: Send + Sync {
    /// Log in to `address` and run `commands` in order
    async fn run_commands(&self, address: IpAddr, commands: &[String]) -> Result<SessionCapture>;

    fn name(&self) -> &'static str;
}

/// Commands from a command file, or the default hardware query
pub fn load_commands(path: Option<&Path>) -> Result<Vec<String>> {
    let path = match path {
        Some(path) => path,
        None => return Ok(vec![DEFAULT_COMMAND.to_string()]),
    };

    let content = fs::read_to_string(path).map_err(|e| {
        InventoryError::ConfigError(format!(
            "Unable to read command file {}: {}",
            path.display(),
            e
        ))
    })?;

    let commands: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect();

    if commands.is_empty() {
        return Err(InventoryError::ConfigError(format!(
            "Command file {} contains no commands",
            path.display()
        )));
    }

    Ok(commands)
}

/// Runs RANCID's `jlogin -c "<cmd>;<cmd>" <address>`
#[derive(Debug, Clone)]
pub struct JloginSession {
    program: String,
}

impl JloginSession {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait::async_trait]
impl DeviceSession for JloginSession {
    async fn run_commands(&self, address: IpAddr, commands: &[String]) -> Result<SessionCapture> {
        let output = Command::new(&self.program)
            .arg("-c")
            .arg(commands.join(";"))
            .arg(address.to_string())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| InventoryError::SessionError(format!("{} could not be started: {}", self.program, e)))?;

        let mut transcript = String::from_utf8_lossy(&output.stdout).into_owned();
        transcript.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            let code = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            return Err(InventoryError::SessionError(format!(
                "{} returned with error code {}: {:?}",
                self.program, code, transcript
            )));
        }

        debug!("{} produced {} bytes for {}", self.program, transcript.len(), address);
        Ok(SessionCapture::Transcript(transcript))
    }

    fn name(&self) -> &'static str {
        "jlogin"
    }
}

/// One SSH connection per device, one exec channel per command
#[derive(Debug, Clone)]
pub struct SshSession {
    username: String,
    password: String,
    port: u16,
}

impl SshSession {
    pub fn new(username: impl Into<String>, password: impl Into<String>, port: u16) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            port,
        }
    }
}

#[async_trait::async_trait]
impl DeviceSession for SshSession {
    async fn run_commands(&self, address: IpAddr, commands: &[String]) -> Result<SessionCapture> {
        let host = address.to_string();
        let client = Client::connect(
            (host.as_str(), self.port),
            &self.username,
            AuthMethod::with_password(&self.password),
            ServerCheckMethod::NoCheck,
        )
        .await
        .map_err(|e| InventoryError::SessionError(format!("SSH login to {} failed: {}", host, e)))?;

        // show version first so the artifact can be named after the device
        let hostname = match client.execute("show version").await {
            Ok(version) => hostname_from_version(&version.stdout),
            Err(e) => {
                warn!("show version failed on {}: {}", host, e);
                None
            }
        };

        let mut output = String::new();
        for command in commands {
            let result = client.execute(command).await.map_err(|e| {
                InventoryError::SessionError(format!("'{}' failed on {}: {}", command, host, e))
            })?;
            if result.exit_status != 0 {
                warn!(
                    "'{}' on {} exited with {}: {}",
                    command,
                    host,
                    result.exit_status,
                    result.stderr.trim()
                );
            }
            output.push_str(&result.stdout);
        }

        Ok(SessionCapture::Exec { hostname, output })
    }

    fn name(&self) -> &'static str {
        "ssh"
    }
}
