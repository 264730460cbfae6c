//! Inventory collection
//!
//! For every configured group, logs in to each `juniper:up` host of its host
//! list, extracts the command output, saves it under `output/<group>/` and
//! relays it to the inventory API when a client is available. Hosts are
//! handled one at a time and a failing host never stops the run.

pub mod artifacts;
pub mod extract;
pub mod session;
pub mod upload;

use crate::config::{CollectorConfig, LoginMethod, UnresolvedHostname};
use crate::hostlist;
use crate::{InventoryError, Result};
use chrono::{Local, NaiveDate};
use log::{error, info, warn};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use artifacts::ArtifactStore;
pub use extract::{extract_output, resolve_hostname, ExtractState, OutputExtractor};
pub use session::{load_commands, DeviceSession, JloginSession, SessionCapture, SshSession};
pub use upload::{ApiResponse, InventoryClient};

/// What happened to one host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOutcome {
    /// Artifact written. `uploaded` is `None` when no API client exists.
    Saved {
        hostname: String,
        path: PathBuf,
        uploaded: Option<bool>,
    },
    /// The session worked but nothing between the prompts was captured
    NoUsableOutput { hostname: String },
    /// Login, timeout or write failure
    Failed { reason: String },
}

/// Per-group counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupSummary {
    pub group: String,
    pub hosts: usize,
    pub saved: usize,
    pub empty: usize,
    pub failed: usize,
    pub uploaded: usize,
    pub upload_failures: usize,
}

impl GroupSummary {
    fn new(group: &str) -> Self {
        Self {
            group: group.to_string(),
            ..Default::default()
        }
    }

    fn record(&mut self, outcome: &HostOutcome) {
        match outcome {
            HostOutcome::Saved { uploaded, .. } => {
                self.saved += 1;
                match uploaded {
                    Some(true) => self.uploaded += 1,
                    Some(false) => self.upload_failures += 1,
                    None => {}
                }
            }
            HostOutcome::NoUsableOutput { .. } => self.empty += 1,
            HostOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

pub struct Collector {
    session: Box<dyn DeviceSession>,
    commands: Vec<String>,
    timeout: Duration,
    unresolved: UnresolvedHostname,
    store: ArtifactStore,
    api: Option<InventoryClient>,
}

impl Collector {
    pub fn new(session: Box<dyn DeviceSession>, commands: Vec<String>, config: &CollectorConfig) -> Self {
        Self {
            session,
            commands,
            timeout: config.session_timeout(),
            unresolved: config.unresolved_hostname,
            store: ArtifactStore::new(&config.output_dir),
            api: None,
        }
    }

    pub fn with_api(mut self, api: Option<InventoryClient>) -> Self {
        self.api = api;
        self
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Session, extraction, artifact and upload for one host
    pub async fn collect_host(&mut self, group: &str, address: IpAddr) -> HostOutcome {
        info!("Connecting to: {}", address);

        let capture = match tokio::time::timeout(
            self.timeout,
            self.session.run_commands(address, &self.commands),
        )
        .await
        {
            Ok(Ok(capture)) => capture,
            Ok(Err(e)) => {
                error!("[{}] {} via {}: {}", group, address, self.session.name(), e);
                return HostOutcome::Failed { reason: e.to_string() };
            }
            Err(_) => {
                let e = InventoryError::TimeoutError(format!(
                    "{} did not finish within {:?}",
                    address, self.timeout
                ));
                error!("[{}] {} via {}: {}", group, address, self.session.name(), e);
                return HostOutcome::Failed { reason: e.to_string() };
            }
        };

        let address_text = address.to_string();
        let (hostname, output) = match capture {
            SessionCapture::Transcript(transcript) => {
                let hostname = resolve_hostname(&transcript);
                let output =
                    extract_output(&transcript, hostname.as_deref(), &address_text, self.unresolved);
                (hostname, output)
            }
            SessionCapture::Exec { hostname, output } => (hostname, output),
        };
        let hostname = hostname.unwrap_or_else(|| address_text.clone());

        if output.trim().is_empty() {
            warn!(
                "[{}] {}",
                group,
                InventoryError::NoUsableOutput(format!("{} ({})", hostname, address))
            );
            return HostOutcome::NoUsableOutput { hostname };
        }

        let path = match self.store.write_device(group, &hostname, &output) {
            Ok(path) => path,
            Err(e) => {
                error!("[{}] {}: unable to save output: {}", group, address, e);
                return HostOutcome::Failed { reason: e.to_string() };
            }
        };
        info!("[{}] Saved {} ({}) to {}", group, hostname, address, path.display());

        let uploaded = match &self.api {
            Some(api) => match api.upload_device(group, &hostname, address, &output).await {
                Ok(response) => {
                    info!("[{}] Uploaded {} (status {})", group, hostname, response.status);
                    Some(true)
                }
                Err(e) => {
                    error!("[{}] Upload of {} failed: {}", group, hostname, e);
                    Some(false)
                }
            },
            None => None,
        };

        HostOutcome::Saved {
            hostname,
            path,
            uploaded,
        }
    }

    /// Every `juniper:up` host of one group's host list
    pub async fn collect_group(&mut self, group: &str, host_list: &Path) -> GroupSummary {
        info!("Starting with: {}", group);
        let mut summary = GroupSummary::new(group);

        let hosts = match hostlist::load_hosts(host_list) {
            Ok(hosts) => hosts,
            Err(e) => {
                error!("[{}] {}", group, e);
                Vec::new()
            }
        };
        summary.hosts = hosts.len();

        if let Err(e) = self.store.prepare_group(group) {
            error!("[{}] Unable to create output directory: {}", group, e);
        }

        for address in hosts {
            let outcome = self.collect_host(group, address).await;
            summary.record(&outcome);
        }

        info!(
            "[{}] {} hosts: {} saved, {} without output, {} failed",
            group, summary.hosts, summary.saved, summary.empty, summary.failed
        );
        summary
    }

    pub fn write_aggregate(&self, date: NaiveDate) -> Result<Option<PathBuf>> {
        self.store.write_aggregate(date)
    }
}

/// Authenticate when credentials are configured. Failure means local-only.
pub async fn connect_api(config: &CollectorConfig) -> Option<InventoryClient> {
    let credentials = config.upload_credentials()?;

    match InventoryClient::authenticate(&credentials).await {
        Ok(client) => Some(client),
        Err(e) => {
            error!(
                "Unable to connect to the inventory API at {}: {}. Check connectivity and that the API credentials are valid.",
                credentials.url, e
            );
            info!("Only logging results locally");
            None
        }
    }
}

/// Session implementation for the configured login method
pub fn session_for(config: &CollectorConfig) -> Result<Box<dyn DeviceSession>> {
    match config.login_method {
        LoginMethod::Jlogin => Ok(Box::new(JloginSession::new(config.jlogin_path.clone()))),
        LoginMethod::Ssh => {
            let (username, password) = match (&config.ssh_username, &config.ssh_password) {
                (Some(u), Some(p)) => (u.clone(), p.clone()),
                _ => {
                    return Err(InventoryError::ConfigError(
                        "ssh_username and ssh_password are required for the ssh login method".to_string(),
                    ))
                }
            };
            Ok(Box::new(SshSession::new(username, password, config.ssh_port)))
        }
    }
}

/// Run the collector over every configured group
pub async fn run_collection(config: &CollectorConfig) -> Result<Vec<GroupSummary>> {
    config.validate()?;

    let api = connect_api(config).await;
    let commands = load_commands(config.commands_file.as_deref())?;
    let session = session_for(config)?;
    info!(
        "Collecting with {} ({} command(s)) from {} group(s)",
        session.name(),
        commands.len(),
        config.groups.len()
    );

    let mut collector = Collector::new(session, commands, config).with_api(api);
    let mut summaries = Vec::with_capacity(config.groups.len());
    for (group, host_list) in &config.groups {
        summaries.push(collector.collect_group(group, host_list).await);
    }

    if config.aggregate {
        if let Err(e) = collector.write_aggregate(Local::now().date_naive()) {
            error!("Unable to write aggregate file: {}", e);
        }
    }

    Ok(summaries)
}
