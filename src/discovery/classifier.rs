//! Junos detection from the SNMP system description

use crate::Result;
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use std::net::IpAddr;

static JUNOS_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"JUNOS ([^ ]+)").expect("JUNOS marker regex"));

/// Source of a device's sysDescr text
#[async_trait::async_trait]
pub trait SystemDescriptionProbe: Send + Sync {
    async fn system_description(&self, target: IpAddr) -> Result<String>;
}

/// Outcome of probing one address. None of them stop a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Junos { version: String },
    NotJunos { description: String },
    Unreachable { reason: String },
}

impl Classification {
    pub fn is_junos(&self) -> bool {
        matches!(self, Classification::Junos { .. })
    }
}

/// Junos release named in a sysDescr string, e.g. `21.4R3-S5.4`
pub fn junos_version(description: &str) -> Option<&str> {
    JUNOS_MARKER
        .captures(description)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim_end_matches(','))
}

pub struct JunosClassifier<P> {
    probe: P,
}

impl<P: SystemDescriptionProbe> JunosClassifier<P> {
    pub fn new(probe: P) -> Self {
        Self { probe }
    }

    pub async fn classify(&self, target: IpAddr) -> Classification {
        match self.probe.system_description(target).await {
            Ok(description) => match junos_version(&description) {
                Some(version) => {
                    info!("Found Juniper at {} (JUNOS {})", target, version);
                    Classification::Junos {
                        version: version.to_string(),
                    }
                }
                None => {
                    info!("Skipping {}: Not Junos", target);
                    debug!("{} sysDescr: {}", target, description);
                    Classification::NotJunos { description }
                }
            },
            Err(e) => {
                info!("Skipping: {}: {}", target, e);
                Classification::Unreachable {
                    reason: e.to_string(),
                }
            }
        }
    }
}
