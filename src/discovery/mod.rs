//! Junos device discovery
//!
//! Walks a CIDR block, asks every address for its sysDescr over SNMP and
//! appends each Junos device to a router.db style host list as soon as it
//! is confirmed, so an interrupted sweep can resume from the file.

pub mod classifier;
pub mod range;
pub mod snmp;

use crate::hostlist::{self, HostEntry, HostListWriter, OpenMode};
use crate::{InventoryError, Result};
use indicatif::ProgressBar;
use ipnetwork::IpNetwork;
use log::info;
use std::path::{Path, PathBuf};

pub use classifier::{Classification, JunosClassifier, SystemDescriptionProbe};
pub use range::AddressRange;
pub use snmp::SnmpClient;

/// Everything one discovery run needs, built once from the arguments
#[derive(Debug, Clone)]
pub struct ScanContext {
    pub block: IpNetwork,
    pub community: String,
    pub host_list: PathBuf,
    pub mode: OpenMode,
    pub resume: bool,
}

impl ScanContext {
    pub fn new(
        target: &str,
        community: impl Into<String>,
        host_list: impl Into<PathBuf>,
        mode: OpenMode,
        resume: bool,
    ) -> Result<Self> {
        if resume && mode == OpenMode::Overwrite {
            return Err(InventoryError::ConfigError(
                "Cannot resume a scan while overwriting the host list".to_string(),
            ));
        }

        Ok(Self {
            block: range::parse_block(target)?,
            community: community.into(),
            host_list: host_list.into(),
            mode,
            resume,
        })
    }

    /// Addresses still to probe. Reads the host list when resuming, so call
    /// this before `open_host_list` truncates anything.
    pub fn addresses(&self) -> Result<AddressRange> {
        if !self.resume {
            return Ok(AddressRange::new(&self.block));
        }

        match hostlist::last_entry(&self.host_list)? {
            Some(last) => {
                let range = AddressRange::resume_after(&self.block, last.address)?;
                info!(
                    "Resuming {} after {} ({} addresses left)",
                    self.block,
                    last.address,
                    range.remaining()
                );
                Ok(range)
            }
            None => {
                info!(
                    "No resume point in {}, scanning {} from the start",
                    self.host_list.display(),
                    self.block
                );
                Ok(AddressRange::new(&self.block))
            }
        }
    }

    pub fn open_host_list(&self) -> Result<HostListWriter> {
        HostListWriter::open(&self.host_list, self.mode)
    }

    pub fn host_list(&self) -> &Path {
        &self.host_list
    }
}

/// Per-run counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub probed: usize,
    pub junos: usize,
    pub not_junos: usize,
    pub unreachable: usize,
}

/// Probe every address in order, recording each Junos device immediately.
///
/// Per-address failures are counted and skipped; only a failed write to the
/// host list ends the run early.
pub async fn run_discovery<P: SystemDescriptionProbe>(
    addresses: AddressRange,
    classifier: &JunosClassifier<P>,
    writer: &mut HostListWriter,
    progress: &ProgressBar,
) -> Result<ScanSummary> {
    let mut summary = ScanSummary::default();

    for address in addresses {
        progress.set_message(address.to_string());
        summary.probed += 1;

        match classifier.classify(address).await {
            Classification::Junos { .. } => {
                writer.append(&HostEntry::juniper(address))?;
                summary.junos += 1;
            }
            Classification::NotJunos { .. } => summary.not_junos += 1,
            Classification::Unreachable { .. } => summary.unreachable += 1,
        }

        progress.inc(1);
    }

    progress.finish_and_clear();
    info!(
        "Discovery finished: {} probed, {} Junos, {} other, {} unreachable",
        summary.probed, summary.junos, summary.not_junos, summary.unreachable
    );
    Ok(summary)
}
