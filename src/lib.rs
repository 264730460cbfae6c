//! junos-inventory - Juniper install-base tooling
//!
//! SNMP discovery of Junos devices into router.db style host lists, and a
//! collector that logs in to every listed device, saves its hardware
//! inventory and relays it to the XON inventory API.

pub mod collector;
pub mod config;
pub mod discovery;
pub mod error;
pub mod hostlist;
pub mod logging;
pub mod setup;

// Re-export commonly used types
pub use collector::{run_collection, Collector, GroupSummary, HostOutcome};
pub use config::{CollectorConfig, LoginMethod, UnresolvedHostname};
pub use discovery::{run_discovery, ScanContext, ScanSummary};
pub use error::InventoryError;
pub use hostlist::{HostEntry, HostListWriter, OpenMode};

pub type Result<T> = std::result::Result<T, InventoryError>;
