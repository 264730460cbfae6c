//! RANCID router.db style host lists
//!
//! One record per line, `<address>:<vendor>:<status>`. The discoverer only
//! ever appends whole lines; the collector reads them back.

use crate::{InventoryError, Result};
use log::debug;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const JUNIPER_TAG: &str = "juniper";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostStatus {
    Up,
}

impl fmt::Display for HostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostStatus::Up => write!(f, "up"),
        }
    }
}

impl FromStr for HostStatus {
    type Err = InventoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "up" => Ok(HostStatus::Up),
            other => Err(InventoryError::ParseError(format!("Unknown host status: {}", other))),
        }
    }
}

/// A single host-list record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEntry {
    pub address: IpAddr,
    pub vendor: String,
    pub status: HostStatus,
}

impl HostEntry {
    pub fn juniper(address: IpAddr) -> Self {
        Self {
            address,
            vendor: JUNIPER_TAG.to_string(),
            status: HostStatus::Up,
        }
    }

    pub fn is_juniper_up(&self) -> bool {
        self.vendor == JUNIPER_TAG && self.status == HostStatus::Up
    }
}

impl fmt::Display for HostEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.address, self.vendor, self.status)
    }
}

/// Parse one record. IPv6 addresses contain colons, so the vendor and
/// status are split off from the right.
pub fn parse_line(line: &str) -> Option<HostEntry> {
    let mut fields = line.trim().rsplitn(3, ':');
    let status = fields.next()?.parse::<HostStatus>().ok()?;
    let vendor = fields.next()?;
    let address = fields.next()?.parse::<IpAddr>().ok()?;

    if vendor.is_empty() {
        return None;
    }

    Some(HostEntry {
        address,
        vendor: vendor.to_string(),
        status,
    })
}

/// Addresses of every `juniper:up` record, in file order
pub fn load_hosts<P: AsRef<Path>>(path: P) -> Result<Vec<IpAddr>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        InventoryError::ConfigError(format!(
            "Unable to read host list {}: {}",
            path.display(),
            e
        ))
    })?;

    let mut hosts = Vec::new();
    for line in content.lines() {
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }
        match parse_line(line) {
            Some(entry) if entry.is_juniper_up() => hosts.push(entry.address),
            _ => debug!("Ignoring host list line in {}: {:?}", path.display(), line),
        }
    }

    Ok(hosts)
}

/// The record on the last non-blank line, if it is a `juniper:up` record.
/// A missing file has no last entry.
pub fn last_entry<P: AsRef<Path>>(path: P) -> Result<Option<HostEntry>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    Ok(content
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .and_then(parse_line)
        .filter(HostEntry::is_juniper_up))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Append,
    Overwrite,
}

/// Append-only writer; each record hits the disk before `append` returns.
pub struct HostListWriter {
    file: File,
    path: PathBuf,
}

impl HostListWriter {
    pub fn open<P: AsRef<Path>>(path: P, mode: OpenMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = match mode {
            OpenMode::Overwrite => File::create(&path)?,
            OpenMode::Append => OpenOptions::new().create(true).append(true).open(&path)?,
        };

        // Keep records whole if the previous writer left a partial line.
        if mode == OpenMode::Append && !ends_with_newline(&path)? {
            file.write_all(b"\n")?;
            file.flush()?;
        }

        Ok(Self { file, path })
    }

    pub fn append(&mut self, entry: &HostEntry) -> Result<()> {
        let line = format!("{}\n", entry);
        self.file.write_all(line.as_bytes())?;
        self.file.flush()?;
        self.file.sync_data()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn ends_with_newline(path: &Path) -> Result<bool> {
    let mut file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}
