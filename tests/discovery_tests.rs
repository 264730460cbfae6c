//! Discovery sweep and resume tests

use indicatif::ProgressBar;
use junos_inventory::discovery::range::{parse_block, resume_point, AddressRange};
use junos_inventory::discovery::{run_discovery, JunosClassifier, ScanContext, SystemDescriptionProbe};
use junos_inventory::hostlist::{self, OpenMode};
use junos_inventory::{InventoryError, Result};
use proptest::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use tempfile::tempdir;

const MX_DESCR: &str = "Juniper Networks, Inc. mx480 internet router, kernel JUNOS 21.4R3-S5.4, Build date: 2023-08-10";
const EX_DESCR: &str = "Juniper Networks, Inc. ex4300-48t Ethernet Switch, kernel JUNOS 18.4R2-S3.2";
const CISCO_DESCR: &str = "Cisco IOS Software, C2960 Software (C2960-LANBASEK9-M), Version 15.0(2)SE11";

/// Answers from a fixed table; unknown addresses time out
struct ScriptedProbe {
    answers: HashMap<IpAddr, &'static str>,
}

impl ScriptedProbe {
    fn new(answers: &[(&str, &'static str)]) -> Self {
        Self {
            answers: answers
                .iter()
                .map(|(addr, descr)| (addr.parse().unwrap(), *descr))
                .collect(),
        }
    }
}

#[async_trait::async_trait]
impl SystemDescriptionProbe for ScriptedProbe {
    async fn system_description(&self, target: IpAddr) -> Result<String> {
        self.answers
            .get(&target)
            .map(|descr| descr.to_string())
            .ok_or_else(|| InventoryError::TimeoutError(format!("no SNMP response from {}", target)))
    }
}

fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

#[tokio::test]
async fn test_sweep_records_responding_junos() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("router.db");

    let context = ScanContext::new("192.0.2.0/30", "public", &path, OpenMode::Overwrite, false).unwrap();
    let classifier = JunosClassifier::new(ScriptedProbe::new(&[
        ("192.0.2.1", MX_DESCR),
        ("192.0.2.2", EX_DESCR),
    ]));

    let addresses = context.addresses().unwrap();
    let mut writer = context.open_host_list().unwrap();
    let summary = run_discovery(addresses, &classifier, &mut writer, &ProgressBar::hidden())
        .await
        .unwrap();

    assert_eq!(summary.probed, 4);
    assert_eq!(summary.junos, 2);
    assert_eq!(summary.not_junos, 0);
    assert_eq!(summary.unreachable, 2);
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "192.0.2.1:juniper:up\n192.0.2.2:juniper:up\n"
    );
    assert_eq!(
        hostlist::load_hosts(&path).unwrap(),
        vec![ip("192.0.2.1"), ip("192.0.2.2")]
    );
}

#[tokio::test]
async fn test_resume_after_interruption() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("router.db");
    let answers = [
        ("10.20.0.1", MX_DESCR),
        ("10.20.0.2", CISCO_DESCR),
        ("10.20.0.5", EX_DESCR),
        ("10.20.0.6", MX_DESCR),
    ];

    // The first run died right after recording 10.20.0.1
    let prefix = "# edge routers\n10.20.0.1:juniper:up\n";
    fs::write(&path, prefix).unwrap();

    let context = ScanContext::new("10.20.0.0/29", "public", &path, OpenMode::Append, true).unwrap();
    let probe = ScriptedProbe::new(&answers);
    let classifier = JunosClassifier::new(probe);

    let addresses = context.addresses().unwrap();
    assert_eq!(addresses.remaining(), 6);
    let mut writer = context.open_host_list().unwrap();
    let summary = run_discovery(addresses, &classifier, &mut writer, &ProgressBar::hidden())
        .await
        .unwrap();
    assert_eq!(summary.probed, 6);
    assert_eq!(summary.junos, 2);

    let content = fs::read_to_string(&path).unwrap();
    assert!(content.starts_with(prefix));
    assert_eq!(
        content,
        "# edge routers\n10.20.0.1:juniper:up\n10.20.0.5:juniper:up\n10.20.0.6:juniper:up\n"
    );

    let again = ScanContext::new("10.20.0.0/29", "public", &path, OpenMode::Append, true).unwrap();
    assert_eq!(again.addresses().unwrap().collect::<Vec<_>>(), vec![ip("10.20.0.7")]);

    // A block whose last address is already recorded has nothing left
    let finished = ScanContext::new("10.20.0.6", "public", &path, OpenMode::Append, true).unwrap();
    assert_eq!(finished.addresses().unwrap().remaining(), 0);
}

#[tokio::test]
async fn test_resume_rejects_foreign_host_list() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("router.db");
    fs::write(&path, "172.16.5.9:juniper:up\n").unwrap();

    let context = ScanContext::new("10.20.0.0/29", "public", &path, OpenMode::Append, true).unwrap();
    let err = context.addresses().unwrap_err();
    assert!(err.is_fatal_at_startup());
    assert!(matches!(err, InventoryError::ResumeOutOfRange { .. }));
}

#[test]
fn test_resume_without_usable_last_line_starts_over() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("router.db");
    fs::write(&path, "10.20.0.1:juniper:up\n10.20.0.3:cisco:up\n").unwrap();

    let context = ScanContext::new("10.20.0.0/30", "public", &path, OpenMode::Append, true).unwrap();
    assert_eq!(context.addresses().unwrap().remaining(), 4);

    let missing = ScanContext::new("10.20.0.0/30", "public", dir.path().join("none.db"), OpenMode::Append, true)
        .unwrap();
    assert_eq!(missing.addresses().unwrap().remaining(), 4);
}

#[test]
fn test_resume_conflicts_with_overwrite() {
    let result = ScanContext::new("10.20.0.0/30", "public", "router.db", OpenMode::Overwrite, true);
    assert!(matches!(result, Err(InventoryError::ConfigError(_))));

    let result = ScanContext::new("10.20.0.0/40", "public", "router.db", OpenMode::Append, false);
    assert!(matches!(result, Err(InventoryError::InvalidTarget(_))));
}

#[tokio::test]
async fn test_append_repairs_partial_line() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("router.db");
    fs::write(&path, "10.20.0.1:juniper:up").unwrap();

    let context = ScanContext::new("10.30.0.1", "public", &path, OpenMode::Append, false).unwrap();
    let classifier = JunosClassifier::new(ScriptedProbe::new(&[("10.30.0.1", EX_DESCR)]));
    let mut writer = context.open_host_list().unwrap();
    run_discovery(context.addresses().unwrap(), &classifier, &mut writer, &ProgressBar::hidden())
        .await
        .unwrap();

    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "10.20.0.1:juniper:up\n10.30.0.1:juniper:up\n"
    );
}

proptest! {
    #[test]
    fn prop_resume_continues_full_sweep(base in any::<u32>(), prefix in 24u8..=32, offset in any::<u32>()) {
        let block = parse_block(&format!("{}/{}", Ipv4Addr::from(base), prefix)).unwrap();
        let full: Vec<IpAddr> = AddressRange::new(&block).collect();
        let split = offset as usize % full.len();

        let resumed: Vec<IpAddr> = AddressRange::resume_after(&block, full[split]).unwrap().collect();
        prop_assert_eq!(&resumed[..], &full[split + 1..]);

        let next = resume_point(&block, full[split]).unwrap();
        prop_assert_eq!(next, full.get(split + 1).copied());
    }

    #[test]
    fn prop_resume_outside_block_fails(base in any::<u32>(), prefix in 8u8..=30, outside in any::<u32>()) {
        let block = parse_block(&format!("{}/{}", Ipv4Addr::from(base), prefix)).unwrap();
        let recorded = IpAddr::V4(Ipv4Addr::from(outside));
        prop_assume!(!block.contains(recorded));

        // The one address right before the block resumes at its first address
        let first = block.ip();
        match AddressRange::resume_after(&block, recorded) {
            Ok(mut range) => prop_assert_eq!(range.next(), Some(first)),
            Err(e) => prop_assert!(e.is_fatal_at_startup()),
        }
    }
}
