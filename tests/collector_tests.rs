//! Collection runs against scripted device sessions

use chrono::NaiveDate;
use junos_inventory::collector::session::DEFAULT_COMMAND;
use junos_inventory::collector::{Collector, DeviceSession, HostOutcome, SessionCapture};
use junos_inventory::config::{CollectorConfig, UnresolvedHostname};
use junos_inventory::{InventoryError, Result};
use std::collections::HashMap;
use std::fs;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;
use tempfile::tempdir;

const CHASSIS_TRANSCRIPT: &str = "\
spawn ssh -x -l rancid 10.1.0.5
--- JUNOS 20.4R3-S2.6 Kernel 64-bit  JNPR-12.1-20220106.e2d4c2b_buil
rancid@border-1> set cli screen-length 0
Screen length set to 0

rancid@border-1> show chassis hardware detail | display xml | no-more
<rpc-reply xmlns:junos=\"http://xml.juniper.net/junos/20.4R3/junos\">
    <chassis-inventory>
        <chassis>
            <name>Chassis</name>
            <serial-number>JN1234567ABC</serial-number>
            <description>MX204</description>
        </chassis>
    </chassis-inventory>
</rpc-reply>

rancid@border-1> exit
";

const EMPTY_TRANSCRIPT: &str = "\
spawn ssh -x -l rancid 10.1.0.7
rancid@quiet-1> show chassis hardware detail | display xml | no-more
rancid@quiet-1> exit
";

enum Scripted {
    Transcript(&'static str),
    Exec(Option<&'static str>, &'static str),
    Refuse,
    Hang,
}

struct ScriptedSession {
    devices: HashMap<IpAddr, Scripted>,
}

impl ScriptedSession {
    fn boxed(devices: Vec<(&str, Scripted)>) -> Box<dyn DeviceSession> {
        Box::new(Self {
            devices: devices
                .into_iter()
                .map(|(addr, scripted)| (addr.parse().unwrap(), scripted))
                .collect(),
        })
    }
}

#[async_trait::async_trait]
impl DeviceSession for ScriptedSession {
    async fn run_commands(&self, address: IpAddr, commands: &[String]) -> Result<SessionCapture> {
        assert_eq!(commands, &[DEFAULT_COMMAND.to_string()]);
        match self.devices.get(&address) {
            Some(Scripted::Transcript(text)) => Ok(SessionCapture::Transcript(text.to_string())),
            Some(Scripted::Exec(hostname, output)) => Ok(SessionCapture::Exec {
                hostname: hostname.map(str::to_string),
                output: output.to_string(),
            }),
            Some(Scripted::Hang) => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Err(InventoryError::SessionError("woke up".into()))
            }
            Some(Scripted::Refuse) | None => Err(InventoryError::SessionError(format!(
                "jlogin returned with error code 1: {} refused the connection",
                address
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

fn config_for(output_dir: &Path) -> CollectorConfig {
    CollectorConfig {
        output_dir: output_dir.to_path_buf(),
        session_timeout_secs: 1,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_group_outcomes() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("output");
    let host_list = dir.path().join("router.db");
    fs::write(
        &host_list,
        "10.1.0.5:juniper:up\n10.1.0.6:juniper:up\n10.1.0.7:juniper:up\n10.1.0.8:juniper:up\n10.1.0.9:cisco:up\n",
    )
    .unwrap();

    let session = ScriptedSession::boxed(vec![
        ("10.1.0.5", Scripted::Transcript(CHASSIS_TRANSCRIPT)),
        ("10.1.0.6", Scripted::Refuse),
        ("10.1.0.7", Scripted::Transcript(EMPTY_TRANSCRIPT)),
        ("10.1.0.8", Scripted::Hang),
    ]);
    let mut collector = Collector::new(session, vec![DEFAULT_COMMAND.to_string()], &config_for(&output));

    let summary = collector.collect_group("core", &host_list).await;
    assert_eq!(summary.group, "core");
    assert_eq!(summary.hosts, 4);
    assert_eq!(summary.saved, 1);
    assert_eq!(summary.empty, 1);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.uploaded, 0);

    let artifact = fs::read_to_string(output.join("core").join("border-1.xml")).unwrap();
    assert!(artifact.starts_with("<rpc-reply"));
    assert!(artifact.contains("<serial-number>JN1234567ABC</serial-number>"));
    assert!(artifact.trim_end().ends_with("</rpc-reply>"));
    assert!(!artifact.contains("rancid@"));
    assert!(!output.join("core").join("quiet-1.xml").exists());
}

#[tokio::test]
async fn test_host_outcomes() {
    let dir = tempdir().unwrap();
    let session = ScriptedSession::boxed(vec![
        ("10.1.0.5", Scripted::Transcript(CHASSIS_TRANSCRIPT)),
        ("10.1.0.7", Scripted::Transcript(EMPTY_TRANSCRIPT)),
        ("10.1.0.11", Scripted::Exec(Some("lab-srx1"), "<rpc-reply>srx</rpc-reply>\n")),
        ("10.1.0.12", Scripted::Exec(None, "<rpc-reply>ex</rpc-reply>\n")),
    ]);
    let mut collector = Collector::new(session, vec![DEFAULT_COMMAND.to_string()], &config_for(dir.path()));

    match collector.collect_host("lab", "10.1.0.5".parse().unwrap()).await {
        HostOutcome::Saved { hostname, path, uploaded } => {
            assert_eq!(hostname, "border-1");
            assert_eq!(path, dir.path().join("lab").join("border-1.xml"));
            assert_eq!(uploaded, None);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    assert_eq!(
        collector.collect_host("lab", "10.1.0.7".parse().unwrap()).await,
        HostOutcome::NoUsableOutput {
            hostname: "quiet-1".to_string()
        }
    );

    collector.collect_host("lab", "10.1.0.11".parse().unwrap()).await;
    collector.collect_host("lab", "10.1.0.12".parse().unwrap()).await;
    assert_eq!(
        fs::read_to_string(dir.path().join("lab").join("lab-srx1.xml")).unwrap(),
        "<rpc-reply>srx</rpc-reply>\n"
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("lab").join("10.1.0.12.xml")).unwrap(),
        "<rpc-reply>ex</rpc-reply>\n"
    );

    assert!(matches!(
        collector.collect_host("lab", "10.1.0.99".parse().unwrap()).await,
        HostOutcome::Failed { .. }
    ));
    assert_eq!(collector.store().written().len(), 3);
}

#[tokio::test]
async fn test_unreachable_group_is_empty() {
    let dir = tempdir().unwrap();
    let session = ScriptedSession::boxed(vec![]);
    let mut collector = Collector::new(session, vec![DEFAULT_COMMAND.to_string()], &config_for(dir.path()));

    let summary = collector
        .collect_group("edge", &dir.path().join("missing-router.db"))
        .await;
    assert_eq!(summary.hosts, 0);
    assert_eq!(summary.saved + summary.empty + summary.failed, 0);
    assert!(dir.path().join("edge").is_dir());
}

#[tokio::test]
async fn test_capture_all_when_hostname_unknown() {
    let dir = tempdir().unwrap();
    let transcript = "login: ok\nunexpected banner\n";
    let mut config = config_for(dir.path());

    let session = ScriptedSession::boxed(vec![("10.1.0.20", Scripted::Transcript(transcript))]);
    let mut collector = Collector::new(session, vec![DEFAULT_COMMAND.to_string()], &config);
    assert!(matches!(
        collector.collect_host("lab", "10.1.0.20".parse().unwrap()).await,
        HostOutcome::NoUsableOutput { .. }
    ));

    config.unresolved_hostname = UnresolvedHostname::CaptureAll;
    let session = ScriptedSession::boxed(vec![("10.1.0.20", Scripted::Transcript(transcript))]);
    let mut collector = Collector::new(session, vec![DEFAULT_COMMAND.to_string()], &config);
    collector.collect_host("lab", "10.1.0.20".parse().unwrap()).await;
    assert_eq!(
        fs::read_to_string(dir.path().join("lab").join("10.1.0.20.xml")).unwrap(),
        transcript
    );
}

#[tokio::test]
async fn test_aggregate_file() {
    let dir = tempdir().unwrap();
    let core = dir.path().join("core.db");
    let edge = dir.path().join("edge.db");
    fs::write(&core, "10.1.0.5:juniper:up\n").unwrap();
    fs::write(&edge, "10.1.0.11:juniper:up\n").unwrap();

    let session = ScriptedSession::boxed(vec![
        ("10.1.0.5", Scripted::Transcript(CHASSIS_TRANSCRIPT)),
        ("10.1.0.11", Scripted::Exec(Some("lab-srx1"), "<rpc-reply>srx</rpc-reply>")),
    ]);
    let mut collector = Collector::new(session, vec![DEFAULT_COMMAND.to_string()], &config_for(dir.path()));
    collector.collect_group("core", &core).await;
    collector.collect_group("edge", &edge).await;

    let date = NaiveDate::from_ymd_opt(2024, 11, 30).unwrap();
    let path = collector.write_aggregate(date).unwrap().unwrap();
    assert_eq!(path, dir.path().join("install_base_20241130.txt"));

    let aggregate = fs::read_to_string(path).unwrap();
    assert!(aggregate.contains("JN1234567ABC"));
    assert!(aggregate.ends_with("<rpc-reply>srx</rpc-reply>\n"));
}

// The only test here that forks, so the freshly written script is never
// held open by another thread's child.
#[cfg(unix)]
#[tokio::test]
async fn test_run_collection_with_jlogin() {
    use junos_inventory::collector::run_collection;
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let jlogin = dir.path().join("jlogin");
    fs::write(
        &jlogin,
        "#!/bin/sh\nhost=\"r-$(echo \"$3\" | tr . -)\"\necho \"ops@$host> $2\"\necho \"<rpc-reply>$3</rpc-reply>\"\necho \"ops@$host> exit\"\n",
    )
    .unwrap();
    fs::set_permissions(&jlogin, fs::Permissions::from_mode(0o755)).unwrap();

    let host_list = dir.path().join("router.db");
    fs::write(&host_list, "192.0.2.10:juniper:up\n192.0.2.11:juniper:up\n").unwrap();

    let mut config = config_for(&dir.path().join("output"));
    config.session_timeout_secs = 10;
    config.jlogin_path = jlogin.to_string_lossy().into_owned();
    config.aggregate = true;
    config.groups.insert("Junipers".into(), host_list);

    let summaries = run_collection(&config).await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].saved, 2);

    let artifact = fs::read_to_string(dir.path().join("output").join("Junipers").join("r-192-0-2-10.xml")).unwrap();
    assert_eq!(artifact, "<rpc-reply>192.0.2.10</rpc-reply>\n");

    let aggregates: Vec<_> = fs::read_dir(dir.path().join("output"))
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with("install_base_"))
        .collect();
    assert_eq!(aggregates.len(), 1);
}
