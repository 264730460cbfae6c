use anyhow::Context;
use clap::{Arg, ArgAction, Command};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use junos_inventory::{
    config::LoggingConfig,
    discovery::{run_discovery, JunosClassifier, ScanContext, SnmpClient},
    hostlist::OpenMode,
    logging,
};
use log::error;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

fn cli() -> Command {
    Command::new("junos-discover")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Find Junos devices over SNMP and record them in a router.db style host list")
        .arg(
            Arg::new("target")
                .value_name("ADDRESS_OR_CIDR")
                .help("Single address or CIDR block to sweep")
                .index(1),
        )
        .arg(
            Arg::new("community")
                .value_name("SNMP_COMMUNITY")
                .help("SNMPv2c community string")
                .index(2),
        )
        .arg(
            Arg::new("host-list")
                .value_name("HOST_LIST")
                .help("Host list to write, e.g. /var/lib/rancid/Junipers/router.db")
                .value_parser(clap::value_parser!(PathBuf))
                .index(3),
        )
        .arg(
            Arg::new("overwrite")
                .long("overwrite")
                .help("Truncate the host list instead of appending to it")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("resume")
                .long("resume")
                .help("Continue after the last address recorded in the host list")
                .conflicts_with("overwrite")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("retries")
                .long("retries")
                .value_name("COUNT")
                .help("Extra SNMP attempts per address")
                .default_value("1")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_name("MS")
                .help("SNMP timeout per attempt in milliseconds")
                .default_value("1000")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .value_name("PORT")
                .help("SNMP agent port")
                .default_value("161")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("progress")
                .long("progress")
                .help("Show a progress bar")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("Log filter, overridden by RUST_LOG")
                .default_value("info"),
        )
        .arg(
            Arg::new("log-file")
                .long("log-file")
                .value_name("FILE")
                .help("Write the log to this file instead of stderr")
                .value_parser(clap::value_parser!(PathBuf)),
        )
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let mut command = cli();
    let matches = command.clone().get_matches();

    let (target, community, host_list) = match (
        matches.get_one::<String>("target"),
        matches.get_one::<String>("community"),
        matches.get_one::<PathBuf>("host-list"),
    ) {
        (Some(t), Some(c), Some(h)) => (t.clone(), c.clone(), h.clone()),
        _ => {
            command.print_help()?;
            println!();
            return Ok(());
        }
    };

    logging::init(&LoggingConfig {
        level: matches
            .get_one::<String>("log-level")
            .cloned()
            .unwrap_or_else(|| "info".to_string()),
        file: matches.get_one::<PathBuf>("log-file").cloned(),
    })
    .context("Unable to initialise logging")?;

    let mode = if matches.get_flag("overwrite") {
        OpenMode::Overwrite
    } else {
        OpenMode::Append
    };

    let context = match ScanContext::new(&target, community, host_list, mode, matches.get_flag("resume")) {
        Ok(context) => context,
        Err(e) => {
            error!("{}", e);
            eprintln!("{} {}", "[!]".bright_red(), e);
            process::exit(1);
        }
    };

    // Resume point comes from the file, so read it before anything is opened for writing
    let addresses = match context.addresses() {
        Ok(addresses) => addresses,
        Err(e) => {
            error!("{}", e);
            eprintln!("{} {}", "[!]".bright_red(), e);
            process::exit(1);
        }
    };

    let mut writer = match context.open_host_list() {
        Ok(writer) => writer,
        Err(e) => {
            error!("Unable to open {}: {}", context.host_list().display(), e);
            return Ok(());
        }
    };

    let client = SnmpClient::new(context.community.clone())
        .with_port(matches.get_one::<u16>("port").copied().unwrap_or(161))
        .with_timeout(Duration::from_millis(
            matches.get_one::<u64>("timeout").copied().unwrap_or(1000),
        ))
        .with_retries(matches.get_one::<u32>("retries").copied().unwrap_or(1));
    let classifier = JunosClassifier::new(client);

    let progress = if matches.get_flag("progress") {
        let total = u64::try_from(addresses.remaining()).unwrap_or(u64::MAX);
        let bar = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        bar
    } else {
        ProgressBar::hidden()
    };

    println!(
        "{} {} {} {}",
        "[~] Sweeping".bright_blue(),
        context.block.to_string().bright_cyan().bold(),
        "into".bright_blue(),
        writer.path().display()
    );

    let summary = run_discovery(addresses, &classifier, &mut writer, &progress)
        .await
        .with_context(|| format!("Discovery of {} stopped", context.block))?;

    println!(
        "{} {} probed, {} Junos, {} other, {} unreachable",
        "[✓]".bright_green(),
        summary.probed,
        summary.junos.to_string().bright_green().bold(),
        summary.not_junos,
        summary.unreachable
    );
    Ok(())
}
