use anyhow::Context;
use clap::{Arg, Command};
use colored::*;
use junos_inventory::{
    collector::run_collection,
    config::{CollectorConfig, DEFAULT_CONFIG_PATH},
    logging,
};
use std::path::PathBuf;
use std::process;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let matches = Command::new("junos-collect")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Collect hardware inventory from every Junos device in the configured host lists")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file (TOML, or JSON with a .json extension)")
                .default_value(DEFAULT_CONFIG_PATH)
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .get_matches();

    let config_path = matches
        .get_one::<PathBuf>("config")
        .cloned()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let config = match CollectorConfig::from_file(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", "[!]".bright_red(), e);
            eprintln!("Run junos-setup to create {}", config_path.display());
            process::exit(1);
        }
    };

    logging::init(&config.logging).context("Unable to initialise logging")?;

    let summaries = match run_collection(&config).await {
        Ok(summaries) => summaries,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("{} {}", "[!]".bright_red(), e);
            process::exit(1);
        }
    };

    for summary in &summaries {
        let mut line = format!(
            "{} {}: {} hosts, {} saved, {} without output, {} failed",
            "[✓]".bright_green(),
            summary.group.bright_cyan().bold(),
            summary.hosts,
            summary.saved,
            summary.empty,
            summary.failed
        );
        if summary.uploaded + summary.upload_failures > 0 {
            line.push_str(&format!(
                ", {} uploaded, {} upload failures",
                summary.uploaded, summary.upload_failures
            ));
        }
        println!("{}", line);
    }

    Ok(())
}
