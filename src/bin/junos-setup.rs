use anyhow::Context;
use clap::{Arg, Command};
use colored::*;
use junos_inventory::{
    config::{LoginMethod, DEFAULT_CONFIG_PATH},
    setup,
};
use std::env;
use std::io;
use std::path::PathBuf;

fn main() -> anyhow::Result<()> {
    let matches = Command::new("junos-setup")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Create or update the junos-collect configuration interactively")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file to create or update")
                .default_value(DEFAULT_CONFIG_PATH)
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .get_matches();

    let config_path = matches
        .get_one::<PathBuf>("config")
        .cloned()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let cwd = env::current_dir().context("Unable to determine the working directory")?;
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut out = io::stdout();
    let answers = setup::gather_answers(&mut input, &mut out, &cwd)?;

    if answers.login_method == LoginMethod::Jlogin
        && setup::find_in_path("jlogin", env::var_os("PATH").as_deref()).is_none()
    {
        println!("{}", "[!] Sorry, jlogin was not found in your PATH".bright_red());
        println!("Please make sure that RANCID is installed and that this user");
        println!("has jlogin executable in the PATH.");
        println!("Leaving {} unchanged.", config_path.display());
        return Ok(());
    }

    setup::write_config(&config_path, &answers)
        .with_context(|| format!("Unable to write {}", config_path.display()))?;
    println!(
        "{} {}",
        "[✓] Configuration written to".bright_green(),
        config_path.display().to_string().bright_cyan()
    );
    Ok(())
}
