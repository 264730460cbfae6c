//! Interactive configuration wizard behind `junos-setup`

use crate::config::LoginMethod;
use crate::{InventoryError, Result};
use std::ffi::OsStr;
use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use toml::{Table, Value};

pub const DEFAULT_GROUP: &str = "Junipers";

/// Everything the operator told us
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupAnswers {
    pub api_username: String,
    pub api_password: String,
    pub domain: String,
    pub login_method: LoginMethod,
    /// Username and password, only asked for the ssh method
    pub ssh_credentials: Option<(String, String)>,
    pub groups: Vec<(String, PathBuf)>,
}

fn prompt<R: BufRead, W: Write>(input: &mut R, out: &mut W, question: &str) -> Result<String> {
    write!(out, "{}", question)?;
    out.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(InventoryError::ConfigError(
            "Input ended before setup was complete".to_string(),
        ));
    }
    Ok(line.trim().to_string())
}

/// Ask the setup questions. `cwd` anchors the default host-list path.
pub fn gather_answers<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    cwd: &Path,
) -> Result<SetupAnswers> {
    writeln!(out, "The Junos inventory collector uploads to the XON inventory API.")?;
    writeln!(out, "If you do not have API login details yet, please email support@xon.co.za.")?;
    let api_username = prompt(input, out, "API login username: ")?;
    let api_password = prompt(input, out, "API login password: ")?;
    let domain = prompt(input, out, "API login domain id: ")?;
    writeln!(out)?;

    writeln!(out, "Devices can be reached in one of two ways:")?;
    writeln!(out, "1. Use jlogin that comes with the RANCID installation")?;
    writeln!(out, "2. SSH into the device directly from this machine")?;
    writeln!(out, "Note: jlogin is required when connecting via a jumphost")?;
    let login_method = loop {
        match prompt(input, out, "Please select: 1 or 2: ")?.as_str() {
            "1" => break LoginMethod::Jlogin,
            "2" => break LoginMethod::Ssh,
            _ => writeln!(out, "Please make a valid selection, either '1' or '2'")?,
        }
    };

    let ssh_credentials = if login_method == LoginMethod::Ssh {
        writeln!(out, "The SSH credentials are stored in the configuration file,")?;
        writeln!(out, "so make sure that file is readable only by you.")?;
        let username = prompt(input, out, "SSH login username: ")?;
        let password = prompt(input, out, "SSH login password: ")?;
        Some((username, password))
    } else {
        None
    };
    writeln!(out)?;

    writeln!(out, "Each group of devices has its own router.db style host list.")?;
    let mut group = prompt(input, out, "What is the name of your first group? ")?;
    if group.is_empty() {
        group = DEFAULT_GROUP.to_string();
    }
    let default_path = cwd.join("conf").join("router.db");
    writeln!(out, "(Default is {}, created if it does not exist)", default_path.display())?;
    let path = prompt(input, out, &format!("router.db file location for {}: ", group))?;
    let path = if path.is_empty() { default_path } else { PathBuf::from(path) };
    let mut groups = vec![(group, path)];

    let more = prompt(input, out, "Would you like to add more groups? [y/N]: ")?;
    if more.eq_ignore_ascii_case("y") {
        writeln!(out, "To finish, just press Enter on group name")?;
        loop {
            let name = prompt(input, out, "Name of the next group: ")?;
            if name.is_empty() {
                break;
            }
            let path = prompt(input, out, &format!("router.db file location for {}: ", name))?;
            groups.push((name, PathBuf::from(path)));
        }
    }

    Ok(SetupAnswers {
        api_username,
        api_password,
        domain,
        login_method,
        ssh_credentials,
        groups,
    })
}

/// Executable named `program` in one of the `PATH` entries
pub fn find_in_path(program: &str, path_var: Option<&OsStr>) -> Option<PathBuf> {
    let path_var = path_var?;
    std::env::split_paths(path_var)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Apply the answers on top of an existing TOML config, keeping every key
/// the wizard does not manage.
pub fn merge_into_config(existing: Option<&str>, answers: &SetupAnswers) -> Result<String> {
    let mut table = match existing {
        Some(content) if !content.trim().is_empty() => content.parse::<Table>()?,
        _ => Table::new(),
    };

    table.insert("api_username".into(), Value::String(answers.api_username.clone()));
    table.insert("api_password".into(), Value::String(answers.api_password.clone()));
    table.insert("domain".into(), Value::String(answers.domain.clone()));

    let method = match answers.login_method {
        LoginMethod::Jlogin => "jlogin",
        LoginMethod::Ssh => "ssh",
    };
    table.insert("login_method".into(), Value::String(method.into()));

    if let Some((username, password)) = &answers.ssh_credentials {
        table.insert("ssh_username".into(), Value::String(username.clone()));
        table.insert("ssh_password".into(), Value::String(password.clone()));
    }

    let groups = match table.entry("groups").or_insert(Value::Table(Table::new())) {
        Value::Table(groups) => groups,
        _ => {
            return Err(InventoryError::ConfigError(
                "'groups' in the existing configuration is not a table".to_string(),
            ))
        }
    };
    for (name, path) in &answers.groups {
        groups.insert(name.clone(), Value::String(path.to_string_lossy().into_owned()));
    }

    toml::to_string_pretty(&table)
        .map_err(|e| InventoryError::ConfigError(format!("Failed to write TOML: {}", e)))
}

/// Merge the answers into the config file at `path`, creating it if needed
pub fn write_config(path: &Path, answers: &SetupAnswers) -> Result<()> {
    let existing = if path.exists() {
        Some(fs::read_to_string(path)?)
    } else {
        None
    };

    let content = merge_into_config(existing.as_deref(), answers)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, content)?;
    Ok(())
}
