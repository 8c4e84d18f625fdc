use std::{
    path::{Path, PathBuf},
    process::Command,
};

use chrono::NaiveDateTime;

use crate::config::{create_private_dir, Config, CONNECTIONS_FILE, PRIVATE_KEY_FILE, PUBLIC_KEY_FILE};
use crate::error::{Error, Result, Tool};
use crate::runner::Runner;

const ARCHIVE_PREFIX: &str = "ssh_config_backup_";
const ARCHIVE_SUFFIX: &str = ".tar.gz";
const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

pub fn archive_name(at: NaiveDateTime) -> String {
    format!("{ARCHIVE_PREFIX}{}{ARCHIVE_SUFFIX}", at.format(TIMESTAMP_FORMAT))
}

/// Archives the connections file and key pair into the backup directory.
///
/// Key files that do not exist yet are left out of the archive.
pub fn backup(runner: &mut impl Runner, config: &Config, at: NaiveDateTime) -> Result<PathBuf> {
    create_private_dir(&config.backup_dir)?;
    let archive = config.backup_dir.join(archive_name(at));

    let members = [CONNECTIONS_FILE, PRIVATE_KEY_FILE, PUBLIC_KEY_FILE]
        .into_iter()
        .filter(|name| *name == CONNECTIONS_FILE || config.ssh_dir.join(name).exists());

    let mut cmd = Command::new(Tool::Archive.program());
    cmd.arg("-czf")
        .arg(&archive)
        .arg("-C")
        .arg(&config.ssh_dir)
        .args(members);

    run_archive(runner, &mut cmd)?;
    tracing::debug!(archive = %archive.display(), "backup written");
    Ok(archive)
}

/// Extracts `archive` over the ssh directory. The archive is not inspected
/// before extraction.
pub fn restore(runner: &mut impl Runner, config: &Config, archive: &Path) -> Result<()> {
    if !archive.exists() {
        return Err(Error::NotFound(archive.to_path_buf()));
    }

    let mut cmd = Command::new(Tool::Archive.program());
    cmd.arg("-xzf").arg(archive).arg("-C").arg(&config.ssh_dir);

    run_archive(runner, &mut cmd)?;
    tracing::debug!(archive = %archive.display(), "backup restored");
    Ok(())
}

/// Archives already in the backup directory, oldest first.
pub fn list_backups(config: &Config) -> Vec<PathBuf> {
    let dir = glob::Pattern::escape(&config.backup_dir.to_string_lossy());
    let pattern = format!("{dir}/{ARCHIVE_PREFIX}*{ARCHIVE_SUFFIX}");

    let mut found: Vec<PathBuf> = match glob::glob(&pattern) {
        Ok(paths) => paths.filter_map(|p| p.ok()).collect(),
        Err(e) => {
            tracing::warn!(%e, "bad backup pattern");
            Vec::new()
        }
    };
    found.sort();
    found
}

fn run_archive(runner: &mut impl Runner, cmd: &mut Command) -> Result<()> {
    let output = runner
        .output(cmd)
        .map_err(|e| Error::tool(Tool::Archive, e.to_string()))?;
    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(Error::tool(
        Tool::Archive,
        match stderr.lines().next() {
            Some(line) if !line.trim().is_empty() => line.trim().to_string(),
            _ => format!("exited with {}", output.status),
        },
    ))
}
