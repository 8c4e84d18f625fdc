use std::{path::Path, process::Command};

use crate::error::{Error, Result, Tool};
use crate::runner::Runner;

pub const KEY_TYPE: &str = "rsa";
pub const KEY_BITS: &str = "4096";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyGenMode {
    /// No passphrase, nothing asked (used right after adding a connection).
    Unattended,
    /// `ssh-keygen` may prompt for a passphrase.
    Interactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Generated,
    Kept,
}

/// Makes sure a key pair exists at `key`.
///
/// An existing key is only replaced when `overwrite` is set, which callers do
/// after the operator confirmed it.
pub fn ensure_key_pair(
    runner: &mut impl Runner,
    key: &Path,
    mode: KeyGenMode,
    overwrite: bool,
) -> Result<KeyOutcome> {
    if key.exists() && !overwrite {
        return Ok(KeyOutcome::Kept);
    }

    let mut cmd = Command::new(Tool::KeyGen.program());
    cmd.args(["-t", KEY_TYPE, "-b", KEY_BITS, "-f"]).arg(key);
    if mode == KeyGenMode::Unattended {
        cmd.args(["-N", ""]);
    }

    let status = runner
        .handoff(&mut cmd)
        .map_err(|e| Error::tool(Tool::KeyGen, e.to_string()))?;
    if !status.success() {
        return Err(Error::tool(Tool::KeyGen, format!("exited with {status}")));
    }

    tracing::debug!(key = %key.display(), ?mode, "generated key pair");
    Ok(KeyOutcome::Generated)
}

/// Installs the public key on `user@host` with `ssh-copy-id`.
pub fn install_public_key(
    runner: &mut impl Runner,
    key: &Path,
    user: &str,
    host: &str,
    port: &str,
) -> Result<()> {
    let mut cmd = Command::new(Tool::KeyCopy.program());
    cmd.arg("-i")
        .arg(key)
        .args(["-p", port])
        .arg(format!("{user}@{host}"));

    let status = runner
        .handoff(&mut cmd)
        .map_err(|e| Error::tool(Tool::KeyCopy, e.to_string()))?;
    if !status.success() {
        return Err(Error::tool(Tool::KeyCopy, format!("exited with {status}")));
    }
    Ok(())
}
