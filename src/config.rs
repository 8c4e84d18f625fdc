use std::{
    ffi::OsString,
    fs::{self, OpenOptions},
    io,
    path::{Path, PathBuf},
};

use crate::agent::AgentEnv;
use crate::error::{Error, Result};

pub const SSH_DIR: &str = ".ssh";
pub const BACKUP_DIR: &str = "ssh_backup";
pub const CONNECTIONS_FILE: &str = "connections.conf";
pub const PRIVATE_KEY_FILE: &str = "id_rsa";
pub const PUBLIC_KEY_FILE: &str = "id_rsa.pub";

/// Filesystem layout and the agent state inherited from the launching shell.
#[derive(Clone, Debug)]
pub struct Config {
    pub home: PathBuf,
    pub ssh_dir: PathBuf,
    pub connections_file: PathBuf,
    pub private_key: PathBuf,
    pub public_key: PathBuf,
    pub backup_dir: PathBuf,
    pub agent: Option<AgentEnv>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let home = dirs::home_dir().ok_or(Error::HomeDir)?;
        let mut config = Self::from_home(home);
        config.agent = AgentEnv::from_vars(
            std::env::var_os("SSH_AUTH_SOCK"),
            std::env::var_os("SSH_AGENT_PID"),
        );
        Ok(config)
    }

    pub fn from_home(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        let ssh_dir = home.join(SSH_DIR);
        Self {
            connections_file: ssh_dir.join(CONNECTIONS_FILE),
            private_key: ssh_dir.join(PRIVATE_KEY_FILE),
            public_key: ssh_dir.join(PUBLIC_KEY_FILE),
            backup_dir: home.join(BACKUP_DIR),
            ssh_dir,
            home,
            agent: None,
        }
    }

    /// Creates the ssh and backup directories and an empty connections file.
    pub fn init_dirs(&self) -> Result<()> {
        create_private_dir(&self.ssh_dir)?;
        create_private_dir(&self.backup_dir)?;
        if !self.connections_file.exists() {
            create_private_file(&self.connections_file)?;
        }
        Ok(())
    }

    /// Resolves a user-typed path, expanding a leading `~`.
    pub fn expand_path(&self, raw: &str) -> PathBuf {
        match raw {
            "~" => self.home.clone(),
            _ => match raw.strip_prefix("~/") {
                Some(rest) => self.home.join(rest),
                None => PathBuf::from(raw),
            },
        }
    }
}

pub(crate) fn create_private_dir(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o700))?;
    }
    Ok(())
}

pub(crate) fn private_file_options() -> OpenOptions {
    let mut options = OpenOptions::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options
}

fn create_private_file(path: &Path) -> io::Result<()> {
    private_file_options().write(true).create(true).open(path)?;
    Ok(())
}

pub(crate) fn non_empty(value: Option<OsString>) -> Option<OsString> {
    value.filter(|v| !v.is_empty())
}
