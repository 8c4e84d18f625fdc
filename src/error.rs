use std::{fmt, path::PathBuf};

use thiserror::Error;

/// External executables the bridges hand work to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    KeyGen,
    KeyCopy,
    Agent,
    KeyAdd,
    Archive,
    RemoteShell,
}

impl Tool {
    pub fn program(self) -> &'static str {
        match self {
            Tool::KeyGen => "ssh-keygen",
            Tool::KeyCopy => "ssh-copy-id",
            Tool::Agent => "ssh-agent",
            Tool::KeyAdd => "ssh-add",
            Tool::Archive => "tar",
            Tool::RemoteShell => "ssh",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program())
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("selection {index} is out of range ({len} connections)")]
    Index { index: usize, len: usize },

    #[error("{tool} failed: {detail}")]
    Tool { tool: Tool, detail: String },

    #[error("{} not found", .0.display())]
    NotFound(PathBuf),

    #[error("could not determine home directory")]
    HomeDir,
}

impl Error {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub(crate) fn tool(tool: Tool, detail: impl Into<String>) -> Self {
        Error::Tool {
            tool,
            detail: detail.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
