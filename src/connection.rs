use std::{fmt, sync::OnceLock};

use regex::Regex;

use crate::error::{Error, Result};

pub const DEFAULT_PORT: &str = "22";
const DELIMITER: char = '|';

fn port_pattern() -> &'static Regex {
    static PORT: OnceLock<Regex> = OnceLock::new();
    PORT.get_or_init(|| Regex::new(r"^[0-9]{1,5}$").expect("port pattern is valid"))
}

/// One saved login target, stored as `name|user|host|port`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Connection {
    pub name: String,
    pub user: String,
    pub host: String,
    pub port: String,
}

impl Connection {
    /// Builds a connection from raw operator input.
    ///
    /// Every field is trimmed. An empty port falls back to [`DEFAULT_PORT`].
    pub fn new(name: &str, user: &str, host: &str, port: &str) -> Result<Self> {
        let name = required("Name", name)?;
        let user = required("Username", user)?;
        let host = required("Host", host)?;
        let port = match port.trim() {
            "" => DEFAULT_PORT.to_string(),
            p if is_valid_port(p) => p.to_string(),
            _ => return Err(Error::validation("Invalid port number")),
        };

        Ok(Self {
            name,
            user,
            host,
            port,
        })
    }

    /// Parses one stored line. Returns `None` for lines that cannot be a record.
    pub fn parse(line: &str) -> Option<Self> {
        let parts: Vec<&str> = line.split(DELIMITER).collect();
        if parts.len() < 3 || parts[..3].iter().any(|p| p.trim().is_empty()) {
            return None;
        }

        let port = match parts.get(3).map(|p| p.trim()) {
            None | Some("") => DEFAULT_PORT,
            Some(p) if is_valid_port(p) => p,
            Some(_) => return None,
        };

        Some(Self {
            name: parts[0].trim().to_string(),
            user: parts[1].trim().to_string(),
            host: parts[2].trim().to_string(),
            port: port.to_string(),
        })
    }

    pub fn serialize(&self) -> String {
        format!("{}|{}|{}|{}", self.name, self.user, self.host, self.port)
    }

    pub fn target(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.target())
    }
}

pub fn is_valid_port(port: &str) -> bool {
    port_pattern().is_match(port)
}

fn required(label: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::validation(format!("{label} cannot be empty")));
    }
    if value.contains(DELIMITER) || value.contains(['\n', '\r']) {
        return Err(Error::validation(format!(
            "{label} cannot contain '{DELIMITER}' or line breaks"
        )));
    }
    Ok(value.to_string())
}
