use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use crate::config::private_file_options;
use crate::connection::Connection;
use crate::error::{Error, Result};

/// Persistence for saved connections.
///
/// Records are addressed by their position in load order.
pub trait Store {
    fn load(&self) -> Result<Vec<Connection>>;

    fn append(&self, conn: &Connection) -> Result<()>;

    /// Removes the record at `index` and returns it.
    fn delete(&self, index: usize) -> Result<Connection>;
}

/// `name|user|host|port` lines in a single text file.
#[derive(Debug, Clone)]
pub struct FlatFileStore {
    path: PathBuf,
}

impl FlatFileStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: PathBuf::from(path.as_ref()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_raw(&self) -> Result<String> {
        match fs::read_to_string(&self.path) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn rewrite(&self, data: &str) -> Result<()> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "store has no parent"))?;

        let mut temp = tempfile::NamedTempFile::new_in(parent)?;
        temp.write_all(data.as_bytes())?;
        temp.flush()?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}

impl Store for FlatFileStore {
    fn load(&self) -> Result<Vec<Connection>> {
        Ok(parse_all(&self.read_raw()?))
    }

    fn append(&self, conn: &Connection) -> Result<()> {
        let existing = self.read_raw()?;
        let needs_newline = !existing.is_empty() && !existing.ends_with('\n');
        let mut file = private_file_options()
            .append(true)
            .create(true)
            .open(&self.path)?;

        let mut line = String::new();
        if needs_newline {
            line.push('\n');
        }
        line.push_str(&conn.serialize());
        line.push('\n');
        file.write_all(line.as_bytes())?;

        tracing::debug!(name = %conn.name, path = %self.path.display(), "appended connection");
        Ok(())
    }

    /// Lines that do not parse as records are written back untouched; only
    /// blank lines are dropped.
    fn delete(&self, index: usize) -> Result<Connection> {
        let data = self.read_raw()?;
        let records = parse_positions(&data);
        let len = records.len();
        let (line_no, removed) = records
            .into_iter()
            .nth(index)
            .ok_or(Error::Index { index, len })?;

        let kept: String = data
            .lines()
            .enumerate()
            .filter(|(n, line)| *n != line_no && !line.trim().is_empty())
            .map(|(_, line)| format!("{line}\n"))
            .collect();
        self.rewrite(&kept)?;

        tracing::debug!(index, name = %removed.name, "deleted connection");
        Ok(removed)
    }
}

pub fn parse_all(data: &str) -> Vec<Connection> {
    parse_positions(data)
        .into_iter()
        .map(|(_, conn)| conn)
        .collect()
}

/// Records paired with the raw line they came from.
fn parse_positions(data: &str) -> Vec<(usize, Connection)> {
    data.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(n, line)| match Connection::parse(line.trim()) {
            Some(conn) => Some((n, conn)),
            None => {
                tracing::warn!(line = n + 1, "skipping malformed connection line");
                None
            }
        })
        .collect()
}
