//! Request history persistence.
//!
//! Every submission writes the history text returned by its command to a
//! plain-text log named `{timestamp}-{suffix}.log`. The random suffix keeps
//! submissions that share a timestamp apart; files are created with
//! `create_new`, so an existing log is never overwritten.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use indexmap::IndexMap;
use rand::Rng;
use thiserror::Error;
use tracing::debug;

use crate::expand_tilde;

/// Range the random file-name suffix is drawn from.
pub const SUFFIX_RANGE: std::ops::RangeInclusive<u32> = 10000..=99999;

/// How many suffixes are tried before giving up.
pub const MAX_SUFFIX_ATTEMPTS: usize = 8;

/// Errors surfaced by history log operations.
#[derive(Debug, Error)]
pub enum HistoryLogError {
    /// I/O failure while creating or writing the log file.
    #[error("history log I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Every candidate file name for this timestamp already existed.
    #[error("no free history log name for timestamp {timestamp}")]
    Exhausted { timestamp: String },
    /// The requested identifier is not a bare log file name.
    #[error("invalid history log id: {id}")]
    InvalidId { id: String },
}

/// Shared trait implemented by history log backends.
pub trait HistoryLog: Send + Sync {
    /// Persist `history` and return the identifier of the new log.
    fn persist(&self, timestamp: &str, history: &str) -> Result<String, HistoryLogError>;

    /// Read a previously persisted log.
    fn read(&self, id: &str) -> Result<Option<String>, HistoryLogError>;
}

/// History logs written as individual files under a root directory.
#[derive(Debug, Clone)]
pub struct FileHistoryLog {
    root: PathBuf,
}

impl FileHistoryLog {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: expand_tilde(&root.as_ref().to_string_lossy()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl HistoryLog for FileHistoryLog {
    fn persist(&self, timestamp: &str, history: &str) -> Result<String, HistoryLogError> {
        fs::create_dir_all(&self.root)?;
        let mut rng = rand::thread_rng();
        for _ in 0..MAX_SUFFIX_ATTEMPTS {
            let id = format!("{timestamp}-{}.log", rng.gen_range(SUFFIX_RANGE));
            let path = self.root.join(&id);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(history.as_bytes())?;
                    debug!(path = %path.display(), bytes = history.len(), "persisted request history");
                    return Ok(id);
                }
                Err(error) if error.kind() == ErrorKind::AlreadyExists => continue,
                Err(error) => return Err(HistoryLogError::Io(error)),
            }
        }
        Err(HistoryLogError::Exhausted {
            timestamp: timestamp.to_string(),
        })
    }

    fn read(&self, id: &str) -> Result<Option<String>, HistoryLogError> {
        validate_id(id)?;
        match fs::read_to_string(self.root.join(id)) {
            Ok(content) => Ok(Some(content)),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(HistoryLogError::Io(error)),
        }
    }
}

/// In-memory history log primarily used for unit testing.
#[derive(Debug, Default)]
pub struct InMemoryHistoryLog {
    entries: Mutex<IndexMap<String, String>>,
}

impl InMemoryHistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HistoryLog for InMemoryHistoryLog {
    fn persist(&self, timestamp: &str, history: &str) -> Result<String, HistoryLogError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let id = format!("{timestamp}-{}.log", 10000 + entries.len());
        entries.insert(id.clone(), history.to_string());
        Ok(id)
    }

    fn read(&self, id: &str) -> Result<Option<String>, HistoryLogError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(id).cloned())
    }
}

fn validate_id(id: &str) -> Result<(), HistoryLogError> {
    let bare = Path::new(id).file_name().is_some_and(|name| name == id);
    if !bare || id.contains(['/', '\\']) || !id.ends_with(".log") {
        return Err(HistoryLogError::InvalidId { id: id.to_string() });
    }
    Ok(())
}
