// Ledger Storage
//
// Durability contract for the commit ledger. The whole ledger is
// read and replaced at once; there is no partial update.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use tracing::{debug, warn};

use super::Ledger;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("ledger store {path} is unreadable: {reason}")]
    Unreadable { path: PathBuf, reason: String },

    #[error("failed to write ledger store {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to lock ledger store {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize ledger: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Exclusive hold on a store for one load-mutate-save cycle.
///
/// Released when dropped.
#[derive(Debug)]
pub struct StoreLock {
    _file: Option<File>,
}

impl StoreLock {
    /// A lock for stores that serialize access some other way.
    pub fn unguarded() -> Self {
        Self { _file: None }
    }
}

/// Storage backend for the ledger.
///
/// Implementations must:
/// - preserve entry order exactly
/// - make `save` atomic (readers see the old or the new ledger, never a mix)
/// - round-trip losslessly
pub trait LedgerStore: Send + Sync {
    /// Strict read. A store that does not exist yet is an empty ledger.
    fn read(&self) -> Result<Ledger, StoreError>;

    /// Replace the persisted ledger.
    fn save(&self, ledger: &Ledger) -> Result<(), StoreError>;

    /// Acquire the exclusive lock guarding a full read-modify-write.
    fn lock(&self) -> Result<StoreLock, StoreError>;

    /// Lenient read: an unreadable store degrades to an empty history.
    fn load(&self) -> Ledger {
        match self.read() {
            Ok(ledger) => ledger,
            Err(err) => {
                warn!(error = %err, "ledger store unreadable, starting from empty history");
                Ledger::default()
            }
        }
    }
}

/// In-process store, mainly for tests.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    ledger: Mutex<Ledger>,
}

impl InMemoryLedgerStore {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            ledger: Mutex::new(ledger),
        }
    }

    pub fn snapshot(&self) -> Ledger {
        self.ledger.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn read(&self) -> Result<Ledger, StoreError> {
        Ok(self.snapshot())
    }

    fn save(&self, ledger: &Ledger) -> Result<(), StoreError> {
        *self.ledger.lock().unwrap_or_else(|e| e.into_inner()) = ledger.clone();
        Ok(())
    }

    fn lock(&self) -> Result<StoreLock, StoreError> {
        Ok(StoreLock::unguarded())
    }
}

/// JSON file store.
///
/// Layout is a bare array of entries, indented by four spaces.
/// A sibling `<name>.lock` file carries the advisory lock.
#[derive(Debug, Clone)]
pub struct FileLedgerStore {
    path: PathBuf,
}

impl FileLedgerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }

    fn encode(ledger: &Ledger) -> Result<Vec<u8>, StoreError> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        ledger.serialize(&mut ser)?;
        Ok(buf)
    }

    fn write_failed(&self, source: io::Error) -> StoreError {
        StoreError::WriteFailed {
            path: self.path.clone(),
            source,
        }
    }
}

impl LedgerStore for FileLedgerStore {
    fn read(&self) -> Result<Ledger, StoreError> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no ledger store yet");
                return Ok(Ledger::default());
            }
            Err(err) => {
                return Err(StoreError::Unreadable {
                    path: self.path.clone(),
                    reason: err.to_string(),
                })
            }
        };

        let ledger: Ledger =
            serde_json::from_slice(&data).map_err(|err| StoreError::Unreadable {
                path: self.path.clone(),
                reason: err.to_string(),
            })?;

        debug!(path = %self.path.display(), entries = ledger.len(), "ledger loaded");
        Ok(ledger)
    }

    fn save(&self, ledger: &Ledger) -> Result<(), StoreError> {
        let bytes = Self::encode(ledger)?;

        let mut tmp =
            tempfile::NamedTempFile::new_in(self.parent_dir()).map_err(|e| self.write_failed(e))?;
        tmp.write_all(&bytes).map_err(|e| self.write_failed(e))?;
        tmp.as_file().sync_all().map_err(|e| self.write_failed(e))?;
        tmp.persist(&self.path)
            .map_err(|e| self.write_failed(e.error))?;

        debug!(path = %self.path.display(), entries = ledger.len(), "ledger saved");
        Ok(())
    }

    fn lock(&self) -> Result<StoreLock, StoreError> {
        let path = self.lock_path();
        let lock_err = |source| StoreError::Lock {
            path: path.clone(),
            source,
        };

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(lock_err)?;
        file.lock().map_err(lock_err)?;

        debug!(path = %path.display(), "ledger store locked");
        Ok(StoreLock { _file: Some(file) })
    }
}
