//! Storage adapters for the nonce ledger.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::nonce::NonceError;
use crate::persist;

/// `{environment: {chain: {address: next_nonce}}}`
pub type LedgerDocument = BTreeMap<String, BTreeMap<String, BTreeMap<String, u64>>>;

/// Where the ledger document lives. Reads and writes are always whole-document.
pub trait LedgerStorage {
    fn load(&self) -> Result<LedgerDocument, NonceError>;
    fn store(&self, document: &LedgerDocument) -> Result<(), NonceError>;
}

/// In-process storage, for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    document: Mutex<LedgerDocument>,
}

impl MemoryStorage {
    pub fn new(document: LedgerDocument) -> Self {
        Self {
            document: Mutex::new(document),
        }
    }

    /// Copy of the current document.
    pub fn snapshot(&self) -> LedgerDocument {
        self.document
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl LedgerStorage for MemoryStorage {
    fn load(&self) -> Result<LedgerDocument, NonceError> {
        Ok(self.snapshot())
    }

    fn store(&self, document: &LedgerDocument) -> Result<(), NonceError> {
        *self
            .document
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = document.clone();
        Ok(())
    }
}

/// JSON file storage. A missing file is an empty ledger.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LedgerStorage for FileStorage {
    fn load(&self) -> Result<LedgerDocument, NonceError> {
        Ok(persist::read_json::<LedgerDocument, NonceError>(&self.path)?.unwrap_or_default())
    }

    fn store(&self, document: &LedgerDocument) -> Result<(), NonceError> {
        persist::write_json_atomic(&self.path, document)
    }
}
