//! File storage keyed by file ID
use std::path::Path;

use crate::error::StoreError;
use crate::file::File;

/// Storage contract used by the lifecycle service.
///
/// Each call must be atomic for its key: a concurrent `store` and `get` of the
/// same ID never observe a partially written file.
pub trait FileStore: Send + Sync {
    /// Inserts a new file. Fails with [`StoreError::AlreadyExists`] if the ID is taken.
    fn store(&self, file: &File) -> Result<(), StoreError>;
    fn get(&self, id: &str) -> Result<Option<File>, StoreError>;
    fn list(&self) -> Result<Vec<File>, StoreError>;
    /// Removes a file, returning whether it was present.
    fn delete(&self, id: &str) -> Result<bool, StoreError>;
}

/// Files stored as CBOR values in a sled tree.
#[derive(Clone)]
pub struct SledStore {
    instance: sled::Db,
}

impl SledStore {
    pub fn new(instance: sled::Db) -> Self {
        Self { instance }
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Ok(Self::new(sled::open(path)?))
    }

    /// A store removed from disk once dropped.
    pub fn temporary() -> Result<Self, StoreError> {
        Ok(Self::new(sled::Config::new().temporary(true).open()?))
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.instance.flush()?;
        Ok(())
    }
}

impl FileStore for SledStore {
    fn store(&self, file: &File) -> Result<(), StoreError> {
        let value = minicbor::to_vec(file)?;

        // insert only if the key is absent
        self.instance
            .compare_and_swap(file.id.as_bytes(), None as Option<&[u8]>, Some(value))?
            .map_err(|_| StoreError::AlreadyExists(file.id.clone()))
    }

    fn get(&self, id: &str) -> Result<Option<File>, StoreError> {
        match self.instance.get(id.as_bytes())? {
            Some(value) => Ok(Some(minicbor::decode(&value)?)),
            None => Ok(None),
        }
    }

    fn list(&self) -> Result<Vec<File>, StoreError> {
        self.instance
            .iter()
            .values()
            .map(|value| -> Result<File, StoreError> { Ok(minicbor::decode(&value?)?) })
            .collect()
    }

    fn delete(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.instance.remove(id.as_bytes())?.is_some())
    }
}
