//! Service layer API for the file lifecycle
use std::sync::Arc;

use crate::encoding::{self, ContentKind};
use crate::error::{CreateError, FileError};
use crate::file::File;
use crate::lifecycle::FileState;
use crate::metrics::{FileMetrics, NoopMetrics};
use crate::store::FileStore;
use crate::temporal::{self, Clock, SystemClock};
use crate::utils::{IdSource, RandomIds};

/// Creates, serves, validates and deletes files held by a [`FileStore`].
///
/// Holds no locks of its own; every operation goes straight to the store, so
/// the service can be shared across threads behind an `Arc`.
pub struct FileService {
    store: Arc<dyn FileStore>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdSource>,
    metrics: Arc<dyn FileMetrics>,
}

impl FileService {
    pub fn new(store: Arc<dyn FileStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock::new()),
            ids: Arc::new(RandomIds),
            metrics: Arc::new(NoopMetrics),
        }
    }
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
    pub fn with_ids(mut self, ids: Arc<dyn IdSource>) -> Self {
        self.ids = ids;
        self
    }
    pub fn with_metrics(mut self, metrics: Arc<dyn FileMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Load a file from the store
    fn load_file(&self, id: &str) -> Result<File, FileError> {
        self.store
            .get(id)
            .map_err(|e| FileError::storage("get", id, e))?
            .ok_or_else(|| FileError::NotFound(id.to_string()))
    }

    /// Structural and effective-date checks against today's date.
    fn check(&self, file: &File) -> Result<(), FileError> {
        file.validate()?;
        temporal::has_old_batches(file, self.clock.today())
    }

    /// Store a new file, assigning it an ID when it has none.
    ///
    /// A rejected file is not stored, but its (possibly new) ID is returned in
    /// the error so the caller can correlate the submission. Every submission
    /// carrying both routing identifiers is counted, accepted or not.
    pub fn create_file(&self, mut file: File) -> Result<String, CreateError> {
        if !file.origin().is_empty() && !file.destination().is_empty() {
            self.metrics.file_created(file.origin(), file.destination());
        }

        if file.id.is_empty() {
            file.id = self.ids.next_id();
        }
        let id = file.id.clone();
        let reject = |state: FileState, source: FileError| {
            tracing::warn!(file_id = %id, ?state, error = %source, "rejected file");
            CreateError {
                id: id.clone(),
                state,
                source,
            }
        };

        // Reject files with a batch that was supposed to be posted in the past.
        temporal::has_old_batches(&file, self.clock.today())
            .map_err(|e| reject(FileState::Identified, e))?;

        self.store
            .store(&file)
            .map_err(|e| reject(FileState::Validated, FileError::storage("store", &id, e)))?;

        tracing::info!(
            file_id = %id,
            origin = file.origin(),
            destination = file.destination(),
            batches = file.batches.len(),
            iat_batches = file.iat_batches.len(),
            "created file"
        );
        Ok(id)
    }

    /// Decode a submitted payload and create a file from it.
    pub fn submit(&self, bytes: &[u8], content_type: &str) -> Result<String, CreateError> {
        let file = encoding::decode(bytes, content_type).map_err(|source| {
            tracing::warn!(content_type, error = %source, "undecodable submission");
            CreateError {
                id: String::new(),
                state: FileState::Draft,
                source,
            }
        })?;
        self.create_file(file)
    }

    pub fn get_files(&self) -> Result<Vec<File>, FileError> {
        let files = self
            .store
            .list()
            .map_err(|e| FileError::storage("list", "*", e))?;
        tracing::debug!(count = files.len(), "listed files");
        Ok(files)
    }

    pub fn get_file(&self, id: &str) -> Result<File, FileError> {
        let file = self.load_file(id);
        tracing::debug!(file_id = id, found = file.is_ok(), "get file");
        file
    }

    /// The stored file re-serialized in the requested representation.
    pub fn get_file_contents(&self, id: &str, kind: ContentKind) -> Result<Vec<u8>, FileError> {
        let file = self.load_file(id)?;
        let contents = encoding::encode(&file, kind)?;
        tracing::debug!(file_id = id, ?kind, bytes = contents.len(), "rendered file contents");
        Ok(contents)
    }

    /// Re-run the creation checks against the stored content. Never writes.
    pub fn validate_file(&self, id: &str) -> Result<(), FileError> {
        let file = self.load_file(id)?;
        let result = self.check(&file);
        match &result {
            Ok(()) => tracing::debug!(file_id = id, "file is valid"),
            Err(e) => tracing::info!(file_id = id, error = %e, "file failed validation"),
        }
        result
    }

    /// Remove a file. The deletion counter is bumped whether or not it existed.
    pub fn delete_file(&self, id: &str) -> Result<(), FileError> {
        self.metrics.file_deleted();

        let removed = self
            .store
            .delete(id)
            .map_err(|e| FileError::storage("delete", id, e))?;
        if !removed {
            return Err(FileError::NotFound(id.to_string()));
        }

        tracing::info!(file_id = id, "deleted file");
        Ok(())
    }

    /// Where a file sits in its lifecycle. Rejected and deleted files leave
    /// nothing behind in the store, so only stored files are known.
    pub fn file_state(&self, id: &str) -> Result<FileState, FileError> {
        self.load_file(id).map(|_| FileState::Stored)
    }
}
