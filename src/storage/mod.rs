//! Chunked upload engine for object storage
//!
//! Large artifacts go up as a sequence of bounded-size parts under one
//! multipart session. The session is all-or-nothing: the object becomes
//! visible only on `complete`, and every failure path cancels the session so
//! no partial object is ever left behind.

pub mod mock;
pub mod s3;

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Credential;

/// Default upload part size: 50 MiB
pub const DEFAULT_CHUNK_SIZE: u64 = 50 * 1024 * 1024;

/// Opaque error from a storage backend
#[derive(Debug, Error)]
#[error("{0}")]
pub struct StoreError(pub String);

/// Receipt for one uploaded part, echoed back on completion
#[derive(Debug, Clone)]
pub struct UploadedPart {
    pub part_number: i64,
    pub etag: String,
}

/// Multipart upload protocol surface of an object store
///
/// Every `initiate` must be matched by exactly one `complete` or one `abort`;
/// the `ChunkedUploader` enforces this.
pub trait MultipartStore: Send + Sync {
    /// Open a multipart session, returning its id
    fn initiate(&self, bucket: &str, key: &str) -> Result<String, StoreError>;

    /// Upload one part of an open session
    fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i64,
        body: Vec<u8>,
    ) -> Result<UploadedPart, StoreError>;

    /// Complete the session, making the object visible
    fn complete(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<UploadedPart>,
    ) -> Result<(), StoreError>;

    /// Cancel the session, releasing server-side resources
    fn abort(&self, bucket: &str, key: &str, upload_id: &str) -> Result<(), StoreError>;
}

/// Abstraction over store construction, enabling mocking in tests
pub trait StoreOpener: Send + Sync {
    fn open(&self, credential: &Credential) -> Result<Box<dyn MultipartStore>, StoreError>;
}

/// Failure during a chunked upload
///
/// By the time one of these is returned, any session opened for the transfer
/// has already been cancelled.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("failed to read source file {path:?}: {source}")]
    Source {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to initiate upload session for '{key}': {source}")]
    Initiate {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to upload part {part} of '{key}': {source}")]
    Part {
        key: String,
        part: i64,
        #[source]
        source: StoreError,
    },

    #[error("failed to complete upload session for '{key}': {source}")]
    Complete {
        key: String,
        #[source]
        source: StoreError,
    },
}

/// Number of parts needed for `size` bytes at `chunk_size` bytes per part
///
/// A zero-byte source still gets one (empty) part so the object materializes.
fn chunk_count(size: u64, chunk_size: u64) -> u64 {
    ((size + chunk_size - 1) / chunk_size).max(1)
}

/// Join the bucket path prefix and the object name
fn join_key(prefix: &str, key: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}/{}", prefix, key)
    }
}

/// Uploads one local file to object storage as a multipart session
pub struct ChunkedUploader {
    store: Box<dyn MultipartStore>,
    bucket: String,
    prefix: String,
    chunk_size: u64,
}

impl ChunkedUploader {
    pub fn new(store: Box<dyn MultipartStore>, bucket: &str, prefix: &str) -> Self {
        Self {
            store,
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Override the part size (bytes). Must be nonzero.
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        debug_assert!(chunk_size > 0);
        self.chunk_size = chunk_size;
        self
    }

    /// Upload `source` under `key` (prefixed with the bucket path)
    ///
    /// Parts are sent strictly in order, one at a time. On success the object
    /// is visible with exactly the source's bytes; on failure the session is
    /// cancelled and nothing is visible.
    pub fn upload(&self, source: &Path, key: &str) -> Result<(), UploadError> {
        let object_key = join_key(&self.prefix, key);

        let size = std::fs::metadata(source)
            .map_err(|source_err| UploadError::Source {
                path: source.to_path_buf(),
                source: source_err,
            })?
            .len();
        let count = chunk_count(size, self.chunk_size);

        info!(
            "Uploading {} ({} bytes) to bucket '{}' as '{}' in {} part(s)...",
            source.display(),
            size,
            self.bucket,
            object_key,
            count
        );

        let upload_id = self
            .store
            .initiate(&self.bucket, &object_key)
            .map_err(|source| UploadError::Initiate {
                key: object_key.clone(),
                source,
            })?;

        match self.transfer_parts(source, size, count, &object_key, &upload_id) {
            Ok(parts) => match self.store.complete(&self.bucket, &object_key, &upload_id, parts) {
                Ok(()) => {
                    info!("Upload done.");
                    Ok(())
                }
                Err(source) => {
                    self.cancel(&object_key, &upload_id);
                    Err(UploadError::Complete {
                        key: object_key,
                        source,
                    })
                }
            },
            Err(err) => {
                self.cancel(&object_key, &upload_id);
                Err(err)
            }
        }
    }

    fn transfer_parts(
        &self,
        source: &Path,
        size: u64,
        count: u64,
        object_key: &str,
        upload_id: &str,
    ) -> Result<Vec<UploadedPart>, UploadError> {
        let read_err = |source_err| UploadError::Source {
            path: source.to_path_buf(),
            source: source_err,
        };

        let mut file = File::open(source).map_err(read_err)?;
        let mut parts = Vec::with_capacity(count as usize);

        for part_number in 1..=count {
            let offset = (part_number - 1) * self.chunk_size;
            let length = self.chunk_size.min(size - offset);
            debug!("Sending part {} of {} ({} bytes)", part_number, count, length);

            file.seek(SeekFrom::Start(offset)).map_err(read_err)?;
            let mut body = vec![0u8; length as usize];
            file.read_exact(&mut body).map_err(read_err)?;

            let part = self
                .store
                .upload_part(&self.bucket, object_key, upload_id, part_number as i64, body)
                .map_err(|source| UploadError::Part {
                    key: object_key.to_string(),
                    part: part_number as i64,
                    source,
                })?;
            parts.push(part);
        }

        Ok(parts)
    }

    /// Cancel the session; the original failure is what gets reported, so a
    /// failed cancellation only warns.
    fn cancel(&self, object_key: &str, upload_id: &str) {
        match self.store.abort(&self.bucket, object_key, upload_id) {
            Ok(()) => debug!("Cancelled upload session for '{}'", object_key),
            Err(e) => warn!(
                "Failed to cancel upload session for '{}': {}",
                object_key, e
            ),
        }
    }
}
