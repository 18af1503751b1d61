//! In-memory multipart store for tests
//!
//! Records every protocol call, supports injected failures at each stage, and
//! materializes completed objects so tests can assert on visibility and
//! byte-for-byte content. Available for use in integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::{MultipartStore, StoreError, UploadedPart};

/// Recorded store call
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreCall {
    Initiate { key: String },
    UploadPart { key: String, part: i64 },
    Complete { key: String },
    Abort { key: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum SessionState {
    Open,
    Completed,
    Aborted,
}

#[derive(Clone, Debug)]
struct Session {
    key: String,
    parts: Vec<(i64, Vec<u8>)>,
    state: SessionState,
}

/// Mock multipart store
///
/// Clones share state, so a test can hand a clone to the code under test and
/// keep one for assertions.
#[derive(Clone, Default)]
pub struct MockStore {
    calls: Arc<Mutex<Vec<StoreCall>>>,
    sessions: Arc<Mutex<HashMap<String, Session>>>,
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    next_session: Arc<Mutex<u64>>,
    fail_on_initiate: Arc<Mutex<bool>>,
    fail_on_part: Arc<Mutex<Option<i64>>>,
    fail_on_complete: Arc<Mutex<bool>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `initiate` fail
    pub fn fail_on_initiate(&self) {
        *self.fail_on_initiate.lock().unwrap() = true;
    }

    /// Make the given part number fail to upload
    pub fn fail_on_part(&self, part_number: i64) {
        *self.fail_on_part.lock().unwrap() = Some(part_number);
    }

    /// Make `complete` fail
    pub fn fail_on_complete(&self) {
        *self.fail_on_complete.lock().unwrap() = true;
    }

    /// All recorded calls, in order
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Bytes of a completed (visible) object
    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    /// Keys of all completed objects
    pub fn object_keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Lengths of the parts uploaded for `key`, in part-number order
    pub fn part_lengths(&self, key: &str) -> Vec<usize> {
        let sessions = self.sessions.lock().unwrap();
        let mut parts: Vec<(i64, usize)> = sessions
            .values()
            .filter(|s| s.key == key)
            .flat_map(|s| s.parts.iter().map(|(n, body)| (*n, body.len())))
            .collect();
        parts.sort_by_key(|(n, _)| *n);
        parts.into_iter().map(|(_, len)| len).collect()
    }

    /// Sessions that were initiated but neither completed nor aborted
    pub fn open_sessions(&self) -> usize {
        self.sessions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.state == SessionState::Open)
            .count()
    }

    fn record(&self, call: StoreCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl MultipartStore for MockStore {
    fn initiate(&self, _bucket: &str, key: &str) -> Result<String, StoreError> {
        self.record(StoreCall::Initiate {
            key: key.to_string(),
        });

        if *self.fail_on_initiate.lock().unwrap() {
            return Err(StoreError("injected initiate failure".to_string()));
        }

        let mut next = self.next_session.lock().unwrap();
        *next += 1;
        let upload_id = format!("session-{}", *next);

        self.sessions.lock().unwrap().insert(
            upload_id.clone(),
            Session {
                key: key.to_string(),
                parts: Vec::new(),
                state: SessionState::Open,
            },
        );
        Ok(upload_id)
    }

    fn upload_part(
        &self,
        _bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i64,
        body: Vec<u8>,
    ) -> Result<UploadedPart, StoreError> {
        self.record(StoreCall::UploadPart {
            key: key.to_string(),
            part: part_number,
        });

        if *self.fail_on_part.lock().unwrap() == Some(part_number) {
            return Err(StoreError(format!(
                "injected failure on part {}",
                part_number
            )));
        }

        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions
            .get_mut(upload_id)
            .ok_or_else(|| StoreError(format!("unknown upload session '{}'", upload_id)))?;
        if session.state != SessionState::Open {
            return Err(StoreError(format!(
                "upload session '{}' is not open",
                upload_id
            )));
        }
        session.parts.push((part_number, body));

        Ok(UploadedPart {
            part_number,
            etag: format!("etag-{}", part_number),
        })
    }

    fn complete(
        &self,
        _bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<UploadedPart>,
    ) -> Result<(), StoreError> {
        self.record(StoreCall::Complete {
            key: key.to_string(),
        });

        if *self.fail_on_complete.lock().unwrap() {
            return Err(StoreError("injected complete failure".to_string()));
        }

        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions
            .get_mut(upload_id)
            .ok_or_else(|| StoreError(format!("unknown upload session '{}'", upload_id)))?;

        // The caller must acknowledge every uploaded part, in order
        let mut acknowledged: Vec<i64> = parts.iter().map(|p| p.part_number).collect();
        acknowledged.sort_unstable();
        let mut uploaded: Vec<i64> = session.parts.iter().map(|(n, _)| *n).collect();
        uploaded.sort_unstable();
        if acknowledged != uploaded {
            return Err(StoreError(format!(
                "part mismatch on complete: acknowledged {:?}, uploaded {:?}",
                acknowledged, uploaded
            )));
        }

        let mut ordered = session.parts.clone();
        ordered.sort_by_key(|(n, _)| *n);
        let object: Vec<u8> = ordered.into_iter().flat_map(|(_, body)| body).collect();

        session.state = SessionState::Completed;
        self.objects.lock().unwrap().insert(session.key.clone(), object);
        Ok(())
    }

    fn abort(&self, _bucket: &str, key: &str, upload_id: &str) -> Result<(), StoreError> {
        self.record(StoreCall::Abort {
            key: key.to_string(),
        });

        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions
            .get_mut(upload_id)
            .ok_or_else(|| StoreError(format!("unknown upload session '{}'", upload_id)))?;
        session.state = SessionState::Aborted;
        session.parts.clear();
        Ok(())
    }
}

/// Store opener that always hands out clones of one shared mock store
#[derive(Clone, Default)]
pub struct MockOpener {
    pub store: MockStore,
}

impl MockOpener {
    pub fn new(store: MockStore) -> Self {
        Self { store }
    }
}

impl super::StoreOpener for MockOpener {
    fn open(
        &self,
        _credential: &crate::config::Credential,
    ) -> Result<Box<dyn MultipartStore>, StoreError> {
        Ok(Box::new(self.store.clone()))
    }
}
