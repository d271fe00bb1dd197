//! In-memory store double for tests.
//!
//! `MockStore` implements both store traits over hash maps, counts calls per
//! operation, and can be scripted to fail specific operations with a chosen
//! error class. It is public so embedding callers can drive the pipeline in
//! their own tests without a live endpoint.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::{Map, Value};

use super::types::{DriveItem, FileStore, ListStore, RawListItem, SearchHit};
use super::StoreError;

// Operation names used for call counting and failure scripting.
pub const OP_LIST_ITEMS: &str = "list_items";
pub const OP_SET_PROCESSED: &str = "set_processed";
pub const OP_ITEM_BY_PATH: &str = "item_by_path";
pub const OP_ITEM_BY_ID: &str = "item_by_id";
pub const OP_SEARCH: &str = "search";
pub const OP_DOWNLOAD: &str = "download";
pub const OP_UPLOAD: &str = "upload";

/// Error class to inject for a scripted failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Connection,
    Unauthorized,
    Forbidden,
    NotFound,
    ServerError,
}

impl FailureKind {
    fn to_error(self, operation: &str) -> StoreError {
        let msg = format!("scripted failure in {operation}");
        match self {
            FailureKind::Connection => StoreError::Connection(msg),
            FailureKind::Unauthorized => StoreError::Unauthorized(msg),
            FailureKind::Forbidden => StoreError::Forbidden(msg),
            FailureKind::NotFound => StoreError::NotFound(msg),
            FailureKind::ServerError => StoreError::Api {
                status: 503,
                body: msg,
            },
        }
    }
}

#[derive(Default)]
pub struct MockStore {
    items: Mutex<Vec<RawListItem>>,
    processed: Mutex<Vec<String>>,
    files_by_path: Mutex<HashMap<(String, String), DriveItem>>,
    files_by_id: Mutex<HashMap<String, DriveItem>>,
    contents: Mutex<HashMap<String, Vec<u8>>>,
    /// Search hits keyed by a substring matched against the incoming query.
    search_hits: Mutex<Vec<(String, Vec<SearchHit>)>>,
    uploads: Mutex<Vec<(String, String, Vec<u8>)>>,
    /// Scripted failures: operation name -> (remaining failures, kind).
    failures: Mutex<HashMap<String, (usize, FailureKind)>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- seeding ----

    pub fn push_item(&self, id: &str, fields: Map<String, Value>) {
        self.push_item_at(id, None, fields);
    }

    /// Like `push_item`, with an explicit last-modified instant.
    pub fn push_item_at(
        &self,
        id: &str,
        modified: Option<chrono::DateTime<chrono::Utc>>,
        fields: Map<String, Value>,
    ) {
        self.items
            .lock()
            .expect("mock poisoned")
            .push(RawListItem {
                id: id.to_string(),
                modified,
                fields,
            });
    }

    /// Register a file reachable both by path and by id, with its content.
    pub fn add_file(&self, path: &str, filename: &str, item: DriveItem, bytes: Vec<u8>) {
        let id = item.item_id.clone();
        self.files_by_path
            .lock()
            .expect("mock poisoned")
            .insert((path.to_string(), filename.to_string()), item.clone());
        self.files_by_id
            .lock()
            .expect("mock poisoned")
            .insert(id.clone(), item);
        self.contents.lock().expect("mock poisoned").insert(id, bytes);
    }

    /// Make `search` return `hits` for any query containing `key`.
    pub fn add_search_hits(&self, key: &str, hits: Vec<SearchHit>) {
        self.search_hits
            .lock()
            .expect("mock poisoned")
            .push((key.to_string(), hits));
    }

    /// Fail the next `times` calls of `operation` with the given class.
    pub fn fail_times(&self, operation: &str, times: usize, kind: FailureKind) {
        self.failures
            .lock()
            .expect("mock poisoned")
            .insert(operation.to_string(), (times, kind));
    }

    /// Fail every call of `operation` with the given class.
    pub fn fail_always(&self, operation: &str, kind: FailureKind) {
        self.fail_times(operation, usize::MAX, kind);
    }

    // ---- observation ----

    pub fn calls(&self, operation: &str) -> usize {
        *self
            .calls
            .lock()
            .expect("mock poisoned")
            .get(operation)
            .unwrap_or(&0)
    }

    pub fn processed_ids(&self) -> Vec<String> {
        self.processed.lock().expect("mock poisoned").clone()
    }

    pub fn uploads(&self) -> Vec<(String, String, Vec<u8>)> {
        self.uploads.lock().expect("mock poisoned").clone()
    }

    // ---- internals ----

    fn record_call(&self, operation: &str) -> Result<(), StoreError> {
        *self
            .calls
            .lock()
            .expect("mock poisoned")
            .entry(operation.to_string())
            .or_insert(0) += 1;

        let mut failures = self.failures.lock().expect("mock poisoned");
        if let Some((remaining, kind)) = failures.get_mut(operation) {
            if *remaining > 0 {
                if *remaining != usize::MAX {
                    *remaining -= 1;
                }
                return Err(kind.to_error(operation));
            }
        }
        Ok(())
    }
}

impl ListStore for MockStore {
    fn list_items(&self, _list_id: &str) -> Result<Vec<RawListItem>, StoreError> {
        self.record_call(OP_LIST_ITEMS)?;
        Ok(self.items.lock().expect("mock poisoned").clone())
    }

    fn set_processed(&self, _list_id: &str, item_id: &str) -> Result<(), StoreError> {
        self.record_call(OP_SET_PROCESSED)?;
        self.processed
            .lock()
            .expect("mock poisoned")
            .push(item_id.to_string());
        Ok(())
    }
}

impl FileStore for MockStore {
    fn item_by_path(&self, path: &str, filename: &str) -> Result<DriveItem, StoreError> {
        self.record_call(OP_ITEM_BY_PATH)?;
        self.files_by_path
            .lock()
            .expect("mock poisoned")
            .get(&(path.to_string(), filename.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("{path}/{filename}")))
    }

    fn item_by_id(&self, _drive_id: &str, item_id: &str) -> Result<DriveItem, StoreError> {
        self.record_call(OP_ITEM_BY_ID)?;
        self.files_by_id
            .lock()
            .expect("mock poisoned")
            .get(item_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(item_id.to_string()))
    }

    fn search(&self, query: &str) -> Result<Vec<SearchHit>, StoreError> {
        self.record_call(OP_SEARCH)?;
        let scripted = self.search_hits.lock().expect("mock poisoned");
        Ok(scripted
            .iter()
            .find(|(key, _)| query.contains(key.as_str()))
            .map(|(_, hits)| hits.clone())
            .unwrap_or_default())
    }

    fn download(&self, item: &DriveItem) -> Result<Vec<u8>, StoreError> {
        self.record_call(OP_DOWNLOAD)?;
        self.contents
            .lock()
            .expect("mock poisoned")
            .get(&item.item_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(item.item_id.clone()))
    }

    fn upload(&self, folder: &str, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.record_call(OP_UPLOAD)?;
        self.uploads.lock().expect("mock poisoned").push((
            folder.to_string(),
            name.to_string(),
            bytes.to_vec(),
        ));
        Ok(())
    }
}
