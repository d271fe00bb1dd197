//! Store traits and the wire-neutral types crossing them.
//!
//! `ListStore` is the record list (read rows, flip the processed flag);
//! `FileStore` is the document library (metadata by path or id, ranked name
//! search, content download, artifact upload). Pipeline components depend on
//! these seams only, so the HTTP client can be swapped for the in-memory
//! mock in tests.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::StoreError;

/// One raw row from the external list, before ingestion-boundary
/// normalization. Field values stay loosely typed here on purpose; the
/// scanner owns turning them into a `ReportRecord`.
#[derive(Debug, Clone)]
pub struct RawListItem {
    pub id: String,
    pub modified: Option<DateTime<Utc>>,
    pub fields: Map<String, Value>,
}

/// Metadata handle for one stored file, enough to fetch its content.
#[derive(Debug, Clone)]
pub struct DriveItem {
    pub drive_id: String,
    pub item_id: String,
    pub name: String,
    /// Pre-authenticated content URL when the store supplies one; content is
    /// otherwise fetched by item id.
    pub download_url: Option<String>,
}

/// One ranked hit from a name/token search.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub name: String,
    pub drive_id: String,
    pub item_id: String,
}

/// Read/write access to the record list.
pub trait ListStore {
    /// Fetch all rows of the list. An empty list is a normal outcome and
    /// returns `Ok(vec![])`; only transport/auth failures are errors.
    fn list_items(&self, list_id: &str) -> Result<Vec<RawListItem>, StoreError>;

    /// Set the processed flag of one row to true. Idempotent.
    fn set_processed(&self, list_id: &str, item_id: &str) -> Result<(), StoreError>;
}

/// Read/write access to the document library.
pub trait FileStore {
    /// Metadata fetch by exact drive-relative path + filename.
    fn item_by_path(&self, path: &str, filename: &str) -> Result<DriveItem, StoreError>;

    /// Metadata fetch by item id (used after a search hit).
    fn item_by_id(&self, drive_id: &str, item_id: &str) -> Result<DriveItem, StoreError>;

    /// Ranked full-text/metadata search. The query string uses the store's
    /// own scoping syntax; callers build it via strategy helpers.
    fn search(&self, query: &str) -> Result<Vec<SearchHit>, StoreError>;

    /// Content fetch for a previously fetched metadata handle.
    fn download(&self, item: &DriveItem) -> Result<Vec<u8>, StoreError>;

    /// Write raw bytes to `folder/name`, overwriting any existing file.
    fn upload(&self, folder: &str, name: &str, bytes: &[u8]) -> Result<(), StoreError>;
}
