//! Graph-shaped HTTP client for the record list and document library.
//!
//! Blocking client with a per-call timeout; every call carries a bearer
//! token from the `CredentialProvider` and passes through a bounded retry
//! (transport errors and 5xx only, with doubling backoff). Non-success
//! statuses map onto the `StoreError` taxonomy so callers can tell
//! credential expiry (401) from forbidden (403) from absent (404).

use std::time::Duration;

use reqwest::blocking::Response;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::types::{DriveItem, FileStore, ListStore, RawListItem, SearchHit};
use super::StoreError;
use crate::auth::CredentialProvider;
use crate::config::PipelineSettings;

const DEFAULT_BASE_URL: &str = "https://graph.microsoft.com/v1.0";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum retries per HTTP call (retries are per call, never per strategy).
const MAX_HTTP_RETRIES: usize = 2;
/// First backoff delay; doubles per attempt.
const RETRY_BASE_DELAY_MS: u64 = 250;

pub struct GraphClient {
    base_url: Url,
    http: reqwest::blocking::Client,
    credentials: Box<dyn CredentialProvider + Send + Sync>,
    site_id: String,
    drive_id: String,
}

impl GraphClient {
    pub fn new(
        settings: &PipelineSettings,
        credentials: Box<dyn CredentialProvider + Send + Sync>,
    ) -> Self {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"),
            http,
            credentials,
            site_id: settings.site_id.clone(),
            drive_id: settings.drive_id.clone(),
        }
    }

    /// Point the client at a different endpoint root (test servers).
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, StoreError> {
        self.base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| StoreError::ResponseParsing(format!("invalid base URL: {e}")))?;
        Ok(self)
    }

    /// Build an endpoint URL from path segments. Segments are appended via
    /// the URL parser so spaces and reserved characters in stored paths are
    /// percent-encoded correctly.
    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .expect("base URL cannot be a base")
            .extend(segments);
        url
    }

    fn bearer(&self) -> Result<String, StoreError> {
        let token = self.credentials.bearer_token()?;
        Ok(token.secret().to_string())
    }

    /// Run one HTTP operation with bounded backoff on transient failures.
    fn with_retry<T>(
        &self,
        operation: &str,
        mut call: impl FnMut() -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut attempt = 0;
        loop {
            match call() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < MAX_HTTP_RETRIES => {
                    let delay = Duration::from_millis(RETRY_BASE_DELAY_MS << attempt);
                    tracing::warn!(
                        operation,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient store failure, retrying"
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn check_status(response: Response) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(classify_status(status, body))
    }

    fn get_json(&self, url: Url) -> Result<Value, StoreError> {
        let bearer = self.bearer()?;
        let response = self
            .http
            .get(url)
            .bearer_auth(bearer)
            .send()
            .map_err(transport_error)?;
        Self::check_status(response)?
            .json()
            .map_err(|e| StoreError::ResponseParsing(e.to_string()))
    }
}

/// Map a transport-level reqwest failure onto the taxonomy.
fn transport_error(e: reqwest::Error) -> StoreError {
    StoreError::Connection(e.to_string())
}

/// Map a non-success status onto the taxonomy.
fn classify_status(status: StatusCode, body: String) -> StoreError {
    match status.as_u16() {
        401 => StoreError::Unauthorized(body),
        403 => StoreError::Forbidden(body),
        404 => StoreError::NotFound(body),
        status => StoreError::Api { status, body },
    }
}

// ---------------------------------------------------------------------------
// Wire DTOs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ListItemsResponse {
    #[serde(default)]
    value: Vec<ListItemDto>,
}

#[derive(Deserialize)]
struct ListItemDto {
    id: String,
    #[serde(rename = "lastModifiedDateTime")]
    last_modified: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Deserialize)]
struct DriveItemDto {
    id: String,
    name: String,
    #[serde(rename = "@microsoft.graph.downloadUrl")]
    download_url: Option<String>,
    #[serde(rename = "parentReference")]
    parent: Option<ParentReferenceDto>,
}

#[derive(Deserialize)]
struct ParentReferenceDto {
    #[serde(rename = "driveId")]
    drive_id: Option<String>,
}

impl DriveItemDto {
    fn into_drive_item(self, fallback_drive_id: &str) -> DriveItem {
        let drive_id = self
            .parent
            .and_then(|p| p.drive_id)
            .unwrap_or_else(|| fallback_drive_id.to_string());
        DriveItem {
            drive_id,
            item_id: self.id,
            name: self.name,
            download_url: self.download_url,
        }
    }
}

/// Pull search hits out of the nested `hitsContainers` response shape.
/// Hits missing identifying fields are skipped rather than failing the call.
fn parse_search_hits(body: &Value, fallback_drive_id: &str) -> Vec<SearchHit> {
    let hits = body
        .get("value")
        .and_then(|v| v.get(0))
        .and_then(|v| v.get("hitsContainers"))
        .and_then(|v| v.get(0))
        .and_then(|v| v.get("hits"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    hits.iter()
        .filter_map(|hit| {
            let resource = hit.get("resource")?;
            let name = resource.get("name")?.as_str()?.to_string();
            let item_id = resource.get("id")?.as_str()?.to_string();
            let drive_id = resource
                .get("parentReference")
                .and_then(|p| p.get("driveId"))
                .and_then(Value::as_str)
                .unwrap_or(fallback_drive_id)
                .to_string();
            Some(SearchHit {
                name,
                drive_id,
                item_id,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Trait implementations
// ---------------------------------------------------------------------------

impl ListStore for GraphClient {
    fn list_items(&self, list_id: &str) -> Result<Vec<RawListItem>, StoreError> {
        self.with_retry("list_items", || {
            let mut url =
                self.endpoint(["sites", self.site_id.as_str(), "lists", list_id, "items"]);
            url.query_pairs_mut().append_pair("expand", "fields");

            let body: ListItemsResponse = serde_json::from_value(self.get_json(url)?)
                .map_err(|e| StoreError::ResponseParsing(e.to_string()))?;

            Ok(body
                .value
                .into_iter()
                .map(|dto| RawListItem {
                    id: dto.id,
                    modified: dto.last_modified,
                    fields: dto.fields,
                })
                .collect())
        })
    }

    fn set_processed(&self, list_id: &str, item_id: &str) -> Result<(), StoreError> {
        self.with_retry("set_processed", || {
            let url = self.endpoint([
                "sites",
                self.site_id.as_str(),
                "lists",
                list_id,
                "items",
                item_id,
                "fields",
            ]);
            let bearer = self.bearer()?;
            let response = self
                .http
                .patch(url)
                .bearer_auth(bearer)
                .json(&json!({ "Processed": true }))
                .send()
                .map_err(transport_error)?;
            Self::check_status(response)?;
            Ok(())
        })
    }
}

impl FileStore for GraphClient {
    fn item_by_path(&self, path: &str, filename: &str) -> Result<DriveItem, StoreError> {
        self.with_retry("item_by_path", || {
            let mut segments: Vec<&str> = vec!["drives", &self.drive_id, "root:"];
            segments.extend(path.split('/').filter(|s| !s.is_empty()));
            segments.push(filename);
            let url = self.endpoint(segments);

            let dto: DriveItemDto = serde_json::from_value(self.get_json(url)?)
                .map_err(|e| StoreError::ResponseParsing(e.to_string()))?;
            Ok(dto.into_drive_item(&self.drive_id))
        })
    }

    fn item_by_id(&self, drive_id: &str, item_id: &str) -> Result<DriveItem, StoreError> {
        self.with_retry("item_by_id", || {
            let url = self.endpoint(["drives", drive_id, "items", item_id]);
            let dto: DriveItemDto = serde_json::from_value(self.get_json(url)?)
                .map_err(|e| StoreError::ResponseParsing(e.to_string()))?;
            Ok(dto.into_drive_item(drive_id))
        })
    }

    fn search(&self, query: &str) -> Result<Vec<SearchHit>, StoreError> {
        self.with_retry("search", || {
            let url = self.endpoint(["search", "query"]);
            let bearer = self.bearer()?;
            let body = json!({
                "requests": [{
                    "entityTypes": ["driveItem"],
                    "query": { "queryString": query }
                }]
            });
            let response = self
                .http
                .post(url)
                .bearer_auth(bearer)
                .json(&body)
                .send()
                .map_err(transport_error)?;
            let value: Value = Self::check_status(response)?
                .json()
                .map_err(|e| StoreError::ResponseParsing(e.to_string()))?;
            Ok(parse_search_hits(&value, &self.drive_id))
        })
    }

    fn download(&self, item: &DriveItem) -> Result<Vec<u8>, StoreError> {
        self.with_retry("download", || {
            // Pre-authenticated download URLs skip the bearer header; the
            // item-id content endpoint redirects to one (followed by the
            // client automatically).
            let response = match &item.download_url {
                Some(url) => self.http.get(url.as_str()).send().map_err(transport_error)?,
                None => {
                    let url = self.endpoint([
                        "drives",
                        item.drive_id.as_str(),
                        "items",
                        item.item_id.as_str(),
                        "content",
                    ]);
                    let bearer = self.bearer()?;
                    self.http
                        .get(url)
                        .bearer_auth(bearer)
                        .send()
                        .map_err(transport_error)?
                }
            };
            let bytes = Self::check_status(response)?
                .bytes()
                .map_err(|e| StoreError::Connection(e.to_string()))?;
            Ok(bytes.to_vec())
        })
    }

    fn upload(&self, folder: &str, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let trailing = format!("{name}:");
        self.with_retry("upload", || {
            let mut segments: Vec<&str> = vec!["drives", &self.drive_id, "root:"];
            segments.extend(folder.split('/').filter(|s| !s.is_empty()));
            segments.push(&trailing);
            segments.push("content");
            let url = self.endpoint(segments);

            let bearer = self.bearer()?;
            let response = self
                .http
                .put(url)
                .bearer_auth(bearer)
                .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                .body(bytes.to_vec())
                .send()
                .map_err(transport_error)?;
            Self::check_status(response)?;
            Ok(())
        })
    }
}
