//! File resolution.
//!
//! A record names its workbook by path + filename, but the library moves
//! underneath the list: files get renamed, re-uploaded with version suffixes,
//! or shifted between folders. Resolution tries three strategies in a fixed
//! order, each strictly cheaper in precision than the one before:
//!
//! 1. direct path lookup,
//! 2. search on the exact filename across the library, accepting only an
//!    exact name match,
//! 3. site-wide search on the filename's distinctive tokens, accepting the
//!    best hit above a configured overlap ratio.
//!
//! The recorded path is only trusted by strategy 1. The search strategies
//! exist because that path goes stale when files move, so neither scopes
//! its query to it.
//!
//! A strategy that cannot find the file yields to the next one; only
//! run-fatal store errors (connection, credentials) short-circuit. A record
//! no strategy resolves becomes a contained per-item failure in the runner,
//! never a run abort.

use std::sync::LazyLock;

use regex::Regex;

use crate::config::PipelineSettings;
use crate::pipeline::types::{ReportRecord, ResolvedFile, StrategyKind};
use crate::sharepoint::types::{DriveItem, FileStore};
use crate::sharepoint::StoreError;

/// One way of locating a record's workbook. A successful attempt carries
/// the content too: each strategy does its own metadata fetch followed by
/// a content fetch, and a failure in either falls through to the next
/// strategy rather than failing the item outright.
///
/// `Ok(None)` means "not found here, try the next strategy"; `Err` is a
/// store failure (the resolver contains non-fatal ones itself).
pub trait ResolveStrategy {
    fn kind(&self) -> StrategyKind;
    fn attempt(
        &self,
        store: &dyn FileStore,
        record: &ReportRecord,
    ) -> Result<Option<(DriveItem, Vec<u8>)>, StoreError>;
}

pub struct FileResolver {
    strategies: Vec<Box<dyn ResolveStrategy>>,
}

impl FileResolver {
    /// The production chain in its fixed order.
    pub fn new(settings: &PipelineSettings) -> Self {
        Self::with_strategies(vec![
            Box::new(DirectPath),
            Box::new(ExactNameSearch {
                site_host: settings.site_host.clone(),
                library_root: settings.library_root.clone(),
            }),
            Box::new(FuzzySearch {
                site_host: settings.site_host.clone(),
                min_overlap: settings.min_token_overlap,
            }),
        ])
    }

    pub fn with_strategies(strategies: Vec<Box<dyn ResolveStrategy>>) -> Self {
        Self { strategies }
    }

    /// Try each strategy in order. Non-fatal store errors demote to a
    /// fall-through with a warning; fatal ones propagate untouched.
    pub fn resolve(
        &self,
        store: &dyn FileStore,
        record: &ReportRecord,
    ) -> Result<Option<ResolvedFile>, StoreError> {
        for strategy in &self.strategies {
            match strategy.attempt(store, record) {
                Ok(Some((item, content))) => {
                    tracing::info!(
                        item_id = %record.item_id,
                        filename = %record.filename,
                        strategy = %strategy.kind(),
                        size = content.len(),
                        "Resolved report file"
                    );
                    return Ok(Some(ResolvedFile {
                        item,
                        content,
                        strategy: strategy.kind(),
                    }));
                }
                Ok(None) => continue,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        item_id = %record.item_id,
                        strategy = %strategy.kind(),
                        error = %e,
                        "Strategy failed, falling through"
                    );
                }
            }
        }
        tracing::warn!(
            item_id = %record.item_id,
            filename = %record.filename,
            "No strategy resolved the file"
        );
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// Metadata handle plus its content, the common tail of every strategy.
fn fetch(
    store: &dyn FileStore,
    item: DriveItem,
) -> Result<Option<(DriveItem, Vec<u8>)>, StoreError> {
    let content = store.download(&item)?;
    Ok(Some((item, content)))
}

/// Strategy 1: fetch at the exact recorded path.
pub struct DirectPath;

impl ResolveStrategy for DirectPath {
    fn kind(&self) -> StrategyKind {
        StrategyKind::DirectPath
    }

    fn attempt(
        &self,
        store: &dyn FileStore,
        record: &ReportRecord,
    ) -> Result<Option<(DriveItem, Vec<u8>)>, StoreError> {
        match store.item_by_path(&record.path, &record.filename) {
            Ok(item) => fetch(store, item),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Strategy 2: search on the full filename stem, accept an exact name match.
/// Finds files moved to a different folder but keeping their name, so the
/// query is scoped to the library root rather than the recorded path.
pub struct ExactNameSearch {
    pub site_host: String,
    pub library_root: String,
}

impl ResolveStrategy for ExactNameSearch {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ExactNameSearch
    }

    fn attempt(
        &self,
        store: &dyn FileStore,
        record: &ReportRecord,
    ) -> Result<Option<(DriveItem, Vec<u8>)>, StoreError> {
        let query = search_query(
            &self.site_host,
            Some(&self.library_root),
            file_stem(&record.filename),
        );
        let hits = store.search(&query)?;
        for hit in hits {
            if hit.name.eq_ignore_ascii_case(&record.filename) {
                let item = store.item_by_id(&hit.drive_id, &hit.item_id)?;
                return fetch(store, item);
            }
        }
        Ok(None)
    }
}

/// Strategy 3: site-wide search on the filename's distinctive tokens,
/// accepting the best-overlapping hit. Finds files renamed with version
/// markers or shifted dates, at the cost of a configured confidence floor.
pub struct FuzzySearch {
    pub site_host: String,
    pub min_overlap: f32,
}

impl ResolveStrategy for FuzzySearch {
    fn kind(&self) -> StrategyKind {
        StrategyKind::FuzzySearch
    }

    fn attempt(
        &self,
        store: &dyn FileStore,
        record: &ReportRecord,
    ) -> Result<Option<(DriveItem, Vec<u8>)>, StoreError> {
        let record_tokens = reduce_tokens(&tokenize(file_stem(&record.filename)));
        if record_tokens.is_empty() {
            // Nothing distinctive to search on (a purely numeric/dated name).
            return Ok(None);
        }

        let query = search_query(&self.site_host, None, &record_tokens.join(" "));
        let hits = store.search(&query)?;

        let mut best: Option<(f32, crate::sharepoint::types::SearchHit)> = None;
        for hit in hits {
            let candidate_tokens = tokenize(file_stem(&hit.name));
            let ratio = overlap_ratio(&record_tokens, &candidate_tokens);
            if ratio >= self.min_overlap
                && best.as_ref().map(|(r, _)| ratio > *r).unwrap_or(true)
            {
                best = Some((ratio, hit));
            }
        }

        match best {
            Some((ratio, hit)) => {
                tracing::debug!(
                    filename = %record.filename,
                    matched = %hit.name,
                    ratio,
                    "Fuzzy match accepted"
                );
                let item = store.item_by_id(&hit.drive_id, &hit.item_id)?;
                fetch(store, item)
            }
            None => Ok(None),
        }
    }
}

// ---------------------------------------------------------------------------
// Query and token helpers
// ---------------------------------------------------------------------------

/// Search query in the store's scoping syntax: host, an optional folder
/// scope, and a filename pattern extended to any workbook starting with it.
fn search_query(site_host: &str, scope: Option<&str>, pattern: &str) -> String {
    match scope {
        Some(path) => format!("site:\"{site_host}\" path:\"{path}\" filename:\"{pattern}*.xlsx\""),
        None => format!("site:\"{site_host}\" filename:\"{pattern}*.xlsx\""),
    }
}

/// Filename without its final extension.
fn file_stem(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    }
}

/// Lowercased tokens split on whitespace and underscores. Hyphens stay
/// inside tokens so dates like `2025-01-10` survive as one token.
fn tokenize(stem: &str) -> Vec<String> {
    stem.split(|c: char| c.is_whitespace() || c == '_')
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

static NUMERIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").expect("valid regex"));
static DATE_LIKE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,4}([-./]\d{1,2}){1,2}$").expect("valid regex"));

/// Drop tokens that vary between uploads of the same report: bare numbers
/// (version counters) and date-like tokens.
fn reduce_tokens(tokens: &[String]) -> Vec<String> {
    tokens
        .iter()
        .filter(|t| !NUMERIC.is_match(t) && !DATE_LIKE.is_match(t))
        .cloned()
        .collect()
}

/// Fraction of the record's tokens present in the candidate's.
fn overlap_ratio(record_tokens: &[String], candidate_tokens: &[String]) -> f32 {
    if record_tokens.is_empty() {
        return 0.0;
    }
    let shared = record_tokens
        .iter()
        .filter(|t| candidate_tokens.contains(t))
        .count();
    shared as f32 / record_tokens.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sharepoint::mock::{
        FailureKind, MockStore, OP_ITEM_BY_PATH, OP_SEARCH,
    };
    use crate::sharepoint::types::SearchHit;

    fn record(path: &str, filename: &str) -> ReportRecord {
        ReportRecord {
            item_id: "1".into(),
            path: path.into(),
            filename: filename.into(),
            owner: "Alice".into(),
            modified: None,
        }
    }

    fn drive_item(id: &str, name: &str) -> DriveItem {
        DriveItem {
            drive_id: "d1".into(),
            item_id: id.into(),
            name: name.into(),
            download_url: None,
        }
    }

    fn resolver() -> FileResolver {
        FileResolver::with_strategies(vec![
            Box::new(DirectPath),
            Box::new(ExactNameSearch {
                site_host: "contoso.sharepoint.com".into(),
                library_root: "/sites/Team/Shared Documents".into(),
            }),
            Box::new(FuzzySearch {
                site_host: "contoso.sharepoint.com".into(),
                min_overlap: 0.5,
            }),
        ])
    }

    /// Store double recording every search query it receives.
    #[derive(Default)]
    struct QueryRecorder {
        queries: std::sync::Mutex<Vec<String>>,
    }

    impl FileStore for QueryRecorder {
        fn item_by_path(&self, path: &str, filename: &str) -> Result<DriveItem, StoreError> {
            Err(StoreError::NotFound(format!("{path}/{filename}")))
        }

        fn item_by_id(&self, _drive_id: &str, item_id: &str) -> Result<DriveItem, StoreError> {
            Err(StoreError::NotFound(item_id.to_string()))
        }

        fn search(&self, query: &str) -> Result<Vec<SearchHit>, StoreError> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok(Vec::new())
        }

        fn download(&self, item: &DriveItem) -> Result<Vec<u8>, StoreError> {
            Err(StoreError::NotFound(item.item_id.clone()))
        }

        fn upload(&self, _folder: &str, _name: &str, _bytes: &[u8]) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[test]
    fn direct_path_wins_without_searching() {
        let store = MockStore::new();
        store.add_file(
            "Reports/2025",
            "Weekly Report.xlsx",
            drive_item("i1", "Weekly Report.xlsx"),
            b"workbook bytes".to_vec(),
        );
        let resolved = resolver()
            .resolve(&store, &record("Reports/2025", "Weekly Report.xlsx"))
            .unwrap()
            .unwrap();
        assert_eq!(resolved.strategy, StrategyKind::DirectPath);
        assert_eq!(resolved.item.item_id, "i1");
        assert_eq!(resolved.content, b"workbook bytes");
        assert_eq!(store.calls(OP_SEARCH), 0);
    }

    #[test]
    fn exact_name_search_used_when_path_misses() {
        let store = MockStore::new();
        // File moved to another folder; direct path misses, search finds it.
        store.add_file(
            "Archive",
            "Weekly Report.xlsx",
            drive_item("i2", "Weekly Report.xlsx"),
            vec![],
        );
        store.add_search_hits(
            "Weekly Report",
            vec![SearchHit {
                name: "Weekly Report.xlsx".into(),
                drive_id: "d1".into(),
                item_id: "i2".into(),
            }],
        );

        let resolved = resolver()
            .resolve(&store, &record("Reports/2025", "Weekly Report.xlsx"))
            .unwrap()
            .unwrap();
        assert_eq!(resolved.strategy, StrategyKind::ExactNameSearch);
        assert_eq!(store.calls(OP_ITEM_BY_PATH), 1);
        assert_eq!(store.calls(OP_SEARCH), 1);
    }

    #[test]
    fn fuzzy_search_accepts_renamed_file_above_threshold() {
        let store = MockStore::new();
        store.add_file(
            "Reports/2025",
            "Weekly Service Report v2.xlsx",
            drive_item("i3", "Weekly Service Report v2.xlsx"),
            vec![],
        );
        // Exact-name query matches nothing; the reduced-token query hits.
        store.add_search_hits(
            "weekly service report",
            vec![SearchHit {
                name: "Weekly Service Report v2.xlsx".into(),
                drive_id: "d1".into(),
                item_id: "i3".into(),
            }],
        );

        let resolved = resolver()
            .resolve(
                &store,
                &record("Reports/2025", "Weekly Service Report 2025-01-10.xlsx"),
            )
            .unwrap()
            .unwrap();
        assert_eq!(resolved.strategy, StrategyKind::FuzzySearch);
        assert_eq!(store.calls(OP_SEARCH), 2);
    }

    #[test]
    fn fuzzy_rejects_hits_below_threshold() {
        let store = MockStore::new();
        store.add_search_hits(
            "weekly service report",
            vec![SearchHit {
                name: "Budget Summary.xlsx".into(),
                drive_id: "d1".into(),
                item_id: "i9".into(),
            }],
        );
        let resolved = resolver()
            .resolve(
                &store,
                &record("Reports/2025", "Weekly Service Report 2025-01-10.xlsx"),
            )
            .unwrap();
        assert!(resolved.is_none());
    }

    #[test]
    fn fatal_store_error_propagates_immediately() {
        let store = MockStore::new();
        store.fail_always(OP_ITEM_BY_PATH, FailureKind::Unauthorized);
        let err = resolver()
            .resolve(&store, &record("Reports/2025", "Weekly Report.xlsx"))
            .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(store.calls(OP_SEARCH), 0);
    }

    #[test]
    fn forbidden_strategy_falls_through_to_the_next() {
        let store = MockStore::new();
        store.fail_always(OP_ITEM_BY_PATH, FailureKind::Forbidden);
        let resolved = resolver()
            .resolve(&store, &record("Reports/2025", "Weekly Report.xlsx"))
            .unwrap();
        assert!(resolved.is_none());
        // Both search strategies still ran.
        assert_eq!(store.calls(OP_SEARCH), 2);
    }

    #[test]
    fn token_reduction_drops_numbers_and_dates() {
        let tokens = tokenize("Weekly Service Report 2025-01-10 v2 003");
        let reduced = reduce_tokens(&tokens);
        assert_eq!(reduced, vec!["weekly", "service", "report", "v2"]);
    }

    #[test]
    fn stem_strips_only_the_final_extension() {
        assert_eq!(file_stem("a.b.xlsx"), "a.b");
        assert_eq!(file_stem("noext"), "noext");
        assert_eq!(file_stem(".hidden"), ".hidden");
    }

    #[test]
    fn overlap_ratio_counts_record_side_tokens() {
        let record = vec!["weekly".to_string(), "report".to_string()];
        let candidate = vec!["weekly".to_string(), "report".to_string(), "v2".to_string()];
        assert!((overlap_ratio(&record, &candidate) - 1.0).abs() < f32::EPSILON);

        let disjoint = vec!["budget".to_string()];
        assert!(overlap_ratio(&record, &disjoint).abs() < f32::EPSILON);
    }

    #[test]
    fn query_scope_is_optional() {
        let scoped = search_query(
            "contoso.sharepoint.com",
            Some("/sites/Team/Shared Documents"),
            "Weekly Report",
        );
        assert_eq!(
            scoped,
            "site:\"contoso.sharepoint.com\" path:\"/sites/Team/Shared Documents\" filename:\"Weekly Report*.xlsx\""
        );

        let site_wide = search_query("contoso.sharepoint.com", None, "weekly report");
        assert_eq!(
            site_wide,
            "site:\"contoso.sharepoint.com\" filename:\"weekly report*.xlsx\""
        );
    }

    #[test]
    fn search_queries_ignore_the_stale_record_path() {
        // The recorded folder is exactly what search exists to route around,
        // so a file moved out of it must still be findable.
        let store = QueryRecorder::default();
        let resolved = resolver()
            .resolve(&store, &record("Reports/2025", "Weekly Service Report.xlsx"))
            .unwrap();
        assert!(resolved.is_none());

        let queries = store.queries.lock().unwrap();
        assert_eq!(queries.len(), 2);
        // Exact-name search scopes to the library root.
        assert!(queries[0].contains("path:\"/sites/Team/Shared Documents\""));
        assert!(!queries[0].contains("Reports/2025"));
        // Fuzzy search is site-wide.
        assert!(!queries[1].contains("path:"));
        assert!(!queries[1].contains("Reports/2025"));
    }
}
