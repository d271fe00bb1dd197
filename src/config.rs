//! Pipeline configuration.
//!
//! Configuration is an explicit value threaded through pipeline
//! construction, never read from ambient globals, so a run is fully
//! reproducible from its inputs. Values come from a `ConfigProvider` (named string lookup); the
//! production provider reads environment variables, mirroring how the
//! deployment environment injects settings.

use std::collections::HashMap;
use std::path::PathBuf;

use thiserror::Error;

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> String {
    format!("{}=info", env!("CARGO_PKG_NAME"))
}

/// Errors raised while assembling pipeline settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required setting '{0}' is missing")]
    Missing(&'static str),

    #[error("setting '{name}' has invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Named string-value lookup. Secret storage and vault access live behind
/// this seam; the pipeline only ever asks for names.
pub trait ConfigProvider {
    fn get(&self, name: &str) -> Option<String>;
}

/// Environment-variable backed provider.
pub struct EnvConfig;

impl ConfigProvider for EnvConfig {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.is_empty())
    }
}

/// In-memory provider for tests and embedding callers.
#[derive(Default)]
pub struct StaticConfig {
    values: HashMap<String, String>,
}

impl StaticConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.values.insert(name.to_string(), value.to_string());
        self
    }
}

impl ConfigProvider for StaticConfig {
    fn get(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }
}

// Setting names as looked up on the provider.
pub const SETTING_SITE_HOST: &str = "REPORT_SITE_HOST";
pub const SETTING_SITE_ID: &str = "REPORT_SITE_ID";
pub const SETTING_LIST_ID: &str = "REPORT_LIST_ID";
pub const SETTING_DRIVE_ID: &str = "REPORT_DRIVE_ID";
pub const SETTING_LIBRARY_ROOT: &str = "REPORT_LIBRARY_ROOT";
pub const SETTING_OWNER_FILTER: &str = "REPORT_OWNER_FILTER";
pub const SETTING_REMOTE_OUTPUT_FOLDER: &str = "REPORT_REMOTE_OUTPUT_FOLDER";
pub const SETTING_OUTPUT_DIR: &str = "REPORT_OUTPUT_DIR";
pub const SETTING_MIN_TOKEN_OVERLAP: &str = "REPORT_MIN_TOKEN_OVERLAP";

/// Everything a pipeline run needs to know, resolved once up front.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Document store host, used to scope full-text search (e.g.
    /// `contoso.sharepoint.com`).
    pub site_host: String,
    /// Site identifier for list addressing.
    pub site_id: String,
    /// The report list to scan and mark.
    pub list_id: String,
    /// Drive holding the document library.
    pub drive_id: String,
    /// Server-relative prefix that list rows redundantly carry in their
    /// `Path` field (e.g. `/sites/Team/Shared Documents`); stripped to get a
    /// drive-relative path.
    pub library_root: String,
    /// Owner tag a record must carry to be eligible.
    pub owner_filter: String,
    /// Drive-relative folder for publishing artifacts; `None` publishes
    /// locally only.
    pub remote_output_folder: Option<String>,
    /// Local directory for fallback (and local-only) artifact writes.
    pub output_dir: PathBuf,
    /// Minimum token-overlap ratio for fuzzy search acceptance (0.0–1.0).
    pub min_token_overlap: f32,
}

impl PipelineSettings {
    /// Assemble settings from a provider. Identity and addressing values are
    /// required; output knobs fall back to defaults.
    pub fn from_provider(provider: &dyn ConfigProvider) -> Result<Self, ConfigError> {
        let required =
            |name: &'static str| provider.get(name).ok_or(ConfigError::Missing(name));

        let min_token_overlap = match provider.get(SETTING_MIN_TOKEN_OVERLAP) {
            Some(raw) => raw
                .parse::<f32>()
                .ok()
                .filter(|v| (0.0..=1.0).contains(v))
                .ok_or(ConfigError::Invalid {
                    name: SETTING_MIN_TOKEN_OVERLAP,
                    value: raw,
                    reason: "expected a ratio between 0.0 and 1.0".into(),
                })?,
            None => 0.5,
        };

        Ok(Self {
            site_host: required(SETTING_SITE_HOST)?,
            site_id: required(SETTING_SITE_ID)?,
            list_id: required(SETTING_LIST_ID)?,
            drive_id: required(SETTING_DRIVE_ID)?,
            library_root: required(SETTING_LIBRARY_ROOT)?,
            owner_filter: required(SETTING_OWNER_FILTER)?,
            remote_output_folder: provider.get(SETTING_REMOTE_OUTPUT_FOLDER),
            output_dir: provider
                .get(SETTING_OUTPUT_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            min_token_overlap,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_config() -> StaticConfig {
        StaticConfig::new()
            .with(SETTING_SITE_HOST, "contoso.sharepoint.com")
            .with(SETTING_SITE_ID, "site-1")
            .with(SETTING_LIST_ID, "list-1")
            .with(SETTING_DRIVE_ID, "drive-1")
            .with(SETTING_LIBRARY_ROOT, "/sites/Team/Shared Documents")
            .with(SETTING_OWNER_FILTER, "Alice")
    }

    #[test]
    fn settings_from_full_provider() {
        let settings = PipelineSettings::from_provider(&full_config()).unwrap();
        assert_eq!(settings.site_host, "contoso.sharepoint.com");
        assert_eq!(settings.owner_filter, "Alice");
        assert_eq!(settings.output_dir, PathBuf::from("."));
        assert!(settings.remote_output_folder.is_none());
        assert!((settings.min_token_overlap - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn missing_required_setting_is_an_error() {
        let provider = StaticConfig::new().with(SETTING_SITE_HOST, "h");
        let err = PipelineSettings::from_provider(&provider).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
    }

    #[test]
    fn overlap_out_of_range_rejected() {
        let provider = full_config().with(SETTING_MIN_TOKEN_OVERLAP, "1.5");
        let err = PipelineSettings::from_provider(&provider).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: SETTING_MIN_TOKEN_OVERLAP,
                ..
            }
        ));
    }

    #[test]
    fn overlap_parsed_when_valid() {
        let provider = full_config().with(SETTING_MIN_TOKEN_OVERLAP, "0.75");
        let settings = PipelineSettings::from_provider(&provider).unwrap();
        assert!((settings.min_token_overlap - 0.75).abs() < f32::EPSILON);
    }

    #[test]
    fn optional_remote_folder_flows_through() {
        let provider = full_config().with(SETTING_REMOTE_OUTPUT_FOLDER, "Reports/Out");
        let settings = PipelineSettings::from_provider(&provider).unwrap();
        assert_eq!(
            settings.remote_output_folder.as_deref(),
            Some("Reports/Out")
        );
    }

    #[test]
    fn empty_env_value_treated_as_unset() {
        // EnvConfig filters empty strings so a blank export does not
        // masquerade as a configured value.
        std::env::set_var("FLEXREPORT_TEST_EMPTY", "");
        assert!(EnvConfig.get("FLEXREPORT_TEST_EMPTY").is_none());
        std::env::remove_var("FLEXREPORT_TEST_EMPTY");
    }

    #[test]
    fn default_filter_names_the_crate() {
        assert!(default_log_filter().starts_with("flexreport"));
    }
}
