//! Flexreport: report ingestion and extraction pipeline.
//!
//! A run scans an external record list for unprocessed report entries,
//! locates each entry's workbook in the document library (falling back from
//! direct path to exact-name search to fuzzy token search), extracts the
//! fixed-template report into a pipe-delimited text artifact, publishes the
//! artifact remotely (or locally when the upload fails), and marks the
//! record processed.
//!
//! The crate is a library: embedding callers (a CLI wrapper, a scheduled
//! function) construct [`PipelineSettings`] and a [`CredentialProvider`],
//! build a [`GraphClient`], and call [`ReportPipeline::run`]. All store
//! access goes through the [`ListStore`] and [`FileStore`] traits, so tests
//! and embeddings can substitute their own stores.

pub mod auth;
pub mod config;
pub mod pipeline;
pub mod sharepoint;

pub use auth::{AuthToken, CredentialError, CredentialProvider, StaticTokenProvider};
pub use config::{ConfigError, ConfigProvider, EnvConfig, PipelineSettings, StaticConfig};
pub use pipeline::runner::{PipelineError, ReportPipeline};
pub use pipeline::types::RunSummary;
pub use sharepoint::client::GraphClient;
pub use sharepoint::types::{FileStore, ListStore};
pub use sharepoint::StoreError;

/// Initialize tracing for binaries embedding the pipeline. Honors
/// `RUST_LOG`, defaulting to info-level output for this crate.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config::default_log_filter()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
