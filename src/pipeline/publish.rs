//! Artifact publishing.
//!
//! The preferred destination is a folder in the document library; when the
//! upload fails the artifact is written to the local output directory
//! instead, so an extracted report is never lost to a flaky store. Only a
//! failed local write (or a run-fatal store error) escalates.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::PipelineSettings;
use crate::sharepoint::types::FileStore;
use crate::sharepoint::StoreError;

#[derive(Debug, Error)]
pub enum PublishError {
    /// The local fallback itself failed; the artifact has no durable home.
    #[error("failed to write local artifact {path}: {source}")]
    LocalWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A run-fatal store failure during upload (connection, credentials).
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Where an artifact ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishLocation {
    Remote,
    Local,
}

pub struct ArtifactPublisher {
    remote_folder: Option<String>,
    output_dir: PathBuf,
}

impl ArtifactPublisher {
    pub fn new(settings: &PipelineSettings) -> Self {
        Self {
            remote_folder: settings.remote_output_folder.clone(),
            output_dir: settings.output_dir.clone(),
        }
    }

    /// Publish one artifact, remote first, local on failure.
    pub fn publish(
        &self,
        store: &dyn FileStore,
        name: &str,
        text: &str,
    ) -> Result<PublishLocation, PublishError> {
        if let Some(folder) = &self.remote_folder {
            match store.upload(folder, name, text.as_bytes()) {
                Ok(()) => {
                    tracing::info!(folder = %folder, name, "Published artifact remotely");
                    return Ok(PublishLocation::Remote);
                }
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    tracing::warn!(
                        folder = %folder,
                        name,
                        error = %e,
                        "Remote publish failed, writing artifact locally"
                    );
                }
            }
        }

        let path = self.output_dir.join(name);
        std::fs::write(&path, text).map_err(|source| PublishError::LocalWrite {
            path: path.clone(),
            source,
        })?;
        tracing::info!(path = %path.display(), "Published artifact locally");
        Ok(PublishLocation::Local)
    }
}
