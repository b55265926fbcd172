//! On-disk chart storage.
//!
//! Charts are plain files directly under the configured base directory.
//! Files are only ever created or overwritten whole -- there is no delete
//! path and no versioning.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bytes::Bytes;
use md5::{Digest, Md5};
use tracing::{debug, instrument};

/// The on-disk chart directory.
#[derive(Debug, Clone)]
pub struct LocalStore {
    base_path: PathBuf,
}

impl LocalStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Full on-disk path for a chart name.
    pub fn chart_path(&self, name: &str) -> PathBuf {
        self.base_path.join(name)
    }

    /// Write `content` under `name`, fully replacing any prior content.
    #[instrument(skip(self, content), fields(%name, bytes = content.len()))]
    pub async fn write(&self, name: &str, content: &[u8]) -> Result<()> {
        let path = self.chart_path(name);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create chart directory {}", parent.display()))?;
        }
        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("write chart to {}", path.display()))?;
        debug!(path = %path.display(), "chart written");
        Ok(())
    }

    /// Read the full bytes of `name`.  `Ok(None)` when no local copy exists.
    #[instrument(skip(self), fields(%name))]
    pub async fn read(&self, name: &str) -> Result<Option<Bytes>> {
        let path = self.chart_path(name);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(Bytes::from(bytes))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => {
                Err(e).with_context(|| format!("read chart from {}", path.display()))
            }
        }
    }

    /// MD5 content hash of the local copy, as lowercase hex.  `Ok(None)`
    /// when no local copy exists.
    ///
    /// Stable across calls for identical bytes; compared (as an opaque
    /// string) against the S3 ETag by the resolver.
    #[instrument(skip(self), fields(%name))]
    pub async fn fingerprint(&self, name: &str) -> Result<Option<String>> {
        let path = self.chart_path(name);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("checksum chart at {}", path.display()))
            }
        };
        let digest = Md5::digest(&bytes);
        Ok(Some(hex::encode(digest)))
    }
}
