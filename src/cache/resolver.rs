//! Cache consistency resolver.
//!
//! For every read the resolver decides whether the local chart file still
//! matches the authoritative S3 copy.  The comparison is fingerprint
//! equality: local MD5 hex against the remote ETag, as opaque strings.  A
//! mismatch (or an unreadable fingerprint on either side) forces a refresh
//! that overwrites the local file with the remote bytes before serving.
//!
//! Failing to *look up* the remote fingerprint is deliberately non-fatal:
//! an unverifiable local copy is never trusted, so the resolver falls
//! through to a refresh attempt and only surfaces an error if that fetch
//! itself fails.

use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use tracing::{debug, info, instrument, warn};

use crate::storage::{LocalStore, RemoteStore};

/// Which path a resolved read was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Local fingerprint matched the remote tag; no remote transfer.
    CacheHit,
    /// Local copy was absent or stale; bytes were re-fetched from the
    /// remote store and the local copy overwritten.
    Refreshed,
    /// Mirroring is disabled; the local copy is authoritative.
    LocalOnly,
}

/// A successfully resolved read.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub bytes: Bytes,
    pub source: Source,
}

/// Decides, per read, whether to serve the local chart file or refresh it
/// from the remote mirror first.
#[derive(Clone)]
pub struct Resolver {
    local: LocalStore,
    remote: Option<Arc<dyn RemoteStore>>,
}

impl Resolver {
    pub fn new(local: LocalStore, remote: Option<Arc<dyn RemoteStore>>) -> Self {
        Self { local, remote }
    }

    /// Return the authoritative current bytes of `name`.
    ///
    /// `Ok(None)` means the chart exists in neither tier that was able to
    /// answer (a 404 to the caller).  The refresh in the mismatch path is
    /// the only place the resolver writes to the local store.
    #[instrument(skip(self), fields(%name))]
    pub async fn resolve(&self, name: &str) -> Result<Option<Resolved>> {
        let Some(remote) = &self.remote else {
            // Mirroring disabled: the local copy is all there is.
            return Ok(self.local.read(name).await?.map(|bytes| Resolved {
                bytes,
                source: Source::LocalOnly,
            }));
        };

        let local_fp = match self.local.fingerprint(name).await {
            Ok(fp) => fp,
            Err(e) => {
                warn!(error = %e, "failed to checksum local chart");
                None
            }
        };

        // A transport failure here is treated as "fingerprint unknown":
        // the comparison below fails and a refresh is attempted instead of
        // silently trusting an unverifiable local copy.
        let remote_fp = match remote.fingerprint(name).await {
            Ok(fp) => fp,
            Err(e) => {
                warn!(error = %e, "remote fingerprint lookup failed");
                None
            }
        };

        if let (Some(local_fp), Some(remote_fp)) = (&local_fp, &remote_fp) {
            if local_fp == remote_fp {
                if let Some(bytes) = self.local.read(name).await? {
                    debug!(fingerprint = %local_fp, "cache hit");
                    return Ok(Some(Resolved {
                        bytes,
                        source: Source::CacheHit,
                    }));
                }
                // Local file vanished between checksum and read; refresh.
                warn!("local chart disappeared after checksum, refreshing");
            }
        }

        debug!(
            local_fp = ?local_fp,
            remote_fp = ?remote_fp,
            "fingerprint mismatch, refreshing from remote"
        );

        let Some(bytes) = remote
            .get(name)
            .await
            .context("refresh fetch from remote store")?
        else {
            return Ok(None);
        };

        self.local
            .write(name, &bytes)
            .await
            .context("overwrite local chart with remote copy")?;

        info!(bytes = bytes.len(), "chart refreshed from remote");
        Ok(Some(Resolved {
            bytes,
            source: Source::Refreshed,
        }))
    }
}
