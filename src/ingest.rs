//! Chart ingest pipeline.
//!
//! Accepts an uploaded chart, writes it to the local store, mirrors it to
//! S3 when mirroring is enabled, and triggers index regeneration.  Only the
//! local write is load-bearing: a failed mirror upload or index run is
//! logged and the upload still succeeds.  The artifact can temporarily lag
//! on the remote side; the resolver's mismatch-triggers-refresh logic
//! governs what later reads observe.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, instrument, warn};

use crate::index::IndexGenerator;
use crate::storage::{LocalStore, RemoteStore};

/// Writes uploads into both storage tiers and keeps the index current.
#[derive(Clone)]
pub struct Ingestor {
    local: LocalStore,
    remote: Option<Arc<dyn RemoteStore>>,
    indexer: Arc<dyn IndexGenerator>,
    base_url: String,
}

impl Ingestor {
    pub fn new(
        local: LocalStore,
        remote: Option<Arc<dyn RemoteStore>>,
        indexer: Arc<dyn IndexGenerator>,
        base_url: String,
    ) -> Self {
        Self {
            local,
            remote,
            indexer,
            base_url,
        }
    }

    /// Durably accept an uploaded chart under `name`.
    ///
    /// An existing chart of the same name is silently overwritten.  Returns
    /// an error only when the local write fails; mirror and index failures
    /// are logged and absorbed.
    #[instrument(skip(self, content), fields(%name, bytes = content.len()))]
    pub async fn ingest(&self, name: &str, content: &[u8]) -> Result<()> {
        info!("ingesting chart");

        self.local
            .write(name, content)
            .await
            .with_context(|| format!("store uploaded chart {name}"))?;

        if let Some(remote) = &self.remote {
            if let Err(e) = remote.put(name, content).await {
                error!(error = %e, "failed to mirror chart to remote store");
            }
        }

        if let Err(e) = self
            .indexer
            .regenerate(self.local.base_path(), &self.base_url)
            .await
        {
            warn!(error = %e, "index regeneration after upload failed");
        }

        info!("chart ingested");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::cache::{Resolver, Source};
    use crate::index::testing::RecordingIndexGenerator;
    use crate::storage::testing::MemoryRemote;

    struct Fixture {
        _dir: tempfile::TempDir,
        ingestor: Ingestor,
        resolver: Resolver,
        remote: Arc<MemoryRemote>,
        indexer: Arc<RecordingIndexGenerator>,
        local: LocalStore,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let local = LocalStore::new(dir.path());
        let remote = Arc::new(MemoryRemote::new());
        let indexer = Arc::new(RecordingIndexGenerator::default());
        let ingestor = Ingestor::new(
            local.clone(),
            Some(Arc::clone(&remote) as Arc<dyn RemoteStore>),
            Arc::clone(&indexer) as Arc<dyn IndexGenerator>,
            "http://localhost:1323/charts/".to_string(),
        );
        let resolver = Resolver::new(
            local.clone(),
            Some(Arc::clone(&remote) as Arc<dyn RemoteStore>),
        );
        Fixture {
            _dir: dir,
            ingestor,
            resolver,
            remote,
            indexer,
            local,
        }
    }

    #[tokio::test]
    async fn ingest_writes_both_tiers_and_reindexes() {
        let fx = fixture();
        fx.ingestor.ingest("app-1.0.tgz", b"chart").await.unwrap();

        let local = fx.local.read("app-1.0.tgz").await.unwrap().unwrap();
        assert_eq!(&local[..], b"chart");
        assert_eq!(&fx.remote.object("app-1.0.tgz").unwrap()[..], b"chart");
        assert_eq!(fx.indexer.calls.load(Ordering::SeqCst), 1);
        let (_, base_url) = fx.indexer.last_invocation.lock().unwrap().clone().unwrap();
        assert_eq!(base_url, "http://localhost:1323/charts/");
    }

    #[tokio::test]
    async fn read_immediately_after_ingest_is_a_cache_hit() {
        let fx = fixture();
        fx.ingestor.ingest("app-1.0.tgz", b"uploaded").await.unwrap();

        let resolved = fx.resolver.resolve("app-1.0.tgz").await.unwrap().unwrap();
        assert_eq!(resolved.source, Source::CacheHit);
        assert_eq!(&resolved.bytes[..], b"uploaded");
        assert_eq!(fx.remote.get_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn repeated_identical_ingest_is_idempotent() {
        let fx = fixture();
        fx.ingestor.ingest("app-1.0.tgz", b"same bytes").await.unwrap();
        fx.ingestor.ingest("app-1.0.tgz", b"same bytes").await.unwrap();

        let local = fx.local.read("app-1.0.tgz").await.unwrap().unwrap();
        assert_eq!(&local[..], b"same bytes");
        assert_eq!(&fx.remote.object("app-1.0.tgz").unwrap()[..], b"same bytes");

        let resolved = fx.resolver.resolve("app-1.0.tgz").await.unwrap().unwrap();
        assert_eq!(resolved.source, Source::CacheHit);
    }

    #[tokio::test]
    async fn mirror_failure_does_not_fail_the_upload() {
        let fx = fixture();
        fx.remote.fail_put.store(true, Ordering::SeqCst);

        fx.ingestor.ingest("app-1.0.tgz", b"local only").await.unwrap();

        let local = fx.local.read("app-1.0.tgz").await.unwrap().unwrap();
        assert_eq!(&local[..], b"local only");
        assert!(fx.remote.object("app-1.0.tgz").is_none());
        // The index still ran over the successfully written local copy.
        assert_eq!(fx.indexer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn index_failure_does_not_fail_the_upload() {
        let fx = fixture();
        fx.indexer.fail.store(true, Ordering::SeqCst);

        fx.ingestor.ingest("app-1.0.tgz", b"chart").await.unwrap();
        assert_eq!(fx.indexer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn ingest_without_mirroring_skips_remote() {
        let dir = tempfile::tempdir().unwrap();
        let local = LocalStore::new(dir.path());
        let indexer = Arc::new(RecordingIndexGenerator::default());
        let ingestor = Ingestor::new(
            local.clone(),
            None,
            Arc::clone(&indexer) as Arc<dyn IndexGenerator>,
            "http://localhost:1323/charts/".to_string(),
        );

        ingestor.ingest("app-1.0.tgz", b"chart").await.unwrap();
        assert!(local.read("app-1.0.tgz").await.unwrap().is_some());
    }
}
