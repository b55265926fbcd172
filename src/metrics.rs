use std::sync::Arc;

use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;

// ---------------------------------------------------------------------------
// Label types
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ReadLabels {
    pub outcome: ReadOutcome,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum ReadOutcome {
    /// Local fingerprint matched the S3 tag; served from disk.
    Hit,
    /// Refetched from S3 and the local copy overwritten.
    Refreshed,
    /// Mirroring disabled; served straight from disk.
    Local,
    /// Chart found in neither tier.
    Miss,
}

// ---------------------------------------------------------------------------
// Metrics struct
// ---------------------------------------------------------------------------

/// Central container for every Prometheus metric exposed by the server.
pub struct Metrics {
    // -- reads --
    pub reads_total: Family<ReadLabels, Counter>,
    pub refresh_bytes: Counter,

    // -- uploads --
    pub uploads_total: Counter,
    pub upload_failures: Counter,
    pub upload_bytes: Counter,
}

impl Metrics {
    /// Create a new [`Metrics`] instance and register every metric with the
    /// supplied `registry`.
    pub fn new(registry: &mut Registry) -> Self {
        let reads_total = Family::<ReadLabels, Counter>::default();
        registry.register(
            "depot_reads_total",
            "Chart read requests by cache outcome",
            reads_total.clone(),
        );

        let refresh_bytes = Counter::default();
        registry.register(
            "depot_refresh_bytes_total",
            "Total bytes fetched from the remote store by cache refreshes",
            refresh_bytes.clone(),
        );

        let uploads_total = Counter::default();
        registry.register(
            "depot_uploads_total",
            "Successfully ingested chart uploads",
            uploads_total.clone(),
        );

        let upload_failures = Counter::default();
        registry.register(
            "depot_upload_failures_total",
            "Chart uploads rejected or failed",
            upload_failures.clone(),
        );

        let upload_bytes = Counter::default();
        registry.register(
            "depot_upload_bytes_total",
            "Total bytes accepted through chart uploads",
            upload_bytes.clone(),
        );

        Self {
            reads_total,
            refresh_bytes,
            uploads_total,
            upload_failures,
            upload_bytes,
        }
    }
}

// ---------------------------------------------------------------------------
// Shared handle
// ---------------------------------------------------------------------------

/// Thread-safe wrapper for the metrics registry, used in [`crate::AppState`].
#[derive(Clone)]
pub struct MetricsRegistry {
    pub registry: Arc<Registry>,
    pub metrics: Arc<Metrics>,
}

impl MetricsRegistry {
    /// Build a fresh registry and pre-register all server metrics.
    pub fn new() -> Self {
        let mut registry = Registry::default();
        let metrics = Metrics::new(&mut registry);
        Self {
            registry: Arc::new(registry),
            metrics: Arc::new(metrics),
        }
    }
}
