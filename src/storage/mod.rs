//! Storage layer: the on-disk chart directory and the S3 mirror.
//!
//! Both stores are pure byte-level primitives with no caching policy of
//! their own -- the [`crate::cache::Resolver`] decides which tier a read is
//! served from.  The remote side is reached through the [`RemoteStore`]
//! trait so that the resolver and ingest pipeline can be exercised against
//! in-memory fakes.

pub mod local;
pub mod s3;
#[cfg(test)]
pub mod testing;

use anyhow::Result;
use bytes::Bytes;

pub use local::LocalStore;
pub use s3::S3RemoteStore;

/// Abstraction over the remote object store holding the authoritative
/// mirror of every chart.
///
/// `fingerprint` returns the store-native content tag for an object.  The
/// tag is opaque to callers: it is only ever compared as a string against
/// the local content hash, and identical uploads are guaranteed to produce
/// identical tags across calls.
#[async_trait::async_trait]
pub trait RemoteStore: Send + Sync {
    /// Upload `content` under `name`, replacing any existing object.
    async fn put(&self, name: &str, content: &[u8]) -> Result<()>;

    /// Fetch the full object bytes.  `Ok(None)` when the object does not
    /// exist; `Err` on transport failure.
    async fn get(&self, name: &str) -> Result<Option<Bytes>>;

    /// Fetch the object's content tag without transferring the body.
    /// `Ok(None)` when the object does not exist; `Err` on transport
    /// failure.
    async fn fingerprint(&self, name: &str) -> Result<Option<String>>;
}
