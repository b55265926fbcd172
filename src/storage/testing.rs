//! In-memory [`RemoteStore`] fake for exercising the resolver and ingest
//! pipeline without S3.
//!
//! Fingerprints are the MD5 hex of the stored bytes, matching what S3
//! reports for plain uploads, so local and remote fingerprints agree
//! exactly as they do in production.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Result};
use bytes::Bytes;
use md5::{Digest, Md5};

use super::RemoteStore;

/// Programmable in-memory remote store.
///
/// Call counters record how often each operation ran; the `fail_*` flags
/// make the corresponding operation return a transport error.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    objects: Mutex<HashMap<String, Bytes>>,
    pub put_calls: AtomicUsize,
    pub get_calls: AtomicUsize,
    pub fingerprint_calls: AtomicUsize,
    pub fail_put: AtomicBool,
    pub fail_get: AtomicBool,
    pub fail_fingerprint: AtomicBool,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite an object directly, bypassing `put` and its counters.
    /// Models an out-of-band change to the authoritative remote copy.
    pub fn set_object(&self, name: &str, content: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(name.to_string(), Bytes::copy_from_slice(content));
    }

    pub fn object(&self, name: &str) -> Option<Bytes> {
        self.objects.lock().unwrap().get(name).cloned()
    }
}

#[async_trait::async_trait]
impl RemoteStore for MemoryRemote {
    async fn put(&self, name: &str, content: &[u8]) -> Result<()> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_put.load(Ordering::SeqCst) {
            bail!("injected put failure");
        }
        self.set_object(name, content);
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Option<Bytes>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_get.load(Ordering::SeqCst) {
            bail!("injected get failure");
        }
        Ok(self.object(name))
    }

    async fn fingerprint(&self, name: &str) -> Result<Option<String>> {
        self.fingerprint_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_fingerprint.load(Ordering::SeqCst) {
            bail!("injected fingerprint failure");
        }
        Ok(self
            .object(name)
            .map(|bytes| hex::encode(Md5::digest(&bytes))))
    }
}
