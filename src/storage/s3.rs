//! S3 mirror of the chart directory.
//!
//! Implements [`RemoteStore`] on top of `aws-sdk-s3`.  Fingerprints are the
//! object's ETag with the surrounding quotes stripped; for plain (single
//! part) uploads this is the MD5 hex of the content, which is what makes
//! the resolver's local-vs-remote comparison work.  Multipart uploads
//! produce composite ETags that never match a whole-content MD5 -- those
//! objects are simply always re-fetched.

use anyhow::{Context, Result};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::{debug, instrument};

use super::RemoteStore;

/// High-level wrapper around the S3 bucket mirroring the chart directory.
#[derive(Debug, Clone)]
pub struct S3RemoteStore {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3RemoteStore {
    /// Create a new `S3RemoteStore` from an already-configured `Client` and
    /// the application-level S3 config section.
    pub fn new(client: Client, bucket: String, prefix: String) -> Self {
        Self {
            client,
            bucket,
            prefix,
        }
    }

    /// Build the full S3 object key for a chart name.
    fn s3_key(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }
}

#[async_trait::async_trait]
impl RemoteStore for S3RemoteStore {
    #[instrument(skip(self, content), fields(bucket = %self.bucket, %name, bytes = content.len()))]
    async fn put(&self, name: &str, content: &[u8]) -> Result<()> {
        let key = self.s3_key(name);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(content.to_vec()))
            .send()
            .await
            .context("S3 PutObject")?;
        debug!(%key, "chart uploaded to S3");
        Ok(())
    }

    #[instrument(skip(self), fields(bucket = %self.bucket, %name))]
    async fn get(&self, name: &str) -> Result<Option<Bytes>> {
        let key = self.s3_key(name);
        let resp = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(err) => {
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_no_such_key())
                {
                    debug!(%key, "chart not present in S3");
                    return Ok(None);
                }
                return Err(err).context("S3 GetObject");
            }
        };

        let bytes = resp
            .body
            .collect()
            .await
            .context("read S3 GetObject body")?
            .into_bytes();

        debug!(%key, bytes = bytes.len(), "chart downloaded from S3");
        Ok(Some(bytes))
    }

    #[instrument(skip(self), fields(bucket = %self.bucket, %name))]
    async fn fingerprint(&self, name: &str) -> Result<Option<String>> {
        let key = self.s3_key(name);
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
        {
            Ok(resp) => {
                let etag = resp
                    .e_tag()
                    .map(|tag| tag.trim_matches('"').to_string());
                debug!(%key, etag = ?etag, "fetched S3 object ETag");
                Ok(etag)
            }
            Err(err) => {
                // The SDK reports a missing object as a service error with
                // an is_not_found marker (HTTP 404 on HeadObject).
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_not_found())
                {
                    debug!(%key, "chart not present in S3");
                    Ok(None)
                } else {
                    Err(err).context("S3 HeadObject")
                }
            }
        }
    }
}
