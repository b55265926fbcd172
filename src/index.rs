//! Repository index regeneration.
//!
//! The repository index (`index.yaml`) is rebuilt by the external `helm`
//! binary, which scans the chart directory and writes entries whose URLs
//! are rooted at the configured base URL.  The subprocess is a black box to
//! the rest of the system: it is reached only through the
//! [`IndexGenerator`] capability so that the ingest pipeline can be tested
//! without helm installed.

use std::path::Path;
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tracing::{debug, instrument};

/// Capability interface for (re)generating the repository index over the
/// current contents of the chart directory.
#[async_trait::async_trait]
pub trait IndexGenerator: Send + Sync {
    /// Rewrite the index file inside `directory`, annotating every chart
    /// with a URL rooted at `base_url`.
    async fn regenerate(&self, directory: &Path, base_url: &str) -> Result<()>;
}

/// Production generator: shells out to `helm repo index`.
#[derive(Debug, Default, Clone)]
pub struct HelmIndexGenerator;

#[async_trait::async_trait]
impl IndexGenerator for HelmIndexGenerator {
    #[instrument(skip(self), fields(directory = %directory.display(), %base_url))]
    async fn regenerate(&self, directory: &Path, base_url: &str) -> Result<()> {
        let mut cmd = Command::new("helm");
        cmd.arg("repo")
            .arg("index")
            .arg(directory)
            .arg("--url")
            .arg(base_url);

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        debug!("spawning helm repo index");

        let output = cmd
            .output()
            .await
            .context("failed to spawn helm repo index")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "helm repo index failed (status {}): {}",
                output.status,
                stderr.trim(),
            );
        }

        debug!("helm repo index succeeded");
        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;

    /// Records regeneration calls; optionally fails them.
    #[derive(Debug, Default)]
    pub struct RecordingIndexGenerator {
        pub calls: AtomicUsize,
        pub fail: AtomicBool,
        pub last_invocation: Mutex<Option<(PathBuf, String)>>,
    }

    #[async_trait::async_trait]
    impl IndexGenerator for RecordingIndexGenerator {
        async fn regenerate(&self, directory: &Path, base_url: &str) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_invocation.lock().unwrap() =
                Some((directory.to_path_buf(), base_url.to_string()));
            if self.fail.load(Ordering::SeqCst) {
                bail!("injected index generation failure");
            }
            Ok(())
        }
    }
}
