use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub repo: RepoConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port the HTTP listener binds to.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    1323
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct RepoConfig {
    /// Public base URL of the chart endpoint.  Baked into the generated
    /// index file so that entries point back at this server.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Directory where uploaded charts are stored.
    #[serde(default = "default_charts_path")]
    pub path: String,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            path: default_charts_path(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:1323/charts/".to_string()
}

fn default_charts_path() -> String {
    "./charts".to_string()
}

// ---------------------------------------------------------------------------
// Storage (S3 mirror)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub s3: S3StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3StorageConfig {
    /// Mirror uploads to S3 and verify local copies against it on read.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Key prefix prepended to every object name in the bucket.
    #[serde(default)]
    pub prefix: String,
    /// Use path-style addressing (required by most non-AWS S3 endpoints).
    #[serde(default)]
    pub force_path_style: bool,
}

impl Default for S3StorageConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bucket: default_bucket(),
            region: default_region(),
            prefix: String::new(),
            force_path_style: false,
        }
    }
}

fn default_bucket() -> String {
    "charts".to_string()
}

fn default_region() -> String {
    "eu-west-1".to_string()
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Load and validate a [`Config`] from a YAML file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&contents)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Basic sanity checks that cannot be expressed purely with serde.
fn validate_config(config: &Config) -> Result<()> {
    anyhow::ensure!(!config.repo.path.is_empty(), "repo.path must not be empty");
    anyhow::ensure!(
        !config.repo.base_url.is_empty(),
        "repo.base_url must not be empty"
    );
    if config.storage.s3.enabled {
        anyhow::ensure!(
            !config.storage.s3.bucket.is_empty(),
            "storage.s3.bucket must not be empty when mirroring is enabled"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_builtin_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 1323);
        assert_eq!(config.repo.base_url, "http://localhost:1323/charts/");
        assert_eq!(config.repo.path, "./charts");
        assert_eq!(config.storage.s3.bucket, "charts");
        assert!(!config.storage.s3.enabled);
    }

    #[test]
    fn partial_config_overrides_defaults() {
        let yaml = r#"
server:
  port: 8080
repo:
  path: /var/lib/depot/charts
storage:
  s3:
    enabled: true
    bucket: my-charts
    region: us-east-1
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.repo.path, "/var/lib/depot/charts");
        assert!(config.storage.s3.enabled);
        assert_eq!(config.storage.s3.bucket, "my-charts");
        assert_eq!(config.storage.s3.region, "us-east-1");
        validate_config(&config).unwrap();
    }

    #[test]
    fn enabled_mirror_requires_bucket() {
        let yaml = r#"
storage:
  s3:
    enabled: true
    bucket: ""
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(validate_config(&config).is_err());
    }
}
