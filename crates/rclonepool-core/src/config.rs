use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{PoolError, PoolResult};

/// Top-level pool configuration, loaded from a flat JSON config file.
///
/// Every field is `#[serde(default)]`-backed so a partial config file only
/// needs to name the keys it wants to override — unrecognized keys in the
/// source file are simply ignored by serde.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base remote names (trailing `:`), e.g. `["r2:", "b2:"]`.
    pub remotes: Vec<String>,
    /// Crypt-wrapped remotes, used in place of `remotes` when `use_crypt` and non-empty.
    pub crypt_remotes: Vec<String>,
    /// Select crypt remotes when non-empty.
    pub use_crypt: bool,
    /// Bytes per chunk.
    pub chunk_size: u64,
    /// Chunk directory on each remote.
    pub data_prefix: String,
    /// Manifest directory on each remote.
    pub manifest_prefix: String,
    /// RAM-backed temp dir for in-flight chunks.
    pub temp_dir: PathBuf,
    /// Transport binary (rclone).
    pub rclone_binary: String,
    /// Extra flags passed to every transport invocation.
    pub rclone_flags: Vec<String>,
    /// WebDAV bind address.
    pub webdav_host: String,
    /// WebDAV bind port.
    pub webdav_port: u16,
    /// Intra-operation concurrency bound.
    pub max_parallel_workers: usize,
    /// Transport retry count.
    pub max_retries: u32,
    /// Base retry delay, seconds.
    pub retry_delay: f64,
    /// `least_used` | `round_robin_least_used`.
    pub balancing_strategy: BalancingStrategy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalancingStrategy {
    LeastUsed,
    RoundRobinLeastUsed,
}

impl Default for BalancingStrategy {
    fn default() -> Self {
        BalancingStrategy::LeastUsed
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            remotes: Vec::new(),
            crypt_remotes: Vec::new(),
            use_crypt: true,
            chunk_size: 104_857_600,
            data_prefix: "rclonepool_data".into(),
            manifest_prefix: "rclonepool_manifests".into(),
            temp_dir: PathBuf::from("/dev/shm/rclonepool"),
            rclone_binary: "rclone".into(),
            rclone_flags: vec!["--fast-list".into(), "--no-traverse".into()],
            webdav_host: "0.0.0.0".into(),
            webdav_port: 8080,
            max_parallel_workers: 4,
            max_retries: 3,
            retry_delay: 1.0,
            balancing_strategy: BalancingStrategy::LeastUsed,
        }
    }
}

impl Config {
    /// Load a config from a JSON file, falling back to defaults for any
    /// field the file doesn't mention. A missing file is not an error: it
    /// simply yields `Config::default()`.
    pub fn load(path: &Path) -> PoolResult<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| PoolError::ConfigInvalid(format!("reading {}: {e}", path.display())))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|e| PoolError::ConfigInvalid(format!("parsing {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Returns the remotes actually in effect once `use_crypt`/`crypt_remotes`
    /// selection is applied.
    pub fn active_remotes(&self) -> &[String] {
        if self.use_crypt && !self.crypt_remotes.is_empty() {
            &self.crypt_remotes
        } else {
            &self.remotes
        }
    }

    pub fn validate(&self) -> PoolResult<()> {
        if self.active_remotes().is_empty() {
            return Err(PoolError::ConfigInvalid(
                "no remotes configured (set `remotes` or `crypt_remotes`)".into(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(PoolError::ConfigInvalid("chunk_size must be > 0".into()));
        }
        if self.max_parallel_workers == 0 {
            return Err(PoolError::ConfigInvalid(
                "max_parallel_workers must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_defaults_from_empty_object() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.chunk_size, 104_857_600);
        assert_eq!(config.data_prefix, "rclonepool_data");
        assert_eq!(config.balancing_strategy, BalancingStrategy::LeastUsed);
        assert!(config.use_crypt);
    }

    #[test]
    fn parse_partial_overrides_one_field() {
        let json = r#"{"chunk_size": 1048576, "remotes": ["r2:", "b2:"]}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.chunk_size, 1048576);
        assert_eq!(config.remotes, vec!["r2:".to_string(), "b2:".to_string()]);
        // untouched fields keep their defaults
        assert_eq!(config.webdav_port, 8080);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let json = r#"{"chunk_size": 2048, "totally_unknown_key": 42}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.chunk_size, 2048);
    }

    #[test]
    fn active_remotes_prefers_crypt_when_enabled() {
        let mut config = Config {
            remotes: vec!["plain:".into()],
            crypt_remotes: vec!["crypt-r2:".into()],
            use_crypt: true,
            ..Default::default()
        };
        assert_eq!(config.active_remotes(), &["crypt-r2:".to_string()]);

        config.use_crypt = false;
        assert_eq!(config.active_remotes(), &["plain:".to_string()]);
    }

    #[test]
    fn validate_rejects_no_remotes() {
        let config = Config::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_chunk_size() {
        let config = Config {
            remotes: vec!["r2:".into()],
            chunk_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist.json");
        let config = Config::load(&path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"remotes": ["r2:"], "chunk_size": 4096, "webdav_port": 9090}"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.remotes, vec!["r2:".to_string()]);
        assert_eq!(config.chunk_size, 4096);
        assert_eq!(config.webdav_port, 9090);
    }
}
