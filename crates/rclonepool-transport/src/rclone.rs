//! Subprocess adapter over the `rclone` binary.
//!
//! Each operation spawns a fresh `rclone` process: a good fit
//! for a pool-of-workers concurrency primitive, since each transport call is
//! a unit of cancellable work. Retries with exponential backoff live here,
//! wrapping the raw subprocess call, not in Pool callers.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use rclonepool_core::{PoolError, PoolResult};

use crate::retry::{with_retry, RetryPolicy};
use crate::trait_def::{RemoteStats, Transport};

pub struct RcloneTransport {
    binary: String,
    flags: Vec<String>,
    retry_policy: RetryPolicy,
    call_timeout: Duration,
}

impl RcloneTransport {
    pub fn new(binary: String, flags: Vec<String>, retry_policy: RetryPolicy, call_timeout: Duration) -> Self {
        Self {
            binary,
            flags,
            retry_policy,
            call_timeout,
        }
    }

    /// Runs `rclone <args>` once, with the configured global flags appended,
    /// enforcing `call_timeout`. Does not retry — callers wrap this in
    /// `with_retry`.
    async fn run_once(&self, remote: &str, args: &[&str]) -> PoolResult<Vec<u8>> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args)
            .args(&self.flags)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let child = cmd.spawn().map_err(|e| PoolError::Transport {
            remote: remote.to_string(),
            detail: format!("spawning {}: {e}", self.binary),
        })?;

        let output = tokio::time::timeout(self.call_timeout, child.wait_with_output())
            .await
            .map_err(|_| PoolError::TransportTimeout {
                remote: remote.to_string(),
                elapsed_ms: self.call_timeout.as_millis() as u64,
            })?
            .map_err(|e| PoolError::Transport {
                remote: remote.to_string(),
                detail: format!("waiting on {}: {e}", self.binary),
            })?;

        if !output.status.success() {
            return Err(PoolError::Transport {
                remote: remote.to_string(),
                detail: format!(
                    "{} exited with {}: {}",
                    self.binary,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        Ok(output.stdout)
    }

    async fn run(&self, remote: &str, args: Vec<String>) -> PoolResult<Vec<u8>> {
        with_retry(self.retry_policy, || {
            let args_ref: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
            async move { self.run_once(remote, &args_ref).await }
        })
        .await
    }
}

#[derive(Debug, Deserialize)]
struct AboutJson {
    used: Option<u64>,
    free: Option<u64>,
    total: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct LsJsonEntry {
    #[serde(rename = "Name")]
    name: String,
    #[allow(dead_code)]
    #[serde(rename = "Size")]
    size: i64,
    #[allow(dead_code)]
    #[serde(rename = "IsDir")]
    is_dir: bool,
}

/// `lsjson` reports each entry's leaf name only; every caller (manifest
/// listing, orphan sweeps) treats `list_files`/`list_dirs` results as full
/// paths relative to the remote root, so re-qualify with the queried
/// prefix here rather than at each call site.
fn join_prefix(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{name}", prefix.trim_end_matches('/'))
    }
}

#[async_trait]
impl Transport for RcloneTransport {
    async fn put(&self, local_path: &Path, remote: &str, path: &str) -> PoolResult<()> {
        let dest = format!("{remote}{path}");
        self.run(
            remote,
            vec!["copyto".into(), local_path.display().to_string(), dest],
        )
        .await?;
        Ok(())
    }

    async fn put_bytes(&self, data: &[u8], remote: &str, path: &str) -> PoolResult<()> {
        let mut tmp = tempfile::NamedTempFile::new()?;
        {
            let file = tmp.as_file_mut();
            use std::io::Write;
            file.write_all(data)?;
            file.flush()?;
        }
        self.put(tmp.path(), remote, path).await
    }

    async fn get(&self, remote: &str, path: &str, local_path: &Path) -> PoolResult<()> {
        let src = format!("{remote}{path}");
        self.run(
            remote,
            vec!["copyto".into(), src, local_path.display().to_string()],
        )
        .await?;
        Ok(())
    }

    async fn get_bytes(&self, remote: &str, path: &str) -> PoolResult<Vec<u8>> {
        let src = format!("{remote}{path}");
        self.run(remote, vec!["cat".into(), src]).await
    }

    async fn get_range(&self, remote: &str, path: &str, offset: u64, length: u64) -> PoolResult<Vec<u8>> {
        let src = format!("{remote}{path}");
        self.run(
            remote,
            vec![
                "cat".into(),
                "--offset".into(),
                offset.to_string(),
                "--count".into(),
                length.to_string(),
                src,
            ],
        )
        .await
    }

    async fn delete(&self, remote: &str, path: &str) -> PoolResult<()> {
        let dest = format!("{remote}{path}");
        self.run(remote, vec!["deletefile".into(), dest]).await?;
        Ok(())
    }

    async fn list_files(&self, remote: &str, prefix: &str) -> PoolResult<Vec<String>> {
        let target = format!("{remote}{prefix}");
        let out = self
            .run(
                remote,
                vec!["lsjson".into(), "--files-only".into(), target],
            )
            .await?;
        let entries: Vec<LsJsonEntry> = serde_json::from_slice(&out).unwrap_or_default();
        Ok(entries.into_iter().map(|e| join_prefix(prefix, &e.name)).collect())
    }

    async fn list_dirs(&self, remote: &str, prefix: &str) -> PoolResult<Vec<String>> {
        let target = format!("{remote}{prefix}");
        let out = self
            .run(remote, vec!["lsjson".into(), "--dirs-only".into(), target])
            .await?;
        let entries: Vec<LsJsonEntry> = serde_json::from_slice(&out).unwrap_or_default();
        Ok(entries.into_iter().map(|e| join_prefix(prefix, &e.name)).collect())
    }

    async fn about(&self, remote: &str) -> PoolResult<RemoteStats> {
        let out = self
            .run(remote, vec!["about".into(), remote.to_string(), "--json".into()])
            .await?;
        let parsed: AboutJson = serde_json::from_slice(&out).map_err(|e| PoolError::Transport {
            remote: remote.to_string(),
            detail: format!("parsing `about` output: {e}"),
        })?;
        let total = parsed.total.unwrap_or(u64::MAX);
        let used = parsed.used.unwrap_or(0);
        let free = parsed.free.unwrap_or(total.saturating_sub(used));
        Ok(RemoteStats { used, free, total })
    }

    async fn exists(&self, remote: &str, path: &str) -> PoolResult<bool> {
        Ok(self.stat(remote, path).await?.is_some())
    }

    async fn stat(&self, remote: &str, path: &str) -> PoolResult<Option<u64>> {
        let target = format!("{remote}{path}");
        let out = self
            .run(remote, vec!["lsjson".into(), "--stat".into(), target])
            .await;
        match out {
            Ok(bytes) => {
                let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
                if parsed.is_null() {
                    Ok(None)
                } else {
                    Ok(parsed.get("Size").and_then(|v| v.as_u64()))
                }
            }
            Err(PoolError::Transport { detail, .. }) if detail.contains("directory not found") || detail.contains("object not found") => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
