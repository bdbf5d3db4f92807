//! In-memory stand-in for [`RcloneTransport`](crate::rclone::RcloneTransport),
//! used by the manifest/pool/webdav crates' own test suites so they never
//! need a real `rclone` binary or network backend on the test machine.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use rclonepool_core::{PoolError, PoolResult};

use crate::trait_def::{RemoteStats, Transport};

/// Keyed by `(remote, path)`. `quota` caps `total` for `about()`; omit a
/// remote from `quota` to report `u64::MAX` total (effectively unlimited).
#[derive(Default)]
pub struct FakeTransport {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    quota: HashMap<String, u64>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: HashMap<String, u64>) -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            quota,
        }
    }

    fn key(remote: &str, path: &str) -> (String, String) {
        (remote.to_string(), path.to_string())
    }

    /// Test helper: inspect what was written without going through the trait.
    pub fn peek(&self, remote: &str, path: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(&Self::key(remote, path)).cloned()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn put(&self, local_path: &Path, remote: &str, path: &str) -> PoolResult<()> {
        let data = tokio::fs::read(local_path).await?;
        self.put_bytes(&data, remote, path).await
    }

    async fn put_bytes(&self, data: &[u8], remote: &str, path: &str) -> PoolResult<()> {
        self.objects
            .lock()
            .unwrap()
            .insert(Self::key(remote, path), data.to_vec());
        Ok(())
    }

    async fn get(&self, remote: &str, path: &str, local_path: &Path) -> PoolResult<()> {
        let data = self.get_bytes(remote, path).await?;
        tokio::fs::write(local_path, data).await?;
        Ok(())
    }

    async fn get_bytes(&self, remote: &str, path: &str) -> PoolResult<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&Self::key(remote, path))
            .cloned()
            .ok_or_else(|| PoolError::Transport {
                remote: remote.to_string(),
                detail: format!("no such object: {path}"),
            })
    }

    async fn get_range(&self, remote: &str, path: &str, offset: u64, length: u64) -> PoolResult<Vec<u8>> {
        let data = self.get_bytes(remote, path).await?;
        let start = offset.min(data.len() as u64) as usize;
        let end = (offset + length).min(data.len() as u64) as usize;
        Ok(data[start..end].to_vec())
    }

    async fn delete(&self, remote: &str, path: &str) -> PoolResult<()> {
        self.objects.lock().unwrap().remove(&Self::key(remote, path));
        Ok(())
    }

    async fn list_files(&self, remote: &str, prefix: &str) -> PoolResult<Vec<String>> {
        let objects = self.objects.lock().unwrap();
        Ok(objects
            .keys()
            .filter(|(r, p)| r == remote && p.starts_with(prefix))
            .map(|(_, p)| p.clone())
            .collect())
    }

    async fn list_dirs(&self, remote: &str, prefix: &str) -> PoolResult<Vec<String>> {
        let objects = self.objects.lock().unwrap();
        let mut dirs: Vec<String> = objects
            .keys()
            .filter(|(r, p)| r == remote && p.starts_with(prefix))
            .filter_map(|(_, p)| {
                let rest = p.strip_prefix(prefix)?.trim_start_matches('/');
                rest.split_once('/').map(|(dir, _)| dir.to_string())
            })
            .collect();
        dirs.sort();
        dirs.dedup();
        Ok(dirs)
    }

    async fn about(&self, remote: &str) -> PoolResult<RemoteStats> {
        let objects = self.objects.lock().unwrap();
        let used: u64 = objects
            .iter()
            .filter(|((r, _), _)| r == remote)
            .map(|(_, v)| v.len() as u64)
            .sum();
        let total = *self.quota.get(remote).unwrap_or(&u64::MAX);
        let free = total.saturating_sub(used);
        Ok(RemoteStats { used, free, total })
    }

    async fn exists(&self, remote: &str, path: &str) -> PoolResult<bool> {
        Ok(self.objects.lock().unwrap().contains_key(&Self::key(remote, path)))
    }

    async fn stat(&self, remote: &str, path: &str) -> PoolResult<Option<u64>> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .get(&Self::key(remote, path))
            .map(|v| v.len() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_bytes_then_get_bytes_roundtrips() {
        let t = FakeTransport::new();
        t.put_bytes(b"hello world", "r1:", "/a/b.txt").await.unwrap();
        let got = t.get_bytes("r1:", "/a/b.txt").await.unwrap();
        assert_eq!(got, b"hello world");
    }

    #[tokio::test]
    async fn get_range_slices_correctly() {
        let t = FakeTransport::new();
        t.put_bytes(b"0123456789", "r1:", "/f").await.unwrap();
        let slice = t.get_range("r1:", "/f", 3, 4).await.unwrap();
        assert_eq!(slice, b"3456");
    }

    #[tokio::test]
    async fn get_range_clamps_past_end() {
        let t = FakeTransport::new();
        t.put_bytes(b"0123456789", "r1:", "/f").await.unwrap();
        let slice = t.get_range("r1:", "/f", 8, 100).await.unwrap();
        assert_eq!(slice, b"89");
    }

    #[tokio::test]
    async fn missing_object_errors_on_get() {
        let t = FakeTransport::new();
        let err = t.get_bytes("r1:", "/nope").await.unwrap_err();
        assert!(matches!(err, PoolError::Transport { .. }));
    }

    #[tokio::test]
    async fn delete_then_exists_is_false() {
        let t = FakeTransport::new();
        t.put_bytes(b"x", "r1:", "/f").await.unwrap();
        assert!(t.exists("r1:", "/f").await.unwrap());
        t.delete("r1:", "/f").await.unwrap();
        assert!(!t.exists("r1:", "/f").await.unwrap());
    }

    #[tokio::test]
    async fn list_files_filters_by_remote_and_prefix() {
        let t = FakeTransport::new();
        t.put_bytes(b"x", "r1:", "/data/a").await.unwrap();
        t.put_bytes(b"y", "r1:", "/data/b").await.unwrap();
        t.put_bytes(b"z", "r2:", "/data/a").await.unwrap();
        let mut files = t.list_files("r1:", "/data").await.unwrap();
        files.sort();
        assert_eq!(files, vec!["/data/a".to_string(), "/data/b".to_string()]);
    }

    #[tokio::test]
    async fn about_reports_usage_against_quota() {
        let mut quota = HashMap::new();
        quota.insert("r1:".to_string(), 100u64);
        let t = FakeTransport::with_quota(quota);
        t.put_bytes(&vec![0u8; 40], "r1:", "/f").await.unwrap();
        let stats = t.about("r1:").await.unwrap();
        assert_eq!(stats.used, 40);
        assert_eq!(stats.total, 100);
        assert_eq!(stats.free, 60);
    }
}
