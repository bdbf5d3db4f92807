//! `ManifestStore`: create/save/load/list/delete over the configured
//! remotes, with an in-memory cache authoritative for same-process reads.
//! Modeled on the single-shared-map-behind-a-lock idiom used elsewhere in
//! this workspace for caching remote-backed state, swapping sync metadata
//! for manifests and a reader-writer lock for concurrent reads.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::RwLock;

use rclonepool_core::{ChunkDescriptor, Manifest, PoolError, PoolResult};
use rclonepool_transport::Transport;

use crate::naming::{chunk_path, manifest_path};

pub struct ManifestStore {
    transport: Arc<dyn Transport>,
    remotes: Vec<String>,
    manifest_prefix: String,
    data_prefix: String,
    cache: RwLock<HashMap<String, Manifest>>,
    disk_cache_dir: Option<PathBuf>,
}

impl ManifestStore {
    pub fn new(transport: Arc<dyn Transport>, remotes: Vec<String>, manifest_prefix: String, data_prefix: String) -> Self {
        Self {
            transport,
            remotes,
            manifest_prefix,
            data_prefix,
            cache: RwLock::new(HashMap::new()),
            disk_cache_dir: None,
        }
    }

    pub fn with_disk_cache(mut self, dir: PathBuf) -> Self {
        self.disk_cache_dir = Some(dir);
        self
    }

    pub fn chunk_path(&self, file_name: &str, index: u64) -> String {
        chunk_path(&self.data_prefix, file_name, index)
    }

    /// Builds and validates a new manifest in memory; does not persist it.
    pub fn create(&self, file_path: &str, file_size: u64, chunk_size: u64, chunks: Vec<ChunkDescriptor>) -> PoolResult<Manifest> {
        let (remote_dir, file_name) = Manifest::split_path(file_path);
        let checksum = rclonepool_chunk::layout_checksum(&chunks);
        let created_at = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();
        let manifest = Manifest {
            version: 1,
            file_path: file_path.to_string(),
            file_name,
            remote_dir,
            file_size,
            chunk_size,
            chunk_count: chunks.len() as u64,
            chunks,
            created_at,
            checksum,
            extra: serde_json::Map::new(),
        };
        manifest.validate()?;
        Ok(manifest)
    }

    /// Writes the serialized manifest to every configured remote. At least
    /// one success is required for durability; returns the remotes that
    /// actually succeeded. Updates the cache unconditionally on success.
    pub async fn save(&self, manifest: &Manifest) -> PoolResult<Vec<String>> {
        let body = serde_json::to_vec_pretty(manifest).map_err(|e| PoolError::Other(e.into()))?;
        let path = manifest_path(&self.manifest_prefix, &manifest.file_path);

        let mut handles = Vec::with_capacity(self.remotes.len());
        for remote in &self.remotes {
            let transport = self.transport.clone();
            let remote = remote.clone();
            let path = path.clone();
            let body = body.clone();
            handles.push(tokio::spawn(async move {
                let result = transport.put_bytes(&body, &remote, &path).await;
                (remote, result)
            }));
        }

        let mut succeeded = Vec::new();
        for handle in handles {
            match handle.await {
                Ok((remote, Ok(()))) => succeeded.push(remote),
                Ok((remote, Err(e))) => tracing::warn!(remote, error = %e, "manifest save failed on remote"),
                Err(e) => tracing::warn!(error = %e, "manifest save task panicked"),
            }
        }

        if succeeded.is_empty() {
            return Err(PoolError::ManifestSaveFailed {
                path: manifest.file_path.clone(),
                attempted: self.remotes.len(),
            });
        }

        self.cache.write().await.insert(manifest.file_path.clone(), manifest.clone());
        if let Some(dir) = &self.disk_cache_dir {
            self.write_disk_cache(dir, manifest).await;
        }

        Ok(succeeded)
    }

    /// Checks the in-memory cache, then the optional on-disk cache, then
    /// iterates remotes in configured order and returns the first
    /// successful parse.
    pub async fn load(&self, file_path: &str) -> PoolResult<Manifest> {
        if let Some(m) = self.cache.read().await.get(file_path) {
            return Ok(m.clone());
        }

        if let Some(dir) = &self.disk_cache_dir {
            if let Some(m) = self.read_disk_cache(dir, file_path).await {
                self.cache.write().await.insert(file_path.to_string(), m.clone());
                return Ok(m);
            }
        }

        let path = manifest_path(&self.manifest_prefix, file_path);
        for remote in &self.remotes {
            match self.transport.get_bytes(remote, &path).await {
                Ok(bytes) => match serde_json::from_slice::<Manifest>(&bytes) {
                    Ok(m) => {
                        self.cache.write().await.insert(file_path.to_string(), m.clone());
                        if let Some(dir) = &self.disk_cache_dir {
                            self.write_disk_cache(dir, &m).await;
                        }
                        return Ok(m);
                    }
                    Err(e) => tracing::warn!(remote, error = %e, "manifest parse failed"),
                },
                Err(e) => tracing::debug!(remote, error = %e, "manifest not found on remote"),
            }
        }

        Err(PoolError::ManifestNotFound(file_path.to_string()))
    }

    /// Enumerates manifest names on the first responsive remote, filters by
    /// prefix, and loads each. Directories are synthesized by callers from
    /// the returned file paths, not by this method.
    pub async fn list(&self, dir_prefix: &str) -> PoolResult<Vec<Manifest>> {
        let mut names = None;
        for remote in &self.remotes {
            match self.transport.list_files(remote, &self.manifest_prefix).await {
                Ok(found) => {
                    names = Some(found);
                    break;
                }
                Err(e) => tracing::debug!(remote, error = %e, "list_files failed, trying next remote"),
            }
        }
        let names = names.ok_or_else(|| PoolError::Transport {
            remote: self.remotes.join(","),
            detail: "no remote responded to list_files".to_string(),
        })?;

        let mut manifests = Vec::new();
        for name in names {
            if !name.ends_with(".manifest.json") {
                continue;
            }
            if let Ok(m) = self.load_by_manifest_object_name(&name).await {
                if m.file_path.starts_with(dir_prefix) {
                    manifests.push(m);
                }
            }
        }
        Ok(manifests)
    }

    async fn load_by_manifest_object_name(&self, object_path: &str) -> PoolResult<Manifest> {
        for remote in &self.remotes {
            if let Ok(bytes) = self.transport.get_bytes(remote, object_path).await {
                if let Ok(m) = serde_json::from_slice::<Manifest>(&bytes) {
                    self.cache.write().await.insert(m.file_path.clone(), m.clone());
                    return Ok(m);
                }
            }
        }
        Err(PoolError::ManifestNotFound(object_path.to_string()))
    }

    /// Deletes the manifest object from every remote (non-fatal per-remote
    /// failures) and drops it from the cache.
    pub async fn delete(&self, file_path: &str) -> PoolResult<()> {
        let path = manifest_path(&self.manifest_prefix, file_path);
        for remote in &self.remotes {
            if let Err(e) = self.transport.delete(remote, &path).await {
                tracing::warn!(remote, error = %e, "manifest delete failed on remote");
            }
        }
        self.cache.write().await.remove(file_path);
        if let Some(dir) = &self.disk_cache_dir {
            let _ = tokio::fs::remove_file(self.disk_cache_path(dir, file_path)).await;
        }
        Ok(())
    }

    /// Re-enumerates manifests from remotes and replaces the cache
    /// contents wholesale.
    pub async fn rebuild_cache(&self) -> PoolResult<()> {
        let manifests = self.list("").await?;
        let mut cache = self.cache.write().await;
        cache.clear();
        for m in manifests {
            cache.insert(m.file_path.clone(), m);
        }
        Ok(())
    }

    fn disk_cache_path(&self, dir: &std::path::Path, file_path: &str) -> PathBuf {
        dir.join(crate::naming::sanitize(file_path)).with_extension("json")
    }

    async fn write_disk_cache(&self, dir: &std::path::Path, manifest: &Manifest) {
        if tokio::fs::create_dir_all(dir).await.is_err() {
            return;
        }
        let final_path = self.disk_cache_path(dir, &manifest.file_path);
        let tmp_path = final_path.with_extension("json.tmp");
        let Ok(body) = serde_json::to_vec(manifest) else { return };
        if tokio::fs::write(&tmp_path, &body).await.is_ok() {
            let _ = tokio::fs::rename(&tmp_path, &final_path).await;
        }
    }

    async fn read_disk_cache(&self, dir: &std::path::Path, file_path: &str) -> Option<Manifest> {
        let path = self.disk_cache_path(dir, file_path);
        let bytes = tokio::fs::read(&path).await.ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(m) => Some(m),
            Err(_) => {
                let _ = tokio::fs::remove_file(&path).await;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rclonepool_transport::FakeTransport;

    fn chunk(index: u64, size: u64, offset: u64) -> ChunkDescriptor {
        ChunkDescriptor {
            index,
            remote: "r1:".into(),
            path: format!("rclonepool_data/f.bin.chunk.{index:03}"),
            size,
            offset,
        }
    }

    fn store(remotes: Vec<&str>) -> ManifestStore {
        let transport: Arc<dyn Transport> = Arc::new(FakeTransport::new());
        ManifestStore::new(
            transport,
            remotes.into_iter().map(String::from).collect(),
            "rclonepool_manifests".into(),
            "rclonepool_data".into(),
        )
    }

    #[test]
    fn create_builds_a_valid_manifest() {
        let s = store(vec!["r1:"]);
        let m = s.create("/dir/f.bin", 150, 100, vec![chunk(0, 100, 0), chunk(1, 50, 100)]).unwrap();
        assert_eq!(m.file_name, "f.bin");
        assert_eq!(m.remote_dir, "/dir");
        assert!(!m.checksum.is_empty());
    }

    #[tokio::test]
    async fn save_then_load_roundtrips_through_cache() {
        let s = store(vec!["r1:", "r2:"]);
        let m = s.create("/f.bin", 100, 100, vec![chunk(0, 100, 0)]).unwrap();
        let succeeded = s.save(&m).await.unwrap();
        assert_eq!(succeeded.len(), 2);

        let loaded = s.load("/f.bin").await.unwrap();
        assert_eq!(loaded.file_path, "/f.bin");
    }

    #[tokio::test]
    async fn load_falls_back_through_remotes_in_order() {
        let transport: Arc<dyn Transport> = Arc::new(FakeTransport::new());
        let s = ManifestStore::new(
            transport.clone(),
            vec!["down:".into(), "up:".into()],
            "rclonepool_manifests".into(),
            "rclonepool_data".into(),
        );
        let m = s.create("/f.bin", 0, 100, vec![]).unwrap();
        let body = serde_json::to_vec(&m).unwrap();
        transport.put_bytes(&body, "up:", "rclonepool_manifests/f.bin.manifest.json").await.unwrap();

        let loaded = s.load("/f.bin").await.unwrap();
        assert_eq!(loaded.file_path, "/f.bin");
    }

    #[tokio::test]
    async fn load_missing_fails_with_manifest_not_found() {
        let s = store(vec!["r1:"]);
        let err = s.load("/nope.bin").await.unwrap_err();
        assert!(matches!(err, PoolError::ManifestNotFound(_)));
    }

    #[tokio::test]
    async fn delete_removes_from_cache_and_remotes() {
        let s = store(vec!["r1:"]);
        let m = s.create("/f.bin", 0, 100, vec![]).unwrap();
        s.save(&m).await.unwrap();
        s.delete("/f.bin").await.unwrap();
        let err = s.load("/f.bin").await.unwrap_err();
        assert!(matches!(err, PoolError::ManifestNotFound(_)));
    }

    #[tokio::test]
    async fn list_filters_by_directory_prefix() {
        let s = store(vec!["r1:"]);
        let a = s.create("/dir/a.bin", 0, 100, vec![]).unwrap();
        let b = s.create("/other/b.bin", 0, 100, vec![]).unwrap();
        s.save(&a).await.unwrap();
        s.save(&b).await.unwrap();

        let found = s.list("/dir").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].file_path, "/dir/a.bin");
    }

    #[tokio::test]
    async fn disk_cache_survives_in_memory_cache_clear() {
        let dir = tempfile::tempdir().unwrap();
        let transport: Arc<dyn Transport> = Arc::new(FakeTransport::new());
        let s = ManifestStore::new(
            transport,
            vec!["r1:".into()],
            "rclonepool_manifests".into(),
            "rclonepool_data".into(),
        )
        .with_disk_cache(dir.path().to_path_buf());
        let m = s.create("/f.bin", 0, 100, vec![]).unwrap();
        s.save(&m).await.unwrap();

        s.cache.write().await.clear();
        let loaded = s.load("/f.bin").await.unwrap();
        assert_eq!(loaded.file_path, "/f.bin");
    }
}
