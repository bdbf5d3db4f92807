//! `Pool`: the orchestrator composing chunking, balancing, manifests, and
//! transport into upload/download/list/delete.

use std::path::Path;
use std::sync::Arc;

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::Semaphore;

use rclonepool_balancer::Balancer;
use rclonepool_chunk::ChunkReader;
use rclonepool_core::{ChunkDescriptor, Config, Manifest, PoolError, PoolResult};
use rclonepool_manifest::ManifestStore;
use rclonepool_transport::{with_retry, RetryPolicy, Transport};

use crate::locks::PathLocks;

#[derive(Debug, Clone)]
pub struct FileSummary {
    pub file_path: String,
    pub file_size: u64,
    pub chunk_count: u64,
    pub remotes: Vec<String>,
    pub created_at: f64,
}

#[derive(Debug, Clone)]
pub struct RemoteStatus {
    pub remote: String,
    pub used: u64,
    pub free: u64,
    pub total: u64,
}

pub struct Pool {
    config: Config,
    transport: Arc<dyn Transport>,
    balancer: Arc<Balancer>,
    manifests: Arc<ManifestStore>,
    locks: PathLocks,
}

impl Pool {
    /// Builds a Pool and seeds its balancer from `Transport::about` on every
    /// active remote.
    pub async fn new(config: Config, transport: Arc<dyn Transport>) -> PoolResult<Self> {
        let remotes = config.active_remotes().to_vec();
        let balancer = Arc::new(Balancer::new(config.balancing_strategy));
        balancer.seed(transport.as_ref(), &remotes).await?;
        let manifests = Arc::new(ManifestStore::new(
            transport.clone(),
            remotes,
            config.manifest_prefix.clone(),
            config.data_prefix.clone(),
        ));
        Ok(Self {
            config,
            transport,
            balancer,
            manifests,
            locks: PathLocks::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn balancer(&self) -> &Arc<Balancer> {
        &self.balancer
    }

    pub fn manifests(&self) -> &Arc<ManifestStore> {
        &self.manifests
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub(crate) async fn lock_path(&self, file_path: &str) -> tokio::sync::OwnedMutexGuard<()> {
        self.locks.lock(file_path).await
    }

    pub(crate) fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.config.max_retries, self.config.retry_delay)
    }

    /// Uploads the file at `local_path` under logical path `file_path`.
    /// Refuses with `AlreadyExists` unless `overwrite` is set; on overwrite,
    /// the old manifest's chunks are deleted only after the new manifest is
    /// durable.
    pub async fn upload(&self, local_path: &Path, file_path: &str, overwrite: bool) -> PoolResult<Manifest> {
        let _guard = self.locks.lock(file_path).await;

        let previous = match self.manifests.load(file_path).await {
            Ok(m) => Some(m),
            Err(PoolError::ManifestNotFound(_)) => None,
            Err(e) => return Err(e),
        };
        if previous.is_some() && !overwrite {
            return Err(PoolError::AlreadyExists(file_path.to_string()));
        }

        let file_size = tokio::fs::metadata(local_path).await?.len();
        let (_, file_name) = Manifest::split_path(file_path);

        let file = File::open(local_path).await?;
        let mut reader = ChunkReader::new(file, self.config.chunk_size)?;

        let mut descriptors: Vec<ChunkDescriptor> = Vec::new();
        let upload_result = self.upload_chunks(&mut reader, &file_name, &mut descriptors).await;

        if let Err(e) = upload_result {
            self.rollback_chunks(&descriptors).await;
            return Err(e);
        }

        let manifest = match self.manifests.create(file_path, file_size, self.config.chunk_size, descriptors.clone()) {
            Ok(m) => m,
            Err(e) => {
                self.rollback_chunks(&descriptors).await;
                return Err(e);
            }
        };

        if let Err(e) = self.manifests.save(&manifest).await {
            self.rollback_chunks(&descriptors).await;
            return Err(e);
        }

        if let Some(old) = previous {
            self.delete_chunks(&old.chunks).await;
        }

        Ok(manifest)
    }

    async fn upload_chunks<R: AsyncRead + Unpin>(
        &self,
        reader: &mut ChunkReader<R>,
        file_name: &str,
        descriptors: &mut Vec<ChunkDescriptor>,
    ) -> PoolResult<()> {
        while let Some((window, bytes)) = reader.next_chunk().await? {
            let remote = self.balancer.pick(window.length)?;
            let object_path = self.manifests.chunk_path(file_name, window.index);

            let tmp = tempfile::NamedTempFile::new_in(&self.config.temp_dir).map_err(|e| {
                if e.raw_os_error() == Some(28) {
                    PoolError::TempFull(self.config.temp_dir.display().to_string())
                } else {
                    PoolError::Io(e)
                }
            })?;
            tokio::fs::write(tmp.path(), &bytes).await?;

            let put_result = {
                let transport = self.transport.clone();
                let remote = remote.clone();
                let object_path = object_path.clone();
                let tmp_path = tmp.path().to_path_buf();
                with_retry(self.retry_policy(), || {
                    let transport = transport.clone();
                    let remote = remote.clone();
                    let object_path = object_path.clone();
                    let tmp_path = tmp_path.clone();
                    async move { transport.put(&tmp_path, &remote, &object_path).await }
                })
                .await
            };
            drop(tmp);

            match put_result {
                Ok(()) => {
                    descriptors.push(ChunkDescriptor {
                        index: window.index,
                        remote: remote.clone(),
                        path: object_path,
                        size: window.length,
                        offset: window.offset,
                    });
                    self.balancer.record(&remote, window.length as i64);
                }
                Err(e) => {
                    return Err(PoolError::UploadFailed {
                        path: file_name.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    async fn rollback_chunks(&self, descriptors: &[ChunkDescriptor]) {
        self.delete_chunks(descriptors).await;
    }

    async fn delete_chunks(&self, descriptors: &[ChunkDescriptor]) {
        for c in descriptors {
            if let Err(e) = self.transport.delete(&c.remote, &c.path).await {
                tracing::warn!(remote = %c.remote, path = %c.path, error = %e, "chunk delete failed");
            }
            self.balancer.record(&c.remote, -(c.size as i64));
        }
    }

    /// Streams the whole file to `dest`, chunk by chunk.
    pub async fn download<W: AsyncWrite + Unpin>(&self, file_path: &str, dest: &mut W) -> PoolResult<()> {
        let manifest = self.manifests.load(file_path).await?;
        for c in &manifest.chunks {
            let bytes = with_retry(self.retry_policy(), || async {
                self.transport.get_bytes(&c.remote, &c.path).await
            })
            .await
            .map_err(|_| PoolError::ChunkMissing {
                path: file_path.to_string(),
                index: c.index,
            })?;
            dest.write_all(&bytes).await?;
        }
        dest.flush().await?;
        Ok(())
    }

    /// Reads `length` bytes starting at `abs_start`, translating the range
    /// into per-chunk `getRange` fetches.
    /// Fetches run concurrently, bounded by `max_parallel_workers`, but are
    /// reassembled in cursor order.
    pub async fn download_range(&self, file_path: &str, abs_start: u64, length: u64) -> PoolResult<Vec<u8>> {
        let manifest = self.manifests.load(file_path).await?;
        let file_size = manifest.file_size;

        let length = if abs_start >= file_size {
            0
        } else {
            length.min(file_size - abs_start)
        };
        if length == 0 {
            return Ok(Vec::new());
        }

        let mut remaining = length;
        let mut cursor = abs_start;
        let mut tasks: Vec<(String, String, u64, u64)> = Vec::new();
        for c in &manifest.chunks {
            let c_end = c.offset + c.size;
            if cursor >= c_end {
                continue;
            }
            if c.offset >= cursor + remaining {
                break;
            }
            let skip = cursor.saturating_sub(c.offset);
            let take = (c.size - skip).min(remaining);
            tasks.push((c.remote.clone(), c.path.clone(), skip, take));
            cursor += take;
            remaining -= take;
        }

        let semaphore = Arc::new(Semaphore::new(self.config.max_parallel_workers.max(1) as usize));
        let mut handles = Vec::with_capacity(tasks.len());
        for (seq, (remote, path, skip, take)) in tasks.into_iter().enumerate() {
            let transport = self.transport.clone();
            let semaphore = semaphore.clone();
            let retry_policy = self.retry_policy();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
                let data = with_retry(retry_policy, || {
                    let transport = transport.clone();
                    let remote = remote.clone();
                    let path = path.clone();
                    async move { transport.get_range(&remote, &path, skip, take).await }
                })
                .await;
                (seq, data)
            }));
        }

        let mut results: Vec<Option<Vec<u8>>> = (0..handles.len()).map(|_| None).collect();
        for handle in handles {
            let (seq, data) = handle.await.map_err(|e| PoolError::Other(e.into()))?;
            results[seq] = Some(data?);
        }

        let mut out = Vec::with_capacity(length as usize);
        for slot in results {
            out.extend(slot.expect("every sequence slot was assigned by its task"));
        }
        Ok(out)
    }

    /// Lists files under `dir`, one summary per manifest.
    pub async fn list(&self, dir: &str) -> PoolResult<Vec<FileSummary>> {
        let manifests = self.manifests.list(dir).await?;
        Ok(manifests
            .into_iter()
            .map(|m| {
                let mut remotes: Vec<String> = m.chunks.iter().map(|c| c.remote.clone()).collect();
                remotes.sort();
                remotes.dedup();
                FileSummary {
                    file_path: m.file_path,
                    file_size: m.file_size,
                    chunk_count: m.chunk_count,
                    remotes,
                    created_at: m.created_at,
                }
            })
            .collect())
    }

    /// Deletes every chunk (best-effort) and the manifest itself.
    pub async fn delete(&self, file_path: &str) -> PoolResult<()> {
        let _guard = self.locks.lock(file_path).await;
        let manifest = self.manifests.load(file_path).await?;
        self.delete_chunks(&manifest.chunks).await;
        self.manifests.delete(file_path).await
    }

    /// Per-remote usage snapshot; a thin wrapper over the balancer's
    /// cached view.
    pub fn status(&self) -> Vec<RemoteStatus> {
        self.balancer
            .report()
            .into_iter()
            .map(|(remote, usage)| RemoteStatus {
                remote,
                used: usage.used,
                free: usage.total.saturating_sub(usage.used),
                total: usage.total,
            })
            .collect()
    }

    /// WebDAV MOVE: rewrites a manifest's `filePath` and saves
    /// it under the new name. Chunks stay where they are — only the
    /// manifest moves. Fails with `AlreadyExists` if a manifest already
    /// lives at `to_path`.
    pub async fn move_file(&self, from_path: &str, to_path: &str) -> PoolResult<Manifest> {
        if from_path == to_path {
            return self.manifests.load(from_path).await;
        }

        // Lock both paths in a fixed order so two concurrent moves in
        // opposite directions (A->B and B->A) can't deadlock each other.
        let (first, second) = if from_path < to_path { (from_path, to_path) } else { (to_path, from_path) };
        let _first_guard = self.locks.lock(first).await;
        let _second_guard = self.locks.lock(second).await;

        match self.manifests.load(to_path).await {
            Ok(_) => return Err(PoolError::AlreadyExists(to_path.to_string())),
            Err(PoolError::ManifestNotFound(_)) => {}
            Err(e) => return Err(e),
        }

        let source = self.manifests.load(from_path).await?;
        let (remote_dir, file_name) = Manifest::split_path(to_path);
        let mut moved = source;
        moved.file_path = to_path.to_string();
        moved.file_name = file_name;
        moved.remote_dir = remote_dir;
        moved.validate()?;

        self.manifests.save(&moved).await?;
        self.manifests.delete(from_path).await?;
        Ok(moved)
    }
}
