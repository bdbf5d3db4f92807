//! `orphans`: a cleanup sweep for chunks present under `data_prefix` on a
//! remote but not referenced by any current manifest, left behind by an
//! interrupted upload or a crash between chunk writes and the manifest
//! save that would have claimed them.

use rclonepool_core::PoolResult;

use crate::pool::Pool;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanChunk {
    pub remote: String,
    pub path: String,
}

impl Pool {
    /// Lists every chunk path under `data_prefix` on each active remote
    /// that no current manifest references.
    pub async fn find_orphans(&self) -> PoolResult<Vec<OrphanChunk>> {
        let manifests = self.manifests().list("").await?;
        let mut referenced = std::collections::HashSet::new();
        for m in &manifests {
            for c in &m.chunks {
                referenced.insert((c.remote.clone(), c.path.clone()));
            }
        }

        let mut orphans = Vec::new();
        for remote in self.config().active_remotes() {
            let files = self
                .transport()
                .list_files(remote, &self.config().data_prefix)
                .await?;
            for path in files {
                if !referenced.contains(&(remote.clone(), path.clone())) {
                    orphans.push(OrphanChunk {
                        remote: remote.clone(),
                        path,
                    });
                }
            }
        }
        Ok(orphans)
    }

    /// Deletes the given orphan chunks. Callers are expected to have
    /// listed them via `find_orphans` first; this does not re-check
    /// that a manifest hasn't since claimed one (orphan
    /// collection is a best-effort sweep, not transactional).
    pub async fn delete_orphans(&self, orphans: &[OrphanChunk]) -> PoolResult<()> {
        for o in orphans {
            self.transport().delete(&o.remote, &o.path).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rclonepool_core::{BalancingStrategy, Config};
    use rclonepool_transport::{FakeTransport, Transport};

    use super::*;

    async fn test_pool(remotes: Vec<&str>) -> Pool {
        let transport: Arc<dyn Transport> = Arc::new(FakeTransport::new());
        let mut config = Config::default();
        config.remotes = remotes.into_iter().map(String::from).collect();
        config.use_crypt = false;
        config.chunk_size = 16;
        config.temp_dir = std::env::temp_dir();
        config.max_retries = 0;
        config.retry_delay = 0.001;
        config.balancing_strategy = BalancingStrategy::LeastUsed;
        Pool::new(config, transport).await.unwrap()
    }

    #[tokio::test]
    async fn referenced_chunks_are_not_orphans() {
        let pool = test_pool(vec!["r1:"]).await;
        let file = tempfile::NamedTempFile::new().unwrap();
        tokio::fs::write(file.path(), vec![1u8; 40]).await.unwrap();
        pool.upload(file.path(), "/f.bin", true).await.unwrap();

        let orphans = pool.find_orphans().await.unwrap();
        assert!(orphans.is_empty());
    }

    #[tokio::test]
    async fn unreferenced_remote_file_is_reported_and_deletable() {
        let pool = test_pool(vec!["r1:"]).await;
        pool.transport()
            .put_bytes(b"stray", "r1:", "rclonepool_data/stray.chunk")
            .await
            .unwrap();

        let orphans = pool.find_orphans().await.unwrap();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].path, "rclonepool_data/stray.chunk");

        pool.delete_orphans(&orphans).await.unwrap();
        assert!(pool.find_orphans().await.unwrap().is_empty());
    }
}
