//! `rebalance` (optional, idempotent): moves chunks off
//! overloaded remotes so each remote's chunk count approaches
//! `totalChunkCount / remoteCount`.

use rclonepool_balancer::ideal_chunk_count;
use rclonepool_core::PoolResult;
use rclonepool_transport::with_retry;

use crate::pool::Pool;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub file_path: String,
    pub chunk_index: u64,
    pub from_remote: String,
    pub to_remote: String,
}

impl Pool {
    /// Computes (and, unless `dry_run`, performs) the chunk migrations
    /// needed to bring every remote's chunk count down to `ideal`.
    /// A migration is an atomic copy-then-delete per chunk, followed by a
    /// manifest re-save, reusing
    /// `repair`'s "old descriptors overwritten atomically" rule).
    pub async fn rebalance(&self, dry_run: bool) -> PoolResult<Vec<Migration>> {
        let remotes = self.config().active_remotes().to_vec();
        let remote_count = remotes.len() as u64;
        if remote_count == 0 {
            return Ok(Vec::new());
        }

        let mut manifests = self.manifests().list("").await?;
        let total_chunk_count: u64 = manifests.iter().map(|m| m.chunk_count).sum();
        let ideal = ideal_chunk_count(total_chunk_count, remote_count);

        let mut plan = Vec::new();

        // Surplus is evaluated per-remote up front so moving one chunk off
        // a remote doesn't change the plan for chunks already queued from
        // the same remote in this pass.
        let mut counts: std::collections::HashMap<String, u64> = std::collections::HashMap::new();
        for m in &manifests {
            for c in &m.chunks {
                *counts.entry(c.remote.clone()).or_insert(0) += 1;
            }
        }

        let mut surplus: std::collections::HashMap<String, u64> = counts
            .iter()
            .filter(|(_, &n)| n > ideal)
            .map(|(r, &n)| (r.clone(), n - ideal))
            .collect();

        for manifest in &mut manifests {
            for chunk in &manifest.chunks {
                let Some(remaining) = surplus.get_mut(&chunk.remote) else { continue };
                if *remaining == 0 {
                    continue;
                }
                let target = self.balancer().pick(chunk.size)?;
                if target == chunk.remote {
                    continue;
                }
                plan.push(Migration {
                    file_path: manifest.file_path.clone(),
                    chunk_index: chunk.index,
                    from_remote: chunk.remote.clone(),
                    to_remote: target,
                });
                *remaining -= 1;
            }
        }

        if dry_run {
            return Ok(plan);
        }

        for migration in &plan {
            self.execute_migration(migration).await?;
        }

        Ok(plan)
    }

    async fn execute_migration(&self, migration: &Migration) -> PoolResult<()> {
        let _guard = self.lock_path(&migration.file_path).await;
        let mut manifest = self.manifests().load(&migration.file_path).await?;

        let Some(descriptor) = manifest.chunks.iter().find(|c| c.index == migration.chunk_index).cloned() else {
            return Ok(());
        };
        if descriptor.remote != migration.from_remote {
            // Already moved by a previous pass; nothing to do.
            return Ok(());
        }

        let bytes = with_retry(self.retry_policy(), || {
            let transport = self.transport();
            let remote = descriptor.remote.clone();
            let path = descriptor.path.clone();
            async move { transport.get_bytes(&remote, &path).await }
        })
        .await?;

        with_retry(self.retry_policy(), || {
            let transport = self.transport();
            let remote = migration.to_remote.clone();
            let path = descriptor.path.clone();
            let bytes = bytes.clone();
            async move { transport.put_bytes(&bytes, &remote, &path).await }
        })
        .await?;

        if let Some(d) = manifest.chunks.iter_mut().find(|c| c.index == migration.chunk_index) {
            d.remote = migration.to_remote.clone();
        }
        manifest.checksum = rclonepool_chunk::layout_checksum(&manifest.chunks);
        self.manifests().save(&manifest).await?;

        let _ = self.transport().delete(&descriptor.remote, &descriptor.path).await;
        self.balancer().record(&descriptor.remote, -(descriptor.size as i64));
        self.balancer().record(&migration.to_remote, descriptor.size as i64);

        Ok(())
    }
}
