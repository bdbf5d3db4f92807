use async_trait::async_trait;
use std::path::Path;

use rclonepool_core::PoolResult;

/// Storage usage for one remote, as reported by `about`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteStats {
    pub used: u64,
    pub free: u64,
    pub total: u64,
}

/// The narrow operation set the Pool invokes against named remotes. Each
/// call is a unit of cancellable work: implementations may spawn
/// a subprocess, hit a network API, or (in tests) just touch an in-memory
/// map, as long as they honor this contract.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn put(&self, local_path: &Path, remote: &str, path: &str) -> PoolResult<()>;
    async fn put_bytes(&self, data: &[u8], remote: &str, path: &str) -> PoolResult<()>;
    async fn get(&self, remote: &str, path: &str, local_path: &Path) -> PoolResult<()>;
    async fn get_bytes(&self, remote: &str, path: &str) -> PoolResult<Vec<u8>>;
    async fn get_range(&self, remote: &str, path: &str, offset: u64, length: u64) -> PoolResult<Vec<u8>>;
    async fn delete(&self, remote: &str, path: &str) -> PoolResult<()>;
    async fn list_files(&self, remote: &str, prefix: &str) -> PoolResult<Vec<String>>;
    async fn list_dirs(&self, remote: &str, prefix: &str) -> PoolResult<Vec<String>>;
    async fn about(&self, remote: &str) -> PoolResult<RemoteStats>;
    async fn exists(&self, remote: &str, path: &str) -> PoolResult<bool>;
    async fn stat(&self, remote: &str, path: &str) -> PoolResult<Option<u64>>;
}
