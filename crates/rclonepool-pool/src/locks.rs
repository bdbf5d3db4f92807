//! Per-path mutual exclusion: writes on the same filePath are mutually
//! exclusive; the Pool maintains a per-path lock, a fine-grained map of
//! `filePath -> mutex`. Structurally the same idea as a path-keyed sync
//! state map, but holding a lock instead of sync state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;

#[derive(Default)]
pub struct PathLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl PathLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, path: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().unwrap();
        map.entry(path.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Acquires the exclusive lock for `path`. The returned guard holds the
    /// lock until dropped; entries are never evicted from the map, so
    /// repeated distinct paths grow it (matches the unevicted-entries
    /// shape of the state cache this is modeled on).
    pub async fn lock(&self, path: &str) -> OwnedMutexGuard<()> {
        self.entry(path).lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn same_path_serializes_concurrent_holders() {
        let locks = Arc::new(PathLocks::new());
        let counter = Arc::new(AtomicU32::new(0));
        let max_seen = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let counter = counter.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.lock("/same").await;
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(n, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                counter.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_paths_do_not_block_each_other() {
        let locks = PathLocks::new();
        let a = locks.lock("/a").await;
        let b = tokio::time::timeout(Duration::from_millis(50), locks.lock("/b")).await;
        assert!(b.is_ok());
        drop(a);
    }
}
