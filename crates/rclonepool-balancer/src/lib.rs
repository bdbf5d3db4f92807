//! rclonepool-balancer: remote selection policy.
//!
//! Owns an in-memory `{remote -> usedBytes}` table seeded from
//! `Transport::about`, and picks the next remote for a chunk under either
//! the `least_used` or `round_robin_least_used` strategy. The table is a
//! single mutex so `pick` and `record` form one atomic section,
//! mirroring the single-mutex-per-shared-map idiom the pool's manifest
//! cache also uses.

use std::collections::HashMap;
use std::sync::Mutex;

use rclonepool_core::{BalancingStrategy, PoolError, PoolResult};
use rclonepool_transport::Transport;

/// A remote's usage snapshot as currently tracked by the balancer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteUsage {
    pub used: u64,
    pub total: u64,
}

impl RemoteUsage {
    fn free(&self) -> u64 {
        self.total.saturating_sub(self.used)
    }
}

struct State {
    order: Vec<String>,
    table: HashMap<String, RemoteUsage>,
    cursor: usize,
}

pub struct Balancer {
    strategy: BalancingStrategy,
    state: Mutex<State>,
}

impl Balancer {
    pub fn new(strategy: BalancingStrategy) -> Self {
        Self {
            strategy,
            state: Mutex::new(State {
                order: Vec::new(),
                table: HashMap::new(),
                cursor: 0,
            }),
        }
    }

    /// Seeds the usage table from `Transport::about` for each remote, in
    /// the given configured order (that order also fixes `least_used`
    /// tie-breaking). A remote whose `about` call errors is recorded as
    /// fully used and zero-capacity, making it ineligible until the next
    /// `seed`.
    pub async fn seed(&self, transport: &dyn Transport, remotes: &[String]) -> PoolResult<()> {
        let mut table = HashMap::with_capacity(remotes.len());
        for remote in remotes {
            let usage = match transport.about(remote).await {
                Ok(stats) => RemoteUsage {
                    used: stats.used,
                    total: stats.total,
                },
                Err(e) => {
                    tracing::warn!(remote, error = %e, "about() failed during seed, marking remote ineligible");
                    RemoteUsage { used: u64::MAX, total: 0 }
                }
            };
            table.insert(remote.clone(), usage);
        }
        let mut state = self.state.lock().unwrap();
        state.order = remotes.to_vec();
        state.table = table;
        state.cursor = 0;
        Ok(())
    }

    /// Selects a remote for a chunk of `chunk_size` bytes and atomically
    /// advances any rotation state, without recording the placement — the
    /// caller calls `record` once the chunk is actually written.
    pub fn pick(&self, chunk_size: u64) -> PoolResult<String> {
        let mut state = self.state.lock().unwrap();
        match self.strategy {
            BalancingStrategy::LeastUsed => pick_least_used(&state, chunk_size),
            BalancingStrategy::RoundRobinLeastUsed => pick_round_robin(&mut state, chunk_size),
        }
        .ok_or(PoolError::NoEligibleRemote { chunk_size })
    }

    /// Additive update to a remote's tracked usage; `delta` may be negative
    /// (rollback, delete, rebalance migration away from a remote).
    pub fn record(&self, remote: &str, delta: i64) {
        let mut state = self.state.lock().unwrap();
        if let Some(usage) = state.table.get_mut(remote) {
            usage.used = apply_delta(usage.used, delta);
        }
    }

    /// A snapshot of the current usage table, in configured remote order.
    pub fn report(&self) -> Vec<(String, RemoteUsage)> {
        let state = self.state.lock().unwrap();
        state
            .order
            .iter()
            .filter_map(|r| state.table.get(r).map(|u| (r.clone(), *u)))
            .collect()
    }
}

fn apply_delta(used: u64, delta: i64) -> u64 {
    if delta >= 0 {
        used.saturating_add(delta as u64)
    } else {
        used.saturating_sub(delta.unsigned_abs())
    }
}

fn pick_least_used(state: &State, chunk_size: u64) -> Option<String> {
    state
        .order
        .iter()
        .filter_map(|r| state.table.get(r).map(|u| (r, u)))
        .filter(|(_, u)| u.free() >= chunk_size)
        .min_by_key(|(_, u)| u.used)
        .map(|(r, _)| r.clone())
}

fn pick_round_robin(state: &mut State, chunk_size: u64) -> Option<String> {
    let len = state.order.len();
    if len == 0 {
        return None;
    }
    let mut best: Option<(usize, u64)> = None;
    for step in 0..len {
        let idx = (state.cursor + step) % len;
        let remote = &state.order[idx];
        let Some(usage) = state.table.get(remote) else { continue };
        if usage.free() < chunk_size {
            continue;
        }
        if best.map(|(_, best_used)| usage.used < best_used).unwrap_or(true) {
            best = Some((idx, usage.used));
        }
    }
    let (idx, _) = best?;
    state.cursor = (idx + 1) % len;
    Some(state.order[idx].clone())
}

/// Target chunk count per remote under perfectly even distribution:
/// floor division, `totalChunkCount / remoteCount`.
pub fn ideal_chunk_count(total_chunk_count: u64, remote_count: u64) -> u64 {
    if remote_count == 0 {
        0
    } else {
        total_chunk_count / remote_count
    }
}
