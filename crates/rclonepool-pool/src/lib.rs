//! rclonepool-pool: the `Pool` orchestrator — upload, download,
//! downloadRange, list, delete, status, verify, repair, rebalance.

pub mod locks;
pub mod orphans;
pub mod pool;
pub mod rebalance;
pub mod verify;

pub use orphans::OrphanChunk;
pub use pool::{FileSummary, Pool, RemoteStatus};
pub use rebalance::Migration;
pub use verify::{VerifyMode, VerifyReport};
