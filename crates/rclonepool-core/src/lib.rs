//! rclonepool-core: shared types, config schema, and error taxonomy.

pub mod config;
pub mod error;
pub mod types;

pub use config::{BalancingStrategy, Config};
pub use error::{PoolError, PoolResult};
pub use types::{ChunkDescriptor, Manifest};
