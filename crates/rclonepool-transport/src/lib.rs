//! rclonepool-transport: the `Transport` trait and its implementations.
//!
//! `RcloneTransport` spawns the configured `rclone` binary per call;
//! `FakeTransport` is an in-memory stand-in used by every other crate's
//! test suite. `retry` layers exponential backoff with jitter over any
//! fallible async call.

pub mod fake;
pub mod rclone;
pub mod retry;
pub mod trait_def;

pub use fake::FakeTransport;
pub use rclone::RcloneTransport;
pub use retry::{with_retry, RetryPolicy};
pub use trait_def::{RemoteStats, Transport};
