//! rclonepool-webdav: the WebDAV frontend over a `Pool`.
//!
//! `handlers` implements the per-request state machine (one function per
//! verb, dispatched on `req.method()` from a single wildcard axum route).
//! `dirs`/`range`/`xml`/`status`/`path` are small, independently-tested
//! building blocks the state machine composes.

pub mod dirs;
pub mod handlers;
pub mod path;
pub mod range;
pub mod status;
pub mod xml;

pub use handlers::{router, serve, AppState};
