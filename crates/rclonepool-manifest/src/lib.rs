//! rclonepool-manifest: on-remote naming and the all-remotes-redundant
//! `ManifestStore`.

pub mod naming;
pub mod store;

pub use naming::{chunk_name, chunk_path, manifest_name, manifest_path, sanitize};
pub use store::ManifestStore;
