//! Maps `PoolError` onto the status codes the WebDAV surface is allowed to
//! emit: 200, 201, 204, 206, 207, 400, 404, 409, 416, 500.

use axum::http::StatusCode;
use rclonepool_core::PoolError;

pub fn status_for(err: &PoolError) -> StatusCode {
    match err {
        PoolError::ManifestNotFound(_) | PoolError::ChunkMissing { .. } => StatusCode::NOT_FOUND,
        PoolError::AlreadyExists(_) => StatusCode::CONFLICT,
        PoolError::InvalidRange(_) => StatusCode::BAD_REQUEST,
        PoolError::UnsatisfiableRange { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
