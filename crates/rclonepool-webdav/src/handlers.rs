//! WebDAV request handling. One wildcard axum route dispatches every verb
//! into this module; each verb gets its own function, since axum's typed
//! per-method routing doesn't name MKCOL/MOVE/PROPFIND.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use futures_util::stream::unfold;
use futures_util::TryStreamExt;
use http_body_util::BodyExt;
use tokio::io::AsyncWriteExt;
use tokio_util::io::StreamReader;

use rclonepool_core::PoolError;
use rclonepool_pool::{FileSummary, Pool};

use crate::dirs::{find_file, immediate_children, is_directory, Entry};
use crate::path::{normalize, strip_origin};
use crate::range::{parse_range, ByteRange};
use crate::status::status_for;
use crate::xml::{multistatus, resource_for};

#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<Pool>,
}

/// Builds the WebDAV router: one wildcard route, every method dispatched
/// inside `handle`.
pub fn router(pool: Arc<Pool>) -> Router {
    Router::new()
        .route("/", any(handle))
        .route("/{*path}", any(handle))
        .with_state(AppState { pool })
}

/// Binds and serves the WebDAV frontend on `addr` until the process stops.
pub async fn serve(addr: SocketAddr, pool: Arc<Pool>) -> anyhow::Result<()> {
    let app = router(pool);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "webdav: listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn handle(State(state): State<AppState>, req: Request) -> Response {
    let method = req.method().clone();
    let path = normalize(req.uri().path());
    let headers = req.headers().clone();
    let started = std::time::Instant::now();

    let response = match method.as_str() {
        "OPTIONS" => handle_options(),
        "HEAD" => handle_head(&state.pool, &path).await,
        "GET" => handle_get(&state.pool, &path, &headers).await,
        "PUT" => handle_put(&state.pool, &path, req.into_body()).await,
        "DELETE" => handle_delete(&state.pool, &path).await,
        "MKCOL" => handle_mkcol(),
        "MOVE" => handle_move(&state.pool, &path, &headers).await,
        "PROPFIND" => handle_propfind(&state.pool, &path, &headers).await,
        _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    };

    let bytes = response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);

    tracing::info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        bytes,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "webdav request"
    );

    response
}

fn handle_options() -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header("DAV", "1, 2")
        .header(
            header::ALLOW,
            "OPTIONS, HEAD, GET, PUT, DELETE, PROPFIND, MKCOL, MOVE",
        )
        .header(header::ACCEPT_RANGES, "bytes")
        .body(Body::empty())
        .expect("static response never fails to build")
}

async fn handle_head(pool: &Arc<Pool>, path: &str) -> Response {
    match pool.manifests().load(path).await {
        Ok(m) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_LENGTH, m.file_size)
            .header(header::CONTENT_TYPE, content_type_for(&m.file_path))
            .header(header::ACCEPT_RANGES, "bytes")
            .body(Body::empty())
            .expect("response never fails to build"),
        Err(PoolError::ManifestNotFound(_)) => {
            let files = list_all(pool).await;
            if is_directory(path, &files) {
                Response::builder()
                    .status(StatusCode::OK)
                    .header(header::CONTENT_TYPE, "httpd/unix-directory")
                    .body(Body::empty())
                    .expect("response never fails to build")
            } else {
                StatusCode::NOT_FOUND.into_response()
            }
        }
        Err(e) => status_for(&e).into_response(),
    }
}

async fn handle_get(pool: &Arc<Pool>, path: &str, headers: &HeaderMap) -> Response {
    let files = match pool.list("").await {
        Ok(v) => v,
        Err(e) => return status_for(&e).into_response(),
    };

    if let Some(summary) = find_file(path, &files).cloned() {
        let range_header = headers.get(header::RANGE).and_then(|v| v.to_str().ok());
        return match range_header {
            None => stream_whole_file(pool, &summary),
            Some(value) => match parse_range(value, summary.file_size) {
                Ok(None) => stream_whole_file(pool, &summary),
                Ok(Some(range)) => stream_range(pool, &summary, range),
                Err(()) => Response::builder()
                    .status(StatusCode::RANGE_NOT_SATISFIABLE)
                    .header(header::CONTENT_RANGE, format!("bytes */{}", summary.file_size))
                    .body(Body::empty())
                    .expect("response never fails to build"),
            },
        };
    }

    if is_directory(path, &files) {
        let accept = headers.get(header::ACCEPT).and_then(|v| v.to_str().ok()).unwrap_or("");
        if accept.contains("text/html") {
            return directory_listing_html(path, &files);
        }
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    StatusCode::NOT_FOUND.into_response()
}

fn stream_whole_file(pool: &Arc<Pool>, summary: &FileSummary) -> Response {
    let window = pool.config().chunk_size;
    let body = Body::from_stream(byte_stream(pool.clone(), summary.file_path.clone(), 0, summary.file_size, window));
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_LENGTH, summary.file_size)
        .header(header::CONTENT_TYPE, content_type_for(&summary.file_path))
        .header(header::ACCEPT_RANGES, "bytes")
        .body(body)
        .expect("response never fails to build")
}

fn stream_range(pool: &Arc<Pool>, summary: &FileSummary, range: ByteRange) -> Response {
    let window = pool.config().chunk_size;
    let len = range.len();
    let body = Body::from_stream(byte_stream(pool.clone(), summary.file_path.clone(), range.start, len, window));
    Response::builder()
        .status(StatusCode::PARTIAL_CONTENT)
        .header(
            header::CONTENT_RANGE,
            format!("bytes {}-{}/{}", range.start, range.end, summary.file_size),
        )
        .header(header::CONTENT_LENGTH, len)
        .header(header::CONTENT_TYPE, content_type_for(&summary.file_path))
        .body(body)
        .expect("response never fails to build")
}

/// Drives `downloadRange` in bounded windows (≤ `window` bytes) so a GET
/// response never holds more than one chunk's worth of bytes in memory
/// before handing it to the HTTP body writer.
fn byte_stream(
    pool: Arc<Pool>,
    file_path: String,
    start: u64,
    len: u64,
    window: u64,
) -> impl futures_util::Stream<Item = Result<axum::body::Bytes, std::io::Error>> {
    unfold((pool, file_path, start, len, window.max(1)), |(pool, file_path, cursor, remaining, window)| async move {
        if remaining == 0 {
            return None;
        }
        let take = remaining.min(window);
        match pool.download_range(&file_path, cursor, take).await {
            Ok(bytes) => {
                let state = (pool, file_path, cursor + take, remaining - take, window);
                Some((Ok(axum::body::Bytes::from(bytes)), state))
            }
            Err(e) => {
                let state = (pool, file_path, cursor, 0, window);
                Some((Err(std::io::Error::other(e.to_string())), state))
            }
        }
    })
}

async fn handle_put(pool: &Arc<Pool>, path: &str, body: Body) -> Response {
    let existed = pool.manifests().load(path).await.is_ok();

    let tmp = match tempfile::NamedTempFile::new_in(&pool.config().temp_dir) {
        Ok(t) => t,
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, format!("allocating temp file: {e}")).into_response(),
    };
    let tmp_path = tmp.path().to_path_buf();

    let stream = body.into_data_stream().map_err(std::io::Error::other);
    let mut reader = StreamReader::new(stream);
    let mut file = match tokio::fs::File::create(&tmp_path).await {
        Ok(f) => f,
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, format!("opening temp file: {e}")).into_response(),
    };
    if let Err(e) = tokio::io::copy(&mut reader, &mut file).await {
        return (StatusCode::INTERNAL_SERVER_ERROR, format!("buffering request body: {e}")).into_response();
    }
    if let Err(e) = file.flush().await {
        return (StatusCode::INTERNAL_SERVER_ERROR, format!("flushing temp file: {e}")).into_response();
    }
    drop(file);

    match pool.upload(&tmp_path, path, true).await {
        Ok(_) if existed => StatusCode::NO_CONTENT.into_response(),
        Ok(_) => StatusCode::CREATED.into_response(),
        Err(e) => (status_for(&e), e.to_string()).into_response(),
    }
}

async fn handle_delete(pool: &Arc<Pool>, path: &str) -> Response {
    match pool.delete(path).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(PoolError::ManifestNotFound(_)) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => status_for(&e).into_response(),
    }
}

fn handle_mkcol() -> Response {
    // Directories are virtual here: no state change, always 201.
    StatusCode::CREATED.into_response()
}

async fn handle_move(pool: &Arc<Pool>, path: &str, headers: &HeaderMap) -> Response {
    let Some(destination) = headers.get("destination").and_then(|v| v.to_str().ok()) else {
        return (StatusCode::BAD_REQUEST, "missing Destination header").into_response();
    };
    let dest_path = normalize(strip_origin(destination));

    match pool.move_file(path, &dest_path).await {
        Ok(_) => StatusCode::CREATED.into_response(),
        Err(PoolError::AlreadyExists(_)) => StatusCode::CONFLICT.into_response(),
        Err(PoolError::ManifestNotFound(_)) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => status_for(&e).into_response(),
    }
}

async fn handle_propfind(pool: &Arc<Pool>, path: &str, headers: &HeaderMap) -> Response {
    let depth = headers.get("depth").and_then(|v| v.to_str().ok()).unwrap_or("0");
    if depth != "0" && depth != "1" {
        return StatusCode::FORBIDDEN.into_response();
    }

    let files = list_all(pool).await;
    let self_summary = find_file(path, &files);
    let self_is_dir = is_directory(path, &files);
    if self_summary.is_none() && !self_is_dir {
        return StatusCode::NOT_FOUND.into_response();
    }

    let mut resources = Vec::new();
    resources.push(resource_for(
        path,
        &display_name_of(path),
        self_summary,
        &self_summary.map(|s| rfc1123(s.created_at)).unwrap_or_else(now_rfc1123),
    ));

    if depth == "1" && self_is_dir {
        for entry in immediate_children(path, &files) {
            match entry {
                Entry::File(f) => {
                    let modified = rfc1123(f.created_at);
                    resources.push(resource_for(&f.file_path, &display_name_of(&f.file_path), Some(&f), &modified));
                }
                Entry::Dir(name) => {
                    let href = join(path, &name);
                    resources.push(resource_for(&href, &name, None, &now_rfc1123()));
                }
            }
        }
    }

    Response::builder()
        .status(StatusCode::from_u16(207).expect("207 is a valid HTTP status"))
        .header(header::CONTENT_TYPE, "application/xml; charset=utf-8")
        .body(Body::from(multistatus(&resources)))
        .expect("response never fails to build")
}

fn directory_listing_html(path: &str, files: &[FileSummary]) -> Response {
    let mut body = String::new();
    body.push_str(&format!(
        "<!DOCTYPE html><html><head><title>Index of {p}</title></head><body><h1>Index of {p}</h1><ul>",
        p = html_escape(path)
    ));
    if path != "/" {
        body.push_str("<li><a href=\"../\">../</a></li>");
    }
    for entry in immediate_children(path, files) {
        match entry {
            Entry::Dir(name) => {
                let escaped = html_escape(&name);
                body.push_str(&format!("<li><a href=\"{escaped}/\">{escaped}/</a></li>"));
            }
            Entry::File(f) => {
                let name = html_escape(&display_name_of(&f.file_path));
                body.push_str(&format!("<li><a href=\"{name}\">{name}</a> ({} bytes)</li>", f.file_size));
            }
        }
    }
    body.push_str("</ul></body></html>");

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
        .body(Body::from(body))
        .expect("response never fails to build")
}

async fn list_all(pool: &Arc<Pool>) -> Vec<FileSummary> {
    pool.list("").await.unwrap_or_default()
}

fn content_type_for(path: &str) -> String {
    mime_guess::from_path(path).first_or_octet_stream().to_string()
}

fn display_name_of(path: &str) -> String {
    path.rsplit('/').find(|s| !s.is_empty()).unwrap_or("/").to_string()
}

fn join(dir: &str, name: &str) -> String {
    if dir == "/" {
        format!("/{name}")
    } else {
        format!("{}/{name}", dir.trim_end_matches('/'))
    }
}

fn rfc1123(unix_secs: f64) -> String {
    httpdate::fmt_http_date(UNIX_EPOCH + Duration::from_secs_f64(unix_secs.max(0.0)))
}

fn now_rfc1123() -> String {
    httpdate::fmt_http_date(std::time::SystemTime::now())
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
