//! Development server: ranged file bytes and probe results for a directory.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path as UrlPath, State};
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use axum_extra::headers::Range;
use axum_extra::TypedHeader;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Span};

use crate::axum_range::Ranged;
use crate::reader::FileReader;
use crate::webm::{parse_webm_with, ScanOptions, WebmMeta};

#[derive(Debug, Clone)]
pub struct ServeState {
    inner: Arc<ServeConfig>,
}

#[derive(Debug)]
struct ServeConfig {
    root: PathBuf,
    max_chunk: Option<u64>,
    scan_options: ScanOptions,
}

impl ServeState {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_options(root, None, ScanOptions::default())
    }

    /// `max_chunk` caps the bytes sent per ranged response.
    pub fn with_options(root: impl Into<PathBuf>, max_chunk: Option<u64>, scan_options: ScanOptions) -> Self {
        Self {
            inner: Arc::new(ServeConfig {
                root: root.into(),
                max_chunk,
                scan_options,
            }),
        }
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    fn resolve(&self, name: &str) -> Result<PathBuf, StatusCode> {
        if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
            warn!(name, "rejected file name");
            return Err(StatusCode::BAD_REQUEST);
        }
        Ok(self.inner.root.join(name))
    }
}

pub fn router(state: ServeState) -> Router {
    Router::new()
        .route("/files/:name", get(serve_file))
        .route("/probe/:name", get(probe_file))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any)
                .expose_headers(Any)
                .max_age(Duration::from_secs(86400)),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        path = %request.uri().path(),
                        status_code = tracing::field::Empty,
                    )
                })
                .on_response(|response: &axum::http::Response<_>, latency: Duration, span: &Span| {
                    let status = response.status();
                    span.record("status_code", status.as_u16());
                    if status.is_client_error() || status.is_server_error() {
                        tracing::warn!(%status, ?latency, "request failed");
                    } else {
                        tracing::debug!(%status, ?latency, "request served");
                    }
                }),
        )
}

async fn open(state: &ServeState, name: &str) -> Result<FileReader, StatusCode> {
    let path = state.resolve(name)?;
    FileReader::open(&path).await.map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => StatusCode::NOT_FOUND,
        _ => {
            warn!(path = %path.display(), error = %e, "failed to open file");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    })
}

/// GET and HEAD; axum drops the body for the latter.
async fn serve_file(
    UrlPath(name): UrlPath<String>,
    range: Option<TypedHeader<Range>>,
    State(state): State<ServeState>,
) -> Result<Response, StatusCode> {
    let reader = open(&state, &name).await?;
    let range = range.map(|TypedHeader(range)| range);

    let response = Ranged::new(range, reader)
        .with_max_size_per_request(state.inner.max_chunk)
        .respond()
        .await
        .map_err(|e| {
            warn!(name, error = %e, "failed to read file");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    Ok(response.into_response())
}

async fn probe_file(
    UrlPath(name): UrlPath<String>,
    State(state): State<ServeState>,
) -> Result<Json<WebmMeta>, (StatusCode, String)> {
    let reader = open(&state, &name)
        .await
        .map_err(|status| (status, status.to_string()))?;

    match parse_webm_with(&reader, &state.inner.scan_options).await {
        Ok(meta) => {
            info!(name, duration = ?meta.duration_milli_seconds, "probed");
            Ok(Json(meta))
        }
        Err(e) => {
            warn!(name, error = %e, "probe failed");
            Err((StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))
        }
    }
}
