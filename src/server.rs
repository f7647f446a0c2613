//! HTTP surface: one catch-all `GET` route in front of [`DerivativeEngine`].

use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::{DateTime, Utc};

use crate::{
    codec::content_type_for,
    engine::{DerivativeEngine, Served},
    foundation::error::{DerivaError, DerivaResult},
    foundation::path::RequestPath,
};

#[derive(Clone, Debug)]
/// Body returned with every 404.
pub struct NotFoundAsset {
    body: Vec<u8>,
    content_type: &'static str,
}

impl NotFoundAsset {
    /// Asset with explicit bytes and type.
    pub fn new(body: Vec<u8>, content_type: &'static str) -> Self {
        Self { body, content_type }
    }

    /// Read `rel` (relative to the image root) through the engine's filesystem.
    pub fn load(engine: &DerivativeEngine, rel: &str) -> DerivaResult<Self> {
        let path = RequestPath::parse(rel)?;
        let body = engine.fs().read(path.as_str())?;
        Ok(Self::new(body, content_type_for(path.extension())))
    }
}

#[derive(Clone)]
/// Shared handler state.
pub struct AppState {
    engine: Arc<DerivativeEngine>,
    not_found: Option<Arc<NotFoundAsset>>,
    max_age: u64,
}

impl AppState {
    /// State serving through `engine`; `max_age` of 0 disables caching headers.
    pub fn new(engine: DerivativeEngine, max_age: u64) -> Self {
        Self {
            engine: Arc::new(engine),
            not_found: None,
            max_age,
        }
    }

    /// Answer 404s with `asset` instead of an empty body.
    pub fn with_not_found(mut self, asset: NotFoundAsset) -> Self {
        self.not_found = Some(Arc::new(asset));
        self
    }
}

/// Router with `GET /` and `GET /*path`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(serve_root))
        .route("/*path", get(serve_path))
        .with_state(state)
}

async fn serve_root(State(state): State<AppState>) -> Response {
    respond(state, String::new()).await
}

async fn serve_path(State(state): State<AppState>, Path(path): Path<String>) -> Response {
    respond(state, path).await
}

async fn respond(state: AppState, path: String) -> Response {
    let engine = state.engine.clone();
    let raw = path.clone();
    // Keeps running after a client disconnect.
    let result = tokio::task::spawn_blocking(move || engine.serve(&raw)).await;

    match result {
        Ok(Ok(served)) => {
            tracing::info!(%path, status = 200, origin = ?served.origin, "request");
            ok_response(served, state.max_age, SystemTime::now())
        }
        Ok(Err(err)) => {
            let status = status_for(&err);
            if status.is_server_error() {
                tracing::error!(%path, status = status.as_u16(), error = %err, "request");
            } else {
                tracing::info!(%path, status = status.as_u16(), error = %err, "request");
            }
            error_response(status, state.not_found.as_deref())
        }
        Err(join) => {
            tracing::error!(%path, error = %join, "engine task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, None)
        }
    }
}

/// HTTP status for an engine failure.
pub fn status_for(err: &DerivaError) -> StatusCode {
    match err {
        DerivaError::BadPath(_) => StatusCode::BAD_REQUEST,
        e if e.is_not_found() => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// `Date`-style timestamp, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
pub fn http_date(t: SystemTime) -> String {
    DateTime::<Utc>::from(t)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

fn insert(headers: &mut HeaderMap, name: header::HeaderName, value: &str) {
    if let Ok(v) = HeaderValue::from_str(value) {
        headers.insert(name, v);
    }
}

fn ok_response(served: Served, max_age: u64, now: SystemTime) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(served.content_type),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(served.body.len()));
    insert(&mut headers, header::ETAG, &served.etag);
    if let Some(modified) = served.last_modified {
        insert(&mut headers, header::LAST_MODIFIED, &http_date(modified));
    }
    if max_age > 0 {
        insert(
            &mut headers,
            header::CACHE_CONTROL,
            &format!("public, max-age={max_age}"),
        );
        let expires = now + Duration::from_secs(max_age);
        insert(&mut headers, header::EXPIRES, &http_date(expires));
        insert(&mut headers, header::DATE, &http_date(now));
    }
    (StatusCode::OK, headers, served.body).into_response()
}

fn error_response(status: StatusCode, not_found: Option<&NotFoundAsset>) -> Response {
    match not_found {
        Some(asset) if status == StatusCode::NOT_FOUND => {
            let mut headers = HeaderMap::new();
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static(asset.content_type),
            );
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(asset.body.len()));
            (status, headers, asset.body.clone()).into_response()
        }
        _ => status.into_response(),
    }
}

#[cfg(test)]
#[path = "../tests/unit/server.rs"]
mod tests;
