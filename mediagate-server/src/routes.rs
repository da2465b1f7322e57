//! axum router and handlers.

use std::any::Any;
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{RawQuery, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use percent_encoding::percent_decode_str;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::service::{MediaService, SuiteHeaders};

pub type Shared = Arc<MediaService>;

pub const METHODS_TEXT: &str = "Methods: /api/protocols /api/key /api/auth /api/list /api/download";

pub fn router(service: Shared) -> Router {
    Router::new()
        .route("/api/protocols", post(protocols).fallback(fallback))
        .route("/api/key", post(key).fallback(fallback))
        .route("/api/auth", post(auth).fallback(fallback))
        .route("/api/list", get(list).fallback(fallback))
        .route("/api/download", get(download).fallback(fallback))
        .fallback(fallback)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

fn octets(body: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, "application/octet-stream")], body).into_response()
}

fn panic_response(_: Box<dyn Any + Send + 'static>) -> Response<Body> {
    tracing::error!("handler panicked");
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

async fn fallback(method: Method) -> Response {
    if method == Method::GET {
        METHODS_TEXT.into_response()
    } else {
        StatusCode::NOT_IMPLEMENTED.into_response()
    }
}

async fn protocols(State(svc): State<Shared>, body: Bytes) -> Result<Response, ApiError> {
    Ok(octets(svc.protocols(&body)?))
}

async fn key(
    State(svc): State<Shared>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let headers = SuiteHeaders::from_headers(&headers);
    Ok(octets(svc.key(&headers, &body).await?))
}

async fn auth(
    State(svc): State<Shared>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let headers = SuiteHeaders::from_headers(&headers);
    svc.auth(&headers, &body).await?;
    Ok(StatusCode::OK)
}

async fn list(State(svc): State<Shared>, headers: HeaderMap) -> Result<Response, ApiError> {
    let headers = SuiteHeaders::from_headers(&headers);
    Ok(octets(svc.list(&headers).await?))
}

async fn download(
    State(svc): State<Shared>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Result<Response, ApiError> {
    let headers = SuiteHeaders::from_headers(&headers);
    let query = query.unwrap_or_default();
    let media_id = query_param(&query, "id");
    let chunk = query_param(&query, "chunk");
    Ok(octets(svc.download(&headers, &media_id, &chunk).await?))
}

/// Percent-decode the first `name` parameter of a raw query string to bytes.
/// Missing parameters decode to an empty blob.
pub fn query_param(query: &str, name: &str) -> Vec<u8> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('=').or(Some((pair, ""))))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| percent_decode_str(&v.replace('+', " ")).collect())
        .unwrap_or_default()
}
