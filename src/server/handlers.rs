//! Route handlers.
//!
//! Every conversion handler follows the same shape: read the body under the
//! size cap, build a [`ConversionRequest`], run the pipeline, and answer with
//! the bytes and their content type. Errors become responses through
//! [`ServiceError`]'s `IntoResponse` impl, which keeps renderer detail in
//! the server log.

use super::AppState;
use crate::error::ServiceError;
use crate::request::{ConversionRequest, OutputKind};
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use tracing::debug;

/// Health check endpoint
pub async fn health() -> &'static str {
    "OK"
}

/// `POST /topdf`
pub async fn document_to_pdf(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, ServiceError> {
    let body = read_body(&headers, body, state.max_body_bytes).await?;
    respond(&state, ConversionRequest::document(body, OutputKind::Pdf)).await
}

/// `POST /tojpeg`
pub async fn document_to_jpeg(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, ServiceError> {
    let body = read_body(&headers, body, state.max_body_bytes).await?;
    respond(&state, ConversionRequest::document(body, OutputKind::Jpeg)).await
}

/// `POST /urltopdf`
pub async fn url_to_pdf(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, ServiceError> {
    let body = read_body(&headers, body, state.max_body_bytes).await?;
    respond(&state, ConversionRequest::url_from_body(&body, OutputKind::Pdf)?).await
}

/// `POST /urltojpeg`
pub async fn url_to_jpeg(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, ServiceError> {
    let body = read_body(&headers, body, state.max_body_bytes).await?;
    respond(&state, ConversionRequest::url_from_body(&body, OutputKind::Jpeg)?).await
}

async fn respond(state: &AppState, request: ConversionRequest) -> Result<Response, ServiceError> {
    let result = state.converter.convert(&request).await?;
    Ok((
        [(header::CONTENT_TYPE, result.content_type.as_str())],
        result.bytes,
    )
        .into_response())
}

/// Read the whole body, rejecting anything of `max` bytes or more.
///
/// A declared `Content-Length` at or over the cap is refused before a single
/// byte is read; otherwise the stream is cut off as soon as it crosses it.
async fn read_body(headers: &HeaderMap, body: Body, max: usize) -> Result<Bytes, ServiceError> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if declared.is_some_and(|len| len >= max as u64) {
        return Err(ServiceError::PayloadTooLarge { limit: max });
    }

    match Limited::new(body, max.saturating_sub(1)).collect().await {
        Ok(collected) => {
            let bytes = collected.to_bytes();
            debug!("Read request body: {} bytes", bytes.len());
            Ok(bytes)
        }
        Err(e) if e.is::<LengthLimitError>() => Err(ServiceError::PayloadTooLarge { limit: max }),
        Err(e) => Err(ServiceError::InvalidRequest(format!(
            "failed to read request body: {e}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[tokio::test]
    async fn body_under_cap_is_read() {
        let bytes = read_body(&HeaderMap::new(), Body::from("hello"), 6).await.unwrap();
        assert_eq!(bytes.as_ref(), b"hello");
    }

    #[tokio::test]
    async fn body_at_cap_is_rejected() {
        let err = read_body(&HeaderMap::new(), Body::from("hello!"), 6)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::PayloadTooLarge { limit: 6 }));
    }

    #[tokio::test]
    async fn declared_length_is_checked_first() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("1000"));
        let err = read_body(&headers, Body::from("tiny"), 10).await.unwrap_err();
        assert!(matches!(err, ServiceError::PayloadTooLarge { .. }));
    }

    #[tokio::test]
    async fn empty_body_is_allowed() {
        let bytes = read_body(&HeaderMap::new(), Body::empty(), 10).await.unwrap();
        assert!(bytes.is_empty());
    }
}
