//! Inbound conversion requests.

use crate::error::ServiceError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the client sent: a document body or a URL to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Raw HTML (or PDF) bytes, staged to a file before rendering.
    Document(Bytes),
    /// An `http://` or `https://` URL handed to the renderer as-is.
    Url(String),
}

/// Requested output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    Pdf,
    Jpeg,
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputKind::Pdf => f.write_str("pdf"),
            OutputKind::Jpeg => f.write_str("jpeg"),
        }
    }
}

/// One conversion, created per HTTP call and dropped after the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    pub source: Source,
    pub output: OutputKind,
}

impl ConversionRequest {
    pub fn document(body: impl Into<Bytes>, output: OutputKind) -> Self {
        Self {
            source: Source::Document(body.into()),
            output,
        }
    }

    /// Build a URL request from a raw body, validating it first.
    ///
    /// The body must be UTF-8 and, once surrounding whitespace is trimmed,
    /// start with `http://` or `https://`. The prefix rule also guarantees the
    /// value can never be mistaken for a renderer option. Shell
    /// metacharacters are left untouched: the URL travels as a single argv
    /// entry and never meets a shell.
    pub fn url_from_body(body: &[u8], output: OutputKind) -> Result<Self, ServiceError> {
        let text = std::str::from_utf8(body)
            .map_err(|_| ServiceError::InvalidRequest("URL body is not valid UTF-8".into()))?;
        let url = text.trim();

        if !is_url(url) {
            return Err(ServiceError::InvalidRequest(
                "body must be an http:// or https:// URL".into(),
            ));
        }

        Ok(Self {
            source: Source::Url(url.to_string()),
            output,
        })
    }

    /// Size of the inbound payload in bytes.
    pub fn source_len(&self) -> usize {
        match &self.source {
            Source::Document(b) => b.len(),
            Source::Url(u) => u.len(),
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    let rest = input
        .strip_prefix("https://")
        .or_else(|| input.strip_prefix("http://"));
    matches!(rest, Some(r) if !r.is_empty())
}
