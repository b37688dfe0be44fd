//! Conversion results handed back to the HTTP layer.

use crate::request::OutputKind;
use bytes::Bytes;
use serde::Serialize;

/// MIME type of a conversion result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ContentType {
    #[serde(rename = "application/pdf")]
    Pdf,
    #[serde(rename = "image/jpeg")]
    Jpeg,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Pdf => "application/pdf",
            ContentType::Jpeg => "image/jpeg",
        }
    }
}

impl From<OutputKind> for ContentType {
    fn from(kind: OutputKind) -> Self {
        match kind {
            OutputKind::Pdf => ContentType::Pdf,
            OutputKind::Jpeg => ContentType::Jpeg,
        }
    }
}

/// Final payload of a successful pipeline run.
#[derive(Debug, Clone)]
pub struct ConversionResult {
    pub bytes: Bytes,
    pub content_type: ContentType,
    pub stats: ConversionStats,
}

/// Per-request numbers, logged once the pipeline finishes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversionStats {
    /// Renderer processes run for this request (1 for PDF, 2 for JPEG).
    pub steps: usize,
    /// Bytes received from the client.
    pub input_bytes: usize,
    /// Bytes returned to the client.
    pub output_bytes: usize,
    /// Wall-clock time across all steps.
    pub total_duration_ms: u64,
}
