//! # htmlpdf-service
//!
//! A small HTTP service that turns HTML documents and web pages into PDF or
//! JPEG by driving two external programs: an HTML-to-PDF renderer
//! (`qtwehtmltopdf`) and ImageMagick's `convert`.
//!
//! ## Pipeline Overview
//!
//! ```text
//! request body
//!  │
//!  ├─ 1. Read     body capped at max_body_bytes (413 at or over the cap)
//!  ├─ 2. Stage    document bytes → uniquely named temp file (URLs skip this)
//!  ├─ 3. Render   qtwehtmltopdf <path|url>  → PDF bytes on stdout
//!  ├─ 4. Stage    PDF bytes → temp file                     (JPEG only)
//!  ├─ 5. Convert  convert -quality 100 <pdf> -append jpeg:- (JPEG only)
//!  └─ 6. Respond  bytes + Content-Type, temp files already removed
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use htmlpdf_service::{ConversionRequest, Converter, OutputKind, ServiceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig::builder()
//!         .html_renderer("/usr/local/bin/qtwehtmltopdf")
//!         .build()?;
//!     let converter = Converter::from_config(config);
//!     let request = ConversionRequest::document(&b"<h1>hi</h1>"[..], OutputKind::Pdf);
//!     let result = converter.convert(&request).await?;
//!     std::fs::write("out.pdf", &result.bytes)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `htmlpdf-service` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod request;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PageMargins, ServiceConfig, ServiceConfigBuilder, StderrPolicy};
pub use convert::Converter;
pub use error::ServiceError;
pub use output::{ContentType, ConversionResult, ConversionStats};
pub use request::{ConversionRequest, OutputKind, Source};
pub use server::{router, serve, shutdown_signal, AppState};
