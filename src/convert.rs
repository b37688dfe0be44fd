//! Conversion pipeline: turn a [`ConversionRequest`] into rendered bytes.
//!
//! The chain is strictly linear. A PDF is always produced first, either
//! from a staged document or directly from a URL. JPEG output then stages
//! that PDF and runs the image converter over it. There are no retries and
//! no fan-out, and the first failing step aborts the request with its own
//! error.
//!
//! Staged files are released as soon as the step reading them returns. If a
//! step fails, or the whole future is dropped because the client went away,
//! the [`StagedArtifact`](crate::pipeline::stage::StagedArtifact) drops and
//! takes its file with it.

use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::output::{ContentType, ConversionResult, ConversionStats};
use crate::pipeline::invoke::{ProcessInvoker, RendererInvocation, RendererInvoker};
use crate::pipeline::render;
use crate::pipeline::stage::{document_suffix, ArtifactStore, StagedArtifact};
use crate::request::{ConversionRequest, OutputKind, Source};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runs conversion pipelines against one artifact store and one invoker.
///
/// Cheap to clone; every field is shared.
#[derive(Clone)]
pub struct Converter {
    config: Arc<ServiceConfig>,
    store: ArtifactStore,
    invoker: Arc<dyn RendererInvoker>,
}

impl Converter {
    pub fn new(
        config: Arc<ServiceConfig>,
        store: ArtifactStore,
        invoker: Arc<dyn RendererInvoker>,
    ) -> Self {
        Self {
            config,
            store,
            invoker,
        }
    }

    /// Wire up the real process invoker and the configured staging directory.
    pub fn from_config(config: ServiceConfig) -> Self {
        let store = match &config.staging_dir {
            Some(dir) => ArtifactStore::new(dir),
            None => ArtifactStore::system(),
        };
        let invoker = Arc::new(ProcessInvoker::from_config(&config));
        Self::new(Arc::new(config), store, invoker)
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Run the pipeline for one request.
    ///
    /// # Errors
    /// Returns the first failing step's error:
    /// - [`ServiceError::Storage`] if a staging write fails
    /// - [`ServiceError::ProcessSpawn`] if a renderer cannot start
    /// - [`ServiceError::ProcessTimeout`] if a renderer hangs
    /// - [`ServiceError::RendererFailure`] if a renderer produces nothing
    pub async fn convert(&self, request: &ConversionRequest) -> Result<ConversionResult, ServiceError> {
        let start = Instant::now();
        let mut steps = 0;

        // ── Step 1: HTML / URL → PDF ─────────────────────────────────────
        let pdf = self.render_pdf(&request.source).await?;
        steps += 1;
        debug!("PDF step produced {} bytes", pdf.len());

        // ── Step 2: PDF → JPEG (optional) ────────────────────────────────
        let bytes = match request.output {
            OutputKind::Pdf => pdf,
            OutputKind::Jpeg => {
                let jpeg = self.pdf_to_jpeg(&pdf).await?;
                steps += 1;
                debug!("JPEG step produced {} bytes", jpeg.len());
                jpeg
            }
        };

        let stats = ConversionStats {
            steps,
            input_bytes: request.source_len(),
            output_bytes: bytes.len(),
            total_duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            output = %request.output,
            steps = stats.steps,
            input_bytes = stats.input_bytes,
            output_bytes = stats.output_bytes,
            "Conversion complete in {}ms",
            stats.total_duration_ms
        );

        Ok(ConversionResult {
            bytes: Bytes::from(bytes),
            content_type: ContentType::from(request.output),
            stats,
        })
    }

    /// Produce PDF bytes from a document body or a URL.
    async fn render_pdf(&self, source: &Source) -> Result<Vec<u8>, ServiceError> {
        match source {
            Source::Document(body) => {
                let staged = self.store.stage(body, document_suffix(body)).await?;
                let inv = render::html_to_pdf(&self.config, staged.path());
                self.run_on(staged, &inv).await
            }
            Source::Url(url) => {
                let inv = render::html_to_pdf(&self.config, url);
                Ok(self.invoker.invoke(&inv).await?.stdout)
            }
        }
    }

    /// Stage a PDF and rasterise every page into one stacked JPEG.
    async fn pdf_to_jpeg(&self, pdf: &[u8]) -> Result<Vec<u8>, ServiceError> {
        let staged = self.store.stage(pdf, ".pdf").await?;
        let inv = render::pdf_to_jpeg(&self.config, staged.path());
        self.run_on(staged, &inv).await
    }

    /// Invoke a step that reads `staged`, then release it.
    async fn run_on(
        &self,
        staged: StagedArtifact,
        inv: &RendererInvocation,
    ) -> Result<Vec<u8>, ServiceError> {
        // On error `staged` drops here and its file goes with it.
        let output = self.invoker.invoke(inv).await?;

        if let Err(e) = self.store.release(staged).await {
            warn!("Failed to release staged artifact: {}", e);
        }
        Ok(output.stdout)
    }
}
