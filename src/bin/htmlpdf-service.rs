//! Server binary for htmlpdf-service.
//!
//! A thin shim over the library crate that maps CLI flags and environment
//! variables to `ServiceConfig`, checks the renderer, and serves HTTP.

use anyhow::{Context, Result};
use clap::Parser;
use htmlpdf_service::{serve, shutdown_signal, Converter, PageMargins, ServiceConfig, StderrPolicy};
use std::io;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 5555;
const LEGACY_HOST_ENV: &str = "PYTHON_SERVICE_HOST";
const LEGACY_PORT_ENV: &str = "PYTHON_SERVICE_PORT";

const AFTER_HELP: &str = r#"ENDPOINTS:
  POST /topdf       HTML document body        → application/pdf
  POST /tojpeg      HTML document body        → image/jpeg
  POST /urltopdf    http(s) URL as plain text → application/pdf
  POST /urltojpeg   http(s) URL as plain text → image/jpeg
  GET  /health      liveness probe            → "OK"

EXAMPLES:
  # Serve with the renderer at its default location
  htmlpdf-service

  # Custom renderer path and port
  QTWEHTMLTOPDFBIN=/usr/local/bin/qtwehtmltopdf htmlpdf-service --port 8080

  # Convert a page
  curl -X POST --data 'https://example.com' localhost:5555/urltopdf -o page.pdf
  curl -X POST --data-binary @page.html localhost:5555/tojpeg -o page.jpg

LEGACY ENVIRONMENT:
  PYTHON_SERVICE_HOST   read when neither --host nor RENDER_SERVICE_HOST is set
  PYTHON_SERVICE_PORT   read when neither --port nor RENDER_SERVICE_PORT is set

RUNTIME REQUIREMENTS:
  qtwehtmltopdf     HTML-to-PDF renderer (must exist, checked at startup)
  convert           ImageMagick, only needed for the JPEG routes
  X display         a headless server such as Xvfb on $DISPLAY (default :99)
"#;

/// Convert HTML documents and web pages to PDF or JPEG over HTTP.
#[derive(Parser, Debug)]
#[command(
    name = "htmlpdf-service",
    version,
    about = "Convert HTML documents and web pages to PDF or JPEG over HTTP",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Address to bind [default: 0.0.0.0, or PYTHON_SERVICE_HOST].
    #[arg(long, env = "RENDER_SERVICE_HOST")]
    host: Option<String>,

    /// Port to bind [default: 5555, or PYTHON_SERVICE_PORT].
    #[arg(long, env = "RENDER_SERVICE_PORT")]
    port: Option<u16>,

    /// Path to the qtwehtmltopdf executable.
    #[arg(long, env = "QTWEHTMLTOPDFBIN", default_value = "/app/build/qtwehtmltopdf")]
    html_renderer: PathBuf,

    /// ImageMagick `convert` executable used for the JPEG routes.
    #[arg(long, env = "RENDER_SERVICE_IMAGE_CONVERTER", default_value = "convert")]
    image_converter: PathBuf,

    /// X display for the headless renderer.
    #[arg(long, env = "DISPLAY", default_value = ":99")]
    display: String,

    /// XDG_RUNTIME_DIR handed to the renderer.
    #[arg(long, env = "RENDER_SERVICE_RUNTIME_DIR", default_value = "/tmp/")]
    runtime_dir: PathBuf,

    /// Request bodies of this many bytes or more are rejected with 413.
    #[arg(long, env = "RENDER_SERVICE_MAX_BODY_BYTES", default_value_t = 5 * 1024 * 1024)]
    max_body_bytes: usize,

    /// Per-process renderer timeout in seconds.
    #[arg(long, env = "RENDER_SERVICE_RENDER_TIMEOUT", default_value_t = 60)]
    render_timeout: u64,

    /// Maximum number of renderer processes running at once.
    #[arg(long, env = "RENDER_SERVICE_MAX_CONCURRENT_RENDERS", default_value_t = 8)]
    max_concurrent_renders: usize,

    /// JPEG quality (1–100).
    #[arg(long, env = "RENDER_SERVICE_JPEG_QUALITY", default_value_t = 100,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Directory for staged temp files (default: system temp dir).
    #[arg(long, env = "RENDER_SERVICE_STAGING_DIR")]
    staging_dir: Option<PathBuf>,

    /// Renderer stderr handling: tolerate or strict.
    #[arg(long, env = "RENDER_SERVICE_STDERR_POLICY", value_enum, default_value = "tolerate")]
    stderr_policy: StderrPolicyArg,

    /// Page margins in mm as L,T,R,B (e.g. 20,5,20,5).
    #[arg(long, env = "RENDER_SERVICE_MARGINS")]
    margins: Option<PageMargins>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "RENDER_SERVICE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "RENDER_SERVICE_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum StderrPolicyArg {
    Tolerate,
    Strict,
}

impl From<StderrPolicyArg> for StderrPolicy {
    fn from(v: StderrPolicyArg) -> Self {
        match v {
            StderrPolicyArg::Tolerate => StderrPolicy::Tolerate,
            StderrPolicyArg::Strict => StderrPolicy::Strict,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;

    // ── Renderer check ───────────────────────────────────────────────────
    // Refuse to start rather than answer every request with a 500.
    if let Err(e) = config.check_renderer() {
        eprintln!("{e}");
        std::process::exit(1);
    }

    // ── Serve ────────────────────────────────────────────────────────────
    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!(
        renderer = %config.html_renderer.display(),
        converter = %config.image_converter.display(),
        max_body_bytes = config.max_body_bytes,
        timeout_secs = config.render_timeout.as_secs(),
        "Starting htmlpdf-service"
    );
    info!("Endpoints: /topdf /tojpeg /urltopdf /urltojpeg /health");

    serve(listener, Converter::from_config(config), shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

/// Map CLI args to `ServiceConfig`.
fn build_config(cli: &Cli) -> Result<ServiceConfig> {
    let mut builder = ServiceConfig::builder()
        .host(resolve_host(
            cli.host.clone(),
            std::env::var(LEGACY_HOST_ENV).ok(),
        ))
        .port(resolve_port(cli.port, std::env::var(LEGACY_PORT_ENV).ok())?)
        .html_renderer(cli.html_renderer.clone())
        .image_converter(cli.image_converter.clone())
        .display(cli.display.clone())
        .runtime_dir(cli.runtime_dir.clone())
        .max_body_bytes(cli.max_body_bytes)
        .render_timeout_secs(cli.render_timeout)
        .max_concurrent_renders(cli.max_concurrent_renders)
        .jpeg_quality(cli.jpeg_quality)
        .stderr_policy(cli.stderr_policy.clone().into());

    if let Some(ref dir) = cli.staging_dir {
        builder = builder.staging_dir(dir.clone());
    }
    if let Some(margins) = cli.margins {
        builder = builder.margins(margins);
    }

    builder.build().context("Invalid configuration")
}

/// Flag or `RENDER_SERVICE_HOST` first, then the legacy variable, then the default.
fn resolve_host(cli: Option<String>, legacy: Option<String>) -> String {
    cli.or(legacy.filter(|h| !h.trim().is_empty()))
        .unwrap_or_else(|| DEFAULT_HOST.to_string())
}

/// Same precedence as [`resolve_host`]; a malformed legacy port is an error.
fn resolve_port(cli: Option<u16>, legacy: Option<String>) -> Result<u16> {
    match (cli, legacy) {
        (Some(port), _) => Ok(port),
        (None, Some(raw)) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {LEGACY_PORT_ENV} value '{raw}'")),
        (None, None) => Ok(DEFAULT_PORT),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_prefers_flag_over_legacy_env() {
        let host = resolve_host(Some("127.0.0.1".into()), Some("10.0.0.1".into()));
        assert_eq!(host, "127.0.0.1");
    }

    #[test]
    fn host_falls_back_to_legacy_env_then_default() {
        assert_eq!(resolve_host(None, Some("10.0.0.1".into())), "10.0.0.1");
        assert_eq!(resolve_host(None, Some("  ".into())), DEFAULT_HOST);
        assert_eq!(resolve_host(None, None), DEFAULT_HOST);
    }

    #[test]
    fn port_precedence() {
        assert_eq!(resolve_port(Some(8080), Some("9090".into())).unwrap(), 8080);
        assert_eq!(resolve_port(None, Some(" 9090 ".into())).unwrap(), 9090);
        assert_eq!(resolve_port(None, None).unwrap(), DEFAULT_PORT);
    }

    #[test]
    fn malformed_legacy_port_is_rejected() {
        let err = resolve_port(None, Some("http".into())).unwrap_err();
        assert!(err.to_string().contains(LEGACY_PORT_ENV), "got: {err}");
    }
}
