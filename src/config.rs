//! Configuration for the conversion service.
//!
//! Every knob lives in one immutable [`ServiceConfig`], loaded once at startup
//! and shared behind an `Arc`. Nothing below the binary reads the environment;
//! constructors receive the config explicitly.
//!
//! Built via [`ServiceConfig::builder()`] so callers set only what they care
//! about and rely on the documented defaults for the rest.

use crate::error::ServiceError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default request body cap: 5 MiB.
pub const DEFAULT_MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

/// Configuration for the conversion service.
///
/// # Example
/// ```rust
/// use htmlpdf_service::ServiceConfig;
///
/// let config = ServiceConfig::builder()
///     .html_renderer("/usr/local/bin/qtwehtmltopdf")
///     .port(8080)
///     .render_timeout_secs(30)
///     .build()
///     .unwrap();
/// assert_eq!(config.bind_addr(), "0.0.0.0:8080");
/// ```
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Bind host. Default: `0.0.0.0`.
    pub host: String,

    /// Bind port. Default: 5555.
    pub port: u16,

    /// Path to the HTML-to-PDF executable. Default: `/app/build/qtwehtmltopdf`.
    pub html_renderer: PathBuf,

    /// PDF-to-image executable (ImageMagick). Default: `convert`, resolved via `PATH`.
    pub image_converter: PathBuf,

    /// X display handed to the headless renderer as `DISPLAY`. Default: `:99`.
    pub display: String,

    /// Runtime directory handed to the headless renderer as `XDG_RUNTIME_DIR`.
    /// Default: `/tmp/`.
    pub runtime_dir: PathBuf,

    /// Bodies of this many bytes or more are rejected with 413. Default: 5 MiB.
    pub max_body_bytes: usize,

    /// Wall-clock limit for one renderer process. Default: 60 s.
    pub render_timeout: Duration,

    /// Maximum number of renderer processes alive at once. Default: 8.
    pub max_concurrent_renders: usize,

    /// JPEG quality passed to the image converter (1–100). Default: 100.
    pub jpeg_quality: u8,

    /// Directory for staged artifacts. `None` uses the system temp dir.
    pub staging_dir: Option<PathBuf>,

    /// What to do when a renderer writes to stderr or exits non-zero but still
    /// produces output. Default: [`StderrPolicy::Tolerate`].
    pub stderr_policy: StderrPolicy,

    /// Page margins for the HTML renderer. `None` leaves the renderer defaults.
    pub margins: Option<PageMargins>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5555,
            html_renderer: PathBuf::from("/app/build/qtwehtmltopdf"),
            image_converter: PathBuf::from("convert"),
            display: ":99".to_string(),
            runtime_dir: PathBuf::from("/tmp/"),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            render_timeout: Duration::from_secs(60),
            max_concurrent_renders: 8,
            jpeg_quality: 100,
            staging_dir: None,
            stderr_policy: StderrPolicy::default(),
            margins: None,
        }
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }

    /// `host:port` the HTTP listener binds to. Hostnames are resolved at bind time.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Verify the HTML renderer exists before any listener is started.
    pub fn check_renderer(&self) -> Result<(), ServiceError> {
        if is_file(&self.html_renderer) {
            Ok(())
        } else {
            Err(ServiceError::RendererMissing {
                path: self.html_renderer.clone(),
            })
        }
    }
}

fn is_file(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn html_renderer(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.html_renderer = path.into();
        self
    }

    pub fn image_converter(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.image_converter = path.into();
        self
    }

    pub fn display(mut self, display: impl Into<String>) -> Self {
        self.config.display = display.into();
        self
    }

    pub fn runtime_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.runtime_dir = dir.into();
        self
    }

    pub fn max_body_bytes(mut self, n: usize) -> Self {
        self.config.max_body_bytes = n;
        self
    }

    pub fn render_timeout_secs(mut self, secs: u64) -> Self {
        self.config.render_timeout = Duration::from_secs(secs);
        self
    }

    pub fn render_timeout(mut self, timeout: Duration) -> Self {
        self.config.render_timeout = timeout;
        self
    }

    pub fn max_concurrent_renders(mut self, n: usize) -> Self {
        self.config.max_concurrent_renders = n;
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q.clamp(1, 100);
        self
    }

    pub fn staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.staging_dir = Some(dir.into());
        self
    }

    pub fn stderr_policy(mut self, policy: StderrPolicy) -> Self {
        self.config.stderr_policy = policy;
        self
    }

    pub fn margins(mut self, margins: PageMargins) -> Self {
        self.config.margins = Some(margins);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, ServiceError> {
        let c = &self.config;
        if c.max_body_bytes == 0 {
            return Err(ServiceError::InvalidConfig(
                "max body size must be ≥ 1 byte".into(),
            ));
        }
        if c.render_timeout.is_zero() {
            return Err(ServiceError::InvalidConfig(
                "render timeout must be > 0".into(),
            ));
        }
        if c.max_concurrent_renders == 0 {
            return Err(ServiceError::InvalidConfig(
                "max concurrent renders must be ≥ 1".into(),
            ));
        }
        if c.host.trim().is_empty() {
            return Err(ServiceError::InvalidConfig("host must not be empty".into()));
        }
        if c.display.is_empty() {
            return Err(ServiceError::InvalidConfig("display must not be empty".into()));
        }
        if let Some(m) = &c.margins {
            m.validate()?;
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How renderer diagnostics are treated when stdout is non-empty.
///
/// `qtwehtmltopdf` exits with status 1 even after printing a complete PDF,
/// and Chromium-based renderers chatter on stderr constantly,
/// so [`StderrPolicy::Tolerate`] is the default. An empty stdout is a failure
/// under either policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StderrPolicy {
    /// Log stderr and non-zero exits as warnings, return stdout. (default)
    #[default]
    Tolerate,
    /// Treat any stderr output or non-zero exit as a renderer failure.
    Strict,
}

impl std::str::FromStr for StderrPolicy {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tolerate" => Ok(StderrPolicy::Tolerate),
            "strict" => Ok(StderrPolicy::Strict),
            other => Err(ServiceError::InvalidConfig(format!(
                "unknown stderr policy '{other}' (expected tolerate or strict)"
            ))),
        }
    }
}

/// Page margins in millimetres, forwarded as `--margin-*` renderer options.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageMargins {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Default for PageMargins {
    /// Matches the renderer's built-in defaults.
    fn default() -> Self {
        Self {
            left: 20.0,
            top: 5.0,
            right: 20.0,
            bottom: 5.0,
        }
    }
}

impl PageMargins {
    fn validate(&self) -> Result<(), ServiceError> {
        let all = [self.left, self.top, self.right, self.bottom];
        if all.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(ServiceError::InvalidConfig(format!(
                "margins must be finite and ≥ 0, got {self:?}"
            )));
        }
        Ok(())
    }
}

impl std::str::FromStr for PageMargins {
    type Err = ServiceError;

    /// Parse `"L,T,R,B"` in millimetres, e.g. `"20,5,20,5"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<f64> = s
            .split(',')
            .map(|p| {
                p.trim().parse::<f64>().map_err(|_| {
                    ServiceError::InvalidConfig(format!("invalid margin value '{}'", p.trim()))
                })
            })
            .collect::<Result<_, _>>()?;

        match parts.as_slice() {
            [left, top, right, bottom] => {
                let m = PageMargins {
                    left: *left,
                    top: *top,
                    right: *right,
                    bottom: *bottom,
                };
                m.validate()?;
                Ok(m)
            }
            _ => Err(ServiceError::InvalidConfig(format!(
                "margins need 4 comma-separated values (left,top,right,bottom), got '{s}'"
            ))),
        }
    }
}
