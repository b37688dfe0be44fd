//! Shared fixtures: fake renderer scripts in a scratch directory.
//!
//! Each fake writes what it was called with into `log/` so a test can check
//! the exact argv and staged input a real renderer would have seen.

#![allow(dead_code)]

use htmlpdf_service::{Converter, ServiceConfig, ServiceConfigBuilder};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const FAKE_PDF: &[u8] = b"%PDF-1.4 fake\n";
pub const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0];

/// Prints a PDF, chatters on stderr and exits 1, like the real renderer.
pub fn pdf_renderer(log: &Path) -> String {
    format!(
        r#"#!/bin/sh
printf '%s' "$#" > '{log}/argc'
printf '%s' "$1" > '{log}/arg1'
printf '%s' "$DISPLAY" > '{log}/display'
[ -f "$1" ] && cat "$1" > '{log}/input'
echo 'js: console warning from page' >&2
printf '%s\n' '%PDF-1.4 fake'
exit 1
"#,
        log = log.display()
    )
}

/// Records its argv and the staged PDF, then prints a JPEG header.
pub fn jpeg_converter(log: &Path) -> String {
    format!(
        r#"#!/bin/sh
printf '%s\n' "$@" > '{log}/convert_args'
cp "$3" '{log}/convert_input'
printf '\377\330\377\340JFIF'
"#,
        log = log.display()
    )
}

/// Prints nothing useful, only internal detail on stderr.
pub const FAILING_RENDERER: &str = "#!/bin/sh\necho 'secret internal trace' >&2\nexit 3\n";

/// Never finishes on its own.
pub const HANGING_RENDERER: &str = "#!/bin/sh\nexec sleep 30\n";

pub struct Fixture {
    pub dir: TempDir,
    pub staging: PathBuf,
    pub log: PathBuf,
    pub config: ServiceConfig,
}

impl Fixture {
    /// Working PDF renderer and JPEG converter.
    pub fn new() -> Self {
        Self::build(None, |b| b)
    }

    /// Replace the HTML renderer with `script`.
    pub fn with_renderer(script: &str) -> Self {
        Self::build(Some(script), |b| b)
    }

    pub fn build(
        renderer: Option<&str>,
        configure: impl FnOnce(ServiceConfigBuilder) -> ServiceConfigBuilder,
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("staging");
        let log = dir.path().join("log");
        std::fs::create_dir(&staging).unwrap();
        std::fs::create_dir(&log).unwrap();

        let html = match renderer {
            Some(script) => script.to_string(),
            None => pdf_renderer(&log),
        };
        let html_path = write_script(dir.path(), "qtwehtmltopdf", &html);
        let convert_path = write_script(dir.path(), "convert", &jpeg_converter(&log));

        let builder = ServiceConfig::builder()
            .html_renderer(html_path)
            .image_converter(convert_path)
            .staging_dir(&staging);
        let config = configure(builder).build().unwrap();

        Self {
            dir,
            staging,
            log,
            config,
        }
    }

    pub fn converter(&self) -> Converter {
        Converter::from_config(self.config.clone())
    }

    /// Files currently left in the staging directory.
    pub fn staged_files(&self) -> usize {
        std::fs::read_dir(&self.staging).unwrap().count()
    }

    /// Contents a fake renderer logged under `name`, if it ran.
    pub fn logged(&self, name: &str) -> Option<Vec<u8>> {
        std::fs::read(self.log.join(name)).ok()
    }

    pub fn logged_str(&self, name: &str) -> Option<String> {
        self.logged(name)
            .map(|b| String::from_utf8(b).expect("log is UTF-8"))
    }
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}
