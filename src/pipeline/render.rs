//! Renderer step builders: the exact argv and environment of each step.
//!
//! Kept apart from [`crate::convert`] so the command lines can be asserted
//! without running anything.
//!
//! ## HTML → PDF
//!
//! ```text
//! DISPLAY=<display> XDG_RUNTIME_DIR=<runtime_dir> \
//!   qtwehtmltopdf [--margin-left L --margin-top T --margin-right R --margin-bottom B] <input>
//! ```
//!
//! `<input>` is either an absolute staged path or an `http(s)://` URL. It is
//! always one argv entry, so it can neither split into extra arguments nor
//! reach a shell.
//!
//! ## PDF → JPEG
//!
//! ```text
//! convert -quality <q> <pdf_path> -append jpeg:-
//! ```
//!
//! `-append` stacks every page vertically into one image; `jpeg:-` writes the
//! result to stdout.

use crate::config::ServiceConfig;
use crate::pipeline::invoke::RendererInvocation;
use std::ffi::OsStr;
use std::path::Path;

/// Build the HTML-to-PDF invocation for a staged file path or a URL.
pub fn html_to_pdf(config: &ServiceConfig, input: impl AsRef<OsStr>) -> RendererInvocation {
    let mut inv = RendererInvocation::new(&config.html_renderer)
        .env("DISPLAY", &config.display)
        .env("XDG_RUNTIME_DIR", &config.runtime_dir);

    if let Some(m) = &config.margins {
        inv = inv
            .arg("--margin-left")
            .arg(m.left.to_string())
            .arg("--margin-top")
            .arg(m.top.to_string())
            .arg("--margin-right")
            .arg(m.right.to_string())
            .arg("--margin-bottom")
            .arg(m.bottom.to_string());
    }

    inv.arg(input.as_ref())
}

/// Build the PDF-to-JPEG invocation for a staged PDF.
pub fn pdf_to_jpeg(config: &ServiceConfig, pdf_path: &Path) -> RendererInvocation {
    RendererInvocation::new(&config.image_converter)
        .arg("-quality")
        .arg(config.jpeg_quality.to_string())
        .arg(pdf_path)
        .arg("-append")
        .arg("jpeg:-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PageMargins;
    use std::ffi::OsString;
    use std::path::PathBuf;

    fn args(inv: &RendererInvocation) -> Vec<&str> {
        inv.args.iter().map(|a| a.to_str().unwrap()).collect()
    }

    #[test]
    fn html_step_passes_input_as_sole_argument() {
        let config = ServiceConfig::default();
        let inv = html_to_pdf(&config, "/tmp/htmlpdf-abc.html");

        assert_eq!(inv.program, PathBuf::from("/app/build/qtwehtmltopdf"));
        assert_eq!(args(&inv), vec!["/tmp/htmlpdf-abc.html"]);
        assert!(inv
            .env
            .contains(&(OsString::from("DISPLAY"), OsString::from(":99"))));
        assert!(inv
            .env
            .contains(&(OsString::from("XDG_RUNTIME_DIR"), OsString::from("/tmp/"))));
    }

    #[test]
    fn hostile_url_stays_one_entry() {
        let config = ServiceConfig::default();
        let url = "https://example.com; rm -rf /";
        let inv = html_to_pdf(&config, url);
        assert_eq!(args(&inv), vec![url]);
    }

    #[test]
    fn margins_precede_input() {
        let config = ServiceConfig::builder()
            .margins(PageMargins {
                left: 10.0,
                top: 2.5,
                right: 10.0,
                bottom: 2.5,
            })
            .build()
            .unwrap();
        let inv = html_to_pdf(&config, "https://example.com");
        assert_eq!(
            args(&inv),
            vec![
                "--margin-left",
                "10",
                "--margin-top",
                "2.5",
                "--margin-right",
                "10",
                "--margin-bottom",
                "2.5",
                "https://example.com",
            ]
        );
    }

    #[test]
    fn jpeg_step_requests_max_quality_and_append() {
        let config = ServiceConfig::builder()
            .image_converter("/usr/bin/convert")
            .build()
            .unwrap();
        let inv = pdf_to_jpeg(&config, Path::new("/tmp/htmlpdf-x.pdf"));

        assert_eq!(inv.program, PathBuf::from("/usr/bin/convert"));
        assert_eq!(
            args(&inv),
            vec!["-quality", "100", "/tmp/htmlpdf-x.pdf", "-append", "jpeg:-"]
        );
        assert!(inv.env.is_empty());
    }
}
