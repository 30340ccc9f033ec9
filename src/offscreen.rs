//! Offscreen render host.
//!
//! An [`OffscreenFrame`] is a private scratch directory holding the report
//! document while it is rasterized.  The frame owns the directory: dropping
//! it removes the directory together with anything the rasterizer wrote
//! into it, whichever way the export ends.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use log::debug;
use tempfile::TempDir;

use crate::locale::Language;

/// File name of the document inside the frame.
pub const DOCUMENT_FILE_NAME: &str = "report.html";

/// Settle delay used when the caller does not configure one.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(1000);

/// Failure to attach a document to a new frame.
#[derive(Debug)]
pub struct FrameError {
    message: String,
    source: io::Error,
}

impl FrameError {
    fn new(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            message: message.into(),
            source,
        }
    }
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.message, self.source)
    }
}

impl std::error::Error for FrameError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// A document attached to an invisible rendering surface.
pub struct OffscreenFrame {
    dir: TempDir,
    document: PathBuf,
    language: Language,
}

impl OffscreenFrame {
    /// Creates a new frame and writes `html` into it.
    ///
    /// The `dir` and `lang` attributes of the root element are set from
    /// `language`, replacing whatever the document declared.
    pub fn attach(html: &str, language: &Language) -> Result<Self, FrameError> {
        let dir = tempfile::Builder::new()
            .prefix("returns-report-")
            .tempdir()
            .map_err(|err| FrameError::new("Failed to create offscreen frame", err))?;
        let document = dir.path().join(DOCUMENT_FILE_NAME);

        let prepared = with_root_attributes(html, language);
        fs::write(&document, prepared).map_err(|err| {
            FrameError::new(
                format!("Failed to write report document to {}", document.display()),
                err,
            )
        })?;

        debug!("Attached report document at {}", document.display());
        Ok(Self {
            dir,
            document,
            language: language.clone(),
        })
    }

    /// Blocks for `delay` so that fonts and layout can settle.
    pub fn settle(&self, delay: Duration) {
        if !delay.is_zero() {
            debug!("Letting offscreen frame settle for {} ms", delay.as_millis());
            thread::sleep(delay);
        }
    }

    /// Directory backing the frame; rasterizers may write scratch files here.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Path of the attached document.
    pub fn document_path(&self) -> &Path {
        &self.document
    }

    /// `file://` URL of the attached document.
    pub fn document_url(&self) -> String {
        let path = self.document.to_string_lossy().replace('\\', "/");
        if path.starts_with('/') {
            format!("file://{path}")
        } else {
            format!("file:///{path}")
        }
    }

    /// Language the document was attached with.
    pub fn language(&self) -> &Language {
        &self.language
    }
}

impl Drop for OffscreenFrame {
    fn drop(&mut self) {
        debug!("Releasing offscreen frame {}", self.dir.path().display());
    }
}

/// Rewrites the opening `<html>` tag so it carries the given direction and language.
pub fn with_root_attributes(html: &str, language: &Language) -> String {
    let root = format!(
        "<html dir=\"{}\" lang=\"{}\">",
        language.direction().as_str(),
        crate::html::escape(language.code())
    );

    let lower = html.to_ascii_lowercase();
    let start = lower.find("<html").filter(|&index| {
        lower[index + 5..]
            .chars()
            .next()
            .map_or(false, |c| c == '>' || c.is_whitespace())
    });

    match start {
        Some(start) => match lower[start..].find('>') {
            Some(end) => {
                let mut rewritten = String::with_capacity(html.len() + root.len());
                rewritten.push_str(&html[..start]);
                rewritten.push_str(&root);
                rewritten.push_str(&html[start + end + 1..]);
                rewritten
            }
            None => format!("{root}{html}</html>"),
        },
        None => format!("{root}{html}</html>"),
    }
}
