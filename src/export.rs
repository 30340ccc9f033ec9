//! End-to-end report export.
//!
//! [`ReportExporter`] runs the sequential pipeline
//! `logo → HTML → offscreen frame → settle → capture → paginate → save`.
//! The offscreen frame lives in a scope that ends right after capture, so it
//! is released before pagination starts and on every early return.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate, Utc};
use log::{debug, info, warn};

use crate::html::{render_report, RenderOptions};
use crate::locale::Language;
use crate::logo::{self, DEFAULT_LOGO_PATH};
use crate::model::{ReportData, SelectedSections};
use crate::offscreen::{FrameError, OffscreenFrame, DEFAULT_SETTLE_DELAY};
use crate::paginate::{self, PageFormat, PaginateError};
use crate::raster::{CaptureOptions, RasterError, Rasterizer};

/// Steps of an export, reported to the stage observer as they start.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportStage {
    Idle,
    LogoLoading,
    Rendering,
    Settling,
    Capturing,
    Paginating,
    /// Writing the file. Only [`ReportExporter::export_to_dir`] enters it.
    Saving,
    Done,
}

/// Errors that abort an export.
#[derive(Debug)]
pub enum ExportError {
    /// The offscreen frame could not be created.
    Frame(FrameError),
    /// The document could not be captured.
    Raster(RasterError),
    /// The PDF could not be assembled.
    Paginate(PaginateError),
    /// The finished file could not be written.
    Write { path: PathBuf, source: io::Error },
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Frame(_) => write!(f, "Failed to prepare offscreen frame"),
            Self::Raster(_) => write!(f, "Failed to rasterize report"),
            Self::Paginate(_) => write!(f, "Failed to assemble report PDF"),
            Self::Write { path, .. } => write!(f, "Failed to write {}", path.display()),
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Frame(err) => Some(err),
            Self::Raster(err) => Some(err),
            Self::Paginate(err) => Some(err),
            Self::Write { source, .. } => Some(source),
        }
    }
}

impl From<FrameError> for ExportError {
    fn from(err: FrameError) -> Self {
        Self::Frame(err)
    }
}

impl From<RasterError> for ExportError {
    fn from(err: RasterError) -> Self {
        Self::Raster(err)
    }
}

impl From<PaginateError> for ExportError {
    fn from(err: PaginateError) -> Self {
        Self::Paginate(err)
    }
}

/// A finished report.
#[derive(Clone, Debug)]
pub struct ExportedReport {
    /// Download name, `report-<period>-<YYYY-MM-DD>.pdf`.
    pub file_name: String,
    /// Serialized PDF.
    pub bytes: Vec<u8>,
    /// Number of pages in the PDF.
    pub page_count: usize,
    /// Whether the page limit or a clipped capture cut the report short.
    pub truncated: bool,
}

type StageObserver = dyn Fn(ExportStage);

/// Configurable exporter producing image-only PDF reports.
pub struct ReportExporter<R> {
    rasterizer: R,
    logo_path: Option<String>,
    asset_root: PathBuf,
    settle_delay: Duration,
    capture: CaptureOptions,
    format: PageFormat,
    date: Option<NaiveDate>,
    observer: Option<Box<StageObserver>>,
}

impl<R: Rasterizer> ReportExporter<R> {
    /// Creates an exporter using `rasterizer` and the default settings.
    pub fn new(rasterizer: R) -> Self {
        Self {
            rasterizer,
            logo_path: Some(DEFAULT_LOGO_PATH.to_owned()),
            asset_root: PathBuf::from(crate::config::DEFAULT_ASSET_ROOT),
            settle_delay: DEFAULT_SETTLE_DELAY,
            capture: CaptureOptions::default(),
            format: PageFormat::A4,
            date: None,
            observer: None,
        }
    }

    /// Sets the logo path, or disables the logo with `None`.
    pub fn with_logo_path(mut self, logo_path: impl Into<Option<String>>) -> Self {
        self.logo_path = logo_path.into();
        self
    }

    /// Sets the directory web-style logo paths are resolved against.
    pub fn with_asset_root(mut self, asset_root: impl Into<PathBuf>) -> Self {
        self.asset_root = asset_root.into();
        self
    }

    /// Sets how long the frame settles before capture.
    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    /// Sets the capture options.
    pub fn with_capture_options(mut self, capture: CaptureOptions) -> Self {
        self.capture = capture;
        self
    }

    /// Pins the report date instead of using today's local date.
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Registers a callback invoked whenever the export enters a new stage.
    pub fn with_stage_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(ExportStage) + 'static,
    {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Runs the pipeline and returns the finished report without writing it.
    ///
    /// Nothing is saved, so the observer sees `Paginating` followed by `Done`.
    pub fn export(
        &self,
        data: &ReportData,
        sections: &SelectedSections,
        language: &Language,
    ) -> Result<ExportedReport, ExportError> {
        let report = self.run(data, sections, language)?;
        self.notify(ExportStage::Done);
        Ok(report)
    }

    /// Runs the pipeline and writes the report into `dir`.
    pub fn export_to_dir(
        &self,
        dir: &Path,
        data: &ReportData,
        sections: &SelectedSections,
        language: &Language,
    ) -> Result<(PathBuf, ExportedReport), ExportError> {
        let report = self.run(data, sections, language)?;

        self.notify(ExportStage::Saving);
        let path = dir.join(&report.file_name);
        fs::create_dir_all(dir)
            .and_then(|()| fs::write(&path, &report.bytes))
            .map_err(|source| ExportError::Write {
                path: path.clone(),
                source,
            })?;
        info!(
            "Saved {} ({} pages, {} bytes)",
            path.display(),
            report.page_count,
            report.bytes.len()
        );

        self.notify(ExportStage::Done);
        Ok((path, report))
    }

    fn run(
        &self,
        data: &ReportData,
        sections: &SelectedSections,
        language: &Language,
    ) -> Result<ExportedReport, ExportError> {
        self.notify(ExportStage::Idle);
        let (date, file_date) = report_dates(self.date, Utc::now());

        self.notify(ExportStage::LogoLoading);
        let logo = self.load_logo();

        self.notify(ExportStage::Rendering);
        let options = RenderOptions::new(language.clone(), date).with_logo(logo);
        let html = render_report(data, sections, &options);

        let capture = {
            let frame = OffscreenFrame::attach(&html, language)?;

            self.notify(ExportStage::Settling);
            frame.settle(self.settle_delay);

            self.notify(ExportStage::Capturing);
            let capture = self.rasterizer.capture(&frame, &self.capture)?;
            capture
        };
        if capture.clipped {
            warn!("Captured report is incomplete; content below the capture area is missing");
        }

        self.notify(ExportStage::Paginating);
        let title = language.pick("تقرير شامل", "Comprehensive Report");
        let pdf = paginate::assemble_pdf(
            &capture.bitmap,
            self.format,
            title,
            self.capture.background,
        )?;
        if pdf.truncated {
            warn!("Report truncated at {} pages", paginate::MAX_PAGES);
        }

        Ok(ExportedReport {
            file_name: paginate::report_file_name(&data.selected_period, file_date),
            bytes: pdf.bytes,
            page_count: pdf.page_count,
            truncated: pdf.truncated || capture.clipped,
        })
    }

    fn load_logo(&self) -> Option<String> {
        let logo_path = self.logo_path.as_deref()?;
        match logo::load_logo(logo_path, &self.asset_root) {
            Ok(url) => Some(url),
            Err(err) => {
                warn!("Could not load logo, continuing without it: {err}");
                None
            }
        }
    }

    fn notify(&self, stage: ExportStage) {
        debug!("Export stage: {:?}", stage);
        if let Some(observer) = &self.observer {
            observer(stage);
        }
    }
}

/// Header date and file name date of a report produced at `now`.
///
/// The header shows the local calendar date while the file name carries the
/// UTC date. A pinned date is used for both.
fn report_dates(pinned: Option<NaiveDate>, now: DateTime<Utc>) -> (NaiveDate, NaiveDate) {
    match pinned {
        Some(date) => (date, date),
        None => (now.with_timezone(&Local).date_naive(), now.date_naive()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn file_name_date_is_utc() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 23, 30, 0).unwrap();
        let (_, file_date) = report_dates(None, now);
        assert_eq!(file_date, NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
    }

    #[test]
    fn pinned_date_is_used_for_both() {
        let pinned = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 0, 5, 0).unwrap();
        assert_eq!(report_dates(Some(pinned), now), (pinned, pinned));
    }
}
