use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use chrono::NaiveDate;
use image::{Rgba, RgbaImage};
use returns_dashboard::export::{ExportError, ExportStage, ReportExporter};
use returns_dashboard::html::{render_report, RenderOptions};
use returns_dashboard::locale::Language;
use returns_dashboard::model::{GeneralStats, ReportData, SelectedSections};
use returns_dashboard::offscreen::OffscreenFrame;
use returns_dashboard::paginate::MAX_PAGES;
use returns_dashboard::raster::{Capture, CaptureOptions, RasterError, Rasterizer};
use sha2::{Digest, Sha256};

/// 210 px wide bitmaps give exactly 297 rows per A4 page.
const WIDTH: u32 = 210;
const ROWS_PER_PAGE: u32 = 297;

#[derive(Clone, Debug)]
struct Attached {
    dir: PathBuf,
    document: String,
}

/// Rasterizer returning a striped bitmap of a fixed height.
#[derive(Clone, Default)]
struct StubRasterizer {
    height: u32,
    fail: bool,
    clipped: bool,
    captures: Rc<RefCell<Vec<Attached>>>,
}

impl StubRasterizer {
    fn with_height(height: u32) -> Self {
        Self {
            height,
            ..Self::default()
        }
    }

    fn clipped(height: u32) -> Self {
        Self {
            height,
            clipped: true,
            ..Self::default()
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

impl Rasterizer for StubRasterizer {
    fn capture(
        &self,
        frame: &OffscreenFrame,
        _options: &CaptureOptions,
    ) -> Result<Capture, RasterError> {
        let document = fs::read_to_string(frame.document_path()).expect("read attached document");
        self.captures.borrow_mut().push(Attached {
            dir: frame.dir().to_path_buf(),
            document,
        });

        if self.fail {
            return Err(RasterError::Empty);
        }
        let bitmap = RgbaImage::from_fn(WIDTH, self.height, |_, y| {
            if y % 40 < 20 {
                Rgba([5, 63, 92, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        });
        Ok(Capture {
            bitmap,
            clipped: self.clipped,
        })
    }
}

fn report_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

fn sample_data() -> ReportData {
    ReportData::new("month").with_general_stats(GeneralStats {
        total_waste: Some(1520.5),
        total_returns: Some(42.0),
    })
}

fn summary_only() -> SelectedSections {
    SelectedSections::new().with("summary", true)
}

fn exporter(rasterizer: StubRasterizer) -> ReportExporter<StubRasterizer> {
    ReportExporter::new(rasterizer)
        .with_logo_path(None)
        .with_settle_delay(Duration::ZERO)
        .with_date(report_date())
}

fn page_count(bytes: &[u8]) -> usize {
    lopdf::Document::load_mem(bytes)
        .expect("parse exported pdf")
        .get_pages()
        .len()
}

fn scrub_pdf(bytes: &[u8]) -> Vec<u8> {
    fn scrub_segment(data: &mut [u8], tag: &[u8], terminator: u8) {
        let mut index = 0;
        while index + tag.len() < data.len() {
            if data[index..].starts_with(tag) {
                let mut cursor = index + tag.len();
                while cursor < data.len() {
                    let byte = data[cursor];
                    if byte == terminator {
                        break;
                    }
                    if terminator == b')' {
                        data[cursor] = b'0';
                    } else if !matches!(byte, b'<' | b'>' | b' ' | b'\n' | b'\r' | b'\t') {
                        data[cursor] = b'0';
                    }
                    cursor += 1;
                }
                index = cursor;
            } else {
                index += 1;
            }
        }
    }

    fn scrub_xml(data: &mut [u8], start: &[u8], end: &[u8]) {
        let mut offset = 0;
        while offset + start.len() < data.len() {
            let Some(start_pos) = data[offset..]
                .windows(start.len())
                .position(|window| window == start)
            else {
                break;
            };
            let start_index = offset + start_pos + start.len();
            let Some(end_pos) = data[start_index..]
                .windows(end.len())
                .position(|window| window == end)
            else {
                break;
            };
            for byte in &mut data[start_index..start_index + end_pos] {
                if !matches!(*byte, b'<' | b'>' | b'/' | b' ' | b'\n' | b'\r' | b'\t') {
                    *byte = b'0';
                }
            }
            offset = start_index + end_pos + end.len();
        }
    }

    let mut normalized = bytes.to_vec();
    scrub_segment(&mut normalized, b"/CreationDate(", b')');
    scrub_segment(&mut normalized, b"/ModDate(", b')');
    scrub_segment(&mut normalized, b"/ID[", b']');
    scrub_segment(&mut normalized, b"/Producer(", b')');
    for tag in [
        "xmp:CreateDate",
        "xmp:ModifyDate",
        "xmp:MetadataDate",
        "xmpMM:DocumentID",
        "xmpMM:InstanceID",
        "xmpMM:VersionID",
    ] {
        let start = format!("<{tag}>");
        let end = format!("</{tag}>");
        scrub_xml(&mut normalized, start.as_bytes(), end.as_bytes());
    }
    normalized
}

fn normalized_hash(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(scrub_pdf(bytes)).into()
}

#[test]
fn single_page_report() {
    let report = exporter(StubRasterizer::with_height(ROWS_PER_PAGE))
        .export(&sample_data(), &summary_only(), &Language::english())
        .expect("export report");

    assert_eq!(report.page_count, 1);
    assert!(!report.truncated);
    assert_eq!(page_count(&report.bytes), 1);
    assert_eq!(report.file_name, "report-month-2026-10-19.pdf");
}

#[test]
fn tall_bitmap_spans_ceiling_of_pages() {
    let height = ROWS_PER_PAGE * 2 + 1;
    let report = exporter(StubRasterizer::with_height(height))
        .export(&sample_data(), &summary_only(), &Language::english())
        .expect("export report");

    assert_eq!(report.page_count, 3);
    assert_eq!(page_count(&report.bytes), 3);
}

#[test]
fn page_limit_truncates_report() {
    let report = exporter(StubRasterizer::with_height(ROWS_PER_PAGE * (MAX_PAGES as u32 + 5)))
        .export(&sample_data(), &summary_only(), &Language::english())
        .expect("export report");

    assert!(report.truncated);
    assert_eq!(report.page_count, MAX_PAGES);
    assert_eq!(page_count(&report.bytes), MAX_PAGES);
}

#[test]
fn clipped_capture_marks_report_truncated() {
    let report = exporter(StubRasterizer::clipped(ROWS_PER_PAGE * 2))
        .export(&sample_data(), &summary_only(), &Language::english())
        .expect("export report");

    assert!(report.truncated);
    assert_eq!(report.page_count, 2);
}

#[test]
fn export_is_deterministic() {
    let render = || {
        exporter(StubRasterizer::with_height(ROWS_PER_PAGE + 10))
            .export(&sample_data(), &summary_only(), &Language::english())
            .expect("export report")
            .bytes
    };
    let bytes_a = render();
    let bytes_b = render();

    assert_eq!(bytes_a.len(), bytes_b.len(), "PDF sizes should match");
    assert_eq!(
        normalized_hash(&bytes_a),
        normalized_hash(&bytes_b),
        "PDF exports must be deterministic after metadata normalization"
    );
}

#[test]
fn frame_is_released_after_success() {
    let rasterizer = StubRasterizer::with_height(ROWS_PER_PAGE);
    let captures = Rc::clone(&rasterizer.captures);

    exporter(rasterizer)
        .export(&sample_data(), &summary_only(), &Language::english())
        .expect("export report");

    let captures = captures.borrow();
    assert_eq!(captures.len(), 1);
    assert!(!captures[0].dir.exists(), "offscreen frame should be removed");
}

#[test]
fn frame_is_released_after_capture_failure() {
    let rasterizer = StubRasterizer::failing();
    let captures = Rc::clone(&rasterizer.captures);

    let err = exporter(rasterizer)
        .export(&sample_data(), &summary_only(), &Language::english())
        .unwrap_err();

    assert!(matches!(err, ExportError::Raster(RasterError::Empty)));
    let captures = captures.borrow();
    assert_eq!(captures.len(), 1);
    assert!(!captures[0].dir.exists(), "offscreen frame should be removed");
}

#[test]
fn stages_are_reported_in_order() {
    let stages = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&stages);
    let out_dir = tempfile::tempdir().unwrap();

    exporter(StubRasterizer::with_height(ROWS_PER_PAGE))
        .with_stage_observer(move |stage| sink.borrow_mut().push(stage))
        .export_to_dir(out_dir.path(), &sample_data(), &summary_only(), &Language::english())
        .expect("export report");

    assert_eq!(
        *stages.borrow(),
        vec![
            ExportStage::Idle,
            ExportStage::LogoLoading,
            ExportStage::Rendering,
            ExportStage::Settling,
            ExportStage::Capturing,
            ExportStage::Paginating,
            ExportStage::Saving,
            ExportStage::Done,
        ]
    );
}

#[test]
fn in_memory_export_skips_saving_stage() {
    let stages = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&stages);

    exporter(StubRasterizer::with_height(ROWS_PER_PAGE))
        .with_stage_observer(move |stage| sink.borrow_mut().push(stage))
        .export(&sample_data(), &summary_only(), &Language::english())
        .expect("export report");

    let stages = stages.borrow();
    assert!(!stages.contains(&ExportStage::Saving));
    assert_eq!(
        stages[stages.len() - 2..],
        [ExportStage::Paginating, ExportStage::Done]
    );
}

#[test]
fn concurrent_exports_use_separate_frames() {
    let handles: Vec<_> = (0..2)
        .map(|_| {
            thread::spawn(|| {
                let rasterizer = StubRasterizer::with_height(ROWS_PER_PAGE);
                let captures = Rc::clone(&rasterizer.captures);
                let report = exporter(rasterizer)
                    .export(&sample_data(), &summary_only(), &Language::english())
                    .expect("export report");
                let dir = captures.borrow()[0].dir.clone();
                (dir, report.page_count)
            })
        })
        .collect();

    let results: Vec<(PathBuf, usize)> = handles
        .into_iter()
        .map(|handle| handle.join().expect("export thread"))
        .collect();

    assert_ne!(results[0].0, results[1].0);
    for (dir, pages) in &results {
        assert_eq!(*pages, 1);
        assert!(!dir.exists(), "offscreen frame should be removed");
    }
}

#[test]
fn export_to_dir_writes_named_file() {
    let out_dir = tempfile::tempdir().unwrap();
    let (path, report) = exporter(StubRasterizer::with_height(ROWS_PER_PAGE))
        .export_to_dir(out_dir.path(), &sample_data(), &summary_only(), &Language::english())
        .expect("export report");

    assert_eq!(path, out_dir.path().join("report-month-2026-10-19.pdf"));
    assert_eq!(fs::read(&path).unwrap(), report.bytes);
}

#[test]
fn missing_logo_is_not_fatal() {
    let asset_root = tempfile::tempdir().unwrap();
    let rasterizer = StubRasterizer::with_height(ROWS_PER_PAGE);
    let captures = Rc::clone(&rasterizer.captures);

    let report = exporter(rasterizer)
        .with_logo_path(Some("/logo.png".to_owned()))
        .with_asset_root(asset_root.path())
        .export(&sample_data(), &summary_only(), &Language::english())
        .expect("export without logo");

    assert_eq!(report.page_count, 1);
    assert!(!captures.borrow()[0].document.contains("class=\"logo\""));
}

#[test]
fn logo_is_embedded_as_data_url() {
    let asset_root = tempfile::tempdir().unwrap();
    RgbaImage::from_pixel(4, 4, Rgba([200, 30, 30, 255]))
        .save(asset_root.path().join("logo.png"))
        .unwrap();
    let rasterizer = StubRasterizer::with_height(ROWS_PER_PAGE);
    let captures = Rc::clone(&rasterizer.captures);

    exporter(rasterizer)
        .with_logo_path(Some("/logo.png".to_owned()))
        .with_asset_root(asset_root.path())
        .export(&sample_data(), &summary_only(), &Language::english())
        .expect("export with logo");

    assert!(captures.borrow()[0]
        .document
        .contains("<img src=\"data:image/png;base64,"));
}

#[test]
fn arabic_document_is_right_to_left() {
    let rasterizer = StubRasterizer::with_height(ROWS_PER_PAGE);
    let captures = Rc::clone(&rasterizer.captures);

    exporter(rasterizer)
        .export(&sample_data(), &summary_only(), &Language::arabic())
        .expect("export report");

    let document = &captures.borrow()[0].document;
    assert!(document.contains("dir=\"rtl\""));
    assert!(document.contains("lang=\"ar\""));
    assert!(document.contains("direction: rtl"));
    assert!(!document.contains("ltr"));
}

#[test]
fn sections_are_included_only_when_flagged() {
    let data = sample_data();
    let options = RenderOptions::new(Language::english(), report_date());

    let none = render_report(&data, &SelectedSections::new(), &options);
    assert!(!none.contains("data-section="));

    let sections = SelectedSections::new()
        .with("summary", false)
        .with("returns", true)
        .with("recommendations", true);
    let html = render_report(&data, &sections, &options);
    assert!(!html.contains("data-section=\"summary\""));
    assert!(html.contains("data-section=\"returns\""));
    assert!(html.contains("data-section=\"recommendations\""));
}

#[test]
fn missing_statistics_render_as_zero() {
    let data: ReportData = serde_json::from_str(r#"{"selectedPeriod":"week"}"#).unwrap();
    let options = RenderOptions::new(Language::english(), report_date());
    let html = render_report(&data, &summary_only(), &options);

    assert!(html.contains("<div class=\"stat-value\">0 kg</div>"));
    assert!(html.contains("<div class=\"stat-value\">0</div>"));
}
