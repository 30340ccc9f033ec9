//! Slicing of a report bitmap into physical pages and PDF assembly.
//!
//! The bitmap is laid out at the full page width, so a page covers
//! `height_mm * width_px / width_mm` source rows.  Slices are cut top to
//! bottom and each one becomes an image-only page of the PDF.

use std::fmt;
use std::io::{BufWriter, Write as _};

use chrono::NaiveDate;
use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};
use log::{debug, warn};
use printpdf::{Image, Mm, PdfDocument};

/// Hard limit on the number of pages assembled from one bitmap.
pub const MAX_PAGES: usize = 100;

const MM_PER_INCH: f64 = 25.4;

/// Physical page size in millimetres.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageFormat {
    pub width_mm: f64,
    pub height_mm: f64,
}

impl PageFormat {
    /// A4 portrait.
    pub const A4: Self = Self {
        width_mm: 210.0,
        height_mm: 297.0,
    };

    /// Number of source rows covered by one page for a bitmap `width_px` wide.
    pub fn page_height_px_exact(&self, width_px: u32) -> f64 {
        self.height_mm * f64::from(width_px) / self.width_mm
    }

    /// Whole source rows covered by one page for a bitmap `width_px` wide.
    pub fn page_height_px(&self, width_px: u32) -> u32 {
        self.page_height_px_exact(width_px).floor() as u32
    }

    /// Rendered height in millimetres of `rows` source rows.
    pub fn rows_to_mm(&self, rows: u32, width_px: u32) -> f64 {
        f64::from(rows) * self.width_mm / f64::from(width_px)
    }
}

/// A horizontal band of the source bitmap emitted as one page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageSlice {
    /// Zero based page index.
    pub index: usize,
    /// First source row of the band.
    pub y: u32,
    /// Number of source rows in the band.
    pub height: u32,
}

/// Result of planning the pages of a bitmap.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PagePlan {
    pub slices: Vec<PageSlice>,
    /// Whether [`MAX_PAGES`] cut the plan short.
    pub truncated: bool,
}

/// Plans the page slices of a `width_px` x `height_px` bitmap.
///
/// Slice boundaries fall on `floor(k * P)` where `P` is the page height in
/// source rows, clamped to the bitmap height, which yields `ceil(H / P)`
/// contiguous slices.  A bitmap with no width or height has no pages.
pub fn plan_pages(width_px: u32, height_px: u32, format: PageFormat) -> PagePlan {
    let mut plan = PagePlan::default();
    if width_px == 0 || height_px == 0 {
        return plan;
    }

    let page_px = format.page_height_px_exact(width_px);
    let mut y = 0u32;
    while y < height_px {
        if plan.slices.len() == MAX_PAGES {
            warn!(
                "Report bitmap needs more than {} pages; stopping at row {} of {}",
                MAX_PAGES, y, height_px
            );
            plan.truncated = true;
            break;
        }

        let index = plan.slices.len();
        let boundary = ((index + 1) as f64 * page_px).floor();
        let end = if boundary >= f64::from(height_px) {
            height_px
        } else {
            (boundary as u32).max(y + 1)
        };

        plan.slices.push(PageSlice {
            index,
            y,
            height: end - y,
        });
        y = end;
    }

    plan
}

/// Copies one slice of `bitmap` into a fresh image of the same width.
pub fn slice_bitmap(bitmap: &RgbaImage, slice: PageSlice) -> RgbaImage {
    image::imageops::crop_imm(bitmap, 0, slice.y, bitmap.width(), slice.height).to_image()
}

/// Composites `image` onto an opaque background colour.
pub fn flatten(image: &RgbaImage, background: Rgba<u8>) -> RgbImage {
    let [br, bg, bb, _] = background.0;
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b, a] = image.get_pixel(x, y).0;
        let alpha = u32::from(a);
        let blend = |fg: u8, bgc: u8| -> u8 {
            ((u32::from(fg) * alpha + u32::from(bgc) * (255 - alpha) + 127) / 255) as u8
        };
        Rgb([blend(r, br), blend(g, bg), blend(b, bb)])
    })
}

/// Errors raised while assembling the PDF.
#[derive(Debug)]
pub enum PaginateError {
    /// The bitmap has no pixels.
    EmptyBitmap,
    /// The PDF document could not be serialized.
    Save(String),
}

impl fmt::Display for PaginateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyBitmap => write!(f, "Cannot paginate an empty bitmap"),
            Self::Save(message) => write!(f, "Failed to serialize PDF document: {message}"),
        }
    }
}

impl std::error::Error for PaginateError {}

/// A serialized PDF together with its page count.
#[derive(Clone, Debug)]
pub struct AssembledPdf {
    pub bytes: Vec<u8>,
    pub page_count: usize,
    pub truncated: bool,
}

/// Builds an image-only PDF from `bitmap`, one page per planned slice.
pub fn assemble_pdf(
    bitmap: &RgbaImage,
    format: PageFormat,
    title: &str,
    background: Rgba<u8>,
) -> Result<AssembledPdf, PaginateError> {
    let (width_px, height_px) = bitmap.dimensions();
    let plan = plan_pages(width_px, height_px, format);
    if plan.slices.is_empty() {
        return Err(PaginateError::EmptyBitmap);
    }

    let page_width = Mm(format.width_mm);
    let page_height = Mm(format.height_mm);
    let (document, first_page, first_layer) =
        PdfDocument::new(title, page_width, page_height, "Page 1");
    // Renders the bitmap at exactly the page width.
    let dpi = f64::from(width_px) * MM_PER_INCH / format.width_mm;

    for slice in &plan.slices {
        let layer = if slice.index == 0 {
            document.get_page(first_page).get_layer(first_layer)
        } else {
            let name = format!("Page {}", slice.index + 1);
            let (page, layer) = document.add_page(page_width, page_height, &name);
            document.get_page(page).get_layer(layer)
        };

        let band = flatten(&slice_bitmap(bitmap, *slice), background);
        let band_height_mm = format.rows_to_mm(slice.height, width_px);
        debug!(
            "Page {}: rows {}..{} ({:.1} mm)",
            slice.index + 1,
            slice.y,
            slice.y + slice.height,
            band_height_mm
        );

        let image = Image::from_dynamic_image(&DynamicImage::ImageRgb8(band));
        image.add_to_layer(
            layer,
            Some(Mm(0.0)),
            Some(Mm(format.height_mm - band_height_mm)),
            None,
            None,
            None,
            Some(dpi),
        );
    }

    let mut bytes = Vec::new();
    {
        let mut writer = BufWriter::new(&mut bytes);
        document
            .save(&mut writer)
            .map_err(|err| PaginateError::Save(format!("{err:?}")))?;
        writer
            .flush()
            .map_err(|err| PaginateError::Save(err.to_string()))?;
    }

    Ok(AssembledPdf {
        bytes,
        page_count: plan.slices.len(),
        truncated: plan.truncated,
    })
}

/// File name of a downloaded report: `report-<period>-<YYYY-MM-DD>.pdf`.
pub fn report_file_name(period: &str, date: NaiveDate) -> String {
    let period: String = period
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("report-{}-{}.pdf", period, date.format("%Y-%m-%d"))
}
