//! Rasterization of an attached report document into a single bitmap.

use std::env;
use std::ffi::OsString;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use image::{Rgba, RgbaImage};
use log::{debug, info, warn};

use crate::offscreen::OffscreenFrame;
use crate::paginate::{PageFormat, MAX_PAGES};

/// Environment variable pointing at a Chrome or Chromium executable.
pub const CHROME_PATH_ENV: &str = "REPORT_CHROME_PATH";

const CHROME_CANDIDATES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "chrome",
    "msedge",
];

const SCREENSHOT_FILE_NAME: &str = "capture.png";

/// Settings applied when capturing a frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CaptureOptions {
    /// Device pixel ratio of the capture.
    pub scale: f64,
    /// Colour used behind transparent content.
    pub background: Rgba<u8>,
    /// Layout width in CSS pixels.
    pub viewport_width: u32,
    /// Layout height, in CSS pixels, of the first capture attempt.
    pub viewport_height: u32,
    /// Tallest layout height, in CSS pixels, that will be captured.
    pub max_viewport_height: u32,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        // 210mm x 297mm at 96 dpi
        let page_height = 1123;
        Self {
            scale: 2.0,
            background: Rgba([255, 255, 255, 255]),
            viewport_width: 794,
            viewport_height: page_height * 8,
            max_viewport_height: page_height * MAX_PAGES as u32,
        }
    }
}

impl CaptureOptions {
    /// Pixel width of the captured bitmap.
    pub fn pixel_width(&self) -> u32 {
        (f64::from(self.viewport_width) * self.scale).round() as u32
    }

    /// Viewport height to retry with after a capture at `current` was clipped.
    ///
    /// `None` once the maximum height has been tried.
    pub fn next_viewport_height(&self, current: u32) -> Option<u32> {
        (current < self.max_viewport_height)
            .then(|| current.saturating_mul(2).min(self.max_viewport_height))
    }
}

/// Bitmap of a captured document.
#[derive(Clone, Debug)]
pub struct Capture {
    pub bitmap: RgbaImage,
    /// Whether content continued below the captured area.
    pub clipped: bool,
}

impl Capture {
    /// A capture holding the whole document.
    pub fn complete(bitmap: RgbaImage) -> Self {
        Self {
            bitmap,
            clipped: false,
        }
    }
}

/// Errors raised while capturing a frame.
#[derive(Debug)]
pub enum RasterError {
    /// No browser executable could be found.
    BrowserNotFound { searched: Vec<String> },
    /// The browser could not be started or exited unsuccessfully.
    Browser { message: String, source: Option<io::Error> },
    /// The captured image could not be read back.
    Image(image::ImageError),
    /// The capture produced no pixels.
    Empty,
}

impl fmt::Display for RasterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BrowserNotFound { searched } => write!(
                f,
                "No Chrome/Chromium executable found. Checked: {}. Set {} to the browser path.",
                searched.join(", "),
                CHROME_PATH_ENV
            ),
            Self::Browser { message, .. } => write!(f, "Headless browser failed: {message}"),
            Self::Image(err) => write!(f, "Failed to read captured bitmap: {err}"),
            Self::Empty => write!(f, "Capture produced an empty bitmap"),
        }
    }
}

impl std::error::Error for RasterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Browser {
                source: Some(err), ..
            } => Some(err),
            Self::Image(err) => Some(err),
            _ => None,
        }
    }
}

impl From<image::ImageError> for RasterError {
    fn from(err: image::ImageError) -> Self {
        Self::Image(err)
    }
}

/// Turns an attached document into one bitmap of the whole report.
pub trait Rasterizer {
    /// Captures the document in `frame`. The bitmap may be taller than one page.
    fn capture(&self, frame: &OffscreenFrame, options: &CaptureOptions)
        -> Result<Capture, RasterError>;
}

/// Rasterizer driving a headless Chrome or Chromium browser.
#[derive(Clone, Debug)]
pub struct ChromeRasterizer {
    executable: PathBuf,
    extra_args: Vec<OsString>,
}

impl ChromeRasterizer {
    /// Uses the browser at `executable`.
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            extra_args: Vec::new(),
        }
    }

    /// Locates a browser through [`CHROME_PATH_ENV`] or the `PATH`.
    pub fn discover() -> Result<Self, RasterError> {
        let mut searched = Vec::new();

        if let Some(path) = env::var_os(CHROME_PATH_ENV).filter(|value| !value.is_empty()) {
            let path = PathBuf::from(path);
            if path.is_file() {
                return Ok(Self::new(path));
            }
            searched.push(path.display().to_string());
        }

        if let Some(paths) = env::var_os("PATH") {
            for dir in env::split_paths(&paths) {
                for name in CHROME_CANDIDATES {
                    let candidate = executable_in(&dir, name);
                    if candidate.is_file() {
                        info!("Using headless browser at {}", candidate.display());
                        return Ok(Self::new(candidate));
                    }
                }
            }
            searched.push(format!("{} on PATH", CHROME_CANDIDATES.join("/")));
        }

        Err(RasterError::BrowserNotFound { searched })
    }

    /// Appends an extra command line argument passed to every browser run.
    pub fn with_arg(mut self, arg: impl Into<OsString>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    /// Path of the browser executable.
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    fn command(
        &self,
        frame: &OffscreenFrame,
        options: &CaptureOptions,
        viewport_height: u32,
        output: &Path,
    ) -> Command {
        let mut command = Command::new(&self.executable);
        command
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--hide-scrollbars")
            .arg("--no-first-run")
            .arg("--allow-file-access-from-files")
            .arg(format!("--force-device-scale-factor={}", options.scale))
            .arg(format!(
                "--default-background-color={}",
                hex_rgba(options.background)
            ))
            .arg(format!(
                "--window-size={},{}",
                options.viewport_width, viewport_height
            ))
            .arg(format!("--screenshot={}", output.display()))
            .args(&self.extra_args)
            .arg(frame.document_url());
        command
    }

    fn screenshot(
        &self,
        frame: &OffscreenFrame,
        options: &CaptureOptions,
        viewport_height: u32,
    ) -> Result<RgbaImage, RasterError> {
        let output = frame.dir().join(SCREENSHOT_FILE_NAME);
        let mut command = self.command(frame, options, viewport_height, &output);
        debug!("Running {:?}", command);

        let result = command.output().map_err(|err| RasterError::Browser {
            message: format!("could not start {}", self.executable.display()),
            source: Some(err),
        })?;

        if !result.status.success() || !output.is_file() {
            return Err(RasterError::Browser {
                message: format!(
                    "{} exited with {}: {}",
                    self.executable.display(),
                    result.status,
                    String::from_utf8_lossy(&result.stderr).trim()
                ),
                source: None,
            });
        }

        Ok(image::open(&output)?.to_rgba8())
    }
}

impl Rasterizer for ChromeRasterizer {
    fn capture(
        &self,
        frame: &OffscreenFrame,
        options: &CaptureOptions,
    ) -> Result<Capture, RasterError> {
        let mut viewport_height = options.viewport_height.min(options.max_viewport_height);
        loop {
            let captured = self.screenshot(frame, options, viewport_height)?;
            let clipped = reaches_bottom(&captured, options.background);

            if clipped {
                if let Some(next) = options.next_viewport_height(viewport_height) {
                    debug!(
                        "Content reaches the bottom of a {} px viewport, retrying at {} px",
                        viewport_height, next
                    );
                    viewport_height = next;
                    continue;
                }
                warn!(
                    "Report content extends past {} CSS px and was clipped",
                    viewport_height
                );
            }

            let min_height = PageFormat::A4.page_height_px(captured.width());
            let bitmap = trim_to_content(captured, options.background, min_height);
            if bitmap.width() == 0 || bitmap.height() == 0 {
                return Err(RasterError::Empty);
            }
            return Ok(Capture { bitmap, clipped });
        }
    }
}

fn executable_in(dir: &Path, name: &str) -> PathBuf {
    if cfg!(windows) {
        dir.join(format!("{name}.exe"))
    } else {
        dir.join(name)
    }
}

fn hex_rgba(color: Rgba<u8>) -> String {
    let [r, g, b, a] = color.0;
    format!("{r:02x}{g:02x}{b:02x}{a:02x}")
}

/// Whether the last row of `image` holds anything but `background`, meaning
/// the document probably continues below the captured area.
pub fn reaches_bottom(image: &RgbaImage, background: Rgba<u8>) -> bool {
    let (width, height) = image.dimensions();
    height > 0 && (0..width).any(|x| *image.get_pixel(x, height - 1) != background)
}

/// Cuts trailing rows that only contain `background`.
///
/// The result keeps at least `min_height` rows (or the full image when it is
/// shorter), since a fixed-size viewport is always taller than the content.
pub fn trim_to_content(image: RgbaImage, background: Rgba<u8>, min_height: u32) -> RgbaImage {
    let (width, height) = image.dimensions();
    let last_content_row = (0..height)
        .rev()
        .find(|&y| (0..width).any(|x| *image.get_pixel(x, y) != background));

    let content_height = last_content_row.map_or(0, |row| row + 1);
    let target = content_height.max(min_height).min(height);
    if target == height {
        return image;
    }

    image::imageops::crop_imm(&image, 0, 0, width, target).to_image()
}
