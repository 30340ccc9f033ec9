//! Loading of the report logo as an embeddable `data:` URL.
//!
//! Two strategies are tried in order.  The first reads the raw bytes and
//! passes them through unchanged when the image format can be recognised.
//! The second decodes the image with the [`image`] crate and re-encodes it as
//! PNG, which also covers files whose bytes could be read but not sniffed.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::ImageFormat;
use log::debug;

/// Logo path used when the caller does not provide one.
pub const DEFAULT_LOGO_PATH: &str = "/logo.png";

const REMOTE_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors produced when neither loading strategy succeeds.
#[derive(Debug)]
pub enum LogoError {
    /// The raw bytes could not be obtained.
    Fetch {
        location: String,
        source: io::Error,
    },
    /// The image could not be decoded or re-encoded.
    Decode {
        location: String,
        source: image::ImageError,
    },
    /// The bytes are an image format that cannot be embedded as is.
    UnsupportedFormat { location: String },
}

impl fmt::Display for LogoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch { location, source } => {
                write!(f, "Failed to fetch logo from {location}: {source}")
            }
            Self::Decode { location, source } => {
                write!(f, "Failed to decode logo from {location}: {source}")
            }
            Self::UnsupportedFormat { location } => {
                write!(f, "Logo at {location} is not a web image format")
            }
        }
    }
}

impl std::error::Error for LogoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Fetch { source, .. } => Some(source),
            Self::Decode { source, .. } => Some(source),
            Self::UnsupportedFormat { .. } => None,
        }
    }
}

/// Where a logo path points to once resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogoLocation {
    /// A file below the asset root.
    File(PathBuf),
    /// A remote image fetched over HTTP.
    Url(String),
}

impl LogoLocation {
    /// Resolves a web style logo path against the asset root.
    ///
    /// Relative paths are treated as web-root relative, so `logo.png` and
    /// `/logo.png` resolve to the same file.
    pub fn resolve(logo_path: &str, asset_root: &Path) -> Self {
        if logo_path.starts_with("http://") || logo_path.starts_with("https://") {
            return Self::Url(logo_path.to_owned());
        }

        let web_path = if logo_path.starts_with('/') {
            logo_path.to_owned()
        } else {
            format!("/{logo_path}")
        };
        Self::File(asset_root.join(web_path.trim_start_matches('/')))
    }
}

impl fmt::Display for LogoLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Url(url) => f.write_str(url),
        }
    }
}

/// Loads the logo at `logo_path` and returns it as a base64 `data:` URL.
pub fn load_logo(logo_path: &str, asset_root: &Path) -> Result<String, LogoError> {
    let location = LogoLocation::resolve(logo_path, asset_root);

    match fetch_as_data_url(&location) {
        Ok(url) => Ok(url),
        Err(err) => {
            debug!("Direct logo load failed ({err}); re-encoding through the image decoder");
            reencode_as_data_url(&location)
        }
    }
}

fn fetch_as_data_url(location: &LogoLocation) -> Result<String, LogoError> {
    let bytes = read_bytes(location)?;
    let format = image::guess_format(&bytes).map_err(|err| LogoError::Decode {
        location: location.to_string(),
        source: err,
    })?;
    let mime = mime_for(format).ok_or_else(|| LogoError::UnsupportedFormat {
        location: location.to_string(),
    })?;
    Ok(data_url(mime, &bytes))
}

fn reencode_as_data_url(location: &LogoLocation) -> Result<String, LogoError> {
    let decode_error = |source| LogoError::Decode {
        location: location.to_string(),
        source,
    };

    let decoded = match location {
        LogoLocation::File(path) => image::io::Reader::open(path)
            .map_err(|source| LogoError::Fetch {
                location: location.to_string(),
                source,
            })?
            .with_guessed_format()
            .map_err(|source| LogoError::Fetch {
                location: location.to_string(),
                source,
            })?
            .decode()
            .map_err(decode_error)?,
        LogoLocation::Url(_) => {
            let bytes = read_bytes(location)?;
            image::load_from_memory(&bytes).map_err(decode_error)?
        }
    };

    let mut png = Vec::new();
    decoded
        .write_to(&mut png, image::ImageOutputFormat::Png)
        .map_err(decode_error)?;
    Ok(data_url("image/png", &png))
}

fn read_bytes(location: &LogoLocation) -> Result<Vec<u8>, LogoError> {
    let fetch_error = |source| LogoError::Fetch {
        location: location.to_string(),
        source,
    };

    match location {
        LogoLocation::File(path) => std::fs::read(path).map_err(fetch_error),
        LogoLocation::Url(url) => {
            let to_io = |err: reqwest::Error| io::Error::new(io::ErrorKind::Other, err);
            let client = reqwest::blocking::Client::builder()
                .timeout(REMOTE_TIMEOUT)
                .build()
                .map_err(|err| fetch_error(to_io(err)))?;
            let response = client
                .get(url)
                .send()
                .and_then(|response| response.error_for_status())
                .map_err(|err| fetch_error(to_io(err)))?;
            let bytes = response.bytes().map_err(|err| fetch_error(to_io(err)))?;
            Ok(bytes.to_vec())
        }
    }
}

fn mime_for(format: ImageFormat) -> Option<&'static str> {
    let mime = match format {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::Gif => "image/gif",
        ImageFormat::WebP => "image/webp",
        ImageFormat::Bmp => "image/bmp",
        ImageFormat::Ico => "image/x-icon",
        _ => return None,
    };
    Some(mime)
}

/// Encodes `bytes` as a base64 `data:` URL with the given MIME type.
pub fn data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}
