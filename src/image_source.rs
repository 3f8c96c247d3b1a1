//! # Image Source
//!
//! Turns files on disk into [`PendingImage`] values. The format is detected
//! from magic bytes, never from the extension, and each format carries its
//! own size limit. Bad files are reported individually and never stop the
//! rest of the batch from loading.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use image::ImageFormat;
use tracing::{debug, warn};

use crate::errors::error_logging;
use crate::ocr_config::OcrConfig;
use crate::queue::PendingImage;

/// Why a single file was not loaded
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSourceError {
    /// File could not be opened or read
    Read { path: PathBuf, message: String },
    /// File is empty or shorter than the format signature
    TooShort { path: PathBuf, size: u64 },
    /// Magic bytes do not match an accepted image format
    UnsupportedFormat { path: PathBuf },
    /// File exceeds the limit for its format
    TooLarge { path: PathBuf, size: u64, limit: u64 },
}

impl std::fmt::Display for ImageSourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageSourceError::Read { path, message } => {
                write!(f, "[IMAGE_READ] {}: {}", path.display(), message)
            }
            ImageSourceError::TooShort { path, size } => write!(
                f,
                "[IMAGE_READ] {} is too short to be an image ({} bytes)",
                path.display(),
                size
            ),
            ImageSourceError::UnsupportedFormat { path } => {
                write!(f, "[IMAGE_FORMAT] {} is not a supported image", path.display())
            }
            ImageSourceError::TooLarge { path, size, limit } => write!(
                f,
                "[IMAGE_SIZE] {} is {} bytes, the limit for its format is {} bytes",
                path.display(),
                size,
                limit
            ),
        }
    }
}

impl std::error::Error for ImageSourceError {}

/// Files that loaded and files that did not, in input order
#[derive(Debug, Default)]
pub struct LoadReport {
    pub images: Vec<PendingImage>,
    pub failures: Vec<ImageSourceError>,
}

/// MIME type for an accepted format
pub fn mime_type(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::Bmp => "image/bmp",
        ImageFormat::Tiff => "image/tiff",
        ImageFormat::WebP => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Detect the image format from the leading bytes
pub fn detect_format(header: &[u8], config: &OcrConfig) -> Option<ImageFormat> {
    if header.len() < config.min_format_bytes {
        return None;
    }
    image::guess_format(header).ok()
}

/// Load one file, enforcing format detection and format-specific size limits
pub fn load_image(path: &Path, config: &OcrConfig) -> Result<PendingImage, ImageSourceError> {
    let read_error = |e: std::io::Error| ImageSourceError::Read {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let mut file = File::open(path).map_err(read_error)?;
    let size = file.metadata().map_err(read_error)?.len();

    let mut header = vec![0u8; config.buffer_size];
    let header_len = read_prefix(&mut file, &mut header).map_err(read_error)?;
    header.truncate(header_len);

    if header_len < config.min_format_bytes {
        return Err(ImageSourceError::TooShort {
            path: path.to_path_buf(),
            size,
        });
    }

    let format = detect_format(&header, config).ok_or_else(|| ImageSourceError::UnsupportedFormat {
        path: path.to_path_buf(),
    })?;
    let limit = config
        .format_limits
        .limit_for(format)
        .ok_or_else(|| ImageSourceError::UnsupportedFormat {
            path: path.to_path_buf(),
        })?;

    if size > limit {
        return Err(ImageSourceError::TooLarge {
            path: path.to_path_buf(),
            size,
            limit,
        });
    }

    let mut bytes = header;
    file.read_to_end(&mut bytes).map_err(read_error)?;

    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    debug!(name = %name, format = ?format, size = bytes.len(), "Loaded image");
    Ok(PendingImage::new(name, mime_type(format), bytes))
}

/// Load every path, collecting failures instead of stopping at the first
pub fn load_images<P: AsRef<Path>>(paths: &[P], config: &OcrConfig) -> LoadReport {
    let mut report = LoadReport::default();

    for path in paths {
        let path = path.as_ref();
        match load_image(path, config) {
            Ok(image) => report.images.push(image),
            Err(e) => {
                let file_size = std::fs::metadata(path).ok().map(|m| m.len());
                error_logging::log_filesystem_error(
                    &e,
                    "load_image",
                    Some(&path.display().to_string()),
                    file_size,
                );
                warn!(path = %path.display(), "Skipping file");
                report.failures.push(e);
            }
        }
    }

    report
}

/// Fill `buffer` as far as the file allows
fn read_prefix(file: &mut File, buffer: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match file.read(&mut buffer[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    fn write_temp(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(bytes).unwrap();
        path
    }

    #[test]
    fn test_detects_format_from_content() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = PNG_SIGNATURE.to_vec();
        bytes.extend_from_slice(&[0u8; 32]);
        // Extension is misleading on purpose
        let path = write_temp(&dir, "photo.jpg", &bytes);

        let image = load_image(&path, &OcrConfig::default()).unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.name, "photo.jpg");
        assert_eq!(image.bytes, bytes);
    }

    #[test]
    fn test_rejects_text_and_short_files() {
        let dir = tempfile::tempdir().unwrap();
        let text = write_temp(&dir, "notes.png", b"just some text, not an image at all");
        let short = write_temp(&dir, "tiny.png", &[0x89, b'P']);

        let config = OcrConfig::default();
        assert!(matches!(
            load_image(&text, &config),
            Err(ImageSourceError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            load_image(&short, &config),
            Err(ImageSourceError::TooShort { .. })
        ));
    }

    #[test]
    fn test_format_limit_applies() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = PNG_SIGNATURE.to_vec();
        bytes.extend_from_slice(&[0u8; 64]);
        let path = write_temp(&dir, "big.png", &bytes);

        let mut config = OcrConfig::default();
        config.format_limits.png_max = 16;
        assert!(matches!(
            load_image(&path, &config),
            Err(ImageSourceError::TooLarge { limit: 16, .. })
        ));
    }

    #[test]
    fn test_load_images_keeps_going() {
        let dir = tempfile::tempdir().unwrap();
        let mut png = PNG_SIGNATURE.to_vec();
        png.extend_from_slice(&[0u8; 16]);
        let good = write_temp(&dir, "a.png", &png);
        let missing = dir.path().join("missing.png");

        let report = load_images(&[good, missing], &OcrConfig::default());
        assert_eq!(report.images.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(report.failures[0], ImageSourceError::Read { .. }));
    }
}
