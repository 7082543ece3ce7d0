//! Local image preflight: content-based format detection and a dimension
//! probe, run before anything is sent to the backend.

use image::{ImageFormat, ImageReader};
use rollcall_core::ImagePayload;
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;

/// Formats the backend accepts.
pub const ALLOWED_FORMATS: [ImageFormat; 2] = [ImageFormat::Png, ImageFormat::Jpeg];

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}: not a recognizable image")]
    Unrecognized(String),
    #[error("{name}: unsupported image type {format:?} (need PNG or JPEG)")]
    UnsupportedFormat { name: String, format: ImageFormat },
    #[error("{name}: corrupt image: {reason}")]
    Corrupt { name: String, reason: String },
}

/// A checked image, ready for upload.
#[derive(Debug, Clone)]
pub struct Preflight {
    pub payload: ImagePayload,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

/// Read and check an image file.
pub fn load_image(path: &Path) -> Result<Preflight, ImageError> {
    let bytes = std::fs::read(path).map_err(|source| ImageError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    inspect(name, bytes)
}

/// Check in-memory image bytes.
///
/// The format comes from the content, not the name. The file name is given
/// a matching extension if it lacks one, since the backend filters on it.
pub fn inspect(file_name: String, bytes: Vec<u8>) -> Result<Preflight, ImageError> {
    let format = image::guess_format(&bytes).map_err(|_| ImageError::Unrecognized(file_name.clone()))?;
    if !ALLOWED_FORMATS.contains(&format) {
        return Err(ImageError::UnsupportedFormat {
            name: file_name,
            format,
        });
    }

    let (width, height) = ImageReader::with_format(Cursor::new(bytes.as_slice()), format)
        .into_dimensions()
        .map_err(|e| ImageError::Corrupt {
            name: file_name.clone(),
            reason: e.to_string(),
        })?;

    let file_name = with_extension(file_name, format);
    tracing::debug!(file = %file_name, ?format, width, height, "image preflight passed");

    Ok(Preflight {
        payload: ImagePayload::new(file_name, format.to_mime_type(), bytes),
        format,
        width,
        height,
    })
}

fn with_extension(file_name: String, format: ImageFormat) -> String {
    let extensions = format.extensions_str();
    let has_extension = Path::new(&file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false);

    match extensions.first() {
        Some(ext) if !has_extension => format!("{file_name}.{ext}"),
        _ => file_name,
    }
}
