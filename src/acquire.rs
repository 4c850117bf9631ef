//! # Image Acquisition Module
//!
//! Obtains a raw ticket image (camera capture or file picker) and validates
//! it before anything downstream touches it. Acquisition failures abort the
//! attempt before any network call is made; there is no point spending quota
//! on an image that cannot be sent.

use image::GenericImageView;

use crate::errors::{TicketError, TicketResult};

/// Where the image came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    /// Live camera capture
    Camera,
    /// File picker / upload
    File,
}

/// A validated ticket image held by the active verification session.
///
/// Owned exclusively by one session; replaced wholesale on re-selection,
/// never mutated in place.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAsset {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub byte_length: u64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub source: ImageSource,
}

/// Validate and wrap a selected image.
///
/// The MIME type must start with `image/`; anything else is rejected with
/// the typed [`TicketError::InvalidFileType`] rather than an opaque panic.
/// Pixel dimensions are probed best-effort; a payload that does not decode
/// here still passes (the compressor is the stage that insists on decoding).
pub fn select(source: ImageSource, mime: &str, bytes: Vec<u8>) -> TicketResult<ImageAsset> {
    if !mime.starts_with("image/") {
        return Err(TicketError::InvalidFileType {
            mime: mime.to_string(),
        });
    }

    let byte_length = bytes.len() as u64;
    let dimensions = image::load_from_memory(&bytes)
        .ok()
        .map(|img| img.dimensions());

    Ok(ImageAsset {
        bytes,
        mime: mime.to_string(),
        byte_length,
        width: dimensions.map(|(w, _)| w),
        height: dimensions.map(|(_, h)| h),
        source,
    })
}

/// Read an image from disk, guessing the MIME type from the extension.
///
/// Used by the CLI; browser hosts hand us MIME-tagged bytes directly.
pub fn select_from_path(path: &std::path::Path) -> TicketResult<ImageAsset> {
    let mime = mime_from_extension(path);
    let bytes = std::fs::read(path).map_err(|e| TicketError::InvalidFileType {
        mime: format!("unreadable file {}: {}", path.display(), e),
    })?;
    select(ImageSource::File, &mime, bytes)
}

fn mime_from_extension(path: &std::path::Path) -> String {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg".to_string(),
        "png" => "image/png".to_string(),
        "webp" => "image/webp".to_string(),
        "heic" => "image/heic".to_string(),
        "gif" => "image/gif".to_string(),
        other => format!("application/{}", if other.is_empty() { "octet-stream" } else { other }),
    }
}
