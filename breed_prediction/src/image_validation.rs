use image::{ImageFormat, ImageReader, Limits, RgbImage};
use std::io::Cursor;
use thiserror::Error;

/// Largest accepted upload, in bytes.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
/// Largest accepted width or height of the decoded image.
pub const MAX_IMAGE_DIMENSION: u32 = 8192;
/// Upper bound on the decoder's pixel buffer. A 4032x3024 RGBA photo fits.
pub const MAX_DECODED_BYTES: u64 = 48 * 1024 * 1024;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Error, Debug, PartialEq)]
pub enum ImageError {
    #[error("Unsupported file format '{0}'. Supported formats: image/jpeg, image/jpg, image/png")]
    InvalidFormat(String),
    #[error(
        "File too large. Maximum size allowed: {max_mb:.1}MB",
        max_mb = MAX_IMAGE_BYTES as f64 / BYTES_PER_MB
    )]
    PayloadTooLarge { size: usize },
    #[error(
        "Image dimensions too large: {0}. Maximum allowed: {max}x{max} pixels",
        max = MAX_IMAGE_DIMENSION
    )]
    DimensionsTooLarge(String),
    #[error("Invalid image file or corrupted image: {0}")]
    CorruptImage(String),
}

/// An uploaded file as received by the request handler.
#[derive(Debug)]
pub struct UploadedImage<'a> {
    pub bytes: &'a [u8],
    pub content_type: Option<&'a str>,
    pub declared_size: Option<usize>,
}

impl<'a> UploadedImage<'a> {
    pub fn new(bytes: &'a [u8], content_type: Option<&'a str>) -> Self {
        Self {
            bytes,
            content_type,
            declared_size: None,
        }
    }

    pub fn validate_and_decode(&self) -> Result<RgbImage, ImageError> {
        validate_and_decode(self.bytes, self.content_type, self.declared_size)
    }
}

/// Maps a declared MIME type onto the decoder used for it. Parameters after
/// `;` are ignored.
pub fn supported_format(content_type: &str) -> Option<ImageFormat> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match mime.as_str() {
        "image/jpeg" | "image/jpg" => Some(ImageFormat::Jpeg),
        "image/png" => Some(ImageFormat::Png),
        _ => None,
    }
}

/// Checks the declared type, then the size, then decodes with the declared
/// format. Grayscale and alpha channels are collapsed to RGB.
pub fn validate_and_decode(
    bytes: &[u8],
    declared_content_type: Option<&str>,
    declared_size: Option<usize>,
) -> Result<RgbImage, ImageError> {
    let format = declared_content_type
        .and_then(supported_format)
        .ok_or_else(|| {
            ImageError::InvalidFormat(declared_content_type.unwrap_or("missing").to_string())
        })?;

    let size = bytes.len().max(declared_size.unwrap_or(0));
    if size > MAX_IMAGE_BYTES {
        return Err(ImageError::PayloadTooLarge { size });
    }

    if bytes.is_empty() {
        return Err(ImageError::CorruptImage("empty file".into()));
    }

    let mut reader = ImageReader::with_format(Cursor::new(bytes), format);
    reader.limits(decode_limits());

    let decoded = reader.decode().map_err(|e| match e {
        image::ImageError::Limits(limit) => ImageError::DimensionsTooLarge(limit.to_string()),
        other => ImageError::CorruptImage(other.to_string()),
    })?;

    Ok(decoded.into_rgb8())
}

/// Bounds on the decoded image, independent of the compressed size.
fn decode_limits() -> Limits {
    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_IMAGE_DIMENSION);
    limits.max_image_height = Some(MAX_IMAGE_DIMENSION);
    limits.max_alloc = Some(MAX_DECODED_BYTES);
    limits
}
