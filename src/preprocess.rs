//! Optional resize / grayscale conversion applied to uploads before they are
//! stored or looked up.

use std::io::Cursor;

use image::{imageops::FilterType, DynamicImage, ImageFormat};

use crate::store::StoreError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreprocessOptions {
    /// Exact target size as `(width, height)`.
    pub resize: Option<(u32, u32)>,
    pub grayscale: bool,
}

impl PreprocessOptions {
    pub fn is_noop(&self) -> bool {
        self.resize.is_none() && !self.grayscale
    }
}

/// Applies `opts` to `bytes` and re-encodes in the format implied by `extension`.
///
/// Without any operation the bytes are returned untouched and never decoded.
pub fn apply(bytes: Vec<u8>, extension: &str, opts: PreprocessOptions) -> Result<Vec<u8>, StoreError> {
    if opts.is_noop() {
        return Ok(bytes);
    }

    let format = ImageFormat::from_extension(extension)
        .ok_or_else(|| StoreError::DecodeFailure(format!("unsupported image format: {}", extension)))?;
    let mut img = image::load_from_memory(&bytes).map_err(|e| StoreError::DecodeFailure(e.to_string()))?;

    if let Some((width, height)) = opts.resize {
        img = img.resize_exact(width, height, FilterType::Lanczos3);
    }
    if opts.grayscale {
        img = img.grayscale();
    }
    // JPEG has no alpha channel
    if format == ImageFormat::Jpeg && img.color().has_alpha() {
        img = if opts.grayscale {
            DynamicImage::ImageLuma8(img.to_luma8())
        } else {
            DynamicImage::ImageRgb8(img.to_rgb8())
        };
    }

    let mut out = Cursor::new(Vec::with_capacity(bytes.len()));
    img.write_to(&mut out, format)
        .map_err(|e| StoreError::DecodeFailure(format!("failed to encode {}: {}", extension, e)))?;
    Ok(out.into_inner())
}
