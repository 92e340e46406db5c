//! Image preparation for vision sends
//!
//! Images ride the same socket as realtime audio, so they are re-encoded as
//! JPEG at a bounded quality to cap bandwidth regardless of source format.

use std::io::Cursor;

use crate::{Error, Result};

/// Decode any supported image format and re-encode as JPEG at `quality`
/// (1-100).
///
/// # Errors
///
/// Returns [`Error::Image`] if the input cannot be decoded or re-encoded
pub fn compress_jpeg(image_bytes: &[u8], quality: u8) -> Result<Vec<u8>> {
    let img = image::load_from_memory(image_bytes).map_err(|e| Error::Image(e.to_string()))?;

    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageOutputFormat::Jpeg(quality))
        .map_err(|e| Error::Image(e.to_string()))?;

    let bytes = out.into_inner();
    tracing::debug!(
        input_len = image_bytes.len(),
        output_len = bytes.len(),
        quality,
        "image compressed for send"
    );
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compresses_png_to_jpeg() {
        let img = image::RgbImage::from_pixel(32, 32, image::Rgb([200, 50, 50]));
        let mut png = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut png, image::ImageOutputFormat::Png)
            .unwrap();

        let jpeg = compress_jpeg(&png.into_inner(), 45).unwrap();
        // JPEG SOI marker
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn rejects_garbage_input() {
        assert!(matches!(
            compress_jpeg(&[0x00, 0x01, 0x02], 45),
            Err(Error::Image(_))
        ));
    }
}
