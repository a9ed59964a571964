//! Image source response types.

use image::ImageFormat;

use crate::error::{ImageGenError, ImageGenResult};

/// Image bytes returned by the upstream, with the sniffed format.
#[derive(Debug, Clone)]
pub struct FrameImage {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
}

impl FrameImage {
    /// Sniff the format from magic bytes; anything unrecognised is rejected.
    pub fn from_bytes(bytes: Vec<u8>) -> ImageGenResult<Self> {
        if bytes.is_empty() {
            return Err(ImageGenError::InvalidImage("empty body".to_string()));
        }

        let format = image::guess_format(&bytes).map_err(|e| ImageGenError::InvalidImage(e.to_string()))?;
        Ok(Self { bytes, format })
    }

    /// File extension for the sniffed format.
    pub fn extension(&self) -> &'static str {
        self.format.extensions_str().first().copied().unwrap_or("img")
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

    #[test]
    fn test_sniff_png() {
        let image = FrameImage::from_bytes(PNG_MAGIC.to_vec()).unwrap();
        assert_eq!(image.format, ImageFormat::Png);
        assert_eq!(image.extension(), "png");
    }

    #[test]
    fn test_sniff_jpeg() {
        let image = FrameImage::from_bytes(JPEG_MAGIC.to_vec()).unwrap();
        assert_eq!(image.format, ImageFormat::Jpeg);
        assert_eq!(image.extension(), "jpg");
    }

    #[test]
    fn test_rejects_html_and_empty() {
        assert!(matches!(
            FrameImage::from_bytes(b"<html>busy</html>".to_vec()),
            Err(ImageGenError::InvalidImage(_))
        ));
        assert!(FrameImage::from_bytes(Vec::new()).is_err());
    }
}
