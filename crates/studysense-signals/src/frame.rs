use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{DynamicImage, GrayImage, Luma, RgbImage};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("frame could not be decoded: {0}")]
    Image(#[from] image::ImageError),
    #[error("frame is empty")]
    Empty,
    #[error("pixel buffer does not match a {width}x{height} RGB frame")]
    BufferSize { width: u32, height: u32 },
}

/// A decoded camera frame, kept in both RGB (for skin segmentation) and
/// grayscale (for the openness estimators).
#[derive(Debug, Clone)]
pub struct Frame {
    rgb: RgbImage,
    gray: GrayImage,
}

impl Frame {
    /// Decode PNG or JPEG bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.is_empty() {
            return Err(FrameError::Empty);
        }
        let image = image::load_from_memory(bytes)?;
        Self::from_image(image)
    }

    /// Decode either raw base64 or a `data:image/...;base64,` URL.
    pub fn from_data_url(payload: &str) -> Result<Self, FrameError> {
        let encoded = payload
            .split_once(',')
            .map(|(_, data)| data)
            .unwrap_or(payload)
            .trim();
        if encoded.is_empty() {
            return Err(FrameError::Empty);
        }
        let bytes = STANDARD.decode(encoded)?;
        Self::decode(&bytes)
    }

    pub fn from_image(image: DynamicImage) -> Result<Self, FrameError> {
        Self::from_rgb_image(image.to_rgb8())
    }

    pub fn from_rgb_image(rgb: RgbImage) -> Result<Self, FrameError> {
        if rgb.width() == 0 || rgb.height() == 0 {
            return Err(FrameError::Empty);
        }
        let gray = bt601_luma(&rgb);
        Ok(Self { rgb, gray })
    }

    /// Build a frame from a tightly packed RGB8 buffer.
    pub fn from_rgb(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, FrameError> {
        let rgb = RgbImage::from_raw(width, height, pixels)
            .ok_or(FrameError::BufferSize { width, height })?;
        Self::from_rgb_image(rgb)
    }

    pub fn width(&self) -> u32 {
        self.rgb.width()
    }

    pub fn height(&self) -> u32 {
        self.rgb.height()
    }

    pub fn rgb(&self) -> &RgbImage {
        &self.rgb
    }

    pub fn gray(&self) -> &GrayImage {
        &self.gray
    }
}

/// BT.601 luma, rounded: `(299 r + 587 g + 114 b + 500) / 1000`.
fn bt601_luma(rgb: &RgbImage) -> GrayImage {
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let luma = (299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b) + 500) / 1000;
        Luma([luma as u8])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([10, 20, 30]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn test_decode_png() {
        let frame = Frame::decode(&png_bytes(8, 6)).unwrap();
        assert_eq!(frame.width(), 8);
        assert_eq!(frame.height(), 6);
        assert_eq!(frame.gray().dimensions(), (8, 6));
    }

    #[test]
    fn test_gray_uses_bt601_weights() {
        // red-heavy pixel lands above the openness brightness threshold
        let frame = Frame::from_rgb(1, 1, vec![200, 40, 40]).unwrap();
        assert_eq!(frame.gray().get_pixel(0, 0).0, [88]);

        let frame = Frame::from_rgb(2, 1, vec![255, 255, 255, 30, 30, 30]).unwrap();
        assert_eq!(frame.gray().get_pixel(0, 0).0, [255]);
        assert_eq!(frame.gray().get_pixel(1, 0).0, [30]);
    }

    #[test]
    fn test_data_url_prefix_is_stripped() {
        let encoded = STANDARD.encode(png_bytes(4, 4));
        let url = format!("data:image/png;base64,{encoded}");
        assert!(Frame::from_data_url(&url).is_ok());
        assert!(Frame::from_data_url(&encoded).is_ok());
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(matches!(
            Frame::from_data_url("data:image/png;base64,@@@@"),
            Err(FrameError::Base64(_))
        ));
        let not_an_image = STANDARD.encode(b"definitely not a png");
        assert!(matches!(
            Frame::from_data_url(&not_an_image),
            Err(FrameError::Image(_))
        ));
        assert!(matches!(Frame::decode(&[]), Err(FrameError::Empty)));
    }

    #[test]
    fn test_buffer_size_mismatch() {
        assert!(matches!(
            Frame::from_rgb(4, 4, vec![0; 10]),
            Err(FrameError::BufferSize { width: 4, height: 4 })
        ));
    }
}
