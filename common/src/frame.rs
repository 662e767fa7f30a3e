use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};

/// A captured board image with timestamp metadata.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub image: RgbImage,
    pub captured_at_ms: i64,
    pub seq: u64,
}

impl CapturedFrame {
    pub fn new(image: RgbImage, captured_at_ms: i64, seq: u64) -> Self {
        Self {
            image,
            captured_at_ms,
            seq,
        }
    }

    /// Build a frame from any decoded image, stamping it with the current time.
    pub fn now(image: DynamicImage, seq: u64) -> Self {
        Self::new(image.to_rgb8(), chrono::Utc::now().timestamp_millis(), seq)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Square RGB copy of the frame at `size`x`size`, the input shape of the
    /// pixel gate and the classifier.
    pub fn normalized(&self, size: u32) -> RgbImage {
        if self.image.dimensions() == (size, size) {
            return self.image.clone();
        }
        image::imageops::resize(&self.image, size, size, FilterType::Triangle)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("image is empty ({width}x{height})")]
    Empty { width: u32, height: u32 },
}

/// Decode encoded image bytes (PNG, JPEG, ...) into a frame.
pub fn decode_frame(bytes: &[u8], seq: u64) -> Result<CapturedFrame, FrameError> {
    let image = image::load_from_memory(bytes)?;
    if image.width() == 0 || image.height() == 0 {
        return Err(FrameError::Empty {
            width: image.width(),
            height: image.height(),
        });
    }
    Ok(CapturedFrame::now(image, seq))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb};
    use std::io::Cursor;

    fn checkerboard(size: u32) -> RgbImage {
        RgbImage::from_fn(size, size, |x, y| {
            if (x / 8 + y / 8) % 2 == 0 {
                Rgb([234, 233, 220])
            } else {
                Rgb([139, 115, 85])
            }
        })
    }

    #[test]
    fn normalized_resizes_to_square() {
        let frame = CapturedFrame::new(RgbImage::new(640, 480), 0, 1);
        assert_eq!(frame.normalized(256).dimensions(), (256, 256));
    }

    #[test]
    fn normalized_keeps_matching_size() {
        let image = checkerboard(64);
        let frame = CapturedFrame::new(image.clone(), 0, 1);
        assert_eq!(frame.normalized(64), image);
    }

    #[test]
    fn decode_png_bytes() {
        let mut png = Vec::new();
        DynamicImage::ImageRgb8(checkerboard(32))
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();
        let frame = decode_frame(&png, 7).unwrap();
        assert_eq!(frame.dimensions(), (32, 32));
        assert_eq!(frame.seq, 7);
    }

    #[test]
    fn decode_garbage_fails() {
        assert!(matches!(
            decode_frame(&[0, 1, 2, 3], 0),
            Err(FrameError::Decode(_))
        ));
    }
}
