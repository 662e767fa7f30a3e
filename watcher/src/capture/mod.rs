pub mod file;
pub mod http;
#[cfg(feature = "screen")]
pub mod screen;

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use board_watch_common::config::{CaptureConfig, Region};
use board_watch_common::frame::{CapturedFrame, FrameError};

static SEQ_COUNTER: AtomicU64 = AtomicU64::new(0);

pub(crate) fn next_seq() -> u64 {
    SEQ_COUNTER.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("failed to read {0}: {1}")]
    Read(String, std::io::Error),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP status {0}")]
    HttpStatus(u16),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("region {region:?} lies outside the {width}x{height} capture")]
    RegionOutOfBounds {
        region: Region,
        width: u32,
        height: u32,
    },
    #[error("screen capture failed: {0}")]
    Screen(String),
    #[error("capture source '{0}' is not available in this build")]
    Unsupported(String),
}

/// Produces an image of the watched board region on demand.
#[async_trait]
pub trait CaptureSource: Send {
    async fn capture(&mut self) -> Result<CapturedFrame, CaptureError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}

/// Cut `region` out of a full capture. `None` keeps the frame as is.
pub fn crop_region(
    frame: CapturedFrame,
    region: Option<&Region>,
) -> Result<CapturedFrame, CaptureError> {
    let Some(region) = region else {
        return Ok(frame);
    };
    let (width, height) = frame.dimensions();
    let out_of_bounds = region.x < 0
        || region.y < 0
        || region.x as u64 + region.width as u64 > width as u64
        || region.y as u64 + region.height as u64 > height as u64;
    if out_of_bounds {
        return Err(CaptureError::RegionOutOfBounds {
            region: *region,
            width,
            height,
        });
    }
    let cropped = image::imageops::crop_imm(
        &frame.image,
        region.x as u32,
        region.y as u32,
        region.width,
        region.height,
    )
    .to_image();
    Ok(CapturedFrame::new(cropped, frame.captured_at_ms, frame.seq))
}

/// Build the capture source named by `config.source`.
pub fn from_config(config: &CaptureConfig) -> Result<Box<dyn CaptureSource>, CaptureError> {
    match config.source.as_str() {
        "file" => {
            let path = config
                .path
                .clone()
                .ok_or_else(|| CaptureError::Unsupported("file (no path)".into()))?;
            Ok(Box::new(file::FileCapture::new(path, config.region)))
        }
        "http" => {
            let url = config
                .url
                .clone()
                .ok_or_else(|| CaptureError::Unsupported("http (no url)".into()))?;
            Ok(Box::new(http::HttpSnapshotCapture::new(
                url,
                config.region,
                std::time::Duration::from_secs(config.request_timeout_secs),
            )?))
        }
        #[cfg(feature = "screen")]
        "screen" => {
            let region = config
                .region
                .ok_or_else(|| CaptureError::Unsupported("screen (no region)".into()))?;
            Ok(Box::new(screen::ScreenCapture::new(region)))
        }
        other => Err(CaptureError::Unsupported(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn frame(width: u32, height: u32) -> CapturedFrame {
        let image = RgbImage::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 0]));
        CapturedFrame::new(image, 1_000, 3)
    }

    #[test]
    fn crop_takes_region() {
        let region = Region {
            x: 10,
            y: 20,
            width: 30,
            height: 40,
        };
        let cropped = crop_region(frame(100, 100), Some(&region)).unwrap();
        assert_eq!(cropped.dimensions(), (30, 40));
        assert_eq!(cropped.image.get_pixel(0, 0), &Rgb([10, 20, 0]));
        assert_eq!(cropped.seq, 3);
        assert_eq!(cropped.captured_at_ms, 1_000);
    }

    #[test]
    fn crop_without_region_is_identity() {
        let cropped = crop_region(frame(12, 9), None).unwrap();
        assert_eq!(cropped.dimensions(), (12, 9));
    }

    #[test]
    fn crop_outside_image_fails() {
        let region = Region {
            x: 90,
            y: 0,
            width: 20,
            height: 20,
        };
        assert!(matches!(
            crop_region(frame(100, 100), Some(&region)),
            Err(CaptureError::RegionOutOfBounds { .. })
        ));

        let negative = Region {
            x: -1,
            y: 0,
            width: 5,
            height: 5,
        };
        assert!(crop_region(frame(100, 100), Some(&negative)).is_err());
    }

    #[test]
    fn seq_is_monotonic() {
        let a = next_seq();
        let b = next_seq();
        assert!(b > a);
    }
}
