use async_trait::async_trait;
use board_watch_common::config::Region;
use board_watch_common::frame::CapturedFrame;
use image::{DynamicImage, RgbaImage};
use screenshots::Screen;
use tracing::debug;

use super::{next_seq, CaptureError, CaptureSource};

/// Captures a fixed region of the display that contains the region's top-left corner.
pub struct ScreenCapture {
    region: Region,
}

impl ScreenCapture {
    pub fn new(region: Region) -> Self {
        Self { region }
    }
}

fn capture_blocking(region: Region) -> Result<RgbaImage, CaptureError> {
    let screen = Screen::from_point(region.x, region.y)
        .map_err(|e| CaptureError::Screen(e.to_string()))?;
    let info = screen.display_info;
    let shot = screen
        .capture_area(
            region.x - info.x,
            region.y - info.y,
            region.width,
            region.height,
        )
        .map_err(|e| CaptureError::Screen(e.to_string()))?;

    // screenshots re-exports its own image version; go through raw bytes.
    let (width, height) = (shot.width(), shot.height());
    RgbaImage::from_raw(width, height, shot.into_raw())
        .ok_or_else(|| CaptureError::Screen("screenshot buffer has unexpected length".into()))
}

#[async_trait]
impl CaptureSource for ScreenCapture {
    async fn capture(&mut self) -> Result<CapturedFrame, CaptureError> {
        let region = self.region;
        let image = tokio::task::spawn_blocking(move || capture_blocking(region))
            .await
            .map_err(|e| CaptureError::Screen(e.to_string()))??;
        let frame = CapturedFrame::now(DynamicImage::ImageRgba8(image), next_seq());
        debug!(seq = frame.seq, ?region, "captured screen region");
        Ok(frame)
    }

    fn name(&self) -> &str {
        "screen"
    }
}
