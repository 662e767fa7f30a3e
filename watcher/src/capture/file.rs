use std::path::PathBuf;

use async_trait::async_trait;
use board_watch_common::config::Region;
use board_watch_common::frame::{decode_frame, CapturedFrame};
use tracing::debug;

use super::{crop_region, next_seq, CaptureError, CaptureSource};

/// Re-reads an image file on every capture. Useful when another tool keeps
/// overwriting a screenshot of the board.
pub struct FileCapture {
    path: PathBuf,
    region: Option<Region>,
}

impl FileCapture {
    pub fn new(path: PathBuf, region: Option<Region>) -> Self {
        Self { path, region }
    }
}

#[async_trait]
impl CaptureSource for FileCapture {
    async fn capture(&mut self) -> Result<CapturedFrame, CaptureError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| CaptureError::Read(self.path.display().to_string(), e))?;
        let frame = decode_frame(&bytes, next_seq())?;
        debug!(
            path = %self.path.display(),
            seq = frame.seq,
            width = frame.image.width(),
            height = frame.image.height(),
            "captured frame from file"
        );
        crop_region(frame, self.region.as_ref())
    }

    fn name(&self) -> &str {
        "file"
    }
}
