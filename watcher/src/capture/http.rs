use std::time::Duration;

use async_trait::async_trait;
use board_watch_common::config::Region;
use board_watch_common::frame::{decode_frame, CapturedFrame};
use tracing::debug;

use super::{crop_region, next_seq, CaptureError, CaptureSource};

/// Polls a URL that serves a single screenshot (PNG or JPEG) per request.
pub struct HttpSnapshotCapture {
    client: reqwest::Client,
    url: String,
    region: Option<Region>,
}

impl HttpSnapshotCapture {
    pub fn new(url: String, region: Option<Region>, timeout: Duration) -> Result<Self, CaptureError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            url,
            region,
        })
    }
}

#[async_trait]
impl CaptureSource for HttpSnapshotCapture {
    async fn capture(&mut self) -> Result<CapturedFrame, CaptureError> {
        let resp = self.client.get(&self.url).send().await?;
        if !resp.status().is_success() {
            return Err(CaptureError::HttpStatus(resp.status().as_u16()));
        }
        let bytes = resp.bytes().await?;
        let frame = decode_frame(&bytes, next_seq())?;
        debug!(
            url = self.url,
            seq = frame.seq,
            bytes = bytes.len(),
            "captured frame over HTTP"
        );
        crop_region(frame, self.region.as_ref())
    }

    fn name(&self) -> &str {
        "http"
    }
}
