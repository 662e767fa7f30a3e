use std::io::Cursor;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use board_watch_common::position::Color;
use image::{DynamicImage, ImageFormat, RgbImage};
use tokio::process::Command;
use tracing::{debug, warn};

use super::BoardClassifier;

static INSTANCE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Runs an external predictor once per frame.
///
/// The frame is written to a temporary PNG and the program is invoked as
/// `<program> <args...> <png path> <w|b>`. The first non-empty stdout line is
/// the raw FEN.
pub struct CommandClassifier {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    frame_path: PathBuf,
}

impl CommandClassifier {
    pub fn new(program: String, args: Vec<String>, timeout: Duration) -> Self {
        let instance = INSTANCE_COUNTER.fetch_add(1, Ordering::Relaxed);
        let frame_path = std::env::temp_dir().join(format!(
            "board_watch_frame_{}_{instance}.png",
            std::process::id()
        ));
        Self {
            program,
            args,
            timeout,
            frame_path,
        }
    }

    async fn run(&self, image: &RgbImage, side_hint: Color) -> Result<String, String> {
        let mut png = Vec::new();
        DynamicImage::ImageRgb8(image.clone())
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| format!("failed to encode frame: {e}"))?;
        tokio::fs::write(&self.frame_path, &png)
            .await
            .map_err(|e| format!("failed to write {}: {e}", self.frame_path.display()))?;

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(&self.frame_path)
            .arg(side_hint.fen_char().to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| format!("predictor timed out after {:?}", self.timeout))?
            .map_err(|e| format!("failed to run {}: {e}", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("predictor exited with {}: {}", output.status, stderr.trim()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or_default()
            .to_string())
    }
}

#[async_trait]
impl BoardClassifier for CommandClassifier {
    async fn classify(&self, image: &RgbImage, side_hint: Color) -> String {
        match self.run(image, side_hint).await {
            Ok(raw) => {
                debug!(raw, "predictor output");
                raw
            }
            Err(e) => {
                warn!(error = e, program = self.program, "board classification failed");
                String::new()
            }
        }
    }

    fn name(&self) -> &str {
        "command"
    }
}
