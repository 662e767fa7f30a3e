use image::RgbImage;
use tracing::debug;

use super::traits::FrameFilter;

/// Exact pixel-difference gate.
///
/// A frame is "changed" if any pixel differs from the immediately preceding
/// frame (or the dimensions differ). The first frame always counts as changed.
/// The cache is replaced on every call, so comparisons are always against the
/// previous frame rather than the last changed one.
#[derive(Default)]
pub struct PixelChangeGate {
    last_frame: Option<RgbImage>,
}

impl PixelChangeGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently seen frame.
    pub fn last_frame(&self) -> Option<&RgbImage> {
        self.last_frame.as_ref()
    }

    /// Number of differing pixels, or `None` when the dimensions do not match.
    fn diff_count(prev: &RgbImage, next: &RgbImage) -> Option<usize> {
        if prev.dimensions() != next.dimensions() {
            return None;
        }
        Some(
            prev.pixels()
                .zip(next.pixels())
                .filter(|(a, b)| a != b)
                .count(),
        )
    }
}

impl FrameFilter for PixelChangeGate {
    fn has_changed(&mut self, frame: &RgbImage) -> bool {
        let changed = match &self.last_frame {
            None => {
                debug!("first frame, treating board as changed");
                true
            }
            Some(prev) => match Self::diff_count(prev, frame) {
                Some(differing) => {
                    debug!(differing, "pixel comparison");
                    differing > 0
                }
                None => {
                    debug!(
                        prev = ?prev.dimensions(),
                        next = ?frame.dimensions(),
                        "frame size changed"
                    );
                    true
                }
            },
        };
        self.last_frame = Some(frame.clone());
        changed
    }

    fn name(&self) -> &str {
        "pixel"
    }
}
