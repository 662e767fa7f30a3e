use image::RgbImage;

/// Scene-change filter run on every normalized board frame before the
/// (expensive) classifier.
pub trait FrameFilter: Send + Sync {
    /// Returns `true` if the frame differs from the previous one and should be
    /// classified. Returns `false` to skip the cycle (board unchanged).
    fn has_changed(&mut self, frame: &RgbImage) -> bool;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}
