pub mod pixel;
pub mod traits;

pub use pixel::PixelChangeGate;
pub use traits::FrameFilter;
