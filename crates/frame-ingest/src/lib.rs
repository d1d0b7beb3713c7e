//! Frame acquisition and JPEG encoding for the ethcam appliance.
//!
//! The streaming core consumes hardware through the two capability traits
//! defined here. Production sources live alongside them:
//! - `synthetic`: paced RGB8 test-pattern frames backed by a recycling
//!   buffer pool.
//! - `jpegdir`: cycles pre-encoded JPEG files, the "sensor already delivers
//!   JPEG" path.
//! - `encode`: software JPEG encoding for sensor-native frames.

pub use encode::{EncodeError, SoftJpegEncoder};
pub use jpegdir::JpegDirSource;
pub use synthetic::SyntheticSource;
pub use types::{Frame, FrameFormat, SourceError};

mod encode;
mod jpegdir;
mod pacer;
mod pool;
mod synthetic;
mod types;

/// Capability handing frames to the streaming core.
///
/// Implementations own the frame-buffer memory. Every successful
/// [`acquire`](FrameSource::acquire) must be matched by exactly one
/// [`release`](FrameSource::release), error paths included.
pub trait FrameSource: Send + Sync {
    /// Block until the next frame is due and return it, or `None` when the
    /// source cannot produce one.
    fn acquire(&self) -> Option<Frame>;

    /// Return a frame's buffer to the source.
    fn release(&self, frame: Frame);
}

/// Capability converting a non-JPEG frame into a JPEG byte buffer.
pub trait FrameEncoder: Send + Sync {
    /// Encode `frame` at `quality` (1 to 100).
    fn encode(&self, frame: &Frame, quality: u8) -> Result<Vec<u8>, EncodeError>;
}
