use std::path::PathBuf;

use thiserror::Error;

/// One captured image buffer plus its pixel-format tag.
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp_ms: i64,
    pub format: FrameFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameFormat {
    /// Pre-encoded JPEG straight off the sensor path.
    Jpeg,
    /// Sensor-native packed 24-bit RGB.
    Rgb8,
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("no JPEG files found in {dir:?}")]
    EmptyDir { dir: PathBuf },
    #[error("unreadable image {path:?}: {source}")]
    BadImage {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
