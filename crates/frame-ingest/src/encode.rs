//! Software JPEG encoding for sensor-native frames.

use image::{codecs::jpeg::JpegEncoder, ExtendedColorType, ImageEncoder};
use thiserror::Error;

use crate::{
    types::{Frame, FrameFormat},
    FrameEncoder,
};

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("frame buffer is {actual} bytes, expected {expected} for {width}x{height} RGB8")]
    Geometry {
        expected: usize,
        actual: usize,
        width: u32,
        height: u32,
    },
    #[error("jpeg encoding failed: {0}")]
    Codec(#[from] image::ImageError),
}

/// CPU JPEG encoder backed by the `image` crate.
pub struct SoftJpegEncoder;

impl FrameEncoder for SoftJpegEncoder {
    fn encode(&self, frame: &Frame, quality: u8) -> Result<Vec<u8>, EncodeError> {
        match frame.format {
            // Already encoded; hand the bytes back unchanged.
            FrameFormat::Jpeg => Ok(frame.data.clone()),
            FrameFormat::Rgb8 => {
                let expected = frame.width as usize * frame.height as usize * 3;
                if frame.data.len() != expected {
                    return Err(EncodeError::Geometry {
                        expected,
                        actual: frame.data.len(),
                        width: frame.width,
                        height: frame.height,
                    });
                }
                let mut out = Vec::with_capacity(expected / 8 + 1024);
                JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100)).write_image(
                    &frame.data,
                    frame.width,
                    frame.height,
                    ExtendedColorType::Rgb8,
                )?;
                Ok(out)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb_frame(width: u32, height: u32) -> Frame {
        Frame {
            data: vec![127; width as usize * height as usize * 3],
            width,
            height,
            timestamp_ms: 0,
            format: FrameFormat::Rgb8,
        }
    }

    #[test]
    fn encodes_rgb8_to_jpeg() {
        let jpeg = SoftJpegEncoder
            .encode(&rgb_frame(4, 4), 80)
            .expect("encode succeeds");
        // SOI marker
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn rejects_mismatched_geometry() {
        let mut frame = rgb_frame(4, 4);
        frame.data.truncate(5);
        let err = SoftJpegEncoder
            .encode(&frame, 80)
            .err()
            .expect("bad geometry must fail");
        assert!(matches!(err, EncodeError::Geometry { expected: 48, .. }));
    }

    #[test]
    fn jpeg_frames_pass_through_unchanged() {
        let frame = Frame {
            data: vec![0xFF, 0xD8, 0xFF, 0xD9],
            width: 1,
            height: 1,
            timestamp_ms: 0,
            format: FrameFormat::Jpeg,
        };
        let out = SoftJpegEncoder.encode(&frame, 80).expect("pass-through");
        assert_eq!(out, frame.data);
    }
}
