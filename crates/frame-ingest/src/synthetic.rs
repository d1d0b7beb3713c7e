//! Generated test-pattern source used when no capture hardware is wired in.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

use crate::{
    pacer::Pacer,
    pool::BufferPool,
    types::{Frame, FrameFormat},
    FrameSource,
};

const POOL_CAPACITY: usize = 4;

/// Paced RGB8 source drawing a gradient with a moving bar so streams visibly
/// advance frame to frame.
pub struct SyntheticSource {
    width: u32,
    height: u32,
    seq: AtomicU64,
    pacer: Pacer,
    pool: BufferPool,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            seq: AtomicU64::new(0),
            pacer: Pacer::new(fps),
            pool: BufferPool::new(POOL_CAPACITY),
        }
    }
}

impl FrameSource for SyntheticSource {
    fn acquire(&self) -> Option<Frame> {
        self.pacer.wait();
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let len = self.width as usize * self.height as usize * 3;
        let mut data = self.pool.checkout();
        data.resize(len, 0);
        render_pattern(&mut data, self.width, self.height, seq);
        Some(Frame {
            data,
            width: self.width,
            height: self.height,
            timestamp_ms: Utc::now().timestamp_millis(),
            format: FrameFormat::Rgb8,
        })
    }

    fn release(&self, frame: Frame) {
        self.pool.restore(frame.data);
    }
}

fn render_pattern(data: &mut [u8], width: u32, height: u32, seq: u64) {
    let bar = (seq as u32).wrapping_mul(4) % width;
    for y in 0..height {
        for x in 0..width {
            let i = ((y * width + x) * 3) as usize;
            data[i] = (x * 255 / width) as u8;
            data[i + 1] = (y * 255 / height) as u8;
            data[i + 2] = if x == bar { 255 } else { 32 };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_have_rgb8_geometry() {
        let source = SyntheticSource::new(8, 4, 1000);
        let frame = source.acquire().expect("synthetic source never runs dry");
        assert_eq!(frame.format, FrameFormat::Rgb8);
        assert_eq!(frame.data.len(), 8 * 4 * 3);
        assert_eq!((frame.width, frame.height), (8, 4));
        source.release(frame);
    }

    #[test]
    fn consecutive_frames_differ() {
        let source = SyntheticSource::new(16, 2, 1000);
        let first = source.acquire().expect("frame");
        let first_pixels = first.data.clone();
        source.release(first);
        let second = source.acquire().expect("frame");
        assert_ne!(first_pixels, second.data);
        source.release(second);
    }

    #[test]
    fn released_buffers_are_recycled() {
        let source = SyntheticSource::new(4, 4, 1000);
        let frame = source.acquire().expect("frame");
        source.release(frame);
        assert_eq!(source.pool.len(), 1);
        let _again = source.acquire().expect("frame");
        assert_eq!(source.pool.len(), 0);
    }
}
