//! Per-connection MJPEG streaming loop.
//!
//! The loop is written against the [`PartSink`] abstraction so the protocol
//! semantics are testable without a socket. The production sink lives in
//! `server` and feeds the HTTP response body.

use std::time::Instant;

use thiserror::Error;
use tracing::{debug, error};

use frame_ingest::{EncodeError, Frame, FrameEncoder, FrameFormat, FrameSource};

/// Response content type declaring the multipart stream. One fixed boundary
/// token is shared by every part of every stream.
pub(crate) const STREAM_CONTENT_TYPE: &str =
    "multipart/x-mixed-replace;boundary=123456789000000000000987654321";

/// Marker emitted before each part, terminating the previous one.
const STREAM_BOUNDARY: &str = "\r\n--123456789000000000000987654321\r\n";

/// Fixed encode quality for sensor-native frames.
pub(crate) const STREAM_JPEG_QUALITY: u8 = 80;

/// Why a streaming connection ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum StreamEnd {
    /// The client went away or the transport died mid-part.
    Disconnected,
    /// The source produced no frame.
    NoFrame,
    /// The encoder rejected a frame.
    EncodeFailed,
}

#[derive(Debug, Error)]
#[error("client connection closed")]
pub(crate) struct SinkClosed;

/// Per-connection chunk writer.
pub(crate) trait PartSink {
    fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), SinkClosed>;
}

/// Bytes for one part: either aliasing the frame's own JPEG buffer or a
/// freshly encoded buffer freed when the part is done.
enum Payload<'a> {
    Borrowed(&'a [u8]),
    Owned(Vec<u8>),
}

impl<'a> Payload<'a> {
    fn for_frame(
        frame: &'a Frame,
        encoder: &dyn FrameEncoder,
        quality: u8,
    ) -> Result<Self, EncodeError> {
        match frame.format {
            FrameFormat::Jpeg => Ok(Payload::Borrowed(&frame.data)),
            _ => encoder.encode(frame, quality).map(Payload::Owned),
        }
    }

    fn bytes(&self) -> &[u8] {
        match self {
            Payload::Borrowed(bytes) => bytes,
            Payload::Owned(bytes) => bytes,
        }
    }
}

/// Inter-frame latency tracker. The baseline initializes lazily on the first
/// emitted frame, so no rate is derived from an unset timestamp.
#[derive(Default)]
struct FramePacing {
    last_frame: Option<Instant>,
}

impl FramePacing {
    fn mark(&mut self, payload_len: usize) {
        let now = Instant::now();
        if let Some(last) = self.last_frame.replace(now) {
            let frame_ms = now.duration_since(last).as_millis() as u64;
            debug!(
                "MJPG: {}KB {}ms ({:.1}fps)",
                payload_len / 1024,
                frame_ms,
                frame_rate(frame_ms)
            );
            metrics::histogram!("stream_frame_interval_ms").record(frame_ms as f64);
        }
        metrics::counter!("stream_frames_total").increment(1);
    }
}

/// Sub-millisecond intervals round up to 1ms so the rate stays finite.
fn frame_rate(frame_ms: u64) -> f64 {
    1000.0 / frame_ms.max(1) as f64
}

/// Stream parts until the client disconnects, a write fails, or the source
/// or encoder gives out.
///
/// Every acquired frame is released exactly once on every path, and an
/// encoder-owned payload is freed even when a write fails after allocation.
pub(crate) fn stream_frames(
    source: &dyn FrameSource,
    encoder: &dyn FrameEncoder,
    sink: &mut dyn PartSink,
) -> StreamEnd {
    let mut pacing = FramePacing::default();
    loop {
        let frame = match source.acquire() {
            Some(frame) => frame,
            None => {
                error!("frame source returned no frame");
                break StreamEnd::NoFrame;
            }
        };

        let (written, payload_len) = {
            let payload = match Payload::for_frame(&frame, encoder, STREAM_JPEG_QUALITY) {
                Ok(payload) => payload,
                Err(err) => {
                    error!("jpeg conversion failed: {err}");
                    source.release(frame);
                    break StreamEnd::EncodeFailed;
                }
            };
            let bytes = payload.bytes();
            (write_part(sink, bytes), bytes.len())
        }; // an owned payload buffer is dropped here, written or not

        source.release(frame);

        if written.is_err() {
            break StreamEnd::Disconnected;
        }
        pacing.mark(payload_len);
    }
}

fn write_part(sink: &mut dyn PartSink, payload: &[u8]) -> Result<(), SinkClosed> {
    sink.write_chunk(STREAM_BOUNDARY.as_bytes())?;
    let header = format!(
        "Content-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        payload.len()
    );
    sink.write_chunk(header.as_bytes())?;
    sink.write_chunk(payload)
}
