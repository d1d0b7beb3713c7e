//! Actix Web server hosting the MJPEG stream and brightness endpoints.
//!
//! The server runs on a dedicated thread so lifecycle transitions stay on
//! the dispatch context. Each accepted stream connection gets its own
//! worker thread feeding the response body through a bounded channel; the
//! channel fails the worker's writes once the client is gone.

use std::sync::Arc;

use actix_web::{
    web::{self, Bytes},
    App, HttpResponse, HttpServer,
};
use anyhow::{bail, Context, Result};
use async_stream::stream;
use serde::Deserialize;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use frame_ingest::{FrameEncoder, FrameSource};
use illum_ctl::{duty_from_percent, IlluminationControl};

use crate::{
    lifecycle::ServerHandle,
    mjpeg::{self, PartSink, SinkClosed, StreamEnd, STREAM_CONTENT_TYPE},
    telemetry,
};

/// Chunks buffered between a stream worker and the response body. Small on
/// purpose: backpressure paces the worker to the client.
const CHUNK_QUEUE_DEPTH: usize = 4;

/// Shared state backing HTTP handlers.
pub(crate) struct ServerState {
    pub(crate) source: Arc<dyn FrameSource>,
    pub(crate) encoder: Arc<dyn FrameEncoder>,
    pub(crate) illumination: Arc<dyn IlluminationControl>,
}

/// Handle for the server thread; exists only while the link is up.
pub(crate) struct StreamServer {
    shutdown: oneshot::Sender<()>,
    handle: std::thread::JoinHandle<()>,
}

impl ServerHandle for StreamServer {
    /// Signal the server to stop and block until the thread exits.
    fn stop(self: Box<Self>) {
        let _ = self.shutdown.send(());
        let _ = self.handle.join();
    }
}

/// Spawn the server thread and wait for it to bind.
///
/// A bind failure is reported here, not from inside the thread, so the
/// lifecycle can stay down and retry on the next link-up.
pub(crate) fn spawn_stream_server(listen: &str, state: Arc<ServerState>) -> Result<StreamServer> {
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let (ready_tx, ready_rx) = oneshot::channel::<std::io::Result<()>>();
    let bind_addr = listen.to_string();
    let handle = std::thread::Builder::new()
        .name("ethcam-server".into())
        .spawn(move || {
            let outcome = actix_web::rt::System::new().block_on(async move {
                let server = HttpServer::new(move || {
                    App::new()
                        .app_data(web::Data::from(state.clone()))
                        .route("/stream", web::get().to(stream_handler))
                        .route("/led", web::get().to(led_handler))
                        .route("/metrics", web::get().to(metrics_handler))
                })
                .bind(bind_addr.as_str());
                let server = match server {
                    Ok(bound) => bound.run(),
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return Ok(());
                    }
                };
                let _ = ready_tx.send(Ok(()));

                let srv_handle = server.handle();
                actix_web::rt::spawn(async move {
                    let _ = shutdown_rx.await;
                    // Immediate stop: stream connections never finish on
                    // their own, and link-down must not wait for them.
                    srv_handle.stop(false).await;
                });

                server.await
            });
            if let Err(err) = outcome {
                error!("HTTP server error: {err}");
            }
        })
        .context("Failed to spawn server thread")?;

    match ready_rx.blocking_recv() {
        Ok(Ok(())) => {
            info!("server listening on {listen}");
            Ok(StreamServer {
                shutdown: shutdown_tx,
                handle,
            })
        }
        Ok(Err(err)) => {
            let _ = handle.join();
            Err(err).with_context(|| format!("failed to bind {listen}"))
        }
        Err(_) => {
            let _ = handle.join();
            bail!("server thread exited before binding {listen}");
        }
    }
}

/// Sink feeding the actix streaming body. `blocking_send` stalls on channel
/// backpressure at the I/O boundary only, and fails once the response body
/// (and with it the receiver) has been dropped.
struct ChannelSink {
    tx: mpsc::Sender<Bytes>,
}

impl PartSink for ChannelSink {
    fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), SinkClosed> {
        self.tx
            .blocking_send(Bytes::copy_from_slice(chunk))
            .map_err(|_| SinkClosed)
    }
}

/// Stream the MJPEG feed over a multipart response.
async fn stream_handler(state: web::Data<ServerState>) -> HttpResponse {
    metrics::counter!("stream_connections_total").increment(1);
    let (tx, mut rx) = mpsc::channel::<Bytes>(CHUNK_QUEUE_DEPTH);
    let source = state.source.clone();
    let encoder = state.encoder.clone();
    let spawned = telemetry::spawn_thread("mjpeg-stream", move || {
        let mut sink = ChannelSink { tx };
        match mjpeg::stream_frames(source.as_ref(), encoder.as_ref(), &mut sink) {
            StreamEnd::Disconnected => info!("stream client disconnected"),
            StreamEnd::NoFrame => error!("stream aborted: no frame available"),
            StreamEnd::EncodeFailed => error!("stream aborted: jpeg conversion failed"),
        }
    });
    if spawned.is_err() {
        return HttpResponse::InternalServerError().finish();
    }

    let body = stream! {
        while let Some(chunk) = rx.recv().await {
            yield Ok::<Bytes, actix_web::Error>(chunk);
        }
    };
    HttpResponse::Ok()
        .append_header(("Cache-Control", "no-cache"))
        .append_header(("Content-Type", STREAM_CONTENT_TYPE))
        .streaming(body)
}

#[derive(Deserialize)]
struct LedQuery {
    led: Option<String>,
}

/// Set the illumination duty cycle from the `led` query parameter.
///
/// A missing parameter is a no-op; malformed input drives duty 0. The
/// response is a success either way.
async fn led_handler(query: web::Query<LedQuery>, state: web::Data<ServerState>) -> HttpResponse {
    match query.led.as_deref() {
        Some(value) => {
            let percent = value.parse::<u32>().unwrap_or(0);
            let duty = duty_from_percent(percent);
            if let Err(err) = state.illumination.set_duty(duty) {
                warn!("illumination update failed: {err}");
            }
            HttpResponse::Ok()
                .content_type("text/plain")
                .body(format!("led {percent}\n"))
        }
        None => HttpResponse::Ok()
            .content_type("text/plain")
            .body("led unchanged\n"),
    }
}

/// Prometheus exposition for the ambient telemetry.
async fn metrics_handler() -> HttpResponse {
    match telemetry::prometheus_handle() {
        Some(handle) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(handle.render()),
        None => HttpResponse::ServiceUnavailable().finish(),
    }
}
