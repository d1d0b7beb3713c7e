//! ethcam: a network camera appliance serving an MJPEG stream whose server
//! lifetime follows the wired link state.

mod config;
mod lifecycle;
mod mjpeg;
mod server;
mod telemetry;

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::{bail, Context, Result};
use crossbeam_channel::RecvTimeoutError;
use tracing::{info, warn};

use frame_ingest::{FrameEncoder, FrameSource, JpegDirSource, SoftJpegEncoder, SyntheticSource};
use illum_ctl::{IlluminationControl, NullIllumination, SysfsPwm};

use crate::{
    config::{AppConfig, SourceSpec},
    lifecycle::{LinkLifecycle, ServerHandle},
    server::{spawn_stream_server, ServerState},
};

const LINK_POLL_INTERVAL: Duration = Duration::from_millis(500);
const DISPATCH_TICK: Duration = Duration::from_millis(250);

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let config = AppConfig::from_args(&args)?;
    telemetry::init(config.verbose)?;

    // Capability bring-up. Any failure here is fatal; there is no degraded
    // mode without frames or with a half-configured PWM head.
    let source: Arc<dyn FrameSource> = match &config.source {
        SourceSpec::Synthetic => Arc::new(SyntheticSource::new(
            config.width,
            config.height,
            config.fps,
        )),
        SourceSpec::JpegDir(dir) => Arc::new(
            JpegDirSource::open(dir, config.fps)
                .with_context(|| format!("failed to open frame directory {}", dir.display()))?,
        ),
    };
    let encoder: Arc<dyn FrameEncoder> = Arc::new(SoftJpegEncoder);
    let illumination: Arc<dyn IlluminationControl> = match &config.pwm_dir {
        Some(dir) => Arc::new(
            SysfsPwm::open(dir, config.pwm_period_ns)
                .with_context(|| format!("failed to open pwm channel {}", dir.display()))?,
        ),
        None => Arc::new(NullIllumination),
    };

    let link_rx = link_watch::spawn_operstate_watcher(&config.iface, LINK_POLL_INTERVAL)
        .with_context(|| format!("failed to watch interface {}", config.iface))?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let handler_shutdown = shutdown.clone();
    if let Err(err) = ctrlc::set_handler(move || {
        handler_shutdown.store(true, Ordering::SeqCst);
    }) {
        warn!("Failed to install Ctrl+C handler: {err}");
    }

    let state = Arc::new(ServerState {
        source,
        encoder,
        illumination: illumination.clone(),
    });
    let listen = config.listen.clone();
    let mut lifecycle = LinkLifecycle::new(
        move || {
            let started = spawn_stream_server(&listen, state.clone())?;
            Ok(Box::new(started) as Box<dyn ServerHandle>)
        },
        illumination,
        config.idle_duty,
    );

    info!("watching {} for link state", config.iface);
    while !shutdown.load(Ordering::SeqCst) {
        match link_rx.recv_timeout(DISPATCH_TICK) {
            Ok(event) => lifecycle.handle_event(event),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => bail!("link watcher stopped unexpectedly"),
        }
    }

    info!("shutting down");
    lifecycle.shutdown();
    Ok(())
}
