//! Tracing and metrics installation.

use std::{io, sync::OnceLock, thread, time::Duration};

use anyhow::{anyhow, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static PROM_UPKEEP_THREAD: OnceLock<thread::JoinHandle<()>> = OnceLock::new();

/// Install the tracing subscriber and the global metrics recorder. Called
/// once at startup, before any thread is spawned.
pub(crate) fn init(verbose: bool) -> Result<()> {
    let default_directive = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_timer(fmt::time::uptime()),
        )
        .try_init()?;
    init_metrics_recorder()?;
    Ok(())
}

/// Ensure the global metrics recorder is installed and keep its handle for
/// the `/metrics` endpoint.
fn init_metrics_recorder() -> Result<()> {
    if PROM_HANDLE.get().is_some() {
        return Ok(());
    }
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();
    metrics::set_global_recorder(recorder)
        .map_err(|err| anyhow!("metrics recorder already installed: {err}"))?;

    let upkeep_handle = handle.clone();
    PROM_UPKEEP_THREAD.get_or_init(|| {
        spawn_thread("prometheus-upkeep", move || loop {
            thread::sleep(Duration::from_secs(5));
            upkeep_handle.run_upkeep();
        })
        .expect("failed to spawn prometheus upkeep thread")
    });

    let _ = PROM_HANDLE.set(handle);
    Ok(())
}

/// Access the Prometheus handle when already initialised.
pub(crate) fn prometheus_handle() -> Option<&'static PrometheusHandle> {
    PROM_HANDLE.get()
}

/// Spawn a thread that inherits the current tracing dispatcher.
pub(crate) fn spawn_thread<F, T>(name: impl Into<String>, f: F) -> io::Result<thread::JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let dispatch = tracing::dispatcher::get_default(|current| current.clone());
    thread::Builder::new()
        .name(name.into())
        .spawn(move || tracing::dispatcher::with_default(&dispatch, f))
}
