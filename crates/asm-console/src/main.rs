//! asm-console - status console for the Autonomous Sensor Module.

use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use asm_console::{Args, ConsoleConfig, ConsoleError};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), ConsoleError> {
    let config = ConsoleConfig::resolve(&args);
    init_logging(config.as_ref().ok().map(|c| c.log_filter()), args.log_level.as_deref());
    let config = config?;

    info!(
        "Sensor module at {}:{} (retry every {:?}, up to {} attempts)",
        config.link.host,
        config.link.port,
        config.link.reconnect_interval(),
        config.link.max_reconnect_attempts
    );

    if let Some(addr) = config.metrics_addr {
        start_metrics(addr);
    } else {
        asm_metrics::describe_metrics();
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    asm_console::run(&config, !args.no_connect, running)
}

/// `--log-level` wins, then `RUST_LOG`, then the configured or default filter.
fn init_logging(configured: Option<&str>, flag: Option<&str>) {
    let fallback = flag
        .or(configured)
        .unwrap_or(asm_console::config::DEFAULT_LOG_FILTER);
    let filter = match flag {
        Some(_) => EnvFilter::try_new(fallback),
        None => EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(fallback)),
    }
    .unwrap_or_else(|_| EnvFilter::new(asm_console::config::DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(feature = "prometheus")]
fn start_metrics(addr: std::net::SocketAddr) {
    match asm_metrics::install_prometheus_exporter(addr) {
        Ok(()) => info!("Serving metrics on http://{}/metrics", addr),
        Err(e) => warn!("Failed to start metrics exporter: {}", e),
    }
}

#[cfg(not(feature = "prometheus"))]
fn start_metrics(addr: std::net::SocketAddr) {
    warn!(
        "Metrics address {} ignored: built without the `prometheus` feature",
        addr
    );
}
