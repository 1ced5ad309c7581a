//! Command line and configuration file handling.
//!
//! Values are layered, later sources winning:
//!
//! 1. built-in defaults
//! 2. the YAML file given with `--config`
//! 3. the `ASM_IP` environment variable (host only)
//! 4. command line flags

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use asm_link::{LinkConfig, LinkError};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ConfigError, ConfigResult};

/// Environment variable overriding the sensor module host.
pub const HOST_ENV_VAR: &str = "ASM_IP";

/// Log filter used when neither `RUST_LOG` nor `--log-level` is given.
pub const DEFAULT_LOG_FILTER: &str = "asm_console=info,asm_link=info";

#[derive(Parser, Debug, Default, Clone)]
#[command(name = "asm-console", version, about = "Status console for the Autonomous Sensor Module")]
pub struct Args {
    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Sensor module host (overrides ASM_IP)
    #[arg(long)]
    pub host: Option<String>,

    /// Sensor module TCP port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Seconds between automatic reconnect attempts
    #[arg(long)]
    pub reconnect_interval_secs: Option<f64>,

    /// Failed automatic retries before giving up
    #[arg(long)]
    pub max_reconnect_attempts: Option<u32>,

    /// Log filter, e.g. "debug" or "asm_link=trace"
    #[arg(long)]
    pub log_level: Option<String>,

    /// Serve Prometheus metrics on this address (needs the `prometheus` feature)
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,

    /// Start idle instead of connecting immediately
    #[arg(long)]
    pub no_connect: bool,
}

/// Contents of the YAML configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Link settings.
    pub link: LinkConfig,

    /// Log filter directive.
    pub log_level: Option<String>,

    /// Prometheus listen address.
    pub metrics_addr: Option<SocketAddr>,
}

impl ConsoleConfig {
    /// Load a configuration file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    fn parse(text: &str, path: &Path) -> ConfigResult<Self> {
        serde_yaml::from_str(text).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Build the effective configuration from every source.
    pub fn resolve(args: &Args) -> ConfigResult<Self> {
        let env_host = std::env::var(HOST_ENV_VAR).ok();
        Self::resolve_with_env(args, env_host)
    }

    /// Like [`resolve`](Self::resolve), with the environment value passed in.
    pub fn resolve_with_env(args: &Args, env_host: Option<String>) -> ConfigResult<Self> {
        let mut config = match &args.config {
            Some(path) => {
                info!("Loading configuration from {:?}", path);
                Self::load(path)?
            }
            None => Self::default(),
        };

        if let Some(host) = env_host.filter(|h| !h.trim().is_empty()) {
            info!("Setting address to {}", host);
            config.link.host = host;
        }

        if let Some(host) = &args.host {
            config.link.host = host.clone();
        }
        if let Some(port) = args.port {
            config.link.port = port;
        }
        if let Some(secs) = args.reconnect_interval_secs {
            let interval = Duration::try_from_secs_f64(secs).map_err(|e| {
                LinkError::InvalidConfig(format!("reconnect interval of {} seconds: {}", secs, e))
            })?;
            config.link = config.link.with_reconnect_interval(interval);
        }
        if let Some(attempts) = args.max_reconnect_attempts {
            config.link.max_reconnect_attempts = attempts;
        }
        if let Some(level) = &args.log_level {
            config.log_level = Some(level.clone());
        }
        if let Some(addr) = args.metrics_addr {
            config.metrics_addr = Some(addr);
        }

        config.link.validate()?;
        Ok(config)
    }

    /// Filter directive for the tracing subscriber.
    pub fn log_filter(&self) -> &str {
        self.log_level.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }
}
