//! Metrics for the sensor module telemetry link.
//!
//! This crate declares every metric the link records as a structured [`Metric`]
//! constant, so names and label keys are not retyped at each call site. It
//! re-exports the `metrics` facade: recording is a no-op until the embedding
//! process installs a recorder.
//!
//! # Example
//!
//! ```rust
//! use asm_metrics::{metric_defs, Metric, MetricKind};
//!
//! assert_eq!(metric_defs::LINK_FRAMES_RECEIVED.kind, MetricKind::Counter);
//! metrics::counter!(metric_defs::LINK_FRAMES_RECEIVED.name).increment(1);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, Unit};

/// Counter or gauge. The link records nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Only ever incremented.
    Counter,
    /// Set to the latest value.
    Gauge,
}

impl MetricKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name, kind and recorder metadata of one link metric.
#[derive(Debug, Clone)]
pub struct Metric {
    /// Dotted name under the `asm.` namespace.
    pub name: &'static str,
    pub kind: MetricKind,
    /// Help text handed to the recorder.
    pub description: &'static str,
    pub unit: Option<Unit>,
    /// Label keys every call site must supply, in order.
    pub labels: &'static [&'static str],
}

impl Metric {
    const fn new(name: &'static str, kind: MetricKind) -> Self {
        Self {
            name,
            kind,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    pub const fn counter(name: &'static str) -> Self {
        Self::new(name, MetricKind::Counter)
    }

    pub const fn gauge(name: &'static str) -> Self {
        Self::new(name, MetricKind::Gauge)
    }

    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Hand the description and unit to whatever recorder is installed.
    pub fn describe(&self) {
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => describe_counter!(self.name, unit, self.description),
            (MetricKind::Counter, None) => describe_counter!(self.name, self.description),
            (MetricKind::Gauge, Some(unit)) => describe_gauge!(self.name, unit, self.description),
            (MetricKind::Gauge, None) => describe_gauge!(self.name, self.description),
        }
    }
}

/// All metric definitions for the telemetry link.
pub mod metric_defs {
    use super::{Metric, Unit};

    // ========================================================================
    // Connection Lifecycle
    // ========================================================================

    /// Connect attempts, labelled by what triggered them.
    ///
    /// Labels: trigger (`manual` | `automatic`)
    pub const LINK_CONNECT_ATTEMPTS: Metric = Metric::counter("asm.link.connect_attempts")
        .with_description("Connection attempts to the sensor module")
        .with_unit(Unit::Count)
        .with_labels(&["trigger"]);

    /// Connect attempts that failed.
    ///
    /// Labels: trigger (`manual` | `automatic`)
    pub const LINK_CONNECT_FAILURES: Metric = Metric::counter("asm.link.connect_failures")
        .with_description("Failed connection attempts")
        .with_unit(Unit::Count)
        .with_labels(&["trigger"]);

    /// Established connections lost through EOF or a read error.
    pub const LINK_DISCONNECTS: Metric = Metric::counter("asm.link.disconnects")
        .with_description("Connections lost while reading")
        .with_unit(Unit::Count);

    /// Current automatic reconnect attempt count.
    pub const LINK_RECONNECT_ATTEMPTS: Metric = Metric::gauge("asm.link.reconnect_attempts")
        .with_description("Consecutive failed automatic reconnect attempts")
        .with_unit(Unit::Count);

    // ========================================================================
    // Traffic
    // ========================================================================

    /// Non-empty socket reads.
    pub const LINK_FRAMES_RECEIVED: Metric = Metric::counter("asm.link.frames_received")
        .with_description("Frames read from the sensor module")
        .with_unit(Unit::Count);

    /// Bytes read from the socket.
    pub const LINK_BYTES_RECEIVED: Metric = Metric::counter("asm.link.bytes_received")
        .with_description("Bytes read from the sensor module")
        .with_unit(Unit::Bytes);

    /// Bytes written to the socket.
    pub const LINK_BYTES_SENT: Metric = Metric::counter("asm.link.bytes_sent")
        .with_description("Bytes written to the sensor module")
        .with_unit(Unit::Bytes);

    /// Commands written, labelled by event name.
    ///
    /// Labels: event
    pub const LINK_COMMANDS_SENT: Metric = Metric::counter("asm.link.commands_sent")
        .with_description("Commands written to the sensor module")
        .with_unit(Unit::Count)
        .with_labels(&["event"]);

    // ========================================================================
    // Decoding and Dispatch
    // ========================================================================

    /// Records that could not be split into event and payload.
    pub const PROTOCOL_DECODE_ERRORS: Metric = Metric::counter("asm.protocol.decode_errors")
        .with_description("Malformed records skipped while decoding frames")
        .with_unit(Unit::Count);

    /// Events or return codes the dispatcher did not recognize.
    ///
    /// Labels: kind (`event` | `code` | `payload`)
    pub const DISPATCH_UNRECOGNIZED: Metric = Metric::counter("asm.dispatch.unrecognized")
        .with_description("Unrecognized events, return codes or payloads")
        .with_unit(Unit::Count)
        .with_labels(&["kind"]);

    /// Every metric, for registration at startup.
    pub const ALL: &[&Metric] = &[
        &LINK_CONNECT_ATTEMPTS,
        &LINK_CONNECT_FAILURES,
        &LINK_DISCONNECTS,
        &LINK_RECONNECT_ATTEMPTS,
        &LINK_FRAMES_RECEIVED,
        &LINK_BYTES_RECEIVED,
        &LINK_BYTES_SENT,
        &LINK_COMMANDS_SENT,
        &PROTOCOL_DECODE_ERRORS,
        &DISPATCH_UNRECOGNIZED,
    ];
}

/// Register descriptions for every metric in [`metric_defs::ALL`].
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}

/// Install a Prometheus recorder serving `/metrics` on `addr`.
#[cfg(feature = "prometheus")]
pub fn install_prometheus_exporter(
    addr: std::net::SocketAddr,
) -> Result<(), metrics_exporter_prometheus::BuildError> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    describe_metrics();
    Ok(())
}
