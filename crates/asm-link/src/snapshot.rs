//! Presentation-facing view of the sensor module's last known state.

use crate::state::LinkState;

/// How a status label should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Neutral information (data readings).
    Info,
    /// Healthy / enabled.
    Ok,
    /// Degraded but not failed.
    Warn,
    /// Failed or no data.
    Error,
    /// Failed and the operator must acknowledge it.
    Critical,
}

impl Severity {
    /// Lowercase name used in logs and terminal output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Ok => "ok",
            Severity::Warn => "warn",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A labelled status reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// Display text, e.g. `OK` or `FAIL`.
    pub label: String,
    /// How the label should be presented.
    pub severity: Severity,
}

impl StatusEntry {
    /// Build an entry from any string-like label.
    pub fn new(label: impl Into<String>, severity: Severity) -> Self {
        StatusEntry {
            label: label.into(),
            severity,
        }
    }
}

/// Latest battery report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatteryReading {
    /// Display text, e.g. `Battery: 47%` or `Battery: NO DATA`.
    pub label: String,
    /// Charge percentage; `None` when the module has no reading.
    pub percentage: Option<u8>,
    /// Coarse level indicator (`percentage / 10`); `None` hides the indicator.
    pub level: Option<u8>,
}

/// Per-subsystem state as last reported by the module.
///
/// Only the [`Dispatcher`](crate::Dispatcher) and the
/// [`Console`](crate::Console) write to it; presenters get read-only access.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    /// Last announced link state.
    pub connection: LinkState,
    /// Failed automatic retries at the last state change.
    pub reconnect_attempts: u32,

    /// Latest `altitude` label.
    pub altitude: Option<String>,
    /// Latest `lidarData` label.
    pub lidar_data: Option<String>,
    /// Latest `sonarData` label.
    pub sonar_data: Option<String>,

    /// Result of the last calibration.
    pub calibration: Option<StatusEntry>,
    /// LIDAR health.
    pub lidar: Option<StatusEntry>,
    /// Sonar health.
    pub sonar: Option<StatusEntry>,
    /// Reporting state as confirmed by the module.
    pub reporting: Option<StatusEntry>,
    /// Logging state as confirmed by the module.
    pub logging: Option<StatusEntry>,
    /// Latest battery report.
    pub battery: Option<BatteryReading>,

    /// Local reporting flag; drives the value sent by the next toggle.
    pub reporting_enabled: bool,
    /// Local logging flag; drives the value sent by the next toggle.
    pub logging_enabled: bool,
    /// A calibration was requested and no result has arrived yet.
    pub calibration_pending: bool,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        StatusSnapshot {
            connection: LinkState::Disconnected,
            reconnect_attempts: 0,
            altitude: None,
            lidar_data: None,
            sonar_data: None,
            calibration: None,
            lidar: None,
            sonar: None,
            reporting: None,
            logging: None,
            battery: None,
            reporting_enabled: false,
            logging_enabled: false,
            calibration_pending: false,
        }
    }
}
