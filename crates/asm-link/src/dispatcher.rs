//! Maps decoded records to typed domain events and keeps the status snapshot.
//!
//! Data events (`altitude`, `lidarData`, `sonarData`) are shown verbatim. Status
//! events go through [`parse_return_code`] and a fixed code table per
//! subsystem. `batteryStatus` carries either `-1` (no reading) or a percentage.
//!
//! Nothing here fails: names, codes and payloads the tables do not cover come
//! back as a non-`Updated` [`DispatchOutcome`] and are logged.

use asm_metrics::metric_defs;
use asm_protocol::{parse_return_code, DecodedEvent, EventName, ReturnCode};
use tracing::{debug, warn};

use crate::snapshot::{BatteryReading, Severity, StatusEntry, StatusSnapshot};
use crate::state::LinkState;

/// Title of the alert raised for calibration hard failures.
pub const CALIBRATION_FAILURE_TITLE: &str = "Calibration Failure";

const CALIBRATION_OFFSET_TEXT: &str = "The sensor module has encountered an error calibrating: \
     The maximum allowable offset has been exceeded.";
const CALIBRATION_SENSOR_TEXT: &str = "The sensor module has encountered an error calibrating: \
     The sensors have failed or are not responding.";

/// Battery return code meaning "no reading available".
const BATTERY_NO_DATA: ReturnCode = -1;

/// Domain event kinds: one per known wire event, plus a catch-all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Fused altitude reading.
    Altitude,
    /// Raw LIDAR range.
    LidarData,
    /// Raw sonar range.
    SonarData,
    /// Calibration result.
    CalibrationStatus,
    /// LIDAR health.
    LidarStatus,
    /// Sonar health.
    SonarStatus,
    /// Periodic reporting on/off.
    ReportingStatus,
    /// On-board data logging on/off.
    LoggingStatus,
    /// Battery charge or no-data.
    BatteryStatus,
    /// The module sent a name outside the known set.
    Unrecognized,
}

impl EventKind {
    /// Classify a wire event name.
    pub fn classify(name: &str) -> EventKind {
        EventName::from_wire(name).map_or(EventKind::Unrecognized, EventKind::from)
    }

    /// The wire event this kind was decoded from, if any.
    pub fn event_name(&self) -> Option<EventName> {
        let name = match self {
            EventKind::Altitude => EventName::Altitude,
            EventKind::LidarData => EventName::LidarData,
            EventKind::SonarData => EventName::SonarData,
            EventKind::CalibrationStatus => EventName::CalibrationStatus,
            EventKind::LidarStatus => EventName::LidarStatus,
            EventKind::SonarStatus => EventName::SonarStatus,
            EventKind::ReportingStatus => EventName::ReportingStatus,
            EventKind::LoggingStatus => EventName::LoggingStatus,
            EventKind::BatteryStatus => EventName::BatteryStatus,
            EventKind::Unrecognized => return None,
        };
        Some(name)
    }

    /// Wire name of the event, or `unrecognized`.
    pub fn as_str(&self) -> &'static str {
        self.event_name().map_or("unrecognized", |name| name.as_str())
    }
}

impl From<EventName> for EventKind {
    fn from(name: EventName) -> Self {
        match name {
            EventName::Altitude => EventKind::Altitude,
            EventName::LidarData => EventKind::LidarData,
            EventName::SonarData => EventKind::SonarData,
            EventName::CalibrationStatus => EventKind::CalibrationStatus,
            EventName::LidarStatus => EventKind::LidarStatus,
            EventName::SonarStatus => EventKind::SonarStatus,
            EventName::ReportingStatus => EventKind::ReportingStatus,
            EventName::LoggingStatus => EventKind::LoggingStatus,
            EventName::BatteryStatus => EventKind::BatteryStatus,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed update for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainEvent {
    /// Subsystem the update belongs to.
    pub kind: EventKind,
    /// Display text, e.g. `Altitude: 150 cm` or `NO DATA`.
    pub label: String,
    /// How the label should be presented.
    pub severity: Severity,
}

impl DomainEvent {
    fn new(kind: EventKind, label: impl Into<String>, severity: Severity) -> Self {
        DomainEvent {
            kind,
            label: label.into(),
            severity,
        }
    }
}

/// A blocking alert the operator has to acknowledge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CriticalAlert {
    /// Alert title.
    pub title: String,
    /// Explanation shown to the operator.
    pub text: String,
}

/// Result of dispatching one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The snapshot was updated.
    Updated {
        /// The update to present.
        event: DomainEvent,
        /// Raised for calibration hard failures.
        alert: Option<CriticalAlert>,
    },
    /// A status event carried a code outside its table.
    UnrecognizedCode { kind: EventKind, code: ReturnCode },
    /// A status payload did not start with a return code.
    UnparsablePayload { kind: EventKind, payload: String },
    /// The event name is not one the module is known to send.
    Unrecognized { name: String, payload: String },
}

impl DispatchOutcome {
    fn updated(kind: EventKind, label: impl Into<String>, severity: Severity) -> Self {
        DispatchOutcome::Updated {
            event: DomainEvent::new(kind, label, severity),
            alert: None,
        }
    }

    /// Metric label for outcomes that were not applied.
    fn diagnostic_kind(&self) -> Option<&'static str> {
        match self {
            DispatchOutcome::Updated { .. } => None,
            DispatchOutcome::UnrecognizedCode { .. } => Some("code"),
            DispatchOutcome::UnparsablePayload { .. } => Some("payload"),
            DispatchOutcome::Unrecognized { .. } => Some("event"),
        }
    }
}

/// Applies decoded records to a [`StatusSnapshot`].
#[derive(Debug, Default)]
pub struct Dispatcher {
    snapshot: StatusSnapshot,
}

impl Dispatcher {
    /// Create a dispatcher with an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> &StatusSnapshot {
        &self.snapshot
    }

    /// Record a connection state change.
    pub fn apply_link_state(&mut self, state: LinkState, reconnect_attempts: u32) {
        self.snapshot.connection = state;
        self.snapshot.reconnect_attempts = reconnect_attempts;
    }

    /// Mark a calibration as requested.
    pub fn begin_calibration(&mut self) {
        self.snapshot.calibration_pending = true;
    }

    /// Flip the local reporting flag and return the new value.
    pub fn toggle_reporting(&mut self) -> bool {
        self.snapshot.reporting_enabled = !self.snapshot.reporting_enabled;
        self.snapshot.reporting_enabled
    }

    /// Flip the local logging flag and return the new value.
    pub fn toggle_logging(&mut self) -> bool {
        self.snapshot.logging_enabled = !self.snapshot.logging_enabled;
        self.snapshot.logging_enabled
    }

    /// Apply one decoded record.
    pub fn dispatch(&mut self, record: &DecodedEvent) -> DispatchOutcome {
        let payload = record.payload.as_str();

        let outcome = match EventName::from_wire(&record.name) {
            None => DispatchOutcome::Unrecognized {
                name: record.name.clone(),
                payload: record.payload.clone(),
            },
            Some(name) if name.is_data() => self.apply_data(name, payload),
            Some(EventName::BatteryStatus) => self.apply_battery(payload),
            Some(name) => {
                let kind = EventKind::from(name);
                match parse_return_code(payload) {
                    Some(code) => self.apply_status(kind, code),
                    None => DispatchOutcome::UnparsablePayload {
                        kind,
                        payload: record.payload.clone(),
                    },
                }
            }
        };

        self.report(&outcome);
        outcome
    }

    fn apply_data(&mut self, name: EventName, payload: &str) -> DispatchOutcome {
        let (prefix, slot) = match name {
            EventName::Altitude => ("Altitude", &mut self.snapshot.altitude),
            EventName::LidarData => ("LIDAR", &mut self.snapshot.lidar_data),
            // `is_data` leaves only sonarData.
            _ => ("SONAR", &mut self.snapshot.sonar_data),
        };
        let label = format!("{}: {} cm", prefix, payload);
        *slot = Some(label.clone());
        DispatchOutcome::updated(EventKind::from(name), label, Severity::Info)
    }

    fn apply_status(&mut self, kind: EventKind, code: ReturnCode) -> DispatchOutcome {
        // A calibration result closes the pending request even when the code
        // is unknown.
        if kind == EventKind::CalibrationStatus {
            self.snapshot.calibration_pending = false;
        }

        let Some((label, severity)) = status_label(kind, code) else {
            return DispatchOutcome::UnrecognizedCode { kind, code };
        };
        let entry = StatusEntry::new(label, severity);

        match kind {
            EventKind::CalibrationStatus => self.snapshot.calibration = Some(entry),
            EventKind::LidarStatus => self.snapshot.lidar = Some(entry),
            EventKind::SonarStatus => self.snapshot.sonar = Some(entry),
            EventKind::ReportingStatus => {
                self.snapshot.reporting_enabled = code == 1;
                self.snapshot.reporting = Some(entry);
            }
            EventKind::LoggingStatus => {
                self.snapshot.logging_enabled = code == 1;
                self.snapshot.logging = Some(entry);
            }
            _ => {}
        }

        let alert = calibration_alert(kind, code);
        DispatchOutcome::Updated {
            event: DomainEvent::new(kind, label, severity),
            alert,
        }
    }

    fn apply_battery(&mut self, payload: &str) -> DispatchOutcome {
        let kind = EventKind::BatteryStatus;

        if payload.starts_with('-') && parse_return_code(payload) == Some(BATTERY_NO_DATA) {
            let label = "Battery: NO DATA";
            self.snapshot.battery = Some(BatteryReading {
                label: label.to_string(),
                percentage: None,
                level: None,
            });
            debug!("Battery status unavailable");
            return DispatchOutcome::updated(kind, label, Severity::Warn);
        }

        match payload.trim().parse::<i64>() {
            Ok(value) if (0..=100).contains(&value) => {
                let percentage = value as u8;
                let label = format!("Battery: {}%", percentage);
                self.snapshot.battery = Some(BatteryReading {
                    label: label.clone(),
                    percentage: Some(percentage),
                    level: Some(percentage / 10),
                });
                DispatchOutcome::updated(kind, label, Severity::Info)
            }
            Ok(_) => match parse_return_code(payload) {
                Some(code) if payload.starts_with('-') => DispatchOutcome::UnrecognizedCode { kind, code },
                _ => DispatchOutcome::UnparsablePayload {
                    kind,
                    payload: payload.to_string(),
                },
            },
            Err(_) => DispatchOutcome::UnparsablePayload {
                kind,
                payload: payload.to_string(),
            },
        }
    }

    fn report(&self, outcome: &DispatchOutcome) {
        let Some(diagnostic) = outcome.diagnostic_kind() else {
            return;
        };
        metrics::counter!(metric_defs::DISPATCH_UNRECOGNIZED.name, "kind" => diagnostic)
            .increment(1);

        match outcome {
            DispatchOutcome::UnrecognizedCode { kind, code } => {
                warn!("Unrecognized {} return code: {}", kind, code)
            }
            DispatchOutcome::UnparsablePayload { kind, payload } => {
                warn!("Unparsable {} payload: {:?}", kind, payload)
            }
            DispatchOutcome::Unrecognized { name, payload } => {
                warn!("Unrecognized event: {}:{}", name, payload)
            }
            DispatchOutcome::Updated { .. } => {}
        }
    }
}

/// Fixed code table for each status subsystem.
fn status_label(kind: EventKind, code: ReturnCode) -> Option<(&'static str, Severity)> {
    let entry = match (kind, code) {
        (EventKind::CalibrationStatus, 1) => ("Not Calibrated", Severity::Warn),
        (EventKind::CalibrationStatus, 0) => ("Calibrated", Severity::Ok),
        (EventKind::CalibrationStatus, -1 | -2) => ("Error Calibrating", Severity::Critical),

        (EventKind::LidarStatus, 0) => ("OK", Severity::Ok),
        (EventKind::LidarStatus, -1) => ("FAIL", Severity::Error),

        (EventKind::SonarStatus, 0) => ("OK", Severity::Ok),
        (EventKind::SonarStatus, -1 | -2) => ("FAIL", Severity::Error),
        (EventKind::SonarStatus, -3) => ("NO DATA", Severity::Error),

        (EventKind::ReportingStatus | EventKind::LoggingStatus, 1) => ("ON", Severity::Ok),
        (EventKind::ReportingStatus | EventKind::LoggingStatus, 0) => ("OFF", Severity::Warn),

        _ => return None,
    };
    Some(entry)
}

fn calibration_alert(kind: EventKind, code: ReturnCode) -> Option<CriticalAlert> {
    let text = match (kind, code) {
        (EventKind::CalibrationStatus, -1) => CALIBRATION_OFFSET_TEXT,
        (EventKind::CalibrationStatus, -2) => CALIBRATION_SENSOR_TEXT,
        _ => return None,
    };
    Some(CriticalAlert {
        title: CALIBRATION_FAILURE_TITLE.to_string(),
        text: text.to_string(),
    })
}
