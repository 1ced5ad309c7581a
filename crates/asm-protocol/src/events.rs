//! Inbound event names and return-code parsing.
//!
//! The module reports two kinds of payloads:
//! - Data payloads (`altitude`, `lidarData`, `sonarData`) carry display text.
//! - Status payloads carry a single signed-digit return code.
//!
//! `batteryStatus` is both: a percentage, or `-1` when no reading is available.
//! Deciding which interpretation applies belongs to the consumer, not the codec.

/// Return code extracted from a status payload.
pub type ReturnCode = i32;

/// Events the sensor module is known to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    /// Fused altitude in centimetres (`altitude`).
    Altitude,
    /// Raw LIDAR range in centimetres (`lidarData`).
    LidarData,
    /// Raw sonar range in centimetres (`sonarData`).
    SonarData,
    /// Result of the last calibration (`calibrationStatus`).
    CalibrationStatus,
    /// LIDAR health (`lidarStatus`).
    LidarStatus,
    /// Sonar health (`sonarStatus`).
    SonarStatus,
    /// Whether periodic reporting is on (`reportingStatus`).
    ReportingStatus,
    /// Whether on-board data logging is on (`loggingStatus`).
    LoggingStatus,
    /// Battery percentage or no-data code (`batteryStatus`).
    BatteryStatus,
}

impl EventName {
    /// Every known event, in wire documentation order.
    pub const ALL: [EventName; 9] = [
        EventName::Altitude,
        EventName::LidarData,
        EventName::SonarData,
        EventName::CalibrationStatus,
        EventName::LidarStatus,
        EventName::SonarStatus,
        EventName::ReportingStatus,
        EventName::LoggingStatus,
        EventName::BatteryStatus,
    ];

    /// Get the event name as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::Altitude => "altitude",
            EventName::LidarData => "lidarData",
            EventName::SonarData => "sonarData",
            EventName::CalibrationStatus => "calibrationStatus",
            EventName::LidarStatus => "lidarStatus",
            EventName::SonarStatus => "sonarStatus",
            EventName::ReportingStatus => "reportingStatus",
            EventName::LoggingStatus => "loggingStatus",
            EventName::BatteryStatus => "batteryStatus",
        }
    }

    /// Look up an event by its wire name. Matching is case-sensitive.
    pub fn from_wire(name: &str) -> Option<EventName> {
        EventName::ALL.into_iter().find(|event| event.as_str() == name)
    }

    /// Whether the payload is display text rather than a return code.
    pub fn is_data(&self) -> bool {
        matches!(
            self,
            EventName::Altitude | EventName::LidarData | EventName::SonarData
        )
    }
}

impl std::fmt::Display for EventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse the return code at the start of a status payload.
///
/// A leading `-` takes exactly one following digit; otherwise exactly the first
/// character is parsed as a digit. Multi-digit codes are therefore truncated
/// (`"-23"` is `-2`, `"15"` is `1`). The module never sends codes outside
/// `-9..=9`, and the console keeps the truncation for wire compatibility.
pub fn parse_return_code(payload: &str) -> Option<ReturnCode> {
    let mut chars = payload.chars();
    let first = chars.next()?;

    if first == '-' {
        let magnitude = chars.next()?.to_digit(10)?;
        return Some(-(magnitude as ReturnCode));
    }

    first.to_digit(10).map(|digit| digit as ReturnCode)
}
