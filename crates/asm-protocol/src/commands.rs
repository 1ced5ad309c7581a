//! Commands that can be sent to the sensor module.
//!
//! Every command is a single `<event>:<integer>` record:
//! - `getStatus:0` requests a full status report
//! - `calibrate:1` starts sensor calibration
//! - `reportingToggle:{0,1}` turns periodic reporting off/on
//! - `loggingToggle:{0,1}` turns on-board data logging off/on

use bytes::Bytes;

use crate::codec::{encode_command, FIELD_SEPARATOR};

/// A command understood by the sensor module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Request a status report for every subsystem.
    GetStatus,
    /// Start calibration.
    Calibrate,
    /// Set periodic reporting.
    ReportingToggle {
        /// Desired reporting state.
        enabled: bool,
    },
    /// Set on-board data logging.
    LoggingToggle {
        /// Desired logging state.
        enabled: bool,
    },
}

impl Command {
    /// Event name used on the wire.
    pub fn event(&self) -> &'static str {
        match self {
            Command::GetStatus => "getStatus",
            Command::Calibrate => "calibrate",
            Command::ReportingToggle { .. } => "reportingToggle",
            Command::LoggingToggle { .. } => "loggingToggle",
        }
    }

    /// Integer argument sent with the command.
    pub fn data(&self) -> i64 {
        match self {
            Command::GetStatus => 0,
            Command::Calibrate => 1,
            Command::ReportingToggle { enabled } | Command::LoggingToggle { enabled } => {
                i64::from(*enabled)
            }
        }
    }

    /// Encode the command for transmission.
    pub fn encode(&self) -> Bytes {
        encode_command(self.event(), self.data())
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.event(), FIELD_SEPARATOR, self.data())
    }
}
