//! Plain-text presenter for a terminal.

use std::io::Write;

use asm_link::{CriticalAlert, DomainEvent, LinkState, Presenter, Severity, StatusEntry, StatusSnapshot};
use tracing::warn;

/// Writes one line per update.
pub struct TerminalPresenter<W: Write> {
    out: W,
    max_reconnect_attempts: u32,
}

impl<W: Write> TerminalPresenter<W> {
    pub fn new(out: W, max_reconnect_attempts: u32) -> Self {
        TerminalPresenter {
            out,
            max_reconnect_attempts,
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Print a free-form line.
    pub fn print(&mut self, text: &str) {
        self.write_line(text);
    }

    /// Print the whole status panel.
    pub fn show_snapshot(&mut self, snapshot: &StatusSnapshot) {
        let text = render_snapshot(snapshot, self.max_reconnect_attempts);
        self.write_line(&text);
    }

    fn write_line(&mut self, text: &str) {
        if let Err(e) = writeln!(self.out, "{}", text).and_then(|_| self.out.flush()) {
            warn!(error = %e, "Failed to write to terminal");
        }
    }
}

impl<W: Write> Presenter for TerminalPresenter<W> {
    fn on_connection_state_changed(&mut self, state: LinkState, reconnect_attempts: u32) {
        let line = format!(
            "Connection: {}",
            connection_label(state, reconnect_attempts, self.max_reconnect_attempts)
        );
        self.write_line(&line);
    }

    fn on_domain_event(&mut self, event: &DomainEvent) {
        let line = format!("{:<18} {}{}", event.kind.as_str(), event.label, marker(event.severity));
        self.write_line(&line);
    }

    fn on_critical_alert(&mut self, alert: &CriticalAlert) {
        let line = format!("!! {}: {}", alert.title, alert.text);
        self.write_line(&line);
    }
}

fn connection_label(state: LinkState, attempts: u32, max: u32) -> String {
    match state {
        LinkState::Reconnecting if attempts > 0 => {
            format!("Reconnecting (attempt {}/{})", attempts, max)
        }
        other => other.as_str().to_string(),
    }
}

fn marker(severity: Severity) -> &'static str {
    match severity {
        Severity::Info | Severity::Ok => "",
        Severity::Warn => " [!]",
        Severity::Error => " [FAIL]",
        Severity::Critical => " [CRITICAL]",
    }
}

fn entry(entry: &Option<StatusEntry>) -> String {
    match entry {
        Some(entry) => format!("{}{}", entry.label, marker(entry.severity)),
        None => "-".to_string(),
    }
}

/// Render every field of the snapshot, one per line.
pub fn render_snapshot(snapshot: &StatusSnapshot, max_reconnect_attempts: u32) -> String {
    let calibration = if snapshot.calibration_pending {
        "Calibrating...".to_string()
    } else {
        entry(&snapshot.calibration)
    };
    let battery = match &snapshot.battery {
        Some(battery) => match battery.level {
            Some(level) => format!("{} (level {})", battery.label, level),
            None => battery.label.clone(),
        },
        None => "Battery: -".to_string(),
    };

    [
        format!(
            "Connection:  {}",
            connection_label(
                snapshot.connection,
                snapshot.reconnect_attempts,
                max_reconnect_attempts
            )
        ),
        format!("Altitude:    {}", snapshot.altitude.as_deref().unwrap_or("-")),
        format!("LIDAR data:  {}", snapshot.lidar_data.as_deref().unwrap_or("-")),
        format!("SONAR data:  {}", snapshot.sonar_data.as_deref().unwrap_or("-")),
        format!("LIDAR:       {}", entry(&snapshot.lidar)),
        format!("SONAR:       {}", entry(&snapshot.sonar)),
        format!("Calibration: {}", calibration),
        format!("Reporting:   {}", entry(&snapshot.reporting)),
        format!("Logging:     {}", entry(&snapshot.logging)),
        format!("Power:       {}", battery),
    ]
    .join("\n")
}
