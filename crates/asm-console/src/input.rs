//! Operator commands typed at the terminal.

use crate::error::InputError;

/// One line of operator input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// `connect [host]`
    Connect(Option<String>),
    /// `status`
    Status,
    /// `calibrate`
    Calibrate,
    /// `reporting`
    ToggleReporting,
    /// `logging`
    ToggleLogging,
    /// `show`
    Show,
    /// `help`
    Help,
    /// `quit` / `exit`
    Quit,
}

pub const HELP: &str = "\
commands:
  connect [host]  connect (optionally to another host)
  status          request a status report
  calibrate       start sensor calibration
  reporting       toggle periodic reporting
  logging         toggle on-board data logging
  show            print the last known status
  help            show this text
  quit            disconnect and exit";

impl ConsoleCommand {
    /// Parse a line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Option<Result<ConsoleCommand, InputError>> {
        let mut words = line.split_whitespace();
        let verb = words.next()?;
        let arg = words.next();
        let extra = words.next().is_some();

        let command = match verb.to_ascii_lowercase().as_str() {
            "connect" | "c" => {
                if extra {
                    return Some(Err(InputError::TooManyArguments { command: "connect" }));
                }
                return Some(Ok(ConsoleCommand::Connect(arg.map(str::to_string))));
            }
            "status" | "s" => ConsoleCommand::Status,
            "calibrate" => ConsoleCommand::Calibrate,
            "reporting" => ConsoleCommand::ToggleReporting,
            "logging" => ConsoleCommand::ToggleLogging,
            "show" => ConsoleCommand::Show,
            "help" | "?" => ConsoleCommand::Help,
            "quit" | "exit" | "q" => ConsoleCommand::Quit,
            other => return Some(Err(InputError::UnknownCommand(other.to_string()))),
        };

        if arg.is_some() {
            return Some(Err(InputError::UnknownCommand(line.trim().to_string())));
        }
        Some(Ok(command))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(ConsoleCommand::parse("status"), Some(Ok(ConsoleCommand::Status)));
        assert_eq!(ConsoleCommand::parse("  Calibrate \n"), Some(Ok(ConsoleCommand::Calibrate)));
        assert_eq!(ConsoleCommand::parse("q"), Some(Ok(ConsoleCommand::Quit)));
        assert_eq!(ConsoleCommand::parse("connect"), Some(Ok(ConsoleCommand::Connect(None))));
        assert_eq!(
            ConsoleCommand::parse("connect 192.168.4.1"),
            Some(Ok(ConsoleCommand::Connect(Some("192.168.4.1".into()))))
        );
    }

    #[test]
    fn test_blank_line_is_ignored() {
        assert_eq!(ConsoleCommand::parse(""), None);
        assert_eq!(ConsoleCommand::parse("   "), None);
    }

    #[test]
    fn test_bad_input() {
        assert_eq!(
            ConsoleCommand::parse("launch"),
            Some(Err(InputError::UnknownCommand("launch".into())))
        );
        assert_eq!(
            ConsoleCommand::parse("connect a b"),
            Some(Err(InputError::TooManyArguments { command: "connect" }))
        );
        assert!(matches!(ConsoleCommand::parse("status now"), Some(Err(_))));
    }
}
