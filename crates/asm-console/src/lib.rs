//! Terminal status console for the Autonomous Sensor Module
//!
//! Stands in for the desktop panel: link state and sensor status are printed as
//! they change, and the panel's buttons become typed commands (`status`,
//! `calibrate`, `reporting`, `logging`, `connect [host]`).

pub mod config;
pub mod error;
pub mod input;
pub mod presenter;

use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use asm_link::{Console, LinkSession};
use crossbeam_channel::{Receiver, TryRecvError};
use tracing::{debug, info, warn};

pub use config::{Args, ConsoleConfig};
pub use error::{ConfigError, ConsoleError, InputError};
pub use input::ConsoleCommand;
pub use presenter::TerminalPresenter;

/// How long the main loop waits for link events before checking for input.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Run the console until the operator quits or `running` is cleared.
pub fn run(config: &ConsoleConfig, connect_on_start: bool, running: Arc<AtomicBool>) -> Result<(), ConsoleError> {
    let session = LinkSession::open(config.link.clone())?;
    let presenter = TerminalPresenter::new(io::stdout(), config.link.max_reconnect_attempts);
    let mut console = Console::new(session, presenter);
    let mut lines = Some(spawn_input_reader()?);

    console.presenter_mut().print(input::HELP);
    if connect_on_start {
        execute(&mut console, ConsoleCommand::Connect(None));
    }

    while running.load(Ordering::SeqCst) {
        if let Some(rx) = &lines {
            match rx.try_recv() {
                Ok(line) => {
                    if !handle_line(&mut console, &line) {
                        break;
                    }
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => {
                    debug!("Input closed; running until interrupted");
                    lines = None;
                }
            }
        }
        console.pump_timeout(POLL_INTERVAL);
    }

    info!("Shutting down");
    console.shutdown();
    Ok(())
}

/// Parse and execute one input line. Returns `false` when the operator quits.
pub fn handle_line<W: Write>(console: &mut Console<TerminalPresenter<W>>, line: &str) -> bool {
    match ConsoleCommand::parse(line) {
        None => true,
        Some(Ok(command)) => execute(console, command),
        Some(Err(e)) => {
            console.presenter_mut().print(&format!("{} (type `help`)", e));
            true
        }
    }
}

/// Execute a command. Returns `false` for [`ConsoleCommand::Quit`].
pub fn execute<W: Write>(console: &mut Console<TerminalPresenter<W>>, command: ConsoleCommand) -> bool {
    let result = match &command {
        ConsoleCommand::Connect(host) => console.request_connect(host.as_deref()),
        ConsoleCommand::Status => console.request_status(),
        ConsoleCommand::Calibrate => console.request_calibrate(),
        ConsoleCommand::ToggleReporting => console.request_toggle_reporting(),
        ConsoleCommand::ToggleLogging => console.request_toggle_logging(),
        ConsoleCommand::Show => {
            let snapshot = console.snapshot().clone();
            console.presenter_mut().show_snapshot(&snapshot);
            Ok(())
        }
        ConsoleCommand::Help => {
            console.presenter_mut().print(input::HELP);
            Ok(())
        }
        ConsoleCommand::Quit => return false,
    };

    if let Err(e) = result {
        warn!(command = ?command, error = %e, "Command failed");
        console.presenter_mut().print(&format!("error: {}", e));
    }
    true
}

fn spawn_input_reader() -> Result<Receiver<String>, ConsoleError> {
    let (tx, rx) = crossbeam_channel::unbounded();
    thread::Builder::new()
        .name("asm-console-input".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .map_err(ConsoleError::Input)?;
    Ok(rx)
}
