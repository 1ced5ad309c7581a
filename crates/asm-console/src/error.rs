//! Error types for the console binary.

use std::io;
use std::path::PathBuf;

use asm_link::LinkError;
use thiserror::Error;

/// Errors while assembling the console configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error(transparent)]
    Invalid(#[from] LinkError),
}

/// A line typed by the operator that is not a command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("{command} takes at most one argument")]
    TooManyArguments { command: &'static str },
}

/// Top-level failures of the console process.
#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error("failed to install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),

    #[error("failed to spawn input thread: {0}")]
    Input(#[source] io::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
