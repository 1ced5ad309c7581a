//! Autonomous Sensor Module (ASM) wire protocol
//!
//! This crate provides the types and pure functions used to talk to the sensor
//! module over its TCP link. The protocol is a small delimited text format with
//! no length prefix and no terminator.
//!
//! # Protocol Overview
//!
//! - **Commands** (console → module): `<event>:<integer>`, e.g. `getStatus:0`
//! - **Frames** (module → console): one or more `<event>:<payload>` records joined
//!   with `|`, possibly padded with NUL bytes and carrying an EOT (0x04) byte
//! - **Return codes**: status payloads start with a single signed digit
//!   (`1`, `0`, `-1`, `-2`, `-3`)
//!
//! # Example
//!
//! ```rust
//! use asm_protocol::{decode_frame, parse_return_code, Command};
//!
//! assert_eq!(&Command::GetStatus.encode()[..], b"getStatus:0");
//!
//! let records: Vec<_> = decode_frame(b"altitude:150|sonarStatus:-3\0\0")
//!     .into_iter()
//!     .filter_map(Result::ok)
//!     .collect();
//! assert_eq!(records[0].name, "altitude");
//! assert_eq!(parse_return_code(&records[1].payload), Some(-3));
//! ```

mod codec;
mod commands;
mod error;
mod events;

pub use codec::*;
pub use commands::*;
pub use error::*;
pub use events::*;
