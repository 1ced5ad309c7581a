//! Frame encoding/decoding.
//!
//! Outbound commands are plain `<event>:<data>` text. Inbound frames are one or
//! more records separated by `|`:
//!
//! ```text
//! +----------------+---+----------------+---+-----+-------------+
//! | event:payload  | | | event:payload  | | | ... | NUL/EOT pad |
//! +----------------+---+----------------+---+-----+-------------+
//! ```
//!
//! A raw read is sanitized before splitting: NUL bytes and the EOT control byte
//! are removed and any trailing separator or line terminator left by the peer's
//! framing is dropped.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{ProtocolError, ProtocolResult};

/// TCP port the sensor module listens on.
pub const DEFAULT_PORT: u16 = 4000;

/// Size of a single socket read on the console side.
pub const FRAME_BUFFER_SIZE: usize = 128;

/// Separates records within a frame.
pub const RECORD_SEPARATOR: char = '|';

/// Separates the event name from its payload within a record.
pub const FIELD_SEPARATOR: char = ':';

/// End-of-transmission control byte the module appends to some frames.
pub const EOT: u8 = 0x04;

/// A single `<event>:<payload>` record decoded from a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEvent {
    /// Event name, e.g. `altitude`.
    pub name: String,
    /// Raw payload text. Interpretation depends on the event.
    pub payload: String,
}

impl DecodedEvent {
    /// Create a decoded event from its parts.
    pub fn new(name: impl Into<String>, payload: impl Into<String>) -> Self {
        DecodedEvent {
            name: name.into(),
            payload: payload.into(),
        }
    }
}

/// Encode a command for transmission.
///
/// Every call returns a freshly allocated buffer.
pub fn encode_command(event: &str, data: i64) -> Bytes {
    let data = data.to_string();
    let mut buf = BytesMut::with_capacity(event.len() + 1 + data.len());
    buf.put_slice(event.as_bytes());
    buf.put_u8(FIELD_SEPARATOR as u8);
    buf.put_slice(data.as_bytes());
    buf.freeze()
}

/// Strip framing noise from a raw read and return the record text.
///
/// Invalid UTF-8 is replaced rather than discarding the whole frame.
pub fn sanitize_frame(raw: &[u8]) -> String {
    let mut cleaned = BytesMut::with_capacity(raw.len());
    for &byte in raw {
        if byte != 0 && byte != EOT {
            cleaned.put_u8(byte);
        }
    }

    let text = String::from_utf8_lossy(&cleaned);
    text.trim_end_matches(is_trailing_stray).to_string()
}

fn is_trailing_stray(c: char) -> bool {
    matches!(c, '|' | '\r' | '\n')
}

/// Decode a single record, splitting on the first `:`.
pub fn decode_record(record: &str) -> ProtocolResult<DecodedEvent> {
    match record.split_once(FIELD_SEPARATOR) {
        Some((name, payload)) if !name.is_empty() => Ok(DecodedEvent::new(name, payload)),
        _ => Err(ProtocolError::MalformedRecord(record.to_string())),
    }
}

/// Decode every record in a raw frame, in arrival order.
///
/// Each record decodes independently: a malformed record yields an `Err` entry
/// and decoding continues with the next one. Empty records (`a:1||b:2`) carry no
/// information and are skipped.
pub fn decode_frame(raw: &[u8]) -> Vec<ProtocolResult<DecodedEvent>> {
    let text = sanitize_frame(raw);
    log::trace!("decoding frame {:?}", text);

    text.split(RECORD_SEPARATOR)
        .filter(|record| !record.is_empty())
        .map(decode_record)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_records(raw: &[u8]) -> Vec<DecodedEvent> {
        decode_frame(raw).into_iter().filter_map(Result::ok).collect()
    }

    #[test]
    fn test_encode_command() {
        assert_eq!(&encode_command("getStatus", 0)[..], b"getStatus:0");
        assert_eq!(&encode_command("reportingToggle", 1)[..], b"reportingToggle:1");
        assert_eq!(&encode_command("calibrate", -12)[..], b"calibrate:-12");
    }

    #[test]
    fn test_encode_command_buffers_are_independent() {
        let first = encode_command("calibrate", 1);
        let second = encode_command("getStatus", 0);
        assert_eq!(&first[..], b"calibrate:1");
        assert_eq!(&second[..], b"getStatus:0");
    }

    #[test]
    fn test_decode_two_records_in_order() {
        let records = decode_frame(b"altitude:150|sonarData:42");
        assert_eq!(
            records,
            vec![
                Ok(DecodedEvent::new("altitude", "150")),
                Ok(DecodedEvent::new("sonarData", "42")),
            ]
        );
    }

    #[test]
    fn test_decode_command_followed_by_record() {
        let mut raw = encode_command("reportingToggle", 1).to_vec();
        raw.extend_from_slice(b"|batteryStatus:87");

        let records = ok_records(&raw);
        assert_eq!(records[0].name, "reportingToggle");
        assert_eq!(records[0].payload.parse::<i64>().unwrap(), 1);
        assert_eq!(records[1], DecodedEvent::new("batteryStatus", "87"));
    }

    #[test]
    fn test_sanitize_strips_padding_and_eot() {
        let mut raw = b"altitude:99\x04".to_vec();
        raw.resize(FRAME_BUFFER_SIZE, 0);
        assert_eq!(sanitize_frame(&raw), "altitude:99");
    }

    #[test]
    fn test_sanitize_drops_trailing_separator() {
        assert_eq!(sanitize_frame(b"lidarStatus:0|"), "lidarStatus:0");
        assert_eq!(sanitize_frame(b"lidarStatus:0\r\n"), "lidarStatus:0");
    }

    #[test]
    fn test_malformed_record_does_not_abort_frame() {
        let records = decode_frame(b"altitude:10|garbage|sonarData:7");
        assert_eq!(records.len(), 3);
        assert_eq!(records[0], Ok(DecodedEvent::new("altitude", "10")));
        assert_eq!(
            records[1],
            Err(ProtocolError::MalformedRecord("garbage".to_string()))
        );
        assert_eq!(records[2], Ok(DecodedEvent::new("sonarData", "7")));
    }

    #[test]
    fn test_split_on_first_separator_only() {
        let records = ok_records(b"lidarData:12:34");
        assert_eq!(records, vec![DecodedEvent::new("lidarData", "12:34")]);
    }

    #[test]
    fn test_empty_records_skipped() {
        let records = ok_records(b"altitude:1||altitude:2");
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].payload, "2");
    }

    #[test]
    fn test_empty_event_name_is_malformed() {
        assert!(decode_record(":5").is_err());
        assert_eq!(decode_record("altitude:"), Ok(DecodedEvent::new("altitude", "")));
    }

    #[test]
    fn test_all_padding_decodes_to_nothing() {
        assert!(decode_frame(&[0u8; FRAME_BUFFER_SIZE]).is_empty());
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let records = ok_records(b"altitude:1\xff|sonarData:2");
        assert_eq!(records.len(), 2);
        assert_eq!(records[1], DecodedEvent::new("sonarData", "2"));
    }
}
