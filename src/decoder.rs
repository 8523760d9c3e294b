//! Remote command decoding for the MQTT control topic.
//!
//! Payloads are free text. Only the first [`MAX_COMMAND_BYTES`] bytes are
//! looked at; longer payloads are truncated rather than rejected, and
//! anything unrecognised is silently dropped (the bus has no error channel).
//!
//! | Payload (case-insensitive) | Effect |
//! |----------------------------|--------|
//! | `on`, `true`, `1`          | PowerState = true |
//! | `off`, `false`, `0`        | PowerState = false |
//! | anything else              | none |
//!
//! # Example
//!
//! ```rust
//! use relay_switch::decoder::{decode, RemoteCommand};
//!
//! assert_eq!(decode("lamp/set", b"ON", "lamp/set"), Some(RemoteCommand::On));
//! assert_eq!(decode("lamp/set", b"maybe", "lamp/set"), None);
//! assert_eq!(decode("other", b"on", "lamp/set"), None);
//! ```

use crate::flags::SharedFlags;

/// Number of payload bytes inspected.
pub const MAX_COMMAND_BYTES: usize = 7;

/// Decoded control-topic command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCommand {
    /// Energize the relay.
    On,
    /// De-energize the relay.
    Off,
}

impl RemoteCommand {
    /// PowerState this command requests.
    #[inline]
    pub const fn power(self) -> bool {
        matches!(self, RemoteCommand::On)
    }

    /// Parse a payload without topic filtering.
    pub fn from_payload(payload: &[u8]) -> Option<Self> {
        let head = &payload[..payload.len().min(MAX_COMMAND_BYTES)];
        const ON: [&[u8]; 3] = [b"on", b"true", b"1"];
        const OFF: [&[u8]; 3] = [b"off", b"false", b"0"];

        if ON.iter().any(|t| head.eq_ignore_ascii_case(t)) {
            Some(RemoteCommand::On)
        } else if OFF.iter().any(|t| head.eq_ignore_ascii_case(t)) {
            Some(RemoteCommand::Off)
        } else {
            None
        }
    }
}

/// Decode a message if it arrived on the control topic.
///
/// An empty `control_topic` matches nothing.
pub fn decode(topic: &str, payload: &[u8], control_topic: &str) -> Option<RemoteCommand> {
    if control_topic.is_empty() || topic != control_topic {
        return None;
    }
    RemoteCommand::from_payload(payload)
}

/// Store the requested PowerState. Returns true if the value changed.
pub fn apply(command: RemoteCommand, flags: &SharedFlags) -> bool {
    let on = command.power();
    let changed = flags.power() != on;
    flags.set_power(on);
    changed
}
