//! # Command Descriptors
//!
//! A [`CommandDescriptor`] is the validated form of what an operator entered:
//! target address, message body and the two formatting flags. It is the single
//! source of truth for the bytes that go over the air.
//!
//! ```rust
//! use btserial::descriptor::CommandDescriptor;
//!
//! let cmd = CommandDescriptor::new("00:11:22:AA:BB:CC", "4142", true, true).unwrap();
//! assert_eq!(cmd.encoded_payload().unwrap(), vec![0x41, 0x42, 0x0D, 0x0A]);
//! assert_eq!(cmd.to_string(), "00:11:22:AA:BB:CC <- (hex) 4142\\r\\n");
//! ```
//!
//! Validation happens once, in [`CommandDescriptor::try_create`]; an invalid
//! combination never produces an instance. [`CommandDescriptor::error_for`]
//! gives the operator-facing reason for a rejection and always agrees with
//! `try_create` on whether the input is acceptable.
//!
//! Fields starting with `%` are placeholders filled in by the host when the
//! action fires. A placeholder body skips all format checks, so a bad value
//! substituted later is only caught when the payload is encoded.

use crate::address::{self, is_placeholder};
use crate::hexcodec;
use std::fmt;

/// Default width of [`CommandDescriptor::summary`].
pub const DEFAULT_SUMMARY_LENGTH: usize = 60;

/// Narrowest summary that still fits the ellipsis and the terminator marker.
pub const MIN_SUMMARY_LENGTH: usize = ELLIPSIS.len() + TERMINATOR_MARKER.len();

/// Bytes appended when the line terminator flag is set.
pub const LINE_TERMINATOR: &[u8] = b"\r\n";

// Printed form of the terminator in summaries (escaped, 4 chars).
const TERMINATOR_MARKER: &str = "\\r\\n";
const ELLIPSIS: &str = "...";

/// Why a descriptor was rejected, in the order they are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DescriptorError {
    #[error("Invalid MAC address: use the form 00:11:22:AA:BB:CC or a %variable")]
    InvalidAddress,

    #[error("Invalid hex message: expected an even number of hex digits (spaces allowed)")]
    InvalidHex,

    #[error("Invalid message: the message is empty and no CR/LF was requested")]
    InvalidBody,
}

/// Validated, immutable send command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDescriptor {
    address: String,
    body: String,
    append_terminator: bool,
    interpret_as_hex: bool,
}

impl CommandDescriptor {
    /// Build a descriptor from raw input fields.
    ///
    /// Absent fields (`None`) are rejected; see [`Self::error_for`] for the
    /// exact rules and which error is reported.
    pub fn try_create(
        address: Option<&str>,
        body: Option<&str>,
        append_terminator: bool,
        interpret_as_hex: bool,
    ) -> Result<Self, DescriptorError> {
        if let Some(err) = Self::error_for(address, body, append_terminator, interpret_as_hex) {
            return Err(err);
        }
        match (address, body) {
            (Some(address), Some(body)) => Ok(CommandDescriptor {
                address: address.to_string(),
                body: body.to_string(),
                append_terminator,
                interpret_as_hex,
            }),
            // error_for rejects absent fields before we get here
            (None, _) => Err(DescriptorError::InvalidAddress),
            (_, None) => Err(DescriptorError::InvalidBody),
        }
    }

    /// Shorthand for [`Self::try_create`] with both text fields present.
    pub fn new(
        address: &str,
        body: &str,
        append_terminator: bool,
        interpret_as_hex: bool,
    ) -> Result<Self, DescriptorError> {
        Self::try_create(Some(address), Some(body), append_terminator, interpret_as_hex)
    }

    /// First problem with the given fields, or `None` when they are valid.
    ///
    /// The address is always checked first so the most fundamental mistake is
    /// the one reported.
    pub fn error_for(
        address: Option<&str>,
        body: Option<&str>,
        append_terminator: bool,
        interpret_as_hex: bool,
    ) -> Option<DescriptorError> {
        if !address::is_valid(address) {
            return Some(DescriptorError::InvalidAddress);
        }

        let body = match body {
            Some(body) => body,
            None if interpret_as_hex => return Some(DescriptorError::InvalidHex),
            None => return Some(DescriptorError::InvalidBody),
        };

        if is_placeholder(body) {
            return None;
        }

        if interpret_as_hex {
            if hexcodec::decode(body).is_err() {
                return Some(DescriptorError::InvalidHex);
            }
        } else if body.is_empty() && !append_terminator {
            return Some(DescriptorError::InvalidBody);
        }

        None
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn append_terminator(&self) -> bool {
        self.append_terminator
    }

    pub fn interpret_as_hex(&self) -> bool {
        self.interpret_as_hex
    }

    /// True if either text field still holds an unsubstituted placeholder.
    pub fn has_placeholders(&self) -> bool {
        is_placeholder(&self.address) || is_placeholder(&self.body)
    }

    /// The exact bytes to transmit.
    ///
    /// Rebuilt on every call. Only fails for a hex-mode descriptor whose body
    /// is a placeholder that was never replaced with real hex.
    pub fn encoded_payload(&self) -> Result<Vec<u8>, DescriptorError> {
        let mut bytes = if self.interpret_as_hex {
            hexcodec::decode(&self.body).map_err(|_| DescriptorError::InvalidHex)?
        } else {
            self.body.as_bytes().to_vec()
        };
        if self.append_terminator {
            bytes.extend_from_slice(LINE_TERMINATOR);
        }
        Ok(bytes)
    }

    /// One-line description such as `00:11:22:AA:BB:CC <- (hex) 4142\r\n`.
    ///
    /// Output longer than `max_length` chars is cut and marked with `...`,
    /// keeping the escaped terminator marker (when set) at the very end.
    /// The result fits `max_length` whenever it is at least
    /// [`MIN_SUMMARY_LENGTH`]; below that only the markers are left.
    pub fn summary(&self, max_length: usize) -> String {
        let mut rendered = format!("{} <- ", self.address);
        if self.interpret_as_hex {
            rendered.push_str("(hex) ");
        }
        rendered.push_str(&self.body);

        let marker_len = if self.append_terminator {
            TERMINATOR_MARKER.len()
        } else {
            0
        };

        if rendered.chars().count() + marker_len > max_length {
            let keep = max_length.saturating_sub(marker_len + ELLIPSIS.len());
            let cut = rendered
                .char_indices()
                .nth(keep)
                .map(|(i, _)| i)
                .unwrap_or(rendered.len());
            rendered.truncate(cut);
            rendered.push_str(ELLIPSIS);
        }

        if self.append_terminator {
            rendered.push_str(TERMINATOR_MARKER);
        }
        rendered
    }
}

impl fmt::Display for CommandDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary(DEFAULT_SUMMARY_LENGTH))
    }
}
