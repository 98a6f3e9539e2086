//! Hex text <-> byte conversion for binary payloads.
//!
//! Operators type binary messages as hex digits, optionally spaced out for
//! readability (`"41 42 0d"`). Decoding is strict: the whole input is rejected
//! if anything is off, so a half-decoded payload never reaches the radio.

/// Reasons a hex payload is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HexError {
    #[error("hex payload is empty")]
    Empty,

    #[error("hex payload has an odd number of digits ({len})")]
    OddLength { len: usize },

    #[error("invalid hex digit {ch:?} at position {index}")]
    InvalidDigit { ch: char, index: usize },
}

/// Decode hex text into bytes.
///
/// ASCII whitespace (space, tab, CR, LF, VT, FF) is removed and the digits are
/// upper-cased before checking, so `"de ad\nBE EF"` decodes to
/// `[0xDE, 0xAD, 0xBE, 0xEF]`. Any other character, including non-ASCII
/// spaces, is an invalid digit. Positions count chars after whitespace removal.
pub fn decode(text: &str) -> Result<Vec<u8>, HexError> {
    let normalized: String = text
        .chars()
        .filter(|c| !is_separator(*c))
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if let Some((index, ch)) = normalized
        .chars()
        .enumerate()
        .find(|(_, c)| !c.is_ascii_hexdigit())
    {
        return Err(HexError::InvalidDigit { ch, index });
    }
    if normalized.is_empty() {
        return Err(HexError::Empty);
    }

    // only ASCII hex digits remain, so the digit count is the one thing left to fail
    hex::decode(&normalized).map_err(|_| HexError::OddLength {
        len: normalized.len(),
    })
}

fn is_separator(c: char) -> bool {
    c.is_ascii_whitespace() || c == '\x0B'
}

/// Encode bytes as uppercase hex digits with no separators.
pub fn encode(bytes: &[u8]) -> String {
    hex::encode_upper(bytes)
}

/// Short hex preview of a payload for log lines.
pub fn preview(data: &[u8], max: usize) -> String {
    let shown = &data[..data.len().min(max)];
    let mut out = encode(shown);
    if data.len() > max {
        out.push_str("..");
    }
    out
}
