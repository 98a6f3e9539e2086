//! Hardware address validation.
//!
//! Accepts the usual `00:11:22:AA:BB:CC` notation, dashes instead of colons
//! (mixed freely), either letter case, and the deferred placeholder form.

/// Marks a field whose value is substituted by the host when the action fires.
pub const PLACEHOLDER_SENTINEL: char = '%';

const GROUPS: usize = 6;

/// True when `value` is a deferred placeholder rather than a literal.
pub fn is_placeholder(value: &str) -> bool {
    value.starts_with(PLACEHOLDER_SENTINEL)
}

/// Check an address against `([0-9a-fA-F]{2}[:-]){5}[0-9a-fA-F]{2}`.
///
/// Placeholders are valid here; their real value is only known at fire time.
pub fn is_valid(address: Option<&str>) -> bool {
    match address {
        None => false,
        Some(addr) if is_placeholder(addr) => true,
        Some(addr) => matches_grammar(addr),
    }
}

fn matches_grammar(addr: &str) -> bool {
    let bytes = addr.as_bytes();
    if bytes.len() != GROUPS * 3 - 1 {
        return false;
    }
    bytes.iter().enumerate().all(|(i, b)| {
        if i % 3 == 2 {
            matches!(b, b':' | b'-')
        } else {
            b.is_ascii_hexdigit()
        }
    })
}
