//! # ISO-8859-1 Encoding
//!
//! Converts Unicode strings to the single-byte Latin-1 encoding sent after
//! the text header.
//!
//! U+0000–U+00FF map to the byte of the same value. Anything else is
//! replaced with `?`, one replacement per code point, which is what the
//! standard ISO-8859-1 encoders do.

use tracing::debug;

/// Replacement byte for characters outside Latin-1.
pub const REPLACEMENT: u8 = b'?';

/// Encode a Unicode string as ISO-8859-1 bytes.
///
/// ```
/// use btprinter::protocol::latin1;
///
/// assert_eq!(latin1::encode("Café"), vec![b'C', b'a', b'f', 0xE9]);
/// assert_eq!(latin1::encode("€5"), vec![b'?', b'5']);
/// ```
pub fn encode(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    for ch in s.chars() {
        match u8::try_from(u32::from(ch)) {
            Ok(byte) => out.push(byte),
            Err(_) => {
                debug!(
                    "latin1: unmapped character '{}' (U+{:04X}), replacing with '?'",
                    ch, ch as u32
                );
                out.push(REPLACEMENT);
            }
        }
    }
    out
}
