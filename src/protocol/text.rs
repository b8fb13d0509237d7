//! # Print Directives
//!
//! Text arrives as `<size>//<text>` or as plain text. The size selects one
//! of the five [`SIZE`](super::commands::SIZE) entries; the text is encoded
//! as Latin-1 and appended after the fixed text header.
//!
//! ```
//! use btprinter::protocol::{commands, text};
//!
//! let bytes = text::encode_text("3//Hi");
//! let mut expected: Vec<u8> = Vec::new();
//! expected.extend(commands::SIZE[0]);
//! expected.extend(commands::CANCEL_MULTIBYTE);
//! expected.extend(commands::SELECT_ESCAPE_CHARSET);
//! expected.extend(commands::SIZE[3]);
//! expected.extend(b"Hi");
//! assert_eq!(bytes, expected);
//! ```

use super::commands::{CANCEL_MULTIBYTE, SELECT_ESCAPE_CHARSET, SIZE};
use super::latin1;

/// Separator between the size and the text.
pub const DELIMITER: &str = "//";

/// Font size selector, always within 1..=5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FontSize(u8);

impl FontSize {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    /// Build a size, clamping into 1..=5.
    pub fn clamped(n: i32) -> Self {
        Self(n.clamp(Self::MIN as i32, Self::MAX as i32) as u8)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Control bytes that select this size.
    pub fn command(self) -> &'static [u8] {
        SIZE[self.0 as usize]
    }
}

impl Default for FontSize {
    fn default() -> Self {
        Self(2)
    }
}

/// A parsed text directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintDirective<'a> {
    pub size: FontSize,
    pub text: &'a str,
}

/// Split a directive into size and text.
///
/// - No `//`: default size, the whole input is the text.
/// - Otherwise the left segment is parsed as an integer and clamped; a
///   parse failure gives the default size. The text is the second segment
///   only, so anything after a second `//` is dropped.
pub fn parse_directive(input: &str) -> PrintDirective<'_> {
    let mut parts = input.split(DELIMITER);
    let head = parts.next().unwrap_or_default();

    match parts.next() {
        None => PrintDirective {
            size: FontSize::default(),
            text: input,
        },
        Some(text) => PrintDirective {
            size: head
                .parse::<i32>()
                .map(FontSize::clamped)
                .unwrap_or_default(),
            text,
        },
    }
}

/// Fixed header emitted before every text payload.
fn header(size: FontSize) -> Vec<u8> {
    let mut out = Vec::with_capacity(11);
    out.extend(SIZE[0]);
    out.extend(CANCEL_MULTIBYTE);
    out.extend(SELECT_ESCAPE_CHARSET);
    out.extend(size.command());
    out
}

/// Encode a directive string into printer bytes.
pub fn encode_text(input: &str) -> Vec<u8> {
    encode_directive(&parse_directive(input))
}

/// Encode a directive whose size and text are already separated. The text
/// is not scanned for `//`.
///
/// ```
/// use btprinter::protocol::text::{FontSize, PrintDirective, encode_directive};
///
/// let directive = PrintDirective {
///     size: FontSize::clamped(4),
///     text: "see http://x.io\n",
/// };
/// assert!(encode_directive(&directive).ends_with(b"see http://x.io\n"));
/// ```
pub fn encode_directive(directive: &PrintDirective<'_>) -> Vec<u8> {
    let mut out = header(directive.size);
    out.extend(latin1::encode(directive.text));
    out
}

/// Truncate each value to one byte (two's complement wrap).
///
/// ```
/// use btprinter::protocol::text::raw_bytes;
///
/// assert_eq!(raw_bytes(&[104, 101, 108, 108, 111]), b"hello".to_vec());
/// assert_eq!(raw_bytes(&[256, -1, 300]), vec![0, 255, 44]);
/// ```
pub fn raw_bytes(values: &[i64]) -> Vec<u8> {
    values.iter().map(|&v| v as u8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn expected(size: usize, text: &[u8]) -> Vec<u8> {
        let mut v = vec![0x1D, 0x21, 0x00, 0x1C, 0x2E, 0x1B, 0x74, 0x10];
        v.extend(SIZE[size]);
        v.extend(text);
        v
    }

    #[test]
    fn test_plain_text_uses_default_size() {
        assert_eq!(encode_text("hello"), expected(2, b"hello"));
    }

    #[test]
    fn test_each_valid_size() {
        for n in 1..=5 {
            let input = format!("{}//text", n);
            assert_eq!(encode_text(&input), expected(n, b"text"), "size {}", n);
        }
    }

    #[test]
    fn test_size_three() {
        assert_eq!(encode_text("3//Hi"), expected(3, b"Hi"));
    }

    #[test]
    fn test_out_of_range_sizes_clamp() {
        assert_eq!(parse_directive("0//x").size.get(), 1);
        assert_eq!(parse_directive("-7//x").size.get(), 1);
        assert_eq!(parse_directive("6//x").size.get(), 5);
        assert_eq!(parse_directive("99//x").size.get(), 5);
    }

    #[test]
    fn test_unparseable_size_defaults() {
        for head in ["abc", "", " 3", "3.0", "99999999999"] {
            let input = format!("{}//x", head);
            let d = parse_directive(&input);
            assert_eq!(d.size, FontSize::default(), "head {:?}", head);
            assert_eq!(d.text, "x");
        }
    }

    #[test]
    fn test_signed_size() {
        assert_eq!(parse_directive("+4//x").size.get(), 4);
    }

    #[test]
    fn test_only_second_segment_is_text() {
        let d = parse_directive("4//a//b");
        assert_eq!(d.size.get(), 4);
        assert_eq!(d.text, "a");
    }

    #[test]
    fn test_directive_text_is_verbatim() {
        let directive = PrintDirective {
            size: FontSize::clamped(2),
            text: "see http://x.io\n",
        };
        assert_eq!(encode_directive(&directive), expected(2, b"see http://x.io\n"));
        assert_eq!(encode_text("2//see http://x.io\n"), expected(2, b"see http:"));
    }

    #[test]
    fn test_empty_segments() {
        let d = parse_directive("//");
        assert_eq!(d.size.get(), 2);
        assert_eq!(d.text, "");
        assert_eq!(encode_text(""), expected(2, b""));
    }

    #[test]
    fn test_text_is_latin1() {
        assert_eq!(encode_text("1//Año €"), expected(1, &[b'A', 0xF1, b'o', b' ', b'?']));
    }

    #[test]
    fn test_raw_bytes_wraps() {
        assert_eq!(raw_bytes(&[0, 127, 128, 255]), vec![0, 127, 128, 255]);
        assert_eq!(raw_bytes(&[256, 257, -128, -256]), vec![0, 1, 128, 0]);
        assert!(raw_bytes(&[]).is_empty());
    }
}
