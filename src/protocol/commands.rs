//! # ESC/POS Command Table
//!
//! Fixed byte sequences understood by generic ESC/POS thermal printers
//! (58mm/80mm Bluetooth receipt printers). The table is read-only and
//! process-wide; nothing here allocates.
//!
//! ## Escape Sequence Structure
//!
//! Commands follow these patterns:
//! - Single byte: `LF`, `HT`, `CR`
//! - Two bytes: `ESC @`, `FS .`
//! - With parameters: `ESC t n`, `GS ! n`, `ESC a n`
//!
//! ## Text Header
//!
//! Every text directive is preceded by four sequences:
//!
//! | Order | Constant | Bytes | Meaning |
//! |-------|----------|-------|---------|
//! | 1 | `SIZE[0]` | `1D 21 00` | Character size 1x1 |
//! | 2 | [`CANCEL_MULTIBYTE`] | `1C 2E` | Leave Kanji/Chinese mode |
//! | 3 | [`SELECT_ESCAPE_CHARSET`] | `1B 74 10` | Code table 16 (WPC1252) |
//! | 4 | `SIZE[n]` | see [`SIZE`] | Requested size |

// ============================================================================
// CONTROL CHARACTERS
// ============================================================================

/// HT (Horizontal Tab)
pub const HT: u8 = 9;

/// LF (Line Feed) - print buffer and advance one line
pub const LF: u8 = 10;

/// CR (Carriage Return)
pub const CR: u8 = 13;

/// ESC (Escape) - command prefix byte
pub const ESC: u8 = 27;

/// DLE (Data Link Escape) - real-time status prefix
pub const DLE: u8 = 16;

/// GS (Group Separator) - extended command prefix
pub const GS: u8 = 29;

/// FS (File Separator) - multi-byte character command prefix
pub const FS: u8 = 28;

pub const STX: u8 = 2;
pub const US: u8 = 31;
pub const CAN: u8 = 24;
pub const CLR: u8 = 12;
pub const EOT: u8 = 4;

// ============================================================================
// TEXT HEADER
// ============================================================================

/// Newline
pub const ENTER: &[u8] = b"\n";

/// # Reset Printer (ESC @ LF)
///
/// Initialize, then feed one line so the reset takes effect visibly.
pub const RESET_PRINTER: &[u8] = &[ESC, 0x40, LF];

/// # Cancel Multi-Byte Mode (FS .)
///
/// Printers sold with a Chinese/Kanji firmware start in two-byte mode and
/// would pair up Latin-1 bytes into glyphs.
pub const CANCEL_MULTIBYTE: &[u8] = &[FS, 0x2E];

/// # Select Character Code Table 16 (ESC t 16)
pub const SELECT_ESCAPE_CHARSET: &[u8] = &[ESC, 0x74, 0x10];

/// # Font Size Selectors
///
/// | Index | Bytes | Effect |
/// |-------|-------|--------|
/// | 0 | `1D 21 00` | Normal size (also used as the font reset) |
/// | 1 | `1B 4D 01` | Compressed font B |
/// | 2 | `1B 4D 00` | Standard font A |
/// | 3 | `1D 21 11` | Double width and height |
/// | 4 | `1D 21 22` | Triple width and height |
/// | 5 | `1D 21 33` | Quadruple width and height |
pub const SIZE: [&[u8]; 6] = [
    &[GS, 0x21, 0x00],
    &[ESC, 0x4D, 0x01],
    &[ESC, 0x4D, 0x00],
    &[GS, 0x21, 0x11],
    &[GS, 0x21, 0x22],
    &[GS, 0x21, 0x33],
];

// ============================================================================
// NAMED OPCODES
// ============================================================================

pub const INIT: &[u8] = &[ESC, 64];
pub const FEED_LINE: &[u8] = &[LF];
pub const SELECT_FONT_A: &[u8] = &[20, 33, 0];
pub const SET_BAR_CODE_HEIGHT: &[u8] = &[GS, 104, 100];
pub const PRINT_BAR_CODE_1: &[u8] = &[GS, 107, 2];
pub const SEND_NULL_BYTE: &[u8] = &[0];
pub const SELECT_PRINT_SHEET: &[u8] = &[ESC, 99, 48, 2];

/// # Feed and Cut (GS V 66 0)
///
/// Feeds to the cutter position and performs a partial cut.
pub const FEED_PAPER_AND_CUT: &[u8] = &[GS, 86, 66, 0];

pub const SELECT_CYRILLIC_CHARACTER_CODE_TABLE: &[u8] = &[ESC, 116, 17];

/// # Select Bit Image Mode (ESC * 33 nL nH)
///
/// 24-dot double density, 128 columns. Image data must follow.
pub const SELECT_BIT_IMAGE_MODE: &[u8] = &[ESC, 42, 33, 0x80, 0];

pub const SET_LINE_SPACING_24: &[u8] = &[ESC, 51, 24];
pub const SET_LINE_SPACING_30: &[u8] = &[ESC, 51, 30];

// Real-time status requests (DLE EOT n). The printer answers with one byte
// on the back channel, which this crate never reads.
pub const TRANSMIT_DLE_PRINTER_STATUS: &[u8] = &[DLE, EOT, 1];
pub const TRANSMIT_DLE_OFFLINE_PRINTER_STATUS: &[u8] = &[DLE, EOT, 2];
pub const TRANSMIT_DLE_ERROR_STATUS: &[u8] = &[DLE, EOT, 3];
pub const TRANSMIT_DLE_ROLL_PAPER_SENSOR_STATUS: &[u8] = &[DLE, EOT, 4];

pub const ESC_FONT_COLOR_DEFAULT: &[u8] = &[ESC, 114, 0];
pub const FS_FONT_ALIGN: &[u8] = &[FS, 33, 1, ESC, 33, 1];
pub const ESC_ALIGN_LEFT: &[u8] = &[ESC, 97, 0];
pub const ESC_ALIGN_RIGHT: &[u8] = &[ESC, 97, 2];
pub const ESC_ALIGN_CENTER: &[u8] = &[ESC, 97, 1];
pub const ESC_CANCEL_BOLD: &[u8] = &[ESC, 69, 0];
pub const ESC_HORIZONTAL_CENTERS: &[u8] = &[ESC, 68, 20, FS, 0];
pub const ESC_CANCEL_HORIZONTAL_CENTERS: &[u8] = &[ESC, 68, 0];

/// # Print and Feed 64 Dots (ESC J 64)
pub const ESC_ENTER: &[u8] = &[ESC, 74, 64];

/// # Self Test (GS ( A)
pub const PRINT_TEST: &[u8] = &[GS, 40, 65];

// ============================================================================
// LOOKUP
// ============================================================================

/// Symbolic names for every multi-byte sequence above.
const TABLE: &[(&str, &[u8])] = &[
    ("enter", ENTER),
    ("reset_printer", RESET_PRINTER),
    ("cancel_multibyte", CANCEL_MULTIBYTE),
    ("select_escape_charset", SELECT_ESCAPE_CHARSET),
    ("size_0", SIZE[0]),
    ("size_1", SIZE[1]),
    ("size_2", SIZE[2]),
    ("size_3", SIZE[3]),
    ("size_4", SIZE[4]),
    ("size_5", SIZE[5]),
    ("init", INIT),
    ("feed_line", FEED_LINE),
    ("select_font_a", SELECT_FONT_A),
    ("set_bar_code_height", SET_BAR_CODE_HEIGHT),
    ("print_bar_code_1", PRINT_BAR_CODE_1),
    ("send_null_byte", SEND_NULL_BYTE),
    ("select_print_sheet", SELECT_PRINT_SHEET),
    ("feed_paper_and_cut", FEED_PAPER_AND_CUT),
    (
        "select_cyrillic_character_code_table",
        SELECT_CYRILLIC_CHARACTER_CODE_TABLE,
    ),
    ("select_bit_image_mode", SELECT_BIT_IMAGE_MODE),
    ("set_line_spacing_24", SET_LINE_SPACING_24),
    ("set_line_spacing_30", SET_LINE_SPACING_30),
    ("transmit_dle_printer_status", TRANSMIT_DLE_PRINTER_STATUS),
    (
        "transmit_dle_offline_printer_status",
        TRANSMIT_DLE_OFFLINE_PRINTER_STATUS,
    ),
    ("transmit_dle_error_status", TRANSMIT_DLE_ERROR_STATUS),
    (
        "transmit_dle_roll_paper_sensor_status",
        TRANSMIT_DLE_ROLL_PAPER_SENSOR_STATUS,
    ),
    ("esc_font_color_default", ESC_FONT_COLOR_DEFAULT),
    ("fs_font_align", FS_FONT_ALIGN),
    ("esc_align_left", ESC_ALIGN_LEFT),
    ("esc_align_right", ESC_ALIGN_RIGHT),
    ("esc_align_center", ESC_ALIGN_CENTER),
    ("esc_cancel_bold", ESC_CANCEL_BOLD),
    ("esc_horizontal_centers", ESC_HORIZONTAL_CENTERS),
    ("esc_cancel_horizontal_centers", ESC_CANCEL_HORIZONTAL_CENTERS),
    ("esc_enter", ESC_ENTER),
    ("print_test", PRINT_TEST),
];

/// Look up a command by its snake_case name (case-insensitive).
///
/// ## Example
///
/// ```
/// use btprinter::protocol::commands;
///
/// assert_eq!(commands::by_name("esc_align_center"), Some(&[0x1B, 0x61, 0x01][..]));
/// assert_eq!(commands::by_name("nope"), None);
/// ```
pub fn by_name(name: &str) -> Option<&'static [u8]> {
    TABLE
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, bytes)| *bytes)
}

/// All command names, in table order.
pub fn list_commands() -> impl Iterator<Item = &'static str> {
    TABLE.iter().map(|(name, _)| *name)
}

// ============================================================================
// TESTS
// ============================================================================
