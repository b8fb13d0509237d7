//! # ESC/POS Protocol Implementation
//!
//! This module provides the byte-level encoding for generic ESC/POS
//! thermal printers.
//!
//! ## Module Structure
//!
//! - [`commands`]: Fixed command table (text header, sizes, named opcodes)
//! - [`text`]: `<size>//<text>` directives and raw byte passthrough
//! - [`latin1`]: ISO-8859-1 text encoding
//!
//! ## Usage Example
//!
//! ```
//! use btprinter::protocol::{commands, text};
//!
//! let mut data = Vec::new();
//! data.extend(commands::ESC_ALIGN_CENTER);
//! data.extend(text::encode_text("4//RECEIPT\n"));
//! data.extend(commands::ESC_ALIGN_LEFT);
//! data.extend(text::encode_text("Total: 12.50\n"));
//! data.extend(commands::FEED_PAPER_AND_CUT);
//!
//! // Send `data` through a connection...
//! ```

pub mod commands;
pub mod latin1;
pub mod text;
