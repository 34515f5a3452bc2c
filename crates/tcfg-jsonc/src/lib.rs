// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Comment-preserving JSON for team configuration files.
//!
//! Configuration files are JSON with `//` and `/* */` comments and trailing
//! commas. A plain parse/stringify cycle would drop the comments and reflow
//! the whole file every time a single property changes, so this crate parses
//! into a lossless tree instead: every object member and array item carries
//! the whitespace and comments that surrounded it in the source text.
//!
//! Untouched regions serialize back byte-for-byte. Edited regions are laid
//! out using the indentation already present around them.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//!
//! let src = "{\n    // connection\n    \"host\": \"a\",\n}";
//! let mut doc = tcfg_jsonc::parse(src).unwrap();
//!
//! doc.set(&["port"], &json!(443));
//! assert_eq!(
//! 	doc.to_string(),
//! 	"{\n    // connection\n    \"host\": \"a\",\n    \"port\": 443,\n}"
//! );
//! ```

mod document;
mod error;
mod parse;
mod value;
mod write;

pub use document::Document;
pub use error::ParseError;
pub use value::{Array, ArrayItem, Member, Number, Object, Value};

/// Indentation unit used for freshly generated content.
pub const INDENT: &str = "    ";

/// Parse JSONC text into a [`Document`].
pub fn parse(text: &str) -> Result<Document, ParseError> {
	parse::Parser::new(text).document()
}
