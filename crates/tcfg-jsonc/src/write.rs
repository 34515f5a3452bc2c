// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt::{self, Write as _};

use crate::value::{Array, Object, Value};

/// Quote and escape a string as a JSON string literal.
pub(crate) fn quote(s: &str) -> String {
	let mut out = String::with_capacity(s.len() + 2);
	out.push('"');
	for c in s.chars() {
		match c {
			'"' => out.push_str("\\\""),
			'\\' => out.push_str("\\\\"),
			'\n' => out.push_str("\\n"),
			'\r' => out.push_str("\\r"),
			'\t' => out.push_str("\\t"),
			'\u{8}' => out.push_str("\\b"),
			'\u{c}' => out.push_str("\\f"),
			c if (c as u32) < 0x20 => {
				let _ = write!(out, "\\u{:04x}", c as u32);
			}
			c => out.push(c),
		}
	}
	out.push('"');
	out
}

impl fmt::Display for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Value::Null => f.write_str("null"),
			Value::Bool(b) => write!(f, "{b}"),
			Value::Number(n) => f.write_str(n.as_str()),
			Value::String(s) => f.write_str(&quote(s)),
			Value::Array(a) => a.fmt(f),
			Value::Object(o) => o.fmt(f),
		}
	}
}

impl fmt::Display for Object {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_char('{')?;
		let last = self.members.len().saturating_sub(1);
		for (idx, m) in self.members.iter().enumerate() {
			write!(
				f,
				"{}{}{}:{}{}{}",
				m.leading, m.raw_key, m.before_colon, m.after_colon, m.value, m.after_value
			)?;
			if idx < last || self.trailing_comma {
				f.write_char(',')?;
			}
		}
		f.write_str(&self.trailing)?;
		f.write_char('}')
	}
}

impl fmt::Display for Array {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_char('[')?;
		let last = self.items.len().saturating_sub(1);
		for (idx, item) in self.items.iter().enumerate() {
			write!(f, "{}{}{}", item.leading, item.value, item.after_value)?;
			if idx < last || self.trailing_comma {
				f.write_char(',')?;
			}
		}
		f.write_str(&self.trailing)?;
		f.write_char(']')
	}
}
