// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Recursive-descent JSONC parser that keeps trivia.

use crate::document::Document;
use crate::error::ParseError;
use crate::value::{Array, ArrayItem, Member, Number, Object, Value};

pub(crate) struct Parser<'a> {
	src: &'a str,
	pos: usize,
}

impl<'a> Parser<'a> {
	pub(crate) fn new(src: &'a str) -> Self {
		Self { src, pos: 0 }
	}

	pub(crate) fn document(mut self) -> Result<Document, ParseError> {
		let leading = self.trivia()?;
		if self.peek().is_none() {
			return Err(self.error("unexpected end of input, expected a value"));
		}
		let root = self.value()?;
		let trailing = self.trivia()?;
		if self.peek().is_some() {
			return Err(self.error("unexpected content after the top-level value"));
		}
		Ok(Document::from_parts(leading, root, trailing))
	}

	fn peek(&self) -> Option<char> {
		self.src[self.pos..].chars().next()
	}

	fn bump(&mut self) -> Option<char> {
		let c = self.peek()?;
		self.pos += c.len_utf8();
		Some(c)
	}

	fn eat(&mut self, expected: char) -> bool {
		if self.peek() == Some(expected) {
			self.pos += expected.len_utf8();
			true
		} else {
			false
		}
	}

	fn expect(&mut self, expected: char) -> Result<(), ParseError> {
		if self.eat(expected) {
			Ok(())
		} else {
			Err(self.error(format!("expected '{expected}'")))
		}
	}

	fn error(&self, message: impl Into<String>) -> ParseError {
		ParseError::at(self.src, self.pos, message)
	}

	/// Consume whitespace and comments, returning them verbatim.
	fn trivia(&mut self) -> Result<String, ParseError> {
		let start = self.pos;
		loop {
			let rest = &self.src[self.pos..];
			if rest.starts_with("//") {
				self.pos += rest.find('\n').unwrap_or(rest.len());
			} else if rest.starts_with("/*") {
				match rest[2..].find("*/") {
					Some(end) => self.pos += end + 4,
					None => return Err(self.error("unterminated block comment")),
				}
			} else if let Some(c) = self.peek().filter(|c| c.is_whitespace() || *c == '\u{feff}') {
				self.pos += c.len_utf8();
			} else {
				break;
			}
		}
		Ok(self.src[start..self.pos].to_string())
	}

	fn value(&mut self) -> Result<Value, ParseError> {
		match self.peek() {
			Some('{') => Ok(Value::Object(self.object()?)),
			Some('[') => Ok(Value::Array(self.array()?)),
			Some('"') => Ok(Value::String(self.string()?)),
			Some('t') => self.literal("true", Value::Bool(true)),
			Some('f') => self.literal("false", Value::Bool(false)),
			Some('n') => self.literal("null", Value::Null),
			Some(c) if c == '-' || c.is_ascii_digit() => Ok(Value::Number(self.number()?)),
			Some(c) => Err(self.error(format!("unexpected character '{c}'"))),
			None => Err(self.error("unexpected end of input, expected a value")),
		}
	}

	fn literal(&mut self, word: &str, value: Value) -> Result<Value, ParseError> {
		if self.src[self.pos..].starts_with(word) {
			self.pos += word.len();
			Ok(value)
		} else {
			Err(self.error(format!("invalid literal, expected '{word}'")))
		}
	}

	fn object(&mut self) -> Result<Object, ParseError> {
		self.expect('{')?;
		let mut object = Object::default();
		let mut leading = self.trivia()?;
		if self.eat('}') {
			object.trailing = leading;
			return Ok(object);
		}

		loop {
			if self.peek() != Some('"') {
				return Err(self.error("expected a double-quoted property name"));
			}
			let key_start = self.pos;
			let key = self.string()?;
			let raw_key = self.src[key_start..self.pos].to_string();
			let before_colon = self.trivia()?;
			self.expect(':')?;
			let after_colon = self.trivia()?;
			let value = self.value()?;
			let after = self.trivia()?;

			let sep_pos = self.pos;
			let closed = match self.bump() {
				Some(',') => false,
				Some('}') => true,
				_ => return Err(ParseError::at(self.src, sep_pos, "expected ',' or '}'")),
			};
			let (after_value, tail) = if closed {
				(String::new(), Some(after))
			} else {
				(after, None)
			};
			object.members.push(Member {
				leading: std::mem::take(&mut leading),
				raw_key,
				key,
				before_colon,
				after_colon,
				value,
				after_value,
			});
			if let Some(trailing) = tail {
				object.trailing = trailing;
				return Ok(object);
			}

			leading = self.trivia()?;
			if self.eat('}') {
				object.trailing = leading;
				object.trailing_comma = true;
				return Ok(object);
			}
		}
	}

	fn array(&mut self) -> Result<Array, ParseError> {
		self.expect('[')?;
		let mut array = Array::default();
		let mut leading = self.trivia()?;
		if self.eat(']') {
			array.trailing = leading;
			return Ok(array);
		}

		loop {
			let value = self.value()?;
			let after = self.trivia()?;
			let sep_pos = self.pos;
			let closed = match self.bump() {
				Some(',') => false,
				Some(']') => true,
				_ => return Err(ParseError::at(self.src, sep_pos, "expected ',' or ']'")),
			};
			let (after_value, tail) = if closed {
				(String::new(), Some(after))
			} else {
				(after, None)
			};
			array.items.push(ArrayItem {
				leading: std::mem::take(&mut leading),
				value,
				after_value,
			});
			if let Some(trailing) = tail {
				array.trailing = trailing;
				return Ok(array);
			}

			leading = self.trivia()?;
			if self.eat(']') {
				array.trailing = leading;
				array.trailing_comma = true;
				return Ok(array);
			}
		}
	}

	fn string(&mut self) -> Result<String, ParseError> {
		self.expect('"')?;
		let mut out = String::new();
		loop {
			let esc_pos = self.pos;
			match self.bump() {
				Some('"') => return Ok(out),
				Some('\\') => match self.bump() {
					Some('"') => out.push('"'),
					Some('\\') => out.push('\\'),
					Some('/') => out.push('/'),
					Some('b') => out.push('\u{8}'),
					Some('f') => out.push('\u{c}'),
					Some('n') => out.push('\n'),
					Some('r') => out.push('\r'),
					Some('t') => out.push('\t'),
					Some('u') => out.push(self.unicode_escape()?),
					_ => return Err(ParseError::at(self.src, esc_pos, "invalid escape sequence")),
				},
				Some(c) => out.push(c),
				None => return Err(self.error("unterminated string")),
			}
		}
	}

	fn hex4(&mut self) -> Result<u32, ParseError> {
		let digits = self.src.get(self.pos..self.pos + 4).unwrap_or("");
		if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
			return Err(self.error("invalid unicode escape"));
		}
		let code = u32::from_str_radix(digits, 16).map_err(|_| self.error("invalid unicode escape"))?;
		self.pos += 4;
		Ok(code)
	}

	fn unicode_escape(&mut self) -> Result<char, ParseError> {
		let high = self.hex4()?;
		if (0xD800..0xDC00).contains(&high) && self.src[self.pos..].starts_with("\\u") {
			let save = self.pos;
			self.pos += 2;
			let low = self.hex4()?;
			if (0xDC00..0xE000).contains(&low) {
				let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
				return Ok(char::from_u32(code).unwrap_or('\u{fffd}'));
			}
			self.pos = save;
		}
		Ok(char::from_u32(high).unwrap_or('\u{fffd}'))
	}

	fn number(&mut self) -> Result<Number, ParseError> {
		let start = self.pos;
		self.eat('-');
		match self.peek() {
			Some('0') => {
				self.pos += 1;
			}
			Some(c) if c.is_ascii_digit() => self.digits(),
			_ => return Err(self.error("invalid number")),
		}
		if self.eat('.') {
			if !self.peek().is_some_and(|c| c.is_ascii_digit()) {
				return Err(self.error("expected digits after decimal point"));
			}
			self.digits();
		}
		if self.eat('e') || self.eat('E') {
			if !self.eat('+') {
				self.eat('-');
			}
			if !self.peek().is_some_and(|c| c.is_ascii_digit()) {
				return Err(self.error("expected digits in exponent"));
			}
			self.digits();
		}
		Ok(Number::from_raw(&self.src[start..self.pos]))
	}

	fn digits(&mut self) {
		while self.peek().is_some_and(|c| c.is_ascii_digit()) {
			self.pos += 1;
		}
	}
}

#[cfg(test)]
mod tests {
	use crate::parse;
	use serde_json::json;

	#[test]
	fn parses_comments_and_trailing_commas() {
		let src = r#"
// leading comment
{
    /* block */ "a": 1, // after a
    "b": [true, false, null,],
    "c": { "d": "e" },
}
"#;
		let doc = parse(src).unwrap();
		assert_eq!(
			doc.to_json(),
			json!({ "a": 1, "b": [true, false, null], "c": { "d": "e" } })
		);
	}

	#[test]
	fn decodes_escapes_and_surrogates() {
		let doc = parse(r#"{"s": "a\"b\\c\né😀", "t": "\ud83d\ude00\u0041"}"#).unwrap();
		assert_eq!(
			doc.to_json(),
			json!({ "s": "a\"b\\c\n\u{e9}\u{1f600}", "t": "\u{1f600}A" })
		);
	}

	#[test]
	fn reports_line_and_column() {
		let err = parse("{\n    \"a\": 1\n    \"b\": 2\n}").unwrap_err();
		assert_eq!(err.line, 3);
		assert_eq!(err.column, 5);
		assert!(err.message.contains("expected ','"));
	}

	#[test]
	fn rejects_unterminated_block_comment() {
		let err = parse("{ /* nope }").unwrap_err();
		assert!(err.message.contains("unterminated block comment"));
	}

	#[test]
	fn rejects_empty_input() {
		assert!(parse("  // only a comment\n").is_err());
	}

	#[test]
	fn rejects_trailing_garbage() {
		assert!(parse("{} {}").is_err());
	}

	#[test]
	fn rejects_bad_numbers() {
		assert!(parse("[1.]").is_err());
		assert!(parse("[-]").is_err());
		assert!(parse("[1e]").is_err());
	}

	#[test]
	fn keeps_number_text() {
		let doc = parse("[1.50, -0, 2E+3]").unwrap();
		assert_eq!(doc.to_string(), "[1.50, -0, 2E+3]");
	}
}
