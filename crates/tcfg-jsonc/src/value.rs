// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Lossless value tree.
//!
//! Trivia fields hold the exact whitespace and comments from the source.
//! For an object member the layout is
//! `leading "key" before_colon : after_colon value after_value [,]`
//! and the object's own `trailing` trivia sits right before the closing brace.

use crate::INDENT;

/// A JSONC value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
	Null,
	Bool(bool),
	Number(Number),
	String(String),
	Array(Array),
	Object(Object),
}

/// A number kept in its source spelling (`1.50` stays `1.50`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Number {
	raw: String,
}

/// An object with its members in source order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Object {
	pub(crate) members: Vec<Member>,
	pub(crate) trailing: String,
	pub(crate) trailing_comma: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Member {
	pub(crate) leading: String,
	pub(crate) raw_key: String,
	pub(crate) key: String,
	pub(crate) before_colon: String,
	pub(crate) after_colon: String,
	pub(crate) value: Value,
	pub(crate) after_value: String,
}

/// An array with its items in source order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Array {
	pub(crate) items: Vec<ArrayItem>,
	pub(crate) trailing: String,
	pub(crate) trailing_comma: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayItem {
	pub(crate) leading: String,
	pub(crate) value: Value,
	pub(crate) after_value: String,
}

impl Number {
	pub(crate) fn from_raw(raw: &str) -> Self {
		Self {
			raw: raw.to_string(),
		}
	}

	pub fn as_str(&self) -> &str {
		&self.raw
	}

	pub fn as_f64(&self) -> Option<f64> {
		self.raw.parse().ok()
	}

	pub fn as_i64(&self) -> Option<i64> {
		self.raw.parse().ok()
	}

	fn to_json(&self) -> serde_json::Value {
		// Out-of-range literals degrade to their text rather than failing the read.
		serde_json::from_str::<serde_json::Number>(&self.raw)
			.map(serde_json::Value::Number)
			.unwrap_or_else(|_| serde_json::Value::String(self.raw.clone()))
	}
}

impl From<&serde_json::Number> for Number {
	fn from(n: &serde_json::Number) -> Self {
		Self { raw: n.to_string() }
	}
}

impl Value {
	pub fn is_null(&self) -> bool {
		matches!(self, Value::Null)
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::String(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Value::Bool(b) => Some(*b),
			_ => None,
		}
	}

	pub fn as_object(&self) -> Option<&Object> {
		match self {
			Value::Object(o) => Some(o),
			_ => None,
		}
	}

	pub fn as_object_mut(&mut self) -> Option<&mut Object> {
		match self {
			Value::Object(o) => Some(o),
			_ => None,
		}
	}

	pub fn as_array(&self) -> Option<&Array> {
		match self {
			Value::Array(a) => Some(a),
			_ => None,
		}
	}

	pub fn as_array_mut(&mut self) -> Option<&mut Array> {
		match self {
			Value::Array(a) => Some(a),
			_ => None,
		}
	}

	/// Plain structural view, dropping all trivia.
	pub fn to_json(&self) -> serde_json::Value {
		match self {
			Value::Null => serde_json::Value::Null,
			Value::Bool(b) => serde_json::Value::Bool(*b),
			Value::Number(n) => n.to_json(),
			Value::String(s) => serde_json::Value::String(s.clone()),
			Value::Array(a) => serde_json::Value::Array(a.items.iter().map(|i| i.value.to_json()).collect()),
			Value::Object(o) => serde_json::Value::Object(
				o.members
					.iter()
					.map(|m| (m.key.clone(), m.value.to_json()))
					.collect(),
			),
		}
	}

	/// Build a freshly formatted value.
	///
	/// `indent` is the indentation of the line the value starts on; `None`
	/// lays containers out on a single line.
	pub fn from_json(json: &serde_json::Value, indent: Option<&str>) -> Self {
		match json {
			serde_json::Value::Null => Value::Null,
			serde_json::Value::Bool(b) => Value::Bool(*b),
			serde_json::Value::Number(n) => Value::Number(n.into()),
			serde_json::Value::String(s) => Value::String(s.clone()),
			serde_json::Value::Array(items) => {
				let mut array = Array::default();
				let child = indent.map(|i| format!("{i}{INDENT}"));
				for (idx, item) in items.iter().enumerate() {
					array.items.push(ArrayItem {
						leading: fresh_leading(child.as_deref(), idx),
						value: Value::from_json(item, child.as_deref()),
						after_value: String::new(),
					});
				}
				if let (Some(i), false) = (indent, items.is_empty()) {
					array.trailing = format!("\n{i}");
				}
				Value::Array(array)
			}
			serde_json::Value::Object(map) => {
				let mut object = Object::default();
				let child = indent.map(|i| format!("{i}{INDENT}"));
				for (idx, (key, value)) in map.iter().enumerate() {
					object.members.push(Member::fresh(
						key,
						Value::from_json(value, child.as_deref()),
						fresh_leading(child.as_deref(), idx),
					));
				}
				if let (Some(i), false) = (indent, map.is_empty()) {
					object.trailing = format!("\n{i}");
				}
				Value::Object(object)
			}
		}
	}
}

fn fresh_leading(indent: Option<&str>, idx: usize) -> String {
	match indent {
		Some(i) => format!("\n{i}"),
		None if idx == 0 => String::new(),
		None => " ".to_string(),
	}
}

/// Split trivia at its first newline; the second part keeps the newline.
fn split_line(trivia: &str) -> (&str, &str) {
	trivia.split_at(trivia.find('\n').unwrap_or(trivia.len()))
}

/// Text after the last newline, if the trivia spans lines.
fn line_indent(trivia: &str) -> Option<&str> {
	trivia.rfind('\n').map(|nl| &trivia[nl + 1..])
}

impl Member {
	pub(crate) fn fresh(key: &str, value: Value, leading: String) -> Self {
		Self {
			leading,
			raw_key: crate::write::quote(key),
			key: key.to_string(),
			before_colon: String::new(),
			after_colon: " ".to_string(),
			value,
			after_value: String::new(),
		}
	}

	pub fn key(&self) -> &str {
		&self.key
	}

	pub fn value(&self) -> &Value {
		&self.value
	}

	/// Indentation of the line holding this member, `None` if inline.
	pub(crate) fn indent(&self) -> Option<&str> {
		line_indent(&self.leading)
	}
}

impl Object {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.members.len()
	}

	pub fn is_empty(&self) -> bool {
		self.members.is_empty()
	}

	fn position(&self, key: &str) -> Option<usize> {
		// Later duplicates win.
		self.members.iter().rposition(|m| m.key == key)
	}

	pub fn contains_key(&self, key: &str) -> bool {
		self.position(key).is_some()
	}

	pub fn get(&self, key: &str) -> Option<&Value> {
		self.position(key).map(|i| &self.members[i].value)
	}

	pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
		let idx = self.position(key)?;
		Some(&mut self.members[idx].value)
	}

	pub fn keys(&self) -> impl Iterator<Item = &str> {
		self.members.iter().map(|m| m.key.as_str())
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
		self.members.iter().map(|m| (m.key.as_str(), &m.value))
	}

	/// Indentation new members should use; `own_indent` is the indentation
	/// of the line the object itself starts on. `None` means the object is
	/// laid out on one line.
	pub(crate) fn member_indent(&self, own_indent: &str) -> Option<String> {
		if let Some(first) = self.members.first() {
			return first.indent().map(str::to_string);
		}
		match line_indent(&self.trailing) {
			Some(closing) => Some(format!("{closing}{INDENT}")),
			None => Some(format!("{own_indent}{INDENT}")),
		}
	}

	/// Replace the value under `key` keeping its surrounding trivia, or
	/// append a new member.
	pub fn insert(&mut self, key: &str, value: Value) -> Option<Value> {
		if let Some(idx) = self.position(key) {
			return Some(std::mem::replace(&mut self.members[idx].value, value));
		}
		let indent = self.member_indent("");
		self.push(key, value, indent.as_deref());
		None
	}

	/// Like [`Object::insert`] but formats a fresh value from JSON so that
	/// nested containers line up with the member's indentation.
	pub fn insert_json(&mut self, key: &str, json: &serde_json::Value, own_indent: &str) {
		if let Some(idx) = self.position(key) {
			let indent = self.members[idx].indent().map(str::to_string);
			self.members[idx].value = Value::from_json(json, indent.as_deref());
			return;
		}
		let indent = self.member_indent(own_indent);
		let value = Value::from_json(json, indent.as_deref());
		self.push(key, value, indent.as_deref());
	}

	pub(crate) fn push(&mut self, key: &str, value: Value, indent: Option<&str>) {
		let mut leading = match indent {
			Some(i) => format!("\n{i}"),
			None if self.members.is_empty() => String::new(),
			None => " ".to_string(),
		};

		if self.members.is_empty() {
			if let Some(i) = indent {
				if !self.trailing.contains('\n') {
					self.trailing = format!("\n{}", i.strip_suffix(INDENT).unwrap_or(""));
				}
			}
		} else if let Some(nl) = self.trailing.find('\n') {
			// Keep a same-line comment after the previous member on its line.
			let same_line = self.trailing[..nl].to_string();
			self.trailing = self.trailing[nl..].to_string();
			leading = format!("{same_line}{leading}");
		}

		self.members.push(Member::fresh(key, value, leading));
	}

	/// Move a member to the front, keeping the first slot's layout.
	pub fn move_to_front(&mut self, key: &str) {
		let Some(idx) = self.position(key) else {
			return;
		};
		if idx == 0 {
			return;
		}
		let mut member = self.members.remove(idx);
		let first = &mut self.members[0];
		std::mem::swap(&mut member.leading, &mut first.leading);
		if idx == self.members.len() {
			member.after_value.clear();
		}
		self.members.insert(0, member);
	}

	/// Remove a member. A comment sharing the line with the previous member
	/// stays on that line.
	pub fn remove(&mut self, key: &str) -> Option<Value> {
		let idx = self.position(key)?;
		let removed = self.members.remove(idx);
		if idx == 0 {
			if let Some(next) = self.members.first_mut() {
				if next.leading.trim().is_empty() {
					next.leading = removed.leading;
				}
			}
			return Some(removed.value);
		}

		let (same_line, _) = split_line(&removed.leading);
		if !same_line.trim().is_empty() {
			let follower = match self.members.get_mut(idx) {
				Some(next) => &mut next.leading,
				None => &mut self.trailing,
			};
			let (_, rest) = split_line(follower);
			*follower = format!("{same_line}{rest}");
		}
		Some(removed.value)
	}
}

impl Array {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.items.len()
	}

	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &Value> {
		self.items.iter().map(|i| &i.value)
	}

	pub fn get(&self, idx: usize) -> Option<&Value> {
		self.items.get(idx).map(|i| &i.value)
	}

	/// Append a value after the last item using the existing item layout.
	pub fn push(&mut self, value: Value) {
		let indent = self.items.first().and_then(|i| line_indent(&i.leading)).map(str::to_string);
		let mut leading = match (&indent, self.items.is_empty()) {
			(Some(i), _) => format!("\n{i}"),
			(None, true) => String::new(),
			(None, false) => " ".to_string(),
		};
		if !self.items.is_empty() {
			if let Some(nl) = self.trailing.find('\n') {
				let same_line = self.trailing[..nl].to_string();
				self.trailing = self.trailing[nl..].to_string();
				leading = format!("{same_line}{leading}");
			}
		}
		self.items.push(ArrayItem {
			leading,
			value,
			after_value: String::new(),
		});
	}

	/// Keep only the items for which `keep` returns true.
	pub fn retain(&mut self, mut keep: impl FnMut(&Value) -> bool) {
		let first_leading = self.items.first().map(|i| i.leading.clone());
		self.items.retain(|i| keep(&i.value));
		if let (Some(first), Some(leading)) = (self.items.first_mut(), first_leading) {
			first.leading = leading;
		}
		if self.items.is_empty() && !self.trailing.contains('\n') {
			self.trailing.clear();
		}
	}
}
