// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;

use crate::value::{Object, Value};

/// A parsed JSONC file: the top-level value plus the comments around it.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
	leading: String,
	root: Value,
	trailing: String,
}

impl Default for Document {
	fn default() -> Self {
		Self::from_json(&serde_json::Value::Object(serde_json::Map::new()))
	}
}

impl Document {
	pub(crate) fn from_parts(leading: String, root: Value, trailing: String) -> Self {
		Self {
			leading,
			root,
			trailing,
		}
	}

	/// A freshly formatted document.
	pub fn from_json(json: &serde_json::Value) -> Self {
		Self {
			leading: String::new(),
			root: Value::from_json(json, Some("")),
			trailing: "\n".to_string(),
		}
	}

	pub fn root(&self) -> &Value {
		&self.root
	}

	pub fn root_mut(&mut self) -> &mut Value {
		&mut self.root
	}

	pub fn to_json(&self) -> serde_json::Value {
		self.root.to_json()
	}

	/// Look up a value by object keys.
	pub fn get(&self, path: &[&str]) -> Option<&Value> {
		path.iter()
			.try_fold(&self.root, |value, key| value.as_object()?.get(key))
	}

	pub fn get_mut(&mut self, path: &[&str]) -> Option<&mut Value> {
		path.iter()
			.try_fold(&mut self.root, |value, key| value.as_object_mut()?.get_mut(key))
	}

	/// Set the value at `path`, creating intermediate objects as needed.
	///
	/// An intermediate that exists but is not an object is replaced. Trivia
	/// around every untouched member is left alone.
	pub fn set(&mut self, path: &[&str], json: &serde_json::Value) {
		if path.is_empty() {
			self.root = Value::from_json(json, Some(""));
			return;
		}
		if self.root.as_object().is_none() {
			self.root = Value::Object(Object::new());
		}
		if let Some(root) = self.root.as_object_mut() {
			set_in(root, "", path, json);
		}
	}

	/// Set a top-level key and move it to the front of the root object.
	pub fn set_first(&mut self, key: &str, json: &serde_json::Value) {
		self.set(&[key], json);
		if let Some(root) = self.root.as_object_mut() {
			root.move_to_front(key);
		}
	}

	/// Remove the value at `path`. Missing paths are a no-op.
	pub fn remove(&mut self, path: &[&str]) -> Option<Value> {
		let (last, parents) = path.split_last()?;
		self.get_mut(parents)?.as_object_mut()?.remove(last)
	}
}

fn set_in(obj: &mut Object, own_indent: &str, path: &[&str], json: &serde_json::Value) {
	let Some((key, rest)) = path.split_first() else {
		return;
	};
	if rest.is_empty() {
		obj.insert_json(key, json, own_indent);
		return;
	}

	if !obj.get(key).is_some_and(|v| v.as_object().is_some()) {
		obj.insert_json(key, &serde_json::Value::Object(serde_json::Map::new()), own_indent);
	}
	let child_indent = obj
		.members
		.iter()
		.rev()
		.find(|m| m.key == *key)
		.and_then(|m| m.indent())
		.unwrap_or(own_indent)
		.to_string();
	if let Some(child) = obj.get_mut(key).and_then(Value::as_object_mut) {
		set_in(child, &child_indent, rest, json);
	}
}

impl fmt::Display for Document {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}{}{}", self.leading, self.root, self.trailing)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::parse;
	use proptest::prelude::*;
	use serde_json::json;

	const TEAM_CONFIG: &str = r#"// team configuration
{
    "$schema": "./app.schema.json",
    "profiles": {
        /* shared host */
        "base": {
            "properties": {
                "host": "example.com", // prod
                "port": 443,
            },
            "secure": []
        }
    },
    "defaults": { "base": "base" },
    "autoStore": true
}
"#;

	#[test]
	fn untouched_text_round_trips_exactly() {
		let doc = parse(TEAM_CONFIG).unwrap();
		assert_eq!(doc.to_string(), TEAM_CONFIG);
	}

	#[test]
	fn nested_set_preserves_comments() {
		let mut doc = parse(TEAM_CONFIG).unwrap();
		doc.set(&["profiles", "base", "properties", "port"], &json!(1443));
		doc.set(&["profiles", "base", "properties", "user"], &json!("admin"));

		let out = doc.to_string();
		assert!(out.starts_with("// team configuration\n"));
		assert!(out.contains("/* shared host */"));
		assert!(out.contains("\"host\": \"example.com\", // prod"));
		assert!(out.contains("\"port\": 1443,\n                \"user\": \"admin\","));
		assert_eq!(
			doc.get(&["profiles", "base", "properties", "user"]),
			Some(&Value::String("admin".into()))
		);
	}

	#[test]
	fn set_creates_missing_intermediates() {
		let mut doc = parse("{}").unwrap();
		doc.set(&["profiles", "lpar1", "properties", "port"], &json!(23));
		assert_eq!(
			doc.to_json(),
			json!({ "profiles": { "lpar1": { "properties": { "port": 23 } } } })
		);
		assert_eq!(
			doc.to_string(),
			"{\n    \"profiles\": {\n        \"lpar1\": {\n            \"properties\": {\n                \"port\": 23\n            }\n        }\n    }\n}"
		);
	}

	#[test]
	fn set_replaces_non_object_intermediate() {
		let mut doc = parse(r#"{"a": 5}"#).unwrap();
		doc.set(&["a", "b"], &json!(true));
		assert_eq!(doc.to_json(), json!({ "a": { "b": true } }));
	}

	#[test]
	fn set_first_moves_schema_to_front() {
		let mut doc = parse("{\n    \"profiles\": {}\n}").unwrap();
		doc.set_first("$schema", &json!("./x.schema.json"));
		assert_eq!(
			doc.to_string(),
			"{\n    \"$schema\": \"./x.schema.json\",\n    \"profiles\": {}\n}"
		);
	}

	#[test]
	fn remove_missing_path_is_noop() {
		let mut doc = parse(TEAM_CONFIG).unwrap();
		assert!(doc.remove(&["profiles", "nope", "properties"]).is_none());
		assert_eq!(doc.to_string(), TEAM_CONFIG);
	}

	#[test]
	fn set_then_remove_keeps_same_line_comment() {
		let src = "{\n    \"host\": \"h\" // prod host\n}";
		let mut doc = parse(src).unwrap();
		doc.set(&["password"], &json!("pw"));
		assert_eq!(doc.to_string(), "{\n    \"host\": \"h\", // prod host\n    \"password\": \"pw\"\n}");
		doc.remove(&["password"]);
		assert_eq!(doc.to_string(), src);
	}

	#[test]
	fn remove_middle_member_keeps_previous_comment() {
		let mut doc = parse("{\n    \"a\": 1, // keep\n    \"b\": 2, // about b\n    \"c\": 3\n}").unwrap();
		doc.remove(&["b"]);
		assert_eq!(doc.to_string(), "{\n    \"a\": 1, // keep\n    \"c\": 3\n}");
	}

	#[test]
	fn remove_nested_property() {
		let mut doc = parse(TEAM_CONFIG).unwrap();
		let removed = doc.remove(&["profiles", "base", "properties", "port"]);
		assert!(removed.is_some());
		assert_eq!(
			doc.get(&["profiles", "base", "properties"]).map(Value::to_json),
			Some(json!({ "host": "example.com" }))
		);
	}

	fn arb_json() -> impl Strategy<Value = serde_json::Value> {
		let leaf = prop_oneof![
			Just(serde_json::Value::Null),
			any::<bool>().prop_map(serde_json::Value::Bool),
			any::<i32>().prop_map(|n| json!(n)),
			"[a-zA-Z0-9 _./\\\\\"-]{0,12}".prop_map(serde_json::Value::String),
		];
		leaf.prop_recursive(3, 24, 4, |inner| {
			prop_oneof![
				prop::collection::vec(inner.clone(), 0..4).prop_map(serde_json::Value::Array),
				prop::collection::btree_map("[a-z$]{1,6}", inner, 0..4)
					.prop_map(|m| serde_json::Value::Object(m.into_iter().collect())),
			]
		})
	}

	proptest! {
		#[test]
		fn generated_documents_reparse_to_same_tree(json in arb_json()) {
			let text = Document::from_json(&json).to_string();
			let doc = parse(&text).unwrap();
			prop_assert_eq!(doc.to_json(), json);
			prop_assert_eq!(doc.to_string(), text);
		}
	}
}
