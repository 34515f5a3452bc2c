// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Profile type schemas and property typing.
//!
//! A [`ConfigSchema`] is the set of registered profile types. It renders to
//! (and loads from) the JSON Schema document written next to a config file,
//! and is used to coerce raw CLI strings into typed values.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::model::{ConfigDocument, ConfigProfile, Properties};
use crate::profiles::{profile_name_from_path, split_property_path};
use crate::ConfigError;

pub const JSON_SCHEMA_DRAFT: &str = "https://json-schema.org/draft/2020-12/schema";
pub const SCHEMA_VERSION: &str = "1.0";

/// One property of a profile type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileProperty {
	#[serde(rename = "type")]
	pub property_type: String,
	#[serde(default)]
	pub secure: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub default: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub allowable_values: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileSchema {
	#[serde(default)]
	pub title: Option<String>,
	#[serde(default)]
	pub description: Option<String>,
	#[serde(default)]
	pub properties: BTreeMap<String, ProfileProperty>,
	#[serde(default)]
	pub required: Vec<String>,
}

/// A registered profile type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileTypeConfiguration {
	#[serde(rename = "type")]
	pub profile_type: String,
	pub schema: ProfileSchema,
}

/// A property value checked against its declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
	String(String),
	Number(serde_json::Number),
	Boolean(bool),
	Json(Value),
}

/// A profile's properties, typed when its type is registered.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedProfile {
	Typed {
		profile_type: String,
		properties: BTreeMap<String, TypedValue>,
	},
	Untyped(Properties),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigSchema {
	types: Vec<ProfileTypeConfiguration>,
}

fn property_schema(prop: &ProfileProperty) -> Value {
	let mut out = Map::new();
	out.insert("type".into(), Value::String(prop.property_type.clone()));
	if let Some(description) = &prop.description {
		out.insert("description".into(), Value::String(description.clone()));
	}
	if let Some(default) = &prop.default {
		out.insert("default".into(), default.clone());
	}
	if let Some(values) = &prop.allowable_values {
		out.insert("enum".into(), Value::Array(values.clone()));
	}
	Value::Object(out)
}

fn type_schema(schema: &ProfileSchema) -> Value {
	let properties: Map<String, Value> = schema
		.properties
		.iter()
		.map(|(name, prop)| (name.clone(), property_schema(prop)))
		.collect();
	let secure: Vec<&String> = schema
		.properties
		.iter()
		.filter(|(_, p)| p.secure)
		.map(|(name, _)| name)
		.collect();

	let mut props = json!({
		"type": "object",
		"title": schema.title,
		"description": schema.description,
		"properties": properties,
	});
	if !schema.required.is_empty() {
		props["required"] = json!(schema.required);
	}

	if secure.is_empty() {
		json!({ "properties": props })
	} else {
		json!({ "properties": props, "secure": { "items": { "enum": secure } } })
	}
}

fn parse_type_schema(then: &Value) -> Result<ProfileSchema, ConfigError> {
	let props = &then["properties"];
	let secure: Vec<&str> = then["secure"]
		.get("items")
		.or_else(|| then["secure"].get("prefixItems"))
		.and_then(|items| items["enum"].as_array())
		.map(|names| names.iter().filter_map(Value::as_str).collect())
		.unwrap_or_default();

	let mut properties = BTreeMap::new();
	if let Some(map) = props["properties"].as_object() {
		for (name, prop) in map {
			let property_type = prop["type"]
				.as_str()
				.ok_or_else(|| ConfigError::SchemaValidation(format!("property '{name}' has no type")))?;
			properties.insert(
				name.clone(),
				ProfileProperty {
					property_type: property_type.to_string(),
					secure: secure.contains(&name.as_str()),
					description: prop["description"].as_str().map(str::to_string),
					default: prop.get("default").cloned(),
					allowable_values: prop["enum"].as_array().cloned(),
				},
			);
		}
	}

	Ok(ProfileSchema {
		title: props["title"].as_str().map(str::to_string),
		description: props["description"].as_str().map(str::to_string),
		properties,
		required: props["required"]
			.as_array()
			.map(|r| r.iter().filter_map(Value::as_str).map(str::to_string).collect())
			.unwrap_or_default(),
	})
}

fn matches_type(value: &Value, declared: &str) -> bool {
	match declared {
		"string" => value.is_string(),
		"number" => value.is_number(),
		"integer" => value.is_i64() || value.is_u64(),
		"boolean" => value.is_boolean(),
		"array" => value.is_array(),
		"object" => value.is_object(),
		_ => true,
	}
}

fn typed(value: &Value) -> TypedValue {
	match value {
		Value::String(s) => TypedValue::String(s.clone()),
		Value::Number(n) => TypedValue::Number(n.clone()),
		Value::Bool(b) => TypedValue::Boolean(*b),
		other => TypedValue::Json(other.clone()),
	}
}

impl ConfigSchema {
	pub fn new(types: Vec<ProfileTypeConfiguration>) -> Self {
		Self { types }
	}

	pub fn types(&self) -> &[ProfileTypeConfiguration] {
		&self.types
	}

	pub fn profile_type(&self, name: &str) -> Option<&ProfileTypeConfiguration> {
		self.types.iter().find(|t| t.profile_type == name)
	}

	/// Render the JSON Schema document for a set of profile types.
	pub fn build(types: &[ProfileTypeConfiguration]) -> Value {
		let mut conditions = vec![json!({
			"if": { "properties": { "type": false } },
			"then": { "properties": { "properties": { "title": "Missing profile type" } } }
		})];
		let mut defaults = Map::new();
		for t in types {
			conditions.push(json!({
				"if": { "properties": { "type": { "const": t.profile_type } } },
				"then": { "properties": type_schema(&t.schema) }
			}));
			defaults.insert(
				t.profile_type.clone(),
				json!({ "description": format!("Default {} profile", t.profile_type), "type": "string" }),
			);
		}
		let type_names: Vec<&String> = defaults.keys().collect();

		json!({
			"$schema": JSON_SCHEMA_DRAFT,
			"$version": SCHEMA_VERSION,
			"type": "object",
			"description": "Team configuration",
			"properties": {
				"profiles": {
					"type": "object",
					"description": "Mapping of profile names to profile configurations",
					"patternProperties": {
						"^\\S*$": {
							"type": "object",
							"description": "Profile configuration object",
							"properties": {
								"type": { "description": "Profile type", "type": "string", "enum": type_names },
								"properties": { "description": "Profile properties object", "type": "object" },
								"profiles": {
									"description": "Optional subprofile configurations",
									"type": "object",
									"$ref": "#/properties/profiles"
								},
								"secure": {
									"description": "Secure property names",
									"type": "array",
									"items": { "type": "string" },
									"uniqueItems": true
								}
							},
							"allOf": conditions
						}
					}
				},
				"defaults": {
					"type": "object",
					"description": "Mapping of profile types to default profile names",
					"properties": defaults
				},
				"autoStore": {
					"type": "boolean",
					"description": "If true, values you enter when prompted are stored for future use"
				}
			}
		})
	}

	pub fn to_json(&self) -> Value {
		Self::build(&self.types)
	}

	/// Parse a JSON Schema document produced by [`ConfigSchema::build`].
	pub fn load(schema: &Value) -> Result<Self, ConfigError> {
		let pattern = schema["properties"]["profiles"]["patternProperties"]
			.as_object()
			.and_then(|p| p.values().next())
			.ok_or_else(|| ConfigError::SchemaValidation("schema has no profile pattern".to_string()))?;
		let conditions = pattern["allOf"]
			.as_array()
			.ok_or_else(|| ConfigError::SchemaValidation("schema has no profile conditions".to_string()))?;

		let mut types = Vec::new();
		for condition in conditions {
			let Some(name) = condition["if"]["properties"]["type"]["const"].as_str() else {
				continue;
			};
			types.push(ProfileTypeConfiguration {
				profile_type: name.to_string(),
				schema: parse_type_schema(&condition["then"]["properties"])?,
			});
		}
		Ok(Self { types })
	}

	/// Read and parse a schema file.
	pub async fn load_file(path: &Path) -> Result<Self, ConfigError> {
		let text = tokio::fs::read_to_string(path).await.map_err(ConfigError::io(path))?;
		let doc = tcfg_jsonc::parse(&text).map_err(|e| ConfigError::parse(path, e))?;
		Self::load(&doc.to_json())
	}

	/// Declared type of the property at `path`, via the owning profile's type.
	pub fn find_property_type(&self, path: &str, properties: &ConfigDocument) -> Option<String> {
		let (_, leaf) = split_property_path(path)?;
		let profile = properties.profile(&profile_name_from_path(path))?;
		let profile_type = profile.profile_type.as_deref()?;
		self.profile_type(profile_type)?
			.schema
			.properties
			.get(leaf)
			.map(|p| p.property_type.clone())
	}

	/// Fill missing properties with their schema defaults.
	pub fn apply_defaults(&self, profile_type: &str, properties: &mut Properties) {
		let Some(t) = self.profile_type(profile_type) else {
			return;
		};
		for (name, prop) in &t.schema.properties {
			if let Some(default) = &prop.default {
				properties.entry(name.clone()).or_insert_with(|| default.clone());
			}
		}
	}

	/// Check properties against a profile type.
	///
	/// Unregistered types come back [`TypedProfile::Untyped`].
	pub fn validate_profile(&self, profile_type: &str, properties: &Properties) -> Result<TypedProfile, ConfigError> {
		let Some(t) = self.profile_type(profile_type) else {
			return Ok(TypedProfile::Untyped(properties.clone()));
		};

		let mut problems = Vec::new();
		for name in &t.schema.required {
			if !properties.contains_key(name) {
				problems.push(format!("missing required property '{name}'"));
			}
		}

		let mut out = BTreeMap::new();
		for (name, value) in properties {
			if let Some(prop) = t.schema.properties.get(name) {
				if !matches_type(value, &prop.property_type) {
					problems.push(format!("property '{name}' should be of type {}", prop.property_type));
					continue;
				}
				if let Some(allowed) = &prop.allowable_values {
					if !allowed.contains(value) {
						problems.push(format!("property '{name}' must be one of {}", Value::Array(allowed.clone())));
						continue;
					}
				}
				if matches!(prop.property_type.as_str(), "object" | "array" | "json") {
					out.insert(name.clone(), TypedValue::Json(value.clone()));
					continue;
				}
			}
			out.insert(name.clone(), typed(value));
		}

		if !problems.is_empty() {
			return Err(ConfigError::SchemaValidation(format!(
				"{profile_type} profile: {}",
				problems.join("; ")
			)));
		}
		Ok(TypedProfile::Typed {
			profile_type: profile_type.to_string(),
			properties: out,
		})
	}

	/// A starter document: one profile per type, populated with defaults.
	pub fn template(&self) -> ConfigDocument {
		let mut doc = ConfigDocument {
			auto_store: Some(true),
			..Default::default()
		};
		for t in &self.types {
			let properties: Properties = t
				.schema
				.properties
				.iter()
				.filter_map(|(name, p)| p.default.clone().map(|d| (name.clone(), d)))
				.collect();
			let secure = t
				.schema
				.properties
				.iter()
				.filter(|(_, p)| p.secure)
				.map(|(name, _)| name.clone())
				.collect();
			doc.profiles.insert(
				t.profile_type.clone(),
				ConfigProfile {
					profile_type: Some(t.profile_type.clone()),
					properties,
					profiles: BTreeMap::new(),
					secure,
				},
			);
			doc.defaults.insert(t.profile_type.clone(), t.profile_type.clone());
		}
		doc
	}
}

fn parse_number(raw: &str) -> Option<Value> {
	if let Ok(n) = raw.parse::<i64>() {
		return Some(Value::from(n));
	}
	raw.parse::<f64>()
		.ok()
		.and_then(serde_json::Number::from_f64)
		.map(Value::Number)
}

/// Coerce a raw string to the property's declared type.
///
/// `json_mode` (or a JSON-shaped declared type) parses the string as JSON and
/// fails on malformed input; otherwise booleans and numbers are only produced
/// when declared, and everything else stays a string.
pub fn coerce_value(raw: &str, declared: Option<&str>, json_mode: bool) -> Result<Value, ConfigError> {
	if json_mode || matches!(declared, Some("json" | "object" | "array")) {
		return serde_json::from_str(raw).map_err(|e| ConfigError::JsonValue {
			value: raw.to_string(),
			message: e.to_string(),
		});
	}
	let coerced = match declared {
		Some("boolean") if raw == "true" || raw == "false" => Some(Value::Bool(raw == "true")),
		Some("number" | "integer") => parse_number(raw),
		_ => None,
	};
	Ok(coerced.unwrap_or_else(|| Value::String(raw.to_string())))
}

/// Untyped coercion: `true`/`false` to booleans, numerals to numbers.
///
/// A numeral only becomes a number when it prints back unchanged, so `0123`,
/// `1e3` and `1.50` stay strings.
pub fn coerce_prop_value(raw: &str) -> Value {
	match raw.to_ascii_lowercase().as_str() {
		"true" => return Value::Bool(true),
		"false" => return Value::Bool(false),
		_ => {}
	}
	match parse_number(raw) {
		Some(n) if n.to_string() == raw => n,
		_ => Value::String(raw.to_string()),
	}
}
