// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Dotted profile-path addressing.
//!
//! The profile name `lpar1.zosmf` addresses `profiles.lpar1.profiles.zosmf`
//! in a config document.

use std::collections::BTreeMap;

use crate::config::Config;
use crate::model::{ConfigDocument, ConfigProfile, Properties};
use crate::schema::{ConfigSchema, TypedProfile};
use crate::ConfigError;

/// `a.b` → `profiles.a.profiles.b`
pub fn profile_path_from_name(name: &str) -> String {
	format!("profiles.{}", name.replace('.', ".profiles."))
}

/// Split `<profile path>.properties.<leaf>` into the profile path and the
/// leaf. The leaf is always the last segment, so a profile may itself be
/// named `properties`.
pub fn split_property_path(path: &str) -> Option<(&str, &str)> {
	let (owner, leaf) = path.rsplit_once('.')?;
	let owner = owner.strip_suffix(".properties")?;
	(!owner.is_empty()).then_some((owner, leaf))
}

/// Strip `.properties.<leaf>`, `.secure` and `profiles.` segments from a
/// property path, leaving the dotted profile name.
pub fn profile_name_from_path(path: &str) -> String {
	let owner = match split_property_path(path) {
		Some((owner, _)) => owner,
		None => path
			.strip_suffix(".properties")
			.or_else(|| path.strip_suffix(".secure"))
			.or_else(|| path.strip_suffix(".type"))
			.unwrap_or(path),
	};
	if !owner.starts_with("profiles.") {
		return owner.to_string();
	}
	owner
		.split('.')
		.enumerate()
		.filter_map(|(idx, seg)| (idx % 2 == 1).then_some(seg))
		.collect::<Vec<_>>()
		.join(".")
}

/// Pre-order list of every profile name, parents before children.
pub fn build(profiles: &BTreeMap<String, ConfigProfile>, prefix: Option<&str>, acc: &mut Vec<String>) {
	for (name, profile) in profiles {
		let full = match prefix {
			Some(p) => format!("{p}.{name}"),
			None => name.clone(),
		};
		acc.push(full.clone());
		build(&profile.profiles, Some(&full), acc);
	}
}

/// A profile after inheritance, schema defaults and typing.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedProfile {
	pub name: String,
	pub profile_type: Option<String>,
	pub properties: Properties,
	pub typed: TypedProfile,
}

/// Read-only profile queries over the merged configuration.
#[derive(Debug, Clone)]
pub struct Profiles {
	merged: ConfigDocument,
}

impl Profiles {
	pub fn new(merged: ConfigDocument) -> Self {
		Self { merged }
	}

	pub fn expand_path(&self, name: &str) -> String {
		profile_path_from_name(name)
	}

	pub fn build(&self) -> Vec<String> {
		let mut acc = Vec::new();
		build(&self.merged.profiles, None, &mut acc);
		acc
	}

	pub fn exists(&self, name: &str) -> bool {
		self.merged.profile(name).is_some()
	}

	pub fn profile(&self, name: &str) -> Option<&ConfigProfile> {
		self.merged.profile(name)
	}

	/// Properties of a profile, inheriting those of its ancestors.
	///
	/// A missing profile is an error with `must_exist`, otherwise empty.
	pub fn get(&self, name: &str, must_exist: bool) -> Result<Properties, ConfigError> {
		let mut props = Properties::new();
		let mut level = &self.merged.profiles;
		for segment in name.split('.') {
			match level.get(segment) {
				Some(profile) => {
					props.extend(profile.properties.iter().map(|(k, v)| (k.clone(), v.clone())));
					level = &profile.profiles;
				}
				None if must_exist => return Err(ConfigError::ProfileNotFound(name.to_string())),
				None => return Ok(Properties::new()),
			}
		}
		Ok(props)
	}

	/// Name of the profile to use for a type: explicit, then the type's
	/// default, then `fallback`, then the type name itself.
	pub fn active_profile_name(&self, profile_type: &str, explicit: Option<&str>, fallback: Option<&str>) -> String {
		explicit
			.or_else(|| self.merged.defaults.get(profile_type).map(String::as_str))
			.or(fallback)
			.unwrap_or(profile_type)
			.to_string()
	}

	/// Properties of the default profile for a type.
	pub fn default_get(&self, profile_type: &str) -> Option<Properties> {
		let name = self.merged.defaults.get(profile_type)?;
		self.get(name, false).ok().filter(|p| !p.is_empty() || self.exists(name))
	}

	/// `get` plus schema defaults and the typed view.
	pub fn resolve(&self, name: &str, schema: Option<&ConfigSchema>) -> Result<ResolvedProfile, ConfigError> {
		let mut properties = self.get(name, true)?;
		let profile_type = self.merged.profile(name).and_then(|p| p.profile_type.clone());

		let typed = match (schema, profile_type.as_deref()) {
			(Some(schema), Some(t)) => {
				schema.apply_defaults(t, &mut properties);
				schema.validate_profile(t, &properties)?
			}
			_ => TypedProfile::Untyped(properties.clone()),
		};

		Ok(ResolvedProfile {
			name: name.to_string(),
			profile_type,
			properties,
			typed,
		})
	}
}

impl Config {
	/// Profile queries over the merged configuration.
	pub fn profiles(&self) -> Profiles {
		Profiles::new(self.properties())
	}

	/// Replace a profile in the active layer.
	pub fn set_profile(&mut self, name: &str, profile: &ConfigProfile) {
		let path = profile_path_from_name(name);
		let segments: Vec<&str> = path.split('.').collect();
		let json = serde_json::to_value(profile).unwrap_or_default();
		self.layers.active_mut().document_mut().set(&segments, &json);
	}

	/// Set the default profile for a type in the active layer.
	pub fn set_default(&mut self, profile_type: &str, name: &str) {
		self.layers
			.active_mut()
			.document_mut()
			.set(&["defaults", profile_type], &serde_json::Value::String(name.to_string()));
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn profiles() -> Profiles {
		Profiles::new(
			ConfigDocument::from_json(&json!({
				"profiles": {
					"lpar1": {
						"properties": { "host": "example.com", "port": 443 },
						"profiles": {
							"GoodProfile": { "type": "zosmf", "properties": { "port": 1443 } }
						}
					},
					"base": { "type": "base", "properties": { "rejectUnauthorized": false } }
				},
				"defaults": { "zosmf": "lpar1.GoodProfile", "base": "base" }
			}))
			.unwrap(),
		)
	}

	#[test]
	fn test_path_from_name() {
		assert_eq!(profile_path_from_name("lpar1"), "profiles.lpar1");
		assert_eq!(profile_path_from_name("a.b.c"), "profiles.a.profiles.b.profiles.c");
	}

	#[test]
	fn test_name_from_path() {
		assert_eq!(profile_name_from_path("profiles.a.profiles.b.properties.user"), "a.b");
		assert_eq!(profile_name_from_path("profiles.a.secure"), "a");
		assert_eq!(profile_name_from_path("profiles.a.profiles.b"), "a.b");
		assert_eq!(profile_name_from_path("profiles.a.properties"), "a");
	}

	#[test]
	fn test_profile_named_properties() {
		assert_eq!(
			split_property_path("profiles.properties.properties.user"),
			Some(("profiles.properties", "user"))
		);
		assert_eq!(profile_name_from_path("profiles.properties.properties.user"), "properties");
		assert_eq!(
			profile_name_from_path("profiles.a.profiles.properties.properties.x"),
			"a.properties"
		);
		assert_eq!(profile_name_from_path("profiles.a.properties.properties"), "a");
		assert_eq!(split_property_path("profiles.a.secure"), None);
	}

	#[test]
	fn test_build_is_preorder() {
		let doc = ConfigDocument::from_json(&json!({
			"profiles": { "lpar1": { "properties": {}, "profiles": { "GoodProfile": { "properties": {} } } } }
		}))
		.unwrap();
		assert_eq!(Profiles::new(doc).build(), vec!["lpar1", "lpar1.GoodProfile"]);
	}

	#[test]
	fn test_get_inherits_from_ancestors() {
		let props = profiles().get("lpar1.GoodProfile", true).unwrap();
		assert_eq!(props["host"], json!("example.com"));
		assert_eq!(props["port"], json!(1443));
	}

	#[test]
	fn test_get_missing() {
		let p = profiles();
		assert!(matches!(p.get("lpar1.Nope", true), Err(ConfigError::ProfileNotFound(n)) if n == "lpar1.Nope"));
		assert!(p.get("lpar1.Nope", false).unwrap().is_empty());
	}

	#[test]
	fn test_active_profile_name() {
		let p = profiles();
		assert_eq!(p.active_profile_name("zosmf", Some("x"), None), "x");
		assert_eq!(p.active_profile_name("zosmf", None, None), "lpar1.GoodProfile");
		assert_eq!(p.active_profile_name("tso", None, Some("fallback")), "fallback");
		assert_eq!(p.active_profile_name("tso", None, None), "tso");
	}

	#[test]
	fn test_default_get() {
		let p = profiles();
		assert_eq!(p.default_get("base").unwrap()["rejectUnauthorized"], json!(false));
		assert!(p.default_get("tso").is_none());
	}

	#[test]
	fn test_resolve_without_schema_is_untyped() {
		let resolved = profiles().resolve("lpar1.GoodProfile", None).unwrap();
		assert_eq!(resolved.profile_type.as_deref(), Some("zosmf"));
		assert!(matches!(resolved.typed, TypedProfile::Untyped(_)));
	}
}
