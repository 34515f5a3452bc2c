// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Typed view of a configuration document.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Property bag of a profile.
pub type Properties = BTreeMap<String, serde_json::Value>;

/// The contents of one config file, or the merge of several.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
	#[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
	pub schema: Option<String>,
	#[serde(default)]
	pub profiles: BTreeMap<String, ConfigProfile>,
	#[serde(default)]
	pub defaults: BTreeMap<String, String>,
	#[serde(rename = "autoStore", default, skip_serializing_if = "Option::is_none")]
	pub auto_store: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigProfile {
	#[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
	pub profile_type: Option<String>,
	#[serde(default)]
	pub properties: Properties,
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub profiles: BTreeMap<String, ConfigProfile>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub secure: Vec<String>,
}

impl ConfigDocument {
	pub fn from_json(json: &serde_json::Value) -> Result<Self, serde_json::Error> {
		serde_json::from_value(json.clone())
	}

	pub fn to_json(&self) -> serde_json::Value {
		// Plain maps and strings only; serialization cannot fail.
		serde_json::to_value(self).unwrap_or_default()
	}

	/// Look up a (nested) profile by dotted name.
	pub fn profile(&self, name: &str) -> Option<&ConfigProfile> {
		let mut segments = name.split('.');
		let first = self.profiles.get(segments.next()?)?;
		segments.try_fold(first, |profile, seg| profile.profiles.get(seg))
	}

	pub fn profile_mut(&mut self, name: &str) -> Option<&mut ConfigProfile> {
		let mut segments = name.split('.');
		let first = self.profiles.get_mut(segments.next()?)?;
		segments.try_fold(first, |profile, seg| profile.profiles.get_mut(seg))
	}

	/// Replace every secure value in the profile tree with `placeholder`.
	pub fn mask_secure(&mut self, placeholder: &str) {
		mask_profiles(&mut self.profiles, placeholder);
	}
}

fn mask_profiles(profiles: &mut BTreeMap<String, ConfigProfile>, placeholder: &str) {
	for profile in profiles.values_mut() {
		for name in &profile.secure {
			if let Some(value) = profile.properties.get_mut(name) {
				*value = serde_json::Value::String(placeholder.to_string());
			}
		}
		mask_profiles(&mut profile.profiles, placeholder);
	}
}
