// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Secure properties.
//!
//! Every secure value of every config file lives in one vault entry: a map
//! from absolute config file path to a map from secure property path
//! (`profiles.<name>.properties.<leaf>`) to value. The map is serialized as
//! JSON and base64 encoded. Saving always replaces the whole entry.

use std::collections::BTreeMap;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tcfg_vault::{SecretString, SecretVault, VaultError};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::profiles::{profile_name_from_path, profile_path_from_name, split_property_path};
use crate::ConfigError;

/// Vault account holding the secure blob.
pub const SECURE_ACCOUNT: &str = "secure_config_props";

/// Secure values keyed by config file path, then by secure property path.
pub type SecureBlob = BTreeMap<String, BTreeMap<String, serde_json::Value>>;

/// Where a property's `secure` list lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecureInfo {
	/// Path of the `secure` array, e.g. `profiles.base.secure`.
	pub path: String,
	/// Leaf property name.
	pub prop: String,
}

/// Vault connection state.
#[derive(Debug, Default)]
pub struct SecureProps {
	pub(crate) vault: Option<Arc<dyn SecretVault>>,
	pub(crate) load_failed: bool,
	pub(crate) persisted: bool,
}

impl SecureProps {
	pub(crate) fn new(vault: Option<Arc<dyn SecretVault>>) -> Self {
		Self {
			load_failed: vault.is_none(),
			vault,
			persisted: false,
		}
	}

	/// True when secure values could not be loaded and must not be saved.
	pub fn load_failed(&self) -> bool {
		self.load_failed
	}

	pub fn vault(&self) -> Option<&Arc<dyn SecretVault>> {
		self.vault.as_ref()
	}
}

/// Encode a blob for the vault.
pub fn encode_blob(blob: &SecureBlob) -> SecretString {
	// String keys and JSON values only; serialization cannot fail.
	let json = zeroize::Zeroizing::new(serde_json::to_string(blob).unwrap_or_default());
	SecretString::new(STANDARD.encode(json.as_bytes()))
}

/// Decode a vault entry. Plain JSON is accepted as well as base64.
pub fn decode_blob(raw: &SecretString) -> Result<SecureBlob, VaultError> {
	let text = raw.expose().trim();
	if let Ok(bytes) = STANDARD.decode(text) {
		let bytes = zeroize::Zeroizing::new(bytes);
		return serde_json::from_slice(&bytes).map_err(|e| VaultError::InvalidFormat(e.to_string()));
	}
	serde_json::from_str(text).map_err(|e| VaultError::InvalidFormat(e.to_string()))
}

/// `profiles.a.profiles.b.properties.user` → `profiles.a.profiles.b.secure` + `user`.
pub fn secure_info(property_path: &str) -> Option<SecureInfo> {
	let (owner, leaf) = split_property_path(property_path)?;
	Some(SecureInfo {
		path: format!("{owner}.secure"),
		prop: leaf.to_string(),
	})
}

fn split(path: &str) -> Vec<&str> {
	path.split('.').collect()
}

fn secure_list(config: &Config, path: &str) -> Vec<String> {
	config
		.layers()
		.active()
		.document()
		.get(&split(path))
		.map(|v| v.to_json())
		.and_then(|v| serde_json::from_value(v).ok())
		.unwrap_or_default()
}

impl Config {
	/// Vault state.
	pub fn secure(&self) -> &SecureProps {
		&self.secure
	}

	/// Secure property paths across every existing layer, de-duplicated.
	pub fn secure_fields(&self) -> Vec<String> {
		let mut fields: Vec<String> = Vec::new();
		for layer in self.layers.iter().filter(|l| l.exists) {
			for field in layer.secure_fields() {
				if !fields.contains(&field) {
					fields.push(field);
				}
			}
		}
		fields
	}

	/// Secure property paths declared by one layer.
	pub fn secure_fields_for(&self, user: bool, global: bool) -> Vec<String> {
		self.layers.layer(user, global).secure_fields()
	}

	/// Fetch the blob from the vault and hydrate every layer.
	pub async fn load_secure(&mut self, vault: Option<Arc<dyn SecretVault>>) -> Result<(), ConfigError> {
		if vault.is_some() {
			self.secure.vault = vault;
		}
		let Some(vault) = self.secure.vault.clone() else {
			self.secure.load_failed = true;
			return Ok(());
		};

		let blob = match vault.load(SECURE_ACCOUNT).await.and_then(|raw| raw.as_ref().map(decode_blob).transpose()) {
			Ok(blob) => blob.unwrap_or_default(),
			Err(e) => {
				self.secure.load_failed = true;
				warn!(error = %e, "failed to load secure properties from vault");
				return Err(e.into());
			}
		};
		self.secure.load_failed = false;
		self.secure.persisted = !blob.is_empty();
		debug!(files = blob.len(), "loaded secure properties");

		self.layers.secure_cache = blob;
		let cache = self.layers.secure_cache.clone();
		for layer in self.layers.iter_mut() {
			layer.hydrate(&cache);
		}
		Ok(())
	}

	/// Rebuild the blob entries for the active layer (or all layers) from
	/// the in-memory trees and write the whole blob to the vault.
	///
	/// Without a usable vault this is a no-op unless there are secure values
	/// to persist, in which case it fails with
	/// [`ConfigError::SecureSaveUnavailable`].
	pub async fn save_secure(&mut self, all_layers: bool) -> Result<(), ConfigError> {
		let active = self.layers.active().key();
		let rebuilt: Vec<(String, BTreeMap<String, serde_json::Value>)> = self
			.layers
			.iter()
			.filter(|l| if all_layers { l.exists || l.key() == active } else { l.key() == active })
			.map(|l| (l.key(), l.secure_values()))
			.collect();

		let vault = match (&self.secure.vault, self.secure.load_failed) {
			(Some(vault), false) => vault.clone(),
			_ if rebuilt.iter().all(|(_, values)| values.is_empty()) => {
				debug!("no usable vault and no secure values to save");
				return Ok(());
			}
			(None, _) => return Err(ConfigError::secure_unavailable("no credential vault is configured")),
			(Some(_), true) => {
				return Err(ConfigError::secure_unavailable(
					"secure properties could not be loaded from the credential vault",
				))
			}
		};

		for (key, values) in rebuilt {
			if values.is_empty() {
				self.layers.secure_cache.remove(&key);
			} else {
				self.layers.secure_cache.insert(key, values);
			}
		}

		if self.layers.secure_cache.is_empty() && !self.secure.persisted {
			return Ok(());
		}
		vault.save(SECURE_ACCOUNT, &encode_blob(&self.layers.secure_cache)).await?;
		self.secure.persisted = !self.layers.secure_cache.is_empty();
		info!(files = self.layers.secure_cache.len(), "saved secure properties");
		Ok(())
	}

	/// Save secure values of every layer, pruning entries for deleted files
	/// first when `prune` is set. Returns the pruned file paths.
	pub async fn secure_save(&mut self, prune: bool) -> Result<Vec<String>, ConfigError> {
		let pruned = if prune { self.rm_unused_props().await } else { Vec::new() };
		self.save_secure(true).await?;
		Ok(pruned)
	}

	/// Drop blob entries whose config file no longer exists.
	///
	/// Entries whose file cannot be checked are kept.
	pub async fn rm_unused_props(&mut self) -> Vec<String> {
		let mut pruned = Vec::new();
		for file in self.layers.secure_cache.keys() {
			match tokio::fs::try_exists(file).await {
				Ok(true) => {}
				Ok(false) => pruned.push(file.clone()),
				Err(e) => warn!(file = %file, error = %e, "cannot check config file, keeping its secure properties"),
			}
		}
		for file in &pruned {
			self.layers.secure_cache.remove(file);
			info!(file = %file, "pruned secure properties of missing config file");
		}
		pruned
	}

	/// Snapshot of the in-memory blob.
	pub fn secure_blob(&self) -> &SecureBlob {
		&self.layers.secure_cache
	}

	/// Leaf names that are secure for a profile, including those declared on
	/// its ancestors, in the active layer.
	pub fn secure_props_for_profile(&self, profile_name: &str) -> Vec<String> {
		let profile_path = profile_path_from_name(profile_name);
		let mut props = Vec::new();
		for field in self.secure_fields_for(self.layers.active().user, self.layers.active().global) {
			let Some(info) = secure_info(&field) else {
				continue;
			};
			let owner = info.path.strip_suffix(".secure").unwrap_or(&info.path);
			let is_ancestor = profile_path == owner || profile_path.starts_with(&format!("{owner}."));
			if is_ancestor && !props.contains(&info.prop) {
				props.push(info.prop);
			}
		}
		props
	}

	/// Locate the `secure` list for a property path.
	///
	/// With `find_up`, ancestor profiles of the active layer are searched for
	/// a `secure` list already naming the leaf.
	pub fn secure_info_for_prop(&self, property_path: &str, find_up: bool) -> Option<SecureInfo> {
		let mut info = secure_info(property_path)?;
		if find_up && self.layers.active().exists {
			let name = profile_name_from_path(property_path);
			let mut segments: Vec<&str> = name.split('.').collect();
			while segments.len() > 1 {
				segments.pop();
				let candidate = format!("{}.secure", profile_path_from_name(&segments.join(".")));
				if secure_list(self, &candidate).contains(&info.prop) {
					info.path = candidate;
					break;
				}
			}
		}
		Some(info)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_blob_encoding_is_base64_json() {
		let blob = SecureBlob::from([(
			"/p/app.config.json".to_string(),
			BTreeMap::from([("profiles.base.properties.user".to_string(), json!("admin"))]),
		)]);
		let encoded = encode_blob(&blob);
		let raw = STANDARD.decode(encoded.expose()).unwrap();
		assert_eq!(
			serde_json::from_slice::<serde_json::Value>(&raw).unwrap(),
			json!({ "/p/app.config.json": { "profiles.base.properties.user": "admin" } })
		);
		assert_eq!(decode_blob(&encoded).unwrap(), blob);
	}

	#[test]
	fn test_decode_accepts_plain_json() {
		let raw = SecretString::new(r#"{"/p/a.json": {"profiles.x.properties.y": 1}}"#.to_string());
		let blob = decode_blob(&raw).unwrap();
		assert_eq!(blob["/p/a.json"]["profiles.x.properties.y"], json!(1));
	}

	#[test]
	fn test_decode_rejects_garbage() {
		let raw = SecretString::new("%%% not a blob".to_string());
		assert!(matches!(decode_blob(&raw), Err(VaultError::InvalidFormat(_))));
	}

	#[test]
	fn test_secure_info() {
		assert_eq!(
			secure_info("profiles.a.profiles.b.properties.user"),
			Some(SecureInfo {
				path: "profiles.a.profiles.b.secure".into(),
				prop: "user".into()
			})
		);
		assert_eq!(secure_info("profiles.a.type"), None);
	}

	#[test]
	fn test_secure_info_for_profiles_named_properties() {
		assert_eq!(
			secure_info("profiles.properties.properties.user"),
			Some(SecureInfo {
				path: "profiles.properties.secure".into(),
				prop: "user".into()
			})
		);
		assert_eq!(
			secure_info("profiles.a.profiles.properties.properties.x"),
			Some(SecureInfo {
				path: "profiles.a.profiles.properties.secure".into(),
				prop: "x".into()
			})
		);
	}
}
