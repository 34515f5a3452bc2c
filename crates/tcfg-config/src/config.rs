// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The loaded configuration.
//!
//! [`Config`] owns the four layers and the vault connection. Reads go through
//! the merged view; every mutation targets the active layer and stays in
//! memory until [`Config::save`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tcfg_jsonc::Document;
use tcfg_vault::SecretVault;
use tracing::{debug, info};

use crate::layers::{ConfigLayer, LayerStore, LAYER_ORDER};
use crate::model::ConfigDocument;
use crate::paths::{config_name, resolve_home_dir, schema_name, search, user_config_name};
use crate::profiles::profile_path_from_name;
use crate::schema::coerce_prop_value;
use crate::secure::{SecureInfo, SecureProps};
use crate::ConfigError;

/// Replacement shown for secure values in masked output.
pub const SECURE_VALUE_MASK: &str = "(secure value)";

/// Options for [`Config::load`].
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
	/// Global config directory. Defaults to [`resolve_home_dir`].
	pub home_dir: Option<PathBuf>,
	/// Directory the project layers are searched from. Defaults to the
	/// current directory.
	pub project_dir: Option<PathBuf>,
	pub vault: Option<Arc<dyn SecretVault>>,
	/// Build the layer descriptors without reading files or the vault.
	pub no_load: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
	/// Coerce string values with [`coerce_prop_value`].
	pub parse_string: bool,
	/// Add (`true`) or remove (`false`) the property from its profile's
	/// `secure` list.
	pub secure: Option<bool>,
}

/// Value for [`Config::set_schema`].
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaSource {
	Uri(String),
	Object(Value),
}

/// The active layer's `$schema`, resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaInfo {
	pub original: String,
	pub resolved: String,
	pub local: bool,
}

#[derive(Debug)]
pub struct Config {
	app: String,
	home_dir: PathBuf,
	project_dir: PathBuf,
	pub(crate) layers: LayerStore,
	pub(crate) secure: SecureProps,
}

fn split(path: &str) -> Vec<&str> {
	path.split('.').collect()
}

fn discover(app: &str, home_dir: &Path, project_dir: &Path) -> Vec<ConfigLayer> {
	let ignore = [home_dir.to_path_buf()];
	LAYER_ORDER
		.iter()
		.map(|&(user, global)| {
			let file = if user { user_config_name(app) } else { config_name(app) };
			let path = if global {
				home_dir.join(&file)
			} else {
				search(&file, project_dir, &ignore).unwrap_or_else(|| project_dir.join(&file))
			};
			ConfigLayer::new(path, user, global)
		})
		.collect()
}

impl Config {
	/// Discover and read the four layers for `app`, then hydrate secure
	/// values from the vault.
	///
	/// The first existing layer in precedence order becomes active; with none
	/// on disk the project layer is.
	pub async fn load(app: &str, opts: LoadOptions) -> Result<Self, ConfigError> {
		let home_dir = match opts.home_dir {
			Some(dir) => dir,
			None => resolve_home_dir(app)?,
		};
		let project_dir = match opts.project_dir {
			Some(dir) => dir,
			None => std::env::current_dir().map_err(ConfigError::io("."))?,
		};

		let mut config = Self {
			app: app.to_string(),
			layers: LayerStore::new(discover(app, &home_dir, &project_dir)),
			secure: SecureProps::new(opts.vault),
			home_dir,
			project_dir,
		};
		if !opts.no_load {
			config.read_layers().await?;
			config.load_secure(None).await?;
		}
		Ok(config)
	}

	async fn read_layers(&mut self) -> Result<(), ConfigError> {
		for (user, global) in LAYER_ORDER {
			self.layers.read(user, global).await?;
		}
		self.layers.activate_first_existing();
		let active = self.layers.active();
		debug!(
			app = %self.app,
			active = %active.path.display(),
			existing = self.layers.iter().filter(|l| l.exists).count(),
			"loaded config layers"
		);
		Ok(())
	}

	/// Re-run discovery and reading in place.
	///
	/// Directories and the vault not named in `opts` are kept.
	pub async fn reload(&mut self, opts: LoadOptions) -> Result<(), ConfigError> {
		if let Some(dir) = opts.home_dir {
			self.home_dir = dir;
		}
		if let Some(dir) = opts.project_dir {
			self.project_dir = dir;
		}
		let vault = opts.vault.or_else(|| self.secure.vault.clone());
		self.layers = LayerStore::new(discover(&self.app, &self.home_dir, &self.project_dir));
		self.secure = SecureProps::new(vault);
		if !opts.no_load {
			self.read_layers().await?;
			self.load_secure(None).await?;
		}
		Ok(())
	}

	pub fn app(&self) -> &str {
		&self.app
	}

	pub fn home_dir(&self) -> &Path {
		&self.home_dir
	}

	pub fn project_dir(&self) -> &Path {
		&self.project_dir
	}

	/// `<app>.schema.json`
	pub fn schema_name(&self) -> String {
		schema_name(&self.app)
	}

	pub fn layers(&self) -> &LayerStore {
		&self.layers
	}

	pub fn layers_mut(&mut self) -> &mut LayerStore {
		&mut self.layers
	}

	/// True when any layer exists on disk.
	pub fn exists(&self) -> bool {
		self.layers.any_exists()
	}

	/// True when an existing layer lives in `dir`, optionally restricted to
	/// user or non-user layers.
	pub fn layer_exists(&self, dir: &Path, user: Option<bool>) -> bool {
		self.layers
			.iter()
			.any(|l| l.exists && user.map_or(true, |u| l.user == u) && l.path.parent() == Some(dir))
	}

	/// Merged view of every existing layer.
	pub fn properties(&self) -> ConfigDocument {
		self.layers.merged()
	}

	/// Merged view with secure values replaced by [`SECURE_VALUE_MASK`].
	pub fn masked_properties(&self) -> ConfigDocument {
		let mut merged = self.properties();
		merged.mask_secure(SECURE_VALUE_MASK);
		merged
	}

	/// Set a property in the active layer.
	///
	/// Intermediate objects are created. With `parse_string`, string values
	/// are coerced and appended when the target is an array. With `secure`
	/// the leaf is added to or removed from the owning `secure` list, which is
	/// only valid for profile properties.
	pub fn set(&mut self, property_path: &str, value: Value, opts: SetOptions) -> Result<(), ConfigError> {
		let secure_info = match opts.secure {
			Some(_) => Some(
				self.secure_info_for_prop(property_path, true)
					.ok_or_else(|| ConfigError::InvalidSecureOption(property_path.to_string()))?,
			),
			None => None,
		};

		let value = match value {
			Value::String(raw) if opts.parse_string => coerce_prop_value(&raw),
			other => other,
		};
		let keys = split(property_path);
		let doc = self.layers.active_mut().document_mut();
		let append = opts.parse_string && doc.get(&keys).is_some_and(|v| v.as_array().is_some());
		if !append {
			doc.set(&keys, &value);
		} else if let Some(array) = doc.get_mut(&keys).and_then(tcfg_jsonc::Value::as_array_mut) {
			array.push(tcfg_jsonc::Value::from_json(&value, None));
		}

		if let (Some(secure), Some(info)) = (opts.secure, secure_info) {
			if secure {
				add_secure(doc, &info);
			} else {
				remove_secure(doc, &info);
			}
		}
		debug!(path = property_path, secure = ?opts.secure, "set property");
		Ok(())
	}

	/// Remove a property from the active layer, and from its `secure` list
	/// unless `secure` is `Some(false)`. Returns whether anything was removed.
	pub fn delete(&mut self, property_path: &str, secure: Option<bool>) -> bool {
		let info = (secure != Some(false))
			.then(|| self.secure_info_for_prop(property_path, false))
			.flatten();
		let doc = self.layers.active_mut().document_mut();
		let removed = doc.remove(&split(property_path)).is_some();
		if let Some(info) = info {
			remove_secure(doc, &info);
		}
		debug!(path = property_path, removed, "deleted property");
		removed
	}

	/// Move a profile, with its children and secure values, within the active
	/// layer. Defaults naming the profile follow it.
	pub fn move_profile(&mut self, from: &str, to: &str) -> Result<(), ConfigError> {
		let from_path = profile_path_from_name(from);
		let to_path = profile_path_from_name(to);
		let doc = self.layers.active_mut().document_mut();
		if doc.get(&split(&to_path)).is_some() {
			return Err(ConfigError::ProfileExists(to.to_string()));
		}
		let profile = doc
			.remove(&split(&from_path))
			.ok_or_else(|| ConfigError::ProfileNotFound(from.to_string()))?;
		doc.set(&split(&to_path), &profile.to_json());

		let retarget: Vec<String> = doc
			.get(&["defaults"])
			.and_then(tcfg_jsonc::Value::as_object)
			.map(|defaults| {
				defaults
					.iter()
					.filter(|(_, name)| name.as_str() == Some(from))
					.map(|(profile_type, _)| profile_type.to_string())
					.collect()
			})
			.unwrap_or_default();
		for profile_type in retarget {
			doc.set(&["defaults", profile_type.as_str()], &Value::String(to.to_string()));
		}
		info!(from, to, "moved profile");
		Ok(())
	}

	/// Point the active layer at a schema.
	///
	/// `$schema` is only set when the layer has none. An object is written to
	/// `<app>.schema.json` next to the layer when the `$schema` reference is
	/// local.
	pub async fn set_schema(&mut self, schema: SchemaSource) -> Result<(), ConfigError> {
		let (uri, object) = match schema {
			SchemaSource::Uri(uri) => (uri, None),
			SchemaSource::Object(obj) => (format!("./{}", self.schema_name()), Some(obj)),
		};
		let doc = self.layers.active_mut().document_mut();
		if doc.get(&["$schema"]).map_or(true, tcfg_jsonc::Value::is_null) {
			doc.set_first("$schema", &Value::String(uri));
		}

		let (Some(object), Some(info)) = (object, self.schema_info()) else {
			return Ok(());
		};
		if !(info.local || info.original.starts_with("./")) {
			return Ok(());
		}
		let path = PathBuf::from(&info.resolved);
		if let Some(parent) = path.parent() {
			tokio::fs::create_dir_all(parent).await.map_err(ConfigError::io(parent))?;
		}
		tokio::fs::write(&path, Document::from_json(&object).to_string())
			.await
			.map_err(ConfigError::io(&path))?;
		info!(path = %path.display(), "wrote schema file");
		Ok(())
	}

	/// Where the active layer's `$schema` points, if it has one.
	pub fn schema_info(&self) -> Option<SchemaInfo> {
		let layer = self.layers.active();
		let original = layer.document().get(&["$schema"])?.as_str()?.to_string();
		if let Ok(url) = url::Url::parse(&original) {
			if url.scheme() == "file" {
				if let Ok(path) = url.to_file_path() {
					return Some(SchemaInfo {
						resolved: path.to_string_lossy().into_owned(),
						original,
						local: true,
					});
				}
			}
			if url.scheme().len() > 1 {
				return Some(SchemaInfo {
					resolved: original.clone(),
					original,
					local: false,
				});
			}
		}
		let dir = layer.path.parent().unwrap_or(Path::new(""));
		let resolved: PathBuf = dir.join(&original).components().collect();
		Some(SchemaInfo {
			resolved: resolved.to_string_lossy().into_owned(),
			original,
			local: true,
		})
	}

	/// Persist secure values, then the active layer or every existing layer.
	pub async fn save(&mut self, all_layers: bool) -> Result<(), ConfigError> {
		self.save_secure(all_layers).await?;
		if !all_layers {
			return self.layers.write().await;
		}
		let active = self.layers.active().path.clone();
		for layer in self.layers.iter_mut().filter(|l| l.exists || l.path == active) {
			layer.write().await?;
		}
		Ok(())
	}
}

fn add_secure(doc: &mut Document, info: &SecureInfo) {
	let keys = split(&info.path);
	match doc.get_mut(&keys).and_then(tcfg_jsonc::Value::as_array_mut) {
		Some(list) => {
			if !list.iter().any(|v| v.as_str() == Some(info.prop.as_str())) {
				list.push(tcfg_jsonc::Value::String(info.prop.clone()));
			}
		}
		None => doc.set(&keys, &Value::Array(vec![Value::String(info.prop.clone())])),
	}
}

fn remove_secure(doc: &mut Document, info: &SecureInfo) {
	if let Some(list) = doc.get_mut(&split(&info.path)).and_then(tcfg_jsonc::Value::as_array_mut) {
		list.retain(|v| v.as_str() != Some(info.prop.as_str()));
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	async fn empty_config(dir: &Path) -> Config {
		Config::load(
			"app",
			LoadOptions {
				home_dir: Some(dir.join("home")),
				project_dir: Some(dir.join("project")),
				..Default::default()
			},
		)
		.await
		.unwrap()
	}

	#[tokio::test]
	async fn test_load_defaults_to_project_layer() {
		let dir = tempfile::tempdir().unwrap();
		let config = empty_config(dir.path()).await;
		let active = config.layers().active();
		assert!(!active.user);
		assert!(!active.global);
		assert_eq!(active.path, dir.path().join("project/app.config.json"));
		assert!(!config.exists());
	}

	#[tokio::test]
	async fn test_set_creates_intermediates_and_coerces() {
		let dir = tempfile::tempdir().unwrap();
		let mut config = empty_config(dir.path()).await;
		let opts = SetOptions {
			parse_string: true,
			secure: None,
		};
		config.set("profiles.base.properties.port", json!("443"), opts).unwrap();
		config.set("profiles.base.properties.reject", json!("False"), opts).unwrap();
		config.set("profiles.base.properties.host", json!("h"), opts).unwrap();

		let props = config.layers().active().properties();
		assert_eq!(props.profiles["base"].properties["port"], json!(443));
		assert_eq!(props.profiles["base"].properties["reject"], json!(false));
		assert_eq!(props.profiles["base"].properties["host"], json!("h"));
	}

	#[tokio::test]
	async fn test_set_appends_to_array() {
		let dir = tempfile::tempdir().unwrap();
		let mut config = empty_config(dir.path()).await;
		config
			.set("profiles.base.properties.list", json!(["a"]), SetOptions::default())
			.unwrap();
		config
			.set(
				"profiles.base.properties.list",
				json!("b"),
				SetOptions {
					parse_string: true,
					secure: None,
				},
			)
			.unwrap();
		let props = config.layers().active().properties();
		assert_eq!(props.profiles["base"].properties["list"], json!(["a", "b"]));
	}

	#[tokio::test]
	async fn test_set_secure_toggles_list() {
		let dir = tempfile::tempdir().unwrap();
		let mut config = empty_config(dir.path()).await;
		let secure = |s| SetOptions {
			parse_string: false,
			secure: Some(s),
		};
		config.set("profiles.base.properties.user", json!("admin"), secure(true)).unwrap();
		config.set("profiles.base.properties.user", json!("admin"), secure(true)).unwrap();
		assert_eq!(config.layers().active().properties().profiles["base"].secure, vec!["user"]);

		config.set("profiles.base.properties.user", json!("admin"), secure(false)).unwrap();
		assert!(config.layers().active().properties().profiles["base"].secure.is_empty());
	}

	#[tokio::test]
	async fn test_set_secure_rejects_non_property() {
		let dir = tempfile::tempdir().unwrap();
		let mut config = empty_config(dir.path()).await;
		let err = config
			.set(
				"defaults.base",
				json!("base"),
				SetOptions {
					parse_string: false,
					secure: Some(true),
				},
			)
			.unwrap_err();
		assert!(matches!(err, ConfigError::InvalidSecureOption(p) if p == "defaults.base"));
		assert!(config.layers().active().document().get(&["defaults"]).is_none());
	}

	#[tokio::test]
	async fn test_delete_removes_secure_entry() {
		let dir = tempfile::tempdir().unwrap();
		let mut config = empty_config(dir.path()).await;
		config
			.set(
				"profiles.base.properties.password",
				json!("pw"),
				SetOptions {
					parse_string: false,
					secure: Some(true),
				},
			)
			.unwrap();
		assert!(config.delete("profiles.base.properties.password", None));
		let props = config.layers().active().properties();
		assert!(props.profiles["base"].properties.is_empty());
		assert!(props.profiles["base"].secure.is_empty());
		assert!(!config.delete("profiles.base.properties.password", None));
	}

	#[tokio::test]
	async fn test_move_profile() {
		let dir = tempfile::tempdir().unwrap();
		let mut config = empty_config(dir.path()).await;
		config
			.set("profiles.a.properties.host", json!("h"), SetOptions::default())
			.unwrap();
		config.set_default("zosmf", "a");
		config
			.set("profiles.b.properties.host", json!("other"), SetOptions::default())
			.unwrap();

		assert!(matches!(config.move_profile("a", "b"), Err(ConfigError::ProfileExists(_))));
		assert!(matches!(config.move_profile("nope", "c"), Err(ConfigError::ProfileNotFound(_))));

		config.move_profile("a", "b.child").unwrap();
		let props = config.layers().active().properties();
		assert!(!props.profiles.contains_key("a"));
		assert_eq!(props.profile("b.child").unwrap().properties["host"], json!("h"));
		assert_eq!(props.defaults["zosmf"], "b.child");
	}

	#[tokio::test]
	async fn test_set_schema_writes_local_file_once() {
		let dir = tempfile::tempdir().unwrap();
		let mut config = empty_config(dir.path()).await;
		config.set("defaults.base", json!("base"), SetOptions::default()).unwrap();
		config
			.set_schema(SchemaSource::Object(json!({ "type": "object" })))
			.await
			.unwrap();

		let info = config.schema_info().unwrap();
		assert_eq!(info.original, "./app.schema.json");
		assert!(info.local);
		assert_eq!(PathBuf::from(&info.resolved), dir.path().join("project/app.schema.json"));
		let written: Value = serde_json::from_str(&std::fs::read_to_string(&info.resolved).unwrap()).unwrap();
		assert_eq!(written, json!({ "type": "object" }));

		config
			.set_schema(SchemaSource::Uri("https://example.com/s.json".into()))
			.await
			.unwrap();
		assert_eq!(config.schema_info().unwrap().original, "./app.schema.json");
		assert!(config.layers().active().document().to_string().starts_with("{\n    \"$schema\""));
	}

	#[tokio::test]
	async fn test_schema_info_urls() {
		let dir = tempfile::tempdir().unwrap();
		let mut config = empty_config(dir.path()).await;
		assert!(config.schema_info().is_none());

		config.set("$schema", json!("https://example.com/s.json"), SetOptions::default()).unwrap();
		let info = config.schema_info().unwrap();
		assert!(!info.local);
		assert_eq!(info.resolved, "https://example.com/s.json");

		config.set("$schema", json!("file:///tmp/s.json"), SetOptions::default()).unwrap();
		let info = config.schema_info().unwrap();
		assert!(info.local);
		assert_eq!(info.resolved, "/tmp/s.json");
	}

	#[tokio::test]
	async fn test_masked_properties() {
		let dir = tempfile::tempdir().unwrap();
		std::fs::create_dir_all(dir.path().join("project")).unwrap();
		std::fs::write(
			dir.path().join("project/app.config.json"),
			r#"{"profiles": {"base": {"properties": {"user": "u", "host": "h"}, "secure": ["user"]}}}"#,
		)
		.unwrap();
		let config = empty_config(dir.path()).await;
		let masked = config.masked_properties();
		assert_eq!(masked.profiles["base"].properties["user"], json!(SECURE_VALUE_MASK));
		assert_eq!(masked.profiles["base"].properties["host"], json!("h"));
		assert!(config.layer_exists(&dir.path().join("project"), Some(false)));
		assert!(!config.layer_exists(&dir.path().join("project"), Some(true)));
	}
}
