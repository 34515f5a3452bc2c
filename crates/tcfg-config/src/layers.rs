// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The four config layers and their merge.
//!
//! Layers are kept in precedence order, highest first:
//!
//! | index | layer         | user  | global |
//! |-------|---------------|-------|--------|
//! | 0     | project-user  | true  | false  |
//! | 1     | project       | false | false  |
//! | 2     | global-user   | true  | true   |
//! | 3     | global        | false | true   |
//!
//! Each layer is held as a comment-preserving JSONC [`Document`]. Secure
//! values are hydrated into that document from the vault blob and stripped
//! again when the layer is written.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tcfg_jsonc::{Document, Object, Value};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::model::ConfigDocument;
use crate::profiles::profile_path_from_name;
use crate::secure::SecureBlob;
use crate::ConfigError;

pub(crate) const LAYER_ORDER: [(bool, bool); 4] = [(true, false), (false, false), (true, true), (false, true)];

/// What was on disk when a layer was last read or written.
#[derive(Debug, Clone, PartialEq, Eq)]
enum DiskState {
	/// Never read (`no_load`); writes are not checked.
	Unknown,
	Missing,
	Digest(String),
}

/// One config file.
#[derive(Debug, Clone)]
pub struct ConfigLayer {
	pub path: PathBuf,
	pub exists: bool,
	pub user: bool,
	pub global: bool,
	doc: Document,
	disk: DiskState,
}

fn digest(bytes: &[u8]) -> String {
	hex::encode(Sha256::digest(bytes))
}

fn segments(path: &str) -> Vec<&str> {
	path.split('.').collect()
}

fn find_secure(profiles: Option<&Object>, prefix: &str, out: &mut Vec<String>) {
	let Some(profiles) = profiles else {
		return;
	};
	for (name, profile) in profiles.iter() {
		let Some(profile) = profile.as_object() else {
			continue;
		};
		if let Some(secure) = profile.get("secure").and_then(Value::as_array) {
			for prop in secure.iter().filter_map(Value::as_str) {
				out.push(format!("{prefix}.{name}.properties.{prop}"));
			}
		}
		find_secure(
			profile.get("profiles").and_then(Value::as_object),
			&format!("{prefix}.{name}.profiles"),
			out,
		);
	}
}

impl ConfigLayer {
	pub(crate) fn new(path: PathBuf, user: bool, global: bool) -> Self {
		Self {
			path,
			exists: false,
			user,
			global,
			doc: Document::default(),
			disk: DiskState::Unknown,
		}
	}

	/// The layer's JSONC tree, secure values included.
	pub fn document(&self) -> &Document {
		&self.doc
	}

	pub(crate) fn document_mut(&mut self) -> &mut Document {
		&mut self.doc
	}

	/// Typed view of the layer's contents.
	pub fn properties(&self) -> ConfigDocument {
		ConfigDocument::from_json(&self.doc.to_json()).unwrap_or_else(|e| {
			warn!(path = %self.path.display(), error = %e, "layer has an unexpected shape, treating as empty");
			ConfigDocument::default()
		})
	}

	/// Secure property paths declared by this layer, in file order.
	pub fn secure_fields(&self) -> Vec<String> {
		let mut out = Vec::new();
		find_secure(
			self.doc
				.get(&["profiles"])
				.and_then(Value::as_object),
			"profiles",
			&mut out,
		);
		out
	}

	pub(crate) fn key(&self) -> String {
		self.path.to_string_lossy().into_owned()
	}

	/// Copy this layer's secure values out of the vault blob into the tree.
	pub(crate) fn hydrate(&mut self, blob: &SecureBlob) {
		let Some(entries) = blob.get(&self.key()) else {
			return;
		};
		for field in self.secure_fields() {
			if let Some(value) = entries.get(&field) {
				self.doc.set(&segments(&field), value);
			}
		}
	}

	/// Secure values currently held in the tree, keyed by secure path.
	pub(crate) fn secure_values(&self) -> BTreeMap<String, serde_json::Value> {
		self.secure_fields()
			.into_iter()
			.filter_map(|field| {
				let value = self.doc.get(&segments(&field))?.to_json();
				(!value.is_null()).then_some((field, value))
			})
			.collect()
	}

	/// Re-read the file. A missing file leaves an empty, non-existent layer.
	pub(crate) async fn read(&mut self) -> Result<(), ConfigError> {
		match fs::read(&self.path).await {
			Ok(bytes) => {
				let text = String::from_utf8_lossy(&bytes);
				let doc = tcfg_jsonc::parse(&text).map_err(|e| ConfigError::parse(&self.path, e))?;
				if let Err(e) = ConfigDocument::from_json(&doc.to_json()) {
					return Err(ConfigError::Parse {
						path: self.path.clone(),
						line: e.line(),
						column: e.column(),
						message: format!("invalid configuration document: {e}"),
					});
				}
				self.doc = doc;
				self.exists = true;
				self.disk = DiskState::Digest(digest(&bytes));
				debug!(path = %self.path.display(), "read config layer");
			}
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				self.doc = Document::default();
				self.exists = false;
				self.disk = DiskState::Missing;
			}
			Err(e) => return Err(ConfigError::io(&self.path)(e)),
		}
		Ok(())
	}

	/// Serialized file contents: secure values removed, `$schema` first.
	pub(crate) fn render(&self) -> String {
		let mut out = self.doc.clone();
		for field in self.secure_fields() {
			out.remove(&segments(&field));
		}
		if let Some(root) = out.root_mut().as_object_mut() {
			root.move_to_front("$schema");
		}
		out.to_string()
	}

	/// Write the layer to disk via a temp file and rename.
	///
	/// Fails with [`ConfigError::ConcurrentModification`] when the file on
	/// disk no longer matches what was loaded.
	pub(crate) async fn write(&mut self) -> Result<(), ConfigError> {
		let on_disk = match fs::read(&self.path).await {
			Ok(bytes) => DiskState::Digest(digest(&bytes)),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => DiskState::Missing,
			Err(e) => return Err(ConfigError::io(&self.path)(e)),
		};
		if self.disk != DiskState::Unknown && self.disk != on_disk {
			return Err(ConfigError::ConcurrentModification(self.path.clone()));
		}

		if let Some(parent) = self.path.parent() {
			fs::create_dir_all(parent).await.map_err(ConfigError::io(parent))?;
		}

		let contents = self.render();
		let file_name = self
			.path
			.file_name()
			.map(|n| n.to_string_lossy().into_owned())
			.unwrap_or_default();
		let temp_path = self.path.with_file_name(format!(".{file_name}.tmp"));

		let mut file = fs::File::create(&temp_path).await.map_err(ConfigError::io(&temp_path))?;
		file.write_all(contents.as_bytes())
			.await
			.map_err(ConfigError::io(&temp_path))?;
		file.sync_all().await.map_err(ConfigError::io(&temp_path))?;
		drop(file);
		fs::rename(&temp_path, &self.path)
			.await
			.map_err(ConfigError::io(&self.path))?;

		self.disk = DiskState::Digest(digest(contents.as_bytes()));
		self.exists = true;
		info!(path = %self.path.display(), user = self.user, global = self.global, "wrote config layer");
		Ok(())
	}
}

/// The four layers plus the active-layer selection.
#[derive(Debug, Clone)]
pub struct LayerStore {
	layers: Vec<ConfigLayer>,
	active: usize,
	pub(crate) secure_cache: SecureBlob,
}

fn layer_index(user: bool, global: bool) -> usize {
	match (user, global) {
		(true, false) => 0,
		(false, false) => 1,
		(true, true) => 2,
		(false, true) => 3,
	}
}

/// Add whatever `incoming` has that `target` lacks. `target` wins conflicts;
/// arrays are unioned.
fn merge_missing(target: &mut Document, path: &mut Vec<String>, incoming: &serde_json::Value) {
	let keys: Vec<&str> = path.iter().map(String::as_str).collect();
	let existing = target.get(&keys).map(Value::to_json);
	match (existing, incoming) {
		(None, _) | (Some(serde_json::Value::Null), _) => target.set(&keys, incoming),
		(Some(serde_json::Value::Object(_)), serde_json::Value::Object(map)) => {
			for (key, value) in map {
				path.push(key.clone());
				merge_missing(target, path, value);
				path.pop();
			}
		}
		(Some(serde_json::Value::Array(current)), serde_json::Value::Array(items)) => {
			if let Some(array) = target.get_mut(&keys).and_then(Value::as_array_mut) {
				for item in items.iter().filter(|i| !current.contains(i)) {
					array.push(Value::from_json(item, None));
				}
			}
		}
		_ => {}
	}
}

impl LayerStore {
	pub(crate) fn new(layers: Vec<ConfigLayer>) -> Self {
		Self {
			layers,
			active: layer_index(false, false),
			secure_cache: SecureBlob::new(),
		}
	}

	pub fn iter(&self) -> impl Iterator<Item = &ConfigLayer> {
		self.layers.iter()
	}

	pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut ConfigLayer> {
		self.layers.iter_mut()
	}

	pub fn layer(&self, user: bool, global: bool) -> &ConfigLayer {
		&self.layers[layer_index(user, global)]
	}

	pub fn active(&self) -> &ConfigLayer {
		&self.layers[self.active]
	}

	pub(crate) fn active_mut(&mut self) -> &mut ConfigLayer {
		&mut self.layers[self.active]
	}

	/// True when any layer exists on disk.
	pub fn any_exists(&self) -> bool {
		self.layers.iter().any(|l| l.exists)
	}

	/// Select the first existing layer in precedence order, else project.
	pub(crate) fn activate_first_existing(&mut self) {
		self.active = self
			.layers
			.iter()
			.position(|l| l.exists)
			.unwrap_or(layer_index(false, false));
	}

	/// Select the layer that writes go to. The merged read is unaffected.
	pub fn activate(&mut self, user: bool, global: bool) {
		self.active = layer_index(user, global);
		debug!(user, global, "activated layer");
	}

	/// Select a layer and point it at `dir`, re-reading it when the directory
	/// differs from the layer's current one.
	pub async fn activate_in_dir(&mut self, user: bool, global: bool, dir: &Path) -> Result<(), ConfigError> {
		self.activate(user, global);
		let layer = &self.layers[self.active];
		if layer.path.parent() == Some(dir) {
			return Ok(());
		}
		let file_name = layer.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
		self.layers[self.active].path = dir.join(file_name);
		self.read(user, global).await
	}

	/// Clone of the active layer.
	pub fn get(&self) -> ConfigLayer {
		self.active().clone()
	}

	/// Re-read one layer from disk and re-apply its cached secure values.
	pub async fn read(&mut self, user: bool, global: bool) -> Result<(), ConfigError> {
		let idx = layer_index(user, global);
		self.layers[idx].read().await?;
		let cache = &self.secure_cache;
		self.layers[idx].hydrate(cache);
		Ok(())
	}

	/// Replace the active layer's contents.
	pub fn set(&mut self, document: &ConfigDocument) {
		let layer = self.active_mut();
		layer.doc = Document::from_json(&document.to_json());
	}

	/// Merge a document into the active layer.
	///
	/// Existing profile fields and defaults win, `secure` arrays are unioned
	/// and `autoStore` is overwritten when `document` sets it. With `dry_run`
	/// the merged layer is returned and the active layer is left alone.
	pub fn merge(&mut self, document: &ConfigDocument, dry_run: bool) -> Option<ConfigLayer> {
		let mut scratch;
		let layer = if dry_run {
			scratch = self.active().clone();
			&mut scratch
		} else {
			self.active_mut()
		};

		let incoming = document.to_json();
		for section in ["profiles", "defaults"] {
			let mut path = vec![section.to_string()];
			merge_missing(&mut layer.doc, &mut path, &incoming[section]);
		}
		if let Some(auto_store) = document.auto_store {
			layer.doc.set(&["autoStore"], &serde_json::Value::Bool(auto_store));
		}

		if dry_run {
			Some(layer.clone())
		} else {
			None
		}
	}

	/// Highest-precedence layer holding the named profile.
	pub fn find(&self, profile_name: &str) -> Option<&ConfigLayer> {
		let path = profile_path_from_name(profile_name);
		let keys = segments(&path);
		self.layers.iter().find(|l| l.doc.get(&keys).is_some())
	}

	/// Write the active layer.
	pub async fn write(&mut self) -> Result<(), ConfigError> {
		self.active_mut().write().await
	}

	/// Merged view across existing layers.
	///
	/// A profile defined in a higher layer shadows the same-named profile in
	/// every lower layer. `defaults` and `autoStore` take the first value seen;
	/// `$schema` comes from the active layer.
	pub fn merged(&self) -> ConfigDocument {
		let mut merged = ConfigDocument {
			schema: self.active().properties().schema,
			..Default::default()
		};
		for layer in self.layers.iter().filter(|l| l.exists) {
			let props = layer.properties();
			for (name, profile) in props.profiles {
				merged.profiles.entry(name).or_insert(profile);
			}
			for (profile_type, name) in props.defaults {
				merged.defaults.entry(profile_type).or_insert(name);
			}
			if merged.auto_store.is_none() {
				merged.auto_store = props.auto_store;
			}
		}
		debug!(profiles = merged.profiles.len(), defaults = merged.defaults.len(), "merged config layers");
		merged
	}
}
