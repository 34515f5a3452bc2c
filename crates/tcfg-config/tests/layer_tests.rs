// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Integration tests for layer discovery, the merged read and writes.
//!
//! Tests cover:
//! - Writing to every layer for every combination of existing layers
//! - `set` + reload keeping values and coerced types
//! - Project-user over project precedence with full profile shadowing
//! - Comment preservation across `set` + `save`
//! - Rejecting writes over files changed on disk since load

use std::path::{Path, PathBuf};

use serde_json::json;
use tcfg_config::{Config, ConfigError, LoadOptions, SetOptions};
use tempfile::tempdir;

const LAYERS: [(bool, bool); 4] = [(true, false), (false, false), (true, true), (false, true)];

fn layer_path(root: &Path, user: bool, global: bool) -> PathBuf {
	let dir = if global { root.join("home") } else { root.join("project") };
	let file = if user { "app.config.user.json" } else { "app.config.json" };
	dir.join(file)
}

fn options(root: &Path) -> LoadOptions {
	LoadOptions {
		home_dir: Some(root.join("home")),
		project_dir: Some(root.join("project")),
		..Default::default()
	}
}

async fn load(root: &Path) -> Config {
	Config::load("app", options(root)).await.unwrap()
}

#[tokio::test]
async fn test_write_targets_requested_layer_for_every_subset() {
	for subset in 0u8..16 {
		for (user, global) in LAYERS {
			let dir = tempdir().unwrap();
			for (idx, (u, g)) in LAYERS.iter().enumerate() {
				if subset & (1 << idx) != 0 {
					let path = layer_path(dir.path(), *u, *g);
					std::fs::create_dir_all(path.parent().unwrap()).unwrap();
					std::fs::write(&path, "{}").unwrap();
				}
			}

			let mut config = load(dir.path()).await;
			config.layers_mut().activate(user, global);
			config
				.set("defaults.base", json!("written"), SetOptions::default())
				.unwrap();
			config.save(false).await.unwrap();

			let target = layer_path(dir.path(), user, global);
			let written: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&target).unwrap()).unwrap();
			assert_eq!(written["defaults"]["base"], "written", "subset {subset:#06b} target {target:?}");

			for (u, g) in LAYERS.iter().filter(|&&l| l != (user, global)) {
				let other = layer_path(dir.path(), *u, *g);
				if let Ok(text) = std::fs::read_to_string(&other) {
					assert_eq!(text, "{}", "untouched layer {other:?} was modified");
				}
			}
		}
	}
}

#[tokio::test]
async fn test_set_then_reload_keeps_coerced_types() {
	let dir = tempdir().unwrap();
	let mut config = load(dir.path()).await;
	let parse = SetOptions {
		parse_string: true,
		secure: None,
	};
	config.set("profiles.base.properties.port", json!("1443"), parse).unwrap();
	config.set("profiles.base.properties.rejectUnauthorized", json!("false"), parse).unwrap();
	config.set("profiles.base.properties.host", json!("example.com"), parse).unwrap();
	config.set("profiles.base.type", json!("base"), SetOptions::default()).unwrap();
	config.save(false).await.unwrap();

	let reloaded = load(dir.path()).await;
	let props = reloaded.profiles().get("base", true).unwrap();
	assert_eq!(props["port"], json!(1443));
	assert_eq!(props["rejectUnauthorized"], json!(false));
	assert_eq!(props["host"], json!("example.com"));
	assert!(reloaded.exists());
}

#[tokio::test]
async fn test_project_user_shadows_project_profile() {
	let dir = tempdir().unwrap();
	let project = dir.path().join("project");
	std::fs::create_dir_all(&project).unwrap();
	std::fs::write(
		project.join("app.config.json"),
		r#"{"profiles": {"base": {"properties": {"host": "A", "rejectUnauthorized": true}}}}"#,
	)
	.unwrap();
	std::fs::write(
		project.join("app.config.user.json"),
		r#"{"profiles": {"base": {"properties": {"host": "B", "port": 443}}}}"#,
	)
	.unwrap();

	let config = load(dir.path()).await;
	let merged = config.properties();
	assert_eq!(
		serde_json::to_value(&merged.profiles["base"].properties).unwrap(),
		json!({ "host": "B", "port": 443 })
	);
	assert!(config.layers().active().user);
}

#[tokio::test]
async fn test_project_layer_found_in_parent_directory() {
	let dir = tempdir().unwrap();
	std::fs::create_dir_all(dir.path().join("project/sub/dir")).unwrap();
	std::fs::write(dir.path().join("project/app.config.json"), "{}").unwrap();

	let opts = LoadOptions {
		project_dir: Some(dir.path().join("project/sub/dir")),
		..options(dir.path())
	};
	let config = Config::load("app", opts).await.unwrap();
	assert_eq!(config.layers().layer(false, false).path, dir.path().join("project/app.config.json"));
	assert_eq!(
		config.layers().layer(true, false).path,
		dir.path().join("project/sub/dir/app.config.user.json")
	);
}

#[tokio::test]
async fn test_comments_survive_set_and_save() {
	let dir = tempdir().unwrap();
	let path = layer_path(dir.path(), false, false);
	std::fs::create_dir_all(path.parent().unwrap()).unwrap();
	let original = r#"{
    // shared connection details
    "profiles": {
        "base": {
            "properties": {
                "host": "example.com", /* prod */
                "port": 443,
            },
        },
    },
}
"#;
	std::fs::write(&path, original).unwrap();

	let mut config = load(dir.path()).await;
	config
		.set("profiles.base.properties.port", json!(1443), SetOptions::default())
		.unwrap();
	config.save(false).await.unwrap();

	let written = std::fs::read_to_string(&path).unwrap();
	assert_eq!(written, original.replace("443,", "1443,"));
}

#[tokio::test]
async fn test_malformed_file_names_line_and_column() {
	let dir = tempdir().unwrap();
	let path = layer_path(dir.path(), false, false);
	std::fs::create_dir_all(path.parent().unwrap()).unwrap();
	std::fs::write(&path, "{\n  \"profiles\": {\n    \"base\": oops\n  }\n}").unwrap();

	let err = Config::load("app", options(dir.path())).await.unwrap_err();
	match err {
		ConfigError::Parse { path: p, line, .. } => {
			assert_eq!(p, path);
			assert_eq!(line, 3);
		}
		other => panic!("expected parse error, got {other:?}"),
	}
}

#[tokio::test]
async fn test_write_rejects_concurrent_modification() {
	let dir = tempdir().unwrap();
	let path = layer_path(dir.path(), false, false);
	std::fs::create_dir_all(path.parent().unwrap()).unwrap();
	std::fs::write(&path, r#"{"defaults": {}}"#).unwrap();

	let mut config = load(dir.path()).await;
	std::fs::write(&path, r#"{"defaults": {"base": "someone-else"}}"#).unwrap();
	config.set("defaults.base", json!("mine"), SetOptions::default()).unwrap();

	let err = config.save(false).await.unwrap_err();
	assert!(matches!(err, ConfigError::ConcurrentModification(p) if p == path));
	assert!(std::fs::read_to_string(&path).unwrap().contains("someone-else"));

	config.layers_mut().read(false, false).await.unwrap();
	config.set("defaults.base", json!("mine"), SetOptions::default()).unwrap();
	config.save(false).await.unwrap();
	assert!(std::fs::read_to_string(&path).unwrap().contains("mine"));
}

#[tokio::test]
async fn test_activate_in_dir_repoints_layer() {
	let dir = tempdir().unwrap();
	let other = dir.path().join("elsewhere");
	std::fs::create_dir_all(&other).unwrap();
	std::fs::write(other.join("app.config.json"), r#"{"defaults": {"base": "there"}}"#).unwrap();

	let mut config = load(dir.path()).await;
	config.layers_mut().activate_in_dir(false, false, &other).await.unwrap();
	let active = config.layers().get();
	assert_eq!(active.path, other.join("app.config.json"));
	assert!(active.exists);
	assert_eq!(config.properties().defaults["base"], "there");
}
