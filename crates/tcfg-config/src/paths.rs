// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Config file naming and discovery.

use std::path::{Path, PathBuf};

use crate::ConfigError;

/// `<app>.config.json`
pub fn config_name(app: &str) -> String {
	format!("{app}.config.json")
}

/// `<app>.config.user.json`
pub fn user_config_name(app: &str) -> String {
	format!("{app}.config.user.json")
}

/// `<app>.schema.json`
pub fn schema_name(app: &str) -> String {
	format!("{app}.schema.json")
}

/// Environment variable that overrides the global config directory.
pub fn home_env_var(app: &str) -> String {
	let upper: String = app
		.chars()
		.map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
		.collect();
	format!("{upper}_CLI_HOME")
}

/// Resolve the global config directory.
///
/// Uses `<APP>_CLI_HOME` if set, otherwise `~/.<app>`.
pub fn resolve_home_dir(app: &str) -> Result<PathBuf, ConfigError> {
	let var = home_env_var(app);
	let home = match std::env::var_os(&var).filter(|v| !v.is_empty()) {
		Some(dir) => PathBuf::from(dir),
		None => dirs::home_dir()
			.ok_or(ConfigError::HomeDirNotFound)?
			.join(format!(".{app}")),
	};
	tracing::debug!(app, env = %var, home = %home.display(), "resolved global config directory");
	Ok(home)
}

/// Walk from `start_dir` up through its parents looking for `file`.
///
/// Directories listed in `ignore_dirs` are skipped so the global config is
/// never picked up as a project layer. Returns the path of the first match.
pub fn search(file: &str, start_dir: &Path, ignore_dirs: &[PathBuf]) -> Option<PathBuf> {
	for dir in start_dir.ancestors() {
		if ignore_dirs.iter().any(|ignored| ignored == dir) {
			continue;
		}
		let candidate = dir.join(file);
		if candidate.is_file() {
			tracing::debug!(file, found = %candidate.display(), "found config file");
			return Some(candidate);
		}
	}
	None
}
