// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration error types.

use std::path::PathBuf;

use tcfg_vault::VaultError;

/// Boxed error returned by auth handlers and prompters.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while loading, editing or persisting configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	/// Malformed JSONC in a config or schema file
	#[error("Error parsing JSON in the file '{path}': {message} (line {line}, column {column})")]
	Parse {
		path: PathBuf,
		line: usize,
		column: usize,
		message: String,
	},

	/// I/O error reading or writing a file
	#[error("I/O error on '{path}': {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	/// Secure properties cannot be persisted
	#[error(
		"Unable to securely save credentials: {reason}\n\nEnsure that the system credential manager is installed and accessible, then run the command again."
	)]
	SecureSaveUnavailable { reason: String },

	/// Login through an auth handler failed
	#[error("Failed to fetch {token_type} for {path}: {source}")]
	AuthLogin {
		token_type: String,
		path: String,
		#[source]
		source: BoxError,
	},

	/// Profile path does not resolve
	#[error("Profile '{0}' does not exist")]
	ProfileNotFound(String),

	/// Profile path already taken
	#[error("Profile '{0}' already exists")]
	ProfileExists(String),

	/// A value could not be parsed as JSON
	#[error("Failed to parse JSON value '{value}': {message}")]
	JsonValue { value: String, message: String },

	/// Vault backend failure
	#[error("Vault error: {0}")]
	Vault(#[from] VaultError),

	/// Config file changed on disk since it was loaded
	#[error("The file '{0}' was modified by another process since it was loaded; reload and try again")]
	ConcurrentModification(PathBuf),

	/// `secure` flag used on something that is not a single profile property
	#[error("The secure option is only valid when setting a single property, not '{0}'")]
	InvalidSecureOption(String),

	/// Properties do not satisfy the profile type's schema
	#[error("Schema validation failed: {0}")]
	SchemaValidation(String),

	/// Home directory not found
	#[error("Could not determine home directory")]
	HomeDirNotFound,

	/// Interactive prompt failure
	#[error("Prompt failed: {0}")]
	Prompt(String),
}

impl ConfigError {
	/// Wrap an I/O error with the path it occurred on.
	pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
		let path = path.into();
		move |source| Self::Io { path, source }
	}

	pub(crate) fn parse(path: impl Into<PathBuf>, err: tcfg_jsonc::ParseError) -> Self {
		Self::Parse {
			path: path.into(),
			line: err.line,
			column: err.column,
			message: err.message,
		}
	}

	pub(crate) fn secure_unavailable(reason: impl Into<String>) -> Self {
		Self::SecureSaveUnavailable {
			reason: reason.into(),
		}
	}
}
