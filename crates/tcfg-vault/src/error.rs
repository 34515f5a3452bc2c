// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Vault error types.

/// Errors raised by vault backends.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
	#[error("IO error: {0}")]
	Io(String),

	#[error("Serialization error: {0}")]
	Serde(String),

	#[error("Backend error: {0}")]
	Backend(String),

	#[error("Invalid secret blob: {0}")]
	InvalidFormat(String),
}

impl From<std::io::Error> for VaultError {
	fn from(err: std::io::Error) -> Self {
		VaultError::Io(err.to_string())
	}
}

impl From<serde_json::Error> for VaultError {
	fn from(err: serde_json::Error) -> Self {
		VaultError::Serde(err.to_string())
	}
}
