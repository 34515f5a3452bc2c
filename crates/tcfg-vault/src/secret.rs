// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;

use zeroize::Zeroize;

/// Placeholder printed instead of a secret.
pub const REDACTED: &str = "[REDACTED]";

/// A string that never prints itself and is wiped from memory on drop.
///
/// Vault blobs, passwords and session tokens travel in this wrapper. The
/// only way to read the contents is [`SecretString::expose`].
#[derive(Zeroize, PartialEq, Eq)]
#[zeroize(drop)]
pub struct SecretString {
	inner: String,
}

impl SecretString {
	pub fn new(inner: String) -> Self {
		Self { inner }
	}

	pub fn expose(&self) -> &str {
		&self.inner
	}

	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}
}

impl Clone for SecretString {
	fn clone(&self) -> Self {
		Self {
			inner: self.inner.clone(),
		}
	}
}

impl From<String> for SecretString {
	fn from(inner: String) -> Self {
		Self::new(inner)
	}
}

impl From<&str> for SecretString {
	fn from(inner: &str) -> Self {
		Self::new(inner.to_string())
	}
}

impl fmt::Debug for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("SecretString").field(&REDACTED).finish()
	}
}

impl fmt::Display for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}
