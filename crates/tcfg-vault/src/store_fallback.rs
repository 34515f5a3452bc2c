// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! A vault that prefers one backend and falls back to another.
//!
//! The secure blob is always replaced whole, so only one backend should hold
//! it at a time. A successful save to the primary removes the secondary copy;
//! otherwise an outage of the primary would later resurrect a stale blob.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::VaultError;
use crate::secret::SecretString;
use crate::store::SecretVault;

/// OS credential manager first, 0600 file when it is unavailable.
#[cfg(feature = "keyring")]
pub type KeyringThenFileVault = FallbackVault<crate::store_keyring::KeyringVault, crate::store::FileVault>;

/// Primary vault with a secondary used when the primary fails.
#[derive(Debug)]
pub struct FallbackVault<P, S> {
	primary: P,
	secondary: S,
}

impl<P: SecretVault, S: SecretVault> FallbackVault<P, S> {
	pub fn new(primary: P, secondary: S) -> Self {
		Self { primary, secondary }
	}

	pub fn primary(&self) -> &P {
		&self.primary
	}

	pub fn secondary(&self) -> &S {
		&self.secondary
	}
}

#[async_trait]
impl<P: SecretVault, S: SecretVault> SecretVault for FallbackVault<P, S> {
	async fn load(&self, account: &str) -> Result<Option<SecretString>, VaultError> {
		match self.primary.load(account).await {
			Ok(Some(blob)) => return Ok(Some(blob)),
			Ok(None) => debug!(account = %account, "nothing in primary vault, trying secondary"),
			Err(e) => warn!(account = %account, error = %e, "primary vault load failed, trying secondary"),
		}
		self.secondary.load(account).await
	}

	async fn save(&self, account: &str, blob: &SecretString) -> Result<(), VaultError> {
		match self.primary.save(account, blob).await {
			Ok(()) => {
				if let Err(e) = self.secondary.delete(account).await {
					warn!(account = %account, error = %e, "could not remove stale secondary copy");
				}
				Ok(())
			}
			Err(e) => {
				warn!(account = %account, error = %e, "primary vault save failed, writing secondary");
				self.secondary.save(account, blob).await
			}
		}
	}

	async fn delete(&self, account: &str) -> Result<(), VaultError> {
		let primary = self.primary.delete(account).await;
		let secondary = self.secondary.delete(account).await;
		match (primary, secondary) {
			(Err(e), Err(_)) => Err(e),
			_ => Ok(()),
		}
	}
}
