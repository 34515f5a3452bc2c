// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;

use crate::error::VaultError;
use crate::secret::SecretString;
use crate::store::SecretVault;

/// OS credential manager vault. `service` is the application display name.
#[derive(Debug, Clone)]
pub struct KeyringVault {
	service: String,
}

impl KeyringVault {
	pub fn new(service: impl Into<String>) -> Self {
		Self {
			service: service.into(),
		}
	}
}

fn backend(e: impl std::fmt::Display) -> VaultError {
	VaultError::Backend(e.to_string())
}

#[async_trait]
impl SecretVault for KeyringVault {
	async fn load(&self, account: &str) -> Result<Option<SecretString>, VaultError> {
		let service = self.service.clone();
		let account = account.to_string();

		tokio::task::spawn_blocking(move || {
			let entry = keyring::Entry::new(&service, &account).map_err(backend)?;
			match entry.get_password() {
				Ok(data) => Ok(Some(SecretString::new(data))),
				Err(keyring::Error::NoEntry) => Ok(None),
				Err(e) => Err(backend(e)),
			}
		})
		.await
		.map_err(backend)?
	}

	async fn save(&self, account: &str, blob: &SecretString) -> Result<(), VaultError> {
		let service = self.service.clone();
		let account = account.to_string();
		let data = blob.clone();

		tokio::task::spawn_blocking(move || {
			let entry = keyring::Entry::new(&service, &account).map_err(backend)?;
			entry.set_password(data.expose()).map_err(backend)?;

			// Read back through a new entry; mock backends only keep per-instance state.
			let verify = keyring::Entry::new(&service, &account).map_err(backend)?;
			match verify.get_password() {
				Ok(stored) if stored == data.expose() => Ok(()),
				Ok(_) => Err(VaultError::Backend(
					"keyring verification failed: stored data mismatch".to_string(),
				)),
				Err(keyring::Error::NoEntry) => Err(VaultError::Backend(
					"keyring verification failed: secret not persisted".to_string(),
				)),
				Err(e) => Err(VaultError::Backend(format!("keyring verification failed: {e}"))),
			}
		})
		.await
		.map_err(backend)?
	}

	async fn delete(&self, account: &str) -> Result<(), VaultError> {
		let service = self.service.clone();
		let account = account.to_string();

		tokio::task::spawn_blocking(move || {
			let entry = keyring::Entry::new(&service, &account).map_err(backend)?;
			match entry.delete_credential() {
				Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
				Err(e) => Err(backend(e)),
			}
		})
		.await
		.map_err(backend)?
	}
}
