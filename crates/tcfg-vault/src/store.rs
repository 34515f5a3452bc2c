// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Vault backends.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::VaultError;
use crate::secret::SecretString;

/// An opaque key/value secret store.
///
/// Implementations keep one blob per account. Callers own the blob format.
#[async_trait]
pub trait SecretVault: Send + Sync + std::fmt::Debug {
	/// Load the blob for an account, `None` when nothing is stored.
	async fn load(&self, account: &str) -> Result<Option<SecretString>, VaultError>;

	/// Replace the blob for an account.
	async fn save(&self, account: &str, blob: &SecretString) -> Result<(), VaultError>;

	/// Remove the blob for an account. Removing a missing account succeeds.
	async fn delete(&self, account: &str) -> Result<(), VaultError>;
}

/// File-backed vault.
///
/// All accounts live in one JSON object on disk, restricted to 0600 on Unix.
#[derive(Debug, Clone)]
pub struct FileVault {
	path: PathBuf,
}

impl FileVault {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	async fn read_entries(&self) -> Result<BTreeMap<String, String>, VaultError> {
		if !fs::try_exists(&self.path).await? {
			return Ok(BTreeMap::new());
		}
		let contents = zeroize::Zeroizing::new(fs::read_to_string(&self.path).await?);
		Ok(serde_json::from_str(&contents)?)
	}

	async fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<(), VaultError> {
		if let Some(parent) = self.path.parent() {
			fs::create_dir_all(parent).await?;
		}

		let contents = zeroize::Zeroizing::new(serde_json::to_string_pretty(entries)?);

		let temp_path = self.path.with_extension("tmp");
		let mut file = fs::File::create(&temp_path).await?;
		file.write_all(contents.as_bytes()).await?;
		file.sync_all().await?;
		drop(file);

		#[cfg(unix)]
		{
			use std::os::unix::fs::PermissionsExt;
			let perms = std::fs::Permissions::from_mode(0o600);
			if let Err(e) = fs::set_permissions(&temp_path, perms).await {
				warn!(path = ?temp_path, error = %e, "failed to restrict vault file permissions");
			}
		}

		fs::rename(&temp_path, &self.path).await?;
		debug!(path = ?self.path, accounts = entries.len(), "vault file written");
		Ok(())
	}
}

#[async_trait]
impl SecretVault for FileVault {
	async fn load(&self, account: &str) -> Result<Option<SecretString>, VaultError> {
		let mut entries = self.read_entries().await?;
		Ok(entries.remove(account).map(SecretString::new))
	}

	async fn save(&self, account: &str, blob: &SecretString) -> Result<(), VaultError> {
		let mut entries = self.read_entries().await?;
		entries.insert(account.to_string(), blob.expose().to_string());
		self.write_entries(&entries).await
	}

	async fn delete(&self, account: &str) -> Result<(), VaultError> {
		let mut entries = self.read_entries().await?;
		if entries.remove(account).is_none() {
			return Ok(());
		}
		self.write_entries(&entries).await
	}
}

/// In-memory vault.
#[derive(Debug, Default)]
pub struct MemoryVault {
	entries: tokio::sync::RwLock<BTreeMap<String, SecretString>>,
	saves: AtomicUsize,
}

impl MemoryVault {
	pub fn new() -> Self {
		Self::default()
	}

	/// Start with one account already populated.
	pub fn with_entry(account: &str, blob: impl Into<SecretString>) -> Self {
		let mut entries = BTreeMap::new();
		entries.insert(account.to_string(), blob.into());
		Self {
			entries: tokio::sync::RwLock::new(entries),
			saves: AtomicUsize::new(0),
		}
	}

	/// Number of successful `save` calls so far.
	pub fn save_count(&self) -> usize {
		self.saves.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl SecretVault for MemoryVault {
	async fn load(&self, account: &str) -> Result<Option<SecretString>, VaultError> {
		Ok(self.entries.read().await.get(account).cloned())
	}

	async fn save(&self, account: &str, blob: &SecretString) -> Result<(), VaultError> {
		self.entries
			.write()
			.await
			.insert(account.to_string(), blob.clone());
		self.saves.fetch_add(1, Ordering::SeqCst);
		Ok(())
	}

	async fn delete(&self, account: &str) -> Result<(), VaultError> {
		self.entries.write().await.remove(account);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_memory_vault_roundtrip() {
		let vault = MemoryVault::new();
		vault.save("acct", &"blob".into()).await.unwrap();

		let loaded = vault.load("acct").await.unwrap().unwrap();
		assert_eq!(loaded.expose(), "blob");
		assert_eq!(vault.save_count(), 1);
	}

	#[tokio::test]
	async fn test_memory_vault_missing_account() {
		let vault = MemoryVault::new();
		assert!(vault.load("nope").await.unwrap().is_none());
		vault.delete("nope").await.unwrap();
	}

	#[tokio::test]
	async fn test_memory_vault_with_entry() {
		let vault = MemoryVault::with_entry("acct", "seed");
		assert_eq!(vault.load("acct").await.unwrap().unwrap().expose(), "seed");
		assert_eq!(vault.save_count(), 0);
	}

	#[tokio::test]
	async fn test_file_vault_roundtrip() {
		let temp_dir = tempfile::tempdir().unwrap();
		let path = temp_dir.path().join("nested/vault.json");
		let vault = FileVault::new(&path);

		vault.save("acct", &"one".into()).await.unwrap();
		vault.save("other", &"two".into()).await.unwrap();
		assert!(path.exists());

		assert_eq!(vault.load("acct").await.unwrap().unwrap().expose(), "one");
		assert_eq!(vault.load("other").await.unwrap().unwrap().expose(), "two");

		vault.delete("acct").await.unwrap();
		assert!(vault.load("acct").await.unwrap().is_none());
		assert!(vault.load("other").await.unwrap().is_some());
	}

	#[tokio::test]
	async fn test_file_vault_load_without_file() {
		let temp_dir = tempfile::tempdir().unwrap();
		let vault = FileVault::new(temp_dir.path().join("vault.json"));
		assert!(vault.load("acct").await.unwrap().is_none());
		vault.delete("acct").await.unwrap();
		assert!(!vault.path().exists());
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn test_file_vault_permissions() {
		use std::os::unix::fs::PermissionsExt;

		let temp_dir = tempfile::tempdir().unwrap();
		let vault = FileVault::new(temp_dir.path().join("vault.json"));
		vault.save("acct", &"x".into()).await.unwrap();

		let mode = std::fs::metadata(vault.path()).unwrap().permissions().mode();
		assert_eq!(mode & 0o777, 0o600);
	}

	#[tokio::test]
	async fn test_file_vault_rejects_corrupt_file() {
		let temp_dir = tempfile::tempdir().unwrap();
		let path = temp_dir.path().join("vault.json");
		std::fs::write(&path, "not json").unwrap();

		let err = FileVault::new(&path).load("acct").await.unwrap_err();
		assert!(matches!(err, VaultError::Serde(_)));
	}
}
