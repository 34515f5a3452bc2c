// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::Path;
use std::sync::Arc;

use tcfg_vault::{FileVault, KeyringThenFileVault, KeyringVault, SecretVault};
use tracing::debug;

/// Where secure properties are kept.
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VaultKind {
	/// OS credential manager, falling back to a file
	#[default]
	Auto,
	/// OS credential manager only
	Keyring,
	/// `<home>/vault.json` with 0600 permissions
	File,
	/// No vault; secure properties cannot be saved
	None,
}

pub fn open(kind: VaultKind, service: &str, home_dir: &Path) -> Option<Arc<dyn SecretVault>> {
	let file = home_dir.join("vault.json");
	debug!(?kind, service, file = %file.display(), "opening vault");
	match kind {
		VaultKind::Auto => Some(Arc::new(KeyringThenFileVault::new(KeyringVault::new(service), FileVault::new(file)))),
		VaultKind::Keyring => Some(Arc::new(KeyringVault::new(service))),
		VaultKind::File => Some(Arc::new(FileVault::new(file))),
		VaultKind::None => None,
	}
}
