// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Opaque secret vaults for team configuration.
//!
//! A vault stores one string blob per account under a fixed service name.
//! The configuration engine keeps every secure property of every config file
//! in a single blob, so backends only need load, save and delete.
//!
//! # Backends
//!
//! - **FileVault**: JSON file with 0600 permissions, written via temp + rename
//! - **MemoryVault**: in-process map, counts writes (useful in tests)
//! - **FallbackVault**: primary backend with a secondary used on failure;
//!   only one of the two holds a given account's blob
//! - **KeyringVault** / **KeyringThenFileVault**: OS credential manager
//!   (`keyring` feature)
//!
//! # Example
//!
//! ```rust,no_run
//! use tcfg_vault::{FileVault, SecretString, SecretVault};
//!
//! # tokio_test::block_on(async {
//! let vault = FileVault::new("/tmp/tcfg/vault.json");
//! vault
//! 	.save("secure_config_props", &SecretString::new("e30=".to_string()))
//! 	.await
//! 	.unwrap();
//!
//! let blob = vault.load("secure_config_props").await.unwrap();
//! assert_eq!(blob.unwrap().expose(), "e30=");
//! # });
//! ```

mod error;
mod secret;
mod store;
mod store_fallback;
#[cfg(feature = "keyring")]
mod store_keyring;

pub use error::VaultError;
pub use secret::{SecretString, REDACTED};
pub use store::{FileVault, MemoryVault, SecretVault};
pub use store_fallback::FallbackVault;
#[cfg(feature = "keyring")]
pub use store_fallback::KeyringThenFileVault;
#[cfg(feature = "keyring")]
pub use store_keyring::KeyringVault;
