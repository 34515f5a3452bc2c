// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Layered team configuration.
//!
//! This crate provides:
//! - Discovery and reading of the four config layers (project-user, project,
//!   global-user, global) as comment-preserving JSONC
//! - A merged read view and mutations on a selectable active layer
//! - Secure properties held in a single vault blob
//! - Profile addressing, inheritance and schema typing
//! - Auto-store of session credentials and an interactive secure pass
//!
//! # Example
//!
//! ```rust,no_run
//! use tcfg_config::{Config, LoadOptions, SetOptions};
//!
//! # tokio_test::block_on(async {
//! let mut config = Config::load("app", LoadOptions::default()).await?;
//! config.set(
//! 	"profiles.base.properties.host",
//! 	serde_json::json!("example.com"),
//! 	SetOptions::default(),
//! )?;
//! config.save(false).await?;
//! # Ok::<(), tcfg_config::ConfigError>(())
//! # });
//! ```

pub mod auth;
pub mod autostore;
pub mod config;
pub mod error;
pub mod layers;
pub mod model;
pub mod paths;
pub mod profiles;
pub mod schema;
pub mod secure;
pub mod secure_prompt;

pub use auth::{AuthHandler, AuthHandlerRegistry, PromptParams, SessionConfig};
pub use autostore::{ConfigAutoStore, StoreRequest};
pub use config::{Config, LoadOptions, SchemaInfo, SchemaSource, SetOptions, SECURE_VALUE_MASK};
pub use error::{BoxError, ConfigError};
pub use layers::{ConfigLayer, LayerStore};
pub use model::{ConfigDocument, ConfigProfile, Properties};
pub use profiles::{Profiles, ResolvedProfile};
pub use schema::{
	coerce_prop_value, coerce_value, ConfigSchema, ProfileProperty, ProfileSchema, ProfileTypeConfiguration,
	TypedProfile, TypedValue,
};
pub use secure::{SecureInfo, SecureProps, SECURE_ACCOUNT};
pub use secure_prompt::{secure_pass, Prompter, SecurePassOptions, SecurePassOutcome};
