// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Interactive pass over the active layer's secure fields.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::autostore::{ConfigAutoStore, StoreRequest};
use crate::config::{Config, SetOptions};
use crate::profiles::{profile_name_from_path, profile_path_from_name, split_property_path};
use crate::schema::coerce_prop_value;
use crate::ConfigError;

/// Suffix of every secure-field prompt.
pub const SKIP_PROMPT: &str = "- blank to skip:";

/// Asks the user for a value.
#[async_trait]
pub trait Prompter: Send + Sync {
	/// `Ok(None)` means no answer (end of input).
	async fn prompt(&self, message: &str, hide_text: bool) -> Result<Option<String>, ConfigError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurePassOptions {
	/// Only prompt for fields of this profile (case-insensitive).
	pub profile: Option<String>,
	/// Drop vault entries of config files that no longer exist.
	pub prune: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurePassOutcome {
	/// Secure property paths that received a value.
	pub updated: Vec<String>,
	pub pruned: Vec<String>,
}

fn owner_path(field: &str) -> &str {
	split_property_path(field).map_or(field, |(owner, _)| owner)
}

/// Fields owned by `profile`, compared case-insensitively. When nothing
/// matches every field is kept.
pub fn filter_fields(fields: Vec<String>, profile: Option<&str>) -> Vec<String> {
	let Some(profile) = profile else {
		return fields;
	};
	let wanted = profile_path_from_name(profile).to_lowercase();
	let matched: Vec<String> = fields
		.iter()
		.filter(|f| owner_path(f).to_lowercase() == wanted)
		.cloned()
		.collect();
	if matched.is_empty() {
		debug!(profile, "no secure fields match profile, prompting for all");
		fields
	} else {
		matched
	}
}

async fn ask(prompter: &dyn Prompter, message: &str, hide_text: bool) -> Result<Option<String>, ConfigError> {
	Ok(prompter.prompt(message, hide_text).await?.filter(|answer| !answer.is_empty()))
}

/// Obtain a token for a `tokenValue` field through its profile's auth
/// handler. `None` when no handler serves the profile or no credentials were
/// given.
async fn login_for_token(
	config: &Config,
	autostore: &ConfigAutoStore<'_>,
	prompter: &dyn Prompter,
	field: &str,
) -> Result<Option<String>, ConfigError> {
	let profile_path = owner_path(field);
	let Some(handler) = autostore.find_auth_handler_for_profile(config, &StoreRequest::default(), profile_path) else {
		return Ok(None);
	};
	let params = handler.prompt_params();
	if let Some(service) = &params.service_description {
		info!(service = %service, "logging in");
	}

	let props = config.profiles().get(&profile_name_from_path(field), false)?;
	let mut session = handler.create_session_config(&props);
	if session.user.is_none() {
		session.user = ask(prompter, "Enter user name:", false).await?;
	}
	if session.password.is_none() {
		session.password = ask(prompter, "Enter password:", true).await?.map(Into::into);
	}
	let token_type = props
		.get("tokenType")
		.and_then(Value::as_str)
		.map_or(params.default_token_type, str::to_string);
	if session.user.is_none() || session.password.is_none() {
		info!(profile = profile_path, "no credentials provided");
		return Ok(None);
	}
	session.token_type = Some(token_type.clone());

	info!(token_type = %token_type, path = field, "fetching token");
	let token = handler
		.session_login(&session)
		.await
		.map_err(|source| ConfigError::AuthLogin {
			token_type,
			path: field.to_string(),
			source,
		})?;
	info!(path = field, "logged in successfully");
	Ok(Some(token.expose().to_string()))
}

/// Prompt for every secure field of the active layer and save the answers.
///
/// Answers are only applied once every field has been processed; an error
/// part way through leaves the config and the vault untouched.
pub async fn secure_pass(
	config: &mut Config,
	autostore: &ConfigAutoStore<'_>,
	prompter: &dyn Prompter,
	opts: &SecurePassOptions,
) -> Result<SecurePassOutcome, ConfigError> {
	if config.secure().vault().is_none() || config.secure().load_failed() {
		return Err(ConfigError::secure_unavailable(
			"secure properties cannot be saved without a working credential vault",
		));
	}

	let active = config.layers().active();
	let fields = filter_fields(config.secure_fields_for(active.user, active.global), opts.profile.as_deref());

	let mut answers = Vec::new();
	for field in fields {
		let mut answer = None;
		if field.ends_with(".properties.tokenValue") {
			info!(profile = owner_path(&field), "processing secure properties");
			answer = login_for_token(config, autostore, prompter, &field).await?;
		}
		if answer.is_none() {
			answer = ask(prompter, &format!("Enter {field} {SKIP_PROMPT}"), true).await?;
		}
		if let Some(raw) = answer {
			answers.push((field, coerce_prop_value(&raw)));
		}
	}

	let mut outcome = SecurePassOutcome::default();
	for (field, value) in answers {
		config.set(
			&field,
			value,
			SetOptions {
				parse_string: false,
				secure: Some(true),
			},
		)?;
		outcome.updated.push(field);
	}
	if opts.prune {
		outcome.pruned = config.rm_unused_props().await;
	}
	config.save(false).await?;
	Ok(outcome)
}
