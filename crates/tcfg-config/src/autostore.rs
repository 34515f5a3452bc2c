// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Automatic storage of prompted or login-obtained session properties.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::auth::{AuthHandler, AuthHandlerRegistry, SessionConfig};
use crate::config::{Config, SetOptions};
use crate::profiles::{profile_name_from_path, profile_path_from_name};
use crate::schema::ConfigSchema;
use crate::ConfigError;

/// What to store and where.
#[derive(Debug, Clone, Default)]
pub struct StoreRequest {
	/// Candidate profile types, in order of preference.
	pub profile_types: Vec<String>,
	/// Profile property names to store (`hostname` is accepted for `host`).
	pub props_to_store: Vec<String>,
	/// Profile names given explicitly, keyed by profile type.
	pub profile_overrides: BTreeMap<String, String>,
	pub default_profile_name: Option<String>,
	pub default_base_profile_name: Option<String>,
	/// Used when no candidate type declares the properties.
	pub profile_type: Option<String>,
	pub profile_name: Option<String>,
	/// Token type to request instead of the handler's default.
	pub token_type: Option<String>,
	/// Force the secure flag instead of deriving it.
	pub set_secure: Option<bool>,
}

/// Ties the loaded schema and the auth handlers together for auto-store.
#[derive(Debug, Clone, Copy)]
pub struct ConfigAutoStore<'a> {
	schema: &'a ConfigSchema,
	handlers: &'a AuthHandlerRegistry,
}

impl<'a> ConfigAutoStore<'a> {
	pub fn new(schema: &'a ConfigSchema, handlers: &'a AuthHandlerRegistry) -> Self {
		Self { schema, handlers }
	}

	fn active_profile_name(config: &Config, request: &StoreRequest, profile_type: &str, fallback: Option<&str>) -> String {
		config.profiles().active_profile_name(
			profile_type,
			request.profile_overrides.get(profile_type).map(String::as_str),
			fallback,
		)
	}

	fn base_profile_name(config: &Config, request: &StoreRequest) -> String {
		Self::active_profile_name(config, request, "base", request.default_base_profile_name.as_deref())
	}

	/// First candidate type whose schema declares every one of `props`, with
	/// the name of its active profile.
	pub fn find_active_profile(&self, config: &Config, request: &StoreRequest, props: &[String]) -> Option<(String, String)> {
		request.profile_types.iter().find_map(|profile_type| {
			let t = self.schema.profile_type(profile_type)?;
			props.iter().all(|p| t.schema.properties.contains_key(p)).then(|| {
				let name = Self::active_profile_name(config, request, profile_type, request.default_profile_name.as_deref());
				(profile_type.clone(), name)
			})
		})
	}

	/// Auth handler able to issue a token for the profile at `profile_path`.
	///
	/// Base profiles need `tokenType`. Service profiles need `basePath` and
	/// fall back to the base profile when they have no `tokenType`.
	pub fn find_auth_handler_for_profile(
		&self,
		config: &Config,
		request: &StoreRequest,
		profile_path: &str,
	) -> Option<Arc<dyn AuthHandler>> {
		self.find_handler(config, request, profile_path, true)
	}

	fn find_handler(
		&self,
		config: &Config,
		request: &StoreRequest,
		profile_path: &str,
		allow_fallback: bool,
	) -> Option<Arc<dyn AuthHandler>> {
		let profiles = config.profiles();
		let name = profile_name_from_path(profile_path);
		let profile_type = profiles.profile(&name)?.profile_type.clone()?;
		let props = profiles.get(&name, false).ok()?;

		if profile_type != "base" {
			props.get("basePath")?;
			if props.get("tokenType").is_none() {
				if !allow_fallback {
					return None;
				}
				let base = profile_path_from_name(&Self::base_profile_name(config, request));
				return self.find_handler(config, request, &base, false);
			}
		}
		let token_type = props.get("tokenType")?.as_str()?;
		self.handlers.find(&profile_type, token_type)
	}

	/// Log in with the session's credentials and replace them by a token.
	///
	/// Returns false when no auth handler serves the profile.
	pub async fn fetch_token_for_session(
		&self,
		config: &Config,
		request: &StoreRequest,
		session: &mut SessionConfig,
		profile_path: &str,
	) -> Result<bool, ConfigError> {
		let Some(handler) = self.find_auth_handler_for_profile(config, request, profile_path) else {
			return Ok(false);
		};
		let token_type = request
			.token_type
			.clone()
			.unwrap_or_else(|| handler.prompt_params().default_token_type);

		let mut login = SessionConfig {
			token_type: Some(token_type.clone()),
			..Default::default()
		};
		if let Some(base) = self.schema.profile_type("base") {
			for prop in base.schema.properties.keys() {
				if let Some(value) = session.get(prop) {
					login.set(prop, &value);
				}
			}
		}

		info!(token_type = %token_type, profile = profile_path, "fetching token");
		let token = handler
			.session_login(&login)
			.await
			.map_err(|source| ConfigError::AuthLogin {
				token_type: token_type.clone(),
				path: profile_path.to_string(),
				source,
			})?;
		session.token_type = Some(token_type);
		session.token_value = Some(token);
		session.user = None;
		session.password = None;
		Ok(true)
	}

	/// Store session properties in the profile they belong to.
	///
	/// Does nothing unless there is something to store, a config file exists
	/// and `autoStore` is on. Returns the stored property names.
	pub async fn store_session_props(
		&self,
		config: &mut Config,
		request: &StoreRequest,
		session: &mut SessionConfig,
	) -> Result<Vec<String>, ConfigError> {
		if request.props_to_store.is_empty() || !config.exists() || config.properties().auto_store != Some(true) {
			return Ok(Vec::new());
		}

		let mut props: Vec<String> = request
			.props_to_store
			.iter()
			.map(|p| if p == "hostname" { "host".to_string() } else { p.clone() })
			.collect();
		let (profile_type, profile_name) = match self.find_active_profile(config, request, &props) {
			Some(found) => found,
			None => match (&request.profile_type, &request.profile_name) {
				(Some(t), Some(n)) => (t.clone(), n.clone()),
				_ => {
					debug!(props = ?props, "no profile to auto-store into");
					return Ok(Vec::new());
				}
			},
		};
		let profile_path = profile_path_from_name(&profile_name);

		if props.iter().any(|p| p == "user")
			&& props.iter().any(|p| p == "password")
			&& self.fetch_token_for_session(config, request, session, &profile_path).await?
		{
			props.retain(|p| p != "user" && p != "password");
			props.push("tokenValue".to_string());
		}

		let before = (config.layers().active().user, config.layers().active().global);
		if let Some((user, global)) = config.layers().find(&profile_name).map(|l| (l.user, l.global)) {
			config.layers_mut().activate(user, global);
		}

		let profiles = config.profiles();
		let profile = profiles.get(&profile_name, false)?;
		let profile_secure = config.secure_props_for_profile(&profile_name);
		let schema_secure = |t: &str, p: &str| {
			self.schema
				.profile_type(t)
				.and_then(|t| t.schema.properties.get(p))
				.is_some_and(|p| p.secure)
		};

		let base_name = Self::base_profile_name(config, request);
		let base = profiles.get(&base_name, false)?;
		let base_secure = config.secure_props_for_profile(&base_name);

		let mut updates = Vec::new();
		let mut stored = Vec::new();
		for prop in &props {
			let Some(value) = session.get(prop) else {
				debug!(prop = %prop, "session has no value to store");
				continue;
			};
			let mut owner = profile_path.clone();
			let mut secure = schema_secure(&profile_type, prop) || profile_secure.contains(prop);

			let use_base = (!profiles.exists(&profile_name) && profiles.exists(&base_name))
				|| (!profile.contains_key(prop)
					&& !profile_secure.contains(prop)
					&& (base.contains_key(prop) || base_secure.contains(prop)))
				|| (prop == "tokenValue" && !profile.contains_key("tokenType") && base.contains_key("tokenType"))
				|| profile_type == "base";
			if use_base {
				owner = profile_path_from_name(&base_name);
				secure = schema_secure("base", prop) || base_secure.contains(prop);
			}

			if secure {
				let higher = config
					.secure_info_for_prop(&format!("{owner}.properties.{prop}"), true)
					.map(|info| info.path);
				if let Some(path) = higher.filter(|p| p.split('.').count() < owner.split('.').count()) {
					owner = path.strip_suffix(".secure").unwrap_or(&path).to_string();
				}
			}

			updates.push((format!("{owner}.properties.{prop}"), value, request.set_secure.unwrap_or(secure)));
			stored.push(prop.clone());
		}
		if updates.is_empty() {
			config.layers_mut().activate(before.0, before.1);
			return Ok(Vec::new());
		}

		for (path, value, secure) in updates {
			config.set(
				&path,
				value,
				SetOptions {
					parse_string: false,
					secure: Some(secure),
				},
			)?;
		}
		let saved = config.save(false).await;
		let stored_in = config.layers().active().path.clone();
		config.layers_mut().activate(before.0, before.1);
		saved?;

		info!(path = %stored_in.display(), props = %stored.join(", "), "stored properties");
		Ok(stored)
	}
}
