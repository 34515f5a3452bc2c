// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Token login collaborators.
//!
//! An [`AuthHandler`] exchanges a user and password for a token. Handlers are
//! registered per profile type in an [`AuthHandlerRegistry`].

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tcfg_vault::SecretString;

use crate::error::BoxError;
use crate::model::Properties;

/// Token types with this prefix are served by any handler.
pub const TOKEN_TYPE_APIML: &str = "apimlAuthenticationToken";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptParams {
	pub default_token_type: String,
	pub service_description: Option<String>,
}

/// Connection settings for a login.
///
/// Profile property `host` is carried as `hostname`. Password and token are
/// held as [`SecretString`].
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
	pub hostname: Option<String>,
	pub port: Option<u16>,
	pub user: Option<String>,
	pub password: Option<SecretString>,
	pub token_type: Option<String>,
	pub token_value: Option<SecretString>,
	pub base_path: Option<String>,
	pub reject_unauthorized: Option<bool>,
	pub protocol: Option<String>,
	/// Any other profile properties.
	pub extra: Properties,
}

fn string(value: &Value) -> Option<String> {
	match value {
		Value::String(s) => Some(s.clone()),
		Value::Number(n) => Some(n.to_string()),
		Value::Bool(b) => Some(b.to_string()),
		_ => None,
	}
}

impl SessionConfig {
	/// Build from profile properties.
	pub fn from_properties(props: &Properties) -> Self {
		let mut session = Self::default();
		for (name, value) in props {
			session.set(name, value);
		}
		session
	}

	/// Set a field by its profile property name.
	pub fn set(&mut self, prop: &str, value: &Value) {
		match prop {
			"host" | "hostname" => self.hostname = string(value),
			"port" => self.port = value.as_u64().and_then(|p| u16::try_from(p).ok()),
			"user" => self.user = string(value),
			"password" => self.password = string(value).map(SecretString::new),
			"tokenType" => self.token_type = string(value),
			"tokenValue" => self.token_value = string(value).map(SecretString::new),
			"basePath" => self.base_path = string(value),
			"rejectUnauthorized" => self.reject_unauthorized = value.as_bool(),
			"protocol" => self.protocol = string(value),
			other => {
				self.extra.insert(other.to_string(), value.clone());
			}
		}
	}

	/// Read a field by its profile property name. Secrets are exposed.
	pub fn get(&self, prop: &str) -> Option<Value> {
		match prop {
			"host" | "hostname" => self.hostname.clone().map(Value::String),
			"port" => self.port.map(Value::from),
			"user" => self.user.clone().map(Value::String),
			"password" => self.password.as_ref().map(|s| Value::String(s.expose().to_string())),
			"tokenType" => self.token_type.clone().map(Value::String),
			"tokenValue" => self.token_value.as_ref().map(|s| Value::String(s.expose().to_string())),
			"basePath" => self.base_path.clone().map(Value::String),
			"rejectUnauthorized" => self.reject_unauthorized.map(Value::Bool),
			"protocol" => self.protocol.clone().map(Value::String),
			other => self.extra.get(other).cloned(),
		}
	}
}

/// A login service for one or more profile types.
#[async_trait]
pub trait AuthHandler: Send + Sync + Debug {
	fn prompt_params(&self) -> PromptParams;

	/// Session settings for a profile's resolved properties.
	fn create_session_config(&self, props: &Properties) -> SessionConfig {
		SessionConfig::from_properties(props)
	}

	/// Log in and return the token.
	async fn session_login(&self, session: &SessionConfig) -> Result<SecretString, BoxError>;
}

/// Auth handlers keyed by profile type, in registration order.
#[derive(Debug, Clone, Default)]
pub struct AuthHandlerRegistry {
	handlers: BTreeMap<String, Vec<Arc<dyn AuthHandler>>>,
}

impl AuthHandlerRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register(&mut self, profile_type: impl Into<String>, handler: Arc<dyn AuthHandler>) {
		self.handlers.entry(profile_type.into()).or_default().push(handler);
	}

	pub fn is_empty(&self) -> bool {
		self.handlers.is_empty()
	}

	/// Handlers for a profile type followed by those registered for `base`.
	pub fn candidates<'a>(&'a self, profile_type: &'a str) -> impl Iterator<Item = &'a Arc<dyn AuthHandler>> + 'a {
		let own = self.handlers.get(profile_type).into_iter().flatten();
		let base = (profile_type != "base")
			.then(|| self.handlers.get("base"))
			.flatten()
			.into_iter()
			.flatten();
		own.chain(base)
	}

	/// First handler for `profile_type` whose default token type matches
	/// `token_type`. APIML token types match any handler.
	pub fn find(&self, profile_type: &str, token_type: &str) -> Option<Arc<dyn AuthHandler>> {
		self.candidates(profile_type)
			.find(|h| token_type == h.prompt_params().default_token_type || token_type.starts_with(TOKEN_TYPE_APIML))
			.cloned()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[derive(Debug)]
	struct Fixed(&'static str);

	#[async_trait]
	impl AuthHandler for Fixed {
		fn prompt_params(&self) -> PromptParams {
			PromptParams {
				default_token_type: self.0.to_string(),
				service_description: None,
			}
		}

		async fn session_login(&self, _session: &SessionConfig) -> Result<SecretString, BoxError> {
			Ok(SecretString::new(format!("{}-token", self.0)))
		}
	}

	#[test]
	fn test_session_from_properties() {
		let props = Properties::from([
			("host".to_string(), json!("example.com")),
			("port".to_string(), json!(443)),
			("password".to_string(), json!("pw")),
			("encoding".to_string(), json!("IBM-1047")),
		]);
		let session = SessionConfig::from_properties(&props);
		assert_eq!(session.hostname.as_deref(), Some("example.com"));
		assert_eq!(session.port, Some(443));
		assert_eq!(session.get("password"), Some(json!("pw")));
		assert_eq!(session.get("encoding"), Some(json!("IBM-1047")));
		assert!(!format!("{session:?}").contains("pw\""));
	}

	#[test]
	fn test_find_matches_token_type() {
		let mut registry = AuthHandlerRegistry::new();
		registry.register("base", Arc::new(Fixed("jwtToken")));
		registry.register("zosmf", Arc::new(Fixed("LtpaToken2")));

		let found = registry.find("zosmf", "jwtToken").unwrap();
		assert_eq!(found.prompt_params().default_token_type, "jwtToken");
		let found = registry.find("zosmf", "LtpaToken2").unwrap();
		assert_eq!(found.prompt_params().default_token_type, "LtpaToken2");
		assert!(registry.find("base", "LtpaToken2").is_none());
		assert!(registry.find("base", "apimlAuthenticationToken.2").is_some());
	}

	#[tokio::test]
	async fn test_session_login() {
		let handler = Fixed("jwtToken");
		let token = handler.session_login(&SessionConfig::default()).await.unwrap();
		assert_eq!(token.expose(), "jwtToken-token");
	}
}
