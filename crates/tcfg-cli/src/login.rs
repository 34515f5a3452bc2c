// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Token login through an external command.
//!
//! The command receives the login settings as one JSON object on stdin and
//! prints the token on stdout. A non-zero exit fails the login with the
//! command's stderr.

use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tcfg_config::auth::TOKEN_TYPE_APIML;
use tcfg_config::{AuthHandler, AuthHandlerRegistry, BoxError, PromptParams, SessionConfig};
use tcfg_vault::SecretString;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, trace};

const LOGIN_FIELDS: [&str; 8] = [
	"host",
	"port",
	"user",
	"password",
	"tokenType",
	"basePath",
	"protocol",
	"rejectUnauthorized",
];

#[derive(Debug, Clone)]
pub struct CommandAuthHandler {
	program: String,
	args: Vec<String>,
	token_type: String,
}

impl CommandAuthHandler {
	pub fn new(program: impl Into<String>, args: Vec<String>, token_type: impl Into<String>) -> Self {
		Self {
			program: program.into(),
			args,
			token_type: token_type.into(),
		}
	}

	fn login_request(session: &SessionConfig) -> String {
		let fields: Map<String, Value> = LOGIN_FIELDS
			.iter()
			.filter_map(|f| session.get(f).map(|v| (f.to_string(), v)))
			.collect();
		Value::Object(fields).to_string()
	}
}

#[async_trait]
impl AuthHandler for CommandAuthHandler {
	fn prompt_params(&self) -> PromptParams {
		PromptParams {
			default_token_type: self.token_type.clone(),
			service_description: Some(format!("login command `{}`", self.program)),
		}
	}

	async fn session_login(&self, session: &SessionConfig) -> Result<SecretString, BoxError> {
		trace!(program = %self.program, args = ?self.args, "running login command");
		let mut child = Command::new(&self.program)
			.args(&self.args)
			.stdin(Stdio::piped())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.kill_on_drop(true)
			.spawn()
			.map_err(|e| format!("cannot run login command `{}`: {e}", self.program))?;

		if let Some(mut stdin) = child.stdin.take() {
			stdin.write_all(Self::login_request(session).as_bytes()).await?;
		}
		let output = child.wait_with_output().await?;

		if !output.status.success() {
			let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
			return Err(format!("login command failed ({}): {stderr}", output.status).into());
		}
		let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
		if token.is_empty() {
			return Err("login command printed no token".into());
		}
		debug!(program = %self.program, "login command returned a token");
		Ok(SecretString::new(token))
	}
}

/// Handlers available to the CLI. A login command, when given, serves base
/// profiles and through them every service profile.
pub fn registry(command: &[String], token_type: Option<&str>) -> AuthHandlerRegistry {
	let mut handlers = AuthHandlerRegistry::new();
	if let Some((program, args)) = command.split_first() {
		let handler = CommandAuthHandler::new(program, args.to_vec(), token_type.unwrap_or(TOKEN_TYPE_APIML));
		handlers.register("base", Arc::new(handler));
	}
	handlers
}

#[cfg(all(test, unix))]
mod tests {
	use super::*;
	use serde_json::json;

	fn sh(script: &str) -> CommandAuthHandler {
		CommandAuthHandler::new("sh", vec!["-c".into(), script.into()], "jwtToken")
	}

	fn credentials() -> SessionConfig {
		let mut session = SessionConfig::default();
		session.set("host", &json!("example.com"));
		session.set("port", &json!(443));
		session.set("user", &json!("admin"));
		session.set("password", &json!("pw"));
		session
	}

	#[tokio::test]
	async fn test_login_returns_trimmed_stdout() {
		let token = sh("cat > /dev/null; echo '  jwt-123  '")
			.session_login(&credentials())
			.await
			.unwrap();
		assert_eq!(token.expose(), "jwt-123");
	}

	#[tokio::test]
	async fn test_login_sends_settings_on_stdin() {
		let token = sh("cat").session_login(&credentials()).await.unwrap();
		let sent: Value = serde_json::from_str(token.expose()).unwrap();
		assert_eq!(
			sent,
			json!({ "host": "example.com", "port": 443, "user": "admin", "password": "pw" })
		);
	}

	#[tokio::test]
	async fn test_login_failure_carries_stderr() {
		let err = sh("cat > /dev/null; echo 'bad credentials' >&2; exit 3")
			.session_login(&credentials())
			.await
			.unwrap_err();
		assert!(err.to_string().contains("bad credentials"));
	}

	#[tokio::test]
	async fn test_empty_token_is_an_error() {
		let err = sh("cat > /dev/null").session_login(&credentials()).await.unwrap_err();
		assert!(err.to_string().contains("no token"));
	}

	#[tokio::test]
	async fn test_missing_program_is_an_error() {
		let handler = CommandAuthHandler::new("/nonexistent/tcfg-login", Vec::new(), "jwtToken");
		assert!(handler.session_login(&credentials()).await.is_err());
	}

	#[test]
	fn test_registry_serves_base_and_service_profiles() {
		assert!(registry(&[], None).is_empty());

		let handlers = registry(&["my-login".into(), "--json".into()], Some("jwtToken"));
		assert!(handlers.find("base", "jwtToken").is_some());
		assert!(handlers.find("zosmf", "jwtToken").is_some());
		assert!(handlers.find("zosmf", "LtpaToken2").is_none());

		let apiml = registry(&["my-login".into()], None);
		let handler = apiml.find("base", TOKEN_TYPE_APIML).unwrap();
		assert_eq!(handler.prompt_params().default_token_type, TOKEN_TYPE_APIML);
	}
}
