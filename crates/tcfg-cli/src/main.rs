// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! tcfg - layered team configuration
//!
//! Reads and edits the project, project-user, global and global-user config
//! files of an application, keeping secure properties in a credential vault.

mod commands;
mod login;
mod prompt;
mod vault;

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tcfg_config::{Config, LoadOptions};

use crate::commands::{load_schema, ConfigCommand, Context};
use crate::prompt::TerminalPrompter;
use crate::vault::VaultKind;

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default)]
enum LogLevel {
	Trace,
	Debug,
	Info,
	#[default]
	Warn,
	Error,
}

impl LogLevel {
	fn as_str(self) -> &'static str {
		match self {
			LogLevel::Trace => "trace",
			LogLevel::Debug => "debug",
			LogLevel::Info => "info",
			LogLevel::Warn => "warn",
			LogLevel::Error => "error",
		}
	}
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default)]
enum LogFormat {
	Pretty,
	#[default]
	Compact,
	Json,
}

#[derive(Parser, Debug)]
#[command(name = "tcfg", version, about = "Layered team configuration", long_about = None)]
struct Args {
	/// Application whose config files are managed
	#[arg(long, env = "TCFG_APP_NAME", default_value = "tcfg")]
	app: String,

	#[arg(long, env = "TCFG_LOG_LEVEL", value_enum, default_value_t = LogLevel::Warn)]
	log_level: LogLevel,

	#[arg(long, env = "TCFG_LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
	log_format: LogFormat,

	/// Credential vault for secure properties
	#[arg(long, env = "TCFG_VAULT", value_enum, default_value_t = VaultKind::Auto)]
	vault: VaultKind,

	/// Global config directory (defaults to `<APP>_CLI_HOME` or `~/.<app>`)
	#[arg(long)]
	home_dir: Option<PathBuf>,

	/// Directory to search for project config files (defaults to the
	/// current directory)
	#[arg(long)]
	project_dir: Option<PathBuf>,

	/// Profile types: a JSON array of type configurations or a schema file
	#[arg(long, env = "TCFG_SCHEMA")]
	schema: Option<PathBuf>,

	/// Program run to exchange a user and password for a token, with its
	/// arguments separated by spaces. Login settings arrive as JSON on stdin;
	/// the token is read from stdout.
	#[arg(long, env = "TCFG_LOGIN_COMMAND", value_delimiter = ' ')]
	login_command: Vec<String>,

	/// Token type issued by the login command
	#[arg(long, env = "TCFG_LOGIN_TOKEN_TYPE", requires = "login_command")]
	login_token_type: Option<String>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Inspect and edit the layered configuration
	Config {
		#[command(subcommand)]
		command: ConfigCommand,
	},
}

fn init_tracing(level: LogLevel, format: LogFormat) {
	let filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(format!("tcfg={}", level.as_str())));

	match format {
		LogFormat::Json => {
			tracing_subscriber::registry()
				.with(filter)
				.with(fmt::layer().json().with_writer(std::io::stderr))
				.init();
		}
		LogFormat::Compact => {
			tracing_subscriber::registry()
				.with(filter)
				.with(fmt::layer().compact().with_writer(std::io::stderr))
				.init();
		}
		LogFormat::Pretty => {
			tracing_subscriber::registry()
				.with(filter)
				.with(fmt::layer().with_writer(std::io::stderr))
				.init();
		}
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	let args = Args::parse();
	init_tracing(args.log_level, args.log_format);
	debug!(app = %args.app, vault = ?args.vault, "starting");

	let mut config = Config::load(
		&args.app,
		LoadOptions {
			home_dir: args.home_dir.clone(),
			project_dir: args.project_dir.clone(),
			vault: None,
			no_load: false,
		},
	)
	.await
	.with_context(|| format!("failed to load config for {}", args.app))?;

	let vault = vault::open(args.vault, &args.app, config.home_dir());
	if vault.is_some() {
		if let Err(e) = config.load_secure(vault).await {
			warn!(error = %e, "secure properties are unavailable; continuing without them");
		}
	}

	let schema = load_schema(&config, args.schema.as_deref()).await?;
	let prompter = TerminalPrompter;
	let mut ctx = Context {
		config,
		schema,
		handlers: login::registry(&args.login_command, args.login_token_type.as_deref()),
		prompter: &prompter,
	};

	match args.command {
		Command::Config { command } => ctx.run(command).await,
	}
}
