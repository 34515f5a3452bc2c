// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! `tcfg config` subcommand handlers.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _, Result};
use clap::Subcommand;
use serde_json::Value;
use tcfg_config::{
	coerce_value, secure_pass, AuthHandlerRegistry, Config, ConfigAutoStore, ConfigSchema, Prompter, SchemaSource,
	SecurePassOptions, SetOptions, SECURE_VALUE_MASK,
};
use tracing::{info, warn};

/// Which layer a command writes to.
#[derive(clap::Args, Clone, Copy, Debug, Default)]
pub struct LayerArgs {
	/// Target the user config (`<app>.config.user.json`)
	#[arg(long)]
	pub user_config: bool,
	/// Target the global config in the home directory
	#[arg(long)]
	pub global_config: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
	/// Show the merged configuration
	List {
		/// Property path, e.g. `profiles.base.properties`
		property: Option<String>,
		/// Show each layer separately
		#[arg(long)]
		locations: bool,
		/// Show secure values instead of a placeholder
		#[arg(long)]
		show_secure: bool,
	},
	/// Show the merged value of a property
	Get {
		property: String,
		#[arg(long)]
		show_secure: bool,
	},
	/// Set a property in a layer
	Set {
		property: String,
		/// Value to set; prompted for when omitted
		value: Option<String>,
		/// Parse the value as JSON
		#[arg(long)]
		json: bool,
		/// Store the value in the vault (`--secure false` to stop)
		#[arg(long)]
		secure: Option<bool>,
		#[command(flatten)]
		layer: LayerArgs,
	},
	/// Delete a property from a layer
	Delete {
		property: String,
		#[command(flatten)]
		layer: LayerArgs,
	},
	/// Prompt for every secure property of a layer
	Secure {
		/// Only prompt for this profile's properties
		#[arg(long)]
		profile: Option<String>,
		/// Remove vault entries of config files that no longer exist
		#[arg(long)]
		prune: bool,
		#[command(flatten)]
		layer: LayerArgs,
	},
	/// List profile names, parents before children
	Profiles,
	/// List the config layers
	Layers,
	/// Remove vault entries of config files that no longer exist
	Prune,
	/// Print the JSON schema for the registered profile types
	Schema {
		/// Write to a file instead of stdout
		#[arg(long)]
		output: Option<PathBuf>,
	},
	/// Rename a profile within a layer
	Move {
		from: String,
		to: String,
		#[command(flatten)]
		layer: LayerArgs,
	},
	/// Create a config file with a profile per registered type
	Init {
		/// Replace the layer instead of merging into it
		#[arg(long)]
		overwrite: bool,
		/// Show the result without writing anything
		#[arg(long)]
		dry_run: bool,
		/// Do not prompt for base profile properties
		#[arg(long)]
		no_prompt: bool,
		#[command(flatten)]
		layer: LayerArgs,
	},
}

/// Everything a handler works with.
pub struct Context<'a> {
	pub config: Config,
	pub schema: ConfigSchema,
	pub handlers: AuthHandlerRegistry,
	pub prompter: &'a dyn Prompter,
}

fn pretty(value: &Value) -> Result<String> {
	serde_json::to_string_pretty(value).context("failed to render JSON")
}

fn lookup<'v>(value: &'v Value, property: Option<&str>) -> Option<&'v Value> {
	match property {
		Some(path) => value.pointer(&format!("/{}", path.replace('.', "/"))),
		None => Some(value),
	}
}

impl Context<'_> {
	fn activate(&mut self, layer: LayerArgs) {
		self.config
			.layers_mut()
			.activate(layer.user_config, layer.global_config);
	}

	fn merged(&self, show_secure: bool) -> Value {
		let doc = if show_secure {
			self.config.properties()
		} else {
			self.config.masked_properties()
		};
		doc.to_json()
	}

	pub async fn run(&mut self, command: ConfigCommand) -> Result<()> {
		match command {
			ConfigCommand::List {
				property,
				locations,
				show_secure,
			} => self.list(property.as_deref(), locations, show_secure),
			ConfigCommand::Get { property, show_secure } => {
				let merged = self.merged(show_secure);
				match lookup(&merged, Some(&property)) {
					Some(value) => println!("{}", pretty(value)?),
					None => bail!("Property '{property}' is not set"),
				}
				Ok(())
			}
			ConfigCommand::Set {
				property,
				value,
				json,
				secure,
				layer,
			} => self.set(&property, value, json, secure, layer).await,
			ConfigCommand::Delete { property, layer } => {
				self.activate(layer);
				if !self.config.delete(&property, None) {
					bail!("Property '{property}' does not exist in {}", self.config.layers().active().path.display());
				}
				self.config.save(false).await?;
				Ok(())
			}
			ConfigCommand::Secure { profile, prune, layer } => self.secure(profile, prune, layer).await,
			ConfigCommand::Profiles => {
				for name in self.config.profiles().build() {
					println!("{name}");
				}
				Ok(())
			}
			ConfigCommand::Layers => {
				let active = self.config.layers().active().path.clone();
				for layer in self.config.layers().iter() {
					let kind = match (layer.user, layer.global) {
						(true, false) => "project-user",
						(false, false) => "project",
						(true, true) => "global-user",
						(false, true) => "global",
					};
					let marker = if layer.path == active { "*" } else { " " };
					let state = if layer.exists { "" } else { " (missing)" };
					println!("{marker} {kind:<12} {}{state}", layer.path.display());
				}
				Ok(())
			}
			ConfigCommand::Prune => {
				let pruned = self.config.secure_save(true).await?;
				if pruned.is_empty() {
					println!("Nothing to prune");
				}
				for file in pruned {
					println!("Pruned secure properties of {file}");
				}
				Ok(())
			}
			ConfigCommand::Schema { output } => {
				let text = pretty(&self.schema.to_json())?;
				match output {
					Some(path) => {
						tokio::fs::write(&path, format!("{text}\n"))
							.await
							.with_context(|| format!("failed to write {}", path.display()))?;
						println!("Wrote schema to {}", path.display());
					}
					None => println!("{text}"),
				}
				Ok(())
			}
			ConfigCommand::Move { from, to, layer } => {
				self.activate(layer);
				self.config.move_profile(&from, &to)?;
				self.config.save(false).await?;
				Ok(())
			}
			ConfigCommand::Init {
				overwrite,
				dry_run,
				no_prompt,
				layer,
			} => self.init(overwrite, dry_run, !no_prompt, layer).await,
		}
	}

	fn list(&self, property: Option<&str>, locations: bool, show_secure: bool) -> Result<()> {
		if !locations {
			let merged = self.merged(show_secure);
			let value = lookup(&merged, property).cloned().unwrap_or(Value::Null);
			println!("{}", pretty(&value)?);
			return Ok(());
		}
		for layer in self.config.layers().iter().filter(|l| l.exists) {
			let mut props = layer.properties();
			if !show_secure {
				props.mask_secure(SECURE_VALUE_MASK);
			}
			let json = props.to_json();
			println!("{}:", layer.path.display());
			println!("{}", pretty(&lookup(&json, property).cloned().unwrap_or(Value::Null))?);
		}
		Ok(())
	}

	async fn set(
		&mut self,
		property: &str,
		value: Option<String>,
		json: bool,
		secure: Option<bool>,
		layer: LayerArgs,
	) -> Result<()> {
		self.activate(layer);
		let secure = secure.or_else(|| {
			self.config
				.secure_fields()
				.iter()
				.any(|f| f == property)
				.then_some(true)
		});

		let raw = match value {
			Some(v) => v,
			None => self
				.prompter
				.prompt(&format!("Please enter the value for {property}:"), secure == Some(true))
				.await?
				.unwrap_or_default(),
		};

		// Without a declared type the raw string is stored as is.
		let declared = self.schema.find_property_type(property, &self.config.properties());
		let value = coerce_value(&raw, declared.as_deref(), json)?;
		self.config.set(
			property,
			value,
			SetOptions {
				parse_string: false,
				secure,
			},
		)?;
		self.config.save(false).await?;
		info!(property, path = %self.config.layers().active().path.display(), "set property");
		Ok(())
	}

	async fn secure(&mut self, profile: Option<String>, prune: bool, layer: LayerArgs) -> Result<()> {
		self.activate(layer);
		let active = self.config.layers().get();
		if !active.exists {
			bail!("Config does not exist at {}", active.path.display());
		}
		let autostore = ConfigAutoStore::new(&self.schema, &self.handlers);
		let outcome = secure_pass(&mut self.config, &autostore, self.prompter, &SecurePassOptions { profile, prune }).await?;

		if outcome.updated.is_empty() {
			println!("No secure properties were updated");
		}
		for file in &outcome.pruned {
			println!("Pruned secure properties of {file}");
		}
		Ok(())
	}

	async fn prompt_base_properties(&self, doc: &mut tcfg_config::ConfigDocument) -> Result<()> {
		let Some(base) = self.schema.profile_type("base") else {
			return Ok(());
		};
		let Some(profile) = doc.profiles.get_mut("base") else {
			return Ok(());
		};
		for (name, prop) in &base.schema.properties {
			let label = match &prop.description {
				Some(desc) => format!("Enter {name} ({desc}) - blank to skip:"),
				None => format!("Enter {name} - blank to skip:"),
			};
			let Some(raw) = self.prompter.prompt(&label, prop.secure).await?.filter(|a| !a.is_empty()) else {
				continue;
			};
			let value = coerce_value(&raw, Some(&prop.property_type), false)?;
			profile.properties.insert(name.clone(), value);
		}
		Ok(())
	}

	async fn init(&mut self, overwrite: bool, dry_run: bool, prompt: bool, layer: LayerArgs) -> Result<()> {
		let dir = if layer.global_config {
			self.config.home_dir().to_path_buf()
		} else {
			self.config.project_dir().to_path_buf()
		};
		self.config
			.layers_mut()
			.activate_in_dir(layer.user_config, layer.global_config, &dir)
			.await?;

		let mut template = self.schema.template();
		if prompt && !dry_run {
			self.prompt_base_properties(&mut template).await?;
		}

		if dry_run {
			let mut preview = if overwrite {
				template
			} else {
				self.config
					.layers_mut()
					.merge(&template, true)
					.map(|l| l.properties())
					.unwrap_or_default()
			};
			preview.mask_secure(SECURE_VALUE_MASK);
			println!("Would write to {}:", self.config.layers().active().path.display());
			println!("{}", pretty(&preview.to_json())?);
			return Ok(());
		}

		if overwrite {
			self.config.layers_mut().set(&template);
		} else {
			self.config.layers_mut().merge(&template, false);
		}
		self.config
			.set_schema(SchemaSource::Object(self.schema.to_json()))
			.await?;
		self.config.save(false).await?;

		if self.config.secure().load_failed() && !self.config.secure_fields().is_empty() {
			warn!("secure properties were not saved because the credential vault is unavailable");
		}
		println!("Saved config template to {}", self.config.layers().active().path.display());
		Ok(())
	}
}

/// Load the registered profile types.
///
/// `types_file` may hold either a JSON array of profile type configurations
/// or a schema document. Without one, the active layer's local `$schema` is
/// used when it exists.
pub async fn load_schema(config: &Config, types_file: Option<&Path>) -> Result<ConfigSchema> {
	if let Some(path) = types_file {
		let text = tokio::fs::read_to_string(path)
			.await
			.with_context(|| format!("failed to read {}", path.display()))?;
		let json: Value = serde_json::from_str(&text).with_context(|| format!("invalid JSON in {}", path.display()))?;
		return match json {
			Value::Array(_) => Ok(ConfigSchema::new(
				serde_json::from_value(json).with_context(|| format!("invalid profile types in {}", path.display()))?,
			)),
			other => Ok(ConfigSchema::load(&other)?),
		};
	}

	match config.schema_info() {
		Some(info) if info.local && Path::new(&info.resolved).is_file() => {
			Ok(ConfigSchema::load_file(Path::new(&info.resolved)).await?)
		}
		_ => Ok(ConfigSchema::default()),
	}
}
