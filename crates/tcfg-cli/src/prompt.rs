// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Terminal prompts.

use std::io::{self, Write};

use async_trait::async_trait;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use tcfg_config::{ConfigError, Prompter};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Prompts on stderr and reads answers from stdin. Hidden answers are read
/// with the terminal in raw mode so they are not echoed.
#[derive(Debug, Default)]
pub struct TerminalPrompter;

fn prompt_error(e: io::Error) -> ConfigError {
	ConfigError::Prompt(e.to_string())
}

fn read_hidden() -> Result<Option<String>, ConfigError> {
	terminal::enable_raw_mode().map_err(prompt_error)?;
	let mut answer = String::new();
	let result = loop {
		let key = match event::read() {
			Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => key,
			Ok(_) => continue,
			Err(e) => break Err(prompt_error(e)),
		};
		match key.code {
			KeyCode::Enter => break Ok(Some(std::mem::take(&mut answer))),
			KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
				break Err(ConfigError::Prompt("interrupted".to_string()))
			}
			KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) && answer.is_empty() => break Ok(None),
			KeyCode::Char(c) => answer.push(c),
			KeyCode::Backspace => {
				answer.pop();
			}
			KeyCode::Esc => break Ok(Some(String::new())),
			_ => {}
		}
	};
	terminal::disable_raw_mode().map_err(prompt_error)?;
	eprintln!();
	result
}

#[async_trait]
impl Prompter for TerminalPrompter {
	async fn prompt(&self, message: &str, hide_text: bool) -> Result<Option<String>, ConfigError> {
		eprint!("{message} ");
		io::stderr().flush().map_err(prompt_error)?;

		if hide_text {
			return tokio::task::spawn_blocking(read_hidden)
				.await
				.map_err(|e| ConfigError::Prompt(e.to_string()))?;
		}

		let mut line = String::new();
		let read = BufReader::new(tokio::io::stdin())
			.read_line(&mut line)
			.await
			.map_err(prompt_error)?;
		if read == 0 {
			return Ok(None);
		}
		Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
	}
}
