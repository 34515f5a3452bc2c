// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

/// A JSONC syntax error with a 1-based source position.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} at line {line}, column {column}")]
pub struct ParseError {
	pub message: String,
	pub line: usize,
	pub column: usize,
}

impl ParseError {
	pub(crate) fn at(src: &str, offset: usize, message: impl Into<String>) -> Self {
		let offset = offset.min(src.len());
		let before = &src[..offset];
		let line = before.matches('\n').count() + 1;
		let column = match before.rfind('\n') {
			Some(nl) => before[nl + 1..].chars().count() + 1,
			None => before.chars().count() + 1,
		};
		Self {
			message: message.into(),
			line,
			column,
		}
	}
}
