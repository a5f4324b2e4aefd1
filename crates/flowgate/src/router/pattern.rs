use std::collections::HashMap;

use super::PatternError;
use super::tokens::{Token, tokenize};
use crate::*;

/// A parsed path pattern: literal segments, `:name` captures, `(...)`
/// optional sections (not nestable), `*` wildcards, and a trailing `.ext`
/// file-extension delimiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
	raw: Strng,
	tokens: Vec<Token>,
}

impl Pattern {
	pub fn parse(pat: &str) -> Result<Pattern, PatternError> {
		let tokens = tokenize(pat)?;
		validate(&tokens)?;
		Ok(Pattern {
			raw: strng::new(pat),
			tokens,
		})
	}

	pub fn raw(&self) -> &Strng {
		&self.raw
	}

	/// Match `path` against the pattern, returning the bound captures, or
	/// `None` when the path does not match in full.
	pub fn match_path(&self, path: &str) -> Option<HashMap<String, String>> {
		let mut captures = HashMap::new();

		let mut path = path;
		let mut optional = false;
		let mut optional_start_path = path;

		let mut i = 0;
		while i < self.tokens.len() {
			let token = &self.tokens[i];
			if let Some(len) = token.match_len(path) {
				match token {
					Token::BeginOptional => {
						optional = true;
						optional_start_path = path;
					},
					Token::EndOptional => {
						optional = false;
					},
					Token::Capture(name) => {
						captures.insert(name.to_string(), path[..len].to_string());
					},
					_ => {},
				}
				path = &path[len..];
			} else if optional {
				// The optional section failed partway through. Rewind the
				// path and fast-forward past its end, then carry on.
				path = optional_start_path;
				optional = false;
				while self.tokens[i] != Token::EndOptional {
					i += 1;
				}
			} else {
				return None;
			}
			i += 1;
		}
		if !path.is_empty() {
			return None;
		}

		Some(captures)
	}
}

// Optional sections must be balanced, non-nested, and captures named.
fn validate(tokens: &[Token]) -> Result<(), PatternError> {
	let mut depth = 0;
	for token in tokens {
		match token {
			Token::BeginOptional => {
				depth += 1;
				if depth > 1 {
					return Err(PatternError::NestedOptional);
				}
			},
			Token::EndOptional => {
				depth -= 1;
				if depth < 0 {
					return Err(PatternError::UnexpectedEndOptional);
				}
			},
			Token::Capture(name) if name.is_empty() => {
				return Err(PatternError::EmptyCapture);
			},
			_ => {},
		}
	}
	if depth != 0 {
		return Err(PatternError::UnmatchedOptional);
	}
	Ok(())
}

#[cfg(test)]
#[path = "pattern_test.rs"]
mod tests;
