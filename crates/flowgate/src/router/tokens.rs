use super::PatternError;
use crate::*;

/// One element of a parsed path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
	Slash,
	/// A file-extension delimiter; only the final `.` of the final segment
	/// tokenizes as this.
	Dot,
	Literal(Strng),
	/// `:name`, binding everything up to the next `/` (or end of path).
	Capture(Strng),
	/// `*`, consuming the rest of the path.
	Wildcard,
	BeginOptional,
	EndOptional,
}

impl Token {
	/// How many bytes of `path` this token consumes, or `None` on mismatch.
	/// Optional markers consume nothing; the matcher gives them meaning.
	pub(super) fn match_len(&self, path: &str) -> Option<usize> {
		match self {
			Token::BeginOptional | Token::EndOptional => Some(0),
			Token::Capture(_) => {
				// An empty segment never binds a capture
				let len = path.find('/').unwrap_or(path.len());
				(len > 0).then_some(len)
			},
			Token::Wildcard => Some(path.len()),
			Token::Slash => literal_prefix(path, "/"),
			Token::Dot => literal_prefix(path, "."),
			Token::Literal(raw) => literal_prefix(path, raw),
		}
	}
}

fn literal_prefix(path: &str, raw: &str) -> Option<usize> {
	path.starts_with(raw).then_some(raw.len())
}

// The literal or capture being accumulated during the scan.
enum Pending {
	Literal(String),
	Capture(String),
}

impl Pending {
	fn push(&mut self, c: char) {
		match self {
			Pending::Literal(s) | Pending::Capture(s) => s.push(c),
		}
	}

	fn into_token(self) -> Token {
		match self {
			Pending::Literal(s) => Token::Literal(strng::new(s)),
			Pending::Capture(s) => Token::Capture(strng::new(s)),
		}
	}
}

fn flush(tokens: &mut Vec<Token>, cur: &mut Option<Pending>) {
	if let Some(pending) = cur.take() {
		tokens.push(pending.into_token());
	}
}

/// A single left-to-right scan over the pattern source.
pub(super) fn tokenize(pat: &str) -> Result<Vec<Token>, PatternError> {
	let mut tokens = Vec::new();
	let mut cur: Option<Pending> = None;

	for (i, c) in pat.char_indices() {
		match c {
			'/' => {
				flush(&mut tokens, &mut cur);
				tokens.push(Token::Slash);
			},
			':' => {
				if cur.is_some() {
					return Err(PatternError::InvalidCapture(i));
				}
				cur = Some(Pending::Capture(String::new()));
			},
			'(' => {
				if cur.is_some() {
					return Err(PatternError::UnexpectedOptionalStart(i));
				}
				tokens.push(Token::BeginOptional);
			},
			')' => {
				flush(&mut tokens, &mut cur);
				tokens.push(Token::EndOptional);
			},
			'.' => {
				// Only the final dot of the final segment delimits a file
				// extension; any dot followed by another '.' or '/' is
				// ordinary literal content.
				let rest = &pat[i + c.len_utf8()..];
				if rest.contains('/') || rest.contains('.') {
					cur.get_or_insert_with(|| Pending::Literal(String::new())).push(c);
				} else {
					flush(&mut tokens, &mut cur);
					tokens.push(Token::Dot);
				}
			},
			'*' => {
				flush(&mut tokens, &mut cur);
				tokens.push(Token::Wildcard);
			},
			c => {
				cur.get_or_insert_with(|| Pending::Literal(String::new())).push(c);
			},
		}
	}
	flush(&mut tokens, &mut cur);

	Ok(tokens)
}

#[cfg(test)]
#[path = "tokens_test.rs"]
mod tests;
