mod pattern;
mod tokens;

use std::collections::HashMap;

use async_trait::async_trait;

pub use pattern::Pattern;
pub use tokens::Token;

use crate::filters::RequestFilter;
use crate::http::{Request, Response};
use crate::*;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
	#[error("invalid capture start at position {0}")]
	InvalidCapture(usize),
	#[error("capture with empty name")]
	EmptyCapture,
	#[error("unexpected optional start at position {0}")]
	UnexpectedOptionalStart(usize),
	#[error("nested optional sections are not supported")]
	NestedOptional,
	#[error("unexpected optional end")]
	UnexpectedEndOptional,
	#[error("unmatched optional section")]
	UnmatchedOptional,
}

/// Path captures bound by the router, stored in the matched request's
/// extensions for downstream filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(pub HashMap<String, String>);

/// Dispatches requests to the first route whose pattern matches the request
/// path. Routes match in insertion order.
#[derive(Default)]
pub struct PatternRouter {
	patterns: Vec<Pattern>,
	routes: Vec<Arc<dyn RequestFilter>>,
}

impl PatternRouter {
	pub fn new() -> PatternRouter {
		PatternRouter::default()
	}

	pub fn add_route(
		&mut self,
		pattern: &str,
		filter: Arc<dyn RequestFilter>,
	) -> Result<(), PatternError> {
		self.patterns.push(Pattern::parse(pattern)?);
		self.routes.push(filter);
		Ok(())
	}

	/// First match wins. Binds the captures into the request's extensions
	/// and returns the route's filter; `None` leaves the 404 to the caller.
	pub fn select_pipeline(&self, req: &mut Request) -> Option<&Arc<dyn RequestFilter>> {
		for (pattern, route) in self.patterns.iter().zip(&self.routes) {
			if let Some(captures) = pattern.match_path(req.uri().path()) {
				trace!(pattern = %pattern.raw(), path = req.uri().path(), "matched route");
				req.extensions_mut().insert(PathParams(captures));
				return Some(route);
			}
		}
		None
	}
}

#[async_trait]
impl RequestFilter for PatternRouter {
	async fn filter_request(&self, req: &mut Request) -> Option<Response> {
		let route = self.select_pipeline(req)?.clone();
		route.filter_request(req).await
	}
}

#[cfg(test)]
#[path = "router_test.rs"]
mod tests;
