use async_trait::async_trait;

use crate::http::{Request, Response};
use crate::*;

/// A stage in the request half of a pipeline. Returning a response ends the
/// request side of the pipeline; returning `None` passes the request on to
/// the next stage. Filters may freely mutate the request.
#[async_trait]
pub trait RequestFilter: Send + Sync {
	async fn filter_request(&self, req: &mut Request) -> Option<Response>;
}

/// A stage in the response half of a pipeline, applied in order to whatever
/// response the request half produced.
#[async_trait]
pub trait ResponseFilter: Send + Sync {
	async fn filter_response(&self, resp: &mut Response);
}

/// An ordered request/response filter chain. The first request filter to
/// produce a response wins; the response then flows through every response
/// filter. No response means the caller owns the fallback (typically 404).
#[derive(Default)]
pub struct Pipeline {
	upstream: Vec<Arc<dyn RequestFilter>>,
	downstream: Vec<Arc<dyn ResponseFilter>>,
}

impl Pipeline {
	pub fn new() -> Pipeline {
		Pipeline::default()
	}

	pub fn add_request_filter(&mut self, filter: Arc<dyn RequestFilter>) -> &mut Self {
		self.upstream.push(filter);
		self
	}

	pub fn add_response_filter(&mut self, filter: Arc<dyn ResponseFilter>) -> &mut Self {
		self.downstream.push(filter);
		self
	}

	pub async fn execute(&self, mut req: Request) -> Option<Response> {
		let mut resp = None;
		for filter in &self.upstream {
			if let Some(r) = filter.filter_request(&mut req).await {
				resp = Some(r);
				break;
			}
		}
		if let Some(resp) = resp.as_mut() {
			for filter in &self.downstream {
				filter.filter_response(resp).await;
			}
		}
		resp
	}
}

/// Adapts a plain function into a [`RequestFilter`].
pub struct FilterFn<F>(F);

pub fn request_filter_fn<F>(f: F) -> FilterFn<F>
where
	F: Fn(&mut Request) -> Option<Response> + Send + Sync,
{
	FilterFn(f)
}

#[async_trait]
impl<F> RequestFilter for FilterFn<F>
where
	F: Fn(&mut Request) -> Option<Response> + Send + Sync,
{
	async fn filter_request(&self, req: &mut Request) -> Option<Response> {
		(self.0)(req)
	}
}

#[cfg(test)]
#[path = "filters_test.rs"]
mod tests;
