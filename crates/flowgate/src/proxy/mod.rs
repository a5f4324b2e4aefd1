pub mod pool;
pub mod upstream;

pub use pool::UpstreamPool;
pub use upstream::{Upstream, UpstreamTransport};

use crate::http::{Body, Response, StatusCode, header};

#[derive(thiserror::Error, Debug)]
pub enum ProxyError {
	#[error("no upstreams available")]
	NoUpstreamsAvailable,
	#[error("upstream pool is shut down")]
	PoolShutdown,
	#[error("upstream call failed: {0:?}")]
	UpstreamCallFailed(hyper_util::client::legacy::Error),
	#[error("invalid request")]
	InvalidRequest,
	#[error("processing failed: {0}")]
	Processing(anyhow::Error),
}

impl ProxyError {
	/// True for failures at the transport layer, the signal the pool uses to
	/// mark an upstream down.
	pub fn is_transport(&self) -> bool {
		matches!(self, ProxyError::UpstreamCallFailed(_))
	}

	pub fn into_response(self) -> Response {
		let code = match self {
			ProxyError::NoUpstreamsAvailable => StatusCode::BAD_GATEWAY,
			ProxyError::PoolShutdown => StatusCode::BAD_GATEWAY,
			ProxyError::UpstreamCallFailed(_) => StatusCode::BAD_GATEWAY,
			ProxyError::InvalidRequest => StatusCode::BAD_REQUEST,
			ProxyError::Processing(_) => StatusCode::INTERNAL_SERVER_ERROR,
		};
		let msg = self.to_string();
		::http::Response::builder()
			.status(code)
			.header(header::CONTENT_TYPE, "text/plain")
			.body(Body::from(msg))
			.expect("static response parts must build")
	}
}
