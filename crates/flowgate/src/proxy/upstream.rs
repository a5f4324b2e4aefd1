use async_trait::async_trait;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use once_cell::sync::Lazy;
use rustls::{ClientConfig, RootCertStore};

use crate::filters::RequestFilter;
use crate::http::{Body, HeaderName, Method, Request, Response, Scheme, Uri, header};
use crate::proxy::ProxyError;
use crate::*;

// Hop-by-hop headers. These are removed before a request is sent to the
// origin. As of RFC 7230, hop-by-hop headers are required to appear in the
// Connection header field. These are the headers defined by the obsoleted
// RFC 2616 (section 13.5.1) and are used for backward compatibility.
static HOP_HEADERS: [HeaderName; 9] = [
	header::CONNECTION,
	// non-standard but still sent by libcurl and rejected by e.g. google
	HeaderName::from_static("proxy-connection"),
	HeaderName::from_static("keep-alive"),
	header::PROXY_AUTHENTICATE,
	header::PROXY_AUTHORIZATION,
	header::TE,
	header::TRAILER,
	header::TRANSFER_ENCODING,
	header::UPGRADE,
];

static SYSTEM_TLS: Lazy<Arc<ClientConfig>> = Lazy::new(|| {
	let mut roots = RootCertStore::empty();
	for cert in rustls_native_certs::load_native_certs().certs {
		let _ = roots.add(cert);
	}
	Arc::new(
		ClientConfig::builder()
			.with_root_certificates(roots)
			.with_no_client_auth(),
	)
});

// Placeholder handed to the connector for plaintext transports; it is never
// consulted for http:// destinations.
static NO_TLS: Lazy<Arc<ClientConfig>> = Lazy::new(|| {
	Arc::new(
		ClientConfig::builder()
			.with_root_certificates(RootCertStore::empty())
			.with_no_client_auth(),
	)
});

/// A TLS client configuration trusting the system root store.
pub fn system_tls_config() -> Arc<ClientConfig> {
	SYSTEM_TLS.clone()
}

/// The transport to a single origin server: destination, dial timeout, and
/// an HTTP client that reuses connections across requests.
pub struct UpstreamTransport {
	pub host: Strng,
	pub port: u16,
	pub connect_timeout: Duration,
	tls: Option<Arc<ClientConfig>>,
	client: Client<HttpsConnector<HttpConnector>, Body>,
}

impl Debug for UpstreamTransport {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("UpstreamTransport")
			.field("host", &self.host)
			.field("port", &self.port)
			.finish()
	}
}

impl UpstreamTransport {
	/// A zero `connect_timeout` disables the dial timeout.
	pub fn new(
		host: impl AsRef<str>,
		port: u16,
		connect_timeout: Duration,
		tls: Option<Arc<ClientConfig>>,
	) -> UpstreamTransport {
		let mut http = HttpConnector::new();
		http.enforce_http(false);
		if !connect_timeout.is_zero() {
			http.set_connect_timeout(Some(connect_timeout));
		}
		let tls_config = match &tls {
			Some(cfg) => cfg.clone(),
			None => NO_TLS.clone(),
		};
		let connector = hyper_rustls::HttpsConnectorBuilder::new()
			.with_tls_config(Arc::unwrap_or_clone(tls_config))
			.https_or_http()
			.enable_http1()
			.wrap_connector(http);
		let client = Client::builder(TokioExecutor::new())
			.timer(TokioTimer::new())
			.build(connector);
		UpstreamTransport {
			host: strng::new(host),
			port,
			connect_timeout,
			tls,
			client,
		}
	}

	pub fn scheme(&self) -> Scheme {
		if self.tls.is_some() { Scheme::HTTPS } else { Scheme::HTTP }
	}

	pub fn authority(&self) -> String {
		format!("{}:{}", self.host, self.port)
	}
}

/// A single origin server the pool can dispatch to. Created once per origin
/// and reused across requests; an optional ping path opts it into liveness
/// probing.
#[derive(Debug)]
pub struct Upstream {
	pub transport: UpstreamTransport,
	pub ping_path: Option<Strng>,
}

impl Upstream {
	pub fn new(transport: UpstreamTransport) -> Upstream {
		Upstream {
			transport,
			ping_path: None,
		}
	}

	pub fn with_ping_path(mut self, path: impl AsRef<str>) -> Upstream {
		let path = path.as_ref();
		self.ping_path = Some(if path.starts_with('/') {
			strng::new(path)
		} else {
			strng::format!("/{path}")
		});
		self
	}

	/// Forward `req` to the origin and return its response verbatim,
	/// streaming body included. `Err(UpstreamCallFailed)` marks a failure at
	/// the transport layer; the pool consumes that to mark this upstream
	/// down.
	pub async fn dispatch(&self, mut req: Request) -> Result<Response, ProxyError> {
		for h in HOP_HEADERS.iter() {
			req.headers_mut().remove(h);
		}
		// The authority below becomes the Host header; drop any inbound one
		req.headers_mut().remove(header::HOST);
		*req.version_mut() = ::http::Version::HTTP_11;

		let scheme = self.transport.scheme();
		let authority = self.transport.authority();
		http::modify_req_uri(&mut req, |uri| {
			uri.scheme = Some(scheme);
			uri.authority = Some(authority.parse()?);
			if uri.path_and_query.is_none() {
				uri.path_and_query = Some("/".parse()?);
			}
			Ok(())
		})
		.map_err(ProxyError::Processing)?;

		trace!(upstream = %self.transport.authority(), uri = %req.uri(), "dispatching request");
		let resp = self
			.transport
			.client
			.request(req)
			.await
			.map_err(ProxyError::UpstreamCallFailed)?;
		Ok(resp.map(Body::new))
	}

	/// Probe the origin with a GET on the ping path, bounded by the dial
	/// timeout. `None` when this upstream has no ping path; otherwise
	/// `Some(true)` iff the origin answered 2xx.
	pub async fn ping(&self) -> Option<bool> {
		let path = self.ping_path.as_ref()?;
		let uri = Uri::builder()
			.scheme(self.transport.scheme())
			.authority(self.transport.authority())
			.path_and_query(path.as_str());
		let req = uri
			.build()
			.and_then(|uri| {
				::http::Request::builder()
					.method(Method::GET)
					.uri(uri)
					.body(Body::empty())
			});
		let req = match req {
			Ok(req) => req,
			Err(e) => {
				warn!(upstream = %self.transport.authority(), err = %e, "invalid ping request");
				return Some(false);
			},
		};

		let call = self.transport.client.request(req);
		let resp = if self.transport.connect_timeout.is_zero() {
			call.await
		} else {
			match tokio::time::timeout(self.transport.connect_timeout, call).await {
				Ok(resp) => resp,
				Err(_) => return Some(false),
			}
		};
		Some(matches!(resp, Ok(resp) if resp.status().is_success()))
	}
}

#[async_trait]
impl RequestFilter for Upstream {
	async fn filter_request(&self, req: &mut Request) -> Option<Response> {
		let req = std::mem::take(req);
		match self.dispatch(req).await {
			Ok(resp) => Some(resp),
			Err(err) => {
				warn!(upstream = %self.transport.authority(), err = %err, "upstream request failed");
				Some(err.into_response())
			},
		}
	}
}

#[cfg(test)]
#[path = "upstream_test.rs"]
mod tests;
