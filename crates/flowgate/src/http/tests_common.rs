use http_body_util::BodyExt;

use crate::filters::{Pipeline, request_filter_fn};
use crate::http::response::string_response;
use crate::http::{Body, HeaderName, HeaderValue, Request, Response, StatusCode, Uri};
use crate::proxy::{Upstream, UpstreamTransport};
use crate::serve::Server;
use crate::*;

pub fn request_for_uri(uri: &str) -> Request {
	request(uri, ::http::Method::GET, &[])
}

pub fn request(uri: &str, method: ::http::Method, headers: &[(&str, &str)]) -> Request {
	let mut rb = ::http::Request::builder()
		.uri(uri.parse::<Uri>().unwrap())
		.method(method);
	for (name, value) in headers {
		rb = rb.header(
			HeaderName::try_from(name.to_string()).unwrap(),
			HeaderValue::from_str(value).unwrap(),
		);
	}
	rb.body(Body::empty()).unwrap()
}

pub async fn body_string(resp: Response) -> String {
	let bytes = resp
		.into_body()
		.collect()
		.await
		.expect("collect body")
		.to_bytes();
	String::from_utf8(bytes.to_vec()).expect("utf8 body")
}

/// A running local server answering every request with `body`, plus an
/// upstream pointed at it. Cancel the returned token to stop the listener.
pub async fn static_body_server(
	body: &'static str,
) -> (SocketAddr, tokio_util::sync::CancellationToken, Arc<Upstream>) {
	let mut pipeline = Pipeline::new();
	pipeline.add_request_filter(Arc::new(request_filter_fn(move |_req| {
		Some(string_response(StatusCode::OK, None, body))
	})));
	let server = Server::bind("127.0.0.1:0".parse().unwrap(), Arc::new(pipeline))
		.await
		.expect("bind test server");
	let addr = server.local_addr();
	let stop = server.shutdown_trigger();
	tokio::spawn(server.serve());

	let upstream = Arc::new(Upstream::new(UpstreamTransport::new(
		addr.ip().to_string(),
		addr.port(),
		Duration::ZERO,
		None,
	)));
	(addr, stop, upstream)
}
