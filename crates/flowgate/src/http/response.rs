use bytes::Bytes;
use crossbeam::queue::ArrayQueue;
use flowgate_core::buffer::RingBuffer;
use flowgate_core::pipe::{self, PipeWriter};
use once_cell::sync::Lazy;
use tokio_util::io::ReaderStream;

use crate::http::{Body, HeaderMap, Response, StatusCode};

/// Build a response from the basic fields. Extra headers replace nothing;
/// they are merged over the defaults the builder produces.
pub fn simple_response(status: StatusCode, headers: Option<HeaderMap>, body: Body) -> Response {
	let mut resp = ::http::Response::builder()
		.status(status)
		.body(body)
		.expect("static response parts must build");
	if let Some(headers) = headers {
		resp.headers_mut().extend(headers);
	}
	resp
}

/// Like [`simple_response`] but with a string body.
pub fn string_response(
	status: StatusCode,
	headers: Option<HeaderMap>,
	body: impl Into<String>,
) -> Response {
	simple_response(status, headers, Body::from(body.into()))
}

/// Like [`simple_response`] but with a byte body.
pub fn byte_response(status: StatusCode, headers: Option<HeaderMap>, body: &[u8]) -> Response {
	simple_response(status, headers, Body::from(Bytes::copy_from_slice(body)))
}

/// Returns the write half of a pipe; the read half streams as the response
/// body. Use this to stream a generated body without buffering it in full.
/// Writes wait once `capacity` bytes are in flight, so write from a separate
/// task. Close the writer when finished or the body will never terminate.
/// The response goes out with `Transfer-Encoding: chunked`.
pub fn pipe_response(
	status: StatusCode,
	headers: Option<HeaderMap>,
	capacity: usize,
) -> (PipeWriter, Response) {
	let (reader, writer) = pipe::new(RingBuffer::new(capacity));
	let resp = simple_response(status, headers, Body::from_stream(ReaderStream::new(reader)));
	(writer, resp)
}

const PIPE_BUFFER_SIZE: usize = 1024;
// 1024 buffers x 1024 bytes = 1MB
const PIPE_POOL_BUFFERS: usize = 1024;

static PIPE_BUFFER_POOL: Lazy<ArrayQueue<RingBuffer>> =
	Lazy::new(|| ArrayQueue::new(PIPE_POOL_BUFFERS));

/// Like [`pipe_response`], but the ring comes from a process-wide pool and
/// returns to it once both ends of the pipe have closed. The pool is leaky:
/// an empty pool allocates fresh, a full pool drops the returned ring.
pub fn buffered_pipe_response(
	status: StatusCode,
	headers: Option<HeaderMap>,
) -> (PipeWriter, Response) {
	let mut ring = PIPE_BUFFER_POOL
		.pop()
		.unwrap_or_else(|| RingBuffer::new(PIPE_BUFFER_SIZE));
	ring.reset();

	let (reader, writer) = pipe::new(ring);
	let handle = writer.close_handle();
	tokio::spawn(async move {
		handle.close_wait().await;
		if let Some(mut ring) = handle.take_buffer() {
			ring.reset();
			let _ = PIPE_BUFFER_POOL.push(ring);
		}
	});

	let resp = simple_response(status, headers, Body::from_stream(ReaderStream::new(reader)));
	(writer, resp)
}

#[cfg(test)]
#[path = "response_test.rs"]
mod tests;
