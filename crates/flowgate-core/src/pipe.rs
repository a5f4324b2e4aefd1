use std::future::poll_fn;
use std::io;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker, ready};

use tokio::io::{AsyncRead, ReadBuf};

use crate::buffer::{BufferFull, RingBuffer};

/// Error used for read or write operations on a closed pipe.
pub fn closed_pipe() -> io::Error {
	io::Error::new(io::ErrorKind::BrokenPipe, "read/write on closed pipe")
}

// Why a side was closed. A clean close surfaces as EOF to the reader and as
// a closed-pipe error to the writer; a close-with-error surfaces that error.
#[derive(Debug, Clone)]
enum CloseCause {
	Clean,
	Err(Arc<io::Error>),
}

impl CloseCause {
	fn to_error(&self) -> io::Error {
		match self {
			CloseCause::Clean => closed_pipe(),
			CloseCause::Err(e) => io::Error::new(e.kind(), e.clone()),
		}
	}
}

// All pipe state lives behind one mutex. The three wake conditions of the
// pipe (reader waiting for bytes, writer waiting for space, either side
// waiting for both-closed) are parked wakers; closing a side wakes them all.
#[derive(Debug)]
struct PipeState {
	ring: RingBuffer,
	rerr: Option<CloseCause>,
	werr: Option<CloseCause>,
	read_waker: Option<Waker>,
	write_waker: Option<Waker>,
	close_wakers: Vec<Waker>,
}

#[derive(Debug)]
struct Pipe {
	state: Mutex<PipeState>,
}

/// Create a single-producer/single-consumer byte pipe over `ring`. The pipe
/// buffers up to the ring's capacity; a full ring suspends the writer, an
/// empty ring suspends the reader. Each half may be closed independently and
/// close state propagates in-band to the peer.
pub fn new(ring: RingBuffer) -> (PipeReader, PipeWriter) {
	let pipe = Arc::new(Pipe {
		state: Mutex::new(PipeState {
			ring,
			rerr: None,
			werr: None,
			read_waker: None,
			write_waker: None,
			close_wakers: Vec::new(),
		}),
	});
	(
		PipeReader { pipe: pipe.clone() },
		PipeWriter { pipe },
	)
}

impl Pipe {
	fn poll_read(&self, cx: &mut Context<'_>, buf: &mut [u8]) -> Poll<io::Result<usize>> {
		let mut state = self.state.lock().expect("pipe lock poisoned");
		if state.rerr.is_some() {
			return Poll::Ready(Err(closed_pipe()));
		}
		if buf.is_empty() {
			return Poll::Ready(Ok(0));
		}
		if !state.ring.is_empty() {
			let n = state.ring.read(buf);
			if !state.ring.is_full() {
				if let Some(w) = state.write_waker.take() {
					w.wake();
				}
			}
			return Poll::Ready(Ok(n));
		}
		if let Some(cause) = &state.werr {
			return match cause {
				CloseCause::Clean => Poll::Ready(Ok(0)),
				cause => Poll::Ready(Err(cause.to_error())),
			};
		}
		state.read_waker = Some(cx.waker().clone());
		Poll::Pending
	}

	// Write what currently fits; Pending only when the ring is full.
	fn poll_write_some(&self, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
		let mut state = self.state.lock().expect("pipe lock poisoned");
		if state.werr.is_some() {
			return Poll::Ready(Err(closed_pipe()));
		}
		if let Some(cause) = &state.rerr {
			return Poll::Ready(Err(cause.to_error()));
		}
		if buf.is_empty() {
			return Poll::Ready(Ok(0));
		}
		if !state.ring.is_full() {
			let n = match state.ring.write(buf) {
				Ok(n) => n,
				Err(BufferFull(n)) => n,
			};
			if !state.ring.is_empty() {
				if let Some(w) = state.read_waker.take() {
					w.wake();
				}
			}
			return Poll::Ready(Ok(n));
		}
		state.write_waker = Some(cx.waker().clone());
		Poll::Pending
	}

	fn poll_close_wait(&self, cx: &mut Context<'_>) -> Poll<()> {
		let mut state = self.state.lock().expect("pipe lock poisoned");
		if state.rerr.is_some() && state.werr.is_some() {
			return Poll::Ready(());
		}
		if !state.close_wakers.iter().any(|w| w.will_wake(cx.waker())) {
			state.close_wakers.push(cx.waker().clone());
		}
		Poll::Pending
	}

	// The first close of a side wins; closing wakes every waiter so it can
	// re-examine the error state.
	fn close_writer(&self, err: Option<io::Error>) {
		let mut state = self.state.lock().expect("pipe lock poisoned");
		if state.werr.is_none() {
			state.werr = Some(match err {
				Some(e) => CloseCause::Err(Arc::new(e)),
				None => CloseCause::Clean,
			});
		}
		Self::wake_all(&mut state);
	}

	fn close_reader(&self, err: Option<io::Error>) {
		let mut state = self.state.lock().expect("pipe lock poisoned");
		if state.rerr.is_none() {
			state.rerr = Some(match err {
				Some(e) => CloseCause::Err(Arc::new(e)),
				None => CloseCause::Clean,
			});
		}
		Self::wake_all(&mut state);
	}

	fn wake_all(state: &mut PipeState) {
		if let Some(w) = state.read_waker.take() {
			w.wake();
		}
		if let Some(w) = state.write_waker.take() {
			w.wake();
		}
		for w in state.close_wakers.drain(..) {
			w.wake();
		}
	}
}

/// The read half of a pipe. Implements [`AsyncRead`], so it can back a
/// streaming response body.
#[derive(Debug)]
pub struct PipeReader {
	pipe: Arc<Pipe>,
}

impl PipeReader {
	/// Read at least one byte, waiting for the writer if the pipe is empty.
	/// Returns `Ok(0)` once the writer has closed cleanly and the pipe has
	/// drained; a writer close-with-error surfaces after draining too.
	pub async fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
		poll_fn(|cx| self.pipe.poll_read(cx, buf)).await
	}

	pub fn close(&self) {
		self.pipe.close_reader(None);
	}

	pub fn close_with_error(&self, err: io::Error) {
		self.pipe.close_reader(Some(err));
	}

	/// Wait until both halves of the pipe are closed.
	pub async fn close_wait(&self) {
		poll_fn(|cx| self.pipe.poll_close_wait(cx)).await
	}

	pub fn close_handle(&self) -> PipeCloseHandle {
		PipeCloseHandle { pipe: self.pipe.clone() }
	}
}

impl AsyncRead for PipeReader {
	fn poll_read(
		self: std::pin::Pin<&mut Self>,
		cx: &mut Context<'_>,
		buf: &mut ReadBuf<'_>,
	) -> Poll<io::Result<()>> {
		let n = ready!(self.pipe.poll_read(cx, buf.initialize_unfilled()))?;
		buf.advance(n);
		Poll::Ready(Ok(()))
	}
}

impl Drop for PipeReader {
	fn drop(&mut self) {
		self.pipe.close_reader(None);
	}
}

/// The write half of a pipe.
#[derive(Debug)]
pub struct PipeWriter {
	pipe: Arc<Pipe>,
}

impl PipeWriter {
	/// Write all of `buf`, waiting for the reader whenever the ring fills.
	/// Returns `Ok(buf.len())` once everything is buffered. If the reader
	/// closes first the reader's close error is returned, even when part of
	/// `buf` had already been buffered. Zero-length writes never wait.
	pub async fn write(&self, buf: &[u8]) -> io::Result<usize> {
		let mut off = 0;
		loop {
			let n = poll_fn(|cx| self.pipe.poll_write_some(cx, &buf[off..])).await?;
			off += n;
			if off >= buf.len() {
				return Ok(buf.len());
			}
		}
	}

	pub fn close(&self) {
		self.pipe.close_writer(None);
	}

	pub fn close_with_error(&self, err: io::Error) {
		self.pipe.close_writer(Some(err));
	}

	/// Wait until both halves of the pipe are closed.
	pub async fn close_wait(&self) {
		poll_fn(|cx| self.pipe.poll_close_wait(cx)).await
	}

	pub fn close_handle(&self) -> PipeCloseHandle {
		PipeCloseHandle { pipe: self.pipe.clone() }
	}
}

impl Drop for PipeWriter {
	fn drop(&mut self) {
		self.pipe.close_writer(None);
	}
}

/// A detached handle used to observe pipe closure without holding either
/// half, typically by a task that recycles the backing ring buffer.
#[derive(Debug, Clone)]
pub struct PipeCloseHandle {
	pipe: Arc<Pipe>,
}

impl PipeCloseHandle {
	/// Wait until both halves of the pipe are closed.
	pub async fn close_wait(&self) {
		poll_fn(|cx| self.pipe.poll_close_wait(cx)).await
	}

	/// Recover the backing ring once both halves have closed. Returns `None`
	/// while either side is still open, or if the ring was already taken.
	pub fn take_buffer(&self) -> Option<RingBuffer> {
		let mut state = self.pipe.state.lock().expect("pipe lock poisoned");
		if state.rerr.is_some() && state.werr.is_some() {
			let ring = std::mem::take(&mut state.ring);
			if ring.cap() == 0 { None } else { Some(ring) }
		} else {
			None
		}
	}
}

#[cfg(test)]
#[path = "pipe_test.rs"]
mod tests;
