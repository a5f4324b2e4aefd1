use std::cmp;

/// Returned by [`RingBuffer::write`] when the input did not fully fit.
/// Carries the number of bytes that were copied before the buffer filled;
/// the caller can retry the remainder once the buffer drains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("buffer full")]
pub struct BufferFull(pub usize);

/// A fixed-capacity FIFO byte buffer. Reads and writes never block; this is a
/// plain data structure with no interior synchronization.
///
/// The backing array is one byte larger than the requested capacity so that
/// `head == tail` always means empty and a completely full buffer never
/// collapses into the same state.
#[derive(Debug)]
pub struct RingBuffer {
	buf: Vec<u8>,
	head: usize,
	tail: usize,
}

impl RingBuffer {
	pub fn new(capacity: usize) -> RingBuffer {
		RingBuffer {
			buf: vec![0; capacity + 1],
			head: 0,
			tail: 0,
		}
	}

	/// Copy as much of `p` as fits, advancing the write index. Returns the
	/// number of bytes copied, or [`BufferFull`] with the partial count when
	/// `p` did not fit entirely.
	pub fn write(&mut self, p: &[u8]) -> Result<usize, BufferFull> {
		let mut i = 0;

		if self.tail >= self.head {
			// Leave the last cell open if head is at 0
			let mut max_tail = self.buf.len();
			if self.head == 0 {
				max_tail -= 1;
			}
			// Fill to the end of the backing array
			if self.tail < max_tail {
				let n = cmp::min(p.len(), max_tail - self.tail);
				self.buf[self.tail..self.tail + n].copy_from_slice(&p[..n]);
				self.tail += n;
				i += n;
			}
			// Wrap around and fill up to head
			if i < p.len() && self.head > 0 {
				let n = cmp::min(p.len() - i, self.head - 1);
				self.buf[..n].copy_from_slice(&p[i..i + n]);
				self.tail = n;
				i += n;
			}
		} else {
			// Fill up to head
			let n = cmp::min(p.len(), self.head - 1 - self.tail);
			self.buf[self.tail..self.tail + n].copy_from_slice(&p[..n]);
			self.tail += n;
			i += n;
		}

		if self.tail == self.buf.len() {
			self.tail = 0;
		}

		if i < p.len() { Err(BufferFull(i)) } else { Ok(i) }
	}

	/// Copy up to `min(p.len(), self.len())` buffered bytes into `p`,
	/// advancing the read index. Never fails.
	pub fn read(&mut self, p: &mut [u8]) -> usize {
		let mut i = 0;

		if self.tail < self.head {
			// Wraparound: read to the end, then from the front
			let n = cmp::min(p.len(), self.buf.len() - self.head);
			p[..n].copy_from_slice(&self.buf[self.head..self.head + n]);
			i += n;
			if i < p.len() {
				let n = cmp::min(p.len() - i, self.tail);
				p[i..i + n].copy_from_slice(&self.buf[..n]);
				i += n;
			}
		} else if self.tail > self.head {
			let n = cmp::min(p.len(), self.tail - self.head);
			p[..n].copy_from_slice(&self.buf[self.head..self.head + n]);
			i += n;
		}

		self.head = (self.head + i) % self.buf.len();

		i
	}

	pub fn cap(&self) -> usize {
		self.buf.len() - 1
	}

	pub fn len(&self) -> usize {
		if self.head < self.tail {
			self.tail - self.head
		} else if self.tail < self.head {
			self.buf.len() - (self.head - self.tail)
		} else {
			0
		}
	}

	pub fn free(&self) -> usize {
		self.cap() - self.len()
	}

	pub fn is_empty(&self) -> bool {
		self.head == self.tail
	}

	pub fn is_full(&self) -> bool {
		self.len() == self.cap()
	}

	/// Clear both indices without touching the backing array, so a pooled
	/// buffer can be handed out again.
	pub fn reset(&mut self) {
		self.head = 0;
		self.tail = 0;
	}
}

impl Default for RingBuffer {
	fn default() -> RingBuffer {
		RingBuffer::new(0)
	}
}

#[cfg(test)]
#[path = "buffer_test.rs"]
mod tests;
