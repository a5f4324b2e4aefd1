use std::collections::VecDeque;

use super::*;

struct Op {
	name: &'static str,
	op: char,
	size: usize,
	op_len: usize,
	full: bool,
	expect_len: usize,
}

// Apply these operations in order and verify state. The sequence exercises
// both wrap directions, exact fills, over-reads and over-writes.
const SEQUENCE: &[Op] = &[
	Op { name: "XX__", op: 'w', size: 512, op_len: 512, full: false, expect_len: 512 },
	Op { name: "_X__", op: 'r', size: 256, op_len: 256, full: false, expect_len: 256 },
	Op { name: "_XXX", op: 'w', size: 512, op_len: 512, full: false, expect_len: 768 },
	Op { name: "__XX", op: 'r', size: 256, op_len: 256, full: false, expect_len: 512 },
	Op { name: "X_XX", op: 'w', size: 256, op_len: 256, full: false, expect_len: 768 },
	Op { name: "XX|XX", op: 'w', size: 256, op_len: 256, full: false, expect_len: 1024 },
	Op { name: "__|__", op: 'r', size: 1024, op_len: 1024, full: false, expect_len: 0 },
	Op { name: "w16", op: 'w', size: 16, op_len: 16, full: false, expect_len: 16 },
	Op { name: "r16", op: 'r', size: 16, op_len: 16, full: false, expect_len: 0 },
	Op { name: "w16", op: 'w', size: 16, op_len: 16, full: false, expect_len: 16 },
	Op { name: "r32", op: 'r', size: 32, op_len: 16, full: false, expect_len: 0 },
	Op { name: "wfull", op: 'w', size: 1024, op_len: 1024, full: false, expect_len: 1024 },
	Op { name: "wfull2", op: 'w', size: 1024, op_len: 0, full: true, expect_len: 1024 },
	Op { name: "empty", op: 'r', size: 1024, op_len: 1024, full: false, expect_len: 0 },
	Op { name: "wfill", op: 'w', size: 768, op_len: 768, full: false, expect_len: 768 },
	Op { name: "wfill2", op: 'w', size: 768, op_len: 256, full: true, expect_len: 1024 },
	Op { name: "empty", op: 'r', size: 1024, op_len: 1024, full: false, expect_len: 0 },
	Op { name: "w1", op: 'w', size: 1, op_len: 1, full: false, expect_len: 1 },
	Op { name: "r1", op: 'r', size: 1, op_len: 1, full: false, expect_len: 0 },
];

#[test]
fn sequence() {
	let mut b = RingBuffer::new(1024);
	// Model the expected FIFO contents independently
	let mut model: VecDeque<u8> = VecDeque::new();

	assert_eq!(b.cap(), 1024);

	// Run the table several times so indices land in different phases
	for _ in 0..4 {
		for (ti, t) in SEQUENCE.iter().enumerate() {
			if t.op == 'w' {
				let data = vec![ti as u8; t.size];
				let n = match b.write(&data) {
					Ok(n) => {
						assert!(!t.full, "{} expected BufferFull", t.name);
						n
					},
					Err(BufferFull(n)) => {
						assert!(t.full, "{} unexpected BufferFull", t.name);
						n
					},
				};
				assert_eq!(n, t.op_len, "{} write len", t.name);
				model.extend(&data[..n]);
			} else {
				let mut data = vec![0u8; t.size];
				let n = b.read(&mut data);
				assert_eq!(n, t.op_len, "{} read len", t.name);
				let expect: Vec<u8> = model.drain(..n).collect();
				assert_eq!(&data[..n], &expect[..], "{} read data", t.name);
			}
			assert_eq!(b.len(), t.expect_len, "{} len", t.name);
			assert_eq!(b.free(), 1024 - t.expect_len, "{} free", t.name);
		}
	}
}

#[test]
fn wraparound() {
	let mut b = RingBuffer::new(1024);

	assert_eq!(b.write(&[0xAA; 512]), Ok(512));
	let mut out = vec![0u8; 256];
	assert_eq!(b.read(&mut out), 256);
	assert!(out.iter().all(|&x| x == 0xAA));
	assert_eq!(b.write(&[0xBB; 512]), Ok(512));

	assert_eq!(b.len(), 768);

	let mut out = vec![0u8; 768];
	assert_eq!(b.read(&mut out), 768);
	assert!(out[..256].iter().all(|&x| x == 0xAA));
	assert!(out[256..].iter().all(|&x| x == 0xBB));
	assert!(b.is_empty());
}

#[test]
fn full_and_empty() {
	let mut b = RingBuffer::new(8);

	// Empty: reads return 0
	let mut out = [0u8; 4];
	assert_eq!(b.read(&mut out), 0);
	assert!(b.is_empty());
	assert!(!b.is_full());

	// Full: the next write returns BufferFull(0)
	assert_eq!(b.write(&[1; 8]), Ok(8));
	assert!(b.is_full());
	assert_eq!(b.write(&[2; 1]), Err(BufferFull(0)));
	assert_eq!(b.len() + b.free(), b.cap());
}

#[test]
fn zero_length_ops() {
	let mut b = RingBuffer::new(8);
	assert_eq!(b.write(&[]), Ok(0));
	assert_eq!(b.read(&mut []), 0);
	assert!(b.is_empty());
}

#[test]
fn reset_allows_reuse() {
	let mut b = RingBuffer::new(8);
	assert_eq!(b.write(&[7; 5]), Ok(5));
	b.reset();
	assert!(b.is_empty());
	assert_eq!(b.free(), 8);
	assert_eq!(b.write(&[9; 8]), Ok(8));
	let mut out = [0u8; 8];
	assert_eq!(b.read(&mut out), 8);
	assert_eq!(out, [9; 8]);
}
