use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use rand::Rng;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::PoolConfig;
use crate::filters::RequestFilter;
use crate::http::response::string_response;
use crate::http::{Request, Response, StatusCode};
use crate::proxy::Upstream;
use crate::*;

const PING_INTERVAL: Duration = Duration::from_secs(3);

/// The pool's record for one upstream: its weight and liveness. `down`
/// entries are excluded from selection until a probe brings them back.
pub struct PoolEntry {
	upstream: Arc<Upstream>,
	weight: AtomicI64,
	down: AtomicBool,
}

impl PoolEntry {
	fn weight(&self) -> i64 {
		self.weight.load(Ordering::Relaxed)
	}

	fn is_down(&self) -> bool {
		self.down.load(Ordering::Relaxed)
	}
}

#[derive(Default)]
struct PoolState {
	entries: Vec<Arc<PoolEntry>>,
	// Invariant: the sum of weights over entries that are not down
	weight_sum: i64,
	// Bumped by every reconfiguration. Draws are stamped with the version
	// they were made under so a request never uses a draw that predates a
	// completed reconfiguration.
	version: u64,
}

impl PoolState {
	fn rebalance(&mut self) {
		self.weight_sum = self
			.entries
			.iter()
			.filter(|e| !e.is_down())
			.map(|e| e.weight())
			.sum();
		self.version += 1;
	}
}

// One weighted draw, stamped with the configuration version it saw.
struct Draw {
	version: u64,
	entry: Option<Arc<PoolEntry>>,
}

struct PoolShared {
	name: Strng,
	state: RwLock<PoolState>,
}

impl PoolShared {
	// Weighted-random draw over live entries. A draw with no entry means
	// nothing is live; weight_sum must be checked before drawing a random
	// goal, a zero range is not a valid draw.
	fn pick(&self) -> Draw {
		let state = self.state.read();
		let version = state.version;
		if state.weight_sum <= 0 {
			return Draw { version, entry: None };
		}
		let mut goal = rand::rng().random_range(0..state.weight_sum);
		for e in &state.entries {
			if e.is_down() {
				continue;
			}
			let w = e.weight();
			if w > goal {
				return Draw {
					version,
					entry: Some(e.clone()),
				};
			}
			goal -= w;
		}
		Draw { version, entry: None }
	}

	// Returns whether the liveness flag actually changed. The flag is
	// compared under the read lock first so idempotent flips avoid write
	// contention.
	fn down_entry(&self, entry: &Arc<PoolEntry>, is_down: bool) -> bool {
		let changed = {
			let _state = self.state.read();
			entry.is_down() != is_down
		};
		if changed {
			let mut state = self.state.write();
			entry.down.store(is_down, Ordering::Relaxed);
			state.rebalance();
		}
		changed
	}

	fn log_status(&self) {
		let state = self.state.read();
		for e in &state.entries {
			info!(
				pool = %self.name,
				upstream = %e.upstream.transport.authority(),
				weight = e.weight(),
				status = if e.is_down() { "DOWN" } else { "UP" },
				"upstream status",
			);
		}
	}
}

/// A collection of upstreams which are considered functionally equivalent.
/// The pool balances traffic across them by relative weight, probes liveness
/// on the ones that advertise a ping path, and marks an upstream down when a
/// request through it fails at the transport layer.
///
/// A background selector task performs the weighted draw and hands entries
/// out one at a time; reconfiguration signals it to redraw with fresh state.
pub struct UpstreamPool {
	shared: Arc<PoolShared>,
	next_upstream: AsyncMutex<mpsc::Receiver<Draw>>,
	kick: mpsc::Sender<()>,
	shutdown: CancellationToken,
}

impl UpstreamPool {
	/// Spawns the selector and prober tasks; must be called in a tokio
	/// runtime. The name is used for logging only.
	pub fn new(name: impl AsRef<str>) -> UpstreamPool {
		let shared = Arc::new(PoolShared {
			name: strng::new(name),
			state: RwLock::new(PoolState::default()),
		});
		let (next_tx, next_rx) = mpsc::channel(1);
		let (kick_tx, kick_rx) = mpsc::channel(1);
		let shutdown = CancellationToken::new();
		tokio::spawn(selector(shared.clone(), next_tx, kick_rx, shutdown.clone()));
		tokio::spawn(prober(shared.clone(), shutdown.clone()));
		UpstreamPool {
			shared,
			next_upstream: AsyncMutex::new(next_rx),
			kick: kick_tx,
			shutdown,
		}
	}

	pub fn from_config(cfg: &PoolConfig) -> UpstreamPool {
		let pool = UpstreamPool::new(cfg.name.as_str());
		for u in cfg.upstreams.iter().rev() {
			pool.add_upstream(Arc::new(u.build()), u.weight);
		}
		pool
	}

	pub fn name(&self) -> &Strng {
		&self.shared.name
	}

	pub fn add_upstream(&self, upstream: Arc<Upstream>, weight: i64) {
		{
			let mut state = self.shared.state.write();
			state.entries.insert(
				0,
				Arc::new(PoolEntry {
					upstream,
					weight: AtomicI64::new(weight),
					down: AtomicBool::new(false),
				}),
			);
			state.rebalance();
		}
		self.kick();
	}

	/// Remove an upstream, matched by identity. An in-flight request that
	/// already drew this entry completes against it.
	pub fn remove_upstream(&self, upstream: &Arc<Upstream>) {
		{
			let mut state = self.shared.state.write();
			state.entries.retain(|e| !Arc::ptr_eq(&e.upstream, upstream));
			state.rebalance();
		}
		self.kick();
	}

	/// Re-weight an upstream. Weight 0 excludes it from selection.
	pub fn update_upstream(&self, upstream: &Arc<Upstream>, weight: i64) {
		{
			let mut state = self.shared.state.write();
			if let Some(e) = state
				.entries
				.iter()
				.find(|e| Arc::ptr_eq(&e.upstream, upstream))
			{
				e.weight.store(weight, Ordering::Relaxed);
			}
			state.rebalance();
		}
		self.kick();
	}

	/// Mark an upstream down (or back up) by hand.
	pub fn down_upstream(&self, upstream: &Arc<Upstream>, is_down: bool) {
		let entry = {
			let state = self.shared.state.read();
			state
				.entries
				.iter()
				.find(|e| Arc::ptr_eq(&e.upstream, upstream))
				.cloned()
		};
		if let Some(entry) = entry {
			if self.shared.down_entry(&entry, is_down) {
				self.kick();
			}
		}
	}

	/// Dispatch one request to a selected upstream. An empty or shut-down
	/// pool yields 502 Bad Gateway; a transport failure marks the drawn
	/// entry down and yields 502 for this request only.
	pub async fn filter_request(&self, req: Request) -> Response {
		let draw = loop {
			let draw = {
				let mut next = self.next_upstream.lock().await;
				next.recv().await
			};
			let Some(draw) = draw else {
				// The selector has exited; the pool was shut down
				error!(pool = %self.shared.name, "pool is shut down");
				return string_response(StatusCode::BAD_GATEWAY, None, "Bad Gateway\n");
			};
			// Discard draws that predate the latest reconfiguration; the
			// kick has the selector producing a fresh one already
			if draw.version == self.shared.state.read().version {
				break draw;
			}
		};
		let Some(entry) = draw.entry else {
			error!(pool = %self.shared.name, "no upstreams available");
			return string_response(StatusCode::BAD_GATEWAY, None, "Bad Gateway\n");
		};

		match entry.upstream.dispatch(req).await {
			Ok(resp) => resp,
			Err(err) => {
				warn!(
					pool = %self.shared.name,
					upstream = %entry.upstream.transport.authority(),
					err = %err,
					"upstream request failed",
				);
				if err.is_transport() {
					// No kick needed; the selector re-reads state on its next draw
					self.shared.down_entry(&entry, true);
					self.shared.log_status();
				}
				err.into_response()
			},
		}
	}

	/// Log the current status of the pool.
	pub fn log_status(&self) {
		self.shared.log_status();
	}

	/// Stop the selector and prober. Idempotent. Requests received after
	/// shutdown are answered with 502.
	pub fn shutdown(&self) {
		self.shutdown.cancel();
	}

	// Let the selector know the configuration changed. Non-blocking: a
	// pending kick already covers this change.
	fn kick(&self) {
		let _ = self.kick.try_send(());
	}
}

impl Drop for UpstreamPool {
	fn drop(&mut self) {
		self.shutdown.cancel();
	}
}

#[async_trait]
impl RequestFilter for UpstreamPool {
	async fn filter_request(&self, req: &mut Request) -> Option<Response> {
		let req = std::mem::take(req);
		Some(UpstreamPool::filter_request(self, req).await)
	}
}

// Draws one entry at a time and offers it on the selector channel. A kick
// abandons the current offer and redraws, so reconfiguration never stalls
// request dispatch; at most one already-buffered entry goes out stale.
async fn selector(
	shared: Arc<PoolShared>,
	next: mpsc::Sender<Draw>,
	mut kick: mpsc::Receiver<()>,
	shutdown: CancellationToken,
) {
	loop {
		let pick = shared.pick();
		tokio::select! {
			_ = shutdown.cancelled() => {
				// Dropping the sender closes the channel for waiting requests
				return;
			},
			res = next.send(pick) => {
				if res.is_err() {
					return;
				}
			},
			res = kick.recv() => {
				if res.is_none() {
					return;
				}
			},
		}
	}
}

// Probes every upstream that advertises a ping path, once per tick. Exits
// for good when a tick finds nothing to ping; probing is opt-in.
async fn prober(shared: Arc<PoolShared>, shutdown: CancellationToken) {
	let start = tokio::time::Instant::now() + PING_INTERVAL;
	let mut ticker = tokio::time::interval_at(start, PING_INTERVAL);
	ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
	loop {
		tokio::select! {
			_ = shutdown.cancelled() => return,
			_ = ticker.tick() => {
				let pingable: Vec<Arc<PoolEntry>> = {
					let state = shared.state.read();
					state
						.entries
						.iter()
						.filter(|e| e.upstream.ping_path.is_some())
						.cloned()
						.collect()
				};
				if pingable.is_empty() {
					warn!(pool = %shared.name, "stopping ping, no upstream has a ping path");
					return;
				}
				for entry in pingable {
					let shared = shared.clone();
					tokio::spawn(async move {
						if let Some(is_up) = entry.upstream.ping().await {
							if shared.down_entry(&entry, !is_up) {
								shared.log_status();
							}
						}
					});
				}
			},
		}
	}
}

#[cfg(test)]
#[path = "pool_test.rs"]
mod tests;
