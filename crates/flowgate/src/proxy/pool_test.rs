use super::*;
use crate::http::tests_common::{body_string, request_for_uri, static_body_server};
use crate::proxy::UpstreamTransport;

struct Ratio {
	name: &'static str,
	weights: [i64; 2],
	// expected share of responses served by A
	ratio: f64,
}

const RATIOS: &[Ratio] = &[
	Ratio { name: "simple", weights: [1, 1], ratio: 0.5 },
	Ratio { name: "double", weights: [2, 1], ratio: 2.0 / 3.0 },
	Ratio { name: "triple", weights: [3, 1], ratio: 0.75 },
	Ratio { name: "big", weights: [200, 100], ratio: 2.0 / 3.0 },
	Ratio { name: "single", weights: [1, 0], ratio: 1.0 },
	Ratio { name: "single reverse", weights: [0, 1], ratio: 0.0 },
];

#[tokio::test(flavor = "multi_thread")]
async fn weighted_balance() {
	let (_addr_a, stop_a, upstream_a) = static_body_server("A").await;
	let (_addr_b, stop_b, upstream_b) = static_body_server("B").await;

	let iterations = 1000;
	for test in RATIOS {
		let pool = UpstreamPool::new("TESTPOOL");
		pool.add_upstream(upstream_a.clone(), test.weights[0]);
		pool.add_upstream(upstream_b.clone(), test.weights[1]);

		let mut a_count = 0;
		for _ in 0..iterations {
			let resp = pool.filter_request(request_for_uri("http://localhost/test")).await;
			assert_eq!(resp.status(), StatusCode::OK, "{}", test.name);
			if body_string(resp).await == "A" {
				a_count += 1;
			}
		}
		let percent = a_count as f64 / iterations as f64;
		assert!(
			percent >= test.ratio * 0.9 && percent <= test.ratio * 1.1,
			"[{}] distribution {percent:.4} is out of range of goal {:.4}",
			test.name,
			test.ratio,
		);
		pool.shutdown();
	}

	stop_a.cancel();
	stop_b.cancel();
}

#[tokio::test]
async fn empty_pool_is_bad_gateway() {
	let pool = UpstreamPool::new("empty");
	let resp = pool.filter_request(request_for_uri("http://localhost/")).await;
	assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
}

// All-zero weights behave exactly like an empty pool; in particular the
// selector must not attempt a random draw over an empty range.
#[tokio::test]
async fn zero_weights_are_bad_gateway() {
	let (_addr, stop, upstream) = static_body_server("A").await;
	let pool = UpstreamPool::new("zeroes");
	pool.add_upstream(upstream.clone(), 0);

	let resp = pool.filter_request(request_for_uri("http://localhost/")).await;
	assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

	stop.cancel();
}

#[tokio::test]
async fn shutdown_is_idempotent_and_fails_requests() {
	let (_addr, stop, upstream) = static_body_server("A").await;
	let pool = UpstreamPool::new("shutdown");
	pool.add_upstream(upstream.clone(), 1);

	pool.shutdown();
	pool.shutdown();

	// The selector may have one pre-drawn entry in flight; after that every
	// request observes the closed channel.
	let _ = pool.filter_request(request_for_uri("http://localhost/")).await;
	let resp = pool.filter_request(request_for_uri("http://localhost/")).await;
	assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

	stop.cancel();
}

#[tokio::test]
async fn remove_upstream_stops_dispatch() {
	let (_addr_a, stop_a, upstream_a) = static_body_server("A").await;
	let (_addr_b, stop_b, upstream_b) = static_body_server("B").await;

	let pool = UpstreamPool::new("remove");
	pool.add_upstream(upstream_a.clone(), 1);
	pool.add_upstream(upstream_b.clone(), 1);

	pool.remove_upstream(&upstream_a);

	// One stale draw may still be buffered from before the kick
	let _ = pool.filter_request(request_for_uri("http://localhost/")).await;
	for _ in 0..100 {
		let resp = pool.filter_request(request_for_uri("http://localhost/")).await;
		assert_eq!(body_string(resp).await, "B");
	}

	pool.shutdown();
	stop_a.cancel();
	stop_b.cancel();
}

#[tokio::test]
async fn update_weight_rebalances() {
	let (_addr_a, stop_a, upstream_a) = static_body_server("A").await;
	let (_addr_b, stop_b, upstream_b) = static_body_server("B").await;

	let pool = UpstreamPool::new("update");
	pool.add_upstream(upstream_a.clone(), 1);
	pool.add_upstream(upstream_b.clone(), 1);

	pool.update_upstream(&upstream_b, 0);

	let _ = pool.filter_request(request_for_uri("http://localhost/")).await;
	for _ in 0..50 {
		let resp = pool.filter_request(request_for_uri("http://localhost/")).await;
		assert_eq!(body_string(resp).await, "A");
	}

	pool.shutdown();
	stop_a.cancel();
	stop_b.cancel();
}

#[tokio::test]
async fn transport_failure_marks_down() {
	let (_addr_a, stop_a, upstream_a) = static_body_server("A").await;
	let (_addr_b, stop_b, upstream_b) = static_body_server("B").await;

	let pool = UpstreamPool::new("markdown");
	pool.add_upstream(upstream_a.clone(), 1);
	pool.add_upstream(upstream_b.clone(), 1);

	// Kill A; requests that draw it fail at the transport layer, mark it
	// down, and every later draw lands on B.
	stop_a.cancel();

	let mut b_streak = 0;
	for _ in 0..200 {
		let resp = pool.filter_request(request_for_uri("http://localhost/")).await;
		if resp.status() == StatusCode::OK && body_string(resp).await == "B" {
			b_streak += 1;
		} else {
			b_streak = 0;
		}
	}
	assert!(b_streak >= 100, "pool kept routing to the dead upstream");

	pool.shutdown();
	stop_b.cancel();
}

#[tokio::test]
async fn manual_down_and_up() {
	let (_addr_a, stop_a, upstream_a) = static_body_server("A").await;
	let (_addr_b, stop_b, upstream_b) = static_body_server("B").await;

	let pool = UpstreamPool::new("manual");
	pool.add_upstream(upstream_a.clone(), 1);
	pool.add_upstream(upstream_b.clone(), 1);

	pool.down_upstream(&upstream_a, true);
	let _ = pool.filter_request(request_for_uri("http://localhost/")).await;
	for _ in 0..50 {
		let resp = pool.filter_request(request_for_uri("http://localhost/")).await;
		assert_eq!(body_string(resp).await, "B");
	}

	pool.down_upstream(&upstream_a, false);
	let mut saw_a = false;
	for _ in 0..100 {
		let resp = pool.filter_request(request_for_uri("http://localhost/")).await;
		if body_string(resp).await == "A" {
			saw_a = true;
			break;
		}
	}
	assert!(saw_a, "revived upstream never selected");

	pool.shutdown();
	stop_a.cancel();
	stop_b.cancel();
}

// The probe cycle notices a dead upstream and takes it out of rotation.
#[tokio::test(flavor = "multi_thread")]
async fn probe_marks_down() {
	let (_addr_a, stop_a, upstream_a) = static_body_server("A").await;
	let (_addr_b, stop_b, upstream_b) = static_body_server("B").await;

	let upstream_a = Arc::new(
		Upstream::new(UpstreamTransport::new(
			upstream_a.transport.host.as_str(),
			upstream_a.transport.port,
			Duration::from_secs(1),
			None,
		))
		.with_ping_path("/ping"),
	);
	let upstream_b = Arc::new(
		Upstream::new(UpstreamTransport::new(
			upstream_b.transport.host.as_str(),
			upstream_b.transport.port,
			Duration::from_secs(1),
			None,
		))
		.with_ping_path("/ping"),
	);

	let pool = UpstreamPool::new("probed");
	pool.add_upstream(upstream_a.clone(), 1);
	pool.add_upstream(upstream_b.clone(), 1);

	stop_a.cancel();

	// The first probe tick fires after the ping interval
	tokio::time::sleep(PING_INTERVAL + Duration::from_secs(1)).await;

	for _ in 0..1000 {
		let resp = pool.filter_request(request_for_uri("http://localhost/")).await;
		assert_eq!(body_string(resp).await, "B");
	}

	pool.shutdown();
	stop_b.cancel();
}
