use tracing_subscriber::EnvFilter;

/// Install the process-wide tracing subscriber. Respects `RUST_LOG`; defaults
/// to `info`. Calling this more than once is a no-op, so tests and embedders
/// can call it unconditionally.
pub fn setup_logging() {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
