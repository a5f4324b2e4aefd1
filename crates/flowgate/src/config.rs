use serde::Deserialize;

use crate::proxy::upstream::{Upstream, UpstreamTransport, system_tls_config};
use crate::*;

/// Configuration for one upstream pool.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PoolConfig {
	pub name: String,
	#[serde(default)]
	pub upstreams: Vec<UpstreamConfig>,
}

/// Configuration for one origin server within a pool.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpstreamConfig {
	pub host: String,
	#[serde(default = "default_port")]
	pub port: u16,
	/// Dial timeout, e.g. "5s". Absent means no timeout.
	#[serde(default, deserialize_with = "duration_str::deserialize_option_duration")]
	pub connect_timeout: Option<Duration>,
	/// Weight 0 disables the upstream without removing it.
	#[serde(default = "default_weight")]
	pub weight: i64,
	/// Opts this upstream into liveness probing.
	#[serde(default)]
	pub ping_path: Option<String>,
	/// Dial with TLS, trusting the system root store.
	#[serde(default)]
	pub tls: bool,
}

fn default_port() -> u16 {
	80
}

fn default_weight() -> i64 {
	1
}

impl UpstreamConfig {
	pub fn build(&self) -> Upstream {
		let tls = self.tls.then(system_tls_config);
		let transport = UpstreamTransport::new(
			self.host.as_str(),
			self.port,
			self.connect_timeout.unwrap_or(Duration::ZERO),
			tls,
		);
		let mut upstream = Upstream::new(transport);
		if let Some(path) = &self.ping_path {
			upstream = upstream.with_ping_path(path);
		}
		upstream
	}
}

pub fn parse_pool_config(contents: &str) -> anyhow::Result<PoolConfig> {
	Ok(serde_yaml::from_str(contents)?)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
