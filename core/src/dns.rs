// verimail
// Copyright (C) 2018-2023 Reacher
// Copyright (C) 2024-2026 Verimail Contributors

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! DNS resolver facade: resolves A and MX records against a
//! configured list of recursive resolvers, with per-query and
//! total-lifetime timeouts.

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use hickory_resolver::config::{
	NameServerConfig, NameServerConfigGroup, Protocol, ResolverConfig as HickoryResolverConfig,
	ResolverOpts,
};
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::TokioAsyncResolver;

use crate::config::ResolverConfig;
use crate::types::MxRecord;

/// Classification of a failed lookup, each of which feeds the
/// decision engine differently: `NxDomain` means the domain itself does
/// not exist, while `NoAnswer`/`Timeout`/`Other` leave the door open for
/// transient retry elsewhere in the cascade.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DnsError {
	#[error("domain does not exist")]
	NxDomain,
	#[error("no answer for this record type")]
	NoAnswer,
	#[error("DNS query timed out")]
	Timeout,
	#[error("DNS resolution failed: {0}")]
	Other(String),
}

/// Thin async wrapper around `hickory-resolver`, configured from
/// [`ResolverConfig`].
pub struct DnsResolver {
	inner: TokioAsyncResolver,
}

impl DnsResolver {
	pub fn new(config: &ResolverConfig) -> anyhow::Result<Self> {
		let mut group = NameServerConfigGroup::new();
		for entry in &config.nameservers {
			let socket_addr = SocketAddr::from_str(entry)
				.map_err(|e| anyhow::anyhow!("invalid resolver address {entry}: {e}"))?;
			group.push(NameServerConfig {
				socket_addr,
				protocol: Protocol::Udp,
				tls_dns_name: None,
				trust_negative_responses: true,
				bind_addr: None,
			});
		}
		let resolver_config = HickoryResolverConfig::from_parts(None, Vec::new(), group);

		let mut opts = ResolverOpts::default();
		opts.timeout = config.query_timeout;
		// hickory's `attempts` multiplies against `timeout`; cap the total
		// time spent on one lookup at `config.lifetime` by limiting retries
		// to whatever fits within it.
		let attempts = (config.lifetime.as_millis() / config.query_timeout.as_millis().max(1))
			.max(1) as usize;
		opts.attempts = attempts;

		let inner = TokioAsyncResolver::tokio(resolver_config, opts);
		Ok(DnsResolver { inner })
	}

	/// Resolve A records for `domain`, used to establish domain validity.
	pub async fn resolve_a(&self, domain: &str) -> Result<Vec<IpAddr>, DnsError> {
		match self.inner.lookup_ip(domain).await {
			Ok(lookup) => Ok(lookup.iter().collect()),
			Err(e) => Err(classify_error(e.kind())),
		}
	}

	/// Resolve MX records for `domain`, sorted by preference ascending.
	pub async fn resolve_mx(&self, domain: &str) -> Result<Vec<MxRecord>, DnsError> {
		match self.inner.mx_lookup(domain).await {
			Ok(lookup) => {
				let mut records: Vec<MxRecord> = lookup
					.iter()
					.map(|mx| MxRecord {
						preference: mx.preference(),
						exchange: mx.exchange().to_string(),
					})
					.collect();
				records.sort_by_key(|r| r.preference);
				Ok(records)
			}
			Err(e) => Err(classify_error(e.kind())),
		}
	}
}

fn classify_error(kind: &ResolveErrorKind) -> DnsError {
	use hickory_proto::op::ResponseCode;

	match kind {
		ResolveErrorKind::NoRecordsFound { response_code, .. } => {
			if *response_code == ResponseCode::NXDomain {
				DnsError::NxDomain
			} else {
				DnsError::NoAnswer
			}
		}
		ResolveErrorKind::Timeout => DnsError::Timeout,
		other => DnsError::Other(other.to_string()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn builds_resolver_from_default_config() {
		let config = ResolverConfig::default();
		let resolver = DnsResolver::new(&config);
		assert!(resolver.is_ok());
	}
}
