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

//! Configuration for the verification engine. Values here back every
//! tunable the engine exposes: resolver list and timeouts, SMTP
//! identity, worker pool size, flush cadence, and the bulk-size
//! ceiling.

use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::types::ProbeBudgets;

/// Ordered list of recursive DNS resolvers plus per-query/lifetime
/// timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
	/// `host:port` pairs, tried in order. Defaults to well-known public
	/// recursors.
	pub nameservers: Vec<String>,
	/// Per-query timeout.
	pub query_timeout: Duration,
	/// Total lifetime budget across retries for a single lookup.
	pub lifetime: Duration,
}

impl Default for ResolverConfig {
	fn default() -> Self {
		ResolverConfig {
			nameservers: vec![
				"1.1.1.1:53".to_string(),
				"1.0.0.1:53".to_string(),
				"8.8.8.8:53".to_string(),
				"8.8.4.4:53".to_string(),
			],
			query_timeout: Duration::from_secs(3),
			lifetime: Duration::from_secs(5),
		}
	}
}

/// Identity and timeouts used for the SMTP conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpProbeConfig {
	/// Port to dial on the primary MX. 25 in production; overridable for
	/// environments where 25 is firewalled and a smart host is used.
	pub port: u16,
	/// Used in the `MAIL FROM:` command.
	pub from_email: String,
	/// Used in the `EHLO`/`HELO` command.
	pub hello_name: String,
	/// Deadline for establishing the TCP connection.
	pub connect_timeout: Duration,
	/// Deadline for each SMTP command/response round trip.
	pub command_timeout: Duration,
}

impl Default for SmtpProbeConfig {
	fn default() -> Self {
		SmtpProbeConfig {
			port: 25,
			from_email: "verify@verimail.invalid".to_string(),
			hello_name: "verimail.invalid".to_string(),
			connect_timeout: Duration::from_secs(5),
			command_timeout: Duration::from_secs(10),
		}
	}
}

/// Bounded worker pool parameters for the job executor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WorkerPoolConfig {
	/// Maximum number of probes running concurrently within one job.
	pub concurrency: usize,
}

impl Default for WorkerPoolConfig {
	fn default() -> Self {
		WorkerPoolConfig { concurrency: 10 }
	}
}

/// How often the executor persists a partial job snapshot: every K
/// completions or every T seconds, whichever comes first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FlushPolicy {
	pub every_n_completions: u32,
	pub every: Duration,
}

impl Default for FlushPolicy {
	fn default() -> Self {
		FlushPolicy {
			every_n_completions: 10,
			every: Duration::from_secs(2),
		}
	}
}

/// Static domain lists and overrides. `mailchecker` already ships a
/// maintained disposable-domain table; `disposable_extra`
/// lets an operator extend it without a restart of the whole process
/// (the engine re-reads these vectors on every call, they aren't baked
/// into a lazily-initialized static).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomainListsConfig {
	pub disposable_extra: Vec<String>,
	pub role_based_extra: Vec<String>,
	pub catch_all_allowlist: Vec<String>,
}

/// Top-level engine configuration.
#[derive(Builder, Debug, Clone, Serialize, Deserialize)]
#[builder(default)]
pub struct EngineConfig {
	pub resolver: ResolverConfig,
	pub smtp: SmtpProbeConfig,
	pub worker_pool: WorkerPoolConfig,
	pub flush_policy: FlushPolicy,
	pub domain_lists: DomainListsConfig,
	#[builder(default = "ProbeBudgets::default()")]
	pub probe_budgets: ProbeBudgets,
	/// Domain-cache entry lifetime. Default: 24 hours.
	pub domain_cache_ttl: Duration,
	/// Inclusive upper bound on a single bulk job's address count:
	/// 1 <= count <= 100,000.
	pub max_bulk: u32,
	/// Identifier for this running instance, carried into diagnostics the
	/// way the original's `backend_name` is threaded into `DebugDetails`.
	pub instance_name: String,
}

impl Default for EngineConfig {
	fn default() -> Self {
		EngineConfig {
			resolver: ResolverConfig::default(),
			smtp: SmtpProbeConfig::default(),
			worker_pool: WorkerPoolConfig::default(),
			flush_policy: FlushPolicy::default(),
			domain_lists: DomainListsConfig::default(),
			probe_budgets: ProbeBudgets::default(),
			domain_cache_ttl: Duration::from_secs(24 * 3600),
			max_bulk: 100_000,
			instance_name: "verimail-dev".to_string(),
		}
	}
}

impl EngineConfig {
	/// Load configuration from (in increasing priority order) an optional
	/// config file, then environment variables prefixed `VERIMAIL_`
	/// (double underscore as the nested-key separator, e.g.
	/// `VERIMAIL_SMTP__PORT=587`), layered over [`EngineConfig::default`].
	///
	/// Mirrors the way the original's backend loads `config::Config` at
	/// startup, generalized since there's no longer a fixed `config/`
	/// directory assumption -- callers pass the path they want.
	pub fn load(config_file: Option<&str>) -> anyhow::Result<Self> {
		let defaults = config::Config::try_from(&EngineConfig::default())?;
		let mut builder = config::Config::builder().add_source(defaults);

		if let Some(path) = config_file {
			builder = builder.add_source(config::File::with_name(path).required(false));
		}

		let settings = builder
			.add_source(config::Environment::with_prefix("VERIMAIL").separator("__"))
			.build()?;

		settings.try_deserialize().map_err(anyhow::Error::from)
	}
}
