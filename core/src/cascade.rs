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

//! The probe cascade: syntax -> domain -> MX -> provider
//! HTTP probe -> SMTP conversation -> catch-all probe -> decision engine.
//! This is the per-address pipeline the job executor fans out across its
//! worker pool; every suspension point here is a DNS query, HTTP request,
//! or SMTP round trip, each under its own deadline from [`ProbeBudgets`].

use std::future::Future;
use std::pin::Pin;

use serde_json::json;

use crate::config::{EngineConfig, SmtpProbeConfig};
use crate::decision::{decide, DecisionInputs};
use crate::dns::DnsResolver;
use crate::domain::{classify_domain, DomainCache, DomainLists};
use crate::domain::classifier::smtp_provider_name;
use crate::provider::{google, microsoft, ProviderVerdict};
use crate::smtp::catch_all::detect_catch_all;
use crate::smtp::prober::check_smtp;
use crate::syntax::check_syntax;
use crate::types::{
	CatchAllStatus, DomainStatus, MxStatus, ProbeBudgets, ProviderTag, SmtpStatus,
	VerificationResult,
};

/// Everything the cascade needs that isn't specific to one address:
/// resolver, caches, HTTP client, and timing budgets. Built once per
/// [`crate::VerificationEngine`] and shared (via `Arc`) across every
/// worker in the job executor's pool.
pub struct CascadeDeps {
	pub resolver: DnsResolver,
	pub domain_cache: DomainCache,
	pub domain_lists: DomainLists,
	pub http_client: reqwest::Client,
	pub smtp_config: SmtpProbeConfig,
	pub budgets: ProbeBudgets,
	pub instance_name: String,
}

impl CascadeDeps {
	pub fn new(config: &EngineConfig) -> anyhow::Result<Self> {
		crate::initialize_crypto_provider();
		let http_client = reqwest::Client::builder()
			.user_agent("verimail/0.1")
			.build()?;
		Ok(CascadeDeps {
			resolver: DnsResolver::new(&config.resolver)?,
			domain_cache: DomainCache::new(config.domain_cache_ttl),
			domain_lists: DomainLists::new(&config.domain_lists),
			http_client,
			smtp_config: config.smtp.clone(),
			budgets: config.probe_budgets,
			instance_name: config.instance_name.clone(),
		})
	}
}

/// Boxed future alias so [`Verifier`] stays dyn-compatible -- the job
/// executor holds an `Arc<dyn Verifier>` so that tests can substitute a
/// deterministic fake and never touch the network in tests.
pub type VerifyFuture<'a> = Pin<Box<dyn Future<Output = VerificationResult> + Send + 'a>>;

/// Abstraction over "run the cascade for one address", so the job
/// executor doesn't depend on [`CascadeDeps`] directly.
pub trait Verifier: Send + Sync {
	fn verify<'a>(&'a self, raw: &'a str) -> VerifyFuture<'a>;
}

impl Verifier for CascadeDeps {
	fn verify<'a>(&'a self, raw: &'a str) -> VerifyFuture<'a> {
		Box::pin(verify_address(self, raw))
	}
}

/// Run the full cascade for one address. Never errors to the caller:
/// every probe failure degrades the relevant signal and the decision
/// engine still produces a total result.
pub async fn verify_address(deps: &CascadeDeps, raw: &str) -> VerificationResult {
	let result = match tokio::time::timeout(deps.budgets.total, run_cascade(deps, raw)).await {
		Ok(result) => result,
		Err(_) => VerificationResult::terminal(
			raw,
			crate::types::FinalStatus::Error,
			0,
			crate::types::SpamRisk::High,
			"probe budget exceeded before a verdict was reached",
		),
	};

	#[cfg(feature = "sentry")]
	crate::util::sentry::log_unknown_errors(&result, &deps.instance_name);

	result
}

async fn run_cascade(deps: &CascadeDeps, raw: &str) -> VerificationResult {
	let syntax = check_syntax(raw);

	// Rule 1: syntax invalid short-circuits everything else.
	let Some(address) = syntax.address else {
		let decision = decide(DecisionInputs {
			syntax_valid: false,
			disposable: false,
			domain_valid: false,
			mx_found: false,
			role_based: false,
			provider_exists: None,
			catch_all: false,
			smtp: SmtpStatus::NoMx,
		});
		return VerificationResult::terminal(
			raw,
			decision.final_status,
			decision.safety_score,
			decision.spam_risk,
			decision.reason,
		);
	};

	let role_based = deps.domain_lists.is_role_based(&address.local);

	// Rule 2: a disposable domain never needs a network probe -- the
	// verdict doesn't depend on deliverability at all.
	if deps.domain_lists.is_disposable(&address.domain) {
		let decision = decide(DecisionInputs {
			syntax_valid: true,
			disposable: true,
			domain_valid: true,
			mx_found: false,
			role_based,
			provider_exists: None,
			catch_all: false,
			smtp: SmtpStatus::NoMx,
		});
		let mut result = VerificationResult::terminal(
			&address.original,
			decision.final_status,
			decision.safety_score,
			decision.spam_risk,
			decision.reason,
		);
		result.disposable = true;
		result.role_based = role_based;
		return result;
	}

	// Rule 3: A-record resolution.
	let domain_valid = match tokio::time::timeout(
		deps.budgets.dns,
		deps.resolver.resolve_a(&address.domain),
	)
	.await
	{
		Ok(Ok(_)) => true,
		Ok(Err(_)) => false,
		Err(_) => false,
	};

	if !domain_valid {
		let decision = decide(DecisionInputs {
			syntax_valid: true,
			disposable: false,
			domain_valid: false,
			mx_found: false,
			role_based,
			provider_exists: None,
			catch_all: false,
			smtp: SmtpStatus::NoMx,
		});
		let mut result = VerificationResult::terminal(
			&address.original,
			decision.final_status,
			decision.safety_score,
			decision.spam_risk,
			decision.reason,
		);
		result.domain = DomainStatus::Invalid;
		result.role_based = role_based;
		if let Some(suggestion) = crate::syntax::suggest_provider_typo(&address.domain) {
			result.details.insert("did_you_mean".to_string(), json!(suggestion));
		}
		return result;
	}

	// Rule 4: MX lookup.
	let mx_records = match tokio::time::timeout(
		deps.budgets.dns,
		deps.resolver.resolve_mx(&address.domain),
	)
	.await
	{
		Ok(Ok(records)) if !records.is_empty() => records,
		_ => {
			let decision = decide(DecisionInputs {
				syntax_valid: true,
				disposable: false,
				domain_valid: true,
				mx_found: false,
				role_based,
				provider_exists: None,
				catch_all: false,
				smtp: SmtpStatus::NoMx,
			});
			let mut result = VerificationResult::terminal(
				&address.original,
				decision.final_status,
				decision.safety_score,
				decision.spam_risk,
				decision.reason,
			);
			result.role_based = role_based;
			return result;
		}
	};

	// Classify, memoizing in the per-domain cache.
	let provider_tag = match deps.domain_cache.get(&address.domain) {
		Some(entry) => entry.provider_tag,
		None => {
			let tag = classify_domain(&address.domain, &mx_records);
			deps.domain_cache.set_provider_tag(&address.domain, tag);
			tag
		}
	};
	let smtp_provider = smtp_provider_name(provider_tag, &mx_records);

	let primary_mx = mx_records
		.first()
		.expect("mx_records is non-empty, checked above");

	// Provider-specific HTTP probe, only for hosted tenants.
	let provider_verdict = if provider_tag.has_http_probe() {
		Some(run_provider_probe(deps, provider_tag, &address).await)
	} else {
		None
	};

	if let Some(verdict) = &provider_verdict {
		if verdict.catch_all_observed {
			deps.domain_cache
				.set_catch_all(&address.domain, verdict.catch_all);
		}
	}

	// The SMTP conversation against the real address. Always attempted
	// so every result carries a real `smtp`/`smtp_records` diagnostic
	// even on providers whose HTTP probe already settled the verdict --
	// all fields stay present regardless.
	let recipient = format!("{}@{}", address.local, address.domain);
	let (smtp_status, smtp_detail) = check_smtp(
		primary_mx,
		&recipient,
		&deps.smtp_config,
		&deps.resolver,
		deps.budgets.smtp,
	)
	.await;

	// Catch-all status, cache-first.
	let catch_all_status = resolve_catch_all(
		deps,
		&address.domain,
		primary_mx,
		provider_verdict.as_ref(),
	)
	.await;
	let catch_all = matches!(catch_all_status, CatchAllStatus::True);

	let is_o365 = provider_verdict.as_ref().map(|v| v.is_o365).unwrap_or(false);
	let provider_exists = provider_verdict.as_ref().and_then(|v| v.exists);

	let decision = decide(DecisionInputs {
		syntax_valid: true,
		disposable: false,
		domain_valid: true,
		mx_found: true,
		role_based,
		provider_exists,
		catch_all,
		smtp: smtp_status,
	});

	let mut details = std::collections::HashMap::new();
	details.insert("smtp_detail".to_string(), json!(smtp_detail));
	if let Some(verdict) = &provider_verdict {
		details.insert("provider_method".to_string(), json!(verdict.method));
		details.insert("provider_detail".to_string(), json!(verdict.details));
	}

	VerificationResult {
		email: address.original,
		syntax: crate::types::SyntaxStatus::Valid,
		domain: DomainStatus::Valid,
		mx: MxStatus::Found,
		mx_records,
		smtp: smtp_status,
		smtp_provider,
		catch_all,
		disposable: false,
		role_based,
		is_o365,
		spam_risk: decision.spam_risk,
		final_status: decision.final_status,
		safety_score: decision.safety_score,
		reason: decision.reason,
		details,
		timestamp: chrono::Utc::now(),
		credits_used: 1,
	}
}

async fn run_provider_probe(
	deps: &CascadeDeps,
	tag: ProviderTag,
	address: &crate::types::Address,
) -> ProviderVerdict {
	let timeout = deps.budgets.http;
	if tag.is_microsoft() {
		microsoft::check_email(&deps.http_client, address, timeout).await
	} else if tag.is_google() {
		google::check_email(&deps.http_client, address, timeout).await
	} else {
		ProviderVerdict::unknown("none", "provider has no HTTP probe")
	}
}

/// Prefer a cached verdict, then a provider-probe observation, then an
/// on-the-wire SMTP probe, falling back to the static allowlist when
/// SMTP itself is unreachable.
async fn resolve_catch_all(
	deps: &CascadeDeps,
	domain: &str,
	primary_mx: &crate::types::MxRecord,
	provider_verdict: Option<&ProviderVerdict>,
) -> CatchAllStatus {
	if let Some(entry) = deps.domain_cache.get(domain) {
		if entry.is_catch_all != CatchAllStatus::Unknown {
			return entry.is_catch_all;
		}
	}

	if let Some(verdict) = provider_verdict {
		if verdict.catch_all_observed {
			return if verdict.catch_all {
				CatchAllStatus::True
			} else {
				CatchAllStatus::False
			};
		}
	}

	let status = detect_catch_all(
		primary_mx,
		domain,
		&deps.domain_lists,
		&deps.smtp_config,
		&deps.resolver,
		deps.budgets.smtp,
	)
	.await;
	if status != CatchAllStatus::Unknown {
		deps.domain_cache
			.set_catch_all(domain, status == CatchAllStatus::True);
	}
	status
}

/// A deterministic, network-free [`Verifier`] for tests. Job executor
/// and ledger tests run against in-memory implementations only -- no
/// network.
#[cfg(feature = "test-util")]
pub mod test_util {
	use super::*;
	use std::collections::HashMap as StdHashMap;
	use std::sync::Mutex;

	/// Looks up a canned [`VerificationResult`] by the exact input string;
	/// unknown addresses get a generic `valid_safe` stand-in so tests
	/// don't need to enumerate every address up front.
	pub struct FakeVerifier {
		results: Mutex<StdHashMap<String, VerificationResult>>,
	}

	impl FakeVerifier {
		pub fn new() -> Self {
			FakeVerifier {
				results: Mutex::new(StdHashMap::new()),
			}
		}

		pub fn with(self, email: &str, result: VerificationResult) -> Self {
			self.results
				.lock()
				.expect("fake verifier lock poisoned")
				.insert(email.to_string(), result);
			self
		}
	}

	impl Verifier for FakeVerifier {
		fn verify<'a>(&'a self, raw: &'a str) -> VerifyFuture<'a> {
			let canned = self
				.results
				.lock()
				.expect("fake verifier lock poisoned")
				.get(raw)
				.cloned();
			Box::pin(async move {
				canned.unwrap_or_else(|| {
					VerificationResult::terminal(
						raw,
						crate::types::FinalStatus::ValidSafe,
						95,
						crate::types::SpamRisk::Low,
						"Valid and safe",
					)
				})
			})
		}
	}

	/// A [`Verifier`] that panics on a configured set of addresses, used to
	/// exercise the job executor's per-address crash isolation -- e.g. a
	/// worker crashing partway through a batch on one bad domain.
	pub struct CrashingVerifier {
		inner: FakeVerifier,
		crash_on: Vec<String>,
	}

	impl CrashingVerifier {
		pub fn new(inner: FakeVerifier, crash_on: Vec<String>) -> Self {
			CrashingVerifier { inner, crash_on }
		}
	}

	impl Verifier for CrashingVerifier {
		fn verify<'a>(&'a self, raw: &'a str) -> VerifyFuture<'a> {
			if self.crash_on.iter().any(|c| c == raw) {
				Box::pin(async move { panic!("simulated worker crash verifying {raw}") })
			} else {
				self.inner.verify(raw)
			}
		}
	}
}
