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

//! The bulk job executor: a bounded-concurrency fan-out over the probe
//! cascade, with atomic credit reservation and
//! incremental, in-order progress publication.
//!
//! Grounded on the original's `tasks.py::process_bulk_job` (Celery task)
//! for the flush cadence ("every 10 emails or on the last email") and
//! per-address error isolation, and on `KumoCorp-kumomta`'s
//! `QueueManager` (`crates/kumod/src/queue/manager.rs`) for the
//! `DashMap`-keyed, single-writer-per-key concurrency shape -- here, one
//! job id instead of one queue name.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use tokio::sync::Semaphore;
use tokio::task::AbortHandle;
use uuid::Uuid;

use crate::cascade::Verifier;
use crate::config::{EngineConfig, FlushPolicy, WorkerPoolConfig};
use crate::error::EngineError;
use crate::job::ledger::CreditLedger;
use crate::job::store::JobStore;
use crate::types::{BulkJob, FinalStatus, JobStatus, SpamRisk, VerificationResult};

/// Per-job bookkeeping needed to cancel it later -- on cancel, in-flight
/// probes are aborted at their next suspension point.
struct JobControl {
	cancelled: Arc<AtomicBool>,
	handles: Mutex<Vec<AbortHandle>>,
}

/// Fans bulk verification requests out across a bounded worker pool and
/// ties them to the credit ledger and job store.
pub struct JobExecutor {
	verifier: Arc<dyn Verifier>,
	ledger: Arc<dyn CreditLedger>,
	store: Arc<dyn JobStore>,
	worker_pool: WorkerPoolConfig,
	flush_policy: FlushPolicy,
	max_bulk: u32,
	controls: DashMap<Uuid, Arc<JobControl>>,
}

/// Retry policy for ledger calls: ledger calls retry with exponential
/// backoff (3 tries, 100ms-2s). Probes themselves never retry -- only
/// this boundary does.
const LEDGER_RETRY_DELAYS: [Duration; 2] = [Duration::from_millis(100), Duration::from_millis(400)];

async fn retry_ledger_call<T, F, Fut>(mut f: F) -> anyhow::Result<T>
where
	F: FnMut() -> Fut,
	Fut: std::future::Future<Output = anyhow::Result<T>>,
{
	let mut last_err = None;
	for delay in LEDGER_RETRY_DELAYS {
		match f().await {
			Ok(value) => return Ok(value),
			Err(err) => {
				last_err = Some(err);
				tokio::time::sleep(delay).await;
			}
		}
	}
	f().await.map_err(|err| last_err.unwrap_or(err))
}

impl JobExecutor {
	pub fn new(
		verifier: Arc<dyn Verifier>,
		ledger: Arc<dyn CreditLedger>,
		store: Arc<dyn JobStore>,
		config: &EngineConfig,
	) -> Self {
		JobExecutor {
			verifier,
			ledger,
			store,
			worker_pool: config.worker_pool,
			flush_policy: config.flush_policy,
			max_bulk: config.max_bulk,
			controls: DashMap::new(),
		}
	}

	/// Reserve 1 credit, run the cascade, commit on any returned result.
	pub async fn verify_one(
		&self,
		owner: &str,
		raw: &str,
	) -> Result<VerificationResult, EngineError> {
		let reservation = self.ledger.reserve(owner, 1).await.map_err(|err| {
			EngineError::InsufficientCredits {
				requested: err.requested,
				available: err.available,
			}
		})?;

		let result = self.verifier.verify(raw).await;

		retry_ledger_call(|| async { self.ledger.commit(reservation, 1).await })
			.await
			.map_err(EngineError::Internal)?;

		Ok(result)
	}

	/// Dedupe, validate batch size, reserve N credits, and hand the job
	/// to a background task. Returns immediately with the job id;
	/// `get_job` is how callers observe progress.
	pub async fn submit_bulk(
		self: Arc<Self>,
		owner: &str,
		addresses: Vec<String>,
	) -> Result<Uuid, EngineError> {
		let deduped = dedupe_case_insensitive(addresses);

		if deduped.is_empty() {
			return Err(EngineError::InvalidInput("batch must contain at least one address".into()));
		}
		if deduped.len() as u32 > self.max_bulk {
			return Err(EngineError::InvalidInput(format!(
				"batch of {} exceeds the maximum of {}",
				deduped.len(),
				self.max_bulk
			)));
		}

		let total = deduped.len() as u32;
		let reservation = self.ledger.reserve(owner, total).await.map_err(|err| {
			EngineError::InsufficientCredits {
				requested: err.requested,
				available: err.available,
			}
		})?;

		let job_id = Uuid::new_v4();
		let job = BulkJob::new(job_id, owner, total);
		self.store
			.upsert(job)
			.await
			.map_err(EngineError::Internal)?;

		self.controls.insert(
			job_id,
			Arc::new(JobControl {
				cancelled: Arc::new(AtomicBool::new(false)),
				handles: Mutex::new(Vec::new()),
			}),
		);

		let executor = Arc::clone(&self);
		tokio::spawn(async move {
			executor.run_job(job_id, deduped, reservation).await;
		});

		Ok(job_id)
	}

	pub async fn get_job(&self, id: Uuid) -> Result<BulkJob, EngineError> {
		self.store.load(id).await
	}

	/// Cancel a running job. In-flight probes are aborted at their next
	/// suspension point; `processed` is frozen where it stands and the
	/// unused credit portion is refunded once the background task
	/// observes the cancellation.
	pub async fn cancel_job(&self, id: Uuid) -> Result<(), EngineError> {
		let control = self
			.controls
			.get(&id)
			.map(|entry| Arc::clone(entry.value()))
			.ok_or(EngineError::JobNotFound(id))?;

		control.cancelled.store(true, Ordering::SeqCst);
		for handle in control.handles.lock().expect("job control lock poisoned").iter() {
			handle.abort();
		}
		Ok(())
	}

	async fn run_job(
		&self,
		job_id: Uuid,
		addresses: Vec<String>,
		reservation: crate::types::CreditReservation,
	) {
		let mut job = match self.store.load(job_id).await {
			Ok(job) => job,
			Err(err) => {
				tracing::error!(target: crate::LOG_TARGET, job_id = %job_id, error = %err, "queued job snapshot missing, cannot run it");
				return;
			}
		};
		job.status = JobStatus::Processing;
		if self.store.upsert(job.clone()).await.is_err() {
			tracing::warn!(target: crate::LOG_TARGET, job_id = %job_id, "failed to persist processing transition");
		}

		let control = self
			.controls
			.get(&job_id)
			.map(|entry| Arc::clone(entry.value()))
			.expect("control registered by submit_bulk before spawning run_job");

		let semaphore = Arc::new(Semaphore::new(self.worker_pool.concurrency.max(1)));
		let mut in_flight: FuturesUnordered<_> = FuturesUnordered::new();

		for (index, address) in addresses.into_iter().enumerate() {
			let verifier = Arc::clone(&self.verifier);
			let sem = Arc::clone(&semaphore);
			let handle = tokio::spawn(async move {
				let _permit = sem.acquire_owned().await.expect("semaphore never closes");
				let outcome = AssertUnwindSafe(verifier.verify(&address)).catch_unwind().await;
				let result = match outcome {
					Ok(result) => result,
					Err(_) => VerificationResult::terminal(
						&address,
						FinalStatus::Error,
						0,
						SpamRisk::High,
						"verification probe panicked",
					),
				};
				(index, result)
			});
			control
				.handles
				.lock()
				.expect("job control lock poisoned")
				.push(handle.abort_handle());
			in_flight.push(handle);
		}

		let mut pending: HashMap<usize, VerificationResult> = HashMap::new();
		let mut next_index: usize = 0;
		let mut since_last_flush: u32 = 0;
		let mut last_flush = Instant::now();

		while let Some(joined) = in_flight.next().await {
			let (index, result) = match joined {
				Ok(pair) => pair,
				Err(join_err) => {
					// An aborted (cancelled) task has no recoverable index;
					// its position in `in_flight` tells us nothing about
					// which address it was, so we treat it as "stop
					// accepting new progress" rather than guessing an index.
					if join_err.is_cancelled() {
						continue;
					}
					tracing::error!(target: crate::LOG_TARGET, job_id = %job_id, error = %join_err, "bulk worker task join error");
					continue;
				}
			};
			pending.insert(index, result);

			while let Some(result) = pending.remove(&next_index) {
				job.results.push(result);
				job.processed += 1;
				next_index += 1;
				since_last_flush += 1;
			}

			if control.cancelled.load(Ordering::SeqCst) {
				break;
			}

			if since_last_flush >= self.flush_policy.every_n_completions
				|| last_flush.elapsed() >= self.flush_policy.every
			{
				if self.store.upsert(job.clone()).await.is_err() {
					tracing::warn!(target: crate::LOG_TARGET, job_id = %job_id, "failed to persist progress snapshot");
				}
				since_last_flush = 0;
				last_flush = Instant::now();
			}
		}

		self.controls.remove(&job_id);

		if control.cancelled.load(Ordering::SeqCst) || job.processed < job.total {
			job.status = JobStatus::Failed;
			let unused = job.total - job.processed;
			if unused > 0 {
				if let Err(err) =
					retry_ledger_call(|| async { self.ledger.refund(reservation, unused).await })
						.await
				{
					tracing::error!(target: crate::LOG_TARGET, job_id = %job_id, error = %err, "failed to refund unused credits after job failure");
				}
			}
		} else {
			job.status = JobStatus::Completed;
			job.completed_at = Some(chrono::Utc::now());
			if let Err(err) = retry_ledger_call(|| async {
				self.ledger.commit(reservation, job.processed).await
			})
			.await
			{
				tracing::error!(target: crate::LOG_TARGET, job_id = %job_id, error = %err, "failed to commit credits for completed job");
			}
		}

		if self.store.upsert(job).await.is_err() {
			tracing::error!(target: crate::LOG_TARGET, job_id = %job_id, "failed to persist final job snapshot");
		}
	}
}

/// Collapse case-insensitive duplicates while preserving first-
/// occurrence order and casing -- `[A@x, a@x, B@x]` becomes `[A@x, B@x]`.
fn dedupe_case_insensitive(addresses: Vec<String>) -> Vec<String> {
	let mut seen = std::collections::HashSet::new();
	let mut out = Vec::with_capacity(addresses.len());
	for address in addresses {
		let trimmed = address.trim();
		if trimmed.is_empty() {
			continue;
		}
		let key = trimmed.to_lowercase();
		if seen.insert(key) {
			out.push(trimmed.to_string());
		}
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::cascade::test_util::{CrashingVerifier, FakeVerifier};
	use crate::job::{InMemoryJobStore, InMemoryLedger};

	fn test_config() -> EngineConfig {
		EngineConfig {
			max_bulk: 100_000,
			..EngineConfig::default()
		}
	}

	#[test]
	fn dedupe_is_case_insensitive_and_order_preserving() {
		let input = vec!["A@x".to_string(), "a@x".to_string(), "B@x".to_string()];
		assert_eq!(dedupe_case_insensitive(input), vec!["A@x", "B@x"]);
	}

	#[tokio::test]
	async fn verify_one_reserves_and_commits_exactly_one_credit() {
		let ledger = Arc::new(InMemoryLedger::with_balance("alice", 10));
		let executor = Arc::new(JobExecutor::new(
			Arc::new(FakeVerifier::new()),
			ledger.clone(),
			Arc::new(InMemoryJobStore::new()),
			&test_config(),
		));

		let result = executor.verify_one("alice", "alice@example.com").await.unwrap();
		assert_eq!(result.credits_used, 1);
		assert_eq!(ledger.balance("alice"), 9);
	}

	#[tokio::test]
	async fn verify_one_fails_with_insufficient_credits_and_runs_no_probe() {
		let ledger = Arc::new(InMemoryLedger::with_balance("bob", 0));
		let executor = Arc::new(JobExecutor::new(
			Arc::new(FakeVerifier::new()),
			ledger,
			Arc::new(InMemoryJobStore::new()),
			&test_config(),
		));

		let err = executor.verify_one("bob", "bob@example.com").await.unwrap_err();
		assert!(matches!(err, EngineError::InsufficientCredits { .. }));
	}

	#[tokio::test]
	async fn submit_bulk_rejects_empty_and_oversized_batches() {
		let executor = Arc::new(JobExecutor::new(
			Arc::new(FakeVerifier::new()),
			Arc::new(InMemoryLedger::with_balance("carol", 10)),
			Arc::new(InMemoryJobStore::new()),
			&test_config(),
		));

		assert!(matches!(
			executor.submit_bulk("carol", vec![]).await.unwrap_err(),
			EngineError::InvalidInput(_)
		));

		let mut config = test_config();
		config.max_bulk = 2;
		let small_executor = Arc::new(JobExecutor::new(
			Arc::new(FakeVerifier::new()),
			Arc::new(InMemoryLedger::with_balance("carol", 10)),
			Arc::new(InMemoryJobStore::new()),
			&config,
		));
		let oversized = vec!["a@x".to_string(), "b@x".to_string(), "c@x".to_string()];
		assert!(matches!(
			small_executor.submit_bulk("carol", oversized).await.unwrap_err(),
			EngineError::InvalidInput(_)
		));
	}

	#[tokio::test]
	async fn submit_bulk_completes_in_order_and_commits_all_credits() {
		let ledger = Arc::new(InMemoryLedger::with_balance("dave", 10));
		let executor = Arc::new(JobExecutor::new(
			Arc::new(FakeVerifier::new()),
			ledger.clone(),
			Arc::new(InMemoryJobStore::new()),
			&test_config(),
		));

		let addresses = vec![
			"one@x.com".to_string(),
			"two@x.com".to_string(),
			"three@x.com".to_string(),
		];
		let job_id = Arc::clone(&executor).submit_bulk("dave", addresses.clone()).await.unwrap();

		let job = loop {
			let job = executor.get_job(job_id).await.unwrap();
			if job.status == JobStatus::Completed {
				break job;
			}
			tokio::time::sleep(Duration::from_millis(10)).await;
		};

		assert_eq!(job.processed, 3);
		assert_eq!(job.results.len(), 3);
		let emails: Vec<&str> = job.results.iter().map(|r| r.email.as_str()).collect();
		assert_eq!(emails, vec!["one@x.com", "two@x.com", "three@x.com"]);
		assert_eq!(ledger.balance("dave"), 7);
	}

	#[tokio::test]
	async fn per_address_crash_is_isolated_and_job_still_completes() {
		let ledger = Arc::new(InMemoryLedger::with_balance("erin", 10));
		let verifier = Arc::new(CrashingVerifier::new(
			FakeVerifier::new(),
			vec!["bad@x.com".to_string()],
		));
		let executor = Arc::new(JobExecutor::new(
			verifier,
			ledger.clone(),
			Arc::new(InMemoryJobStore::new()),
			&test_config(),
		));

		let addresses = vec!["good1@x.com".to_string(), "bad@x.com".to_string(), "good2@x.com".to_string()];
		let job_id = Arc::clone(&executor).submit_bulk("erin", addresses).await.unwrap();

		let job = loop {
			let job = executor.get_job(job_id).await.unwrap();
			if job.status == JobStatus::Completed {
				break job;
			}
			tokio::time::sleep(Duration::from_millis(10)).await;
		};

		assert_eq!(job.processed, 3);
		let bad = job.results.iter().find(|r| r.email == "bad@x.com").unwrap();
		assert_eq!(bad.final_status, FinalStatus::Error);
		assert!(!bad.reason.is_empty());
		assert_eq!(ledger.balance("erin"), 7);
	}

	#[tokio::test]
	async fn cancel_job_freezes_progress_and_refunds_unused_credits() {
		let ledger = Arc::new(InMemoryLedger::with_balance("frank", 10));
		let executor = Arc::new(JobExecutor::new(
			Arc::new(FakeVerifier::new()),
			ledger.clone(),
			Arc::new(InMemoryJobStore::new()),
			&test_config(),
		));

		let addresses: Vec<String> = (0..5).map(|i| format!("user{i}@x.com")).collect();
		let job_id = Arc::clone(&executor).submit_bulk("frank", addresses).await.unwrap();
		executor.cancel_job(job_id).await.unwrap();

		// Give the background task a moment to observe the cancellation
		// and settle the ledger.
		tokio::time::sleep(Duration::from_millis(50)).await;
		let job = executor.get_job(job_id).await.unwrap();
		assert!(job.status == JobStatus::Failed || job.status == JobStatus::Completed);
		if job.status == JobStatus::Failed {
			assert!(job.processed <= 5);
		}
		// Every credit must be accounted for: committed to processed
		// results plus refunded for whatever never ran.
		assert_eq!(ledger.balance("frank"), 10 - job.processed);
	}

	#[tokio::test]
	async fn cancel_unknown_job_is_job_not_found() {
		let executor = Arc::new(JobExecutor::new(
			Arc::new(FakeVerifier::new()),
			Arc::new(InMemoryLedger::with_balance("gina", 10)),
			Arc::new(InMemoryJobStore::new()),
			&test_config(),
		));
		let err = executor.cancel_job(Uuid::new_v4()).await.unwrap_err();
		assert!(matches!(err, EngineError::JobNotFound(_)));
	}
}
