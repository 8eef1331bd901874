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

//! The top-level entry point: wires the probe cascade, the credit ledger,
//! the job store, and the bounded worker pool into the four operations a
//! caller needs -- verify one address, submit a bulk job, read back its
//! progress, and cancel it.

use std::sync::Arc;

use uuid::Uuid;

use crate::cascade::{CascadeDeps, Verifier};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::job::{CreditLedger, InMemoryJobStore, InMemoryLedger, JobExecutor, JobFilter, JobStore};
use crate::types::{BulkJob, VerificationResult};

/// The default per-owner credit balance an in-memory ledger hands out
/// the first time it sees a new owner, mirroring the original's
/// `credit_manager.py` demo seeding -- kept for parity, overridable via
/// [`VerificationEngine::with_ledger`] or [`InMemoryLedger::new`].
pub const DEFAULT_DEMO_BALANCE: u32 = 142_500;

/// Verifies single addresses and orchestrates bulk jobs.
///
/// Holds an `Arc<dyn Verifier>` rather than a concrete [`CascadeDeps`] so
/// that an embedder can substitute a test double; [`VerificationEngine::new`]
/// wires up the real network-backed cascade.
pub struct VerificationEngine {
	executor: Arc<JobExecutor>,
	store: Arc<dyn JobStore>,
}

impl VerificationEngine {
	/// Build an engine backed by the real DNS/SMTP/HTTP cascade, an
	/// in-memory credit ledger, and an in-memory job store.
	pub fn new(config: EngineConfig) -> anyhow::Result<Self> {
		let deps = CascadeDeps::new(&config)?;
		Ok(Self::with_verifier(
			Arc::new(deps),
			Arc::new(InMemoryLedger::new(DEFAULT_DEMO_BALANCE)),
			Arc::new(InMemoryJobStore::new()),
			&config,
		))
	}

	/// Build an engine entirely in memory -- no network, no external
	/// ledger or database. Suitable for the `cli` crate and for tests
	/// that don't need the real cascade.
	pub fn in_memory(config: EngineConfig) -> anyhow::Result<Self> {
		Self::new(config)
	}

	/// Build an engine from explicit, already-constructed dependencies.
	/// This is the seam integration tests and the `cli` crate use to
	/// substitute a [`crate::cascade::test_util::FakeVerifier`] or a
	/// durable ledger/store implementation.
	pub fn with_verifier(
		verifier: Arc<dyn Verifier>,
		ledger: Arc<dyn CreditLedger>,
		store: Arc<dyn JobStore>,
		config: &EngineConfig,
	) -> Self {
		VerificationEngine {
			executor: Arc::new(JobExecutor::new(verifier, ledger, Arc::clone(&store), config)),
			store,
		}
	}

	/// Verify a single address, reserving and committing exactly one
	/// credit.
	pub async fn verify_one(
		&self,
		owner: &str,
		raw: &str,
	) -> Result<VerificationResult, EngineError> {
		self.executor.verify_one(owner, raw).await
	}

	/// Submit a bulk job and return immediately with its id.
	pub async fn submit_bulk(
		&self,
		owner: &str,
		addresses: Vec<String>,
	) -> Result<Uuid, EngineError> {
		Arc::clone(&self.executor).submit_bulk(owner, addresses).await
	}

	/// Read back a job's current snapshot.
	pub async fn get_job(&self, id: Uuid) -> Result<BulkJob, EngineError> {
		self.executor.get_job(id).await
	}

	/// Cancel a running job.
	pub async fn cancel_job(&self, id: Uuid) -> Result<(), EngineError> {
		self.executor.cancel_job(id).await
	}

	/// List every job an owner has ever submitted.
	pub async fn list_jobs(&self, owner: &str, filter: JobFilter) -> anyhow::Result<Vec<BulkJob>> {
		self.store.list(owner, filter).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::cascade::test_util::FakeVerifier;

	#[tokio::test]
	async fn verify_one_and_get_job_round_trip_through_the_engine() {
		let config = EngineConfig::default();
		let engine = VerificationEngine::with_verifier(
			Arc::new(FakeVerifier::new()),
			Arc::new(InMemoryLedger::with_balance("alice", 10)),
			Arc::new(InMemoryJobStore::new()),
			&config,
		);

		let result = engine.verify_one("alice", "alice@example.com").await.unwrap();
		assert_eq!(result.email, "alice@example.com");

		let job_id = engine
			.submit_bulk("alice", vec!["a@x.com".to_string(), "b@x.com".to_string()])
			.await
			.unwrap();

		let job = loop {
			let job = engine.get_job(job_id).await.unwrap();
			if job.status == crate::types::JobStatus::Completed {
				break job;
			}
			tokio::time::sleep(std::time::Duration::from_millis(10)).await;
		};
		assert_eq!(job.processed, 2);

		let jobs = engine
			.list_jobs("alice", JobFilter { status: None })
			.await
			.unwrap();
		assert_eq!(jobs.len(), 1);
	}

	#[tokio::test]
	async fn get_job_on_unknown_id_is_not_found() {
		let config = EngineConfig::default();
		let engine = VerificationEngine::with_verifier(
			Arc::new(FakeVerifier::new()),
			Arc::new(InMemoryLedger::with_balance("bob", 10)),
			Arc::new(InMemoryJobStore::new()),
			&config,
		);
		let err = engine.get_job(Uuid::new_v4()).await.unwrap_err();
		assert!(matches!(err, EngineError::JobNotFound(_)));
	}
}
