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

//! End-to-end coverage of the job executor and ledger through
//! [`VerificationEngine`], entirely in memory -- no network in tests.
//! Uses the `test-util` feature's `FakeVerifier`/`CrashingVerifier` so
//! every probe outcome is deterministic.

use std::sync::Arc;
use std::time::Duration;

use verimail::cascade::test_util::{CrashingVerifier, FakeVerifier};
use verimail::job::{InMemoryJobStore, InMemoryLedger};
use verimail::types::{FinalStatus, JobStatus};
use verimail::{EngineConfig, VerificationEngine};

async fn wait_for_terminal(engine: &VerificationEngine, job_id: uuid::Uuid) -> verimail::BulkJob {
	loop {
		let job = engine.get_job(job_id).await.unwrap();
		if matches!(job.status, JobStatus::Completed | JobStatus::Failed) {
			return job;
		}
		tokio::time::sleep(Duration::from_millis(10)).await;
	}
}

#[tokio::test]
async fn a_large_batch_completes_in_submitted_order() {
	let config = EngineConfig::default();
	let ledger = Arc::new(InMemoryLedger::with_balance("owner", 1_000));
	let engine = VerificationEngine::with_verifier(
		Arc::new(FakeVerifier::new()),
		ledger.clone(),
		Arc::new(InMemoryJobStore::new()),
		&config,
	);

	let addresses: Vec<String> = (0..250).map(|i| format!("user{i}@example.com")).collect();
	let job_id = engine.submit_bulk("owner", addresses.clone()).await.unwrap();
	let job = wait_for_terminal(&engine, job_id).await;

	assert_eq!(job.status, JobStatus::Completed);
	assert_eq!(job.processed, 250);
	let emails: Vec<&str> = job.results.iter().map(|r| r.email.as_str()).collect();
	assert_eq!(emails, addresses.iter().map(String::as_str).collect::<Vec<_>>());
	assert_eq!(ledger.balance("owner"), 1_000 - 250);
}

#[tokio::test]
async fn duplicate_addresses_are_billed_once() {
	let config = EngineConfig::default();
	let ledger = Arc::new(InMemoryLedger::with_balance("owner", 10));
	let engine = VerificationEngine::with_verifier(
		Arc::new(FakeVerifier::new()),
		ledger.clone(),
		Arc::new(InMemoryJobStore::new()),
		&config,
	);

	let addresses = vec![
		"Dup@example.com".to_string(),
		"dup@example.com".to_string(),
		"other@example.com".to_string(),
	];
	let job_id = engine.submit_bulk("owner", addresses).await.unwrap();
	let job = wait_for_terminal(&engine, job_id).await;

	assert_eq!(job.total, 2);
	assert_eq!(job.processed, 2);
	assert_eq!(ledger.balance("owner"), 8);
}

#[tokio::test]
async fn a_crashing_worker_does_not_take_down_the_rest_of_the_job() {
	let config = EngineConfig::default();
	let ledger = Arc::new(InMemoryLedger::with_balance("owner", 10));
	let verifier = Arc::new(CrashingVerifier::new(
		FakeVerifier::new(),
		vec!["poison@example.com".to_string()],
	));
	let engine = VerificationEngine::with_verifier(
		verifier,
		ledger.clone(),
		Arc::new(InMemoryJobStore::new()),
		&config,
	);

	let addresses = vec![
		"first@example.com".to_string(),
		"poison@example.com".to_string(),
		"last@example.com".to_string(),
	];
	let job_id = engine.submit_bulk("owner", addresses).await.unwrap();
	let job = wait_for_terminal(&engine, job_id).await;

	assert_eq!(job.status, JobStatus::Completed);
	assert_eq!(job.processed, 3);
	let poisoned = job.results.iter().find(|r| r.email == "poison@example.com").unwrap();
	assert_eq!(poisoned.final_status, FinalStatus::Error);
	assert_eq!(ledger.balance("owner"), 7);
}

#[tokio::test]
async fn submitting_more_addresses_than_the_owner_can_afford_is_rejected_up_front() {
	let config = EngineConfig::default();
	let ledger = Arc::new(InMemoryLedger::with_balance("owner", 2));
	let engine = VerificationEngine::with_verifier(
		Arc::new(FakeVerifier::new()),
		ledger.clone(),
		Arc::new(InMemoryJobStore::new()),
		&config,
	);

	let addresses = vec!["a@x.com".to_string(), "b@x.com".to_string(), "c@x.com".to_string()];
	let err = engine.submit_bulk("owner", addresses).await.unwrap_err();
	assert!(matches!(err, verimail::EngineError::InsufficientCredits { .. }));
	// No credits should have been held by the failed reservation.
	assert_eq!(ledger.balance("owner"), 2);
}

#[tokio::test]
async fn cancelling_a_job_refunds_whatever_never_ran() {
	let config = EngineConfig::default();
	let ledger = Arc::new(InMemoryLedger::with_balance("owner", 20));
	let engine = VerificationEngine::with_verifier(
		Arc::new(FakeVerifier::new()),
		ledger.clone(),
		Arc::new(InMemoryJobStore::new()),
		&config,
	);

	let addresses: Vec<String> = (0..20).map(|i| format!("user{i}@example.com")).collect();
	let job_id = engine.submit_bulk("owner", addresses).await.unwrap();
	engine.cancel_job(job_id).await.unwrap();

	let job = wait_for_terminal(&engine, job_id).await;
	assert_eq!(ledger.balance("owner"), 20 - job.processed);
}
