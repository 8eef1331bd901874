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

//! Job store interface: durability for [`BulkJob`] snapshots. Grounded
//! on the original's `tasks.py`/`models.py` `BulkJob` persistence shape
//! (`db.query(BulkJob)...`, `job.processed_count = ...; db.commit()`),
//! abstracted behind a trait so the executor never depends on a
//! concrete database.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::EngineError;
use crate::types::BulkJob;

/// An optional filter for [`JobStore::list`]; `None` matches every
/// status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobFilter {
	pub status: Option<crate::types::JobStatus>,
}

#[async_trait]
pub trait JobStore: Send + Sync {
	/// Insert or fully replace the stored snapshot for `job.id`.
	async fn upsert(&self, job: BulkJob) -> anyhow::Result<()>;

	/// Load the current snapshot for `id`, or [`EngineError::JobNotFound`]
	/// if no such job was ever upserted.
	async fn load(&self, id: Uuid) -> Result<BulkJob, EngineError>;

	/// List every job belonging to `owner` matching `filter`, most
	/// recently created first.
	async fn list(&self, owner: &str, filter: JobFilter) -> anyhow::Result<Vec<BulkJob>>;
}

/// In-memory [`JobStore`], suitable for tests and for the `cli` crate.
pub struct InMemoryJobStore {
	jobs: RwLock<HashMap<Uuid, BulkJob>>,
}

impl InMemoryJobStore {
	pub fn new() -> Self {
		InMemoryJobStore {
			jobs: RwLock::new(HashMap::new()),
		}
	}
}

impl Default for InMemoryJobStore {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl JobStore for InMemoryJobStore {
	async fn upsert(&self, job: BulkJob) -> anyhow::Result<()> {
		self.jobs
			.write()
			.expect("job store lock poisoned")
			.insert(job.id, job);
		Ok(())
	}

	async fn load(&self, id: Uuid) -> Result<BulkJob, EngineError> {
		self.jobs
			.read()
			.expect("job store lock poisoned")
			.get(&id)
			.cloned()
			.ok_or(EngineError::JobNotFound(id))
	}

	async fn list(&self, owner: &str, filter: JobFilter) -> anyhow::Result<Vec<BulkJob>> {
		let jobs = self.jobs.read().expect("job store lock poisoned");
		let mut matched: Vec<BulkJob> = jobs
			.values()
			.filter(|job| job.owner_id == owner)
			.filter(|job| filter.status.map(|s| s == job.status).unwrap_or(true))
			.cloned()
			.collect();
		matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
		Ok(matched)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::JobStatus;

	#[tokio::test]
	async fn upsert_then_load_roundtrips() {
		let store = InMemoryJobStore::new();
		let job = BulkJob::new(Uuid::new_v4(), "alice", 3);
		let id = job.id;
		store.upsert(job).await.unwrap();

		let loaded = store.load(id).await.unwrap();
		assert_eq!(loaded.id, id);
		assert_eq!(loaded.total, 3);
	}

	#[tokio::test]
	async fn load_unknown_job_is_not_found() {
		let store = InMemoryJobStore::new();
		let err = store.load(Uuid::new_v4()).await.unwrap_err();
		assert!(matches!(err, EngineError::JobNotFound(_)));
	}

	#[tokio::test]
	async fn list_filters_by_owner_and_status() {
		let store = InMemoryJobStore::new();
		let mut queued = BulkJob::new(Uuid::new_v4(), "alice", 1);
		queued.status = JobStatus::Queued;
		let mut completed = BulkJob::new(Uuid::new_v4(), "alice", 1);
		completed.status = JobStatus::Completed;
		let mut others = BulkJob::new(Uuid::new_v4(), "bob", 1);
		others.status = JobStatus::Queued;

		store.upsert(queued).await.unwrap();
		store.upsert(completed).await.unwrap();
		store.upsert(others).await.unwrap();

		let alice_completed = store
			.list(
				"alice",
				JobFilter {
					status: Some(JobStatus::Completed),
				},
			)
			.await
			.unwrap();
		assert_eq!(alice_completed.len(), 1);
		assert_eq!(alice_completed[0].status, JobStatus::Completed);

		let alice_all = store.list("alice", JobFilter { status: None }).await.unwrap();
		assert_eq!(alice_all.len(), 2);
	}
}
