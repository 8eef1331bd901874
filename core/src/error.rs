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

//! The error taxonomy exposed at the engine boundary. Probe-level
//! errors never bubble up as an `EngineError` -- they are absorbed into a
//! `VerificationResult` with `final_status: Error` instead. Only input
//! errors, ledger/store failures, and unknown job ids reach the caller.

use uuid::Uuid;

/// Errors surfaced by [`crate::VerificationEngine`] to its caller.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
	/// Malformed address, empty or oversized batch.
	#[error("invalid input: {0}")]
	InvalidInput(String),
	/// The owner does not have enough credits reserved for this request.
	#[error("insufficient credits: requested {requested}, available {available}")]
	InsufficientCredits { requested: u32, available: u32 },
	/// No job exists with this id.
	#[error("job not found: {0}")]
	JobNotFound(Uuid),
	/// Cache corruption, ledger unreachable after retries, job-store
	/// failure: anything that isn't a valid outcome of the cascade.
	#[error("internal error: {0}")]
	Internal(#[from] anyhow::Error),
}

impl EngineError {
	/// A stable, lowercase tag for this error kind, useful for an API layer
	/// mapping to HTTP status codes (400 / 402 / 404 / 500) without
	/// depending on the `Display` message.
	pub fn kind(&self) -> &'static str {
		match self {
			EngineError::InvalidInput(_) => "invalid_input",
			EngineError::InsufficientCredits { .. } => "insufficient_credits",
			EngineError::JobNotFound(_) => "job_not_found",
			EngineError::Internal(_) => "internal",
		}
	}
}
