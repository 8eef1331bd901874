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

//! Core data types shared by every probe and by the job executor.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An email address, split and normalized once at parse time. Immutable
/// after construction: every downstream probe reads `local` and `domain`
/// from here instead of re-splitting the original string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address {
	/// The address exactly as the caller supplied it, whitespace trimmed.
	pub original: String,
	/// Lowercased `local@domain`, used for comparisons and deduplication.
	pub normalized: String,
	/// Local part, lowercased.
	pub local: String,
	/// Domain part, lowercased.
	pub domain: String,
}

/// Outcome of the syntax check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyntaxStatus {
	Valid,
	Invalid,
}

/// Outcome of the A-record lookup on the domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainStatus {
	Valid,
	Invalid,
}

/// Outcome of the MX lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MxStatus {
	Found,
	NotFound,
}

/// One MX record, ordered by preference ascending (lowest = primary).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MxRecord {
	pub preference: u16,
	pub exchange: String,
}

/// Outcome of the SMTP conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmtpStatus {
	/// 250 on RCPT TO: the mailbox accepted the address.
	Responsive,
	/// 550/551/553 on RCPT TO: the mailbox definitively does not exist.
	Rejected,
	/// Connect failure, timeout, TLS failure, or other 4xx: inconclusive.
	Unreachable,
	/// There was no MX record to connect to in the first place.
	NoMx,
}

/// The closed set of provider tags the domain classifier can assign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderTag {
	Microsoft365,
	GoogleWorkspace,
	Titan,
	Zoho,
	Protonmail,
	Yahoo,
	Generic,
	ConsumerMicrosoft,
	ConsumerGoogle,
}

impl ProviderTag {
	/// Provider probes only exist for Microsoft and Google tenants; every
	/// other tag falls back to the generic SMTP cascade.
	pub fn has_http_probe(self) -> bool {
		matches!(
			self,
			ProviderTag::Microsoft365
				| ProviderTag::ConsumerMicrosoft
				| ProviderTag::GoogleWorkspace
				| ProviderTag::ConsumerGoogle
		)
	}

	pub fn is_microsoft(self) -> bool {
		matches!(self, ProviderTag::Microsoft365 | ProviderTag::ConsumerMicrosoft)
	}

	pub fn is_google(self) -> bool {
		matches!(self, ProviderTag::GoogleWorkspace | ProviderTag::ConsumerGoogle)
	}
}

/// Tri-state catch-all verdict: a domain may never have been probed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatchAllStatus {
	True,
	False,
	Unknown,
}

/// Spam-risk bucket derived from the safety score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpamRisk {
	Low,
	Medium,
	High,
}

/// The final verdict assigned by the decision engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalStatus {
	ValidSafe,
	ValidRisky,
	Risky,
	InvalidSyntax,
	InvalidDomain,
	NoMx,
	Invalid,
	Disposable,
	Error,
}

/// One verification verdict. All fields are always present (unknown-valued
/// where applicable) so that a consumer never has to branch on absence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
	pub email: String,
	pub syntax: SyntaxStatus,
	pub domain: DomainStatus,
	pub mx: MxStatus,
	pub mx_records: Vec<MxRecord>,
	pub smtp: SmtpStatus,
	pub smtp_provider: Option<String>,
	pub catch_all: bool,
	pub disposable: bool,
	pub role_based: bool,
	pub is_o365: bool,
	pub spam_risk: SpamRisk,
	pub final_status: FinalStatus,
	pub safety_score: u8,
	pub reason: String,
	pub details: HashMap<String, serde_json::Value>,
	pub timestamp: DateTime<Utc>,
	pub credits_used: u32,
}

impl VerificationResult {
	/// Build a result that short-circuits the cascade at a given stage.
	/// Every field downstream of the short-circuit point is filled with
	/// its "never reached" default so the struct stays total.
	pub(crate) fn terminal(
		email: &str,
		final_status: FinalStatus,
		safety_score: u8,
		spam_risk: SpamRisk,
		reason: impl Into<String>,
	) -> Self {
		VerificationResult {
			email: email.to_string(),
			syntax: SyntaxStatus::Valid,
			domain: DomainStatus::Valid,
			mx: MxStatus::NotFound,
			mx_records: Vec::new(),
			smtp: SmtpStatus::NoMx,
			smtp_provider: None,
			catch_all: false,
			disposable: false,
			role_based: false,
			is_o365: false,
			spam_risk,
			final_status,
			safety_score,
			reason: reason.into(),
			details: HashMap::new(),
			timestamp: Utc::now(),
			credits_used: 1,
		}
	}
}

/// Status of a bulk verification job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
	Queued,
	Processing,
	Completed,
	Failed,
}

/// A long-running bulk verification job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkJob {
	pub id: Uuid,
	pub owner_id: String,
	pub status: JobStatus,
	pub total: u32,
	pub processed: u32,
	pub results: Vec<VerificationResult>,
	pub created_at: DateTime<Utc>,
	pub completed_at: Option<DateTime<Utc>>,
}

impl BulkJob {
	pub fn new(id: Uuid, owner_id: impl Into<String>, total: u32) -> Self {
		BulkJob {
			id,
			owner_id: owner_id.into(),
			status: JobStatus::Queued,
			total,
			processed: 0,
			results: Vec::with_capacity(total as usize),
			created_at: Utc::now(),
			completed_at: None,
		}
	}
}

/// An opaque credit reservation token. `owner` and `amount` are kept so an
/// `InMemoryLedger` can validate idempotent settlement without a side
/// table; a real ledger backend would treat this as an opaque id.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CreditReservation {
	pub token: Uuid,
	pub amount: u32,
}

/// Per-operation probe budgets: default total budget per address 30s;
/// default per-operation budgets of DNS 5s, HTTP probe 10s, SMTP 15s.
#[derive(Debug, Clone, Copy)]
pub struct ProbeBudgets {
	pub total: Duration,
	pub dns: Duration,
	pub http: Duration,
	pub smtp: Duration,
}

impl Default for ProbeBudgets {
	fn default() -> Self {
		ProbeBudgets {
			total: Duration::from_secs(30),
			dns: Duration::from_secs(5),
			http: Duration::from_secs(10),
			smtp: Duration::from_secs(15),
		}
	}
}
