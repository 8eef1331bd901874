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

//! Credit ledger interface: a two-phase debit -- `reserve` holds
//! credits, `commit` finalizes the amount actually used, `refund`
//! releases the unused remainder. Grounded on the original's
//! `credit_manager.py::CreditManager` (balance tracking, `deduct_credits`,
//! `InsufficientCreditsError`), translated from a database-backed
//! singleton into an explicit trait boundary dependency.
//!
//! `commit`/`refund` are idempotent given the reservation token --
//! committing or refunding an already-settled reservation token is a
//! no-op, mirroring the `async_trait`-based trait-object pattern
//! `KumoCorp-kumomta`'s `spool::Spool` uses for its storage boundary
//! (`crates/spool/src/lib.rs`).

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::types::CreditReservation;

#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("insufficient credits: requested {requested}, available {available}")]
pub struct InsufficientCreditsError {
	pub requested: u32,
	pub available: u32,
}

/// Two-phase credit debit against an external balance store.
#[async_trait]
pub trait CreditLedger: Send + Sync {
	/// Hold `amount` credits for `owner`. Fails with
	/// [`InsufficientCreditsError`] if the owner's balance can't cover it;
	/// no work is ever performed on an unreserved credit.
	async fn reserve(
		&self,
		owner: &str,
		amount: u32,
	) -> Result<CreditReservation, InsufficientCreditsError>;

	/// Finalize a reservation, debiting exactly `used` credits and
	/// releasing the rest back to the owner's balance. A no-op if this
	/// token has already been settled.
	async fn commit(&self, reservation: CreditReservation, used: u32) -> anyhow::Result<()>;

	/// Release `unused` credits back to the owner without debiting them.
	/// A no-op if this token has already been settled.
	async fn refund(&self, reservation: CreditReservation, unused: u32) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settlement {
	Pending,
	Settled,
}

struct LedgerState {
	balances: HashMap<String, u32>,
	reservations: HashMap<Uuid, (String, u32, Settlement)>,
}

/// In-memory [`CreditLedger`], grounded on `credit_manager.py`'s balance
/// map (the original starts a never-before-seen user at 142500 credits
/// for demo purposes; this keeps that same "lazily materialize an owner"
/// behavior via [`InMemoryLedger::with_balance`] / a configurable
/// default). Suitable for tests and for the `cli` crate, which has no
/// external billing system to call into.
pub struct InMemoryLedger {
	state: Mutex<LedgerState>,
	default_balance: u32,
}

impl InMemoryLedger {
	pub fn new(default_balance: u32) -> Self {
		InMemoryLedger {
			state: Mutex::new(LedgerState {
				balances: HashMap::new(),
				reservations: HashMap::new(),
			}),
			default_balance,
		}
	}

	pub fn with_balance(owner: impl Into<String>, amount: u32) -> Self {
		let ledger = InMemoryLedger::new(amount);
		ledger
			.state
			.lock()
			.expect("ledger lock poisoned")
			.balances
			.insert(owner.into(), amount);
		ledger
	}

	pub fn balance(&self, owner: &str) -> u32 {
		let state = self.state.lock().expect("ledger lock poisoned");
		*state.balances.get(owner).unwrap_or(&self.default_balance)
	}
}

#[async_trait]
impl CreditLedger for InMemoryLedger {
	async fn reserve(
		&self,
		owner: &str,
		amount: u32,
	) -> Result<CreditReservation, InsufficientCreditsError> {
		let mut state = self.state.lock().expect("ledger lock poisoned");
		let default_balance = self.default_balance;
		let balance = state
			.balances
			.entry(owner.to_string())
			.or_insert(default_balance);

		if *balance < amount {
			return Err(InsufficientCreditsError {
				requested: amount,
				available: *balance,
			});
		}

		*balance -= amount;
		let token = Uuid::new_v4();
		state
			.reservations
			.insert(token, (owner.to_string(), amount, Settlement::Pending));

		Ok(CreditReservation { token, amount })
	}

	async fn commit(&self, reservation: CreditReservation, used: u32) -> anyhow::Result<()> {
		let mut state = self.state.lock().expect("ledger lock poisoned");
		let Some((owner, amount, settlement)) = state.reservations.get_mut(&reservation.token)
		else {
			anyhow::bail!("unknown credit reservation token");
		};
		if *settlement == Settlement::Settled {
			return Ok(());
		}

		let unused = amount.saturating_sub(used);
		if unused > 0 {
			let owner = owner.clone();
			*state.balances.entry(owner).or_insert(0) += unused;
		}
		if let Some(entry) = state.reservations.get_mut(&reservation.token) {
			entry.2 = Settlement::Settled;
		}
		Ok(())
	}

	async fn refund(&self, reservation: CreditReservation, unused: u32) -> anyhow::Result<()> {
		let mut state = self.state.lock().expect("ledger lock poisoned");
		let Some((owner, _amount, settlement)) = state.reservations.get_mut(&reservation.token)
		else {
			anyhow::bail!("unknown credit reservation token");
		};
		if *settlement == Settlement::Settled {
			return Ok(());
		}

		if unused > 0 {
			let owner = owner.clone();
			*state.balances.entry(owner).or_insert(0) += unused;
		}
		if let Some(entry) = state.reservations.get_mut(&reservation.token) {
			entry.2 = Settlement::Settled;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn reserve_then_commit_debits_exactly_used() {
		let ledger = InMemoryLedger::with_balance("alice", 100);
		let reservation = ledger.reserve("alice", 10).await.unwrap();
		assert_eq!(ledger.balance("alice"), 90);

		ledger.commit(reservation, 7).await.unwrap();
		// 3 unused credits returned to the balance.
		assert_eq!(ledger.balance("alice"), 93);
	}

	#[tokio::test]
	async fn refund_returns_all_unused_credits() {
		let ledger = InMemoryLedger::with_balance("bob", 50);
		let reservation = ledger.reserve("bob", 20).await.unwrap();
		assert_eq!(ledger.balance("bob"), 30);

		ledger.refund(reservation, 20).await.unwrap();
		assert_eq!(ledger.balance("bob"), 50);
	}

	#[tokio::test]
	async fn reserve_fails_when_balance_insufficient() {
		let ledger = InMemoryLedger::with_balance("carol", 5);
		let err = ledger.reserve("carol", 6).await.unwrap_err();
		assert_eq!(err.requested, 6);
		assert_eq!(err.available, 5);
		// No credits were held.
		assert_eq!(ledger.balance("carol"), 5);
	}

	#[tokio::test]
	async fn commit_is_idempotent_on_an_already_settled_token() {
		let ledger = InMemoryLedger::with_balance("dave", 100);
		let reservation = ledger.reserve("dave", 10).await.unwrap();
		ledger.commit(reservation, 10).await.unwrap();
		assert_eq!(ledger.balance("dave"), 90);

		// Committing again must not double-debit or double-refund.
		ledger.commit(reservation, 0).await.unwrap();
		assert_eq!(ledger.balance("dave"), 90);
	}

	#[tokio::test]
	async fn refund_after_commit_is_a_no_op() {
		let ledger = InMemoryLedger::with_balance("erin", 100);
		let reservation = ledger.reserve("erin", 10).await.unwrap();
		ledger.commit(reservation, 4).await.unwrap();
		assert_eq!(ledger.balance("erin"), 96);

		ledger.refund(reservation, 6).await.unwrap();
		assert_eq!(ledger.balance("erin"), 96);
	}
}
