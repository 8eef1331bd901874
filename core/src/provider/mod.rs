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

//! Provider-specific HTTP probes: non-SMTP signals that
//! observably distinguish existing from nonexistent mailboxes on
//! Microsoft and Google tenants. Both probes have a short timeout and
//! must never throw to the caller -- an inconclusive or errored probe
//! returns [`ProviderVerdict::unknown`] so the cascade falls back to
//! SMTP.

pub mod google;
pub mod microsoft;

use crate::types::Address;

/// Outcome of a provider-specific probe.
#[derive(Debug, Clone)]
pub struct ProviderVerdict {
	/// `Some(true)`/`Some(false)` when the probe gave a conclusive
	/// existence signal; `None` when it didn't (network error, ambiguous
	/// response).
	pub exists: Option<bool>,
	/// Whether this probe also established the domain's catch-all status.
	/// Only meaningful together with `catch_all` below.
	pub catch_all_observed: bool,
	pub catch_all: bool,
	/// Whether this probe confirmed the domain is a Microsoft 365 tenant,
	/// tagging the domain `is_o365=true`.
	pub is_o365: bool,
	pub method: &'static str,
	pub details: String,
}

impl ProviderVerdict {
	pub fn unknown(method: &'static str, details: impl Into<String>) -> Self {
		ProviderVerdict {
			exists: None,
			catch_all_observed: false,
			catch_all: false,
			is_o365: false,
			method,
			details: details.into(),
		}
	}
}

/// A 16+ character, cryptographically random lowercase-alphanumeric local
/// part, used by every probe that needs an unguessable address to test
/// catch-all behavior.
pub fn random_local_part() -> String {
	use rand::distributions::Alphanumeric;
	use rand::Rng;

	rand::thread_rng()
		.sample_iter(&Alphanumeric)
		.filter(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
		.take(20)
		.map(char::from)
		.collect()
}

pub(crate) fn random_address_at(domain: &str) -> String {
	format!("{}@{}", random_local_part(), domain)
}

pub(crate) fn address_for_probe(address: &Address) -> String {
	format!("{}@{}", address.local, address.domain)
}
