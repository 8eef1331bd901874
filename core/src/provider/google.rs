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

//! Google Calendar iCal probe. Grounded on `gmail_checker.py`:
//! a HEAD request against the public basic iCal feed for an address. The
//! presence of an `X-Frame-Options` header on a 200 response is the
//! existence signal the original relies on, since Google serves that
//! header only for feeds tied to a real calendar/account.

use std::time::Duration;

use super::{random_address_at, ProviderVerdict};
use crate::types::Address;

fn ical_url(email: &str) -> String {
	format!("https://calendar.google.com/calendar/ical/{email}/public/basic.ics")
}

async fn probe(client: &reqwest::Client, email: &str, timeout: Duration) -> Option<bool> {
	let response = client.head(ical_url(email)).timeout(timeout).send().await.ok()?;

	if response.status() == reqwest::StatusCode::NOT_FOUND {
		return Some(false);
	}
	if !response.status().is_success() {
		return None;
	}
	Some(response.headers().contains_key("x-frame-options"))
}

/// Check whether `address` exists on Google Workspace / consumer Gmail.
/// A second probe with a random local part at the same domain
/// establishes catch-all status for Workspace domains.
pub async fn check_email(
	client: &reqwest::Client,
	address: &Address,
	timeout: Duration,
) -> ProviderVerdict {
	let email = format!("{}@{}", address.local, address.domain);
	let exists = match probe(client, &email, timeout).await {
		Some(result) => result,
		None => return ProviderVerdict::unknown("google_calendar_ical", "probe inconclusive"),
	};

	let junk_email = random_address_at(&address.domain);
	let catch_all = matches!(probe(client, &junk_email, timeout).await, Some(true));

	ProviderVerdict {
		exists: Some(exists),
		catch_all_observed: true,
		catch_all,
		is_o365: false,
		method: "google_calendar_ical",
		details: format!("iCal feed {}", if exists { "present" } else { "absent" }),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn ical_url_embeds_address() {
		let url = ical_url("alice@example.com");
		assert_eq!(
			url,
			"https://calendar.google.com/calendar/ical/alice@example.com/public/basic.ics"
		);
	}
}
