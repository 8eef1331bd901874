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

//! Catch-all detection, grounded on the original's `_detect_catch_all`
//! (`catch_all_db.py` + `email_verifier.py`): probe a random, unguessable
//! local part at the same domain over SMTP. If the server accepts it,
//! every address at that domain is "deliverable" and a `Responsive` SMTP
//! verdict on the real address carries no signal.

use std::time::Duration;

use super::prober::check_smtp;
use crate::config::SmtpProbeConfig;
use crate::dns::DnsResolver;
use crate::domain::lists::DomainLists;
use crate::provider::random_address_at;
use crate::types::{CatchAllStatus, MxRecord, SmtpStatus};

/// Determine whether `domain` swallows every address. Falls back to the
/// static allowlist when the probe itself is unreachable, since a domain
/// already known to be catch-all doesn't need re-confirming against a
/// server that happens to be down right now.
pub async fn detect_catch_all(
	mx: &MxRecord,
	domain: &str,
	lists: &DomainLists,
	config: &SmtpProbeConfig,
	resolver: &DnsResolver,
	timeout: Duration,
) -> CatchAllStatus {
	let junk_address = random_address_at(domain);
	let (status, _) = check_smtp(mx, &junk_address, config, resolver, timeout).await;

	match status {
		SmtpStatus::Responsive => CatchAllStatus::True,
		SmtpStatus::Rejected => CatchAllStatus::False,
		SmtpStatus::Unreachable | SmtpStatus::NoMx => {
			if lists.is_known_catch_all(domain) {
				CatchAllStatus::True
			} else {
				CatchAllStatus::Unknown
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::DomainListsConfig;

	#[test]
	fn allowlist_only_consulted_when_probe_is_unreachable() {
		let lists = DomainLists::new(&DomainListsConfig {
			catch_all_allowlist: vec!["example.com".to_string()],
			..Default::default()
		});
		assert!(lists.is_known_catch_all("example.com"));
		assert!(!lists.is_known_catch_all("other.com"));
	}
}
