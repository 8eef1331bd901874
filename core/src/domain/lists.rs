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

//! Static domain lists: disposable domains, role-based local parts, and
//! a known-catch-all allowlist. Reloadable without restart --
//! [`DomainLists::reload`] swaps the extra sets atomically.

use std::collections::HashSet;
use std::sync::RwLock;

use crate::config::DomainListsConfig;

/// Role-based local parts -- mailbox names that address a function, not
/// a person. Grounded on the original's
/// `ROLE_BASED_PREFIXES` (`email_verifier.py`).
const ROLE_BASED_PREFIXES: &[&str] = &[
	"admin",
	"administrator",
	"info",
	"support",
	"sales",
	"contact",
	"help",
	"service",
	"noreply",
	"no-reply",
	"postmaster",
	"webmaster",
	"marketing",
	"billing",
	"abuse",
	"security",
	"privacy",
	"hostmaster",
	"root",
];

struct Lists {
	role_based_extra: HashSet<String>,
	disposable_extra: HashSet<String>,
	catch_all_allowlist: HashSet<String>,
}

/// Disposable domains are checked against the `mailchecker` crate's
/// maintained list first, then against an operator-supplied extra set.
/// Role-based
/// local parts and the catch-all allowlist are entirely
/// configuration-driven plus a small built-in default for the former.
pub struct DomainLists {
	lists: RwLock<Lists>,
}

impl DomainLists {
	pub fn new(config: &DomainListsConfig) -> Self {
		DomainLists {
			lists: RwLock::new(Lists {
				role_based_extra: config.role_based_extra.iter().map(|s| s.to_lowercase()).collect(),
				disposable_extra: config.disposable_extra.iter().map(|s| s.to_lowercase()).collect(),
				catch_all_allowlist: config
					.catch_all_allowlist
					.iter()
					.map(|s| s.to_lowercase())
					.collect(),
			}),
		}
	}

	/// Swap in a fresh configuration without restarting the engine.
	pub fn reload(&self, config: &DomainListsConfig) {
		let mut lists = self.lists.write().expect("domain lists lock poisoned");
		lists.role_based_extra = config.role_based_extra.iter().map(|s| s.to_lowercase()).collect();
		lists.disposable_extra = config.disposable_extra.iter().map(|s| s.to_lowercase()).collect();
		lists.catch_all_allowlist = config
			.catch_all_allowlist
			.iter()
			.map(|s| s.to_lowercase())
			.collect();
	}

	/// Is `domain` a known disposable-email provider?
	pub fn is_disposable(&self, domain: &str) -> bool {
		if !mailchecker::is_valid(&format!("check@{domain}")) {
			// mailchecker::is_valid returns false for disposable/blacklisted
			// domains among other syntax problems; since syntax was already
			// validated upstream, a `false` here at this call site means the
			// domain itself is blacklisted.
			return true;
		}
		let lists = self.lists.read().expect("domain lists lock poisoned");
		lists.disposable_extra.contains(&domain.to_lowercase())
	}

	/// Is `local_part` a role account rather than a person?
	pub fn is_role_based(&self, local_part: &str) -> bool {
		let local_lower = local_part.to_lowercase();
		if ROLE_BASED_PREFIXES.contains(&local_lower.as_str()) {
			return true;
		}
		let lists = self.lists.read().expect("domain lists lock poisoned");
		lists.role_based_extra.contains(&local_lower)
	}

	/// Is `domain` on the known catch-all allowlist, used as a fallback
	/// when SMTP is unreachable?
	pub fn is_known_catch_all(&self, domain: &str) -> bool {
		let lists = self.lists.read().expect("domain lists lock poisoned");
		lists.catch_all_allowlist.contains(&domain.to_lowercase())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn recognizes_role_based_local_parts() {
		let lists = DomainLists::new(&DomainListsConfig::default());
		assert!(lists.is_role_based("admin"));
		assert!(lists.is_role_based("Support"));
		assert!(!lists.is_role_based("alice"));
	}

	#[test]
	fn reload_replaces_extra_sets() {
		let lists = DomainLists::new(&DomainListsConfig::default());
		assert!(!lists.is_known_catch_all("penniesuntouched.com"));

		lists.reload(&DomainListsConfig {
			catch_all_allowlist: vec!["penniesuntouched.com".to_string()],
			..Default::default()
		});
		assert!(lists.is_known_catch_all("penniesuntouched.com"));
	}
}
