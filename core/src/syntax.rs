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

//! Syntax validation. Parses `local@domain`, without any
//! network access. Leading/trailing whitespace is trimmed; the original
//! casing is preserved in [`Address::original`] but every comparison
//! downstream uses [`Address::normalized`].

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::Address;

// A pragmatic RFC 5322-ish local-part/domain grammar: permissive enough to
// accept real-world addresses (plus signs, dots, most punctuation allowed
// in a quoted-string-free local part) while rejecting the obviously
// malformed (no "@", empty local part, empty domain, domain without a
// dot, whitespace inside either half).
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
	Regex::new(
		r"(?x)
        ^
        [a-zA-Z0-9.!\#$%&'*+/=?^_`{|}~-]+
        @
        [a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?
        (?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+
        $
        ",
	)
	.expect("static regex is valid")
});

/// Result of validating an address's syntax, before any network access.
#[derive(Debug, Clone)]
pub struct SyntaxDetails {
	pub valid: bool,
	pub reason: &'static str,
	/// `Some` only when `valid` is true.
	pub address: Option<Address>,
}

/// Well-known mailbox providers a typo'd domain is most likely aimed at.
/// Grounded on the original's `get_similar_mail_provider`: a tight
/// Levenshtein-distance check against this list, not a full dictionary,
/// since the point is to catch "gmial.com" rather than suggest unrelated
/// domains for deliberately unusual ones.
const KNOWN_PROVIDERS: &[&str] = &[
	"gmail.com",
	"googlemail.com",
	"yahoo.com",
	"hotmail.com",
	"outlook.com",
	"live.com",
	"icloud.com",
	"aol.com",
	"protonmail.com",
	"zoho.com",
];

/// Suggest a "did you mean" correction when `domain` is one or two edits
/// away from a well-known provider but isn't that provider itself.
/// Returns `None` when the domain already matches a known provider
/// exactly, or isn't close enough to any of them to be a plausible typo.
pub fn suggest_provider_typo(domain: &str) -> Option<String> {
	let domain_lower = domain.to_lowercase();
	if KNOWN_PROVIDERS.contains(&domain_lower.as_str()) {
		return None;
	}

	KNOWN_PROVIDERS
		.iter()
		.map(|&provider| (provider, levenshtein::levenshtein(&domain_lower, provider)))
		.filter(|(_, distance)| *distance > 0 && *distance <= 2)
		.min_by_key(|(_, distance)| *distance)
		.map(|(provider, _)| provider.to_string())
}

/// Validate `raw` against the address grammar. Trims surrounding
/// whitespace before validating; does not touch DNS.
pub fn check_syntax(raw: &str) -> SyntaxDetails {
	let trimmed = raw.trim();

	if trimmed.is_empty() {
		return SyntaxDetails {
			valid: false,
			reason: "address is empty",
			address: None,
		};
	}

	if !EMAIL_RE.is_match(trimmed) {
		return SyntaxDetails {
			valid: false,
			reason: "address does not match the expected local@domain grammar",
			address: None,
		};
	}

	// The regex guarantees exactly one '@' split is unambiguous here
	// because the local-part character class excludes '@'.
	let at_index = trimmed
		.find('@')
		.expect("regex match guarantees an '@' is present");
	let (local, domain_with_at) = trimmed.split_at(at_index);
	let domain = &domain_with_at[1..];

	let normalized = trimmed.to_lowercase();

	SyntaxDetails {
		valid: true,
		reason: "syntax is valid",
		address: Some(Address {
			original: trimmed.to_string(),
			normalized,
			local: local.to_lowercase(),
			domain: domain.to_lowercase(),
		}),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn accepts_common_addresses() {
		for addr in [
			"alice@example.com",
			"Alice.Bob+tag@Example.CO.UK",
			"a@b.co",
		] {
			let details = check_syntax(addr);
			assert!(details.valid, "expected {addr} to be valid");
		}
	}

	#[test]
	fn trims_whitespace_but_preserves_case_in_original() {
		let details = check_syntax("  Alice@Example.com  ");
		assert!(details.valid);
		let address = details.address.unwrap();
		assert_eq!(address.original, "Alice@Example.com");
		assert_eq!(address.normalized, "alice@example.com");
		assert_eq!(address.local, "alice");
		assert_eq!(address.domain, "example.com");
	}

	#[test]
	fn rejects_malformed_addresses() {
		for addr in ["", "no-at-sign", "@example.com", "alice@", "alice@localhost", "a b@example.com"] {
			let details = check_syntax(addr);
			assert!(!details.valid, "expected {addr} to be invalid");
		}
	}

	#[test]
	fn suggests_typo_correction_for_near_miss_domains() {
		assert_eq!(suggest_provider_typo("gmial.com"), Some("gmail.com".to_string()));
		assert_eq!(suggest_provider_typo("yah00.com"), Some("yahoo.com".to_string()));
	}

	#[test]
	fn does_not_suggest_for_exact_or_unrelated_domains() {
		assert_eq!(suggest_provider_typo("gmail.com"), None);
		assert_eq!(suggest_provider_typo("my-company.io"), None);
	}
}
