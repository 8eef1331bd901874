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

//! Domain classifier: assigns a [`ProviderTag`] from the domain name and
//! its MX records. Rules are applied in order; the first match wins.

use crate::types::{MxRecord, ProviderTag};

const CONSUMER_MICROSOFT_DOMAINS: &[&str] =
	&["outlook.com", "hotmail.com", "live.com", "msn.com"];

const CONSUMER_GOOGLE_DOMAINS: &[&str] = &["gmail.com", "googlemail.com"];

/// MX-hostname substrings that identify a hosted provider, checked in
/// order. Grounded on the original's `_extract_smtp_provider`
/// (`email_verifier.py`).
const MX_SUBSTRING_PROVIDERS: &[(&str, ProviderTag)] = &[
	("mail.protection.outlook.com", ProviderTag::Microsoft365),
	("aspmx.l.google.com", ProviderTag::GoogleWorkspace),
	("googlemail.com", ProviderTag::GoogleWorkspace),
	("titan.email", ProviderTag::Titan),
	("zoho", ProviderTag::Zoho),
	("protonmail.ch", ProviderTag::Protonmail),
	("yahoodns.net", ProviderTag::Yahoo),
];

/// Classify `domain` given its MX record list, via this ordered rule
/// list:
/// 1. known consumer Microsoft domain
/// 2. known consumer Google domain
/// 3. MX hostname substring match
/// 4. generic
pub fn classify_domain(domain: &str, mx_records: &[MxRecord]) -> ProviderTag {
	let domain_lower = domain.to_lowercase();

	if CONSUMER_MICROSOFT_DOMAINS.contains(&domain_lower.as_str()) {
		return ProviderTag::ConsumerMicrosoft;
	}
	if CONSUMER_GOOGLE_DOMAINS.contains(&domain_lower.as_str()) {
		return ProviderTag::ConsumerGoogle;
	}

	for record in mx_records {
		let exchange_lower = record.exchange.to_lowercase();
		for (substring, tag) in MX_SUBSTRING_PROVIDERS {
			if exchange_lower.contains(substring) {
				return *tag;
			}
		}
	}

	ProviderTag::Generic
}

/// A coarse, human-readable provider name, for [`crate::types::VerificationResult::smtp_provider`].
/// Grounded on the original's `_extract_smtp_provider`, which falls back
/// to the first DNS label of the MX host when no known provider matches.
pub fn smtp_provider_name(tag: ProviderTag, mx_records: &[MxRecord]) -> Option<String> {
	let name = match tag {
		ProviderTag::Microsoft365 | ProviderTag::ConsumerMicrosoft => "Microsoft 365",
		ProviderTag::GoogleWorkspace | ProviderTag::ConsumerGoogle => "Google Workspace",
		ProviderTag::Titan => "Titan",
		ProviderTag::Zoho => "Zoho Mail",
		ProviderTag::Protonmail => "ProtonMail",
		ProviderTag::Yahoo => "Yahoo",
		ProviderTag::Generic => {
			return mx_records.first().map(|mx| {
				mx.exchange
					.trim_end_matches('.')
					.split('.')
					.next()
					.unwrap_or(&mx.exchange)
					.to_string()
			});
		}
	};
	Some(name.to_string())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn mx(exchange: &str) -> MxRecord {
		MxRecord {
			preference: 10,
			exchange: exchange.to_string(),
		}
	}

	#[test]
	fn recognizes_consumer_domains() {
		assert_eq!(classify_domain("outlook.com", &[]), ProviderTag::ConsumerMicrosoft);
		assert_eq!(classify_domain("gmail.com", &[]), ProviderTag::ConsumerGoogle);
	}

	#[test]
	fn recognizes_hosted_providers_via_mx() {
		let records = vec![mx("example-com.mail.protection.outlook.com")];
		assert_eq!(classify_domain("example.com", &records), ProviderTag::Microsoft365);

		let records = vec![mx("aspmx.l.google.com")];
		assert_eq!(classify_domain("example.com", &records), ProviderTag::GoogleWorkspace);
	}

	#[test]
	fn falls_back_to_generic() {
		let records = vec![mx("mx1.somehost.net")];
		assert_eq!(classify_domain("example.com", &records), ProviderTag::Generic);
	}
}
