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

//! Decision engine: a pure function from probe outputs to
//! `(final_status, safety_score, spam_risk, reason)`. Mirrors the
//! original's `_calculate_final_status`/`_assess_spam_risk`
//! (`email_verifier.py`), but follows the ordered rule list exactly --
//! disposable is checked after syntax (a disposable address is still
//! syntactically a valid address) rather than before it as the original
//! does.

use crate::types::{FinalStatus, SmtpStatus, SpamRisk};

/// Everything the decision engine needs to know about one address,
/// gathered by the upstream cascade stages.
#[derive(Debug, Clone, Copy)]
pub struct DecisionInputs {
	pub syntax_valid: bool,
	pub disposable: bool,
	pub domain_valid: bool,
	pub mx_found: bool,
	pub role_based: bool,
	/// `Some(true/false)` when a provider HTTP probe gave a conclusive
	/// per-address existence signal; `None` when no probe ran or it was
	/// inconclusive.
	pub provider_exists: Option<bool>,
	pub catch_all: bool,
	pub smtp: SmtpStatus,
}

pub struct Decision {
	pub final_status: FinalStatus,
	pub safety_score: u8,
	pub spam_risk: SpamRisk,
	pub reason: String,
}

/// Evaluate the ordered rule list below. First matching rule wins.
pub fn decide(inputs: DecisionInputs) -> Decision {
	if !inputs.syntax_valid {
		return terminal(FinalStatus::InvalidSyntax, 0, "Invalid syntax");
	}
	if inputs.disposable {
		return terminal(FinalStatus::Disposable, 30, "Disposable address");
	}
	if !inputs.domain_valid {
		return terminal(FinalStatus::InvalidDomain, 10, "Domain does not exist");
	}
	if !inputs.mx_found {
		return terminal(FinalStatus::NoMx, 15, "No MX records found");
	}

	if let Some(exists) = inputs.provider_exists {
		if !exists {
			return terminal(FinalStatus::Invalid, 10, "Rejected by provider API");
		}
		if inputs.catch_all {
			return with_risk(FinalStatus::ValidRisky, 60, "Catch-all domain (provider API)");
		}
		let score = if inputs.role_based { 85 } else { 95 };
		return with_risk(FinalStatus::ValidSafe, score, "Valid and safe");
	}

	match inputs.smtp {
		SmtpStatus::Rejected => terminal(FinalStatus::Invalid, 20, "Email rejected by server"),
		SmtpStatus::Unreachable | SmtpStatus::NoMx if inputs.catch_all => {
			with_risk(FinalStatus::Risky, 50, "Accept-all / unverifiable")
		}
		SmtpStatus::Responsive => {
			let mut score: i32 = 95;
			let mut reason = "Valid and safe";
			if inputs.catch_all {
				score -= 20;
				reason = "Catch-all domain";
			}
			if inputs.role_based {
				score -= 10;
			}
			let status = if inputs.catch_all {
				FinalStatus::ValidRisky
			} else {
				FinalStatus::ValidSafe
			};
			with_risk(status, score.clamp(0, 100) as u8, reason)
		}
		SmtpStatus::Unreachable | SmtpStatus::NoMx => {
			let mut score: i32 = 65;
			if inputs.role_based {
				score -= 10;
			}
			with_risk(FinalStatus::Risky, score.clamp(0, 100) as u8, "SMTP unreachable")
		}
	}
}

fn spam_risk_for(disposable: bool, score: u8) -> SpamRisk {
	if disposable {
		return SpamRisk::High;
	}
	if score >= 80 {
		SpamRisk::Low
	} else if score >= 60 {
		SpamRisk::Medium
	} else {
		SpamRisk::High
	}
}

fn terminal(final_status: FinalStatus, score: u8, reason: &str) -> Decision {
	Decision {
		final_status,
		safety_score: score,
		spam_risk: spam_risk_for(false, score),
		reason: reason.to_string(),
	}
}

fn with_risk(final_status: FinalStatus, score: u8, reason: &str) -> Decision {
	Decision {
		final_status,
		safety_score: score,
		spam_risk: spam_risk_for(false, score),
		reason: reason.to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn base() -> DecisionInputs {
		DecisionInputs {
			syntax_valid: true,
			disposable: false,
			domain_valid: true,
			mx_found: true,
			role_based: false,
			provider_exists: None,
			catch_all: false,
			smtp: SmtpStatus::Responsive,
		}
	}

	#[test]
	fn valid_safe_on_clean_smtp_accept() {
		let decision = decide(base());
		assert_eq!(decision.final_status, FinalStatus::ValidSafe);
		assert_eq!(decision.safety_score, 95);
		assert_eq!(decision.spam_risk, SpamRisk::Low);
	}

	#[test]
	fn unreachable_catch_all_allowlisted_is_risky() {
		let inputs = DecisionInputs {
			smtp: SmtpStatus::Unreachable,
			catch_all: true,
			..base()
		};
		let decision = decide(inputs);
		assert_eq!(decision.final_status, FinalStatus::Risky);
		assert_eq!(decision.safety_score, 50);
		assert_eq!(decision.reason, "Accept-all / unverifiable");
	}

	#[test]
	fn provider_conclusive_exists_with_catch_all_is_valid_risky() {
		let inputs = DecisionInputs {
			provider_exists: Some(true),
			catch_all: true,
			..base()
		};
		let decision = decide(inputs);
		assert_eq!(decision.final_status, FinalStatus::ValidRisky);
		assert_eq!(decision.safety_score, 60);
		assert_eq!(decision.spam_risk, SpamRisk::Medium);
	}

	#[test]
	fn role_based_address_gets_score_penalty() {
		let inputs = DecisionInputs { role_based: true, ..base() };
		let decision = decide(inputs);
		assert_eq!(decision.final_status, FinalStatus::ValidSafe);
		assert_eq!(decision.safety_score, 85);
	}

	#[test]
	fn disposable_always_high_risk() {
		let inputs = DecisionInputs { disposable: true, ..base() };
		let decision = decide(inputs);
		assert_eq!(decision.final_status, FinalStatus::Disposable);
		assert_eq!(decision.spam_risk, SpamRisk::High);
	}

	#[test]
	fn invalid_syntax_short_circuits_everything() {
		let inputs = DecisionInputs { syntax_valid: false, disposable: true, ..base() };
		let decision = decide(inputs);
		assert_eq!(decision.final_status, FinalStatus::InvalidSyntax);
		assert_eq!(decision.safety_score, 0);
	}
}
