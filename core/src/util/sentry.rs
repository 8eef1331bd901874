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

//! Optional Sentry reporting for results the decision engine could not
//! explain. Gated behind the `sentry` feature so a caller with no
//! Sentry DSN configured pays nothing for it; mirrors the original's own
//! `log_unknown_errors` hook, which only ever fires for
//! `final_status: Error`, never for a conclusive negative result like a
//! 550 rejection.

use crate::types::{FinalStatus, VerificationResult};

/// Report `result` to Sentry if it reached [`FinalStatus::Error`] -- an
/// unexplained outcome, as opposed to any of the other terminal statuses,
/// which are all valid, expected verdicts. `instance_name` is attached as
/// a tag so a fleet of engine instances can be told apart in Sentry.
pub fn log_unknown_errors(result: &VerificationResult, instance_name: &str) {
	if result.final_status != FinalStatus::Error {
		return;
	}

	::sentry::configure_scope(|scope| {
		scope.set_tag("instance_name", instance_name);
		scope.set_extra("email", result.email.clone().into());
		scope.set_extra("reason", result.reason.clone().into());
	});
	::sentry::capture_message(
		&format!("verimail: unexplained verification error: {}", result.reason),
		::sentry::Level::Warning,
	);
}
