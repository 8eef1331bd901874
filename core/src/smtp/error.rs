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

use std::time::Duration;

use async_smtp::error::Error as AsyncSmtpError;
use serde::Serialize;
use thiserror::Error;

use crate::util::ser_with_display::ser_with_display;

/// Error occurred while conversing with a mail server over SMTP. Every
/// variant here is caught at the prober boundary and turned into
/// `SmtpStatus::Unreachable` rather than propagated, so an unreachable
/// or misbehaving server degrades the result instead of failing the
/// whole verification.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "message")]
pub enum SmtpError {
	/// Error from the `async-smtp` crate: connection refused, malformed
	/// banner, unexpected reply code, TLS handshake failure, etc.
	#[error("SMTP error: {0}")]
	#[serde(serialize_with = "ser_with_display")]
	AsyncSmtpError(AsyncSmtpError),
	/// I/O error establishing or maintaining the TCP connection.
	#[error("I/O error: {0}")]
	#[serde(serialize_with = "ser_with_display")]
	IoError(std::io::Error),
	/// The conversation did not complete within the configured SMTP
	/// budget (`ProbeBudgets::smtp`).
	#[error("SMTP probe timed out after {0:?}")]
	Timeout(Duration),
}

impl From<AsyncSmtpError> for SmtpError {
	fn from(e: AsyncSmtpError) -> Self {
		SmtpError::AsyncSmtpError(e)
	}
}

impl From<std::io::Error> for SmtpError {
	fn from(e: std::io::Error) -> Self {
		SmtpError::IoError(e)
	}
}

impl SmtpError {
	/// Classify a subset of known `async-smtp` failures into a coarse
	/// description useful for the spam-risk heuristic: an IP-blacklist or
	/// reverse-DNS rejection at EHLO/MAIL time is a signal about the
	/// sending host, not the target address.
	pub fn description(&self) -> Option<SmtpErrorDesc> {
		match self {
			SmtpError::AsyncSmtpError(inner) => {
				let message = inner.to_string().to_lowercase();
				if message.contains("blacklist") || message.contains("blocked") {
					Some(SmtpErrorDesc::IpBlacklisted)
				} else if message.contains("reverse dns") || message.contains("rdns") {
					Some(SmtpErrorDesc::NeedsRDns)
				} else {
					None
				}
			}
			_ => None,
		}
	}
}

#[derive(Debug, Serialize)]
pub enum SmtpErrorDesc {
	IpBlacklisted,
	NeedsRDns,
}
