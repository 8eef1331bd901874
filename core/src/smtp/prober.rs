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

//! The actual EHLO/MAIL FROM/RCPT TO conversation, grounded on the
//! original's `_check_smtp` (`email_verifier.py`), which connects to the
//! primary MX on port 25, issues `MAIL FROM`/`RCPT TO`, and reads the
//! reply code off `RCPT TO` as the existence signal -- `250` accepts,
//! `550`/`551`/`553` definitively rejects, anything else is inconclusive.

use std::net::SocketAddr;
use std::time::Duration;

use async_smtp::{ClientSecurity, EmailAddress, SmtpClient, SmtpTransport};

use super::error::SmtpError;
use crate::config::SmtpProbeConfig;
use crate::dns::DnsResolver;
use crate::types::{MxRecord, SmtpStatus};

const DEFINITIVELY_NONEXISTENT: &[u32] = &[550, 551, 553];

/// Dial `mx.exchange:config.port` and ask whether `recipient` exists. Any
/// connection, protocol, or timeout failure is folded into
/// [`SmtpStatus::Unreachable`] rather than surfaced: the cascade uses the
/// returned reason string for diagnostics only.
pub async fn check_smtp(
	mx: &MxRecord,
	recipient: &str,
	config: &SmtpProbeConfig,
	resolver: &DnsResolver,
	timeout: Duration,
) -> (SmtpStatus, String) {
	match tokio::time::timeout(timeout, probe(mx, recipient, config, resolver)).await {
		Ok(Ok(accepted)) => {
			if accepted {
				(SmtpStatus::Responsive, "RCPT TO accepted".to_string())
			} else {
				(SmtpStatus::Rejected, "RCPT TO rejected, mailbox does not exist".to_string())
			}
		}
		Ok(Err(err)) => (SmtpStatus::Unreachable, err.to_string()),
		Err(_) => (
			SmtpStatus::Unreachable,
			SmtpError::Timeout(timeout).to_string(),
		),
	}
}

/// Resolve `host` to a dialable [`SocketAddr`] through the same
/// cooperative resolver every other DNS lookup in the cascade uses --
/// never the blocking `std::net::ToSocketAddrs`, which would stall the
/// worker pool for a syscall instead of suspending at an `.await`.
async fn resolve_socket_addr(
	resolver: &DnsResolver,
	host: &str,
	port: u16,
) -> Result<SocketAddr, SmtpError> {
	let ip = resolver
		.resolve_a(host)
		.await
		.map_err(|e| {
			SmtpError::from(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("could not resolve {host}: {e}"),
			))
		})?
		.into_iter()
		.next()
		.ok_or_else(|| {
			SmtpError::from(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("no A records for {host}"),
			))
		})?;
	Ok(SocketAddr::new(ip, port))
}

async fn probe(
	mx: &MxRecord,
	recipient: &str,
	config: &SmtpProbeConfig,
	resolver: &DnsResolver,
) -> Result<bool, SmtpError> {
	let host = mx.exchange.trim_end_matches('.');
	let addr = resolve_socket_addr(resolver, host, config.port).await?;

	let client = SmtpClient::with_security(addr, ClientSecurity::None)
		.hello_name(async_smtp::ClientId::Domain(config.hello_name.clone()));

	let mut transport = tokio::time::timeout(config.connect_timeout, SmtpTransport::new(client))
		.await
		.map_err(|_| SmtpError::Timeout(config.connect_timeout))?
		.map_err(SmtpError::from)?;

	let from = EmailAddress::new(config.from_email.clone())
		.map_err(|_| SmtpError::from(anyhow_invalid_from(&config.from_email)))?;
	let to = EmailAddress::new(recipient.to_string())
		.map_err(|_| SmtpError::from(anyhow_invalid_from(recipient)))?;

	tokio::time::timeout(
		config.command_timeout,
		transport.command(async_smtp::commands::MailCommand::new(from, vec![])),
	)
	.await
	.map_err(|_| SmtpError::Timeout(config.command_timeout))?
	.map_err(SmtpError::from)?;

	let rcpt_response = tokio::time::timeout(
		config.command_timeout,
		transport.command(async_smtp::commands::RcptCommand::new(to, vec![])),
	)
	.await
	.map_err(|_| SmtpError::Timeout(config.command_timeout))?;

	transport.close().await.ok();

	match rcpt_response {
		Ok(response) => {
			let code: u32 = response.code.to_string().parse().unwrap_or(0);
			Ok(!DEFINITIVELY_NONEXISTENT.contains(&code))
		}
		Err(async_smtp::error::Error::Permanent(response)) => {
			let code: u32 = response.code.to_string().parse().unwrap_or(0);
			Ok(!DEFINITIVELY_NONEXISTENT.contains(&code))
		}
		Err(err) => Err(SmtpError::from(err)),
	}
}

fn anyhow_invalid_from(address: &str) -> std::io::Error {
	std::io::Error::new(
		std::io::ErrorKind::InvalidInput,
		format!("invalid address for SMTP envelope: {address}"),
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn definitively_nonexistent_codes_match_rcpt_rejections() {
		assert!(DEFINITIVELY_NONEXISTENT.contains(&550));
		assert!(!DEFINITIVELY_NONEXISTENT.contains(&250));
	}
}
