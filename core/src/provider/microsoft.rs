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

//! Microsoft autodiscover + credential-type probe. Grounded
//! on the original's `office365_checker.py`: `get_domain_info` (junk-user
//! autodiscover probe), `check_user_via_login_api` (`GetCredentialType`,
//! the authoritative signal), and `check_teams_status` (Lync/Teams
//! fallback on confirmed catch-all domains).

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use super::{address_for_probe, random_address_at, ProviderVerdict};
use crate::types::Address;

const USER_AGENT: &str =
	"Microsoft Office/16.0 (Windows NT 10.0; Microsoft Outlook 16.0.12026; Pro)";

#[derive(Debug, thiserror::Error)]
pub enum Microsoft365Error {
	#[error("HTTP request failed: {0}")]
	Http(#[from] reqwest::Error),
	#[error("unexpected response shape: {0}")]
	UnexpectedResponse(String),
}

#[derive(Debug, Deserialize)]
struct CredentialTypeResponse {
	#[serde(rename = "IfExistsResult")]
	if_exists_result: Option<i32>,
}

/// Result of probing whether `domain` runs on Microsoft 365 and whether
/// it behaves as a catch-all, via a random junk-user autodiscover call:
/// a GET to the autodiscover JSON endpoint with a random, unguessable
/// local part. If that same random probe returns 200/OK with a valid
/// body, the domain is tagged catch-all.
async fn probe_domain(
	client: &reqwest::Client,
	domain: &str,
	timeout: Duration,
) -> (bool, bool) {
	let junk_address = random_address_at(domain);
	let url = format!(
		"https://outlook.office365.com/autodiscover/autodiscover.json/v1.0/{junk_address}?Protocol=rest"
	);

	let response = match client
		.get(&url)
		.header("User-Agent", USER_AGENT)
		.header("Accept", "application/json")
		.timeout(timeout)
		.send()
		.await
	{
		Ok(r) => r,
		Err(_) => return (false, false),
	};

	let status = response.status();
	let body = response.text().await.unwrap_or_default().to_lowercase();

	if status.is_success() {
		let is_o365 = body.contains("outlook") || body.contains("office");
		// A junk user returning 200 OK means the domain accepts every
		// local part: it is a catch-all domain.
		(is_o365, is_o365)
	} else {
		(
			body.contains("outlook.office365.com") || body.contains("outlook.office.com"),
			false,
		)
	}
}

/// Call the Microsoft Login `GetCredentialType` endpoint, the
/// authoritative per-address existence signal: `0` means the user
/// exists in a tenant, `1` means it does not, other values are
/// inconclusive.
async fn check_credential_type(
	client: &reqwest::Client,
	email: &str,
	timeout: Duration,
) -> Result<Option<bool>, Microsoft365Error> {
	let url = "https://login.microsoftonline.com/common/GetCredentialType?mkt=en-US";
	let client_request_id = uuid::Uuid::new_v4().to_string();

	let payload = json!({
		"username": email,
		"isOtherIdpSupported": true,
		"checkPhones": false,
		"isRemoteNGCSupported": true,
		"isCookieBannerShown": false,
		"isFidoSupported": true,
		"originalRequest": "",
		"country": "US",
		"forceotclogin": false,
		"isExternalFederationDisallowed": false,
		"isRemoteConnectSupported": false,
		"federationFlags": 0,
		"isSignup": false,
		"flowToken": "",
		"isAccessPassSupported": true,
		"isQrCodePinSupported": true
	});

	let response = client
		.post(url)
		.header("client-request-id", client_request_id)
		.header("Accept", "application/json")
		.header("Origin", "https://login.microsoftonline.com")
		.json(&payload)
		.timeout(timeout)
		.send()
		.await?;

	if !response.status().is_success() {
		return Ok(None);
	}

	let parsed: CredentialTypeResponse = response.json().await?;
	match parsed.if_exists_result {
		Some(0) => Ok(Some(true)),
		Some(1) => Ok(Some(false)),
		// 5/6 (federated/external) and anything else: inconclusive.
		_ => Ok(None),
	}
}

/// Lync/Teams Autodiscover reachability probe, used only as a last
/// resort on confirmed catch-all Microsoft domains when the credential-
/// type endpoint is inconclusive -- an enrichment grounded on the
/// original's `check_teams_status`. Never overrides SMTP on its own --
/// it can only narrow `exists: None` toward a weak existence signal.
async fn check_teams_presence(client: &reqwest::Client, domain: &str, timeout: Duration) -> bool {
	let base_url = format!("https://lyncdiscover.{domain}/");
	let base_response = match client.get(&base_url).timeout(timeout).send().await {
		Ok(r) => r,
		Err(_) => return false,
	};
	if !matches!(base_response.status().as_u16(), 200 | 401 | 403) {
		return false;
	}
	true
}

/// Check whether `address` exists on a Microsoft tenant.
/// Never errors to the caller: any failure collapses to
/// [`ProviderVerdict::unknown`].
pub async fn check_email(
	client: &reqwest::Client,
	address: &Address,
	timeout: Duration,
) -> ProviderVerdict {
	let (is_o365, is_catch_all) = probe_domain(client, &address.domain, timeout).await;

	if !is_o365 {
		return ProviderVerdict::unknown(
			"microsoft_autodiscover",
			"domain does not appear to use Microsoft 365",
		);
	}

	let email = address_for_probe(address);
	match check_credential_type(client, &email, timeout).await {
		Ok(Some(exists)) => ProviderVerdict {
			exists: Some(exists),
			catch_all_observed: true,
			catch_all: is_catch_all,
			is_o365: true,
			method: "microsoft_login_api",
			details: if exists {
				"user confirmed via Microsoft Login API".to_string()
			} else {
				"user not found via Microsoft Login API".to_string()
			},
		},
		Ok(None) | Err(_) => {
			// Login API was inconclusive. On a confirmed catch-all domain,
			// SMTP won't help either (every RCPT TO succeeds), so try Teams
			// as a last, weak signal before giving up on a per-address verdict.
			if is_catch_all && check_teams_presence(client, &address.domain, timeout).await {
				return ProviderVerdict {
					exists: None,
					catch_all_observed: true,
					catch_all: true,
					is_o365: true,
					method: "microsoft_teams_fallback",
					details: "catch-all domain, Teams/Lync Autodiscover service reachable"
						.to_string(),
				};
			}
			ProviderVerdict {
				exists: None,
				catch_all_observed: true,
				catch_all: is_catch_all,
				is_o365: true,
				method: "microsoft_autodiscover",
				details: "Login API inconclusive".to_string(),
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn random_address_is_well_formed() {
		let addr = random_address_at("example.com");
		assert!(addr.ends_with("@example.com"));
		let local = addr.split('@').next().unwrap();
		assert!(local.len() >= 16);
		assert!(local.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
	}
}
