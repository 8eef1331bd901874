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

//! `verimail` checks whether an email address is likely to be
//! deliverable, without ever sending a message.
//!
//! It runs every address through a cascade of cheap-to-expensive probes
//! -- syntax, disposable-domain lookup, DNS A/MX records, a
//! provider-specific HTTP probe for Microsoft 365 and Google Workspace
//! tenants, a live SMTP conversation, and a catch-all check -- and folds
//! the result into a single verdict with a safety score and spam-risk
//! bucket. A bounded worker pool and a two-phase credit ledger sit on
//! top of the single-address cascade for bulk jobs.
//!
//! ```no_run
//! use std::sync::Arc;
//! use verimail::{EngineConfig, VerificationEngine};
//!
//! async fn check() -> anyhow::Result<()> {
//!     let config = EngineConfig::default();
//!     let engine = Arc::new(VerificationEngine::in_memory(config)?);
//!
//!     let result = engine.verify_one("demo-owner", "someone@example.com").await?;
//!     println!("{:?}", result);
//!     Ok(())
//! }
//! ```

pub mod cascade;
pub mod config;
pub mod decision;
pub mod dns;
pub mod domain;
mod engine;
pub mod error;
pub mod job;
pub mod provider;
pub mod smtp;
pub mod syntax;
pub mod types;
mod util;

#[cfg(feature = "sentry")]
pub use util::sentry::log_unknown_errors;

pub use cascade::{CascadeDeps, Verifier};
pub use config::{EngineConfig, EngineConfigBuilder};
pub use engine::VerificationEngine;
pub use error::EngineError;
pub use job::{CreditLedger, JobFilter, JobStore};
pub use types::{BulkJob, JobStatus, VerificationResult};

/// The target under which every log line in this crate is emitted.
pub const LOG_TARGET: &str = "verimail";

static CRYPTO_PROVIDER_INIT: std::sync::Once = std::sync::Once::new();

/// `verimail` dials SMTP and HTTPS endpoints over `rustls`. This installs
/// the `ring`-backed crypto provider as the process default exactly once;
/// a second, unrelated dependency in the same binary pulling in
/// `aws-lc-rs` instead would otherwise leave `rustls` with no default and
/// every TLS handshake failing. [`VerificationEngine::new`] calls this for
/// you; call it yourself first if you build a [`CascadeDeps`] directly.
pub fn initialize_crypto_provider() {
	CRYPTO_PROVIDER_INIT.call_once(|| {
		rustls::crypto::ring::default_provider()
			.install_default()
			.expect("no other rustls crypto provider installed yet");
	});
}
