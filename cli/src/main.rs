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

//! Command-line front end for `verimail`: verify a single address, or
//! submit a newline-delimited file as a bulk job and poll it to
//! completion, printing JSON throughout.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use verimail::{EngineConfig, VerificationEngine};

const DEFAULT_OWNER: &str = "cli";

#[derive(Parser, Debug)]
#[clap(name = "verimail", version, about = "Verify email address deliverability without sending mail")]
struct Cli {
	/// A single address to verify. Mutually exclusive with `--input`.
	#[clap(long)]
	email: Option<String>,

	/// A file with one address per line, submitted as a single bulk job.
	#[clap(long)]
	input: Option<PathBuf>,

	/// Optional config file layered under the `VERIMAIL_` environment
	/// prefix (see `EngineConfig::load`).
	#[clap(long, env = "VERIMAIL_CONFIG_FILE")]
	config: Option<String>,

	/// Owner id credits are reserved against. Only meaningful for this
	/// process's in-memory demo ledger.
	#[clap(long, default_value = DEFAULT_OWNER)]
	owner: String,

	/// How often to poll a submitted bulk job for progress.
	#[clap(long, default_value = "500")]
	poll_interval_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
		)
		.init();

	let cli = Cli::parse();
	let config = EngineConfig::load(cli.config.as_deref())?;
	let engine = Arc::new(VerificationEngine::new(config)?);

	match (cli.email, cli.input) {
		(Some(email), None) => verify_single(&engine, &cli.owner, &email).await,
		(None, Some(path)) => verify_bulk(&engine, &cli.owner, &path, cli.poll_interval_ms).await,
		(Some(_), Some(_)) => {
			anyhow::bail!("pass either --email or --input, not both");
		}
		(None, None) => {
			anyhow::bail!("pass --email <address> or --input <file>");
		}
	}
}

async fn verify_single(engine: &VerificationEngine, owner: &str, email: &str) -> anyhow::Result<()> {
	let result = engine.verify_one(owner, email).await?;
	println!("{}", serde_json::to_string_pretty(&result)?);
	Ok(())
}

async fn verify_bulk(
	engine: &VerificationEngine,
	owner: &str,
	path: &PathBuf,
	poll_interval_ms: u64,
) -> anyhow::Result<()> {
	let contents = fs::read_to_string(path)?;
	let addresses: Vec<String> = contents
		.lines()
		.map(str::trim)
		.filter(|line| !line.is_empty())
		.map(str::to_string)
		.collect();

	let job_id = engine.submit_bulk(owner, addresses).await?;
	tracing::info!(target: verimail::LOG_TARGET, job_id = %job_id, "submitted bulk job");

	loop {
		let job = engine.get_job(job_id).await?;
		eprintln!("progress: {}/{} ({:?})", job.processed, job.total, job.status);

		if matches!(
			job.status,
			verimail::JobStatus::Completed | verimail::JobStatus::Failed
		) {
			println!("{}", serde_json::to_string_pretty(&job)?);
			return Ok(());
		}

		tokio::time::sleep(Duration::from_millis(poll_interval_ms)).await;
	}
}
