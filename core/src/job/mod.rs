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

//! The bulk job orchestrator: credit ledger, job store, and the bounded
//! worker pool that ties them to the probe cascade.

pub mod executor;
pub mod ledger;
pub mod store;

pub use executor::JobExecutor;
pub use ledger::{CreditLedger, InMemoryLedger, InsufficientCreditsError};
pub use store::{InMemoryJobStore, JobFilter, JobStore};
