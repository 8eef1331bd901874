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

//! Per-domain cache: memoizes the classifier tag and
//! catch-all tri-state, keyed by lowercase domain, with a TTL. Reads are
//! lock-free; writes are serialized per key by `DashMap`'s internal
//! sharded locking, the same pattern `KumoCorp-kumomta`'s `QueueManager`
//! uses to let exactly one task resolve a given key
//! (`crates/kumod/src/queue/manager.rs`) while concurrent readers never
//! block each other.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::types::{CatchAllStatus, ProviderTag};

/// A cached verdict for one domain.
#[derive(Debug, Clone)]
pub struct DomainCacheEntry {
	pub provider_tag: ProviderTag,
	pub is_catch_all: CatchAllStatus,
	observed_at: Instant,
}

/// Concurrent, TTL-based cache of [`DomainCacheEntry`] keyed by lowercase
/// domain. Best-effort: an eviction or cold start simply re-runs probes.
pub struct DomainCache {
	entries: DashMap<String, DomainCacheEntry>,
	ttl: Duration,
}

impl DomainCache {
	pub fn new(ttl: Duration) -> Self {
		DomainCache {
			entries: DashMap::new(),
			ttl,
		}
	}

	/// Fetch a still-fresh entry, if any. Expired entries are treated as
	/// absent but are not evicted here -- the next writer will overwrite
	/// them, and a idle domain's stale entry costs nothing to keep around.
	pub fn get(&self, domain: &str) -> Option<DomainCacheEntry> {
		let key = domain.to_lowercase();
		let entry = self.entries.get(&key)?;
		if entry.observed_at.elapsed() < self.ttl {
			Some(entry.clone())
		} else {
			None
		}
	}

	/// Record the classifier's verdict for `domain`. Only the first
	/// completer writes the cache entry; subsequent writers check
	/// freshness and either overwrite (if newer and still fresh) or skip.
	/// Since writes here always carry the current instant, a fresh write
	/// always wins over a stale one; concurrent writers with
	/// near-simultaneous timestamps may race harmlessly -- duplicate
	/// probes are acceptable.
	pub fn set_provider_tag(&self, domain: &str, tag: ProviderTag) {
		let key = domain.to_lowercase();
		self.entries
			.entry(key)
			.and_modify(|entry| {
				entry.provider_tag = tag;
				entry.observed_at = Instant::now();
			})
			.or_insert_with(|| DomainCacheEntry {
				provider_tag: tag,
				is_catch_all: CatchAllStatus::Unknown,
				observed_at: Instant::now(),
			});
	}

	/// Record a catch-all verdict, preserving whatever provider tag is
	/// already cached (or `Generic` if this is the first write for the
	/// domain).
	pub fn set_catch_all(&self, domain: &str, is_catch_all: bool) {
		let key = domain.to_lowercase();
		let status = if is_catch_all {
			CatchAllStatus::True
		} else {
			CatchAllStatus::False
		};
		self.entries
			.entry(key)
			.and_modify(|entry| {
				entry.is_catch_all = status;
				entry.observed_at = Instant::now();
			})
			.or_insert_with(|| DomainCacheEntry {
				provider_tag: ProviderTag::Generic,
				is_catch_all: status,
				observed_at: Instant::now(),
			});
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::thread::sleep;

	#[test]
	fn first_write_then_read_roundtrips() {
		let cache = DomainCache::new(Duration::from_secs(60));
		assert!(cache.get("example.com").is_none());

		cache.set_provider_tag("Example.com", ProviderTag::GoogleWorkspace);
		let entry = cache.get("example.com").expect("entry should be present");
		assert_eq!(entry.provider_tag, ProviderTag::GoogleWorkspace);
		assert_eq!(entry.is_catch_all, CatchAllStatus::Unknown);

		cache.set_catch_all("example.com", true);
		let entry = cache.get("example.com").unwrap();
		assert_eq!(entry.is_catch_all, CatchAllStatus::True);
		// The provider tag written earlier must survive the catch-all update.
		assert_eq!(entry.provider_tag, ProviderTag::GoogleWorkspace);
	}

	#[test]
	fn expired_entries_are_treated_as_absent() {
		let cache = DomainCache::new(Duration::from_millis(10));
		cache.set_provider_tag("example.com", ProviderTag::Generic);
		sleep(Duration::from_millis(30));
		assert!(cache.get("example.com").is_none());
	}
}
