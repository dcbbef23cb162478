//! Count, cost and age trimming.
//!
//! All three sweeps evict from the tail of the recency list, one node per lock
//! acquisition. A sweep never holds the index lock across iterations: it
//! try-locks, re-checks its condition, evicts at most one node and unlocks. If
//! the lock is busy it sleeps for [`TRIM_BACKOFF`] and tries again, so a
//! foreground caller waits for at most one node's worth of bookkeeping.
//!
//! Evicted nodes are collected into a holder and released through the cache's
//! release route after the sweep finishes, outside the lock.

use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::cache::Inner;
use crate::index::OrderedIndex;
use crate::release::Holder;
use crate::traits::{CacheKey, CacheValue};

/// Pause before retrying a busy index lock.
pub(crate) const TRIM_BACKOFF: Duration = Duration::from_millis(10);

impl<K: CacheKey, V: CacheValue> Inner<K, V> {
	/// Evict least recently used entries until at most `limit` remain.
	///
	/// Returns the number of entries evicted.
	pub(crate) fn trim_to_count(&self, limit: usize) -> usize {
		if limit == 0 {
			return self.evict_all();
		}
		self.sweep("count", |index| index.total_count() > limit)
	}

	/// Evict least recently used entries until the total cost is at most `limit`.
	pub(crate) fn trim_to_cost(&self, limit: u64) -> usize {
		if limit == 0 {
			return self.evict_all();
		}
		self.sweep("cost", |index| index.cost_exceeds(limit))
	}

	/// Evict entries not touched within `limit`.
	///
	/// Only the tail is inspected: it always holds the oldest access time.
	pub(crate) fn trim_to_age(&self, limit: Duration) -> usize {
		if limit.is_zero() {
			return self.evict_all();
		}
		let now = Instant::now();
		self.sweep("age", |index| {
			index
				.peek_tail()
				.is_some_and(|tail| now.saturating_duration_since(tail.last_access) > limit)
		})
	}

	/// One full pass against the configured limits: cost, then count, then age.
	pub(crate) fn trim_all(&self) -> usize {
		let (count_limit, cost_limit, age_limit) = {
			let settings = self.settings.read();
			(settings.count_limit, settings.cost_limit, settings.age_limit)
		};

		let mut evicted = 0;
		if let Some(limit) = cost_limit {
			evicted += self.trim_to_cost(limit);
		}
		if let Some(limit) = count_limit {
			evicted += self.trim_to_count(limit);
		}
		if let Some(limit) = age_limit {
			evicted += self.trim_to_age(limit);
		}
		evicted
	}

	/// Cost trim queued by `put` after the total cost overflowed.
	pub(crate) fn run_cost_trim_job(&self) {
		// Cleared before trimming so a put racing with this sweep can queue
		// another pass.
		self.cost_trim_queued.store(false, Ordering::Release);
		let cost_limit = self.settings.read().cost_limit;
		if let Some(limit) = cost_limit {
			self.trim_to_cost(limit);
		}
	}

	/// Evict the tail one node at a time while `over_limit` holds.
	fn sweep<F>(&self, policy: &'static str, mut over_limit: F) -> usize
	where
		F: FnMut(&OrderedIndex<K, V>) -> bool,
	{
		let mut holder = Holder::new();
		let (count, cost) = loop {
			let Some(mut index) = self.index.try_lock() else {
				thread::sleep(TRIM_BACKOFF);
				continue;
			};
			if !over_limit(&index) {
				break (index.total_count(), index.total_cost());
			}
			match index.remove_tail() {
				Some(node) => holder.push(node),
				None => break (0, 0),
			}
		};

		let evicted = holder.entries();
		if evicted > 0 {
			self.stats.record_evictions(evicted);
			debug!(cache = %self.label(), policy, evicted, count, cost, "trimmed cache");
		}
		self.release(holder);
		evicted
	}

	/// Zero limit: drop every entry and count them as evictions.
	fn evict_all(&self) -> usize {
		let holder = Holder::detached(self.index.lock().remove_all());
		let evicted = holder.entries();
		if evicted > 0 {
			self.stats.record_evictions(evicted);
			debug!(cache = %self.label(), evicted, "trimmed cache to zero");
		}
		self.release(holder);
		evicted
	}
}
