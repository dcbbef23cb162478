//! Cache performance metrics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time snapshot of cache activity.
///
/// # Example
///
/// ```
/// use recency_cache::Cache;
///
/// let cache: Cache<u32, String> = Cache::new();
/// cache.put(1, "one".to_string());
/// cache.get(&1);
/// cache.get(&2);
///
/// let metrics = cache.metrics();
/// assert_eq!(metrics.hits, 1);
/// assert_eq!(metrics.misses, 1);
/// assert_eq!(metrics.hit_rate(), 0.5);
/// ```
#[non_exhaustive]
#[derive(Debug, Clone, Default)]
pub struct CacheMetrics {
	/// Number of lookups that found their key.
	pub hits: u64,
	/// Number of lookups that did not find their key.
	pub misses: u64,
	/// Number of new entries inserted.
	pub inserts: u64,
	/// Number of existing entries overwritten.
	pub updates: u64,
	/// Number of entries evicted by limits (count, cost or age).
	pub evictions: u64,
	/// Number of entries explicitly removed via `remove()`.
	pub removals: u64,
	/// Current number of entries.
	pub total_count: usize,
	/// Current sum of entry costs.
	pub total_cost: u64,
	/// Configured cost limit, if any.
	pub cost_limit: Option<u64>,
}

impl CacheMetrics {
	/// Ratio of hits to lookups, between 0.0 and 1.0.
	///
	/// Returns 0.0 if there have been no lookups.
	pub fn hit_rate(&self) -> f64 {
		let total = self.total_accesses();
		if total == 0 {
			0.0
		} else {
			self.hits as f64 / total as f64
		}
	}

	/// Fraction of the cost limit in use.
	///
	/// Returns 0.0 when the cache has no cost limit.
	pub fn cost_utilization(&self) -> f64 {
		match self.cost_limit {
			Some(limit) if limit > 0 => self.total_cost as f64 / limit as f64,
			_ => 0.0,
		}
	}

	/// Total lookups (hits + misses).
	pub fn total_accesses(&self) -> u64 {
		self.hits + self.misses
	}

	/// Total writes (inserts + updates).
	pub fn total_writes(&self) -> u64 {
		self.inserts + self.updates
	}
}

/// Live counters updated by cache operations.
#[derive(Default)]
pub(crate) struct Stats {
	pub(crate) hits: AtomicU64,
	pub(crate) misses: AtomicU64,
	pub(crate) inserts: AtomicU64,
	pub(crate) updates: AtomicU64,
	pub(crate) evictions: AtomicU64,
	pub(crate) removals: AtomicU64,
}

impl Stats {
	pub(crate) fn record_lookup(&self, hit: bool) {
		if hit {
			self.hits.fetch_add(1, Ordering::Relaxed);
		} else {
			self.misses.fetch_add(1, Ordering::Relaxed);
		}
	}

	pub(crate) fn record_write(&self, updated: bool) {
		if updated {
			self.updates.fetch_add(1, Ordering::Relaxed);
		} else {
			self.inserts.fetch_add(1, Ordering::Relaxed);
		}
	}

	pub(crate) fn record_evictions(&self, count: usize) {
		if count > 0 {
			self.evictions.fetch_add(count as u64, Ordering::Relaxed);
		}
	}

	pub(crate) fn record_removal(&self) {
		self.removals.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn snapshot(
		&self,
		total_count: usize,
		total_cost: u64,
		cost_limit: Option<u64>,
	) -> CacheMetrics {
		CacheMetrics {
			hits: self.hits.load(Ordering::Relaxed),
			misses: self.misses.load(Ordering::Relaxed),
			inserts: self.inserts.load(Ordering::Relaxed),
			updates: self.updates.load(Ordering::Relaxed),
			evictions: self.evictions.load(Ordering::Relaxed),
			removals: self.removals.load(Ordering::Relaxed),
			total_count,
			total_cost,
			cost_limit,
		}
	}
}
