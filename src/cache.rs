use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use deepsize::DeepSizeOf;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::error::ConfigError;
use crate::hooks::{Hooks, LifecycleCallback, LifecycleEvent};
use crate::index::OrderedIndex;
use crate::metrics::{CacheMetrics, Stats};
use crate::release::{Holder, PendingReleases, ReleaseRoute};
use crate::scheduler::{Job, JobQueue, TrimScheduler};
use crate::traits::{CacheKey, CacheValue};

/// Pending owner-thread releases drained per cache call on the owner thread.
const MAX_PENDING_RELEASES: usize = 16;

/// Holders the owner queue keeps before overflow goes to the worker.
const PENDING_RELEASE_CAPACITY: usize = 1024;

/// State shared between the cache handle and its trim worker.
pub(crate) struct Inner<K, V> {
	/// The only lock guarding entries and aggregates
	pub(crate) index: Mutex<OrderedIndex<K, V>>,
	pub(crate) settings: RwLock<CacheConfig>,
	pub(crate) stats: Stats,
	/// Set while a reactive cost trim is queued but not yet started
	pub(crate) cost_trim_queued: AtomicBool,
	jobs: Arc<JobQueue<K, V>>,
	pending: PendingReleases<K, V>,
}

impl<K: CacheKey, V: CacheValue> Inner<K, V> {
	fn new(config: CacheConfig, jobs: Arc<JobQueue<K, V>>) -> Self {
		Self {
			index: Mutex::new(OrderedIndex::new()),
			settings: RwLock::new(config),
			stats: Stats::default(),
			cost_trim_queued: AtomicBool::new(false),
			jobs,
			pending: PendingReleases::new(PENDING_RELEASE_CAPACITY),
		}
	}

	pub(crate) fn label(&self) -> String {
		self.settings.read().label().to_owned()
	}

	/// Drop a holder according to the release settings. Must be called
	/// without the index lock held.
	pub(crate) fn release(&self, holder: Holder<K, V>) {
		if holder.is_empty() {
			return;
		}
		let (on_owner_thread, asynchronously) = {
			let settings = self.settings.read();
			(settings.release_on_main_thread, settings.release_asynchronously)
		};
		let caller_is_owner = on_owner_thread && self.pending.is_owner();

		match ReleaseRoute::select(on_owner_thread, asynchronously, caller_is_owner) {
			ReleaseRoute::Inline => drop(holder),
			ReleaseRoute::Background => self.dispatch(Job::Release(holder)),
			ReleaseRoute::Owner => {
				if let Err(holder) = self.pending.defer(holder) {
					self.dispatch(Job::Release(holder));
				}
			}
		}
	}

	/// Release a bounded batch of deferred holders if called on the owner
	/// thread.
	fn drain_owned(&self) {
		if !self.pending.is_empty() && self.pending.is_owner() {
			self.pending.drain(MAX_PENDING_RELEASES);
		}
	}

	/// Queue a cost trim unless one is already waiting.
	fn request_cost_trim(&self) {
		if !self.cost_trim_queued.swap(true, Ordering::AcqRel) {
			self.dispatch(Job::TrimToCost);
		}
	}

	/// Hand a job to the worker, or run it here if there is none.
	fn dispatch(&self, job: Job<K, V>) {
		if let Err(job) = self.jobs.submit(job) {
			match job {
				Job::Release(holder) => drop(holder),
				Job::TrimToCost => self.run_cost_trim_job(),
			}
		}
	}
}

/// Thread-safe LRU cache bounded by entry count, total cost and entry age.
///
/// Share it across threads via `Arc<Cache<K, V>>`. Every operation takes a
/// single mutex for O(1) work; expensive work happens elsewhere:
///
/// - **Count overflow** from a `put` evicts the least recently used entry
///   inline. A single put can only overshoot the count limit by one.
/// - **Cost overflow** queues a cost trim on the background worker, so `put`
///   never blocks on a long eviction sweep.
/// - **Age** is enforced by the periodic trim, which runs the cost, count and
///   age sweeps every `auto_trim_interval`.
///
/// Evicted values are never dropped while the lock is held. See
/// [`CacheConfig::release_asynchronously`] and
/// [`CacheConfig::release_on_main_thread`] for where they are dropped.
///
/// # Example
///
/// ```
/// use recency_cache::CacheBuilder;
///
/// let cache = CacheBuilder::new().count_limit(2).build::<&str, u32>().unwrap();
///
/// cache.put("a", 1);
/// cache.put("b", 2);
/// cache.get("a");
/// cache.put("c", 3);
///
/// assert!(cache.contains_key("a"));
/// assert!(!cache.contains_key("b"));
/// assert!(cache.contains_key("c"));
/// ```
pub struct Cache<K: CacheKey, V: CacheValue> {
	pub(crate) inner: Arc<Inner<K, V>>,
	hooks: Hooks<K, V>,
	scheduler: Option<TrimScheduler<K, V>>,
}

impl<K: CacheKey, V: CacheValue> Cache<K, V> {
	/// Create an unbounded cache with default settings.
	///
	/// If the background worker cannot be started, the cache still works but
	/// runs trims and releases on the calling thread. Use
	/// [`Cache::with_config`] to treat that as an error instead.
	pub fn new() -> Self {
		let (cache, spawn_error) = Self::assemble(CacheConfig::default());
		if let Some(err) = spawn_error {
			warn!(error = %err, "trim worker unavailable, trimming on caller threads");
		}
		cache
	}

	/// Create a cache from an explicit configuration.
	pub fn with_config(config: CacheConfig) -> Result<Self, ConfigError> {
		config.validate()?;
		match Self::assemble(config) {
			(cache, None) => Ok(cache),
			(_, Some(err)) => Err(ConfigError::Spawn(err)),
		}
	}

	fn assemble(config: CacheConfig) -> (Self, Option<io::Error>) {
		let label = config.label().to_owned();
		let jobs = Arc::new(JobQueue::new(config.auto_trim_interval));
		let inner = Arc::new(Inner::new(config, Arc::clone(&jobs)));

		let (scheduler, spawn_error) =
			match TrimScheduler::spawn(jobs, Arc::downgrade(&inner), &label) {
				Ok(scheduler) => (Some(scheduler), None),
				Err(err) => (None, Some(err)),
			};

		let cache = Self {
			inner,
			hooks: Hooks::new(),
			scheduler,
		};
		(cache, spawn_error)
	}

	/// Look up a value and mark it most recently used.
	pub fn get<Q>(&self, key: &Q) -> Option<Arc<V>>
	where
		K: Borrow<Q>,
		Q: Hash + Eq + ?Sized,
	{
		self.inner.drain_owned();
		let value = {
			let mut index = self.inner.index.lock();
			index.touch(key, Instant::now())
		};
		self.inner.stats.record_lookup(value.is_some());
		value
	}

	/// Look up a value and clone it out of the cache.
	///
	/// Use [`get`](Self::get) if cloning `V` is expensive.
	pub fn get_clone<Q>(&self, key: &Q) -> Option<V>
	where
		K: Borrow<Q>,
		Q: Hash + Eq + ?Sized,
		V: Clone,
	{
		self.get(key).map(|value| (*value).clone())
	}

	/// Insert or replace a value with zero cost.
	pub fn put(&self, key: K, value: V) {
		self.put_with_cost(key, value, 0);
	}

	/// Insert or replace a value, using its deep heap size as its cost.
	pub fn put_sized(&self, key: K, value: V)
	where
		V: DeepSizeOf,
	{
		let cost = value.deep_size_of() as u64;
		self.put_with_cost(key, value, cost);
	}

	/// Insert or replace a value with the given cost.
	///
	/// The entry becomes the most recently used. If this puts the cache over
	/// its count limit, the least recently used entry is evicted before
	/// returning. If it puts the cache over its cost limit, a cost trim is
	/// queued on the background worker.
	pub fn put_with_cost(&self, key: K, value: V, cost: u64) {
		self.inner.drain_owned();

		let (count_limit, cost_limit) = {
			let settings = self.inner.settings.read();
			(settings.count_limit, settings.cost_limit)
		};
		let value = Arc::new(value);
		let mut holder = Holder::new();

		let over_cost = {
			let mut index = self.inner.index.lock();
			let replaced = index.upsert(key, value, cost, Instant::now());
			self.inner.stats.record_write(replaced.is_some());
			if let Some(old) = replaced {
				holder.push_replaced(old);
			}
			if count_limit.is_some_and(|limit| index.total_count() > limit)
				&& let Some(evicted) = index.remove_tail()
			{
				holder.push(evicted);
			}
			cost_limit.is_some_and(|limit| index.cost_exceeds(limit))
		};

		self.inner.stats.record_evictions(holder.entries());
		if over_cost {
			self.inner.request_cost_trim();
		}
		self.inner.release(holder);
	}

	/// Remove a key, returning its value if it was present.
	pub fn remove<Q>(&self, key: &Q) -> Option<Arc<V>>
	where
		K: Borrow<Q>,
		Q: Hash + Eq + ?Sized,
	{
		self.inner.drain_owned();
		let node = self.inner.index.lock().remove(key)?;
		self.inner.stats.record_removal();
		Some(node.value)
	}

	/// Remove every entry.
	pub fn clear(&self) {
		self.inner.drain_owned();
		let holder = Holder::detached(self.inner.index.lock().remove_all());
		self.inner.release(holder);
	}

	/// Check whether a key is present without touching it.
	pub fn contains_key<Q>(&self, key: &Q) -> bool
	where
		K: Borrow<Q>,
		Q: Hash + Eq + ?Sized,
	{
		self.inner.drain_owned();
		self.inner.index.lock().contains(key)
	}

	/// Number of entries.
	pub fn total_count(&self) -> usize {
		self.inner.drain_owned();
		self.inner.index.lock().total_count()
	}

	/// Sum of entry costs, saturated at `u64::MAX`.
	pub fn total_cost(&self) -> u64 {
		self.inner.drain_owned();
		self.inner.index.lock().total_cost()
	}

	/// Number of entries. Same as [`total_count`](Self::total_count).
	pub fn len(&self) -> usize {
		self.total_count()
	}

	pub fn is_empty(&self) -> bool {
		self.inner.drain_owned();
		self.inner.index.lock().is_empty()
	}

	/// Evict least recently used entries until at most `limit` remain.
	///
	/// A limit of zero removes everything. Returns the number of evicted
	/// entries. Runs on the calling thread, one entry per lock acquisition.
	pub fn trim_to_count(&self, limit: usize) -> usize {
		self.inner.trim_to_count(limit)
	}

	/// Evict least recently used entries until the total cost is at most
	/// `limit`. A limit of zero removes everything.
	pub fn trim_to_cost(&self, limit: u64) -> usize {
		self.inner.trim_to_cost(limit)
	}

	/// Evict every entry not touched within `limit`. A zero limit removes
	/// everything.
	pub fn trim_to_age(&self, limit: Duration) -> usize {
		self.inner.trim_to_age(limit)
	}

	/// Drop all values waiting for the owner thread.
	///
	/// Only meaningful with [`CacheConfig::release_on_main_thread`]. Every
	/// cache call on the owner thread already releases a small batch; this
	/// releases everything at once. Call it from the thread that built the
	/// cache, e.g. once per event loop turn. Returns the number of holders
	/// released.
	pub fn release_pending(&self) -> usize {
		self.inner.pending.drain(usize::MAX)
	}

	/// Host signalled memory pressure.
	///
	/// Runs the memory pressure callback, then clears the cache if
	/// `clear_on_memory_pressure` is set.
	pub fn on_memory_pressure(&self) {
		self.handle_event(LifecycleEvent::MemoryPressure);
	}

	/// Host moved to the background.
	///
	/// Runs the background callback, then clears the cache if
	/// `clear_on_background` is set.
	pub fn on_background(&self) {
		self.handle_event(LifecycleEvent::Background);
	}

	fn handle_event(&self, event: LifecycleEvent) {
		debug!(cache = %self.inner.label(), ?event, "lifecycle event");

		if let Some(callback) = self.hooks.get(event) {
			callback(self);
		}

		let should_clear = {
			let settings = self.inner.settings.read();
			match event {
				LifecycleEvent::MemoryPressure => settings.clear_on_memory_pressure,
				LifecycleEvent::Background => settings.clear_on_background,
			}
		};
		if should_clear {
			self.clear();
		}
	}

	pub fn set_memory_pressure_callback<F>(&self, callback: F)
	where
		F: Fn(&Cache<K, V>) + Send + Sync + 'static,
	{
		let callback: LifecycleCallback<K, V> = Arc::new(callback);
		self.hooks.set(LifecycleEvent::MemoryPressure, Some(callback));
	}

	pub fn set_background_callback<F>(&self, callback: F)
	where
		F: Fn(&Cache<K, V>) + Send + Sync + 'static,
	{
		let callback: LifecycleCallback<K, V> = Arc::new(callback);
		self.hooks.set(LifecycleEvent::Background, Some(callback));
	}

	pub fn clear_memory_pressure_callback(&self) {
		self.hooks.set(LifecycleEvent::MemoryPressure, None);
	}

	pub fn clear_background_callback(&self) {
		self.hooks.set(LifecycleEvent::Background, None);
	}

	/// Snapshot of the current configuration.
	pub fn config(&self) -> CacheConfig {
		self.inner.settings.read().clone()
	}

	/// The cache's name, if one was configured.
	pub fn name(&self) -> Option<String> {
		self.inner.settings.read().name.clone()
	}

	/// Replace the whole configuration.
	///
	/// Lowered limits are enforced by the next trim pass or `put`, not by this
	/// call.
	pub fn configure(&self, config: CacheConfig) -> Result<(), ConfigError> {
		config.validate()?;
		let interval = config.auto_trim_interval;
		debug!(cache = config.label(), ?config, "reconfigured cache");
		*self.inner.settings.write() = config;
		self.inner.jobs.set_interval(interval);
		Ok(())
	}

	pub fn set_count_limit(&self, limit: Option<usize>) {
		self.inner.settings.write().count_limit = limit;
	}

	pub fn set_cost_limit(&self, limit: Option<u64>) {
		self.inner.settings.write().cost_limit = limit;
	}

	pub fn set_age_limit(&self, limit: Option<Duration>) {
		self.inner.settings.write().age_limit = limit;
	}

	/// Change the periodic trim interval. `None` stops periodic trimming.
	pub fn set_auto_trim_interval(&self, interval: Option<Duration>) -> Result<(), ConfigError> {
		if let Some(every) = interval
			&& every.is_zero()
		{
			return Err(ConfigError::ZeroTrimInterval(every));
		}
		self.inner.settings.write().auto_trim_interval = interval;
		self.inner.jobs.set_interval(interval);
		Ok(())
	}

	pub fn set_release_on_main_thread(&self, enabled: bool) {
		self.inner.settings.write().release_on_main_thread = enabled;
	}

	pub fn set_release_asynchronously(&self, enabled: bool) {
		self.inner.settings.write().release_asynchronously = enabled;
	}

	pub fn set_clear_on_memory_pressure(&self, enabled: bool) {
		self.inner.settings.write().clear_on_memory_pressure = enabled;
	}

	pub fn set_clear_on_background(&self, enabled: bool) {
		self.inner.settings.write().clear_on_background = enabled;
	}

	/// Current counters and totals.
	pub fn metrics(&self) -> CacheMetrics {
		let (total_count, total_cost) = {
			let index = self.inner.index.lock();
			(index.total_count(), index.total_cost())
		};
		let cost_limit = self.inner.settings.read().cost_limit;
		self.inner.stats.snapshot(total_count, total_cost, cost_limit)
	}

	#[cfg(test)]
	pub(crate) fn keys_by_recency(&self) -> Vec<K> {
		self.inner.index.lock().keys_by_recency()
	}

	#[cfg(test)]
	pub(crate) fn check_invariants(&self) {
		self.inner.index.lock().check_invariants();
	}
}

impl<K: CacheKey, V: CacheValue> Default for Cache<K, V> {
	fn default() -> Self {
		Self::new()
	}
}

impl<K: CacheKey, V: CacheValue> fmt::Debug for Cache<K, V> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let (total_count, total_cost) = {
			let index = self.inner.index.lock();
			(index.total_count(), index.total_cost())
		};
		f.debug_struct("Cache")
			.field("name", &self.name())
			.field("total_count", &total_count)
			.field("total_cost", &total_cost)
			.field("pending_releases", &self.inner.pending.len())
			.finish_non_exhaustive()
	}
}

impl<K: CacheKey, V: CacheValue> Drop for Cache<K, V> {
	fn drop(&mut self) {
		// Stop the worker before the internals go away.
		drop(self.scheduler.take());
		self.inner.pending.drain(usize::MAX);
	}
}
