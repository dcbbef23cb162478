use std::time::Duration;

use crate::error::ConfigError;

/// Default interval between background trim passes.
pub const DEFAULT_AUTO_TRIM_INTERVAL: Duration = Duration::from_secs(5);

/// Limits and behaviour switches for a [`Cache`](crate::Cache).
///
/// `None` limits mean "unbounded". A limit of zero is valid and means the
/// cache keeps nothing: the next trim pass removes every entry.
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use recency_cache::CacheConfig;
///
/// let config = CacheConfig {
///     count_limit: Some(1_000),
///     age_limit: Some(Duration::from_secs(60)),
///     ..CacheConfig::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
	/// Label used in log output and `Debug`.
	pub name: Option<String>,
	/// Maximum number of entries.
	pub count_limit: Option<usize>,
	/// Maximum sum of entry costs.
	pub cost_limit: Option<u64>,
	/// Maximum time since an entry was last touched.
	pub age_limit: Option<Duration>,
	/// Interval of the periodic background trim. `None` disables it.
	pub auto_trim_interval: Option<Duration>,
	/// Release evicted values on the thread that built the cache.
	///
	/// Values evicted on that thread are dropped inline. Values evicted on
	/// other threads wait in a bounded queue that the owner drains a batch of
	/// on each cache call, or fully with
	/// [`Cache::release_pending`](crate::Cache::release_pending). When the
	/// queue is full, further values are released on the background worker.
	/// Takes precedence over `release_asynchronously`.
	pub release_on_main_thread: bool,
	/// Release evicted values on the background worker instead of the
	/// evicting thread.
	pub release_asynchronously: bool,
	/// Remove every entry when the memory pressure hook fires.
	pub clear_on_memory_pressure: bool,
	/// Remove every entry when the background hook fires.
	pub clear_on_background: bool,
}

impl CacheConfig {
	/// Check the configuration for values the cache cannot run with.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if let Some(name) = &self.name
			&& name.is_empty()
		{
			return Err(ConfigError::EmptyName);
		}
		if let Some(interval) = self.auto_trim_interval
			&& interval.is_zero()
		{
			return Err(ConfigError::ZeroTrimInterval(interval));
		}
		Ok(())
	}

	/// Label for log lines.
	pub(crate) fn label(&self) -> &str {
		self.name.as_deref().unwrap_or("unnamed")
	}
}

impl Default for CacheConfig {
	fn default() -> Self {
		Self {
			name: None,
			count_limit: None,
			cost_limit: None,
			age_limit: None,
			auto_trim_interval: Some(DEFAULT_AUTO_TRIM_INTERVAL),
			release_on_main_thread: false,
			release_asynchronously: true,
			clear_on_memory_pressure: true,
			clear_on_background: true,
		}
	}
}
