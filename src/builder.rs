use std::time::Duration;

use crate::cache::Cache;
use crate::config::CacheConfig;
use crate::error::ConfigError;
use crate::traits::{CacheKey, CacheValue};

/// Builder for configuring a Cache.
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use recency_cache::CacheBuilder;
///
/// let cache = CacheBuilder::new()
///     .name("thumbnails")
///     .cost_limit(64 * 1024 * 1024) // 64 MB
///     .age_limit(Duration::from_secs(300))
///     .build::<u64, Vec<u8>>()
///     .unwrap();
///
/// cache.put_with_cost(7, vec![0; 1024], 1024);
/// assert_eq!(cache.total_cost(), 1024);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CacheBuilder {
	config: CacheConfig,
}

impl CacheBuilder {
	/// Create a builder with default settings: no limits, a 5 second trim
	/// interval, and asynchronous release.
	pub fn new() -> Self {
		Self::default()
	}

	/// Label the cache in log output.
	pub fn name(mut self, name: impl Into<String>) -> Self {
		self.config.name = Some(name.into());
		self
	}

	/// Maximum number of entries.
	///
	/// Default: unbounded
	pub fn count_limit(mut self, limit: usize) -> Self {
		self.config.count_limit = Some(limit);
		self
	}

	/// Maximum sum of entry costs.
	///
	/// Default: unbounded
	pub fn cost_limit(mut self, limit: u64) -> Self {
		self.config.cost_limit = Some(limit);
		self
	}

	/// Maximum time since an entry was last read or written.
	///
	/// Default: unbounded
	pub fn age_limit(mut self, limit: Duration) -> Self {
		self.config.age_limit = Some(limit);
		self
	}

	/// Interval between periodic trim passes. `None` disables them; count
	/// and cost limits are then only enforced by `put`.
	///
	/// Default: 5 seconds
	pub fn auto_trim_interval(mut self, interval: Option<Duration>) -> Self {
		self.config.auto_trim_interval = interval;
		self
	}

	/// Default: false
	pub fn release_on_main_thread(mut self, enabled: bool) -> Self {
		self.config.release_on_main_thread = enabled;
		self
	}

	/// Default: true
	pub fn release_asynchronously(mut self, enabled: bool) -> Self {
		self.config.release_asynchronously = enabled;
		self
	}

	/// Default: true
	pub fn clear_on_memory_pressure(mut self, enabled: bool) -> Self {
		self.config.clear_on_memory_pressure = enabled;
		self
	}

	/// Default: true
	pub fn clear_on_background(mut self, enabled: bool) -> Self {
		self.config.clear_on_background = enabled;
		self
	}

	/// The configuration built so far.
	pub fn config(&self) -> &CacheConfig {
		&self.config
	}

	/// Validate the settings and start the cache.
	pub fn build<K: CacheKey, V: CacheValue>(self) -> Result<Cache<K, V>, ConfigError> {
		Cache::with_config(self.config)
	}
}

impl From<CacheConfig> for CacheBuilder {
	fn from(config: CacheConfig) -> Self {
		Self {
			config,
		}
	}
}
