//! Errors reported while configuring a cache.

use std::io;
use std::time::Duration;

/// A configuration the cache refuses to run with.
///
/// Configuration is validated once, when the cache is built or reconfigured.
/// Ordinary cache operations never fail: a miss is `None` and overflow is
/// handled by eviction.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	/// Periodic trimming was requested with a zero interval.
	#[error("auto trim interval must be non-zero (got {0:?}); use `None` to disable it")]
	ZeroTrimInterval(Duration),

	/// The cache name was set to an empty string.
	#[error("cache name must not be empty")]
	EmptyName,

	/// The background trim worker could not be started.
	#[error("failed to spawn background trim worker: {0}")]
	Spawn(#[source] io::Error),
}
