use std::hash::Hash;

/// Bounds every cache key must satisfy.
///
/// Implemented automatically for any type that is hashable, comparable,
/// cloneable and safe to share across threads. The key is cloned once per
/// entry so that both the hash index and the recency list can refer to it.
///
/// # Example
///
/// ```
/// use recency_cache::CacheKey;
///
/// fn assert_key<K: CacheKey>() {}
///
/// assert_key::<String>();
/// assert_key::<(u32, &'static str)>();
/// ```
pub trait CacheKey: Hash + Eq + Clone + Send + Sync + 'static {}

impl<T> CacheKey for T where T: Hash + Eq + Clone + Send + Sync + 'static {}

/// Bounds every cached value must satisfy.
///
/// Values are stored behind an `Arc` and may be released on a background
/// thread, so they must be `Send + Sync`.
pub trait CacheValue: Send + Sync + 'static {}

impl<T> CacheValue for T where T: Send + Sync + 'static {}
