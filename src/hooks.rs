//! Lifecycle callbacks.
//!
//! The cache does not subscribe to any platform notifications itself. An
//! integration layer calls [`Cache::on_memory_pressure`] or
//! [`Cache::on_background`] when the host signals it; the cache then runs the
//! registered callback and, if configured, clears itself.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::cache::Cache;
use crate::traits::{CacheKey, CacheValue};

/// Callback invoked with the cache that received a lifecycle event.
pub type LifecycleCallback<K, V> = Arc<dyn Fn(&Cache<K, V>) + Send + Sync>;

/// Signals delivered by the host environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
	/// The host is running low on memory.
	MemoryPressure,
	/// The host application moved to the background.
	Background,
}

/// Registered callbacks, one per event.
pub(crate) struct Hooks<K: CacheKey, V: CacheValue> {
	memory_pressure: RwLock<Option<LifecycleCallback<K, V>>>,
	background: RwLock<Option<LifecycleCallback<K, V>>>,
}

impl<K: CacheKey, V: CacheValue> Hooks<K, V> {
	pub(crate) fn new() -> Self {
		Self {
			memory_pressure: RwLock::new(None),
			background: RwLock::new(None),
		}
	}

	fn slot(&self, event: LifecycleEvent) -> &RwLock<Option<LifecycleCallback<K, V>>> {
		match event {
			LifecycleEvent::MemoryPressure => &self.memory_pressure,
			LifecycleEvent::Background => &self.background,
		}
	}

	pub(crate) fn set(&self, event: LifecycleEvent, callback: Option<LifecycleCallback<K, V>>) {
		*self.slot(event).write() = callback;
	}

	/// The callback for `event`, cloned out so it runs without the slot lock
	/// held and may re-register itself.
	pub(crate) fn get(&self, event: LifecycleEvent) -> Option<LifecycleCallback<K, V>> {
		self.slot(event).read().clone()
	}
}
