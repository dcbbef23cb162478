//! Deferred release of evicted values.
//!
//! Values can be expensive to drop (decoded images, large buffers), so nothing
//! removed from the index is dropped while the index lock is held. Removed
//! nodes are collected into a [`Holder`]; once the lock is released the holder
//! is routed according to the cache's release settings:
//!
//! - **Inline**: dropped immediately on the calling thread.
//! - **Background**: handed to the trim worker and dropped there.
//! - **Owner**: queued until the thread that built the cache drains it. The
//!   owner drains a small batch at the start of each cache call it makes; a
//!   full queue sends further holders to the worker instead.

use std::hash::Hash;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use crossbeam_queue::SegQueue;

use crate::index::{Node, OrderedIndex};

/// Values removed under the lock, kept alive until it is released.
pub(crate) struct Holder<K, V> {
	evicted: Vec<Node<K, V>>,
	replaced: Vec<Arc<V>>,
	detached: Option<OrderedIndex<K, V>>,
}

impl<K, V> Holder<K, V>
where
	K: Hash + Eq + Clone,
{
	pub(crate) fn new() -> Self {
		Self {
			evicted: Vec::new(),
			replaced: Vec::new(),
			detached: None,
		}
	}

	/// A holder for the whole contents of a cleared index.
	pub(crate) fn detached(index: OrderedIndex<K, V>) -> Self {
		Self {
			evicted: Vec::new(),
			replaced: Vec::new(),
			detached: Some(index),
		}
	}

	pub(crate) fn push(&mut self, node: Node<K, V>) {
		self.evicted.push(node);
	}

	/// Hold a value overwritten by `put`.
	pub(crate) fn push_replaced(&mut self, value: Arc<V>) {
		self.replaced.push(value);
	}

	/// Number of entries held, including a detached index.
	pub(crate) fn entries(&self) -> usize {
		self.evicted.len() + self.detached.as_ref().map_or(0, OrderedIndex::total_count)
	}

	pub(crate) fn is_empty(&self) -> bool {
		self.entries() == 0 && self.replaced.is_empty()
	}
}

/// Where a holder gets dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReleaseRoute {
	Inline,
	Background,
	Owner,
}

impl ReleaseRoute {
	/// Pick a route from the cache settings and the calling thread.
	///
	/// Owner-thread release wins over asynchronous release. A holder produced
	/// on the owner thread is already where it should be and is dropped inline.
	pub(crate) fn select(
		on_owner_thread: bool,
		asynchronously: bool,
		caller_is_owner: bool,
	) -> Self {
		match (on_owner_thread, asynchronously) {
			(true, _) if caller_is_owner => ReleaseRoute::Inline,
			(true, _) => ReleaseRoute::Owner,
			(false, true) => ReleaseRoute::Background,
			(false, false) => ReleaseRoute::Inline,
		}
	}
}

/// Holders waiting for the owner thread.
pub(crate) struct PendingReleases<K, V> {
	owner: ThreadId,
	queue: SegQueue<Holder<K, V>>,
	/// Soft cap; concurrent producers may overshoot it by one holder each.
	capacity: usize,
}

impl<K, V> PendingReleases<K, V> {
	/// Create a queue owned by the current thread.
	pub(crate) fn new(capacity: usize) -> Self {
		Self {
			owner: thread::current().id(),
			queue: SegQueue::new(),
			capacity,
		}
	}

	pub(crate) fn is_owner(&self) -> bool {
		thread::current().id() == self.owner
	}

	/// Queue a holder for the owner, or hand it back if the queue is full.
	pub(crate) fn defer(&self, holder: Holder<K, V>) -> Result<(), Holder<K, V>> {
		if self.queue.len() >= self.capacity {
			return Err(holder);
		}
		self.queue.push(holder);
		Ok(())
	}

	pub(crate) fn len(&self) -> usize {
		self.queue.len()
	}

	/// Drop up to `limit` queued holders on the calling thread.
	///
	/// Returns the number of holders dropped.
	pub(crate) fn drain(&self, limit: usize) -> usize {
		let mut drained = 0;
		while drained < limit {
			match self.queue.pop() {
				Some(holder) => {
					drop(holder);
					drained += 1;
				}
				None => break,
			}
		}
		drained
	}

	pub(crate) fn is_empty(&self) -> bool {
		self.queue.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::time::Instant;

	use super::*;

	struct DropCounter(Arc<AtomicUsize>);

	impl Drop for DropCounter {
		fn drop(&mut self) {
			self.0.fetch_add(1, Ordering::SeqCst);
		}
	}

	fn holder_with(drops: &Arc<AtomicUsize>, n: u32) -> Holder<u32, DropCounter> {
		let mut holder = Holder::new();
		for key in 0..n {
			holder.push(Node::new(key, Arc::new(DropCounter(drops.clone())), 1, Instant::now()));
		}
		holder
	}

	#[test]
	fn test_route_selection() {
		assert_eq!(ReleaseRoute::select(false, false, true), ReleaseRoute::Inline);
		assert_eq!(ReleaseRoute::select(false, true, true), ReleaseRoute::Background);
		assert_eq!(ReleaseRoute::select(true, false, true), ReleaseRoute::Inline);
		assert_eq!(ReleaseRoute::select(true, false, false), ReleaseRoute::Owner);
		assert_eq!(ReleaseRoute::select(true, true, true), ReleaseRoute::Inline);
		assert_eq!(ReleaseRoute::select(true, true, false), ReleaseRoute::Owner);
	}

	#[test]
	fn test_holder_counts() {
		let drops = Arc::new(AtomicUsize::new(0));
		let mut holder = holder_with(&drops, 3);
		assert_eq!(holder.entries(), 3);
		holder.push_replaced(Arc::new(DropCounter(drops.clone())));
		assert_eq!(holder.entries(), 3);
		assert!(!holder.is_empty());

		drop(holder);
		assert_eq!(drops.load(Ordering::SeqCst), 4);
	}

	#[test]
	fn test_detached_holder_releases_index() {
		let drops = Arc::new(AtomicUsize::new(0));
		let mut index = OrderedIndex::new();
		for key in 0..5u32 {
			index.upsert(key, Arc::new(DropCounter(drops.clone())), 2, Instant::now());
		}

		let holder = Holder::detached(index.remove_all());
		assert_eq!(holder.entries(), 5);
		assert_eq!(drops.load(Ordering::SeqCst), 0);

		drop(holder);
		assert_eq!(drops.load(Ordering::SeqCst), 5);
	}

	#[test]
	fn test_pending_drain_is_bounded() {
		let drops = Arc::new(AtomicUsize::new(0));
		let pending = PendingReleases::new(8);
		for _ in 0..5 {
			assert!(pending.defer(holder_with(&drops, 1)).is_ok());
		}

		assert_eq!(pending.drain(2), 2);
		assert_eq!(drops.load(Ordering::SeqCst), 2);
		assert_eq!(pending.drain(usize::MAX), 3);
		assert_eq!(drops.load(Ordering::SeqCst), 5);
		assert!(pending.is_empty());
	}

	#[test]
	fn test_owner_is_creating_thread() {
		let pending: Arc<PendingReleases<u32, u32>> = Arc::new(PendingReleases::new(1));
		assert!(pending.is_owner());

		let remote = pending.clone();
		let is_owner = thread::spawn(move || remote.is_owner()).join().unwrap();
		assert!(!is_owner);
	}

	#[test]
	fn test_full_queue_returns_holder() {
		let drops = Arc::new(AtomicUsize::new(0));
		let pending = PendingReleases::new(2);
		assert!(pending.defer(holder_with(&drops, 1)).is_ok());
		assert!(pending.defer(holder_with(&drops, 1)).is_ok());

		let rejected = pending.defer(holder_with(&drops, 3)).unwrap_err();
		assert_eq!(rejected.entries(), 3);
		assert_eq!(pending.len(), 2);

		drop(rejected);
		assert_eq!(drops.load(Ordering::SeqCst), 3);
		assert_eq!(pending.drain(1), 1);
		assert!(pending.defer(holder_with(&drops, 1)).is_ok());
	}
}
