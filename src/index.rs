//! Hash index plus recency list for cache entries.
//!
//! `OrderedIndex` pairs a hash map from key to slot handle with a doubly linked
//! list threaded through a `Vec` of slots. The list runs from the most recently
//! used entry (head) to the least recently used one (tail), so every recency
//! update and every eviction is O(1).
//!
//! # Slot arena
//!
//! Links are slot indices rather than pointers. Freed slots form an intrusive
//! free list and are reused by later insertions, so the arena never grows past
//! the peak number of live entries.
//!
//! # Aggregates
//!
//! The index owns `total_count` and `total_cost`. Removal always subtracts the
//! removed entry's cost from the aggregate; updates apply the difference
//! between the new and old cost. The cost sum is kept in a `u128`, so any
//! number of `u64` costs adds up exactly; [`OrderedIndex::total_cost`]
//! saturates at `u64::MAX` when reporting it.

use std::borrow::Borrow;
use std::hash::Hash;
use std::mem;
use std::sync::Arc;
use std::time::Instant;

use ahash::RandomState;
use hashbrown::HashMap;

/// Handle to a slot in the arena.
type SlotId = usize;

/// A single cache entry.
pub(crate) struct Node<K, V> {
	pub(crate) key: K,
	pub(crate) value: Arc<V>,
	pub(crate) cost: u64,
	/// Set on creation and on every touch.
	pub(crate) last_access: Instant,
	prev: Option<SlotId>,
	next: Option<SlotId>,
}

impl<K, V> Node<K, V> {
	pub(crate) fn new(key: K, value: Arc<V>, cost: u64, now: Instant) -> Self {
		Self {
			key,
			value,
			cost,
			last_access: now,
			prev: None,
			next: None,
		}
	}
}

enum Slot<K, V> {
	Occupied(Node<K, V>),
	/// Free slot, linked to the next free slot.
	Vacant(Option<SlotId>),
}

/// Recency-ordered entry storage.
///
/// Not thread-safe on its own; the cache wraps it in a `Mutex`.
pub(crate) struct OrderedIndex<K, V> {
	by_key: HashMap<K, SlotId, RandomState>,
	slots: Vec<Slot<K, V>>,
	/// Head of the free slot list
	free: Option<SlotId>,
	/// Most recently used
	head: Option<SlotId>,
	/// Least recently used
	tail: Option<SlotId>,
	total_cost: u128,
	total_count: usize,
}

impl<K, V> OrderedIndex<K, V>
where
	K: Hash + Eq + Clone,
{
	pub(crate) fn new() -> Self {
		Self {
			by_key: HashMap::with_hasher(RandomState::new()),
			slots: Vec::new(),
			free: None,
			head: None,
			tail: None,
			total_cost: 0,
			total_count: 0,
		}
	}

	/// Sum of entry costs, saturated at `u64::MAX`.
	pub(crate) fn total_cost(&self) -> u64 {
		u64::try_from(self.total_cost).unwrap_or(u64::MAX)
	}

	/// Whether the exact cost sum is above `limit`.
	pub(crate) fn cost_exceeds(&self, limit: u64) -> bool {
		self.total_cost > u128::from(limit)
	}

	pub(crate) fn total_count(&self) -> usize {
		self.total_count
	}

	pub(crate) fn is_empty(&self) -> bool {
		self.total_count == 0
	}

	pub(crate) fn contains<Q>(&self, key: &Q) -> bool
	where
		K: Borrow<Q>,
		Q: Hash + Eq + ?Sized,
	{
		self.by_key.contains_key(key)
	}

	/// Look up an entry without touching it.
	#[cfg(test)]
	pub(crate) fn get<Q>(&self, key: &Q) -> Option<&Node<K, V>>
	where
		K: Borrow<Q>,
		Q: Hash + Eq + ?Sized,
	{
		let id = *self.by_key.get(key)?;
		Some(self.node(id))
	}

	/// Look up an entry, refresh its access time and move it to the head.
	pub(crate) fn touch<Q>(&mut self, key: &Q, now: Instant) -> Option<Arc<V>>
	where
		K: Borrow<Q>,
		Q: Hash + Eq + ?Sized,
	{
		let id = *self.by_key.get(key)?;
		let node = self.node_mut(id);
		node.last_access = now;
		let value = Arc::clone(&node.value);
		self.move_to_head(id);
		Some(value)
	}

	/// Insert a new entry or overwrite an existing one, leaving it at the head.
	///
	/// Returns the replaced value if the key already existed.
	pub(crate) fn upsert(
		&mut self,
		key: K,
		value: Arc<V>,
		cost: u64,
		now: Instant,
	) -> Option<Arc<V>> {
		if let Some(&id) = self.by_key.get(&key) {
			let node = self.node_mut(id);
			let old_cost = mem::replace(&mut node.cost, cost);
			let old_value = mem::replace(&mut node.value, value);
			node.last_access = now;
			self.total_cost = self.total_cost - u128::from(old_cost) + u128::from(cost);
			self.move_to_head(id);
			return Some(old_value);
		}

		self.insert_at_head(Node::new(key, value, cost, now));
		None
	}

	/// Link a node as the new head. The key must not already be present.
	fn insert_at_head(&mut self, node: Node<K, V>) {
		debug_assert!(!self.by_key.contains_key(&node.key), "key inserted twice");

		let key = node.key.clone();
		self.total_cost += u128::from(node.cost);
		self.total_count += 1;

		let id = self.alloc(node);
		self.link_front(id);
		self.by_key.insert(key, id);
	}

	/// Remove an entry by key.
	pub(crate) fn remove<Q>(&mut self, key: &Q) -> Option<Node<K, V>>
	where
		K: Borrow<Q>,
		Q: Hash + Eq + ?Sized,
	{
		let id = *self.by_key.get(key)?;
		Some(self.remove_slot(id))
	}

	/// Remove the least recently used entry.
	pub(crate) fn remove_tail(&mut self) -> Option<Node<K, V>> {
		let id = self.tail?;
		Some(self.remove_slot(id))
	}

	/// The least recently used entry.
	pub(crate) fn peek_tail(&self) -> Option<&Node<K, V>> {
		self.tail.map(|id| self.node(id))
	}

	/// Detach every entry at once.
	///
	/// The returned index owns all former entries; dropping it releases them.
	/// Only the bookkeeping swap happens here, so callers can drop the result
	/// after releasing their lock.
	pub(crate) fn remove_all(&mut self) -> OrderedIndex<K, V> {
		mem::replace(self, Self::new())
	}

	fn move_to_head(&mut self, id: SlotId) {
		if self.head == Some(id) {
			return;
		}
		self.unlink(id);
		self.link_front(id);
	}

	fn remove_slot(&mut self, id: SlotId) -> Node<K, V> {
		self.unlink(id);
		let node = self.release_slot(id);
		self.by_key.remove(&node.key);
		self.total_cost -= u128::from(node.cost);
		self.total_count -= 1;
		node
	}

	fn link_front(&mut self, id: SlotId) {
		let old_head = self.head;
		{
			let node = self.node_mut(id);
			node.prev = None;
			node.next = old_head;
		}
		match old_head {
			Some(head) => self.node_mut(head).prev = Some(id),
			None => self.tail = Some(id),
		}
		self.head = Some(id);
	}

	fn unlink(&mut self, id: SlotId) {
		let (prev, next) = {
			let node = self.node_mut(id);
			(node.prev.take(), node.next.take())
		};
		match prev {
			Some(prev) => self.node_mut(prev).next = next,
			None => self.head = next,
		}
		match next {
			Some(next) => self.node_mut(next).prev = prev,
			None => self.tail = prev,
		}
	}

	fn alloc(&mut self, node: Node<K, V>) -> SlotId {
		match self.free {
			Some(id) => {
				self.free = match self.slots[id] {
					Slot::Vacant(next_free) => next_free,
					Slot::Occupied(_) => unreachable!("free list points at an occupied slot"),
				};
				self.slots[id] = Slot::Occupied(node);
				id
			}
			None => {
				self.slots.push(Slot::Occupied(node));
				self.slots.len() - 1
			}
		}
	}

	fn release_slot(&mut self, id: SlotId) -> Node<K, V> {
		match mem::replace(&mut self.slots[id], Slot::Vacant(self.free)) {
			Slot::Occupied(node) => {
				self.free = Some(id);
				node
			}
			Slot::Vacant(_) => unreachable!("released a vacant slot"),
		}
	}

	fn node(&self, id: SlotId) -> &Node<K, V> {
		match &self.slots[id] {
			Slot::Occupied(node) => node,
			Slot::Vacant(_) => unreachable!("linked slot is vacant"),
		}
	}

	fn node_mut(&mut self, id: SlotId) -> &mut Node<K, V> {
		match &mut self.slots[id] {
			Slot::Occupied(node) => node,
			Slot::Vacant(_) => unreachable!("linked slot is vacant"),
		}
	}

	/// Keys from most to least recently used.
	#[cfg(test)]
	pub(crate) fn keys_by_recency(&self) -> Vec<K> {
		let mut keys = Vec::with_capacity(self.total_count);
		let mut cursor = self.head;
		while let Some(id) = cursor {
			let node = self.node(id);
			keys.push(node.key.clone());
			cursor = node.next;
		}
		keys
	}

	/// Walk the list in both directions and check it against the map and the
	/// aggregates.
	#[cfg(test)]
	pub(crate) fn check_invariants(&self) {
		assert_eq!(self.head.is_none(), self.tail.is_none());
		assert_eq!(self.head.is_none(), self.total_count == 0);
		assert_eq!(self.by_key.len(), self.total_count);

		let mut seen = 0;
		let mut cost: u128 = 0;
		let mut prev: Option<SlotId> = None;
		let mut last_access: Option<Instant> = None;
		let mut cursor = self.head;
		while let Some(id) = cursor {
			let node = self.node(id);
			assert_eq!(node.prev, prev, "broken back link");
			assert_eq!(self.by_key.get(&node.key), Some(&id), "list and map disagree");
			if let Some(newer) = last_access {
				assert!(node.last_access <= newer, "recency order violated");
			}
			last_access = Some(node.last_access);
			seen += 1;
			cost += u128::from(node.cost);
			assert!(seen <= self.total_count, "cycle in recency list");
			prev = Some(id);
			cursor = node.next;
		}
		assert_eq!(prev, self.tail);
		assert_eq!(seen, self.total_count);
		assert_eq!(cost, self.total_cost);
	}
}

impl<K, V> Default for OrderedIndex<K, V>
where
	K: Hash + Eq + Clone,
{
	fn default() -> Self {
		Self::new()
	}
}
