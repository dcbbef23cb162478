//! Background trim worker.
//!
//! Each cache owns one worker thread. The worker sleeps on a condition
//! variable until either a job is queued or the periodic trim deadline passes:
//!
//! - **Jobs** are one-shot: the reactive cost trim queued by `put`, and holders
//!   of evicted values released asynchronously.
//! - **Ticks** run the full trim pass (cost, then count, then age) every
//!   `auto_trim_interval`.
//!
//! The worker only holds a `Weak` reference to the cache internals, so it never
//! keeps a dropped cache alive. Dropping the [`TrimScheduler`] signals the
//! worker and joins it.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_queue::SegQueue;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use crate::cache::Inner;
use crate::release::Holder;
use crate::traits::{CacheKey, CacheValue};

/// Work handed to the background worker.
pub(crate) enum Job<K, V> {
	/// Trim down to the current cost limit.
	TrimToCost,
	/// Drop a holder of released values.
	Release(Holder<K, V>),
}

struct WorkerState {
	shutdown: bool,
	interval: Option<Duration>,
}

/// Queue shared between the cache and its worker.
pub(crate) struct JobQueue<K, V> {
	jobs: SegQueue<Job<K, V>>,
	state: Mutex<WorkerState>,
	wakeup: Condvar,
	/// Set while a worker is accepting jobs
	running: AtomicBool,
}

impl<K, V> JobQueue<K, V> {
	pub(crate) fn new(interval: Option<Duration>) -> Self {
		Self {
			jobs: SegQueue::new(),
			state: Mutex::new(WorkerState {
				shutdown: false,
				interval,
			}),
			wakeup: Condvar::new(),
			running: AtomicBool::new(false),
		}
	}

	/// Queue a job for the worker.
	///
	/// Hands the job back if no worker is running, so the caller can run it
	/// inline instead.
	pub(crate) fn submit(&self, job: Job<K, V>) -> Result<(), Job<K, V>> {
		if !self.running.load(Ordering::Acquire) {
			return Err(job);
		}
		self.jobs.push(job);
		// Notify under the state lock so the worker cannot miss the push
		// between checking the queue and going to sleep.
		let _state = self.state.lock();
		self.wakeup.notify_one();
		Ok(())
	}

	/// Change the periodic trim interval. Takes effect immediately.
	pub(crate) fn set_interval(&self, interval: Option<Duration>) {
		let mut state = self.state.lock();
		state.interval = interval;
		self.wakeup.notify_one();
	}

	fn shutdown(&self) {
		self.running.store(false, Ordering::Release);
		let mut state = self.state.lock();
		state.shutdown = true;
		self.wakeup.notify_all();
	}

	/// Block until there is work or shutdown is requested.
	///
	/// Returns false on shutdown. Picks up interval changes and restarts the
	/// tick deadline when the interval changes.
	fn wait(&self, interval: &mut Option<Duration>, next_tick: &mut Option<Instant>) -> bool {
		let mut state = self.state.lock();
		loop {
			if state.shutdown {
				return false;
			}
			if state.interval != *interval {
				*interval = state.interval;
				*next_tick = interval.map(|every| Instant::now() + every);
			}
			if !self.jobs.is_empty() {
				return true;
			}
			match *next_tick {
				Some(deadline) if Instant::now() >= deadline => return true,
				Some(deadline) => {
					self.wakeup.wait_until(&mut state, deadline);
				}
				None => self.wakeup.wait(&mut state),
			}
		}
	}
}

/// Owns the worker thread; dropping it stops the worker.
pub(crate) struct TrimScheduler<K, V> {
	queue: Arc<JobQueue<K, V>>,
	handle: Option<JoinHandle<()>>,
}

impl<K: CacheKey, V: CacheValue> TrimScheduler<K, V> {
	/// Start a worker for the given cache internals.
	pub(crate) fn spawn(
		queue: Arc<JobQueue<K, V>>,
		inner: Weak<Inner<K, V>>,
		label: &str,
	) -> io::Result<Self> {
		queue.running.store(true, Ordering::Release);

		let worker_queue = Arc::clone(&queue);
		let spawned = thread::Builder::new()
			.name(format!("recency-cache-trim-{label}"))
			.spawn(move || run(worker_queue, inner));

		match spawned {
			Ok(handle) => {
				debug!(cache = label, "trim worker started");
				Ok(Self {
					queue,
					handle: Some(handle),
				})
			}
			Err(err) => {
				queue.running.store(false, Ordering::Release);
				Err(err)
			}
		}
	}
}

impl<K, V> Drop for TrimScheduler<K, V> {
	fn drop(&mut self) {
		self.queue.shutdown();
		if let Some(handle) = self.handle.take() {
			// A worker cannot join itself; it exits on its own once it sees
			// the shutdown flag.
			if handle.thread().id() != thread::current().id() {
				let _ = handle.join();
			}
		}
	}
}

fn run<K: CacheKey, V: CacheValue>(queue: Arc<JobQueue<K, V>>, inner: Weak<Inner<K, V>>) {
	let mut interval = None;
	let mut next_tick = None;

	while queue.wait(&mut interval, &mut next_tick) {
		while let Some(job) = queue.jobs.pop() {
			match job {
				Job::Release(holder) => drop(holder),
				Job::TrimToCost => {
					let Some(inner) = inner.upgrade() else {
						return;
					};
					inner.run_cost_trim_job();
				}
			}
		}

		if next_tick.is_some_and(|deadline| Instant::now() >= deadline) {
			let Some(inner) = inner.upgrade() else {
				return;
			};
			trace!("periodic trim");
			inner.trim_all();
			next_tick = interval.map(|every| Instant::now() + every);
		}
	}

	trace!("trim worker stopped");
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_submit_without_worker_returns_job() {
		let queue: JobQueue<u32, u32> = JobQueue::new(None);
		assert!(matches!(queue.submit(Job::TrimToCost), Err(Job::TrimToCost)));
		assert!(queue.jobs.is_empty());
	}

	#[test]
	fn test_submit_with_running_flag_queues() {
		let queue: JobQueue<u32, u32> = JobQueue::new(None);
		queue.running.store(true, Ordering::Release);
		assert!(queue.submit(Job::TrimToCost).is_ok());
		assert_eq!(queue.jobs.len(), 1);
	}

	#[test]
	fn test_wait_returns_false_after_shutdown() {
		let queue: JobQueue<u32, u32> = JobQueue::new(Some(Duration::from_secs(60)));
		queue.shutdown();

		let mut interval = None;
		let mut next_tick = None;
		assert!(!queue.wait(&mut interval, &mut next_tick));
	}

	#[test]
	fn test_wait_picks_up_interval() {
		let queue: JobQueue<u32, u32> = JobQueue::new(Some(Duration::from_millis(5)));

		let mut interval = None;
		let mut next_tick = None;
		let started = Instant::now();
		assert!(queue.wait(&mut interval, &mut next_tick));
		assert_eq!(interval, Some(Duration::from_millis(5)));
		assert!(started.elapsed() >= Duration::from_millis(5));
	}

	#[test]
	fn test_wait_wakes_on_job() {
		let queue: Arc<JobQueue<u32, u32>> = Arc::new(JobQueue::new(None));
		queue.running.store(true, Ordering::Release);

		let producer = Arc::clone(&queue);
		let handle = thread::spawn(move || {
			thread::sleep(Duration::from_millis(20));
			assert!(producer.submit(Job::TrimToCost).is_ok());
		});

		let mut interval = None;
		let mut next_tick = None;
		assert!(queue.wait(&mut interval, &mut next_tick));
		assert_eq!(queue.jobs.len(), 1);
		handle.join().unwrap();
	}
}
