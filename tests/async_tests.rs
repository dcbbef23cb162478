//! Async usage patterns.

use std::sync::Arc;
use std::time::Duration;

use recency_cache::{Cache, CacheBuilder};

#[derive(Clone, Debug, PartialEq)]
struct Session {
	user: String,
}

fn session(user: &str) -> Session {
	Session {
		user: user.to_string(),
	}
}

#[tokio::test]
async fn test_get_arc_across_await() {
	let cache: Arc<Cache<u64, Session>> = Arc::new(Cache::new());
	cache.put(1, session("alice"));

	// The Arc stays valid across an await, even if the entry is evicted.
	if let Some(value) = cache.get(&1) {
		tokio::time::sleep(Duration::from_millis(1)).await;
		cache.remove(&1);
		assert_eq!(value.user, "alice");
	}
	assert!(!cache.contains_key(&1));
}

#[tokio::test]
async fn test_get_clone_before_await() {
	let cache: Arc<Cache<u64, Session>> = Arc::new(Cache::new());
	cache.put(2, session("bob"));

	let value = cache.get_clone(&2);
	tokio::time::sleep(Duration::from_millis(1)).await;
	assert_eq!(value, Some(session("bob")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_tasks() {
	let cache: Arc<Cache<u64, Session>> =
		Arc::new(CacheBuilder::new().count_limit(100).build().unwrap());

	let mut handles = Vec::new();
	for task in 0..10u64 {
		let cache = Arc::clone(&cache);
		handles.push(tokio::spawn(async move {
			for i in 0..20u64 {
				let key = task * 100 + i;
				cache.put(key, session(&format!("user-{key}")));
				tokio::task::yield_now().await;
				if let Some(value) = cache.get(&key) {
					assert_eq!(value.user, format!("user-{key}"));
				}
			}
		}));
	}

	for handle in handles {
		handle.await.unwrap();
	}
	assert!(cache.total_count() <= 100);
}

#[tokio::test]
async fn test_background_trim_while_tasks_run() {
	let cache: Arc<Cache<u64, Vec<u8>>> = Arc::new(
		CacheBuilder::new()
			.cost_limit(1024)
			.auto_trim_interval(Some(Duration::from_millis(5)))
			.build()
			.unwrap(),
	);

	for key in 0..64u64 {
		cache.put_with_cost(key, vec![0; 64], 64);
		tokio::task::yield_now().await;
	}

	let mut settled = false;
	for _ in 0..200 {
		if cache.total_cost() <= 1024 {
			settled = true;
			break;
		}
		tokio::time::sleep(Duration::from_millis(5)).await;
	}
	assert!(settled);
	assert!(cache.contains_key(&63));
}
