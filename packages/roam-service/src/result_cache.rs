//! Bounded process-local TTL map.

use std::{
	collections::HashMap,
	sync::{Mutex, MutexGuard, PoisonError},
};

use time::{Duration, OffsetDateTime};

struct Entry<V> {
	value: V,
	stored_at: OffsetDateTime,
	/// `None` keeps the entry until it is evicted for space.
	expires_at: Option<OffsetDateTime>,
}

/// String-keyed cache with a fixed TTL and a size cap. When full, the entry with the oldest
/// store timestamp is evicted.
pub struct ResultCache<V> {
	entries: Mutex<HashMap<String, Entry<V>>>,
	ttl: Duration,
	max_entries: usize,
}
impl<V> ResultCache<V>
where
	V: Clone,
{
	pub fn new(ttl: Duration, max_entries: usize) -> Self {
		Self { entries: Mutex::new(HashMap::new()), ttl, max_entries: max_entries.max(1) }
	}

	pub fn get(&self, key: &str, now: OffsetDateTime) -> Option<V> {
		let mut entries = self.lock();
		let expired = entries.get(key)?.expires_at.is_some_and(|at| at <= now);

		if expired {
			entries.remove(key);

			return None;
		}

		entries.get(key).map(|entry| entry.value.clone())
	}

	pub fn insert(&self, key: impl Into<String>, value: V, now: OffsetDateTime) {
		self.store(key.into(), value, now, Some(now + self.ttl));
	}

	/// Stores without an expiry; the entry still counts toward the size cap.
	pub fn insert_pinned(&self, key: impl Into<String>, value: V, now: OffsetDateTime) {
		self.store(key.into(), value, now, None);
	}

	pub fn remove(&self, key: &str) -> Option<V> {
		self.lock().remove(key).map(|entry| entry.value)
	}

	pub fn len(&self) -> usize {
		self.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn store(
		&self,
		key: String,
		value: V,
		now: OffsetDateTime,
		expires_at: Option<OffsetDateTime>,
	) {
		let mut entries = self.lock();

		if !entries.contains_key(&key) {
			entries.retain(|_, entry| entry.expires_at.is_none_or(|at| at > now));

			while entries.len() >= self.max_entries {
				let Some(oldest) = entries
					.iter()
					.min_by(|(left_key, left), (right_key, right)| {
						left.stored_at.cmp(&right.stored_at).then_with(|| left_key.cmp(right_key))
					})
					.map(|(key, _)| key.clone())
				else {
					break;
				};

				entries.remove(&oldest);
			}
		}

		entries.insert(key, Entry { value, stored_at: now, expires_at });
	}

	fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry<V>>> {
		self.entries.lock().unwrap_or_else(PoisonError::into_inner)
	}
}
