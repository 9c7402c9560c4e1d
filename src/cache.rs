//! Process-wide key/value cache shared by request handlers.
//!
//! Values are stored as JSON with an optional per-entry expiry. The portal keeps the active mode
//! under [`MODE_KEY`] and pending sign-in flows under [`flow_key`].

// crates.io
use serde::de::DeserializeOwned;
use serde_json::Value;
// self
use crate::{_prelude::*, store::StoreError};

/// Key holding the active mode.
pub const MODE_KEY: &str = "mode";
/// Lifetime of a pending sign-in flow.
pub const FLOW_TTL: Duration = Duration::seconds(300);

/// Key under which the flow identified by `state` is kept.
pub fn flow_key(state: &str) -> String {
	format!("flow:{state}")
}

/// Storage contract for the shared cache.
pub trait SharedCache
where
	Self: Send + Sync,
{
	/// Returns the live value stored under `key`.
	fn get_value(&self, key: &str) -> Option<Value>;

	/// Stores `value`, expiring after `ttl` when one is given.
	fn set_value(&self, key: &str, value: Value, ttl: Option<Duration>);

	/// Removes and returns the live value stored under `key`.
	fn take_value(&self, key: &str) -> Option<Value>;

	/// Removes `key`; returns whether a live value was present.
	fn delete(&self, key: &str) -> bool;

	/// Drops every entry.
	fn clear(&self);
}
impl dyn SharedCache {
	/// Typed [`SharedCache::get_value`].
	pub fn get<T>(&self, key: &str) -> Result<Option<T>, StoreError>
	where
		T: DeserializeOwned,
	{
		self.get_value(key).map(decode).transpose()
	}

	/// Typed [`SharedCache::set_value`].
	pub fn set<T>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<(), StoreError>
	where
		T: Serialize,
	{
		let value = serde_json::to_value(value)
			.map_err(|e| StoreError::Serialization { message: e.to_string() })?;

		self.set_value(key, value, ttl);

		Ok(())
	}

	/// Typed [`SharedCache::take_value`].
	pub fn take<T>(&self, key: &str) -> Result<Option<T>, StoreError>
	where
		T: DeserializeOwned,
	{
		self.take_value(key).map(decode).transpose()
	}
}

fn decode<T>(value: Value) -> Result<T, StoreError>
where
	T: DeserializeOwned,
{
	serde_json::from_value(value).map_err(|e| StoreError::Serialization { message: e.to_string() })
}

#[derive(Debug)]
struct Entry {
	value: Value,
	expires_at: Option<OffsetDateTime>,
}
impl Entry {
	fn is_live(&self, now: OffsetDateTime) -> bool {
		self.expires_at.is_none_or(|instant| now < instant)
	}
}

/// In-memory [`SharedCache`] bounded by an entry threshold.
#[derive(Debug)]
pub struct SimpleCache {
	entries: Mutex<HashMap<String, Entry>>,
	threshold: usize,
}
impl SimpleCache {
	const DEFAULT_THRESHOLD: usize = 500;

	/// Overrides the maximum number of entries kept before pruning.
	pub fn with_threshold(mut self, threshold: usize) -> Self {
		self.threshold = threshold.max(1);

		self
	}

	fn prune(entries: &mut HashMap<String, Entry>, threshold: usize, now: OffsetDateTime) {
		if entries.len() < threshold {
			return;
		}

		entries.retain(|_, entry| entry.is_live(now));

		// Still full: entries closest to expiry go before permanent ones.
		while entries.len() >= threshold {
			let victim = entries
				.iter()
				.min_by_key(|(_, entry)| entry.expires_at.map_or((1, now), |instant| (0, instant)))
				.map(|(key, _)| key.clone());

			match victim {
				Some(key) => entries.remove(&key),
				None => break,
			};
		}
	}
}
impl Default for SimpleCache {
	fn default() -> Self {
		Self { entries: Default::default(), threshold: Self::DEFAULT_THRESHOLD }
	}
}
impl SharedCache for SimpleCache {
	fn get_value(&self, key: &str) -> Option<Value> {
		let now = OffsetDateTime::now_utc();
		let mut entries = self.entries.lock();

		match entries.get(key) {
			Some(entry) if entry.is_live(now) => Some(entry.value.clone()),
			Some(_) => {
				entries.remove(key);

				None
			},
			None => None,
		}
	}

	fn set_value(&self, key: &str, value: Value, ttl: Option<Duration>) {
		let now = OffsetDateTime::now_utc();
		let mut entries = self.entries.lock();

		if !entries.contains_key(key) {
			Self::prune(&mut entries, self.threshold, now);
		}

		entries.insert(key.to_owned(), Entry { value, expires_at: ttl.map(|ttl| now + ttl) });
	}

	fn take_value(&self, key: &str) -> Option<Value> {
		let now = OffsetDateTime::now_utc();

		self.entries.lock().remove(key).filter(|entry| entry.is_live(now)).map(|entry| entry.value)
	}

	fn delete(&self, key: &str) -> bool {
		self.take_value(key).is_some()
	}

	fn clear(&self) {
		self.entries.lock().clear();
	}
}
