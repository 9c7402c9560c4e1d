//! Cache evaluation and singleflight helpers shared by the token flows.

// self
use crate::{
	_prelude::*,
	auth::{AccountId, ScopeSet, TokenRecord, TokenRecordBuilderError},
	error::ConfigError,
	identity::IdentityClient,
	store::CacheKey,
};

/// Parameters for flows that consult the token cache before calling the provider.
#[derive(Clone, Debug)]
pub struct CachedTokenRequest {
	/// Account the token belongs to; `None` for application tokens.
	pub account: Option<AccountId>,
	/// Requested scope without the reserved OIDC scopes.
	pub scope: ScopeSet,
	/// Bypasses the cache when true.
	pub force: bool,
	/// Window before expiry in which a cached token is renewed early.
	pub preemptive_window: Duration,
}
impl CachedTokenRequest {
	const DEFAULT_PREEMPTIVE_WINDOW: Duration = Duration::seconds(60);

	/// Creates a request for the account and scope.
	pub fn new(account: Option<AccountId>, scope: ScopeSet) -> Self {
		Self {
			account,
			scope: scope.without_reserved(),
			force: false,
			preemptive_window: Self::DEFAULT_PREEMPTIVE_WINDOW,
		}
	}

	/// Forces a provider round-trip.
	pub fn force_refresh(mut self) -> Self {
		self.force = true;

		self
	}

	/// Cache key of the record this request reads and writes.
	pub fn key(&self) -> CacheKey {
		CacheKey::new(self.account.as_ref(), &self.scope)
	}

	/// Whether the cached record must be renewed at `now`.
	pub fn should_refresh(&self, record: &TokenRecord, now: OffsetDateTime) -> bool {
		if self.force || record.is_revoked() || record.is_expired_at(now) {
			return true;
		}

		let window = self.effective_preemptive_window();

		!window.is_zero() && record.expires_at - now <= window
	}

	// Jitter keeps callers with different keys from renewing in lockstep.
	fn effective_preemptive_window(&self) -> Duration {
		self.preemptive_window.checked_sub(self.preemptive_jitter()).unwrap_or(Duration::ZERO)
	}

	fn preemptive_jitter(&self) -> Duration {
		let window_secs = self.preemptive_window.whole_seconds();

		if window_secs <= 1 {
			return Duration::ZERO;
		}

		let modulus = u64::try_from(window_secs).unwrap_or(u64::MAX);
		let jitter_secs = self.jitter_seed() % modulus;

		Duration::seconds(i64::try_from(jitter_secs).unwrap_or(i64::MAX))
	}

	fn jitter_seed(&self) -> u64 {
		let mut hasher = DefaultHasher::new();

		self.account.hash(&mut hasher);
		self.scope.hash(&mut hasher);

		hasher.finish()
	}
}

/// Returns (creating on demand) the singleflight guard for a cache key.
pub(crate) fn flow_guard(client: &IdentityClient, key: &CacheKey) -> Arc<AsyncMutex<()>> {
	let mut guards = client.flow_guards.lock();

	guards.entry(key.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
}

pub(crate) fn map_token_builder_error(err: TokenRecordBuilderError) -> Error {
	ConfigError::from(err).into()
}
