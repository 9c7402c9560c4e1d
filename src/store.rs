//! Token cache contract and the in-memory implementation used by identity clients.

pub mod memory;

pub use memory::MemoryTokenCache;

// self
use crate::{
	_prelude::*,
	auth::{Account, AccountId, ScopeSet, TokenRecord},
};

/// Boxed future returned by [`TokenCache`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract for issued tokens.
///
/// Records are partitioned by account (`None` for application tokens) and requested scope.
pub trait TokenCache
where
	Self: Send + Sync,
{
	/// Persists or replaces a token record.
	fn save(&self, record: TokenRecord) -> StoreFuture<'_, ()>;

	/// Fetches the record associated with the account + scope, if present.
	fn fetch<'a>(
		&'a self,
		account: Option<&'a AccountId>,
		scope: &'a ScopeSet,
	) -> StoreFuture<'a, Option<TokenRecord>>;

	/// Atomically rotates a refresh token if the expected secret matches.
	fn compare_and_swap_refresh<'a>(
		&'a self,
		account: Option<&'a AccountId>,
		scope: &'a ScopeSet,
		expected_refresh: Option<&'a str>,
		replacement: TokenRecord,
	) -> StoreFuture<'a, CompareAndSwapOutcome>;

	/// Marks a record as revoked at the provided instant.
	fn revoke<'a>(
		&'a self,
		account: Option<&'a AccountId>,
		scope: &'a ScopeSet,
		instant: OffsetDateTime,
	) -> StoreFuture<'a, Option<TokenRecord>>;

	/// Lists the signed-in accounts with at least one non-revoked record, in sign-in order.
	fn accounts(&self) -> StoreFuture<'_, Vec<Account>>;

	/// Drops every record.
	fn clear(&self) -> StoreFuture<'_, ()>;
}

/// Result of a refresh-token compare-and-swap attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareAndSwapOutcome {
	/// The refresh secret matched the expected value and the record was updated.
	Updated,
	/// The record exists but the expected refresh secret did not match.
	RefreshMismatch,
	/// No record matched the provided account + scope.
	Missing,
}

/// Error type produced by [`TokenCache`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
}

/// Unique key identifying a cached token record.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
	/// Account component; `None` for application tokens.
	pub account: Option<AccountId>,
	/// Scope fingerprint used for partitioning.
	pub scope_fingerprint: String,
}
impl CacheKey {
	/// Builds a key for the provided account and scope.
	pub fn new(account: Option<&AccountId>, scope: &ScopeSet) -> Self {
		Self { account: account.cloned(), scope_fingerprint: scope.fingerprint() }
	}

	/// Builds the key a record is stored under.
	pub fn for_record(record: &TokenRecord) -> Self {
		Self::new(record.account.as_ref().map(|account| &account.home_account_id), &record.scope)
	}
}
