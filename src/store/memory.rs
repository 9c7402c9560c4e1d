//! Thread-safe in-memory [`TokenCache`] implementation.

// self
use crate::{
	_prelude::*,
	auth::{Account, AccountId, ScopeSet, TokenRecord, TokenSecret},
	store::{CacheKey, CompareAndSwapOutcome, StoreError, StoreFuture, TokenCache},
};

#[derive(Debug, Default)]
struct Entries {
	records: HashMap<CacheKey, TokenRecord>,
	// Accounts in first-sign-in order.
	accounts: Vec<Account>,
}

type SharedEntries = Arc<RwLock<Entries>>;

/// Token cache that keeps records in-process for the lifetime of an identity client.
#[derive(Clone, Debug, Default)]
pub struct MemoryTokenCache(SharedEntries);
impl MemoryTokenCache {
	fn save_now(entries: SharedEntries, record: TokenRecord) -> Result<(), StoreError> {
		let key = CacheKey::for_record(&record);
		let mut guard = entries.write();

		if let Some(account) = &record.account {
			let known = guard
				.accounts
				.iter()
				.position(|known| known.home_account_id == account.home_account_id);

			match known {
				Some(idx) => guard.accounts[idx] = account.clone(),
				None => guard.accounts.push(account.clone()),
			}
		}

		guard.records.insert(key, record);

		Ok(())
	}

	fn cas_now(
		entries: SharedEntries,
		key: CacheKey,
		expected_refresh: Option<&str>,
		replacement: TokenRecord,
	) -> CompareAndSwapOutcome {
		let mut guard = entries.write();
		let outcome = match guard.records.get(&key) {
			Some(existing)
				if Self::refresh_matches(existing.refresh_token.as_ref(), expected_refresh) =>
				CompareAndSwapOutcome::Updated,
			Some(_) => CompareAndSwapOutcome::RefreshMismatch,
			None => CompareAndSwapOutcome::Missing,
		};

		if matches!(outcome, CompareAndSwapOutcome::Updated) {
			guard.records.insert(key, replacement);
		}

		outcome
	}

	fn refresh_matches(current: Option<&TokenSecret>, expected: Option<&str>) -> bool {
		match (current.map(TokenSecret::expose), expected) {
			(None, None) => true,
			(Some(cur), Some(exp)) => cur == exp,
			_ => false,
		}
	}

	fn revoke_now(
		entries: SharedEntries,
		key: CacheKey,
		instant: OffsetDateTime,
	) -> Option<TokenRecord> {
		let mut guard = entries.write();
		let record = guard.records.get_mut(&key)?;

		record.revoke(instant);

		Some(record.clone())
	}

	fn accounts_now(entries: SharedEntries) -> Vec<Account> {
		let guard = entries.read();

		guard
			.accounts
			.iter()
			.filter(|account| {
				guard.records.values().any(|record| {
					!record.is_revoked()
						&& record.account.as_ref().map(|owner| &owner.home_account_id)
							== Some(&account.home_account_id)
				})
			})
			.cloned()
			.collect()
	}
}
impl TokenCache for MemoryTokenCache {
	fn save(&self, record: TokenRecord) -> StoreFuture<'_, ()> {
		let entries = self.0.clone();

		Box::pin(async move { Self::save_now(entries, record) })
	}

	fn fetch<'a>(
		&'a self,
		account: Option<&'a AccountId>,
		scope: &'a ScopeSet,
	) -> StoreFuture<'a, Option<TokenRecord>> {
		let key = CacheKey::new(account, scope);
		let record = self.0.read().records.get(&key).cloned();

		Box::pin(async move { Ok(record) })
	}

	fn compare_and_swap_refresh<'a>(
		&'a self,
		account: Option<&'a AccountId>,
		scope: &'a ScopeSet,
		expected_refresh: Option<&'a str>,
		replacement: TokenRecord,
	) -> StoreFuture<'a, CompareAndSwapOutcome> {
		let entries = self.0.clone();
		let key = CacheKey::new(account, scope);

		Box::pin(async move { Ok(Self::cas_now(entries, key, expected_refresh, replacement)) })
	}

	fn revoke<'a>(
		&'a self,
		account: Option<&'a AccountId>,
		scope: &'a ScopeSet,
		instant: OffsetDateTime,
	) -> StoreFuture<'a, Option<TokenRecord>> {
		let entries = self.0.clone();
		let key = CacheKey::new(account, scope);

		Box::pin(async move { Ok(Self::revoke_now(entries, key, instant)) })
	}

	fn accounts(&self) -> StoreFuture<'_, Vec<Account>> {
		let entries = self.0.clone();

		Box::pin(async move { Ok(Self::accounts_now(entries)) })
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		let entries = self.0.clone();

		Box::pin(async move {
			*entries.write() = Entries::default();

			Ok(())
		})
	}
}
