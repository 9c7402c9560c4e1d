//! Account listing and silent token acquisition backed by cached refresh tokens.
//!
//! A fresh cached record is returned as is. A stale one is renewed with the refresh grant and
//! rotated in the cache with compare-and-swap, so two concurrent renewals never resurrect an
//! already-consumed refresh token. A rejected refresh token revokes the record.

// self
use crate::{
	_prelude::*,
	auth::{Account, IdTokenClaims, ScopeSet, TokenRecord},
	identity::{CachedTokenRequest, IdentityClient, common},
	obs::{self, Operation},
	provider::GrantType,
	store::CompareAndSwapOutcome,
};

impl IdentityClient {
	/// Accounts with a usable record in the token cache, in sign-in order.
	pub async fn accounts(&self) -> Result<Vec<Account>> {
		Ok(self.cache.accounts().await?)
	}

	/// Returns a token for `account` without user interaction.
	///
	/// `Ok(None)` means the caller has to sign the user in again: nothing is cached, the record
	/// carries no refresh token, or the provider rejected the refresh token.
	pub async fn acquire_token_silent(
		&self,
		scope: &ScopeSet,
		account: &Account,
	) -> Result<Option<TokenRecord>> {
		self.refresh_access_token(CachedTokenRequest::new(
			Some(account.home_account_id.clone()),
			scope.clone(),
		))
		.await
	}

	/// Refresh grant with explicit cache controls.
	pub async fn refresh_access_token(
		&self,
		request: CachedTokenRequest,
	) -> Result<Option<TokenRecord>> {
		obs::observe(Operation::Silent, "refresh_access_token", self.refresh_now(request)).await
	}

	async fn refresh_now(&self, request: CachedTokenRequest) -> Result<Option<TokenRecord>> {
		self.ensure_supported(GrantType::RefreshToken)?;

		let account = request.account.as_ref();
		let scope = &request.scope;
		let guard = common::flow_guard(self, &request.key());
		let _singleflight = guard.lock().await;
		let now = OffsetDateTime::now_utc();
		let Some(current) = self.cache.fetch(account, scope).await? else {
			return Ok(None);
		};

		if current.is_revoked() {
			return Ok(None);
		}
		if !request.should_refresh(&current, now) {
			return Ok(Some(current));
		}

		let Some(expected_refresh) =
			current.refresh_token.as_ref().map(|secret| secret.expose().to_owned())
		else {
			return Ok(None);
		};
		let issued = match self
			.facade()?
			.refresh_token(self.strategy.as_ref(), &expected_refresh, &scope.with_reserved())
			.await
		{
			Ok(issued) => issued,
			Err(Error::InvalidGrant { reason }) => {
				tracing::warn!(%reason, "Refresh token rejected; revoking the cached record.");

				self.cache.revoke(account, scope, now).await?;

				return Ok(None);
			},
			Err(e) => return Err(e),
		};
		let claims = match issued.id_token.as_deref() {
			Some(id_token) => IdTokenClaims::decode(id_token)?,
			None => current.id_token_claims.clone().unwrap_or_default(),
		};
		let mut builder = TokenRecord::builder(scope.clone())
			.id_token_claims(claims)
			.access_token(issued.access_token)
			.issued_at(issued.issued_at)
			.expires_in(issued.expires_in)
			.refresh_token(issued.refresh_token.unwrap_or_else(|| expected_refresh.clone()));

		if let Some(account) = current.account.clone() {
			builder = builder.account(account);
		}

		let updated = builder.build().map_err(common::map_token_builder_error)?;
		let outcome = self
			.cache
			.compare_and_swap_refresh(account, scope, Some(&expected_refresh), updated.clone())
			.await?;
		let result = match outcome {
			CompareAndSwapOutcome::Updated => updated,
			CompareAndSwapOutcome::Missing => {
				self.cache.save(updated.clone()).await?;

				updated
			},
			// Another renewal won the race; its record is authoritative.
			CompareAndSwapOutcome::RefreshMismatch => match self.cache.fetch(account, scope).await? {
				Some(existing) => existing,
				None => {
					self.cache.save(updated.clone()).await?;

					updated
				},
			},
		};

		Ok(Some(result))
	}
}
