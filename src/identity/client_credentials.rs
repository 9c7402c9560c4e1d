//! Application tokens via the client-credentials grant.
//!
//! Tokens are cached per scope under no account. Concurrent callers for the same scope share
//! one in-flight request through the per-key singleflight guard.

// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenRecord},
	identity::{CachedTokenRequest, IdentityClient, common},
	obs::{self, Operation},
	provider::GrantType,
};

impl IdentityClient {
	/// Returns a cached application token for `scope`, requesting a new one when needed.
	pub async fn acquire_token_for_client(&self, scope: &ScopeSet) -> Result<TokenRecord> {
		self.client_credentials(CachedTokenRequest::new(None, scope.clone())).await
	}

	/// Client-credentials grant with explicit cache controls.
	pub async fn client_credentials(&self, request: CachedTokenRequest) -> Result<TokenRecord> {
		obs::observe(Operation::AppToken, "client_credentials", async move {
			self.ensure_supported(GrantType::ClientCredentials)?;

			let guard = common::flow_guard(self, &request.key());
			let _singleflight = guard.lock().await;
			let now = OffsetDateTime::now_utc();

			if let Some(current) = self
				.cache
				.fetch(None, &request.scope)
				.await?
				.filter(|record| !request.should_refresh(record, now))
			{
				return Ok(current);
			}

			let issued = self
				.facade()?
				.exchange_client_credentials(self.strategy.as_ref(), &request.scope)
				.await?;
			let record = TokenRecord::builder(request.scope.clone())
				.access_token(issued.access_token)
				.issued_at(issued.issued_at)
				.expires_in(issued.expires_in)
				.build()
				.map_err(common::map_token_builder_error)?;

			self.cache.save(record.clone()).await?;

			Ok(record)
		})
		.await
	}
}
