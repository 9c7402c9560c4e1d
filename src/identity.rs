//! In-process identity client: authorization-code sign-in, client credentials, silent refresh,
//! and the account list, all backed by a [`TokenCache`].
//!
//! One [`IdentityClient`] is bound to one client registration (a profile). Switching profiles
//! means building a new client, which also drops the previous token cache.

pub mod auth_code;
pub mod client_credentials;
pub mod common;
pub mod silent;

pub use auth_code::*;
pub use common::*;

// self
use crate::{
	_prelude::*,
	config::ProfileConfig,
	error::ConfigError,
	http::ReqwestHttpClient,
	oauth::OidcFacade,
	provider::{DefaultProviderStrategy, GrantType, ProviderDescriptor, ProviderStrategy},
	store::{CacheKey, MemoryTokenCache, TokenCache},
};

/// Coordinates token flows for a single client registration.
#[derive(Clone)]
pub struct IdentityClient {
	/// HTTP client used for every token endpoint call.
	pub http_client: ReqwestHttpClient,
	/// Token cache holding issued records and the account list.
	pub cache: Arc<dyn TokenCache>,
	/// Provider endpoints and enabled grants.
	pub descriptor: ProviderDescriptor,
	/// Classifier for token endpoint failures.
	pub strategy: Arc<dyn ProviderStrategy>,
	/// OAuth client identifier.
	pub client_id: String,
	/// Client secret for confidential authentication.
	pub client_secret: Option<String>,
	flow_guards: Arc<Mutex<HashMap<CacheKey, Arc<AsyncMutex<()>>>>>,
}
impl IdentityClient {
	/// Creates a client that reuses a caller-provided transport.
	pub fn with_http_client(
		cache: Arc<dyn TokenCache>,
		descriptor: ProviderDescriptor,
		strategy: Arc<dyn ProviderStrategy>,
		client_id: impl Into<String>,
		http_client: ReqwestHttpClient,
	) -> Self {
		Self {
			http_client,
			cache,
			descriptor,
			strategy,
			client_id: client_id.into(),
			client_secret: None,
			flow_guards: Default::default(),
		}
	}

	/// Builds a client for a configured profile with a fresh in-memory token cache.
	pub fn from_profile(profile: &ProfileConfig, http_client: ReqwestHttpClient) -> Result<Self> {
		let descriptor = ProviderDescriptor::from_authority(&profile.authority)
			.map_err(ConfigError::from)?;
		let client = Self::with_http_client(
			Arc::new(MemoryTokenCache::default()),
			descriptor,
			Arc::new(DefaultProviderStrategy),
			profile.client_id.clone(),
			http_client,
		);

		Ok(match profile.client_secret.as_str() {
			"" => client,
			secret => client.with_client_secret(secret),
		})
	}

	/// Sets or replaces the client secret.
	pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Some(secret.into());

		self
	}

	pub(crate) fn facade(&self) -> Result<OidcFacade> {
		OidcFacade::from_descriptor(
			&self.descriptor,
			&self.client_id,
			self.client_secret.as_deref(),
			self.http_client.clone(),
		)
	}

	pub(crate) fn ensure_supported(&self, grant: GrantType) -> Result<()> {
		if self.descriptor.supports(grant) {
			Ok(())
		} else {
			Err(ConfigError::UnsupportedGrant {
				descriptor: self.descriptor.id.to_string(),
				grant: grant.as_str(),
			}
			.into())
		}
	}
}
impl Debug for IdentityClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IdentityClient")
			.field("descriptor", &self.descriptor.id)
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.finish()
	}
}
