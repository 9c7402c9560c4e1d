//! Provider descriptor data structures shared by all identity flows.

/// Builder API for assembling provider descriptors.
pub mod builder;
/// Grant helpers wired into provider descriptors.
pub mod grant;

pub use builder::*;
pub use grant::*;

// self
use crate::{_prelude::*, auth::ProviderId};

/// Client authentication modes for token endpoint calls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	/// HTTP Basic with `client_id`/`client_secret`.
	ClientSecretBasic,
	#[default]
	/// Form POST body parameters for `client_id`/`client_secret`.
	ClientSecretPost,
}

/// Endpoint set declared by a provider descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoints {
	/// Authorization endpoint the browser is redirected to.
	pub authorization: Url,
	/// Token endpoint used for code exchanges, refreshes, and client credentials.
	pub token: Url,
	/// End-session endpoint used on sign-out.
	pub end_session: Option<Url>,
}

/// Immutable provider descriptor consumed by identity flows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
	/// Descriptor identifier.
	pub id: ProviderId,
	/// Endpoint definitions exposed by the provider.
	pub endpoints: ProviderEndpoints,
	/// Supported grant flags.
	pub supported_grants: SupportedGrants,
	/// Preferred client authentication mechanism.
	pub preferred_client_auth_method: ClientAuthMethod,
}
impl ProviderDescriptor {
	/// Creates a new builder for the provided identifier.
	pub fn builder(id: ProviderId) -> ProviderDescriptorBuilder {
		ProviderDescriptorBuilder::new(id)
	}

	/// Derives the v2.0 endpoint layout (`{authority}/oauth2/v2.0/{authorize,token,logout}`)
	/// from a tenant authority such as `https://login.microsoftonline.com/{tenant}`.
	pub fn from_authority(authority: &Url) -> Result<Self, ProviderDescriptorError> {
		if authority.cannot_be_a_base() || authority.host_str().is_none() {
			return Err(ProviderDescriptorError::InvalidAuthority { url: authority.to_string() });
		}

		let host = authority.host_str().unwrap_or_default();
		let port = authority.port().map(|port| format!(":{port}")).unwrap_or_default();
		let id = ProviderId::new(format!("{host}{port}{}", authority.path().trim_end_matches('/')))
			.map_err(|_| ProviderDescriptorError::InvalidAuthority { url: authority.to_string() })?;

		Self::builder(id)
			.authorization_endpoint(authority_endpoint(authority, "authorize"))
			.token_endpoint(authority_endpoint(authority, "token"))
			.end_session_endpoint(authority_endpoint(authority, "logout"))
			.support_grants([
				GrantType::AuthorizationCode,
				GrantType::RefreshToken,
				GrantType::ClientCredentials,
			])
			.build()
	}

	/// Checks whether the descriptor supports a given grant.
	pub fn supports(&self, grant: GrantType) -> bool {
		self.supported_grants.supports(grant)
	}
}

fn authority_endpoint(authority: &Url, action: &str) -> Url {
	let mut url = authority.clone();
	let path = format!("{}/oauth2/v2.0/{action}", authority.path().trim_end_matches('/'));

	url.set_path(&path);
	url.set_query(None);
	url.set_fragment(None);

	url
}
