// self
use crate::{
	_prelude::*,
	auth::ProviderId,
	provider::{
		ClientAuthMethod, GrantType, ProviderDescriptor, ProviderEndpoints, SupportedGrants,
	},
};

/// Reasons a descriptor is rejected.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ProviderDescriptorError {
	/// No authorization endpoint was given.
	#[error("Missing authorization endpoint.")]
	MissingAuthorizationEndpoint,
	/// No token endpoint was given.
	#[error("Missing token endpoint.")]
	MissingTokenEndpoint,
	/// The grant set is empty.
	#[error("Descriptor must enable at least one grant type.")]
	NoSupportedGrants,
	/// A non-loopback endpoint uses plain HTTP.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Endpoint role.
		endpoint: &'static str,
		/// Offending URL.
		url: String,
	},
	/// The authority cannot anchor the endpoint layout.
	#[error("The authority `{url}` is not a hierarchical URL with a host.")]
	InvalidAuthority {
		/// Offending authority.
		url: String,
	},
}

/// Assembles a [`ProviderDescriptor`]; [`build`](Self::build) validates it.
#[derive(Debug)]
pub struct ProviderDescriptorBuilder {
	id: ProviderId,
	authorization_endpoint: Option<Url>,
	token_endpoint: Option<Url>,
	end_session_endpoint: Option<Url>,
	supported_grants: SupportedGrants,
	preferred_client_auth_method: ClientAuthMethod,
}
impl ProviderDescriptorBuilder {
	/// Empty builder for `id`.
	pub fn new(id: ProviderId) -> Self {
		Self {
			id,
			authorization_endpoint: None,
			token_endpoint: None,
			end_session_endpoint: None,
			supported_grants: SupportedGrants::default(),
			preferred_client_auth_method: ClientAuthMethod::default(),
		}
	}

	/// Where users are sent to sign in.
	pub fn authorization_endpoint(mut self, url: Url) -> Self {
		self.authorization_endpoint = Some(url);

		self
	}

	/// Where codes, refresh tokens, and client credentials are redeemed.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Where users are sent to sign out.
	pub fn end_session_endpoint(mut self, url: Url) -> Self {
		self.end_session_endpoint = Some(url);

		self
	}

	/// Adds `grants` to the enabled set.
	pub fn support_grants<I>(mut self, grants: I) -> Self
	where
		I: IntoIterator<Item = GrantType>,
	{
		self.supported_grants = grants.into_iter().fold(self.supported_grants, SupportedGrants::enable);

		self
	}

	/// How the client secret is presented to the token endpoint.
	pub fn preferred_client_auth_method(mut self, method: ClientAuthMethod) -> Self {
		self.preferred_client_auth_method = method;

		self
	}

	/// Validates grants and endpoint schemes.
	pub fn build(self) -> Result<ProviderDescriptor, ProviderDescriptorError> {
		let endpoints = match (self.authorization_endpoint, self.token_endpoint) {
			(Some(authorization), Some(token)) =>
				ProviderEndpoints { authorization, token, end_session: self.end_session_endpoint },
			(None, _) => return Err(ProviderDescriptorError::MissingAuthorizationEndpoint),
			(_, None) => return Err(ProviderDescriptorError::MissingTokenEndpoint),
		};
		let descriptor = ProviderDescriptor {
			id: self.id,
			endpoints,
			supported_grants: self.supported_grants,
			preferred_client_auth_method: self.preferred_client_auth_method,
		};

		descriptor.validate()?;

		Ok(descriptor)
	}
}

impl ProviderDescriptor {
	fn validate(&self) -> Result<(), ProviderDescriptorError> {
		if self.supported_grants.is_empty() {
			return Err(ProviderDescriptorError::NoSupportedGrants);
		}

		let ProviderEndpoints { authorization, token, end_session } = &self.endpoints;

		[
			("authorization", Some(authorization)),
			("token", Some(token)),
			("end_session", end_session.as_ref()),
		]
		.into_iter()
		.filter_map(|(name, url)| url.map(|url| (name, url)))
		.try_for_each(|(name, url)| require_tls(name, url))
	}
}

fn require_tls(name: &'static str, url: &Url) -> Result<(), ProviderDescriptorError> {
	match url.scheme() {
		"https" => Ok(()),
		"http" if is_loopback(url) => Ok(()),
		_ => Err(ProviderDescriptorError::InsecureEndpoint { endpoint: name, url: url.to_string() }),
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host() {
		Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(url::Host::Ipv4(addr)) => addr.is_loopback(),
		Some(url::Host::Ipv6(addr)) => addr.is_loopback(),
		None => false,
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn url(value: &str) -> Url {
		Url::parse(value).expect("Endpoint fixture should parse.")
	}

	fn builder() -> ProviderDescriptorBuilder {
		ProviderDescriptor::builder(
			ProviderId::new("provider-under-test").expect("Provider fixture should be valid."),
		)
	}

	#[test]
	fn builder_requires_grants_and_endpoints() {
		let err = builder()
			.authorization_endpoint(url("https://example.com/authorize"))
			.token_endpoint(url("https://example.com/token"))
			.build()
			.expect_err("Descriptor builder should reject missing grants.");

		assert_eq!(err, ProviderDescriptorError::NoSupportedGrants);

		let err = builder()
			.authorization_endpoint(url("https://example.com/authorize"))
			.support_grants([GrantType::ClientCredentials])
			.build()
			.expect_err("Descriptor builder should reject a missing token endpoint.");

		assert_eq!(err, ProviderDescriptorError::MissingTokenEndpoint);
	}

	#[test]
	fn loopback_hosts_may_use_plain_http() {
		for candidate in ["http://localhost:9000/token", "http://[::1]:9000/token"] {
			builder()
				.authorization_endpoint(url("https://example.com/authorize"))
				.token_endpoint(url(candidate))
				.support_grants([GrantType::AuthorizationCode])
				.build()
				.expect("Loopback endpoints should be accepted.");
		}

		let err = builder()
			.authorization_endpoint(url("https://example.com/authorize"))
			.token_endpoint(url("https://example.com/token"))
			.end_session_endpoint(url("http://example.com/logout"))
			.support_grants([GrantType::AuthorizationCode])
			.build()
			.expect_err("Plain HTTP end-session endpoints should be rejected.");

		assert!(matches!(
			err,
			ProviderDescriptorError::InsecureEndpoint { endpoint: "end_session", .. }
		));
	}
}
