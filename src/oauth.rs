//! OAuth client facade over the `oauth2` crate.
//!
//! The facade owns a configured client (endpoints, credentials, redirect URI) and turns token
//! endpoint responses into [`IssuedTokens`], or into portal errors classified by the provider
//! strategy.

pub use oauth2;

// std
use std::borrow::Cow;
// crates.io
use oauth2::{
	AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	ExtraTokenFields, HttpClientError, PkceCodeVerifier, RedirectUrl, RefreshToken,
	RequestTokenError, Scope, StandardRevocableToken, StandardTokenResponse, TokenResponse,
	TokenUrl,
	basic::{
		BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
		BasicTokenType,
	},
};
// self
use crate::{
	_prelude::*,
	auth::ScopeSet,
	error::{ConfigError, TransientError, TransportError},
	http::{ReqwestHttpClient, ResponseMetadata, ResponseMetadataSlot},
	provider::{
		ClientAuthMethod, GrantType, ProviderDescriptor, ProviderErrorContext, ProviderErrorKind,
		ProviderStrategy,
	},
};

type IdTokenResponse = StandardTokenResponse<IdTokenFields, BasicTokenType>;
type ConfiguredClient = oauth2::Client<
	BasicErrorResponse,
	IdTokenResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
	EndpointSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointSet,
>;
type FacadeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;
type RequestError = RequestTokenError<HttpClientError<ReqwestError>, BasicErrorResponse>;

/// OIDC addition to the standard token response.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdTokenFields {
	/// Compact JWT issued when `openid` was requested.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id_token: Option<String>,
}
impl ExtraTokenFields for IdTokenFields {}

/// Token material returned by a successful exchange.
#[derive(Clone)]
pub struct IssuedTokens {
	/// Access token value.
	pub access_token: String,
	/// Refresh token, when the provider rotated or issued one.
	pub refresh_token: Option<String>,
	/// Raw ID token, when the provider issued one.
	pub id_token: Option<String>,
	/// Relative lifetime of the access token.
	pub expires_in: Duration,
	/// Instant the response was received.
	pub issued_at: OffsetDateTime,
}
impl Debug for IssuedTokens {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IssuedTokens")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("id_token", &self.id_token.as_ref().map(|_| "<redacted>"))
			.field("expires_in", &self.expires_in)
			.field("issued_at", &self.issued_at)
			.finish_non_exhaustive()
	}
}

/// Configured OAuth client bound to one provider registration.
pub struct OidcFacade {
	oauth_client: ConfiguredClient,
	http_client: ReqwestHttpClient,
}
impl OidcFacade {
	/// Builds a facade from a descriptor and client registration.
	pub fn from_descriptor(
		descriptor: &ProviderDescriptor,
		client_id: &str,
		client_secret: Option<&str>,
		http_client: ReqwestHttpClient,
	) -> Result<Self> {
		let auth_url = AuthUrl::new(descriptor.endpoints.authorization.to_string())
			.map_err(|source| ConfigError::InvalidEndpoint { source })?;
		let token_url = TokenUrl::new(descriptor.endpoints.token.to_string())
			.map_err(|source| ConfigError::InvalidEndpoint { source })?;
		let mut oauth_client: ConfiguredClient =
			oauth2::Client::new(ClientId::new(client_id.to_owned()))
				.set_auth_uri(auth_url)
				.set_token_uri(token_url);

		if let Some(secret) = client_secret {
			oauth_client = oauth_client.set_client_secret(ClientSecret::new(secret.to_owned()));
		}
		if matches!(descriptor.preferred_client_auth_method, ClientAuthMethod::ClientSecretPost) {
			oauth_client = oauth_client.set_auth_type(AuthType::RequestBody);
		}

		Ok(Self { oauth_client, http_client })
	}

	/// Requests an application token with the client-credentials grant.
	pub fn exchange_client_credentials<'a>(
		&'a self,
		strategy: &'a dyn ProviderStrategy,
		scope: &'a ScopeSet,
	) -> FacadeFuture<'a, IssuedTokens> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let handle = self.http_client.instrumented(meta.clone());
			let request = self
				.oauth_client
				.exchange_client_credentials()
				.add_scopes(scope.iter().map(|value| Scope::new(value.to_owned())));
			let response = request.request_async(&handle).await.map_err(|err| {
				map_request_error(strategy, GrantType::ClientCredentials, meta.take(), err)
			})?;

			issued_tokens(response)
		})
	}

	/// Redeems an authorization code together with its PKCE verifier.
	pub fn exchange_authorization_code<'a>(
		&'a self,
		strategy: &'a dyn ProviderStrategy,
		code: &'a str,
		pkce_verifier: &'a str,
		scope: &'a ScopeSet,
		redirect_uri: &'a Url,
	) -> FacadeFuture<'a, IssuedTokens> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let handle = self.http_client.instrumented(meta.clone());
			let redirect_url = RedirectUrl::new(redirect_uri.to_string())
				.map_err(|source| ConfigError::InvalidRedirect { source })?;
			let mut request = self
				.oauth_client
				.exchange_code(AuthorizationCode::new(code.to_owned()))
				.set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier.to_owned()))
				.set_redirect_uri(Cow::Owned(redirect_url));

			if !scope.is_empty() {
				request = request.add_extra_param("scope", scope.normalized());
			}

			let response = request.request_async(&handle).await.map_err(|err| {
				map_request_error(strategy, GrantType::AuthorizationCode, meta.take(), err)
			})?;

			issued_tokens(response)
		})
	}

	/// Redeems a refresh token for a new access token.
	pub fn refresh_token<'a>(
		&'a self,
		strategy: &'a dyn ProviderStrategy,
		refresh_token: &'a str,
		scope: &'a ScopeSet,
	) -> FacadeFuture<'a, IssuedTokens> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let handle = self.http_client.instrumented(meta.clone());
			let secret = RefreshToken::new(refresh_token.to_owned());
			let request = self
				.oauth_client
				.exchange_refresh_token(&secret)
				.add_scopes(scope.iter().map(|value| Scope::new(value.to_owned())));
			let response = request.request_async(&handle).await.map_err(|err| {
				map_request_error(strategy, GrantType::RefreshToken, meta.take(), err)
			})?;

			issued_tokens(response)
		})
	}
}

fn issued_tokens(response: IdTokenResponse) -> Result<IssuedTokens> {
	let expires_in = response.expires_in().ok_or(ConfigError::MissingExpiresIn)?.as_secs();
	let expires_in = i64::try_from(expires_in).map_err(|_| ConfigError::ExpiresInOutOfRange)?;

	if expires_in <= 0 {
		return Err(ConfigError::NonPositiveExpiresIn.into());
	}

	Ok(IssuedTokens {
		access_token: response.access_token().secret().to_owned(),
		refresh_token: response.refresh_token().map(|token| token.secret().to_owned()),
		id_token: response.extra_fields().id_token.clone(),
		expires_in: Duration::seconds(expires_in),
		issued_at: OffsetDateTime::now_utc(),
	})
}

fn map_request_error(
	strategy: &dyn ProviderStrategy,
	grant: GrantType,
	meta: Option<ResponseMetadata>,
	err: RequestError,
) -> Error {
	let meta = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) =>
			map_server_response_error(strategy, grant, response, meta),
		RequestTokenError::Request(error) => map_transport_error(strategy, grant, meta, error),
		RequestTokenError::Parse(source, _body) =>
			TransientError::TokenResponseParse { source, status: meta_status(meta) }.into(),
		RequestTokenError::Other(message) => TransientError::TokenEndpoint {
			message,
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
	}
}

fn map_server_response_error(
	strategy: &dyn ProviderStrategy,
	grant: GrantType,
	response: BasicErrorResponse,
	meta: Option<&ResponseMetadata>,
) -> Error {
	let code = response.error().as_ref().to_owned();
	let mut ctx = ProviderErrorContext::new(grant).with_oauth_error(code.clone());

	if let Some(description) = response.error_description() {
		ctx = ctx.with_error_description(description.clone());
	}
	if let Some(status) = meta_status(meta) {
		ctx = ctx.with_http_status(status);
	}

	let reason = response.error_description().cloned().unwrap_or(code);

	match strategy.classify_token_error(&ctx) {
		ProviderErrorKind::InvalidGrant => Error::InvalidGrant { reason },
		ProviderErrorKind::InvalidClient => Error::InvalidClient { reason },
		ProviderErrorKind::InsufficientScope => Error::InsufficientScope { reason },
		ProviderErrorKind::Transient => TransientError::TokenEndpoint {
			message: reason,
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
	}
}

fn map_transport_error(
	strategy: &dyn ProviderStrategy,
	grant: GrantType,
	meta: Option<&ResponseMetadata>,
	err: HttpClientError<ReqwestError>,
) -> Error {
	match err {
		HttpClientError::Reqwest(inner) => {
			if inner.is_builder() {
				return ConfigError::from(*inner).into();
			}
			if inner.is_timeout() {
				return TransientError::TokenEndpoint {
					message: "Request timed out while calling the token endpoint".into(),
					status: meta_status(meta),
					retry_after: meta_retry_after(meta),
				}
				.into();
			}

			let ctx = ProviderErrorContext::network_failure(grant);

			match strategy.classify_token_error(&ctx) {
				ProviderErrorKind::Transient =>
					TransportError::network("the token endpoint", *inner).into(),
				_ => TransientError::TokenEndpoint {
					message: inner.to_string(),
					status: meta_status(meta),
					retry_after: None,
				}
				.into(),
			}
		},
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => TransportError::Io(inner).into(),
		HttpClientError::Other(message) => TransientError::TokenEndpoint {
			message,
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
		_ => TransientError::TokenEndpoint {
			message: "HTTP client error occurred while calling the token endpoint".into(),
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
	}
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn meta_retry_after(meta: Option<&ResponseMetadata>) -> Option<Duration> {
	meta.and_then(|value| value.retry_after)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::{test_descriptor, test_reqwest_http_client};

	#[test]
	fn facade_builds_for_both_auth_methods() {
		let mut descriptor = test_descriptor("https://login.example.com/contoso");

		assert!(
			OidcFacade::from_descriptor(&descriptor, "client", Some("secret"), test_reqwest_http_client())
				.is_ok()
		);

		descriptor.preferred_client_auth_method = ClientAuthMethod::ClientSecretBasic;

		assert!(
			OidcFacade::from_descriptor(&descriptor, "client", None, test_reqwest_http_client()).is_ok()
		);
	}

	#[test]
	fn id_token_field_is_optional() {
		let fields: IdTokenFields =
			serde_json::from_str("{}").expect("Empty extra fields should deserialize.");

		assert_eq!(fields.id_token, None);

		let fields: IdTokenFields = serde_json::from_str(r#"{"id_token":"a.b.c"}"#)
			.expect("ID token field should deserialize.");

		assert_eq!(fields.id_token.as_deref(), Some("a.b.c"));
	}
}
