//! Authorization-code sign-in with PKCE (S256), `state`, and `nonce`.
//!
//! [`IdentityClient::initiate_auth_code_flow`] returns an [`AuthCodeFlow`] that the caller keeps
//! server-side until the browser comes back to the redirect URI; the flow is serializable so it
//! can live in the shared cache. [`IdentityClient::acquire_token_by_auth_code_flow`] checks the
//! redirect parameters against the flow, redeems the code, and caches the resulting record under
//! the account derived from the ID token.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	auth::{Account, IdTokenClaims, IdTokenError, ScopeSet, TokenRecord, TokenSecret},
	identity::{IdentityClient, common},
	obs::{self, OpSpan, Operation},
	provider::{GrantType, ProviderDescriptor},
};

const STATE_LEN: usize = 32;
const NONCE_LEN: usize = 32;
const PKCE_VERIFIER_LEN: usize = 64;

/// PKCE challenge methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PkceCodeChallengeMethod {
	/// SHA-256 based PKCE (RFC 7636 S256).
	S256,
}
impl PkceCodeChallengeMethod {
	/// RFC 7636 identifier.
	pub fn as_str(self) -> &'static str {
		match self {
			PkceCodeChallengeMethod::S256 => "S256",
		}
	}
}

/// Server-side record of an in-progress authorization-code flow.
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthCodeFlow {
	/// Opaque value that must round-trip through the redirect.
	pub state: String,
	/// Value the ID token must echo in its `nonce` claim.
	pub nonce: String,
	/// Requested scope, without the reserved OIDC scopes.
	pub scope: ScopeSet,
	/// Redirect URI registered for the flow.
	pub redirect_uri: Url,
	/// Authorize URL the browser is sent to.
	pub auth_uri: Url,
	code_verifier: TokenSecret,
	code_challenge: String,
	code_challenge_method: PkceCodeChallengeMethod,
}
impl AuthCodeFlow {
	fn new(
		descriptor: &ProviderDescriptor,
		client_id: &str,
		scope: &ScopeSet,
		redirect_uri: Url,
	) -> Self {
		let state = random_string(STATE_LEN);
		let nonce = random_string(NONCE_LEN);
		let verifier = random_string(PKCE_VERIFIER_LEN);
		let code_challenge = compute_pkce_challenge(&verifier);
		let mut flow = Self {
			state,
			nonce,
			scope: scope.without_reserved(),
			auth_uri: descriptor.endpoints.authorization.clone(),
			redirect_uri,
			code_verifier: TokenSecret::new(verifier),
			code_challenge,
			code_challenge_method: PkceCodeChallengeMethod::S256,
		};

		flow.auth_uri = flow.build_auth_uri(descriptor, client_id);

		flow
	}

	/// PKCE code challenge derived from the secret verifier.
	pub fn code_challenge(&self) -> &str {
		&self.code_challenge
	}

	/// PKCE challenge method (always `S256`).
	pub fn code_challenge_method(&self) -> PkceCodeChallengeMethod {
		self.code_challenge_method
	}

	/// Validates the `state` returned on the redirect.
	pub fn validate_state(&self, returned_state: Option<&str>) -> Result<()> {
		match returned_state {
			Some(state) if state == self.state => Ok(()),
			_ => Err(Error::StateMismatch),
		}
	}

	fn build_auth_uri(&self, descriptor: &ProviderDescriptor, client_id: &str) -> Url {
		let mut url = descriptor.endpoints.authorization.clone();

		url.query_pairs_mut()
			.append_pair("client_id", client_id)
			.append_pair("response_type", "code")
			.append_pair("redirect_uri", self.redirect_uri.as_str())
			.append_pair("scope", &self.scope.with_reserved().normalized())
			.append_pair("state", &self.state)
			.append_pair("nonce", &self.nonce)
			.append_pair("code_challenge", &self.code_challenge)
			.append_pair("code_challenge_method", self.code_challenge_method.as_str());

		url
	}
}
impl Debug for AuthCodeFlow {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthCodeFlow")
			.field("state", &self.state)
			.field("scope", &self.scope)
			.field("redirect_uri", &self.redirect_uri)
			.field("auth_uri", &self.auth_uri)
			.field("code_challenge_method", &self.code_challenge_method)
			.finish_non_exhaustive()
	}
}

/// Query parameters the provider appends to the redirect URI.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthCodeResponse {
	/// Authorization code.
	pub code: Option<String>,
	/// Echoed `state`.
	pub state: Option<String>,
	/// OAuth error code.
	pub error: Option<String>,
	/// OAuth error description.
	pub error_description: Option<String>,
}

impl IdentityClient {
	/// Starts a sign-in: generates `state`, `nonce`, and PKCE material and builds the authorize
	/// URL for `scope` plus the reserved OIDC scopes.
	pub fn initiate_auth_code_flow(
		&self,
		scope: &ScopeSet,
		redirect_uri: Url,
	) -> Result<AuthCodeFlow> {
		let _span = OpSpan::new(Operation::SignIn, "initiate_auth_code_flow").entered();

		self.ensure_supported(GrantType::AuthorizationCode)?;

		Ok(AuthCodeFlow::new(&self.descriptor, &self.client_id, scope, redirect_uri))
	}

	/// Completes a sign-in started by [`IdentityClient::initiate_auth_code_flow`].
	pub async fn acquire_token_by_auth_code_flow(
		&self,
		flow: AuthCodeFlow,
		response: &AuthCodeResponse,
	) -> Result<TokenRecord> {
		obs::observe(
			Operation::SignIn,
			"acquire_token_by_auth_code_flow",
			self.redeem_code(flow, response),
		)
		.await
	}

	async fn redeem_code(
		&self,
		flow: AuthCodeFlow,
		response: &AuthCodeResponse,
	) -> Result<TokenRecord> {
		self.ensure_supported(GrantType::AuthorizationCode)?;
		flow.validate_state(response.state.as_deref())?;

		if let Some(error) = &response.error {
			return Err(Error::Authorization {
				error: error.clone(),
				description: response.error_description.clone(),
			});
		}

		let code = response.code.as_deref().ok_or_else(|| Error::InvalidGrant {
			reason: "The authorization response did not include a code".into(),
		})?;
		let requested = flow.scope.with_reserved();
		let issued = self
			.facade()?
			.exchange_authorization_code(
				self.strategy.as_ref(),
				code,
				flow.code_verifier.expose(),
				&requested,
				&flow.redirect_uri,
			)
			.await?;
		let claims = IdTokenClaims::decode(issued.id_token.as_deref().ok_or(IdTokenError::Missing)?)?;

		claims.verify_nonce(&flow.nonce)?;

		let account = Account::from_claims(&claims)?;
		let mut builder = TokenRecord::builder(flow.scope)
			.account(account)
			.id_token_claims(claims)
			.access_token(issued.access_token)
			.issued_at(issued.issued_at)
			.expires_in(issued.expires_in);

		if let Some(refresh) = issued.refresh_token {
			builder = builder.refresh_token(refresh);
		}

		let record = builder.build().map_err(common::map_token_builder_error)?;

		self.cache.save(record.clone()).await?;

		Ok(record)
	}
}

fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}

fn compute_pkce_challenge(verifier: &str) -> String {
	URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::test_descriptor;

	fn flow() -> AuthCodeFlow {
		let descriptor = test_descriptor("https://login.example.com/contoso");
		let scope = ScopeSet::new(["User.Read", "openid"]).expect("Scope fixture should be valid.");
		let redirect =
			Url::parse("https://portal.example.com/getAToken").expect("Redirect fixture should parse.");

		AuthCodeFlow::new(&descriptor, "client-it", &scope, redirect)
	}

	#[test]
	fn auth_uri_carries_reserved_scopes_and_pkce() {
		let flow = flow();
		let pairs: HashMap<String, String> = flow.auth_uri.query_pairs().into_owned().collect();

		assert_eq!(flow.scope.normalized(), "User.Read");
		assert_eq!(pairs["scope"], "User.Read offline_access openid profile");
		assert_eq!(pairs["state"], flow.state);
		assert_eq!(pairs["nonce"], flow.nonce);
		assert_eq!(pairs["code_challenge"], flow.code_challenge());
		assert_eq!(pairs["code_challenge_method"], "S256");
		assert_eq!(flow.state.len(), STATE_LEN);
		assert_eq!(flow.code_challenge(), compute_pkce_challenge(flow.code_verifier.expose()));
	}

	#[test]
	fn state_validation_errors_on_mismatch() {
		let flow = flow();

		assert!(flow.validate_state(Some(flow.state.as_str())).is_ok());
		assert!(matches!(flow.validate_state(Some("other")), Err(Error::StateMismatch)));
		assert!(matches!(flow.validate_state(None), Err(Error::StateMismatch)));
	}

	#[test]
	fn flow_survives_json_and_hides_verifier() {
		let flow = flow();
		let json = serde_json::to_value(&flow).expect("Flow should serialize.");
		let restored: AuthCodeFlow =
			serde_json::from_value(json).expect("Flow should deserialize.");

		assert_eq!(restored.code_verifier.expose(), flow.code_verifier.expose());
		assert!(!format!("{flow:?}").contains(flow.code_verifier.expose()));
	}

	#[test]
	fn pkce_challenge_matches_rfc_7636_example() {
		assert_eq!(
			compute_pkce_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
			"E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
		);
	}
}
