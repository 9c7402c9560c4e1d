//! ID token claims and the account identity derived from them.
//!
//! The ID token arrives straight from the token endpoint over TLS, in the same response as the
//! access token, so only its payload is decoded here. Signature verification is left to the
//! provider channel; the `nonce` is checked against the flow that requested the token.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
// self
use crate::{
	_prelude::*,
	auth::{AccountId, IdentifierError, TenantId},
};

/// Failures raised while decoding or checking an ID token.
#[derive(Debug, ThisError)]
pub enum IdTokenError {
	/// The token response carried no `id_token`.
	#[error("Token response did not include an ID token.")]
	Missing,
	/// The token is not a three-part compact JWT.
	#[error("ID token is not a compact JWT.")]
	Malformed,
	/// The payload segment is not valid base64url.
	#[error("ID token payload is not valid base64url.")]
	Encoding(#[from] base64::DecodeError),
	/// The payload is not a JSON claims object.
	#[error("ID token claims are malformed.")]
	Claims(#[from] serde_path_to_error::Error<serde_json::Error>),
	/// The `nonce` claim does not match the flow.
	#[error("ID token nonce does not match the authorization request.")]
	NonceMismatch,
	/// Neither `oid`/`tid` nor `sub` identify the account.
	#[error("ID token does not identify an account.")]
	MissingSubject,
	/// The derived account identifier failed validation.
	#[error(transparent)]
	Identifier(#[from] IdentifierError),
}

/// Claims carried by an OIDC ID token.
///
/// Well-known claims are typed; everything else is kept verbatim in [`extra`](Self::extra) so
/// the index page can render the full set.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IdTokenClaims {
	/// Subject identifier.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub sub: Option<String>,
	/// Object identifier of the user in the directory.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub oid: Option<String>,
	/// Tenant identifier.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub tid: Option<String>,
	/// Display name.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	/// Sign-in name.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub preferred_username: Option<String>,
	/// Nonce echoed from the authorization request.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub nonce: Option<String>,
	/// App roles assigned to the user.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub roles: Vec<String>,
	/// Remaining claims.
	#[serde(flatten)]
	pub extra: BTreeMap<String, serde_json::Value>,
}
impl IdTokenClaims {
	/// Decodes the payload segment of a compact JWT.
	pub fn decode(id_token: &str) -> Result<Self, IdTokenError> {
		let mut segments = id_token.split('.');
		let (Some(_header), Some(payload), Some(_signature), None) =
			(segments.next(), segments.next(), segments.next(), segments.next())
		else {
			return Err(IdTokenError::Malformed);
		};
		let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('='))?;
		let mut de = serde_json::Deserializer::from_slice(&bytes);

		Ok(serde_path_to_error::deserialize(&mut de)?)
	}

	/// Checks the `nonce` claim against the value sent with the authorization request.
	pub fn verify_nonce(&self, expected: &str) -> Result<(), IdTokenError> {
		match self.nonce.as_deref() {
			Some(nonce) if nonce == expected => Ok(()),
			_ => Err(IdTokenError::NonceMismatch),
		}
	}

	/// Returns `true` when the user holds `role`.
	pub fn has_role(&self, role: &str) -> bool {
		self.roles.iter().any(|candidate| candidate == role)
	}

	/// Home account identifier: `{oid}.{tid}` when both are present, otherwise `sub`.
	pub fn home_account_id(&self) -> Result<AccountId, IdTokenError> {
		let raw = match (&self.oid, &self.tid, &self.sub) {
			(Some(oid), Some(tid), _) => format!("{oid}.{tid}"),
			(_, _, Some(sub)) => sub.clone(),
			_ => return Err(IdTokenError::MissingSubject),
		};

		Ok(AccountId::new(raw)?)
	}
}

/// A signed-in identity known to the token cache.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Account {
	/// Cache key for the account.
	pub home_account_id: AccountId,
	/// Sign-in name, when the provider supplied one.
	pub username: Option<String>,
	/// Home tenant, when the provider supplied one.
	pub tenant: Option<TenantId>,
}
impl Account {
	/// Derives the account from ID token claims.
	pub fn from_claims(claims: &IdTokenClaims) -> Result<Self, IdTokenError> {
		let tenant = claims.tid.as_deref().map(TenantId::new).transpose()?;

		Ok(Self {
			home_account_id: claims.home_account_id()?,
			username: claims.preferred_username.clone(),
			tenant,
		})
	}
}
