//! Token records, lifecycle helpers, and their builder.

// self
use crate::{
	_prelude::*,
	auth::{Account, IdTokenClaims, ScopeSet, token::secret::TokenSecret},
};

/// Lifecycle status of a record at a given instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
	/// Issued in the future (clock skew).
	Pending,
	/// Usable.
	Active,
	/// Past its expiry.
	Expired,
	/// Revoked after the provider rejected its refresh token.
	Revoked,
}

/// Errors produced by [`TokenRecordBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum TokenRecordBuilderError {
	/// No access token was supplied.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Neither an absolute nor a relative expiry was supplied.
	#[error("Expiry must be supplied via expires_at or expires_in.")]
	MissingExpiry,
}

/// Tokens issued for one account (or for the application itself) and one requested scope.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenRecord {
	/// Signed-in account; `None` for application tokens.
	pub account: Option<Account>,
	/// Requested scope the record is cached under.
	pub scope: ScopeSet,
	/// Bearer token sent to the directory API.
	pub access_token: TokenSecret,
	/// Refresh token, when the provider issued one.
	pub refresh_token: Option<TokenSecret>,
	/// Claims of the ID token issued with the access token.
	pub id_token_claims: Option<IdTokenClaims>,
	/// When the token response arrived.
	pub issued_at: OffsetDateTime,
	/// When the access token stops being usable.
	pub expires_at: OffsetDateTime,
	/// When the record was revoked, if it was.
	pub revoked_at: Option<OffsetDateTime>,
}
impl TokenRecord {
	/// Starts a record cached under `scope`.
	pub fn builder(scope: ScopeSet) -> TokenRecordBuilder {
		TokenRecordBuilder { scope, ..TokenRecordBuilder::default() }
	}

	/// Status at `instant`.
	pub fn status_at(&self, instant: OffsetDateTime) -> TokenStatus {
		match () {
			_ if self.revoked_at.is_some() => TokenStatus::Revoked,
			_ if instant < self.issued_at => TokenStatus::Pending,
			_ if instant >= self.expires_at => TokenStatus::Expired,
			_ => TokenStatus::Active,
		}
	}

	/// Whether the access token is past its expiry at `instant`.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		self.status_at(instant) == TokenStatus::Expired
	}

	/// Whether the record was revoked.
	pub fn is_revoked(&self) -> bool {
		self.revoked_at.is_some()
	}

	/// Revokes the record at `instant`.
	pub fn revoke(&mut self, instant: OffsetDateTime) {
		self.revoked_at = Some(instant);
	}

	/// Whether the ID token claims grant `role`; always `false` for application tokens.
	pub fn has_role(&self, role: &str) -> bool {
		self.id_token_claims.as_ref().is_some_and(|claims| claims.has_role(role))
	}
}
impl Debug for TokenRecord {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenRecord")
			.field("account", &self.account.as_ref().map(|account| &account.home_account_id))
			.field("scope", &self.scope)
			.field("access_token", &self.access_token)
			.field("refresh_token", &self.refresh_token)
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.field("revoked_at", &self.revoked_at)
			.finish_non_exhaustive()
	}
}

#[derive(Clone, Copy, Debug)]
enum Expiry {
	At(OffsetDateTime),
	In(Duration),
}

/// Builder for [`TokenRecord`].
#[derive(Clone, Debug, Default)]
pub struct TokenRecordBuilder {
	scope: ScopeSet,
	account: Option<Account>,
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	id_token_claims: Option<IdTokenClaims>,
	issued_at: Option<OffsetDateTime>,
	expiry: Option<Expiry>,
}
impl TokenRecordBuilder {
	/// Owner of a delegated token.
	pub fn account(mut self, account: Account) -> Self {
		self.account = Some(account);

		self
	}

	/// Decoded ID token claims.
	pub fn id_token_claims(mut self, claims: IdTokenClaims) -> Self {
		self.id_token_claims = Some(claims);

		self
	}

	/// Issue instant; defaults to now.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Absolute expiry; wins over [`expires_in`](Self::expires_in).
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expiry = Some(Expiry::At(instant));

		self
	}

	/// Expiry relative to the issue instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		if !matches!(self.expiry, Some(Expiry::At(_))) {
			self.expiry = Some(Expiry::In(duration));
		}

		self
	}

	/// Access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Validates and produces the record.
	pub fn build(self) -> Result<TokenRecord, TokenRecordBuilderError> {
		let access_token = self.access_token.ok_or(TokenRecordBuilderError::MissingAccessToken)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = match self.expiry.ok_or(TokenRecordBuilderError::MissingExpiry)? {
			Expiry::At(instant) => instant,
			Expiry::In(delta) => issued_at + delta,
		};

		Ok(TokenRecord {
			account: self.account,
			scope: self.scope,
			access_token,
			refresh_token: self.refresh_token,
			id_token_claims: self.id_token_claims,
			issued_at,
			expires_at,
			revoked_at: None,
		})
	}
}
