// self
use crate::_prelude::*;

/// Grants the portal issues against the token endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
	/// Delegated sign-in with PKCE.
	AuthorizationCode,
	/// Silent renewal of a delegated token.
	RefreshToken,
	/// Application token.
	ClientCredentials,
}
impl GrantType {
	const ALL: [Self; 3] = [Self::AuthorizationCode, Self::RefreshToken, Self::ClientCredentials];

	/// `grant_type` form value.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::AuthorizationCode => "authorization_code",
			Self::RefreshToken => "refresh_token",
			Self::ClientCredentials => "client_credentials",
		}
	}

	const fn bit(self) -> u8 {
		1 << self as u8
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Set of grants a descriptor enables.
#[derive(Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<GrantType>", into = "Vec<GrantType>")]
pub struct SupportedGrants(u8);
impl SupportedGrants {
	/// Whether `grant` is enabled.
	pub const fn supports(self, grant: GrantType) -> bool {
		self.0 & grant.bit() != 0
	}

	/// Enables `grant`.
	pub const fn enable(self, grant: GrantType) -> Self {
		Self(self.0 | grant.bit())
	}

	/// Whether nothing is enabled.
	pub const fn is_empty(self) -> bool {
		self.0 == 0
	}

	/// Enabled grants in declaration order.
	pub fn iter(self) -> impl Iterator<Item = GrantType> {
		GrantType::ALL.into_iter().filter(move |grant| self.supports(*grant))
	}
}
impl Debug for SupportedGrants {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_set().entries(self.iter()).finish()
	}
}
impl From<Vec<GrantType>> for SupportedGrants {
	fn from(grants: Vec<GrantType>) -> Self {
		grants.into_iter().fold(Self::default(), Self::enable)
	}
}
impl From<SupportedGrants> for Vec<GrantType> {
	fn from(grants: SupportedGrants) -> Self {
		grants.iter().collect()
	}
}
