//! Requested scopes, normalized so they can key the token cache.

// std
use std::collections::BTreeSet;
// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD_NO_PAD};
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

/// Errors emitted when validating scopes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ScopeValidationError {
	/// Empty scope entries are not allowed.
	#[error("Scope entries cannot be empty.")]
	Empty,
	/// Scopes cannot contain embedded whitespace characters.
	#[error("Scope contains whitespace: {scope}.")]
	ContainsWhitespace {
		/// The offending scope string.
		scope: String,
	},
}

/// OIDC scopes the identity client always adds to authorization requests.
///
/// They are never part of a cache key: a token acquired for `User.Read` is stored under
/// `User.Read` even though the provider also granted `openid profile offline_access`.
pub const RESERVED_SCOPES: [&str; 3] = ["offline_access", "openid", "profile"];

/// Deduplicated, sorted scope list.
///
/// Serializes as a plain JSON array so flows and records can sit in the shared cache.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct ScopeSet(Arc<[String]>);
impl ScopeSet {
	/// Validates and normalizes `scopes`.
	pub fn new<I, S>(scopes: I) -> Result<Self, ScopeValidationError>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let mut sorted = BTreeSet::new();

		for scope in scopes {
			let scope = scope.into();

			if scope.is_empty() {
				return Err(ScopeValidationError::Empty);
			}
			if scope.chars().any(char::is_whitespace) {
				return Err(ScopeValidationError::ContainsWhitespace { scope });
			}

			sorted.insert(scope);
		}

		Ok(Self(sorted.into_iter().collect()))
	}

	/// Number of distinct scopes.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Whether the set is empty.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Whether `scope` is part of the set.
	pub fn contains(&self, scope: &str) -> bool {
		self.0.binary_search_by(|candidate| candidate.as_str().cmp(scope)).is_ok()
	}

	/// Scopes in sorted order.
	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.0.iter().map(String::as_str)
	}

	/// Space-delimited form sent to the provider.
	pub fn normalized(&self) -> String {
		self.0.join(" ")
	}

	/// Base64 (no padding) SHA-256 of [`normalized`](Self::normalized); used in cache keys.
	pub fn fingerprint(&self) -> String {
		STANDARD_NO_PAD.encode(Sha256::digest(self.normalized().as_bytes()))
	}

	/// The set plus [`RESERVED_SCOPES`].
	pub fn with_reserved(&self) -> Self {
		let mut merged = self.0.iter().map(String::as_str).collect::<BTreeSet<_>>();

		merged.extend(RESERVED_SCOPES);

		Self(merged.into_iter().map(str::to_owned).collect())
	}

	/// The set without any [`RESERVED_SCOPES`] entry.
	pub fn without_reserved(&self) -> Self {
		Self(self.iter().filter(|scope| !RESERVED_SCOPES.contains(scope)).map(str::to_owned).collect())
	}
}
impl Debug for ScopeSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("ScopeSet").field(&self.0).finish()
	}
}
impl Display for ScopeSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.normalized())
	}
}
impl FromStr for ScopeSet {
	type Err = ScopeValidationError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		if !s.is_empty() && s.trim().is_empty() {
			return Err(ScopeValidationError::Empty);
		}

		Self::new(s.split_whitespace())
	}
}
impl TryFrom<Vec<String>> for ScopeSet {
	type Error = ScopeValidationError;

	fn try_from(value: Vec<String>) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}
impl From<ScopeSet> for Vec<String> {
	fn from(value: ScopeSet) -> Self {
		value.0.to_vec()
	}
}
