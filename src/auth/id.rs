//! Validated identifiers for accounts, tenants, and provider descriptors.

// std
use std::ops::Deref;
// self
use crate::_prelude::*;

const MAX_LEN: usize = 128;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Identifier kind.
		kind: &'static str,
	},
	/// The identifier contains whitespace.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// Identifier kind.
		kind: &'static str,
	},
	/// The identifier is longer than the portal accepts.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Identifier kind.
		kind: &'static str,
		/// Maximum length.
		max: usize,
	},
}

macro_rules! identifier {
	($(#[$meta:meta])* $name:ident => $kind:literal) => {
		$(#[$meta])*
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Validates `value`.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				Self::try_from(value.as_ref().to_owned())
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				check($kind, &value).map(|()| Self(value))
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &str {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, "{}({})", $kind, self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
	};
}

identifier! {
	/// Home account identifier of a signed-in user: `{oid}.{tid}`, or the subject.
	AccountId => "Account"
}
identifier! {
	/// Directory tenant carried in the `tid` claim.
	TenantId => "Tenant"
}
identifier! {
	/// Provider descriptor identifier, derived from the authority host and path.
	ProviderId => "Provider"
}

fn check(kind: &'static str, value: &str) -> Result<(), IdentifierError> {
	match value {
		"" => Err(IdentifierError::Empty { kind }),
		_ if value.contains(char::is_whitespace) =>
			Err(IdentifierError::ContainsWhitespace { kind }),
		_ if value.len() > MAX_LEN => Err(IdentifierError::TooLong { kind, max: MAX_LEN }),
		_ => Ok(()),
	}
}
