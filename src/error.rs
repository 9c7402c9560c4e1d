//! Portal-level error types shared across identity flows, the directory client, and stores.

// self
use crate::_prelude::*;

/// Result alias defaulting to [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error returned by identity flows, the directory client, and the token cache.
#[derive(Debug, ThisError)]
pub enum Error {
	/// The token cache failed.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Configuration is unusable.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// The provider failed in a way a retry may fix.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// The request never got a response.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// The ID token could not be decoded or does not belong to the flow.
	#[error(transparent)]
	IdToken(#[from] crate::auth::IdTokenError),
	/// The directory API call failed.
	#[error(transparent)]
	Directory(#[from] crate::directory::DirectoryError),

	/// The provider answered `invalid_scope`.
	#[error("Token lacks the required scopes: {reason}.")]
	InsufficientScope {
		/// Provider description.
		reason: String,
	},
	/// The provider refused the code or refresh token.
	#[error("Provider rejected the grant: {reason}.")]
	InvalidGrant {
		/// Provider description.
		reason: String,
	},
	/// The provider refused the client id or secret.
	#[error("Client authentication failed: {reason}.")]
	InvalidClient {
		/// Provider description.
		reason: String,
	},
	/// The authorization redirect carried an `error` parameter.
	#[error("Authorization failed: {error}.")]
	Authorization {
		/// OAuth `error` code returned on the redirect.
		error: String,
		/// OAuth `error_description`, when supplied.
		description: Option<String>,
	},
	/// The `state` returned on the redirect does not belong to the flow.
	#[error("Authorization state mismatch.")]
	StateMismatch,
}
impl Error {
	/// Text shown on the error page; the provider's own description when it sent one.
	pub fn description(&self) -> String {
		match self {
			Self::Authorization { description: Some(description), .. } => description.clone(),
			Self::InvalidGrant { reason }
			| Self::InvalidClient { reason }
			| Self::InsufficientScope { reason } => reason.clone(),
			Self::Transient(TransientError::TokenEndpoint { message, .. }) => message.clone(),
			other => other.to_string(),
		}
	}
}

/// Problems with local configuration or with values derived from it.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// The shared HTTP client failed to build.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Builder failure.
		#[source]
		source: BoxError,
	},
	/// A token request could not be assembled.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// The authority does not yield a usable provider descriptor.
	#[error(transparent)]
	InvalidDescriptor(#[from] crate::provider::ProviderDescriptorError),
	/// An endpoint URL was rejected by the OAuth client.
	#[error("Endpoint URL is invalid.")]
	InvalidEndpoint {
		/// Parse failure.
		#[source]
		source: url::ParseError,
	},
	/// The redirect URI could not be built.
	#[error("Redirect URI is invalid.")]
	InvalidRedirect {
		/// Parse failure.
		#[source]
		source: url::ParseError,
	},
	/// The flow needs a grant the descriptor leaves disabled.
	#[error("Descriptor `{descriptor}` does not enable the {grant} grant.")]
	UnsupportedGrant {
		/// Descriptor id.
		descriptor: String,
		/// Grant name.
		grant: &'static str,
	},
	/// A configured scope is empty or padded.
	#[error("Requested scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// A token response could not be turned into a record.
	#[error("Unable to build token record.")]
	TokenBuild(#[from] crate::auth::TokenRecordBuilderError),
	/// The token response has no `expires_in`.
	#[error("Token endpoint response is missing expires_in.")]
	MissingExpiresIn,
	/// `expires_in` does not fit a signed 64-bit second count.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// `expires_in` is zero.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
	/// The configuration file could not be read.
	#[error("Configuration file `{path}` could not be read.")]
	ReadFile {
		/// Path that was read.
		path: String,
		/// IO failure.
		#[source]
		source: std::io::Error,
	},
	/// The configuration file does not match the schema.
	#[error("Configuration file is malformed.")]
	Parse(#[from] toml::de::Error),
	/// The redirect path is `/`.
	#[error("The redirect path must not be `/`.")]
	RedirectPathIsRoot,
	/// The redirect path is relative.
	#[error("The redirect path `{path}` must start with `/`.")]
	RedirectPathNotAbsolute {
		/// Offending redirect path.
		path: String,
	},
	/// The redirect path shadows another portal route.
	#[error("The redirect path `{path}` collides with a portal route.")]
	RedirectPathReserved {
		/// Offending redirect path.
		path: String,
	},
	/// The active profile has no client id or secret.
	#[error(
		"App registration is incomplete; ensure the application is registered and the configuration contains its client id and secret."
	)]
	MissingRegistration,
	/// An embedded template does not compile.
	#[error("Template `{name}` failed to compile.")]
	Template {
		/// Template name.
		name: &'static str,
		/// Compiler failure.
		#[source]
		source: BoxError,
	},
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::HttpClientBuild { source: Box::new(e) }
	}
}

/// Provider failures a retry may fix.
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// The token endpoint answered with something other than a token or a known OAuth error.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Summary of the response.
		message: String,
		/// HTTP status, when known.
		status: Option<u16>,
		/// `Retry-After`, when sent.
		retry_after: Option<Duration>,
	},
	/// The token endpoint body is not the JSON the client expects.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Parse failure with the offending path.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status, when known.
		status: Option<u16>,
	},
}

/// Failures below HTTP.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// The request failed before a response arrived.
	#[error("Network error occurred while calling {target}.")]
	Network {
		/// Remote the request was aimed at.
		target: &'static str,
		/// Client failure.
		#[source]
		source: BoxError,
	},
	/// Reading or writing the connection failed.
	#[error("I/O error occurred while calling the token endpoint.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a client failure raised while calling `target`.
	pub fn network(target: &'static str, src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { target, source: Box::new(src) }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn description_prefers_provider_text() {
		let err = Error::Authorization {
			error: "access_denied".into(),
			description: Some("The user cancelled the sign-in.".into()),
		};

		assert_eq!(err.description(), "The user cancelled the sign-in.");

		let err = Error::Authorization { error: "access_denied".into(), description: None };

		assert_eq!(err.description(), "Authorization failed: access_denied.");
		assert_eq!(Error::StateMismatch.description(), "Authorization state mismatch.");
	}

	#[test]
	fn grant_errors_expose_reason_only() {
		let err = Error::InvalidClient { reason: "AADSTS7000215: Invalid client secret.".into() };

		assert_eq!(err.description(), "AADSTS7000215: Invalid client secret.");
		assert!(err.to_string().starts_with("Client authentication failed: AADSTS7000215"));
	}
}
