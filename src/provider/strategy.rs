//! Classification of token endpoint failures into portal error categories.

// self
use crate::{_prelude::*, provider::descriptor::GrantType};

/// Hook that maps token endpoint failures onto [`ProviderErrorKind`].
///
/// The context carries plain data only, so implementations stay independent of the HTTP client.
pub trait ProviderStrategy: Send + Sync {
	/// Classifies a failed token request.
	fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind;
}

/// Canonical provider error categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderErrorKind {
	/// The grant (code, refresh token) was rejected; the user must sign in again.
	InvalidGrant,
	/// Client authentication failed.
	InvalidClient,
	/// Requested scopes exceed what the registration allows.
	InsufficientScope,
	/// Temporary failure.
	Transient,
}

/// Failure details gathered from a token endpoint response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderErrorContext {
	/// Grant type of the failing request.
	pub grant_type: GrantType,
	/// HTTP status code returned by the provider, when available.
	pub http_status: Option<u16>,
	/// OAuth `error` field.
	pub oauth_error: Option<String>,
	/// OAuth `error_description` field.
	pub error_description: Option<String>,
	/// Leading part of a non-JSON response body.
	pub body_preview: Option<String>,
	/// Whether the failure happened below HTTP.
	pub network_error: bool,
}
impl ProviderErrorContext {
	const BODY_PREVIEW_LIMIT: usize = 256;

	/// Creates an empty context for `grant_type`.
	pub fn new(grant_type: GrantType) -> Self {
		Self {
			grant_type,
			http_status: None,
			oauth_error: None,
			error_description: None,
			body_preview: None,
			network_error: false,
		}
	}

	/// Context for a transport-level failure.
	pub fn network_failure(grant_type: GrantType) -> Self {
		let mut ctx = Self::new(grant_type);

		ctx.network_error = true;

		ctx
	}

	/// Adds an HTTP status code.
	pub fn with_http_status(mut self, status: u16) -> Self {
		self.http_status = Some(status);

		self
	}

	/// Adds the OAuth `error` code.
	pub fn with_oauth_error(mut self, error: impl Into<String>) -> Self {
		self.oauth_error = Some(error.into());

		self
	}

	/// Adds the OAuth `error_description`.
	pub fn with_error_description(mut self, description: impl Into<String>) -> Self {
		self.error_description = Some(description.into());

		self
	}

	/// Adds a truncated body preview.
	pub fn with_body_preview(mut self, body: impl Into<String>) -> Self {
		self.body_preview = Some(truncate_preview(body.into()));

		self
	}
}

/// Strategy tuned for OIDC providers that follow RFC 6749 error codes.
///
/// Structured OAuth fields win, then hints in the body, then the HTTP status. Network failures
/// are always transient.
#[derive(Debug, Default)]
pub struct DefaultProviderStrategy;
impl ProviderStrategy for DefaultProviderStrategy {
	fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind {
		if ctx.network_error {
			return ProviderErrorKind::Transient;
		}

		ctx.oauth_error
			.as_deref()
			.and_then(classify_code)
			.or_else(|| classify_text(ctx.error_description.as_deref()))
			.or_else(|| classify_text(ctx.body_preview.as_deref()))
			.unwrap_or_else(|| classify_status(ctx.http_status))
	}
}

fn truncate_preview(body: String) -> String {
	match body.char_indices().nth(ProviderErrorContext::BODY_PREVIEW_LIMIT) {
		Some((cut, _)) => format!("{}…", &body[..cut]),
		None => body,
	}
}

fn classify_code(code: &str) -> Option<ProviderErrorKind> {
	match code.to_ascii_lowercase().as_str() {
		"invalid_grant" | "access_denied" | "interaction_required" | "consent_required"
		| "login_required" => Some(ProviderErrorKind::InvalidGrant),
		"invalid_client" | "unauthorized_client" => Some(ProviderErrorKind::InvalidClient),
		"invalid_scope" | "insufficient_scope" => Some(ProviderErrorKind::InsufficientScope),
		"temporarily_unavailable" | "server_error" => Some(ProviderErrorKind::Transient),
		_ => None,
	}
}

fn classify_text(text: Option<&str>) -> Option<ProviderErrorKind> {
	let lowered = text?.to_ascii_lowercase();

	[
		("invalid_grant", ProviderErrorKind::InvalidGrant),
		("invalid_client", ProviderErrorKind::InvalidClient),
		("invalid_scope", ProviderErrorKind::InsufficientScope),
		("insufficient_scope", ProviderErrorKind::InsufficientScope),
		("temporarily_unavailable", ProviderErrorKind::Transient),
	]
	.into_iter()
	.find_map(|(needle, kind)| lowered.contains(needle).then_some(kind))
}

fn classify_status(status: Option<u16>) -> ProviderErrorKind {
	match status {
		Some(400 | 404 | 410) => ProviderErrorKind::InvalidGrant,
		Some(401) => ProviderErrorKind::InvalidClient,
		Some(403) => ProviderErrorKind::InsufficientScope,
		_ => ProviderErrorKind::Transient,
	}
}
