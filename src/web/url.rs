//! External URLs as seen by the browser.
//!
//! One reverse-proxy hop is trusted: the last entry of `X-Forwarded-Proto` and
//! `X-Forwarded-Host` wins, then `Host`. A configured public base URL overrides both.

// crates.io
use axum::http::{HeaderMap, header::HOST};
// self
use crate::{_prelude::*, config::ServerConfig, error::ConfigError};

const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
const X_FORWARDED_HOST: &str = "x-forwarded-host";

/// Absolute URL for `path` on this server.
pub fn external_url(
	headers: &HeaderMap,
	server: &ServerConfig,
	path: &str,
) -> Result<Url, ConfigError> {
	let base = match &server.public_base_url {
		Some(base) => base.clone(),
		None => {
			let scheme = last_hop(headers, X_FORWARDED_PROTO).unwrap_or("http");
			let host = last_hop(headers, X_FORWARDED_HOST)
				.or_else(|| headers.get(HOST).and_then(|value| value.to_str().ok()))
				.map(str::to_owned)
				.unwrap_or_else(|| server.listen.to_string());

			Url::parse(&format!("{scheme}://{host}/"))
				.map_err(|source| ConfigError::InvalidRedirect { source })?
		},
	};

	base.join(path.trim_start_matches('/')).map_err(|source| ConfigError::InvalidRedirect { source })
}

fn last_hop<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
	headers
		.get(name)?
		.to_str()
		.ok()?
		.rsplit(',')
		.map(str::trim)
		.find(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
	// crates.io
	use axum::http::HeaderValue;
	// self
	use super::*;

	#[test]
	fn forwarded_headers_win_over_host() {
		let mut headers = HeaderMap::new();

		headers.insert(HOST, HeaderValue::from_static("10.0.0.5:5000"));

		assert_eq!(
			external_url(&headers, &ServerConfig::default(), "/getAToken")
				.expect("URL should build.")
				.as_str(),
			"http://10.0.0.5:5000/getAToken"
		);

		headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("http, https"));
		headers.insert(X_FORWARDED_HOST, HeaderValue::from_static("portal.example.com"));

		assert_eq!(
			external_url(&headers, &ServerConfig::default(), "/")
				.expect("URL should build.")
				.as_str(),
			"https://portal.example.com/"
		);
	}

	#[test]
	fn configured_base_overrides_headers() {
		let server = ServerConfig {
			public_base_url: Some(
				Url::parse("https://portal.example.com/portal/").expect("Base fixture should parse."),
			),
			..ServerConfig::default()
		};
		let mut headers = HeaderMap::new();

		headers.insert(HOST, HeaderValue::from_static("internal:5000"));

		assert_eq!(
			external_url(&headers, &server, "/getAToken").expect("URL should build.").as_str(),
			"https://portal.example.com/portal/getAToken"
		);
	}
}
