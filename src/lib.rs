//! Sign a user (delegated mode) or the application itself (app mode) into an OIDC provider and
//! read or patch directory profiles on the signed-in identity's behalf.

#![deny(clippy::all)]
#![warn(missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod cache;
pub mod config;
pub mod directory;
pub mod error;
pub mod http;
pub mod identity;
pub mod mode;
pub mod oauth;
pub mod obs;
pub mod provider;
pub mod store;
pub mod telemetry;
pub mod web;
#[doc(hidden)]
pub mod _preludet {
	//! Convenience re-exports and helpers shared by unit and integration tests.

	pub use crate::_prelude::*;

	// crates.io
	use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
	// self
	use crate::{
		config::{AppConfig, ProfileConfig, ServerConfig},
		http::ReqwestHttpClient,
		identity::IdentityClient,
		mode::Mode,
		provider::{DefaultProviderStrategy, ProviderDescriptor, ProviderStrategy},
		store::{MemoryTokenCache, TokenCache},
	};

	/// Client identifier shared by test profiles.
	pub const TEST_CLIENT_ID: &str = "client-it";
	/// Client secret shared by test profiles.
	pub const TEST_CLIENT_SECRET: &str = "secret-it";

	/// Builds a reqwest HTTP client suitable for talking to local mock servers.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Derives a provider descriptor from an authority URL rooted at a mock server.
	pub fn test_descriptor(authority: &str) -> ProviderDescriptor {
		let authority = Url::parse(authority).expect("Mock authority should parse successfully.");

		ProviderDescriptor::from_authority(&authority)
			.expect("Mock authority should produce a valid descriptor.")
	}

	/// Constructs an [`IdentityClient`] backed by an in-memory token cache.
	pub fn build_test_identity_client(
		descriptor: ProviderDescriptor,
	) -> (IdentityClient, Arc<MemoryTokenCache>) {
		let cache_backend = Arc::new(MemoryTokenCache::default());
		let cache: Arc<dyn TokenCache> = cache_backend.clone();
		let strategy: Arc<dyn ProviderStrategy> = Arc::new(DefaultProviderStrategy);
		let client = IdentityClient::with_http_client(
			cache,
			descriptor,
			strategy,
			TEST_CLIENT_ID,
			test_reqwest_http_client(),
		)
		.with_client_secret(TEST_CLIENT_SECRET);

		(client, cache_backend)
	}

	/// Builds a profile whose authority and directory endpoint live on `base_url`.
	pub fn test_profile(mode: Mode, base_url: &str, scope: &[&str]) -> ProfileConfig {
		let base = base_url.trim_end_matches('/');

		ProfileConfig {
			mode,
			client_id: TEST_CLIENT_ID.into(),
			client_secret: TEST_CLIENT_SECRET.into(),
			authority: Url::parse(&format!("{base}/tenant-it"))
				.expect("Mock authority should parse successfully."),
			redirect_path: "/getAToken".into(),
			endpoint: Url::parse(&format!("{base}/v1.0/users"))
				.expect("Mock directory endpoint should parse successfully."),
			scope: scope.iter().map(|value| value.to_string()).collect(),
		}
	}

	/// Builds an application config whose two profiles point at the same mock server.
	pub fn test_app_config(base_url: &str) -> AppConfig {
		AppConfig {
			server: ServerConfig {
				public_base_url: Some(
					Url::parse("https://portal.example.com")
						.expect("Public base URL fixture should parse successfully."),
				),
				..ServerConfig::default()
			},
			user: test_profile(Mode::User, base_url, &["User.Read"]),
			app: test_profile(Mode::App, base_url, &["https://graph.example.com/.default"]),
		}
	}

	/// Encodes an unsigned JWT carrying `claims`; only the payload is read by the crate.
	pub fn encode_test_id_token(claims: &serde_json::Value) -> String {
		let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
		let payload = URL_SAFE_NO_PAD.encode(
			serde_json::to_vec(claims).expect("Claims fixture should serialize to JSON."),
		);

		format!("{header}.{payload}.signature")
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap, hash_map::DefaultHasher},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		hash::{Hash, Hasher},
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(test)] use {http_body_util as _, httpmock as _, tower as _};
// Binary-only dependencies.
use {clap as _, color_eyre as _, dotenvy as _};
