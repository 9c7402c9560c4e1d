//! TOML configuration: server settings plus the delegated (`[user]`) and application (`[app]`)
//! client registrations.
//!
//! ```toml
//! [server]
//! listen = "127.0.0.1:5000"
//!
//! [user]
//! mode = "user"
//! client_id = "..."
//! authority = "https://login.microsoftonline.com/{tenant}"
//! endpoint = "https://graph.microsoft.com/v1.0/me"
//! scope = ["User.Read"]
//! ```
//!
//! Secrets may be left out of the file and supplied through `PORTAL_USER_CLIENT_ID`,
//! `PORTAL_USER_CLIENT_SECRET`, `PORTAL_APP_CLIENT_ID`, and `PORTAL_APP_CLIENT_SECRET`.

// std
use std::{fs, net::SocketAddr, path::Path};
// self
use crate::{_prelude::*, auth::ScopeSet, error::ConfigError, mode::Mode};

/// Default callback path of the authorization-code flow.
pub const DEFAULT_REDIRECT_PATH: &str = "/getAToken";

const RESERVED_PATHS: [&str; 3] = ["/set_mode", "/login", "/logout"];
const RESERVED_PREFIXES: [&str; 2] = ["/view/", "/edit/"];

/// Complete portal configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
	/// HTTP server settings.
	#[serde(default)]
	pub server: ServerConfig,
	/// Delegated registration used in user mode.
	pub user: ProfileConfig,
	/// Application registration used in app mode.
	pub app: ProfileConfig,
}
impl AppConfig {
	/// Reads, overrides from the process environment, and validates a configuration file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let raw = fs::read_to_string(path)
			.map_err(|source| ConfigError::ReadFile { path: path.display().to_string(), source })?;
		let mut config = Self::from_toml(&raw)?;

		config.apply_env_overrides(|key| std::env::var(key).ok());
		config.validate()?;

		Ok(config)
	}

	/// Parses a configuration document without validating it.
	pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
		let mut config: Self = toml::from_str(raw)?;

		config.server.normalize();

		Ok(config)
	}

	/// Replaces client credentials with values found through `lookup`.
	pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
		for (prefix, profile) in [("PORTAL_USER", &mut self.user), ("PORTAL_APP", &mut self.app)] {
			if let Some(client_id) = lookup(&format!("{prefix}_CLIENT_ID")) {
				profile.client_id = client_id;
			}
			if let Some(client_secret) = lookup(&format!("{prefix}_CLIENT_SECRET")) {
				profile.client_secret = client_secret;
			}
		}
	}

	/// Startup checks that do not depend on the registration being complete.
	pub fn validate(&self) -> Result<(), ConfigError> {
		for profile in [&self.user, &self.app] {
			profile.validate()?;
		}

		Ok(())
	}

	/// Profile backing `mode`.
	pub fn profile(&self, mode: Mode) -> &ProfileConfig {
		match mode {
			Mode::User => &self.user,
			Mode::App => &self.app,
		}
	}
}

/// HTTP server settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
	/// Socket address to bind.
	pub listen: SocketAddr,
	/// Externally visible origin; when unset it is derived from proxy headers and `Host`.
	pub public_base_url: Option<Url>,
	/// Marks the session cookie `Secure`.
	pub secure_cookies: bool,
}
impl ServerConfig {
	/// Gives the public base URL a trailing slash so joined paths stay under its prefix.
	pub fn normalize(&mut self) {
		let Some(base) = self.public_base_url.as_mut() else { return };

		if !base.path().ends_with('/') {
			let path = format!("{}/", base.path());

			base.set_path(&path);
		}
	}
}
impl Default for ServerConfig {
	fn default() -> Self {
		Self {
			listen: SocketAddr::from(([127, 0, 0, 1], 5000)),
			public_base_url: None,
			secure_cookies: false,
		}
	}
}

/// One client registration and the directory endpoint it talks to.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProfileConfig {
	/// Credential strategy this registration is meant for.
	#[serde(default)]
	pub mode: Mode,
	/// OAuth client identifier.
	#[serde(default)]
	pub client_id: String,
	/// OAuth client secret.
	#[serde(default)]
	pub client_secret: String,
	/// Tenant authority, e.g. `https://login.microsoftonline.com/{tenant}`.
	pub authority: Url,
	/// Callback path of the authorization-code flow.
	#[serde(default = "default_redirect_path")]
	pub redirect_path: String,
	/// Directory collection or resource URL.
	pub endpoint: Url,
	/// Requested scopes.
	#[serde(default)]
	pub scope: Vec<String>,
}
impl ProfileConfig {
	/// Normalized scope set.
	pub fn scope_set(&self) -> Result<ScopeSet, ConfigError> {
		Ok(ScopeSet::new(self.scope.iter())?)
	}

	/// Fails unless both client id and secret are present.
	pub fn ensure_registered(&self) -> Result<(), ConfigError> {
		if self.client_id.trim().is_empty() || self.client_secret.trim().is_empty() {
			return Err(ConfigError::MissingRegistration);
		}

		Ok(())
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.redirect_path == "/" {
			return Err(ConfigError::RedirectPathIsRoot);
		}
		if !self.redirect_path.starts_with('/') {
			return Err(ConfigError::RedirectPathNotAbsolute { path: self.redirect_path.clone() });
		}
		if RESERVED_PATHS.contains(&self.redirect_path.as_str())
			|| RESERVED_PREFIXES.iter().any(|prefix| self.redirect_path.starts_with(prefix))
		{
			return Err(ConfigError::RedirectPathReserved { path: self.redirect_path.clone() });
		}

		self.scope_set()?;

		Ok(())
	}
}

fn default_redirect_path() -> String {
	DEFAULT_REDIRECT_PATH.into()
}
