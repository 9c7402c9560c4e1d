//! Credential mode selection.
//!
//! The portal acts either as the signed-in user (delegated, [`Mode::User`]) or as itself
//! ([`Mode::App`]). The active mode is kept in the shared cache under [`MODE_KEY`]; switching it
//! activates the matching profile and rebuilds the identity client, dropping the token cache of
//! the previous one.

// self
use crate::{
	_prelude::*,
	cache::{MODE_KEY, SharedCache},
	config::{AppConfig, ProfileConfig},
	http::ReqwestHttpClient,
	identity::IdentityClient,
};

/// Credential strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
	/// Delegated: tokens are issued to a signed-in user.
	#[default]
	User,
	/// Application: tokens are issued to the portal itself.
	App,
}
impl Mode {
	/// `"app"` selects [`Mode::App`]; anything else selects [`Mode::User`].
	pub fn parse_lenient(value: &str) -> Self {
		if value == "app" { Self::App } else { Self::User }
	}

	/// Label used in the cache, forms, and templates.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::User => "user",
			Self::App => "app",
		}
	}
}
impl Display for Mode {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Active profile and the identity client built for it.
#[derive(Clone, Debug)]
pub struct ActiveProfile {
	/// Mode whose profile is active.
	pub mode: Mode,
	/// Identity client bound to that profile.
	pub client: Arc<IdentityClient>,
}

/// Owns the mode flag and the identity client of the active profile.
pub struct ModeSelector {
	config: Arc<AppConfig>,
	cache: Arc<dyn SharedCache>,
	http_client: ReqwestHttpClient,
	active: RwLock<ActiveProfile>,
}
impl ModeSelector {
	/// Starts in user mode.
	pub fn new(
		config: Arc<AppConfig>,
		cache: Arc<dyn SharedCache>,
		http_client: ReqwestHttpClient,
	) -> Result<Self> {
		let active = Self::build(&config, Mode::User, &http_client)?;

		Ok(Self { config, cache, http_client, active: RwLock::new(active) })
	}

	/// Cached mode, falling back to the configured mode of the active profile.
	pub fn current_mode(&self) -> Mode {
		match self.cache.get::<String>(MODE_KEY) {
			Ok(Some(value)) => Mode::parse_lenient(&value),
			Ok(None) => self.profile().mode,
			Err(e) => {
				tracing::warn!(error = %e, "Cached mode is unreadable; using the active profile.");

				self.profile().mode
			},
		}
	}

	/// Active profile configuration.
	pub fn profile(&self) -> &ProfileConfig {
		self.config.profile(self.active.read().mode)
	}

	/// Snapshot of the active profile and its identity client.
	pub fn active(&self) -> ActiveProfile {
		self.active.read().clone()
	}

	/// Stores `mode` and activates its profile.
	pub fn switch(&self, mode: Mode) -> Result<()> {
		self.cache.set(MODE_KEY, &mode.as_str(), None)?;
		self.activate(mode)
	}

	/// Clears the shared cache and returns to user mode.
	pub fn reset(&self) -> Result<()> {
		self.cache.clear();
		self.switch(Mode::User)
	}

	fn activate(&self, mode: Mode) -> Result<()> {
		let active = Self::build(&self.config, mode, &self.http_client)?;

		tracing::info!(mode = mode.as_str(), "Activated profile.");

		*self.active.write() = active;

		Ok(())
	}

	fn build(
		config: &AppConfig,
		mode: Mode,
		http_client: &ReqwestHttpClient,
	) -> Result<ActiveProfile> {
		let client = IdentityClient::from_profile(config.profile(mode), http_client.clone())?;

		Ok(ActiveProfile { mode, client: Arc::new(client) })
	}
}
impl Debug for ModeSelector {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ModeSelector").field("active", &self.active.read().mode).finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		_preludet::{test_app_config, test_reqwest_http_client},
		cache::SimpleCache,
	};

	fn selector() -> (ModeSelector, Arc<dyn SharedCache>) {
		let cache: Arc<dyn SharedCache> = Arc::new(SimpleCache::default());
		let selector = ModeSelector::new(
			Arc::new(test_app_config("http://127.0.0.1:9")),
			cache.clone(),
			test_reqwest_http_client(),
		)
		.expect("Selector should build for the test config.");

		(selector, cache)
	}

	#[test]
	fn lenient_parsing_defaults_to_user() {
		assert_eq!(Mode::parse_lenient("app"), Mode::App);
		assert_eq!(Mode::parse_lenient("user"), Mode::User);
		assert_eq!(Mode::parse_lenient("APP"), Mode::User);
		assert_eq!(Mode::parse_lenient(""), Mode::User);
	}

	#[test]
	fn switch_swaps_profile_and_rebuilds_client() {
		let (selector, cache) = selector();
		let before = selector.active();

		assert_eq!(selector.current_mode(), Mode::User);

		selector.switch(Mode::App).expect("Switching to app mode should succeed.");

		let after = selector.active();

		assert_eq!(selector.current_mode(), Mode::App);
		assert_eq!(after.mode, Mode::App);
		assert_eq!(selector.profile().scope, ["https://graph.example.com/.default"]);
		assert!(!Arc::ptr_eq(&before.client, &after.client));
		assert_eq!(cache.get::<String>(MODE_KEY).expect("Mode should decode."), Some("app".into()));
	}

	#[test]
	fn reset_clears_cache_and_forces_user_mode() {
		let (selector, cache) = selector();

		selector.switch(Mode::App).expect("Switching to app mode should succeed.");
		cache.set("flow:pending", &1_u8, None).expect("Value should serialize.");
		selector.reset().expect("Reset should succeed.");

		assert_eq!(selector.current_mode(), Mode::User);
		assert_eq!(selector.active().mode, Mode::User);
		assert_eq!(cache.get::<u8>("flow:pending").expect("Lookup should succeed."), None);
	}
}
