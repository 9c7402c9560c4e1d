//! HTTP surface: shared state, the router, and the server loop.

pub mod error;
pub mod render;
pub mod routes;
pub mod url;

// crates.io
use axum::{
	Router, middleware,
	routing::{get, post},
};
use tokio::net::TcpListener;
use tower_sessions::{MemoryStore, SessionManagerLayer, cookie::SameSite};
// self
use crate::{
	_prelude::*,
	cache::{SharedCache, SimpleCache},
	config::AppConfig,
	http::ReqwestHttpClient,
	mode::ModeSelector,
	web::{error::render_error_pages, render::Templates},
};

/// State shared by every handler.
pub struct AppState {
	/// Validated configuration.
	pub config: Arc<AppConfig>,
	/// Shared cache holding the mode flag and pending sign-in flows.
	pub cache: Arc<dyn SharedCache>,
	/// Active profile and its identity client.
	pub selector: ModeSelector,
	/// Compiled page templates.
	pub templates: Templates,
	/// Transport for directory calls.
	pub http_client: ReqwestHttpClient,
}
impl AppState {
	/// Validates `config` and builds the user-mode identity client.
	pub fn new(config: AppConfig, http_client: ReqwestHttpClient) -> Result<Self> {
		config.validate()?;

		let config = Arc::new(config);
		let cache: Arc<dyn SharedCache> = Arc::new(SimpleCache::default());
		let selector = ModeSelector::new(config.clone(), cache.clone(), http_client.clone())?;
		let templates = Templates::new()?;

		Ok(Self { config, cache, selector, templates, http_client })
	}
}
impl Debug for AppState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AppState")
			.field("server", &self.config.server)
			.field("selector", &self.selector)
			.finish_non_exhaustive()
	}
}

/// Builds the portal router.
///
/// The authorization callback is mounted at the user profile's redirect path. The session cookie
/// is `SameSite=Lax` so it survives the provider's top-level redirect back to the callback.
pub fn router(state: Arc<AppState>) -> Router {
	let sessions = SessionManagerLayer::new(MemoryStore::default())
		.with_secure(state.config.server.secure_cookies)
		.with_same_site(SameSite::Lax);

	Router::new()
		.route("/", get(routes::index))
		.route("/set_mode", post(routes::set_mode))
		.route("/login", get(routes::login))
		.route(&state.config.user.redirect_path, get(routes::auth_response))
		.route("/logout", get(routes::logout))
		.route("/view/{details}", get(routes::view))
		.route("/edit/{details}", get(routes::edit_form).post(routes::edit_submit))
		.layer(middleware::from_fn_with_state(state.clone(), render_error_pages))
		.layer(sessions)
		.with_state(state)
}

/// Serves the portal on `listener` until `shutdown` resolves.
pub async fn serve<F>(
	state: Arc<AppState>,
	listener: TcpListener,
	shutdown: F,
) -> std::io::Result<()>
where
	F: 'static + Send + Future<Output = ()>,
{
	if let Ok(addr) = listener.local_addr() {
		tracing::info!(%addr, "Directory portal is listening.");
	}

	axum::serve(listener, router(state)).with_graceful_shutdown(shutdown).await
}
