//! Page handlers.
//!
//! Expected failures (a rejected sign-in, a missing role, a provider error) render the error page
//! with status 200. Anything else bubbles up as a [`WebError`] and becomes a 500 error page.

// crates.io
use axum::{
	Form,
	extract::{Path, Query, State},
	http::{HeaderMap, header::REFERER},
	response::{IntoResponse, Redirect, Response},
};
use serde_json::json;
use tower_sessions::Session;
// self
use crate::{
	_prelude::*,
	auth::{IdTokenClaims, TokenRecord},
	cache::{FLOW_TTL, flow_key},
	directory::{DetailView, DirectoryClient},
	identity::{AuthCodeFlow, AuthCodeResponse},
	mode::Mode,
	web::{
		AppState,
		error::{ErrorPage, WebError},
		render::{self, PageContext},
		url,
	},
};

const STATE_KEY: &str = "state";
const USER_KEY: &str = "user";
const EDIT_PERSONAL_ROLE: &str = "User.Edit.All";
const NO_EDIT_PERMISSION: &str = "You do not have permission to edit this personal details.";
const INVALID_DETAILS: &str = "Invalid details parameter.";
const FLOW_EXPIRED: &str = "The sign-in request has expired or was already completed.";

type PageResult = Result<Response, WebError>;

/// Body of `POST /set_mode`.
#[derive(Debug, Default, Deserialize)]
pub struct ModeForm {
	/// `"app"` or `"user"`; anything else selects user mode.
	#[serde(default)]
	pub mode: String,
}

// Outcome of acquiring a token for the active mode.
enum Access {
	Granted(TokenRecord),
	SignIn,
	Denied(ErrorPage),
}

/// `GET /`.
pub async fn index(State(state): State<Arc<AppState>>, session: Session) -> PageResult {
	state.selector.profile().ensure_registered()?;

	let user = session.get::<IdTokenClaims>(USER_KEY).await?;

	render_page(&state, &session, "index", json!({ "user": user })).await
}

/// `POST /set_mode`.
pub async fn set_mode(
	State(state): State<Arc<AppState>>,
	headers: HeaderMap,
	Form(form): Form<ModeForm>,
) -> PageResult {
	state.selector.switch(Mode::parse_lenient(&form.mode))?;

	let back = headers.get(REFERER).and_then(|value| value.to_str().ok()).unwrap_or("/");

	Ok(Redirect::to(back).into_response())
}

/// `GET /login`.
pub async fn login(
	State(state): State<Arc<AppState>>,
	headers: HeaderMap,
	session: Session,
) -> PageResult {
	let active = state.selector.active();
	let scope = state.config.profile(active.mode).scope_set()?;

	match state.selector.current_mode() {
		Mode::App => match active.client.acquire_token_for_client(&scope).await {
			Ok(_) => Ok(home()),
			Err(e) => error_page(&state, &session, ErrorPage::message(e.description())).await,
		},
		Mode::User => {
			let redirect_uri =
				url::external_url(&headers, &state.config.server, &state.config.user.redirect_path)?;
			let flow = active.client.initiate_auth_code_flow(&scope, redirect_uri)?;

			state.cache.set(&flow_key(&flow.state), &flow, Some(FLOW_TTL))?;
			session.insert(STATE_KEY, &flow.state).await?;

			Ok(Redirect::to(flow.auth_uri.as_str()).into_response())
		},
	}
}

/// `GET {redirect_path}`: the authorization callback.
pub async fn auth_response(
	State(state): State<Arc<AppState>>,
	session: Session,
	Query(response): Query<AuthCodeResponse>,
) -> PageResult {
	if state.selector.current_mode() == Mode::App {
		return Ok(home());
	}
	if response.state != session.get::<String>(STATE_KEY).await? {
		tracing::warn!("Authorization callback state does not match the session.");

		return Ok(home());
	}
	if let Some(error) = &response.error {
		return error_page(&state, &session, ErrorPage::message(error.clone())).await;
	}
	if response.code.is_none() {
		return Ok(home());
	}

	let flow = match response.state.as_deref() {
		Some(returned) => state.cache.take::<AuthCodeFlow>(&flow_key(returned))?,
		None => None,
	};
	let Some(flow) = flow else {
		return error_page(&state, &session, ErrorPage::message(FLOW_EXPIRED)).await;
	};
	let client = state.selector.active().client;

	match client.acquire_token_by_auth_code_flow(flow, &response).await {
		Ok(record) => {
			session.remove::<String>(STATE_KEY).await?;

			if let Some(claims) = &record.id_token_claims {
				session.insert(USER_KEY, claims).await?;
			}

			Ok(home())
		},
		Err(e) => error_page(&state, &session, ErrorPage::from_error(&e)).await,
	}
}

/// `GET /logout`.
pub async fn logout(
	State(state): State<Arc<AppState>>,
	headers: HeaderMap,
	session: Session,
) -> PageResult {
	session.flush().await?;
	state.selector.reset()?;

	let Some(mut end_session) =
		state.selector.active().client.descriptor.endpoints.end_session.clone()
	else {
		return Ok(home());
	};
	let index = url::external_url(&headers, &state.config.server, "/")?;

	end_session.query_pairs_mut().append_pair("post_logout_redirect_uri", index.as_str());

	Ok(Redirect::to(end_session.as_str()).into_response())
}

/// `GET /view/{details}`.
pub async fn view(
	State(state): State<Arc<AppState>>,
	session: Session,
	Path(details): Path<String>,
) -> PageResult {
	let record = match acquire_token(&state).await? {
		Access::Granted(record) => record,
		Access::SignIn => return Ok(Redirect::to("/login").into_response()),
		Access::Denied(page) => return error_page(&state, &session, page).await,
	};
	let result = directory(&state)
		.get_data(record.access_token.expose(), Some(DetailView::view_fields(&details)))
		.await?;

	render_page(
		&state,
		&session,
		"view",
		json!({ "details": details, "records": render::profile_records(&result) }),
	)
	.await
}

/// `GET /edit/{details}`.
pub async fn edit_form(
	State(state): State<Arc<AppState>>,
	session: Session,
	Path(details): Path<String>,
) -> PageResult {
	let (record, fields) = match edit_access(&state, &session, &details).await {
		Ok(granted) => granted,
		Err(response) => return Ok(response),
	};

	render_edit(&state, &session, &details, &record, fields).await
}

/// `POST /edit/{details}`: patches the submitted fields of the user named by form field `id`.
pub async fn edit_submit(
	State(state): State<Arc<AppState>>,
	session: Session,
	Path(details): Path<String>,
	Form(form): Form<BTreeMap<String, String>>,
) -> PageResult {
	let (record, fields) = match edit_access(&state, &session, &details).await {
		Ok(granted) => granted,
		Err(response) => return Ok(response),
	};
	let user_id = form.get("id").map(String::as_str).unwrap_or_default();
	let message =
		directory(&state).update_data(record.access_token.expose(), user_id, &form).await?;

	render::flash(&session, "success", message).await?;

	render_edit(&state, &session, &details, &record, fields).await
}

async fn acquire_token(state: &AppState) -> Result<Access, WebError> {
	let active = state.selector.active();
	let scope = state.config.profile(active.mode).scope_set()?;
	let result = match state.selector.current_mode() {
		Mode::App => active.client.acquire_token_for_client(&scope).await.map(Some),
		Mode::User => {
			let accounts = active.client.accounts().await?;
			let Some(account) = accounts.first() else {
				return Ok(Access::SignIn);
			};

			active.client.acquire_token_silent(&scope, account).await
		},
	};

	Ok(match result {
		Ok(Some(record)) => Access::Granted(record),
		Ok(None) => Access::SignIn,
		Err(e) => Access::Denied(ErrorPage::message(e.description())),
	})
}

// Token plus the field set the edit page works on, or the response that ends the request.
async fn edit_access(
	state: &AppState,
	session: &Session,
	details: &str,
) -> Result<(TokenRecord, &'static str), Response> {
	let record = match acquire_token(state).await.map_err(IntoResponse::into_response)? {
		Access::Granted(record) => record,
		Access::SignIn => return Err(Redirect::to("/login").into_response()),
		Access::Denied(page) => return Err(error_response(state, session, page).await),
	};
	let denied = match DetailView::parse(details) {
		Some(DetailView::Work) => return Ok((record, DetailView::Work.fields())),
		Some(DetailView::Personal) if record.has_role(EDIT_PERSONAL_ROLE) =>
			return Ok((record, DetailView::Personal.fields())),
		Some(DetailView::Personal) => NO_EDIT_PERMISSION,
		_ => INVALID_DETAILS,
	};

	Err(error_response(state, session, ErrorPage::message(denied)).await)
}

async fn render_edit(
	state: &AppState,
	session: &Session,
	details: &str,
	record: &TokenRecord,
	fields: &str,
) -> PageResult {
	let result = directory(state).get_data(record.access_token.expose(), Some(fields)).await?;

	render_page(
		state,
		session,
		"edit",
		json!({ "details": details, "records": render::profile_records(&result) }),
	)
	.await
}

fn directory(state: &AppState) -> DirectoryClient {
	DirectoryClient::new(state.http_client.clone(), state.selector.profile().endpoint.clone())
}

async fn render_page<T>(state: &AppState, session: &Session, name: &str, body: T) -> PageResult
where
	T: Serialize,
{
	let context = PageContext {
		app_mode: state.selector.current_mode(),
		flashes: render::take_flashes(session).await?,
		body,
	};

	Ok(state.templates.render(name, &context)?.into_response())
}

async fn error_page(state: &AppState, session: &Session, page: ErrorPage) -> PageResult {
	tracing::warn!(error = %page.error_message, "Rendering error page.");

	render_page(state, session, "error_page", page).await
}

async fn error_response(state: &AppState, session: &Session, page: ErrorPage) -> Response {
	match error_page(state, session, page).await {
		Ok(response) => response,
		Err(e) => e.into_response(),
	}
}

fn home() -> Response {
	Redirect::to("/").into_response()
}
