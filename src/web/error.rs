//! Error pages.
//!
//! Handlers fail with [`WebError`]; its response carries an [`ErrorPage`] extension that
//! [`render_error_pages`] turns into the HTML error page.

// crates.io
use axum::{
	extract::{Request, State},
	http::StatusCode,
	middleware::Next,
	response::{IntoResponse, Response},
};
// self
use crate::{
	_prelude::*,
	web::{AppState, render::PageContext},
};

const UNKNOWN_DESCRIPTION: &str = "An unknown error occurred.";

/// Content of the error page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorPage {
	/// Headline.
	pub error_message: String,
	/// Detail line, when there is more to say than the headline.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error_description: Option<String>,
}
impl ErrorPage {
	/// Page with a headline only.
	pub fn message(message: impl Into<String>) -> Self {
		Self { error_message: message.into(), error_description: None }
	}

	/// Adds a detail line.
	pub fn with_description(mut self, description: impl Into<String>) -> Self {
		self.error_description = Some(description.into());

		self
	}

	/// Page describing a portal error.
	pub fn from_error(e: &Error) -> Self {
		let message = e.to_string();
		let description = e.description();

		if description == message {
			Self::message(message)
		} else {
			Self::message(message).with_description(description)
		}
	}
}

/// Unhandled handler failure, rendered as a 500 error page.
#[derive(Debug)]
pub struct WebError {
	status: StatusCode,
	page: ErrorPage,
}
impl WebError {
	/// Error with an explicit page.
	pub fn new(status: StatusCode, page: ErrorPage) -> Self {
		Self { status, page }
	}
}
impl From<Error> for WebError {
	fn from(e: Error) -> Self {
		tracing::error!(error = %e, "Request failed.");

		Self::new(StatusCode::INTERNAL_SERVER_ERROR, ErrorPage::from_error(&e))
	}
}
impl From<crate::error::ConfigError> for WebError {
	fn from(e: crate::error::ConfigError) -> Self {
		Error::from(e).into()
	}
}
impl From<crate::store::StoreError> for WebError {
	fn from(e: crate::store::StoreError) -> Self {
		Error::from(e).into()
	}
}
impl From<tower_sessions::session::Error> for WebError {
	fn from(e: tower_sessions::session::Error) -> Self {
		tracing::error!(error = %e, "Session store failed.");

		Self::new(
			StatusCode::INTERNAL_SERVER_ERROR,
			ErrorPage::message(e.to_string()).with_description(UNKNOWN_DESCRIPTION),
		)
	}
}
impl From<handlebars::RenderError> for WebError {
	fn from(e: handlebars::RenderError) -> Self {
		tracing::error!(error = %e, "Template rendering failed.");

		Self::new(
			StatusCode::INTERNAL_SERVER_ERROR,
			ErrorPage::message(e.to_string()).with_description(UNKNOWN_DESCRIPTION),
		)
	}
}
impl IntoResponse for WebError {
	fn into_response(self) -> Response {
		let mut response = self.status.into_response();

		response.extensions_mut().insert(self.page);

		response
	}
}

/// Renders responses carrying an [`ErrorPage`] extension.
pub async fn render_error_pages(
	State(state): State<Arc<AppState>>,
	request: Request,
	next: Next,
) -> Response {
	let mut response = next.run(request).await;
	let Some(mut page) = response.extensions_mut().remove::<ErrorPage>() else {
		return response;
	};
	let status = response.status();

	if page.error_description.is_none() {
		page.error_description = Some(UNKNOWN_DESCRIPTION.into());
	}

	let context =
		PageContext { app_mode: state.selector.current_mode(), flashes: Vec::new(), body: &page };

	match state.templates.render("error_page", &context) {
		Ok(html) => (status, html).into_response(),
		Err(e) => {
			tracing::error!(error = %e, "Error page could not be rendered.");

			(status, page.error_message.clone()).into_response()
		},
	}
}
