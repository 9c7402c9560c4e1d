//! Handlebars templates, flash messages, and profile flattening for the pages.

// crates.io
use axum::response::Html;
use handlebars::{Handlebars, RenderError};
use serde_json::{Map, Value};
use tower_sessions::{Session, session};
// self
use crate::{_prelude::*, error::ConfigError, mode::Mode};

const FLASHES_KEY: &str = "_flashes";
const TEMPLATES: [(&str, &str); 6] = [
	("layout_head", include_str!("../../templates/layout_head.hbs")),
	("layout_foot", include_str!("../../templates/layout_foot.hbs")),
	("index", include_str!("../../templates/index.hbs")),
	("view", include_str!("../../templates/view.hbs")),
	("edit", include_str!("../../templates/edit.hbs")),
	("error_page", include_str!("../../templates/error_page.hbs")),
];

/// Compiled page templates.
#[derive(Debug)]
pub struct Templates(Handlebars<'static>);
impl Templates {
	/// Compiles the embedded templates.
	pub fn new() -> Result<Self, ConfigError> {
		let mut registry = Handlebars::new();

		for (name, source) in TEMPLATES {
			registry
				.register_template_string(name, source)
				.map_err(|e| ConfigError::Template { name, source: Box::new(e) })?;
		}

		Ok(Self(registry))
	}

	/// Renders `name` with `data`.
	pub fn render<T>(&self, name: &str, data: &T) -> Result<Html<String>, RenderError>
	where
		T: Serialize,
	{
		self.0.render(name, data).map(Html)
	}
}

/// Data every page receives next to its own body.
#[derive(Debug, Serialize)]
pub struct PageContext<T> {
	/// Active credential mode.
	pub app_mode: Mode,
	/// Flash messages queued for this render.
	pub flashes: Vec<Flash>,
	/// Page-specific data; must serialize as a map.
	#[serde(flatten)]
	pub body: T,
}

/// One-shot message shown on the next rendered page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
	/// Category, e.g. `success`.
	pub category: String,
	/// Message text.
	pub message: String,
}

/// Queues a flash message in the session.
pub async fn flash(
	session: &Session,
	category: impl Into<String>,
	message: impl Into<String>,
) -> Result<(), session::Error> {
	let mut flashes = session.get::<Vec<Flash>>(FLASHES_KEY).await?.unwrap_or_default();

	flashes.push(Flash { category: category.into(), message: message.into() });

	session.insert(FLASHES_KEY, flashes).await
}

/// Removes and returns the queued flash messages.
pub async fn take_flashes(session: &Session) -> Result<Vec<Flash>, session::Error> {
	Ok(session.remove::<Vec<Flash>>(FLASHES_KEY).await?.unwrap_or_default())
}

/// One editable or displayed profile property.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Field {
	/// Property name.
	pub name: String,
	/// Display value.
	pub value: String,
	/// Whether the edit form must not change it.
	pub read_only: bool,
}

/// Flattens a directory response into one field list per user.
///
/// Collections (`{"value": [...]}`) yield one list per member; a single object yields one list.
/// `@odata.*` annotations are dropped.
pub fn profile_records(result: &Value) -> Vec<Vec<Field>> {
	match result.get("value") {
		Some(Value::Array(members)) => members.iter().filter_map(Value::as_object).map(fields).collect(),
		_ => result.as_object().map(fields).into_iter().collect(),
	}
}

fn fields(object: &Map<String, Value>) -> Vec<Field> {
	object
		.iter()
		.filter(|(name, _)| !name.starts_with("@odata."))
		.map(|(name, value)| Field {
			name: name.clone(),
			value: match value {
				Value::Null => String::new(),
				Value::String(text) => text.clone(),
				other => other.to_string(),
			},
			read_only: name == "id",
		})
		.collect()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn templates_compile_and_escape() {
		let templates = Templates::new().expect("Embedded templates should compile.");
		let Html(body) = templates
			.render(
				"error_page",
				&PageContext {
					app_mode: Mode::App,
					flashes: vec![Flash { category: "success".into(), message: "Saved.".into() }],
					body: serde_json::json!({
						"error_message": "<script>",
						"error_description": "Denied.",
					}),
				},
			)
			.expect("Error page should render.");

		assert!(body.contains("&lt;script&gt;"));
		assert!(body.contains("Denied."));
		assert!(body.contains("Saved."));
		assert!(body.contains(r#"<option value="app" selected>"#));
	}

	#[test]
	fn records_flatten_collections_and_objects() {
		let single = serde_json::json!({
			"@odata.context": "https://graph.example.com/$metadata#users/$entity",
			"id": "u-1",
			"displayName": "Ada",
			"mobilePhone": null,
		});
		let records = profile_records(&single);

		assert_eq!(records.len(), 1);
		assert_eq!(records[0].len(), 3);
		assert!(records[0].iter().any(|field| field.name == "id" && field.read_only));
		assert!(records[0].iter().any(|field| field.name == "mobilePhone" && field.value.is_empty()));

		let collection = serde_json::json!({ "value": [{ "id": "u-1" }, { "id": "u-2" }] });

		assert_eq!(profile_records(&collection).len(), 2);
	}
}
