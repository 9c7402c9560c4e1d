//! Directory REST client: field-selected reads and profile patches.

// crates.io
use reqwest::{StatusCode, header::CONTENT_TYPE};
use serde_json::{Map, Value};
// self
use crate::{
	_prelude::*,
	error::TransportError,
	http::ReqwestHttpClient,
	obs::{self, Operation},
};

/// Fields read when the caller does not choose any.
pub const DEFAULT_FIELDS: &str =
	"id,userPrincipalName,displayName,givenName,surname,jobTitle,mobilePhone,officeLocation";
/// Personal profile fields.
pub const PERSONAL_FIELDS: &str = "id,displayName,givenName,surname";
/// Work profile fields.
pub const WORK_FIELDS: &str = "id,displayName,jobTitle,mobilePhone,officeLocation";
/// Every field.
pub const ALL_FIELDS: &str = "*";
/// Message returned by a successful patch.
pub const UPDATE_SUCCESSFUL: &str = "Update successful";

/// Directory API failures.
#[derive(Debug, ThisError)]
pub enum DirectoryError {
	/// The API answered with a non-success status.
	#[error("Directory API returned HTTP {status}.")]
	Status {
		/// HTTP status code.
		status: u16,
		/// Response body, possibly empty.
		body: String,
	},
	/// The response body is not the expected JSON.
	#[error("Directory API returned malformed JSON.")]
	Decode(#[from] serde_path_to_error::Error<serde_json::Error>),
	/// The configured endpoint cannot take a user id segment.
	#[error("Directory endpoint `{endpoint}` cannot address a single user.")]
	InvalidEndpoint {
		/// Configured endpoint.
		endpoint: String,
	},
	/// The patch did not name the user to update.
	#[error("The update does not identify a user.")]
	MissingUserId,
}

/// Profile sections exposed by the view and edit pages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailView {
	/// Name fields.
	Personal,
	/// Job and office fields.
	Work,
	/// Every field.
	All,
}
impl DetailView {
	/// Parses a path parameter; unknown sections yield `None`.
	pub fn parse(details: &str) -> Option<Self> {
		match details {
			"personal" => Some(Self::Personal),
			"work" => Some(Self::Work),
			"all" => Some(Self::All),
			_ => None,
		}
	}

	/// `$select` value for the section.
	pub const fn fields(self) -> &'static str {
		match self {
			Self::Personal => PERSONAL_FIELDS,
			Self::Work => WORK_FIELDS,
			Self::All => ALL_FIELDS,
		}
	}

	/// Fields read by the view page; unknown sections fall back to work fields.
	pub fn view_fields(details: &str) -> &'static str {
		Self::parse(details).map_or(WORK_FIELDS, Self::fields)
	}
}

/// Client for one directory endpoint.
#[derive(Clone, Debug)]
pub struct DirectoryClient {
	http_client: ReqwestHttpClient,
	endpoint: Url,
}
impl DirectoryClient {
	/// Creates a client for `endpoint`.
	pub fn new(http_client: ReqwestHttpClient, endpoint: Url) -> Self {
		Self { http_client, endpoint }
	}

	/// `GET {endpoint}?$select={fields}`.
	pub async fn get_data(&self, access_token: &str, fields: Option<&str>) -> Result<Value> {
		obs::observe(Operation::DirectoryRead, "get_data", async move {
			let mut url = self.endpoint.clone();

			url.query_pairs_mut().append_pair("$select", fields.unwrap_or(DEFAULT_FIELDS));

			let response = self
				.http_client
				.get(url)
				.bearer_auth(access_token)
				.header(CONTENT_TYPE, "application/json")
				.send()
				.await
				.map_err(network)?;
			let bytes = success_body(response).await?;
			let mut de = serde_json::Deserializer::from_slice(&bytes);
			let value: Value =
				serde_path_to_error::deserialize(&mut de).map_err(DirectoryError::from)?;

			Ok(value)
		})
		.await
	}

	/// `PATCH {endpoint}/{user_id}` with the submitted fields.
	///
	/// `id` and `@odata.*` keys are read-only on the directory side and are left out of the body.
	pub async fn update_data(
		&self,
		access_token: &str,
		user_id: &str,
		data: &BTreeMap<String, String>,
	) -> Result<String> {
		obs::observe(Operation::DirectoryWrite, "update_data", async move {
			let url = self.user_url(user_id)?;
			let response = self
				.http_client
				.patch(url)
				.bearer_auth(access_token)
				.json(&patch_body(data))
				.send()
				.await
				.map_err(network)?;
			let status = response.status();

			success_body(response).await?;

			if status != StatusCode::NO_CONTENT {
				tracing::debug!(status = status.as_u16(), "Directory patch returned a body.");
			}

			Ok(UPDATE_SUCCESSFUL.to_owned())
		})
		.await
	}

	fn user_url(&self, user_id: &str) -> Result<Url> {
		if user_id.trim().is_empty() {
			return Err(DirectoryError::MissingUserId.into());
		}

		let mut url = self.endpoint.clone();

		url.set_query(None);
		url.path_segments_mut()
			.map_err(|_| DirectoryError::InvalidEndpoint { endpoint: self.endpoint.to_string() })?
			.pop_if_empty()
			.push(user_id);

		Ok(url)
	}
}

fn patch_body(data: &BTreeMap<String, String>) -> Map<String, Value> {
	data.iter()
		.filter(|(key, _)| key.as_str() != "id" && !key.starts_with("@odata."))
		.map(|(key, value)| (key.clone(), Value::String(value.clone())))
		.collect()
}

fn network(e: ReqwestError) -> Error {
	TransportError::network("the directory API", e).into()
}

async fn success_body(response: reqwest::Response) -> Result<Vec<u8>> {
	let status = response.status();
	let bytes = response.bytes().await.map_err(network)?;

	if !status.is_success() {
		return Err(DirectoryError::Status {
			status: status.as_u16(),
			body: String::from_utf8_lossy(&bytes).into_owned(),
		}
		.into());
	}

	Ok(bytes.to_vec())
}
