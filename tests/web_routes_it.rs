// crates.io
use axum::{
	Router,
	body::Body,
	http::{Request, Response, StatusCode, header},
};
use http_body_util::BodyExt;
use httpmock::prelude::*;
use serde_json::json;
use tower::ServiceExt;
// self
use directory_portal::{
	_preludet::*,
	config::AppConfig,
	directory::{PERSONAL_FIELDS, WORK_FIELDS},
	mode::Mode,
	web::{self, AppState},
};

const TOKEN_PATH: &str = "/tenant-it/oauth2/v2.0/token";

fn portal(server: &MockServer) -> (Router, Arc<AppState>) {
	portal_with(test_app_config(&server.base_url()))
}

fn portal_with(config: AppConfig) -> (Router, Arc<AppState>) {
	let state = Arc::new(
		AppState::new(config, test_reqwest_http_client()).expect("Portal state should build."),
	);

	(web::router(state.clone()), state)
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
	let mut builder = Request::builder().uri(uri);

	if let Some(cookie) = cookie {
		builder = builder.header(header::COOKIE, cookie);
	}

	builder.body(Body::empty()).expect("GET request fixture should build.")
}

fn post_form(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
	let mut builder = Request::builder()
		.method("POST")
		.uri(uri)
		.header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");

	if let Some(cookie) = cookie {
		builder = builder.header(header::COOKIE, cookie);
	}

	builder.body(Body::from(body.to_owned())).expect("POST request fixture should build.")
}

async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
	router.clone().oneshot(request).await.expect("Router should always produce a response.")
}

async fn text(response: Response<Body>) -> String {
	let bytes = response
		.into_body()
		.collect()
		.await
		.expect("Response body should be readable.")
		.to_bytes();

	String::from_utf8(bytes.to_vec()).expect("Response body should be UTF-8.")
}

fn location(response: &Response<Body>) -> String {
	response
		.headers()
		.get(header::LOCATION)
		.expect("Redirects should carry a location.")
		.to_str()
		.expect("Location should be ASCII.")
		.to_owned()
}

fn session_cookie(response: &Response<Body>) -> String {
	response
		.headers()
		.get(header::SET_COOKIE)
		.expect("Response should set the session cookie.")
		.to_str()
		.expect("Cookie should be ASCII.")
		.split(';')
		.next()
		.unwrap_or_default()
		.to_owned()
}

fn query(url: &str) -> HashMap<String, String> {
	Url::parse(url).expect("URL should parse.").query_pairs().into_owned().collect()
}

fn id_token(nonce: &str) -> String {
	encode_test_id_token(&json!({
		"sub": "subject-it",
		"oid": "object-it",
		"tid": "tenant-it",
		"name": "Ada Lovelace",
		"preferred_username": "ada@example.com",
		"nonce": nonce,
		"roles": ["User.Edit.All"],
	}))
}

async fn mock_client_token(server: &MockServer) -> httpmock::Mock<'_> {
	server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH).body_includes("grant_type=client_credentials");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access_token":"app-access","token_type":"Bearer","expires_in":3600}"#);
		})
		.await
}

#[tokio::test]
async fn index_requires_a_complete_registration() {
	let server = MockServer::start_async().await;
	let mut config = test_app_config(&server.base_url());

	config.user.client_secret.clear();

	let (router, _state) = portal_with(config);
	let response = send(&router, get("/", None)).await;

	assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

	let body = text(response).await;

	assert!(body.contains("App registration is incomplete"));
	assert!(body.contains("An unknown error occurred."));
}

#[tokio::test]
async fn index_renders_the_active_mode() {
	let server = MockServer::start_async().await;
	let (router, _state) = portal(&server);
	let response = send(&router, get("/", None)).await;

	assert_eq!(response.status(), StatusCode::OK);

	let body = text(response).await;

	assert!(body.contains(r#"<option value="user" selected>"#));
	assert!(body.contains("You are not signed in."));
}

#[tokio::test]
async fn set_mode_switches_profile_and_returns_to_referer() {
	let server = MockServer::start_async().await;
	let (router, state) = portal(&server);
	let request = Request::builder()
		.method("POST")
		.uri("/set_mode")
		.header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
		.header(header::REFERER, "https://portal.example.com/view/work")
		.body(Body::from("mode=app"))
		.expect("POST request fixture should build.");
	let response = send(&router, request).await;

	assert!(response.status().is_redirection());
	assert_eq!(location(&response), "https://portal.example.com/view/work");
	assert_eq!(state.selector.current_mode(), Mode::App);
	assert_eq!(state.selector.active().mode, Mode::App);

	let response = send(&router, post_form("/set_mode", "mode=bogus", None)).await;

	assert_eq!(location(&response), "/");
	assert_eq!(state.selector.current_mode(), Mode::User);
}

#[tokio::test]
async fn sign_in_round_trip_renders_claims_and_profile() {
	let server = MockServer::start_async().await;
	let (router, _state) = portal(&server);
	let response = send(&router, get("/login", None)).await;

	assert!(response.status().is_redirection());

	let set_cookie = response
		.headers()
		.get(header::SET_COOKIE)
		.and_then(|value| value.to_str().ok())
		.expect("Sign-in should set the session cookie.");

	// The provider redirects back cross-site; a strict cookie would be withheld.
	assert!(set_cookie.contains("SameSite=Lax"));

	let cookie = session_cookie(&response);
	let authorize = location(&response);
	let params = query(&authorize);

	assert!(authorize.starts_with(&server.url("/tenant-it/oauth2/v2.0/authorize")));
	assert_eq!(params["redirect_uri"], "https://portal.example.com/getAToken");
	assert_eq!(params["client_id"], TEST_CLIENT_ID);

	let token = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(TOKEN_PATH)
				.body_includes("grant_type=authorization_code")
				.body_includes("code=code-it");
			then.status(200).header("content-type", "application/json").json_body(json!({
				"access_token": "user-access",
				"refresh_token": "user-refresh",
				"id_token": id_token(&params["nonce"]),
				"token_type": "Bearer",
				"expires_in": 3600,
			}));
		})
		.await;
	let callback = format!("/getAToken?code=code-it&state={}", params["state"]);
	let response = send(&router, get(&callback, Some(&cookie))).await;

	assert!(response.status().is_redirection());
	assert_eq!(location(&response), "/");

	token.assert_async().await;

	let body = text(send(&router, get("/", Some(&cookie))).await).await;

	assert!(body.contains("Welcome, Ada Lovelace"));

	let directory = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/v1.0/users")
				.query_param("$select", PERSONAL_FIELDS)
				.header("authorization", "Bearer user-access");
			then.status(200).json_body(json!({
				"id": "u-1",
				"displayName": "Ada Lovelace",
				"givenName": "Ada",
				"surname": "Lovelace",
			}));
		})
		.await;
	let response = send(&router, get("/view/personal", Some(&cookie))).await;

	assert_eq!(response.status(), StatusCode::OK);
	assert!(text(response).await.contains("givenName"));

	let response = send(&router, get("/edit/personal", Some(&cookie))).await;

	assert_eq!(response.status(), StatusCode::OK);
	assert!(text(response).await.contains(r#"name="surname" value="Lovelace""#));

	let patch = server
		.mock_async(|when, then| {
			when.method(PATCH)
				.path("/v1.0/users/u-1")
				.header("authorization", "Bearer user-access")
				.json_body(json!({
					"displayName": "Ada Lovelace",
					"givenName": "Ada",
					"surname": "Byron",
				}));
			then.status(204);
		})
		.await;
	let response = send(
		&router,
		post_form(
			"/edit/personal",
			"id=u-1&displayName=Ada+Lovelace&givenName=Ada&surname=Byron",
			Some(&cookie),
		),
	)
	.await;

	assert_eq!(response.status(), StatusCode::OK);
	assert!(text(response).await.contains("Update successful"));

	patch.assert_async().await;
	directory.assert_calls_async(3).await;

	// The flow and the session state are single use.
	let response = send(&router, get(&callback, Some(&cookie))).await;

	assert!(response.status().is_redirection());
}

#[tokio::test]
async fn callback_with_foreign_state_goes_home() {
	let server = MockServer::start_async().await;
	let (router, _state) = portal(&server);
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(500);
		})
		.await;
	let response = send(&router, get("/login", None)).await;
	let cookie = session_cookie(&response);
	let response =
		send(&router, get("/getAToken?code=code-it&state=forged", Some(&cookie))).await;

	assert!(response.status().is_redirection());
	assert_eq!(location(&response), "/");

	token.assert_calls_async(0).await;
}

#[tokio::test]
async fn callback_error_renders_the_error_page() {
	let server = MockServer::start_async().await;
	let (router, _state) = portal(&server);
	let response = send(&router, get("/login", None)).await;
	let cookie = session_cookie(&response);
	let state = query(&location(&response))["state"].clone();
	let callback = format!("/getAToken?error=access_denied&state={state}");
	let response = send(&router, get(&callback, Some(&cookie))).await;

	assert_eq!(response.status(), StatusCode::OK);
	assert!(text(response).await.contains("access_denied"));
}

#[tokio::test]
async fn unknown_flow_renders_the_error_page() {
	let server = MockServer::start_async().await;
	let (router, state) = portal(&server);
	let response = send(&router, get("/login", None)).await;
	let cookie = session_cookie(&response);
	let returned = query(&location(&response))["state"].clone();

	state.cache.clear();

	let callback = format!("/getAToken?code=code-it&state={returned}");
	let response = send(&router, get(&callback, Some(&cookie))).await;

	assert_eq!(response.status(), StatusCode::OK);
	assert!(text(response).await.contains("expired or was already completed"));
}

#[tokio::test]
async fn logout_resets_mode_and_redirects_to_end_session() {
	let server = MockServer::start_async().await;
	let (router, state) = portal(&server);

	state.selector.switch(Mode::App).expect("Switching to app mode should succeed.");

	let response = send(&router, get("/logout", None)).await;
	let target = location(&response);

	assert!(response.status().is_redirection());
	assert!(target.starts_with(&server.url("/tenant-it/oauth2/v2.0/logout")));
	assert_eq!(query(&target)["post_logout_redirect_uri"], "https://portal.example.com/");
	assert_eq!(state.selector.current_mode(), Mode::User);
}

#[tokio::test]
async fn user_mode_without_accounts_redirects_to_login() {
	let server = MockServer::start_async().await;
	let (router, _state) = portal(&server);

	for uri in ["/view/work", "/edit/work"] {
		let response = send(&router, get(uri, None)).await;

		assert!(response.status().is_redirection());
		assert_eq!(location(&response), "/login");
	}
}

#[tokio::test]
async fn app_mode_reads_and_patches_with_the_client_token() {
	let server = MockServer::start_async().await;
	let (router, state) = portal(&server);

	state.selector.switch(Mode::App).expect("Switching to app mode should succeed.");

	let token = mock_client_token(&server).await;
	let read = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/v1.0/users")
				.query_param("$select", WORK_FIELDS)
				.header("authorization", "Bearer app-access");
			then.status(200).json_body(json!({
				"@odata.context": "https://graph.example.com/$metadata#users",
				"value": [{ "id": "u-1", "displayName": "Ada Lovelace", "jobTitle": "Engineer" }],
			}));
		})
		.await;
	let patch = server
		.mock_async(|when, then| {
			when.method(PATCH)
				.path("/v1.0/users/u-1")
				.header("authorization", "Bearer app-access")
				.json_body(json!({ "displayName": "Ada Lovelace", "jobTitle": "Analyst" }));
			then.status(204);
		})
		.await;
	let response = send(&router, get("/view/work", None)).await;

	assert_eq!(response.status(), StatusCode::OK);

	let body = text(response).await;

	assert!(body.contains("Engineer"));
	assert!(!body.contains("@odata.context"));

	let response = send(
		&router,
		post_form("/edit/work", "id=u-1&displayName=Ada+Lovelace&jobTitle=Analyst", None),
	)
	.await;

	assert_eq!(response.status(), StatusCode::OK);
	assert!(text(response).await.contains("Update successful"));

	patch.assert_async().await;
	read.assert_calls_async(2).await;
	token.assert_calls_async(1).await;
}

#[tokio::test]
async fn directory_failures_render_the_error_page() {
	let server = MockServer::start_async().await;
	let (router, state) = portal(&server);

	state.selector.switch(Mode::App).expect("Switching to app mode should succeed.");
	mock_client_token(&server).await;

	let read = server
		.mock_async(|when, then| {
			when.method(GET).path("/v1.0/users");
			then.status(403)
				.json_body(json!({ "error": { "code": "Authorization_RequestDenied" } }));
		})
		.await;
	let patch = server
		.mock_async(|when, then| {
			when.method(PATCH).path("/v1.0/users/u-1");
			then.status(403);
		})
		.await;
	let requests = [
		get("/view/work", None),
		post_form("/edit/work", "id=u-1&jobTitle=Analyst", None),
	];

	for request in requests {
		let response = send(&router, request).await;

		assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

		let body = text(response).await;

		assert!(body.contains("Directory API returned HTTP 403."));
		assert!(body.contains("An unknown error occurred."));
	}

	read.assert_calls_async(1).await;
	patch.assert_calls_async(1).await;
}

#[tokio::test]
async fn edit_guards_roles_and_sections() {
	let server = MockServer::start_async().await;
	let (router, state) = portal(&server);

	state.selector.switch(Mode::App).expect("Switching to app mode should succeed.");
	mock_client_token(&server).await;

	let response = send(&router, get("/edit/personal", None)).await;

	assert_eq!(response.status(), StatusCode::OK);
	assert!(
		text(response).await.contains("You do not have permission to edit this personal details.")
	);

	let response = send(&router, get("/edit/everything", None)).await;

	assert_eq!(response.status(), StatusCode::OK);
	assert!(text(response).await.contains("Invalid details parameter."));
}

#[tokio::test]
async fn app_mode_login_failure_renders_the_provider_description() {
	let server = MockServer::start_async().await;
	let (router, state) = portal(&server);

	state.selector.switch(Mode::App).expect("Switching to app mode should succeed.");
	server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(401).header("content-type", "application/json").body(
				r#"{"error":"invalid_client","error_description":"AADSTS7000215: Invalid client secret provided."}"#,
			);
		})
		.await;

	let response = send(&router, get("/login", None)).await;

	assert_eq!(response.status(), StatusCode::OK);
	assert!(text(response).await.contains("AADSTS7000215: Invalid client secret provided."));
}
