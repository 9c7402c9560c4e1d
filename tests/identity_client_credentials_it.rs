// crates.io
use httpmock::prelude::*;
// self
use directory_portal::{
	_preludet::*,
	auth::ScopeSet,
	error::TransientError,
	identity::CachedTokenRequest,
	store::TokenCache,
};

const TOKEN_PATH: &str = "/tenant-it/oauth2/v2.0/token";

fn scope() -> ScopeSet {
	ScopeSet::new(["https://graph.example.com/.default"])
		.expect("Scope fixture should be valid for client credentials tests.")
}

#[tokio::test]
async fn client_token_is_cached_per_scope() {
	let server = MockServer::start_async().await;
	let (client, cache) = build_test_identity_client(test_descriptor(&server.url("/tenant-it")));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(TOKEN_PATH)
				.body_includes("grant_type=client_credentials")
				.body_includes("client_id=client-it")
				.body_includes("client_secret=secret-it");
			then.status(200).header("content-type", "application/json").body(
				r#"{"access_token":"app-token","token_type":"Bearer","expires_in":3600}"#,
			);
		})
		.await;
	let first =
		client.acquire_token_for_client(&scope()).await.expect("First request should succeed.");
	let second =
		client.acquire_token_for_client(&scope()).await.expect("Cached request should succeed.");

	assert_eq!(first.access_token.expose(), "app-token");
	assert_eq!(second.access_token.expose(), "app-token");
	assert!(first.account.is_none());

	mock.assert_calls_async(1).await;

	let stored = cache
		.fetch(None, &scope())
		.await
		.expect("Token cache fetch should succeed.")
		.expect("Application record should be cached.");

	assert_eq!(stored.access_token.expose(), "app-token");
}

#[tokio::test]
async fn concurrent_callers_share_one_request() {
	let server = MockServer::start_async().await;
	let (client, _cache) = build_test_identity_client(test_descriptor(&server.url("/tenant-it")));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.delay(std::time::Duration::from_millis(100))
				.body(r#"{"access_token":"shared","token_type":"Bearer","expires_in":3600}"#);
		})
		.await;
	let scope = scope();
	let (a, b) =
		tokio::join!(client.acquire_token_for_client(&scope), client.acquire_token_for_client(&scope));

	assert_eq!(a.expect("First caller should succeed.").access_token.expose(), "shared");
	assert_eq!(b.expect("Second caller should succeed.").access_token.expose(), "shared");

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn forced_refresh_bypasses_the_cache() {
	let server = MockServer::start_async().await;
	let (client, _cache) = build_test_identity_client(test_descriptor(&server.url("/tenant-it")));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access_token":"fresh","token_type":"Bearer","expires_in":3600}"#);
		})
		.await;

	client.acquire_token_for_client(&scope()).await.expect("Initial request should succeed.");
	client
		.client_credentials(CachedTokenRequest::new(None, scope()).force_refresh())
		.await
		.expect("Forced request should succeed.");

	mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn rejected_client_secret_surfaces_provider_description() {
	let server = MockServer::start_async().await;
	let (client, cache) = build_test_identity_client(test_descriptor(&server.url("/tenant-it")));

	server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(401).header("content-type", "application/json").body(
				r#"{"error":"invalid_client","error_description":"AADSTS7000215: Invalid client secret provided."}"#,
			);
		})
		.await;

	let err = client
		.acquire_token_for_client(&scope())
		.await
		.expect_err("A rejected client secret must fail the request.");

	assert!(matches!(err, Error::InvalidClient { .. }));
	assert_eq!(err.description(), "AADSTS7000215: Invalid client secret provided.");
	assert!(
		cache.fetch(None, &scope()).await.expect("Token cache fetch should succeed.").is_none()
	);
}

#[tokio::test]
async fn server_errors_are_transient() {
	let server = MockServer::start_async().await;
	let (client, _cache) = build_test_identity_client(test_descriptor(&server.url("/tenant-it")));

	server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(503)
				.header("content-type", "application/json")
				.header("retry-after", "7")
				.body(r#"{"error":"temporarily_unavailable"}"#);
		})
		.await;

	let err = client
		.acquire_token_for_client(&scope())
		.await
		.expect_err("A 503 must fail the request.");

	match err {
		Error::Transient(TransientError::TokenEndpoint { status, retry_after, .. }) => {
			assert_eq!(status, Some(503));
			assert_eq!(retry_after, Some(Duration::seconds(7)));
		},
		other => panic!("Unexpected error: {other:?}."),
	}
}
