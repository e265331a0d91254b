// crates.io
use httpmock::prelude::*;
// self
use oauth2_token_relay::{
	_preludet::*,
	auth::{ScopeSet, TokenSecret},
	clock::Clock,
	config::OAuthConfig,
	context::RequestContext,
	error::{ConfigError, TransientError},
};

const CLIENT_ID: &str = "svc-client";
const CLIENT_SECRET: &str = "svc-secret";
// base64("svc-client:svc-secret")
const BASIC_CREDENTIALS: &str = "Basic c3ZjLWNsaWVudDpzdmMtc2VjcmV0";

fn build_config(server: &MockServer) -> OAuthConfig {
	OAuthConfig::builder()
		.token_endpoint(server.url("/token"))
		.credentials(CLIENT_ID, CLIENT_SECRET)
		.build()
		.expect("Token manager config should build against the mock server.")
}

#[tokio::test]
async fn forwarded_bearer_skips_token_endpoint() {
	let server = MockServer::start_async().await;
	let (manager, _clock) = build_reqwest_test_manager(build_config(&server));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).body("{\"access_token\":\"minted\",\"expires_in\":120}");
		})
		.await;
	let ctx = RequestContext::with_bearer("abc.def.ghi")
		.expect("Inbound bearer header should be valid.");
	let token = manager
		.get_token(Some(&ctx))
		.await
		.expect("Forwarded token should be returned verbatim.");

	assert_eq!(token.expose(), "abc.def.ghi");
	assert!(manager.cached().is_none());
	assert_eq!(manager.metrics().forwarded(), 1);

	mock.assert_calls_async(0).await;
}

#[tokio::test]
async fn context_without_bearer_falls_back_to_minted_token() {
	let server = MockServer::start_async().await;
	let (manager, _clock) = build_reqwest_test_manager(build_config(&server));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"minted\",\"expires_in\":120}");
		})
		.await;
	let ctx = RequestContext::with_authorization("Basic dXNlcjpwYXNz")
		.expect("Inbound basic header should be valid.");
	let token =
		manager.get_token(Some(&ctx)).await.expect("Non-bearer contexts should mint a token.");

	assert_eq!(token.expose(), "minted");

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn token_is_cached_until_effective_expiry() {
	let server = MockServer::start_async().await;
	let (manager, clock) = build_reqwest_test_manager(build_config(&server));
	let mut first_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"T1\",\"expires_in\":120}");
		})
		.await;
	let first = manager.get_token(None).await.expect("Initial token request should succeed.");

	assert_eq!(first.expose(), "T1");

	first_mock.assert_calls_async(1).await;

	clock.advance(Duration::seconds(30));

	let second = manager.get_token(None).await.expect("Cached token should be served.");

	assert_eq!(second.expose(), "T1");

	first_mock.assert_calls_async(1).await;
	first_mock.delete_async().await;

	let second_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"T2\",\"expires_in\":120}");
		})
		.await;

	clock.advance(Duration::seconds(31));

	let third = manager.get_token(None).await.expect("Expired token should be refreshed.");

	assert_eq!(third.expose(), "T2");

	second_mock.assert_calls_async(1).await;

	let cached = manager.cached().expect("Refreshed token should be cached.");

	assert_eq!(cached.expires_at, clock.now() + Duration::seconds(60));
}

#[tokio::test]
async fn token_request_sends_basic_credentials_and_form_body() {
	let server = MockServer::start_async().await;
	let config = OAuthConfig::builder()
		.token_endpoint(server.url("/token"))
		.credentials(CLIENT_ID, CLIENT_SECRET)
		.scope(ScopeSet::new(["orders.write", "orders.read"]).expect("Scope fixture should be valid."))
		.build()
		.expect("Scoped config should build.");
	let (manager, _clock) = build_reqwest_test_manager(config);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.header("authorization", BASIC_CREDENTIALS)
				.header("content-type", "application/x-www-form-urlencoded")
				.header("accept", "application/json")
				.body("grant_type=client_credentials&scope=orders.read+orders.write");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"scoped\",\"token_type\":\"Bearer\",\"expires_in\":3600}");
		})
		.await;
	let token = manager.get_token(None).await.expect("Scoped token request should succeed.");

	assert_eq!(token.expose(), "scoped");

	mock.assert_async().await;

	let cached = manager.cached().expect("Scoped token should be cached.");

	assert_eq!(cached.scope.normalized(), "orders.read orders.write");
}

#[tokio::test]
async fn error_status_fails_and_leaves_cache_empty() {
	let server = MockServer::start_async().await;
	let (manager, _clock) = build_reqwest_test_manager(build_config(&server));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(500)
				.header("content-type", "application/json")
				.body("{\"error\":\"server_error\",\"error_description\":\"try later\"}");
		})
		.await;
	let err = manager.get_token(None).await.expect_err("A 500 must fail the token request.");

	match err {
		Error::Transient(TransientError::TokenEndpoint { message, status, .. }) => {
			assert_eq!(message, "server_error: try later");
			assert_eq!(status, Some(500));
		},
		other => panic!("Unexpected error variant: {other:?}."),
	}

	assert!(manager.cached().is_none());
	assert!(!manager.is_refreshing());

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn invalid_client_is_reported() {
	let server = MockServer::start_async().await;
	let (manager, _clock) = build_reqwest_test_manager(build_config(&server));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(401)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_client\"}");
		})
		.await;
	let err = manager.get_token(None).await.expect_err("Bad credentials must fail.");

	assert!(matches!(err, Error::InvalidClient { .. }));

	mock.assert_async().await;
}

#[tokio::test]
async fn malformed_body_fails_and_keeps_previous_token() {
	let server = MockServer::start_async().await;
	let (manager, clock) = build_reqwest_test_manager(build_config(&server));
	let mut good = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"T1\",\"expires_in\":120}");
		})
		.await;

	manager.get_token(None).await.expect("Initial token request should succeed.");
	good.delete_async().await;

	let bad = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body("{\"token\":");
		})
		.await;

	clock.advance(Duration::minutes(2));

	let err = manager.get_token(None).await.expect_err("Malformed JSON must fail the refresh.");

	assert!(matches!(err, Error::Transient(TransientError::TokenResponseParse { .. })));

	bad.assert_calls_async(1).await;

	let cached = manager.cached().expect("Previous token should remain cached.");

	assert_eq!(cached.access_token.expose(), "T1");
	assert_eq!(manager.metrics().successes(), 1);
	assert_eq!(manager.metrics().failures(), 1);
}

#[tokio::test]
async fn timed_out_refresh_keeps_previous_token() {
	let server = MockServer::start_async().await;
	let config = OAuthConfig::builder()
		.token_endpoint(server.url("/token"))
		.credentials(CLIENT_ID, CLIENT_SECRET)
		.request_timeout(Duration::milliseconds(200))
		.build()
		.expect("Config with a request timeout should build.");
	let (manager, clock) = build_reqwest_test_manager(config);
	let mut fast = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"T1\",\"expires_in\":120}");
		})
		.await;

	manager.get_token(None).await.expect("Initial token request should succeed.");
	fast.delete_async().await;

	let slow = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.delay(std::time::Duration::from_secs(2))
				.body("{\"access_token\":\"T2\",\"expires_in\":120}");
		})
		.await;

	clock.advance(Duration::minutes(2));

	let err = manager.get_token(None).await.expect_err("A slow endpoint must hit the timeout.");

	assert!(matches!(err, Error::Transient(TransientError::TokenEndpoint { .. })));
	assert!(!manager.is_refreshing());

	let cached = manager.cached().expect("Previous token should remain cached.");

	assert_eq!(cached.access_token.expose(), "T1");
	assert_eq!(manager.metrics().failures(), 1);

	slow.assert_calls_async(1).await;
}

#[tokio::test]
async fn concurrent_callers_share_one_refresh() {
	let server = MockServer::start_async().await;
	let (manager, _clock) = build_reqwest_test_manager(build_config(&server));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.delay(std::time::Duration::from_millis(100))
				.body("{\"access_token\":\"shared\",\"expires_in\":900}");
		})
		.await;
	let other = manager.clone();
	let (first, second, third): (Result<TokenSecret>, Result<TokenSecret>, Result<TokenSecret>) =
		tokio::join!(manager.get_token(None), other.get_token(None), manager.get_token(None));

	for token in [first, second, third] {
		assert_eq!(token.expect("Concurrent call should succeed.").expose(), "shared");
	}

	mock.assert_calls_async(1).await;

	assert_eq!(manager.metrics().attempts(), 1);
}

#[tokio::test]
async fn invalidate_forces_refresh() {
	let server = MockServer::start_async().await;
	let (manager, _clock) = build_reqwest_test_manager(build_config(&server));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"T1\",\"expires_in\":900}");
		})
		.await;

	manager.get_token(None).await.expect("Initial token request should succeed.");
	manager.invalidate();

	assert!(manager.cached().is_none());

	manager.get_token(None).await.expect("Invalidated cache should refresh.");

	mock.assert_calls_async(2).await;
}

#[test]
fn missing_endpoint_fails_at_construction() {
	let config = OAuthConfig {
		client_id: CLIENT_ID.into(),
		client_secret: CLIENT_SECRET.into(),
		..Default::default()
	};
	let err = ReqwestTestManager::new(config).expect_err("A missing endpoint must fail fast.");

	assert!(matches!(err, Error::Config(ConfigError::MissingTokenEndpoint)));
}
