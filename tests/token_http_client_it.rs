// std
use std::collections::VecDeque;
// self
use oauth2_token_relay::{
	_preludet::*,
	config::OAuthConfig,
	error::{TransientError, TransportError},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	manager::TokenManager,
	oauth::{
		TransportErrorMapper,
		oauth2::{
			AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
			http::{StatusCode, header::AUTHORIZATION},
		},
	},
};

#[derive(Debug, ThisError)]
#[error("Recording transport ran out of replies.")]
struct ExhaustedError;

/// Canned token endpoint reply plus the metadata the transport reports for it.
struct CannedReply {
	status: u16,
	retry_after: Option<Duration>,
	body: &'static str,
}

/// What the token manager put on the wire.
#[derive(Clone, Debug)]
struct SentRequest {
	uri: String,
	authorization: Option<String>,
	body: String,
	slot_was_empty: bool,
}

/// Custom transport that records every token request and answers from a script.
#[derive(Clone, Default)]
struct RecordingTransport {
	replies: Arc<Mutex<VecDeque<CannedReply>>>,
	sent: Arc<Mutex<Vec<SentRequest>>>,
}
impl RecordingTransport {
	fn answer(self, status: u16, retry_after: Option<Duration>, body: &'static str) -> Self {
		self.replies.lock().push_back(CannedReply { status, retry_after, body });

		self
	}

	fn sent(&self) -> Vec<SentRequest> {
		self.sent.lock().clone()
	}
}
impl TokenHttpClient for RecordingTransport {
	type Handle = RecordingHandle;
	type TransportError = ExhaustedError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		RecordingHandle { transport: self.clone(), slot }
	}
}

struct RecordingHandle {
	transport: RecordingTransport,
	slot: ResponseMetadataSlot,
}
impl<'c> AsyncHttpClient<'c> for RecordingHandle {
	type Error = HttpClientError<ExhaustedError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let slot_was_empty = self.slot.take().is_none();

		self.transport.sent.lock().push(SentRequest {
			uri: request.uri().to_string(),
			authorization: request
				.headers()
				.get(AUTHORIZATION)
				.and_then(|value| value.to_str().ok())
				.map(str::to_owned),
			body: String::from_utf8_lossy(request.body()).into_owned(),
			slot_was_empty,
		});

		let reply = self.transport.replies.lock().pop_front();
		let slot = self.slot.clone();

		Box::pin(async move {
			let Some(reply) = reply else {
				return Err(HttpClientError::Reqwest(Box::new(ExhaustedError)));
			};

			slot.store(ResponseMetadata {
				status: Some(reply.status),
				retry_after: reply.retry_after,
			});

			let mut response = HttpResponse::new(reply.body.as_bytes().to_vec());

			*response.status_mut() =
				StatusCode::from_u16(reply.status).expect("Canned status should be valid.");

			Ok(response)
		})
	}
}

struct NetworkMapper;
impl TransportErrorMapper<ExhaustedError> for NetworkMapper {
	fn map_transport_error(
		&self,
		_meta: Option<&ResponseMetadata>,
		err: HttpClientError<ExhaustedError>,
	) -> Error {
		TransportError::network(err).into()
	}
}

fn build_manager(transport: &RecordingTransport) -> TokenManager<RecordingTransport, NetworkMapper> {
	let config = OAuthConfig::builder()
		.token_endpoint("https://idp.internal/oauth/token")
		.credentials("custom-transport", "custom-secret")
		.scope_str("inventory.read")
		.build()
		.expect("Custom transport config should build.");

	TokenManager::with_http_client(config, transport.clone(), NetworkMapper)
		.expect("Custom transport manager should build.")
}

#[tokio::test]
async fn custom_transport_installs_token() {
	let transport = RecordingTransport::default().answer(
		200,
		None,
		"{\"access_token\":\"custom-token\",\"token_type\":\"bearer\",\"expires_in\":900}",
	);
	let manager = build_manager(&transport);
	let token = manager.get_token(None).await.expect("Custom transport exchange should succeed.");

	assert_eq!(token.expose(), "custom-token");

	let cached = manager.cached().expect("Token should be cached after a successful exchange.");

	assert_eq!(cached.access_token.expose(), "custom-token");
	assert_eq!(cached.scope.normalized(), "inventory.read");
	assert_eq!(manager.metrics().attempts(), 1);
	assert_eq!(manager.metrics().successes(), 1);

	let sent = transport.sent();

	assert_eq!(sent.len(), 1);
	assert_eq!(sent[0].uri, "https://idp.internal/oauth/token");
	assert_eq!(sent[0].body, "grant_type=client_credentials&scope=inventory.read");
	assert!(sent[0].authorization.as_deref().is_some_and(|value| value.starts_with("Basic ")));
}

#[tokio::test]
async fn error_status_reports_retry_after_and_next_refresh_starts_clean() {
	let transport = RecordingTransport::default()
		.answer(429, Some(Duration::seconds(7)), "{\"error\":\"slow_down\"}")
		.answer(200, None, "{\"access_token\":\"after-backoff\",\"expires_in\":900}");
	let manager = build_manager(&transport);
	let err = manager.get_token(None).await.expect_err("A 429 must fail the refresh.");

	match err {
		Error::Transient(TransientError::TokenEndpoint { message, status, retry_after }) => {
			assert_eq!(message, "slow_down");
			assert_eq!(status, Some(429));
			assert_eq!(retry_after, Some(Duration::seconds(7)));
		},
		other => panic!("Unexpected error variant: {other:?}."),
	}

	assert!(manager.cached().is_none());

	let token = manager.get_token(None).await.expect("The follow-up refresh should succeed.");

	assert_eq!(token.expose(), "after-backoff");
	assert_eq!(manager.metrics().failures(), 1);
	assert_eq!(manager.metrics().successes(), 1);
	assert!(
		transport.sent().iter().all(|request| request.slot_was_empty),
		"Every refresh must start with an empty metadata slot."
	);
}

#[tokio::test]
async fn exhausted_transport_goes_through_the_mapper() {
	let transport = RecordingTransport::default();
	let manager = build_manager(&transport);
	let err = manager.get_token(None).await.expect_err("No reply must surface a transport error.");

	assert!(matches!(err, Error::Transport(TransportError::Network { .. })));
	assert_eq!(transport.sent().len(), 1);
}
