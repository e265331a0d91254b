//! Client-credentials exchange against the configured token endpoint.
//!
//! The request is a form-encoded POST (`grant_type`, optional `scope`) authenticated with HTTP
//! Basic credentials. Only `access_token` and `expires_in` are required in the JSON reply;
//! `token_type` and `scope` are read when present. Non-success statuses, malformed bodies, and
//! transport failures all surface as errors so the cache is never written with a partial token.

pub use oauth2;

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
use oauth2::{
	AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
	http::{
		Method, Request,
		header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
	},
};
use serde::Deserializer;
use url::form_urlencoded;
// self
use crate::{
	_prelude::*,
	auth::{CachedToken, ScopeSet},
	clock::Clock,
	config::OAuthConfig,
	error::{ConfigError, TransientError, TransportError},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_CONTENT_TYPE: &str = "application/json";
const INVALID_CLIENT: &str = "invalid_client";

/// Maps HTTP transport failures into crate [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a crate error.
	fn map_transport_error(
		&self,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(meta, *inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) => map_generic_transport_error(meta, message),
			_ => map_unknown_transport_error(meta),
		}
	}
}

/// Successful token endpoint payload.
#[derive(Deserialize)]
struct TokenEndpointResponse {
	access_token: String,
	#[serde(deserialize_with = "deserialize_expires_in")]
	expires_in: i64,
	#[serde(default)]
	token_type: Option<String>,
	#[serde(default)]
	scope: Option<String>,
}

/// RFC 6749 §5.2 error payload; every field is optional because endpoints vary.
#[derive(Debug, Default, Deserialize)]
struct TokenEndpointErrorResponse {
	#[serde(default)]
	error: Option<String>,
	#[serde(default)]
	error_description: Option<String>,
}

/// Performs one client-credentials exchange and returns the token to install.
pub(crate) async fn exchange_client_credentials<C, M>(
	config: &OAuthConfig,
	http_client: &C,
	mapper: &M,
	clock: &dyn Clock,
) -> Result<CachedToken>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let request = build_token_request(config)?;
	let meta = ResponseMetadataSlot::default();
	let handle = http_client.with_metadata(meta.clone());
	let response = handle
		.call(request)
		.await
		.map_err(|err| mapper.map_transport_error(meta.take().as_ref(), err))?;
	let issued_at = clock.now();
	let retry_after = meta.take().and_then(|value| value.retry_after);

	parse_token_response(config, response, issued_at, retry_after)
}

/// Builds the form-encoded, Basic-authenticated token request.
pub(crate) fn build_token_request(config: &OAuthConfig) -> Result<HttpRequest> {
	let endpoint = config.token_endpoint()?;
	let mut form = form_urlencoded::Serializer::new(String::new());

	form.append_pair("grant_type", &config.grant_type);

	if let Some(scope) = config.scope.as_ref().filter(|scope| !scope.is_empty()) {
		form.append_pair("scope", &scope.normalized());
	}

	let request = Request::builder()
		.method(Method::POST)
		.uri(endpoint.as_str())
		.header(CONTENT_TYPE, FORM_CONTENT_TYPE)
		.header(ACCEPT, JSON_CONTENT_TYPE)
		.header(AUTHORIZATION, basic_authorization(&config.client_id, &config.client_secret))
		.body(form.finish().into_bytes())
		.map_err(ConfigError::from)?;

	Ok(request)
}

/// `Basic` credentials with each component form-urlencoded first (RFC 6749 §2.3.1).
pub(crate) fn basic_authorization(client_id: &str, client_secret: &str) -> String {
	let id: String = form_urlencoded::byte_serialize(client_id.as_bytes()).collect();
	let secret: String = form_urlencoded::byte_serialize(client_secret.as_bytes()).collect();

	format!("Basic {}", STANDARD.encode(format!("{id}:{secret}")))
}

fn parse_token_response(
	config: &OAuthConfig,
	response: HttpResponse,
	issued_at: OffsetDateTime,
	retry_after: Option<Duration>,
) -> Result<CachedToken> {
	let status = response.status();

	if !status.is_success() {
		return Err(map_error_response(status.as_u16(), response.body(), retry_after));
	}

	let mut deserializer = serde_json::Deserializer::from_slice(response.body());
	let payload: TokenEndpointResponse = serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| TransientError::TokenResponseParse {
			source,
			status: Some(status.as_u16()),
		})?;

	if let Some(token_type) =
		payload.token_type.as_deref().filter(|kind| !kind.eq_ignore_ascii_case("bearer"))
	{
		return Err(TransientError::TokenEndpoint {
			message: format!("Token endpoint issued an unsupported token type `{token_type}`"),
			status: Some(status.as_u16()),
			retry_after: None,
		}
		.into());
	}

	let scope = payload
		.scope
		.as_deref()
		.and_then(|granted| ScopeSet::from_str(granted).ok())
		.or_else(|| config.scope.clone())
		.unwrap_or_default();
	let token = CachedToken::builder()
		.access_token(payload.access_token)
		.scope(scope)
		.issued_at(issued_at)
		.expires_in(Duration::seconds(payload.expires_in))
		.expiry_margin(config.expiry_margin)
		.build()
		.map_err(TransientError::from)?;

	Ok(token)
}

fn map_error_response(status: u16, body: &[u8], retry_after: Option<Duration>) -> Error {
	let parsed: TokenEndpointErrorResponse = serde_json::from_slice(body).unwrap_or_default();
	let message = match (parsed.error.as_deref(), parsed.error_description.as_deref()) {
		(Some(code), Some(description)) => format!("{code}: {description}"),
		(Some(code), None) => code.to_owned(),
		(None, Some(description)) => description.to_owned(),
		(None, None) => format!("HTTP {status}"),
	};

	if status == 401 || parsed.error.as_deref() == Some(INVALID_CLIENT) {
		return Error::InvalidClient { reason: message };
	}

	TransientError::TokenEndpoint { message, status: Some(status), retry_after }.into()
}

fn deserialize_expires_in<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
	D: Deserializer<'de>,
{
	// Some endpoints send the lifetime as a numeric string.
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Raw {
		Number(i64),
		Text(String),
	}

	match Raw::deserialize(deserializer)? {
		Raw::Number(value) => Ok(value),
		Raw::Text(value) => value.trim().parse().map_err(serde::de::Error::custom),
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(meta: Option<&ResponseMetadata>, err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransientError::TokenEndpoint {
			message: "Request timed out while calling the token endpoint".into(),
			status: meta_status(meta).or_else(|| err.status().map(|code| code.as_u16())),
			retry_after: meta_retry_after(meta),
		}
		.into();
	}

	TransportError::from(err).into()
}

fn map_generic_transport_error(meta: Option<&ResponseMetadata>, message: impl Display) -> Error {
	TransientError::TokenEndpoint {
		message: format!("HTTP client error occurred while calling the token endpoint: {message}"),
		status: meta_status(meta),
		retry_after: meta_retry_after(meta),
	}
	.into()
}

fn map_unknown_transport_error(meta: Option<&ResponseMetadata>) -> Error {
	TransientError::TokenEndpoint {
		message: "HTTP client error occurred while calling the token endpoint".into(),
		status: meta_status(meta),
		retry_after: meta_retry_after(meta),
	}
	.into()
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn meta_retry_after(meta: Option<&ResponseMetadata>) -> Option<Duration> {
	meta.and_then(|value| value.retry_after)
}
