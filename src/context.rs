//! Explicit inbound request context.
//!
//! The surrounding request-handling layer builds a [`RequestContext`] from the inbound request
//! and passes it to every call that may forward the caller's credential. Nothing here is ambient:
//! a call without a context always falls back to the manager's own token.

// crates.io
use oauth2::http::{
	HeaderMap, HeaderName, HeaderValue,
	header::{AUTHORIZATION, InvalidHeaderValue},
};
// self
use crate::{_prelude::*, auth::TokenSecret};

const BEARER_SCHEME: &str = "bearer";

/// Headers of the inbound request currently being served.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
	headers: HeaderMap,
}
impl RequestContext {
	/// Wraps the inbound request headers.
	pub fn from_headers(headers: HeaderMap) -> Self {
		Self { headers }
	}

	/// Builds a context carrying only an `Authorization` header.
	pub fn with_authorization(value: impl AsRef<str>) -> Result<Self, InvalidHeaderValue> {
		let mut headers = HeaderMap::new();

		headers.insert(AUTHORIZATION, HeaderValue::from_str(value.as_ref())?);

		Ok(Self { headers })
	}

	/// Builds a context whose `Authorization` header carries `token` as a bearer credential.
	pub fn with_bearer(token: impl AsRef<str>) -> Result<Self, InvalidHeaderValue> {
		Self::with_authorization(format!("Bearer {}", token.as_ref()))
	}

	/// Returns the underlying headers.
	pub fn headers(&self) -> &HeaderMap {
		&self.headers
	}

	/// Looks up a single header value as UTF-8 text.
	pub fn header(&self, name: &HeaderName) -> Option<&str> {
		self.headers.get(name).and_then(|value| value.to_str().ok())
	}

	/// Extracts the bearer token from the `Authorization` header.
	///
	/// The scheme match is case-insensitive; the credential is returned as sent, minus surrounding
	/// whitespace. Other schemes and empty credentials yield `None`.
	pub fn bearer_token(&self) -> Option<TokenSecret> {
		let raw = self.header(&AUTHORIZATION)?.trim();
		let (scheme, credential) = raw.split_once(char::is_whitespace)?;

		if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
			return None;
		}

		let credential = credential.trim();

		if credential.is_empty() { None } else { Some(TokenSecret::new(credential)) }
	}
}
impl From<HeaderMap> for RequestContext {
	fn from(headers: HeaderMap) -> Self {
		Self::from_headers(headers)
	}
}
