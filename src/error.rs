//! Crate-level error types shared by the token manager, transport, and relay layers.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem; fatal and never retried.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Token endpoint failure; callers may retry the surrounding operation.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Token endpoint rejected the client credentials.
	#[error("Client authentication failed: {reason}.")]
	InvalidClient {
		/// Provider-supplied reason string.
		reason: String,
	},
}
impl Error {
	/// Returns `true` when the error stems from configuration rather than a refresh attempt.
	pub fn is_config(&self) -> bool {
		matches!(self, Self::Config(_))
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Token endpoint is not configured.
	#[error("Token endpoint is not configured.")]
	MissingTokenEndpoint,
	/// Token endpoint cannot be parsed.
	#[error("Token endpoint is not a valid URL.")]
	InvalidTokenEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Token endpoint uses a scheme other than `http` or `https`.
	#[error("Token endpoint scheme `{scheme}` is not supported.")]
	UnsupportedTokenEndpointScheme {
		/// Scheme found in the configured URL.
		scheme: String,
	},
	/// Client identifier is empty.
	#[error("Client identifier is empty.")]
	MissingClientId,
	/// Grant type is empty.
	#[error("Grant type is empty.")]
	MissingGrantType,
	/// Token minting was requested from a disabled manager.
	#[error("Client-credentials token minting is disabled.")]
	Disabled,
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Requested scopes cannot be normalized.
	#[error("Requested scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Token endpoint failures surfaced as refresh failures.
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Token endpoint answered with a non-success status.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Provider- or crate-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token endpoint response parsed but cannot form a usable token.
	#[error("Token endpoint returned an unusable token.")]
	InvalidToken(#[from] crate::auth::CachedTokenBuilderError),
}
impl TransientError {
	/// HTTP status code attached to the failure, if any.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::TokenEndpoint { status, .. } | Self::TokenResponseParse { status, .. } => *status,
			Self::InvalidToken(_) => None,
		}
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the token endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the token endpoint.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
