//! Client-credentials configuration supplied once at startup.
//!
//! [`OAuthConfig`] deserializes from any serde source (defaults fill omitted fields) and can
//! also be assembled with [`OAuthConfigBuilder`]. Either way, [`OAuthConfig::validate`] runs
//! before a token manager accepts it, so a missing token endpoint fails at construction rather
//! than on the first outbound call.

// self
use crate::{_prelude::*, auth::ScopeSet, error::ConfigError};

/// Grant type sent when none is configured.
pub const DEFAULT_GRANT_TYPE: &str = "client_credentials";

/// Immutable OAuth client configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
	/// Whether the manager may mint its own tokens. Forwarding works either way.
	pub enabled: bool,
	/// Token endpoint URL.
	#[serde(alias = "token_url")]
	pub token_endpoint: Option<Url>,
	/// OAuth 2.0 client identifier.
	pub client_id: String,
	/// Client secret sent via HTTP Basic authentication.
	pub client_secret: String,
	/// Value of the `grant_type` form field.
	pub grant_type: String,
	/// Optional scopes sent in the `scope` form field.
	pub scope: Option<ScopeSet>,
	/// Margin subtracted from `expires_in` when computing the cache expiry.
	#[serde(with = "duration_secs")]
	pub expiry_margin: Duration,
	/// Timeout applied to the token request by the reqwest transport.
	///
	/// Honored by `TokenManager::new` and `TokenManager::with_reqwest_http_client`. A transport
	/// handed to `TokenManager::with_http_client` keeps its own timeout settings.
	#[serde(with = "duration_secs::option")]
	pub request_timeout: Option<Duration>,
}
impl OAuthConfig {
	/// Returns a builder seeded with defaults.
	pub fn builder() -> OAuthConfigBuilder {
		OAuthConfigBuilder::default()
	}

	/// Checks the invariants the token manager relies on.
	pub fn validate(&self) -> Result<(), ConfigError> {
		let endpoint = self.token_endpoint.as_ref().ok_or(ConfigError::MissingTokenEndpoint)?;

		if !matches!(endpoint.scheme(), "http" | "https") {
			return Err(ConfigError::UnsupportedTokenEndpointScheme {
				scheme: endpoint.scheme().to_owned(),
			});
		}
		if self.client_id.trim().is_empty() {
			return Err(ConfigError::MissingClientId);
		}
		if self.grant_type.trim().is_empty() {
			return Err(ConfigError::MissingGrantType);
		}

		Ok(())
	}

	/// Returns the validated token endpoint.
	pub fn token_endpoint(&self) -> Result<&Url, ConfigError> {
		self.token_endpoint.as_ref().ok_or(ConfigError::MissingTokenEndpoint)
	}
}
impl Default for OAuthConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			token_endpoint: None,
			client_id: String::new(),
			client_secret: String::new(),
			grant_type: DEFAULT_GRANT_TYPE.into(),
			scope: None,
			expiry_margin: Duration::seconds(60),
			request_timeout: None,
		}
	}
}
impl Debug for OAuthConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuthConfig")
			.field("enabled", &self.enabled)
			.field("token_endpoint", &self.token_endpoint.as_ref().map(Url::as_str))
			.field("client_id", &self.client_id)
			.field("client_secret_set", &!self.client_secret.is_empty())
			.field("grant_type", &self.grant_type)
			.field("scope", &self.scope)
			.field("expiry_margin", &self.expiry_margin)
			.field("request_timeout", &self.request_timeout)
			.finish()
	}
}

/// Builder for [`OAuthConfig`] values.
#[derive(Debug, Default)]
pub struct OAuthConfigBuilder {
	config: OAuthConfig,
	raw_endpoint: Option<String>,
	raw_scope: Option<String>,
}
impl OAuthConfigBuilder {
	/// Sets the token endpoint; parsing happens in [`build`](Self::build).
	pub fn token_endpoint(mut self, url: impl Into<String>) -> Self {
		self.raw_endpoint = Some(url.into());

		self
	}

	/// Sets the client identifier and secret.
	pub fn credentials(mut self, client_id: impl Into<String>, secret: impl Into<String>) -> Self {
		self.config.client_id = client_id.into();
		self.config.client_secret = secret.into();

		self
	}

	/// Overrides the grant type (defaults to `client_credentials`).
	pub fn grant_type(mut self, grant_type: impl Into<String>) -> Self {
		self.config.grant_type = grant_type.into();

		self
	}

	/// Sets the requested scopes.
	pub fn scope(mut self, scope: ScopeSet) -> Self {
		self.config.scope = Some(scope).filter(|scope| !scope.is_empty());

		self
	}

	/// Sets the requested scopes from their space-delimited form; validation happens in
	/// [`build`](Self::build).
	pub fn scope_str(mut self, scope: impl Into<String>) -> Self {
		self.raw_scope = Some(scope.into());

		self
	}

	/// Enables or disables token minting.
	pub fn enabled(mut self, enabled: bool) -> Self {
		self.config.enabled = enabled;

		self
	}

	/// Overrides the expiry margin (defaults to 60 seconds).
	pub fn expiry_margin(mut self, margin: Duration) -> Self {
		self.config.expiry_margin = margin;

		self
	}

	/// Applies a timeout to token requests.
	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.config.request_timeout = Some(timeout);

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(mut self) -> Result<OAuthConfig, ConfigError> {
		if let Some(raw) = self.raw_endpoint.take() {
			let url = Url::parse(&raw)
				.map_err(|source| ConfigError::InvalidTokenEndpoint { source })?;

			self.config.token_endpoint = Some(url);
		}
		if let Some(raw) = self.raw_scope.take() {
			let scope = ScopeSet::from_str(&raw)?;

			self.config.scope = Some(scope).filter(|scope| !scope.is_empty());
		}

		self.config.validate()?;

		Ok(self.config)
	}
}

mod duration_secs {
	// crates.io
	use serde::{Deserializer, Serializer};
	// self
	use crate::_prelude::*;

	pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_i64(value.whole_seconds())
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		Ok(Duration::seconds(i64::deserialize(deserializer)?))
	}

	pub mod option {
		// crates.io
		use serde::{Deserializer, Serializer};
		// self
		use crate::_prelude::*;

		pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
		where
			S: Serializer,
		{
			match value {
				Some(duration) => serializer.serialize_some(&duration.whole_seconds()),
				None => serializer.serialize_none(),
			}
		}

		pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
		where
			D: Deserializer<'de>,
		{
			Ok(<Option<i64>>::deserialize(deserializer)?.map(Duration::seconds))
		}
	}
}
