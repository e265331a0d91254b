//! Immutable cached token and its builder.

// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, token::secret::TokenSecret},
};

/// Cache lifecycle status of a token at a given instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
	/// Token may be served from the cache.
	Valid,
	/// Token reached its effective expiry and must be refreshed.
	Expired,
}

/// Errors produced by [`CachedTokenBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum CachedTokenBuilderError {
	/// No access token value was provided, or it was empty.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// No lifetime was configured.
	#[error("Token lifetime (expires_in) is required.")]
	MissingLifetime,
	/// Lifetime was zero or negative.
	#[error("Token lifetime must be positive.")]
	NonPositiveLifetime,
	/// Lifetime pushes the expiry beyond the representable range.
	#[error("Token lifetime exceeds the supported range.")]
	LifetimeOutOfRange,
}

/// Client-credentials token held by the cache.
///
/// Records are replaced wholesale on every refresh and never mutated in place, so readers can
/// share them behind an [`Arc`].
#[derive(Clone, Serialize, Deserialize)]
pub struct CachedToken {
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Scopes granted (or requested, when the endpoint does not echo them).
	pub scope: ScopeSet,
	/// Instant the token was received.
	pub issued_at: OffsetDateTime,
	/// Lifetime reported by the token endpoint (`expires_in`).
	pub lifetime: Duration,
	/// Effective expiry: `issued_at + lifetime - margin`, never earlier than `issued_at`.
	pub expires_at: OffsetDateTime,
}
impl CachedToken {
	/// Safety margin subtracted from the server-reported lifetime.
	pub const DEFAULT_EXPIRY_MARGIN: Duration = Duration::seconds(60);

	/// Returns a builder for cached tokens.
	pub fn builder() -> CachedTokenBuilder {
		CachedTokenBuilder::default()
	}

	/// Computes the lifecycle status at a given instant.
	pub fn status_at(&self, instant: OffsetDateTime) -> TokenStatus {
		if instant >= self.expires_at { TokenStatus::Expired } else { TokenStatus::Valid }
	}

	/// Returns `true` if the token may still be served at `instant`.
	pub fn is_valid_at(&self, instant: OffsetDateTime) -> bool {
		matches!(self.status_at(instant), TokenStatus::Valid)
	}

	/// Time left before the effective expiry, clamped at zero.
	pub fn remaining_at(&self, instant: OffsetDateTime) -> Duration {
		let remaining = self.expires_at - instant;

		if remaining.is_negative() { Duration::ZERO } else { remaining }
	}
}
impl Debug for CachedToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CachedToken")
			.field("access_token", &"<redacted>")
			.field("scope", &self.scope)
			.field("issued_at", &self.issued_at)
			.field("lifetime", &self.lifetime)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Builder for [`CachedToken`].
#[derive(Clone, Debug)]
pub struct CachedTokenBuilder {
	access_token: Option<TokenSecret>,
	scope: ScopeSet,
	issued_at: Option<OffsetDateTime>,
	lifetime: Option<Duration>,
	margin: Duration,
}
impl CachedTokenBuilder {
	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets the scope associated with the token.
	pub fn scope(mut self, scope: ScopeSet) -> Self {
		self.scope = scope;

		self
	}

	/// Sets the issued-at instant (defaults to the current UTC instant).
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets the server-reported lifetime.
	pub fn expires_in(mut self, lifetime: Duration) -> Self {
		self.lifetime = Some(lifetime);

		self
	}

	/// Overrides the expiry margin (defaults to 60 seconds). Negative values clamp to zero.
	pub fn expiry_margin(mut self, margin: Duration) -> Self {
		self.margin = if margin.is_negative() { Duration::ZERO } else { margin };

		self
	}

	/// Consumes the builder and produces a [`CachedToken`].
	pub fn build(self) -> Result<CachedToken, CachedTokenBuilderError> {
		let access_token = self
			.access_token
			.filter(|token| !token.is_empty())
			.ok_or(CachedTokenBuilderError::MissingAccessToken)?;
		let lifetime = self.lifetime.ok_or(CachedTokenBuilderError::MissingLifetime)?;

		if !lifetime.is_positive() {
			return Err(CachedTokenBuilderError::NonPositiveLifetime);
		}

		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		// Lifetimes shorter than the margin expire immediately instead of before issuance.
		let effective = lifetime.checked_sub(self.margin).filter(|d| d.is_positive());
		let expires_at = match effective {
			Some(delta) => issued_at
				.checked_add(delta)
				.ok_or(CachedTokenBuilderError::LifetimeOutOfRange)?,
			None => issued_at,
		};

		Ok(CachedToken { access_token, scope: self.scope, issued_at, lifetime, expires_at })
	}
}
impl Default for CachedTokenBuilder {
	fn default() -> Self {
		Self {
			access_token: None,
			scope: ScopeSet::default(),
			issued_at: None,
			lifetime: None,
			margin: CachedToken::DEFAULT_EXPIRY_MARGIN,
		}
	}
}
