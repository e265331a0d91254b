//! Token manager: forwarding, caching, and singleflight refresh.
//!
//! [`TokenManager::get_token`] resolves a bearer token for an outbound call in three steps. A
//! bearer token on the supplied [`RequestContext`] is returned verbatim. Otherwise a cached
//! token is served while the clock is before its effective expiry. Otherwise the caller takes
//! the refresh guard, re-checks the cache (another caller may have refreshed meanwhile), and
//! performs a single client-credentials exchange whose result replaces the cache wholesale.
//!
//! A failed or cancelled refresh never touches the cache, and there is no fallback to an expired
//! token: the error is returned to the caller.

mod metrics;

pub use metrics::RefreshMetrics;

// std
use std::sync::atomic::{AtomicBool, Ordering};
// self
use crate::{
	_prelude::*,
	auth::{CachedToken, TokenSecret},
	clock::{Clock, SystemClock},
	config::OAuthConfig,
	context::RequestContext,
	error::ConfigError,
	http::TokenHttpClient,
	oauth::{self, TransportErrorMapper},
	obs::{self, TokenOutcome, TokenSource, TokenSpan},
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

#[cfg(feature = "reqwest")]
/// Token manager specialized for the crate's default reqwest transport stack.
pub type ReqwestTokenManager = TokenManager<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Supplies bearer tokens to outbound calls.
///
/// Clones share the same cache and refresh guard, so a manager can be handed to every request
/// handler of a process.
pub struct TokenManager<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP client wrapper used for token endpoint requests.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before surfacing them to callers.
	pub transport_mapper: Arc<M>,
	config: Arc<OAuthConfig>,
	clock: Arc<dyn Clock>,
	state: Arc<TokenState>,
}
impl<C, M> TokenManager<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a manager that reuses the caller-provided transport + mapper pair.
	///
	/// Fails with a [`ConfigError`] when the configuration is invalid (for example, when the
	/// token endpoint is missing).
	pub fn with_http_client(
		config: OAuthConfig,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Result<Self> {
		config.validate()?;

		Ok(Self {
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			config: Arc::new(config),
			clock: Arc::new(SystemClock),
			state: Default::default(),
		})
	}

	/// Replaces the clock used for issuance and expiry checks.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Returns the configuration the manager was built with.
	pub fn config(&self) -> &OAuthConfig {
		&self.config
	}

	/// Returns `true` if the manager may mint its own tokens.
	pub fn is_enabled(&self) -> bool {
		self.config.enabled
	}

	/// Returns `true` while a refresh request is in flight.
	pub fn is_refreshing(&self) -> bool {
		self.state.refreshing.load(Ordering::Acquire)
	}

	/// Shared counters for this manager and its clones.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.state.metrics
	}

	/// Snapshot of the cached token, valid or not.
	pub fn cached(&self) -> Option<Arc<CachedToken>> {
		self.state.cached.read().clone()
	}

	/// Drops the cached token so the next call refreshes.
	pub fn invalidate(&self) {
		*self.state.cached.write() = None;
	}

	/// Drops the cached token only if it still holds `rejected`.
	///
	/// Returns `true` when the cache was cleared. Callers that saw a downstream 401 use this so
	/// a token installed by a concurrent refresh survives.
	pub fn invalidate_token(&self, rejected: &TokenSecret) -> bool {
		let mut cached = self.state.cached.write();

		if cached.as_ref().is_some_and(|token| token.access_token == *rejected) {
			*cached = None;

			true
		} else {
			false
		}
	}

	/// Resolves the bearer token for an outbound call.
	///
	/// A bearer token on `ctx` is forwarded verbatim. Otherwise the cached token is returned
	/// while valid, and a refresh is performed when it is missing or expired.
	pub async fn get_token(&self, ctx: Option<&RequestContext>) -> Result<TokenSecret> {
		if let Some(token) = ctx.and_then(RequestContext::bearer_token) {
			self.state.metrics.record_forwarded();
			obs::record_token_outcome(TokenSource::Forwarded, TokenOutcome::Success);

			return Ok(token);
		}

		let span = TokenSpan::new("get_token");

		span.instrument(async {
			self.ensure_enabled()?;

			if let Some(current) = self.valid_cached() {
				self.state.metrics.record_cache_hit();
				span.record_source(TokenSource::Cache);
				obs::record_token_outcome(TokenSource::Cache, TokenOutcome::Success);

				return Ok(current.access_token.clone());
			}

			let token = self.refresh_if_stale().await?;

			span.record_source(TokenSource::Refresh);

			Ok(token.access_token.clone())
		})
		.await
	}

	/// Forces a refresh through the singleflight guard and returns the installed token.
	pub async fn refresh(&self) -> Result<Arc<CachedToken>> {
		let span = TokenSpan::new("refresh");

		span.instrument(async {
			self.ensure_enabled()?;

			let _singleflight = self.state.refresh_guard.lock().await;

			self.refresh_locked().await
		})
		.await
	}

	fn ensure_enabled(&self) -> Result<()> {
		if self.config.enabled { Ok(()) } else { Err(ConfigError::Disabled.into()) }
	}

	fn valid_cached(&self) -> Option<Arc<CachedToken>> {
		let now = self.clock.now();

		self.state.cached.read().as_ref().filter(|token| token.is_valid_at(now)).cloned()
	}

	async fn refresh_if_stale(&self) -> Result<Arc<CachedToken>> {
		let _singleflight = self.state.refresh_guard.lock().await;

		if let Some(current) = self.valid_cached() {
			self.state.metrics.record_cache_hit();
			obs::record_token_outcome(TokenSource::Cache, TokenOutcome::Success);

			return Ok(current);
		}

		self.refresh_locked().await
	}

	/// Callers must hold the refresh guard.
	async fn refresh_locked(&self) -> Result<Arc<CachedToken>> {
		let _refreshing = RefreshingFlag::raise(&self.state.refreshing);

		self.state.metrics.record_attempt();
		obs::record_token_outcome(TokenSource::Refresh, TokenOutcome::Attempt);

		let result = oauth::exchange_client_credentials(
			&self.config,
			self.http_client.as_ref(),
			self.transport_mapper.as_ref(),
			self.clock.as_ref(),
		)
		.await;

		match result {
			Ok(token) => {
				let token = Arc::new(token);

				*self.state.cached.write() = Some(token.clone());

				self.state.metrics.record_success();
				obs::record_token_outcome(TokenSource::Refresh, TokenOutcome::Success);

				Ok(token)
			},
			Err(err) => {
				self.state.metrics.record_failure();
				obs::record_token_outcome(TokenSource::Refresh, TokenOutcome::Failure);

				Err(err)
			},
		}
	}
}
#[cfg(feature = "reqwest")]
impl TokenManager<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a manager with its own reqwest transport.
	///
	/// The transport never follows redirects and applies
	/// [`OAuthConfig::request_timeout`] to every token request.
	pub fn new(config: OAuthConfig) -> Result<Self> {
		Self::with_reqwest_http_client(config, ReqwestHttpClient::new()?)
	}

	/// Creates a manager around a caller-built reqwest transport.
	///
	/// Unlike [`with_http_client`](Self::with_http_client), this applies
	/// [`OAuthConfig::request_timeout`] to `http_client` when one is configured.
	pub fn with_reqwest_http_client(
		config: OAuthConfig,
		http_client: ReqwestHttpClient,
	) -> Result<Self> {
		let http_client = match config.request_timeout {
			Some(timeout) => http_client.with_timeout(timeout),
			None => http_client,
		};

		Self::with_http_client(config, http_client, ReqwestTransportErrorMapper)
	}
}
impl<C, M> Clone for TokenManager<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			http_client: self.http_client.clone(),
			transport_mapper: self.transport_mapper.clone(),
			config: self.config.clone(),
			clock: self.clock.clone(),
			state: self.state.clone(),
		}
	}
}
impl<C, M> Debug for TokenManager<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenManager")
			.field("config", &self.config)
			.field("cached", &self.cached())
			.field("refreshing", &self.is_refreshing())
			.finish()
	}
}

#[derive(Debug, Default)]
struct TokenState {
	cached: RwLock<Option<Arc<CachedToken>>>,
	refresh_guard: AsyncMutex<()>,
	refreshing: AtomicBool,
	metrics: RefreshMetrics,
}

/// Lowers the refreshing flag on drop, including when the refresh future is cancelled.
struct RefreshingFlag<'a>(&'a AtomicBool);
impl<'a> RefreshingFlag<'a> {
	fn raise(flag: &'a AtomicBool) -> Self {
		flag.store(true, Ordering::Release);

		Self(flag)
	}
}
impl Drop for RefreshingFlag<'_> {
	fn drop(&mut self) {
		self.0.store(false, Ordering::Release);
	}
}
