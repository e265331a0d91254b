//! Outbound REST calls that carry the resolved bearer token.
//!
//! [`RelayClient`] pairs a `reqwest::Client` with a [`TokenManager`]: every builder it hands out
//! already carries `Authorization: Bearer <token>`, where the token is the caller's (when the
//! [`RequestContext`] has one) or the manager's own.

// crates.io
use reqwest::{IntoUrl, Method, RequestBuilder};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	context::RequestContext,
	ext::RequestSigner,
	http::TokenHttpClient,
	manager::TokenManager,
	oauth::TransportErrorMapper,
};

/// Signs reqwest builders with `Authorization: Bearer <token>`.
#[derive(Clone, Copy, Debug, Default)]
pub struct BearerSigner;
impl RequestSigner<RequestBuilder, Error> for BearerSigner {
	fn attach_token(&self, request: RequestBuilder, token: &TokenSecret) -> Result<RequestBuilder> {
		Ok(request.bearer_auth(token.expose()))
	}
}

/// HTTP client whose requests are authenticated by a [`TokenManager`].
pub struct RelayClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	client: ReqwestClient,
	manager: TokenManager<C, M>,
	signer: BearerSigner,
}
impl<C, M> RelayClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Wraps an existing reqwest client.
	pub fn new(client: ReqwestClient, manager: TokenManager<C, M>) -> Self {
		Self { client, manager, signer: BearerSigner }
	}

	/// Returns the token manager backing this client.
	pub fn manager(&self) -> &TokenManager<C, M> {
		&self.manager
	}

	/// Starts a request to `url` carrying the token resolved for `ctx`.
	///
	/// A disabled manager with nothing to forward yields an unauthenticated builder.
	pub async fn request<U>(
		&self,
		method: Method,
		url: U,
		ctx: Option<&RequestContext>,
	) -> Result<RequestBuilder>
	where
		U: IntoUrl,
	{
		let builder = self.client.request(method, url);
		let forwarded = ctx.and_then(RequestContext::bearer_token).is_some();

		if !forwarded && !self.manager.is_enabled() {
			return Ok(builder);
		}

		let token = self.manager.get_token(ctx).await?;

		self.signer.attach_token(builder, &token)
	}

	/// Shorthand for a `GET` request.
	pub async fn get<U>(&self, url: U, ctx: Option<&RequestContext>) -> Result<RequestBuilder>
	where
		U: IntoUrl,
	{
		self.request(Method::GET, url, ctx).await
	}

	/// Shorthand for a `POST` request.
	pub async fn post<U>(&self, url: U, ctx: Option<&RequestContext>) -> Result<RequestBuilder>
	where
		U: IntoUrl,
	{
		self.request(Method::POST, url, ctx).await
	}
}
impl<C, M> Clone for RelayClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self { client: self.client.clone(), manager: self.manager.clone(), signer: self.signer }
	}
}
impl<C, M> Debug for RelayClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RelayClient").field("manager", &self.manager).finish()
	}
}
