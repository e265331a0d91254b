//! Mints a client-credentials token against a mock endpoint, reuses it from the cache, and shows
//! an inbound bearer token taking precedence over the minted one.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use oauth2_token_relay::{
	auth::ScopeSet, config::OAuthConfig, context::RequestContext, manager::ReqwestTokenManager,
	relay::RelayClient, reqwest::Client,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"demo-access\",\"token_type\":\"bearer\",\"expires_in\":900}");
		})
		.await;
	let api_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/orders");
			then.status(200).header("content-type", "application/json").body("[]");
		})
		.await;
	let config = OAuthConfig::builder()
		.token_endpoint(server.url("/token"))
		.credentials("demo-client", "super-secret")
		.scope(ScopeSet::new(["orders.read"])?)
		.build()?;
	let manager = ReqwestTokenManager::new(config)?;
	let first = manager.get_token(None).await?;
	let second = manager.get_token(None).await?;

	println!("Minted token: {}.", first.expose());
	println!("Served from cache: {}.", first == second);

	let ctx = RequestContext::with_bearer("inbound-user-token")?;
	let forwarded = manager.get_token(Some(&ctx)).await?;

	println!("Forwarded token: {}.", forwarded.expose());

	let relay = RelayClient::new(Client::new(), manager);
	let status = relay.get(server.url("/orders"), None).await?.send().await?.status();

	println!("Downstream status: {status}.");

	token_mock.assert_calls_async(1).await;
	api_mock.assert_async().await;

	Ok(())
}
