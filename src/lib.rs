//! Bearer tokens for outbound calls.
//!
//! The caller's token is forwarded when the inbound request carries one. Otherwise a
//! client-credentials token is minted, cached until shortly before expiry, and refreshed behind a
//! singleflight guard.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod ext;
pub mod http;
pub mod manager;
pub mod oauth;
pub mod obs;
#[cfg(feature = "reqwest")] pub mod relay;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::{_prelude::*, clock::ManualClock};

	// self
	use crate::{
		config::OAuthConfig,
		http::ReqwestHttpClient,
		manager::TokenManager,
		oauth::ReqwestTransportErrorMapper,
	};

	/// Token manager type alias used by reqwest-backed integration tests.
	pub type ReqwestTestManager = TokenManager<ReqwestHttpClient, ReqwestTransportErrorMapper>;

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Constructs a [`TokenManager`] driven by a [`ManualClock`] and the reqwest transport used
	/// across integration tests.
	pub fn build_reqwest_test_manager(config: OAuthConfig) -> (ReqwestTestManager, ManualClock) {
		let clock = ManualClock::default();
		let manager =
			ReqwestTestManager::with_reqwest_http_client(config, test_reqwest_http_client())
				.expect("Test configuration should be valid.")
				.with_clock(Arc::new(clock.clone()));

		(manager, clock)
	}
}

mod _prelude {
	pub use std::{
		collections::BTreeMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _, oauth2_token_relay as _, tokio as _};
