//! Optional observability helpers for token resolution.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `oauth2_token_relay.token` with the `stage`
//!   (call site) field.
//! - Enable `metrics` to increment the `oauth2_token_relay_token_total` counter for every
//!   resolution, labeled by `source` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Where a resolved token came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenSource {
	/// Bearer token taken from the inbound request context.
	Forwarded,
	/// Still-valid token served from the cache.
	Cache,
	/// Token minted by a client-credentials refresh.
	Refresh,
}
impl TokenSource {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			TokenSource::Forwarded => "forwarded",
			TokenSource::Cache => "cache",
			TokenSource::Refresh => "refresh",
		}
	}
}
impl Display for TokenSource {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each resolution step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenOutcome {
	/// A refresh was started.
	Attempt,
	/// Token handed back to the caller.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl TokenOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			TokenOutcome::Attempt => "attempt",
			TokenOutcome::Success => "success",
			TokenOutcome::Failure => "failure",
		}
	}
}
impl Display for TokenOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
