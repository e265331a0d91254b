//! Request signing contract that attaches a resolved bearer token to an outbound request.

// self
use crate::auth::TokenSecret;

/// Describes how to attach a [`TokenSecret`] to an outbound request without constraining the
/// HTTP client type.
///
/// The crate ships a reqwest implementation (`relay::BearerSigner`); other clients implement the
/// trait against their own builder type.
pub trait RequestSigner<Request, Error>
where
	Self: Send + Sync,
{
	/// Consumes the provided request and injects authorization state derived from `token`.
	fn attach_token(&self, request: Request, token: &TokenSecret) -> Result<Request, Error>;
}
