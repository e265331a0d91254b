// self
use crate::obs::{TokenOutcome, TokenSource};

/// Records a token resolution outcome via the global metrics recorder (when enabled).
pub fn record_token_outcome(source: TokenSource, outcome: TokenOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"oauth2_token_relay_token_total",
			"source" => source.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (source, outcome);
	}
}
