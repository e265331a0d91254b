// self
use crate::_prelude::*;

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedToken<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedToken<F> = F;

/// A span wrapping one token resolution step.
#[derive(Clone, Debug)]
pub struct TokenSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl TokenSpan {
	/// Creates a new span tagged with the provided stage.
	pub fn new(stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"oauth2_token_relay.token",
				stage,
				source = tracing::field::Empty
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = stage;

			Self {}
		}
	}

	/// Records which source finally served the token.
	pub fn record_source(&self, source: crate::obs::TokenSource) {
		#[cfg(feature = "tracing")]
		{
			self.span.record("source", source.as_str());
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = source;
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedToken<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}
