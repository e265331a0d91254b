//! Time source consulted for token issuance and expiry checks.

// self
use crate::_prelude::*;

/// Source of the current instant.
///
/// The token manager never reads the system clock directly so expiry behavior can be driven
/// deterministically in tests.
pub trait Clock
where
	Self: 'static + Send + Sync,
{
	/// Returns the current UTC instant.
	fn now(&self) -> OffsetDateTime;
}

/// [`Clock`] backed by [`OffsetDateTime::now_utc`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;
impl Clock for SystemClock {
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}
}

/// Clock whose instant only moves when a test advances it.
#[cfg(any(test, feature = "test"))]
#[derive(Clone, Debug)]
pub struct ManualClock(Arc<Mutex<OffsetDateTime>>);
#[cfg(any(test, feature = "test"))]
impl ManualClock {
	/// Creates a clock frozen at `instant`.
	pub fn at(instant: OffsetDateTime) -> Self {
		Self(Arc::new(Mutex::new(instant)))
	}

	/// Moves the clock forward.
	pub fn advance(&self, by: Duration) {
		*self.0.lock() += by;
	}
}
#[cfg(any(test, feature = "test"))]
impl Default for ManualClock {
	fn default() -> Self {
		Self::at(OffsetDateTime::now_utc())
	}
}
#[cfg(any(test, feature = "test"))]
impl Clock for ManualClock {
	fn now(&self) -> OffsetDateTime {
		*self.0.lock()
	}
}
