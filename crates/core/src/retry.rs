//! Bounded retry-with-backoff policy for reservation attempts.
//!
//! The policy is pure: given the attempt number and the error kind it
//! returns a verdict, and the reservation engine owns the actual sleeping.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How a failed reservation attempt is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptErrorKind {
	/// Stale element, timeout, rate limiting. Worth another try.
	Transient,
	/// Somebody else got the seat. Retrying cannot help.
	SeatTaken,
}

/// What the engine should do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
	Retry { delay: Duration },
	Fail,
}

/// Retry bounds and backoff shape, set from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
	/// Total attempts per seat, including the first one.
	pub max_attempts: u32,
	pub initial_delay: Duration,
	pub backoff_factor: f64,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			initial_delay: Duration::from_secs(1),
			backoff_factor: 2.0,
		}
	}
}

impl RetryPolicy {
	/// Decides the follow-up for attempt number `attempt` (zero-based)
	/// failing with `kind`.
	pub fn decide(&self, attempt: u32, kind: AttemptErrorKind) -> Verdict {
		match kind {
			AttemptErrorKind::SeatTaken => Verdict::Fail,
			AttemptErrorKind::Transient if attempt + 1 >= self.max_attempts => Verdict::Fail,
			AttemptErrorKind::Transient => Verdict::Retry {
				delay: self.initial_delay.mul_f64(self.backoff_factor.powi(attempt as i32)),
			},
		}
	}
}
