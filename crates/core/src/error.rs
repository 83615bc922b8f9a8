//! Error taxonomy shared across the workspace.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by lookup, reservation, and session handling.
#[derive(Debug, Error)]
pub enum Error {
	/// The browser/driver could not be started or attached.
	#[error("browser session could not be started: {0}")]
	SessionInit(String),

	/// No flight matched the requested route and departure time.
	#[error("no flight found for {route}")]
	FlightNotFound { route: String },

	/// The flight exists but has no seats left.
	#[error("flight {route} is sold out")]
	FlightSoldOut { route: String },

	/// The departure is outside the 24-hour check-in window.
	#[error("check-in is not open yet; departure is {hours_until}h away")]
	CheckinNotOpen { hours_until: i64 },

	/// An automation step failed: selector missing, timeout, unexpected page.
	#[error("site interaction failed at {step}: {message}")]
	SiteInteraction { step: String, message: String },

	/// Extracted seat elements did not form a valid seat map.
	#[error("seat map could not be parsed: {0}")]
	SeatMapParse(String),

	/// The conversation was idle past the configured limit.
	#[error("session timed out waiting for input")]
	SessionTimeout,
}

impl Error {
	/// Shorthand for [`Error::SiteInteraction`] with an owned step name.
	pub fn site(step: &str, message: impl Into<String>) -> Self {
		Self::SiteInteraction {
			step: step.to_string(),
			message: message.into(),
		}
	}

	/// Suggested next action shown to the user alongside the error text.
	pub fn user_hint(&self) -> &'static str {
		match self {
			Self::FlightNotFound { .. } => "Check the route and departure time, then try /reserve again.",
			Self::FlightSoldOut { .. } => "There is nothing left to grab on this flight.",
			Self::CheckinNotOpen { .. } => "Try again once the departure is less than 24 hours away.",
			Self::SessionTimeout => "Send /reserve to start over.",
			_ => "This is usually temporary; try /reserve again in a minute.",
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn site_helper_fills_step_and_message() {
		let err = Error::site("select-fare", "element not clickable");
		assert_eq!(err.to_string(), "site interaction failed at select-fare: element not clickable");
	}

	#[test]
	fn every_error_carries_a_hint() {
		let errors = [
			Error::SessionInit("boom".into()),
			Error::FlightNotFound { route: "DUB-STN".into() },
			Error::FlightSoldOut { route: "DUB-STN".into() },
			Error::CheckinNotOpen { hours_until: 48 },
			Error::site("goto", "timeout"),
			Error::SeatMapParse("empty".into()),
			Error::SessionTimeout,
		];
		for err in errors {
			assert!(!err.user_hint().is_empty());
		}
	}
}
