//! Reservation engine: grabs every open seat except the chosen one.
//!
//! Expects the browser to already sit on the seat-map page (where
//! [`crate::lookup::FlightLookup::find_flight`] leaves it). Attempts run in
//! seat-map order; each failed attempt is classified and fed to the retry
//! policy, and every outcome is streamed as a progress event.

use shamrock_core::retry::{AttemptErrorKind, RetryPolicy, Verdict};
use shamrock_core::seatmap::SeatMap;
use shamrock_core::types::{Flight, ReservationReport, ReservationRequest, SeatId, SeatOutcome, SeatResult};
use shamrock_core::{Error, Result};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::browser::{Browser, click_first, try_click};
use crate::cancel::CancelToken;
use crate::lookup::SitePlan;

/// Streamed after each seat's outcome is decided.
#[derive(Debug, Clone)]
pub struct Progress {
	pub outcome: SeatOutcome,
	pub completed: usize,
	pub total: usize,
}

/// One attempt's failure, classified for the retry policy.
#[derive(Debug)]
enum AttemptError {
	Transient(String),
	Taken,
}

impl AttemptError {
	fn kind(&self) -> AttemptErrorKind {
		match self {
			Self::Transient(_) => AttemptErrorKind::Transient,
			Self::Taken => AttemptErrorKind::SeatTaken,
		}
	}
}

#[derive(Debug, Clone, Default)]
pub struct ReservationEngine {
	plan: SitePlan,
	policy: RetryPolicy,
}

impl ReservationEngine {
	pub fn new(plan: SitePlan, policy: RetryPolicy) -> Self {
		Self { plan, policy }
	}

	/// Reserves every available seat except `chosen`, in map order.
	///
	/// Per-seat failures are folded into the report and never abort the
	/// batch. Cancellation is honored between attempts: remaining seats are
	/// recorded as skipped and the partial report comes back marked
	/// cancelled. Only a failure to finalize the selection on the site
	/// aborts the run with an error.
	pub async fn reserve(
		&self,
		browser: &dyn Browser,
		flight: &Flight,
		chosen: SeatId,
		seats: &SeatMap,
		progress: Option<&mpsc::UnboundedSender<Progress>>,
		cancel: &CancelToken,
	) -> Result<ReservationReport> {
		let candidates = seats.candidates(chosen);
		let total = candidates.len();
		info!(target = "shamrock.reserve", route = %flight.route(), %chosen, candidates = total, "starting reservation run");

		let mut report = ReservationReport::default();
		for seat in candidates {
			let result = if cancel.is_cancelled() {
				SeatResult::Skipped
			} else if !seats.is_available(seat) {
				// The map already knows this one is gone; no attempt needed.
				SeatResult::AlreadyTaken
			} else {
				let request = ReservationRequest { flight, seat };
				self.attempt_with_retries(browser, &request).await
			};
			report.record(seat, result);
			if let Some(sender) = progress {
				let _ = sender.send(Progress {
					outcome: SeatOutcome { seat, result },
					completed: report.total(),
					total,
				});
			}
		}
		report.cancelled = cancel.is_cancelled();

		if report.reserved > 0 && !report.cancelled {
			self.finalize(browser).await?;
		}
		info!(target = "shamrock.reserve", summary = %report.summary(), "reservation run finished");
		Ok(report)
	}

	/// Backs the selection out after a cancelled run so the seats free up.
	/// Best effort; the session gets torn down right after either way.
	pub async fn release(&self, browser: &dyn Browser) {
		if try_click(browser, &self.plan.change_flight).await {
			debug!(target = "shamrock.reserve", "released selected seats");
		}
	}

	async fn attempt_with_retries(&self, browser: &dyn Browser, request: &ReservationRequest<'_>) -> SeatResult {
		let mut attempt = 0;
		loop {
			match self.attempt(browser, request.seat).await {
				Ok(()) => return SeatResult::Reserved,
				Err(AttemptError::Taken) => {
					debug!(target = "shamrock.reserve", seat = %request.seat, "seat already taken");
					return SeatResult::AlreadyTaken;
				}
				Err(err @ AttemptError::Transient(_)) => match self.policy.decide(attempt, err.kind()) {
					Verdict::Retry { delay } => {
						warn!(target = "shamrock.reserve", seat = %request.seat, attempt, error = ?err, "attempt failed; retrying");
						tokio::time::sleep(delay).await;
						attempt += 1;
					}
					Verdict::Fail => {
						warn!(target = "shamrock.reserve", seat = %request.seat, attempts = attempt + 1, "giving up on seat");
						return SeatResult::FailedAfterRetries;
					}
				},
			}
		}
	}

	/// One click on one seat, verified by re-reading the element state.
	async fn attempt(&self, browser: &dyn Browser, seat: SeatId) -> std::result::Result<(), AttemptError> {
		let selector = self.plan.seat_selector(seat);
		let element = browser
			.find(&selector)
			.await
			.map_err(|e| AttemptError::Transient(e.to_string()))?
			.ok_or(AttemptError::Taken)?;
		if element.class_contains(&self.plan.unavailable_marker) {
			return Err(AttemptError::Taken);
		}

		browser
			.click(&element)
			.await
			.map_err(|e| AttemptError::Transient(e.to_string()))?;

		let confirmed = browser
			.find(&selector)
			.await
			.map_err(|e| AttemptError::Transient(e.to_string()))?;
		match confirmed {
			Some(element) if element.class_contains(&self.plan.selected_marker) => Ok(()),
			Some(element) if element.class_contains(&self.plan.unavailable_marker) => Err(AttemptError::Taken),
			_ => Err(AttemptError::Transient("seat click did not register".into())),
		}
	}

	/// Confirms the selection so the site holds the seats.
	async fn finalize(&self, browser: &dyn Browser) -> Result<()> {
		click_first(browser, "finalize", &self.plan.next_button)
			.await
			.map_err(|err| match err {
				Error::SiteInteraction { message, .. } => Error::site("finalize", message),
				other => other,
			})?;
		click_first(browser, "finalize", &self.plan.fast_track_confirm).await
	}
}
