use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use shamrock_automation::browser::{Browser, Element};
use shamrock_automation::fake::{ClickBehavior, FakeBrowser, FakeController, labeled, seat};
use shamrock_automation::{CancelToken, ReservationEngine, SitePlan};
use shamrock_core::Error;
use shamrock_core::retry::RetryPolicy;
use shamrock_core::seatmap::{RawSeat, SeatMap};
use shamrock_core::types::{Flight, SeatId, SeatResult};
use tokio::sync::mpsc;

fn fast_policy() -> RetryPolicy {
	RetryPolicy {
		max_attempts: 3,
		initial_delay: Duration::from_millis(1),
		backoff_factor: 1.0,
	}
}

fn flight() -> Flight {
	Flight {
		origin: "DUB".parse().unwrap(),
		destination: "STN".parse().unwrap(),
		departure: Utc.with_ymd_and_hms(2024, 10, 4, 10, 30, 0).unwrap(),
		booking_ref: "DUBSTN-20241004-1030".into(),
	}
}

fn seatmap(ids: &[&str]) -> SeatMap {
	SeatMap::parse(ids.iter().map(|id| RawSeat::new(*id, false)).collect()).unwrap()
}

/// Seeds one seat element under its own selector and marks it selectable.
fn script_seat(ctl: &FakeController, plan: &SitePlan, id: &str, behavior: ClickBehavior) {
	let seat_id: SeatId = id.parse().unwrap();
	let selector = plan.seat_selector(seat_id);
	ctl.set_element(&selector, seat(&format!("seat-{id}"), "seatmap__seat"));
	ctl.on_click(&format!("el-seat-{id}"), behavior);
}

fn script_finalize(ctl: &FakeController, plan: &SitePlan) {
	ctl.set_element(&plan.next_button, labeled("next", ""));
	ctl.set_element(&plan.fast_track_confirm, labeled("fast-track", ""));
}

fn selectable() -> ClickBehavior {
	ClickBehavior::AppendClass("seatmap__seat--selected".into())
}

#[tokio::test]
async fn reserves_everything_except_the_chosen_seat() {
	let (browser, ctl) = FakeBrowser::with_controller();
	let plan = SitePlan::default();
	// Six seats, user picks 12A, one neighbor is already gone.
	for id in ["12B", "12C", "13A", "13B"] {
		script_seat(&ctl, &plan, id, selectable());
	}
	let taken: SeatId = "13C".parse().unwrap();
	ctl.set_element(&plan.seat_selector(taken), seat("seat-13C", "seatmap__seat seatmap__seat--unavailable"));
	script_finalize(&ctl, &plan);

	let engine = ReservationEngine::new(plan, fast_policy());
	let seats = seatmap(&["12A", "12B", "12C", "13A", "13B", "13C"]);
	let chosen: SeatId = "12A".parse().unwrap();
	let report = engine
		.reserve(&browser, &flight(), chosen, &seats, None, &CancelToken::new())
		.await
		.unwrap();

	assert_eq!((report.reserved, report.skipped, report.failed), (4, 0, 1));
	assert_eq!(report.total(), seats.len() - 1);
	assert!(!report.cancelled);
	assert!(!ctl.clicked().iter().any(|h| h == "el-seat-12A"), "chosen seat must never be touched");
	assert!(ctl.clicked().contains(&"next".to_string()), "run must be finalized");
}

#[tokio::test]
async fn transient_failures_retry_to_the_bound() {
	let (browser, ctl) = FakeBrowser::with_controller();
	let plan = SitePlan::default();
	script_seat(
		&ctl,
		&plan,
		"01B",
		ClickBehavior::FailTimes {
			remaining: 2,
			then_append: Some("seatmap__seat--selected".into()),
		},
	);
	script_seat(&ctl, &plan, "01C", ClickBehavior::FailTimes { remaining: 99, then_append: None });
	script_finalize(&ctl, &plan);

	let engine = ReservationEngine::new(plan, fast_policy());
	let seats = seatmap(&["01A", "01B", "01C"]);
	let report = engine
		.reserve(&browser, &flight(), "1A".parse().unwrap(), &seats, None, &CancelToken::new())
		.await
		.unwrap();

	assert_eq!((report.reserved, report.failed), (1, 1));
	let clicks_on = |handle: &str| ctl.clicked().iter().filter(|h| *h == handle).count();
	// 01B: two injected failures, then success on the third try.
	assert_eq!(clicks_on("el-seat-01B"), 3);
	// 01C: exhausted all three attempts.
	assert_eq!(clicks_on("el-seat-01C"), 3);
	assert_eq!(
		report.outcomes.iter().find(|o| o.seat.to_string() == "1C").unwrap().result,
		SeatResult::FailedAfterRetries
	);
}

#[tokio::test]
async fn taken_seats_are_recorded_without_retry() {
	let (browser, ctl) = FakeBrowser::with_controller();
	let plan = SitePlan::default();
	// 01B is visibly unavailable; 01C is gone from the page entirely.
	ctl.set_element(
		&plan.seat_selector("1B".parse().unwrap()),
		seat("seat-01B", "seatmap__seat seatmap__seat--unavailable"),
	);

	let engine = ReservationEngine::new(plan, fast_policy());
	let seats = seatmap(&["01A", "01B", "01C"]);
	let report = engine
		.reserve(&browser, &flight(), "1A".parse().unwrap(), &seats, None, &CancelToken::new())
		.await
		.unwrap();

	assert_eq!(report.failed, 2);
	assert!(ctl.clicked().is_empty(), "taken seats must not be clicked");
	assert!(report.outcomes.iter().all(|o| o.result == SeatResult::AlreadyTaken));
}

#[tokio::test]
async fn progress_is_streamed_per_seat_in_map_order() {
	let (browser, ctl) = FakeBrowser::with_controller();
	let plan = SitePlan::default();
	for id in ["01B", "01C", "02A"] {
		script_seat(&ctl, &plan, id, selectable());
	}
	script_finalize(&ctl, &plan);

	let engine = ReservationEngine::new(plan, fast_policy());
	let seats = seatmap(&["01A", "01B", "01C", "02A"]);
	let (tx, mut rx) = mpsc::unbounded_channel();
	engine
		.reserve(&browser, &flight(), "1A".parse().unwrap(), &seats, Some(&tx), &CancelToken::new())
		.await
		.unwrap();
	drop(tx);

	let mut events = Vec::new();
	while let Some(event) = rx.recv().await {
		events.push(event);
	}
	assert_eq!(events.len(), 3);
	let order: Vec<String> = events.iter().map(|e| e.outcome.seat.to_string()).collect();
	assert_eq!(order, ["1B", "1C", "2A"]);
	assert_eq!(events.last().unwrap().completed, 3);
	assert!(events.iter().all(|e| e.total == 3));
}

/// Browser wrapper that trips the cancel token on the first click, so the
/// cancellation lands exactly on a seat-attempt boundary.
struct CancelOnFirstClick {
	inner: FakeBrowser,
	token: CancelToken,
	tripped: AtomicBool,
}

#[async_trait]
impl Browser for CancelOnFirstClick {
	async fn goto(&self, url: &str) -> shamrock_core::Result<()> {
		self.inner.goto(url).await
	}

	async fn find(&self, selector: &str) -> shamrock_core::Result<Option<Element>> {
		self.inner.find(selector).await
	}

	async fn find_all(&self, selector: &str) -> shamrock_core::Result<Vec<Element>> {
		self.inner.find_all(selector).await
	}

	async fn click(&self, element: &Element) -> shamrock_core::Result<()> {
		if !self.tripped.swap(true, Ordering::SeqCst) {
			self.token.cancel();
		}
		self.inner.click(element).await
	}

	async fn fill(&self, element: &Element, text: &str) -> shamrock_core::Result<()> {
		self.inner.fill(element, text).await
	}
}

#[tokio::test]
async fn cancel_stops_within_one_seat_boundary() {
	let (fake, ctl) = FakeBrowser::with_controller();
	let plan = SitePlan::default();
	for id in ["01B", "01C", "02A", "02B"] {
		script_seat(&ctl, &plan, id, selectable());
	}
	script_finalize(&ctl, &plan);

	let token = CancelToken::new();
	let browser = CancelOnFirstClick {
		inner: fake,
		token: token.clone(),
		tripped: AtomicBool::new(false),
	};

	let engine = ReservationEngine::new(plan, fast_policy());
	let seats = seatmap(&["01A", "01B", "01C", "02A", "02B"]);
	let report = engine
		.reserve(&browser, &flight(), "1A".parse().unwrap(), &seats, None, &token)
		.await
		.unwrap();

	assert!(report.cancelled);
	assert_eq!(report.reserved, 1, "the in-flight seat still completes");
	assert_eq!(report.skipped, 3, "remaining seats are skipped, not attempted");
	assert_eq!(report.total(), seats.len() - 1);
	assert!(!ctl.clicked().contains(&"next".to_string()), "cancelled runs are not finalized");
}

#[tokio::test]
async fn finalize_failure_aborts_the_run() {
	let (browser, ctl) = FakeBrowser::with_controller();
	let plan = SitePlan::default();
	script_seat(&ctl, &plan, "01B", selectable());
	// No finalize buttons scripted.

	let engine = ReservationEngine::new(plan, fast_policy());
	let seats = seatmap(&["01A", "01B"]);
	let err = engine
		.reserve(&browser, &flight(), "1A".parse().unwrap(), &seats, None, &CancelToken::new())
		.await
		.unwrap_err();
	assert!(matches!(err, Error::SiteInteraction { .. }));
}

#[tokio::test]
async fn release_clicks_the_change_flight_escape_hatch() {
	let (browser, ctl) = FakeBrowser::with_controller();
	let plan = SitePlan::default();
	ctl.set_element(&plan.change_flight, labeled("change-flight", ""));

	let engine = ReservationEngine::new(plan, fast_policy());
	engine.release(&browser).await;
	assert!(ctl.clicked().contains(&"change-flight".to_string()));
}
