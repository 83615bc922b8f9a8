//! Flight lookup: drives the airline's check-in funnel to the seat map.
//!
//! All site specifics (URLs, selectors, markers, timing) live in
//! [`SitePlan`] as plain data; the drive sequence itself only talks to the
//! [`Browser`] trait, so the whole flow runs against the fake in tests.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use shamrock_core::seatmap::{RawSeat, SeatMap};
use shamrock_core::types::{Flight, FlightQuery};
use shamrock_core::{Error, Result};
use tracing::{debug, info};

use crate::browser::{Browser, click_first, try_click, wait_for};

/// Check-in opens this close to departure; earlier lookups fail fast.
const CHECKIN_WINDOW_HOURS: i64 = 24;

/// Site-specific facts the flow needs: selectors, URL shape, markers.
#[derive(Debug, Clone)]
pub struct SitePlan {
	pub search_base: String,
	pub cookie_decline: String,
	pub flight_card: String,
	pub departure_hour: String,
	pub sold_out_marker: String,
	pub select_button: String,
	pub recommended_fare: String,
	pub login_later: String,
	pub title_dropdown: String,
	pub title_option: String,
	pub passenger_input: String,
	pub continue_button: String,
	pub page_header: String,
	pub small_bag: String,
	pub bags_continue: String,
	pub seat: String,
	pub unavailable_marker: String,
	pub selected_marker: String,
	pub seat_tag_prefix: String,
	pub next_button: String,
	pub fast_track_confirm: String,
	pub change_flight: String,
	pub wait_timeout: Duration,
	pub poll_interval: Duration,
}

impl Default for SitePlan {
	fn default() -> Self {
		Self {
			search_base: "https://www.ryanair.com/gb/en/trip/flights/select".into(),
			cookie_decline: "[data-ref=\"cookie.no-thanks\"]".into(),
			flight_card: ".flight-card".into(),
			departure_hour: "[data-ref=\"flight-segment.departure\"] .flight-info__hour".into(),
			sold_out_marker: "flights-lazy-sold-out-flight-card".into(),
			select_button: ".flight-card-summary__select-btn".into(),
			recommended_fare: ".fare-table__recommended-tag".into(),
			login_later: ".login-touchpoint__login-later".into(),
			title_dropdown: "ry-dropdown[data-ref=\"pax-details__title\"] button.dropdown__toggle".into(),
			title_option: "ry-dropdown-item[data-ref=\"title-item-0\"]".into(),
			passenger_input: "input[name*=\"form.passengers.\"]".into(),
			continue_button: ".continue-flow__button".into(),
			page_header: ".card__header, .seats-container__page-title".into(),
			small_bag: "[data-ref=\"product.small-bag\"] .ry-radio-circle-button__label".into(),
			bags_continue: "[data-ref=\"bags-continue-button\"]".into(),
			seat: ".seatmap__seat".into(),
			unavailable_marker: "unavailable".into(),
			selected_marker: "selected".into(),
			seat_tag_prefix: "seatmap__seat--".into(),
			next_button: ".passenger-carousel__cta--next".into(),
			fast_track_confirm: ".enhanced-takeover-beta__product-confirm-cta".into(),
			change_flight: "[data-e2e=\"change-flight-button\"]".into(),
			wait_timeout: Duration::from_secs(40),
			poll_interval: Duration::from_millis(500),
		}
	}
}

impl SitePlan {
	/// One-way search URL for the resolved departure date.
	pub fn search_url(&self, query: &FlightQuery, passengers: u32) -> String {
		format!(
			"{}?adults={passengers}&teens=0&children=0&infants=0&dateOut={}&originIata={}&destinationIata={}&isReturn=false&discount=0&promoCode=&isConnectedFlight=false",
			self.search_base,
			query.departure.format("%Y-%m-%d"),
			query.origin,
			query.destination,
		)
	}

	/// Selector for one seat element; the site zero-pads the row.
	pub fn seat_selector(&self, seat: shamrock_core::types::SeatId) -> String {
		format!("#seat-{:02}{}", seat.row, seat.column)
	}

	/// Selector scoped to the `index`-th flight card (zero-based).
	fn card_scoped(&self, index: usize, inner: &str) -> String {
		format!("{}:nth-of-type({}) {}", self.flight_card, index + 1, inner)
	}
}

/// Drives the funnel from search to the seat map.
#[derive(Debug, Clone, Default)]
pub struct FlightLookup {
	plan: SitePlan,
}

impl FlightLookup {
	pub fn new(plan: SitePlan) -> Self {
		Self { plan }
	}

	pub fn plan(&self) -> &SitePlan {
		&self.plan
	}

	/// Walks the check-in funnel and extracts the seat map.
	///
	/// Validates the check-in window before touching the site, so callers
	/// get `CheckinNotOpen` rather than a generic automation failure. On
	/// success the browser is left on the seat-map page, which is exactly
	/// where the reservation engine picks up.
	pub async fn find_flight(&self, browser: &dyn Browser, query: &FlightQuery, now: DateTime<Utc>) -> Result<(Flight, SeatMap)> {
		let until_departure = query.departure.signed_duration_since(now);
		if until_departure.num_hours() >= CHECKIN_WINDOW_HOURS {
			return Err(Error::CheckinNotOpen {
				hours_until: until_departure.num_hours(),
			});
		}
		if until_departure.num_seconds() < 0 {
			return Err(Error::FlightNotFound { route: query.route() });
		}

		info!(target = "shamrock.lookup", route = %query.route(), departure = %query.departure, "looking up flight");
		let card_index = self.open_and_locate_card(browser, query).await?;
		self.walk_funnel_to_seats(browser, card_index).await?;
		let seats = self.extract_seatmap(browser).await?;

		if seats.available_count() == 0 {
			return Err(Error::FlightSoldOut { route: query.route() });
		}
		debug!(target = "shamrock.lookup", available = seats.available_count(), total = seats.len(), "seat map extracted");

		let flight = Flight {
			origin: query.origin.clone(),
			destination: query.destination.clone(),
			departure: query.departure,
			booking_ref: format!("{}{}-{}", query.origin, query.destination, query.departure.format("%Y%m%d-%H%M")),
		};
		Ok((flight, seats))
	}

	/// Opens the search results and returns the index of the card whose
	/// departure hour matches the query.
	async fn open_and_locate_card(&self, browser: &dyn Browser, query: &FlightQuery) -> Result<usize> {
		browser.goto(&self.plan.search_url(query, 1)).await?;
		if try_click(browser, &self.plan.cookie_decline).await {
			debug!(target = "shamrock.lookup", "dismissed cookie banner");
		}

		// No flight card within the window means no flights on this route.
		if wait_for(browser, &self.plan.flight_card, self.plan.wait_timeout, self.plan.poll_interval)
			.await
			.is_err()
		{
			return Err(Error::FlightNotFound { route: query.route() });
		}

		let label = query.departure.format("%H:%M").to_string();
		let hours = browser.find_all(&self.plan.departure_hour).await?;
		let index = hours
			.iter()
			.position(|hour| hour.text.trim() == label)
			.ok_or_else(|| Error::FlightNotFound { route: query.route() })?;

		let sold_out = self.plan.card_scoped(index, &self.plan.sold_out_marker);
		if browser.find(&sold_out).await?.is_some() {
			return Err(Error::FlightSoldOut { route: query.route() });
		}
		Ok(index)
	}

	/// Clicks through fare, login, and passenger pages until the seat map
	/// starts loading.
	async fn walk_funnel_to_seats(&self, browser: &dyn Browser, card_index: usize) -> Result<()> {
		let select = self.plan.card_scoped(card_index, &self.plan.select_button);
		click_first(browser, "select-flight", &select).await?;
		click_first(browser, "select-fare", &self.plan.recommended_fare).await?;
		click_first(browser, "login-later", &self.plan.login_later).await?;
		self.fill_passenger_details(browser).await?;
		click_first(browser, "continue-to-seats", &self.plan.continue_button).await?;
		self.complete_baggage_page_if_shown(browser).await?;
		Ok(())
	}

	/// Fills every passenger field with a throwaway name and picks the
	/// first title option for each dropdown.
	async fn fill_passenger_details(&self, browser: &dyn Browser) -> Result<()> {
		let dropdowns = browser.find_all(&self.plan.title_dropdown).await?;
		for dropdown in &dropdowns {
			browser.click(dropdown).await?;
			click_first(browser, "passenger-title", &self.plan.title_option).await?;
		}

		let inputs = browser.find_all(&self.plan.passenger_input).await?;
		if inputs.is_empty() {
			return Err(Error::site("passenger-details", "no passenger fields found"));
		}
		for input in &inputs {
			browser.fill(input, &random_name()).await?;
		}
		debug!(target = "shamrock.lookup", fields = inputs.len(), "passenger details filled");
		Ok(())
	}

	/// The funnel sometimes inserts a baggage page before seats; submit the
	/// small-bag option and move on.
	async fn complete_baggage_page_if_shown(&self, browser: &dyn Browser) -> Result<()> {
		let header = wait_for(browser, &self.plan.page_header, self.plan.wait_timeout, self.plan.poll_interval)
			.await
			.map_err(|_| Error::site("after-passengers", "neither baggage nor seats page appeared"))?;
		if header.text.to_lowercase().contains("bag") {
			debug!(target = "shamrock.lookup", "completing baggage interstitial");
			click_first(browser, "baggage", &self.plan.small_bag).await?;
			click_first(browser, "baggage", &self.plan.bags_continue).await?;
		}
		Ok(())
	}

	async fn extract_seatmap(&self, browser: &dyn Browser) -> Result<SeatMap> {
		wait_for(browser, &self.plan.seat, self.plan.wait_timeout, self.plan.poll_interval)
			.await
			.map_err(|_| Error::site("seatmap", "seat map did not load in time"))?;

		let elements = browser.find_all(&self.plan.seat).await?;
		let raw: Vec<RawSeat> = elements
			.iter()
			.filter_map(|element| {
				let id = element.id.clone()?;
				Some(RawSeat {
					id,
					unavailable: element.class_contains(&self.plan.unavailable_marker),
					tag: element
						.classes
						.split_whitespace()
						.find(|class| {
							class.starts_with(&self.plan.seat_tag_prefix)
								&& !class.contains(&self.plan.unavailable_marker)
								&& !class.contains(&self.plan.selected_marker)
						})
						.map(str::to_string),
				})
			})
			.collect();
		SeatMap::parse(raw)
	}
}

/// Throwaway passenger name, letters only.
fn random_name() -> String {
	let mut rng = rand::thread_rng();
	(0..6).map(|_| rng.gen_range('a'..='z')).collect()
}

#[cfg(test)]
mod tests {
	use chrono::TimeZone;

	use super::*;

	fn query() -> FlightQuery {
		FlightQuery {
			origin: "DUB".parse().unwrap(),
			destination: "STN".parse().unwrap(),
			departure: Utc.with_ymd_and_hms(2024, 10, 4, 10, 30, 0).unwrap(),
		}
	}

	#[test]
	fn search_url_carries_route_and_date() {
		let plan = SitePlan::default();
		let url = plan.search_url(&query(), 1);
		assert!(url.contains("originIata=DUB"));
		assert!(url.contains("destinationIata=STN"));
		assert!(url.contains("dateOut=2024-10-04"));
		assert!(url.contains("adults=1"));
	}

	#[test]
	fn seat_selector_zero_pads_the_row() {
		let plan = SitePlan::default();
		assert_eq!(plan.seat_selector("1C".parse().unwrap()), "#seat-01C");
		assert_eq!(plan.seat_selector("12A".parse().unwrap()), "#seat-12A");
	}

	#[test]
	fn random_names_are_letters() {
		let name = random_name();
		assert_eq!(name.len(), 6);
		assert!(name.chars().all(|c| c.is_ascii_lowercase()));
	}
}
