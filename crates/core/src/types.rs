//! Validated input newtypes and reservation data model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("airport codes are three letters, e.g. DUB")]
pub struct InvalidAirportCode;

/// Three-letter uppercase IATA airport code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AirportCode(String);

impl AirportCode {
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl FromStr for AirportCode {
	type Err = InvalidAirportCode;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let code = s.trim();
		if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
			Ok(Self(code.to_ascii_uppercase()))
		} else {
			Err(InvalidAirportCode)
		}
	}
}

impl fmt::Display for AirportCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

#[derive(Debug, Error)]
#[error("departure time must be HH:MM, e.g. 08:45")]
pub struct InvalidDepartureTime;

/// Scheduled departure time of day, as shown on the airline's flight card.
///
/// Accepts `HH:MM` and the bare `HHMM` form people tend to type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartureTime(NaiveTime);

impl DepartureTime {
	/// Renders the card-matching form, e.g. `08:45`.
	pub fn as_card_label(&self) -> String {
		self.0.format("%H:%M").to_string()
	}

	/// Resolves the next departure instant: today if the time is still
	/// ahead of `now`, otherwise tomorrow.
	pub fn resolve(&self, now: DateTime<Utc>) -> DateTime<Utc> {
		let today = now.date_naive().and_time(self.0).and_utc();
		if today > now { today } else { today + Duration::days(1) }
	}
}

impl FromStr for DepartureTime {
	type Err = InvalidDepartureTime;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let mut input = s.trim().to_string();
		if input.len() == 4 && input.chars().all(|c| c.is_ascii_digit()) {
			input.insert(2, ':');
		}
		NaiveTime::parse_from_str(&input, "%H:%M")
			.map(Self)
			.map_err(|_| InvalidDepartureTime)
	}
}

impl fmt::Display for DepartureTime {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.as_card_label())
	}
}

#[derive(Debug, Error)]
#[error("seats look like a row number followed by a letter, e.g. 12A")]
pub struct InvalidSeatId;

/// Seat identifier: row number plus column letter, e.g. `12A`.
///
/// Ordering is (row, column) so seat-map iteration is deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SeatId {
	pub row: u8,
	pub column: char,
}

impl FromStr for SeatId {
	type Err = InvalidSeatId;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let id = s.trim();
		if id.len() < 2 {
			return Err(InvalidSeatId);
		}
		let (digits, letter) = id.split_at(id.len() - 1);
		let column = letter.chars().next().ok_or(InvalidSeatId)?;
		if !column.is_ascii_alphabetic() {
			return Err(InvalidSeatId);
		}
		let row: u8 = digits.parse().map_err(|_| InvalidSeatId)?;
		if row == 0 {
			return Err(InvalidSeatId);
		}
		Ok(Self {
			row,
			column: column.to_ascii_uppercase(),
		})
	}
}

impl fmt::Display for SeatId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}{}", self.row, self.column)
	}
}

/// One seat on a flight's seat map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
	pub id: SeatId,
	pub available: bool,
	/// Price/class marker when the site exposes one, e.g. extra legroom.
	pub tag: Option<String>,
}

/// A flight as resolved from the airline site. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flight {
	pub origin: AirportCode,
	pub destination: AirportCode,
	pub departure: DateTime<Utc>,
	/// Internal booking identifier for this lookup.
	pub booking_ref: String,
}

impl Flight {
	pub fn route(&self) -> String {
		format!("{}-{}", self.origin, self.destination)
	}
}

/// Route and departure a user asked for, with the departure already
/// resolved to an instant (today vs tomorrow).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightQuery {
	pub origin: AirportCode,
	pub destination: AirportCode,
	pub departure: DateTime<Utc>,
}

impl FlightQuery {
	pub fn route(&self) -> String {
		format!("{}-{}", self.origin, self.destination)
	}
}

/// One seat's reservation request. Created per seat, dropped once the
/// outcome is recorded.
#[derive(Debug, Clone)]
pub struct ReservationRequest<'a> {
	pub flight: &'a Flight,
	pub seat: SeatId,
}

/// Outcome recorded for a single seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeatResult {
	Reserved,
	AlreadyTaken,
	FailedAfterRetries,
	/// Never attempted because the run was cancelled first.
	Skipped,
}

/// Per-seat outcome, also streamed as a progress event while the engine runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatOutcome {
	pub seat: SeatId,
	pub result: SeatResult,
}

/// Aggregate outcome of one reservation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationReport {
	pub reserved: usize,
	pub skipped: usize,
	pub failed: usize,
	pub cancelled: bool,
	pub outcomes: Vec<SeatOutcome>,
}

impl ReservationReport {
	pub fn record(&mut self, seat: SeatId, result: SeatResult) {
		match result {
			SeatResult::Reserved => self.reserved += 1,
			SeatResult::AlreadyTaken | SeatResult::FailedAfterRetries => self.failed += 1,
			SeatResult::Skipped => self.skipped += 1,
		}
		self.outcomes.push(SeatOutcome { seat, result });
	}

	/// Total seats accounted for; always `reserved + skipped + failed`.
	pub fn total(&self) -> usize {
		self.reserved + self.skipped + self.failed
	}

	pub fn summary(&self) -> String {
		format!(
			"{} reserved, {} failed, {} skipped{}",
			self.reserved,
			self.failed,
			self.skipped,
			if self.cancelled { " (cancelled)" } else { "" }
		)
	}
}

#[cfg(test)]
mod tests {
	use chrono::TimeZone;

	use super::*;

	#[test]
	fn airport_code_normalizes_case_and_whitespace() {
		let code: AirportCode = " dub ".parse().unwrap();
		assert_eq!(code.as_str(), "DUB");
	}

	#[test]
	fn airport_code_rejects_bad_input() {
		assert!("DU".parse::<AirportCode>().is_err());
		assert!("DUBL".parse::<AirportCode>().is_err());
		assert!("D1B".parse::<AirportCode>().is_err());
	}

	#[test]
	fn departure_time_accepts_compact_form() {
		let time: DepartureTime = "0845".parse().unwrap();
		assert_eq!(time.as_card_label(), "08:45");
		assert!("8:45pm".parse::<DepartureTime>().is_err());
		assert!("24:00".parse::<DepartureTime>().is_err());
	}

	#[test]
	fn departure_resolves_to_today_when_still_ahead() {
		let now = Utc.with_ymd_and_hms(2024, 10, 4, 9, 0, 0).unwrap();
		let time: DepartureTime = "10:30".parse().unwrap();
		assert_eq!(time.resolve(now), Utc.with_ymd_and_hms(2024, 10, 4, 10, 30, 0).unwrap());
	}

	#[test]
	fn departure_resolves_to_tomorrow_when_passed() {
		let now = Utc.with_ymd_and_hms(2024, 10, 4, 11, 0, 0).unwrap();
		let time: DepartureTime = "10:30".parse().unwrap();
		assert_eq!(time.resolve(now), Utc.with_ymd_and_hms(2024, 10, 5, 10, 30, 0).unwrap());
	}

	#[test]
	fn seat_id_round_trips() {
		let seat: SeatId = "12a".parse().unwrap();
		assert_eq!(seat, SeatId { row: 12, column: 'A' });
		assert_eq!(seat.to_string(), "12A");
		let padded: SeatId = "01C".parse().unwrap();
		assert_eq!(padded.to_string(), "1C");
	}

	#[test]
	fn seat_id_rejects_malformed_input() {
		for bad in ["", "A", "12", "A12", "0A", "999A"] {
			assert!(bad.parse::<SeatId>().is_err(), "accepted {bad:?}");
		}
	}

	#[test]
	fn seat_ids_order_by_row_then_column() {
		let mut seats: Vec<SeatId> = ["2B", "10A", "2A", "1F"].iter().map(|s| s.parse().unwrap()).collect();
		seats.sort();
		let ordered: Vec<String> = seats.iter().map(SeatId::to_string).collect();
		assert_eq!(ordered, ["1F", "2A", "2B", "10A"]);
	}

	#[test]
	fn report_counts_sum() {
		let mut report = ReservationReport::default();
		report.record("1A".parse().unwrap(), SeatResult::Reserved);
		report.record("1B".parse().unwrap(), SeatResult::AlreadyTaken);
		report.record("1C".parse().unwrap(), SeatResult::Skipped);
		assert_eq!(report.total(), 3);
		assert_eq!((report.reserved, report.failed, report.skipped), (1, 1, 1));
	}
}
