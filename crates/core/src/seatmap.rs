//! Seat map model: pure parsing of extracted seat elements.
//!
//! The automation layer hands over raw element data (`id`, availability
//! marker, optional class tag); this module turns it into a validated
//! [`SeatMap`] with no side effects, so it can be tested without a browser.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{Seat, SeatId};

/// One seat element as extracted from the page, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSeat {
	/// Element id, with or without the site's `seat-` prefix.
	pub id: String,
	pub unavailable: bool,
	pub tag: Option<String>,
}

impl RawSeat {
	pub fn new(id: impl Into<String>, unavailable: bool) -> Self {
		Self {
			id: id.into(),
			unavailable,
			tag: None,
		}
	}
}

/// Ordered, validated seat layout for one flight.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatMap {
	seats: Vec<Seat>,
}

impl SeatMap {
	/// Parses raw seat elements into a seat map.
	///
	/// Rejects empty input, malformed seat ids, and duplicates. Seats come
	/// out sorted by (row, column) regardless of extraction order.
	pub fn parse(raw: Vec<RawSeat>) -> Result<Self> {
		if raw.is_empty() {
			return Err(Error::SeatMapParse("no seat elements extracted".into()));
		}

		let mut seen = HashSet::new();
		let mut seats = Vec::with_capacity(raw.len());
		for element in raw {
			let id_text = element.id.strip_prefix("seat-").unwrap_or(&element.id);
			let id: SeatId = id_text
				.parse()
				.map_err(|_| Error::SeatMapParse(format!("bad seat id {:?}", element.id)))?;
			if !seen.insert(id) {
				return Err(Error::SeatMapParse(format!("duplicate seat {id}")));
			}
			seats.push(Seat {
				id,
				available: !element.unavailable,
				tag: element.tag,
			});
		}
		seats.sort_by_key(|seat| seat.id);

		Ok(Self { seats })
	}

	pub fn len(&self) -> usize {
		self.seats.len()
	}

	pub fn is_empty(&self) -> bool {
		self.seats.is_empty()
	}

	pub fn seats(&self) -> &[Seat] {
		&self.seats
	}

	pub fn get(&self, id: SeatId) -> Option<&Seat> {
		self.seats.iter().find(|seat| seat.id == id)
	}

	pub fn available(&self) -> impl Iterator<Item = &Seat> {
		self.seats.iter().filter(|seat| seat.available)
	}

	pub fn available_count(&self) -> usize {
		self.available().count()
	}

	pub fn is_available(&self, id: SeatId) -> bool {
		self.get(id).is_some_and(|seat| seat.available)
	}

	/// Every seat except `chosen`, in map order. The engine walks all of
	/// them so the report accounts for the full map; seats the map already
	/// marks unavailable are recorded as taken without an attempt.
	pub fn candidates(&self, chosen: SeatId) -> Vec<SeatId> {
		self.seats.iter().map(|seat| seat.id).filter(|id| *id != chosen).collect()
	}

	/// Short listing shown to the user when asking them to pick a seat.
	pub fn describe_available(&self) -> String {
		self.available().map(|seat| seat.id.to_string()).collect::<Vec<_>>().join(", ")
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn raw(ids: &[&str]) -> Vec<RawSeat> {
		ids.iter().map(|id| RawSeat::new(*id, false)).collect()
	}

	#[test]
	fn parse_strips_prefix_and_sorts() {
		let map = SeatMap::parse(raw(&["seat-12A", "seat-2C", "seat-2A"])).unwrap();
		let order: Vec<String> = map.seats().iter().map(|seat| seat.id.to_string()).collect();
		assert_eq!(order, ["2A", "2C", "12A"]);
	}

	#[test]
	fn parse_rejects_duplicates() {
		let err = SeatMap::parse(raw(&["1A", "seat-1A"])).unwrap_err();
		assert!(matches!(err, Error::SeatMapParse(_)));
	}

	#[test]
	fn parse_rejects_malformed_and_empty() {
		assert!(SeatMap::parse(raw(&["seat-??"])).is_err());
		assert!(SeatMap::parse(Vec::new()).is_err());
	}

	#[test]
	fn availability_carries_through() {
		let map = SeatMap::parse(vec![
			RawSeat::new("1A", false),
			RawSeat::new("1B", true),
			RawSeat::new("1C", false),
		])
		.unwrap();
		assert_eq!(map.available_count(), 2);
		assert!(map.is_available("1A".parse().unwrap()));
		assert!(!map.is_available("1B".parse().unwrap()));
		assert!(!map.is_available("9F".parse().unwrap()));
	}

	#[test]
	fn candidates_exclude_only_the_chosen_seat() {
		let map = SeatMap::parse(vec![
			RawSeat::new("1A", false),
			RawSeat::new("1B", true),
			RawSeat::new("1C", false),
			RawSeat::new("2A", false),
		])
		.unwrap();
		let chosen: SeatId = "1C".parse().unwrap();
		let candidates: Vec<String> = map.candidates(chosen).iter().map(SeatId::to_string).collect();
		assert_eq!(candidates, ["1A", "1B", "2A"]);
	}

	#[test]
	fn tags_survive_parsing() {
		let mut element = RawSeat::new("1A", false);
		element.tag = Some("seatmap__seat--extra-legroom".into());
		let map = SeatMap::parse(vec![element]).unwrap();
		assert_eq!(map.seats()[0].tag.as_deref(), Some("seatmap__seat--extra-legroom"));
	}
}
