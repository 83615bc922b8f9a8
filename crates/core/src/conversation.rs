//! Conversational state machine driving the reservation flow.
//!
//! The machine is a pure transition function: feed it an [`Event`], get back
//! a [`Step`] holding the replies to send and at most one side effect for
//! the runtime to execute. No chat transport, no browser, no clocks, so the
//! dialogue can be unit-tested on its own.

use crate::error::Error;
use crate::seatmap::SeatMap;
use crate::types::{AirportCode, DepartureTime, Flight, ReservationReport, SeatId};

/// Inbound event: a user message or an internal completion.
#[derive(Debug)]
pub enum Event {
	/// `/reserve` starts a new reservation dialogue.
	StartReserve,
	/// `/cancel` abandons whatever is in progress.
	Cancel,
	/// Any other user text.
	Message(String),
	/// Flight lookup finished with a seat map.
	LookupSucceeded { flight: Flight, seats: SeatMap },
	LookupFailed(Error),
	/// Reservation engine finished, possibly with partial failures.
	ReservationFinished(ReservationReport),
	ReservationFailed(Error),
	/// The session sat idle past the configured limit.
	Timeout,
}

impl Event {
	/// Maps normalized user text onto an event.
	pub fn from_user_text(text: &str) -> Self {
		match text.trim() {
			"/reserve" => Self::StartReserve,
			"/cancel" => Self::Cancel,
			other => Self::Message(other.to_string()),
		}
	}
}

/// Side effect the runtime must execute after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
	/// Look the flight up and extract its seat map.
	Lookup {
		origin: AirportCode,
		destination: AirportCode,
		time: DepartureTime,
	},
	/// Reserve every available seat except `chosen`.
	Reserve {
		flight: Flight,
		seats: SeatMap,
		chosen: SeatId,
	},
}

/// Result of one transition.
#[derive(Debug, Default)]
pub struct Step {
	pub replies: Vec<String>,
	pub action: Option<Action>,
}

impl Step {
	fn reply(text: impl Into<String>) -> Self {
		Self {
			replies: vec![text.into()],
			action: None,
		}
	}

	fn empty() -> Self {
		Self::default()
	}
}

/// Dialogue states, in the order the flow walks through them.
#[derive(Debug, Clone, PartialEq)]
pub enum State {
	Idle,
	AwaitingOrigin,
	AwaitingDestination {
		origin: AirportCode,
	},
	AwaitingTime {
		origin: AirportCode,
		destination: AirportCode,
	},
	AwaitingSeatChoice {
		flight: Flight,
		seats: SeatMap,
	},
	Reserving {
		flight: Flight,
		chosen: SeatId,
	},
	Done,
	Cancelled,
	Failed,
}

impl State {
	pub fn is_terminal(&self) -> bool {
		matches!(self, Self::Done | Self::Cancelled | Self::Failed)
	}
}

const PROMPT_ORIGIN: &str = "Let's grab some seats. Which origin airport? (3-letter code, e.g. DUB)";
const PROMPT_DESTINATION: &str = "And the destination airport code? (e.g. STN)";
const PROMPT_TIME: &str = "What time does the flight leave? (HH:MM as shown on the site)";
const IDLE_HINT: &str = "Send /reserve to start a seat grab, or /cancel to abandon one.";
const IN_PROGRESS: &str = "A reservation is already in progress. Send /cancel first to start over.";
const CANCELLED: &str = "Okay, cancelled. Nothing was kept.";
const TIMED_OUT: &str = "No activity for a while, so I dropped this session. Send /reserve to start over.";

/// One user's conversation. Owned by exactly one session worker.
#[derive(Debug)]
pub struct Conversation {
	state: State,
}

impl Default for Conversation {
	fn default() -> Self {
		Self::new()
	}
}

impl Conversation {
	pub fn new() -> Self {
		Self { state: State::Idle }
	}

	pub fn state(&self) -> &State {
		&self.state
	}

	pub fn is_terminal(&self) -> bool {
		self.state.is_terminal()
	}

	/// Applies one event, returning replies and the side effect to run.
	pub fn handle(&mut self, event: Event) -> Step {
		// Cancellation and timeout behave the same from every live state.
		match &event {
			Event::Cancel => {
				if matches!(self.state, State::Idle) {
					return Step::reply("Nothing to cancel right now.");
				}
				if !self.state.is_terminal() {
					let stopping_run = matches!(self.state, State::Reserving { .. });
					self.state = State::Cancelled;
					return if stopping_run {
						Step::reply("Stopping. I'll finish the seat I'm on and release the rest.")
					} else {
						Step::reply(CANCELLED)
					};
				}
			}
			Event::Timeout => {
				if !self.state.is_terminal() && !matches!(self.state, State::Idle) {
					self.state = State::Cancelled;
					return Step::reply(format!("{} {}", Error::SessionTimeout, TIMED_OUT));
				}
				return Step::empty();
			}
			_ => {}
		}

		match std::mem::replace(&mut self.state, State::Idle) {
			State::Idle => self.on_idle(event),
			State::AwaitingOrigin => self.on_awaiting_origin(event),
			State::AwaitingDestination { origin } => self.on_awaiting_destination(origin, event),
			State::AwaitingTime { origin, destination } => self.on_awaiting_time(origin, destination, event),
			State::AwaitingSeatChoice { flight, seats } => self.on_awaiting_seat(flight, seats, event),
			State::Reserving { flight, chosen } => self.on_reserving(flight, chosen, event),
			state @ (State::Done | State::Failed) => {
				self.state = state;
				Step::empty()
			}
			State::Cancelled => self.on_cancelled(event),
		}
	}

	fn on_idle(&mut self, event: Event) -> Step {
		match event {
			Event::StartReserve => {
				self.state = State::AwaitingOrigin;
				Step::reply(PROMPT_ORIGIN)
			}
			_ => {
				self.state = State::Idle;
				Step::reply(IDLE_HINT)
			}
		}
	}

	fn on_awaiting_origin(&mut self, event: Event) -> Step {
		self.state = State::AwaitingOrigin;
		match event {
			Event::StartReserve => Step::reply(IN_PROGRESS),
			Event::Message(text) => match text.parse::<AirportCode>() {
				Ok(origin) => {
					self.state = State::AwaitingDestination { origin };
					Step::reply(PROMPT_DESTINATION)
				}
				Err(err) => Step::reply(format!("{err} Try again:")),
			},
			_ => Step::empty(),
		}
	}

	fn on_awaiting_destination(&mut self, origin: AirportCode, event: Event) -> Step {
		match event {
			Event::StartReserve => {
				self.state = State::AwaitingDestination { origin };
				Step::reply(IN_PROGRESS)
			}
			Event::Message(text) => match text.parse::<AirportCode>() {
				Ok(destination) if destination == origin => {
					self.state = State::AwaitingDestination { origin };
					Step::reply("Destination matches the origin. Where is the flight actually going?")
				}
				Ok(destination) => {
					self.state = State::AwaitingTime { origin, destination };
					Step::reply(PROMPT_TIME)
				}
				Err(err) => {
					self.state = State::AwaitingDestination { origin };
					Step::reply(format!("{err} Try again:"))
				}
			},
			_ => {
				self.state = State::AwaitingDestination { origin };
				Step::empty()
			}
		}
	}

	fn on_awaiting_time(&mut self, origin: AirportCode, destination: AirportCode, event: Event) -> Step {
		match event {
			Event::StartReserve => {
				self.state = State::AwaitingTime { origin, destination };
				Step::reply(IN_PROGRESS)
			}
			Event::Message(text) => match text.parse::<DepartureTime>() {
				Ok(time) => {
					let reply = format!("Checking seats on {origin}-{destination} at {time}, hang on...");
					self.state = State::AwaitingTime {
						origin: origin.clone(),
						destination: destination.clone(),
					};
					Step {
						replies: vec![reply],
						action: Some(Action::Lookup { origin, destination, time }),
					}
				}
				Err(err) => {
					self.state = State::AwaitingTime { origin, destination };
					Step::reply(format!("{err} Try again:"))
				}
			},
			Event::LookupSucceeded { flight, seats } => {
				if seats.available_count() <= 1 {
					self.state = State::Done;
					return Step::reply("Only one seat is open on that flight, so there is nothing to grab.");
				}
				let reply = format!(
					"Found {} at {}. {} seats are open: {}\nWhich one do you want?",
					flight.route(),
					flight.departure.format("%H:%M"),
					seats.available_count(),
					seats.describe_available(),
				);
				self.state = State::AwaitingSeatChoice { flight, seats };
				Step::reply(reply)
			}
			Event::LookupFailed(err) => {
				self.state = State::Failed;
				Step::reply(format!("{err}. {}", err.user_hint()))
			}
			_ => {
				self.state = State::AwaitingTime { origin, destination };
				Step::empty()
			}
		}
	}

	fn on_awaiting_seat(&mut self, flight: Flight, seats: SeatMap, event: Event) -> Step {
		match event {
			Event::StartReserve => {
				self.state = State::AwaitingSeatChoice { flight, seats };
				Step::reply(IN_PROGRESS)
			}
			Event::Message(text) => match text.parse::<SeatId>() {
				Ok(chosen) if seats.is_available(chosen) => {
					let reply = format!("{chosen} it is. Locking every other open seat now...");
					self.state = State::Reserving {
						flight: flight.clone(),
						chosen,
					};
					Step {
						replies: vec![reply],
						action: Some(Action::Reserve { flight, seats, chosen }),
					}
				}
				Ok(chosen) => {
					let open = seats.describe_available();
					self.state = State::AwaitingSeatChoice { flight, seats };
					Step::reply(format!("{chosen} isn't open. Pick one of: {open}"))
				}
				Err(err) => {
					self.state = State::AwaitingSeatChoice { flight, seats };
					Step::reply(format!("{err} Try again:"))
				}
			},
			_ => {
				self.state = State::AwaitingSeatChoice { flight, seats };
				Step::empty()
			}
		}
	}

	fn on_reserving(&mut self, flight: Flight, chosen: SeatId, event: Event) -> Step {
		match event {
			Event::ReservationFinished(report) => {
				self.state = State::Done;
				Step::reply(format!(
					"Done with {}: {}. Check in for seat {} in the next couple of minutes!",
					flight.route(),
					report.summary(),
					chosen,
				))
			}
			Event::ReservationFailed(err) => {
				self.state = State::Failed;
				Step::reply(format!("{err}. {}", err.user_hint()))
			}
			Event::Message(_) => {
				self.state = State::Reserving { flight, chosen };
				Step::reply("Still working on the seats, hold tight...")
			}
			_ => {
				self.state = State::Reserving { flight, chosen };
				Step::empty()
			}
		}
	}

	fn on_cancelled(&mut self, event: Event) -> Step {
		self.state = State::Cancelled;
		match event {
			// A cancelled run still reports what it managed before stopping.
			Event::ReservationFinished(report) => Step::reply(format!("Stopped: {}.", report.summary())),
			_ => Step::empty(),
		}
	}
}
