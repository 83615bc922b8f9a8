//! Per-conversation worker: owns one [`Conversation`], executes its actions
//! against the airline site, and relays replies and progress to the chat
//! platform. The browser session is scoped to a single action and closed on
//! every exit path.

use std::sync::Arc;

use chrono::Utc;
use shamrock_automation::reserve::Progress;
use shamrock_automation::{BrowserSession, CancelToken, FlightLookup, ReservationEngine};
use shamrock_core::conversation::{Action, Conversation, Event};
use shamrock_core::seatmap::SeatMap;
use shamrock_core::types::{Flight, FlightQuery, SeatId, SeatResult};
use shamrock_core::{Error, Result};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::BotConfig;
use crate::dispatch::Outbound;

/// Runs one conversation to completion. Returns when the conversation hits a
/// terminal state, the inactivity limit fires, or the inbox closes.
pub async fn run(
	session_id: String,
	config: Arc<BotConfig>,
	cancel: CancelToken,
	mut inbox: mpsc::UnboundedReceiver<String>,
	outbound: mpsc::UnboundedSender<Outbound>,
) {
	let mut conversation = Conversation::new();
	loop {
		let event = match timeout(config.session_timeout, inbox.recv()).await {
			Ok(Some(text)) => Event::from_user_text(&text),
			Ok(None) => break,
			Err(_) => Event::Timeout,
		};
		let timed_out = matches!(event, Event::Timeout);

		let step = conversation.handle(event);
		send_replies(&outbound, &session_id, step.replies);

		if let Some(action) = step.action {
			let follow_up = execute(&config, &cancel, &outbound, &session_id, action).await;
			// Messages that piled up while the browser ran come first, so a
			// mid-run /cancel lands before the completion event.
			while let Ok(text) = inbox.try_recv() {
				let step = conversation.handle(Event::from_user_text(&text));
				send_replies(&outbound, &session_id, step.replies);
			}
			send_replies(&outbound, &session_id, apply_completion(&mut conversation, follow_up));
		}

		if conversation.is_terminal() || timed_out {
			break;
		}
	}
	debug!(target = "shamrock.worker", session = %session_id, "conversation ended");
}

/// Feeds a completion event into the conversation. A report the engine
/// marked cancelled means the user asked to stop while the run was in
/// flight; the cancel is applied first even if its text has not reached the
/// inbox yet, so the dialogue ends in the cancelled state either way.
fn apply_completion(conversation: &mut Conversation, follow_up: Event) -> Vec<String> {
	let mut replies = Vec::new();
	if let Event::ReservationFinished(report) = &follow_up {
		if report.cancelled && !conversation.is_terminal() {
			replies.extend(conversation.handle(Event::Cancel).replies);
		}
	}
	replies.extend(conversation.handle(follow_up).replies);
	replies
}

fn send_replies(outbound: &mpsc::UnboundedSender<Outbound>, session_id: &str, replies: Vec<String>) {
	for text in replies {
		let _ = outbound.send(Outbound {
			session_id: session_id.to_string(),
			text,
		});
	}
}

async fn execute(
	config: &BotConfig,
	cancel: &CancelToken,
	outbound: &mpsc::UnboundedSender<Outbound>,
	session_id: &str,
	action: Action,
) -> Event {
	match action {
		Action::Lookup { origin, destination, time } => {
			let now = Utc::now();
			let query = FlightQuery {
				origin,
				destination,
				departure: time.resolve(now),
			};
			match lookup_flight(config, &query).await {
				Ok((flight, seats)) => Event::LookupSucceeded { flight, seats },
				Err(err) => Event::LookupFailed(err),
			}
		}
		Action::Reserve { flight, chosen, .. } => reserve_flight(config, cancel, outbound, session_id, flight, chosen).await,
	}
}

async fn open_session(config: &BotConfig) -> Result<BrowserSession> {
	let mut session_config = config.session.clone();
	if let Some(pool) = &config.proxies {
		session_config.proxy = pool.next_address();
	}
	BrowserSession::open(&session_config).await
}

async fn close_quietly(session: BrowserSession) {
	if let Err(err) = session.close().await {
		warn!(target = "shamrock.worker", error = %err, "browser session close failed");
	}
}

async fn lookup_flight(config: &BotConfig, query: &FlightQuery) -> Result<(Flight, SeatMap)> {
	let session = open_session(config).await?;
	let lookup = FlightLookup::new(config.plan.clone());
	let result = lookup.find_flight(&session, query, Utc::now()).await;
	close_quietly(session).await;
	result
}

/// Walks a fresh session back to the seat map and runs the engine there. The
/// map is re-read so availability reflects the site now, not when the user
/// was shown the choices.
async fn reserve_flight(
	config: &BotConfig,
	cancel: &CancelToken,
	outbound: &mpsc::UnboundedSender<Outbound>,
	session_id: &str,
	flight: Flight,
	chosen: SeatId,
) -> Event {
	let session = match open_session(config).await {
		Ok(session) => session,
		Err(err) => return Event::ReservationFailed(err),
	};
	let lookup = FlightLookup::new(config.plan.clone());
	let query = FlightQuery {
		origin: flight.origin.clone(),
		destination: flight.destination.clone(),
		departure: flight.departure,
	};

	let event = match lookup.find_flight(&session, &query, Utc::now()).await {
		Err(err) => Event::ReservationFailed(err),
		Ok((_, seats)) if !seats.is_available(chosen) => Event::ReservationFailed(Error::site(
			"seat-choice",
			format!("seat {chosen} was taken while you were deciding"),
		)),
		Ok((_, seats)) => {
			let engine = ReservationEngine::new(config.plan.clone(), config.policy);
			let (tx, rx) = mpsc::unbounded_channel();
			let forwarder = tokio::spawn(forward_progress(rx, outbound.clone(), session_id.to_string()));
			let result = engine.reserve(&session, &flight, chosen, &seats, Some(&tx), cancel).await;
			drop(tx);
			let _ = forwarder.await;
			if cancel.is_cancelled() {
				engine.release(&session).await;
			}
			match result {
				Ok(report) => Event::ReservationFinished(report),
				Err(err) => Event::ReservationFailed(err),
			}
		}
	};
	close_quietly(session).await;
	event
}

async fn forward_progress(mut rx: mpsc::UnboundedReceiver<Progress>, outbound: mpsc::UnboundedSender<Outbound>, session_id: String) {
	while let Some(progress) = rx.recv().await {
		let seat = progress.outcome.seat;
		let text = match progress.outcome.result {
			SeatResult::Reserved => format!("Locked {seat} ({}/{})", progress.completed, progress.total),
			SeatResult::AlreadyTaken => format!("{seat} was already gone ({}/{})", progress.completed, progress.total),
			SeatResult::FailedAfterRetries => {
				format!("Couldn't hold {seat}, moving on ({}/{})", progress.completed, progress.total)
			}
			SeatResult::Skipped => continue,
		};
		let _ = outbound.send(Outbound {
			session_id: session_id.clone(),
			text,
		});
	}
}
