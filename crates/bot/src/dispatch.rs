//! Fans normalized chat events out to per-conversation workers.
//!
//! One tokio task per live conversation; the task's own inbox serializes
//! events within a session, so no per-session locking is needed. `/cancel`
//! is special-cased here: the token has to flip while the worker is busy
//! inside a reservation run, not when it next reads its inbox.

use std::collections::HashMap;
use std::sync::Arc;

use shamrock_automation::CancelToken;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::{BotConfig, worker};

/// Normalized inbound chat event.
#[derive(Debug, Clone)]
pub struct Inbound {
	pub session_id: String,
	pub text: String,
}

/// Reply to hand back to the chat platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
	pub session_id: String,
	pub text: String,
}

struct SessionEntry {
	tx: mpsc::UnboundedSender<String>,
	cancel: CancelToken,
	task: JoinHandle<()>,
}

pub struct Dispatcher {
	config: Arc<BotConfig>,
	outbound: mpsc::UnboundedSender<Outbound>,
	sessions: HashMap<String, SessionEntry>,
}

impl Dispatcher {
	pub fn new(config: Arc<BotConfig>, outbound: mpsc::UnboundedSender<Outbound>) -> Self {
		Self {
			config,
			outbound,
			sessions: HashMap::new(),
		}
	}

	/// Consumes inbound events until the channel closes, then waits for the
	/// remaining workers to wind down.
	pub async fn run(mut self, mut inbound: mpsc::UnboundedReceiver<Inbound>) {
		while let Some(message) = inbound.recv().await {
			self.deliver(message);
		}
		info!(target = "shamrock.dispatch", live = self.sessions.len(), "inbound closed; draining sessions");
		for (_, entry) in self.sessions.drain() {
			drop(entry.tx);
			let _ = entry.task.await;
		}
	}

	pub fn live_sessions(&self) -> usize {
		self.sessions.len()
	}

	fn deliver(&mut self, message: Inbound) {
		if message.text.trim() == "/cancel" {
			if let Some(entry) = self.sessions.get(&message.session_id) {
				debug!(target = "shamrock.dispatch", session = %message.session_id, "cancel requested");
				entry.cancel.cancel();
			}
		}

		// Finished workers mean conversations that reached a terminal state.
		// Sweep them all, not just this message's session, so the registry
		// does not accumulate one dead entry per past user.
		self.sessions.retain(|_, entry| !entry.task.is_finished());

		let config = Arc::clone(&self.config);
		let outbound = self.outbound.clone();
		let entry = self
			.sessions
			.entry(message.session_id.clone())
			.or_insert_with(|| spawn_session(&message.session_id, config, outbound));

		if entry.tx.send(message.text.clone()).is_err() {
			// Worker exited between the finished-check and the send.
			let fresh = spawn_session(&message.session_id, Arc::clone(&self.config), self.outbound.clone());
			let _ = fresh.tx.send(message.text);
			self.sessions.insert(message.session_id, fresh);
		}
	}
}

fn spawn_session(session_id: &str, config: Arc<BotConfig>, outbound: mpsc::UnboundedSender<Outbound>) -> SessionEntry {
	info!(target = "shamrock.dispatch", session = %session_id, "starting conversation");
	let cancel = CancelToken::new();
	let (tx, rx) = mpsc::unbounded_channel();
	let task = tokio::spawn(worker::run(session_id.to_string(), config, cancel.clone(), rx, outbound));
	SessionEntry { tx, cancel, task }
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use super::*;

	fn inbound(session_id: &str, text: &str) -> Inbound {
		Inbound {
			session_id: session_id.into(),
			text: text.into(),
		}
	}

	#[tokio::test]
	async fn finished_workers_are_swept_on_any_delivery() {
		let (outbound_tx, _outbound_rx) = mpsc::unbounded_channel();
		let mut dispatcher = Dispatcher::new(Arc::new(BotConfig::default()), outbound_tx);

		dispatcher.deliver(inbound("alice", "/reserve"));
		dispatcher.deliver(inbound("alice", "/cancel"));
		for _ in 0..500 {
			if dispatcher.sessions["alice"].task.is_finished() {
				break;
			}
			tokio::time::sleep(Duration::from_millis(10)).await;
		}
		assert!(dispatcher.sessions["alice"].task.is_finished(), "cancelled worker should exit");

		// A message from anyone reaps the dead entry, not just alice's next one.
		dispatcher.deliver(inbound("bob", "hello"));
		assert_eq!(dispatcher.live_sessions(), 1);
		assert!(dispatcher.sessions.contains_key("bob"));
	}
}
