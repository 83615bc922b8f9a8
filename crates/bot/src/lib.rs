//! Bot runtime: dispatches normalized chat events onto per-conversation
//! worker tasks. The chat platform itself stays outside this crate; anything
//! that can produce `(session id, text)` pairs and consume reply events can
//! drive the [`dispatch::Dispatcher`].

use std::time::Duration;

use shamrock_automation::{SessionConfig, SitePlan};
use shamrock_core::retry::RetryPolicy;

pub mod cli;
pub mod dispatch;
pub mod logging;
pub mod proxy;
pub mod worker;

/// Shared, read-only runtime configuration. One per process, handed to every
/// session worker behind an `Arc`.
#[derive(Debug)]
pub struct BotConfig {
	pub session: SessionConfig,
	pub plan: SitePlan,
	pub policy: RetryPolicy,
	/// Inactivity limit before a conversation is torn down.
	pub session_timeout: Duration,
	/// Rotating proxy addresses; `None` connects directly.
	pub proxies: Option<proxy::ProxyPool>,
}

impl Default for BotConfig {
	fn default() -> Self {
		Self {
			session: SessionConfig::default(),
			plan: SitePlan::default(),
			policy: RetryPolicy::default(),
			session_timeout: Duration::from_secs(300),
			proxies: None,
		}
	}
}
