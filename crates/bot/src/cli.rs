use std::time::Duration;

use clap::Parser;
use shamrock_automation::SessionConfig;
use shamrock_core::retry::RetryPolicy;
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "shamrock-bot")]
#[command(about = "Reserves every open seat on a flight except the one you want")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// WebDriver endpoint browser sessions connect to
	#[arg(long, default_value = "http://127.0.0.1:9515/")]
	pub webdriver_url: Url,

	/// Run the browser with a visible window
	#[arg(long)]
	pub headful: bool,

	/// Proxy provider API token; omit to connect directly
	#[arg(long, value_name = "TOKEN")]
	pub proxy_token: Option<String>,

	/// Attempts per seat before it is recorded as failed
	#[arg(long, default_value_t = 3)]
	pub retry_attempts: u32,

	/// Delay before the first retry (ms); doubles per attempt by default
	#[arg(long, default_value_t = 1000)]
	pub retry_initial_delay_ms: u64,

	/// Multiplier applied to the retry delay after each attempt
	#[arg(long, default_value_t = 2.0)]
	pub retry_backoff_factor: f64,

	/// Tear a conversation down after this much inactivity (seconds)
	#[arg(long, default_value_t = 300)]
	pub session_timeout_secs: u64,
}

impl Cli {
	pub fn retry_policy(&self) -> RetryPolicy {
		RetryPolicy {
			max_attempts: self.retry_attempts,
			initial_delay: Duration::from_millis(self.retry_initial_delay_ms),
			backoff_factor: self.retry_backoff_factor,
		}
	}

	pub fn session_config(&self) -> SessionConfig {
		SessionConfig {
			webdriver_url: self.webdriver_url.clone(),
			headless: !self.headful,
			..SessionConfig::default()
		}
	}

	pub fn session_timeout(&self) -> Duration {
		Duration::from_secs(self.session_timeout_secs)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_match_the_documented_knobs() {
		let cli = Cli::parse_from(["shamrock-bot"]);
		let policy = cli.retry_policy();
		assert_eq!(policy.max_attempts, 3);
		assert_eq!(policy.initial_delay, Duration::from_millis(1000));
		assert!(cli.session_config().headless);
		assert_eq!(cli.session_timeout(), Duration::from_secs(300));
	}

	#[test]
	fn headful_flips_the_session_config() {
		let cli = Cli::parse_from(["shamrock-bot", "--headful", "-vv"]);
		assert!(!cli.session_config().headless);
		assert_eq!(cli.verbose, 2);
	}
}
