//! Abstract browser capability used by lookup and reservation.
//!
//! Deliberately small: navigate, find, click, fill. Everything the flow
//! needs from an element (id, classes, text) is captured at find time so
//! callers never hold backend handles beyond the opaque string.

use std::time::Duration;

use async_trait::async_trait;
use shamrock_core::{Error, Result};

/// Snapshot of one matched element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
	/// Backend-specific handle, opaque to callers.
	pub handle: String,
	/// The element's `id` attribute, when present.
	pub id: Option<String>,
	/// The element's full `class` attribute.
	pub classes: String,
	/// Visible text content.
	pub text: String,
}

impl Element {
	/// Substring match on the class attribute, the way the site flags
	/// seat states (`class*='unavailable'`).
	pub fn class_contains(&self, marker: &str) -> bool {
		!marker.is_empty() && self.classes.contains(marker)
	}
}

/// Minimal automation surface the airline flow is written against.
#[async_trait]
pub trait Browser: Send + Sync {
	async fn goto(&self, url: &str) -> Result<()>;
	/// First element matching `selector`, or `None`.
	async fn find(&self, selector: &str) -> Result<Option<Element>>;
	/// All elements matching `selector`, in document order.
	async fn find_all(&self, selector: &str) -> Result<Vec<Element>>;
	async fn click(&self, element: &Element) -> Result<()>;
	async fn fill(&self, element: &Element, text: &str) -> Result<()>;
}

/// Polls for `selector` until it appears or `timeout` elapses.
pub async fn wait_for(browser: &dyn Browser, selector: &str, timeout: Duration, poll: Duration) -> Result<Element> {
	let deadline = tokio::time::Instant::now() + timeout;
	loop {
		if let Some(element) = browser.find(selector).await? {
			return Ok(element);
		}
		if tokio::time::Instant::now() >= deadline {
			return Err(Error::site("wait", format!("{selector} did not appear within {timeout:?}")));
		}
		tokio::time::sleep(poll).await;
	}
}

/// Finds and clicks the first match, failing with a step-tagged error.
pub async fn click_first(browser: &dyn Browser, step: &str, selector: &str) -> Result<()> {
	let element = browser
		.find(selector)
		.await?
		.ok_or_else(|| Error::site(step, format!("{selector} not found")))?;
	browser.click(&element).await
}

/// Best-effort click for steps that are allowed to fail, like cookie banners.
pub async fn try_click(browser: &dyn Browser, selector: &str) -> bool {
	match browser.find(selector).await {
		Ok(Some(element)) => browser.click(&element).await.is_ok(),
		_ => false,
	}
}
