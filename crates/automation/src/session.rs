//! Browser session lifecycle: open with hardened launch options, close on
//! every exit path. The per-conversation worker owns the session and closes
//! it whether the flow succeeds, fails, or is cancelled.

use async_trait::async_trait;
use serde_json::{Value, json};
use shamrock_core::Result;
use tracing::{debug, warn};
use url::Url;

use crate::browser::{Browser, Element};
use crate::webdriver::WireClient;

/// Everything needed to start one browser session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
	/// WebDriver endpoint, e.g. a local chromedriver or a remote grid.
	pub webdriver_url: Url,
	pub headless: bool,
	/// `host:port` of an HTTP proxy to route the session through.
	pub proxy: Option<String>,
	pub window: (u32, u32),
}

impl Default for SessionConfig {
	fn default() -> Self {
		Self {
			webdriver_url: Url::parse("http://127.0.0.1:9515/").expect("static url"),
			headless: true,
			proxy: None,
			window: (1280, 1280),
		}
	}
}

impl SessionConfig {
	/// Chromium capabilities matching the site's tolerance for automation:
	/// no images, no automation banner, masked webdriver flag (applied
	/// post-launch), optional proxy.
	fn capabilities(&self) -> Value {
		let mut args = vec![
			"--incognito".to_string(),
			"--no-sandbox".to_string(),
			"--disable-dev-shm-usage".to_string(),
			"--disable-gpu".to_string(),
			"--disable-blink-features=AutomationControlled".to_string(),
			"--blink-settings=imagesEnabled=false".to_string(),
		];
		if self.headless {
			args.push("--headless=new".to_string());
		}
		if let Some(proxy) = &self.proxy {
			args.push(format!("--proxy-server=http://{proxy}"));
		}
		json!({
			"browserName": "chrome",
			"goog:chromeOptions": {
				"args": args,
				"excludeSwitches": ["enable-automation"],
				"prefs": { "profile.managed_default_content_settings.images": 2 },
			},
		})
	}
}

/// A live browser session implementing [`Browser`] over the WebDriver wire.
pub struct BrowserSession {
	wire: WireClient,
}

impl BrowserSession {
	/// Starts a session, pins the window size, and masks the
	/// `navigator.webdriver` flag.
	pub async fn open(config: &SessionConfig) -> Result<Self> {
		debug!(target = "shamrock.session", endpoint = %config.webdriver_url, headless = config.headless, proxy = ?config.proxy, "opening browser session");
		let wire = WireClient::new_session(&config.webdriver_url, config.capabilities()).await?;

		let (width, height) = config.window;
		wire.set_window_rect(width, height).await?;
		if let Err(err) = wire
			.execute("Object.defineProperty(navigator, 'webdriver', {get: () => undefined})")
			.await
		{
			warn!(target = "shamrock.session", error = %err, "webdriver masking failed");
		}

		Ok(Self { wire })
	}

	/// Releases the remote session.
	pub async fn close(self) -> Result<()> {
		debug!(target = "shamrock.session", "closing browser session");
		self.wire.delete_session().await
	}

	async fn snapshot(&self, handle: String) -> Result<Element> {
		let id = self.wire.attr(&handle, "id").await?;
		let classes = self.wire.attr(&handle, "class").await?.unwrap_or_default();
		let text = self.wire.text(&handle).await?;
		Ok(Element { handle, id, classes, text })
	}
}

#[async_trait]
impl Browser for BrowserSession {
	async fn goto(&self, url: &str) -> Result<()> {
		self.wire.goto(url).await
	}

	async fn find(&self, selector: &str) -> Result<Option<Element>> {
		match self.wire.find(selector).await? {
			Some(handle) => Ok(Some(self.snapshot(handle).await?)),
			None => Ok(None),
		}
	}

	async fn find_all(&self, selector: &str) -> Result<Vec<Element>> {
		let handles = self.wire.find_all(selector).await?;
		let mut elements = Vec::with_capacity(handles.len());
		for handle in handles {
			elements.push(self.snapshot(handle).await?);
		}
		Ok(elements)
	}

	async fn click(&self, element: &Element) -> Result<()> {
		self.wire.click(&element.handle).await
	}

	async fn fill(&self, element: &Element, text: &str) -> Result<()> {
		self.wire.send_keys(&element.handle, text).await
	}
}
