//! Thin WebDriver wire client.
//!
//! Covers exactly the handful of endpoints the seat flow needs: session
//! lifecycle, navigation, element lookup, click, keys, and script
//! execution. Errors carry the failing step so they surface as precise
//! `SiteInteraction` messages upstream.

use serde::Deserialize;
use serde_json::{Value, json};
use shamrock_core::{Error, Result};
use tracing::debug;
use url::Url;

const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

#[derive(Debug, Deserialize)]
struct WireValue<T> {
	value: T,
}

#[derive(Debug, Deserialize)]
struct NewSessionValue {
	#[serde(rename = "sessionId")]
	session_id: String,
}

#[derive(Debug, Deserialize)]
struct WireError {
	error: String,
	message: String,
}

pub(crate) struct WireClient {
	http: reqwest::Client,
	session_url: Url,
}

impl WireClient {
	/// Creates a remote session against `endpoint` with the given
	/// `alwaysMatch` capabilities.
	pub(crate) async fn new_session(endpoint: &Url, capabilities: Value) -> Result<Self> {
		let http = reqwest::Client::new();
		let url = endpoint
			.join("session")
			.map_err(|e| Error::SessionInit(e.to_string()))?;
		let body = json!({ "capabilities": { "alwaysMatch": capabilities } });

		let response = http
			.post(url)
			.json(&body)
			.send()
			.await
			.map_err(|e| Error::SessionInit(format!("webdriver unreachable: {e}")))?;
		if !response.status().is_success() {
			let status = response.status();
			let detail = response.text().await.unwrap_or_default();
			return Err(Error::SessionInit(format!("driver refused session ({status}): {detail}")));
		}

		let parsed: WireValue<NewSessionValue> = response
			.json()
			.await
			.map_err(|e| Error::SessionInit(format!("bad new-session response: {e}")))?;
		let session_url = endpoint
			.join(&format!("session/{}/", parsed.value.session_id))
			.map_err(|e| Error::SessionInit(e.to_string()))?;
		debug!(target = "shamrock.webdriver", session = %parsed.value.session_id, "session created");

		Ok(Self { http, session_url })
	}

	pub(crate) async fn goto(&self, url: &str) -> Result<()> {
		self.post("url", json!({ "url": url }), "navigate").await.map(|_| ())
	}

	/// Returns the element handle, or `None` on `no such element`.
	pub(crate) async fn find(&self, selector: &str) -> Result<Option<String>> {
		let body = json!({ "using": "css selector", "value": selector });
		match self.post("element", body, "find").await {
			Ok(value) => Ok(element_handle(&value)),
			Err(Error::SiteInteraction { message, .. }) if message.contains("no such element") => Ok(None),
			Err(err) => Err(err),
		}
	}

	pub(crate) async fn find_all(&self, selector: &str) -> Result<Vec<String>> {
		let body = json!({ "using": "css selector", "value": selector });
		let value = self.post("elements", body, "find").await?;
		let handles = value
			.as_array()
			.map(|items| items.iter().filter_map(element_handle).collect())
			.unwrap_or_default();
		Ok(handles)
	}

	pub(crate) async fn click(&self, handle: &str) -> Result<()> {
		self.post(&format!("element/{handle}/click"), json!({}), "click").await.map(|_| ())
	}

	pub(crate) async fn send_keys(&self, handle: &str, text: &str) -> Result<()> {
		let body = json!({ "text": text });
		self.post(&format!("element/{handle}/value"), body, "fill").await.map(|_| ())
	}

	pub(crate) async fn text(&self, handle: &str) -> Result<String> {
		let value = self.get(&format!("element/{handle}/text"), "read-text").await?;
		Ok(value.as_str().unwrap_or_default().to_string())
	}

	pub(crate) async fn attr(&self, handle: &str, name: &str) -> Result<Option<String>> {
		let value = self.get(&format!("element/{handle}/attribute/{name}"), "read-attribute").await?;
		Ok(value.as_str().map(str::to_string))
	}

	pub(crate) async fn execute(&self, script: &str) -> Result<Value> {
		let body = json!({ "script": script, "args": [] });
		self.post("execute/sync", body, "execute-script").await
	}

	pub(crate) async fn set_window_rect(&self, width: u32, height: u32) -> Result<()> {
		let body = json!({ "width": width, "height": height });
		self.post("window/rect", body, "window-rect").await.map(|_| ())
	}

	pub(crate) async fn delete_session(self) -> Result<()> {
		self.http
			.delete(self.session_url.clone())
			.send()
			.await
			.map_err(|e| Error::site("close", e.to_string()))?;
		Ok(())
	}

	async fn post(&self, path: &str, body: Value, step: &str) -> Result<Value> {
		let url = self
			.session_url
			.join(path)
			.map_err(|e| Error::site(step, e.to_string()))?;
		let response = self
			.http
			.post(url)
			.json(&body)
			.send()
			.await
			.map_err(|e| Error::site(step, e.to_string()))?;
		Self::unwrap_value(response, step).await
	}

	async fn get(&self, path: &str, step: &str) -> Result<Value> {
		let url = self
			.session_url
			.join(path)
			.map_err(|e| Error::site(step, e.to_string()))?;
		let response = self
			.http
			.get(url)
			.send()
			.await
			.map_err(|e| Error::site(step, e.to_string()))?;
		Self::unwrap_value(response, step).await
	}

	async fn unwrap_value(response: reqwest::Response, step: &str) -> Result<Value> {
		let status = response.status();
		let body: Value = response
			.json()
			.await
			.map_err(|e| Error::site(step, format!("bad wire response: {e}")))?;
		if status.is_success() {
			return Ok(body.get("value").cloned().unwrap_or(Value::Null));
		}
		match serde_json::from_value::<WireValue<WireError>>(body) {
			Ok(wire) => Err(Error::site(step, format!("{}: {}", wire.value.error, wire.value.message))),
			Err(_) => Err(Error::site(step, format!("driver returned {status}"))),
		}
	}
}

fn element_handle(value: &Value) -> Option<String> {
	value.get(ELEMENT_KEY).and_then(Value::as_str).map(str::to_string)
}
