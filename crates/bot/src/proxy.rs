//! Rotating proxy support.
//!
//! The provider only accepts connections from IPs that were authorized
//! through its API first, so startup is: discover the public IP, swap the
//! stored authorization if it points elsewhere, then pull the proxy list.
//! Sessions draw addresses round-robin from the resulting [`ProxyPool`].

use std::sync::Mutex;

use anyhow::{Context, Result, bail};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use tracing::info;

const API_BASE: &str = "https://proxy.webshare.io/api/v2";

#[derive(Debug, Deserialize)]
struct IpAuthorization {
	id: u64,
	ip_address: String,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
	results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ProxyRecord {
	proxy_address: String,
	port: u16,
	valid: bool,
}

impl ProxyRecord {
	fn address(&self) -> String {
		format!("{}:{}", self.proxy_address, self.port)
	}
}

/// Provider API client. Short-lived: used once at startup to build the pool.
pub struct ProxyClient {
	http: reqwest::Client,
}

impl ProxyClient {
	pub fn new(token: &str) -> Result<Self> {
		let mut headers = HeaderMap::new();
		let value = HeaderValue::from_str(&format!("Token {token}")).context("proxy token is not a valid header value")?;
		headers.insert(AUTHORIZATION, value);
		let http = reqwest::Client::builder()
			.default_headers(headers)
			.build()
			.context("building proxy api client")?;
		Ok(Self { http })
	}

	/// Makes sure the current public IP is the one the provider authorizes,
	/// then fetches the proxy list and builds the pool.
	pub async fn build_pool(&self) -> Result<ProxyPool> {
		let ip = self.public_ip().await?;
		self.ensure_authorized(&ip).await?;
		let addresses = self.proxy_list().await?;
		if addresses.is_empty() {
			bail!("proxy provider returned no usable proxies");
		}
		info!(target = "shamrock.proxy", count = addresses.len(), "proxy pool ready");
		Ok(ProxyPool::new(addresses))
	}

	async fn public_ip(&self) -> Result<String> {
		#[derive(Deserialize)]
		struct WhatsMyIp {
			ip_address: String,
		}
		let response: WhatsMyIp = self
			.http
			.get(format!("{API_BASE}/proxy/ipauthorization/whatsmyip/"))
			.send()
			.await
			.context("querying public ip")?
			.error_for_status()?
			.json()
			.await?;
		info!(target = "shamrock.proxy", ip = %response.ip_address, "public ip discovered");
		Ok(response.ip_address)
	}

	async fn ensure_authorized(&self, ip: &str) -> Result<()> {
		let page: Page<IpAuthorization> = self
			.http
			.get(format!("{API_BASE}/proxy/ipauthorization/"))
			.send()
			.await
			.context("listing ip authorizations")?
			.error_for_status()?
			.json()
			.await?;

		if let Some(existing) = page.results.first() {
			if existing.ip_address == ip {
				info!(target = "shamrock.proxy", "current ip already authorized");
				return Ok(());
			}
			info!(target = "shamrock.proxy", stale = %existing.ip_address, "replacing stale ip authorization");
			self.http
				.delete(format!("{API_BASE}/proxy/ipauthorization/{}/", existing.id))
				.send()
				.await
				.context("deleting stale ip authorization")?
				.error_for_status()?;
		}

		self.http
			.post(format!("{API_BASE}/proxy/ipauthorization/"))
			.json(&serde_json::json!({ "ip_address": ip }))
			.send()
			.await
			.context("authorizing current ip")?
			.error_for_status()?;
		info!(target = "shamrock.proxy", %ip, "ip authorized");
		Ok(())
	}

	async fn proxy_list(&self) -> Result<Vec<String>> {
		let page: Page<ProxyRecord> = self
			.http
			.get(format!("{API_BASE}/proxy/list/?mode=direct&page=1&page_size=100"))
			.send()
			.await
			.context("fetching proxy list")?
			.error_for_status()?
			.json()
			.await?;
		Ok(page.results.iter().filter(|record| record.valid).map(ProxyRecord::address).collect())
	}
}

/// Round-robin pool of `host:port` proxy addresses, shared across sessions.
#[derive(Debug)]
pub struct ProxyPool {
	addresses: Vec<String>,
	next: Mutex<usize>,
}

impl ProxyPool {
	pub fn new(addresses: Vec<String>) -> Self {
		Self {
			addresses,
			next: Mutex::new(0),
		}
	}

	/// Next address in rotation. `None` only for an empty pool.
	pub fn next_address(&self) -> Option<String> {
		if self.addresses.is_empty() {
			return None;
		}
		let mut next = match self.next.lock() {
			Ok(guard) => guard,
			Err(poisoned) => poisoned.into_inner(),
		};
		let address = self.addresses[*next % self.addresses.len()].clone();
		*next = next.wrapping_add(1);
		Some(address)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn proxy_list_page_deserializes_and_filters() {
		let body = r#"{
			"count": 3,
			"results": [
				{"proxy_address": "10.0.0.1", "port": 8080, "valid": true, "country_code": "IE"},
				{"proxy_address": "10.0.0.2", "port": 8081, "valid": false},
				{"proxy_address": "10.0.0.3", "port": 8082, "valid": true}
			]
		}"#;
		let page: Page<ProxyRecord> = serde_json::from_str(body).unwrap();
		let addresses: Vec<String> = page.results.iter().filter(|r| r.valid).map(ProxyRecord::address).collect();
		assert_eq!(addresses, ["10.0.0.1:8080", "10.0.0.3:8082"]);
	}

	#[test]
	fn pool_rotates_and_wraps() {
		let pool = ProxyPool::new(vec!["a:1".into(), "b:2".into()]);
		assert_eq!(pool.next_address().as_deref(), Some("a:1"));
		assert_eq!(pool.next_address().as_deref(), Some("b:2"));
		assert_eq!(pool.next_address().as_deref(), Some("a:1"));
	}

	#[test]
	fn empty_pool_yields_nothing() {
		assert_eq!(ProxyPool::new(Vec::new()).next_address(), None);
	}
}
