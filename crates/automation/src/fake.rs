//! Scriptable in-memory browser for unit and integration tests.
//!
//! The pair returned by [`FakeBrowser::with_controller`] mirrors the usual
//! trait-plus-controller setup: the browser half goes wherever a
//! [`Browser`] is expected, while the controller seeds elements, injects
//! failures, and inspects what the code under test did.
//!
//! ```ignore
//! let (browser, ctl) = FakeBrowser::with_controller();
//! ctl.set_elements(".seatmap__seat", vec![seat("seat-01A", "seatmap__seat")]);
//! ctl.on_click("el-seat-01A", ClickBehavior::AppendClass("selected".into()));
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use shamrock_core::{Error, Result};

use crate::browser::{Browser, Element};

/// How a scripted element reacts to clicks.
#[derive(Debug, Clone)]
pub enum ClickBehavior {
	/// Click succeeds, nothing changes.
	Accept,
	/// Click succeeds and appends a class to the element, e.g. `selected`.
	AppendClass(String),
	/// Fail `remaining` times with a site error, then optionally append a
	/// class on the first success.
	FailTimes { remaining: u32, then_append: Option<String> },
}

#[derive(Debug, Default)]
struct FakeState {
	elements: HashMap<String, Vec<Element>>,
	behaviors: HashMap<String, ClickBehavior>,
	clicked: Vec<String>,
	filled: Vec<(String, String)>,
	navigations: Vec<String>,
	find_failures: HashMap<String, u32>,
}

impl FakeState {
	fn append_class(&mut self, handle: &str, class: &str) {
		for bucket in self.elements.values_mut() {
			for element in bucket.iter_mut().filter(|e| e.handle == handle) {
				element.classes.push(' ');
				element.classes.push_str(class);
			}
		}
	}
}

/// In-memory [`Browser`] implementation.
#[derive(Debug, Clone, Default)]
pub struct FakeBrowser {
	state: Arc<Mutex<FakeState>>,
}

/// Test-side handle for seeding and inspecting a [`FakeBrowser`].
#[derive(Debug, Clone)]
pub struct FakeController {
	state: Arc<Mutex<FakeState>>,
}

impl FakeBrowser {
	pub fn with_controller() -> (Self, FakeController) {
		let state = Arc::new(Mutex::new(FakeState::default()));
		(
			Self { state: Arc::clone(&state) },
			FakeController { state },
		)
	}
}

impl FakeController {
	/// Seeds the elements returned for `selector`.
	pub fn set_elements(&self, selector: &str, elements: Vec<Element>) {
		self.state.lock().unwrap().elements.insert(selector.to_string(), elements);
	}

	pub fn set_element(&self, selector: &str, element: Element) {
		self.set_elements(selector, vec![element]);
	}

	/// Removes a selector's elements, simulating them leaving the page.
	pub fn remove(&self, selector: &str) {
		self.state.lock().unwrap().elements.remove(selector);
	}

	pub fn on_click(&self, handle: &str, behavior: ClickBehavior) {
		self.state.lock().unwrap().behaviors.insert(handle.to_string(), behavior);
	}

	/// Makes the next `times` finds of `selector` fail with a site error.
	pub fn fail_find(&self, selector: &str, times: u32) {
		self.state.lock().unwrap().find_failures.insert(selector.to_string(), times);
	}

	pub fn clicked(&self) -> Vec<String> {
		self.state.lock().unwrap().clicked.clone()
	}

	pub fn filled(&self) -> Vec<(String, String)> {
		self.state.lock().unwrap().filled.clone()
	}

	pub fn navigations(&self) -> Vec<String> {
		self.state.lock().unwrap().navigations.clone()
	}
}

#[async_trait]
impl Browser for FakeBrowser {
	async fn goto(&self, url: &str) -> Result<()> {
		self.state.lock().unwrap().navigations.push(url.to_string());
		Ok(())
	}

	async fn find(&self, selector: &str) -> Result<Option<Element>> {
		let mut state = self.state.lock().unwrap();
		if let Some(remaining) = state.find_failures.get_mut(selector) {
			if *remaining > 0 {
				*remaining -= 1;
				return Err(Error::site("find", format!("injected failure for {selector}")));
			}
		}
		Ok(state.elements.get(selector).and_then(|bucket| bucket.first().cloned()))
	}

	async fn find_all(&self, selector: &str) -> Result<Vec<Element>> {
		let mut state = self.state.lock().unwrap();
		if let Some(remaining) = state.find_failures.get_mut(selector) {
			if *remaining > 0 {
				*remaining -= 1;
				return Err(Error::site("find", format!("injected failure for {selector}")));
			}
		}
		Ok(state.elements.get(selector).cloned().unwrap_or_default())
	}

	async fn click(&self, element: &Element) -> Result<()> {
		let mut state = self.state.lock().unwrap();
		state.clicked.push(element.handle.clone());
		let append = match state.behaviors.get_mut(&element.handle) {
			None | Some(ClickBehavior::Accept) => None,
			Some(ClickBehavior::AppendClass(class)) => Some(class.clone()),
			Some(ClickBehavior::FailTimes { remaining, then_append }) => {
				if *remaining > 0 {
					*remaining -= 1;
					return Err(Error::site("click", format!("injected failure for {}", element.handle)));
				}
				then_append.take()
			}
		};
		if let Some(class) = append {
			state.append_class(&element.handle, &class);
		}
		Ok(())
	}

	async fn fill(&self, element: &Element, text: &str) -> Result<()> {
		self.state
			.lock()
			.unwrap()
			.filled
			.push((element.handle.clone(), text.to_string()));
		Ok(())
	}
}

/// Builds a seat element the way the site renders one.
pub fn seat(id: &str, classes: &str) -> Element {
	Element {
		handle: format!("el-{id}"),
		id: Some(id.to_string()),
		classes: classes.to_string(),
		text: String::new(),
	}
}

/// Builds a plain element with a handle and text.
pub fn labeled(handle: &str, text: &str) -> Element {
	Element {
		handle: handle.to_string(),
		id: None,
		classes: String::new(),
		text: text.to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn click_behaviors_mutate_shared_elements() {
		let (browser, ctl) = FakeBrowser::with_controller();
		let element = seat("seat-01A", "seatmap__seat");
		ctl.set_element("#seat-01A", element.clone());
		ctl.set_elements(".seatmap__seat", vec![element.clone()]);
		ctl.on_click("el-seat-01A", ClickBehavior::AppendClass("selected".into()));

		browser.click(&element).await.unwrap();

		let updated = browser.find("#seat-01A").await.unwrap().unwrap();
		assert!(updated.class_contains("selected"));
		let group = browser.find_all(".seatmap__seat").await.unwrap();
		assert!(group[0].class_contains("selected"));
	}

	#[tokio::test]
	async fn injected_click_failures_run_out() {
		let (browser, ctl) = FakeBrowser::with_controller();
		let element = seat("seat-01A", "seatmap__seat");
		ctl.set_element("#seat-01A", element.clone());
		ctl.on_click(
			"el-seat-01A",
			ClickBehavior::FailTimes {
				remaining: 2,
				then_append: Some("selected".into()),
			},
		);

		assert!(browser.click(&element).await.is_err());
		assert!(browser.click(&element).await.is_err());
		browser.click(&element).await.unwrap();
		let updated = browser.find("#seat-01A").await.unwrap().unwrap();
		assert!(updated.class_contains("selected"));
	}

	#[tokio::test]
	async fn find_failures_are_bounded() {
		let (browser, ctl) = FakeBrowser::with_controller();
		ctl.set_element("h1", labeled("h1", "Seats"));
		ctl.fail_find("h1", 1);
		assert!(browser.find("h1").await.is_err());
		assert_eq!(browser.find("h1").await.unwrap().unwrap().text, "Seats");
	}
}
