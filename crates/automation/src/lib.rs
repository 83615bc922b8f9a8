//! Browser automation layer for the Shamrock Seats bot.
//!
//! The airline site is only ever touched through the [`browser::Browser`]
//! capability trait, so the lookup service and reservation engine can be
//! exercised against [`fake::FakeBrowser`] without a driver. The real
//! implementation, [`session::BrowserSession`], speaks the WebDriver wire
//! protocol over HTTP.

pub mod browser;
pub mod cancel;
pub mod fake;
pub mod lookup;
pub mod reserve;
pub mod session;
mod webdriver;

pub use browser::{Browser, Element};
pub use cancel::CancelToken;
pub use lookup::{FlightLookup, SitePlan};
pub use reserve::{Progress, ReservationEngine};
pub use session::{BrowserSession, SessionConfig};
