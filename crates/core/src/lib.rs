//! Pure domain layer for the Shamrock Seats bot.
//!
//! Everything in this crate is side-effect free: input validation, the seat
//! map model, the retry policy, and the conversation state machine. Browser
//! automation and chat transport live in the sibling crates and consume
//! these types.

pub mod conversation;
pub mod error;
pub mod retry;
pub mod seatmap;
pub mod types;

pub use error::{Error, Result};
