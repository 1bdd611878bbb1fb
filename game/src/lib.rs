#![warn(rust_2018_idioms)]

//! Table model and presentation logic for a Lightning poker client.
//!
//! Nothing in here decides the game: bets are validated, rounds advanced and
//! pots split by the backend. This crate only describes the records the
//! backend publishes and derives what a viewer should see from them.

pub mod betting;
pub mod cipher;
pub mod countdown;
pub mod display;
pub mod model;
pub mod protocol;

/// The version of this client, reported when bootstrapping an account.
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");
