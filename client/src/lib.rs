#![warn(rust_2018_idioms)]

//! Everything that talks to the poker backend: the action endpoint, the
//! chat bot's deposit and presence endpoints, and live table data from the
//! document database.

pub mod actions;
pub mod identity;
pub mod live;
pub mod notify;
pub mod presence;
pub mod route;
pub mod session;
pub mod settings;
pub mod storage;
pub mod ticker;
