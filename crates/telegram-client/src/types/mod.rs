//! Types for the Telegram Bot API.

mod send;
mod update;

pub use send::*;
pub use update::*;
