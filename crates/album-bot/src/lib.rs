//! Telegram front end for the album relay.
//!
//! Admins send media bursts to the bot in a private chat; each burst is
//! stored under a short key. Anyone holding the key (or its deep link) can
//! have the album posted into the configured group, subject to the access
//! rules kept by [`album_core`].

pub mod commands;
pub mod config;
pub mod handler;
pub mod inbound;
pub mod replies;
pub mod routing;
pub mod transport;

pub use config::{Config, ConfigError};
pub use handler::{run_upload_notifier, BotHandler};
pub use routing::{route_message, Route};
pub use transport::TelegramTransport;
