//! Telegram Bot API client library.
//!
//! This crate provides a Rust client for the Telegram Bot API over HTTPS.
//! It supports:
//!
//! - Sending text, single media, and grouped media posts
//! - Receiving updates via long polling
//! - Deleting and forwarding messages, answering callback queries
//! - Looking up channel membership
//!
//! # Example
//!
//! ```no_run
//! use telegram_client::{BotConfig, PollingConfig, TelegramClient};
//!
//! # async fn example() -> Result<(), telegram_client::BotApiError> {
//! // Connect and verify the token
//! let config = BotConfig::new("123456:ABC-DEF");
//! let client = TelegramClient::connect(config).await?;
//!
//! // Send a message
//! let sent = client.send_text(-1001234567890, "Hello!").await?;
//! println!("Sent message {}", sent.message_id);
//!
//! // Receive updates
//! use futures::StreamExt;
//! let mut updates = telegram_client::subscribe(&client, PollingConfig::default());
//! while let Some(result) = updates.next().await {
//!     match result {
//!         Ok(update) => {
//!             if let Some(msg) = update.message {
//!                 println!("From {:?}: {:?}", msg.sender_id(), msg.text);
//!             }
//!         }
//!         Err(e) => eprintln!("Error: {}", e),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod polling;
pub mod types;

pub use client::TelegramClient;
pub use config::{start_link, BotConfig, DEFAULT_API_URL};
pub use error::{BotApiError, PartialPost};
pub use polling::{subscribe, PollingConfig, ReconnectConfig, UpdateStream};
pub use types::*;

/// Crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
