//! Album aggregation, key resolution and timed publishing.
//!
//! Media arriving as separate messages is buffered per upload burst and
//! stored as an album (or a collection of albums when the burst exceeds
//! ten items) under a short shareable key. A key can later be published
//! into the destination chat, subject to access mode, an optional
//! subscription gate and duplicate suppression. Published messages are
//! deleted after the configured delay.
//!
//! The crate talks to the outside world through two seams:
//!
//! - [`Transport`] - sends, deletes, forwards and checks channel membership
//! - [`Repository`] - stores settings, allow-lists, albums and publications
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use album_core::{AlbumPipeline, CoreConfig, MemoryRepository, MockTransport};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = Arc::new(MockTransport::new());
//!     let (pipeline, _events) = AlbumPipeline::new(
//!         Arc::new(MemoryRepository::new()),
//!         transport.clone(),
//!         CoreConfig::new(-1001234567890),
//!     );
//!     let sweeper = pipeline.start().await?;
//!
//!     let result = pipeline.publish_by_key(42, "unknown-key").await;
//!     assert!(result.is_err());
//!     sweeper.abort();
//!     Ok(())
//! }
//! ```

mod access;
mod aggregator;
pub mod config;
mod deletion;
mod error;
pub mod key;
mod mock;
mod pipeline;
mod publisher;
mod recent;
mod repository;
mod settings;
mod sqlite;
mod store;
mod transport;
mod types;

pub use access::{AccessController, AccessDecision};
pub use aggregator::{FinalizedUpload, MediaAggregator, UploadEvent, UploadFailed};
pub use config::CoreConfig;
pub use deletion::DeletionScheduler;
pub use error::{CoreError, PublishError, RepositoryError, TransportError};
pub use key::generate_key;
pub use mock::{MockTransport, SentPost};
pub use pipeline::AlbumPipeline;
pub use publisher::{PublishCoordinator, PublishReceipt};
pub use recent::{Claim, RecentEntry, RecentPublishCache};
pub use repository::{MemoryRepository, Repository};
pub use settings::SettingsStore;
pub use sqlite::SqliteRepository;
pub use store::AlbumStore;
pub use transport::Transport;
pub use types::*;

// Re-export async_trait for Transport and Repository implementors
pub use async_trait::async_trait;
