//! # Background Handlers
//!
//! - `recovery`: periodic sweep that drives incomplete score intents
//! - `notifications`: idempotent event consumer

pub mod notifications;
pub mod recovery;

pub use notifications::{LogSink, NotificationConsumer, NotificationSink};
pub use recovery::RecoverySweeper;
