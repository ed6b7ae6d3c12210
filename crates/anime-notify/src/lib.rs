#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Notification sinks: a single abstract `post(message)` contract with a
//! Telegram bot implementation and a Bark implementation, selected by the
//! `notification.type` config field.

mod bark;
mod error;
mod telegram;

pub use bark::BarkNotifier;
pub use error::NotifyError;
pub use telegram::TelegramNotifier;

use anime_core::model::Message;
use async_trait::async_trait;

/// Abstract notification sink. One implementation ships per supported `notification.type`.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `message`. Implementations should treat delivery failure as non-fatal to
    /// the caller's pipeline — callers log and move on rather than retry indefinitely.
    async fn post(&self, message: &Message) -> Result<(), NotifyError>;
}
