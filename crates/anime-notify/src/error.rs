//! Error taxonomy for notification delivery.

use thiserror::Error;

/// Failure delivering a [`anime_core::model::Message`] through a [`crate::Notifier`].
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The sink's transport request failed.
    #[error("notification request failed")]
    Network(#[from] anime_core::CoreError),
    /// The sink is missing a required credential (bot token, device key, …).
    #[error("notifier is not configured: {0}")]
    NotConfigured(&'static str),
}
