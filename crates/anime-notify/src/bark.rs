//! Bark push-notification client (a simple GET-based webhook service).

use std::sync::Arc;

use anime_core::model::Message;
use anime_net::NetClient;
use async_trait::async_trait;

use crate::{NotifyError, Notifier};

const DEFAULT_SERVER: &str = "https://api.day.app";

/// Posts [`Message`]s to a Bark device key via the hosted (or self-hosted) Bark server.
pub struct BarkNotifier {
    client: Arc<NetClient>,
    server: String,
    device_key: String,
}

impl BarkNotifier {
    /// Build a notifier for `device_key`, optionally against a self-hosted `server`
    /// (defaults to the hosted `api.day.app`).
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::NotConfigured`] if `device_key` is empty.
    pub fn new(
        client: Arc<NetClient>,
        device_key: String,
        server: Option<String>,
    ) -> Result<Self, NotifyError> {
        if device_key.is_empty() {
            return Err(NotifyError::NotConfigured("notification.token"));
        }
        Ok(Self {
            client,
            server: server.unwrap_or_else(|| DEFAULT_SERVER.to_string()),
            device_key,
        })
    }

    fn push_url(&self, title: &str, body: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.server.trim_end_matches('/'),
            self.device_key,
            urlencoding::encode(title),
            urlencoding::encode(body),
        )
    }
}

#[async_trait]
impl Notifier for BarkNotifier {
    async fn post(&self, message: &Message) -> Result<(), NotifyError> {
        let url = self.push_url(&message.title, &message.body);
        self.client.get(&url).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_device_key() {
        let client = Arc::new(NetClient::new(anime_net::NetClientConfig::default()).expect("client"));
        let err = BarkNotifier::new(client, String::new(), None).unwrap_err();
        assert!(matches!(err, NotifyError::NotConfigured("notification.token")));
    }

    #[test]
    fn push_url_percent_encodes_and_defaults_server() {
        let client = Arc::new(NetClient::new(anime_net::NetClientConfig::default()).expect("client"));
        let notifier = BarkNotifier::new(client, "devkey".into(), None).expect("notifier");
        let url = notifier.push_url("标题", "a b");
        assert!(url.starts_with("https://api.day.app/devkey/"));
        assert!(url.contains("a%20b"));
    }

    #[test]
    fn push_url_honors_custom_server() {
        let client = Arc::new(NetClient::new(anime_net::NetClientConfig::default()).expect("client"));
        let notifier = BarkNotifier::new(client, "devkey".into(), Some("https://bark.example.com/".into()))
            .expect("notifier");
        let url = notifier.push_url("t", "b");
        assert_eq!(url, "https://bark.example.com/devkey/t/b");
    }
}
