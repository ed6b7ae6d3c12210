//! Telegram bot HTTP client notifier.

use std::sync::Arc;

use anime_core::model::Message;
use anime_net::NetClient;
use async_trait::async_trait;

use crate::{NotifyError, Notifier};

const API_BASE: &str = "https://api.telegram.org";

/// Posts [`Message`]s to a Telegram chat via a bot token, using `sendPhoto` when a
/// poster is available and `sendMessage` otherwise.
pub struct TelegramNotifier {
    client: Arc<NetClient>,
    token: String,
    chat_id: String,
}

impl TelegramNotifier {
    /// Build a notifier for the given bot `token` and target `chat_id`.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::NotConfigured`] if either field is empty.
    pub fn new(client: Arc<NetClient>, token: String, chat_id: String) -> Result<Self, NotifyError> {
        if token.is_empty() {
            return Err(NotifyError::NotConfigured("notification.token"));
        }
        if chat_id.is_empty() {
            return Err(NotifyError::NotConfigured("notification.chat_id"));
        }
        Ok(Self {
            client,
            token,
            chat_id,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{API_BASE}/bot{}/{method}", self.token)
    }
}

fn caption_for(message: &Message) -> String {
    let mut caption = message.title.clone();
    if let (Some(season), Some(episode)) = (message.season, message.episode) {
        caption.push_str(&format!(" S{season:02}E{episode:02}"));
    }
    if !message.body.is_empty() {
        caption.push('\n');
        caption.push_str(&message.body);
    }
    caption
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn post(&self, message: &Message) -> Result<(), NotifyError> {
        let caption = caption_for(message);

        if let Some(bytes) = message.image_bytes.clone() {
            let url = self.method_url("sendPhoto");
            self.client
                .post_data(
                    &url,
                    &[("chat_id", self.chat_id.as_str()), ("caption", caption.as_str())],
                    &[("photo", "poster.jpg", bytes)],
                )
                .await?;
            return Ok(());
        }

        if let Some(poster_url) = &message.poster_url {
            let url = self.method_url("sendPhoto");
            self.client
                .post_data(
                    &url,
                    &[
                        ("chat_id", self.chat_id.as_str()),
                        ("caption", caption.as_str()),
                        ("photo", poster_url.as_str()),
                    ],
                    &[],
                )
                .await?;
            return Ok(());
        }

        let url = self.method_url("sendMessage");
        self.client
            .post_data(
                &url,
                &[("chat_id", self.chat_id.as_str()), ("text", caption.as_str())],
                &[],
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_token() {
        let client = Arc::new(NetClient::new(anime_net::NetClientConfig::default()).expect("client"));
        let err = TelegramNotifier::new(client, String::new(), "123".into()).unwrap_err();
        assert!(matches!(err, NotifyError::NotConfigured("notification.token")));
    }

    #[test]
    fn rejects_missing_chat_id() {
        let client = Arc::new(NetClient::new(anime_net::NetClientConfig::default()).expect("client"));
        let err = TelegramNotifier::new(client, "abc:def".into(), String::new()).unwrap_err();
        assert!(matches!(err, NotifyError::NotConfigured("notification.chat_id")));
    }

    #[test]
    fn caption_includes_season_and_episode() {
        let message = Message {
            title: "败犬女主太多了".into(),
            body: "already renamed".into(),
            season: Some(1),
            episode: Some(2),
            poster_url: None,
            image_bytes: None,
        };
        assert_eq!(caption_for(&message), "败犬女主太多了 S01E02\nalready renamed");
    }
}
