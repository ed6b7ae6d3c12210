//! RSS 2.0 decoding and the `GetTorrents` normalization pass.

use anime_core::CoreError;
use serde::Deserialize;

/// A parsed `channel` element.
#[derive(Debug, Clone, Deserialize)]
pub struct RssChannel {
    /// Feed title.
    pub title: Option<String>,
    /// Feed link.
    pub link: Option<String>,
    /// Feed items.
    #[serde(rename = "item", default)]
    pub items: Vec<RssItem>,
}

/// A parsed `item` element.
#[derive(Debug, Clone, Deserialize)]
pub struct RssItem {
    /// Item title.
    pub title: Option<String>,
    /// Item link (the tracker detail page, typically).
    pub link: Option<String>,
    /// Optional enclosure, carrying the actual payload URL.
    pub enclosure: Option<RssEnclosure>,
}

/// The `enclosure` element's `url` attribute.
#[derive(Debug, Clone, Deserialize)]
pub struct RssEnclosure {
    /// Payload URL.
    #[serde(rename = "@url")]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RssDocument {
    channel: RssChannel,
}

/// A torrent item after `GetTorrents` normalization: the link/enclosure pair has been
/// rewritten into a canonical `(url, homepage)` split and the title has been cleaned up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorrentListItem {
    /// Normalized display name.
    pub name: String,
    /// Canonical URL: the enclosure URL when present, else the raw item link.
    pub url: String,
    /// Tracker homepage URL: the raw item link when an enclosure was present, else blank.
    pub homepage: String,
}

/// Parse an RSS 2.0 document into its `channel`.
///
/// # Errors
///
/// Returns [`CoreError::Parse`] when the document is not well-formed RSS.
pub fn parse_rss(bytes: &[u8]) -> Result<RssChannel, CoreError> {
    quick_xml::de::from_reader::<_, RssDocument>(bytes)
        .map(|doc| doc.channel)
        .map_err(|source| CoreError::parse_with("rss", source))
}

/// Strip newlines, convert full-width `【】` to ASCII `[]`, and trim whitespace.
#[must_use]
pub fn normalize_title(raw: &str) -> String {
    raw.replace(['\n', '\r'], "")
        .replace('【', "[")
        .replace('】', "]")
        .trim()
        .to_string()
}

/// Apply the `GetTorrents` link/enclosure rewrite and title normalization to a channel.
#[must_use]
pub fn extract_torrents(channel: &RssChannel) -> Vec<TorrentListItem> {
    channel
        .items
        .iter()
        .filter_map(|item| {
            let raw_title = item.title.as_deref()?;
            let name = normalize_title(raw_title);
            let link = item.link.clone().unwrap_or_default();
            let enclosure_url = item
                .enclosure
                .as_ref()
                .and_then(|enclosure| enclosure.url.clone())
                .filter(|url| !url.is_empty());
            let (url, homepage) = match enclosure_url {
                Some(enclosure_url) => (enclosure_url, link),
                None => (link, String::new()),
            };
            if url.is_empty() {
                return None;
            }
            Some(TorrentListItem { name, url, homepage })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Mikan Project - 我的订阅</title>
    <link>https://mikanani.me/</link>
    <item>
      <title>【喵萌奶茶屋】★04月新番★[夏日重现][11][1080p]\n</title>
      <link>https://mikanani.me/Home/Episode/abc123</link>
      <enclosure url="https://mikanani.me/Download/abc123.torrent" length="0" type="application/x-bittorrent" />
    </item>
    <item>
      <title>A show with no enclosure</title>
      <link>magnet:?xt=urn:btih:deadbeef</link>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_channel_metadata_and_items() {
        let channel = parse_rss(SAMPLE.as_bytes()).expect("parse");
        assert_eq!(channel.link.as_deref(), Some("https://mikanani.me/"));
        assert_eq!(channel.items.len(), 2);
    }

    #[test]
    fn extract_rewrites_enclosure_into_url_and_homepage() {
        let channel = parse_rss(SAMPLE.as_bytes()).expect("parse");
        let torrents = extract_torrents(&channel);
        assert_eq!(torrents.len(), 2);

        let first = &torrents[0];
        assert_eq!(first.url, "https://mikanani.me/Download/abc123.torrent");
        assert_eq!(first.homepage, "https://mikanani.me/Home/Episode/abc123");
        assert!(!first.name.contains('\n'));
        assert!(first.name.starts_with('['));

        let second = &torrents[1];
        assert_eq!(second.url, "magnet:?xt=urn:btih:deadbeef");
        assert_eq!(second.homepage, "");
    }

    #[test]
    fn normalize_title_converts_fullwidth_brackets() {
        assert_eq!(normalize_title("【组】标题\n"), "[组]标题");
    }
}
