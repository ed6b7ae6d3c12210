//! Typed configuration sections.
//!
//! Each struct below is one top-level key in `config.json`. Defaults mirror the
//! shipped operator-facing values; `Default` impls back [`crate::ConfigStore::get_or_default`].

use serde::{Deserialize, Serialize};

/// `program` section: scheduler cadence, web UI bind port, admin password, debug logging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgramConfig {
    /// Refresh-pipeline period in seconds. The scheduler floors this to 900.
    pub rss_time: u64,
    /// Port the admin web UI binds to.
    pub webui_port: u16,
    /// Admin password. Shipped with an intentionally weak default the operator must change.
    pub password: String,
    /// Verbose logging toggle.
    pub debug_enable: bool,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            rss_time: 600,
            webui_port: 7892,
            password: "adminadmin".to_string(),
            debug_enable: false,
        }
    }
}

/// Supported download-client families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DownloaderType {
    /// qBittorrent Web API v2 family (and compatible forks).
    #[default]
    Qbittorrent,
    /// Transmission RPC.
    Transmission,
    /// aria2 JSON-RPC.
    Aria2,
}

/// `downloader` section: which client family to drive and how to reach it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DownloaderConfig {
    /// Client family.
    #[serde(rename = "type")]
    pub kind: DownloaderType,
    /// Library root the downloader should save into (required; validated non-empty).
    pub path: String,
    /// `host:port` the downloader's HTTP API is reachable at (required; validated non-empty).
    pub host: String,
    /// Whether to address `host` over HTTPS.
    pub ssl: bool,
    /// Web UI username, when the downloader requires one.
    pub username: Option<String>,
    /// Web UI password, when the downloader requires one.
    pub password: Option<String>,
}

/// Identification language preference passed to TMDB queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Simplified Chinese (`zh-CN`).
    #[default]
    Zh,
    /// English.
    En,
    /// Japanese.
    Jp,
}

/// `rss_parser` section: feed polling and identification behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RssParserConfig {
    /// Whether the refresh pipeline runs at all.
    pub enable: bool,
    /// Default exclude patterns (comma-joined into one alternation), applied when a
    /// show carries no override.
    pub filter: Vec<String>,
    /// Default include patterns (same joining rule).
    pub include: Vec<String>,
    /// TMDB query/display language.
    pub language: Language,
    /// Override host for a self-hosted Mikan-compatible tracker.
    pub mikan_custom_url: Option<String>,
    /// TMDB API key. Empty disables TMDB-backed identification.
    pub tmdb_api_key: Option<String>,
}

impl Default for RssParserConfig {
    fn default() -> Self {
        Self {
            enable: true,
            filter: vec!["720".to_string(), r"\d+-\d+".to_string()],
            include: Vec::new(),
            language: Language::Zh,
            mikan_custom_url: None,
            tmdb_api_key: None,
        }
    }
}

/// Rename-target naming scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RenameMethod {
    /// Full metadata basename (group, resolution, ...) beyond the Plex-style core.
    Advanced,
    /// Plex-style `Title SxxEyy` basename; the only scheme this pipeline implements.
    Normal,
    /// Season/episode-number-only basename, no title.
    #[default]
    Pn,
}

/// `rename` section (the source calls this `bangumi_manage`; both names are accepted on
/// load, `rename` is canonical on save — see `DESIGN.md`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenameConfig {
    /// Whether the rename stage runs at all.
    pub enable: bool,
    /// Whether a show is only considered "complete" once every known episode has a file.
    pub eps_complete: bool,
    /// Naming scheme. Only [`RenameMethod::Normal`] is implemented; others are accepted and
    /// validated but fall back to `Normal` behavior (see the path-layout inference note in DESIGN.md).
    pub rename_method: RenameMethod,
    /// Include `(Year)` in the renamed basename when the show has one.
    pub year: bool,
    /// Include `- Group` in the renamed basename when the parsed title carries one.
    pub group: bool,
}

impl Default for RenameConfig {
    fn default() -> Self {
        Self {
            enable: true,
            eps_complete: false,
            rename_method: RenameMethod::Pn,
            year: true,
            group: false,
        }
    }
}

/// Outbound proxy transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProxyKind {
    /// Plain HTTP CONNECT proxy.
    #[default]
    Http,
    /// HTTPS proxy.
    Https,
    /// SOCKS5 proxy.
    Socks5,
}

/// `proxy` section: outbound proxy used by the network client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Whether outbound requests should be proxied.
    pub enable: bool,
    /// Proxy transport.
    #[serde(rename = "type")]
    pub kind: ProxyKind,
    /// Proxy host (no scheme).
    pub host: String,
    /// Proxy port (0..65535; 0 treated as unset).
    pub port: u16,
    /// Proxy username, when the proxy requires auth.
    pub username: Option<String>,
    /// Proxy password, when the proxy requires auth.
    pub password: Option<String>,
}

/// Notification sink implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// Telegram bot API.
    #[default]
    Telegram,
    /// Bark push notifications (iOS).
    Bark,
}

/// `notification` section: sink selection and credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NotificationConfig {
    /// Whether notifications are dispatched at all.
    pub enable: bool,
    /// Sink implementation.
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// Bot token (Telegram) or device key (Bark).
    pub token: String,
    /// Telegram chat ID. Unused by the Bark sink.
    pub chat_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn program_defaults_match_the_operator_facing_table() {
        let program = ProgramConfig::default();
        assert_eq!(program.rss_time, 600);
        assert_eq!(program.webui_port, 7892);
        assert_eq!(program.password, "adminadmin");
        assert!(!program.debug_enable);
    }

    #[test]
    fn downloader_defaults_to_qbittorrent() {
        assert_eq!(DownloaderConfig::default().kind, DownloaderType::Qbittorrent);
    }

    #[test]
    fn rename_defaults_match_shipped_behavior() {
        let rename = RenameConfig::default();
        assert!(rename.year);
        assert!(!rename.group);
        assert_eq!(rename.rename_method, RenameMethod::Pn);
    }
}
