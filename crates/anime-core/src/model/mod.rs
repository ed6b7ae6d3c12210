//! Domain entities for the acquisition pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a show's identification/parsing convention originates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ParserTag {
    /// Identified via a Mikan-style tracker scrape.
    Mikan,
    /// Identified via TMDB.
    #[default]
    Tmdb,
    /// No identification performed; parsed title only.
    Raw,
    /// Identified via a Bangumi-style tracker scrape.
    Bangumi,
}

/// Lifecycle state of a [`Torrent`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum DownloadState {
    /// Accepted by the queue, not yet submitted to the downloader.
    #[default]
    Enqueued = 0,
    /// Submitted to the downloader, awaiting UID resolution.
    Submitted = 1,
    /// Downloader reports the payload as complete.
    Completed = 2,
    /// Files have been renamed into the library layout.
    Renamed = 3,
    /// Exceeded the progress-watcher timeout or otherwise gave up.
    Failed = 4,
}

/// Delivery mechanism of a subtitle track.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubtitleDeliveryType {
    /// Subtitle ships as a separate file alongside the video.
    External,
    /// Subtitle is multiplexed into the container as a selectable track.
    Embedded,
    /// Subtitle is burned into the video frames.
    Hard,
    /// Subtitle is a selectable soft track (synonym kept distinct from `Embedded` per source usage).
    Soft,
}

/// A tracker-native identity row (e.g. a Mikan `bangumiId`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerRecord {
    /// Tracker-native integer ID; serves as the key.
    pub id: i64,
    /// Title as displayed on the tracker.
    pub title: String,
    /// Season number as displayed on the tracker (defaults to 1).
    pub season: i32,
    /// Poster URL scraped from the tracker page.
    pub poster_url: Option<String>,
}

/// A TMDB identity row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmdbRecord {
    /// TMDB integer ID; serves as the key.
    pub id: i64,
    /// Localized title (in the configured language).
    pub localized_title: String,
    /// Original (untranslated) title.
    pub original_title: String,
    /// Year derived from `first_air_date`.
    pub year: i32,
    /// Season number TMDB reports as the latest aired.
    pub season: i32,
    /// Air date of the selected season, if known.
    pub air_date: Option<DateTime<Utc>>,
    /// Episode count of the selected season.
    pub episode_count: i32,
    /// Poster URL, already prefixed with the TMDB image base.
    pub poster_url: Option<String>,
    /// Average vote reported by TMDB.
    pub average_vote: f64,
}

/// A canonical parse observed for a show, retained for future `GetParsedTitleByRawName` lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedTitle {
    /// Synthetic row identifier.
    pub id: i64,
    /// Owning show.
    pub show_id: i64,
    /// Raw title as it appeared in the feed.
    pub raw_title: String,
    /// Fansub group, joined by `&` when multiple hit.
    pub group: Option<String>,
    /// Detected season number.
    pub season: i32,
    /// Raw substring that produced the season, kept for diagnostics.
    pub season_raw: Option<String>,
    /// Detected resolution token (e.g. `"1080p"`).
    pub resolution: Option<String>,
    /// Composite subtitle language label (ordered 简/繁/日/英 substrings).
    pub subtitle_language: Option<String>,
    /// Subtitle delivery mechanism, when detected.
    pub subtitle_type: Option<SubtitleDeliveryType>,
    /// Source tag (Baha, CR, Bilibili, BD, ...).
    pub source: Option<String>,
    /// Audio codec token.
    pub audio: Option<String>,
    /// Video codec/container tokens, joined.
    pub video: Option<String>,
    /// Release version, always >= 1.
    pub version: i32,
}

/// A configured RSS feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RssSource {
    /// Synthetic row identifier.
    pub id: i64,
    /// Feed URL.
    pub url: String,
    /// Operator-facing display name.
    pub name: String,
    /// True when the feed may carry items from multiple shows.
    pub aggregate: bool,
    /// Identification strategy to apply to items from this feed.
    pub parser_tag: ParserTag,
    /// Whether the refresh pipeline should poll this source.
    pub enabled: bool,
    /// Optional include-filter override (comma-separated patterns).
    pub include_override: Option<String>,
    /// Optional exclude-filter override (comma-separated patterns).
    pub exclude_override: Option<String>,
}

/// The core aggregate: a show tracked by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Show {
    /// Synthetic row identifier.
    pub id: i64,
    /// Official title, chosen by the identification pipeline.
    pub official_title: String,
    /// Release year, when known.
    pub year: Option<i32>,
    /// Season number.
    pub season: i32,
    /// Whether episode metadata has started accruing for this show.
    pub eps_collected: bool,
    /// Signed offset applied to parsed episode numbers before renaming.
    pub episode_offset: i32,
    /// Include-filter pattern (comma-separated, OR-joined).
    pub include_pattern: Option<String>,
    /// Exclude-filter pattern (comma-separated, OR-joined).
    pub exclude_pattern: Option<String>,
    /// Identification strategy used for this show.
    pub parser_tag: ParserTag,
    /// Denormalized RSS source link for quick filter comparisons.
    pub rss_source_url: Option<String>,
    /// Poster URL.
    pub poster_url: Option<String>,
    /// Soft-delete flag.
    pub deleted: bool,
    /// Linked tracker identity, if any.
    pub tracker_id: Option<i64>,
    /// Linked TMDB identity, if any.
    pub tmdb_id: Option<i64>,
}

impl Show {
    /// Render the on-disk library path segment for this show: `Title[ (Year)]/Season N`.
    #[must_use]
    pub fn save_path(&self) -> String {
        match self.year {
            Some(year) => format!(
                "{} ({})/Season {}",
                self.official_title, year, self.season
            ),
            None => format!("{}/Season {}", self.official_title, self.season),
        }
    }
}

/// A torrent known to the pipeline, keyed by its canonical URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Torrent {
    /// Canonical URL (torrent page or `magnet:` URI); serves as the key.
    pub url: String,
    /// Display name after title normalization.
    pub display_name: String,
    /// Current lifecycle state.
    pub downloaded: DownloadState,
    /// Whether the torrent's files have been renamed.
    pub renamed: bool,
    /// Opaque UID assigned by the downloader.
    pub download_uid: Option<String>,
    /// Owning show.
    pub show_id: i64,
    /// Tracker homepage URL, when the torrent originated from a tracker item.
    pub homepage: Option<String>,
    /// Row creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Transient parsed representation of a fetched torrent payload, never persisted.
#[derive(Debug, Clone)]
pub struct TorrentInfo {
    /// Display name extracted from the metainfo.
    pub name: String,
    /// BitTorrent v1 info-hash, hex-encoded.
    pub info_hash_v1: Option<String>,
    /// BitTorrent v2 info-hash, hex-encoded.
    pub info_hash_v2: Option<String>,
    /// Magnet URI, when the torrent was added as a magnet.
    pub magnet_uri: Option<String>,
    /// Raw `.torrent` metainfo bytes (may be empty when added via magnet).
    pub raw_bytes: Vec<u8>,
}

/// Transient output of the title parser; never persisted directly.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeMeta {
    /// Official title extracted by the scoring pass.
    pub title: String,
    /// Season number.
    pub season: i32,
    /// Raw substring that produced the season.
    pub season_raw: Option<String>,
    /// Episode number, or `-1` when `is_collection` is true.
    pub episode: i32,
    /// Whether this release is a batch/collection rather than a single episode.
    pub is_collection: bool,
    /// Start of an episode range, when the collection pass matched a ranged pattern.
    pub episode_start: Option<i32>,
    /// End of an episode range, when the collection pass matched a ranged pattern.
    pub episode_end: Option<i32>,
    /// Fansub group(s), joined by `&`.
    pub group: Option<String>,
    /// Resolution token.
    pub resolution: Option<String>,
    /// Composite subtitle language label.
    pub subtitle_language: Option<String>,
    /// Subtitle delivery mechanism.
    pub subtitle_type: Option<SubtitleDeliveryType>,
    /// Source tag.
    pub source: Option<String>,
    /// Audio codec token.
    pub audio: Option<String>,
    /// Video codec/container tokens.
    pub video: Option<String>,
    /// Release year, when present in the title.
    pub year: Option<i32>,
    /// Release version; always >= 1.
    pub version: i32,
}

impl Default for EpisodeMeta {
    fn default() -> Self {
        Self {
            title: String::new(),
            season: 1,
            season_raw: None,
            episode: 0,
            is_collection: false,
            episode_start: None,
            episode_end: None,
            group: None,
            resolution: None,
            subtitle_language: None,
            subtitle_type: None,
            source: None,
            audio: None,
            video: None,
            year: None,
            version: 1,
        }
    }
}

/// Transient notification payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Notification title.
    pub title: String,
    /// Notification body.
    pub body: String,
    /// Season number, when the notification concerns a specific episode.
    pub season: Option<i32>,
    /// Episode number, when the notification concerns a specific episode.
    pub episode: Option<i32>,
    /// Poster URL to attach, when available.
    pub poster_url: Option<String>,
    /// Raw image bytes to attach, when already fetched.
    #[serde(skip)]
    pub image_bytes: Option<Vec<u8>>,
}

/// A single file exposed by a torrent through the downloader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TorrentFileEntry {
    /// Index of the file within the torrent metainfo.
    pub index: u32,
    /// Path of the file relative to the torrent's save directory.
    pub path: String,
    /// Total size of the file in bytes.
    pub size_bytes: u64,
}

/// A point-in-time status snapshot reported by the downloader for a torrent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TorrentInfoSnapshot {
    /// Downloader-assigned save path (absolute, from the downloader's perspective).
    pub save_path: String,
    /// Estimated time to completion in seconds (0 or negative means imminent/unknown).
    pub eta_seconds: i64,
    /// Unix timestamp the downloader reports as the completion time; `0` means not complete.
    pub completed_at: i64,
}

impl TorrentInfoSnapshot {
    /// True when the downloader reports this torrent as complete.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.completed_at > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_show() -> Show {
        Show {
            id: 1,
            official_title: "败犬女主太多了".into(),
            year: Some(2024),
            season: 1,
            eps_collected: false,
            episode_offset: 0,
            include_pattern: None,
            exclude_pattern: None,
            parser_tag: ParserTag::Tmdb,
            rss_source_url: None,
            poster_url: None,
            deleted: false,
            tracker_id: None,
            tmdb_id: None,
        }
    }

    #[test]
    fn save_path_includes_year_when_present() {
        let show = sample_show();
        assert_eq!(show.save_path(), "败犬女主太多了 (2024)/Season 1");
    }

    #[test]
    fn save_path_omits_year_when_absent() {
        let mut show = sample_show();
        show.year = None;
        assert_eq!(show.save_path(), "败犬女主太多了/Season 1");
    }

    #[test]
    fn episode_meta_default_has_version_one_and_not_collection() {
        let meta = EpisodeMeta::default();
        assert_eq!(meta.version, 1);
        assert!(!meta.is_collection);
    }

    #[test]
    fn snapshot_completion_detection() {
        let pending = TorrentInfoSnapshot {
            save_path: "/downloads/show".into(),
            eta_seconds: 600,
            completed_at: 0,
        };
        assert!(!pending.is_complete());

        let done = TorrentInfoSnapshot {
            save_path: "/downloads/show".into(),
            eta_seconds: 0,
            completed_at: 1_700_000_000,
        };
        assert!(done.is_complete());
    }
}
