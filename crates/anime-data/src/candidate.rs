//! Inputs to [`crate::DataStore::create_show`].

use anime_core::model::{ParserTag, SubtitleDeliveryType, TmdbRecord, TrackerRecord};

/// A single parsed-title observation to retain alongside the show it resolved to.
#[derive(Debug, Clone)]
pub struct ParsedTitleCandidate {
    /// Raw title as it appeared in the feed.
    pub raw_title: String,
    /// Fansub group, joined by `&` when multiple hit.
    pub group: Option<String>,
    /// Detected season number.
    pub season: i32,
    /// Raw substring that produced the season.
    pub season_raw: Option<String>,
    /// Detected resolution token.
    pub resolution: Option<String>,
    /// Composite subtitle language label.
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

/// Everything [`crate::DataStore::create_show`] needs to either link a fresh observation
/// to an existing show or materialize a brand new one.
#[derive(Debug, Clone)]
pub struct ShowCandidate {
    /// Official title chosen by identification.
    pub official_title: String,
    /// Release year, when known.
    pub year: Option<i32>,
    /// Season number.
    pub season: i32,
    /// Poster URL, when one was found.
    pub poster_url: Option<String>,
    /// Identification strategy that produced this candidate.
    pub parser_tag: ParserTag,
    /// Tracker identity, when the tracker scrape succeeded. Immutable once attached to a
    /// show: a second candidate with the same tracker id never overwrites the stored row.
    pub tracker: Option<TrackerRecord>,
    /// TMDB identity, when the TMDB lookup succeeded. Refreshed on every candidate that
    /// carries the same TMDB id, since TMDB metadata (episode counts, vote average) changes
    /// over a show's run.
    pub tmdb: Option<TmdbRecord>,
    /// The parsed-title row to retain for this observation.
    pub parsed_title: ParsedTitleCandidate,
    /// RSS source URL the candidate was observed on, denormalized onto the show for quick
    /// filter comparisons.
    pub rss_source_url: Option<String>,
}
