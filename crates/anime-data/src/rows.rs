//! Raw row shapes returned by `sqlx` queries, and their conversion into the domain model
//! exported by `anime_core::model`. Kept separate from [`crate::store`] so the SQL shape of
//! a table and the public type it represents can drift independently.

use anime_core::model::{
    DownloadState, ParsedTitle, ParserTag, Show, SubtitleDeliveryType, TmdbRecord, Torrent,
    TrackerRecord,
};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::error::{DataError, Result};

#[derive(Debug, FromRow)]
pub(crate) struct TrackerRow {
    pub id: i64,
    pub title: String,
    pub season: i64,
    pub poster_url: Option<String>,
}

impl From<TrackerRow> for TrackerRecord {
    fn from(row: TrackerRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            season: row.season as i32,
            poster_url: row.poster_url,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct TmdbRow {
    pub id: i64,
    pub localized_title: String,
    pub original_title: String,
    pub year: i64,
    pub season: i64,
    pub air_date: Option<DateTime<Utc>>,
    pub episode_count: i64,
    pub poster_url: Option<String>,
    pub average_vote: f64,
}

impl From<TmdbRow> for TmdbRecord {
    fn from(row: TmdbRow) -> Self {
        Self {
            id: row.id,
            localized_title: row.localized_title,
            original_title: row.original_title,
            year: row.year as i32,
            season: row.season as i32,
            air_date: row.air_date,
            episode_count: row.episode_count as i32,
            poster_url: row.poster_url,
            average_vote: row.average_vote,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct ShowRow {
    pub id: i64,
    pub official_title: String,
    pub year: Option<i64>,
    pub season: i64,
    pub eps_collected: i64,
    pub episode_offset: i64,
    pub include_pattern: Option<String>,
    pub exclude_pattern: Option<String>,
    pub parser_tag: String,
    pub rss_source_url: Option<String>,
    pub poster_url: Option<String>,
    pub deleted: i64,
    pub tracker_id: Option<i64>,
    pub tmdb_id: Option<i64>,
}

impl TryFrom<ShowRow> for Show {
    type Error = DataError;

    fn try_from(row: ShowRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            official_title: row.official_title,
            year: row.year.map(|year| year as i32),
            season: row.season as i32,
            eps_collected: row.eps_collected != 0,
            episode_offset: row.episode_offset as i32,
            include_pattern: row.include_pattern,
            exclude_pattern: row.exclude_pattern,
            parser_tag: parse_parser_tag(&row.parser_tag)?,
            rss_source_url: row.rss_source_url,
            poster_url: row.poster_url,
            deleted: row.deleted != 0,
            tracker_id: row.tracker_id,
            tmdb_id: row.tmdb_id,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct ParsedTitleRow {
    pub id: i64,
    pub show_id: i64,
    pub raw_title: String,
    pub group_name: Option<String>,
    pub season: i64,
    pub season_raw: Option<String>,
    pub resolution: Option<String>,
    pub subtitle_language: Option<String>,
    pub subtitle_type: Option<String>,
    pub source: Option<String>,
    pub audio: Option<String>,
    pub video: Option<String>,
    pub version: i64,
}

impl TryFrom<ParsedTitleRow> for ParsedTitle {
    type Error = DataError;

    fn try_from(row: ParsedTitleRow) -> Result<Self> {
        let subtitle_type = row
            .subtitle_type
            .as_deref()
            .map(parse_subtitle_delivery_type)
            .transpose()?;
        Ok(Self {
            id: row.id,
            show_id: row.show_id,
            raw_title: row.raw_title,
            group: row.group_name,
            season: row.season as i32,
            season_raw: row.season_raw,
            resolution: row.resolution,
            subtitle_language: row.subtitle_language,
            subtitle_type,
            source: row.source,
            audio: row.audio,
            video: row.video,
            version: row.version as i32,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct TorrentRow {
    pub url: String,
    pub display_name: String,
    pub downloaded: i64,
    pub renamed: i64,
    pub download_uid: Option<String>,
    pub show_id: i64,
    pub homepage: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<TorrentRow> for Torrent {
    type Error = DataError;

    fn try_from(row: TorrentRow) -> Result<Self> {
        Ok(Self {
            url: row.url,
            display_name: row.display_name,
            downloaded: parse_download_state(row.downloaded)?,
            renamed: row.renamed != 0,
            download_uid: row.download_uid,
            show_id: row.show_id,
            homepage: row.homepage,
            created_at: row.created_at,
        })
    }
}

pub(crate) fn parser_tag_to_str(tag: ParserTag) -> &'static str {
    match tag {
        ParserTag::Mikan => "mikan",
        ParserTag::Tmdb => "tmdb",
        ParserTag::Raw => "raw",
        ParserTag::Bangumi => "bangumi",
    }
}

pub(crate) fn parse_parser_tag(value: &str) -> Result<ParserTag> {
    match value {
        "mikan" => Ok(ParserTag::Mikan),
        "tmdb" => Ok(ParserTag::Tmdb),
        "raw" => Ok(ParserTag::Raw),
        "bangumi" => Ok(ParserTag::Bangumi),
        other => Err(DataError::UnknownVariant {
            column: "parser_tag",
            value: other.to_string(),
        }),
    }
}

pub(crate) fn subtitle_delivery_type_to_str(kind: SubtitleDeliveryType) -> &'static str {
    match kind {
        SubtitleDeliveryType::External => "external",
        SubtitleDeliveryType::Embedded => "embedded",
        SubtitleDeliveryType::Hard => "hard",
        SubtitleDeliveryType::Soft => "soft",
    }
}

fn parse_subtitle_delivery_type(value: &str) -> Result<SubtitleDeliveryType> {
    match value {
        "external" => Ok(SubtitleDeliveryType::External),
        "embedded" => Ok(SubtitleDeliveryType::Embedded),
        "hard" => Ok(SubtitleDeliveryType::Hard),
        "soft" => Ok(SubtitleDeliveryType::Soft),
        other => Err(DataError::UnknownVariant {
            column: "subtitle_type",
            value: other.to_string(),
        }),
    }
}

pub(crate) fn download_state_to_i64(state: DownloadState) -> i64 {
    state as i64
}

fn parse_download_state(value: i64) -> Result<DownloadState> {
    match value {
        0 => Ok(DownloadState::Enqueued),
        1 => Ok(DownloadState::Submitted),
        2 => Ok(DownloadState::Completed),
        3 => Ok(DownloadState::Renamed),
        4 => Ok(DownloadState::Failed),
        other => Err(DataError::UnknownVariant {
            column: "downloaded",
            value: other.to_string(),
        }),
    }
}
