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

//! Identification pipeline: given a torrent, scrape its tracker homepage and/or
//! query TMDB to resolve an official title, season, year, and poster.

mod tmdb;
mod tracker;

pub use tmdb::TmdbMatch;
pub use tracker::TrackerScrape;

use anime_core::model::Torrent;
use anime_core::{CoreError, CoreResult};
use anime_net::NetClient;
use chrono::NaiveDate;

/// True when `title` carries no usable content — either empty, or the leftover
/// separator residue the title parser returns for input with no real title-bearing text.
fn has_no_usable_title(title: &str) -> bool {
    title.trim_matches(|c: char| !c.is_alphanumeric()).is_empty()
}

/// Result of [`identify`]: enough to populate a new `Show` row.
#[derive(Debug, Clone)]
pub struct Identification {
    /// Official title chosen for the show.
    pub title: String,
    /// Season number.
    pub season: i32,
    /// Release year, when known.
    pub year: Option<i32>,
    /// Poster URL, when one was found.
    pub poster_url: Option<String>,
    /// Tracker `bangumiId`, when the tracker scrape succeeded.
    pub tracker_id: Option<i64>,
    /// TMDB `tv` id, when the TMDB lookup succeeded.
    pub tmdb_id: Option<i64>,
}

/// Identify `torrent`: scrape its tracker homepage (if any) and query TMDB with
/// the resulting or parsed title, combining whichever source(s) succeed.
///
/// # Errors
///
/// Returns [`CoreError::Network`] unchanged when a request fails at the transport layer
/// (the caller should back off rather than insert a bogus show). Returns
/// [`CoreError::Parse`] only when both sources fail and no usable title was obtained.
pub async fn identify(
    client: &NetClient,
    torrent: &Torrent,
    tmdb_api_key: &str,
    today: NaiveDate,
) -> CoreResult<Identification> {
    let tracker_scrape = match &torrent.homepage {
        Some(homepage) => match tracker::scrape(client, homepage).await {
            Ok(scrape) => Some(scrape),
            Err(CoreError::Network { status }) => return Err(CoreError::Network { status }),
            Err(_) => None,
        },
        None => None,
    };

    let fallback_title = || anime_parser::parse(&torrent.display_name).title;
    let title_for_tmdb = tracker_scrape
        .as_ref()
        .and_then(|scrape| scrape.title.clone())
        .unwrap_or_else(fallback_title);

    let tmdb_match = if has_no_usable_title(&title_for_tmdb) {
        None
    } else {
        match tmdb::lookup(client, tmdb_api_key, &title_for_tmdb, today).await {
            Ok(found) => Some(found),
            Err(CoreError::Network { status }) => return Err(CoreError::Network { status }),
            Err(_) => None,
        }
    };

    if tracker_scrape.is_none() && tmdb_match.is_none() {
        if has_no_usable_title(&title_for_tmdb) {
            return Err(CoreError::parse("identify"));
        }
        return Ok(Identification {
            title: title_for_tmdb,
            season: 1,
            year: None,
            poster_url: None,
            tracker_id: None,
            tmdb_id: None,
        });
    }

    Ok(merge(tracker_scrape, tmdb_match, title_for_tmdb))
}

/// Combine whichever of the tracker scrape and TMDB match succeeded into one
/// [`Identification`]. The tracker's title/poster win whenever present; TMDB's are used
/// only as a fallback when the tracker scrape produced no title/poster at all. Season is
/// always taken from TMDB when available, since only TMDB resolves "latest aired season".
fn merge(
    tracker_scrape: Option<TrackerScrape>,
    tmdb_match: Option<TmdbMatch>,
    title_for_tmdb: String,
) -> Identification {
    let title = tracker_scrape
        .as_ref()
        .and_then(|s| s.title.clone())
        .or_else(|| tmdb_match.as_ref().map(|m| m.official_title.clone()))
        .unwrap_or(title_for_tmdb);

    let season = tmdb_match
        .as_ref()
        .map(|m| m.season)
        .or_else(|| tracker_scrape.as_ref().map(|s| s.season))
        .unwrap_or(1);

    let poster_url = tracker_scrape
        .as_ref()
        .and_then(|s| s.poster_url.clone())
        .or_else(|| tmdb_match.as_ref().and_then(|m| m.poster_url.clone()));

    Identification {
        title,
        season,
        year: tmdb_match.as_ref().map(|m| m.year),
        poster_url,
        tracker_id: tracker_scrape.map(|s| s.bangumi_id),
        tmdb_id: tmdb_match.map(|m| m.tmdb_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anime_core::model::DownloadState;
    use chrono::Utc;

    fn torrent(homepage: Option<&str>, display_name: &str) -> Torrent {
        Torrent {
            url: "magnet:?xt=urn:btih:deadbeef".into(),
            display_name: display_name.into(),
            downloaded: DownloadState::Enqueued,
            renamed: false,
            download_uid: None,
            show_id: 0,
            homepage: homepage.map(str::to_string),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn no_homepage_and_empty_parsed_title_is_parse_error() {
        let client = NetClient::new(anime_net::NetClientConfig::default()).unwrap();
        let t = torrent(None, "");
        let err = identify(&client, &t, "key", Utc::now().date_naive()).await.unwrap_err();
        assert!(matches!(err, CoreError::Parse { context: "identify", .. }));
    }

    fn tracker_scrape(title: Option<&str>, poster: Option<&str>) -> TrackerScrape {
        TrackerScrape {
            bangumi_id: 3751,
            title: title.map(str::to_string),
            season: 1,
            poster_url: poster.map(str::to_string),
        }
    }

    fn tmdb_match(title: &str, poster: Option<&str>) -> TmdbMatch {
        TmdbMatch {
            tmdb_id: 138_502,
            official_title: title.to_string(),
            year: 2024,
            season: 2,
            poster_url: poster.map(str::to_string),
        }
    }

    #[test]
    fn merge_prefers_tracker_title_and_poster_over_tmdb() {
        let result = merge(
            Some(tracker_scrape(Some("tracker title"), Some("tracker poster"))),
            Some(tmdb_match("tmdb title", Some("tmdb poster"))),
            "fallback".to_string(),
        );
        assert_eq!(result.title, "tracker title");
        assert_eq!(result.poster_url.as_deref(), Some("tracker poster"));
        // Season always comes from TMDB regardless of title/poster precedence.
        assert_eq!(result.season, 2);
    }

    #[test]
    fn merge_falls_back_to_tmdb_title_and_poster_when_tracker_has_none() {
        let result = merge(
            Some(tracker_scrape(None, None)),
            Some(tmdb_match("tmdb title", Some("tmdb poster"))),
            "fallback".to_string(),
        );
        assert_eq!(result.title, "tmdb title");
        assert_eq!(result.poster_url.as_deref(), Some("tmdb poster"));
    }
}
