//! TMDB `search/tv` + `tv/{id}` client.

use anime_core::{CoreError, CoreResult};
use anime_net::NetClient;
use chrono::{Datelike, NaiveDate};
use serde::Deserialize;

const ANIMATION_GENRE_ID: i64 = 16;
const API_BASE: &str = "https://api.themoviedb.org/3";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    id: i64,
    #[serde(default)]
    genre_ids: Vec<i64>,
    #[serde(default)]
    first_air_date: String,
}

#[derive(Debug, Deserialize)]
struct TvDetail {
    name: String,
    #[serde(default)]
    first_air_date: String,
    #[serde(default)]
    poster_path: Option<String>,
    #[serde(default)]
    seasons: Vec<Season>,
}

#[derive(Debug, Deserialize, Clone)]
struct Season {
    season_number: i32,
    #[serde(default)]
    air_date: String,
    #[serde(default)]
    poster_path: Option<String>,
}

/// A resolved TMDB match: show-level metadata plus the chosen season.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TmdbMatch {
    /// TMDB `tv` id.
    pub tmdb_id: i64,
    /// Localized show name (`language` query parameter, e.g. `zh-CN`).
    pub official_title: String,
    /// Release year, from `first_air_date` or the current year if absent.
    pub year: i32,
    /// Chosen season number.
    pub season: i32,
    /// Poster URL, already prefixed with the TMDB image CDN base, when available.
    pub poster_url: Option<String>,
}

/// Search TMDB for `keyword`, pick the best animation match, and resolve its latest-aired
/// season. Network failures propagate unchanged; a response with no usable match is
/// [`CoreError::Parse`].
pub async fn lookup(client: &NetClient, api_key: &str, keyword: &str, now: NaiveDate) -> CoreResult<TmdbMatch> {
    let mut candidates = search(client, api_key, keyword).await?;
    if candidates.is_empty() {
        let stripped = keyword.replace(' ', "");
        if stripped != keyword {
            candidates = search(client, api_key, &stripped).await?;
        }
    }

    candidates.retain(|result| result.genre_ids.contains(&ANIMATION_GENRE_ID));
    candidates.sort_by(|a, b| b.first_air_date.cmp(&a.first_air_date));
    let best = candidates.into_iter().next().ok_or(CoreError::parse("tmdb-search"))?;

    let detail = fetch_detail(client, api_key, best.id).await?;
    let season = pick_latest_aired_season(&detail.seasons, now);

    let year = parse_year(&detail.first_air_date).unwrap_or_else(|| now.year());

    let poster_path = season
        .as_ref()
        .and_then(|s| s.poster_path.clone())
        .or_else(|| detail.poster_path.clone());

    Ok(TmdbMatch {
        tmdb_id: best.id,
        official_title: detail.name,
        year,
        season: season.map(|s| s.season_number).unwrap_or(1),
        poster_url: poster_path.map(|path| format!("https://image.tmdb.org/t/p/w780{path}")),
    })
}

async fn search(client: &NetClient, api_key: &str, keyword: &str) -> CoreResult<Vec<SearchResult>> {
    let url = format!(
        "{API_BASE}/search/tv?api_key={}&language=zh-CN&query={}",
        urlencoding::encode(api_key),
        urlencoding::encode(keyword),
    );
    let response: SearchResponse = client.get_json(&url).await?;
    Ok(response.results)
}

async fn fetch_detail(client: &NetClient, api_key: &str, tmdb_id: i64) -> CoreResult<TvDetail> {
    let url = format!(
        "{API_BASE}/tv/{tmdb_id}?api_key={}&language=zh-CN",
        urlencoding::encode(api_key),
    );
    client.get_json(&url).await
}

/// Filter to seasons that have already aired and are not specials, sort descending by air
/// date, and take the last (earliest-airing of the qualifying set). Falls back to the
/// first non-special season when none qualify.
fn pick_latest_aired_season(seasons: &[Season], now: NaiveDate) -> Option<Season> {
    let mut aired: Vec<Season> = seasons
        .iter()
        .filter(|s| s.season_number > 0 && parse_date(&s.air_date).is_some_and(|d| d <= now))
        .cloned()
        .collect();
    aired.sort_by(|a, b| b.air_date.cmp(&a.air_date));
    aired.into_iter().last().or_else(|| seasons.iter().find(|s| s.season_number > 0).cloned())
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

fn parse_year(first_air_date: &str) -> Option<i32> {
    first_air_date.get(0..4).and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn season(number: i32, air_date: &str) -> Season {
        Season {
            season_number: number,
            air_date: air_date.to_string(),
            poster_path: None,
        }
    }

    #[test]
    fn picks_earliest_of_the_aired_seasons() {
        let today = NaiveDate::from_ymd_opt(2026, 7, 27).unwrap();
        let seasons = vec![
            season(0, "2023-01-01"),
            season(1, "2023-04-01"),
            season(2, "2024-10-01"),
            season(3, "2027-01-01"),
        ];
        let picked = pick_latest_aired_season(&seasons, today).unwrap();
        assert_eq!(picked.season_number, 1);
    }

    #[test]
    fn falls_back_to_first_nonspecial_season_when_nothing_has_aired() {
        let today = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let seasons = vec![season(0, "2023-01-01"), season(1, "2024-01-01")];
        let picked = pick_latest_aired_season(&seasons, today).unwrap();
        assert_eq!(picked.season_number, 1);
    }

    #[test]
    fn parses_year_from_air_date() {
        assert_eq!(parse_year("2024-10-05"), Some(2024));
        assert_eq!(parse_year(""), None);
    }
}
