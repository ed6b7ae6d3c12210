//! Save-path layout inference and Plex-style basename construction.
//!
//! Pure, deterministic helpers split out from [`crate::service`] so they can be
//! unit-tested against SPEC_FULL's concrete scenarios (S4) without a downloader or
//! data store in the loop.

use once_cell::sync::Lazy;
use regex::Regex;

use anime_core::model::Show;

static LAYOUT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<title>.+?)(?: \((?P<year>\d{4})\))?/Season (?P<season>\d+)$").unwrap());

/// Fields recovered from a downloader save path laid out as `<title>[ (year)]/Season <n>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferredLocation {
    /// Official title segment of the path.
    pub official_title: String,
    /// Year, when the path carried a `(YYYY)` suffix on the title segment.
    pub year: Option<i32>,
    /// Season number from the `Season <n>` segment.
    pub season: i32,
}

/// Strip `root` from `save_path`, returning the remainder used for layout inference.
/// Both sides are normalized to forward slashes before comparison. Returns `None` when
/// `save_path` is not rooted under `root`.
#[must_use]
pub fn relative_to_root(save_path: &str, root: &str) -> Option<String> {
    let save_path = save_path.replace('\\', "/");
    let root = root.replace('\\', "/");
    let root = root.trim_end_matches('/');
    let stripped = save_path.strip_prefix(root)?;
    Some(stripped.trim_start_matches('/').to_string())
}

/// Parse `relative` into its title/year/season components. Returns `None` on any
/// layout other than `<title>[ (year)]/Season <n>` — the rename stage treats that as
/// an abort for the whole torrent rather than guessing (SPEC_FULL §9 path-layout
/// inference decision).
#[must_use]
pub fn infer_location(relative: &str) -> Option<InferredLocation> {
    let normalized = relative.replace('\\', "/");
    let trimmed = normalized.trim_matches('/');
    let caps = LAYOUT.captures(trimmed)?;
    let season: i32 = caps.name("season")?.as_str().parse().ok()?;
    let year = caps
        .name("year")
        .and_then(|m| m.as_str().parse::<i32>().ok());
    Some(InferredLocation {
        official_title: caps.name("title")?.as_str().to_string(),
        year,
        season,
    })
}

/// Build the Plex-style basename for a renamed episode file:
/// `<OfficialTitle>[ (<Year>)] S<NN>E<NN>[ - <Group>]<ext>`, honoring the `year`/`group`
/// config flags (SPEC_FULL §4.10, scenario S4). `episode` is expected to already carry
/// `Show.episode_offset`.
#[must_use]
pub fn build_basename(
    show: &Show,
    episode: i32,
    group: Option<&str>,
    extension: &str,
    include_year: bool,
    include_group: bool,
) -> String {
    let mut name = show.official_title.clone();
    if include_year {
        if let Some(year) = show.year {
            name.push_str(&format!(" ({year})"));
        }
    }
    name.push_str(&format!(
        " S{:02}E{:02}",
        show.season.max(0),
        episode.max(0)
    ));
    if include_group {
        if let Some(group) = group.filter(|g| !g.is_empty()) {
            name.push_str(&format!(" - {group}"));
        }
    }
    if extension.is_empty() {
        name
    } else {
        format!("{name}.{extension}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anime_core::model::ParserTag;

    fn show(title: &str, year: Option<i32>, season: i32) -> Show {
        Show {
            id: 1,
            official_title: title.to_string(),
            year,
            season,
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
    fn relative_to_root_strips_normalized_prefix() {
        assert_eq!(
            relative_to_root("/downloads/Demo Show (2024)/Season 1", "/downloads"),
            Some("Demo Show (2024)/Season 1".to_string())
        );
        assert_eq!(
            relative_to_root("/downloads/", "/downloads"),
            Some(String::new())
        );
        assert_eq!(relative_to_root("/elsewhere/show", "/downloads"), None);
    }

    #[test]
    fn infer_location_parses_title_year_and_season() {
        let inferred = infer_location("败犬女主太多了 (2024)/Season 1").expect("layout matches");
        assert_eq!(inferred.official_title, "败犬女主太多了");
        assert_eq!(inferred.year, Some(2024));
        assert_eq!(inferred.season, 1);
    }

    #[test]
    fn infer_location_allows_missing_year() {
        let inferred = infer_location("Demo Show/Season 2").expect("layout matches");
        assert_eq!(inferred.official_title, "Demo Show");
        assert_eq!(inferred.year, None);
        assert_eq!(inferred.season, 2);
    }

    #[test]
    fn infer_location_rejects_other_layouts() {
        assert!(infer_location("Demo Show").is_none());
        assert!(infer_location("Demo Show/Specials").is_none());
        assert!(infer_location("Demo Show/Season 1/Extras").is_none());
    }

    #[test]
    fn build_basename_matches_scenario_s4() {
        let show = show("败犬女主太多了", Some(2024), 1);
        let basename = build_basename(&show, 2, None, "mp4", true, false);
        assert_eq!(basename, "败犬女主太多了 (2024) S01E02.mp4");
    }

    #[test]
    fn build_basename_honors_group_flag() {
        let show = show("Demo Show", None, 1);
        let with_group = build_basename(&show, 4, Some("SubGroup"), "mkv", false, true);
        assert_eq!(with_group, "Demo Show S01E04 - SubGroup.mkv");

        let without_group = build_basename(&show, 4, Some("SubGroup"), "mkv", false, false);
        assert_eq!(without_group, "Demo Show S01E04.mkv");
    }

    #[test]
    fn build_basename_omits_year_when_absent_even_if_requested() {
        let show = show("Demo Show", None, 3);
        let basename = build_basename(&show, 1, None, "mkv", true, false);
        assert_eq!(basename, "Demo Show S03E01.mkv");
    }
}
