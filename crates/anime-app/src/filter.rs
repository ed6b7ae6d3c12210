//! Torrent admission filter: per-show include/exclude patterns applied before a novel
//! torrent is handed to the download queue.
//!
//! Patterns are comma-separated lists of regex fragments, OR-joined into a single
//! compiled expression. A malformed pattern is logged and treated as a non-match rather
//! than aborting the refresh cycle — a bad user rule should never wedge the pipeline.

use anime_telemetry::Metrics;
use tracing::warn;

/// Compiled include/exclude rule pair for one admission decision.
pub struct Filter<'a> {
    exclude: Option<&'a str>,
    include: Option<&'a str>,
}

impl<'a> Filter<'a> {
    /// Build a filter from the patterns configured on a show (falling back to
    /// program-wide defaults when the show carries none).
    #[must_use]
    pub const fn new(exclude: Option<&'a str>, include: Option<&'a str>) -> Self {
        Self { exclude, include }
    }

    /// Decide whether `name` is admitted: rejected if it matches the exclude pattern,
    /// then accepted if include is empty or matches.
    pub fn admits(&self, name: &str, metrics: &Metrics) -> bool {
        if let Some(pattern) = non_empty(self.exclude) {
            match compile(pattern, metrics) {
                Some(re) if re.is_match(name) => return false,
                _ => {}
            }
        }

        match non_empty(self.include) {
            None => true,
            Some(pattern) => match compile(pattern, metrics) {
                Some(re) => re.is_match(name),
                None => false,
            },
        }
    }
}

fn non_empty(pattern: Option<&str>) -> Option<&str> {
    pattern.filter(|p| !p.trim().is_empty())
}

fn compile(comma_separated: &str, metrics: &Metrics) -> Option<regex::Regex> {
    let joined = comma_separated
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("|");
    if joined.is_empty() {
        return None;
    }
    match regex::Regex::new(&joined) {
        Ok(re) => Some(re),
        Err(err) => {
            warn!(pattern = %comma_separated, error = %err, "malformed filter pattern, treating as non-match");
            metrics.inc_filter_malformed_regex();
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> Metrics {
        Metrics::new().expect("metrics registry")
    }

    #[test]
    fn empty_include_admits_everything_not_excluded() {
        let filter = Filter::new(None, None);
        assert!(filter.admits("[Group] Show - 01.mkv", &metrics()));
    }

    #[test]
    fn exclude_match_rejects() {
        let filter = Filter::new(Some("BDRip,DVDRip"), None);
        assert!(!filter.admits("[Group] Show - 01 [BDRip].mkv", &metrics()));
        assert!(filter.admits("[Group] Show - 01 [WEBRip].mkv", &metrics()));
    }

    #[test]
    fn include_non_match_rejects() {
        let filter = Filter::new(None, Some("1080p,2160p"));
        assert!(filter.admits("[Group] Show - 01 [1080p].mkv", &metrics()));
        assert!(!filter.admits("[Group] Show - 01 [480p].mkv", &metrics()));
    }

    #[test]
    fn malformed_pattern_is_treated_as_non_match() {
        let exclude_filter = Filter::new(Some("("), None);
        assert!(exclude_filter.admits("anything", &metrics()));

        let include_filter = Filter::new(None, Some("("));
        assert!(!include_filter.admits("anything", &metrics()));
    }

    #[test]
    fn exclude_and_include_combine() {
        let filter = Filter::new(Some("CHS"), Some("1080p"));
        assert!(filter.admits("[Group] Show - 01 [1080p][CHT].mkv", &metrics()));
        assert!(!filter.admits("[Group] Show - 01 [1080p][CHS].mkv", &metrics()));
        assert!(!filter.admits("[Group] Show - 01 [480p][CHT].mkv", &metrics()));
    }
}
