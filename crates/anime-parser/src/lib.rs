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

//! The title parser: a regex pipeline turning a freeform torrent release title
//! into structured episode metadata.
//!
//! Named passes run in a fixed order. Each pass consumes what it matches by deleting the
//! matched substring from the working text, which narrows the search space for later,
//! more ambiguous passes and guarantees the title-extraction pass at the end only sees
//! leftover, unclassified text.

mod groups;
mod numerals;
mod title;

pub use numerals::parse_chinese_numeral;

use anime_core::model::{EpisodeMeta, SubtitleDeliveryType};
use once_cell::sync::Lazy;
use regex::Regex;

static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[(\[](19\d{2}|20\d{2})[)\]]").unwrap());

static SOURCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(WEB-?DL|WEB-?Rip|BDRip|JPBD|Baha|Bilibili|AT-X|ABEMA|viutv|CR|BD)\b")
        .unwrap()
});

static RESOLUTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\d{3,4}[x×]\d{3,4}|2160p|1080p|720p|480p|4K").unwrap());

static AUDIO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bAAC(?:x2)?\b|\bAAC2\.0\b|\bFLAC(?:x2)?\b|\bDDP(?:2\.0)?\b|\bOPUS\b").unwrap()
});

// Container tags are frequently glued to a preceding tag by an underscore (`GB_MP4`),
// which defeats a plain `\b` (the regex crate treats `_` as a word character). Allow any
// non-alphanumeric (including `_`) or start-of-text as the left boundary instead.
static VIDEO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b8BIT\b|\b10BIT\b|\bHI10P\b|H\.26[45]|\bAVC\b|\bHEVC\b|\bAV1\b|(?:^|[^A-Za-z0-9])MKV\b|(?:^|[^A-Za-z0-9])MP4\b|(?:^|[^A-Za-z0-9])AVI\b|(?:^|[^A-Za-z0-9])RMVB\b|\bUHD\b|\bHD\b|\bSRTx2\b|\bASSx2\b|\bPGS\b|\bRemux\b|\bOVA\b",
    )
    .unwrap()
});

static SUB_SIMPLIFIED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)CHS|简体|简體|GBJP|GB|简|SC\b").unwrap());
static SUB_TRADITIONAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)CHT|繁體|繁体|BIG5|繁").unwrap());
static SUB_JAPANESE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)JPN|JP|日文|日语|日").unwrap());
static SUB_ENGLISH: Lazy<Regex> = Lazy::new(|| Regex::new(r"英文|英语|英").unwrap());

static SUB_TYPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"外挂|内封|内嵌|硬字幕|软字幕|ASS|SRT|双语").unwrap());

static NOISE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\d{1,2}月新番",
        r"招募[^\[\]]*",
        r"新番",
        r"\d{4}\.\d{1,2}\.\d{1,2}",
        r"中文",
        r"字幕",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

static COLLECTION_RANGED: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"第(\d+)-(\d+)[话集話]",
        r"第?(\d+)-(\d+)[话集話]",
        r"\[(\d+)-(\d+)\]",
        r"(?i)vol\.(\d+)-(\d+)",
        r"[Ss](\d+)-[Ss](\d+)",
        r"[^Ss0-9](\d{1,3})-(\d{1,3})",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

static COLLECTION_UNRANGED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"全\d*[话集]|(?i)vol\.\d+\b").unwrap());

static VERSION_WITH_DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)[vV](\d+)").unwrap());
static VERSION_STANDALONE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bv(\d+)\b").unwrap());

static TRUSTED_EPISODE_SIMPLE: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\bE(\d+)\b",
        r"\b(\d+)END\b",
        r"\b(\d+)pre\b",
        r"(?i)EP(\d+)",
        r"\[(\d+)\]",
        r"[Ss]\d+[Ee](\d+)",
        r"(\d+)[vV](\d+)",
        r"(?i)(\d+)Fin\b",
        r"-\s(\d+)\s",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

static TRUSTED_EPISODE_CHINESE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"第([0-9一二三四五六七八九十百零〇壹贰叁肆伍陆柒捌玖拾]+)[话集話]").unwrap()
});

static UNTRUSTED_EPISODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{1,4}").unwrap());

static TRUSTED_SEASON_KANJI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"第([0-9一二三四五六七八九十百零〇壹贰叁肆伍陆柒捌玖拾]+)(季|期|部分)").unwrap()
});
static TRUSTED_SEASON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)Season\s*(\d+)").unwrap());
static TRUSTED_SEASON_LETTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bS(\d+)\b").unwrap());
static TRUSTED_SEASON_ORDINAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+)(?:nd|rd|th)\s*Season").unwrap());
static TRUSTED_SEASON_PART: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)part\s*(\d+)").unwrap());
static TRUSTED_SEASON_ROMAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(III|IV|II|V|I)\b").unwrap());

static UNTRUSTED_SEASON: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{1,2}").unwrap());

static POINT_FIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+\.5(话|集|EP|pre|END|[vV])").unwrap());
static VERSION_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)v\d+$").unwrap());

/// Remove the first match of `re` from `text`, returning the matched text if any.
fn consume_first(text: &mut String, re: &Regex) -> Option<String> {
    let m = re.find(text)?;
    let (start, end) = (m.start(), m.end());
    let matched = m.as_str().to_string();
    text.replace_range(start..end, "");
    Some(matched)
}

/// Remove every match of `re` from `text`, returning the matched texts in order of
/// appearance.
fn consume_all(text: &mut String, re: &Regex) -> Vec<String> {
    let mut out = Vec::new();
    while let Some(matched) = consume_first(text, re) {
        out.push(matched);
    }
    out
}

/// Remove the first match of `re`, returning its capture groups (1-indexed) as owned
/// strings.
fn consume_first_groups(text: &mut String, re: &Regex) -> Option<Vec<Option<String>>> {
    let caps = re.captures(text)?;
    let whole = caps.get(0)?;
    let (start, end) = (whole.start(), whole.end());
    let groups: Vec<Option<String>> = (1..caps.len())
        .map(|i| caps.get(i).map(|m| m.as_str().to_string()))
        .collect();
    text.replace_range(start..end, "");
    Some(groups)
}

/// Preprocess a raw torrent title: strip newlines, convert full-width brackets, trim,
/// and add the boundary anchors the later passes rely on.
fn preprocess(raw: &str) -> String {
    let cleaned = raw
        .replace(['\n', '\r'], "")
        .replace('【', "[")
        .replace('】', "]");
    format!("[{}/", cleaned.trim())
}

/// Parse a freeform torrent release title into structured episode metadata.
///
/// Deterministic: identical input always yields a byte-identical [`EpisodeMeta`].
#[must_use]
pub fn parse(raw_title: &str) -> EpisodeMeta {
    let mut text = preprocess(raw_title);
    let mut meta = EpisodeMeta::default();

    let group_hits = consume_all(&mut text, &groups::GROUP_PATTERN);
    if !group_hits.is_empty() {
        meta.group = Some(group_hits.join("&"));
    }

    if let Some(year_match) = consume_first(&mut text, &YEAR) {
        meta.year = year_match.trim_matches(['(', ')', '[', ']']).parse().ok();
    }

    if let Some(source) = consume_first(&mut text, &SOURCE) {
        meta.source = Some(source);
    }

    if let Some(resolution) = consume_first(&mut text, &RESOLUTION) {
        meta.resolution = Some(resolution);
    }

    if let Some(audio) = consume_first(&mut text, &AUDIO) {
        meta.audio = Some(audio);
    }

    let video_hits: Vec<String> = consume_all(&mut text, &VIDEO)
        .iter()
        .map(|hit| hit.trim_start_matches(|c: char| !c.is_alphanumeric()).to_string())
        .collect();
    if !video_hits.is_empty() {
        meta.video = Some(video_hits.join(" "));
    }

    let mut subtitle_language = String::new();
    if consume_first(&mut text, &SUB_SIMPLIFIED).is_some() {
        subtitle_language.push_str("简");
    }
    if consume_first(&mut text, &SUB_TRADITIONAL).is_some() {
        subtitle_language.push_str("繁");
    }
    if consume_first(&mut text, &SUB_JAPANESE).is_some() {
        subtitle_language.push_str("日");
    }
    if consume_first(&mut text, &SUB_ENGLISH).is_some() {
        subtitle_language.push_str("英");
    }
    if !subtitle_language.is_empty() {
        meta.subtitle_language = Some(subtitle_language);
    }

    if let Some(sub_type_match) = consume_first(&mut text, &SUB_TYPE) {
        meta.subtitle_type = classify_subtitle_type(&sub_type_match);
    }

    for noise in NOISE_PATTERNS.iter() {
        consume_all(&mut text, noise);
    }

    run_collection_pass(&mut text, &mut meta);
    run_version_pass(&mut text, &mut meta);

    if meta.is_collection {
        meta.episode = -1;
    } else {
        run_episode_pass(&mut text, &mut meta);
    }

    run_season_pass(&mut text, &mut meta);

    let tokens = title::split_bracket_tokens(&text);
    if let Some((winner_index, winner)) = title::pick_winning_token(&tokens) {
        let normalized = title::normalize_separators(&winner);
        meta.title = title::resolve_official_title(&normalized);

        if meta.group.is_none() {
            meta.group = tokens
                .iter()
                .enumerate()
                .find(|(index, _)| *index != winner_index)
                .map(|(_, token)| token.clone());
        }
    }

    meta
}

fn classify_subtitle_type(matched: &str) -> Option<SubtitleDeliveryType> {
    match matched {
        "外挂" => Some(SubtitleDeliveryType::External),
        "内封" => Some(SubtitleDeliveryType::Embedded),
        "内嵌" | "硬字幕" => Some(SubtitleDeliveryType::Hard),
        "软字幕" => Some(SubtitleDeliveryType::Soft),
        "ASS" | "SRT" => Some(SubtitleDeliveryType::Soft),
        _ => None,
    }
}

fn run_collection_pass(text: &mut String, meta: &mut EpisodeMeta) {
    for pattern in COLLECTION_RANGED.iter() {
        let Some(caps) = pattern.captures(text) else {
            continue;
        };
        let start = caps.get(1).and_then(|m| m.as_str().parse::<i32>().ok());
        let end = caps.get(2).and_then(|m| m.as_str().parse::<i32>().ok());
        if let (Some(start), Some(end)) = (start, end) {
            if start < end {
                let whole = caps.get(0).expect("whole match exists");
                let (range_start, range_end) = (whole.start(), whole.end());
                text.replace_range(range_start..range_end, "");
                meta.is_collection = true;
                meta.episode_start = Some(start);
                meta.episode_end = Some(end);
                return;
            }
        }
    }

    if consume_first(text, &COLLECTION_UNRANGED).is_some() {
        meta.is_collection = true;
    }
}

fn run_version_pass(text: &mut String, meta: &mut EpisodeMeta) {
    // `"<digits>v<digits>"` marks a re-release; only the `v<k>` suffix (the marker
    // itself) is consumed so the leading episode digits stay in place for the episode
    // pass that runs next.
    if let Some(caps) = VERSION_WITH_DIGIT.captures(text) {
        let whole = caps.get(0).expect("whole match exists");
        let version_digits = caps.get(2).expect("version group exists");
        if let Ok(version) = version_digits.as_str().parse::<i32>() {
            meta.version = version;
        }
        let suffix_start = version_digits.start() - 1; // include the v/V marker
        let suffix_end = whole.end();
        text.replace_range(suffix_start..suffix_end, "");
        return;
    }
    if let Some(groups) = consume_first_groups(text, &VERSION_STANDALONE) {
        if let Some(version) = groups[0].as_deref().and_then(|v| v.parse::<i32>().ok()) {
            meta.version = version;
        }
    }
}

fn run_episode_pass(text: &mut String, meta: &mut EpisodeMeta) {
    if let Some(groups) = consume_first_groups(text, &TRUSTED_EPISODE_CHINESE) {
        if let Some(value) = groups[0]
            .as_deref()
            .and_then(numerals::parse_chinese_numeral)
        {
            meta.episode = value;
            return;
        }
    }

    for pattern in TRUSTED_EPISODE_SIMPLE.iter() {
        if let Some(groups) = consume_first_groups(text, pattern) {
            if let Some(value) = groups
                .iter()
                .find_map(|group| group.as_deref().and_then(|s| s.parse::<i32>().ok()))
            {
                meta.episode = value;
                return;
            }
        }
    }

    let candidates: Vec<i32> = consume_all(text, &UNTRUSTED_EPISODE)
        .iter()
        .filter_map(|s| s.parse::<i32>().ok())
        .collect();
    meta.episode = resolve_untrusted_episode(&candidates);
}

fn resolve_untrusted_episode(candidates: &[i32]) -> i32 {
    const RESOLUTION_VALUES: [i32; 3] = [480, 720, 1080];
    match candidates {
        [] => 0,
        [only] => *only,
        [first, rest @ ..] => {
            if candidates.iter().all(|candidate| candidate == first) {
                return *first;
            }
            let second = rest[0];
            if !RESOLUTION_VALUES.contains(&second) {
                second
            } else {
                *first
            }
        }
    }
}

fn run_season_pass(text: &mut String, meta: &mut EpisodeMeta) {
    if let Some(groups) = consume_first_groups(text, &TRUSTED_SEASON_KANJI) {
        let unit = groups[1].as_deref().unwrap_or_default();
        if unit == "部分" {
            meta.season = 1;
        } else if let Some(value) = groups[0]
            .as_deref()
            .and_then(numerals::parse_chinese_numeral)
        {
            meta.season = value;
        }
        meta.season_raw = Some(format!(
            "第{}{}",
            groups[0].clone().unwrap_or_default(),
            unit
        ));
        return;
    }

    for (pattern, is_roman) in [
        (&*TRUSTED_SEASON_WORD, false),
        (&*TRUSTED_SEASON_LETTER, false),
        (&*TRUSTED_SEASON_ORDINAL, false),
        (&*TRUSTED_SEASON_PART, false),
        (&*TRUSTED_SEASON_ROMAN, true),
    ] {
        if let Some(groups) = consume_first_groups(text, pattern) {
            let raw = groups[0].clone().unwrap_or_default();
            let value = if is_roman {
                numerals::parse_roman_numeral(&raw)
            } else {
                raw.parse::<i32>().ok()
            };
            if let Some(value) = value {
                meta.season = value;
                meta.season_raw = Some(raw);
                return;
            }
        }
    }

    if let Some(matched) = consume_first(text, &UNTRUSTED_SEASON) {
        if let Ok(value) = matched.parse::<i32>() {
            meta.season = value;
            meta.season_raw = Some(matched);
        }
    }
}

/// True when `title` names a `.5` fractional episode (a partial/special release that
/// should never be renamed as a whole episode).
#[must_use]
pub fn is_collection_point_5(title: &str) -> bool {
    POINT_FIVE.is_match(title)
}

/// True when `title` carries an explicit `v<N>` version suffix.
#[must_use]
pub fn is_version(title: &str) -> bool {
    VERSION_SUFFIX.is_match(title)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s1_trusted_episode_season_and_group() {
        let meta = parse(
            "【幻樱字幕组】【4月新番】【古见同学有交流障碍症 第二季 Komi-san wa, Komyushou Desu. S02】【22】【GB_MP4】【1920X1080】",
        );
        assert_eq!(meta.group.as_deref(), Some("幻樱字幕组"));
        assert_eq!(meta.title, "古见同学有交流障碍症");
        assert_eq!(meta.season, 2);
        assert_eq!(meta.episode, 22);
        assert_eq!(meta.resolution.as_deref(), Some("1920X1080"));
        assert_eq!(meta.subtitle_language.as_deref(), Some("简"));
        assert!(!meta.is_collection);
        assert_eq!(meta.version, 1);
    }

    #[test]
    fn s2_collection_with_range() {
        let meta = parse("【安達與島村】【第01-02話】【1080P】【繁體中文】【AVC】");
        assert_eq!(meta.title, "安達與島村");
        assert_eq!(meta.episode, -1);
        assert!(meta.is_collection);
        assert_eq!(meta.episode_start, Some(1));
        assert_eq!(meta.episode_end, Some(2));
        assert_eq!(meta.resolution.as_deref(), Some("1080P"));
        assert_eq!(meta.subtitle_language.as_deref(), Some("繁"));
    }

    #[test]
    fn s3_v2_re_release() {
        let meta = parse(
            "[喵萌Production&LoliHouse] 偶像大师 灰姑娘女孩 U149 / THE IDOLM@STER CINDERELLA GIRLS U149 - 04v2 [WebRip 1080p HEVC-10bit AAC][简繁日内封字幕]",
        );
        assert_eq!(meta.episode, 4);
        assert_eq!(meta.version, 2);
        assert_eq!(meta.subtitle_language.as_deref(), Some("简繁日"));
        assert_eq!(meta.resolution.as_deref(), Some("1080p"));
    }

    #[test]
    fn invariant_collection_implies_negative_one_episode() {
        let meta = parse("【字幕组】【全12话】【1080p】");
        assert!(meta.is_collection);
        assert_eq!(meta.episode, -1);
    }

    #[test]
    fn invariant_version_defaults_to_one() {
        let meta = parse("[Group] Some Show [01][1080p]");
        assert_eq!(meta.version, 1);
    }

    #[test]
    fn determinism_across_repeated_parses() {
        let input = "【幻樱字幕组】【古见同学有交流障碍症】【01】【1080p】";
        let first = parse(input);
        let second = parse(input);
        assert_eq!(first, second);
    }

    #[test]
    fn point_five_detection() {
        assert!(is_collection_point_5("Show - 12.5END"));
        assert!(!is_collection_point_5("Show - 12"));
    }

    #[test]
    fn version_suffix_detection() {
        assert!(is_version("Show - 12v2"));
        assert!(!is_version("Show - 12"));
    }
}
