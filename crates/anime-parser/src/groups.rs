//! The closed whitelist of known fansub groups.

use once_cell::sync::Lazy;
use regex::Regex;

/// Known fansub group names, longest first so the alternation prefers the longest match
/// at any given start position.
const GROUPS: &[&str] = &[
    "喵萌奶茶屋",
    "喵萌Production",
    "悠哈璃羽字幕社",
    "霜庭云花Sub",
    "诸神字幕组",
    "动漫国字幕组",
    "幻樱字幕组",
    "桜都字幕组",
    "极影字幕社",
    "漫猫字幕社",
    "雪飘工作室",
    "爱恋字幕社",
    "千夏字幕组",
    "幻月字幕组",
    "异域字幕组",
    "星空字幕组",
    "神帆字幕组",
    "北宇治字幕组",
    "中肯字幕组",
    "风车字幕组",
    "冷番补完计划",
    "离谱Sub",
    "MCE汉化组",
    "GM-Team",
    "轻之国度",
    "动漫花园",
    "Nekomoe kissaten",
    "Lilith-Raws",
    "NC-Raws",
    "Sakura-Moe",
    "Skymoon-Raws",
    "DBD-Raws",
    "VCB-Studio",
    "U2-Raws",
    "Airota",
    "Beatrice-Raws",
    "ReinForce",
    "SBSUB",
    "LoliHouse",
    "SweetSub",
    "HYSUB",
    "ZERO字幕组",
    "YYDM",
    "JYFI",
    "ANi",
    "c.c動漫",
    "澄空学园",
    "银色子弹",
    "天月动漫",
    "KTXP",
    "UHA-WINGS",
    "OldTimes",
    "Tsubasa Subs",
    "Yui Subs",
    "Prefers",
    "EMTP",
];

pub(crate) static GROUP_PATTERN: Lazy<Regex> = Lazy::new(|| {
    let mut sorted: Vec<&str> = GROUPS.to_vec();
    sorted.sort_by_key(|name| std::cmp::Reverse(name.chars().count()));
    let escaped: Vec<String> = sorted.iter().map(|name| regex::escape(name)).collect();
    Regex::new(&escaped.join("|")).expect("group whitelist pattern compiles")
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_matches_known_group() {
        assert!(GROUP_PATTERN.is_match("幻樱字幕组"));
    }

    #[test]
    fn pattern_prefers_longest_overlapping_name() {
        let m = GROUP_PATTERN.find("喵萌Production&LoliHouse").expect("match");
        assert_eq!(m.as_str(), "喵萌Production");
    }
}
