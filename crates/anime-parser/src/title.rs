//! Title-token extraction and script classification.

/// Script a title slice is predominantly written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Script {
    Chinese,
    Japanese,
    English,
}

fn is_han(c: char) -> bool {
    matches!(c, '\u{4E00}'..='\u{9FFF}')
}

fn is_kana(c: char) -> bool {
    matches!(c, '\u{3040}'..='\u{309F}' | '\u{30A0}'..='\u{30FF}')
}

fn han_count(s: &str) -> usize {
    s.chars().filter(|c| is_han(*c)).count()
}

fn kana_count(s: &str) -> usize {
    s.chars().filter(|c| is_kana(*c)).count()
}

fn has_run_of_ascii_letters(s: &str, min_run: usize) -> bool {
    let mut run = 0usize;
    for c in s.chars() {
        if c.is_ascii_alphabetic() {
            run += 1;
            if run >= min_run {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}

/// Split the fully-consumed remainder string on the bracket characters, trimming and
/// dropping empty tokens.
#[must_use]
pub fn split_bracket_tokens(text: &str) -> Vec<String> {
    text.split(['[', ']'])
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

fn score_token(token: &str, index: usize) -> i64 {
    let mut score = i64::try_from(token.chars().count()).unwrap_or(i64::MAX);
    if index == 1 {
        score += 4;
    }
    if token.contains('/') {
        score += 10;
    }
    if token.contains('&') {
        score -= 12;
    }
    if token.contains("字幕") {
        score -= 90;
    }
    if has_run_of_ascii_letters(token, 3) {
        score += 2;
    }
    let kana = kana_count(token);
    if kana >= 2 {
        score += i64::try_from(kana * 2).unwrap_or(i64::MAX);
    }
    let hanzi = han_count(token);
    if hanzi >= 2 {
        score += i64::try_from(hanzi * 2).unwrap_or(i64::MAX);
    }
    score
}

/// Pick the winning token among `tokens` per the scoring rules below, plus the index of
/// the token that won (used by the caller to pick a group fallback from a leftover token).
#[must_use]
pub fn pick_winning_token(tokens: &[String]) -> Option<(usize, String)> {
    match tokens.len() {
        0 => None,
        1 => Some((0, tokens[0].clone())),
        2 => Some((1, tokens[1].clone())),
        _ => {
            let candidates = tokens.len().min(3);
            // Manual fold with strict `>` rather than `Iterator::max_by_key`: the latter
            // keeps the *last* element on a score tie, but the ground truth keeps the
            // *first* token on a tie.
            let mut best: Option<(usize, i64)> = None;
            for index in 0..candidates {
                let score = score_token(&tokens[index], index);
                if best.is_none_or(|(_, best_score)| score > best_score) {
                    best = Some((index, score));
                }
            }
            best.map(|(index, _)| (index, tokens[index].clone()))
        }
    }
}

/// Normalize a winning token's internal separators into `/`, matching the source's
/// `"  "` / `"-  "` -> `"/"` rewrite before splitting into language slices.
#[must_use]
pub fn normalize_separators(token: &str) -> String {
    token.replace("-  ", "/").replace("  ", "/")
}

/// Classify the normalized token's `/`-separated slices into Chinese/Japanese/English
/// buckets and return the first non-empty one in that priority order.
#[must_use]
pub fn resolve_official_title(normalized: &str) -> String {
    let mut slices: Vec<String> = normalized
        .split('/')
        .map(str::trim)
        .filter(|slice| !slice.is_empty())
        .map(str::to_string)
        .collect();

    if slices.len() == 1 {
        slices = peel_chinese_run_if_needed(&slices[0]);
    }

    let mut chinese: Option<String> = None;
    let mut japanese: Option<String> = None;
    let mut english: Option<String> = None;

    for slice in &slices {
        match classify(slice) {
            Script::Chinese if chinese.is_none() => chinese = Some(slice.clone()),
            Script::Japanese if japanese.is_none() => japanese = Some(slice.clone()),
            Script::English if english.is_none() => english = Some(slice.clone()),
            _ => {}
        }
    }

    chinese
        .or(japanese)
        .or(english)
        .unwrap_or_else(|| normalized.trim().to_string())
}

/// When a single slice survives and isn't overwhelmingly Chinese, peel off a leading or
/// trailing run of >=2 Han characters as its own slice.
fn peel_chinese_run_if_needed(slice: &str) -> Vec<String> {
    let len = slice.chars().count();
    if len == 0 {
        return vec![slice.to_string()];
    }
    let ratio = han_count(slice) as f64 / len as f64;
    if ratio > 0.7 {
        return vec![slice.to_string()];
    }

    let chars: Vec<char> = slice.chars().collect();
    let leading_run = chars.iter().take_while(|c| is_han(**c)).count();
    if leading_run >= 2 {
        let run: String = chars[..leading_run].iter().collect();
        let rest: String = chars[leading_run..].iter().collect();
        return vec![run, rest.trim().to_string()];
    }

    let trailing_run = chars.iter().rev().take_while(|c| is_han(**c)).count();
    if trailing_run >= 2 {
        let split_at = chars.len() - trailing_run;
        let rest: String = chars[..split_at].iter().collect();
        let run: String = chars[split_at..].iter().collect();
        return vec![rest.trim().to_string(), run];
    }

    vec![slice.to_string()]
}

fn classify(slice: &str) -> Script {
    let kana = kana_count(slice);
    if kana > 0 {
        return Script::Japanese;
    }
    let han = han_count(slice);
    let latin = slice.chars().filter(char::is_ascii_alphabetic).count();
    if han > 0 && han >= latin {
        Script::Chinese
    } else {
        Script::English
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_token_wins_outright() {
        let tokens = vec!["安達與島村".to_string()];
        assert_eq!(pick_winning_token(&tokens), Some((0, "安達與島村".to_string())));
    }

    #[test]
    fn two_tokens_take_the_second() {
        let tokens = vec!["&".to_string(), "Show Title".to_string()];
        assert_eq!(
            pick_winning_token(&tokens),
            Some((1, "Show Title".to_string()))
        );
    }

    #[test]
    fn three_plus_tokens_score_and_pick_max() {
        let tokens = vec![
            "幻樱字幕组".to_string(),
            "古见同学有交流障碍症 / Komi-san".to_string(),
            "GB_MP4".to_string(),
        ];
        let (index, winner) = pick_winning_token(&tokens).expect("winner");
        assert_eq!(index, 1);
        assert_eq!(winner, "古见同学有交流障碍症 / Komi-san");
    }

    #[test]
    fn tied_score_keeps_the_first_token() {
        // index 0 scores 5 from its length alone; index 1 is a 1-char token that reaches
        // the same score of 5 only via its +4 "index == 1" bonus; index 2 scores lower.
        // A genuine tie between index 0 and index 1 must resolve to index 0.
        let tokens = vec!["12345".to_string(), "1".to_string(), "x".to_string()];
        let (index, winner) = pick_winning_token(&tokens).expect("winner");
        assert_eq!(index, 0, "tie between equally-scored tokens must keep the first");
        assert_eq!(winner, "12345");
    }

    #[test]
    fn resolves_chinese_title_over_english_slice() {
        let normalized = normalize_separators("偶像大师 灰姑娘女孩 U149 / THE IDOLM@STER U149");
        let title = resolve_official_title(&normalized);
        assert_eq!(title, "偶像大师 灰姑娘女孩 U149");
    }

    #[test]
    fn single_slice_mostly_chinese_stays_whole() {
        let title = resolve_official_title("安達與島村");
        assert_eq!(title, "安達與島村");
    }
}
