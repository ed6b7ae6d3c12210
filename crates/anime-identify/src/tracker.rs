//! Tracker homepage scrape: RSS link / `bangumiId`, displayed title, poster.

use anime_core::{CoreError, CoreResult};
use anime_net::NetClient;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

static POSTER_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r#"url\((['"]?)([^'")]+)\1\)"#).unwrap());
static BANGUMI_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"bangumiId=(\d+)").unwrap());
static SEASON_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"第([〇零一二三四五六七八九十百千壹贰貳両兩叁參肆伍陆陸柒捌玖拾]+)季\s*$").unwrap());

/// What a tracker homepage scrape yields. The RSS link (and its embedded `bangumiId`) is
/// required; title and poster are best-effort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerScrape {
    /// Integer `bangumiId` extracted from the tracker's RSS link.
    pub bangumi_id: i64,
    /// Displayed title with any trailing season suffix stripped.
    pub title: Option<String>,
    /// Season number implied by a stripped suffix; `1` when no suffix was present.
    pub season: i32,
    /// Poster URL, absolutized against the page's own scheme/host.
    pub poster_url: Option<String>,
}

/// Fetch and scrape `homepage`. Fails with [`CoreError::Parse`] if no RSS link /
/// `bangumiId` can be found; network failures propagate unchanged.
pub async fn scrape(client: &NetClient, homepage: &str) -> CoreResult<TrackerScrape> {
    let bytes = client.get(homepage).await?;
    let body = String::from_utf8_lossy(&bytes);
    let document = Html::parse_document(&body);

    let bangumi_id = find_bangumi_id(&document).ok_or(CoreError::parse("tracker-rss-link"))?;
    let title = find_title(&document);
    let poster_url = find_poster_url(&document).map(|url| absolutize(homepage, &url));

    let (title, season) = match title {
        Some(raw) => strip_season_suffix(&raw),
        None => (None, 1),
    };

    Ok(TrackerScrape {
        bangumi_id,
        title,
        season,
        poster_url,
    })
}

fn find_bangumi_id(document: &Html) -> Option<i64> {
    let selector = Selector::parse("a[href]").ok()?;
    document.select(&selector).find_map(|el| {
        let href = el.value().attr("href")?;
        BANGUMI_ID
            .captures(href)
            .and_then(|caps| caps.get(1)?.as_str().parse().ok())
    })
}

fn find_title(document: &Html) -> Option<String> {
    let selector = Selector::parse(".bangumi-title").ok()?;
    let text: String = document.select(&selector).next()?.text().collect();
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn find_poster_url(document: &Html) -> Option<String> {
    let selector = Selector::parse(".bangumi-poster").ok()?;
    let style = document.select(&selector).next()?.value().attr("style")?;
    POSTER_URL
        .captures(style)
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str().to_string())
}

/// Strip a trailing `第N季` suffix (Chinese digit), returning the remaining title and the
/// season it implies. Season defaults to `1` when no suffix is present or it fails to parse.
fn strip_season_suffix(title: &str) -> (Option<String>, i32) {
    match SEASON_SUFFIX.captures(title) {
        Some(caps) => {
            let digits = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let season = anime_parser::parse_chinese_numeral(digits).unwrap_or(1);
            let stripped = SEASON_SUFFIX.replace(title, "");
            let stripped = stripped.trim();
            (
                (!stripped.is_empty()).then(|| stripped.to_string()),
                season,
            )
        }
        None => (Some(title.to_string()), 1),
    }
}

fn absolutize(homepage: &str, maybe_relative: &str) -> String {
    if maybe_relative.starts_with("http://") || maybe_relative.starts_with("https://") {
        return maybe_relative.to_string();
    }
    let scheme_end = homepage.find("://").map(|i| i + 3).unwrap_or(0);
    let authority_end = homepage[scheme_end..]
        .find('/')
        .map(|i| scheme_end + i)
        .unwrap_or(homepage.len());
    let origin = &homepage[..authority_end];
    if let Some(stripped) = maybe_relative.strip_prefix('/') {
        format!("{origin}/{stripped}")
    } else {
        format!("{origin}/{maybe_relative}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    fn serve_once(body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            use std::io::{Read, Write};
            let mut buf = [0u8; 1024];
            let _ = stream.read(&mut buf);
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nContent-Type: text/html\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes());
        });
        format!("http://{addr}/")
    }

    #[test]
    fn strips_chinese_season_suffix() {
        let (title, season) = strip_season_suffix("败犬女主太多了 第二季");
        assert_eq!(title.as_deref(), Some("败犬女主太多了"));
        assert_eq!(season, 2);
    }

    #[test]
    fn leaves_title_without_suffix_untouched() {
        let (title, season) = strip_season_suffix("败犬女主太多了");
        assert_eq!(title.as_deref(), Some("败犬女主太多了"));
        assert_eq!(season, 1);
    }

    #[test]
    fn absolutizes_relative_poster_path() {
        let url = absolutize("https://mikanani.me/Home/Bangumi/123", "/images/Bangumi/123.jpg");
        assert_eq!(url, "https://mikanani.me/images/Bangumi/123.jpg");
    }

    #[test]
    fn leaves_absolute_poster_url_untouched() {
        let url = absolutize("https://mikanani.me/Home/Bangumi/123", "https://cdn.example.com/p.jpg");
        assert_eq!(url, "https://cdn.example.com/p.jpg");
    }

    #[tokio::test]
    async fn scrapes_bangumi_id_title_and_poster() {
        let body = r#"<html><body>
            <div class="bangumi-title">败犬女主太多了 第二季</div>
            <div class="bangumi-poster" style="background-image: url('/images/Bangumi/42.jpg')"></div>
            <a class="mikan-rss" href="/RSS/Bangumi?bangumiId=42">RSS</a>
        </body></html>"#;
        let url = serve_once(body);
        let client = NetClient::new(anime_net::NetClientConfig::default()).unwrap();
        let result = scrape(&client, &url).await.unwrap();
        assert_eq!(result.bangumi_id, 42);
        assert_eq!(result.title.as_deref(), Some("败犬女主太多了"));
        assert_eq!(result.season, 2);
        assert_eq!(
            result.poster_url.as_deref(),
            Some(format!("{}images/Bangumi/42.jpg", url).as_str())
        );
    }

    #[tokio::test]
    async fn fails_parse_when_rss_link_absent() {
        let body = "<html><body><div>no rss here</div></body></html>";
        let url = serve_once(body);
        let client = NetClient::new(anime_net::NetClientConfig::default()).unwrap();
        let err = scrape(&client, &url).await.unwrap_err();
        assert!(matches!(err, CoreError::Parse { context: "tracker-rss-link", .. }));
    }
}
