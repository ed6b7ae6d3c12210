//! The RSS refresh pipeline (SPEC_FULL §4.4): polls every enabled RSS source, resolves
//! novel torrents into shows (discovering new ones via identification), and dispatches
//! admitted torrents into the download queue.
//!
//! Per source, each cycle:
//! 1. fetch and normalize the feed's torrent items,
//! 2. drop anything already known to persistence,
//! 3. group the rest by parsed title and resolve each group to a `Show` — identifying a
//!    new one when no show matches yet,
//! 4. filter-admit and enqueue every torrent in a resolved group, persisting it either way
//!    so it is never reconsidered.
//!
//! Show-discovery and download-dispatch aren't really parallel sub-flows here: a newly
//! discovered group's torrents still need dispatching, so resolution folds into dispatch
//! for every group rather than only for groups that already had a known show.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anime_config::RssParserConfig;
use anime_core::model::{DownloadState, ParserTag, RssSource, Show, TmdbRecord, Torrent, TrackerRecord};
use anime_data::{DataStore, ParsedTitleCandidate, ShowCandidate};
use anime_download::DownloadQueue;
use anime_net::NetClient;
use anime_net::rss::TorrentListItem;
use anime_telemetry::{Metrics, TorrentStage};
use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::filter::Filter;

const INTER_SOURCE_DELAY: Duration = Duration::from_secs(2);
const MINIMUM_REFRESH_PERIOD: Duration = Duration::from_secs(900);

/// Scheduled task driving one refresh cycle over every enabled RSS source.
pub struct RefreshTask {
    net: Arc<NetClient>,
    store: Arc<DataStore>,
    queue: Arc<DownloadQueue>,
    metrics: Metrics,
    tmdb_api_key: String,
    default_exclude: String,
    default_include: String,
    period: Duration,
    enabled: bool,
}

impl RefreshTask {
    /// Build a refresh task from the `rss_parser` config section.
    #[must_use]
    pub fn new(
        net: Arc<NetClient>,
        store: Arc<DataStore>,
        queue: Arc<DownloadQueue>,
        metrics: Metrics,
        config: &RssParserConfig,
        rss_time_secs: u64,
    ) -> Self {
        Self {
            net,
            store,
            queue,
            metrics,
            tmdb_api_key: config.tmdb_api_key.clone().unwrap_or_default(),
            default_exclude: config.filter.join(","),
            default_include: config.include.join(","),
            period: Duration::from_secs(rss_time_secs).max(MINIMUM_REFRESH_PERIOD),
            enabled: config.enable,
        }
    }

    async fn run_cycle(&self, cancel: &CancellationToken) -> anyhow::Result<()> {
        let sources = self.store.list_active_rss_sources().await?;
        let mut first = true;
        for source in sources {
            if cancel.is_cancelled() {
                break;
            }
            if !first {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(INTER_SOURCE_DELAY) => {}
                }
            }
            first = false;

            if let Err(err) = self.refresh_source(&source, cancel).await {
                warn!(source = %source.url, error = %err, "refresh source failed, continuing to next source");
            }
        }
        Ok(())
    }

    async fn refresh_source(&self, source: &RssSource, cancel: &CancellationToken) -> anyhow::Result<()> {
        let items = self.net.get_torrents(&source.url).await?;
        let urls: Vec<String> = items.iter().map(|item| item.url.clone()).collect();
        let novel_urls = self.store.check_new_torrents(&urls).await?;
        let novel: std::collections::HashSet<&str> = novel_urls.iter().map(String::as_str).collect();

        let mut groups: HashMap<String, Vec<&TorrentListItem>> = HashMap::new();
        for item in &items {
            if !novel.contains(item.url.as_str()) {
                continue;
            }
            let meta = anime_parser::parse(&item.name);
            groups.entry(meta.title).or_default().push(item);
        }

        debug!(source = %source.url, groups = groups.len(), "grouped novel torrents by parsed title");

        for (title, group) in groups {
            if cancel.is_cancelled() {
                break;
            }
            self.resolve_and_dispatch(source, &title, group, cancel).await;
        }
        Ok(())
    }

    async fn resolve_and_dispatch(
        &self,
        source: &RssSource,
        title: &str,
        group: Vec<&TorrentListItem>,
        cancel: &CancellationToken,
    ) {
        let Some(representative) = group.first().copied() else {
            return;
        };

        let show = match self.store.get_show_by_official_title(title).await {
            Ok(Some(show)) => show,
            Ok(None) => match self.identify_and_create(source, representative).await {
                Ok(show) => show,
                Err(err) => {
                    warn!(title, error = %err, "could not identify new show, skipping group this cycle");
                    return;
                }
            },
            Err(err) => {
                warn!(title, error = %err, "show lookup failed, skipping group this cycle");
                return;
            }
        };

        for item in group {
            self.dispatch_item(source, &show, item, cancel).await;
        }
    }

    async fn identify_and_create(&self, source: &RssSource, item: &TorrentListItem) -> anyhow::Result<Show> {
        let homepage = non_empty(&item.homepage);
        let torrent = Torrent {
            url: item.url.clone(),
            display_name: item.name.clone(),
            downloaded: DownloadState::Enqueued,
            renamed: false,
            download_uid: None,
            show_id: 0,
            homepage,
            created_at: Utc::now(),
        };

        let started = Instant::now();
        let identification =
            anime_identify::identify(&self.net, &torrent, &self.tmdb_api_key, Utc::now().date_naive()).await?;
        self.metrics.observe_identify_latency(started.elapsed());

        let meta = anime_parser::parse(&item.name);
        let parser_tag = if identification.tracker_id.is_some() {
            ParserTag::Mikan
        } else {
            ParserTag::Tmdb
        };

        let tracker = identification.tracker_id.map(|id| TrackerRecord {
            id,
            title: identification.title.clone(),
            season: identification.season,
            poster_url: identification.poster_url.clone(),
        });
        let tmdb = identification.tmdb_id.map(|id| TmdbRecord {
            id,
            localized_title: identification.title.clone(),
            original_title: identification.title.clone(),
            year: identification
                .year
                .unwrap_or_else(|| Utc::now().date_naive().format("%Y").to_string().parse::<i32>().unwrap_or(0)),
            season: identification.season,
            air_date: None,
            episode_count: 0,
            poster_url: identification.poster_url.clone(),
            average_vote: 0.0,
        });

        let candidate = ShowCandidate {
            official_title: identification.title,
            year: identification.year,
            season: identification.season,
            poster_url: identification.poster_url,
            parser_tag,
            tracker,
            tmdb,
            parsed_title: ParsedTitleCandidate {
                raw_title: item.name.clone(),
                group: meta.group,
                season: meta.season,
                season_raw: meta.season_raw,
                resolution: meta.resolution,
                subtitle_language: meta.subtitle_language,
                subtitle_type: meta.subtitle_type,
                source: meta.source,
                audio: meta.audio,
                video: meta.video,
                version: meta.version,
            },
            rss_source_url: Some(source.url.clone()),
        };

        let show = self.store.create_show(candidate).await?;
        info!(show_id = show.id, title = %show.official_title, "discovered new show");
        Ok(show)
    }

    async fn dispatch_item(&self, source: &RssSource, show: &Show, item: &TorrentListItem, cancel: &CancellationToken) {
        let homepage = non_empty(&item.homepage);
        let torrent = Torrent {
            url: item.url.clone(),
            display_name: item.name.clone(),
            downloaded: DownloadState::Enqueued,
            renamed: false,
            download_uid: None,
            show_id: show.id,
            homepage,
            created_at: Utc::now(),
        };

        let exclude = show
            .exclude_pattern
            .clone()
            .or_else(|| source.exclude_override.clone())
            .or_else(|| non_empty(&self.default_exclude));
        let include = show
            .include_pattern
            .clone()
            .or_else(|| source.include_override.clone())
            .or_else(|| non_empty(&self.default_include));

        let filter = Filter::new(exclude.as_deref(), include.as_deref());
        if filter.admits(&item.name, &self.metrics) {
            self.queue.add(cancel, torrent.clone(), show.clone()).await;
            self.metrics.inc_torrent_stage(TorrentStage::Enqueued);
        } else {
            debug!(url = %torrent.url, "torrent rejected by admission filter");
        }

        if let Err(err) = self.store.create_torrent(&torrent).await {
            warn!(url = %torrent.url, error = %err, "failed to persist torrent row");
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[async_trait]
impl anime_scheduler::ScheduledTask for RefreshTask {
    fn name(&self) -> &str {
        "rss-refresh"
    }

    fn interval(&self) -> Duration {
        self.period
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn run(&self, ctx: CancellationToken) -> anyhow::Result<()> {
        self.run_cycle(&ctx).await
    }
}

#[cfg(test)]
mod tests {
    use anime_download::DownloadSession;
    use anime_scheduler::ScheduledTask;
    use anime_test_support::fixtures::{FakeDownloader, FakeDownloaderBehavior};

    use super::*;

    #[test]
    fn non_empty_treats_blank_and_whitespace_as_absent() {
        assert_eq!(non_empty(""), None);
        assert_eq!(non_empty("   "), None);
        assert_eq!(non_empty("http://tracker.example/item/1"), Some("http://tracker.example/item/1".to_string()));
    }

    #[tokio::test]
    async fn period_floors_to_900_seconds() {
        let net = Arc::new(NetClient::new(anime_net::NetClientConfig::default()).expect("net client"));
        let store = Arc::new(DataStore::connect("sqlite::memory:").await.expect("in-memory store"));
        let cancel = CancellationToken::new();
        let session =
            DownloadSession::spawn(Arc::new(FakeDownloader::new(FakeDownloaderBehavior::default())), cancel.clone());
        let queue = Arc::new(DownloadQueue::new(
            session,
            NetClient::new(anime_net::NetClientConfig::default()).expect("net client"),
            "/downloads".to_string(),
            anime_events::EventBus::new(),
        ));
        let metrics = Metrics::new().expect("metrics");

        let short = RefreshTask::new(net.clone(), store.clone(), queue.clone(), metrics.clone(), &RssParserConfig::default(), 60);
        assert_eq!(short.interval(), Duration::from_secs(900));

        let long = RefreshTask::new(net, store, queue, metrics, &RssParserConfig::default(), 1_800);
        assert_eq!(long.interval(), Duration::from_secs(1_800));
    }

    #[tokio::test]
    async fn enabled_mirrors_config() {
        let net = Arc::new(NetClient::new(anime_net::NetClientConfig::default()).expect("net client"));
        let store = Arc::new(DataStore::connect("sqlite::memory:").await.expect("in-memory store"));
        let cancel = CancellationToken::new();
        let session =
            DownloadSession::spawn(Arc::new(FakeDownloader::new(FakeDownloaderBehavior::default())), cancel.clone());
        let queue = Arc::new(DownloadQueue::new(
            session,
            NetClient::new(anime_net::NetClientConfig::default()).expect("net client"),
            "/downloads".to_string(),
            anime_events::EventBus::new(),
        ));
        let metrics = Metrics::new().expect("metrics");

        let mut config = RssParserConfig::default();
        config.enable = false;
        let task = RefreshTask::new(net, store, queue, metrics, &config, 900);
        assert!(!task.enabled());
    }
}
