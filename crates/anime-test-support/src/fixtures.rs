//! Fixture builders and an in-memory fake [`Downloader`] shared across the
//! pipeline crates' test suites.

use std::sync::Mutex;

use anime_core::model::{
    DownloadState, EpisodeMeta, ParserTag, Show, Torrent, TorrentFileEntry, TorrentInfo,
    TorrentInfoSnapshot,
};
use anime_core::{CoreError, CoreResult, Downloader};
use async_trait::async_trait;
use chrono::Utc;

/// A canned outcome a [`FakeDownloader`] call should produce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FakeOutcome {
    /// Succeed normally.
    #[default]
    Ok,
    /// Fail with [`CoreError::Network`].
    NetworkError(u16),
    /// Fail with [`CoreError::DownloadAuth`].
    AuthError,
    /// Fail with [`CoreError::DownloadForbidden`].
    ForbiddenError,
}

impl FakeOutcome {
    fn into_result<T>(self, ok: T) -> CoreResult<T> {
        match self {
            Self::Ok => Ok(ok),
            Self::NetworkError(status) => Err(CoreError::Network { status }),
            Self::AuthError => Err(CoreError::DownloadAuth),
            Self::ForbiddenError => Err(CoreError::DownloadForbidden),
        }
    }
}

/// Construction-time behavior for a [`FakeDownloader`].
#[derive(Debug, Clone)]
pub struct FakeDownloaderBehavior {
    /// Outcome returned by `auth`.
    pub auth: FakeOutcome,
    /// Outcome returned by `add`.
    pub add: FakeOutcome,
    /// Outcome returned by `check_hash` when it succeeds (`Ok` yields `resolved_uid`).
    pub check_hash: FakeOutcome,
    /// UID `check_hash` resolves to when `check_hash` is [`FakeOutcome::Ok`]. `None`
    /// means "not resolved yet" without being an error.
    pub resolved_uid: Option<String>,
    /// Snapshot returned by `get_torrent_info`.
    pub snapshot: TorrentInfoSnapshot,
    /// Files returned by `get_torrent_files`.
    pub files: Vec<TorrentFileEntry>,
    /// Value `poll_interval_ms` reports.
    pub poll_interval_ms: u64,
}

impl Default for FakeDownloaderBehavior {
    fn default() -> Self {
        Self {
            auth: FakeOutcome::Ok,
            add: FakeOutcome::Ok,
            check_hash: FakeOutcome::Ok,
            resolved_uid: Some("fake-uid".to_string()),
            snapshot: TorrentInfoSnapshot {
                save_path: "/downloads/Demo Show/Season 1".to_string(),
                eta_seconds: 0,
                completed_at: 0,
            },
            files: Vec::new(),
            poll_interval_ms: 50,
        }
    }
}

/// In-memory fake implementing [`Downloader`], for session/queue/rename tests.
///
/// Every call is recorded in `calls()` order so tests can assert on the sequence of
/// operations a component issued, not just their outcomes.
pub struct FakeDownloader {
    behavior: Mutex<FakeDownloaderBehavior>,
    calls: Mutex<Vec<&'static str>>,
}

impl FakeDownloader {
    /// Build a fake with the given starting behavior.
    #[must_use]
    pub fn new(behavior: FakeDownloaderBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Replace the outcome `auth` produces on subsequent calls.
    pub fn set_auth_outcome(&self, outcome: FakeOutcome) {
        self.behavior.lock().expect("lock").auth = outcome;
    }

    /// Replace the outcome `check_hash` produces, and the UID it resolves to.
    pub fn set_check_hash(&self, outcome: FakeOutcome, resolved_uid: Option<String>) {
        let mut behavior = self.behavior.lock().expect("lock");
        behavior.check_hash = outcome;
        behavior.resolved_uid = resolved_uid;
    }

    /// Replace the snapshot `get_torrent_info` reports.
    pub fn set_snapshot(&self, snapshot: TorrentInfoSnapshot) {
        self.behavior.lock().expect("lock").snapshot = snapshot;
    }

    /// Replace the files `get_torrent_files` reports.
    pub fn set_files(&self, files: Vec<TorrentFileEntry>) {
        self.behavior.lock().expect("lock").files = files;
    }

    /// Operations invoked so far, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().expect("lock").clone()
    }

    fn record(&self, op: &'static str) {
        self.calls.lock().expect("lock").push(op);
    }
}

#[async_trait]
impl Downloader for FakeDownloader {
    async fn init(&self) -> CoreResult<()> {
        self.record("init");
        Ok(())
    }

    async fn auth(&self) -> CoreResult<()> {
        self.record("auth");
        let outcome = self.behavior.lock().expect("lock").auth;
        outcome.into_result(())
    }

    async fn logout(&self) -> CoreResult<()> {
        self.record("logout");
        Ok(())
    }

    async fn add(&self, _info: &TorrentInfo, _save_path: &str) -> CoreResult<String> {
        self.record("add");
        let outcome = self.behavior.lock().expect("lock").add;
        outcome.into_result("fake-submitted-uid".to_string())
    }

    async fn delete(&self, _uid: &str, _with_data: bool) -> CoreResult<()> {
        self.record("delete");
        Ok(())
    }

    async fn rename(&self, _uid: &str, _old_path: &str, _new_path: &str) -> CoreResult<()> {
        self.record("rename");
        Ok(())
    }

    async fn move_torrent(&self, _uid: &str, _save_path: &str) -> CoreResult<()> {
        self.record("move_torrent");
        Ok(())
    }

    async fn get_torrent_files(&self, _uid: &str) -> CoreResult<Vec<TorrentFileEntry>> {
        self.record("get_torrent_files");
        Ok(self.behavior.lock().expect("lock").files.clone())
    }

    async fn get_torrent_info(&self, _uid: &str) -> CoreResult<TorrentInfoSnapshot> {
        self.record("get_torrent_info");
        Ok(self.behavior.lock().expect("lock").snapshot.clone())
    }

    async fn torrents_info(&self, uids: &[String]) -> CoreResult<Vec<TorrentInfoSnapshot>> {
        self.record("torrents_info");
        let snapshot = self.behavior.lock().expect("lock").snapshot.clone();
        Ok(uids.iter().map(|_| snapshot.clone()).collect())
    }

    async fn check_hash(&self, _guid: &str) -> CoreResult<Option<String>> {
        self.record("check_hash");
        let behavior = self.behavior.lock().expect("lock");
        let resolved = behavior.resolved_uid.clone();
        behavior.check_hash.into_result(resolved)
    }

    fn poll_interval_ms(&self) -> u64 {
        self.behavior.lock().expect("lock").poll_interval_ms
    }
}

/// A representative [`Show`] row for tests: "Demo Show", season 1, year 2024.
#[must_use]
pub fn sample_show() -> Show {
    Show {
        id: 1,
        official_title: "Demo Show".to_string(),
        year: Some(2024),
        season: 1,
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

/// A representative [`Torrent`] row for tests, owned by [`sample_show`].
#[must_use]
pub fn sample_torrent(suffix: usize) -> Torrent {
    Torrent {
        url: format!("magnet:?xt=urn:btih:{suffix:040x}"),
        display_name: format!("[SubGroup] Demo Show - {suffix:02} [1080p]"),
        downloaded: DownloadState::Enqueued,
        renamed: false,
        download_uid: None,
        show_id: 1,
        homepage: Some(format!("https://tracker.example/show/{suffix}")),
        created_at: Utc::now(),
    }
}

/// The [`EpisodeMeta`] the parser is expected to produce for [`sample_torrent`]'s
/// display name, absent the group/resolution tags the sample name also carries.
#[must_use]
pub fn sample_episode_meta(episode: i32) -> EpisodeMeta {
    EpisodeMeta {
        title: "Demo Show".to_string(),
        episode,
        ..EpisodeMeta::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_downloader_records_call_order() {
        let fake = FakeDownloader::new(FakeDownloaderBehavior::default());
        fake.init().await.expect("init");
        fake.auth().await.expect("auth");
        let info = TorrentInfo {
            name: "demo".into(),
            info_hash_v1: None,
            info_hash_v2: None,
            magnet_uri: Some("magnet:?xt=demo".into()),
            raw_bytes: Vec::new(),
        };
        fake.add(&info, "/downloads/demo").await.expect("add");
        assert_eq!(fake.calls(), vec!["init", "auth", "add"]);
    }

    #[tokio::test]
    async fn fake_downloader_honors_canned_failures() {
        let fake = FakeDownloader::new(FakeDownloaderBehavior {
            auth: FakeOutcome::AuthError,
            ..Default::default()
        });
        let err = fake.auth().await.unwrap_err();
        assert!(matches!(err, CoreError::DownloadAuth));

        fake.set_auth_outcome(FakeOutcome::Ok);
        fake.auth().await.expect("auth should now succeed");
    }

    #[test]
    fn sample_show_has_expected_save_path() {
        assert_eq!(sample_show().save_path(), "Demo Show (2024)/Season 1");
    }
}
