//! The downloader contract implemented by qBittorrent-family adapters.

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::model::{TorrentFileEntry, TorrentInfo, TorrentInfoSnapshot};

/// Capability contract a download-client adapter must implement.
///
/// The session manager in `anime-download` wraps an implementation of this trait with
/// login-state tracking and rate limiting; adapters themselves stay stateless with respect
/// to authentication.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// One-time setup performed before the first `auth` call.
    async fn init(&self) -> CoreResult<()>;

    /// Authenticate against the downloader, establishing a session.
    async fn auth(&self) -> CoreResult<()>;

    /// Tear down the current session.
    async fn logout(&self) -> CoreResult<()>;

    /// Submit a torrent (already parsed into [`TorrentInfo`]) for download at `save_path`.
    ///
    /// Returns the downloader's own opaque UID; callers must not assume any particular
    /// relationship between this value and the torrent's info-hash.
    async fn add(&self, info: &TorrentInfo, save_path: &str) -> CoreResult<String>;

    /// Remove a torrent, optionally deleting its on-disk data.
    async fn delete(&self, uid: &str, with_data: bool) -> CoreResult<()>;

    /// Rename a single file within a torrent's payload.
    async fn rename(&self, uid: &str, old_path: &str, new_path: &str) -> CoreResult<()>;

    /// Move a torrent's save location.
    async fn move_torrent(&self, uid: &str, save_path: &str) -> CoreResult<()>;

    /// List the files exposed by a torrent.
    async fn get_torrent_files(&self, uid: &str) -> CoreResult<Vec<TorrentFileEntry>>;

    /// Fetch a point-in-time status snapshot for a torrent.
    async fn get_torrent_info(&self, uid: &str) -> CoreResult<TorrentInfoSnapshot>;

    /// Bulk variant of [`Downloader::get_torrent_info`].
    async fn torrents_info(&self, uids: &[String]) -> CoreResult<Vec<TorrentInfoSnapshot>>;

    /// Resolve a candidate GUID to the downloader's true UID for that torrent, if known.
    async fn check_hash(&self, guid: &str) -> CoreResult<Option<String>>;

    /// Interval, in milliseconds, the session manager should honor for its rate limiter.
    fn poll_interval_ms(&self) -> u64;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct StubDownloader {
        calls: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl Downloader for StubDownloader {
        async fn init(&self) -> CoreResult<()> {
            self.calls.lock().expect("lock").push("init");
            Ok(())
        }

        async fn auth(&self) -> CoreResult<()> {
            self.calls.lock().expect("lock").push("auth");
            Ok(())
        }

        async fn logout(&self) -> CoreResult<()> {
            Ok(())
        }

        async fn add(&self, _info: &TorrentInfo, _save_path: &str) -> CoreResult<String> {
            Ok("uid-1".into())
        }

        async fn delete(&self, _uid: &str, _with_data: bool) -> CoreResult<()> {
            Ok(())
        }

        async fn rename(&self, _uid: &str, _old_path: &str, _new_path: &str) -> CoreResult<()> {
            Ok(())
        }

        async fn move_torrent(&self, _uid: &str, _save_path: &str) -> CoreResult<()> {
            Ok(())
        }

        async fn get_torrent_files(&self, _uid: &str) -> CoreResult<Vec<TorrentFileEntry>> {
            Ok(Vec::new())
        }

        async fn get_torrent_info(&self, _uid: &str) -> CoreResult<TorrentInfoSnapshot> {
            Ok(TorrentInfoSnapshot {
                save_path: "/downloads".into(),
                eta_seconds: 0,
                completed_at: 0,
            })
        }

        async fn torrents_info(&self, uids: &[String]) -> CoreResult<Vec<TorrentInfoSnapshot>> {
            Ok(uids
                .iter()
                .map(|_| TorrentInfoSnapshot {
                    save_path: "/downloads".into(),
                    eta_seconds: 0,
                    completed_at: 0,
                })
                .collect())
        }

        async fn check_hash(&self, _guid: &str) -> CoreResult<Option<String>> {
            Ok(Some("resolved-uid".into()))
        }

        fn poll_interval_ms(&self) -> u64 {
            1_000
        }
    }

    #[tokio::test]
    async fn stub_downloader_round_trips_through_the_trait_object() {
        let downloader: Box<dyn Downloader> = Box::new(StubDownloader::default());
        downloader.init().await.expect("init");
        downloader.auth().await.expect("auth");

        let info = TorrentInfo {
            name: "demo".into(),
            info_hash_v1: None,
            info_hash_v2: None,
            magnet_uri: Some("magnet:?xt=demo".into()),
            raw_bytes: Vec::new(),
        };
        let uid = downloader.add(&info, "/downloads/demo").await.expect("add");
        assert_eq!(uid, "uid-1");

        let resolved = downloader.check_hash("guid-1").await.expect("check_hash");
        assert_eq!(resolved.as_deref(), Some("resolved-uid"));
        assert_eq!(downloader.poll_interval_ms(), 1_000);
    }
}
