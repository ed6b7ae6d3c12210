//! A [`Downloader`] adapter for the qBittorrent Web API (v2).
//!
//! Every call is a plain HTTP request against the Web UI; session state (the `SID`
//! cookie qBittorrent issues on a successful login) is carried by `reqwest`'s cookie
//! jar, not tracked here — login/retry policy belongs to [`crate::session`].

use anime_config::DownloaderConfig;
use anime_core::model::{TorrentFileEntry, TorrentInfo, TorrentInfoSnapshot};
use anime_core::{CoreError, CoreResult, Downloader};
use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;
use url::Url;

/// Conservative poll interval qBittorrent does not otherwise advertise.
const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

/// Drives a qBittorrent Web UI instance over HTTP.
pub struct QbittorrentDownloader {
    http: reqwest::Client,
    base_url: Url,
    username: String,
    password: String,
    poll_interval_ms: u64,
}

impl QbittorrentDownloader {
    /// Build an adapter targeting the instance described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Network`] if `config.host` cannot be parsed into a base URL
    /// or the underlying HTTP client cannot be constructed.
    pub fn new(config: &DownloaderConfig) -> CoreResult<Self> {
        let scheme = if config.ssl { "https" } else { "http" };
        let base_url = Url::parse(&format!("{scheme}://{}", config.host))
            .map_err(|_| CoreError::Network { status: 0 })?;
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|_| CoreError::Network { status: 0 })?;
        Ok(Self {
            http,
            base_url,
            username: config.username.clone().unwrap_or_default(),
            password: config.password.clone().unwrap_or_default(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        })
    }

    fn endpoint(&self, path: &str) -> Url {
        self.base_url
            .join(path)
            .expect("adapter-internal endpoint paths are always valid relative URLs")
    }

    async fn text(response: reqwest::Response) -> CoreResult<String> {
        let status = response.status();
        if status.as_u16() == 403 {
            return Err(CoreError::DownloadForbidden);
        }
        if !status.is_success() {
            return Err(CoreError::Network {
                status: status.as_u16(),
            });
        }
        response
            .text()
            .await
            .map_err(|_| CoreError::Network { status: 0 })
    }

    async fn json<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> CoreResult<T> {
        let status = response.status();
        if status.as_u16() == 403 {
            return Err(CoreError::DownloadForbidden);
        }
        if !status.is_success() {
            return Err(CoreError::Network {
                status: status.as_u16(),
            });
        }
        response
            .json()
            .await
            .map_err(|err| CoreError::parse_with("qbittorrent-response", err))
    }
}

#[derive(Debug, Deserialize)]
struct TorrentFileRow {
    name: String,
    size: u64,
}

#[derive(Debug, Deserialize)]
struct TorrentInfoRow {
    hash: String,
    save_path: String,
    eta: i64,
    completion_on: i64,
}

impl From<&TorrentInfoRow> for TorrentInfoSnapshot {
    fn from(row: &TorrentInfoRow) -> Self {
        Self {
            save_path: row.save_path.clone(),
            eta_seconds: row.eta,
            completed_at: row.completion_on.max(0),
        }
    }
}

#[async_trait]
impl Downloader for QbittorrentDownloader {
    async fn init(&self) -> CoreResult<()> {
        let response = self
            .http
            .get(self.endpoint("/api/v2/app/webapiVersion"))
            .send()
            .await
            .map_err(|_| CoreError::Network { status: 0 })?;
        let _version = Self::text(response).await?;
        Ok(())
    }

    async fn auth(&self) -> CoreResult<()> {
        let response = self
            .http
            .post(self.endpoint("/api/v2/auth/login"))
            .form(&[
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
            ])
            .send()
            .await
            .map_err(|_| CoreError::Network { status: 0 })?;
        let body = Self::text(response).await?;
        if body.trim() == "Ok." {
            Ok(())
        } else {
            Err(CoreError::DownloadAuth)
        }
    }

    async fn logout(&self) -> CoreResult<()> {
        let response = self
            .http
            .post(self.endpoint("/api/v2/auth/logout"))
            .send()
            .await
            .map_err(|_| CoreError::Network { status: 0 })?;
        Self::text(response).await.map(|_| ())
    }

    async fn add(&self, info: &TorrentInfo, save_path: &str) -> CoreResult<String> {
        let uid = info
            .info_hash_v1
            .clone()
            .or_else(|| info.info_hash_v2.clone())
            .ok_or_else(|| CoreError::parse("qbittorrent-add-missing-info-hash"))?;

        let mut form = multipart::Form::new().text("savepath", save_path.to_string());
        form = if let Some(magnet) = &info.magnet_uri {
            form.text("urls", magnet.clone())
        } else {
            let part = multipart::Part::bytes(info.raw_bytes.clone())
                .file_name(format!("{}.torrent", info.name))
                .mime_str("application/x-bittorrent")
                .map_err(|_| CoreError::Network { status: 0 })?;
            form.part("torrents", part)
        };

        let response = self
            .http
            .post(self.endpoint("/api/v2/torrents/add"))
            .multipart(form)
            .send()
            .await
            .map_err(|_| CoreError::Network { status: 0 })?;
        let body = Self::text(response).await?;
        if body.trim() == "Ok." {
            Ok(uid)
        } else {
            Err(CoreError::parse("qbittorrent-add-rejected"))
        }
    }

    async fn delete(&self, uid: &str, with_data: bool) -> CoreResult<()> {
        let response = self
            .http
            .post(self.endpoint("/api/v2/torrents/delete"))
            .form(&[
                ("hashes", uid),
                ("deleteFiles", if with_data { "true" } else { "false" }),
            ])
            .send()
            .await
            .map_err(|_| CoreError::Network { status: 0 })?;
        Self::text(response).await.map(|_| ())
    }

    async fn rename(&self, uid: &str, old_path: &str, new_path: &str) -> CoreResult<()> {
        let response = self
            .http
            .post(self.endpoint("/api/v2/torrents/renameFile"))
            .form(&[("hash", uid), ("oldPath", old_path), ("newPath", new_path)])
            .send()
            .await
            .map_err(|_| CoreError::Network { status: 0 })?;
        Self::text(response).await.map(|_| ())
    }

    async fn move_torrent(&self, uid: &str, save_path: &str) -> CoreResult<()> {
        let response = self
            .http
            .post(self.endpoint("/api/v2/torrents/setLocation"))
            .form(&[("hashes", uid), ("location", save_path)])
            .send()
            .await
            .map_err(|_| CoreError::Network { status: 0 })?;
        Self::text(response).await.map(|_| ())
    }

    async fn get_torrent_files(&self, uid: &str) -> CoreResult<Vec<TorrentFileEntry>> {
        let mut url = self.endpoint("/api/v2/torrents/files");
        url.query_pairs_mut().append_pair("hash", uid);
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|_| CoreError::Network { status: 0 })?;
        let rows: Vec<TorrentFileRow> = Self::json(response).await?;
        Ok(rows
            .into_iter()
            .enumerate()
            .map(|(index, row)| TorrentFileEntry {
                index: u32::try_from(index).unwrap_or(u32::MAX),
                path: row.name,
                size_bytes: row.size,
            })
            .collect())
    }

    async fn get_torrent_info(&self, uid: &str) -> CoreResult<TorrentInfoSnapshot> {
        let mut url = self.endpoint("/api/v2/torrents/info");
        url.query_pairs_mut().append_pair("hashes", uid);
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|_| CoreError::Network { status: 0 })?;
        let rows: Vec<TorrentInfoRow> = Self::json(response).await?;
        rows.first()
            .map(TorrentInfoSnapshot::from)
            .ok_or_else(|| CoreError::DownloadKey { key: uid.to_string() })
    }

    async fn torrents_info(&self, uids: &[String]) -> CoreResult<Vec<TorrentInfoSnapshot>> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }
        let mut url = self.endpoint("/api/v2/torrents/info");
        url.query_pairs_mut().append_pair("hashes", &uids.join("|"));
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|_| CoreError::Network { status: 0 })?;
        let rows: Vec<TorrentInfoRow> = Self::json(response).await?;
        Ok(uids
            .iter()
            .map(|uid| {
                rows.iter()
                    .find(|row| &row.hash == uid)
                    .map_or_else(
                        || TorrentInfoSnapshot {
                            save_path: String::new(),
                            eta_seconds: 0,
                            completed_at: 0,
                        },
                        TorrentInfoSnapshot::from,
                    )
            })
            .collect())
    }

    async fn check_hash(&self, guid: &str) -> CoreResult<Option<String>> {
        let mut url = self.endpoint("/api/v2/torrents/info");
        url.query_pairs_mut().append_pair("hashes", guid);
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|_| CoreError::Network { status: 0 })?;
        let rows: Vec<TorrentInfoRow> = Self::json(response).await?;
        Ok(rows.into_iter().next().map(|row| row.hash))
    }

    fn poll_interval_ms(&self) -> u64 {
        self.poll_interval_ms
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;

    use super::*;

    fn config_for(server: &MockServer) -> DownloaderConfig {
        DownloaderConfig {
            kind: anime_config::DownloaderType::Qbittorrent,
            path: "/downloads".to_string(),
            host: server.address().to_string(),
            ssl: false,
            username: Some("admin".to_string()),
            password: Some("hunter2".to_string()),
        }
    }

    #[tokio::test]
    async fn auth_succeeds_on_ok_body() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/api/v2/auth/login");
            then.status(200).body("Ok.");
        });

        let adapter = QbittorrentDownloader::new(&config_for(&server)).expect("adapter");
        adapter.auth().await.expect("auth succeeds");
        mock.assert();
    }

    #[tokio::test]
    async fn auth_rejects_on_fails_body() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/v2/auth/login");
            then.status(200).body("Fails.");
        });

        let adapter = QbittorrentDownloader::new(&config_for(&server)).expect("adapter");
        let err = adapter.auth().await.unwrap_err();
        assert!(matches!(err, CoreError::DownloadAuth));
    }

    #[tokio::test]
    async fn auth_forbidden_on_403() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/v2/auth/login");
            then.status(403);
        });

        let adapter = QbittorrentDownloader::new(&config_for(&server)).expect("adapter");
        let err = adapter.auth().await.unwrap_err();
        assert!(matches!(err, CoreError::DownloadForbidden));
    }

    #[tokio::test]
    async fn get_torrent_info_maps_row_fields() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/v2/torrents/info");
            then.status(200).json_body(serde_json::json!([
                {"hash": "abc123", "save_path": "/downloads/Demo Show/Season 1", "eta": 120, "completion_on": 0}
            ]));
        });

        let adapter = QbittorrentDownloader::new(&config_for(&server)).expect("adapter");
        let snapshot = adapter.get_torrent_info("abc123").await.expect("info");
        assert_eq!(snapshot.save_path, "/downloads/Demo Show/Season 1");
        assert_eq!(snapshot.eta_seconds, 120);
        assert!(!snapshot.is_complete());
    }

    #[tokio::test]
    async fn check_hash_returns_none_when_unknown() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/v2/torrents/info");
            then.status(200).json_body(serde_json::json!([]));
        });

        let adapter = QbittorrentDownloader::new(&config_for(&server)).expect("adapter");
        let resolved = adapter.check_hash("unknown").await.expect("check_hash");
        assert_eq!(resolved, None);
    }
}
