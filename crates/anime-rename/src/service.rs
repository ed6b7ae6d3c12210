//! Rename-stage pipeline: subscribes to [`anime_events::Event::Rename`] and drives each
//! completed torrent's files into the library layout.
//!
//! # Design
//!
//! - A `Rename` event already carries the owning [`Show`]; the path-inference/lookup
//!   dance in [`RenameService::rename_torrent`] only runs when `known_show` is `None`,
//!   which is the "direct call when the show is unknown" case SPEC_FULL §4.10 calls out
//!   separately from the event-driven path.
//! - A layout mismatch aborts the whole torrent (there's nowhere safe to put the files);
//!   a single file's rename failing aborts only that file, per SPEC_FULL §7.

use std::sync::Arc;

use anime_config::RenameConfig;
use anime_core::model::{DownloadState, Message, Show, Torrent};
use anime_data::DataStore;
use anime_download::DownloadSession;
use anime_events::{Event, EventBus};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{RenameError, RenameResult};
use crate::layout;

/// Observable outcome of renaming a single file, returned for tests and logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// The file was renamed.
    Renamed {
        /// Path before the rename.
        old_path: String,
        /// Path after the rename.
        new_path: String,
    },
    /// The file was left untouched.
    Skipped {
        /// Path that was skipped.
        path: String,
        /// Why it was skipped.
        reason: &'static str,
    },
}

/// Renames a completed torrent's files and publishes a notification per success.
#[derive(Clone)]
pub struct RenameService {
    events: EventBus,
    session: DownloadSession,
    store: Arc<DataStore>,
    config: RenameConfig,
    downloader_root: String,
}

impl RenameService {
    /// Build a new rename service. `downloader_root` is the library root the downloader
    /// saves into (`downloader.path` in configuration), used to compute each torrent's
    /// save path relative to it.
    #[must_use]
    pub fn new(
        events: EventBus,
        session: DownloadSession,
        store: Arc<DataStore>,
        config: RenameConfig,
        downloader_root: String,
    ) -> Self {
        Self {
            events,
            session,
            store,
            config,
            downloader_root,
        }
    }

    /// Subscribe to the event bus and rename every [`Event::Rename`] torrent as it
    /// arrives, until `cancel` fires.
    #[must_use]
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut stream = self.events.subscribe(None);
            loop {
                let envelope = tokio::select! {
                    () = cancel.cancelled() => break,
                    envelope = stream.next() => envelope,
                };
                let Some(envelope) = envelope else { break };
                let Event::Rename { torrent, show } = envelope.event else {
                    continue;
                };
                if !self.config.enable {
                    continue;
                }
                match self.rename_torrent(&cancel, &torrent, Some(show)).await {
                    Ok(outcomes) => {
                        info!(url = %torrent.url, renamed = outcomes.len(), "torrent rename pass complete");
                    }
                    Err(err) => {
                        warn!(url = %torrent.url, error = %err, "torrent rename aborted");
                    }
                }
            }
        })
    }

    /// Rename every eligible file of `torrent` into the library layout.
    ///
    /// When `known_show` is `None` (the direct-call path), the owning show is resolved
    /// from the downloader's reported save path instead of being supplied by the caller.
    ///
    /// # Errors
    ///
    /// Returns [`RenameError::LayoutMismatch`] if the save path cannot be resolved to a
    /// show and `known_show` was not supplied, or a wrapped downloader/persistence error.
    pub async fn rename_torrent(
        &self,
        cancel: &CancellationToken,
        torrent: &Torrent,
        known_show: Option<Show>,
    ) -> RenameResult<Vec<FileOutcome>> {
        let uid = torrent
            .download_uid
            .clone()
            .ok_or_else(|| RenameError::LayoutMismatch {
                relative: torrent.url.clone(),
            })?;

        let show = match known_show {
            Some(show) => show,
            None => self.resolve_show(cancel, &uid).await?,
        };

        let files = self.session.get_torrent_files(cancel, &uid).await?;
        let mut outcomes = Vec::with_capacity(files.len());

        for file in files {
            match self.rename_one(cancel, &uid, &show, &file.path).await {
                Ok(outcome) => {
                    if let FileOutcome::Renamed { ref old_path, ref new_path } = outcome {
                        self.publish_notification(&show, old_path, new_path);
                    }
                    outcomes.push(outcome);
                }
                Err(err) => {
                    warn!(path = %file.path, error = %err, "skipping file after rename failure");
                }
            }
        }

        let mut updated = torrent.clone();
        updated.downloaded = DownloadState::Renamed;
        updated.renamed = true;
        self.store.update_torrent(&updated).await?;

        Ok(outcomes)
    }

    async fn resolve_show(&self, cancel: &CancellationToken, uid: &str) -> RenameResult<Show> {
        let snapshot = self.session.get_torrent_info(cancel, uid).await?;
        let relative = layout::relative_to_root(&snapshot.save_path, &self.downloader_root)
            .unwrap_or_else(|| snapshot.save_path.clone());
        let inferred = layout::infer_location(&relative).ok_or_else(|| RenameError::LayoutMismatch {
            relative: relative.clone(),
        })?;

        if let Some(show) = self
            .store
            .get_show_by_official_title(&inferred.official_title)
            .await?
        {
            return Ok(show);
        }

        // No matching row yet: synthesize a transient show carrying only the fields
        // recoverable from the path, so the caller can still rename this batch.
        Ok(Show {
            id: 0,
            official_title: inferred.official_title,
            year: inferred.year,
            season: inferred.season,
            eps_collected: false,
            episode_offset: 0,
            include_pattern: None,
            exclude_pattern: None,
            parser_tag: anime_core::model::ParserTag::Raw,
            rss_source_url: None,
            poster_url: None,
            deleted: false,
            tracker_id: None,
            tmdb_id: None,
        })
    }

    async fn rename_one(
        &self,
        cancel: &CancellationToken,
        uid: &str,
        show: &Show,
        path: &str,
    ) -> RenameResult<FileOutcome> {
        let basename = basename_of(path);

        if anime_parser::is_collection_point_5(basename) {
            return Ok(FileOutcome::Skipped {
                path: path.to_string(),
                reason: "point-5 release",
            });
        }

        let meta = anime_parser::parse(basename);
        if meta.is_collection {
            return Ok(FileOutcome::Skipped {
                path: path.to_string(),
                reason: "collection release",
            });
        }

        let extension = extension_of(basename);
        let episode = meta.episode + show.episode_offset;
        let new_basename = layout::build_basename(
            show,
            episode,
            meta.group.as_deref(),
            extension,
            self.config.year,
            self.config.group,
        );

        if new_basename == basename {
            return Ok(FileOutcome::Skipped {
                path: path.to_string(),
                reason: "already named correctly",
            });
        }

        let new_path = replace_basename(path, &new_basename);
        self.session.rename(cancel, uid, path, &new_path).await?;

        Ok(FileOutcome::Renamed {
            old_path: path.to_string(),
            new_path,
        })
    }

    fn publish_notification(&self, show: &Show, old_path: &str, new_path: &str) {
        let message = Message {
            title: show.official_title.clone(),
            body: format!("renamed {old_path} to {new_path}"),
            season: Some(show.season),
            episode: None,
            poster_url: show.poster_url.clone(),
            image_bytes: None,
        };
        self.events.publish(Event::Notification { message });
    }
}

fn basename_of(path: &str) -> &str {
    match path.rfind(['/', '\\']) {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

fn extension_of(basename: &str) -> &str {
    basename.rfind('.').map_or("", |idx| &basename[idx + 1..])
}

fn replace_basename(path: &str, new_basename: &str) -> String {
    let normalized = path.replace('\\', "/");
    match normalized.rfind('/') {
        Some(idx) => format!("{}/{new_basename}", &normalized[..idx]),
        None => new_basename.to_string(),
    }
}
