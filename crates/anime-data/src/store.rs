//! The repository: one [`DataStore`] wraps a connection pool and exposes every operation
//! the refresh, download, and rename stages need.

use anime_core::model::{ParsedTitle, RssSource, Show, TmdbRecord, Torrent, TrackerRecord};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::candidate::ShowCandidate;
use crate::error::{DataError, Result};
use crate::rows::{
    download_state_to_i64, parse_parser_tag, parser_tag_to_str, subtitle_delivery_type_to_str,
    ParsedTitleRow, ShowRow, TmdbRow, TorrentRow, TrackerRow,
};

/// Persistence handle for the acquisition pipeline's SQLite database.
///
/// `create_show` is additionally guarded by an in-process [`Mutex`]: SQLite itself
/// serializes writers, but the dedup check-then-insert spans two statements and must not
/// interleave with another refresh cycle's insert of the same show.
pub struct DataStore {
    pool: SqlitePool,
    create_show_lock: Mutex<()>,
}

impl DataStore {
    /// Open (creating if necessary) the SQLite database at `database_url` and run pending
    /// migrations.
    ///
    /// `database_url` may be a bare path, a `sqlite://` URL, or `sqlite::memory:` for an
    /// ephemeral in-memory database (used by tests); the latter is pinned to a single pooled
    /// connection, since each SQLite in-memory connection is its own independent database.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::QueryFailed`] if the connection cannot be established, or
    /// [`DataError::MigrationFailed`] if a migration fails to apply.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let is_memory = database_url.contains(":memory:");
        let options = database_url
            .parse::<SqliteConnectOptions>()
            .map_err(|source| DataError::QueryFailed {
                operation: "parse database url",
                source,
            })?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(if is_memory { 1 } else { 8 })
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|source| DataError::MigrationFailed { source })?;
        info!(database_url, "applied pending migrations");

        Ok(Self {
            pool,
            create_show_lock: Mutex::new(()),
        })
    }

    /// Resolve `candidate` against the existing catalog, creating or extending a [`Show`]
    /// row as needed.
    ///
    /// A candidate matches an existing show when either its tracker id or its TMDB id
    /// equals the corresponding id already stored on a non-deleted show. On a match, a
    /// tracker identity that show previously lacked is attached once and never overwritten
    /// on a later call; a TMDB identity is attached or refreshed every time, since TMDB
    /// metadata changes over a show's run. The candidate's parsed title is always recorded.
    ///
    /// When no existing show matches, a new show (and its tracker/TMDB identity rows, via
    /// `INSERT ... ON CONFLICT DO NOTHING` / `DO UPDATE`) is created instead.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::QueryFailed`] on any underlying SQL failure.
    pub async fn create_show(&self, candidate: ShowCandidate) -> Result<Show> {
        let _guard = self.create_show_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let tracker_id = candidate.tracker.as_ref().map(|record| record.id);
        let tmdb_id = candidate.tmdb.as_ref().map(|record| record.id);

        if let Some(tracker) = &candidate.tracker {
            sqlx::query(
                "INSERT INTO tracker_records (id, title, season, poster_url) VALUES (?, ?, ?, ?) \
                 ON CONFLICT(id) DO NOTHING",
            )
            .bind(tracker.id)
            .bind(&tracker.title)
            .bind(i64::from(tracker.season))
            .bind(&tracker.poster_url)
            .execute(&mut *tx)
            .await?;
        }
        if let Some(tmdb) = &candidate.tmdb {
            sqlx::query(
                "INSERT INTO tmdb_records \
                     (id, localized_title, original_title, year, season, air_date, episode_count, poster_url, average_vote) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) \
                 ON CONFLICT(id) DO UPDATE SET \
                     localized_title = excluded.localized_title, \
                     original_title = excluded.original_title, \
                     year = excluded.year, \
                     season = excluded.season, \
                     air_date = excluded.air_date, \
                     episode_count = excluded.episode_count, \
                     poster_url = excluded.poster_url, \
                     average_vote = excluded.average_vote",
            )
            .bind(tmdb.id)
            .bind(&tmdb.localized_title)
            .bind(&tmdb.original_title)
            .bind(i64::from(tmdb.year))
            .bind(i64::from(tmdb.season))
            .bind(tmdb.air_date)
            .bind(i64::from(tmdb.episode_count))
            .bind(&tmdb.poster_url)
            .bind(tmdb.average_vote)
            .execute(&mut *tx)
            .await?;
        }

        let existing: Option<ShowRow> = sqlx::query_as(
            "SELECT * FROM shows WHERE deleted = 0 AND ( \
                 (tracker_id IS NOT NULL AND tracker_id = ?) OR \
                 (tmdb_id IS NOT NULL AND tmdb_id = ?) \
             ) LIMIT 1",
        )
        .bind(tracker_id)
        .bind(tmdb_id)
        .fetch_optional(&mut *tx)
        .await?;

        let show_id = if let Some(row) = existing {
            let show_id = row.id;
            if row.tracker_id.is_none() {
                if let Some(id) = tracker_id {
                    sqlx::query("UPDATE shows SET tracker_id = ? WHERE id = ?")
                        .bind(id)
                        .bind(show_id)
                        .execute(&mut *tx)
                        .await?;
                }
            }
            if let Some(id) = tmdb_id {
                sqlx::query("UPDATE shows SET tmdb_id = ? WHERE id = ?")
                    .bind(id)
                    .bind(show_id)
                    .execute(&mut *tx)
                    .await?;
            }
            debug!(show_id, "matched existing show for candidate");
            show_id
        } else {
            let inserted = sqlx::query(
                "INSERT INTO shows \
                     (official_title, year, season, eps_collected, episode_offset, \
                      include_pattern, exclude_pattern, parser_tag, rss_source_url, poster_url, \
                      deleted, tracker_id, tmdb_id) \
                 VALUES (?, ?, ?, 0, 0, NULL, NULL, ?, ?, ?, 0, ?, ?)",
            )
            .bind(&candidate.official_title)
            .bind(candidate.year.map(i64::from))
            .bind(i64::from(candidate.season))
            .bind(parser_tag_to_str(candidate.parser_tag))
            .bind(&candidate.rss_source_url)
            .bind(&candidate.poster_url)
            .bind(tracker_id)
            .bind(tmdb_id)
            .execute(&mut *tx)
            .await?;
            let show_id = inserted.last_insert_rowid();
            info!(show_id, title = %candidate.official_title, "created new show");
            show_id
        };

        let parsed = &candidate.parsed_title;
        sqlx::query(
            "INSERT INTO parsed_titles \
                 (show_id, raw_title, group_name, season, season_raw, resolution, \
                  subtitle_language, subtitle_type, source, audio, video, version) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(raw_title) DO NOTHING",
        )
        .bind(show_id)
        .bind(&parsed.raw_title)
        .bind(&parsed.group)
        .bind(i64::from(parsed.season))
        .bind(&parsed.season_raw)
        .bind(&parsed.resolution)
        .bind(&parsed.subtitle_language)
        .bind(parsed.subtitle_type.map(subtitle_delivery_type_to_str))
        .bind(&parsed.source)
        .bind(&parsed.audio)
        .bind(&parsed.video)
        .bind(i64::from(parsed.version))
        .execute(&mut *tx)
        .await?;

        let row: ShowRow = sqlx::query_as("SELECT * FROM shows WHERE id = ?")
            .bind(show_id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        row.try_into()
    }

    /// Fetch a show by id.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::NotFound`] if no such show exists.
    pub async fn get_show_by_id(&self, id: i64) -> Result<Show> {
        let row: Option<ShowRow> = sqlx::query_as("SELECT * FROM shows WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.ok_or(DataError::NotFound { entity: "show" })?.try_into()
    }

    /// Fetch a non-deleted show by its exact official title.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::QueryFailed`] on an underlying SQL failure.
    pub async fn get_show_by_official_title(&self, title: &str) -> Result<Option<Show>> {
        let row: Option<ShowRow> =
            sqlx::query_as("SELECT * FROM shows WHERE official_title = ? AND deleted = 0")
                .bind(title)
                .fetch_optional(&self.pool)
                .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// List shows, optionally including soft-deleted ones.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::QueryFailed`] on an underlying SQL failure.
    pub async fn list_shows(&self, include_deleted: bool) -> Result<Vec<Show>> {
        let query = if include_deleted {
            "SELECT * FROM shows ORDER BY id"
        } else {
            "SELECT * FROM shows WHERE deleted = 0 ORDER BY id"
        };
        let rows: Vec<ShowRow> = sqlx::query_as(query).fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Persist every mutable field of `show` (identification ids and soft-delete state
    /// included). Use [`DataStore::soft_delete_show`] for deletion specifically.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::QueryFailed`] on an underlying SQL failure.
    pub async fn update_show(&self, show: &Show) -> Result<()> {
        sqlx::query(
            "UPDATE shows SET \
                 official_title = ?, year = ?, season = ?, eps_collected = ?, episode_offset = ?, \
                 include_pattern = ?, exclude_pattern = ?, parser_tag = ?, rss_source_url = ?, \
                 poster_url = ?, deleted = ?, tracker_id = ?, tmdb_id = ? \
             WHERE id = ?",
        )
        .bind(&show.official_title)
        .bind(show.year.map(i64::from))
        .bind(i64::from(show.season))
        .bind(show.eps_collected)
        .bind(i64::from(show.episode_offset))
        .bind(&show.include_pattern)
        .bind(&show.exclude_pattern)
        .bind(parser_tag_to_str(show.parser_tag))
        .bind(&show.rss_source_url)
        .bind(&show.poster_url)
        .bind(show.deleted)
        .bind(show.tracker_id)
        .bind(show.tmdb_id)
        .bind(show.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Mark a show deleted. Its torrents and parsed titles are left untouched for history.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::QueryFailed`] on an underlying SQL failure.
    pub async fn soft_delete_show(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE shows SET deleted = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// List every enabled RSS source the refresh pipeline should poll.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::QueryFailed`] on an underlying SQL failure.
    pub async fn list_active_rss_sources(&self) -> Result<Vec<RssSource>> {
        let rows = sqlx::query_as::<_, RssSourceRow>(
            "SELECT * FROM rss_sources WHERE enabled = 1 ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Register a new RSS source, returning its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::QueryFailed`] on an underlying SQL failure, including a
    /// uniqueness violation if `source.url` is already registered.
    pub async fn create_rss_source(&self, source: &RssSource) -> Result<i64> {
        let inserted = sqlx::query(
            "INSERT INTO rss_sources \
                 (url, name, aggregate, parser_tag, enabled, include_override, exclude_override) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&source.url)
        .bind(&source.name)
        .bind(source.aggregate)
        .bind(parser_tag_to_str(source.parser_tag))
        .bind(source.enabled)
        .bind(&source.include_override)
        .bind(&source.exclude_override)
        .execute(&self.pool)
        .await?;
        Ok(inserted.last_insert_rowid())
    }

    /// Toggle whether an RSS source is polled by the refresh pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::QueryFailed`] on an underlying SQL failure.
    pub async fn set_rss_source_enabled(&self, id: i64, enabled: bool) -> Result<()> {
        sqlx::query("UPDATE rss_sources SET enabled = ? WHERE id = ?")
            .bind(enabled)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Insert a newly discovered torrent.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::QueryFailed`] on an underlying SQL failure, including a
    /// uniqueness violation if `torrent.url` is already tracked.
    pub async fn create_torrent(&self, torrent: &Torrent) -> Result<()> {
        sqlx::query(
            "INSERT INTO torrents \
                 (url, display_name, downloaded, renamed, download_uid, show_id, homepage, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&torrent.url)
        .bind(&torrent.display_name)
        .bind(download_state_to_i64(torrent.downloaded))
        .bind(torrent.renamed)
        .bind(&torrent.download_uid)
        .bind(torrent.show_id)
        .bind(&torrent.homepage)
        .bind(torrent.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Persist the mutable fields of an already-tracked torrent (state, rename flag,
    /// downloader UID).
    ///
    /// # Errors
    ///
    /// Returns [`DataError::QueryFailed`] on an underlying SQL failure.
    pub async fn update_torrent(&self, torrent: &Torrent) -> Result<()> {
        sqlx::query(
            "UPDATE torrents SET downloaded = ?, renamed = ?, download_uid = ? WHERE url = ?",
        )
        .bind(download_state_to_i64(torrent.downloaded))
        .bind(torrent.renamed)
        .bind(&torrent.download_uid)
        .bind(&torrent.url)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Fetch a tracked torrent by its canonical URL.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::QueryFailed`] on an underlying SQL failure.
    pub async fn get_torrent(&self, url: &str) -> Result<Option<Torrent>> {
        let row: Option<TorrentRow> = sqlx::query_as("SELECT * FROM torrents WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// List torrents currently in [`anime_core::model::DownloadState::Submitted`], for the
    /// progress watcher to poll.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::QueryFailed`] on an underlying SQL failure.
    pub async fn list_submitted_torrents(&self) -> Result<Vec<Torrent>> {
        let rows: Vec<TorrentRow> = sqlx::query_as("SELECT * FROM torrents WHERE downloaded = 1")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Given a batch of candidate torrent URLs, return only the ones not already tracked.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::QueryFailed`] on an underlying SQL failure.
    pub async fn check_new_torrents(&self, urls: &[String]) -> Result<Vec<String>> {
        if urls.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = std::iter::repeat("?").take(urls.len()).collect::<Vec<_>>().join(", ");
        let query = format!("SELECT url FROM torrents WHERE url IN ({placeholders})");
        let mut statement = sqlx::query_scalar::<_, String>(&query);
        for url in urls {
            statement = statement.bind(url);
        }
        let known: std::collections::HashSet<String> =
            statement.fetch_all(&self.pool).await?.into_iter().collect();
        Ok(urls.iter().filter(|url| !known.contains(*url)).cloned().collect())
    }

    /// Look up a previously recorded parsed title by its exact raw title, used to skip
    /// re-identification of a title the pipeline has already resolved.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::QueryFailed`] on an underlying SQL failure.
    pub async fn get_parsed_title_by_raw_name(&self, raw_title: &str) -> Result<Option<ParsedTitle>> {
        let row: Option<ParsedTitleRow> =
            sqlx::query_as("SELECT * FROM parsed_titles WHERE raw_title = ?")
                .bind(raw_title)
                .fetch_optional(&self.pool)
                .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// Fetch a tracker identity row by its tracker-native id.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::QueryFailed`] on an underlying SQL failure.
    pub async fn get_tracker_record(&self, id: i64) -> Result<Option<TrackerRecord>> {
        let row: Option<TrackerRow> = sqlx::query_as("SELECT * FROM tracker_records WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    /// Fetch a TMDB identity row by its TMDB id.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::QueryFailed`] on an underlying SQL failure.
    pub async fn get_tmdb_record(&self, id: i64) -> Result<Option<TmdbRecord>> {
        let row: Option<TmdbRow> = sqlx::query_as("SELECT * FROM tmdb_records WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RssSourceRow {
    id: i64,
    url: String,
    name: String,
    aggregate: i64,
    parser_tag: String,
    enabled: i64,
    include_override: Option<String>,
    exclude_override: Option<String>,
}

impl TryFrom<RssSourceRow> for RssSource {
    type Error = DataError;

    fn try_from(row: RssSourceRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            url: row.url,
            name: row.name,
            aggregate: row.aggregate != 0,
            parser_tag: parse_parser_tag(&row.parser_tag)?,
            enabled: row.enabled != 0,
            include_override: row.include_override,
            exclude_override: row.exclude_override,
        })
    }
}
