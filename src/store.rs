use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::error::CoreError;
use crate::models::{
    EnqueueOutcome, FinishedTrack, Quality, QueueItem, QueueStats, Status, TrackRequest,
    STATUS_COMPLETED, STATUS_DOWNLOADING, STATUS_ERROR, STATUS_PENDING, STATUS_QUEUED,
};

/// Durable persistence for queue items, finished tracks, and configuration
/// key/value pairs (spec §4.1). A single-file embedded relational store;
/// every mutation below is its own short-lived transaction, and none spans
/// network I/O.
pub struct Store {
    pool: SqlitePool,
}

fn row_to_queue_item(row: &sqlx::sqlite::SqliteRow) -> Result<QueueItem, CoreError> {
    let quality_str: String = row.get("quality");
    let status_str: String = row.get("status");
    Ok(QueueItem {
        id: row.get("id"),
        track_id: row.get("track_id"),
        title: row.get("title"),
        artist: row.get("artist"),
        album: row.get("album"),
        playlist: row.get("playlist"),
        cover_url: row.get("cover_url"),
        quality: Quality::parse(&quality_str)
            .ok_or_else(|| CoreError::Store(sqlx::Error::Decode("bad quality value".into())))?,
        status: Status::parse(&status_str)
            .ok_or_else(|| CoreError::Store(sqlx::Error::Decode("bad status value".into())))?,
        progress: row.get::<i64, _>("progress") as u8,
        error_message: row.get("error_message"),
        created_at: parse_rfc3339(row.get::<String, _>("created_at"))?,
        updated_at: parse_rfc3339(row.get::<String, _>("updated_at"))?,
    })
}

fn parse_rfc3339(s: String) -> Result<DateTime<Utc>, CoreError> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CoreError::Store(sqlx::Error::Decode(Box::new(e))))
}

/// What `clear()` (spec §4.8) should remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearScope {
    Completed,
    Pending,
    All,
}

impl Store {
    pub async fn open(database_path: &str) -> Result<Self, CoreError> {
        let database_url = format!("sqlite://{database_path}?mode=rwc");
        info!(url = %database_url, "opening catalog store");
        let pool = SqlitePool::connect(&database_url).await?;
        let store = Store { pool };
        store.create_tables().await?;
        Ok(store)
    }

    #[cfg(test)]
    pub async fn open_in_memory() -> Result<Self, CoreError> {
        let pool = SqlitePool::connect("sqlite::memory:").await?;
        let store = Store { pool };
        store.create_tables().await?;
        Ok(store)
    }

    async fn create_tables(&self) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS queue_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                track_id TEXT NOT NULL,
                title TEXT NOT NULL,
                artist TEXT NOT NULL,
                album TEXT NOT NULL,
                playlist TEXT NOT NULL,
                cover_url TEXT,
                quality TEXT NOT NULL,
                status TEXT NOT NULL,
                progress INTEGER NOT NULL DEFAULT 0,
                error_message TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_queue_status ON queue_items (status)")
            .execute(&self.pool)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_queue_track_playlist ON queue_items (track_id, playlist)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS finished_tracks (
                track_id TEXT NOT NULL,
                playlist TEXT NOT NULL,
                title TEXT NOT NULL,
                artist TEXT NOT NULL,
                album TEXT NOT NULL,
                file_path TEXT NOT NULL,
                file_size_mib REAL NOT NULL,
                format TEXT NOT NULL,
                quality_string TEXT NOT NULL,
                cover BLOB,
                downloaded_at TEXT NOT NULL,
                year INTEGER,
                genre TEXT,
                label TEXT,
                isrc TEXT,
                duration_secs INTEGER,
                version TEXT,
                PRIMARY KEY (track_id, playlist)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS settings (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert items, deduping against existing non-errored `(track_id,
    /// playlist)` queue rows and against the finished table (spec §4.1/I5).
    pub async fn enqueue(
        &self,
        batch: &[TrackRequest],
        quality: Quality,
        initial_status: Status,
    ) -> Result<EnqueueOutcome, CoreError> {
        let mut outcome = EnqueueOutcome::default();
        let mut tx = self.pool.begin().await?;
        let now = Utc::now().to_rfc3339();

        for item in batch {
            let already_finished: Option<i64> = sqlx::query(
                "SELECT 1 FROM finished_tracks WHERE track_id = ? AND playlist = ?",
            )
            .bind(&item.track_id)
            .bind(&item.playlist)
            .fetch_optional(&mut *tx)
            .await?
            .map(|row| row.get(0));

            if already_finished.is_some() {
                outcome.skipped += 1;
                continue;
            }

            let already_queued: Option<i64> = sqlx::query(
                r#"SELECT 1 FROM queue_items
                   WHERE track_id = ? AND playlist = ? AND status != ?"#,
            )
            .bind(&item.track_id)
            .bind(&item.playlist)
            .bind(STATUS_ERROR)
            .fetch_optional(&mut *tx)
            .await?
            .map(|row| row.get(0));

            if already_queued.is_some() {
                outcome.duplicates += 1;
                continue;
            }

            sqlx::query(
                r#"
                INSERT INTO queue_items
                    (track_id, title, artist, album, playlist, cover_url, quality,
                     status, progress, error_message, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, NULL, ?, ?)
                "#,
            )
            .bind(&item.track_id)
            .bind(&item.title)
            .bind(&item.artist)
            .bind(&item.album)
            .bind(&item.playlist)
            .bind(&item.cover_url)
            .bind(quality.as_str())
            .bind(initial_status.as_str())
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await?;

            outcome.added += 1;
        }

        tx.commit().await?;
        Ok(outcome)
    }

    /// The oldest `queued` item, ordered by creation time then id (spec §5
    /// ordering guarantee).
    pub async fn next_queued(&self) -> Result<Option<QueueItem>, CoreError> {
        let row = sqlx::query(
            "SELECT * FROM queue_items WHERE status = ? ORDER BY created_at ASC, id ASC LIMIT 1",
        )
        .bind(STATUS_QUEUED)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_queue_item).transpose()
    }

    /// Atomically update an item's status, and optionally its progress and
    /// error message.
    pub async fn set_status(
        &self,
        id: i64,
        status: Status,
        progress: Option<u8>,
        error: Option<&str>,
    ) -> Result<(), CoreError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"UPDATE queue_items
               SET status = ?, progress = COALESCE(?, progress), error_message = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(status.as_str())
        .bind(progress.map(|p| p as i64))
        .bind(error)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Transition every `pending` row to `queued` (spec §4.7 "Start").
    pub async fn promote_pending_to_queued(&self) -> Result<u64, CoreError> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query("UPDATE queue_items SET status = ?, updated_at = ? WHERE status = ?")
            .bind(STATUS_QUEUED)
            .bind(&now)
            .bind(STATUS_PENDING)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Set any lingering `downloading` row back to `queued` with progress 0
    /// (spec §4.1/I2, called once at worker startup).
    pub async fn reset_stale_downloading(&self) -> Result<u64, CoreError> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "UPDATE queue_items SET status = ?, progress = 0, updated_at = ? WHERE status = ?",
        )
        .bind(STATUS_QUEUED)
        .bind(&now)
        .bind(STATUS_DOWNLOADING)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Upsert a finished artifact; `(track_id, playlist)` is the upsert key
    /// (spec §4.1).
    pub async fn finish_track(&self, row: &FinishedTrack) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO finished_tracks (
                track_id, playlist, title, artist, album, file_path, file_size_mib,
                format, quality_string, cover, downloaded_at, year, genre, label,
                isrc, duration_secs, version
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(track_id, playlist) DO UPDATE SET
                title = excluded.title,
                artist = excluded.artist,
                album = excluded.album,
                file_path = excluded.file_path,
                file_size_mib = excluded.file_size_mib,
                format = excluded.format,
                quality_string = excluded.quality_string,
                cover = excluded.cover,
                downloaded_at = excluded.downloaded_at,
                year = excluded.year,
                genre = excluded.genre,
                label = excluded.label,
                isrc = excluded.isrc,
                duration_secs = excluded.duration_secs,
                version = excluded.version
            "#,
        )
        .bind(&row.track_id)
        .bind(&row.playlist)
        .bind(&row.title)
        .bind(&row.artist)
        .bind(&row.album)
        .bind(&row.file_path)
        .bind(row.file_size_mib)
        .bind(&row.format)
        .bind(&row.quality_string)
        .bind(&row.cover)
        .bind(row.downloaded_at.to_rfc3339())
        .bind(row.year)
        .bind(&row.genre)
        .bind(&row.label)
        .bind(&row.isrc)
        .bind(row.duration_secs)
        .bind(&row.version)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Stat every finished row's `file_path`; delete rows whose file is
    /// absent (spec §4.1/R1/I4). Returns (checked, existing, missing, deleted).
    pub async fn sweep_missing(&self) -> Result<(u64, u64, u64, u64), CoreError> {
        let rows = sqlx::query("SELECT track_id, playlist, file_path FROM finished_tracks")
            .fetch_all(&self.pool)
            .await?;

        let checked = rows.len() as u64;
        let mut existing = 0u64;
        let mut missing = 0u64;
        let mut deleted = 0u64;

        for row in rows {
            let track_id: String = row.get("track_id");
            let playlist: String = row.get("playlist");
            let file_path: String = row.get("file_path");

            if tokio::fs::metadata(&file_path).await.is_ok() {
                existing += 1;
            } else {
                missing += 1;
                sqlx::query("DELETE FROM finished_tracks WHERE track_id = ? AND playlist = ?")
                    .bind(&track_id)
                    .bind(&playlist)
                    .execute(&self.pool)
                    .await?;
                deleted += 1;
            }
        }

        Ok((checked, existing, missing, deleted))
    }

    /// Ordered queue view: downloading first, then queued, pending, error,
    /// completed last; ties broken by creation time (mirrors the reference
    /// implementation's status-priority ordering).
    pub async fn get_queue(&self, limit: Option<u32>) -> Result<Vec<QueueItem>, CoreError> {
        let limit = limit.unwrap_or(u32::MAX) as i64;
        let rows = sqlx::query(
            r#"
            SELECT * FROM queue_items
            ORDER BY
                CASE status
                    WHEN 'downloading' THEN 1
                    WHEN 'queued' THEN 2
                    WHEN 'pending' THEN 3
                    WHEN 'error' THEN 4
                    WHEN 'completed' THEN 5
                    ELSE 6
                END,
                created_at ASC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_queue_item).collect()
    }

    /// Per-status counts plus finished-table totals (spec §4.8 `get_stats`).
    /// Worker flags (`running`/`paused`/`current_track_id`) are filled in by
    /// the caller, which owns that state.
    pub async fn get_counts(&self) -> Result<(u32, u32, u32, u32, u32, u64, f64), CoreError> {
        let mut pending = 0u32;
        let mut queued = 0u32;
        let mut downloading = 0u32;
        let mut completed = 0u32;
        let mut error = 0u32;

        let rows = sqlx::query("SELECT status, COUNT(*) as n FROM queue_items GROUP BY status")
            .fetch_all(&self.pool)
            .await?;
        for row in rows {
            let status: String = row.get("status");
            let n: i64 = row.get("n");
            match Status::parse(&status) {
                Some(Status::Pending) => pending = n as u32,
                Some(Status::Queued) => queued = n as u32,
                Some(Status::Downloading) => downloading = n as u32,
                Some(Status::Completed) => completed = n as u32,
                Some(Status::Error) => error = n as u32,
                None => {}
            }
        }

        let totals = sqlx::query(
            "SELECT COUNT(*) as n, COALESCE(SUM(file_size_mib), 0.0) as total_mib FROM finished_tracks",
        )
        .fetch_one(&self.pool)
        .await?;
        let total_files: i64 = totals.get("n");
        let total_size_mib: f64 = totals.get("total_mib");

        Ok((
            pending,
            queued,
            downloading,
            completed,
            error,
            total_files as u64,
            total_size_mib,
        ))
    }

    pub async fn clear(&self, scope: ClearScope) -> Result<u64, CoreError> {
        let result = match scope {
            ClearScope::Completed => {
                sqlx::query("DELETE FROM queue_items WHERE status = ?")
                    .bind(STATUS_COMPLETED)
                    .execute(&self.pool)
                    .await?
            }
            ClearScope::Pending => {
                sqlx::query("DELETE FROM queue_items WHERE status IN (?, ?)")
                    .bind(STATUS_PENDING)
                    .bind(STATUS_QUEUED)
                    .execute(&self.pool)
                    .await?
            }
            ClearScope::All => sqlx::query("DELETE FROM queue_items").execute(&self.pool).await?,
        };
        Ok(result.rows_affected())
    }

    pub async fn remove_selected(&self, ids: &[i64]) -> Result<u64, CoreError> {
        let mut removed = 0u64;
        let mut tx = self.pool.begin().await?;
        for id in ids {
            let result = sqlx::query("DELETE FROM queue_items WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            removed += result.rows_affected();
        }
        tx.commit().await?;
        Ok(removed)
    }

    pub async fn change_status(
        &self,
        from: Status,
        to: Status,
        limit: Option<u32>,
    ) -> Result<u64, CoreError> {
        let now = Utc::now().to_rfc3339();
        let limit = limit.unwrap_or(u32::MAX) as i64;
        let result = sqlx::query(
            r#"UPDATE queue_items SET status = ?, updated_at = ?
               WHERE id IN (SELECT id FROM queue_items WHERE status = ? LIMIT ?)"#,
        )
        .bind(to.as_str())
        .bind(&now)
        .bind(from.as_str())
        .bind(limit)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn get_setting(&self, key: &str) -> Result<Option<String>, CoreError> {
        let row = sqlx::query("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("value")))
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<(), CoreError> {
        sqlx::query(
            r#"INSERT INTO settings (key, value) VALUES (?, ?)
               ON CONFLICT(key) DO UPDATE SET value = excluded.value"#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// All finished rows for a playlist, used by `preview()` (spec §4.8) to
    /// compute `already_downloaded`.
    pub async fn finished_track_ids_for_playlist(
        &self,
        playlist: &str,
    ) -> Result<Vec<String>, CoreError> {
        let rows = sqlx::query("SELECT track_id FROM finished_tracks WHERE playlist = ?")
            .bind(playlist)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|r| r.get("track_id")).collect())
    }

    /// All non-errored queue track ids for a playlist, used by `preview()`
    /// to compute `already_queued`.
    pub async fn queued_track_ids_for_playlist(
        &self,
        playlist: &str,
    ) -> Result<Vec<String>, CoreError> {
        let rows = sqlx::query(
            "SELECT track_id FROM queue_items WHERE playlist = ? AND status != ?",
        )
        .bind(playlist)
        .bind(STATUS_ERROR)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.get("track_id")).collect())
    }
}

/// A full stats snapshot combining store counts with worker flags supplied
/// by the caller (spec §4.8 `get_stats`).
pub fn assemble_stats(
    counts: (u32, u32, u32, u32, u32, u64, f64),
    running: bool,
    paused: bool,
    current_track_id: Option<String>,
) -> QueueStats {
    let (pending, queued, downloading, completed, error, total_files, total_size_mib) = counts;
    QueueStats {
        pending,
        queued,
        downloading,
        completed,
        error,
        running,
        paused,
        current_track_id,
        total_files,
        total_size_mib,
    }
}
