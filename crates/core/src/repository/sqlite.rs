//! SQLite-backed torrent metadata repository.

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::{FileInfo, RepositoryError, TorrentInfoRecord, TorrentRepository};

/// SQLite-backed repository behind a connection mutex.
pub struct SqliteTorrentRepository {
    conn: Mutex<Connection>,
}

impl SqliteTorrentRepository {
    /// Open (or create) the database file and initialize the schema.
    pub fn new(path: &Path) -> Result<Self, RepositoryError> {
        let conn = Connection::open(path).map_err(|e| RepositoryError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory repository, for testing.
    pub fn in_memory() -> Result<Self, RepositoryError> {
        let conn =
            Connection::open_in_memory().map_err(|e| RepositoryError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), RepositoryError> {
        conn.execute_batch(
            r#"
            -- Torrent metadata (one row per unique info_hash)
            CREATE TABLE IF NOT EXISTS torrent_info (
                hash TEXT PRIMARY KEY,
                title TEXT NOT NULL DEFAULT '',
                size INTEGER NOT NULL DEFAULT 0,
                indexer TEXT NOT NULL DEFAULT '',
                category TEXT,
                seeders INTEGER,
                leechers INTEGER,
                private INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Files within stored torrents
            CREATE TABLE IF NOT EXISTS torrent_file (
                hash TEXT NOT NULL REFERENCES torrent_info(hash) ON DELETE CASCADE,
                idx INTEGER NOT NULL,
                path TEXT NOT NULL,
                name TEXT NOT NULL,
                size INTEGER NOT NULL DEFAULT 0,
                source TEXT NOT NULL DEFAULT '',
                UNIQUE(hash, idx)
            );

            CREATE INDEX IF NOT EXISTS idx_torrent_file_hash ON torrent_file(hash);

            -- Stream identifier grouping
            CREATE TABLE IF NOT EXISTS stream_link (
                stream_id TEXT NOT NULL,
                hash TEXT NOT NULL REFERENCES torrent_info(hash) ON DELETE CASCADE,
                UNIQUE(stream_id, hash)
            );

            CREATE INDEX IF NOT EXISTS idx_stream_link_sid ON stream_link(stream_id);
            "#,
        )
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        Ok(())
    }

    fn load_files(conn: &Connection, hash: &str) -> Result<Vec<FileInfo>, RepositoryError> {
        let mut stmt = conn
            .prepare(
                "SELECT idx, path, name, size, source FROM torrent_file
                 WHERE hash = ? ORDER BY idx",
            )
            .map_err(|e| RepositoryError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![hash], |row| {
                Ok(FileInfo {
                    index: row.get(0)?,
                    path: row.get(1)?,
                    name: row.get(2)?,
                    size: row.get(3)?,
                    source: row.get(4)?,
                })
            })
            .map_err(|e| RepositoryError::Database(e.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| RepositoryError::Database(e.to_string()))
    }

    fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<TorrentInfoRecord> {
        Ok(TorrentInfoRecord {
            hash: row.get(0)?,
            title: row.get(1)?,
            size: row.get(2)?,
            indexer: row.get(3)?,
            category: row.get(4)?,
            seeders: row.get(5)?,
            leechers: row.get(6)?,
            private: row.get::<_, i64>(7)? != 0,
            files: Vec::new(),
        })
    }

    const RECORD_COLUMNS: &'static str =
        "hash, title, size, indexer, category, seeders, leechers, private";
}

impl TorrentRepository for SqliteTorrentRepository {
    fn list_by_stream_id(
        &self,
        stream_id: &str,
        exclude_missing_size: bool,
    ) -> Result<Vec<TorrentInfoRecord>, RepositoryError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());

        let sql = format!(
            "SELECT t.hash, t.title, t.size, t.indexer, t.category, t.seeders, t.leechers, t.private
             FROM torrent_info t
             JOIN stream_link s ON s.hash = t.hash
             WHERE s.stream_id = ?{}
             ORDER BY t.hash",
            if exclude_missing_size {
                " AND t.size > 0"
            } else {
                ""
            }
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| RepositoryError::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![stream_id], Self::row_to_record)
            .map_err(|e| RepositoryError::Database(e.to_string()))?;

        let mut records = rows
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| RepositoryError::Database(e.to_string()))?;
        for record in &mut records {
            record.files = Self::load_files(&conn, &record.hash)?;
        }
        Ok(records)
    }

    fn upsert(
        &self,
        records: &[TorrentInfoRecord],
        stream_id: Option<&str>,
        dedupe: bool,
    ) -> Result<(), RepositoryError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::Database(e.to_string()))?;
        let now = Utc::now().to_rfc3339();

        for record in records {
            if dedupe {
                // Refresh on conflict, keeping already-known values when the
                // incoming record carries an empty/unknown field.
                tx.execute(
                    r#"
                    INSERT INTO torrent_info
                        (hash, title, size, indexer, category, seeders, leechers, private,
                         created_at, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
                    ON CONFLICT(hash) DO UPDATE SET
                        title = CASE WHEN excluded.title != '' THEN excluded.title ELSE title END,
                        size = CASE WHEN excluded.size > 0 THEN excluded.size ELSE size END,
                        indexer = CASE WHEN excluded.indexer != '' THEN excluded.indexer ELSE indexer END,
                        category = COALESCE(excluded.category, category),
                        seeders = COALESCE(excluded.seeders, seeders),
                        leechers = COALESCE(excluded.leechers, leechers),
                        private = excluded.private,
                        updated_at = excluded.updated_at
                    "#,
                    params![
                        record.hash,
                        record.title,
                        record.size,
                        record.indexer,
                        record.category,
                        record.seeders,
                        record.leechers,
                        record.private as i64,
                        now,
                    ],
                )
                .map_err(|e| RepositoryError::Database(e.to_string()))?;
            } else {
                tx.execute(
                    r#"
                    INSERT OR IGNORE INTO torrent_info
                        (hash, title, size, indexer, category, seeders, leechers, private,
                         created_at, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
                    "#,
                    params![
                        record.hash,
                        record.title,
                        record.size,
                        record.indexer,
                        record.category,
                        record.seeders,
                        record.leechers,
                        record.private as i64,
                        now,
                    ],
                )
                .map_err(|e| RepositoryError::Database(e.to_string()))?;
            }

            for file in &record.files {
                tx.execute(
                    r#"
                    INSERT INTO torrent_file (hash, idx, path, name, size, source)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    ON CONFLICT(hash, idx) DO UPDATE SET
                        path = excluded.path,
                        name = excluded.name,
                        size = excluded.size,
                        source = excluded.source
                    "#,
                    params![
                        record.hash,
                        file.index,
                        file.path,
                        file.name,
                        file.size,
                        file.source,
                    ],
                )
                .map_err(|e| RepositoryError::Database(e.to_string()))?;
            }

            if let Some(sid) = stream_id {
                tx.execute(
                    "INSERT OR IGNORE INTO stream_link (stream_id, hash) VALUES (?1, ?2)",
                    params![sid, record.hash],
                )
                .map_err(|e| RepositoryError::Database(e.to_string()))?;
            }
        }

        tx.commit()
            .map_err(|e| RepositoryError::Database(e.to_string()))
    }

    fn get(&self, hash: &str) -> Result<Option<TorrentInfoRecord>, RepositoryError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());

        let sql = format!(
            "SELECT {} FROM torrent_info WHERE hash = ?",
            Self::RECORD_COLUMNS
        );
        let record = conn
            .query_row(&sql, params![hash], Self::row_to_record)
            .optional()
            .map_err(|e| RepositoryError::Database(e.to_string()))?;

        match record {
            Some(mut record) => {
                record.files = Self::load_files(&conn, hash)?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn count(&self) -> Result<u64, RepositoryError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.query_row("SELECT COUNT(*) FROM torrent_info", [], |row| row.get(0))
            .map_err(|e| RepositoryError::Database(e.to_string()))
    }
}
