//! SQLite-backed usage event store.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{UsageError, UsageFilter, UsageRecord, UsageStore};

pub struct SqliteUsageStore {
    conn: Mutex<Connection>,
}

impl SqliteUsageStore {
    pub fn new(path: &Path) -> Result<Self, UsageError> {
        let conn = Connection::open(path).map_err(|e| UsageError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, UsageError> {
        let conn =
            Connection::open_in_memory().map_err(|e| UsageError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), UsageError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS usage_event (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                event_type TEXT NOT NULL,
                indexer TEXT,
                stream_id TEXT,
                data TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_usage_event_type ON usage_event(event_type);
            CREATE INDEX IF NOT EXISTS idx_usage_event_indexer ON usage_event(indexer);
            CREATE INDEX IF NOT EXISTS idx_usage_event_stream ON usage_event(stream_id);
            "#,
        )
        .map_err(|e| UsageError::Database(e.to_string()))
    }

    fn build_where(filter: &UsageFilter) -> (String, Vec<String>) {
        let mut clauses = Vec::new();
        let mut args = Vec::new();
        if let Some(event_type) = &filter.event_type {
            clauses.push("event_type = ?");
            args.push(event_type.clone());
        }
        if let Some(indexer) = &filter.indexer {
            clauses.push("indexer = ?");
            args.push(indexer.clone());
        }
        if let Some(stream_id) = &filter.stream_id {
            clauses.push("stream_id = ?");
            args.push(stream_id.clone());
        }
        let sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        (sql, args)
    }
}

impl UsageStore for SqliteUsageStore {
    fn insert(&self, record: &UsageRecord) -> Result<i64, UsageError> {
        let data = serde_json::to_string(&record.event)
            .map_err(|e| UsageError::Serialization(e.to_string()))?;

        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute(
            "INSERT INTO usage_event (timestamp, event_type, indexer, stream_id, data)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.timestamp.to_rfc3339(),
                record.event_type,
                record.indexer,
                record.stream_id,
                data,
            ],
        )
        .map_err(|e| UsageError::Database(e.to_string()))?;
        Ok(conn.last_insert_rowid())
    }

    fn query(&self, filter: &UsageFilter) -> Result<Vec<UsageRecord>, UsageError> {
        let (where_sql, args) = Self::build_where(filter);
        let sql = format!(
            "SELECT id, timestamp, event_type, indexer, stream_id, data FROM usage_event{}
             ORDER BY id DESC LIMIT ? OFFSET ?",
            where_sql
        );

        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| UsageError::Database(e.to_string()))?;

        let mut params: Vec<&dyn rusqlite::ToSql> =
            args.iter().map(|a| a as &dyn rusqlite::ToSql).collect();
        params.push(&filter.limit);
        params.push(&filter.offset);

        let rows = stmt
            .query_map(params.as_slice(), |row| {
                let timestamp_str: String = row.get(1)?;
                let data: String = row.get(5)?;
                Ok((
                    row.get::<_, i64>(0)?,
                    timestamp_str,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    data,
                ))
            })
            .map_err(|e| UsageError::Database(e.to_string()))?;

        let mut records = Vec::new();
        for row in rows {
            let (id, timestamp_str, event_type, indexer, stream_id, data) =
                row.map_err(|e| UsageError::Database(e.to_string()))?;
            let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| UsageError::Serialization(e.to_string()))?;
            let event = serde_json::from_str(&data)
                .map_err(|e| UsageError::Serialization(e.to_string()))?;
            records.push(UsageRecord {
                id,
                timestamp,
                event_type,
                indexer,
                stream_id,
                event,
            });
        }
        Ok(records)
    }

    fn count(&self, filter: &UsageFilter) -> Result<i64, UsageError> {
        let (where_sql, args) = Self::build_where(filter);
        let sql = format!("SELECT COUNT(*) FROM usage_event{}", where_sql);

        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let params: Vec<&dyn rusqlite::ToSql> =
            args.iter().map(|a| a as &dyn rusqlite::ToSql).collect();
        conn.query_row(&sql, params.as_slice(), |row| row.get(0))
            .map_err(|e| UsageError::Database(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usage::UsageEvent;

    fn record(indexer: &str, sid: &str, cached: bool) -> UsageRecord {
        let event = UsageEvent::IndexerQuery {
            indexer: indexer.to_string(),
            stream_id: sid.to_string(),
            duration_ms: 10,
            result_count: 2,
            cached,
        };
        UsageRecord {
            id: 0,
            timestamp: Utc::now(),
            event_type: event.event_type().to_string(),
            indexer: event.indexer().map(String::from),
            stream_id: event.stream_id().map(String::from),
            event,
        }
    }

    #[test]
    fn test_insert_and_query() {
        let store = SqliteUsageStore::in_memory().unwrap();
        let id = store.insert(&record("nyaa", "tt0000001", false)).unwrap();
        assert!(id > 0);

        let records = store.query(&UsageFilter::new()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].indexer.as_deref(), Some("nyaa"));
        assert!(matches!(
            records[0].event,
            UsageEvent::IndexerQuery { cached: false, .. }
        ));
    }

    #[test]
    fn test_query_filters_by_indexer() {
        let store = SqliteUsageStore::in_memory().unwrap();
        store.insert(&record("nyaa", "tt0000001", false)).unwrap();
        store.insert(&record("rarbg", "tt0000001", false)).unwrap();
        store.insert(&record("nyaa", "tt0000002", true)).unwrap();

        let nyaa = store
            .query(&UsageFilter::new().with_indexer("nyaa"))
            .unwrap();
        assert_eq!(nyaa.len(), 2);

        let count = store
            .count(&UsageFilter::new().with_stream_id("tt0000001"))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_query_respects_limit() {
        let store = SqliteUsageStore::in_memory().unwrap();
        for i in 0..5 {
            store
                .insert(&record("nyaa", &format!("tt{:07}", i), false))
                .unwrap();
        }
        let limited = store.query(&UsageFilter::new().with_limit(2)).unwrap();
        assert_eq!(limited.len(), 2);
    }
}
