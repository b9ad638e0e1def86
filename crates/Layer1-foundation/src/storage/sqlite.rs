//! SQLite table storage
//!
//! 모든 테이블의 행을 JSON 문서로 `table_rows`에 저장합니다.
//! 필터/정렬은 공통 `Query` 로직으로 평가합니다.
//!
//! ## Schema
//!
//! Database schema is versioned in `schema_version`.
//! - Version 1: `table_rows` (created_at/updated_at 포함)

use super::table::{apply_patch, prepare_insert, row_id, Query, Row, StorageError, TableStorage};
use crate::{Error, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Current schema version
const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Database file name inside the data directory
pub const SQLITE_FILE: &str = "smartx.db";

/// SQLite 기반 테이블 저장소
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    /// Open (or create) the database inside `data_dir`
    pub fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir).map_err(|e| {
            StorageError::new(format!("Failed to create data directory: {}", e))
        })?;

        let db_path = data_dir.join(SQLITE_FILE);
        let conn = Connection::open(&db_path)
            .map_err(|e| StorageError::new(format!("Failed to open database: {}", e)))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| StorageError::new(format!("Failed to set pragmas: {}", e)))?;

        Self::from_connection(conn)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            StorageError::new(format!("Failed to create in-memory database: {}", e))
        })?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let storage = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        storage.initialize_schema()?;

        let version = storage.get_schema_version()?;
        if version > CURRENT_SCHEMA_VERSION {
            return Err(StorageError::new(format!(
                "Database schema version {} is newer than supported version {}",
                version, CURRENT_SCHEMA_VERSION
            ))
            .into());
        }
        debug!("Database schema version {}", version);

        Ok(storage)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Internal("Lock poisoned".to_string()))
    }

    /// Get current schema version from database
    pub fn get_schema_version(&self) -> Result<i32> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .map_err(|e| StorageError::new(format!("Failed to get schema version: {}", e)).into())
    }

    fn initialize_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS table_rows (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                table_name TEXT NOT NULL,
                row_id TEXT NOT NULL,
                data TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT,
                UNIQUE (table_name, row_id)
            );

            CREATE INDEX IF NOT EXISTS idx_table_rows_table
                ON table_rows(table_name, seq);

            INSERT OR IGNORE INTO schema_version (version) VALUES (1);
            "#,
        )
        .map_err(|e| StorageError::new(format!("Failed to initialize schema: {}", e)))?;

        Ok(())
    }

    fn load_row(conn: &Connection, table: &str, id: &str) -> Result<Option<Row>> {
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM table_rows WHERE table_name = ?1 AND row_id = ?2",
                params![table, id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StorageError::new(format!("Failed to load row: {}", e)))?;

        data.map(|d| serde_json::from_str::<Row>(&d).map_err(Error::from))
            .transpose()
    }
}

#[async_trait]
impl TableStorage for SqliteStorage {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Row> {
        let row = prepare_insert(row)?;
        let id = row_id(&row).unwrap_or_default().to_string();
        let data = serde_json::to_string(&row)?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO table_rows (table_name, row_id, data, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![table, id, data, chrono::Utc::now().to_rfc3339()],
        )
        .map_err(|e| StorageError::new(format!("Failed to insert into '{}': {}", table, e)))?;

        debug!(table, row_id = %id, "Inserted row");
        Ok(row)
    }

    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Row>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT data FROM table_rows WHERE table_name = ?1 ORDER BY seq")
            .map_err(|e| StorageError::new(format!("Failed to prepare select: {}", e)))?;

        let docs = stmt
            .query_map(params![table], |row| row.get::<_, String>(0))
            .map_err(|e| StorageError::new(format!("Failed to select from '{}': {}", table, e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| StorageError::new(format!("Failed to read rows: {}", e)))?;

        let rows = docs
            .iter()
            .map(|d| serde_json::from_str::<Row>(d))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(query.apply(rows))
    }

    async fn update(&self, table: &str, id: &str, patch: Row) -> Result<Row> {
        let conn = self.lock()?;
        let mut row = Self::load_row(&conn, table, id)?.ok_or_else(|| {
            StorageError::not_found(format!("row '{}' not found in table '{}'", id, table))
        })?;

        apply_patch(&mut row, patch);
        let data = serde_json::to_string(&row)?;

        conn.execute(
            "UPDATE table_rows SET data = ?1, updated_at = ?2 WHERE table_name = ?3 AND row_id = ?4",
            params![data, chrono::Utc::now().to_rfc3339(), table, id],
        )
        .map_err(|e| StorageError::new(format!("Failed to update '{}': {}", table, e)))?;

        Ok(row)
    }

    async fn delete(&self, table: &str, id: &str) -> Result<()> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "DELETE FROM table_rows WHERE table_name = ?1 AND row_id = ?2",
                params![table, id],
            )
            .map_err(|e| StorageError::new(format!("Failed to delete from '{}': {}", table, e)))?;

        if changed == 0 {
            return Err(StorageError::not_found(format!(
                "row '{}' not found in table '{}'",
                id, table
            ))
            .into());
        }
        Ok(())
    }
}
