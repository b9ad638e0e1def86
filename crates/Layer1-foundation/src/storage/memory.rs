//! In-memory table storage
//!
//! 테스트와 단일 프로세스 실행용. 프로세스 종료 시 데이터는 사라집니다.

use super::table::{apply_patch, prepare_insert, row_id, Query, Row, StorageError, TableStorage};
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// 메모리 기반 테이블 저장소
#[derive(Debug, Default)]
pub struct MemoryStorage {
    tables: RwLock<HashMap<String, Vec<Row>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// 테이블의 행 수
    pub async fn count(&self, table: &str) -> usize {
        let tables = self.tables.read().await;
        tables.get(table).map(|rows| rows.len()).unwrap_or(0)
    }
}

#[async_trait]
impl TableStorage for MemoryStorage {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Row> {
        let row = prepare_insert(row)?;
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();

        if let Some(id) = row_id(&row) {
            if rows.iter().any(|r| row_id(r) == Some(id)) {
                return Err(StorageError::new(format!(
                    "duplicate key '{}' in table '{}'",
                    id, table
                ))
                .into());
            }
        }

        rows.push(row.clone());
        debug!(table, "Inserted row");
        Ok(row)
    }

    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Row>> {
        let tables = self.tables.read().await;
        let rows = tables.get(table).cloned().unwrap_or_default();
        Ok(query.apply(rows))
    }

    async fn update(&self, table: &str, id: &str, patch: Row) -> Result<Row> {
        let mut tables = self.tables.write().await;
        let row = tables
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|r| row_id(r) == Some(id)))
            .ok_or_else(|| {
                StorageError::not_found(format!("row '{}' not found in table '{}'", id, table))
            })?;

        apply_patch(row, patch);
        Ok(row.clone())
    }

    async fn delete(&self, table: &str, id: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        let rows = tables.get_mut(table).ok_or_else(|| {
            StorageError::not_found(format!("row '{}' not found in table '{}'", id, table))
        })?;

        let before = rows.len();
        rows.retain(|r| row_id(r) != Some(id));
        if rows.len() == before {
            return Err(StorageError::not_found(format!(
                "row '{}' not found in table '{}'",
                id, table
            ))
            .into());
        }
        Ok(())
    }
}
