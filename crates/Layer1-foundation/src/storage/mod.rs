//! Storage module for SmartX
//!
//! - `table`: 비동기 테이블 저장소 계약 (`TableStorage`, `Query`, `StorageError`)
//! - `memory`: 메모리 구현 (테스트, 단일 프로세스)
//! - `sqlite`: SQLite 구현 (행을 JSON 문서로 저장)
//! - `json`: JSON - 범용 파일 저장/로드 (설정용)

mod json;
mod memory;
mod sqlite;
mod table;

// Table Storage (호스트 백엔드 대체)
pub use table::{
    compare_values, Filter, FilterOp, OrderBy, Query, Row, StorageError, StorageErrorCode,
    TableStorage, ID_COLUMN,
};

pub use memory::MemoryStorage;
pub use sqlite::{SqliteStorage, SQLITE_FILE};

// JSON Storage (범용)
pub use json::{JsonStore, PROJECT_DIR, SMARTX_DIR};
