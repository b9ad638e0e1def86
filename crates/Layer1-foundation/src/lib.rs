//! # smartx-foundation
//!
//! Foundation layer for SmartX:
//! - Error: 공통 에러 타입
//! - Config: 통합 설정 (AppConfig, 저장소/이벤트/자동 시작)
//! - Event: 이벤트 버스 (관찰자 + 브로드캐스트 + 히스토리)
//! - Storage: 비동기 테이블 저장소 (Memory, SQLite), JsonStore (설정 파일)
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Host Application (smartx-core)                          │
//! │  ├── PluginRegistry ── EventBus                          │
//! │  └── LifecycleAuditListener                              │
//! │                     │                                   │
//! │                     ▼                                   │
//! │          TableStorage (insert/select/update/delete)     │
//! │          ┌─────────┴─────────┐                         │
//! │          ▼                   ▼                         │
//! │    MemoryStorage       SqliteStorage                   │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod storage;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config (설정)
// ============================================================================
pub use config::{
    AppConfig, AutostartConfig, ConfigLayer, EventsConfig, EventsLayer, StorageBackend,
    StorageConfig, StorageLayer, VersionStrategy, APP_CONFIG_FILE,
};

// ============================================================================
// Storage (저장소)
// ============================================================================
pub use storage::{
    Filter, FilterOp, JsonStore, MemoryStorage, OrderBy, Query, Row, SqliteStorage, StorageError,
    StorageErrorCode, TableStorage,
};

// ============================================================================
// Event (이벤트 시스템)
// ============================================================================
pub use event::{
    AppEvent, EventBus, EventBusConfig, EventCategory, EventFilter, EventId, EventListener,
    EventSeverity, ListenerId,
};
