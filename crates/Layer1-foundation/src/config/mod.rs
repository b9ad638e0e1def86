//! Config - 통합 설정 관리
//!
//! - `app.rs` - AppConfig 통합 설정 (저장소, 이벤트, 자동 시작, 플러그인 오버라이드)와 파일 단위 ConfigLayer

mod app;

pub use app::{
    AppConfig, AutostartConfig, ConfigLayer, EventsConfig, EventsLayer, StorageBackend,
    StorageConfig, StorageLayer, VersionStrategy, APP_CONFIG_FILE,
};
