//! Event Types - 시스템 전체에서 사용되는 이벤트 타입 정의
//!
//! 호스트 애플리케이션과 플러그인 레지스트리가 발행하는 이벤트의 공통 구조입니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

// ============================================================================
// Event ID
// ============================================================================

/// 이벤트 고유 ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub String);

impl EventId {
    /// 새 이벤트 ID 생성
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Event Category
// ============================================================================

/// 이벤트 카테고리
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// 시스템 이벤트 (시작, 종료, 설정 변경)
    System,
    /// 플러그인 라이프사이클 이벤트
    Plugin,
    /// 저장소 이벤트
    Storage,
    /// 에러 이벤트
    Error,
    /// 사용자 정의 이벤트
    Custom,
}

impl EventCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Plugin => "plugin",
            Self::Storage => "storage",
            Self::Error => "error",
            Self::Custom => "custom",
        }
    }
}

// ============================================================================
// Event Severity
// ============================================================================

/// 이벤트 심각도
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EventSeverity {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl EventSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

// ============================================================================
// AppEvent - 핵심 이벤트 타입
// ============================================================================

/// SmartX 시스템 이벤트
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppEvent {
    /// 이벤트 ID
    pub id: EventId,

    /// 이벤트 이름 (예: "plugin:enabled")
    pub event_type: String,

    /// 이벤트 카테고리
    pub category: EventCategory,

    /// 심각도
    pub severity: EventSeverity,

    /// 이벤트 발생 시간
    pub timestamp: DateTime<Utc>,

    /// 이벤트 소스 (모듈 이름)
    pub source: String,

    /// 이벤트 데이터
    pub data: Value,

    /// 추가 메타데이터
    pub metadata: HashMap<String, Value>,
}

impl AppEvent {
    /// 새 이벤트 생성
    pub fn new(event_type: impl Into<String>, category: EventCategory) -> Self {
        Self {
            id: EventId::new(),
            event_type: event_type.into(),
            category,
            severity: EventSeverity::Info,
            timestamp: Utc::now(),
            source: String::new(),
            data: Value::Null,
            metadata: HashMap::new(),
        }
    }

    pub fn with_severity(mut self, severity: EventSeverity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

// ============================================================================
// 사전 정의된 이벤트 타입들
// ============================================================================

/// 시스템 이벤트
pub mod system {
    use super::*;

    /// 애플리케이션 시작 이벤트
    pub fn started(app_name: &str, version: &str) -> AppEvent {
        AppEvent::new("system:started", EventCategory::System)
            .with_source("app")
            .with_data(serde_json::json!({
                "app": app_name,
                "version": version,
            }))
    }

    /// 애플리케이션 종료 이벤트
    pub fn shutdown(reason: &str) -> AppEvent {
        AppEvent::new("system:shutdown", EventCategory::System)
            .with_source("app")
            .with_data(serde_json::json!({
                "reason": reason,
            }))
    }
}
