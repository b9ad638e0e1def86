//! Plugin Events - 라이프사이클 이벤트
//!
//! 레지스트리는 foundation EventBus로 이벤트를 발행합니다.
//! 이벤트 이름과 payload(`pluginId`, error 시 `error`)는 고정 계약입니다.

use super::error::PluginError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smartx_foundation::{AppEvent, EventCategory, EventFilter, EventListener, EventSeverity};
use std::sync::Arc;

/// 레지스트리 이벤트 소스 이름
pub const REGISTRY_SOURCE: &str = "plugin_registry";

// ============================================================================
// PluginEventKind
// ============================================================================

/// 라이프사이클 이벤트 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PluginEventKind {
    #[serde(rename = "plugin:installing")]
    Installing,
    #[serde(rename = "plugin:installed")]
    Installed,
    #[serde(rename = "plugin:enabling")]
    Enabling,
    #[serde(rename = "plugin:enabled")]
    Enabled,
    #[serde(rename = "plugin:disabling")]
    Disabling,
    #[serde(rename = "plugin:disabled")]
    Disabled,
    #[serde(rename = "plugin:uninstalling")]
    Uninstalling,
    #[serde(rename = "plugin:uninstalled")]
    Uninstalled,
    #[serde(rename = "plugin:error")]
    Error,
}

impl PluginEventKind {
    pub const ALL: [PluginEventKind; 9] = [
        Self::Installing,
        Self::Installed,
        Self::Enabling,
        Self::Enabled,
        Self::Disabling,
        Self::Disabled,
        Self::Uninstalling,
        Self::Uninstalled,
        Self::Error,
    ];

    /// 이벤트 이름 (예: "plugin:enabled")
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Installing => "plugin:installing",
            Self::Installed => "plugin:installed",
            Self::Enabling => "plugin:enabling",
            Self::Enabled => "plugin:enabled",
            Self::Disabling => "plugin:disabling",
            Self::Disabled => "plugin:disabled",
            Self::Uninstalling => "plugin:uninstalling",
            Self::Uninstalled => "plugin:uninstalled",
            Self::Error => "plugin:error",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.as_str() == name)
    }
}

impl std::fmt::Display for PluginEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// PluginEvent
// ============================================================================

/// error 이벤트에 실리는 에러 정보
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl From<&PluginError> for ErrorInfo {
    fn from(err: &PluginError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// 타입이 있는 라이프사이클 이벤트
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginEvent {
    pub kind: PluginEventKind,
    pub plugin_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    pub timestamp: DateTime<Utc>,
}

impl PluginEvent {
    pub fn new(kind: PluginEventKind, plugin_id: impl Into<String>) -> Self {
        Self {
            kind,
            plugin_id: plugin_id.into(),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn error(plugin_id: impl Into<String>, err: &PluginError) -> Self {
        Self {
            error: Some(ErrorInfo::from(err)),
            ..Self::new(PluginEventKind::Error, plugin_id)
        }
    }

    /// 버스로 보낼 AppEvent로 변환
    pub fn to_app_event(&self) -> AppEvent {
        let mut data = serde_json::json!({ "pluginId": self.plugin_id });
        if let Some(ref error) = self.error {
            data["error"] = serde_json::json!({
                "code": error.code,
                "message": error.message,
            });
        }

        let severity = match self.kind {
            PluginEventKind::Error => EventSeverity::Error,
            _ => EventSeverity::Info,
        };

        let mut event = AppEvent::new(self.kind.as_str(), EventCategory::Plugin)
            .with_source(REGISTRY_SOURCE)
            .with_severity(severity)
            .with_data(data);
        event.timestamp = self.timestamp;
        event
    }

    /// 버스에서 받은 AppEvent 해석 (플러그인 이벤트가 아니면 None)
    pub fn from_app_event(event: &AppEvent) -> Option<Self> {
        if event.category != EventCategory::Plugin {
            return None;
        }
        let kind = PluginEventKind::parse(&event.event_type)?;
        let plugin_id = event.data.get("pluginId")?.as_str()?.to_string();
        let error = event
            .data
            .get("error")
            .and_then(|e| serde_json::from_value::<ErrorInfo>(e.clone()).ok());

        Some(Self {
            kind,
            plugin_id,
            error,
            timestamp: event.timestamp,
        })
    }
}

// ============================================================================
// PluginEventHandler - 이벤트 핸들러 트레이트
// ============================================================================

/// 라이프사이클 이벤트 핸들러
#[async_trait]
pub trait PluginEventHandler: Send + Sync {
    /// 핸들러 이름
    fn name(&self) -> &str {
        "plugin-event-handler"
    }

    /// 이벤트 처리
    async fn handle(&self, event: &PluginEvent);
}

/// 클로저 기반 핸들러
pub struct FnHandler<F> {
    name: String,
    f: F,
}

#[async_trait]
impl<F> PluginEventHandler for FnHandler<F>
where
    F: Fn(&PluginEvent) + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, event: &PluginEvent) {
        (self.f)(event)
    }
}

/// 동기 클로저를 핸들러로 감싸기
pub fn handler_fn<F>(name: impl Into<String>, f: F) -> Arc<dyn PluginEventHandler>
where
    F: Fn(&PluginEvent) + Send + Sync + 'static,
{
    Arc::new(FnHandler {
        name: name.into(),
        f,
    })
}

/// PluginEventHandler → EventListener 어댑터
pub(crate) struct HandlerListener {
    handler: Arc<dyn PluginEventHandler>,
}

impl HandlerListener {
    pub(crate) fn new(handler: Arc<dyn PluginEventHandler>) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl EventListener for HandlerListener {
    fn name(&self) -> &str {
        self.handler.name()
    }

    fn categories(&self) -> Option<Vec<EventCategory>> {
        Some(vec![EventCategory::Plugin])
    }

    async fn on_event(&self, event: &AppEvent) {
        if let Some(plugin_event) = PluginEvent::from_app_event(event) {
            self.handler.handle(&plugin_event).await;
        }
    }
}

/// 특정 이벤트 이름만 통과시키는 필터
pub(crate) fn kind_filter(kind: PluginEventKind) -> EventFilter {
    EventFilter::new()
        .with_categories(vec![EventCategory::Plugin])
        .with_event_types(vec![kind.as_str().to_string()])
}

/// 모든 라이프사이클 이벤트 필터
pub(crate) fn lifecycle_filter() -> EventFilter {
    EventFilter::new()
        .with_categories(vec![EventCategory::Plugin])
        .with_prefixes(vec!["plugin:".to_string()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        let names: Vec<_> = PluginEventKind::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(names.len(), 9);
        assert!(names.iter().all(|n| n.starts_with("plugin:")));
        assert_eq!(PluginEventKind::parse("plugin:disabled"), Some(PluginEventKind::Disabled));
        assert_eq!(PluginEventKind::parse("plugin:loaded"), None);
    }

    #[test]
    fn test_app_event_round_trip_with_error() {
        let err = PluginError::not_installed("smart.farm");
        let event = PluginEvent::error("smart.farm", &err);
        let app_event = event.to_app_event();

        assert_eq!(app_event.event_type, "plugin:error");
        assert_eq!(app_event.severity, EventSeverity::Error);
        assert_eq!(app_event.data["pluginId"], "smart.farm");
        assert_eq!(app_event.data["error"]["code"], "NOT_INSTALLED");

        let parsed = PluginEvent::from_app_event(&app_event).unwrap();
        assert_eq!(parsed.kind, PluginEventKind::Error);
        assert_eq!(parsed.error.unwrap().code, "NOT_INSTALLED");
    }

    #[test]
    fn test_non_plugin_event_is_ignored() {
        let event = AppEvent::new("system:started", EventCategory::System);
        assert!(PluginEvent::from_app_event(&event).is_none());
    }

    #[test]
    fn test_filters() {
        let installed = PluginEvent::new(PluginEventKind::Installed, "p").to_app_event();
        let enabled = PluginEvent::new(PluginEventKind::Enabled, "p").to_app_event();

        let filter = kind_filter(PluginEventKind::Enabled);
        assert!(!filter.matches(&installed));
        assert!(filter.matches(&enabled));
        assert!(lifecycle_filter().matches(&installed));
    }

    #[tokio::test]
    async fn test_handler_fn_adapter() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let listener = HandlerListener::new(handler_fn("test", move |e| {
            sink.lock().unwrap().push(e.plugin_id.clone());
        }));

        listener
            .on_event(&PluginEvent::new(PluginEventKind::Installed, "p1").to_app_event())
            .await;
        assert_eq!(*seen.lock().unwrap(), vec!["p1"]);
        assert_eq!(listener.name(), "test");
    }
}
