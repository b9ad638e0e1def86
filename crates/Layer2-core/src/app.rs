//! Host Application - 레지스트리와 공유 컨텍스트를 소유하는 앱
//!
//! ## 사용법
//!
//! ```ignore
//! let app = SmartApp::builder()
//!     .config(AppConfig::load()?)
//!     .build()
//!     .await?;
//!
//! let report = app.bootstrap(&PluginCatalog::builtin()).await?;
//! println!("installed: {:?}", report.installed);
//!
//! for menu in app.registry().menus().await {
//!     println!("{}", menu.label);
//! }
//!
//! app.shutdown().await?;
//! ```

use crate::plugin::{
    DomainPlugin, HealthReport, PluginCatalog, PluginContext, PluginError, PluginEvent,
    PluginEventHandler, PluginRegistry, PluginResult,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use smartx_foundation::event::system;
use smartx_foundation::{
    AppConfig, EventBus, EventBusConfig, ListenerId, Query, Result, Row, TableStorage,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 라이프사이클 감사 로그 테이블
pub const LIFECYCLE_LOG_TABLE: &str = "plugin_lifecycle_log";

// ============================================================================
// LifecycleAuditListener
// ============================================================================

/// 감사 로그 한 줄
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleRecord {
    pub event: String,
    pub plugin_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl From<&PluginEvent> for LifecycleRecord {
    fn from(event: &PluginEvent) -> Self {
        Self {
            event: event.kind.as_str().to_string(),
            plugin_id: event.plugin_id.clone(),
            error_code: event.error.as_ref().map(|e| e.code.clone()),
            error_message: event.error.as_ref().map(|e| e.message.clone()),
            timestamp: event.timestamp,
        }
    }
}

/// 모든 플러그인 이벤트를 저장소에 기록하는 리스너
pub struct LifecycleAuditListener {
    storage: Arc<dyn TableStorage>,
}

impl LifecycleAuditListener {
    pub fn new(storage: Arc<dyn TableStorage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl PluginEventHandler for LifecycleAuditListener {
    fn name(&self) -> &str {
        "lifecycle_audit"
    }

    async fn handle(&self, event: &PluginEvent) {
        let record = LifecycleRecord::from(event);
        let row = match serde_json::to_value(&record) {
            Ok(serde_json::Value::Object(row)) => row,
            Ok(_) => return,
            Err(e) => {
                warn!(error = %e, "Failed to serialize lifecycle record");
                return;
            }
        };

        // 감사 기록 실패가 라이프사이클 연산을 막지 않음
        if let Err(e) = self.storage.insert(LIFECYCLE_LOG_TABLE, row).await {
            warn!(
                plugin_id = %event.plugin_id,
                event = %event.kind,
                error = %e,
                "Failed to record lifecycle event"
            );
        }
    }
}

// ============================================================================
// Bootstrap
// ============================================================================

/// 자동 시작 결과
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapReport {
    /// 설치 순서대로
    pub installed: Vec<String>,
    pub enabled: Vec<String>,
    /// 카탈로그에 없거나 이미 설치된 ID
    pub skipped: Vec<String>,
}

// ============================================================================
// SmartAppBuilder
// ============================================================================

/// SmartApp 빌더
pub struct SmartAppBuilder {
    config: AppConfig,
    storage: Option<Arc<dyn TableStorage>>,
    audit: bool,
}

impl SmartAppBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
            storage: None,
            audit: true,
        }
    }

    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    /// 저장소 지정 (없으면 설정의 백엔드로 생성)
    pub fn storage(mut self, storage: Arc<dyn TableStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// 라이프사이클 감사 로그 비활성화
    pub fn without_audit(mut self) -> Self {
        self.audit = false;
        self
    }

    pub async fn build(self) -> Result<SmartApp> {
        let storage = match self.storage {
            Some(storage) => storage,
            None => self.config.storage.open()?,
        };

        let events = Arc::new(EventBus::with_config(EventBusConfig::from(&self.config.events)));
        let config = Arc::new(self.config);
        let context = Arc::new(PluginContext::new(
            Arc::clone(&storage),
            Arc::clone(&config),
            Arc::clone(&events),
        ));
        let registry = Arc::new(PluginRegistry::new(context));

        let audit_listener = if self.audit {
            let listener = Arc::new(LifecycleAuditListener::new(Arc::clone(&storage)));
            Some(registry.on_all(listener).await)
        } else {
            None
        };

        events
            .publish(system::started(&config.app_name, env!("CARGO_PKG_VERSION")))
            .await;

        info!(
            app = %config.app_name,
            tenant = config.tenant.as_deref().unwrap_or("-"),
            storage = storage.backend(),
            version_strategy = %config.version_strategy,
            "SmartX application started"
        );

        Ok(SmartApp {
            config,
            registry,
            audit_listener,
        })
    }
}

impl Default for SmartAppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SmartApp
// ============================================================================

/// 호스트 애플리케이션
///
/// 레지스트리 하나와 공유 컨텍스트를 소유합니다.
pub struct SmartApp {
    config: Arc<AppConfig>,
    registry: Arc<PluginRegistry>,
    audit_listener: Option<ListenerId>,
}

impl SmartApp {
    pub fn builder() -> SmartAppBuilder {
        SmartAppBuilder::new()
    }

    // ========================================================================
    // 접근자
    // ========================================================================

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn context(&self) -> &Arc<PluginContext> {
        self.registry.context()
    }

    pub fn storage(&self) -> &Arc<dyn TableStorage> {
        self.context().storage()
    }

    pub fn events(&self) -> &Arc<EventBus> {
        self.registry.events()
    }

    pub fn is_auditing(&self) -> bool {
        self.audit_listener.is_some()
    }

    // ========================================================================
    // 레지스트리 위임
    // ========================================================================

    pub async fn install(&self, plugin: Arc<dyn DomainPlugin>) -> PluginResult<()> {
        self.registry.install(plugin).await
    }

    pub async fn enable(&self, id: &str) -> PluginResult<()> {
        self.registry.enable(id).await
    }

    pub async fn disable(&self, id: &str) -> PluginResult<()> {
        self.registry.disable(id).await
    }

    pub async fn uninstall(&self, id: &str) -> PluginResult<()> {
        self.registry.uninstall(id).await
    }

    pub async fn reload(&self, id: &str) -> PluginResult<()> {
        self.registry.reload(id).await
    }

    pub async fn health_check(&self, id: Option<&str>) -> BTreeMap<String, HealthReport> {
        self.registry.health_check(id).await
    }

    // ========================================================================
    // Bootstrap / Shutdown
    // ========================================================================

    /// autostart 설정에 따라 카탈로그에서 설치/활성화
    ///
    /// 활성화 대상도 설치 대상에 포함되며, 필수 의존성은 카탈로그에서 함께 가져옵니다.
    pub async fn bootstrap(&self, catalog: &PluginCatalog) -> PluginResult<BootstrapReport> {
        let autostart = &self.config.autostart;
        let mut wanted: Vec<String> = Vec::new();
        for id in autostart.install.iter().chain(autostart.enable.iter()) {
            if !wanted.contains(id) {
                wanted.push(id.clone());
            }
        }

        let mut report = BootstrapReport::default();
        let (plugins, unknown) = catalog.with_dependencies(&wanted);
        for id in unknown {
            warn!(plugin_id = %id, "Plugin not found in catalog");
            report.skipped.push(id);
        }

        let mut pending = Vec::with_capacity(plugins.len());
        for plugin in plugins {
            if self.registry.has_plugin(plugin.id()).await {
                debug!(plugin_id = %plugin.id(), "Plugin already installed");
                report.skipped.push(plugin.id().to_string());
            } else {
                pending.push(plugin);
            }
        }

        report.installed = self.registry.install_all(pending).await?;

        for id in &autostart.enable {
            if self.registry.has_plugin(id).await && !self.registry.is_enabled(id).await {
                self.registry.enable(id).await?;
                report.enabled.push(id.clone());
            }
        }

        info!(
            installed = report.installed.len(),
            enabled = report.enabled.len(),
            skipped = report.skipped.len(),
            "Bootstrap complete"
        );
        Ok(report)
    }

    /// 설치 역순으로 모두 제거
    ///
    /// 하나가 실패해도 나머지를 계속 제거하고 첫 에러를 반환합니다.
    pub async fn shutdown(&self) -> PluginResult<()> {
        let ids: Vec<String> = self
            .registry
            .list()
            .await
            .into_iter()
            .rev()
            .map(|info| info.id)
            .collect();

        let mut first_error: Option<PluginError> = None;
        for id in ids {
            if let Err(e) = self.registry.uninstall(&id).await {
                warn!(plugin_id = %id, error = %e, "Failed to uninstall during shutdown");
                first_error.get_or_insert(e);
            }
        }

        self.events().publish(system::shutdown("requested")).await;
        info!(app = %self.config.app_name, "SmartX application stopped");

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    // ========================================================================
    // 감사 로그
    // ========================================================================

    /// 최근 라이프사이클 기록 (최신순)
    pub async fn lifecycle_log(&self, limit: Option<usize>) -> Result<Vec<LifecycleRecord>> {
        let rows = self
            .storage()
            .select(LIFECYCLE_LOG_TABLE, &Query::new())
            .await?;

        let limit = limit.unwrap_or(rows.len());
        rows.into_iter()
            .rev()
            .take(limit)
            .map(record_from_row)
            .collect()
    }
}

fn record_from_row(row: Row) -> Result<LifecycleRecord> {
    Ok(serde_json::from_value(serde_json::Value::Object(row))?)
}

/// 앱 요약 (CLI 출력용)
pub async fn summary(app: &SmartApp) -> serde_json::Value {
    let stats = app.registry().statistics().await;
    json!({
        "app": app.config().app_name,
        "tenant": app.config().tenant,
        "storage": app.storage().backend(),
        "versionStrategy": app.config().version_strategy.to_string(),
        "statistics": stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{BuiltinPlugin, PluginStatus, CORE_PLUGIN_ID};
    use smartx_foundation::MemoryStorage;

    async fn app(config: AppConfig) -> SmartApp {
        SmartApp::builder()
            .config(config)
            .storage(Arc::new(MemoryStorage::new()))
            .build()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_build_publishes_started() {
        let app = app(AppConfig::new()).await;
        let history = app.events().history(None).await;
        assert_eq!(history[0].event_type, "system:started");
        assert!(app.is_auditing());
        assert!(app.registry().is_empty().await);
    }

    #[tokio::test]
    async fn test_bootstrap_installs_dependencies_first() {
        let config = AppConfig::new()
            .autostart_install("smart.retail")
            .autostart_enable("smart.factory")
            .autostart_install("smart.mining");
        let app = app(config).await;

        let report = app.bootstrap(&PluginCatalog::builtin()).await.unwrap();
        assert_eq!(report.installed, vec![CORE_PLUGIN_ID, "smart.factory", "smart.retail"]);
        assert_eq!(report.enabled, vec!["smart.factory"]);
        assert_eq!(report.skipped, vec!["smart.mining"]);
        assert_eq!(
            app.registry().status("smart.retail").await,
            Some(PluginStatus::Installed)
        );

        // 두 번째 bootstrap은 설치할 것이 없음
        let again = app.bootstrap(&PluginCatalog::builtin()).await.unwrap();
        assert!(again.installed.is_empty());
        assert!(again.enabled.is_empty());
    }

    #[tokio::test]
    async fn test_lifecycle_log_records_events() {
        let app = app(AppConfig::new()).await;
        app.install(Arc::new(BuiltinPlugin::core())).await.unwrap();
        app.enable(CORE_PLUGIN_ID).await.unwrap();
        let _ = app.enable(CORE_PLUGIN_ID).await;

        let log = app.lifecycle_log(None).await.unwrap();
        let events: Vec<_> = log.iter().map(|r| r.event.as_str()).collect();
        assert_eq!(
            events,
            vec![
                "plugin:error",
                "plugin:enabled",
                "plugin:enabling",
                "plugin:installed",
                "plugin:installing"
            ]
        );
        assert_eq!(log[0].error_code.as_deref(), Some("INVALID_STATE"));

        let latest = app.lifecycle_log(Some(1)).await.unwrap();
        assert_eq!(latest.len(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_uninstalls_in_reverse_order() {
        let app = app(AppConfig::new().autostart_enable("smart.community")).await;
        app.bootstrap(&PluginCatalog::builtin()).await.unwrap();

        app.shutdown().await.unwrap();
        assert!(app.registry().is_empty().await);

        let uninstalled: Vec<_> = app
            .lifecycle_log(None)
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.event == "plugin:uninstalled")
            .map(|r| r.plugin_id)
            .collect();
        // 최신순이므로 core가 마지막에 제거됨
        assert_eq!(uninstalled, vec![CORE_PLUGIN_ID, "smart.community"]);

        let history = app.events().history(Some(1)).await;
        assert_eq!(history[0].event_type, "system:shutdown");
    }

    #[tokio::test]
    async fn test_summary() {
        let app = app(AppConfig::new().tenant("acme")).await;
        let value = summary(&app).await;
        assert_eq!(value["tenant"], "acme");
        assert_eq!(value["storage"], "memory");
        assert_eq!(value["statistics"]["total"], 0);
    }
}
