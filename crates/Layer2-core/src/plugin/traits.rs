//! Plugin traits - 도메인 플러그인 인터페이스와 공유 컨텍스트

use super::descriptor::{ConfigMap, PluginDescriptor};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smartx_foundation::{AppConfig, EventBus, Result, TableStorage};
use std::sync::Arc;

// ============================================================================
// PluginContext - 모든 플러그인이 공유하는 컨텍스트
// ============================================================================

/// 호스트 애플리케이션 정보 (컨텍스트의 앱 참조)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInfo {
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
}

impl AppInfo {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            name: config.app_name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            tenant: config.tenant.clone(),
        }
    }
}

/// 플러그인 컨텍스트
///
/// 앱 시작 시 한 번 만들어져 모든 플러그인의 initialize/훅에 참조로 전달됩니다.
/// 플러그인은 자신이 소유하지 않은 필드를 읽기 전용으로 다뤄야 합니다.
pub struct PluginContext {
    storage: Arc<dyn TableStorage>,
    config: Arc<AppConfig>,
    app: AppInfo,
    events: Arc<EventBus>,
}

impl PluginContext {
    pub fn new(storage: Arc<dyn TableStorage>, config: Arc<AppConfig>, events: Arc<EventBus>) -> Self {
        let app = AppInfo::from_config(&config);
        Self {
            storage,
            config,
            app,
            events,
        }
    }

    /// 저장소 핸들
    pub fn storage(&self) -> &Arc<dyn TableStorage> {
        &self.storage
    }

    /// 애플리케이션 설정
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn app(&self) -> &AppInfo {
        &self.app
    }

    /// 이벤트 버스
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// 플러그인 단위 로깅 span
    pub fn span(&self, plugin_id: &str) -> tracing::Span {
        tracing::info_span!(
            "plugin",
            plugin_id = %plugin_id,
            app = %self.app.name,
            tenant = self.app.tenant.as_deref().unwrap_or("-"),
        )
    }
}

// ============================================================================
// Health
// ============================================================================

/// 헬스 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// 헬스 체크 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl HealthReport {
    pub fn healthy() -> Self {
        Self {
            status: HealthStatus::Healthy,
            message: None,
            details: None,
        }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            message: Some(message.into()),
            details: None,
        }
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Degraded,
            message: Some(message.into()),
            details: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

// ============================================================================
// Lifecycle hooks
// ============================================================================

/// 8개의 라이프사이클 훅
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleHook {
    BeforeInstall,
    AfterInstall,
    BeforeEnable,
    AfterEnable,
    BeforeDisable,
    AfterDisable,
    BeforeUninstall,
    AfterUninstall,
}

impl LifecycleHook {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BeforeInstall => "beforeInstall",
            Self::AfterInstall => "afterInstall",
            Self::BeforeEnable => "beforeEnable",
            Self::AfterEnable => "afterEnable",
            Self::BeforeDisable => "beforeDisable",
            Self::AfterDisable => "afterDisable",
            Self::BeforeUninstall => "beforeUninstall",
            Self::AfterUninstall => "afterUninstall",
        }
    }

    /// 플러그인의 해당 훅 호출
    pub async fn invoke(self, plugin: &dyn DomainPlugin, ctx: &PluginContext) -> Result<()> {
        match self {
            Self::BeforeInstall => plugin.before_install(ctx).await,
            Self::AfterInstall => plugin.after_install(ctx).await,
            Self::BeforeEnable => plugin.before_enable(ctx).await,
            Self::AfterEnable => plugin.after_enable(ctx).await,
            Self::BeforeDisable => plugin.before_disable(ctx).await,
            Self::AfterDisable => plugin.after_disable(ctx).await,
            Self::BeforeUninstall => plugin.before_uninstall(ctx).await,
            Self::AfterUninstall => plugin.after_uninstall(ctx).await,
        }
    }
}

/// 에러가 발생한 라이프사이클 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleStage {
    Hook(LifecycleHook),
    Initialize,
    Cleanup,
    ConfigChanged,
}

impl std::fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hook(hook) => f.write_str(hook.as_str()),
            Self::Initialize => f.write_str("initialize"),
            Self::Cleanup => f.write_str("cleanup"),
            Self::ConfigChanged => f.write_str("configChanged"),
        }
    }
}

impl From<LifecycleHook> for LifecycleStage {
    fn from(hook: LifecycleHook) -> Self {
        Self::Hook(hook)
    }
}

// ============================================================================
// DomainPlugin Trait
// ============================================================================

/// 도메인 플러그인 트레이트
///
/// `initialize`와 `cleanup`만 필수이고 나머지 훅은 기본 구현이 아무것도 하지 않습니다.
/// 훅 순서는 항상 before 훅 → 핵심 동작 → after 훅입니다.
#[async_trait]
pub trait DomainPlugin: Send + Sync {
    /// 정적 디스크립터
    fn descriptor(&self) -> &PluginDescriptor;

    /// 설치 시 호출 (beforeInstall 다음)
    async fn initialize(&self, ctx: &PluginContext) -> Result<()>;

    /// 제거 시 호출 (beforeUninstall 다음)
    async fn cleanup(&self, ctx: &PluginContext) -> Result<()>;

    /// 헬스 체크
    async fn health_check(&self, _ctx: &PluginContext) -> Result<HealthReport> {
        Ok(HealthReport::healthy().with_message("no check implemented"))
    }

    /// 플러그인이 직접 보유한 설정
    ///
    /// `None`이면 레지스트리 엔트리의 설정이 유일한 사본입니다.
    fn get_config(&self) -> Option<ConfigMap> {
        None
    }

    /// 설정 변경 알림 (병합 후 전체 설정 전달)
    async fn on_config_changed(&self, _ctx: &PluginContext, _config: &ConfigMap) -> Result<()> {
        Ok(())
    }

    async fn before_install(&self, _ctx: &PluginContext) -> Result<()> {
        Ok(())
    }

    async fn after_install(&self, _ctx: &PluginContext) -> Result<()> {
        Ok(())
    }

    async fn before_enable(&self, _ctx: &PluginContext) -> Result<()> {
        Ok(())
    }

    async fn after_enable(&self, _ctx: &PluginContext) -> Result<()> {
        Ok(())
    }

    async fn before_disable(&self, _ctx: &PluginContext) -> Result<()> {
        Ok(())
    }

    async fn after_disable(&self, _ctx: &PluginContext) -> Result<()> {
        Ok(())
    }

    async fn before_uninstall(&self, _ctx: &PluginContext) -> Result<()> {
        Ok(())
    }

    async fn after_uninstall(&self, _ctx: &PluginContext) -> Result<()> {
        Ok(())
    }

    fn id(&self) -> &str {
        &self.descriptor().id
    }
}
