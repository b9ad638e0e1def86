//! Plugin Registry - 플러그인 라이프사이클 상태 머신
//!
//! ```text
//! installed ──enable──▶ enabled ◀──enable── disabled
//!                          └──────disable──────▶┘
//! (실패한 전이) ──▶ error ──enable──▶ enabled
//! ```
//!
//! - 엔트리는 설치 후 제거 전까지만 존재합니다 (제거 = 엔트리 삭제)
//! - install은 원자적입니다. 실패하면 엔트리가 남지 않습니다
//! - enable/disable/uninstall 도중 실패하면 엔트리는 error 상태로 남습니다
//! - 훅 호출 중에는 엔트리 락을 잡지 않습니다

use super::assets::{
    AssetAggregator, ComponentSpec, EntityTypeExtension, MenuItem, RouteSpec, WidgetSpec,
};
use super::descriptor::{ConfigMap, Domain, PluginDescriptor};
use super::error::{DependencyError, PluginError, PluginResult};
use super::events::{
    kind_filter, lifecycle_filter, HandlerListener, PluginEvent, PluginEventHandler,
    PluginEventKind,
};
use super::resolver::DependencyResolver;
use super::traits::{DomainPlugin, HealthReport, LifecycleHook, LifecycleStage, PluginContext};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smartx_foundation::{EventBus, ListenerId};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn, Instrument};

// ============================================================================
// PluginStatus
// ============================================================================

/// 플러그인 라이프사이클 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginStatus {
    Installed,
    Enabled,
    Disabled,
    Error,
}

impl std::fmt::Display for PluginStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Installed => write!(f, "installed"),
            Self::Enabled => write!(f, "enabled"),
            Self::Disabled => write!(f, "disabled"),
            Self::Error => write!(f, "error"),
        }
    }
}

// ============================================================================
// RegistryEntry
// ============================================================================

/// 설치된 플러그인 하나의 가변 레코드
#[derive(Clone)]
pub struct RegistryEntry {
    pub plugin: Arc<dyn DomainPlugin>,

    pub status: PluginStatus,

    pub installed_at: DateTime<Utc>,
    pub enabled_at: Option<DateTime<Utc>>,
    pub disabled_at: Option<DateTime<Utc>>,
    pub error_at: Option<DateTime<Utc>>,

    /// 마지막 실패 메시지
    pub error: Option<String>,

    /// 현재 설정 (기본 설정 + 앱 설정 오버라이드 + set_config)
    pub config: ConfigMap,

    install_seq: u64,

    /// 자산 노출 순서. enabled 동안만 Some
    enable_seq: Option<u64>,
}

impl RegistryEntry {
    pub fn descriptor(&self) -> &PluginDescriptor {
        self.plugin.descriptor()
    }

    pub fn is_enabled(&self) -> bool {
        self.status == PluginStatus::Enabled
    }
}

/// 직렬화 가능한 플러그인 정보
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginInfo {
    pub id: String,
    pub name: String,
    pub version: String,
    pub domain: Domain,
    pub description: String,
    pub status: PluginStatus,
    pub dependencies: Vec<String>,
    pub installed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub config: ConfigMap,
}

impl From<&RegistryEntry> for PluginInfo {
    fn from(entry: &RegistryEntry) -> Self {
        let d = entry.descriptor();
        Self {
            id: d.id.clone(),
            name: d.name.clone(),
            version: d.version.clone(),
            domain: d.domain,
            description: d.description.clone(),
            status: entry.status,
            dependencies: d.dependencies.iter().map(|dep| dep.id.clone()).collect(),
            installed_at: entry.installed_at,
            enabled_at: entry.enabled_at,
            disabled_at: entry.disabled_at,
            error_at: entry.error_at,
            error: entry.error.clone(),
            config: entry.config.clone(),
        }
    }
}

/// 레지스트리 통계 (호출 시마다 새로 계산)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStatistics {
    pub total: usize,
    pub installed: usize,
    pub enabled: usize,
    pub disabled: usize,
    pub error: usize,
    pub by_domain: BTreeMap<Domain, usize>,
}

// ============================================================================
// PluginRegistry
// ============================================================================

/// 플러그인 레지스트리
///
/// 모든 RegistryEntry를 독점 소유하며, 상태 변경은 공개 연산으로만 일어납니다.
/// 같은 플러그인에 대한 동시 전이는 직렬화하지 않으므로 호출자가 각 연산을 await해야 합니다.
pub struct PluginRegistry {
    entries: RwLock<HashMap<String, RegistryEntry>>,

    context: Arc<PluginContext>,

    resolver: DependencyResolver,

    seq: AtomicU64,
}

impl PluginRegistry {
    /// 컨텍스트로 레지스트리 생성 (버전 비교 방식은 앱 설정을 따름)
    pub fn new(context: Arc<PluginContext>) -> Self {
        let resolver = DependencyResolver::new(context.config().version_strategy);
        Self {
            entries: RwLock::new(HashMap::new()),
            context,
            resolver,
            seq: AtomicU64::new(0),
        }
    }

    pub fn with_resolver(mut self, resolver: DependencyResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn context(&self) -> &Arc<PluginContext> {
        &self.context
    }

    pub fn resolver(&self) -> &DependencyResolver {
        &self.resolver
    }

    // ========================================================================
    // install
    // ========================================================================

    /// 플러그인 설치
    ///
    /// 의존성 검사 → beforeInstall → initialize → 엔트리 기록 → afterInstall.
    /// 어느 단계든 실패하면 엔트리를 남기지 않습니다.
    pub async fn install(&self, plugin: Arc<dyn DomainPlugin>) -> PluginResult<()> {
        let descriptor = plugin.descriptor();
        let id = descriptor.id.clone();

        if self.has_plugin(&id).await {
            warn!(plugin_id = %id, "Plugin is already installed");
            return Err(PluginError::duplicate(&id));
        }

        let checked = {
            let entries = self.entries.read().await;
            self.resolver.check(descriptor, |dep| {
                entries.get(dep).map(|e| e.descriptor().version.clone())
            })
        };
        if let Err(e) = checked {
            return Err(self.fail(&id, e.into()).await);
        }

        self.emit(PluginEvent::new(PluginEventKind::Installing, &id))
            .await;

        if let Err(e) = self.run_hook(&plugin, LifecycleHook::BeforeInstall).await {
            return Err(self.fail(&id, e).await);
        }

        if let Err(e) = plugin
            .initialize(&self.context)
            .instrument(self.context.span(&id))
            .await
        {
            let err = PluginError::hook(&id, LifecycleStage::Initialize, e);
            return Err(self.fail(&id, err).await);
        }

        let inserted = {
            let mut entries = self.entries.write().await;
            if entries.contains_key(&id) {
                false
            } else {
                let entry = RegistryEntry {
                    plugin: Arc::clone(&plugin),
                    status: PluginStatus::Installed,
                    installed_at: Utc::now(),
                    enabled_at: None,
                    disabled_at: None,
                    error_at: None,
                    error: None,
                    config: self.initial_config(descriptor),
                    install_seq: self.next_seq(),
                    enable_seq: None,
                };
                entries.insert(id.clone(), entry);
                true
            }
        };

        if !inserted {
            // 같은 ID가 동시에 설치된 경우
            self.cleanup_quietly(&plugin).await;
            return Err(self.fail(&id, PluginError::duplicate(&id)).await);
        }

        if let Err(e) = self.run_hook(&plugin, LifecycleHook::AfterInstall).await {
            self.entries.write().await.remove(&id);
            self.cleanup_quietly(&plugin).await;
            return Err(self.fail(&id, e).await);
        }

        self.emit(PluginEvent::new(PluginEventKind::Installed, &id))
            .await;
        info!(plugin_id = %id, version = %descriptor.version, "Plugin installed");
        Ok(())
    }

    /// 여러 플러그인을 의존성 순서대로 설치 (첫 실패에서 중단)
    ///
    /// 설치된 ID를 설치 순서대로 반환합니다.
    pub async fn install_all(&self, plugins: Vec<Arc<dyn DomainPlugin>>) -> PluginResult<Vec<String>> {
        let order = {
            let descriptors: Vec<&PluginDescriptor> =
                plugins.iter().map(|p| p.descriptor()).collect();
            DependencyResolver::install_order(&descriptors)
        };

        let order = match order {
            Ok(order) => order,
            Err(e) => {
                let err = PluginError::from(e);
                if let PluginError::Dependency(DependencyError::Cycle { plugins }) = &err {
                    for id in plugins {
                        self.emit(PluginEvent::error(id, &err)).await;
                    }
                }
                error!(error = %err, "Batch install rejected");
                return Err(err);
            }
        };

        let mut installed = Vec::with_capacity(order.len());
        for i in order {
            let plugin = Arc::clone(&plugins[i]);
            let id = plugin.id().to_string();
            self.install(plugin).await?;
            installed.push(id);
        }

        Ok(installed)
    }

    // ========================================================================
    // enable / disable
    // ========================================================================

    /// 플러그인 활성화
    ///
    /// installed, disabled, error 상태에서 가능합니다.
    /// 도중 실패 시 error 상태로 남고 installed로 되돌리지 않습니다.
    pub async fn enable(&self, id: &str) -> PluginResult<()> {
        let (plugin, status) = match self.snapshot(id).await {
            Some(found) => found,
            None => return Err(self.fail(id, PluginError::not_installed(id)).await),
        };

        if status == PluginStatus::Enabled {
            warn!(plugin_id = %id, "Plugin is already enabled");
            return Err(self
                .fail(id, PluginError::invalid_state(id, status, "enable"))
                .await);
        }

        self.emit(PluginEvent::new(PluginEventKind::Enabling, id))
            .await;

        if let Err(e) = self.run_hook(&plugin, LifecycleHook::BeforeEnable).await {
            return Err(self.fail_transition(id, e).await);
        }

        let seq = self.next_seq();
        let flipped = self
            .update_entry(id, |entry| {
                entry.status = PluginStatus::Enabled;
                entry.enabled_at = Some(Utc::now());
                entry.enable_seq = Some(seq);
                entry.error = None;
            })
            .await;
        if !flipped {
            return Err(self.fail(id, PluginError::not_installed(id)).await);
        }
        debug!(
            plugin_id = %id,
            menus = plugin.descriptor().contributions.menus.len(),
            widgets = plugin.descriptor().contributions.widgets.len(),
            components = plugin.descriptor().contributions.components.len(),
            "Plugin assets registered"
        );

        if let Err(e) = self.run_hook(&plugin, LifecycleHook::AfterEnable).await {
            return Err(self.fail_transition(id, e).await);
        }

        self.emit(PluginEvent::new(PluginEventKind::Enabled, id))
            .await;
        info!(plugin_id = %id, "Plugin enabled");
        Ok(())
    }

    /// 플러그인 비활성화 (enabled 상태에서만 가능, 멱등 아님)
    pub async fn disable(&self, id: &str) -> PluginResult<()> {
        let (plugin, status) = match self.snapshot(id).await {
            Some(found) => found,
            None => return Err(self.fail(id, PluginError::not_installed(id)).await),
        };

        if status != PluginStatus::Enabled {
            warn!(plugin_id = %id, status = %status, "Plugin is not enabled");
            return Err(self
                .fail(id, PluginError::invalid_state(id, status, "disable"))
                .await);
        }

        self.emit(PluginEvent::new(PluginEventKind::Disabling, id))
            .await;

        if let Err(e) = self.run_hook(&plugin, LifecycleHook::BeforeDisable).await {
            return Err(self.fail_transition(id, e).await);
        }

        let flipped = self
            .update_entry(id, |entry| {
                entry.enable_seq = None;
                entry.status = PluginStatus::Disabled;
                entry.disabled_at = Some(Utc::now());
            })
            .await;
        if !flipped {
            return Err(self.fail(id, PluginError::not_installed(id)).await);
        }
        debug!(plugin_id = %id, "Plugin assets unregistered");

        if let Err(e) = self.run_hook(&plugin, LifecycleHook::AfterDisable).await {
            return Err(self.fail_transition(id, e).await);
        }

        self.emit(PluginEvent::new(PluginEventKind::Disabled, id))
            .await;
        info!(plugin_id = %id, "Plugin disabled");
        Ok(())
    }

    // ========================================================================
    // uninstall / reload
    // ========================================================================

    /// 플러그인 제거
    ///
    /// enabled 상태면 먼저 disable을 끝까지 수행합니다.
    pub async fn uninstall(&self, id: &str) -> PluginResult<()> {
        let (plugin, status) = match self.snapshot(id).await {
            Some(found) => found,
            None => return Err(self.fail(id, PluginError::not_installed(id)).await),
        };

        self.emit(PluginEvent::new(PluginEventKind::Uninstalling, id))
            .await;

        if status == PluginStatus::Enabled {
            // 실패 시 disable이 이미 error 상태와 이벤트를 남김
            self.disable(id).await?;
        }

        if let Err(e) = self.run_hook(&plugin, LifecycleHook::BeforeUninstall).await {
            return Err(self.fail_transition(id, e).await);
        }

        if let Err(e) = plugin
            .cleanup(&self.context)
            .instrument(self.context.span(id))
            .await
        {
            let err = PluginError::hook(id, LifecycleStage::Cleanup, e);
            return Err(self.fail_transition(id, err).await);
        }

        self.entries.write().await.remove(id);

        if let Err(e) = self.run_hook(&plugin, LifecycleHook::AfterUninstall).await {
            // 엔트리는 이미 제거됨
            return Err(self.fail(id, e).await);
        }

        self.emit(PluginEvent::new(PluginEventKind::Uninstalled, id))
            .await;
        info!(plugin_id = %id, "Plugin uninstalled");
        Ok(())
    }

    /// disable 후 enable
    pub async fn reload(&self, id: &str) -> PluginResult<()> {
        self.disable(id).await?;
        self.enable(id).await
    }

    // ========================================================================
    // health
    // ========================================================================

    /// 헬스 체크
    ///
    /// id가 주어지면 해당 플러그인만 (없으면 빈 결과), 아니면 enabled 플러그인 전체.
    /// 플러그인의 실패는 unhealthy 결과로 바뀌며 이 함수는 실패하지 않습니다.
    pub async fn health_check(&self, id: Option<&str>) -> BTreeMap<String, HealthReport> {
        let targets: Vec<Arc<dyn DomainPlugin>> = match id {
            Some(id) => self.get_plugin(id).await.into_iter().collect(),
            None => self.enabled_plugins().await,
        };

        let checks = targets.into_iter().map(|plugin| {
            let ctx = Arc::clone(&self.context);
            async move {
                let id = plugin.id().to_string();
                let report = match plugin
                    .health_check(&ctx)
                    .instrument(ctx.span(&id))
                    .await
                {
                    Ok(report) => report,
                    Err(e) => {
                        warn!(plugin_id = %id, error = %e, "Health check failed");
                        HealthReport::unhealthy(e.to_string())
                    }
                };
                (id, report)
            }
        });

        futures::future::join_all(checks)
            .await
            .into_iter()
            .collect()
    }

    // ========================================================================
    // 조회
    // ========================================================================

    /// 플러그인 인스턴스 조회
    pub async fn get_plugin(&self, id: &str) -> Option<Arc<dyn DomainPlugin>> {
        let entries = self.entries.read().await;
        entries.get(id).map(|e| Arc::clone(&e.plugin))
    }

    /// 엔트리 스냅샷
    pub async fn entry(&self, id: &str) -> Option<RegistryEntry> {
        let entries = self.entries.read().await;
        entries.get(id).cloned()
    }

    pub async fn info(&self, id: &str) -> Option<PluginInfo> {
        let entries = self.entries.read().await;
        entries.get(id).map(PluginInfo::from)
    }

    /// 전체 목록 (설치 순서)
    pub async fn list(&self) -> Vec<PluginInfo> {
        let entries = self.entries.read().await;
        let mut all: Vec<&RegistryEntry> = entries.values().collect();
        all.sort_by_key(|e| e.install_seq);
        all.into_iter().map(PluginInfo::from).collect()
    }

    /// enabled 목록 (활성화 순서)
    pub async fn list_enabled(&self) -> Vec<PluginInfo> {
        let entries = self.entries.read().await;
        Self::enabled_sorted(&entries)
            .into_iter()
            .map(PluginInfo::from)
            .collect()
    }

    /// 도메인별 목록 (설치 순서)
    pub async fn by_domain(&self, domain: Domain) -> Vec<PluginInfo> {
        self.list()
            .await
            .into_iter()
            .filter(|info| info.domain == domain)
            .collect()
    }

    pub async fn status(&self, id: &str) -> Option<PluginStatus> {
        let entries = self.entries.read().await;
        entries.get(id).map(|e| e.status)
    }

    pub async fn has_plugin(&self, id: &str) -> bool {
        let entries = self.entries.read().await;
        entries.contains_key(id)
    }

    pub async fn is_enabled(&self, id: &str) -> bool {
        self.status(id).await == Some(PluginStatus::Enabled)
    }

    /// 현재 설정
    pub async fn get_config(&self, id: &str) -> Option<ConfigMap> {
        let entries = self.entries.read().await;
        entries.get(id).map(|e| e.config.clone())
    }

    /// 플러그인이 보고하는 설정, 없으면 엔트리 설정
    pub async fn plugin_config(&self, id: &str) -> Option<ConfigMap> {
        let (plugin, stored) = {
            let entries = self.entries.read().await;
            let entry = entries.get(id)?;
            (Arc::clone(&entry.plugin), entry.config.clone())
        };
        Some(plugin.get_config().unwrap_or(stored))
    }

    /// 설정 얕은 병합 후 플러그인에 알림
    ///
    /// 병합된 전체 설정을 반환합니다. 알림이 실패해도 병합과 상태는 유지됩니다.
    pub async fn set_config(&self, id: &str, partial: ConfigMap) -> PluginResult<ConfigMap> {
        let (plugin, merged) = {
            let mut entries = self.entries.write().await;
            let entry = entries
                .get_mut(id)
                .ok_or_else(|| PluginError::not_installed(id))?;
            for (key, value) in partial {
                entry.config.insert(key, value);
            }
            (Arc::clone(&entry.plugin), entry.config.clone())
        };

        debug!(plugin_id = %id, keys = merged.len(), "Plugin config updated");

        if let Err(e) = plugin
            .on_config_changed(&self.context, &merged)
            .instrument(self.context.span(id))
            .await
        {
            let err = PluginError::hook(id, LifecycleStage::ConfigChanged, e);
            return Err(self.fail(id, err).await);
        }

        Ok(merged)
    }

    /// 통계
    pub async fn statistics(&self) -> RegistryStatistics {
        let entries = self.entries.read().await;
        let mut stats = RegistryStatistics {
            total: entries.len(),
            ..Default::default()
        };

        for entry in entries.values() {
            match entry.status {
                PluginStatus::Installed => stats.installed += 1,
                PluginStatus::Enabled => stats.enabled += 1,
                PluginStatus::Disabled => stats.disabled += 1,
                PluginStatus::Error => stats.error += 1,
            }
            *stats.by_domain.entry(entry.descriptor().domain).or_insert(0) += 1;
        }

        stats
    }

    /// id를 의존성으로 선언한 설치된 플러그인 (설치 순서)
    pub async fn dependents(&self, id: &str) -> Vec<String> {
        let entries = self.entries.read().await;
        let mut found: Vec<&RegistryEntry> = entries
            .values()
            .filter(|e| e.descriptor().dependency(id).is_some())
            .collect();
        found.sort_by_key(|e| e.install_seq);
        found.into_iter().map(|e| e.descriptor().id.clone()).collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    // ========================================================================
    // 자산 (enabled 플러그인만, 활성화 순서)
    // ========================================================================

    /// `"<pluginId>.<componentName>"` → 컴포넌트
    pub async fn components(&self) -> BTreeMap<String, ComponentSpec> {
        let plugins = self.enabled_plugins().await;
        AssetAggregator::components(plugins.iter().map(|p| p.descriptor()))
    }

    /// order 오름차순 메뉴
    pub async fn menus(&self) -> Vec<MenuItem> {
        let plugins = self.enabled_plugins().await;
        AssetAggregator::menus(plugins.iter().map(|p| p.descriptor()))
    }

    pub async fn widgets(&self) -> Vec<WidgetSpec> {
        let plugins = self.enabled_plugins().await;
        AssetAggregator::widgets(plugins.iter().map(|p| p.descriptor()))
    }

    pub async fn routes(&self) -> Vec<RouteSpec> {
        let plugins = self.enabled_plugins().await;
        AssetAggregator::routes(plugins.iter().map(|p| p.descriptor()))
    }

    pub async fn entity_types(&self) -> BTreeMap<String, Vec<EntityTypeExtension>> {
        let plugins = self.enabled_plugins().await;
        AssetAggregator::entity_types(plugins.iter().map(|p| p.descriptor()))
    }

    // ========================================================================
    // 이벤트 구독
    // ========================================================================

    /// 특정 이벤트 구독
    pub async fn on(&self, kind: PluginEventKind, handler: Arc<dyn PluginEventHandler>) -> ListenerId {
        self.context
            .events()
            .subscribe_with_filter(Arc::new(HandlerListener::new(handler)), Some(kind_filter(kind)))
            .await
    }

    /// 모든 라이프사이클 이벤트 구독
    pub async fn on_all(&self, handler: Arc<dyn PluginEventHandler>) -> ListenerId {
        self.context
            .events()
            .subscribe_with_filter(Arc::new(HandlerListener::new(handler)), Some(lifecycle_filter()))
            .await
    }

    /// 구독 해제
    pub async fn off(&self, id: ListenerId) -> bool {
        self.context.events().unsubscribe(id).await
    }

    /// 이벤트 버스
    pub fn events(&self) -> &Arc<EventBus> {
        self.context.events()
    }

    // ========================================================================
    // 내부 헬퍼
    // ========================================================================

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }

    fn initial_config(&self, descriptor: &PluginDescriptor) -> ConfigMap {
        let mut config = descriptor.default_config.clone();
        if let Some(overrides) = self.context.config().plugin_overrides(&descriptor.id) {
            for (key, value) in overrides {
                config.insert(key.clone(), value.clone());
            }
        }
        config
    }

    fn enabled_sorted(entries: &HashMap<String, RegistryEntry>) -> Vec<&RegistryEntry> {
        let mut enabled: Vec<&RegistryEntry> = entries.values().filter(|e| e.is_enabled()).collect();
        enabled.sort_by_key(|e| e.enable_seq);
        enabled
    }

    async fn enabled_plugins(&self) -> Vec<Arc<dyn DomainPlugin>> {
        let entries = self.entries.read().await;
        Self::enabled_sorted(&entries)
            .into_iter()
            .map(|e| Arc::clone(&e.plugin))
            .collect()
    }

    async fn snapshot(&self, id: &str) -> Option<(Arc<dyn DomainPlugin>, PluginStatus)> {
        let entries = self.entries.read().await;
        entries.get(id).map(|e| (Arc::clone(&e.plugin), e.status))
    }

    async fn update_entry<F>(&self, id: &str, f: F) -> bool
    where
        F: FnOnce(&mut RegistryEntry),
    {
        let mut entries = self.entries.write().await;
        match entries.get_mut(id) {
            Some(entry) => {
                f(entry);
                true
            }
            None => false,
        }
    }

    async fn run_hook(&self, plugin: &Arc<dyn DomainPlugin>, hook: LifecycleHook) -> PluginResult<()> {
        let id = plugin.id();
        hook.invoke(plugin.as_ref(), &self.context)
            .instrument(self.context.span(id))
            .await
            .map_err(|e| PluginError::hook(id, hook.into(), e))
    }

    /// 설치 롤백 중 cleanup (실패는 로그만)
    async fn cleanup_quietly(&self, plugin: &Arc<dyn DomainPlugin>) {
        if let Err(e) = plugin
            .cleanup(&self.context)
            .instrument(self.context.span(plugin.id()))
            .await
        {
            warn!(plugin_id = %plugin.id(), error = %e, "Cleanup after failed install also failed");
        }
    }

    async fn emit(&self, event: PluginEvent) {
        self.context.events().publish(event.to_app_event()).await;
    }

    /// error 이벤트 발행 후 에러 반환
    async fn fail(&self, id: &str, err: PluginError) -> PluginError {
        error!(plugin_id = %id, code = err.code(), error = %err, "Plugin operation failed");
        self.emit(PluginEvent::error(id, &err)).await;
        err
    }

    /// 전이 도중 실패: 엔트리를 error 상태로 표시
    async fn fail_transition(&self, id: &str, err: PluginError) -> PluginError {
        let message = err.to_string();
        self.update_entry(id, |entry| {
            entry.status = PluginStatus::Error;
            entry.error = Some(message);
            entry.error_at = Some(Utc::now());
            entry.enable_seq = None;
        })
        .await;
        self.fail(id, err).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::assets::{ComponentKind, MenuItem};
    use crate::plugin::descriptor::PluginDependency;
    use crate::plugin::events::handler_fn;
    use async_trait::async_trait;
    use serde_json::json;
    use smartx_foundation::{AppConfig, Error, MemoryStorage, Result};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use tokio_test::{assert_err, assert_ok};

    #[derive(Default, Clone, Copy)]
    struct Failures {
        before_install: bool,
        initialize: bool,
        after_install: bool,
        before_enable: bool,
        after_enable: bool,
        before_disable: bool,
        after_disable: bool,
        before_uninstall: bool,
        after_uninstall: bool,
        cleanup: bool,
        health: bool,
        config_changed: bool,
    }

    struct TestPlugin {
        descriptor: PluginDescriptor,
        fail: Mutex<Failures>,
        cleanups: AtomicUsize,
        last_config: Mutex<Option<ConfigMap>>,
    }

    impl TestPlugin {
        fn new(descriptor: PluginDescriptor) -> Arc<Self> {
            Self::failing(descriptor, Failures::default())
        }

        fn failing(descriptor: PluginDescriptor, fail: Failures) -> Arc<Self> {
            Arc::new(Self {
                descriptor,
                fail: Mutex::new(fail),
                cleanups: AtomicUsize::new(0),
                last_config: Mutex::new(None),
            })
        }

        fn fails(&self) -> Failures {
            *self.fail.lock().unwrap()
        }

        fn check(flag: bool, what: &str) -> Result<()> {
            if flag {
                Err(Error::Internal(format!("{} failed", what)))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl DomainPlugin for TestPlugin {
        fn descriptor(&self) -> &PluginDescriptor {
            &self.descriptor
        }

        async fn initialize(&self, _ctx: &PluginContext) -> Result<()> {
            Self::check(self.fails().initialize, "initialize")
        }

        async fn cleanup(&self, _ctx: &PluginContext) -> Result<()> {
            self.cleanups.fetch_add(1, Ordering::SeqCst);
            Self::check(self.fails().cleanup, "cleanup")
        }

        async fn health_check(&self, _ctx: &PluginContext) -> Result<HealthReport> {
            Self::check(self.fails().health, "probe")?;
            Ok(HealthReport::healthy())
        }

        fn get_config(&self) -> Option<ConfigMap> {
            self.last_config.lock().unwrap().clone()
        }

        async fn on_config_changed(&self, _ctx: &PluginContext, config: &ConfigMap) -> Result<()> {
            *self.last_config.lock().unwrap() = Some(config.clone());
            Self::check(self.fails().config_changed, "config")
        }

        async fn before_install(&self, _ctx: &PluginContext) -> Result<()> {
            Self::check(self.fails().before_install, "beforeInstall")
        }

        async fn after_install(&self, _ctx: &PluginContext) -> Result<()> {
            Self::check(self.fails().after_install, "afterInstall")
        }

        async fn before_enable(&self, _ctx: &PluginContext) -> Result<()> {
            Self::check(self.fails().before_enable, "beforeEnable")
        }

        async fn after_enable(&self, _ctx: &PluginContext) -> Result<()> {
            Self::check(self.fails().after_enable, "afterEnable")
        }

        async fn before_disable(&self, _ctx: &PluginContext) -> Result<()> {
            Self::check(self.fails().before_disable, "beforeDisable")
        }

        async fn after_disable(&self, _ctx: &PluginContext) -> Result<()> {
            Self::check(self.fails().after_disable, "afterDisable")
        }

        async fn before_uninstall(&self, _ctx: &PluginContext) -> Result<()> {
            Self::check(self.fails().before_uninstall, "beforeUninstall")
        }

        async fn after_uninstall(&self, _ctx: &PluginContext) -> Result<()> {
            Self::check(self.fails().after_uninstall, "afterUninstall")
        }
    }

    fn descriptor(id: &str) -> PluginDescriptor {
        PluginDescriptor::new(id, id, Domain::Factory)
    }

    fn registry_with(config: AppConfig) -> PluginRegistry {
        let context = PluginContext::new(
            Arc::new(MemoryStorage::new()),
            Arc::new(config),
            Arc::new(EventBus::new()),
        );
        PluginRegistry::new(Arc::new(context))
    }

    fn registry() -> PluginRegistry {
        registry_with(AppConfig::new())
    }

    async fn record(registry: &PluginRegistry) -> Arc<Mutex<Vec<String>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        registry
            .on_all(handler_fn("recorder", move |e| {
                sink.lock().unwrap().push(e.kind.as_str().to_string());
            }))
            .await;
        log
    }

    fn names(log: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn test_install_emits_events() {
        let registry = registry();
        let log = record(&registry).await;

        registry.install(TestPlugin::new(descriptor("p1"))).await.unwrap();

        assert_eq!(registry.status("p1").await, Some(PluginStatus::Installed));
        assert_eq!(names(&log), vec!["plugin:installing", "plugin:installed"]);
    }

    #[tokio::test]
    async fn test_duplicate_install_has_no_side_effects() {
        let registry = registry();
        registry.install(TestPlugin::new(descriptor("p1"))).await.unwrap();
        let log = record(&registry).await;

        let second = TestPlugin::new(descriptor("p1"));
        let err = registry.install(second.clone()).await.unwrap_err();

        assert!(matches!(err, PluginError::Duplicate { .. }));
        assert!(names(&log).is_empty());
        assert_eq!(registry.len().await, 1);
        assert_eq!(second.cleanups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_initialize_failure_leaves_no_entry() {
        let registry = registry();
        let log = record(&registry).await;

        let plugin = TestPlugin::failing(
            descriptor("p1"),
            Failures {
                initialize: true,
                ..Default::default()
            },
        );
        let err = registry.install(plugin).await.unwrap_err();

        assert!(matches!(
            err,
            PluginError::Hook {
                stage: LifecycleStage::Initialize,
                ..
            }
        ));
        assert!(!registry.has_plugin("p1").await);
        assert_eq!(names(&log), vec!["plugin:installing", "plugin:error"]);
    }

    #[tokio::test]
    async fn test_before_install_failure_skips_initialize() {
        let registry = registry();
        let plugin = TestPlugin::failing(
            descriptor("p1"),
            Failures {
                before_install: true,
                ..Default::default()
            },
        );

        let err = registry.install(plugin).await.unwrap_err();
        assert_eq!(err.code(), "HOOK_FAILURE");
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_after_install_failure_rolls_back() {
        let registry = registry();
        let plugin = TestPlugin::failing(
            descriptor("p1"),
            Failures {
                after_install: true,
                ..Default::default()
            },
        );

        assert!(registry.install(plugin.clone()).await.is_err());
        assert!(!registry.has_plugin("p1").await);
        assert_eq!(plugin.cleanups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dependency_failure_emits_error_only() {
        let registry = registry();
        let log = record(&registry).await;

        let b = descriptor("b").with_dependency(PluginDependency::new("a", "1.0.0"));
        let err = registry.install(TestPlugin::new(b)).await.unwrap_err();

        assert!(err.is_dependency());
        assert_eq!(names(&log), vec!["plugin:error"]);
    }

    #[tokio::test]
    async fn test_enable_failure_sets_error_status() {
        let registry = registry();
        let plugin = TestPlugin::failing(
            descriptor("p1").with_menu(MenuItem::new("m", "M", "/m")),
            Failures {
                after_enable: true,
                ..Default::default()
            },
        );
        registry.install(plugin.clone()).await.unwrap();
        let log = record(&registry).await;

        let err = registry.enable("p1").await.unwrap_err();
        assert!(matches!(err, PluginError::Hook { .. }));

        let entry = registry.entry("p1").await.unwrap();
        assert_eq!(entry.status, PluginStatus::Error);
        assert!(entry.error.unwrap().contains("afterEnable"));
        assert!(entry.error_at.is_some());
        assert!(registry.menus().await.is_empty());
        assert_eq!(names(&log), vec!["plugin:enabling", "plugin:error"]);

        // error 상태에서 다시 활성화 가능
        plugin.fail.lock().unwrap().after_enable = false;
        registry.enable("p1").await.unwrap();
        assert!(registry.is_enabled("p1").await);
        assert!(registry.entry("p1").await.unwrap().error.is_none());
        assert_eq!(registry.menus().await.len(), 1);
    }

    #[tokio::test]
    async fn test_disable_failure_sets_error_status() {
        let registry = registry();
        let plugin = TestPlugin::failing(
            descriptor("p1").with_menu(MenuItem::new("m", "M", "/m")),
            Failures {
                before_disable: true,
                ..Default::default()
            },
        );
        registry.install(plugin.clone()).await.unwrap();
        registry.enable("p1").await.unwrap();
        let log = record(&registry).await;

        let err = registry.disable("p1").await.unwrap_err();
        assert!(matches!(
            err,
            PluginError::Hook {
                stage: LifecycleStage::Hook(LifecycleHook::BeforeDisable),
                ..
            }
        ));
        assert_eq!(names(&log), vec!["plugin:disabling", "plugin:error"]);

        let entry = registry.entry("p1").await.unwrap();
        assert_eq!(entry.status, PluginStatus::Error);
        assert!(entry.error.unwrap().contains("beforeDisable"));
        assert!(registry.menus().await.is_empty());
        assert!(registry.list_enabled().await.is_empty());

        // error 상태는 disable 없이 바로 제거
        registry.uninstall("p1").await.unwrap();
        assert!(!registry.has_plugin("p1").await);
        assert_eq!(plugin.cleanups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_uninstall_stops_when_disable_fails() {
        let registry = registry();
        let plugin = TestPlugin::failing(
            descriptor("p1"),
            Failures {
                after_disable: true,
                ..Default::default()
            },
        );
        registry.install(plugin.clone()).await.unwrap();
        registry.enable("p1").await.unwrap();
        let log = record(&registry).await;

        let err = registry.uninstall("p1").await.unwrap_err();
        assert!(matches!(
            err,
            PluginError::Hook {
                stage: LifecycleStage::Hook(LifecycleHook::AfterDisable),
                ..
            }
        ));
        assert_eq!(
            names(&log),
            vec!["plugin:uninstalling", "plugin:disabling", "plugin:error"]
        );
        assert_eq!(registry.status("p1").await, Some(PluginStatus::Error));
        assert_eq!(plugin.cleanups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_before_uninstall_failure_keeps_entry() {
        let registry = registry();
        let plugin = TestPlugin::failing(
            descriptor("p1"),
            Failures {
                before_uninstall: true,
                ..Default::default()
            },
        );
        registry.install(plugin.clone()).await.unwrap();
        let log = record(&registry).await;

        let err = registry.uninstall("p1").await.unwrap_err();
        assert_eq!(err.code(), "HOOK_FAILURE");
        assert_eq!(names(&log), vec!["plugin:uninstalling", "plugin:error"]);

        let entry = registry.entry("p1").await.unwrap();
        assert_eq!(entry.status, PluginStatus::Error);
        assert!(entry.error.unwrap().contains("beforeUninstall"));
        assert_eq!(plugin.cleanups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_after_uninstall_failure_after_removal() {
        let registry = registry();
        let plugin = TestPlugin::failing(
            descriptor("p1"),
            Failures {
                after_uninstall: true,
                ..Default::default()
            },
        );
        assert_ok!(registry.install(plugin.clone()).await);
        let log = record(&registry).await;

        let err = assert_err!(registry.uninstall("p1").await);
        assert!(matches!(
            err,
            PluginError::Hook {
                stage: LifecycleStage::Hook(LifecycleHook::AfterUninstall),
                ..
            }
        ));
        assert!(!registry.has_plugin("p1").await);
        assert_eq!(plugin.cleanups.load(Ordering::SeqCst), 1);
        assert_eq!(names(&log), vec!["plugin:uninstalling", "plugin:error"]);
    }

    #[tokio::test]
    async fn test_enable_rejections() {
        let registry = registry();
        let log = record(&registry).await;

        let err = registry.enable("ghost").await.unwrap_err();
        assert!(matches!(err, PluginError::NotInstalled { .. }));

        registry.install(TestPlugin::new(descriptor("p1"))).await.unwrap();
        registry.enable("p1").await.unwrap();
        let err = registry.enable("p1").await.unwrap_err();
        assert!(matches!(err, PluginError::InvalidState { .. }));
        assert_eq!(registry.status("p1").await, Some(PluginStatus::Enabled));

        let events = names(&log);
        assert_eq!(events.first().map(String::as_str), Some("plugin:error"));
        assert_eq!(events.last().map(String::as_str), Some("plugin:error"));
    }

    #[tokio::test]
    async fn test_disable_requires_enabled() {
        let registry = registry();
        registry.install(TestPlugin::new(descriptor("p1"))).await.unwrap();

        assert!(matches!(
            registry.disable("p1").await.unwrap_err(),
            PluginError::InvalidState { .. }
        ));

        registry.enable("p1").await.unwrap();
        registry.disable("p1").await.unwrap();
        let entry = registry.entry("p1").await.unwrap();
        assert_eq!(entry.status, PluginStatus::Disabled);
        assert!(entry.disabled_at.is_some());

        assert!(matches!(
            registry.disable("p1").await.unwrap_err(),
            PluginError::InvalidState { .. }
        ));
    }

    #[tokio::test]
    async fn test_uninstall_enabled_plugin_disables_first() {
        let registry = registry();
        let plugin = TestPlugin::new(descriptor("p1"));
        registry.install(plugin.clone()).await.unwrap();
        registry.enable("p1").await.unwrap();
        let log = record(&registry).await;

        registry.uninstall("p1").await.unwrap();

        assert!(!registry.has_plugin("p1").await);
        assert_eq!(plugin.cleanups.load(Ordering::SeqCst), 1);
        assert_eq!(
            names(&log),
            vec![
                "plugin:uninstalling",
                "plugin:disabling",
                "plugin:disabled",
                "plugin:uninstalled"
            ]
        );
    }

    #[tokio::test]
    async fn test_cleanup_failure_keeps_entry_in_error() {
        let registry = registry();
        let plugin = TestPlugin::failing(
            descriptor("p1"),
            Failures {
                cleanup: true,
                ..Default::default()
            },
        );
        registry.install(plugin).await.unwrap();

        let err = registry.uninstall("p1").await.unwrap_err();
        assert!(matches!(
            err,
            PluginError::Hook {
                stage: LifecycleStage::Cleanup,
                ..
            }
        ));
        assert_eq!(registry.status("p1").await, Some(PluginStatus::Error));
    }

    #[tokio::test]
    async fn test_reload() {
        let registry = registry();
        let log = record(&registry).await;
        registry.install(TestPlugin::new(descriptor("p1"))).await.unwrap();

        assert!(registry.reload("p1").await.is_err());

        registry.enable("p1").await.unwrap();
        registry.reload("p1").await.unwrap();
        assert!(registry.is_enabled("p1").await);

        let events = names(&log);
        let tail: Vec<_> = events[events.len() - 4..].to_vec();
        assert_eq!(
            tail,
            vec![
                "plugin:disabling",
                "plugin:disabled",
                "plugin:enabling",
                "plugin:enabled"
            ]
        );
    }

    #[tokio::test]
    async fn test_health_check() {
        let registry = registry();
        assert!(registry.health_check(None).await.is_empty());

        registry.install(TestPlugin::new(descriptor("ok"))).await.unwrap();
        registry
            .install(TestPlugin::failing(
                descriptor("bad"),
                Failures {
                    health: true,
                    ..Default::default()
                },
            ))
            .await
            .unwrap();
        registry.install(TestPlugin::new(descriptor("idle"))).await.unwrap();
        registry.enable("ok").await.unwrap();
        registry.enable("bad").await.unwrap();

        let reports = registry.health_check(None).await;
        assert_eq!(reports.len(), 2);
        assert!(reports["ok"].is_healthy());
        assert_eq!(reports["bad"].status, crate::plugin::traits::HealthStatus::Unhealthy);
        assert!(reports["bad"].message.as_deref().unwrap().contains("probe failed"));

        // ID 지정 시 상태와 무관
        let single = registry.health_check(Some("idle")).await;
        assert_eq!(single.len(), 1);
        assert!(registry.health_check(Some("ghost")).await.is_empty());
    }

    #[tokio::test]
    async fn test_config_seed_merge_and_notify() {
        let overrides = json!({"lines": 4}).as_object().cloned().unwrap();
        let registry = registry_with(AppConfig::new().plugin_config("p1", overrides));

        let plugin = TestPlugin::new(
            descriptor("p1")
                .with_default_config("lines", json!(1))
                .with_default_config("shift", json!("day")),
        );
        registry.install(plugin.clone()).await.unwrap();

        let config = registry.get_config("p1").await.unwrap();
        assert_eq!(config["lines"], 4);
        assert_eq!(config["shift"], "day");
        // 플러그인이 아직 설정을 보고하지 않으면 엔트리 사본
        assert_eq!(registry.plugin_config("p1").await, Some(config.clone()));

        let merged = registry
            .set_config("p1", json!({"shift": "night"}).as_object().cloned().unwrap())
            .await
            .unwrap();
        assert_eq!(merged["lines"], 4);
        assert_eq!(merged["shift"], "night");
        assert_eq!(plugin.last_config.lock().unwrap().as_ref(), Some(&merged));
        assert_eq!(registry.plugin_config("p1").await, Some(merged.clone()));
        assert_eq!(registry.plugin_config("ghost").await, None);

        assert!(matches!(
            registry.set_config("ghost", ConfigMap::new()).await.unwrap_err(),
            PluginError::NotInstalled { .. }
        ));
    }

    #[tokio::test]
    async fn test_config_change_failure_keeps_status() {
        let registry = registry();
        registry
            .install(TestPlugin::failing(
                descriptor("p1"),
                Failures {
                    config_changed: true,
                    ..Default::default()
                },
            ))
            .await
            .unwrap();

        let err = registry
            .set_config("p1", json!({"a": 1}).as_object().cloned().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PluginError::Hook {
                stage: LifecycleStage::ConfigChanged,
                ..
            }
        ));
        assert_eq!(registry.status("p1").await, Some(PluginStatus::Installed));
        assert_eq!(registry.get_config("p1").await.unwrap()["a"], 1);
    }

    #[tokio::test]
    async fn test_install_all_in_dependency_order() {
        let registry = registry();
        let a = descriptor("a");
        let b = descriptor("b").with_dependency(PluginDependency::new("a", "1.0.0"));
        let c = descriptor("c").with_dependency(PluginDependency::new("b", "1.0.0"));

        let plugins: Vec<Arc<dyn DomainPlugin>> =
            vec![TestPlugin::new(c), TestPlugin::new(b), TestPlugin::new(a)];
        let installed = registry.install_all(plugins).await.unwrap();

        assert_eq!(installed, vec!["a", "b", "c"]);
        assert_eq!(registry.dependents("a").await, vec!["b"]);
        let ids: Vec<_> = registry.list().await.into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_install_all_rejects_cycle() {
        let registry = registry();
        let log = record(&registry).await;
        let a = descriptor("a").with_dependency(PluginDependency::new("b", "1.0.0"));
        let b = descriptor("b").with_dependency(PluginDependency::new("a", "1.0.0"));

        let plugins: Vec<Arc<dyn DomainPlugin>> = vec![TestPlugin::new(a), TestPlugin::new(b)];
        let err = registry.install_all(plugins).await.unwrap_err();
        assert_eq!(err.code(), "DEPENDENCY_CYCLE");
        assert!(registry.is_empty().await);
        assert_eq!(names(&log), vec!["plugin:error", "plugin:error"]);
    }

    #[tokio::test]
    async fn test_assets_follow_enablement_order() {
        let registry = registry();
        let first = descriptor("first")
            .with_component(ComponentSpec::new("Detail", ComponentKind::Detail))
            .with_menu(MenuItem::new("first", "First", "/first").with_order(1));
        let second = descriptor("second")
            .with_component(ComponentSpec::new("Detail", ComponentKind::Detail))
            .with_menu(MenuItem::new("second", "Second", "/second").with_order(1));

        registry.install(TestPlugin::new(first)).await.unwrap();
        registry.install(TestPlugin::new(second)).await.unwrap();
        registry.enable("second").await.unwrap();
        registry.enable("first").await.unwrap();

        let menu_ids: Vec<_> = registry.menus().await.into_iter().map(|m| m.id).collect();
        assert_eq!(menu_ids, vec!["second", "first"]);
        assert_eq!(registry.components().await.len(), 2);

        registry.disable("second").await.unwrap();
        let components = registry.components().await;
        assert_eq!(components.keys().collect::<Vec<_>>(), vec!["first.Detail"]);
    }

    #[tokio::test]
    async fn test_off_stops_delivery() {
        let registry = registry();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let id = registry
            .on(
                PluginEventKind::Installed,
                handler_fn("counter", move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .await;

        registry.install(TestPlugin::new(descriptor("p1"))).await.unwrap();
        assert!(registry.off(id).await);
        registry.install(TestPlugin::new(descriptor("p2"))).await.unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_statistics() {
        let registry = registry();
        registry.install(TestPlugin::new(descriptor("p1"))).await.unwrap();
        registry
            .install(TestPlugin::new(PluginDescriptor::new("p2", "P2", Domain::Retail)))
            .await
            .unwrap();
        registry.enable("p2").await.unwrap();

        let stats = registry.statistics().await;
        assert_eq!(stats.total, 2);
        assert_eq!(stats.installed, 1);
        assert_eq!(stats.enabled, 1);
        assert_eq!(stats.by_domain[&Domain::Factory], 1);
        assert_eq!(stats.by_domain[&Domain::Retail], 1);
        assert_eq!(registry.by_domain(Domain::Retail).await[0].id, "p2");
    }
}
