//! Builtin Plugins - 기본 제공 도메인 플러그인과 카탈로그
//!
//! `smartx.core` 위에 다섯 개의 도메인 플러그인이 올라갑니다.
//! 각 플러그인은 initialize 시 `plugin_registrations` 테이블에 행을 남기고
//! cleanup 시 지우며, 헬스 체크는 그 행이 있는지 확인합니다.

use super::assets::{
    ComponentKind, ComponentSpec, EntityTypeExtension, MenuItem, RouteSpec, WidgetKind, WidgetSpec,
};
use super::descriptor::{ConfigMap, Domain, PluginDependency, PluginDescriptor};
use super::traits::{DomainPlugin, HealthReport, PluginContext};
use async_trait::async_trait;
use serde_json::{json, Value};
use smartx_foundation::{Query, Result, Row};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// 기반 플러그인 ID
pub const CORE_PLUGIN_ID: &str = "smartx.core";

/// 등록 기록 테이블
pub const REGISTRATIONS_TABLE: &str = "plugin_registrations";

// ============================================================================
// BuiltinPlugin
// ============================================================================

/// 선언적 디스크립터와 등록 기록만 가진 기본 플러그인
pub struct BuiltinPlugin {
    descriptor: PluginDescriptor,
}

impl BuiltinPlugin {
    pub fn new(descriptor: PluginDescriptor) -> Self {
        Self { descriptor }
    }

    /// 공용 기반 플러그인
    pub fn core() -> Self {
        Self::new(
            PluginDescriptor::new(CORE_PLUGIN_ID, "SmartX Core", Domain::Common)
                .with_description("Shared dashboard, settings and tenant shell")
                .with_author("SmartX")
                .with_component(ComponentSpec::new("Dashboard", ComponentKind::Page))
                .with_component(ComponentSpec::new("Settings", ComponentKind::Form))
                .with_route(RouteSpec::new("/", "Dashboard").with_title("Dashboard").exact())
                .with_route(RouteSpec::new("/settings", "Settings").with_title("Settings"))
                .with_menu(MenuItem::new("dashboard", "Dashboard", "/").with_icon("home"))
                .with_menu(
                    MenuItem::new("settings", "Settings", "/settings")
                        .with_icon("settings")
                        .with_order(100),
                )
                .with_widget(WidgetSpec::new("core.activity", "Recent Activity", WidgetKind::List))
                .with_default_config("locale", json!("ko-KR")),
        )
    }

    pub fn factory() -> Self {
        Self::new(
            domain_descriptor(
                "smart.factory",
                "Smart Factory",
                Domain::Factory,
                "Production lines, equipment and quality tracking",
                ("equipment", "Equipment"),
                10,
            )
            .with_entity_type(EntityTypeExtension::new("production_order", "Production Order"))
            .with_widget(
                WidgetSpec::new("factory.oee", "OEE", WidgetKind::Stat)
                    .with_config(json!({"unit": "%"})),
            )
            .with_widget(WidgetSpec::new("factory.output", "Daily Output", WidgetKind::Chart))
            .with_default_config("shifts", json!(["day", "night"])),
        )
    }

    pub fn retail() -> Self {
        Self::new(
            domain_descriptor(
                "smart.retail",
                "Smart Retail",
                Domain::Retail,
                "Stores, inventory and sales",
                ("product", "Product"),
                20,
            )
            .with_entity_type(EntityTypeExtension::new("store", "Store"))
            .with_widget(WidgetSpec::new("retail.sales", "Sales", WidgetKind::Chart))
            .with_widget(WidgetSpec::new("retail.stock", "Low Stock", WidgetKind::Table))
            .with_default_config("currency", json!("KRW")),
        )
    }

    pub fn agriculture() -> Self {
        Self::new(
            domain_descriptor(
                "smart.agriculture",
                "Smart Farm",
                Domain::Agriculture,
                "Fields, crops and sensor readings",
                ("field", "Field"),
                30,
            )
            .with_entity_type(EntityTypeExtension::new("crop", "Crop"))
            .with_widget(WidgetSpec::new("farm.map", "Field Map", WidgetKind::Map))
            .with_widget(
                WidgetSpec::new("farm.moisture", "Soil Moisture", WidgetKind::Stat)
                    .with_config(json!({"unit": "%"})),
            )
            .with_default_config("irrigationThreshold", json!(30)),
        )
    }

    pub fn community() -> Self {
        Self::new(
            domain_descriptor(
                "smart.community",
                "Smart Community",
                Domain::Community,
                "Residents, facilities and notices",
                ("facility", "Facility"),
                40,
            )
            .with_entity_type(EntityTypeExtension::new("notice", "Notice"))
            .with_widget(WidgetSpec::new("community.notices", "Notices", WidgetKind::List))
            .with_default_config("reservationDays", json!(14)),
        )
    }

    pub fn construction() -> Self {
        Self::new(
            domain_descriptor(
                "smart.construction",
                "Smart Construction",
                Domain::Construction,
                "Sites, schedules and safety inspections",
                ("site", "Site"),
                50,
            )
            .with_entity_type(EntityTypeExtension::new("inspection", "Safety Inspection"))
            .with_widget(WidgetSpec::new("construction.progress", "Progress", WidgetKind::Chart))
            .with_widget(
                WidgetSpec::new("construction.incidents", "Incidents", WidgetKind::Custom("timeline".into())),
            )
            .with_default_config("inspectionIntervalDays", json!(7)),
        )
    }

    /// 도메인의 기본 플러그인
    pub fn for_domain(domain: Domain) -> Self {
        match domain {
            Domain::Factory => Self::factory(),
            Domain::Retail => Self::retail(),
            Domain::Agriculture => Self::agriculture(),
            Domain::Community => Self::community(),
            Domain::Construction => Self::construction(),
            Domain::Common => Self::core(),
        }
    }

    async fn registration(&self, ctx: &PluginContext) -> Result<Option<Row>> {
        let query = Query::new().eq("id", self.descriptor.id.as_str()).limit(1);
        let rows = ctx.storage().select(REGISTRATIONS_TABLE, &query).await?;
        Ok(rows.into_iter().next())
    }
}

/// 도메인 플러그인 공통 골격 (목록/상세 페이지, 라우트, 메뉴)
fn domain_descriptor(
    id: &str,
    name: &str,
    domain: Domain,
    description: &str,
    entity: (&str, &str),
    menu_order: i32,
) -> PluginDescriptor {
    let (entity_type, label) = entity;
    let base = format!("/{}", domain.as_str());

    PluginDescriptor::new(id, name, domain)
        .with_description(description)
        .with_author("SmartX")
        .with_dependency(PluginDependency::new(CORE_PLUGIN_ID, "1.0.0"))
        .with_entity_type(EntityTypeExtension::new(entity_type, label))
        .with_component(ComponentSpec::new("Home", ComponentKind::Page))
        .with_component(ComponentSpec::new("List", ComponentKind::List))
        .with_component(ComponentSpec::new("Detail", ComponentKind::Detail))
        .with_route(RouteSpec::new(base.clone(), "Home").with_title(name).exact())
        .with_route(RouteSpec::new(format!("{}/{}s", base, entity_type), "List"))
        .with_route(RouteSpec::new(format!("{}/{}s/:id", base, entity_type), "Detail"))
        .with_menu(
            MenuItem::new(domain.as_str(), name, base.clone())
                .with_order(menu_order)
                .with_child(MenuItem::new(
                    format!("{}.{}s", domain.as_str(), entity_type),
                    format!("{}s", label),
                    format!("{}/{}s", base, entity_type),
                )),
        )
}

#[async_trait]
impl DomainPlugin for BuiltinPlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    async fn initialize(&self, ctx: &PluginContext) -> Result<()> {
        let mut row = Row::new();
        row.insert("pluginId".into(), json!(self.descriptor.id));
        row.insert("version".into(), json!(self.descriptor.version));
        row.insert("domain".into(), json!(self.descriptor.domain.as_str()));
        row.insert("tenant".into(), json!(ctx.app().tenant));

        // 이전 실행에서 남은 행이 있으면 갱신
        if self.registration(ctx).await?.is_some() {
            ctx.storage()
                .update(REGISTRATIONS_TABLE, &self.descriptor.id, row)
                .await?;
        } else {
            row.insert("id".into(), json!(self.descriptor.id));
            ctx.storage().insert(REGISTRATIONS_TABLE, row).await?;
        }

        info!(backend = ctx.storage().backend(), "Registration recorded");
        Ok(())
    }

    async fn cleanup(&self, ctx: &PluginContext) -> Result<()> {
        match ctx
            .storage()
            .delete(REGISTRATIONS_TABLE, &self.descriptor.id)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => {
                debug!("Registration already removed");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn health_check(&self, ctx: &PluginContext) -> Result<HealthReport> {
        match self.registration(ctx).await? {
            Some(row) => Ok(HealthReport::healthy().with_details(json!({
                "registeredAt": row.get("createdAt").cloned().unwrap_or(Value::Null),
                "backend": ctx.storage().backend(),
            }))),
            None => Ok(HealthReport::unhealthy("registration row missing")),
        }
    }

    async fn on_config_changed(&self, ctx: &PluginContext, config: &ConfigMap) -> Result<()> {
        let mut patch = Row::new();
        patch.insert("config".into(), Value::Object(config.clone()));
        ctx.storage()
            .update(REGISTRATIONS_TABLE, &self.descriptor.id, patch)
            .await?;
        Ok(())
    }
}

// ============================================================================
// PluginCatalog
// ============================================================================

/// 설치 가능한 플러그인 목록 (등록 순서 유지)
#[derive(Clone, Default)]
pub struct PluginCatalog {
    plugins: Vec<Arc<dyn DomainPlugin>>,
}

impl PluginCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 기본 제공 플러그인 카탈로그
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.register(Arc::new(BuiltinPlugin::core()));
        for domain in Domain::ALL.into_iter().filter(|d| *d != Domain::Common) {
            catalog.register(Arc::new(BuiltinPlugin::for_domain(domain)));
        }
        catalog
    }

    /// 플러그인 추가 (같은 ID면 교체)
    pub fn register(&mut self, plugin: Arc<dyn DomainPlugin>) {
        match self.plugins.iter().position(|p| p.id() == plugin.id()) {
            Some(i) => self.plugins[i] = plugin,
            None => self.plugins.push(plugin),
        }
    }

    pub fn with(mut self, plugin: Arc<dyn DomainPlugin>) -> Self {
        self.register(plugin);
        self
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn DomainPlugin>> {
        self.plugins.iter().find(|p| p.id() == id).cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        self.plugins.iter().map(|p| p.id().to_string()).collect()
    }

    pub fn descriptors(&self) -> Vec<&PluginDescriptor> {
        self.plugins.iter().map(|p| p.descriptor()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// 요청한 ID와 그 필수 의존성을 카탈로그에서 모음
    ///
    /// 카탈로그에 없는 ID는 두 번째 값으로 돌려줍니다. 결과 순서는 카탈로그 순서입니다.
    pub fn with_dependencies<S: AsRef<str>>(&self, ids: &[S]) -> (Vec<Arc<dyn DomainPlugin>>, Vec<String>) {
        let mut wanted: HashSet<String> = HashSet::new();
        let mut unknown = Vec::new();
        let mut stack: Vec<String> = ids.iter().map(|id| id.as_ref().to_string()).collect();

        while let Some(id) = stack.pop() {
            if wanted.contains(&id) {
                continue;
            }
            match self.get(&id) {
                Some(plugin) => {
                    stack.extend(
                        plugin
                            .descriptor()
                            .dependencies
                            .iter()
                            .filter(|d| !d.optional)
                            .map(|d| d.id.clone()),
                    );
                    wanted.insert(id);
                }
                None => {
                    if !unknown.contains(&id) {
                        unknown.push(id);
                    }
                }
            }
        }

        let plugins = self
            .plugins
            .iter()
            .filter(|p| wanted.contains(p.id()))
            .cloned()
            .collect();
        (plugins, unknown)
    }
}
