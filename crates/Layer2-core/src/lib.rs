//! smartx-core: Plugin lifecycle runtime for SmartX
//!
//! Layer2 - 도메인 플러그인 레지스트리와 호스트 애플리케이션
//!
//! # 주요 모듈
//!
//! - `plugin`: 플러그인 디스크립터, 라이프사이클 상태 머신, 의존성 해석, 자산 집계, 이벤트
//! - `app`: 레지스트리와 공유 컨텍스트를 소유하는 호스트 애플리케이션
//!
//! # 사용 예시
//!
//! ```ignore
//! use smartx_core::{PluginCatalog, SmartApp};
//! use smartx_foundation::AppConfig;
//!
//! let app = SmartApp::builder()
//!     .config(AppConfig::new().autostart_enable("smart.factory"))
//!     .build()
//!     .await?;
//!
//! app.bootstrap(&PluginCatalog::builtin()).await?;
//!
//! let stats = app.registry().statistics().await;
//! let widgets = app.registry().widgets().await;
//! ```

pub mod app;
pub mod plugin;

// Re-exports: App
pub use app::{
    summary, BootstrapReport, LifecycleAuditListener, LifecycleRecord, SmartApp,
    SmartAppBuilder, LIFECYCLE_LOG_TABLE,
};

// Re-exports: Plugin
pub use plugin::{
    // Assets
    AssetAggregator,
    // Builtin
    BuiltinPlugin,
    ComponentKind,
    ComponentSpec,
    ConfigMap,
    DependencyError,
    // Resolver
    DependencyResolver,
    // Descriptor
    Domain,
    // Traits
    DomainPlugin,
    EntityTypeExtension,
    HealthReport,
    HealthStatus,
    LifecycleHook,
    LifecycleStage,
    MenuItem,
    PluginCatalog,
    PluginContext,
    PluginDependency,
    PluginDescriptor,
    // Errors
    PluginError,
    // Events
    PluginEvent,
    PluginEventHandler,
    PluginEventKind,
    PluginInfo,
    // Registry
    PluginRegistry,
    PluginResult,
    PluginStatus,
    RegistryStatistics,
    RouteSpec,
    WidgetKind,
    WidgetSpec,
    CORE_PLUGIN_ID,
};
