//! # Plugin System
//!
//! 도메인 플러그인 라이프사이클 관리
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      PluginRegistry                          │
//! │  ┌───────────────────────────────────────────────────────┐  │
//! │  │  id → RegistryEntry { plugin, status, config, ... }   │  │
//! │  └───────────────────────────────────────────────────────┘  │
//! │        │ install            │ enable/disable    │ 조회       │
//! │        ▼                    ▼                   ▼           │
//! │  DependencyResolver   LifecycleHook 호출   AssetAggregator   │
//! │                              │                              │
//! │                              ▼                              │
//! │               EventBus (plugin:installing ...)              │
//! └─────────────────────────────────────────────────────────────┘
//!                 ▲
//!                 │ &PluginContext (storage, config, app, events)
//!           DomainPlugin (smartx.core, smart.factory, ...)
//! ```
//!
//! ## 예시
//!
//! ```ignore
//! let registry = PluginRegistry::new(context);
//! registry.install(Arc::new(BuiltinPlugin::core())).await?;
//! registry.install(Arc::new(BuiltinPlugin::factory())).await?;
//! registry.enable("smart.factory").await?;
//!
//! for menu in registry.menus().await {
//!     println!("{} -> {}", menu.label, menu.path);
//! }
//! ```

mod assets;
mod builtin;
mod descriptor;
mod error;
mod events;
mod registry;
mod resolver;
mod traits;

pub use assets::{
    AssetAggregator, ComponentKind, ComponentSpec, EntityTypeExtension, MenuItem, RouteSpec,
    WidgetKind, WidgetSpec,
};
pub use builtin::{BuiltinPlugin, PluginCatalog, CORE_PLUGIN_ID, REGISTRATIONS_TABLE};
pub use descriptor::{ConfigMap, Contributions, Domain, PluginDependency, PluginDescriptor};
pub use error::{DependencyError, PluginError, PluginResult};
pub use events::{
    handler_fn, ErrorInfo, FnHandler, PluginEvent, PluginEventHandler, PluginEventKind,
    REGISTRY_SOURCE,
};
pub use registry::{PluginInfo, PluginRegistry, PluginStatus, RegistryEntry, RegistryStatistics};
pub use resolver::DependencyResolver;
pub use traits::{
    AppInfo, DomainPlugin, HealthReport, HealthStatus, LifecycleHook, LifecycleStage,
    PluginContext,
};
