//! App Config - 통합 설정
//!
//! 호스트 애플리케이션과 플러그인 레지스트리가 공유하는 AppConfig

use crate::storage::{JsonStore, MemoryStorage, SqliteStorage, TableStorage};
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// 설정 파일명
pub const APP_CONFIG_FILE: &str = "smartx.json";

// ============================================================================
// App Config (통합)
// ============================================================================

/// SmartX 통합 설정
///
/// 글로벌 설정 위에 프로젝트 설정을 병합해서 사용합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// 버전 (마이그레이션용)
    #[serde(default = "default_version")]
    pub version: u32,

    /// 애플리케이션 이름
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// 테넌트 식별자
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,

    /// 의존성 버전 비교 방식
    #[serde(default)]
    pub version_strategy: VersionStrategy,

    /// 저장소 설정
    #[serde(default)]
    pub storage: StorageConfig,

    /// 이벤트 버스 설정
    #[serde(default)]
    pub events: EventsConfig,

    /// 시작 시 설치/활성화할 플러그인
    #[serde(default)]
    pub autostart: AutostartConfig,

    /// 플러그인별 설정 오버라이드 (id -> JSON 객체)
    #[serde(default)]
    pub plugins: BTreeMap<String, Map<String, Value>>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            app_name: default_app_name(),
            tenant: None,
            version_strategy: VersionStrategy::default(),
            storage: StorageConfig::default(),
            events: EventsConfig::default(),
            autostart: AutostartConfig::default(),
            plugins: BTreeMap::new(),
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Load / Save
    // ========================================================================

    /// 글로벌 + 프로젝트 병합 로드
    pub fn load() -> Result<Self> {
        let mut config = Self::new();

        // 1. 글로벌 설정
        if let Ok(global) = JsonStore::global() {
            if let Some(global_config) = global.load_optional::<ConfigLayer>(APP_CONFIG_FILE)? {
                config.merge(global_config);
            }
        }

        // 2. 프로젝트 설정
        if let Ok(project) = JsonStore::current_project() {
            if let Some(project_config) = project.load_optional::<ConfigLayer>(APP_CONFIG_FILE)? {
                config.merge(project_config);
            }
        }

        Ok(config)
    }

    /// 지정한 파일에서 로드 (기본값 위에 병합)
    pub fn load_from(path: &Path) -> Result<Self> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let filename = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or(APP_CONFIG_FILE);

        let mut config = Self::new();
        if let Some(file_config) = JsonStore::new(dir).load_optional::<ConfigLayer>(filename)? {
            config.merge(file_config);
        }
        Ok(config)
    }

    /// 프로젝트 설정 저장
    pub fn save_project(&self) -> Result<()> {
        let store = JsonStore::current_project()?;
        store.save(APP_CONFIG_FILE, self)
    }

    // ========================================================================
    // Merge
    // ========================================================================

    /// 설정 한 겹을 위에 병합
    ///
    /// 레이어에 적힌 값만 덮어쓰고, 목록은 확장하고, 플러그인 설정은 키 단위로 병합합니다.
    pub fn merge(&mut self, layer: impl Into<ConfigLayer>) {
        let layer = layer.into();
        if let Some(app_name) = layer.app_name {
            self.app_name = app_name;
        }
        if layer.tenant.is_some() {
            self.tenant = layer.tenant;
        }
        if let Some(strategy) = layer.version_strategy {
            self.version_strategy = strategy;
        }

        self.storage.merge(layer.storage);
        self.events.merge(layer.events);
        self.autostart.merge(layer.autostart);

        for (id, overrides) in layer.plugins {
            let entry = self.plugins.entry(id).or_default();
            for (key, value) in overrides {
                entry.insert(key, value);
            }
        }
    }

    /// 플러그인 설정 오버라이드
    pub fn plugin_overrides(&self, id: &str) -> Option<&Map<String, Value>> {
        self.plugins.get(id)
    }

    // ========================================================================
    // Builder
    // ========================================================================

    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    pub fn tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    pub fn version_strategy(mut self, strategy: VersionStrategy) -> Self {
        self.version_strategy = strategy;
        self
    }

    pub fn autostart_install(mut self, id: impl Into<String>) -> Self {
        self.autostart.install.push(id.into());
        self
    }

    pub fn autostart_enable(mut self, id: impl Into<String>) -> Self {
        self.autostart.enable.push(id.into());
        self
    }

    pub fn plugin_config(mut self, id: impl Into<String>, config: Map<String, Value>) -> Self {
        self.plugins.insert(id.into(), config);
        self
    }
}

// ============================================================================
// Config Layer
// ============================================================================

/// 설정 파일 한 겹
///
/// 파일에 적힌 값만 `Some`이므로 기본값과 같은 값도 명시적으로 덮어쓸 수 있습니다.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigLayer {
    pub app_name: Option<String>,
    pub tenant: Option<String>,
    pub version_strategy: Option<VersionStrategy>,
    #[serde(default)]
    pub storage: StorageLayer,
    #[serde(default)]
    pub events: EventsLayer,
    #[serde(default)]
    pub autostart: AutostartConfig,
    #[serde(default)]
    pub plugins: BTreeMap<String, Map<String, Value>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageLayer {
    pub backend: Option<StorageBackend>,
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsLayer {
    pub history_size: Option<usize>,
    pub channel_capacity: Option<usize>,
}

/// 완성된 설정은 모든 값이 명시된 레이어
impl From<AppConfig> for ConfigLayer {
    fn from(config: AppConfig) -> Self {
        Self {
            app_name: Some(config.app_name),
            tenant: config.tenant,
            version_strategy: Some(config.version_strategy),
            storage: StorageLayer {
                backend: Some(config.storage.backend),
                path: config.storage.path,
            },
            events: EventsLayer {
                history_size: Some(config.events.history_size),
                channel_capacity: Some(config.events.channel_capacity),
            },
            autostart: config.autostart,
            plugins: config.plugins,
        }
    }
}

// ============================================================================
// Version Strategy
// ============================================================================

/// 의존성 버전 호환성 판단 방식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionStrategy {
    /// 문자열 사전순 비교 (`installed >= required`)
    #[default]
    Lexicographic,

    /// Semantic versioning 비교
    Semver,
}

impl std::fmt::Display for VersionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexicographic => write!(f, "lexicographic"),
            Self::Semver => write!(f, "semver"),
        }
    }
}

// ============================================================================
// Storage Config
// ============================================================================

/// 저장소 백엔드 종류
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Memory,
    Sqlite,
}

/// 저장소 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// SQLite 데이터 디렉토리 (없으면 <data_dir>/smartx)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl StorageConfig {
    fn merge(&mut self, layer: StorageLayer) {
        if let Some(backend) = layer.backend {
            self.backend = backend;
        }
        if layer.path.is_some() {
            self.path = layer.path;
        }
    }

    /// 설정된 백엔드로 저장소 열기
    pub fn open(&self) -> Result<Arc<dyn TableStorage>> {
        match self.backend {
            StorageBackend::Memory => Ok(Arc::new(MemoryStorage::new())),
            StorageBackend::Sqlite => {
                let dir = match &self.path {
                    Some(path) => path.clone(),
                    None => dirs::data_dir()
                        .unwrap_or_else(|| PathBuf::from("."))
                        .join(crate::storage::SMARTX_DIR),
                };
                Ok(Arc::new(SqliteStorage::new(&dir)?))
            }
        }
    }
}

// ============================================================================
// Events Config
// ============================================================================

/// 이벤트 버스 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsConfig {
    /// 이벤트 히스토리 보관 개수
    #[serde(default = "default_history_size")]
    pub history_size: usize,

    /// 브로드캐스트 채널 용량
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            history_size: default_history_size(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl EventsConfig {
    fn merge(&mut self, layer: EventsLayer) {
        if let Some(size) = layer.history_size {
            self.history_size = size;
        }
        if let Some(capacity) = layer.channel_capacity {
            self.channel_capacity = capacity;
        }
    }
}

// ============================================================================
// Autostart Config
// ============================================================================

/// 시작 시 자동 설치/활성화 목록
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutostartConfig {
    #[serde(default)]
    pub install: Vec<String>,

    #[serde(default)]
    pub enable: Vec<String>,
}

impl AutostartConfig {
    fn merge(&mut self, other: AutostartConfig) {
        for id in other.install {
            if !self.install.contains(&id) {
                self.install.push(id);
            }
        }
        for id in other.enable {
            if !self.enable.contains(&id) {
                self.enable.push(id);
            }
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn default_version() -> u32 {
    1
}

fn default_app_name() -> String {
    "smartx".to_string()
}

fn default_history_size() -> usize {
    100
}

fn default_channel_capacity() -> usize {
    1024
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::new();
        assert_eq!(config.version, 1);
        assert_eq!(config.app_name, "smartx");
        assert_eq!(config.version_strategy, VersionStrategy::Lexicographic);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
    }

    #[test]
    fn test_config_merge() {
        let mut base = AppConfig::new()
            .tenant("acme")
            .autostart_install("smartx.core");
        base.plugins.insert(
            "smart.factory".into(),
            json!({"shift": "day", "lines": 2}).as_object().cloned().unwrap(),
        );

        let mut overlay = AppConfig::new()
            .version_strategy(VersionStrategy::Semver)
            .autostart_install("smartx.core")
            .autostart_install("smart.factory");
        overlay.plugins.insert(
            "smart.factory".into(),
            json!({"lines": 4}).as_object().cloned().unwrap(),
        );

        base.merge(overlay);

        assert_eq!(base.tenant.as_deref(), Some("acme"));
        assert_eq!(base.version_strategy, VersionStrategy::Semver);
        assert_eq!(base.autostart.install, vec!["smartx.core", "smart.factory"]);

        let factory = base.plugin_overrides("smart.factory").unwrap();
        assert_eq!(factory["shift"], "day");
        assert_eq!(factory["lines"], 4);
    }

    #[test]
    fn test_project_layer_can_restore_defaults() {
        let global: ConfigLayer = serde_json::from_value(json!({
            "versionStrategy": "semver",
            "storage": {"backend": "sqlite"},
            "events": {"historySize": 10}
        }))
        .unwrap();
        let project: ConfigLayer = serde_json::from_value(json!({
            "versionStrategy": "lexicographic",
            "storage": {"backend": "memory"}
        }))
        .unwrap();

        let mut config = AppConfig::new();
        config.merge(global);
        config.merge(project);

        assert_eq!(config.version_strategy, VersionStrategy::Lexicographic);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        // 프로젝트에 없는 값은 글로벌 유지
        assert_eq!(config.events.history_size, 10);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.json");
        std::fs::write(
            &path,
            r#"{"appName": "smart-retail", "versionStrategy": "semver",
                "autostart": {"install": ["smartx.core"], "enable": ["smartx.core"]}}"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.app_name, "smart-retail");
        assert_eq!(config.version_strategy, VersionStrategy::Semver);
        assert_eq!(config.autostart.enable, vec!["smartx.core"]);
        assert_eq!(config.events.history_size, 100);
    }

    #[test]
    fn test_load_from_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config.app_name, "smartx");
    }
}
