//! Plugin Descriptor - 플러그인 메타데이터 정의
//!
//! 설치 후에는 불변입니다. 런타임에 바뀌는 값은 레지스트리 엔트리의 config뿐입니다.

use super::assets::{ComponentSpec, EntityTypeExtension, MenuItem, RouteSpec, WidgetSpec};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 플러그인 설정 (얕은 병합 대상)
pub type ConfigMap = Map<String, Value>;

/// 플러그인이 속한 도메인
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Factory,
    Retail,
    Agriculture,
    Community,
    Construction,
    /// 특정 도메인에 속하지 않는 공용 플러그인
    Common,
}

impl Domain {
    pub const ALL: [Domain; 6] = [
        Domain::Factory,
        Domain::Retail,
        Domain::Agriculture,
        Domain::Community,
        Domain::Construction,
        Domain::Common,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Factory => "factory",
            Self::Retail => "retail",
            Self::Agriculture => "agriculture",
            Self::Community => "community",
            Self::Construction => "construction",
            Self::Common => "common",
        }
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Domain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Domain::ALL
            .iter()
            .copied()
            .find(|d| d.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown domain: {}", s))
    }
}

/// 플러그인 의존성
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDependency {
    /// 의존하는 플러그인 ID
    pub id: String,

    /// 최소 필요 버전
    pub version: String,

    /// 선택적 의존성 여부
    #[serde(default)]
    pub optional: bool,
}

impl PluginDependency {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            optional: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// 플러그인이 기여하는 자산 (모두 선언적, 선택)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contributions {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entity_types: Vec<EntityTypeExtension>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<ComponentSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<RouteSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub menus: Vec<MenuItem>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub widgets: Vec<WidgetSpec>,
}

impl Contributions {
    pub fn is_empty(&self) -> bool {
        self.entity_types.is_empty()
            && self.components.is_empty()
            && self.routes.is_empty()
            && self.menus.is_empty()
            && self.widgets.is_empty()
    }
}

/// 플러그인 디스크립터 - 플러그인의 정적 설명
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginDescriptor {
    /// 고유 플러그인 ID (예: "smart.factory")
    pub id: String,

    /// 표시 이름
    pub name: String,

    /// 버전 문자열
    pub version: String,

    /// 도메인
    pub domain: Domain,

    /// 설명
    #[serde(default)]
    pub description: String,

    /// 작성자
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// 의존성 목록
    #[serde(default)]
    pub dependencies: Vec<PluginDependency>,

    /// 기여 자산
    #[serde(default)]
    pub contributions: Contributions,

    /// 기본 설정 (설치 시 엔트리 config의 초기값)
    #[serde(default)]
    pub default_config: ConfigMap,
}

impl PluginDescriptor {
    /// 새 디스크립터 생성
    pub fn new(id: impl Into<String>, name: impl Into<String>, domain: Domain) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: "1.0.0".to_string(),
            domain,
            description: String::new(),
            author: None,
            dependencies: vec![],
            contributions: Contributions::default(),
            default_config: ConfigMap::new(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_dependency(mut self, dep: PluginDependency) -> Self {
        self.dependencies.push(dep);
        self
    }

    pub fn with_entity_type(mut self, entity: EntityTypeExtension) -> Self {
        self.contributions.entity_types.push(entity);
        self
    }

    /// 같은 이름의 컴포넌트가 있으면 교체
    pub fn with_component(mut self, component: ComponentSpec) -> Self {
        let components = &mut self.contributions.components;
        match components.iter_mut().find(|c| c.name == component.name) {
            Some(existing) => *existing = component,
            None => components.push(component),
        }
        self
    }

    pub fn with_route(mut self, route: RouteSpec) -> Self {
        self.contributions.routes.push(route);
        self
    }

    pub fn with_menu(mut self, menu: MenuItem) -> Self {
        self.contributions.menus.push(menu);
        self
    }

    pub fn with_widget(mut self, widget: WidgetSpec) -> Self {
        self.contributions.widgets.push(widget);
        self
    }

    pub fn with_default_config(mut self, key: impl Into<String>, value: Value) -> Self {
        self.default_config.insert(key.into(), value);
        self
    }

    /// 지정한 ID에 대한 의존성 선언 찾기
    pub fn dependency(&self, id: &str) -> Option<&PluginDependency> {
        self.dependencies.iter().find(|d| d.id == id)
    }
}
