//! Plugin Assets - 플러그인이 기여하는 UI/라우팅 자산과 집계
//!
//! 자산은 소유 플러그인이 enabled 상태일 때만 노출됩니다.
//! 집계는 캐시 없이 호출 시점의 활성 플러그인 목록으로 매번 계산합니다.

use super::descriptor::PluginDescriptor;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// ============================================================================
// Asset kinds
// ============================================================================

/// 엔티티 타입 확장 (필드 정의는 정적 설정이므로 이름만 다룸)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityTypeExtension {
    pub entity_type: String,
    pub label: String,
}

impl EntityTypeExtension {
    pub fn new(entity_type: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            label: label.into(),
        }
    }
}

/// UI 컴포넌트 종류
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Page,
    List,
    Detail,
    Form,
    Card,
    Custom(String),
}

/// UI 컴포넌트
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSpec {
    pub name: String,
    pub kind: ComponentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ComponentSpec {
    pub fn new(name: impl Into<String>, kind: ComponentKind) -> Self {
        Self {
            name: name.into(),
            kind,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// 라우트
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSpec {
    pub path: String,
    /// 같은 플러그인의 컴포넌트 이름
    pub component: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub exact: bool,
}

impl RouteSpec {
    pub fn new(path: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            component: component.into(),
            title: None,
            exact: false,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn exact(mut self) -> Self {
        self.exact = true;
        self
    }
}

/// 메뉴 항목
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub id: String,
    pub label: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// 정렬 순서 (없으면 0으로 취급)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<MenuItem>,
}

impl MenuItem {
    pub fn new(id: impl Into<String>, label: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            path: path.into(),
            icon: None,
            order: None,
            children: vec![],
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_child(mut self, child: MenuItem) -> Self {
        self.children.push(child);
        self
    }

    /// 정렬 키
    pub fn sort_order(&self) -> i32 {
        self.order.unwrap_or(0)
    }
}

/// 위젯 종류
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetKind {
    Stat,
    Chart,
    Table,
    List,
    Map,
    Custom(String),
}

/// 대시보드 위젯
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetSpec {
    pub id: String,
    pub title: String,
    pub kind: WidgetKind,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub config: Value,
}

impl WidgetSpec {
    pub fn new(id: impl Into<String>, title: impl Into<String>, kind: WidgetKind) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            kind,
            config: Value::Null,
        }
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }
}

// ============================================================================
// AssetAggregator
// ============================================================================

/// 활성 플러그인들의 자산 병합
///
/// 입력은 활성화 순서대로 정렬된 디스크립터여야 합니다.
pub struct AssetAggregator;

impl AssetAggregator {
    /// 컴포넌트 키
    pub fn component_key(plugin_id: &str, component: &str) -> String {
        format!("{}.{}", plugin_id, component)
    }

    /// `"<pluginId>.<componentName>"` 키로 평탄화
    ///
    /// 한 플러그인 안에서 이름이 겹치면 나중에 선언된 컴포넌트가 남습니다.
    pub fn components<'a, I>(sources: I) -> BTreeMap<String, ComponentSpec>
    where
        I: IntoIterator<Item = &'a PluginDescriptor>,
    {
        sources
            .into_iter()
            .flat_map(|d| {
                d.contributions
                    .components
                    .iter()
                    .map(move |c| (Self::component_key(&d.id, &c.name), c.clone()))
            })
            .collect()
    }

    /// 메뉴 연결 후 order 오름차순 안정 정렬
    pub fn menus<'a, I>(sources: I) -> Vec<MenuItem>
    where
        I: IntoIterator<Item = &'a PluginDescriptor>,
    {
        let mut menus: Vec<MenuItem> = sources
            .into_iter()
            .flat_map(|d| d.contributions.menus.iter().cloned())
            .collect();
        // sort_by_key는 안정 정렬
        menus.sort_by_key(MenuItem::sort_order);
        menus
    }

    /// 위젯 연결 (재정렬 없음)
    pub fn widgets<'a, I>(sources: I) -> Vec<WidgetSpec>
    where
        I: IntoIterator<Item = &'a PluginDescriptor>,
    {
        sources
            .into_iter()
            .flat_map(|d| d.contributions.widgets.iter().cloned())
            .collect()
    }

    /// 라우트 연결 (재정렬 없음)
    pub fn routes<'a, I>(sources: I) -> Vec<RouteSpec>
    where
        I: IntoIterator<Item = &'a PluginDescriptor>,
    {
        sources
            .into_iter()
            .flat_map(|d| d.contributions.routes.iter().cloned())
            .collect()
    }

    /// 플러그인 ID별 엔티티 타입 확장
    pub fn entity_types<'a, I>(sources: I) -> BTreeMap<String, Vec<EntityTypeExtension>>
    where
        I: IntoIterator<Item = &'a PluginDescriptor>,
    {
        sources
            .into_iter()
            .filter(|d| !d.contributions.entity_types.is_empty())
            .map(|d| (d.id.clone(), d.contributions.entity_types.clone()))
            .collect()
    }
}
