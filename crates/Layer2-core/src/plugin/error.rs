//! Plugin Errors - 레지스트리 연산 에러 분류

use super::traits::LifecycleStage;
use thiserror::Error;

/// 레지스트리 연산 결과
pub type PluginResult<T> = std::result::Result<T, PluginError>;

/// 의존성 검사 실패
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DependencyError {
    /// 필수 의존성이 설치되어 있지 않음
    #[error("Plugin {plugin} requires {dependency}, which is not installed")]
    Unmet { plugin: String, dependency: String },

    /// 설치된 버전이 요구 버전보다 낮음
    #[error(
        "Plugin {plugin} requires {dependency} {required}, but {installed} is installed"
    )]
    VersionMismatch {
        plugin: String,
        dependency: String,
        required: String,
        installed: String,
    },

    /// 일괄 설치 대상 사이의 순환 의존성
    #[error("Dependency cycle among plugins: {}", plugins.join(", "))]
    Cycle { plugins: Vec<String> },
}

/// 레지스트리 에러
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("Plugin {id} is already installed")]
    Duplicate { id: String },

    #[error("Plugin {id} is not installed")]
    NotInstalled { id: String },

    /// 현재 상태에서 허용되지 않는 전이
    #[error("Cannot {operation} plugin {id} while it is {status}")]
    InvalidState {
        id: String,
        status: String,
        operation: String,
    },

    #[error(transparent)]
    Dependency(#[from] DependencyError),

    /// 훅, initialize, cleanup 실패
    #[error("Plugin {id} failed during {stage}: {source}")]
    Hook {
        id: String,
        stage: LifecycleStage,
        #[source]
        source: smartx_foundation::Error,
    },
}

impl PluginError {
    pub fn duplicate(id: impl Into<String>) -> Self {
        Self::Duplicate { id: id.into() }
    }

    pub fn not_installed(id: impl Into<String>) -> Self {
        Self::NotInstalled { id: id.into() }
    }

    pub fn invalid_state(
        id: impl Into<String>,
        status: impl std::fmt::Display,
        operation: impl Into<String>,
    ) -> Self {
        Self::InvalidState {
            id: id.into(),
            status: status.to_string(),
            operation: operation.into(),
        }
    }

    pub fn hook(id: impl Into<String>, stage: LifecycleStage, source: smartx_foundation::Error) -> Self {
        Self::Hook {
            id: id.into(),
            stage,
            source,
        }
    }

    /// 에러 이벤트에 실리는 고정 코드
    pub fn code(&self) -> &'static str {
        match self {
            Self::Duplicate { .. } => "DUPLICATE",
            Self::NotInstalled { .. } => "NOT_INSTALLED",
            Self::InvalidState { .. } => "INVALID_STATE",
            Self::Dependency(DependencyError::Unmet { .. }) => "UNMET_DEPENDENCY",
            Self::Dependency(DependencyError::VersionMismatch { .. }) => "VERSION_MISMATCH",
            Self::Dependency(DependencyError::Cycle { .. }) => "DEPENDENCY_CYCLE",
            Self::Hook { .. } => "HOOK_FAILURE",
        }
    }

    /// 대상 플러그인 ID (순환 에러는 없음)
    pub fn plugin_id(&self) -> Option<&str> {
        match self {
            Self::Duplicate { id }
            | Self::NotInstalled { id }
            | Self::InvalidState { id, .. }
            | Self::Hook { id, .. } => Some(id),
            Self::Dependency(DependencyError::Unmet { plugin, .. })
            | Self::Dependency(DependencyError::VersionMismatch { plugin, .. }) => Some(plugin),
            Self::Dependency(DependencyError::Cycle { .. }) => None,
        }
    }

    pub fn is_dependency(&self) -> bool {
        matches!(self, Self::Dependency(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::traits::LifecycleHook;

    #[test]
    fn test_error_codes() {
        assert_eq!(PluginError::duplicate("a").code(), "DUPLICATE");
        assert_eq!(
            PluginError::from(DependencyError::Unmet {
                plugin: "b".into(),
                dependency: "a".into(),
            })
            .code(),
            "UNMET_DEPENDENCY"
        );
    }

    #[test]
    fn test_hook_error_message() {
        let err = PluginError::hook(
            "smart.factory",
            LifecycleStage::Hook(LifecycleHook::BeforeEnable),
            smartx_foundation::Error::Internal("boom".into()),
        );
        assert_eq!(
            err.to_string(),
            "Plugin smart.factory failed during beforeEnable: Internal error: boom"
        );
        assert_eq!(err.plugin_id(), Some("smart.factory"));
    }

    #[test]
    fn test_invalid_state_message() {
        let err = PluginError::invalid_state("p", "disabled", "disable");
        assert_eq!(err.to_string(), "Cannot disable plugin p while it is disabled");
    }
}
