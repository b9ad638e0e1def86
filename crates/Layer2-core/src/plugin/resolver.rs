//! Dependency Resolver - 설치 전 의존성 검사와 일괄 설치 순서 계산
//!
//! 검사는 설치의 어떤 부수효과보다도 먼저 한 번만 실행됩니다.
//! enable 시점에는 다시 검사하지 않습니다.

use super::descriptor::PluginDescriptor;
use super::error::DependencyError;
use smartx_foundation::VersionStrategy;
use std::collections::HashMap;
use tracing::debug;

/// 의존성 해석기
#[derive(Debug, Clone, Copy, Default)]
pub struct DependencyResolver {
    strategy: VersionStrategy,
}

impl DependencyResolver {
    pub fn new(strategy: VersionStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> VersionStrategy {
        self.strategy
    }

    // ========================================================================
    // 버전 호환성
    // ========================================================================

    /// `installed`가 `required`를 만족하는지 확인
    pub fn is_compatible(&self, installed: &str, required: &str) -> bool {
        match self.strategy {
            VersionStrategy::Lexicographic => lexicographic_compatible(installed, required),
            VersionStrategy::Semver => semver_compatible(installed, required),
        }
    }

    // ========================================================================
    // 설치 전 검사
    // ========================================================================

    /// 선언된 의존성 검사
    ///
    /// `installed_version`은 설치된 플러그인의 버전을 돌려줍니다 (없으면 None).
    /// 설치되지 않은 선택적 의존성은 건너뜁니다.
    pub fn check<F>(&self, descriptor: &PluginDescriptor, installed_version: F) -> Result<(), DependencyError>
    where
        F: Fn(&str) -> Option<String>,
    {
        for dep in &descriptor.dependencies {
            let Some(version) = installed_version(&dep.id) else {
                if dep.optional {
                    debug!(plugin_id = %descriptor.id, dependency = %dep.id, "Optional dependency not installed");
                    continue;
                }
                return Err(DependencyError::Unmet {
                    plugin: descriptor.id.clone(),
                    dependency: dep.id.clone(),
                });
            };

            if !self.is_compatible(&version, &dep.version) {
                return Err(DependencyError::VersionMismatch {
                    plugin: descriptor.id.clone(),
                    dependency: dep.id.clone(),
                    required: dep.version.clone(),
                    installed: version,
                });
            }
        }

        Ok(())
    }

    // ========================================================================
    // 일괄 설치 순서
    // ========================================================================

    /// 의존성 순서로 정렬된 인덱스 반환
    ///
    /// 같은 배치 안의 의존성만 간선으로 취급하며, 순서가 자유로운 플러그인끼리는
    /// 입력 순서를 유지합니다.
    pub fn install_order(descriptors: &[&PluginDescriptor]) -> Result<Vec<usize>, DependencyError> {
        let mut index: HashMap<&str, usize> = HashMap::new();
        for (i, d) in descriptors.iter().enumerate() {
            index.entry(d.id.as_str()).or_insert(i);
        }

        // in_degree[i] = i가 기다려야 하는 배치 내 의존성 수
        let mut in_degree = vec![0usize; descriptors.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); descriptors.len()];
        for (i, d) in descriptors.iter().enumerate() {
            for dep in &d.dependencies {
                if let Some(&j) = index.get(dep.id.as_str()) {
                    if j != i {
                        in_degree[i] += 1;
                        dependents[j].push(i);
                    }
                }
            }
        }

        let mut order = Vec::with_capacity(descriptors.len());
        let mut done = vec![false; descriptors.len()];

        while order.len() < descriptors.len() {
            let next = (0..descriptors.len()).find(|&i| !done[i] && in_degree[i] == 0);
            let Some(i) = next else {
                let mut plugins: Vec<String> = (0..descriptors.len())
                    .filter(|&i| !done[i])
                    .map(|i| descriptors[i].id.clone())
                    .collect();
                plugins.sort();
                plugins.dedup();
                return Err(DependencyError::Cycle { plugins });
            };

            done[i] = true;
            order.push(i);
            for &k in &dependents[i] {
                in_degree[k] -= 1;
            }
        }

        Ok(order)
    }
}

fn lexicographic_compatible(installed: &str, required: &str) -> bool {
    installed >= required
}

fn semver_compatible(installed: &str, required: &str) -> bool {
    let Ok(installed_version) = semver::Version::parse(installed) else {
        return lexicographic_compatible(installed, required);
    };

    if let Ok(required_version) = semver::Version::parse(required) {
        return installed_version >= required_version;
    }

    match semver::VersionReq::parse(required) {
        Ok(req) => req.matches(&installed_version),
        Err(_) => lexicographic_compatible(installed, required),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::descriptor::{Domain, PluginDependency};

    fn plugin(id: &str, deps: &[&str]) -> PluginDescriptor {
        deps.iter().fold(PluginDescriptor::new(id, id, Domain::Common), |d, dep| {
            d.with_dependency(PluginDependency::new(*dep, "1.0.0"))
        })
    }

    #[test]
    fn test_lexicographic_compatibility() {
        let resolver = DependencyResolver::default();
        assert!(resolver.is_compatible("1.0.0", "1.0.0"));
        assert!(resolver.is_compatible("1.2.0", "1.0.0"));
        assert!(!resolver.is_compatible("0.9.0", "1.0.0"));
        // 문자열 비교의 알려진 한계
        assert!(!resolver.is_compatible("10.0.0", "9.0.0"));
    }

    #[test]
    fn test_semver_compatibility() {
        let resolver = DependencyResolver::new(VersionStrategy::Semver);
        assert!(resolver.is_compatible("10.0.0", "9.0.0"));
        assert!(!resolver.is_compatible("1.0.0", "1.0.1"));
        assert!(resolver.is_compatible("1.4.2", "^1.2"));
        assert!(!resolver.is_compatible("2.0.0", "^1.2"));
        // 파싱 불가 시 문자열 비교
        assert!(resolver.is_compatible("beta", "alpha"));
    }

    #[test]
    fn test_check_unmet_and_optional() {
        let resolver = DependencyResolver::default();
        let descriptor = PluginDescriptor::new("b", "B", Domain::Retail)
            .with_dependency(PluginDependency::new("a", "1.0.0"))
            .with_dependency(PluginDependency::new("x", "1.0.0").optional());

        let err = resolver.check(&descriptor, |_| None).unwrap_err();
        assert_eq!(
            err,
            DependencyError::Unmet {
                plugin: "b".into(),
                dependency: "a".into()
            }
        );

        let ok = resolver.check(&descriptor, |id| (id == "a").then(|| "1.1.0".to_string()));
        assert!(ok.is_ok());
    }

    #[test]
    fn test_check_version_mismatch() {
        let resolver = DependencyResolver::default();
        let descriptor = plugin("b", &["a"]);
        let err = resolver
            .check(&descriptor, |_| Some("0.5.0".to_string()))
            .unwrap_err();
        assert!(matches!(err, DependencyError::VersionMismatch { ref installed, .. } if installed == "0.5.0"));
    }

    #[test]
    fn test_install_order_is_stable() {
        let c = plugin("c", &["a"]);
        let b = plugin("b", &[]);
        let a = plugin("a", &[]);
        let d = plugin("d", &["c", "outside"]);

        let order = DependencyResolver::install_order(&[&d, &c, &b, &a]).unwrap();
        let ids: Vec<_> = order.iter().map(|&i| [&d, &c, &b, &a][i].id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c", "d"]);
    }

    #[test]
    fn test_install_order_cycle() {
        let a = plugin("a", &["b"]);
        let b = plugin("b", &["a"]);
        let c = plugin("c", &[]);

        let err = DependencyResolver::install_order(&[&a, &b, &c]).unwrap_err();
        assert_eq!(
            err,
            DependencyError::Cycle {
                plugins: vec!["a".into(), "b".into()]
            }
        );
    }
}
