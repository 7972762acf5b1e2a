//! Plugin Registry - 발견된 플러그인의 인메모리 저장소

use super::discovery::DiscoveredPlugin;
use super::manifest::PluginDescriptor;
use super::traits::Plugin;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// 등록된 플러그인 정보
#[derive(Clone)]
pub struct RegisteredPlugin {
    /// 디스커버리 결과 (디스크립터 + 경로 + 스코프)
    pub discovered: DiscoveredPlugin,

    /// 엔트리 인스턴스
    pub instance: Arc<dyn Plugin>,
}

impl RegisteredPlugin {
    pub fn descriptor(&self) -> &PluginDescriptor {
        &self.discovered.descriptor
    }
}

/// 플러그인 레지스트리 - 이름 -> 발견된 플러그인
///
/// 디스커버리 스캔마다 갱신됩니다. 같은 이름은 덮어쓰고, 사라진 이름은 스캔이 지웁니다.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: RwLock<HashMap<String, RegisteredPlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 플러그인 등록 (upsert)
    pub async fn register(&self, discovered: DiscoveredPlugin, instance: Arc<dyn Plugin>) {
        let name = discovered.descriptor.name.clone();
        let version = discovered.descriptor.version.clone();

        let mut plugins = self.plugins.write().await;
        let replaced = plugins
            .insert(name.clone(), RegisteredPlugin { discovered, instance })
            .is_some();

        if replaced {
            debug!("Refreshed plugin: {} (v{})", name, version);
        } else {
            info!("Registered plugin: {} (v{})", name, version);
        }
    }

    pub async fn remove(&self, name: &str) -> Option<RegisteredPlugin> {
        let removed = self.plugins.write().await.remove(name);
        if removed.is_some() {
            debug!("Removed plugin from registry: {}", name);
        }
        removed
    }

    pub async fn get_discovered(&self, name: &str) -> Option<DiscoveredPlugin> {
        let plugins = self.plugins.read().await;
        plugins.get(name).map(|p| p.discovered.clone())
    }

    pub async fn get_entry(&self, name: &str) -> Option<RegisteredPlugin> {
        self.plugins.read().await.get(name).cloned()
    }

    /// 모든 플러그인 (이름순)
    pub async fn list(&self) -> Vec<RegisteredPlugin> {
        let plugins = self.plugins.read().await;
        let mut list: Vec<RegisteredPlugin> = plugins.values().cloned().collect();
        list.sort_by(|a, b| a.descriptor().name.cmp(&b.descriptor().name));
        list
    }

    /// 이름순
    pub async fn names(&self) -> Vec<String> {
        let plugins = self.plugins.read().await;
        let mut names: Vec<String> = plugins.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.plugins.read().await.contains_key(name)
    }

    pub async fn len(&self) -> usize {
        self.plugins.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.plugins.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.plugins.write().await.clear();
    }

    /// 레지스트리에 없는 의존성 이름 목록
    pub async fn check_requirements(&self, descriptor: &PluginDescriptor) -> Vec<String> {
        let plugins = self.plugins.read().await;
        descriptor
            .requirement_names()
            .into_iter()
            .filter(|name| !plugins.contains_key(*name))
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_foundation::PluginScope;
    use std::any::Any;
    use std::path::PathBuf;

    struct Stub(String);

    impl Plugin for Stub {
        fn name(&self) -> &str {
            &self.0
        }

        fn version(&self) -> &str {
            "1.0.0"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn discovered(name: &str) -> (DiscoveredPlugin, Arc<dyn Plugin>) {
        let descriptor = PluginDescriptor::new(name, "1.0.0", format!("{}.Plugin", name));
        (
            DiscoveredPlugin {
                descriptor,
                path: PathBuf::from("/plugins").join(name),
                scope: PluginScope::Project,
            },
            Arc::new(Stub(name.to_string())),
        )
    }

    #[tokio::test]
    async fn test_register_is_upsert() {
        let registry = PluginRegistry::new();

        let (d, p) = discovered("sms");
        registry.register(d, p).await;
        let (d, p) = discovered("sms");
        registry.register(d, p).await;

        assert_eq!(registry.len().await, 1);
        assert_eq!(registry.get_entry("sms").await.unwrap().instance.name(), "sms");
    }

    #[test]
    fn test_names_sorted() {
        tokio_test::block_on(async {
            let registry = PluginRegistry::new();
            for name in ["oss", "audit", "sms"] {
                let (d, p) = discovered(name);
                registry.register(d, p).await;
            }

            assert_eq!(registry.names().await, vec!["audit", "oss", "sms"]);
            assert!(registry.remove("oss").await.is_some());
            assert!(!registry.contains("oss").await);
        });
    }

    #[tokio::test]
    async fn test_check_requirements() {
        let registry = PluginRegistry::new();
        let (d, p) = discovered("base-auth");
        registry.register(d, p).await;

        let descriptor = PluginDescriptor::new("wechat-login", "1.0.0", "wechat.Plugin")
            .with_requirement("base-auth@1.0")
            .with_requirement("payments");

        assert_eq!(
            registry.check_requirements(&descriptor).await,
            vec!["payments".to_string()]
        );

        registry.clear().await;
        assert!(registry.is_empty().await);
    }
}
