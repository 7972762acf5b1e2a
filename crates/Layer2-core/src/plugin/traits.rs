//! Plugin traits - 라이프사이클 계약
//!
//! 기반 클래스 대신 작은 트레이트들을 조합합니다:
//! - `Installable`: 스키마 마이그레이션, 설치/제거 스크립트
//! - `Enableable`: 활성화/비활성화 훅
//! - `CapabilityProvider`: capability 선언

use super::events::{EventBus, EventType, PluginEvent};
use crate::capability::CapabilityDeclaration;
use agora_foundation::{Result, SchemaMigration};
use async_trait::async_trait;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// ============================================================================
// PluginContext - 훅에 전달되는 컨텍스트
// ============================================================================

/// 플러그인 컨텍스트
pub struct PluginContext {
    plugin_name: String,

    /// 플러그인 디렉토리
    plugin_dir: PathBuf,

    /// 호출 시점의 설정 스냅샷
    settings: HashMap<String, Value>,

    event_bus: Arc<EventBus>,
}

impl PluginContext {
    pub fn new(
        plugin_name: impl Into<String>,
        plugin_dir: impl Into<PathBuf>,
        settings: HashMap<String, Value>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            plugin_dir: plugin_dir.into(),
            settings,
            event_bus,
        }
    }

    pub fn plugin_name(&self) -> &str {
        &self.plugin_name
    }

    pub fn plugin_dir(&self) -> &Path {
        &self.plugin_dir
    }

    pub fn settings(&self) -> &HashMap<String, Value> {
        &self.settings
    }

    pub fn setting(&self, key: &str) -> Option<&Value> {
        self.settings.get(key)
    }

    /// 문자열 설정 값
    pub fn setting_str(&self, key: &str) -> Option<&str> {
        self.settings.get(key).and_then(Value::as_str)
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// 플러그인 이름으로 사용자 정의 이벤트 발행
    pub async fn emit(&self, data: Value) {
        self.event_bus
            .publish(PluginEvent::for_plugin(
                EventType::Custom,
                &self.plugin_name,
                data,
                self.plugin_name.clone(),
            ))
            .await;
    }
}

// ============================================================================
// Plugin Trait
// ============================================================================

/// 플러그인 트레이트
///
/// 모든 플러그인 엔트리는 이 트레이트를 구현합니다. 라이프사이클 참여는
/// `as_*` 메서드로 노출하는 하위 트레이트로 결정됩니다.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    fn as_installable(&self) -> Option<&dyn Installable> {
        None
    }

    fn as_enableable(&self) -> Option<&dyn Enableable> {
        None
    }

    fn as_capability_provider(&self) -> Option<&dyn CapabilityProvider> {
        None
    }

    /// 다운캐스팅 지원
    fn as_any(&self) -> &dyn Any;
}

/// 설치/제거 참여
#[async_trait]
pub trait Installable: Send + Sync {
    /// 스키마 마이그레이션 (플러그인 내에서 id 유일, 선언 순서대로 적용)
    fn migrations(&self) -> Vec<SchemaMigration> {
        Vec::new()
    }

    /// 설치 스크립트 (초기 데이터)
    async fn on_install(&self, _ctx: &PluginContext) -> Result<()> {
        Ok(())
    }

    /// 제거 스크립트 (실패해도 제거는 진행)
    async fn on_uninstall(&self, _ctx: &PluginContext) -> Result<()> {
        Ok(())
    }
}

/// 활성화/비활성화 참여
#[async_trait]
pub trait Enableable: Send + Sync {
    async fn on_enable(&self, _ctx: &PluginContext) -> Result<()> {
        Ok(())
    }

    async fn on_disable(&self, _ctx: &PluginContext) -> Result<()> {
        Ok(())
    }
}

/// capability 프로바이더
pub trait CapabilityProvider: Send + Sync {
    fn capabilities(&self) -> Result<Vec<CapabilityDeclaration>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CapabilityInterface;

    struct TestPlugin;

    impl Plugin for TestPlugin {
        fn name(&self) -> &str {
            "test.plugin"
        }

        fn version(&self) -> &str {
            "1.0.0"
        }

        fn as_capability_provider(&self) -> Option<&dyn CapabilityProvider> {
            Some(self)
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    impl CapabilityProvider for TestPlugin {
        fn capabilities(&self) -> Result<Vec<CapabilityDeclaration>> {
            Ok(vec![CapabilityDeclaration::sms("sms", "test.sms", "Test SMS")])
        }
    }

    #[test]
    fn test_composed_contract() {
        let plugin = TestPlugin;
        assert!(plugin.as_installable().is_none());
        assert!(plugin.as_enableable().is_none());

        let decls = plugin
            .as_capability_provider()
            .unwrap()
            .capabilities()
            .unwrap();
        assert_eq!(decls[0].interface, CapabilityInterface::SmsChannelProvider);
        assert!(plugin.as_any().downcast_ref::<TestPlugin>().is_some());
    }

    #[tokio::test]
    async fn test_plugin_context() {
        let bus = Arc::new(EventBus::new());
        let mut settings = HashMap::new();
        settings.insert("sign".to_string(), serde_json::json!("Agora"));

        let ctx = PluginContext::new("test.plugin", "/tmp/test", settings, Arc::clone(&bus));
        assert_eq!(ctx.setting_str("sign"), Some("Agora"));
        assert!(ctx.setting("missing").is_none());

        ctx.emit(serde_json::json!({"hello": "world"})).await;
        assert_eq!(bus.history_for_plugin("test.plugin").await.len(), 1);
    }
}
