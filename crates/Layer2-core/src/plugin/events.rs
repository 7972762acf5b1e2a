//! Plugin Events - 라이프사이클 알림
//!
//! 매니저, 설치기, 디스커버리, 설정 저장소가 상태를 바꿀 때마다 발행합니다.
//! 구독자(broadcast)와 등록된 리스너 모두에게 전달되고 최근 이벤트는 히스토리에 남습니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;
use uuid::Uuid;

const DEFAULT_CHANNEL_CAPACITY: usize = 256;
const DEFAULT_HISTORY: usize = 200;

/// 라이프사이클 이벤트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginEvent {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// 시스템 이벤트면 None
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin: Option<String>,
    #[serde(default)]
    pub data: Value,
    /// 발행한 컴포넌트 (예: "plugin_manager")
    pub source: String,
    pub occurred_at: DateTime<Utc>,
}

impl PluginEvent {
    pub fn new(event_type: EventType, data: Value, source: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            plugin: None,
            data,
            source: source.into(),
            occurred_at: Utc::now(),
        }
    }

    pub fn for_plugin(
        event_type: EventType,
        plugin: impl Into<String>,
        data: Value,
        source: impl Into<String>,
    ) -> Self {
        let mut event = Self::new(event_type, data, source);
        event.plugin = Some(plugin.into());
        event
    }

    pub fn is_about(&self, plugin: &str) -> bool {
        self.plugin.as_deref() == Some(plugin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    PluginDiscovered,
    DiscoveryFailed,
    PluginInstalled,
    PluginUninstalled,
    PluginEnabled,
    PluginDisabled,
    CapabilityRegistered,
    CapabilityUnregistered,
    ConfigChanged,
    ConfigReset,
    /// `PluginContext::emit`
    Custom,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PluginDiscovered => "plugin_discovered",
            Self::DiscoveryFailed => "discovery_failed",
            Self::PluginInstalled => "plugin_installed",
            Self::PluginUninstalled => "plugin_uninstalled",
            Self::PluginEnabled => "plugin_enabled",
            Self::PluginDisabled => "plugin_disabled",
            Self::CapabilityRegistered => "capability_registered",
            Self::CapabilityUnregistered => "capability_unregistered",
            Self::ConfigChanged => "config_changed",
            Self::ConfigReset => "config_reset",
            Self::Custom => "custom",
        }
    }

    /// 설치 상태를 바꾸는 이벤트인지
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            Self::PluginInstalled | Self::PluginUninstalled | Self::PluginEnabled | Self::PluginDisabled
        )
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 이벤트 리스너
///
/// 발행 호출 안에서 순서대로 실행되므로 오래 걸리는 작업은 직접 spawn해야 합니다.
#[async_trait]
pub trait PluginEventHandler: Send + Sync {
    fn name(&self) -> &str;

    /// 기본: 모든 이벤트
    fn accepts(&self, _event_type: EventType) -> bool {
        true
    }

    async fn handle(&self, event: &PluginEvent);
}

/// 이벤트 버스
pub struct EventBus {
    sender: broadcast::Sender<PluginEvent>,
    listeners: RwLock<BTreeMap<String, Arc<dyn PluginEventHandler>>>,
    recent: RwLock<VecDeque<PluginEvent>>,
    history_limit: usize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY, DEFAULT_HISTORY)
    }

    /// `history_limit`이 0이면 히스토리를 남기지 않음
    pub fn with_capacity(channel_capacity: usize, history_limit: usize) -> Self {
        let (sender, _) = broadcast::channel(channel_capacity.max(1));
        Self {
            sender,
            listeners: RwLock::new(BTreeMap::new()),
            recent: RwLock::new(VecDeque::with_capacity(history_limit)),
            history_limit,
        }
    }

    /// 같은 이름의 리스너는 교체
    pub async fn register_handler(&self, handler: Arc<dyn PluginEventHandler>) {
        let name = handler.name().to_string();
        debug!("Registered event listener {}", name);
        self.listeners.write().await.insert(name, handler);
    }

    pub async fn unregister_handler(&self, name: &str) -> bool {
        self.listeners.write().await.remove(name).is_some()
    }

    pub async fn handler_count(&self) -> usize {
        self.listeners.read().await.len()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PluginEvent> {
        self.sender.subscribe()
    }

    pub async fn publish(&self, event: PluginEvent) {
        debug!(
            "Event {} ({}) from {}",
            event.event_type,
            event.plugin.as_deref().unwrap_or("system"),
            event.source
        );

        if self.history_limit > 0 {
            let mut recent = self.recent.write().await;
            while recent.len() >= self.history_limit {
                recent.pop_front();
            }
            recent.push_back(event.clone());
        }

        // 리스너가 다시 publish할 수 있으므로 락을 잡은 채로 호출하지 않음
        let listeners: Vec<Arc<dyn PluginEventHandler>> = self
            .listeners
            .read()
            .await
            .values()
            .filter(|l| l.accepts(event.event_type))
            .cloned()
            .collect();
        for listener in listeners {
            listener.handle(&event).await;
        }

        // 수신자가 없으면 Err
        let _ = self.sender.send(event);
    }

    /// 오래된 것부터
    pub async fn history(&self) -> Vec<PluginEvent> {
        self.recent.read().await.iter().cloned().collect()
    }

    pub async fn history_by_type(&self, event_type: EventType) -> Vec<PluginEvent> {
        self.filter_history(|e| e.event_type == event_type).await
    }

    pub async fn history_for_plugin(&self, plugin: &str) -> Vec<PluginEvent> {
        self.filter_history(|e| e.is_about(plugin)).await
    }

    pub async fn clear_history(&self) {
        self.recent.write().await.clear();
    }

    async fn filter_history(&self, keep: impl Fn(&PluginEvent) -> bool) -> Vec<PluginEvent> {
        self.recent
            .read()
            .await
            .iter()
            .filter(|e| keep(e))
            .cloned()
            .collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// 라이프사이클 이벤트만 기록
    #[derive(Default)]
    struct AuditTrail {
        lines: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PluginEventHandler for AuditTrail {
        fn name(&self) -> &str {
            "audit"
        }

        fn accepts(&self, event_type: EventType) -> bool {
            event_type.is_lifecycle()
        }

        async fn handle(&self, event: &PluginEvent) {
            self.lines.lock().push(format!(
                "{}:{}",
                event.event_type,
                event.plugin.as_deref().unwrap_or("-")
            ));
        }
    }

    #[tokio::test]
    async fn test_listener_filters_by_type() {
        let bus = EventBus::new();
        let audit = Arc::new(AuditTrail::default());
        bus.register_handler(audit.clone()).await;

        bus.publish(PluginEvent::for_plugin(
            EventType::PluginInstalled,
            "aliyun-sms",
            Value::Null,
            "test",
        ))
        .await;
        bus.publish(PluginEvent::for_plugin(
            EventType::ConfigChanged,
            "aliyun-sms",
            serde_json::json!({ "keys": ["sign_name"] }),
            "test",
        ))
        .await;

        assert_eq!(*audit.lines.lock(), vec!["plugin_installed:aliyun-sms"]);
        assert_eq!(bus.history_for_plugin("aliyun-sms").await.len(), 2);

        assert!(bus.unregister_handler("audit").await);
        assert_eq!(bus.handler_count().await, 0);
    }

    #[tokio::test]
    async fn test_history_keeps_latest() {
        let bus = EventBus::with_capacity(8, 3);
        for plugin in ["a", "b", "c", "d", "e"] {
            bus.publish(PluginEvent::for_plugin(
                EventType::PluginEnabled,
                plugin,
                Value::Null,
                "test",
            ))
            .await;
        }

        let plugins: Vec<String> = bus
            .history()
            .await
            .into_iter()
            .filter_map(|e| e.plugin)
            .collect();
        assert_eq!(plugins, vec!["c", "d", "e"]);

        let silent = EventBus::with_capacity(8, 0);
        silent
            .publish(PluginEvent::new(EventType::Custom, Value::Null, "test"))
            .await;
        assert!(silent.history().await.is_empty());
    }

    #[tokio::test]
    async fn test_subscriber_receives_published_event() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();

        let event = PluginEvent::for_plugin(EventType::PluginDisabled, "oss", Value::Null, "test");
        let id = event.id;
        bus.publish(event).await;

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.id, id);
        assert!(received.is_about("oss"));
    }

    #[test]
    fn test_event_wire_format() {
        let event = PluginEvent::for_plugin(EventType::ConfigReset, "sms", Value::Null, "config");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "config_reset");
        assert_eq!(json["plugin"], "sms");
        assert!(json.get("occurredAt").is_some());
    }
}
