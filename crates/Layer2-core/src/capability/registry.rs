//! Channel Registry - 네임스페이스 키 -> 프로바이더
//!
//! 프로세스 전역 상태지만 전역 변수가 아니라 `Arc<ChannelRegistry>`로 주입됩니다.
//! 쓰기는 브리지(플러그인 라이프사이클)와 내장 등록만, 소비자는 `ChannelReader`로 읽기만 합니다.

use super::sms::SmsChannel;
use super::storage::ObjectStorage;
use super::{CapabilityInterface, ProviderHandle};
use agora_foundation::{Error, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 플러그인 제공 키 접두사
pub const PLUGIN_KEY_PREFIX: &str = "plugin.";

/// 플러그인 채널 키 생성: `plugin.<plugin>.<type>`
///
/// 두 부분 모두 `.`이 없어야 합니다. 아니면 `Validation`.
pub fn channel_key(plugin_name: &str, capability_type: &str) -> Result<String> {
    let is_segment = |s: &str| !s.trim().is_empty() && !s.contains('.');
    if !is_segment(plugin_name) || !is_segment(capability_type) {
        return Err(Error::Validation(format!(
            "Cannot build channel key from '{}' and '{}'",
            plugin_name, capability_type
        )));
    }
    Ok(format!("{}{}.{}", PLUGIN_KEY_PREFIX, plugin_name, capability_type))
}

/// 플러그인 제공 키인지
pub fn is_plugin_channel(key: &str) -> bool {
    extract_plugin_name(key).is_some()
}

/// 키에서 플러그인 이름 추출
///
/// 접두사 뒤가 정확히 `<plugin>.<type>` 두 부분일 때만 `Some`.
pub fn extract_plugin_name(key: &str) -> Option<&str> {
    let rest = key.strip_prefix(PLUGIN_KEY_PREFIX)?;
    let (plugin, capability_type) = rest.split_once('.')?;
    if plugin.is_empty() || capability_type.is_empty() || capability_type.contains('.') {
        return None;
    }
    Some(plugin)
}

// ============================================================================
// ChannelEntry / ChannelInfo
// ============================================================================

/// 레지스트리 항목
#[derive(Debug, Clone)]
pub struct ChannelEntry {
    pub key: String,
    pub handle: ProviderHandle,
    /// 내장이면 `None`
    pub source_plugin: Option<String>,
    pub registered_at: DateTime<Utc>,
}

/// 표시용 채널 정보
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelInfo {
    pub key: String,
    pub interface: CapabilityInterface,
    pub provider: String,
    pub source_plugin: Option<String>,
    pub registered_at: DateTime<Utc>,
}

// ============================================================================
// ChannelRegistry
// ============================================================================

/// 채널 레지스트리
#[derive(Default)]
pub struct ChannelRegistry {
    entries: RwLock<BTreeMap<String, ChannelEntry>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 읽기 전용 뷰
    pub fn reader(self: &Arc<Self>) -> ChannelReader {
        ChannelReader {
            inner: Arc::clone(self),
        }
    }

    // ========================================================================
    // 등록 / 해제
    // ========================================================================

    /// 내장 프로바이더 등록 (bare key)
    pub fn register_builtin(&self, capability_type: &str, handle: ProviderHandle) -> Result<()> {
        if capability_type.starts_with(PLUGIN_KEY_PREFIX) {
            return Err(Error::Validation(format!(
                "Built-in channel key '{}' must not use the '{}' namespace",
                capability_type, PLUGIN_KEY_PREFIX
            )));
        }
        self.register_channel(capability_type, handle, None)
    }

    /// 채널 등록
    ///
    /// 다른 소스가 소유한 키 위에 등록하면 거부합니다. 같은 소스면 교체합니다.
    pub fn register_channel(
        &self,
        key: &str,
        handle: ProviderHandle,
        source_plugin: Option<&str>,
    ) -> Result<()> {
        if key.trim().is_empty() {
            return Err(Error::Validation("Channel key is empty".to_string()));
        }

        match source_plugin {
            Some(plugin) if extract_plugin_name(key) != Some(plugin) => {
                return Err(Error::Validation(format!(
                    "Channel key '{}' is outside the namespace of plugin {}",
                    key, plugin
                )));
            }
            None if key.starts_with(PLUGIN_KEY_PREFIX) => {
                return Err(Error::Validation(format!(
                    "Channel key '{}' is reserved for plugins",
                    key
                )));
            }
            _ => {}
        }

        let mut entries = self.entries.write();

        if let Some(existing) = entries.get(key) {
            if existing.source_plugin.as_deref() != source_plugin {
                return Err(Error::Capability(format!(
                    "Channel key '{}' is already owned by {}",
                    key,
                    existing.source_plugin.as_deref().unwrap_or("built-in")
                )));
            }
            debug!("Replacing channel {}", key);
        }

        entries.insert(
            key.to_string(),
            ChannelEntry {
                key: key.to_string(),
                handle,
                source_plugin: source_plugin.map(str::to_string),
                registered_at: Utc::now(),
            },
        );

        info!(
            "Registered channel {} ({})",
            key,
            source_plugin.unwrap_or("built-in")
        );
        Ok(())
    }

    /// 채널 해제
    pub fn unregister_channel(&self, key: &str) -> Option<ChannelEntry> {
        let removed = self.entries.write().remove(key);
        match &removed {
            Some(_) => info!("Unregistered channel {}", key),
            None => warn!("Channel {} was not registered", key),
        }
        removed
    }

    // ========================================================================
    // 조회
    // ========================================================================

    pub fn get_channel(&self, key: &str) -> Option<ProviderHandle> {
        self.entries.read().get(key).map(|e| e.handle.clone())
    }

    pub fn get_entry(&self, key: &str) -> Option<ChannelEntry> {
        self.entries.read().get(key).cloned()
    }

    pub fn get_sms_channel(&self, key: &str) -> Option<Arc<dyn SmsChannel>> {
        self.get_channel(key).and_then(|h| h.as_sms())
    }

    pub fn get_object_storage(&self, key: &str) -> Option<Arc<dyn ObjectStorage>> {
        self.get_channel(key).and_then(|h| h.as_object_storage())
    }

    pub fn get_available_channels(&self) -> BTreeMap<String, ProviderHandle> {
        self.entries
            .read()
            .iter()
            .map(|(k, e)| (k.clone(), e.handle.clone()))
            .collect()
    }

    pub fn describe(&self) -> Vec<ChannelInfo> {
        self.entries
            .read()
            .values()
            .map(|e| ChannelInfo {
                key: e.key.clone(),
                interface: e.handle.interface(),
                provider: e.handle.provider_name().to_string(),
                source_plugin: e.source_plugin.clone(),
                registered_at: e.registered_at,
            })
            .collect()
    }

    /// 플러그인이 소유한 모든 키 (소스 또는 키 네임스페이스 기준)
    pub fn keys_for_plugin(&self, plugin_name: &str) -> Vec<String> {
        self.entries
            .read()
            .values()
            .filter(|e| {
                e.source_plugin.as_deref() == Some(plugin_name)
                    || extract_plugin_name(&e.key) == Some(plugin_name)
            })
            .map(|e| e.key.clone())
            .collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

// ============================================================================
// ChannelReader
// ============================================================================

/// 소비자용 읽기 전용 뷰
#[derive(Clone)]
pub struct ChannelReader {
    inner: Arc<ChannelRegistry>,
}

impl ChannelReader {
    pub fn get_channel(&self, key: &str) -> Option<ProviderHandle> {
        self.inner.get_channel(key)
    }

    pub fn get_sms_channel(&self, key: &str) -> Option<Arc<dyn SmsChannel>> {
        self.inner.get_sms_channel(key)
    }

    pub fn get_object_storage(&self, key: &str) -> Option<Arc<dyn ObjectStorage>> {
        self.inner.get_object_storage(key)
    }

    pub fn get_available_channels(&self) -> BTreeMap<String, ProviderHandle> {
        self.inner.get_available_channels()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains(key)
    }
}
