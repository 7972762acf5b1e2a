//! Capability Bridge - 플러그인 선언 -> 레지스트리 등록
//!
//! 선언 하나의 실패가 나머지 선언의 등록을 막지 않습니다 (부분 성공).

use super::driver::{DriverCatalog, DriverContext};
use super::registry::{self, ChannelRegistry};
use super::CapabilityInterface;
use agora_foundation::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

// ============================================================================
// CapabilityDeclaration
// ============================================================================

/// 플러그인이 선언하는 capability 등록 요청
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityDeclaration {
    /// 키의 마지막 부분 (`[a-z0-9_-]+`)
    #[serde(rename = "type")]
    pub capability_type: String,

    /// DriverCatalog에 등록된 클래스 이름
    pub driver_class: String,

    /// 표시 이름
    pub name: String,

    /// 드라이버가 구현한다고 주장하는 인터페이스
    pub interface: CapabilityInterface,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// 드라이버 생성 옵션
    #[serde(default)]
    pub options: Value,
}

impl CapabilityDeclaration {
    pub fn new(
        capability_type: impl Into<String>,
        driver_class: impl Into<String>,
        name: impl Into<String>,
        interface: CapabilityInterface,
    ) -> Self {
        Self {
            capability_type: capability_type.into(),
            driver_class: driver_class.into(),
            name: name.into(),
            interface,
            description: None,
            options: Value::Null,
        }
    }

    pub fn sms(
        capability_type: impl Into<String>,
        driver_class: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::new(
            capability_type,
            driver_class,
            name,
            CapabilityInterface::SmsChannelProvider,
        )
    }

    pub fn object_storage(
        capability_type: impl Into<String>,
        driver_class: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::new(
            capability_type,
            driver_class,
            name,
            CapabilityInterface::ObjectStorageProvider,
        )
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_options(mut self, options: Value) -> Self {
        self.options = options;
        self
    }

    /// 필수 필드와 type 형식 검증
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.capability_type.trim().is_empty() {
            missing.push("type");
        }
        if self.driver_class.trim().is_empty() {
            missing.push("driverClass");
        }
        if self.name.trim().is_empty() {
            missing.push("name");
        }
        if !missing.is_empty() {
            return Err(Error::Validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }

        let valid_type = self
            .capability_type
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
        if !valid_type {
            return Err(Error::Validation(format!(
                "Invalid capability type '{}' (expected [a-z0-9_-]+)",
                self.capability_type
            )));
        }

        Ok(())
    }
}

// ============================================================================
// Reports
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationFailure {
    #[serde(rename = "type")]
    pub capability_type: String,
    pub error: String,
}

/// 등록 결과 (부분 성공 허용)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationReport {
    pub registered: Vec<String>,
    pub failed: Vec<RegistrationFailure>,
}

impl RegistrationReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// 실패가 있으면 `PartialFailure`로 변환
    pub fn into_result(self) -> Result<Vec<String>> {
        if self.failed.is_empty() {
            Ok(self.registered)
        } else {
            Err(Error::PartialFailure {
                succeeded: self.registered,
                failed: self
                    .failed
                    .into_iter()
                    .map(|f| format!("{}: {}", f.capability_type, f.error))
                    .collect(),
            })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnregistrationFailure {
    pub key: String,
    pub error: String,
}

/// 해제 결과
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnregistrationReport {
    pub unregistered: Vec<String>,
    pub failed: Vec<UnregistrationFailure>,
}

impl UnregistrationReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

// ============================================================================
// CapabilityBridge
// ============================================================================

/// 플러그인 선언을 네임스페이스 키로 레지스트리에 등록/해제
pub struct CapabilityBridge {
    registry: Arc<ChannelRegistry>,
    drivers: Arc<DriverCatalog>,
}

impl CapabilityBridge {
    pub fn new(registry: Arc<ChannelRegistry>, drivers: Arc<DriverCatalog>) -> Self {
        Self { registry, drivers }
    }

    pub fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.registry
    }

    pub fn drivers(&self) -> &Arc<DriverCatalog> {
        &self.drivers
    }

    // ========================================================================
    // 등록
    // ========================================================================

    /// 플러그인의 선언들을 등록
    ///
    /// 선언 단위 실패는 `failed`에 모이고, 배치 자체가 잘못된 경우(빈 이름이나 `.`이 든
    /// 플러그인 이름, 배치 내 중복 type)만 `Err`를 반환합니다.
    pub fn register_plugin_channels(
        &self,
        plugin_name: &str,
        declarations: &[CapabilityDeclaration],
        settings: &HashMap<String, Value>,
    ) -> Result<RegistrationReport> {
        if plugin_name.trim().is_empty() {
            return Err(Error::Validation("Plugin name is empty".to_string()));
        }
        if plugin_name.contains('.') {
            return Err(Error::Validation(format!(
                "Plugin name '{}' must not contain '.'",
                plugin_name
            )));
        }

        let mut seen = HashSet::new();
        for decl in declarations {
            if !seen.insert(decl.capability_type.as_str()) {
                return Err(Error::Validation(format!(
                    "Plugin {} declares capability type '{}' more than once",
                    plugin_name, decl.capability_type
                )));
            }
        }

        let mut report = RegistrationReport::default();

        for decl in declarations {
            match self.register_one(plugin_name, decl, settings) {
                Ok(key) => report.registered.push(key),
                Err(e) => {
                    warn!(
                        "Failed to register capability {} for {}: {}",
                        decl.capability_type, plugin_name, e
                    );
                    report.failed.push(RegistrationFailure {
                        capability_type: decl.capability_type.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Plugin {}: {} capabilities registered, {} failed",
            plugin_name,
            report.registered.len(),
            report.failed.len()
        );
        Ok(report)
    }

    fn register_one(
        &self,
        plugin_name: &str,
        decl: &CapabilityDeclaration,
        settings: &HashMap<String, Value>,
    ) -> Result<String> {
        decl.validate()?;

        let interface = self.drivers.interface_of(&decl.driver_class).ok_or_else(|| {
            Error::NotFound(format!(
                "Driver class '{}' is not registered",
                decl.driver_class
            ))
        })?;
        if interface != decl.interface {
            return Err(Error::Validation(format!(
                "Driver class '{}' implements {}, not {}",
                decl.driver_class, interface, decl.interface
            )));
        }

        let ctx = DriverContext {
            plugin_name,
            channel_name: &decl.name,
            settings,
            options: &decl.options,
        };
        let handle = self.drivers.construct(&decl.driver_class, &ctx)?;

        if handle.interface() != decl.interface {
            return Err(Error::Validation(format!(
                "Driver '{}' produced a {} provider, expected {}",
                decl.driver_class,
                handle.interface(),
                decl.interface
            )));
        }

        let key = Self::channel_key(plugin_name, &decl.capability_type)?;
        self.registry
            .register_channel(&key, handle, Some(plugin_name))?;

        debug!("Registered {} via driver {}", key, decl.driver_class);
        Ok(key)
    }

    // ========================================================================
    // 해제
    // ========================================================================

    /// 플러그인 채널 해제
    ///
    /// `types`가 비어 있으면 플러그인 네임스페이스의 모든 키를 해제합니다.
    pub fn unregister_plugin_channels(
        &self,
        plugin_name: &str,
        types: &[String],
    ) -> UnregistrationReport {
        let mut report = UnregistrationReport::default();

        let keys: Vec<String> = if types.is_empty() {
            self.registry.keys_for_plugin(plugin_name)
        } else {
            let mut keys = Vec::with_capacity(types.len());
            for t in types {
                match Self::channel_key(plugin_name, t) {
                    Ok(key) => keys.push(key),
                    Err(e) => report.failed.push(UnregistrationFailure {
                        key: format!("{}{}.{}", registry::PLUGIN_KEY_PREFIX, plugin_name, t),
                        error: e.to_string(),
                    }),
                }
            }
            keys
        };

        for key in keys {
            match self.registry.unregister_channel(&key) {
                Some(_) => report.unregistered.push(key),
                None => report.failed.push(UnregistrationFailure {
                    key,
                    error: "not registered".to_string(),
                }),
            }
        }

        if !report.failed.is_empty() {
            warn!(
                "Plugin {}: {} channels could not be unregistered",
                plugin_name,
                report.failed.len()
            );
        }
        report
    }

    // ========================================================================
    // 키 헬퍼
    // ========================================================================

    pub fn channel_key(plugin_name: &str, capability_type: &str) -> Result<String> {
        registry::channel_key(plugin_name, capability_type)
    }

    pub fn is_plugin_channel(key: &str) -> bool {
        registry::is_plugin_channel(key)
    }

    pub fn extract_plugin_name(key: &str) -> Option<&str> {
        registry::extract_plugin_name(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{LogSmsChannel, MemoryObjectStorage, ProviderHandle};

    fn bridge() -> CapabilityBridge {
        let mut drivers = DriverCatalog::new();
        drivers
            .register("log.sms", CapabilityInterface::SmsChannelProvider, |_| {
                Ok(ProviderHandle::Sms(Arc::new(LogSmsChannel::new())))
            })
            .unwrap();
        drivers
            .register("memory.oss", CapabilityInterface::ObjectStorageProvider, |_| {
                Ok(ProviderHandle::ObjectStorage(Arc::new(
                    MemoryObjectStorage::new("mem://"),
                )))
            })
            .unwrap();

        let registry = Arc::new(ChannelRegistry::new());
        registry
            .register_builtin("sms", ProviderHandle::Sms(Arc::new(LogSmsChannel::new())))
            .unwrap();

        CapabilityBridge::new(registry, Arc::new(drivers))
    }

    #[test]
    fn test_partial_success() {
        let bridge = bridge();
        let decls = vec![
            CapabilityDeclaration::sms("sms", "log.sms", "Log SMS"),
            CapabilityDeclaration::sms("voice", "missing.driver", "Voice"),
        ];

        let report = bridge
            .register_plugin_channels("y", &decls, &HashMap::new())
            .unwrap();

        assert_eq!(report.registered, vec!["plugin.y.sms"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].capability_type, "voice");
        assert!(matches!(
            report.clone().into_result(),
            Err(Error::PartialFailure { .. })
        ));
    }

    #[test]
    fn test_same_type_from_two_plugins() {
        let bridge = bridge();
        let decls = vec![CapabilityDeclaration::sms("sms", "log.sms", "SMS")];

        bridge
            .register_plugin_channels("a", &decls, &HashMap::new())
            .unwrap();
        bridge
            .register_plugin_channels("b", &decls, &HashMap::new())
            .unwrap();

        let channels = bridge.registry().get_available_channels();
        assert!(channels.contains_key("plugin.a.sms"));
        assert!(channels.contains_key("plugin.b.sms"));
        // 내장 키는 그대로
        assert_eq!(
            bridge.registry().get_entry("sms").unwrap().source_plugin,
            None
        );
    }

    #[test]
    fn test_interface_mismatch_and_bad_type() {
        let bridge = bridge();
        let decls = vec![
            CapabilityDeclaration::object_storage("files", "log.sms", "Files"),
            CapabilityDeclaration::sms("Bad.Type", "log.sms", "Bad"),
            CapabilityDeclaration::sms("", "log.sms", "Empty"),
        ];

        let report = bridge
            .register_plugin_channels("z", &decls, &HashMap::new())
            .unwrap();
        assert!(report.registered.is_empty());
        assert_eq!(report.failed.len(), 3);
    }

    #[test]
    fn test_duplicate_types_refuse_batch() {
        let bridge = bridge();
        let decls = vec![
            CapabilityDeclaration::sms("sms", "log.sms", "One"),
            CapabilityDeclaration::sms("sms", "log.sms", "Two"),
        ];
        assert!(bridge
            .register_plugin_channels("dup", &decls, &HashMap::new())
            .is_err());
        assert!(bridge.registry().keys_for_plugin("dup").is_empty());
    }

    #[test]
    fn test_unregister_all_is_exhaustive() {
        let bridge = bridge();
        let decls = vec![
            CapabilityDeclaration::sms("sms", "log.sms", "SMS"),
            CapabilityDeclaration::object_storage("oss", "memory.oss", "OSS"),
        ];
        bridge
            .register_plugin_channels("x", &decls, &HashMap::new())
            .unwrap();

        bridge
            .register_plugin_channels("xy", &decls, &HashMap::new())
            .unwrap();

        let report = bridge.unregister_plugin_channels("x", &[]);
        assert_eq!(report.unregistered.len(), 2);
        assert!(report.is_complete());
        assert!(bridge
            .registry()
            .get_available_channels()
            .keys()
            .all(|k| !k.starts_with("plugin.x.")));
        assert_eq!(bridge.registry().keys_for_plugin("xy").len(), 2);
        assert!(bridge.registry().contains("sms"));
    }

    #[test]
    fn test_dotted_plugin_name_cannot_share_namespace() {
        let bridge = bridge();
        let decls = vec![CapabilityDeclaration::sms("sms", "log.sms", "SMS")];

        bridge
            .register_plugin_channels("a", &decls, &HashMap::new())
            .unwrap();
        assert!(bridge
            .register_plugin_channels("a.b", &decls, &HashMap::new())
            .is_err());
        // 직접 등록해도 `plugin.a.` 아래로 들어갈 수 없음
        assert!(bridge
            .registry()
            .register_channel(
                "plugin.a.b.sms",
                ProviderHandle::Sms(Arc::new(LogSmsChannel::new())),
                Some("a.b"),
            )
            .is_err());

        bridge.unregister_plugin_channels("a", &[]);
        assert!(bridge
            .registry()
            .get_available_channels()
            .keys()
            .all(|k| !k.starts_with("plugin.a.")));
    }

    #[test]
    fn test_unregister_explicit_missing_type() {
        let bridge = bridge();
        let report = bridge.unregister_plugin_channels("x", &["sms".to_string()]);
        assert!(report.unregistered.is_empty());
        assert_eq!(report.failed[0].key, "plugin.x.sms");
    }
}
