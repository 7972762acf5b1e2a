//! Security Check - 설치/활성화 전 플러그인 검증
//!
//! 에러가 하나라도 있으면 `valid == false`이고 설치/활성화가 거부됩니다.
//! 경고는 보고만 합니다.

use super::catalog::EntryCatalog;
use super::manifest::{PluginDescriptor, PluginVersion};
use super::registry::PluginRegistry;
use super::traits::Plugin;
use crate::capability::{CapabilityInterface, DriverCatalog};
use agora_foundation::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// 보안 검사 결과
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl SecurityReport {
    fn error(&mut self, message: String) {
        self.errors.push(message);
    }

    fn warning(&mut self, message: String) {
        self.warnings.push(message);
    }

    /// 유효하지 않으면 `SecurityCheckFailed`
    pub fn into_result(self, plugin: &str) -> Result<SecurityReport> {
        if self.valid {
            Ok(self)
        } else {
            Err(Error::security_check_failed(plugin, self.errors))
        }
    }
}

/// 보안 검사기
pub struct SecurityChecker {
    entries: Arc<EntryCatalog>,
    drivers: Arc<DriverCatalog>,
    registry: Arc<PluginRegistry>,
}

impl SecurityChecker {
    pub fn new(
        entries: Arc<EntryCatalog>,
        drivers: Arc<DriverCatalog>,
        registry: Arc<PluginRegistry>,
    ) -> Self {
        Self {
            entries,
            drivers,
            registry,
        }
    }

    /// 발견된 플러그인 검사 (발견되지 않았으면 `NotFound`)
    pub async fn check(&self, name: &str) -> Result<SecurityReport> {
        let entry = self
            .registry
            .get_entry(name)
            .await
            .ok_or_else(|| Error::NotFound(format!("Plugin {} is not discovered", name)))?;

        let mut report = self.check_plugin(entry.descriptor(), entry.instance.as_ref());

        for missing in self.registry.check_requirements(entry.descriptor()).await {
            report.warning(format!("Requirement '{}' is not discovered", missing));
        }

        if !report.valid {
            warn!(
                "Security check failed for {}: {}",
                name,
                report.errors.join("; ")
            );
        } else {
            debug!(
                "Security check passed for {} ({} warnings)",
                name,
                report.warnings.len()
            );
        }
        Ok(report)
    }

    /// 디스크립터와 인스턴스 검사
    pub fn check_plugin(&self, descriptor: &PluginDescriptor, instance: &dyn Plugin) -> SecurityReport {
        let mut report = SecurityReport::default();

        if !self.entries.contains(&descriptor.entry) {
            report.error(format!(
                "Entry class '{}' is not registered",
                descriptor.entry
            ));
        }

        if instance.name() != descriptor.name {
            report.error(format!(
                "Entry reports name '{}' but manifest declares '{}'",
                instance.name(),
                descriptor.name
            ));
        }

        match (
            PluginVersion::parse(instance.version()),
            descriptor.parsed_version(),
        ) {
            (Some(actual), Some(declared)) if actual != declared => {
                report.warning(format!(
                    "Entry version {} differs from manifest version {}",
                    actual, declared
                ));
            }
            (_, None) => report.warning(format!(
                "Manifest version '{}' is not a semantic version",
                descriptor.version
            )),
            _ => {}
        }

        for capability in &descriptor.capabilities {
            if CapabilityInterface::parse(capability).is_none() {
                report.warning(format!("Unknown capability '{}'", capability));
            }
        }

        let declared = descriptor.declared_interfaces();
        match instance.as_capability_provider() {
            None if !declared.is_empty() => {
                report.error(format!(
                    "Manifest declares {} but the entry provides no capabilities",
                    declared
                        .iter()
                        .map(|i| i.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ));
            }
            None => {}
            Some(provider) => match provider.capabilities() {
                Err(e) => report.error(format!("Failed to list capabilities: {}", e)),
                Ok(declarations) => {
                    for decl in declarations {
                        if let Err(e) = decl.validate() {
                            report.warning(format!(
                                "Malformed capability declaration '{}': {}",
                                decl.capability_type, e
                            ));
                            continue;
                        }

                        match self.drivers.interface_of(&decl.driver_class) {
                            None => report.warning(format!(
                                "Driver class '{}' for '{}' is not registered",
                                decl.driver_class, decl.capability_type
                            )),
                            Some(interface) if interface != decl.interface => {
                                report.error(format!(
                                    "Driver class '{}' implements {}, not {}",
                                    decl.driver_class, interface, decl.interface
                                ));
                            }
                            Some(_) => {}
                        }

                        if !declared.contains(&decl.interface) {
                            report.warning(format!(
                                "Capability '{}' uses {} which the manifest does not declare",
                                decl.capability_type, decl.interface
                            ));
                        }
                    }
                }
            },
        }

        report.valid = report.errors.is_empty();
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{
        CapabilityDeclaration, LogSmsChannel, MemoryObjectStorage, ProviderHandle,
    };
    use crate::plugin::traits::CapabilityProvider;
    use std::any::Any;

    struct Provider {
        name: &'static str,
        declarations: Vec<CapabilityDeclaration>,
    }

    impl Plugin for Provider {
        fn name(&self) -> &str {
            self.name
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

    impl CapabilityProvider for Provider {
        fn capabilities(&self) -> Result<Vec<CapabilityDeclaration>> {
            Ok(self.declarations.clone())
        }
    }

    fn checker() -> SecurityChecker {
        let mut entries = EntryCatalog::new();
        entries
            .register("sms.Plugin", || Err(Error::Plugin("unused".into())))
            .unwrap();

        let mut drivers = DriverCatalog::new();
        drivers
            .register("log.sms", CapabilityInterface::SmsChannelProvider, |_| {
                Ok(ProviderHandle::Sms(Arc::new(LogSmsChannel::new())))
            })
            .unwrap();
        drivers
            .register(
                "memory.oss",
                CapabilityInterface::ObjectStorageProvider,
                |_| {
                    Ok(ProviderHandle::ObjectStorage(Arc::new(
                        MemoryObjectStorage::new("memory://"),
                    )))
                },
            )
            .unwrap();

        SecurityChecker::new(
            Arc::new(entries),
            Arc::new(drivers),
            Arc::new(PluginRegistry::new()),
        )
    }

    fn descriptor() -> PluginDescriptor {
        PluginDescriptor::new("sms", "1.0.0", "sms.Plugin").with_capability("sms_channel_provider")
    }

    #[test]
    fn test_valid_plugin() {
        let plugin = Provider {
            name: "sms",
            declarations: vec![CapabilityDeclaration::sms("sms", "log.sms", "SMS")],
        };

        let report = checker().check_plugin(&descriptor(), &plugin);
        assert!(report.valid, "{:?}", report.errors);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_interface_mismatch_is_error() {
        let plugin = Provider {
            name: "sms",
            declarations: vec![CapabilityDeclaration::sms("sms", "memory.oss", "SMS")],
        };

        let report = checker().check_plugin(&descriptor(), &plugin);
        assert!(!report.valid);
        assert!(report.errors[0].contains("memory.oss"));
        assert!(report.clone().into_result("sms").is_err());
    }

    #[test]
    fn test_missing_driver_is_warning() {
        let plugin = Provider {
            name: "sms",
            declarations: vec![
                CapabilityDeclaration::sms("sms", "log.sms", "SMS"),
                CapabilityDeclaration::sms("backup", "missing.sms", "Backup"),
            ],
        };

        let report = checker().check_plugin(&descriptor(), &plugin);
        assert!(report.valid);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_name_and_entry_mismatch() {
        let plugin = Provider {
            name: "other",
            declarations: vec![],
        };
        let descriptor = PluginDescriptor::new("sms", "1.0.0", "unknown.Plugin");

        let report = checker().check_plugin(&descriptor, &plugin);
        assert_eq!(report.errors.len(), 2);
    }

    #[tokio::test]
    async fn test_undiscovered_is_not_found() {
        assert!(matches!(
            checker().check("ghost").await,
            Err(Error::NotFound(_))
        ));
    }
}
