//! Plugin Manager - 플러그인 라이프사이클 관리
//!
//! 상태 전이: `unknown → discovered → installed → enabled ⇄ disabled → uninstalled → installed …`
//!
//! - 설치 레코드가 진실의 원천이고, 채널 레지스트리는 `reconcile`로 다시 만들 수 있습니다.
//! - 같은 플러그인 이름에 대한 호출은 `PluginLocks`로 직렬화됩니다.

use super::catalog::EntryCatalog;
use super::config::{ConfigGroup, ConfigSchemaStore, ConfigUpdateReport};
use super::discovery::{DiscoveryReport, DiscoveryStatus, PluginDiscovery};
use super::events::{EventBus, EventType, PluginEvent};
use super::installer::{InstallOutcome, PluginInstaller, UninstallOutcome};
use super::locks::PluginLocks;
use super::manifest::PluginDescriptor;
use super::registry::{PluginRegistry, RegisteredPlugin};
use super::security::{SecurityChecker, SecurityReport};
use super::store::InstallationStore;
use super::traits::PluginContext;
use crate::capability::{
    CapabilityBridge, ChannelRegistry, DriverCatalog, RegistrationReport, UnregistrationReport,
};
use agora_foundation::{
    Error, InstallationRecord, PluginScope, PluginsConfig, RecordStore, Result, UninstallPolicy,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const EVENT_SOURCE: &str = "plugin_manager";

// ============================================================================
// PluginState
// ============================================================================

/// 레코드와 디스커버리 결과에서 파생되는 플러그인 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginState {
    Unknown,
    Discovered,
    Installed,
    Enabled,
    Disabled,
    Uninstalled,
}

impl PluginState {
    pub fn derive(discovered: bool, record: Option<&InstallationRecord>) -> Self {
        match record {
            None if discovered => Self::Discovered,
            None => Self::Unknown,
            Some(r) if r.enabled => Self::Enabled,
            Some(r) if r.installed && r.disabled_at.is_some() => Self::Disabled,
            Some(r) if r.installed => Self::Installed,
            Some(_) => Self::Uninstalled,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Discovered => "discovered",
            Self::Installed => "installed",
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
            Self::Uninstalled => "uninstalled",
        }
    }
}

impl std::fmt::Display for PluginState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Outcomes
// ============================================================================

/// 플러그인 목록 항목
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginSummary {
    pub name: String,
    pub state: PluginState,
    pub descriptor: Option<PluginDescriptor>,
    pub path: Option<PathBuf>,
    pub scope: Option<PluginScope>,
    pub record: Option<InstallationRecord>,
    /// 현재 레지스트리에 있는 이 플러그인의 키
    pub channels: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnableOutcome {
    pub plugin: String,
    pub state: PluginState,
    pub registration: RegistrationReport,
    pub already_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisableOutcome {
    pub plugin: String,
    pub state: PluginState,
    pub unregistration: UnregistrationReport,
    /// `on_disable` 실패 메시지 (비활성화는 진행됨)
    pub hook_error: Option<String>,
    pub already_disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileFailure {
    pub plugin: String,
    pub error: String,
}

/// 레지스트리 재구성 결과
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub registered: Vec<String>,
    pub removed: Vec<String>,
    pub failed: Vec<ReconcileFailure>,
}

/// 매니저 요약
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerSummary {
    pub discovered: usize,
    pub installed: usize,
    pub enabled: usize,
    pub channels: usize,
    pub plugin_channels: usize,
}

// ============================================================================
// PluginManager
// ============================================================================

/// 플러그인 매니저 - 전체 플러그인 시스템 관리
pub struct PluginManager {
    config: PluginsConfig,
    event_bus: Arc<EventBus>,
    plugins: Arc<PluginRegistry>,
    bridge: CapabilityBridge,
    discovery: PluginDiscovery,
    checker: Arc<SecurityChecker>,
    installs: Arc<InstallationStore>,
    configs: Arc<ConfigSchemaStore>,
    installer: PluginInstaller,
    locks: PluginLocks,
}

impl PluginManager {
    /// 새 매니저 생성
    ///
    /// `channels`는 코어 서비스와 공유하는 레지스트리입니다.
    pub fn new(
        config: PluginsConfig,
        records: Arc<dyn RecordStore>,
        entries: Arc<EntryCatalog>,
        drivers: Arc<DriverCatalog>,
        channels: Arc<ChannelRegistry>,
    ) -> Self {
        Self::with_event_bus(
            config,
            records,
            entries,
            drivers,
            channels,
            Arc::new(EventBus::new()),
        )
    }

    pub fn with_event_bus(
        config: PluginsConfig,
        records: Arc<dyn RecordStore>,
        entries: Arc<EntryCatalog>,
        drivers: Arc<DriverCatalog>,
        channels: Arc<ChannelRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let plugins = Arc::new(PluginRegistry::new());
        let checker = Arc::new(SecurityChecker::new(
            Arc::clone(&entries),
            Arc::clone(&drivers),
            Arc::clone(&plugins),
        ));
        let installs = Arc::new(InstallationStore::new(Arc::clone(&records)));
        let configs = Arc::new(ConfigSchemaStore::new(
            Arc::clone(&records),
            Arc::clone(&event_bus),
        ));

        let discovery = PluginDiscovery::new(
            config.search_paths.clone(),
            entries,
            Arc::clone(&plugins),
            records,
            Arc::clone(&event_bus),
        );
        let installer = PluginInstaller::new(
            Arc::clone(&plugins),
            Arc::clone(&checker),
            Arc::clone(&installs),
            Arc::clone(&configs),
            Arc::clone(&event_bus),
        );

        Self {
            config,
            event_bus,
            plugins,
            bridge: CapabilityBridge::new(channels, drivers),
            discovery,
            checker,
            installs,
            configs,
            installer,
            locks: PluginLocks::new(),
        }
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn channels(&self) -> &Arc<ChannelRegistry> {
        self.bridge.registry()
    }

    pub fn plugin_registry(&self) -> &Arc<PluginRegistry> {
        &self.plugins
    }

    pub fn installations(&self) -> &Arc<InstallationStore> {
        &self.installs
    }

    pub fn configs(&self) -> &Arc<ConfigSchemaStore> {
        &self.configs
    }

    /// 시작 시 디스커버리 (+ 설정에 따라 레지스트리 재구성)
    pub async fn initialize(&self) -> Result<DiscoveryReport> {
        let report = self.discover().await;
        if self.config.reconcile_on_start {
            let reconciled = self.reconcile().await?;
            info!(
                "Reconciled {} channels on start ({} removed, {} failed)",
                reconciled.registered.len(),
                reconciled.removed.len(),
                reconciled.failed.len()
            );
        }
        Ok(report)
    }

    // ========================================================================
    // 디스커버리
    // ========================================================================

    pub async fn discover(&self) -> DiscoveryReport {
        self.discovery.discover_all().await
    }

    pub async fn discover_one(&self, name: &str) -> Result<PluginDescriptor> {
        self.discovery.discover_one(name).await
    }

    pub async fn refresh(&self) -> Result<DiscoveryReport> {
        self.discovery.force_refresh().await
    }

    pub fn clear_discovery_records(&self) -> Result<bool> {
        self.discovery.clear_discovery_records()
    }

    pub fn discovery_status(&self) -> DiscoveryStatus {
        self.discovery.status()
    }

    // ========================================================================
    // 조회
    // ========================================================================

    /// 발견되었거나 레코드가 있는 모든 플러그인 (이름순)
    pub async fn get_plugin_list(&self) -> Result<Vec<PluginSummary>> {
        let mut discovered: BTreeMap<String, RegisteredPlugin> = self
            .plugins
            .list()
            .await
            .into_iter()
            .map(|p| (p.descriptor().name.clone(), p))
            .collect();

        let mut records: BTreeMap<String, InstallationRecord> = self
            .installs
            .list()?
            .into_iter()
            .map(|r| (r.plugin_name.clone(), r))
            .collect();

        let mut names: Vec<String> = discovered.keys().chain(records.keys()).cloned().collect();
        names.sort();
        names.dedup();

        Ok(names
            .into_iter()
            .map(|name| {
                let plugin = discovered.remove(&name);
                let record = records.remove(&name);
                PluginSummary {
                    state: PluginState::derive(plugin.is_some(), record.as_ref()),
                    channels: self.channels().keys_for_plugin(&name),
                    path: plugin.as_ref().map(|p| p.discovered.path.clone()),
                    scope: plugin.as_ref().map(|p| p.discovered.scope),
                    descriptor: plugin.map(|p| p.discovered.descriptor),
                    record,
                    name,
                }
            })
            .collect())
    }

    pub async fn get_plugin(&self, name: &str) -> Result<PluginSummary> {
        self.get_plugin_list()
            .await?
            .into_iter()
            .find(|p| p.name == name)
            .ok_or_else(|| Error::NotFound(format!("Plugin {} is not known", name)))
    }

    pub async fn plugin_state(&self, name: &str) -> Result<PluginState> {
        let discovered = self.plugins.contains(name).await;
        Ok(PluginState::derive(discovered, self.installs.get(name)?.as_ref()))
    }

    pub async fn perform_security_check(&self, name: &str) -> Result<SecurityReport> {
        self.checker.check(name).await
    }

    pub async fn summary(&self) -> Result<ManagerSummary> {
        let records = self.installs.list()?;
        let channels = self.channels().describe();

        Ok(ManagerSummary {
            discovered: self.plugins.len().await,
            installed: records.iter().filter(|r| r.installed).count(),
            enabled: records.iter().filter(|r| r.enabled).count(),
            plugin_channels: channels.iter().filter(|c| c.source_plugin.is_some()).count(),
            channels: channels.len(),
        })
    }

    // ========================================================================
    // 설치 / 제거
    // ========================================================================

    pub async fn install_plugin(&self, name: &str) -> Result<InstallOutcome> {
        let _guard = self.locks.acquire(name).await;
        self.installer.install_plugin(name).await
    }

    /// 플러그인 제거 (활성화 상태면 정책에 따라 먼저 비활성화)
    pub async fn uninstall_plugin(&self, name: &str) -> Result<UninstallOutcome> {
        let _guard = self.locks.acquire(name).await;

        let record = self
            .installs
            .get(name)?
            .ok_or_else(|| Error::NotFound(format!("Plugin {} has no installation record", name)))?;

        let mut disabled_first = false;
        if record.enabled {
            match self.config.uninstall_policy {
                UninstallPolicy::RequireDisabled => {
                    return Err(Error::InvalidState(format!(
                        "Plugin {} is enabled; disable it before uninstalling",
                        name
                    )));
                }
                UninstallPolicy::ForceDisable => {
                    info!("Disabling {} before uninstall", name);
                    self.disable_locked(name).await?;
                    disabled_first = true;
                }
            }
        }

        let mut outcome = self.installer.uninstall(name).await?;
        outcome.disabled_first = disabled_first;
        Ok(outcome)
    }

    // ========================================================================
    // 활성화 / 비활성화
    // ========================================================================

    /// 플러그인 활성화
    ///
    /// 보안 검사 → `on_enable` → capability 등록 → 레코드 갱신.
    /// 등록 이후 단계가 실패하면 등록을 되돌리고 레코드는 그대로 둡니다.
    pub async fn enable_plugin(&self, name: &str) -> Result<EnableOutcome> {
        let _guard = self.locks.acquire(name).await;

        let plugin = self
            .plugins
            .get_entry(name)
            .await
            .ok_or_else(|| Error::NotFound(format!("Plugin {} is not discovered", name)))?;

        let record = self
            .installs
            .get(name)?
            .filter(|r| r.installed)
            .ok_or_else(|| Error::InvalidState(format!("Plugin {} is not installed", name)))?;

        if record.enabled {
            debug!("Plugin {} is already enabled", name);
            return Ok(EnableOutcome {
                plugin: name.to_string(),
                state: PluginState::Enabled,
                registration: RegistrationReport {
                    registered: self.channels().keys_for_plugin(name),
                    failed: Vec::new(),
                },
                already_enabled: true,
            });
        }

        self.checker.check(name).await?.into_result(name)?;

        let settings = self.configs.settings(name)?;
        let ctx = self.context(&plugin, settings.clone());

        if let Some(enableable) = plugin.instance.as_enableable() {
            enableable
                .on_enable(&ctx)
                .await
                .map_err(|e| Error::lifecycle_hook(name, "on_enable", e.to_string()))?;
        }

        let registration = match self.register_capabilities(&plugin, &settings) {
            Ok(report) => report,
            Err(e) => {
                self.rollback_enable(&plugin, &ctx).await;
                return Err(e);
            }
        };

        if let Err(e) = self.installs.mark_enabled(name) {
            self.rollback_enable(&plugin, &ctx).await;
            return Err(e);
        }

        for key in &registration.registered {
            self.event_bus
                .publish(PluginEvent::for_plugin(
                    EventType::CapabilityRegistered,
                    name,
                    serde_json::json!({ "key": key }),
                    EVENT_SOURCE,
                ))
                .await;
        }
        self.event_bus
            .publish(PluginEvent::for_plugin(
                EventType::PluginEnabled,
                name,
                serde_json::to_value(&registration)?,
                EVENT_SOURCE,
            ))
            .await;

        info!(
            "Enabled plugin: {} ({} channels, {} failed)",
            name,
            registration.registered.len(),
            registration.failed.len()
        );
        Ok(EnableOutcome {
            plugin: name.to_string(),
            state: PluginState::Enabled,
            registration,
            already_enabled: false,
        })
    }

    /// 플러그인 비활성화
    ///
    /// 채널 해제 → `on_disable` → 레코드 갱신. 해제와 훅 실패는 막지 않습니다.
    pub async fn disable_plugin(&self, name: &str) -> Result<DisableOutcome> {
        let _guard = self.locks.acquire(name).await;
        self.disable_locked(name).await
    }

    async fn disable_locked(&self, name: &str) -> Result<DisableOutcome> {
        let record = self
            .installs
            .get(name)?
            .ok_or_else(|| Error::NotFound(format!("Plugin {} has no installation record", name)))?;

        // 비활성 상태여도 남은 키는 정리
        let unregistration = self.bridge.unregister_plugin_channels(name, &[]);
        for key in &unregistration.unregistered {
            self.event_bus
                .publish(PluginEvent::for_plugin(
                    EventType::CapabilityUnregistered,
                    name,
                    serde_json::json!({ "key": key }),
                    EVENT_SOURCE,
                ))
                .await;
        }

        if !record.enabled {
            debug!("Plugin {} is already disabled", name);
            let discovered = self.plugins.contains(name).await;
            return Ok(DisableOutcome {
                plugin: name.to_string(),
                state: PluginState::derive(discovered, Some(&record)),
                unregistration,
                hook_error: None,
                already_disabled: true,
            });
        }

        let mut hook_error = None;
        if let Some(plugin) = self.plugins.get_entry(name).await {
            if let Some(enableable) = plugin.instance.as_enableable() {
                let result = match self.configs.settings(name) {
                    Ok(settings) => enableable.on_disable(&self.context(&plugin, settings)).await,
                    Err(e) => Err(e),
                };
                if let Err(e) = result {
                    warn!("on_disable failed for {}: {}", name, e);
                    hook_error = Some(e.to_string());
                }
            }
        } else {
            warn!("Plugin {} is not discovered, skipping on_disable", name);
        }

        let record = self.installs.mark_disabled(name)?;

        self.event_bus
            .publish(PluginEvent::for_plugin(
                EventType::PluginDisabled,
                name,
                serde_json::json!({
                    "unregistered": unregistration.unregistered,
                    "hookError": hook_error,
                }),
                EVENT_SOURCE,
            ))
            .await;

        info!("Disabled plugin: {}", name);
        Ok(DisableOutcome {
            plugin: name.to_string(),
            state: PluginState::derive(true, Some(&record)),
            unregistration,
            hook_error,
            already_disabled: false,
        })
    }

    // ========================================================================
    // Reconcile
    // ========================================================================

    /// 설치 레코드로 채널 레지스트리 재구성 (훅은 실행하지 않음)
    ///
    /// 대상은 활성화 레코드의 플러그인과 레지스트리에 키가 남아 있는 플러그인입니다.
    /// 이름마다 락을 잡은 뒤 레코드를 다시 읽고 그 상태에 맞춰 등록하거나 해제합니다.
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let mut names: BTreeSet<String> = self
            .installs
            .list()?
            .into_iter()
            .filter(|r| r.enabled)
            .map(|r| r.plugin_name)
            .collect();
        names.extend(
            self.channels()
                .describe()
                .into_iter()
                .filter_map(|info| info.source_plugin),
        );

        let mut report = ReconcileReport::default();
        for name in &names {
            let _guard = self.locks.acquire(name).await;

            let enabled = match self.installs.get(name) {
                Ok(record) => record.is_some_and(|r| r.enabled),
                Err(e) => {
                    error!("Failed to read record of {}: {}", name, e);
                    report.failed.push(ReconcileFailure {
                        plugin: name.clone(),
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            if !enabled {
                let unregistration = self.bridge.unregister_plugin_channels(name, &[]);
                report.removed.extend(unregistration.unregistered);
                continue;
            }

            self.reconcile_enabled(name, &mut report).await;
        }

        Ok(report)
    }

    /// 락을 잡은 상태에서 호출
    async fn reconcile_enabled(&self, name: &str, report: &mut ReconcileReport) {
        let Some(plugin) = self.plugins.get_entry(name).await else {
            report.failed.push(ReconcileFailure {
                plugin: name.to_string(),
                error: "plugin is enabled but not discovered".to_string(),
            });
            return;
        };

        self.bridge.unregister_plugin_channels(name, &[]);

        let result = self
            .configs
            .settings(name)
            .and_then(|settings| self.register_capabilities(&plugin, &settings));
        match result {
            Ok(registration) => {
                report.registered.extend(registration.registered);
                report
                    .failed
                    .extend(registration.failed.into_iter().map(|f| ReconcileFailure {
                        plugin: name.to_string(),
                        error: format!("{}: {}", f.capability_type, f.error),
                    }));
            }
            Err(e) => {
                error!("Failed to reconcile {}: {}", name, e);
                report.failed.push(ReconcileFailure {
                    plugin: name.to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    // ========================================================================
    // 설정
    // ========================================================================

    pub fn get_plugin_configs(&self, name: &str) -> Result<Vec<ConfigGroup>> {
        self.configs.get_plugin_configs(name)
    }

    pub fn get_plugin_config_value(&self, name: &str, key: &str, default: Value) -> Value {
        self.configs.get_plugin_config_value(name, key, default)
    }

    pub async fn set_plugin_configs(
        &self,
        name: &str,
        values: &HashMap<String, Value>,
    ) -> Result<ConfigUpdateReport> {
        self.configs.set_plugin_configs(name, values).await
    }

    pub async fn reset_plugin_configs(&self, name: &str) -> Result<bool> {
        self.configs.reset_plugin_configs(name).await
    }

    // ========================================================================
    // 내부
    // ========================================================================

    fn register_capabilities(
        &self,
        plugin: &RegisteredPlugin,
        settings: &HashMap<String, Value>,
    ) -> Result<RegistrationReport> {
        let Some(provider) = plugin.instance.as_capability_provider() else {
            return Ok(RegistrationReport::default());
        };

        let declarations = provider.capabilities()?;
        self.bridge
            .register_plugin_channels(&plugin.descriptor().name, &declarations, settings)
    }

    /// 활성화 실패 시 되돌리기 (best effort)
    async fn rollback_enable(&self, plugin: &RegisteredPlugin, ctx: &PluginContext) {
        let name = &plugin.descriptor().name;
        warn!("Rolling back enable of {}", name);

        self.bridge.unregister_plugin_channels(name, &[]);
        if let Some(enableable) = plugin.instance.as_enableable() {
            if let Err(e) = enableable.on_disable(ctx).await {
                warn!("on_disable during rollback failed for {}: {}", name, e);
            }
        }
    }

    fn context(&self, plugin: &RegisteredPlugin, settings: HashMap<String, Value>) -> PluginContext {
        PluginContext::new(
            plugin.descriptor().name.clone(),
            plugin.discovered.path.clone(),
            settings,
            Arc::clone(&self.event_bus),
        )
    }
}
