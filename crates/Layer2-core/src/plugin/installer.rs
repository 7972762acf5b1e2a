//! Plugin Installer - 설치/제거
//!
//! 설치 순서: 보안 검사 → 스키마 마이그레이션 → 설정 시드 → `on_install` → 레코드.
//! 레코드 갱신 전 단계가 실패하면 설치 레코드는 바뀌지 않습니다.

use super::config::ConfigSchemaStore;
use super::events::{EventBus, EventType, PluginEvent};
use super::registry::{PluginRegistry, RegisteredPlugin};
use super::security::SecurityChecker;
use super::store::InstallationStore;
use super::traits::PluginContext;
use agora_foundation::{Error, RecordStore, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

const EVENT_SOURCE: &str = "plugin_installer";

/// 설치 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallOutcome {
    pub plugin: String,
    pub version: String,
    /// 이미 설치되어 있어서 아무것도 실행하지 않음
    pub already_installed: bool,
    pub migrations_applied: usize,
    /// 새로 만든 설정 항목 수
    pub config_seeded: usize,
}

/// 제거 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UninstallOutcome {
    pub plugin: String,
    /// `on_uninstall` 실패 메시지 (제거는 진행됨)
    pub script_error: Option<String>,
    /// 제거 전에 비활성화했는지
    #[serde(default)]
    pub disabled_first: bool,
}

pub struct PluginInstaller {
    registry: Arc<PluginRegistry>,
    checker: Arc<SecurityChecker>,
    installs: Arc<InstallationStore>,
    configs: Arc<ConfigSchemaStore>,
    event_bus: Arc<EventBus>,
}

impl PluginInstaller {
    pub fn new(
        registry: Arc<PluginRegistry>,
        checker: Arc<SecurityChecker>,
        installs: Arc<InstallationStore>,
        configs: Arc<ConfigSchemaStore>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            registry,
            checker,
            installs,
            configs,
            event_bus,
        }
    }

    /// 플러그인 설치 (이미 설치되어 있으면 멱등 성공)
    pub async fn install_plugin(&self, name: &str) -> Result<InstallOutcome> {
        let plugin = self
            .registry
            .get_entry(name)
            .await
            .ok_or_else(|| Error::NotFound(format!("Plugin {} is not discovered", name)))?;
        let version = plugin.descriptor().version.clone();

        self.checker.check(name).await?.into_result(name)?;

        if self.installs.is_installed(name)? {
            info!("Plugin {} is already installed", name);
            return Ok(InstallOutcome {
                plugin: name.to_string(),
                version,
                already_installed: true,
                migrations_applied: 0,
                config_seeded: 0,
            });
        }

        info!("Installing plugin: {} (v{})", name, version);

        let migrations_applied = self.apply_migrations(&plugin)?;
        let config_seeded = self
            .configs
            .seed_from_schema(name, &plugin.descriptor().config)?;

        if let Some(installable) = plugin.instance.as_installable() {
            let ctx = self.context(&plugin)?;
            installable
                .on_install(&ctx)
                .await
                .map_err(|e| Error::lifecycle_hook(name, "on_install", e.to_string()))?;
        }

        self.installs.mark_installed(name, &version)?;

        self.event_bus
            .publish(PluginEvent::for_plugin(
                EventType::PluginInstalled,
                name,
                serde_json::json!({
                    "version": version,
                    "migrationsApplied": migrations_applied,
                }),
                EVENT_SOURCE,
            ))
            .await;

        info!("Installed plugin: {}", name);
        Ok(InstallOutcome {
            plugin: name.to_string(),
            version,
            already_installed: false,
            migrations_applied,
            config_seeded,
        })
    }

    /// 플러그인 제거
    ///
    /// 활성화 상태면 `InvalidState`. 테이블과 설정 항목은 남겨 둡니다.
    pub async fn uninstall(&self, name: &str) -> Result<UninstallOutcome> {
        let record = self
            .installs
            .get(name)?
            .ok_or_else(|| Error::NotFound(format!("Plugin {} has no installation record", name)))?;

        if !record.installed {
            return Err(Error::InvalidState(format!("Plugin {} is not installed", name)));
        }
        if record.enabled {
            return Err(Error::InvalidState(format!(
                "Plugin {} must be disabled before uninstall",
                name
            )));
        }

        let mut script_error = None;
        match self.registry.get_entry(name).await {
            Some(plugin) => {
                if let Some(installable) = plugin.instance.as_installable() {
                    let result = match self.context(&plugin) {
                        Ok(ctx) => installable.on_uninstall(&ctx).await,
                        Err(e) => Err(e),
                    };
                    if let Err(e) = result {
                        warn!("Uninstall script failed for {}: {}", name, e);
                        script_error = Some(e.to_string());
                    }
                }
            }
            None => warn!(
                "Plugin {} is not discovered, skipping uninstall script",
                name
            ),
        }

        self.installs.mark_uninstalled(name)?;

        self.event_bus
            .publish(PluginEvent::for_plugin(
                EventType::PluginUninstalled,
                name,
                serde_json::json!({ "scriptError": script_error }),
                EVENT_SOURCE,
            ))
            .await;

        info!("Uninstalled plugin: {}", name);
        Ok(UninstallOutcome {
            plugin: name.to_string(),
            script_error,
            disabled_first: false,
        })
    }

    /// 아직 적용되지 않은 마이그레이션을 선언 순서대로 적용
    fn apply_migrations(&self, plugin: &RegisteredPlugin) -> Result<usize> {
        let Some(installable) = plugin.instance.as_installable() else {
            return Ok(0);
        };

        let name = &plugin.descriptor().name;
        let records = self.installs.records();
        let applied: HashSet<String> = records
            .applied_migrations(name)?
            .into_iter()
            .map(|m| m.migration_id)
            .collect();

        let mut count = 0;
        for migration in installable.migrations() {
            if applied.contains(&migration.id) {
                continue;
            }
            records.apply_migration(name, &migration)?;
            info!("Applied migration {} for {}", migration.id, name);
            count += 1;
        }
        Ok(count)
    }

    fn context(&self, plugin: &RegisteredPlugin) -> Result<PluginContext> {
        let name = &plugin.descriptor().name;
        Ok(PluginContext::new(
            name.clone(),
            plugin.discovered.path.clone(),
            self.configs.settings(name)?,
            Arc::clone(&self.event_bus),
        ))
    }
}
