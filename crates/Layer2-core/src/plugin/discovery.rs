//! Plugin Discovery - 플러그인 발견 및 로드
//!
//! 검색 경로(플러그인 루트 + 스코프)의 하위 디렉토리마다 `plugin.json` 또는
//! `plugin.toml`을 읽고 엔트리를 인스턴스화합니다. 한 플러그인의 실패는 스캔을
//! 중단하지 않습니다.

use super::catalog::EntryCatalog;
use super::events::{EventBus, EventType, PluginEvent};
use super::manifest::PluginDescriptor;
use super::registry::PluginRegistry;
use agora_foundation::{
    DiscoveryRecord, Error, PluginScope, RecordStore, Result, SearchPathConfig,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};

const EVENT_SOURCE: &str = "plugin_discovery";

// ============================================================================
// DiscoveredPlugin - 발견된 플러그인
// ============================================================================

/// 발견된 플러그인 정보
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredPlugin {
    pub descriptor: PluginDescriptor,

    /// 플러그인 디렉토리 경로
    pub path: PathBuf,

    /// 발견된 위치 (user, project, local)
    pub scope: PluginScope,
}

impl DiscoveredPlugin {
    fn to_record(&self) -> Result<DiscoveryRecord> {
        Ok(DiscoveryRecord {
            plugin_name: self.descriptor.name.clone(),
            version: self.descriptor.version.clone(),
            entry: self.descriptor.entry.clone(),
            path: self.path.to_string_lossy().into_owned(),
            scope: self.scope.as_str().to_string(),
            manifest: serde_json::to_value(&self.descriptor)?,
            discovered_at: Utc::now(),
        })
    }
}

// ============================================================================
// Reports
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryFailure {
    /// 플러그인 이름 (매니페스트를 읽지 못했으면 디렉토리 이름)
    pub name: String,
    pub error: String,
}

/// 디스커버리 스캔 결과
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryReport {
    pub registered: Vec<String>,
    pub failed: Vec<DiscoveryFailure>,
    /// 이번 스캔에서 사라져 레지스트리와 레코드에서 지운 이름
    #[serde(default)]
    pub pruned: Vec<String>,
}

impl DiscoveryReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// 실패가 있으면 `PartialFailure`
    pub fn into_result(self) -> Result<Vec<String>> {
        if self.failed.is_empty() {
            Ok(self.registered)
        } else {
            Err(Error::PartialFailure {
                succeeded: self.registered,
                failed: self.failed.into_iter().map(|f| f.name).collect(),
            })
        }
    }
}

/// 마지막 스캔 상태
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryStatus {
    pub last_scan_at: Option<DateTime<Utc>>,
    pub discovered: usize,
    pub failed: usize,
    pub search_paths: Vec<SearchPathConfig>,
}

#[derive(Debug, Clone, Copy)]
struct ScanStats {
    at: DateTime<Utc>,
    discovered: usize,
    failed: usize,
}

// ============================================================================
// PluginDiscovery - 플러그인 발견 시스템
// ============================================================================

/// 플러그인 발견 시스템
pub struct PluginDiscovery {
    search_paths: Vec<SearchPathConfig>,
    entries: Arc<EntryCatalog>,
    registry: Arc<PluginRegistry>,
    records: Arc<dyn RecordStore>,
    event_bus: Arc<EventBus>,
    last_scan: Mutex<Option<ScanStats>>,
}

impl PluginDiscovery {
    pub fn new(
        search_paths: Vec<SearchPathConfig>,
        entries: Arc<EntryCatalog>,
        registry: Arc<PluginRegistry>,
        records: Arc<dyn RecordStore>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            search_paths,
            entries,
            registry,
            records,
            event_bus,
            last_scan: Mutex::new(None),
        }
    }

    pub fn search_paths(&self) -> &[SearchPathConfig] {
        &self.search_paths
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    // ========================================================================
    // 플러그인 발견
    // ========================================================================

    /// 모든 검색 경로 스캔
    ///
    /// 성공한 플러그인마다 디스커버리 레코드와 `PluginRegistry`를 갱신합니다.
    /// 더 이상 보이지 않는 플러그인은 활성화 상태가 아니면 지웁니다.
    /// 같은 입력에 대해 멱등입니다.
    pub async fn discover_all(&self) -> DiscoveryReport {
        let (candidates, mut failed) = self.collect_candidates().await;
        let mut report = DiscoveryReport::default();

        let mut seen: BTreeSet<&str> = candidates.keys().map(String::as_str).collect();
        seen.extend(failed.iter().map(|f| f.name.as_str()));
        report.pruned = self.prune_missing(&seen).await;

        for (name, candidate) in candidates {
            match self.admit(candidate).await {
                Ok(()) => report.registered.push(name),
                Err(e) => {
                    warn!("Failed to load plugin {}: {}", name, e);
                    failed.push(DiscoveryFailure {
                        name,
                        error: e.to_string(),
                    });
                }
            }
        }

        for failure in &failed {
            self.event_bus
                .publish(PluginEvent::for_plugin(
                    EventType::DiscoveryFailed,
                    &failure.name,
                    serde_json::json!({ "error": failure.error }),
                    EVENT_SOURCE,
                ))
                .await;
        }
        report.failed = failed;

        *self.last_scan.lock() = Some(ScanStats {
            at: Utc::now(),
            discovered: report.registered.len(),
            failed: report.failed.len(),
        });

        info!(
            "Discovered {} plugins ({} failed)",
            report.registered.len(),
            report.failed.len()
        );
        report
    }

    /// 이름으로 플러그인 하나만 발견
    pub async fn discover_one(&self, name: &str) -> Result<PluginDescriptor> {
        let (mut candidates, failed) = self.collect_candidates().await;

        let candidate = match candidates.remove(name) {
            Some(candidate) => candidate,
            None => {
                let reason = failed
                    .into_iter()
                    .find(|f| f.name == name)
                    .map(|f| f.error)
                    .unwrap_or_else(|| "no manifest in any search path".to_string());
                return Err(Error::NotFound(format!("Plugin {}: {}", name, reason)));
            }
        };

        let descriptor = candidate.descriptor.clone();
        self.admit(candidate).await?;
        Ok(descriptor)
    }

    /// 디스커버리 레코드 전체 삭제, 삭제된 레코드가 있었는지 반환
    pub fn clear_discovery_records(&self) -> Result<bool> {
        let removed = self.records.clear_discoveries()?;
        info!("Cleared {} discovery records", removed);
        Ok(removed > 0)
    }

    /// 레코드와 레지스트리를 비우고 전체 재발견
    pub async fn force_refresh(&self) -> Result<DiscoveryReport> {
        self.clear_discovery_records()?;
        self.registry.clear().await;
        Ok(self.discover_all().await)
    }

    pub fn status(&self) -> DiscoveryStatus {
        let last = *self.last_scan.lock();
        DiscoveryStatus {
            last_scan_at: last.map(|s| s.at),
            discovered: last.map(|s| s.discovered).unwrap_or(0),
            failed: last.map(|s| s.failed).unwrap_or(0),
            search_paths: self.search_paths.clone(),
        }
    }

    // ========================================================================
    // 내부
    // ========================================================================

    /// `seen`에 없는 이전 스캔 결과 정리 (활성화된 플러그인은 유지)
    async fn prune_missing(&self, seen: &BTreeSet<&str>) -> Vec<String> {
        let mut known: BTreeSet<String> = self.registry.names().await.into_iter().collect();
        match self.records.list_discoveries() {
            Ok(records) => known.extend(records.into_iter().map(|r| r.plugin_name)),
            Err(e) => warn!("Failed to list discovery records: {}", e),
        }

        let mut pruned = Vec::new();
        for name in known {
            if seen.contains(name.as_str()) {
                continue;
            }

            match self.records.find_installation(&name) {
                Ok(Some(record)) if record.enabled => {
                    warn!("Plugin {} is enabled but no longer found on disk", name);
                    continue;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Failed to read installation of {}: {}", name, e);
                    continue;
                }
            }

            if let Err(e) = self.records.remove_discovery(&name) {
                warn!("Failed to remove discovery record of {}: {}", name, e);
                continue;
            }
            self.registry.remove(&name).await;
            info!("Pruned plugin {} (no longer found)", name);
            pruned.push(name);
        }
        pruned
    }

    /// 매니페스트 파싱까지 마친 후보 (이름당 가장 높은 스코프)
    async fn collect_candidates(
        &self,
    ) -> (BTreeMap<String, DiscoveredPlugin>, Vec<DiscoveryFailure>) {
        let mut candidates: BTreeMap<String, DiscoveredPlugin> = BTreeMap::new();
        let mut failed = Vec::new();

        for search_path in &self.search_paths {
            if !fs::try_exists(&search_path.path).await.unwrap_or(false) {
                debug!("Skipping missing plugin root {:?}", search_path.path);
                continue;
            }

            let found = match scan_plugin_root(&search_path.path, search_path.scope).await {
                Ok(found) => found,
                Err(e) => {
                    warn!("Failed to scan plugin directory {:?}: {}", search_path.path, e);
                    continue;
                }
            };

            for result in found {
                let plugin = match result {
                    Ok(plugin) => plugin,
                    Err(failure) => {
                        failed.push(failure);
                        continue;
                    }
                };

                let name = plugin.descriptor.name.clone();
                match candidates.get(&name) {
                    Some(existing) if existing.scope.priority() >= plugin.scope.priority() => {
                        info!(
                            "Plugin {} at {:?} is shadowed by {:?} ({})",
                            name, plugin.path, existing.path, existing.scope
                        );
                    }
                    Some(existing) => {
                        info!(
                            "Plugin {} at {:?} is shadowed by {:?} ({})",
                            name, existing.path, plugin.path, plugin.scope
                        );
                        candidates.insert(name, plugin);
                    }
                    None => {
                        candidates.insert(name, plugin);
                    }
                }
            }
        }

        (candidates, failed)
    }

    /// 엔트리 인스턴스화, 레코드 저장, 레지스트리 등록
    async fn admit(&self, plugin: DiscoveredPlugin) -> Result<()> {
        let instance = self.entries.instantiate(&plugin.descriptor.entry)?;
        self.records.upsert_discovery(&plugin.to_record()?)?;

        let name = plugin.descriptor.name.clone();
        let data = serde_json::json!({
            "version": plugin.descriptor.version,
            "path": plugin.path,
            "scope": plugin.scope,
        });
        self.registry.register(plugin, instance).await;

        self.event_bus
            .publish(PluginEvent::for_plugin(
                EventType::PluginDiscovered,
                name,
                data,
                EVENT_SOURCE,
            ))
            .await;
        Ok(())
    }
}

/// 플러그인 루트의 하위 디렉토리 스캔 (이름순)
async fn scan_plugin_root(
    dir: &Path,
    scope: PluginScope,
) -> Result<Vec<std::result::Result<DiscoveredPlugin, DiscoveryFailure>>> {
    let mut dirs = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();

    let mut found = Vec::new();
    for path in dirs {
        let dir_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        match PluginDescriptor::load_from_dir(&path).await {
            Ok(Some(descriptor)) => {
                debug!("Found plugin: {} at {:?}", descriptor.name, path);
                found.push(Ok(DiscoveredPlugin {
                    descriptor,
                    path,
                    scope,
                }));
            }
            Ok(None) => debug!("No manifest in {:?}", path),
            Err(e) => {
                warn!("Failed to parse plugin manifest in {:?}: {}", path, e);
                found.push(Err(DiscoveryFailure {
                    name: dir_name,
                    error: e.to_string(),
                }));
            }
        }
    }

    Ok(found)
}
