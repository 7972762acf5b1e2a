//! Agora Config - 통합 설정
//!
//! 글로벌(`~/.config/agora/config.json`)과 프로젝트(`.agora/config.json`)를
//! 병합해서 로드합니다. 나중 계층이 우선합니다.

use crate::storage::JsonStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use tracing::debug;

/// 설정 파일명
pub const AGORA_CONFIG_FILE: &str = "config.json";

// ============================================================================
// Agora Config (통합)
// ============================================================================

/// Agora 통합 설정
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgoraConfig {
    /// 버전 (마이그레이션용)
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub plugins: PluginsConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AgoraConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Load / Save
    // ========================================================================

    /// 글로벌 + 프로젝트 병합 로드
    pub fn load() -> Result<Self> {
        let global = JsonStore::global().ok();
        let project = JsonStore::current_project().ok();
        Self::load_layers(global.as_ref().into_iter().chain(project.as_ref()))
    }

    /// 주어진 저장소들을 순서대로 병합 (뒤쪽이 우선)
    pub fn load_layers<'a>(stores: impl IntoIterator<Item = &'a JsonStore>) -> Result<Self> {
        let mut merged = Value::Object(Default::default());

        for store in stores {
            if let Some(layer) = store.load_value(AGORA_CONFIG_FILE)? {
                debug!("Merging config layer from {}", store.base_dir().display());
                merge_values(&mut merged, layer);
            }
        }

        serde_json::from_value(merged)
            .map_err(|e| Error::Config(format!("Invalid configuration: {}", e)))
    }

    /// 글로벌 설정 저장
    pub fn save_global(&self) -> Result<()> {
        JsonStore::global()?.save(AGORA_CONFIG_FILE, self)
    }

    /// 프로젝트 설정 저장
    pub fn save_project(&self) -> Result<()> {
        JsonStore::current_project()?.save(AGORA_CONFIG_FILE, self)
    }

    // ========================================================================
    // Builder
    // ========================================================================

    pub fn search_path(mut self, path: impl Into<PathBuf>, scope: PluginScope) -> Self {
        self.plugins.search_paths.push(SearchPathConfig {
            path: path.into(),
            scope,
        });
        self
    }

    pub fn in_memory_storage(mut self) -> Self {
        self.storage.in_memory = true;
        self
    }

    pub fn uninstall_policy(mut self, policy: UninstallPolicy) -> Self {
        self.plugins.uninstall_policy = policy;
        self
    }
}

/// JSON 값 깊은 병합 (객체는 재귀, 그 외는 overlay로 교체)
pub fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

// ============================================================================
// Plugins Config
// ============================================================================

/// 플러그인 스코프 (우선순위: Local > Project > User)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginScope {
    User,
    Project,
    Local,
}

impl PluginScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Project => "project",
            Self::Local => "local",
        }
    }

    /// 높을수록 우선
    pub fn priority(&self) -> u8 {
        match self {
            Self::User => 0,
            Self::Project => 1,
            Self::Local => 2,
        }
    }
}

impl std::fmt::Display for PluginScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 활성화된 플러그인을 제거할 때의 정책
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UninstallPolicy {
    /// 먼저 비활성화 후 제거
    #[default]
    ForceDisable,
    /// 활성화 상태면 거부
    RequireDisabled,
}

/// 플러그인 검색 경로
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPathConfig {
    pub path: PathBuf,
    pub scope: PluginScope,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginsConfig {
    #[serde(default = "default_search_paths")]
    pub search_paths: Vec<SearchPathConfig>,

    #[serde(default)]
    pub uninstall_policy: UninstallPolicy,

    /// 시작 시 설치 레코드로 채널 레지스트리 재구성
    #[serde(default = "default_true")]
    pub reconcile_on_start: bool,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            search_paths: default_search_paths(),
            uninstall_policy: UninstallPolicy::default(),
            reconcile_on_start: true,
        }
    }
}

// ============================================================================
// Storage Config
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// 비어 있으면 플랫폼 데이터 디렉토리 (예: ~/.local/share/agora)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    #[serde(default = "default_database_file")]
    pub database_file: String,

    #[serde(default)]
    pub in_memory: bool,
}

impl StorageConfig {
    pub fn resolved_data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::data_dir()
                .map(|d| d.join("agora"))
                .ok_or_else(|| Error::Config("Cannot find data directory".to_string())),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            database_file: default_database_file(),
            in_memory: false,
        }
    }
}

// ============================================================================
// Logging Config
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    /// tracing EnvFilter 지시자 (예: "info", "agora_core=debug")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

// ============================================================================
// Defaults
// ============================================================================

fn default_version() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_database_file() -> String {
    "agora.db".to_string()
}

fn default_search_paths() -> Vec<SearchPathConfig> {
    let mut paths = vec![SearchPathConfig {
        path: PathBuf::from(".agora").join("plugins"),
        scope: PluginScope::Project,
    }];

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(SearchPathConfig {
            path: config_dir.join("agora").join("plugins"),
            scope: PluginScope::User,
        });
    }

    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = AgoraConfig::default();
        assert_eq!(config.plugins.uninstall_policy, UninstallPolicy::ForceDisable);
        assert!(config.plugins.reconcile_on_start);
        assert_eq!(config.storage.database_file, "agora.db");
        assert!(!config.storage.in_memory);
    }

    #[test]
    fn test_project_layer_wins() {
        let global_dir = TempDir::new().unwrap();
        let project_dir = TempDir::new().unwrap();

        let global = JsonStore::new(global_dir.path());
        let project = JsonStore::new(project_dir.path());

        global
            .save(
                AGORA_CONFIG_FILE,
                &json!({
                    "logging": {"level": "warn"},
                    "storage": {"databaseFile": "global.db"}
                }),
            )
            .unwrap();
        project
            .save(
                AGORA_CONFIG_FILE,
                &json!({
                    "logging": {"level": "debug"},
                    "plugins": {"uninstallPolicy": "require_disabled"}
                }),
            )
            .unwrap();

        let config = AgoraConfig::load_layers([&global, &project]).unwrap();
        assert_eq!(config.logging.level.as_deref(), Some("debug"));
        assert_eq!(config.storage.database_file, "global.db");
        assert_eq!(
            config.plugins.uninstall_policy,
            UninstallPolicy::RequireDisabled
        );
    }

    #[test]
    fn test_missing_layers_yield_defaults() {
        let empty = TempDir::new().unwrap();
        let store = JsonStore::new(empty.path().join("nothing"));
        let config = AgoraConfig::load_layers([&store]).unwrap();
        assert_eq!(config.plugins, PluginsConfig::default());
    }

    #[test]
    fn test_scope_priority() {
        assert!(PluginScope::Local.priority() > PluginScope::Project.priority());
        assert!(PluginScope::Project.priority() > PluginScope::User.priority());
    }
}
