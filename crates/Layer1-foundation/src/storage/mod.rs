//! Storage module for Agora
//!
//! - `db`: SQLite - 플러그인 레코드 (디스커버리, 설치 상태, 설정, 마이그레이션)
//! - `memory`: 인메모리 레코드 저장소 (테스트/임시 실행)
//! - `json`: JSON - 범용 파일 저장/로드

mod db;
mod json;
mod memory;
mod records;

use serde_json::Value;

// SQLite Storage
pub use db::Storage;

// In-memory Storage
pub use memory::MemoryStore;

// JSON Storage (범용)
pub use json::JsonStore;

// Records
pub use records::{
    AppliedMigration, ConfigEntry, ConfigFieldType, ConfigValidation, DiscoveryRecord,
    InstallationRecord, SchemaMigration,
};

use crate::Result;

/// 영속성 협력자 - 플러그인 레코드 저장소
///
/// 스키마 세부사항은 구현체의 관심사입니다.
/// 모든 upsert는 키(플러그인 이름, 또는 플러그인 이름 + 설정 키)에 대해 멱등입니다.
pub trait RecordStore: Send + Sync {
    // ------------------------------------------------------------------------
    // Discovery
    // ------------------------------------------------------------------------

    fn upsert_discovery(&self, record: &DiscoveryRecord) -> Result<()>;

    fn find_discovery(&self, plugin_name: &str) -> Result<Option<DiscoveryRecord>>;

    fn list_discoveries(&self) -> Result<Vec<DiscoveryRecord>>;

    /// 디스커버리 레코드 하나 삭제, 있었으면 true
    fn remove_discovery(&self, plugin_name: &str) -> Result<bool>;

    /// 모든 디스커버리 레코드 삭제, 삭제된 개수 반환
    fn clear_discoveries(&self) -> Result<usize>;

    // ------------------------------------------------------------------------
    // Installation
    // ------------------------------------------------------------------------

    /// 설치 레코드 upsert
    ///
    /// `enabled ⇒ installed` 불변식을 위반하는 레코드는 거부해야 합니다.
    fn upsert_installation(&self, record: &InstallationRecord) -> Result<()>;

    fn find_installation(&self, plugin_name: &str) -> Result<Option<InstallationRecord>>;

    fn list_installations(&self) -> Result<Vec<InstallationRecord>>;

    // ------------------------------------------------------------------------
    // Migrations
    // ------------------------------------------------------------------------

    fn applied_migrations(&self, plugin_name: &str) -> Result<Vec<AppliedMigration>>;

    /// 마이그레이션 실행 및 기록 (원자적)
    fn apply_migration(&self, plugin_name: &str, migration: &SchemaMigration) -> Result<()>;

    // ------------------------------------------------------------------------
    // Config
    // ------------------------------------------------------------------------

    fn upsert_config_entry(&self, entry: &ConfigEntry) -> Result<()>;

    fn find_config_entry(&self, plugin_name: &str, key: &str) -> Result<Option<ConfigEntry>>;

    /// 플러그인의 설정 항목 (group, order 순)
    fn list_config_entries(&self, plugin_name: &str) -> Result<Vec<ConfigEntry>>;

    /// 값만 갱신, 항목이 없으면 `false`
    fn update_config_value(&self, plugin_name: &str, key: &str, value: &Value) -> Result<bool>;

    /// 모든 항목의 value를 default로 되돌림 (원자적), 갱신된 개수 반환
    fn reset_config_values(&self, plugin_name: &str) -> Result<usize>;
}
