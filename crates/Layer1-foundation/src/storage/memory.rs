//! In-memory record store
//!
//! SQLite 없이 동작하는 `RecordStore` 구현. 테스트와 `storage.in_memory` 실행에 사용.
//! 마이그레이션 문은 실행하지 않고 적용 기록만 남깁니다.

use super::records::{
    AppliedMigration, ConfigEntry, DiscoveryRecord, InstallationRecord, SchemaMigration,
};
use super::RecordStore;
use crate::{Error, Result};
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Default)]
struct Tables {
    discoveries: BTreeMap<String, DiscoveryRecord>,
    installations: BTreeMap<String, InstallationRecord>,
    migrations: Vec<AppliedMigration>,
    configs: BTreeMap<(String, String), ConfigEntry>,
}

/// 인메모리 레코드 저장소
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryStore {
    fn upsert_discovery(&self, record: &DiscoveryRecord) -> Result<()> {
        self.tables
            .write()
            .discoveries
            .insert(record.plugin_name.clone(), record.clone());
        Ok(())
    }

    fn find_discovery(&self, plugin_name: &str) -> Result<Option<DiscoveryRecord>> {
        Ok(self.tables.read().discoveries.get(plugin_name).cloned())
    }

    fn list_discoveries(&self) -> Result<Vec<DiscoveryRecord>> {
        Ok(self.tables.read().discoveries.values().cloned().collect())
    }

    fn remove_discovery(&self, plugin_name: &str) -> Result<bool> {
        Ok(self.tables.write().discoveries.remove(plugin_name).is_some())
    }

    fn clear_discoveries(&self) -> Result<usize> {
        let mut tables = self.tables.write();
        let removed = tables.discoveries.len();
        tables.discoveries.clear();
        Ok(removed)
    }

    fn upsert_installation(&self, record: &InstallationRecord) -> Result<()> {
        if !record.is_consistent() {
            return Err(Error::Validation(format!(
                "Plugin {} cannot be enabled while not installed",
                record.plugin_name
            )));
        }

        self.tables
            .write()
            .installations
            .insert(record.plugin_name.clone(), record.clone());
        Ok(())
    }

    fn find_installation(&self, plugin_name: &str) -> Result<Option<InstallationRecord>> {
        Ok(self.tables.read().installations.get(plugin_name).cloned())
    }

    fn list_installations(&self) -> Result<Vec<InstallationRecord>> {
        Ok(self.tables.read().installations.values().cloned().collect())
    }

    fn applied_migrations(&self, plugin_name: &str) -> Result<Vec<AppliedMigration>> {
        Ok(self
            .tables
            .read()
            .migrations
            .iter()
            .filter(|m| m.plugin_name == plugin_name)
            .cloned()
            .collect())
    }

    fn apply_migration(&self, plugin_name: &str, migration: &SchemaMigration) -> Result<()> {
        let mut tables = self.tables.write();

        let exists = tables
            .migrations
            .iter()
            .any(|m| m.plugin_name == plugin_name && m.migration_id == migration.id);
        if exists {
            return Err(Error::Storage(format!(
                "Migration {} already applied for {}",
                migration.id, plugin_name
            )));
        }

        tables.migrations.push(AppliedMigration {
            plugin_name: plugin_name.to_string(),
            migration_id: migration.id.clone(),
            applied_at: Utc::now(),
        });
        Ok(())
    }

    fn upsert_config_entry(&self, entry: &ConfigEntry) -> Result<()> {
        self.tables.write().configs.insert(
            (entry.plugin_name.clone(), entry.key.clone()),
            entry.clone(),
        );
        Ok(())
    }

    fn find_config_entry(&self, plugin_name: &str, key: &str) -> Result<Option<ConfigEntry>> {
        Ok(self
            .tables
            .read()
            .configs
            .get(&(plugin_name.to_string(), key.to_string()))
            .cloned())
    }

    fn list_config_entries(&self, plugin_name: &str) -> Result<Vec<ConfigEntry>> {
        let mut entries: Vec<ConfigEntry> = self
            .tables
            .read()
            .configs
            .values()
            .filter(|e| e.plugin_name == plugin_name)
            .cloned()
            .collect();

        entries.sort_by(|a, b| {
            a.group
                .cmp(&b.group)
                .then(a.order.cmp(&b.order))
                .then_with(|| a.key.cmp(&b.key))
        });
        Ok(entries)
    }

    fn update_config_value(&self, plugin_name: &str, key: &str, value: &Value) -> Result<bool> {
        let mut tables = self.tables.write();
        match tables
            .configs
            .get_mut(&(plugin_name.to_string(), key.to_string()))
        {
            Some(entry) => {
                entry.value = value.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn reset_config_values(&self, plugin_name: &str) -> Result<usize> {
        let mut tables = self.tables.write();
        let mut count = 0;
        for entry in tables
            .configs
            .values_mut()
            .filter(|e| e.plugin_name == plugin_name)
        {
            entry.value = entry.default.clone();
            count += 1;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_inconsistent_installation() {
        let store = MemoryStore::new();
        let mut record = InstallationRecord::installed("sms", "1.0.0");
        record.installed = false;
        record.enabled = true;

        assert!(matches!(
            store.upsert_installation(&record),
            Err(Error::Validation(_))
        ));
        assert!(store.list_installations().unwrap().is_empty());
    }

    #[test]
    fn test_migration_recorded_once() {
        let store = MemoryStore::new();
        let migration = SchemaMigration::new("0001", "CREATE TABLE t (id INTEGER);");

        store.apply_migration("sms", &migration).unwrap();
        assert!(store.apply_migration("sms", &migration).is_err());
        assert!(store.apply_migration("oss", &migration).is_ok());

        assert_eq!(store.applied_migrations("sms").unwrap().len(), 1);
    }
}
