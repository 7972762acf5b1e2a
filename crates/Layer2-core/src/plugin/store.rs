//! Installation Store - 설치 레코드 라이프사이클
//!
//! `RecordStore` 위에서 설치 상태 전이를 담당합니다. 모든 전이는
//! `enabled ⇒ installed` 불변식을 유지합니다.

use agora_foundation::{Error, InstallationRecord, RecordStore, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

/// 설치 레코드 저장소
pub struct InstallationStore {
    records: Arc<dyn RecordStore>,
}

impl InstallationStore {
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &Arc<dyn RecordStore> {
        &self.records
    }

    pub fn get(&self, plugin_name: &str) -> Result<Option<InstallationRecord>> {
        self.records.find_installation(plugin_name)
    }

    pub fn list(&self) -> Result<Vec<InstallationRecord>> {
        self.records.list_installations()
    }

    pub fn is_installed(&self, plugin_name: &str) -> Result<bool> {
        Ok(self.get(plugin_name)?.map(|r| r.installed).unwrap_or(false))
    }

    pub fn is_enabled(&self, plugin_name: &str) -> Result<bool> {
        Ok(self.get(plugin_name)?.map(|r| r.enabled).unwrap_or(false))
    }

    /// 설치 완료 기록 (재설치면 기존 레코드 갱신)
    pub fn mark_installed(&self, plugin_name: &str, version: &str) -> Result<InstallationRecord> {
        let now = Utc::now();
        let record = match self.get(plugin_name)? {
            Some(mut record) => {
                record.version = version.to_string();
                record.installed = true;
                record.enabled = false;
                record.installed_at = Some(now);
                record.enabled_at = None;
                record.disabled_at = None;
                record.uninstalled_at = None;
                record.updated_at = now;
                record
            }
            None => InstallationRecord::installed(plugin_name, version),
        };

        self.records.upsert_installation(&record)?;
        debug!("Marked {} installed (v{})", plugin_name, version);
        Ok(record)
    }

    /// 활성화 기록 (설치되지 않았으면 `InvalidState`)
    pub fn mark_enabled(&self, plugin_name: &str) -> Result<InstallationRecord> {
        let mut record = self
            .get(plugin_name)?
            .filter(|r| r.installed)
            .ok_or_else(|| {
                Error::InvalidState(format!("Plugin {} is not installed", plugin_name))
            })?;

        let now = Utc::now();
        record.enabled = true;
        record.enabled_at = Some(now);
        record.updated_at = now;

        self.records.upsert_installation(&record)?;
        debug!("Marked {} enabled", plugin_name);
        Ok(record)
    }

    pub fn mark_disabled(&self, plugin_name: &str) -> Result<InstallationRecord> {
        let mut record = self
            .get(plugin_name)?
            .ok_or_else(|| Error::NotFound(format!("Plugin {} has no record", plugin_name)))?;

        let now = Utc::now();
        record.enabled = false;
        record.disabled_at = Some(now);
        record.updated_at = now;

        self.records.upsert_installation(&record)?;
        debug!("Marked {} disabled", plugin_name);
        Ok(record)
    }

    /// 제거 기록 (installed, enabled 모두 false)
    pub fn mark_uninstalled(&self, plugin_name: &str) -> Result<InstallationRecord> {
        let mut record = self
            .get(plugin_name)?
            .ok_or_else(|| Error::NotFound(format!("Plugin {} has no record", plugin_name)))?;

        let now = Utc::now();
        record.installed = false;
        record.enabled = false;
        record.uninstalled_at = Some(now);
        record.disabled_at = Some(now);
        record.updated_at = now;

        self.records.upsert_installation(&record)?;
        debug!("Marked {} uninstalled", plugin_name);
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_foundation::MemoryStore;

    fn store() -> InstallationStore {
        InstallationStore::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_lifecycle_transitions() {
        let store = store();
        assert!(!store.is_installed("sms").unwrap());

        store.mark_installed("sms", "1.0.0").unwrap();
        assert!(store.is_installed("sms").unwrap());
        assert!(!store.is_enabled("sms").unwrap());

        store.mark_enabled("sms").unwrap();
        assert!(store.is_enabled("sms").unwrap());

        let record = store.mark_uninstalled("sms").unwrap();
        assert!(!record.installed);
        assert!(!record.enabled);
        assert!(record.uninstalled_at.is_some());
        assert!(record.is_consistent());
    }

    #[test]
    fn test_enable_requires_install() {
        let store = store();
        assert!(matches!(
            store.mark_enabled("sms"),
            Err(Error::InvalidState(_))
        ));

        store.mark_installed("sms", "1.0.0").unwrap();
        store.mark_uninstalled("sms").unwrap();
        assert!(matches!(
            store.mark_enabled("sms"),
            Err(Error::InvalidState(_))
        ));
        assert!(!store.is_enabled("sms").unwrap());
    }

    #[test]
    fn test_reinstall_clears_uninstalled_at() {
        let store = store();
        store.mark_installed("sms", "1.0.0").unwrap();
        store.mark_uninstalled("sms").unwrap();

        let record = store.mark_installed("sms", "1.1.0").unwrap();
        assert!(record.installed);
        assert!(record.uninstalled_at.is_none());
        assert_eq!(record.version, "1.1.0");
        assert_eq!(store.list().unwrap().len(), 1);
    }
}
