//! SQLite Storage for plugin records
//!
//! 플러그인 레코드 저장:
//! - Discoveries: 디스커버리 스캔 결과
//! - Installations: 설치/활성화 상태
//! - Configs: 스키마 기반 설정 항목
//! - Migrations: 플러그인별 적용된 스키마 마이그레이션
//!
//! ## Migration System
//!
//! Database schema is versioned. Migrations run automatically on startup.
//! - Version 1: Initial schema (plugin_discoveries, plugin_installations, plugin_configs)
//! - Version 2: Add plugin_migrations table and config description column

use super::records::{
    AppliedMigration, ConfigEntry, ConfigFieldType, ConfigValidation, DiscoveryRecord,
    InstallationRecord, SchemaMigration,
};
use super::RecordStore;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Current schema version
const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Database file name used by [`Storage::new`]
pub const DEFAULT_DATABASE_FILE: &str = "agora.db";

/// Storage service for persisting plugin records
pub struct Storage {
    conn: Arc<Mutex<Connection>>,
}

impl Storage {
    /// Create a new storage instance in `data_dir`
    pub fn new(data_dir: &Path) -> Result<Self> {
        Self::open(data_dir, DEFAULT_DATABASE_FILE)
    }

    /// Create a storage instance with an explicit database file name
    pub fn open(data_dir: &Path, file_name: &str) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .map_err(|e| Error::Storage(format!("Failed to create data directory: {}", e)))?;

        let db_path = data_dir.join(file_name);
        let conn = Connection::open(&db_path)
            .map_err(|e| Error::Storage(format!("Failed to open database: {}", e)))?;

        // Enable WAL mode for better concurrent performance
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| Error::Storage(format!("Failed to set pragmas: {}", e)))?;

        let storage = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        storage.initialize_schema()?;
        storage.run_migrations()?;

        info!("Opened plugin storage at {}", db_path.display());
        Ok(storage)
    }

    /// Create an in-memory storage (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Storage(format!("Failed to create in-memory database: {}", e)))?;

        let storage = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        storage.initialize_schema()?;
        storage.run_migrations()?;

        Ok(storage)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Internal("Lock poisoned".to_string()))
    }

    /// Get current schema version from database
    pub fn get_schema_version(&self) -> Result<i32> {
        let conn = self.lock()?;

        conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .map_err(|e| Error::Storage(format!("Failed to get schema version: {}", e)))
    }

    /// Initialize database schema (base tables)
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            -- Schema version tracking
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            -- Discovery records (one per plugin name)
            CREATE TABLE IF NOT EXISTS plugin_discoveries (
                plugin_name TEXT PRIMARY KEY,
                version TEXT NOT NULL,
                entry TEXT NOT NULL,
                path TEXT NOT NULL,
                scope TEXT NOT NULL,
                manifest TEXT NOT NULL,
                discovered_at TEXT NOT NULL
            );

            -- Installation records (one per plugin name)
            CREATE TABLE IF NOT EXISTS plugin_installations (
                plugin_name TEXT PRIMARY KEY,
                version TEXT NOT NULL,
                installed INTEGER NOT NULL DEFAULT 0,
                enabled INTEGER NOT NULL DEFAULT 0,
                installed_at TEXT,
                enabled_at TEXT,
                disabled_at TEXT,
                uninstalled_at TEXT,
                updated_at TEXT NOT NULL,
                CHECK (enabled = 0 OR installed = 1)
            );

            -- Plugin configuration entries
            CREATE TABLE IF NOT EXISTS plugin_configs (
                plugin_name TEXT NOT NULL,
                config_key TEXT NOT NULL,
                label TEXT NOT NULL,
                field_type TEXT NOT NULL,
                value TEXT NOT NULL,
                default_value TEXT NOT NULL,
                options TEXT NOT NULL DEFAULT '[]',
                group_name TEXT NOT NULL DEFAULT 'default',
                sort_order INTEGER NOT NULL DEFAULT 0,
                required INTEGER NOT NULL DEFAULT 0,
                readonly INTEGER NOT NULL DEFAULT 0,
                validation TEXT,
                PRIMARY KEY (plugin_name, config_key)
            );

            CREATE INDEX IF NOT EXISTS idx_plugin_configs_group
                ON plugin_configs(plugin_name, group_name, sort_order);

            -- Insert initial schema version if not exists
            INSERT OR IGNORE INTO schema_version (version) VALUES (1);
            "#,
        )
        .map_err(|e| Error::Storage(format!("Failed to initialize schema: {}", e)))?;

        Ok(())
    }

    /// Run all pending migrations
    fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version()?;

        if current_version >= CURRENT_SCHEMA_VERSION {
            debug!(
                "Database schema is up to date (version {})",
                current_version
            );
            return Ok(());
        }

        info!(
            "Running database migrations from version {} to {}",
            current_version, CURRENT_SCHEMA_VERSION
        );

        let conn = self.lock()?;

        for version in (current_version + 1)..=CURRENT_SCHEMA_VERSION {
            match version {
                2 => Self::migrate_v2(&conn)?,
                _ => {
                    warn!("Unknown migration version: {}", version);
                }
            }

            conn.execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                params![version],
            )
            .map_err(|e| Error::Storage(format!("Failed to record migration: {}", e)))?;

            info!("Applied migration to version {}", version);
        }

        Ok(())
    }

    /// Migration to version 2: plugin migration ledger and config descriptions
    fn migrate_v2(conn: &Connection) -> Result<()> {
        // Column may already exist when a v1 database was hand-patched
        let _ = conn.execute("ALTER TABLE plugin_configs ADD COLUMN description TEXT", []);

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS plugin_migrations (
                plugin_name TEXT NOT NULL,
                migration_id TEXT NOT NULL,
                applied_at TEXT NOT NULL,
                PRIMARY KEY (plugin_name, migration_id)
            );
            "#,
        )
        .map_err(|e| Error::Storage(format!("Failed to create plugin_migrations: {}", e)))?;

        Ok(())
    }
}

// ============================================================================
// Row helpers
// ============================================================================

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn optional_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| conversion_error(idx, e))
    })
    .transpose()
}

fn json_column<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn to_json(value: &impl serde::Serialize) -> Result<String> {
    serde_json::to_string(value).map_err(Error::from)
}

fn row_to_discovery(row: &Row<'_>) -> rusqlite::Result<DiscoveryRecord> {
    Ok(DiscoveryRecord {
        plugin_name: row.get(0)?,
        version: row.get(1)?,
        entry: row.get(2)?,
        path: row.get(3)?,
        scope: row.get(4)?,
        manifest: json_column(row, 5)?,
        discovered_at: timestamp(row, 6)?,
    })
}

fn row_to_installation(row: &Row<'_>) -> rusqlite::Result<InstallationRecord> {
    Ok(InstallationRecord {
        plugin_name: row.get(0)?,
        version: row.get(1)?,
        installed: row.get(2)?,
        enabled: row.get(3)?,
        installed_at: optional_timestamp(row, 4)?,
        enabled_at: optional_timestamp(row, 5)?,
        disabled_at: optional_timestamp(row, 6)?,
        uninstalled_at: optional_timestamp(row, 7)?,
        updated_at: timestamp(row, 8)?,
    })
}

fn row_to_config(row: &Row<'_>) -> rusqlite::Result<ConfigEntry> {
    let field_type: String = row.get(3)?;
    let field_type = ConfigFieldType::parse(&field_type).ok_or_else(|| {
        conversion_error(
            3,
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unknown field type '{}'", field_type),
            ),
        )
    })?;

    let validation: Option<String> = row.get(11)?;
    let validation = match validation {
        Some(raw) => serde_json::from_str(&raw).map_err(|e| conversion_error(11, e))?,
        None => ConfigValidation::default(),
    };

    Ok(ConfigEntry {
        plugin_name: row.get(0)?,
        key: row.get(1)?,
        label: row.get(2)?,
        field_type,
        value: json_column(row, 4)?,
        default: json_column(row, 5)?,
        options: json_column(row, 6)?,
        group: row.get(7)?,
        order: row.get(8)?,
        required: row.get(9)?,
        readonly: row.get(10)?,
        validation,
        description: row.get(12)?,
    })
}

const CONFIG_COLUMNS: &str = "plugin_name, config_key, label, field_type, value, default_value, \
     options, group_name, sort_order, required, readonly, validation, description";

// ============================================================================
// RecordStore
// ============================================================================

impl RecordStore for Storage {
    // ========================================================================
    // Discovery Operations
    // ========================================================================

    fn upsert_discovery(&self, record: &DiscoveryRecord) -> Result<()> {
        let manifest = to_json(&record.manifest)?;
        let conn = self.lock()?;

        conn.execute(
            r#"
            INSERT INTO plugin_discoveries (plugin_name, version, entry, path, scope, manifest, discovered_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(plugin_name) DO UPDATE SET
                version = excluded.version,
                entry = excluded.entry,
                path = excluded.path,
                scope = excluded.scope,
                manifest = excluded.manifest,
                discovered_at = excluded.discovered_at
            "#,
            params![
                record.plugin_name,
                record.version,
                record.entry,
                record.path,
                record.scope,
                manifest,
                record.discovered_at.to_rfc3339(),
            ],
        )
        .map_err(|e| Error::Storage(format!("Failed to upsert discovery record: {}", e)))?;

        Ok(())
    }

    fn find_discovery(&self, plugin_name: &str) -> Result<Option<DiscoveryRecord>> {
        let conn = self.lock()?;

        conn.query_row(
            r#"
            SELECT plugin_name, version, entry, path, scope, manifest, discovered_at
            FROM plugin_discoveries WHERE plugin_name = ?1
            "#,
            params![plugin_name],
            row_to_discovery,
        )
        .optional()
        .map_err(|e| Error::Storage(format!("Failed to get discovery record: {}", e)))
    }

    fn list_discoveries(&self) -> Result<Vec<DiscoveryRecord>> {
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare(
                r#"
                SELECT plugin_name, version, entry, path, scope, manifest, discovered_at
                FROM plugin_discoveries ORDER BY plugin_name
                "#,
            )
            .map_err(|e| Error::Storage(format!("Failed to prepare query: {}", e)))?;

        let records = stmt
            .query_map([], row_to_discovery)
            .map_err(|e| Error::Storage(format!("Failed to query discoveries: {}", e)))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::Storage(format!("Failed to read discovery row: {}", e)))?;

        Ok(records)
    }

    fn remove_discovery(&self, plugin_name: &str) -> Result<bool> {
        let conn = self.lock()?;

        let removed = conn
            .execute(
                "DELETE FROM plugin_discoveries WHERE plugin_name = ?1",
                params![plugin_name],
            )
            .map_err(|e| Error::Storage(format!("Failed to remove discovery record: {}", e)))?;

        Ok(removed > 0)
    }

    fn clear_discoveries(&self) -> Result<usize> {
        let conn = self.lock()?;

        let removed = conn
            .execute("DELETE FROM plugin_discoveries", [])
            .map_err(|e| Error::Storage(format!("Failed to clear discoveries: {}", e)))?;

        debug!("Cleared {} discovery records", removed);
        Ok(removed)
    }

    // ========================================================================
    // Installation Operations
    // ========================================================================

    fn upsert_installation(&self, record: &InstallationRecord) -> Result<()> {
        if !record.is_consistent() {
            return Err(Error::Validation(format!(
                "Plugin {} cannot be enabled while not installed",
                record.plugin_name
            )));
        }

        let conn = self.lock()?;

        conn.execute(
            r#"
            INSERT INTO plugin_installations (
                plugin_name, version, installed, enabled,
                installed_at, enabled_at, disabled_at, uninstalled_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(plugin_name) DO UPDATE SET
                version = excluded.version,
                installed = excluded.installed,
                enabled = excluded.enabled,
                installed_at = excluded.installed_at,
                enabled_at = excluded.enabled_at,
                disabled_at = excluded.disabled_at,
                uninstalled_at = excluded.uninstalled_at,
                updated_at = excluded.updated_at
            "#,
            params![
                record.plugin_name,
                record.version,
                record.installed,
                record.enabled,
                record.installed_at.map(|t| t.to_rfc3339()),
                record.enabled_at.map(|t| t.to_rfc3339()),
                record.disabled_at.map(|t| t.to_rfc3339()),
                record.uninstalled_at.map(|t| t.to_rfc3339()),
                record.updated_at.to_rfc3339(),
            ],
        )
        .map_err(|e| Error::Storage(format!("Failed to upsert installation record: {}", e)))?;

        Ok(())
    }

    fn find_installation(&self, plugin_name: &str) -> Result<Option<InstallationRecord>> {
        let conn = self.lock()?;

        conn.query_row(
            r#"
            SELECT plugin_name, version, installed, enabled,
                   installed_at, enabled_at, disabled_at, uninstalled_at, updated_at
            FROM plugin_installations WHERE plugin_name = ?1
            "#,
            params![plugin_name],
            row_to_installation,
        )
        .optional()
        .map_err(|e| Error::Storage(format!("Failed to get installation record: {}", e)))
    }

    fn list_installations(&self) -> Result<Vec<InstallationRecord>> {
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare(
                r#"
                SELECT plugin_name, version, installed, enabled,
                       installed_at, enabled_at, disabled_at, uninstalled_at, updated_at
                FROM plugin_installations ORDER BY plugin_name
                "#,
            )
            .map_err(|e| Error::Storage(format!("Failed to prepare query: {}", e)))?;

        let records = stmt
            .query_map([], row_to_installation)
            .map_err(|e| Error::Storage(format!("Failed to query installations: {}", e)))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::Storage(format!("Failed to read installation row: {}", e)))?;

        Ok(records)
    }

    // ========================================================================
    // Migration Operations
    // ========================================================================

    fn applied_migrations(&self, plugin_name: &str) -> Result<Vec<AppliedMigration>> {
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare(
                r#"
                SELECT plugin_name, migration_id, applied_at
                FROM plugin_migrations WHERE plugin_name = ?1 ORDER BY applied_at, migration_id
                "#,
            )
            .map_err(|e| Error::Storage(format!("Failed to prepare query: {}", e)))?;

        let applied = stmt
            .query_map(params![plugin_name], |row| {
                Ok(AppliedMigration {
                    plugin_name: row.get(0)?,
                    migration_id: row.get(1)?,
                    applied_at: timestamp(row, 2)?,
                })
            })
            .map_err(|e| Error::Storage(format!("Failed to query migrations: {}", e)))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::Storage(format!("Failed to read migration row: {}", e)))?;

        Ok(applied)
    }

    fn apply_migration(&self, plugin_name: &str, migration: &SchemaMigration) -> Result<()> {
        let mut conn = self.lock()?;

        let tx = conn
            .transaction()
            .map_err(|e| Error::Storage(format!("Failed to begin transaction: {}", e)))?;

        tx.execute_batch(&migration.statements).map_err(|e| {
            Error::Storage(format!(
                "Migration {} for {} failed: {}",
                migration.id, plugin_name, e
            ))
        })?;

        tx.execute(
            "INSERT INTO plugin_migrations (plugin_name, migration_id, applied_at) VALUES (?1, ?2, ?3)",
            params![plugin_name, migration.id, Utc::now().to_rfc3339()],
        )
        .map_err(|e| Error::Storage(format!("Failed to record migration: {}", e)))?;

        tx.commit()
            .map_err(|e| Error::Storage(format!("Failed to commit migration: {}", e)))?;

        debug!("Applied migration {} for {}", migration.id, plugin_name);
        Ok(())
    }

    // ========================================================================
    // Config Operations
    // ========================================================================

    fn upsert_config_entry(&self, entry: &ConfigEntry) -> Result<()> {
        let value = to_json(&entry.value)?;
        let default = to_json(&entry.default)?;
        let options = to_json(&entry.options)?;
        let validation = if entry.validation.is_empty() {
            None
        } else {
            Some(to_json(&entry.validation)?)
        };

        let conn = self.lock()?;

        conn.execute(
            r#"
            INSERT INTO plugin_configs (
                plugin_name, config_key, label, field_type, value, default_value,
                options, group_name, sort_order, required, readonly, validation, description
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ON CONFLICT(plugin_name, config_key) DO UPDATE SET
                label = excluded.label,
                field_type = excluded.field_type,
                value = excluded.value,
                default_value = excluded.default_value,
                options = excluded.options,
                group_name = excluded.group_name,
                sort_order = excluded.sort_order,
                required = excluded.required,
                readonly = excluded.readonly,
                validation = excluded.validation,
                description = excluded.description
            "#,
            params![
                entry.plugin_name,
                entry.key,
                entry.label,
                entry.field_type.as_str(),
                value,
                default,
                options,
                entry.group,
                entry.order,
                entry.required,
                entry.readonly,
                validation,
                entry.description,
            ],
        )
        .map_err(|e| Error::Storage(format!("Failed to upsert config entry: {}", e)))?;

        Ok(())
    }

    fn find_config_entry(&self, plugin_name: &str, key: &str) -> Result<Option<ConfigEntry>> {
        let conn = self.lock()?;

        conn.query_row(
            &format!(
                "SELECT {} FROM plugin_configs WHERE plugin_name = ?1 AND config_key = ?2",
                CONFIG_COLUMNS
            ),
            params![plugin_name, key],
            row_to_config,
        )
        .optional()
        .map_err(|e| Error::Storage(format!("Failed to get config entry: {}", e)))
    }

    fn list_config_entries(&self, plugin_name: &str) -> Result<Vec<ConfigEntry>> {
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM plugin_configs WHERE plugin_name = ?1 \
                 ORDER BY group_name, sort_order, config_key",
                CONFIG_COLUMNS
            ))
            .map_err(|e| Error::Storage(format!("Failed to prepare query: {}", e)))?;

        let entries = stmt
            .query_map(params![plugin_name], row_to_config)
            .map_err(|e| Error::Storage(format!("Failed to query config entries: {}", e)))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::Storage(format!("Failed to read config row: {}", e)))?;

        Ok(entries)
    }

    fn update_config_value(&self, plugin_name: &str, key: &str, value: &Value) -> Result<bool> {
        let value = to_json(value)?;
        let conn = self.lock()?;

        let updated = conn
            .execute(
                "UPDATE plugin_configs SET value = ?3 WHERE plugin_name = ?1 AND config_key = ?2",
                params![plugin_name, key, value],
            )
            .map_err(|e| Error::Storage(format!("Failed to update config value: {}", e)))?;

        Ok(updated > 0)
    }

    fn reset_config_values(&self, plugin_name: &str) -> Result<usize> {
        let conn = self.lock()?;

        // 단일 UPDATE 문이므로 원자적
        let updated = conn
            .execute(
                "UPDATE plugin_configs SET value = default_value WHERE plugin_name = ?1",
                params![plugin_name],
            )
            .map_err(|e| Error::Storage(format!("Failed to reset config values: {}", e)))?;

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config_entry(key: &str, value: Value, default: Value) -> ConfigEntry {
        ConfigEntry {
            plugin_name: "sms".to_string(),
            key: key.to_string(),
            label: key.to_uppercase(),
            field_type: ConfigFieldType::Text,
            value,
            default,
            options: vec![],
            group: "basic".to_string(),
            order: 0,
            required: false,
            readonly: false,
            validation: ConfigValidation {
                max_length: Some(64),
                ..Default::default()
            },
            description: Some("desc".to_string()),
        }
    }

    #[test]
    fn test_schema_version_is_current() {
        let storage = Storage::in_memory().expect("Failed to create storage");
        assert_eq!(storage.get_schema_version().unwrap(), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn test_installation_upsert_is_single_row() {
        let storage = Storage::in_memory().expect("Failed to create storage");

        let mut record = InstallationRecord::installed("sms", "1.0.0");
        storage.upsert_installation(&record).unwrap();

        record.enabled = true;
        record.enabled_at = Some(Utc::now());
        storage.upsert_installation(&record).unwrap();

        let all = storage.list_installations().unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].enabled);
        assert!(all[0].enabled_at.is_some());
    }

    #[test]
    fn test_installation_rejects_enabled_without_installed() {
        let storage = Storage::in_memory().expect("Failed to create storage");

        let mut record = InstallationRecord::installed("sms", "1.0.0");
        record.installed = false;
        record.enabled = true;

        assert!(storage.upsert_installation(&record).is_err());
        assert!(storage.find_installation("sms").unwrap().is_none());
    }

    #[test]
    fn test_discovery_clear() {
        let storage = Storage::in_memory().expect("Failed to create storage");

        let record = DiscoveryRecord {
            plugin_name: "sms".to_string(),
            version: "1.0.0".to_string(),
            entry: "SmsPlugin".to_string(),
            path: "/plugins/sms".to_string(),
            scope: "project".to_string(),
            manifest: json!({"name": "sms"}),
            discovered_at: Utc::now(),
        };
        storage.upsert_discovery(&record).unwrap();
        storage.upsert_discovery(&record).unwrap();

        assert_eq!(storage.list_discoveries().unwrap().len(), 1);
        assert!(storage.remove_discovery("sms").unwrap());
        assert!(!storage.remove_discovery("sms").unwrap());

        storage.upsert_discovery(&record).unwrap();
        assert_eq!(storage.clear_discoveries().unwrap(), 1);
        assert!(storage.find_discovery("sms").unwrap().is_none());
    }

    #[test]
    fn test_config_reset_restores_defaults() {
        let storage = Storage::in_memory().expect("Failed to create storage");

        storage
            .upsert_config_entry(&config_entry("sign", json!("custom"), json!("Agora")))
            .unwrap();
        storage
            .upsert_config_entry(&config_entry("region", json!("us"), json!("cn")))
            .unwrap();

        assert_eq!(storage.reset_config_values("sms").unwrap(), 2);

        for entry in storage.list_config_entries("sms").unwrap() {
            assert_eq!(entry.value, entry.default);
            assert_eq!(entry.validation.max_length, Some(64));
        }
    }

    #[test]
    fn test_failed_migration_is_not_recorded() {
        let storage = Storage::in_memory().expect("Failed to create storage");

        let good = SchemaMigration::new("0001", "CREATE TABLE sms_log (id INTEGER PRIMARY KEY);");
        storage.apply_migration("sms", &good).unwrap();

        let bad = SchemaMigration::new(
            "0002",
            "CREATE TABLE sms_audit (id INTEGER); THIS IS NOT SQL;",
        );
        assert!(storage.apply_migration("sms", &bad).is_err());

        let applied = storage.applied_migrations("sms").unwrap();
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].migration_id, "0001");
    }
}
