//! # agora-foundation
//!
//! Foundation layer for the Agora plugin system:
//! - Error: 에러 분류 (`Error`, `Result`)
//! - Storage: 영속성 협력자 (`RecordStore`), SQLite `Storage`, `MemoryStore`, `JsonStore`
//! - Config: 통합 설정 (`AgoraConfig`)

pub mod config;
pub mod error;
pub mod storage;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config (설정)
// ============================================================================
pub use config::{
    AgoraConfig, LoggingConfig, PluginScope, PluginsConfig, SearchPathConfig, StorageConfig,
    UninstallPolicy, AGORA_CONFIG_FILE,
};

// ============================================================================
// Storage (저장소)
// ============================================================================
pub use storage::{
    // Records
    AppliedMigration,
    ConfigEntry,
    ConfigFieldType,
    ConfigValidation,
    DiscoveryRecord,
    InstallationRecord,
    // JSON (범용)
    JsonStore,
    // In-memory
    MemoryStore,
    // Persistence collaborator
    RecordStore,
    SchemaMigration,
    // SQLite
    Storage,
};
