//! # Plugin System
//!
//! 선택적으로 설치되는 모듈(SMS, 로그인, 오브젝트 스토리지, 콘텐츠 검수 등)의 라이프사이클.
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     ManagementApi                           │
//! │                          │                                  │
//! │                     PluginManager ── PluginLocks            │
//! │    ┌──────────────┬──────┴───────┬───────────────────┐      │
//! │    │              │              │                   │      │
//! │ PluginDiscovery PluginInstaller SecurityChecker CapabilityBridge
//! │    │              │              │                   │      │
//! │    ▼              ▼              ▼                   ▼      │
//! │ PluginRegistry  InstallationStore / ConfigSchemaStore       │
//! │ (EntryCatalog)            │                  ChannelRegistry│
//! │                           ▼                                 │
//! │                      RecordStore                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 예시
//!
//! ```ignore
//! let mut entries = EntryCatalog::new();
//! entries.register_default::<AliyunSmsPlugin>("aliyun_sms.Plugin")?;
//!
//! let manager = PluginManager::new(config.plugins, records, Arc::new(entries), drivers, channels);
//! manager.discover().await;
//! manager.install_plugin("aliyun-sms").await?;
//! manager.enable_plugin("aliyun-sms").await?;
//! ```

mod api;
mod catalog;
mod config;
mod discovery;
mod events;
mod installer;
mod locks;
mod manager;
mod manifest;
mod registry;
mod security;
mod store;
mod traits;

pub use api::{ApiResponse, ManagementApi};
pub use catalog::{EntryCatalog, EntryConstructor};
pub use config::{validate_value, ConfigFailure, ConfigGroup, ConfigSchemaStore, ConfigUpdateReport};
pub use discovery::{
    DiscoveredPlugin, DiscoveryFailure, DiscoveryReport, DiscoveryStatus, PluginDiscovery,
};
pub use events::{EventBus, EventType, PluginEvent, PluginEventHandler};
pub use installer::{InstallOutcome, PluginInstaller, UninstallOutcome};
pub use locks::PluginLocks;
pub use manager::{
    DisableOutcome, EnableOutcome, ManagerSummary, PluginManager, PluginState, PluginSummary,
    ReconcileFailure, ReconcileReport,
};
pub use manifest::{
    strip_json_comments, ConfigFieldSchema, ConfigGroupSchema, PluginDescriptor, PluginVersion,
    MANIFEST_JSON, MANIFEST_TOML,
};
pub use registry::{PluginRegistry, RegisteredPlugin};
pub use security::{SecurityChecker, SecurityReport};
pub use store::InstallationStore;
pub use traits::{CapabilityProvider, Enableable, Installable, Plugin, PluginContext};
