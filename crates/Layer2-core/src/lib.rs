//! agora-core: Core Runtime for Agora
//!
//! Layer2 - 플러그인 시스템 레이어
//!
//! # 주요 모듈
//!
//! - `capability`: 코어 capability 인터페이스, 드라이버 카탈로그, 채널 레지스트리, 브릿지
//! - `plugin`: 디스커버리, 설치, 활성화, 설정, 관리 API
//!
//! # 사용 예시
//!
//! ```ignore
//! use agora_core::{register_builtins, ChannelRegistry, PluginManager, SmsDispatcher};
//!
//! let channels = Arc::new(ChannelRegistry::new());
//! register_builtins(&channels)?;
//!
//! let manager = PluginManager::new(config.plugins, records, entries, drivers, Arc::clone(&channels));
//! manager.initialize().await?;
//!
//! // 코어 서비스는 키로만 채널을 찾습니다
//! let sms = SmsDispatcher::new(channels.reader()).with_default_channel("plugin.aliyun-sms.sms");
//! sms.send("13800000000", "login_code", &data).await?;
//! ```

pub mod capability;
pub mod plugin;

// Re-exports: Capability
pub use capability::{
    register_builtins, CapabilityBridge, CapabilityDeclaration, CapabilityInterface,
    ChannelInfo, ChannelReader, ChannelRegistry, DriverCatalog, DriverContext, LogSmsChannel,
    MemoryObjectStorage, ObjectStorage, ProviderHandle, RegistrationReport, SendOutcome,
    SmsChannel, SmsDispatcher, StoredObject, UnregistrationReport,
};

// Re-exports: Plugin
pub use plugin::{
    ApiResponse, CapabilityProvider, DisableOutcome, Enableable, EnableOutcome, EntryCatalog,
    EventBus, EventType, Installable, ManagementApi, Plugin, PluginContext, PluginDescriptor,
    PluginEvent, PluginManager, PluginState, PluginSummary, SecurityReport,
};

// Layer1 re-exports
pub use agora_foundation::{Error, Result};

/// Layer2 버전
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_builtin_exports() {
        let channels = std::sync::Arc::new(ChannelRegistry::new());
        register_builtins(&channels).unwrap();
        assert!(channels.reader().get_sms_channel("log").is_some());
    }
}
