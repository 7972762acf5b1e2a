//! # Capability System
//!
//! 코어 서비스가 이름으로 찾아 쓰는 프로바이더 인터페이스와 레지스트리.
//!
//! ## 아키텍처
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  Plugin (CapabilityProvider)                              │
//! │      │ capabilities() -> [CapabilityDeclaration]          │
//! │      ▼                                                    │
//! │  CapabilityBridge ──► DriverCatalog (class -> ctor)       │
//! │      │ plugin.<name>.<type>                               │
//! │      ▼                                                    │
//! │  ChannelRegistry  ◄── register_builtin("log", ...)        │
//! │      │                                                    │
//! │      ▼ (read only)                                        │
//! │  ChannelReader ──► SmsDispatcher                          │
//! └──────────────────────────────────────────────────────────┘
//! ```

mod bridge;
mod builtin;
mod driver;
mod registry;
mod sms;
mod storage;

pub use bridge::{
    CapabilityBridge, CapabilityDeclaration, RegistrationFailure, RegistrationReport,
    UnregistrationFailure, UnregistrationReport,
};
pub use builtin::{register_builtins, LogSmsChannel, MemoryObjectStorage, SentMessage};
pub use driver::{DriverCatalog, DriverConstructor, DriverContext};
pub use registry::{
    channel_key, extract_plugin_name, is_plugin_channel, ChannelEntry, ChannelInfo,
    ChannelReader, ChannelRegistry, PLUGIN_KEY_PREFIX,
};
pub use sms::{ConfigField, SendOutcome, SmsChannel, SmsDispatcher};
pub use storage::{ObjectStorage, StoredObject};

pub(crate) use driver::guard_panic;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ============================================================================
// CapabilityInterface
// ============================================================================

/// 코어가 알고 있는 capability 인터페이스
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityInterface {
    SmsChannelProvider,
    ObjectStorageProvider,
}

impl CapabilityInterface {
    pub const ALL: [CapabilityInterface; 2] = [
        CapabilityInterface::SmsChannelProvider,
        CapabilityInterface::ObjectStorageProvider,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SmsChannelProvider => "sms_channel_provider",
            Self::ObjectStorageProvider => "object_storage_provider",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.as_str() == s)
    }
}

impl std::fmt::Display for CapabilityInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ProviderHandle
// ============================================================================

/// 레지스트리에 저장되는 프로바이더 핸들
#[derive(Clone)]
pub enum ProviderHandle {
    Sms(Arc<dyn SmsChannel>),
    ObjectStorage(Arc<dyn ObjectStorage>),
}

impl ProviderHandle {
    /// 핸들이 실제로 구현하는 인터페이스
    pub fn interface(&self) -> CapabilityInterface {
        match self {
            Self::Sms(_) => CapabilityInterface::SmsChannelProvider,
            Self::ObjectStorage(_) => CapabilityInterface::ObjectStorageProvider,
        }
    }

    /// 프로바이더 표시 이름
    pub fn provider_name(&self) -> &str {
        match self {
            Self::Sms(channel) => channel.name(),
            Self::ObjectStorage(storage) => storage.name(),
        }
    }

    pub fn as_sms(&self) -> Option<Arc<dyn SmsChannel>> {
        match self {
            Self::Sms(channel) => Some(Arc::clone(channel)),
            _ => None,
        }
    }

    pub fn as_object_storage(&self) -> Option<Arc<dyn ObjectStorage>> {
        match self {
            Self::ObjectStorage(storage) => Some(Arc::clone(storage)),
            _ => None,
        }
    }
}

impl std::fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderHandle")
            .field("interface", &self.interface())
            .field("provider", &self.provider_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interface_names() {
        for interface in CapabilityInterface::ALL {
            assert_eq!(CapabilityInterface::parse(interface.as_str()), Some(interface));
        }
        assert_eq!(CapabilityInterface::parse("login_provider"), None);
    }

    #[test]
    fn test_handle_interface() {
        let handle = ProviderHandle::Sms(Arc::new(LogSmsChannel::new()));
        assert_eq!(handle.interface(), CapabilityInterface::SmsChannelProvider);
        assert!(handle.as_sms().is_some());
        assert!(handle.as_object_storage().is_none());
    }
}
