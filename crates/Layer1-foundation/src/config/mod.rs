//! Config - 통합 설정 관리
//!
//! - `settings.rs` - AgoraConfig 통합 설정 (플러그인 경로, 저장소, 로깅)

mod settings;

pub use settings::{
    merge_values, AgoraConfig, LoggingConfig, PluginScope, PluginsConfig, SearchPathConfig,
    StorageConfig, UninstallPolicy, AGORA_CONFIG_FILE,
};
