//! SMS 채널 인터페이스와 디스패처

use super::registry::ChannelReader;
use agora_foundation::{ConfigFieldType, Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

/// 발송 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendOutcome {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub data: Value,
}

impl SendOutcome {
    pub fn ok(message: impl Into<String>, data: Value) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: Value::Null,
        }
    }
}

/// 채널이 필요로 하는 설정 필드
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigField {
    pub key: String,
    pub label: String,
    pub field_type: ConfigFieldType,
    #[serde(default)]
    pub required: bool,
}

impl ConfigField {
    pub fn new(key: impl Into<String>, label: impl Into<String>, field_type: ConfigFieldType) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            field_type,
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// SMS 채널 프로바이더 인터페이스
#[async_trait]
pub trait SmsChannel: Send + Sync {
    /// 채널 이름
    fn name(&self) -> &str;

    /// 템플릿 메시지 발송
    async fn send(
        &self,
        destination: &str,
        template_id: &str,
        data: &HashMap<String, Value>,
    ) -> SendOutcome;

    /// 채널 설정 필드
    fn config_fields(&self) -> Vec<ConfigField> {
        Vec::new()
    }

    /// 설정 검증 (기본: 필수 필드 존재 여부)
    fn validate_config(&self, config: &HashMap<String, Value>) -> Result<()> {
        let missing: Vec<String> = self
            .config_fields()
            .into_iter()
            .filter(|f| f.required)
            .filter(|f| match config.get(&f.key) {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.trim().is_empty(),
                Some(_) => false,
            })
            .map(|f| f.key)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(format!(
                "Missing required config for {}: {}",
                self.name(),
                missing.join(", ")
            )))
        }
    }

    /// 연결 테스트 (기본: 설정 검증만 수행)
    async fn test_connection(&self, config: &HashMap<String, Value>) -> SendOutcome {
        match self.validate_config(config) {
            Ok(()) => SendOutcome::ok(format!("{} configuration is valid", self.name()), Value::Null),
            Err(e) => SendOutcome::failed(e.to_string()),
        }
    }
}

// ============================================================================
// SmsDispatcher - 키로만 채널을 찾는 소비자
// ============================================================================

/// SMS 디스패처
///
/// 채널이 내장인지 플러그인 제공인지 알지 못하고 키로만 찾습니다.
pub struct SmsDispatcher {
    channels: ChannelReader,
    default_channel: String,
}

impl SmsDispatcher {
    pub fn new(channels: ChannelReader) -> Self {
        Self {
            channels,
            default_channel: "log".to_string(),
        }
    }

    pub fn with_default_channel(mut self, key: impl Into<String>) -> Self {
        self.default_channel = key.into();
        self
    }

    pub fn default_channel(&self) -> &str {
        &self.default_channel
    }

    /// 기본 채널로 발송
    pub async fn send(
        &self,
        destination: &str,
        template_id: &str,
        data: &HashMap<String, Value>,
    ) -> Result<SendOutcome> {
        self.send_via(&self.default_channel, destination, template_id, data)
            .await
    }

    /// 지정한 채널 키로 발송
    pub async fn send_via(
        &self,
        key: &str,
        destination: &str,
        template_id: &str,
        data: &HashMap<String, Value>,
    ) -> Result<SendOutcome> {
        let channel = self
            .channels
            .get_sms_channel(key)
            .ok_or_else(|| Error::NotFound(format!("SMS channel '{}' is not registered", key)))?;

        debug!("Dispatching SMS via {} to {}", key, destination);
        let outcome = channel.send(destination, template_id, data).await;
        if !outcome.success {
            warn!("SMS via {} failed: {}", key, outcome.message);
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{ChannelRegistry, LogSmsChannel, ProviderHandle};
    use std::sync::Arc;

    struct StrictChannel;

    #[async_trait]
    impl SmsChannel for StrictChannel {
        fn name(&self) -> &str {
            "strict"
        }

        async fn send(&self, _: &str, _: &str, _: &HashMap<String, Value>) -> SendOutcome {
            SendOutcome::failed("not configured")
        }

        fn config_fields(&self) -> Vec<ConfigField> {
            vec![ConfigField::new("access_key", "Access Key", ConfigFieldType::Password).required()]
        }
    }

    #[tokio::test]
    async fn test_validate_config_required() {
        let channel = StrictChannel;
        let mut config = HashMap::new();
        assert!(channel.validate_config(&config).is_err());
        assert!(!channel.test_connection(&config).await.success);

        config.insert("access_key".to_string(), Value::from("secret"));
        assert!(channel.validate_config(&config).is_ok());
    }

    #[tokio::test]
    async fn test_dispatch_by_key() {
        let registry = Arc::new(ChannelRegistry::new());
        registry
            .register_builtin("log", ProviderHandle::Sms(Arc::new(LogSmsChannel::new())))
            .unwrap();

        let dispatcher = SmsDispatcher::new(registry.reader());
        let outcome = dispatcher
            .send("+100000", "welcome", &HashMap::new())
            .await
            .unwrap();
        assert!(outcome.success);

        let missing = dispatcher
            .send_via("plugin.none.sms", "+100000", "welcome", &HashMap::new())
            .await;
        assert!(matches!(missing, Err(Error::NotFound(_))));
    }
}
