//! 내장 프로바이더
//!
//! - `LogSmsChannel`: 발송 내용을 로그로만 남기는 SMS 채널 (키 `log`)
//! - `MemoryObjectStorage`: 프로세스 메모리 오브젝트 스토리지 (키 `memory`)

use super::registry::ChannelRegistry;
use super::sms::{SendOutcome, SmsChannel};
use super::storage::{ObjectStorage, StoredObject};
use super::ProviderHandle;
use agora_foundation::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// 내장 프로바이더 등록
pub fn register_builtins(registry: &ChannelRegistry) -> Result<()> {
    registry.register_builtin("log", ProviderHandle::Sms(Arc::new(LogSmsChannel::new())))?;
    registry.register_builtin(
        "memory",
        ProviderHandle::ObjectStorage(Arc::new(MemoryObjectStorage::new("memory://"))),
    )?;
    Ok(())
}

// ============================================================================
// LogSmsChannel
// ============================================================================

/// 로그 채널이 기록한 메시지
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentMessage {
    pub destination: String,
    pub template_id: String,
    pub data: HashMap<String, Value>,
    pub sent_at: DateTime<Utc>,
}

/// 로그 SMS 채널
pub struct LogSmsChannel {
    name: String,
    sent: Mutex<Vec<SentMessage>>,
}

impl LogSmsChannel {
    pub fn new() -> Self {
        Self::named("log")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.sent.lock().clone()
    }
}

impl Default for LogSmsChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SmsChannel for LogSmsChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(
        &self,
        destination: &str,
        template_id: &str,
        data: &HashMap<String, Value>,
    ) -> SendOutcome {
        info!(
            "[{}] SMS to {} (template {}): {:?}",
            self.name, destination, template_id, data
        );

        self.sent.lock().push(SentMessage {
            destination: destination.to_string(),
            template_id: template_id.to_string(),
            data: data.clone(),
            sent_at: Utc::now(),
        });

        SendOutcome::ok(
            "logged",
            json!({ "channel": self.name, "destination": destination }),
        )
    }
}

// ============================================================================
// MemoryObjectStorage
// ============================================================================

/// 메모리 오브젝트 스토리지
pub struct MemoryObjectStorage {
    base_url: String,
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryObjectStorage {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            objects: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    fn name(&self) -> &str {
        "memory"
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, _content_type: Option<&str>) -> Result<StoredObject> {
        let size = bytes.len();
        self.objects.write().insert(key.to_string(), bytes);
        Ok(StoredObject {
            key: key.to_string(),
            size,
            url: self.url(key),
        })
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.objects.read().get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.objects.write().remove(key).is_some())
    }

    fn url(&self, key: &str) -> String {
        format!("{}{}", self.base_url, key.trim_start_matches('/'))
    }
}
