//! 오브젝트 스토리지 인터페이스

use agora_foundation::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// 저장된 오브젝트 정보
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub key: String,
    pub size: usize,
    pub url: String,
}

/// 오브젝트 스토리지 프로바이더 인터페이스
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    fn name(&self) -> &str;

    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: Option<&str>) -> Result<StoredObject>;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// 삭제, 존재하지 않았으면 `false`
    async fn delete(&self, key: &str) -> Result<bool>;

    /// 공개 URL
    fn url(&self, key: &str) -> String;
}
