//! 플러그인 이름별 직렬화 락
//!
//! 같은 이름에 대한 라이프사이클 호출은 순서대로, 다른 이름은 동시에 진행됩니다.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;

#[derive(Default)]
pub struct PluginLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl PluginLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 플러그인 이름의 락 획득
    pub async fn acquire(&self, plugin_name: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            Arc::clone(locks.entry(plugin_name.to_string()).or_default())
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_name_is_serialized() {
        let locks = Arc::new(PluginLocks::new());
        let guard = locks.acquire("sms").await;

        let contender = Arc::clone(&locks);
        let waiting = tokio::spawn(async move {
            let _guard = contender.acquire("sms").await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());

        // 다른 이름은 막히지 않음
        let _other = locks.acquire("oss").await;

        drop(guard);
        waiting.await.unwrap();
    }
}
