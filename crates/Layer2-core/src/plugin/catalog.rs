//! Entry Catalog - 매니페스트 `entry` 이름 -> 플러그인 생성자
//!
//! 런타임 클래스 조회 대신 컴파일 타임에 등록된 생성자를 사용합니다.

use super::traits::Plugin;
use crate::capability::guard_panic;
use agora_foundation::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub type EntryConstructor = Arc<dyn Fn() -> Result<Arc<dyn Plugin>> + Send + Sync>;

/// 플러그인 엔트리 카탈로그
#[derive(Default)]
pub struct EntryCatalog {
    entries: HashMap<String, EntryConstructor>,
}

impl EntryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 엔트리 등록 (같은 이름은 거부)
    pub fn register<F>(&mut self, class: impl Into<String>, constructor: F) -> Result<()>
    where
        F: Fn() -> Result<Arc<dyn Plugin>> + Send + Sync + 'static,
    {
        let class = class.into();
        if class.trim().is_empty() {
            return Err(Error::Validation("Entry class name is empty".to_string()));
        }
        if self.entries.contains_key(&class) {
            return Err(Error::Validation(format!(
                "Entry class '{}' is already registered",
                class
            )));
        }

        debug!("Registered plugin entry {}", class);
        self.entries.insert(class, Arc::new(constructor));
        Ok(())
    }

    /// `Default`로 생성되는 플러그인 등록
    pub fn register_default<P>(&mut self, class: impl Into<String>) -> Result<()>
    where
        P: Plugin + Default + 'static,
    {
        self.register(class, || Ok(Arc::new(P::default()) as Arc<dyn Plugin>))
    }

    pub fn contains(&self, class: &str) -> bool {
        self.entries.contains_key(class)
    }

    pub fn classes(&self) -> Vec<String> {
        let mut classes: Vec<String> = self.entries.keys().cloned().collect();
        classes.sort();
        classes
    }

    /// 엔트리 인스턴스 생성
    ///
    /// 없는 엔트리는 `NotFound`, 생성자 패닉은 에러로 변환됩니다.
    pub fn instantiate(&self, class: &str) -> Result<Arc<dyn Plugin>> {
        let constructor = self
            .entries
            .get(class)
            .ok_or_else(|| Error::NotFound(format!("Entry class '{}' is not registered", class)))?;

        let constructor = Arc::clone(constructor);
        guard_panic(&format!("entry {}", class), || constructor())
    }
}
