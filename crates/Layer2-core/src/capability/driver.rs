//! Driver Catalog - 드라이버 클래스 이름 -> 생성자
//!
//! 선언에 적힌 `driver_class` 문자열을 컴파일 타임에 등록된 생성자로 해석합니다.

use super::{CapabilityInterface, ProviderHandle};
use agora_foundation::{Error, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::debug;

/// 드라이버 생성 시 전달되는 정보
pub struct DriverContext<'a> {
    pub plugin_name: &'a str,
    /// 선언의 `name` (표시 이름)
    pub channel_name: &'a str,
    /// 플러그인 설정 스냅샷
    pub settings: &'a HashMap<String, Value>,
    /// 선언의 `options`
    pub options: &'a Value,
}

pub type DriverConstructor =
    Arc<dyn Fn(&DriverContext<'_>) -> Result<ProviderHandle> + Send + Sync>;

struct DriverSlot {
    interface: CapabilityInterface,
    constructor: DriverConstructor,
}

/// 드라이버 카탈로그
#[derive(Default)]
pub struct DriverCatalog {
    drivers: HashMap<String, DriverSlot>,
}

impl DriverCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 드라이버 등록 (같은 클래스 이름은 거부)
    pub fn register<F>(
        &mut self,
        class: impl Into<String>,
        interface: CapabilityInterface,
        constructor: F,
    ) -> Result<()>
    where
        F: Fn(&DriverContext<'_>) -> Result<ProviderHandle> + Send + Sync + 'static,
    {
        let class = class.into();
        if class.trim().is_empty() {
            return Err(Error::Validation("Driver class name is empty".to_string()));
        }
        if self.drivers.contains_key(&class) {
            return Err(Error::Validation(format!(
                "Driver class '{}' is already registered",
                class
            )));
        }

        debug!("Registered driver {} ({})", class, interface);
        self.drivers.insert(
            class,
            DriverSlot {
                interface,
                constructor: Arc::new(constructor),
            },
        );
        Ok(())
    }

    pub fn contains(&self, class: &str) -> bool {
        self.drivers.contains_key(class)
    }

    /// 드라이버가 구현하는 인터페이스
    pub fn interface_of(&self, class: &str) -> Option<CapabilityInterface> {
        self.drivers.get(class).map(|slot| slot.interface)
    }

    pub fn classes(&self) -> Vec<String> {
        let mut classes: Vec<String> = self.drivers.keys().cloned().collect();
        classes.sort();
        classes
    }

    /// 드라이버 인스턴스 생성
    ///
    /// 생성자 패닉은 에러로 변환됩니다.
    pub fn construct(&self, class: &str, ctx: &DriverContext<'_>) -> Result<ProviderHandle> {
        let slot = self
            .drivers
            .get(class)
            .ok_or_else(|| Error::NotFound(format!("Driver class '{}' is not registered", class)))?;

        let constructor = Arc::clone(&slot.constructor);
        guard_panic(&format!("driver {}", class), || constructor(ctx))
    }
}

/// 패닉을 에러로 변환해서 생성자 호출
pub(crate) fn guard_panic<T>(what: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(Error::Plugin(format!("{} panicked: {}", what, reason)))
        }
    }
}
