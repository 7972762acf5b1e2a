//! Management API - 관리 화면용 응답 봉투
//!
//! 모든 호출은 `ApiResponse { success, code, message, data }`를 반환합니다.
//!
//! | code | 의미 |
//! |------|------|
//! | 0    | 성공 |
//! | 207  | 부분 성공 |
//! | 403  | 보안 검사 실패 |
//! | 404  | 없음 |
//! | 409  | 잘못된 상태 |
//! | 422  | 검증 실패 |
//! | 500  | 기타 |

use super::manager::PluginManager;
use agora_foundation::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub const CODE_OK: u16 = 0;
pub const CODE_PARTIAL: u16 = 207;
pub const CODE_FORBIDDEN: u16 = 403;
pub const CODE_VALIDATION: u16 = 422;

/// 응답 봉투
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T = Value> {
    pub success: bool,
    pub code: u16,
    pub message: String,
    pub data: Option<T>,
}

impl ApiResponse<Value> {
    pub fn ok(message: impl Into<String>, data: Value) -> Self {
        Self {
            success: true,
            code: CODE_OK,
            message: message.into(),
            data: Some(data),
        }
    }

    /// 성공했지만 일부 항목이 실패
    pub fn partial(message: impl Into<String>, data: Value) -> Self {
        Self {
            success: true,
            code: CODE_PARTIAL,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn error(err: &Error) -> Self {
        let data = match err {
            Error::SecurityCheckFailed { errors, .. } => Some(serde_json::json!({
                "valid": false,
                "errors": errors,
            })),
            Error::PartialFailure { succeeded, failed } => Some(serde_json::json!({
                "succeeded": succeeded,
                "failed": failed,
            })),
            _ => None,
        };

        Self {
            success: false,
            code: err.status_code(),
            message: err.to_string(),
            data,
        }
    }

    fn from_result<T: Serialize>(
        result: Result<T>,
        message: impl FnOnce(&T) -> String,
        partial: impl FnOnce(&T) -> bool,
    ) -> Self {
        let value = match result {
            Ok(value) => value,
            Err(e) => return Self::error(&e),
        };

        let message = message(&value);
        let is_partial = partial(&value);
        match serde_json::to_value(&value) {
            Ok(data) if is_partial => Self::partial(message, data),
            Ok(data) => Self::ok(message, data),
            Err(e) => Self::error(&Error::Json(e)),
        }
    }
}

/// 관리 API
pub struct ManagementApi {
    manager: Arc<PluginManager>,
}

impl ManagementApi {
    pub fn new(manager: Arc<PluginManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<PluginManager> {
        &self.manager
    }

    pub async fn list(&self) -> ApiResponse {
        ApiResponse::from_result(
            self.manager.get_plugin_list().await,
            |list| format!("{} plugins", list.len()),
            |_| false,
        )
    }

    /// 디스커버리 (`force`면 레코드를 지우고 다시 스캔)
    pub async fn discover(&self, force: bool) -> ApiResponse {
        let result = if force {
            self.manager.refresh().await
        } else {
            Ok(self.manager.discover().await)
        };

        ApiResponse::from_result(
            result,
            |report| {
                format!(
                    "{} plugins discovered, {} failed",
                    report.registered.len(),
                    report.failed.len()
                )
            },
            |report| !report.is_complete(),
        )
    }

    pub async fn status(&self) -> ApiResponse {
        let status = self.manager.discovery_status();
        let summary = self.manager.summary().await;

        ApiResponse::from_result(
            summary.map(|summary| serde_json::json!({
                "discovery": status,
                "summary": summary,
            })),
            |_| "ok".to_string(),
            |_| false,
        )
    }

    pub async fn install(&self, name: &str) -> ApiResponse {
        ApiResponse::from_result(
            self.manager.install_plugin(name).await,
            |outcome| {
                if outcome.already_installed {
                    format!("Plugin {} is already installed", name)
                } else {
                    format!("Plugin {} installed", name)
                }
            },
            |_| false,
        )
    }

    pub async fn uninstall(&self, name: &str) -> ApiResponse {
        ApiResponse::from_result(
            self.manager.uninstall_plugin(name).await,
            |outcome| match &outcome.script_error {
                Some(e) => format!("Plugin {} uninstalled (uninstall script failed: {})", name, e),
                None => format!("Plugin {} uninstalled", name),
            },
            |_| false,
        )
    }

    /// 활성화 (일부 capability 등록 실패는 207)
    pub async fn enable(&self, name: &str) -> ApiResponse {
        ApiResponse::from_result(
            self.manager.enable_plugin(name).await,
            |outcome| {
                if outcome.already_enabled {
                    format!("Plugin {} is already enabled", name)
                } else {
                    format!(
                        "Plugin {} enabled ({} channels, {} failed)",
                        name,
                        outcome.registration.registered.len(),
                        outcome.registration.failed.len()
                    )
                }
            },
            |outcome| !outcome.registration.is_complete(),
        )
    }

    pub async fn disable(&self, name: &str) -> ApiResponse {
        ApiResponse::from_result(
            self.manager.disable_plugin(name).await,
            |outcome| {
                if outcome.already_disabled {
                    format!("Plugin {} is already disabled", name)
                } else {
                    format!("Plugin {} disabled", name)
                }
            },
            |outcome| outcome.hook_error.is_some() || !outcome.unregistration.is_complete(),
        )
    }

    /// 보안 검사 (유효하지 않으면 403, data는 보고서)
    pub async fn security_check(&self, name: &str) -> ApiResponse {
        match self.manager.perform_security_check(name).await {
            Ok(report) if !report.valid => ApiResponse {
                success: false,
                code: CODE_FORBIDDEN,
                message: format!("Plugin {} failed the security check", name),
                data: serde_json::to_value(&report).ok(),
            },
            result => ApiResponse::from_result(
                result,
                |report| format!("Plugin {} passed ({} warnings)", name, report.warnings.len()),
                |_| false,
            ),
        }
    }

    pub async fn get_configs(&self, name: &str) -> ApiResponse {
        ApiResponse::from_result(
            self.manager.get_plugin_configs(name),
            |groups| format!("{} config groups", groups.len()),
            |_| false,
        )
    }

    /// 설정 갱신 (일부 실패 207, 전부 실패 422)
    pub async fn set_configs(&self, name: &str, values: &HashMap<String, Value>) -> ApiResponse {
        let report = match self.manager.set_plugin_configs(name, values).await {
            Ok(report) => report,
            Err(e) => return ApiResponse::error(&e),
        };

        let data = serde_json::to_value(&report).ok();
        let message = format!(
            "{} updated, {} rejected",
            report.success.len(),
            report.failed.len()
        );

        let (success, code) = match (report.success.is_empty(), report.failed.is_empty()) {
            (_, true) => (true, CODE_OK),
            (true, false) => (false, CODE_VALIDATION),
            (false, false) => (true, CODE_PARTIAL),
        };
        ApiResponse {
            success,
            code,
            message,
            data,
        }
    }

    pub async fn reset_configs(&self, name: &str) -> ApiResponse {
        match self.manager.reset_plugin_configs(name).await {
            Ok(true) => ApiResponse::ok(format!("Plugin {} config reset", name), Value::Bool(true)),
            Ok(false) => ApiResponse::error(&Error::NotFound(format!(
                "Plugin {} has no config entries",
                name
            ))),
            Err(e) => ApiResponse::error(&e),
        }
    }

    pub async fn channels(&self) -> ApiResponse {
        let channels = self.manager.channels().describe();
        ApiResponse::from_result(
            Ok(channels),
            |channels| format!("{} channels", channels.len()),
            |_| false,
        )
    }

    pub async fn reconcile(&self) -> ApiResponse {
        ApiResponse::from_result(
            self.manager.reconcile().await,
            |report| {
                format!(
                    "{} channels registered, {} removed",
                    report.registered.len(),
                    report.removed.len()
                )
            },
            |report| !report.failed.is_empty(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_envelope() {
        let response = ApiResponse::error(&Error::security_check_failed(
            "sms",
            vec!["entry missing".to_string()],
        ));
        assert!(!response.success);
        assert_eq!(response.code, 403);
        assert_eq!(
            response.data.unwrap()["errors"],
            serde_json::json!(["entry missing"])
        );

        let response = ApiResponse::error(&Error::NotFound("ghost".into()));
        assert_eq!(response.code, 404);
        assert!(response.data.is_none());
    }

    #[test]
    fn test_partial_envelope() {
        let response = ApiResponse::from_result(
            Ok(vec![1, 2]),
            |v| format!("{} items", v.len()),
            |v| v.len() > 1,
        );
        assert!(response.success);
        assert_eq!(response.code, CODE_PARTIAL);
        assert_eq!(response.message, "2 items");
    }
}
