//! Error types for Agora
//!
//! 플러그인 시스템의 모든 에러를 중앙에서 관리

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Agora 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // 설정 관련
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // 저장소 관련 (영속성 협력자)
    // ========================================================================
    #[error("Storage error: {0}")]
    Storage(String),

    // ========================================================================
    // 플러그인 관련
    // ========================================================================
    #[error("Plugin error: {0}")]
    Plugin(String),

    #[error("Security check failed for {plugin}: {}", errors.join("; "))]
    SecurityCheckFailed { plugin: String, errors: Vec<String> },

    #[error("Lifecycle hook {hook} failed for {plugin}: {message}")]
    LifecycleHook {
        plugin: String,
        hook: String,
        message: String,
    },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    // ========================================================================
    // Capability 관련
    // ========================================================================
    #[error("Capability error: {0}")]
    Capability(String),

    // ========================================================================
    // 배치 작업
    // ========================================================================
    #[error("Partial failure: {} succeeded, {} failed ({})", succeeded.len(), failed.len(), failed.join(", "))]
    PartialFailure {
        succeeded: Vec<String>,
        failed: Vec<String>,
    },

    // ========================================================================
    // 일반
    // ========================================================================
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Validation error: {0}")]
    Validation(String),

    // ========================================================================
    // 외부 에러 변환
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    // ========================================================================
    // 기타
    // ========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// 사용자에게 보여줄 수 있는 에러인지 확인
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_)
                | Error::InvalidInput(_)
                | Error::Validation(_)
                | Error::InvalidState(_)
                | Error::SecurityCheckFailed { .. }
                | Error::LifecycleHook { .. }
                | Error::PartialFailure { .. }
        )
    }

    /// 영속성 계층 에러인지 확인
    pub fn is_persistence(&self) -> bool {
        matches!(self, Error::Storage(_) | Error::Sqlite(_))
    }

    /// 관리 API 응답 코드
    pub fn status_code(&self) -> u16 {
        match self {
            Error::NotFound(_) => 404,
            Error::SecurityCheckFailed { .. } => 403,
            Error::InvalidState(_) => 409,
            Error::InvalidInput(_) | Error::Validation(_) | Error::Capability(_) => 422,
            Error::PartialFailure { .. } => 207,
            _ => 500,
        }
    }

    /// Lifecycle hook 에러 생성 헬퍼
    pub fn lifecycle_hook(
        plugin: impl Into<String>,
        hook: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::LifecycleHook {
            plugin: plugin.into(),
            hook: hook.into(),
            message: message.into(),
        }
    }

    /// 보안 검사 실패 에러 생성 헬퍼
    pub fn security_check_failed(plugin: impl Into<String>, errors: Vec<String>) -> Self {
        Error::SecurityCheckFailed {
            plugin: plugin.into(),
            errors,
        }
    }
}

// ============================================================================
// From 구현 (추가 변환)
// ============================================================================

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::NotFound("x".into()).status_code(), 404);
        assert_eq!(Error::security_check_failed("x", vec![]).status_code(), 403);
        assert_eq!(Error::InvalidState("x".into()).status_code(), 409);
        assert_eq!(Error::Validation("x".into()).status_code(), 422);
        assert_eq!(Error::Storage("x".into()).status_code(), 500);
    }

    #[test]
    fn test_security_message_joins_errors() {
        let err = Error::security_check_failed(
            "sms",
            vec!["entry missing".to_string(), "bad driver".to_string()],
        );
        assert_eq!(
            err.to_string(),
            "Security check failed for sms: entry missing; bad driver"
        );
        assert!(err.is_user_facing());
    }

    #[test]
    fn test_persistence_classification() {
        assert!(Error::Storage("disk".into()).is_persistence());
        assert!(!Error::Plugin("x".into()).is_persistence());
    }
}
