//! 플러그인 레코드 타입
//!
//! 영속성 협력자(`RecordStore`)가 다루는 레코드:
//! - `DiscoveryRecord`: 디스커버리 스캔 결과
//! - `InstallationRecord`: 설치/활성화 라이프사이클 상태
//! - `ConfigEntry`: 스키마 기반 플러그인 설정 항목
//! - `SchemaMigration` / `AppliedMigration`: 플러그인 스키마 마이그레이션

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// DiscoveryRecord
// ============================================================================

/// 디스커버리 레코드 (플러그인 이름당 하나)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryRecord {
    pub plugin_name: String,
    pub version: String,
    pub entry: String,
    pub path: String,
    pub scope: String,
    /// 파싱된 매니페스트 (JSON)
    pub manifest: Value,
    pub discovered_at: DateTime<Utc>,
}

// ============================================================================
// InstallationRecord
// ============================================================================

/// 설치 레코드
///
/// `enabled == true`이면 항상 `installed == true`입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallationRecord {
    pub plugin_name: String,
    pub version: String,
    pub installed: bool,
    pub enabled: bool,
    pub installed_at: Option<DateTime<Utc>>,
    pub enabled_at: Option<DateTime<Utc>>,
    pub disabled_at: Option<DateTime<Utc>>,
    pub uninstalled_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl InstallationRecord {
    /// 새로 설치된 레코드 생성
    pub fn installed(plugin_name: impl Into<String>, version: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            plugin_name: plugin_name.into(),
            version: version.into(),
            installed: true,
            enabled: false,
            installed_at: Some(now),
            enabled_at: None,
            disabled_at: None,
            uninstalled_at: None,
            updated_at: now,
        }
    }

    /// 불변식 검사: enabled ⇒ installed
    pub fn is_consistent(&self) -> bool {
        !self.enabled || self.installed
    }
}

// ============================================================================
// ConfigEntry
// ============================================================================

/// 설정 필드 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigFieldType {
    Text,
    Textarea,
    Password,
    Select,
    Boolean,
    Number,
    Button,
    Table,
}

impl ConfigFieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Textarea => "textarea",
            Self::Password => "password",
            Self::Select => "select",
            Self::Boolean => "boolean",
            Self::Number => "number",
            Self::Button => "button",
            Self::Table => "table",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(Self::Text),
            "textarea" => Some(Self::Textarea),
            "password" => Some(Self::Password),
            "select" => Some(Self::Select),
            "boolean" => Some(Self::Boolean),
            "number" => Some(Self::Number),
            "button" => Some(Self::Button),
            "table" => Some(Self::Table),
            _ => None,
        }
    }

    /// 문자열 값을 받는 타입인지
    pub fn is_textual(&self) -> bool {
        matches!(self, Self::Text | Self::Textarea | Self::Password)
    }
}

impl std::fmt::Display for ConfigFieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 필드 검증 규칙
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigValidation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
}

impl ConfigValidation {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// 플러그인 설정 항목 (`plugin_name` + `key`가 유일)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigEntry {
    pub plugin_name: String,
    pub key: String,
    pub label: String,
    pub field_type: ConfigFieldType,
    pub value: Value,
    pub default: Value,
    #[serde(default)]
    pub options: Vec<Value>,
    pub group: String,
    pub order: i64,
    pub required: bool,
    pub readonly: bool,
    #[serde(default, skip_serializing_if = "ConfigValidation::is_empty")]
    pub validation: ConfigValidation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ConfigEntry {
    /// 값이 기본값과 같은지
    pub fn is_default(&self) -> bool {
        self.value == self.default
    }

    /// select 옵션의 실제 값 목록 (`{"value": ..}` 객체 또는 원시 값)
    pub fn option_values(&self) -> Vec<&Value> {
        self.options
            .iter()
            .map(|opt| opt.get("value").unwrap_or(opt))
            .collect()
    }
}

// ============================================================================
// Migration
// ============================================================================

/// 플러그인이 제공하는 스키마 마이그레이션
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaMigration {
    /// 플러그인 내에서 유일한 ID (예: "0001_create_sms_log")
    pub id: String,
    /// 실행할 SQL 문
    pub statements: String,
}

impl SchemaMigration {
    pub fn new(id: impl Into<String>, statements: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            statements: statements.into(),
        }
    }
}

/// 적용된 마이그레이션 기록
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedMigration {
    pub plugin_name: String,
    pub migration_id: String,
    pub applied_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_installed_record_is_consistent() {
        let record = InstallationRecord::installed("sms", "1.0.0");
        assert!(record.installed);
        assert!(!record.enabled);
        assert!(record.is_consistent());

        let broken = InstallationRecord {
            installed: false,
            enabled: true,
            ..record
        };
        assert!(!broken.is_consistent());
    }

    #[test]
    fn test_field_type_roundtrip_names() {
        for ty in [
            ConfigFieldType::Text,
            ConfigFieldType::Password,
            ConfigFieldType::Select,
            ConfigFieldType::Table,
        ] {
            assert_eq!(ConfigFieldType::parse(ty.as_str()), Some(ty));
        }
        assert_eq!(ConfigFieldType::parse("color"), None);
    }

    #[test]
    fn test_option_values() {
        let entry = ConfigEntry {
            plugin_name: "sms".into(),
            key: "region".into(),
            label: "Region".into(),
            field_type: ConfigFieldType::Select,
            value: serde_json::json!("cn"),
            default: serde_json::json!("cn"),
            options: vec![
                serde_json::json!({"label": "China", "value": "cn"}),
                serde_json::json!("us"),
            ],
            group: "basic".into(),
            order: 0,
            required: false,
            readonly: false,
            validation: ConfigValidation::default(),
            description: None,
        };

        let values = entry.option_values();
        assert_eq!(values, vec![&serde_json::json!("cn"), &serde_json::json!("us")]);
        assert!(entry.is_default());
    }
}
