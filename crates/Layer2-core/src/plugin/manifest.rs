//! Plugin Manifest - 플러그인 메타데이터 정의
//!
//! 플러그인 디렉토리의 `plugin.json` (주석 허용) 또는 `plugin.toml`을 파싱해서
//! `PluginDescriptor`를 만듭니다. 디스커버리 스캔마다 새로 만들어지며 부분 갱신되지 않습니다.

use crate::capability::CapabilityInterface;
use agora_foundation::{ConfigFieldType, ConfigValidation, Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use tokio::fs;

/// JSON 매니페스트 파일명
pub const MANIFEST_JSON: &str = "plugin.json";

/// TOML 매니페스트 파일명
pub const MANIFEST_TOML: &str = "plugin.toml";

/// 플러그인 버전
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct PluginVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl PluginVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    /// 버전 문자열 파싱 (예: "1.2.3", "v1.2.3")
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().trim_start_matches('v');
        let mut parts = s.splitn(3, '.');

        let major = parts.next()?.parse().ok()?;
        let minor = parts.next()?.parse().ok()?;
        // pre-release/build 접미사는 무시 (예: 1.0.0-beta)
        let patch = parts
            .next()?
            .split(|c: char| c == '-' || c == '+')
            .next()?
            .parse()
            .ok()?;

        Some(Self { major, minor, patch })
    }

    /// 호환성 검사 (같은 메이저 버전)
    pub fn is_compatible_with(&self, other: &PluginVersion) -> bool {
        self.major == other.major
    }
}

impl std::fmt::Display for PluginVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

// ============================================================================
// Config schema
// ============================================================================

/// 설정 필드 스키마
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFieldSchema {
    pub key: String,

    /// 비어 있으면 key를 사용
    #[serde(default)]
    pub label: String,

    #[serde(rename = "type", default = "default_field_type")]
    pub field_type: ConfigFieldType,

    #[serde(default)]
    pub default: Value,

    #[serde(default)]
    pub options: Vec<Value>,

    #[serde(default)]
    pub required: bool,

    #[serde(default)]
    pub readonly: bool,

    #[serde(default)]
    pub validation: ConfigValidation,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// 비어 있으면 그룹 내 선언 순서
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
}

fn default_field_type() -> ConfigFieldType {
    ConfigFieldType::Text
}

impl ConfigFieldSchema {
    pub fn new(key: impl Into<String>, field_type: ConfigFieldType) -> Self {
        Self {
            key: key.into(),
            label: String::new(),
            field_type,
            default: Value::Null,
            options: Vec::new(),
            required: false,
            readonly: false,
            validation: ConfigValidation::default(),
            description: None,
            order: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = default;
        self
    }

    pub fn with_options(mut self, options: Vec<Value>) -> Self {
        self.options = options;
        self
    }

    pub fn with_validation(mut self, validation: ConfigValidation) -> Self {
        self.validation = validation;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    pub fn display_label(&self) -> &str {
        if self.label.is_empty() {
            &self.key
        } else {
            &self.label
        }
    }
}

/// 설정 그룹 스키마
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigGroupSchema {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default)]
    pub fields: Vec<ConfigFieldSchema>,
}

impl ConfigGroupSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: ConfigFieldSchema) -> Self {
        self.fields.push(field);
        self
    }
}

// ============================================================================
// PluginDescriptor
// ============================================================================

/// 플러그인 디스크립터 - 매니페스트에서 만들어진 플러그인의 정적 정보
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginDescriptor {
    /// 고유 플러그인 이름 (예: "aliyun-sms")
    pub name: String,

    pub version: String,

    /// EntryCatalog의 엔트리 클래스 이름
    pub entry: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// 선언된 capability (예: "sms_channel_provider")
    #[serde(default)]
    pub capabilities: BTreeSet<String>,

    #[serde(default)]
    pub tags: BTreeSet<String>,

    /// 의존성 선언 (참고용, 예: "base-auth@1.0")
    #[serde(default)]
    pub requirements: Vec<String>,

    /// 설정 스키마
    #[serde(default)]
    pub config: Vec<ConfigGroupSchema>,
}

impl PluginDescriptor {
    pub fn new(name: impl Into<String>, version: impl Into<String>, entry: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            entry: entry.into(),
            description: String::new(),
            author: None,
            capabilities: BTreeSet::new(),
            tags: BTreeSet::new(),
            requirements: Vec::new(),
            config: Vec::new(),
        }
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.insert(capability.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_requirement(mut self, requirement: impl Into<String>) -> Self {
        self.requirements.push(requirement.into());
        self
    }

    pub fn with_config_group(mut self, group: ConfigGroupSchema) -> Self {
        self.config.push(group);
        self
    }

    // ========================================================================
    // 파싱
    // ========================================================================

    /// plugin.json 파싱 (`//`, `/* */` 주석 허용)
    pub fn from_json_str(content: &str) -> Result<Self> {
        let content = strip_json_comments(content);
        let descriptor: Self = serde_json::from_str(&content)
            .map_err(|e| Error::Validation(format!("Invalid {}: {}", MANIFEST_JSON, e)))?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// plugin.toml 파싱
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let descriptor: Self = toml::from_str(content)
            .map_err(|e| Error::Validation(format!("Invalid {}: {}", MANIFEST_TOML, e)))?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// 디렉토리에서 매니페스트 로드 (plugin.json 우선)
    ///
    /// 매니페스트 파일이 없으면 `None`.
    pub async fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let json_path = dir.join(MANIFEST_JSON);
        if fs::try_exists(&json_path).await.unwrap_or(false) {
            let content = fs::read_to_string(&json_path).await?;
            return Self::from_json_str(&content).map(Some);
        }

        let toml_path = dir.join(MANIFEST_TOML);
        if fs::try_exists(&toml_path).await.unwrap_or(false) {
            let content = fs::read_to_string(&toml_path).await?;
            return Self::from_toml_str(&content).map(Some);
        }

        Ok(None)
    }

    // ========================================================================
    // 검증
    // ========================================================================

    /// 플러그인 이름 형식: `[A-Za-z0-9][A-Za-z0-9_-]*`
    ///
    /// `.`은 채널 키 `plugin.<name>.<type>`의 구분자라서 허용하지 않습니다.
    pub fn is_valid_name(name: &str) -> bool {
        let mut chars = name.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphanumeric() => {}
            _ => return false,
        }
        chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
    }

    /// 구조 검증
    pub fn validate(&self) -> Result<()> {
        if !Self::is_valid_name(&self.name) {
            return Err(Error::Validation(format!(
                "Invalid plugin name '{}'",
                self.name
            )));
        }
        if self.version.trim().is_empty() {
            return Err(Error::Validation(format!(
                "Plugin {} has no version",
                self.name
            )));
        }
        if self.entry.trim().is_empty() {
            return Err(Error::Validation(format!(
                "Plugin {} has no entry class",
                self.name
            )));
        }

        let mut keys = HashSet::new();
        for group in &self.config {
            for field in &group.fields {
                if field.key.trim().is_empty() {
                    return Err(Error::Validation(format!(
                        "Plugin {} has a config field without key in group '{}'",
                        self.name, group.name
                    )));
                }
                if !keys.insert(field.key.as_str()) {
                    return Err(Error::Validation(format!(
                        "Plugin {} declares config key '{}' more than once",
                        self.name, field.key
                    )));
                }
                if field.field_type == ConfigFieldType::Select && field.options.is_empty() {
                    return Err(Error::Validation(format!(
                        "Select field '{}' of plugin {} has no options",
                        field.key, self.name
                    )));
                }
            }
        }

        Ok(())
    }

    // ========================================================================
    // 유틸리티
    // ========================================================================

    /// 선언된 capability 중 코어가 아는 인터페이스
    pub fn declared_interfaces(&self) -> Vec<CapabilityInterface> {
        self.capabilities
            .iter()
            .filter_map(|c| CapabilityInterface::parse(c))
            .collect()
    }

    /// 의존성 선언에서 플러그인 이름만 추출
    pub fn requirement_names(&self) -> Vec<&str> {
        self.requirements
            .iter()
            .filter_map(|r| {
                r.split(|c: char| c == '@' || c == '>' || c == '<' || c == '=' || c.is_whitespace())
                    .next()
                    .filter(|name| !name.is_empty())
            })
            .collect()
    }

    pub fn parsed_version(&self) -> Option<PluginVersion> {
        PluginVersion::parse(&self.version)
    }
}

// ============================================================================
// JSON 주석 제거
// ============================================================================

/// JSON에서 `//` 라인 주석과 `/* */` 블록 주석 제거 (문자열 내부는 유지)
pub fn strip_json_comments(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            output.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        output.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        let next = chars.peek().copied();
        match (c, next) {
            ('"', _) => {
                in_string = true;
                output.push(c);
            }
            ('/', Some('/')) => {
                // 라인 주석: 개행은 유지
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        output.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for skipped in chars.by_ref() {
                    if prev == '*' && skipped == '/' {
                        break;
                    }
                    prev = skipped;
                }
            }
            _ => output.push(c),
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAMPLE_JSON: &str = r#"
    {
        // 알리윤 SMS 플러그인
        "name": "aliyun-sms",
        "version": "1.2.0",
        "entry": "AliyunSmsPlugin",
        "description": "SMS via https://dysms.example.com", /* URL 안의 // 는 유지 */
        "capabilities": ["sms_channel_provider"],
        "tags": ["sms", "china"],
        "requirements": ["base-auth@1.0"],
        "config": [
            {
                "name": "basic",
                "fields": [
                    {"key": "access_key", "type": "password", "required": true},
                    {"key": "region", "type": "select", "default": "cn",
                     "options": [{"label": "China", "value": "cn"}, "intl"]}
                ]
            }
        ]
    }
    "#;

    #[test]
    fn test_version_parse() {
        let v = PluginVersion::parse("1.2.3").unwrap();
        assert_eq!(v, PluginVersion::new(1, 2, 3));
        assert_eq!(PluginVersion::parse("v2.0.1-beta"), Some(PluginVersion::new(2, 0, 1)));
        assert!(PluginVersion::parse("1.2").is_none());
    }

    #[test]
    fn test_version_compatibility() {
        let v1 = PluginVersion::new(1, 0, 0);
        assert!(v1.is_compatible_with(&PluginVersion::new(1, 2, 0)));
        assert!(!v1.is_compatible_with(&PluginVersion::new(2, 0, 0)));
    }

    #[test]
    fn test_parse_json_with_comments() {
        let descriptor = PluginDescriptor::from_json_str(SAMPLE_JSON).unwrap();
        assert_eq!(descriptor.name, "aliyun-sms");
        assert_eq!(descriptor.description, "SMS via https://dysms.example.com");
        assert_eq!(
            descriptor.declared_interfaces(),
            vec![CapabilityInterface::SmsChannelProvider]
        );
        assert_eq!(descriptor.requirement_names(), vec!["base-auth"]);

        let fields = &descriptor.config[0].fields;
        assert_eq!(fields[0].field_type, ConfigFieldType::Password);
        assert_eq!(fields[0].display_label(), "access_key");
        assert_eq!(fields[1].default, json!("cn"));
    }

    #[test]
    fn test_parse_toml() {
        let content = r#"
            name = "local-oss"
            version = "0.3.0"
            entry = "LocalOssPlugin"
            capabilities = ["object_storage_provider"]

            [[config]]
            name = "storage"

            [[config.fields]]
            key = "root"
            type = "text"
            default = "/var/lib/agora"
        "#;

        let descriptor = PluginDescriptor::from_toml_str(content).unwrap();
        assert_eq!(descriptor.entry, "LocalOssPlugin");
        assert_eq!(descriptor.config[0].fields[0].default, json!("/var/lib/agora"));
    }

    #[test]
    fn test_validation() {
        assert!(PluginDescriptor::is_valid_name("vendor-sms_v2"));
        assert!(!PluginDescriptor::is_valid_name(".hidden"));
        assert!(!PluginDescriptor::is_valid_name("a.b"));
        assert!(PluginDescriptor::new("a.b", "1.0.0", "AB").validate().is_err());
        assert!(!PluginDescriptor::is_valid_name("has space"));

        let duplicate = PluginDescriptor::new("dup", "1.0.0", "Dup").with_config_group(
            ConfigGroupSchema::new("basic")
                .with_field(ConfigFieldSchema::new("key", ConfigFieldType::Text))
                .with_field(ConfigFieldSchema::new("key", ConfigFieldType::Number)),
        );
        assert!(duplicate.validate().is_err());

        let no_entry = PluginDescriptor::new("x", "1.0.0", "");
        assert!(no_entry.validate().is_err());
    }

    #[test]
    fn test_strip_comments_keeps_strings() {
        let input = r#"{"a": "x // y", /* c */ "b": "\"/*\"" // tail
        }"#;
        let stripped = strip_json_comments(input);
        let value: Value = serde_json::from_str(&stripped).unwrap();
        assert_eq!(value["a"], "x // y");
        assert_eq!(value["b"], "\"/*\"");
    }

    #[tokio::test]
    async fn test_load_from_dir() {
        let temp = tempfile::TempDir::new().unwrap();
        assert!(PluginDescriptor::load_from_dir(temp.path()).await.unwrap().is_none());

        std::fs::write(temp.path().join(MANIFEST_JSON), SAMPLE_JSON).unwrap();
        let descriptor = PluginDescriptor::load_from_dir(temp.path())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(descriptor.version, "1.2.0");
    }
}
