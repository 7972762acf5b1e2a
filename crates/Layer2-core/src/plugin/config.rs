//! Config Schema Store - 스키마 기반 플러그인 설정
//!
//! 매니페스트의 설정 스키마로 항목을 만들고, 값 갱신 시 항목별 규칙으로 검증합니다.
//! 일괄 갱신은 키 단위로 성공/실패가 나뉩니다.

use super::events::{EventBus, EventType, PluginEvent};
use super::manifest::ConfigGroupSchema;
use agora_foundation::{ConfigEntry, ConfigFieldType, RecordStore, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

const EVENT_SOURCE: &str = "config_store";

// ============================================================================
// Types
// ============================================================================

/// 그룹 단위 설정 항목
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigGroup {
    pub name: String,
    pub entries: Vec<ConfigEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFailure {
    pub key: String,
    pub reason: String,
}

/// 일괄 갱신 결과
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigUpdateReport {
    pub success: Vec<String>,
    pub failed: Vec<ConfigFailure>,
}

impl ConfigUpdateReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

// ============================================================================
// ConfigSchemaStore
// ============================================================================

pub struct ConfigSchemaStore {
    records: Arc<dyn RecordStore>,
    event_bus: Arc<EventBus>,
}

impl ConfigSchemaStore {
    pub fn new(records: Arc<dyn RecordStore>, event_bus: Arc<EventBus>) -> Self {
        Self { records, event_bus }
    }

    /// 스키마로 설정 항목 생성
    ///
    /// 이미 있는 항목은 메타데이터만 갱신하고 값은 유지합니다.
    /// 새로 만든 항목 수를 반환합니다.
    pub fn seed_from_schema(&self, plugin_name: &str, groups: &[ConfigGroupSchema]) -> Result<usize> {
        let mut created = 0;

        for group in groups {
            for (index, field) in group.fields.iter().enumerate() {
                let existing = self.records.find_config_entry(plugin_name, &field.key)?;
                let value = match &existing {
                    Some(entry) => entry.value.clone(),
                    None => {
                        created += 1;
                        field.default.clone()
                    }
                };

                self.records.upsert_config_entry(&ConfigEntry {
                    plugin_name: plugin_name.to_string(),
                    key: field.key.clone(),
                    label: field.display_label().to_string(),
                    field_type: field.field_type,
                    value,
                    default: field.default.clone(),
                    options: field.options.clone(),
                    group: group.name.clone(),
                    order: field.order.unwrap_or(index as i64),
                    required: field.required,
                    readonly: field.readonly,
                    validation: field.validation.clone(),
                    description: field.description.clone(),
                })?;
            }
        }

        debug!("Seeded {} new config entries for {}", created, plugin_name);
        Ok(created)
    }

    /// 그룹별 설정 항목 (그룹 이름, order 순)
    pub fn get_plugin_configs(&self, plugin_name: &str) -> Result<Vec<ConfigGroup>> {
        let mut groups: Vec<ConfigGroup> = Vec::new();

        for entry in self.records.list_config_entries(plugin_name)? {
            match groups.last_mut() {
                Some(group) if group.name == entry.group => group.entries.push(entry),
                _ => groups.push(ConfigGroup {
                    name: entry.group.clone(),
                    entries: vec![entry],
                }),
            }
        }

        Ok(groups)
    }

    /// 설정 값 조회 (없거나 null이면 `default`)
    pub fn get_plugin_config_value(&self, plugin_name: &str, key: &str, default: Value) -> Value {
        match self.records.find_config_entry(plugin_name, key) {
            Ok(Some(entry)) if !entry.value.is_null() => entry.value,
            Ok(_) => default,
            Err(e) => {
                warn!("Failed to read config {}.{}: {}", plugin_name, key, e);
                default
            }
        }
    }

    /// 훅과 드라이버에 넘기는 설정 스냅샷
    pub fn settings(&self, plugin_name: &str) -> Result<HashMap<String, Value>> {
        Ok(self
            .records
            .list_config_entries(plugin_name)?
            .into_iter()
            .map(|entry| (entry.key, entry.value))
            .collect())
    }

    /// 여러 키 갱신 (키 단위 검증, 부분 성공)
    pub async fn set_plugin_configs(
        &self,
        plugin_name: &str,
        values: &HashMap<String, Value>,
    ) -> Result<ConfigUpdateReport> {
        let mut keys: Vec<&String> = values.keys().collect();
        keys.sort();

        let mut report = ConfigUpdateReport::default();
        for key in keys {
            let value = &values[key];

            let entry = match self.records.find_config_entry(plugin_name, key)? {
                Some(entry) => entry,
                None => {
                    report.failed.push(ConfigFailure {
                        key: key.clone(),
                        reason: "unknown config key".to_string(),
                    });
                    continue;
                }
            };

            if let Err(reason) = validate_value(&entry, value) {
                report.failed.push(ConfigFailure {
                    key: key.clone(),
                    reason,
                });
                continue;
            }

            if self.records.update_config_value(plugin_name, key, value)? {
                report.success.push(key.clone());
            } else {
                report.failed.push(ConfigFailure {
                    key: key.clone(),
                    reason: "config entry disappeared".to_string(),
                });
            }
        }

        if !report.success.is_empty() {
            self.event_bus
                .publish(PluginEvent::for_plugin(
                    EventType::ConfigChanged,
                    plugin_name,
                    serde_json::json!({ "keys": report.success }),
                    EVENT_SOURCE,
                ))
                .await;
        }

        info!(
            "Plugin {} config: {} updated, {} rejected",
            plugin_name,
            report.success.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// 모든 값을 기본값으로 (항목이 하나도 없으면 `false`)
    pub async fn reset_plugin_configs(&self, plugin_name: &str) -> Result<bool> {
        let count = self.records.reset_config_values(plugin_name)?;
        if count == 0 {
            return Ok(false);
        }

        self.event_bus
            .publish(PluginEvent::for_plugin(
                EventType::ConfigReset,
                plugin_name,
                serde_json::json!({ "entries": count }),
                EVENT_SOURCE,
            ))
            .await;

        info!("Reset {} config entries for {}", count, plugin_name);
        Ok(true)
    }
}

// ============================================================================
// 검증
// ============================================================================

/// 항목 규칙으로 값 검증, 실패 사유 반환
pub fn validate_value(entry: &ConfigEntry, value: &Value) -> std::result::Result<(), String> {
    if entry.readonly {
        return Err("field is readonly".to_string());
    }
    if entry.field_type == ConfigFieldType::Button {
        return Err("button fields have no value".to_string());
    }

    if is_empty_value(value) {
        return if entry.required {
            Err("value is required".to_string())
        } else {
            Ok(())
        };
    }

    match entry.field_type {
        ConfigFieldType::Boolean => {
            if !value.is_boolean() {
                return Err("expected a boolean".to_string());
            }
        }
        ConfigFieldType::Number => {
            let number = value.as_f64().ok_or("expected a number")?;
            if let Some(min) = entry.validation.min {
                if number < min {
                    return Err(format!("must be at least {}", min));
                }
            }
            if let Some(max) = entry.validation.max {
                if number > max {
                    return Err(format!("must be at most {}", max));
                }
            }
        }
        ConfigFieldType::Select => {
            if !entry.option_values().contains(&value) {
                return Err("value is not one of the options".to_string());
            }
        }
        ConfigFieldType::Table => {
            if !value.is_array() {
                return Err("expected an array of rows".to_string());
            }
        }
        ConfigFieldType::Text | ConfigFieldType::Textarea | ConfigFieldType::Password => {
            let text = value.as_str().ok_or("expected a string")?;
            validate_text(entry, text)?;
        }
        ConfigFieldType::Button => {}
    }

    Ok(())
}

fn validate_text(entry: &ConfigEntry, text: &str) -> std::result::Result<(), String> {
    let length = text.chars().count();
    if let Some(min) = entry.validation.min_length {
        if length < min {
            return Err(format!("must be at least {} characters", min));
        }
    }
    if let Some(max) = entry.validation.max_length {
        if length > max {
            return Err(format!("must be at most {} characters", max));
        }
    }
    if let Some(pattern) = &entry.validation.pattern {
        let regex = Regex::new(pattern).map_err(|e| format!("invalid pattern: {}", e))?;
        if !regex.is_match(text) {
            return Err(format!("does not match pattern {}", pattern));
        }
    }
    Ok(())
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::manifest::ConfigFieldSchema;
    use agora_foundation::{ConfigValidation, MemoryStore};
    use serde_json::json;

    fn schema() -> Vec<ConfigGroupSchema> {
        vec![
            ConfigGroupSchema::new("basic")
                .with_field(
                    ConfigFieldSchema::new("access_key", ConfigFieldType::Password)
                        .with_label("Access Key")
                        .required(),
                )
                .with_field(
                    ConfigFieldSchema::new("sign_name", ConfigFieldType::Text)
                        .with_default(json!("Agora"))
                        .with_validation(ConfigValidation {
                            pattern: Some("^[A-Za-z]+$".to_string()),
                            max_length: Some(12),
                            ..Default::default()
                        }),
                ),
            ConfigGroupSchema::new("limits")
                .with_field(
                    ConfigFieldSchema::new("daily_limit", ConfigFieldType::Number)
                        .with_default(json!(100))
                        .with_validation(ConfigValidation {
                            min: Some(1.0),
                            max: Some(1000.0),
                            ..Default::default()
                        }),
                )
                .with_field(
                    ConfigFieldSchema::new("region", ConfigFieldType::Select)
                        .with_default(json!("cn"))
                        .with_options(vec![json!({"label": "China", "value": "cn"}), json!("us")]),
                )
                .with_field(
                    ConfigFieldSchema::new("provider_id", ConfigFieldType::Text)
                        .with_default(json!("sms-1"))
                        .readonly(),
                ),
        ]
    }

    fn store() -> ConfigSchemaStore {
        let store = ConfigSchemaStore::new(Arc::new(MemoryStore::new()), Arc::new(EventBus::new()));
        store.seed_from_schema("sms", &schema()).unwrap();
        store
    }

    #[test]
    fn test_seed_preserves_existing_values() {
        let store = store();
        store
            .records
            .update_config_value("sms", "sign_name", &json!("Custom"))
            .unwrap();

        assert_eq!(store.seed_from_schema("sms", &schema()).unwrap(), 0);
        assert_eq!(
            store.get_plugin_config_value("sms", "sign_name", Value::Null),
            json!("Custom")
        );
    }

    #[test]
    fn test_grouped_and_ordered() {
        let groups = store().get_plugin_configs("sms").unwrap();
        let names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["basic", "limits"]);

        let keys: Vec<&str> = groups[1].entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["daily_limit", "region", "provider_id"]);
    }

    #[tokio::test]
    async fn test_partial_update() {
        let store = store();
        let mut values = HashMap::new();
        values.insert("access_key".to_string(), json!("AK123"));
        values.insert("daily_limit".to_string(), json!(5000));
        values.insert("region".to_string(), json!("us"));
        values.insert("provider_id".to_string(), json!("sms-2"));
        values.insert("unknown".to_string(), json!(1));

        let report = store.set_plugin_configs("sms", &values).await.unwrap();
        assert_eq!(report.success, vec!["access_key", "region"]);

        let failed: Vec<&str> = report.failed.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(failed, vec!["daily_limit", "provider_id", "unknown"]);
        assert_eq!(
            store.get_plugin_config_value("sms", "daily_limit", Value::Null),
            json!(100)
        );
    }

    #[tokio::test]
    async fn test_reset_restores_defaults() {
        let store = store();
        let mut values = HashMap::new();
        values.insert("sign_name".to_string(), json!("Other"));
        values.insert("access_key".to_string(), json!("AK"));
        store.set_plugin_configs("sms", &values).await.unwrap();

        assert!(store.reset_plugin_configs("sms").await.unwrap());
        for group in store.get_plugin_configs("sms").unwrap() {
            assert!(group.entries.iter().all(|e| e.value == e.default));
        }
        assert!(!store.reset_plugin_configs("unknown").await.unwrap());
    }

    #[test]
    fn test_validate_text_rules() {
        let store = store();
        let entry = store
            .records
            .find_config_entry("sms", "sign_name")
            .unwrap()
            .unwrap();

        assert!(validate_value(&entry, &json!("Agora")).is_ok());
        assert!(validate_value(&entry, &json!("Agora1")).is_err());
        assert!(validate_value(&entry, &json!("Abcdefghijklm")).is_err());
        assert!(validate_value(&entry, &json!(42)).is_err());
        assert!(validate_value(&entry, &Value::Null).is_ok());

        let required = store
            .records
            .find_config_entry("sms", "access_key")
            .unwrap()
            .unwrap();
        assert_eq!(
            validate_value(&required, &json!("  ")),
            Err("value is required".to_string())
        );
    }
}
