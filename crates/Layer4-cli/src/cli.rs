//! Command runner
//!
//! 설정으로 저장소/레지스트리/매니저를 구성하고 서브커맨드를 관리 API 호출로 바꿉니다.

use crate::plugins;
use crate::{Command, ConfigAction, SmsAction};
use agora_core::capability::{register_builtins, ChannelRegistry, SmsDispatcher};
use agora_core::plugin::{ApiResponse, ManagementApi, PluginManager};
use agora_foundation::{AgoraConfig, Error, RecordStore, Storage};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct Runtime {
    api: ManagementApi,
    channels: Arc<ChannelRegistry>,
}

impl Runtime {
    /// 저장소를 열고 디스커버리 (+ 설정에 따라 reconcile)
    pub async fn start(config: &AgoraConfig) -> anyhow::Result<Self> {
        let records: Arc<dyn RecordStore> = if config.storage.in_memory {
            Arc::new(Storage::in_memory()?)
        } else {
            let data_dir = config.storage.resolved_data_dir()?;
            Arc::new(Storage::open(&data_dir, &config.storage.database_file)?)
        };

        let channels = Arc::new(ChannelRegistry::new());
        register_builtins(&channels)?;

        let manager = Arc::new(PluginManager::new(
            config.plugins.clone(),
            records,
            Arc::new(plugins::entry_catalog()?),
            Arc::new(plugins::driver_catalog()?),
            Arc::clone(&channels),
        ));

        let report = manager.initialize().await?;
        for failure in &report.failed {
            warn!("Skipped plugin {}: {}", failure.name, failure.error);
        }
        debug!("{} plugins discovered", report.registered.len());

        Ok(Self {
            api: ManagementApi::new(manager),
            channels,
        })
    }

    pub async fn execute(&self, command: Command) -> anyhow::Result<ApiResponse> {
        let api = &self.api;
        let response = match command {
            Command::List => api.list().await,
            Command::Discover { force } => api.discover(force).await,
            Command::Status => api.status().await,
            Command::Install { name } => api.install(&name).await,
            Command::Uninstall { name } => api.uninstall(&name).await,
            Command::Enable { name } => api.enable(&name).await,
            Command::Disable { name } => api.disable(&name).await,
            Command::Check { name } => api.security_check(&name).await,
            Command::Config { action } => match action {
                ConfigAction::Get { name } => api.get_configs(&name).await,
                ConfigAction::Set { name, values } => {
                    let values = parse_assignments(&values)?;
                    api.set_configs(&name, &values).await
                }
                ConfigAction::Reset { name } => api.reset_configs(&name).await,
            },
            Command::Channels => api.channels().await,
            Command::Reconcile => api.reconcile().await,
            Command::Sms { action } => match action {
                SmsAction::Send {
                    channel,
                    destination,
                    template,
                    params,
                } => {
                    let data = parse_assignments(&params)?;
                    self.send_sms(&channel, &destination, &template, &data).await
                }
            },
        };
        Ok(response)
    }

    async fn send_sms(
        &self,
        channel: &str,
        destination: &str,
        template: &str,
        data: &HashMap<String, Value>,
    ) -> ApiResponse {
        let dispatcher = SmsDispatcher::new(self.channels.reader());
        match dispatcher.send_via(channel, destination, template, data).await {
            Ok(outcome) if outcome.success => {
                ApiResponse::ok(outcome.message.clone(), serde_json::to_value(&outcome).unwrap_or_default())
            }
            Ok(outcome) => ApiResponse::error(&Error::Capability(format!(
                "SMS via {} failed: {}",
                channel, outcome.message
            ))),
            Err(e) => ApiResponse::error(&e),
        }
    }
}

/// `key=value` 목록 파싱 (값은 가능하면 JSON으로)
pub fn parse_assignments(items: &[String]) -> anyhow::Result<HashMap<String, Value>> {
    let mut values = HashMap::new();
    for item in items {
        let (key, raw) = item
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("Expected key=value, got '{}'", item))?;
        let key = key.trim();
        if key.is_empty() {
            anyhow::bail!("Empty key in '{}'", item);
        }

        let value =
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        values.insert(key.to_string(), value);
    }
    Ok(values)
}

/// 응답 출력
pub fn print_response(response: &ApiResponse, raw: bool) -> anyhow::Result<()> {
    if raw {
        println!("{}", serde_json::to_string_pretty(response)?);
        return Ok(());
    }

    let status = match (response.success, response.code) {
        (true, 207) => "!",
        (true, _) => "✓",
        (false, _) => "✗",
    };
    println!("{} {}", status, response.message);

    match &response.data {
        None | Some(Value::Null) | Some(Value::Bool(_)) => {}
        Some(data) => println!("{}", serde_json::to_string_pretty(data)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn in_memory_config(root: &std::path::Path) -> AgoraConfig {
        let mut config = AgoraConfig::default().in_memory_storage();
        config.plugins.search_paths.clear();
        config.plugins.reconcile_on_start = false;
        config.search_path(root, agora_foundation::PluginScope::Local)
    }

    #[test]
    fn test_parse_assignments() {
        let items = vec![
            "sign_name=Shop".to_string(),
            "limit=5".to_string(),
            "flag=true".to_string(),
            "note=a=b".to_string(),
        ];
        let values = parse_assignments(&items).unwrap();
        assert_eq!(values["sign_name"], json!("Shop"));
        assert_eq!(values["limit"], json!(5));
        assert_eq!(values["flag"], json!(true));
        assert_eq!(values["note"], json!("a=b"));

        assert!(parse_assignments(&["novalue".to_string()]).is_err());
        assert!(parse_assignments(&["=x".to_string()]).is_err());
    }

    #[tokio::test]
    async fn test_console_sms_end_to_end() {
        let temp = tempfile::TempDir::new().unwrap();
        let plugin_dir = temp.path().join("console-sms");
        std::fs::create_dir_all(&plugin_dir).unwrap();
        std::fs::write(
            plugin_dir.join("plugin.json"),
            include_str!("../plugins/console-sms/plugin.json"),
        )
        .unwrap();

        let runtime = Runtime::start(&in_memory_config(temp.path())).await.unwrap();

        let install = runtime
            .execute(Command::Install { name: "console-sms".into() })
            .await
            .unwrap();
        assert!(install.success, "{}", install.message);

        let enable = runtime
            .execute(Command::Enable { name: "console-sms".into() })
            .await
            .unwrap();
        assert_eq!(enable.code, 0);

        let sent = runtime
            .execute(Command::Sms {
                action: SmsAction::Send {
                    channel: "plugin.console-sms.sms".into(),
                    destination: "13800000000".into(),
                    template: "login".into(),
                    params: vec!["code=1234".into()],
                },
            })
            .await
            .unwrap();
        assert!(sent.success);

        let missing = runtime
            .execute(Command::Sms {
                action: SmsAction::Send {
                    channel: "plugin.ghost.sms".into(),
                    destination: "1".into(),
                    template: "t".into(),
                    params: vec![],
                },
            })
            .await
            .unwrap();
        assert_eq!(missing.code, 404);
    }
}
