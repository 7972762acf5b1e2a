//! Compiled-in plugins
//!
//! 바이너리에 포함된 엔트리/드라이버 카탈로그.
//! 매니페스트는 검색 경로에 있어야 디스커버리됩니다 (`plugins/console-sms/plugin.json`).

use agora_core::capability::{
    CapabilityDeclaration, CapabilityInterface, ConfigField, DriverCatalog, DriverContext,
    ProviderHandle, SendOutcome, SmsChannel,
};
use agora_core::plugin::{CapabilityProvider, Enableable, EntryCatalog, Plugin, PluginContext};
use agora_foundation::{ConfigFieldType, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

pub const CONSOLE_SMS_ENTRY: &str = "agora.samples.ConsoleSms";
pub const CONSOLE_SMS_DRIVER: &str = "agora.drivers.ConsoleSms";

/// 바이너리에 포함된 엔트리 클래스
pub fn entry_catalog() -> Result<EntryCatalog> {
    let mut entries = EntryCatalog::new();
    entries.register_default::<ConsoleSmsPlugin>(CONSOLE_SMS_ENTRY)?;
    Ok(entries)
}

/// 바이너리에 포함된 드라이버 클래스
pub fn driver_catalog() -> Result<DriverCatalog> {
    let mut drivers = DriverCatalog::new();
    drivers.register(
        CONSOLE_SMS_DRIVER,
        CapabilityInterface::SmsChannelProvider,
        |ctx| Ok(ProviderHandle::Sms(Arc::new(ConsoleSmsChannel::from_context(ctx)))),
    )?;
    Ok(drivers)
}

// ============================================================================
// ConsoleSmsPlugin
// ============================================================================

#[derive(Default)]
pub struct ConsoleSmsPlugin;

impl Plugin for ConsoleSmsPlugin {
    fn name(&self) -> &str {
        "console-sms"
    }

    fn version(&self) -> &str {
        "0.1.0"
    }

    fn as_enableable(&self) -> Option<&dyn Enableable> {
        Some(self)
    }

    fn as_capability_provider(&self) -> Option<&dyn CapabilityProvider> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[async_trait]
impl Enableable for ConsoleSmsPlugin {
    async fn on_enable(&self, ctx: &PluginContext) -> Result<()> {
        info!(
            "console-sms enabled (sign: {})",
            ctx.setting_str("sign_name").unwrap_or("-")
        );
        Ok(())
    }
}

impl CapabilityProvider for ConsoleSmsPlugin {
    fn capabilities(&self) -> Result<Vec<CapabilityDeclaration>> {
        Ok(vec![CapabilityDeclaration::sms(
            "sms",
            CONSOLE_SMS_DRIVER,
            "Console SMS",
        )
        .with_description("Prints messages to stdout")])
    }
}

// ============================================================================
// ConsoleSmsChannel
// ============================================================================

pub struct ConsoleSmsChannel {
    name: String,
    sign_name: String,
    prefix: String,
}

impl ConsoleSmsChannel {
    fn from_context(ctx: &DriverContext<'_>) -> Self {
        let setting = |key: &str, default: &str| {
            ctx.settings
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or(default)
                .to_string()
        };

        Self {
            name: ctx.channel_name.to_string(),
            sign_name: setting("sign_name", "Agora"),
            prefix: setting("prefix", ">>"),
        }
    }

    fn render(&self, destination: &str, template_id: &str, data: &HashMap<String, Value>) -> String {
        let mut params: Vec<String> = data.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        params.sort();
        format!(
            "{} [{}] {} <{}> {}",
            self.prefix,
            self.sign_name,
            destination,
            template_id,
            params.join(" ")
        )
    }
}

#[async_trait]
impl SmsChannel for ConsoleSmsChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(
        &self,
        destination: &str,
        template_id: &str,
        data: &HashMap<String, Value>,
    ) -> SendOutcome {
        println!("{}", self.render(destination, template_id, data));
        SendOutcome::ok("printed", json!({ "destination": destination }))
    }

    fn config_fields(&self) -> Vec<ConfigField> {
        vec![ConfigField::new("sign_name", "Sign name", ConfigFieldType::Text).required()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogs() {
        let entries = entry_catalog().unwrap();
        let plugin = entries.instantiate(CONSOLE_SMS_ENTRY).unwrap();
        assert_eq!(plugin.name(), "console-sms");

        let drivers = driver_catalog().unwrap();
        assert_eq!(
            drivers.interface_of(CONSOLE_SMS_DRIVER),
            Some(CapabilityInterface::SmsChannelProvider)
        );
    }

    #[test]
    fn test_channel_uses_settings() {
        let mut settings = HashMap::new();
        settings.insert("sign_name".to_string(), json!("Shop"));
        let options = Value::Null;
        let ctx = DriverContext {
            plugin_name: "console-sms",
            channel_name: "Console SMS",
            settings: &settings,
            options: &options,
        };

        let channel = ConsoleSmsChannel::from_context(&ctx);
        let mut data = HashMap::new();
        data.insert("code".to_string(), json!("1234"));

        assert_eq!(
            channel.render("13800000000", "login", &data),
            ">> [Shop] 13800000000 <login> code=\"1234\""
        );
    }
}
