use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::sampler::SamplerConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub mqtt: MqttConfig,
    /// Omitting the section disables sampling; inside it `enabled` defaults to true.
    #[serde(default)]
    pub hyper_v: HyperVConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    #[serde(default = "default_max_pool_size")]
    pub max_pool_size: u32,
}

fn default_max_pool_size() -> u32 {
    4
}

#[derive(Debug, Clone, Deserialize)]
pub struct MqttConfig {
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    pub topic: String,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// How long the broker keeps our session (and queued QoS 2 messages) while disconnected.
    #[serde(default = "default_session_expiry_interval_secs")]
    pub session_expiry_interval_secs: u32,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "stat-client".into()
}

fn default_session_expiry_interval_secs() -> u32 {
    86400 * 10
}

fn default_keep_alive_secs() -> u64 {
    30
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct HyperVConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
    #[serde(default = "default_program")]
    pub program: String,
    /// VM name -> IP written to that VM's network rows.
    #[serde(default)]
    pub virtual_machines: BTreeMap<String, String>,
}

impl Default for HyperVConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_interval_secs(),
            command_timeout_secs: default_command_timeout_secs(),
            program: default_program(),
            virtual_machines: BTreeMap::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    60
}

fn default_command_timeout_secs() -> u64 {
    30
}

fn default_program() -> String {
    "typeperf".into()
}

impl HyperVConfig {
    pub fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            interval: Duration::from_secs(self.interval_secs),
            command_timeout: Duration::from_secs(self.command_timeout_secs),
            program: self.program.clone(),
            virtual_machines: self.virtual_machines.clone(),
        }
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.database.path.is_empty(),
            "database.path must be non-empty"
        );
        anyhow::ensure!(
            self.database.max_pool_size > 0,
            "database.max_pool_size must be > 0, got {}",
            self.database.max_pool_size
        );
        anyhow::ensure!(!self.mqtt.host.is_empty(), "mqtt.host must be non-empty");
        anyhow::ensure!(
            self.mqtt.port > 0,
            "mqtt.port must be between 1 and 65535, got {}",
            self.mqtt.port
        );
        anyhow::ensure!(!self.mqtt.topic.is_empty(), "mqtt.topic must be non-empty");
        anyhow::ensure!(
            !self.mqtt.client_id.is_empty(),
            "mqtt.client_id must be non-empty"
        );
        anyhow::ensure!(
            self.mqtt.keep_alive_secs > 0,
            "mqtt.keep_alive_secs must be > 0, got {}",
            self.mqtt.keep_alive_secs
        );
        anyhow::ensure!(
            self.mqtt.reconnect_delay_secs > 0,
            "mqtt.reconnect_delay_secs must be > 0, got {}",
            self.mqtt.reconnect_delay_secs
        );
        if self.hyper_v.enabled {
            anyhow::ensure!(
                self.hyper_v.interval_secs > 0,
                "hyper_v.interval_secs must be > 0, got {}",
                self.hyper_v.interval_secs
            );
            anyhow::ensure!(
                self.hyper_v.command_timeout_secs > 0,
                "hyper_v.command_timeout_secs must be > 0, got {}",
                self.hyper_v.command_timeout_secs
            );
            anyhow::ensure!(
                !self.hyper_v.program.is_empty(),
                "hyper_v.program must be non-empty"
            );
            anyhow::ensure!(
                !self.hyper_v.virtual_machines.is_empty(),
                "hyper_v.virtual_machines must name at least one VM when hyper_v.enabled"
            );
            for (vm, ip) in &self.hyper_v.virtual_machines {
                // Adapter instances are named `<vm>_<nic>`, so the VM part cannot hold '_'.
                anyhow::ensure!(
                    !vm.is_empty() && vm.chars().all(char::is_alphanumeric),
                    "hyper_v.virtual_machines: VM name {:?} must be alphanumeric",
                    vm
                );
                anyhow::ensure!(
                    !ip.is_empty(),
                    "hyper_v.virtual_machines.{} must map to a non-empty IP",
                    vm
                );
            }
        }
        Ok(())
    }
}
