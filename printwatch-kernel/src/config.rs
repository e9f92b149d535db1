use printwatch_core::settings::env_parse;
use printwatch_core::SnmpSettings;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::{info, warn};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct KernelConfig {
    pub listen: String,
    /// YAML device list re-read at every scan.
    pub inventory_path: String,
    pub scan_interval_secs: u64,
    pub initial_delay_secs: u64,
    pub freshness: FreshnessConf,
    pub snmp: SnmpSettings,
    #[serde(skip)]
    pub secrets: Secrets,
}

/// A push is fresh while its age stays within the agent interval plus slack.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct FreshnessConf {
    pub agent_interval_secs: u64,
    pub slack_secs: u64,
}

/// Environment-only credentials; never read from the YAML file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Secrets {
    pub api_key: Option<String>,
    pub agent_token: Option<String>,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".into(),
            inventory_path: "inventory.yaml".into(),
            scan_interval_secs: 300,
            initial_delay_secs: 5,
            freshness: FreshnessConf::default(),
            snmp: SnmpSettings::default(),
            secrets: Secrets::default(),
        }
    }
}

impl Default for FreshnessConf {
    fn default() -> Self {
        Self { agent_interval_secs: 300, slack_secs: 120 }
    }
}

impl FreshnessConf {
    pub fn threshold(&self) -> Duration {
        Duration::from_secs(self.agent_interval_secs.saturating_add(self.slack_secs))
    }
}

impl KernelConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }

    pub fn apply_env(&mut self) {
        if let Some(v) = env_parse("PRINTWATCH_SCAN_INTERVAL_SECS") {
            self.scan_interval_secs = v;
        }
        if let Ok(v) = std::env::var("PRINTWATCH_LISTEN") {
            if !v.trim().is_empty() {
                self.listen = v.trim().to_string();
            }
        }
        self.snmp.apply_env();
        self.secrets = Secrets {
            api_key: non_empty_env("PRINTWATCH_API_KEY"),
            agent_token: non_empty_env("PRINTWATCH_AGENT_TOKEN"),
        };
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Missing, empty or invalid files fall back to defaults.
pub async fn read_config_file(path: &Path) -> KernelConfig {
    if !path.exists() {
        info!(path = %path.display(), "no kernel config file, using defaults");
        return KernelConfig::default();
    }
    let txt = fs::read_to_string(path).await.unwrap_or_default();
    if txt.trim().is_empty() {
        return KernelConfig::default();
    }
    serde_yaml::from_str(&txt).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "invalid kernel config, using defaults");
        KernelConfig::default()
    })
}

pub async fn load_config() -> KernelConfig {
    let path = std::env::var("PRINTWATCH_KERNEL_CONFIG").unwrap_or_else(|_| "kernel.yaml".into());
    let mut cfg = read_config_file(Path::new(&path)).await;
    cfg.apply_env();
    cfg
}
