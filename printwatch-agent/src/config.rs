//! Agent configuration: TOML under the OS config dir, then environment overrides.

use anyhow::{Context, Result};
use printwatch_core::settings::env_parse;
use printwatch_core::SnmpSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    pub agent: AgentInfo,
    pub upstream: UpstreamConfig,
    pub scan: ScanConfig,
    pub snmp: SnmpSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentInfo {
    pub agent_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    #[serde(skip)] // environment only
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScanConfig {
    pub interval_secs: u64,
    pub initial_delay_secs: u64,
}

impl Default for AgentInfo {
    fn default() -> Self {
        let host = gethostname::gethostname().to_string_lossy().to_string();
        Self { agent_id: format!("printwatch-agent-{host}") }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            request_timeout_secs: 15,
            token: None,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self { interval_secs: 300, initial_delay_secs: 5 }
    }
}

impl ScanConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }
}

impl AgentConfig {
    /// `PRINTWATCH_AGENT_CONFIG` or the OS config dir; a missing file means defaults.
    pub async fn load() -> Result<Self> {
        let path = match std::env::var("PRINTWATCH_AGENT_CONFIG") {
            Ok(p) if !p.trim().is_empty() => PathBuf::from(p.trim()),
            _ => Self::config_file_path()?,
        };
        let mut config = Self::load_from(&path).await?;
        config.apply_env();
        Ok(config)
    }

    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid agent config {}", path.display()))
    }

    pub fn config_file_path() -> Result<PathBuf> {
        let mut path = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        path.push("printwatch-agent");
        path.push("config.toml");
        Ok(path)
    }

    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("PRINTWATCH_UPSTREAM_URL") {
            if !url.trim().is_empty() {
                self.upstream.base_url = url.trim().to_string();
            }
        }
        if let Ok(token) = std::env::var("PRINTWATCH_AGENT_TOKEN") {
            if !token.trim().is_empty() {
                self.upstream.token = Some(token.trim().to_string());
            }
        }
        if let Some(v) = env_parse("PRINTWATCH_SCAN_INTERVAL_SECS") {
            self.scan.interval_secs = v;
        }
        self.snmp.apply_env();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AgentConfig::default();
        assert_eq!(config.scan.interval(), Duration::from_secs(300));
        assert_eq!(config.snmp.port, 161);
        assert!(config.agent.agent_id.starts_with("printwatch-agent-"));
        assert_eq!(config.upstream.token, None);
    }

    #[test]
    fn test_config_file_path() {
        let path = AgentConfig::config_file_path().unwrap();
        assert!(path.to_string_lossy().contains("printwatch-agent"));
        assert!(path.to_string_lossy().ends_with("config.toml"));
    }

    #[tokio::test]
    async fn partial_file_overrides_only_given_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[agent]\nagent_id = \"annex\"\n\n[upstream]\nbase_url = \"https://fleet.example.org\"\n\n[snmp]\ncommunity = \"campus\"\n",
        )
        .unwrap();

        let config = AgentConfig::load_from(&path).await.unwrap();
        assert_eq!(config.agent.agent_id, "annex");
        assert_eq!(config.upstream.base_url, "https://fleet.example.org");
        assert_eq!(config.upstream.request_timeout_secs, 15);
        assert_eq!(config.snmp.community, "campus");
        assert_eq!(config.snmp.timeout_ms, 3000);
    }

    #[tokio::test]
    async fn missing_file_is_default_and_garbage_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = AgentConfig::load_from(&dir.path().join("absent.toml")).await.unwrap();
        assert_eq!(config.scan, ScanConfig::default());

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "[scan\ninterval_secs = ").unwrap();
        assert!(AgentConfig::load_from(&bad).await.is_err());
    }
}
