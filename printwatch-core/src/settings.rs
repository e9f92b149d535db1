use crate::snmp::{SessionOptions, SnmpVersion, DEFAULT_PORT};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// SNMP knobs shared by the kernel and the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnmpSettings {
    pub port: u16,
    pub timeout_ms: u64,
    pub retries: u32,
    pub community: String,
    pub version: SnmpVersion,
    /// Added to `timeout_ms` to form the per-device safety deadline.
    pub safety_margin_ms: u64,
    pub read_supplies: bool,
}

impl Default for SnmpSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            timeout_ms: 3000,
            retries: 1,
            community: "public".into(),
            version: SnmpVersion::V2c,
            safety_margin_ms: 1000,
            read_supplies: true,
        }
    }
}

impl SnmpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn safety_deadline(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.saturating_add(self.safety_margin_ms))
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            port: self.port,
            version: self.version,
            timeout: self.timeout(),
            retries: self.retries,
        }
    }

    /// PRINTWATCH_SNMP_* overrides; unparsable values are ignored with a warning.
    pub fn apply_env(&mut self) {
        if let Some(v) = env_parse("PRINTWATCH_SNMP_TIMEOUT_MS") {
            self.timeout_ms = v;
        }
        if let Some(v) = env_parse("PRINTWATCH_SNMP_RETRIES") {
            self.retries = v;
        }
        if let Ok(v) = std::env::var("PRINTWATCH_SNMP_COMMUNITY") {
            if !v.trim().is_empty() {
                self.community = v.trim().to_string();
            }
        }
    }
}

pub fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparsable environment override");
            None
        }
    }
}
