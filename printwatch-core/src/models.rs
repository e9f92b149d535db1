//! Records shared by the prober, the kernel and the in-network agent.
//!
//! JSON uses camelCase because the dashboard consumes these records directly.

use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

/// Entry of the errors list of a healthy device.
pub const NO_ERROR: &str = "no error";

/// Address values that mean "nobody filled this in".
const ADDRESS_SENTINELS: &[&str] = &["not informed"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedDevice {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub community: Option<String>,
}

impl ManagedDevice {
    pub fn new(id: impl Into<String>, label: impl Into<String>, address: Option<&str>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            address: address.map(str::to_string),
            community: None,
        }
    }

    /// Trimmed address, or `None` when blank or a sentinel.
    pub fn usable_address(&self) -> Option<&str> {
        let addr = self.address.as_deref()?.trim();
        if addr.is_empty() || ADDRESS_SENTINELS.iter().any(|s| addr.eq_ignore_ascii_case(s)) {
            return None;
        }
        Some(addr)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceStatus {
    Online,
    XeroxDetected,
    OkiDetected,
    HpDetected,
    PrinterDetected,
    Functioning,
    Inoperative,
    Awaiting,
    Printing,
    WarmingUp,
    Stopped,
    Offline,
    Other,
    Unknown,
    Timeout,
    NoIp,
    NoIpConfigured,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Online => "online",
            DeviceStatus::XeroxDetected => "xerox-detected",
            DeviceStatus::OkiDetected => "oki-detected",
            DeviceStatus::HpDetected => "hp-detected",
            DeviceStatus::PrinterDetected => "printer-detected",
            DeviceStatus::Functioning => "functioning",
            DeviceStatus::Inoperative => "inoperative",
            DeviceStatus::Awaiting => "awaiting",
            DeviceStatus::Printing => "printing",
            DeviceStatus::WarmingUp => "warming-up",
            DeviceStatus::Stopped => "stopped",
            DeviceStatus::Offline => "offline",
            DeviceStatus::Other => "other",
            DeviceStatus::Unknown => "unknown",
            DeviceStatus::Timeout => "timeout",
            DeviceStatus::NoIp => "no-ip",
            DeviceStatus::NoIpConfigured => "no-ip-configured",
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub error: String,
    pub severity: Severity,
    pub action: String,
    pub description: String,
}

impl ErrorDetail {
    pub fn new(error: &str, severity: Severity, action: &str, description: &str) -> Self {
        Self {
            error: error.to_string(),
            severity,
            action: action.to_string(),
            description: description.to_string(),
        }
    }
}

/// Marker supply readout (first supply of the first marker).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplyReading {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_capacity: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_level: Option<i64>,
}

impl SupplyReading {
    pub fn is_empty(&self) -> bool {
        self == &SupplyReading::default()
    }
}

/// Result of one probe cycle for one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceHealth {
    pub device_id: String,
    pub address: Option<String>,
    pub label: String,
    pub status: DeviceStatus,
    pub is_online: bool,
    pub errors: Vec<String>,
    pub error_details: Vec<ErrorDetail>,
    pub uptime: Option<String>,
    pub has_critical_errors: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub last_checked: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplies: Option<SupplyReading>,
}

impl DeviceHealth {
    /// Offline record carrying a single error.
    pub fn failed(device: &ManagedDevice, status: DeviceStatus, detail: ErrorDetail) -> Self {
        Self {
            device_id: device.id.clone(),
            address: device.address.clone(),
            label: device.label.clone(),
            status,
            is_online: false,
            errors: vec![detail.error.clone()],
            has_critical_errors: detail.severity == Severity::Critical,
            error_details: vec![detail],
            uptime: None,
            last_checked: OffsetDateTime::now_utc(),
            supplies: None,
        }
    }

    /// Prober-level guard: the record reached the prober without an address.
    pub fn no_ip(device: &ManagedDevice) -> Self {
        Self::failed(
            device,
            DeviceStatus::NoIp,
            ErrorDetail::new(
                "IP not provided",
                Severity::Error,
                "Register the printer IP address in the inventory",
                "The printer has no IP address, so it cannot be queried",
            ),
        )
    }

    /// Fleet-level classification: the inventory has no address for the device.
    /// Kept distinct from `no_ip` so configuration gaps found before probing are
    /// separable from records that slipped through to the prober.
    pub fn no_ip_configured(device: &ManagedDevice) -> Self {
        Self::failed(
            device,
            DeviceStatus::NoIpConfigured,
            ErrorDetail::new(
                "IP not configured",
                Severity::Error,
                "Register the printer IP address in the inventory",
                "No IP address is configured for this printer",
            ),
        )
    }

    pub fn timed_out(device: &ManagedDevice) -> Self {
        Self::failed(
            device,
            DeviceStatus::Timeout,
            ErrorDetail::new(
                "SNMP query timed out",
                Severity::Error,
                "Check that the printer is powered on and reachable",
                "The printer did not complete the status query in time",
            ),
        )
    }

    pub fn has_issues(&self) -> bool {
        !self.is_online || self.errors.iter().any(|e| e != NO_ERROR)
    }
}

/// Aggregate of one fleet scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetSnapshot {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub total: usize,
    pub with_issues: usize,
    pub devices: Vec<DeviceHealth>,
}

impl FleetSnapshot {
    pub fn from_devices(devices: Vec<DeviceHealth>) -> Self {
        Self::at(OffsetDateTime::now_utc(), devices)
    }

    pub fn at(timestamp: OffsetDateTime, devices: Vec<DeviceHealth>) -> Self {
        Self {
            timestamp,
            total: devices.len(),
            with_issues: devices.iter().filter(|d| d.has_issues()).count(),
            devices,
        }
    }
}

/// Body posted by the in-network agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPush {
    pub agent_id: String,
    pub snapshot: FleetSnapshot,
}
