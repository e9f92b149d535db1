/*!
Fixtures shared by the end-to-end probe and scan tests.
*/

use printwatch_core::{FleetSnapshot, ManagedDevice, SnmpSettings, NO_ERROR};
use tracing_subscriber::EnvFilter;

/// Tracing output for tests, filtered by `RUST_LOG`; safe to call more than once.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init()
        .ok();
}

/// Loopback settings with short timers so failure paths finish quickly.
pub fn fast_settings(port: u16) -> SnmpSettings {
    SnmpSettings {
        port,
        timeout_ms: 300,
        retries: 0,
        safety_margin_ms: 1000,
        ..SnmpSettings::default()
    }
}

pub fn device_at(id: &str, address: Option<&str>) -> ManagedDevice {
    ManagedDevice::new(id, format!("Printer {id}"), address)
}

/// Checks the snapshot counters against its own device list.
pub fn assert_issue_count(snapshot: &FleetSnapshot, expected: usize) {
    let derived = snapshot
        .devices
        .iter()
        .filter(|d| !d.is_online || d.errors.iter().any(|e| e != NO_ERROR))
        .count();
    assert_eq!(snapshot.total, snapshot.devices.len(), "total must match device list");
    assert_eq!(snapshot.with_issues, derived, "withIssues must match device list");
    assert_eq!(snapshot.with_issues, expected);
}
