//! One bounded health probe of one printer.
//!
//! A probe runs up to three GET rounds on a single session: basic identity and
//! coarse status, then printer status and the detected-error bitmask, then
//! (optionally) the marker supply. The whole exchange sits under one deadline;
//! when it fires the session future is dropped, which closes the socket, and
//! the record becomes a `timeout` regardless of partial progress. The supply
//! round only gets the time left before that deadline, so a stalled supply
//! OID never turns an answered probe into a `timeout`.

use crate::models::{DeviceHealth, DeviceStatus, ErrorDetail, ManagedDevice, Severity, SupplyReading, NO_ERROR};
use crate::oid::{self, FieldMeaning, HostDeviceState, Vendor};
use crate::settings::SnmpSettings;
use crate::snmp::{SnmpError, SnmpSession, Value, VarBind};
use std::io::ErrorKind;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info_span, warn, Instrument};

const BASIC_ROUND: &[&[u32]] = &[oid::SYS_DESCR, oid::SYS_UPTIME, oid::HR_DEVICE_STATUS];
const ADVANCED_ROUND: &[&[u32]] = &[oid::HR_PRINTER_STATUS, oid::HR_PRINTER_DETECTED_ERROR_STATE];
const SUPPLY_ROUND: &[&[u32]] = &[
    oid::PRT_MARKER_SUPPLIES_TYPE,
    oid::PRT_MARKER_SUPPLIES_DESCRIPTION,
    oid::PRT_MARKER_SUPPLIES_MAX_CAPACITY,
    oid::PRT_MARKER_SUPPLIES_LEVEL,
];

/// Slack kept between the end of the supply round and the safety deadline.
const SUPPLY_HEADROOM: Duration = Duration::from_millis(50);

const TICKS_PER_DAY: u64 = 8_640_000;
const TICKS_PER_HOUR: u64 = 360_000;

#[derive(Debug, Clone)]
pub struct DeviceProber {
    settings: SnmpSettings,
}

impl DeviceProber {
    pub fn new(settings: SnmpSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SnmpSettings {
        &self.settings
    }

    /// Always resolves to exactly one record.
    pub async fn probe(&self, device: &ManagedDevice) -> DeviceHealth {
        let Some(address) = device.usable_address() else {
            return DeviceHealth::no_ip(device);
        };
        let span = info_span!("probe", device_id = %device.id, address);
        let deadline = self.settings.safety_deadline();
        let expires_at = Instant::now() + deadline;
        let supplies_by = expires_at.checked_sub(SUPPLY_HEADROOM).unwrap_or(expires_at);

        match timeout_at(expires_at, self.exchange(device, address, supplies_by).instrument(span)).await {
            Ok(health) => health,
            Err(_) => {
                warn!(device_id = %device.id, address, ?deadline, "probe exceeded safety deadline");
                DeviceHealth::timed_out(device)
            }
        }
    }

    async fn exchange(&self, device: &ManagedDevice, address: &str, supplies_by: Instant) -> DeviceHealth {
        let community = device
            .community
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(self.settings.community.as_str());

        let mut session = match SnmpSession::open(address, community, self.settings.session_options()).await {
            Ok(session) => session,
            Err(e) => return transport_failure(device, &e),
        };

        let basic = match session.get(&oid::oids(BASIC_ROUND)).await {
            Ok(varbinds) => varbinds,
            Err(e) => {
                session.close();
                return transport_failure(device, &e);
            }
        };
        let mut draft = HealthDraft::online();
        draft.apply_basic(&basic);

        match session.get(&oid::oids(ADVANCED_ROUND)).await {
            Ok(varbinds) => draft.apply_advanced(&varbinds),
            Err(e) => debug!(error = %e, "advanced round failed, keeping basic state"),
        }

        if self.settings.read_supplies {
            let mut arcs = SUPPLY_ROUND.to_vec();
            if let Some(vendor_oid) = draft.vendor.and_then(Vendor::consumable_level_oid) {
                arcs.push(vendor_oid);
            }
            match timeout_at(supplies_by, session.get(&oid::oids(&arcs))).await {
                Ok(Ok(varbinds)) => draft.apply_supplies(&varbinds),
                Ok(Err(e)) => debug!(error = %e, "supply round failed"),
                Err(_) => debug!("supply round cut short by the safety deadline"),
            }
        }

        session.close();
        draft.finish(device)
    }
}

/// Offline record for a failed basic round.
pub fn transport_failure(device: &ManagedDevice, err: &SnmpError) -> DeviceHealth {
    let detail = classify_transport(err);
    debug!(device_id = %device.id, error = %err, category = %detail.error, "basic round failed");
    DeviceHealth::failed(device, DeviceStatus::Offline, detail)
}

pub fn classify_transport(err: &SnmpError) -> ErrorDetail {
    match err {
        SnmpError::Unresolvable(_) => ErrorDetail::new(
            "host not found",
            Severity::Error,
            "Check the printer IP address or hostname in the inventory",
            "The printer address could not be resolved",
        ),
        SnmpError::Timeout { .. } => ErrorDetail::new(
            "device not responding",
            Severity::Error,
            "Check that the printer is powered on and connected to the network",
            "The printer did not answer SNMP requests",
        ),
        SnmpError::Io(e) if e.kind() == ErrorKind::ConnectionRefused => ErrorDetail::new(
            "SNMP disabled",
            Severity::Warning,
            "Enable SNMP in the printer network settings",
            "The printer refused SNMP traffic on the management port",
        ),
        _ => ErrorDetail::new(
            "connection error",
            Severity::Error,
            "Check the network path and SNMP community of the printer",
            "The SNMP exchange with the printer failed",
        ),
    }
}

/// `"{d}d {h}h"` from hundredths of a second.
pub fn format_uptime(ticks: u64) -> String {
    let days = ticks / TICKS_PER_DAY;
    let hours = (ticks % TICKS_PER_DAY) / TICKS_PER_HOUR;
    format!("{days}d {hours}h")
}

/// Mutable state while rounds are applied; frozen into a `DeviceHealth` once.
#[derive(Debug)]
struct HealthDraft {
    status: DeviceStatus,
    errors: Vec<String>,
    details: Vec<ErrorDetail>,
    uptime: Option<String>,
    has_critical: bool,
    vendor: Option<Vendor>,
    supplies: SupplyReading,
}

impl HealthDraft {
    fn online() -> Self {
        Self {
            status: DeviceStatus::Online,
            errors: vec![NO_ERROR.to_string()],
            details: Vec::new(),
            uptime: None,
            has_critical: false,
            vendor: None,
            supplies: SupplyReading::default(),
        }
    }

    fn apply_basic(&mut self, varbinds: &[VarBind]) {
        for vb in present(varbinds) {
            match oid::describe(&vb.oid) {
                FieldMeaning::SystemDescription => match vb.value.as_text() {
                    Some(descr) => {
                        self.vendor = oid::detect_vendor(&descr);
                        self.status = self
                            .vendor
                            .map(Vendor::detected_status)
                            .unwrap_or(DeviceStatus::PrinterDetected);
                    }
                    None => skip(vb),
                },
                FieldMeaning::Uptime => match vb.value.as_i64().and_then(|t| u64::try_from(t).ok()) {
                    Some(ticks) => self.uptime = Some(format_uptime(ticks)),
                    None => skip(vb),
                },
                FieldMeaning::DeviceStatus => match vb.value.as_i64() {
                    Some(code) => self.apply_device_status(code),
                    None => skip(vb),
                },
                _ => {}
            }
        }
    }

    fn apply_device_status(&mut self, code: i64) {
        match oid::decode_device_status(code) {
            HostDeviceState::Functioning => {
                self.status = DeviceStatus::Functioning;
                self.errors = vec![NO_ERROR.to_string()];
                self.details.clear();
                self.has_critical = false;
            }
            HostDeviceState::Inoperative => {
                let detail = ErrorDetail::new(
                    "device inoperative",
                    Severity::Critical,
                    "Inspect the printer and call technical support",
                    "The printer reports itself as down",
                );
                self.status = DeviceStatus::Inoperative;
                self.errors = vec![detail.error.clone()];
                self.details = vec![detail];
                self.has_critical = true;
            }
            HostDeviceState::Other => self.status = DeviceStatus::Other,
        }
    }

    fn apply_advanced(&mut self, varbinds: &[VarBind]) {
        for vb in present(varbinds) {
            match oid::describe(&vb.oid) {
                FieldMeaning::PrinterStatus => match vb.value.as_i64() {
                    Some(code) => {
                        if let Some(status) = oid::decode_printer_status(code) {
                            self.status = status;
                        }
                    }
                    None => skip(vb),
                },
                FieldMeaning::DetectedErrorState => match bitmask_code(&vb.value) {
                    Some(code) => self.apply_bitmask(code),
                    None => skip(vb),
                },
                _ => {}
            }
        }
    }

    /// A non-zero mask replaces everything earlier rounds reported.
    fn apply_bitmask(&mut self, code: i64) {
        if code == 0 {
            return;
        }
        let details = oid::decode_error_bitmask(code);
        if details.is_empty() {
            debug!(code, "bitmask carries no known error bits");
            return;
        }
        self.has_critical = details.iter().any(|d| d.severity == Severity::Critical);
        self.errors = details.iter().map(|d| d.error.clone()).collect();
        self.details = details;
    }

    fn apply_supplies(&mut self, varbinds: &[VarBind]) {
        for vb in present(varbinds) {
            match oid::describe(&vb.oid) {
                FieldMeaning::ConsumableType => {
                    self.supplies.kind = vb.value.as_i64().and_then(oid::decode_supply_kind).map(str::to_string);
                }
                FieldMeaning::ConsumableDescription => self.supplies.description = vb.value.as_text(),
                FieldMeaning::ConsumableMaxCapacity => self.supplies.max_capacity = vb.value.as_i64(),
                FieldMeaning::ConsumableLevel => self.supplies.level = vb.value.as_i64(),
                FieldMeaning::VendorConsumableLevel(_) => self.supplies.vendor_level = vb.value.as_i64(),
                _ => {}
            }
        }
        // Negative levels are the "unknown / some remaining" markers.
        if let (Some(level), Some(max)) = (self.supplies.level, self.supplies.max_capacity) {
            if level >= 0 && max > 0 {
                self.supplies.percent = u8::try_from((level.min(max).saturating_mul(100)) / max).ok();
            }
        }
    }

    fn finish(self, device: &ManagedDevice) -> DeviceHealth {
        DeviceHealth {
            device_id: device.id.clone(),
            address: device.address.clone(),
            label: device.label.clone(),
            status: self.status,
            is_online: true,
            errors: self.errors,
            error_details: self.details,
            uptime: self.uptime,
            has_critical_errors: self.has_critical,
            last_checked: OffsetDateTime::now_utc(),
            supplies: (!self.supplies.is_empty()).then_some(self.supplies),
        }
    }
}

fn present(varbinds: &[VarBind]) -> impl Iterator<Item = &VarBind> {
    varbinds.iter().filter(|vb| !vb.value.is_absent())
}

fn skip(vb: &VarBind) {
    debug!(oid = %vb.oid, value = %vb.value, "skipping undecodable field");
}

/// Integer masks as-is; octet-string masks from their first octet.
fn bitmask_code(value: &Value) -> Option<i64> {
    match value {
        Value::OctetString(bytes) => Some(bytes.first().copied().map(i64::from).unwrap_or(0)),
        other => other.as_i64(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snmp::Oid;

    fn vb(arcs: &[u32], value: Value) -> VarBind {
        VarBind { oid: Oid::from_slice(arcs), value }
    }

    fn device(address: Option<&str>) -> ManagedDevice {
        ManagedDevice::new("p1", "Front desk", address)
    }

    #[tokio::test]
    async fn absent_address_never_touches_the_network() {
        let mut settings = SnmpSettings::default();
        // Any I/O attempt would hit this deadline and yield `timeout` instead.
        settings.timeout_ms = 0;
        settings.safety_margin_ms = 0;
        let prober = DeviceProber::new(settings);
        for addr in [None, Some(""), Some("  "), Some("not informed")] {
            let health = prober.probe(&device(addr)).await;
            assert_eq!(health.status, DeviceStatus::NoIp);
            assert!(!health.is_online);
            assert_eq!(health.errors, ["IP not provided"]);
        }
    }

    #[test]
    fn uptime_formatting() {
        assert_eq!(format_uptime(0), "0d 0h");
        assert_eq!(format_uptime(TICKS_PER_HOUR - 1), "0d 0h");
        assert_eq!(format_uptime(3 * TICKS_PER_DAY + 5 * TICKS_PER_HOUR + 99), "3d 5h");
    }

    #[test]
    fn vendor_tag_then_device_status_overrides() {
        let mut draft = HealthDraft::online();
        draft.apply_basic(&[
            vb(oid::SYS_DESCR, Value::OctetString(b"Xerox VersaLink C405".to_vec())),
            vb(oid::SYS_UPTIME, Value::TimeTicks(8_640_000 + 360_000)),
        ]);
        assert_eq!(draft.status, DeviceStatus::XeroxDetected);
        assert_eq!(draft.uptime.as_deref(), Some("1d 1h"));

        draft.apply_basic(&[vb(oid::HR_DEVICE_STATUS, Value::Integer(2))]);
        assert_eq!(draft.status, DeviceStatus::Functioning);
        assert_eq!(draft.errors, [NO_ERROR]);
    }

    #[test]
    fn unknown_vendor_is_generic_printer() {
        let mut draft = HealthDraft::online();
        draft.apply_basic(&[vb(oid::SYS_DESCR, Value::OctetString(b"Brother HL-L6200".to_vec()))]);
        assert_eq!(draft.status, DeviceStatus::PrinterDetected);
    }

    #[test]
    fn inoperative_is_critical() {
        let mut draft = HealthDraft::online();
        draft.apply_basic(&[vb(oid::HR_DEVICE_STATUS, Value::Integer(5))]);
        let health = draft.finish(&device(Some("10.0.0.9")));
        assert_eq!(health.status, DeviceStatus::Inoperative);
        assert!(health.has_critical_errors);
        assert_eq!(health.error_details.len(), 1);
        assert_eq!(health.error_details[0].severity, Severity::Critical);
    }

    #[test]
    fn bad_fields_are_skipped_without_losing_the_rest() {
        let mut draft = HealthDraft::online();
        draft.apply_basic(&[
            vb(oid::SYS_DESCR, Value::Integer(42)),
            vb(oid::SYS_UPTIME, Value::OctetString(b"soon".to_vec())),
            vb(oid::HR_DEVICE_STATUS, Value::NoSuchInstance),
            vb(&[1, 3, 6, 1, 2, 1, 1, 5, 0], Value::OctetString(b"name".to_vec())),
        ]);
        assert_eq!(draft.status, DeviceStatus::Online);
        assert_eq!(draft.uptime, None);

        draft.apply_basic(&[
            vb(oid::SYS_UPTIME, Value::Integer(-1)),
            vb(oid::HR_DEVICE_STATUS, Value::Integer(4)),
        ]);
        assert_eq!(draft.status, DeviceStatus::Other);
    }

    #[test]
    fn undecodable_uptime_leaves_other_fields_intact() {
        let mut draft = HealthDraft::online();
        draft.apply_basic(&[
            vb(oid::SYS_DESCR, Value::OctetString(b"HP LaserJet M404".to_vec())),
            vb(oid::SYS_UPTIME, Value::Undecodable { tag: 0x47, bytes: vec![0x01] }),
            vb(oid::HR_DEVICE_STATUS, Value::Integer(5)),
        ]);
        let health = draft.finish(&device(Some("10.0.0.9")));
        assert_eq!(health.status, DeviceStatus::Inoperative);
        assert_eq!(health.uptime, None);
        assert_eq!(health.errors, ["device inoperative"]);
        assert!(health.has_critical_errors);
    }

    #[test]
    fn bitmask_replaces_basic_errors() {
        let mut draft = HealthDraft::online();
        draft.apply_basic(&[vb(oid::HR_DEVICE_STATUS, Value::Integer(5))]);
        draft.apply_advanced(&[
            vb(oid::HR_PRINTER_STATUS, Value::Integer(3)),
            vb(oid::HR_PRINTER_DETECTED_ERROR_STATE, Value::Integer(4)),
        ]);
        assert_eq!(draft.status, DeviceStatus::Awaiting);
        assert_eq!(draft.errors, ["low toner"]);
        assert!(!draft.has_critical);
    }

    #[test]
    fn zero_bitmask_and_unmapped_status_keep_prior_state() {
        let mut draft = HealthDraft::online();
        draft.apply_basic(&[vb(oid::HR_DEVICE_STATUS, Value::Integer(2))]);
        draft.apply_advanced(&[
            vb(oid::HR_PRINTER_STATUS, Value::Integer(42)),
            vb(oid::HR_PRINTER_DETECTED_ERROR_STATE, Value::OctetString(vec![0x00])),
        ]);
        assert_eq!(draft.status, DeviceStatus::Functioning);
        assert_eq!(draft.errors, [NO_ERROR]);
    }

    #[test]
    fn octet_string_bitmask_reads_first_octet() {
        let mut draft = HealthDraft::online();
        draft.apply_advanced(&[vb(oid::HR_PRINTER_DETECTED_ERROR_STATE, Value::OctetString(vec![0x80, 0x00]))]);
        assert_eq!(draft.errors, ["service needed"]);
        assert!(draft.has_critical);
    }

    #[test]
    fn supplies_compute_percent() {
        let mut draft = HealthDraft::online();
        draft.apply_supplies(&[
            vb(oid::PRT_MARKER_SUPPLIES_TYPE, Value::Integer(3)),
            vb(oid::PRT_MARKER_SUPPLIES_DESCRIPTION, Value::OctetString(b"Black Toner".to_vec())),
            vb(oid::PRT_MARKER_SUPPLIES_MAX_CAPACITY, Value::Integer(20_000)),
            vb(oid::PRT_MARKER_SUPPLIES_LEVEL, Value::Integer(5_000)),
            vb(oid::OKI_TONER_LEVEL, Value::Integer(31)),
        ]);
        let health = draft.finish(&device(Some("10.0.0.9")));
        let supplies = health.supplies.unwrap();
        assert_eq!(supplies.kind.as_deref(), Some("toner"));
        assert_eq!(supplies.percent, Some(25));
        assert_eq!(supplies.vendor_level, Some(31));
        assert_eq!(health.errors, [NO_ERROR]);
    }

    #[test]
    fn transport_failures_are_classified() {
        let refused = SnmpError::Io(std::io::Error::from(ErrorKind::ConnectionRefused));
        assert_eq!(classify_transport(&refused).error, "SNMP disabled");
        assert_eq!(classify_transport(&refused).severity, Severity::Warning);

        let cases = [
            (SnmpError::Unresolvable("nowhere".into()), "host not found"),
            (SnmpError::Timeout { attempts: 2 }, "device not responding"),
            (SnmpError::ErrorStatus { status: 2, index: 1 }, "connection error"),
            (SnmpError::Io(std::io::Error::from(ErrorKind::PermissionDenied)), "connection error"),
        ];
        for (err, expected) in cases {
            let detail = classify_transport(&err);
            assert_eq!(detail.error, expected);
            assert_eq!(detail.severity, Severity::Error);
        }
    }

    #[tokio::test]
    async fn silent_device_is_not_responding_within_budget() {
        let agent = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let settings = SnmpSettings {
            port: agent.local_addr().unwrap().port(),
            timeout_ms: 50,
            retries: 1,
            safety_margin_ms: 1000,
            ..SnmpSettings::default()
        };
        let started = std::time::Instant::now();
        let health = DeviceProber::new(settings).probe(&device(Some("127.0.0.1"))).await;
        assert_eq!(health.errors, ["device not responding"]);
        assert!(started.elapsed() < Duration::from_millis(1000));
    }
}
