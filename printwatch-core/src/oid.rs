//! Static OID table and the decode tables for printer status values.
//!
//! Everything here is pure: no I/O, no allocation beyond the returned values.

use crate::models::{DeviceStatus, ErrorDetail, Severity};
use crate::snmp::Oid;

pub const SYS_DESCR: &[u32] = &[1, 3, 6, 1, 2, 1, 1, 1, 0];
pub const SYS_UPTIME: &[u32] = &[1, 3, 6, 1, 2, 1, 1, 3, 0];
pub const HR_DEVICE_STATUS: &[u32] = &[1, 3, 6, 1, 2, 1, 25, 3, 2, 1, 5, 1];
pub const HR_PRINTER_STATUS: &[u32] = &[1, 3, 6, 1, 2, 1, 25, 3, 5, 1, 1, 1];
pub const HR_PRINTER_DETECTED_ERROR_STATE: &[u32] = &[1, 3, 6, 1, 2, 1, 25, 3, 5, 1, 2, 1];

pub const PRT_MARKER_SUPPLIES_TYPE: &[u32] = &[1, 3, 6, 1, 2, 1, 43, 11, 1, 1, 5, 1, 1];
pub const PRT_MARKER_SUPPLIES_DESCRIPTION: &[u32] = &[1, 3, 6, 1, 2, 1, 43, 11, 1, 1, 6, 1, 1];
pub const PRT_MARKER_SUPPLIES_MAX_CAPACITY: &[u32] = &[1, 3, 6, 1, 2, 1, 43, 11, 1, 1, 8, 1, 1];
pub const PRT_MARKER_SUPPLIES_LEVEL: &[u32] = &[1, 3, 6, 1, 2, 1, 43, 11, 1, 1, 9, 1, 1];

pub const XEROX_TONER_LEVEL: &[u32] = &[1, 3, 6, 1, 4, 1, 253, 8, 53, 13, 2, 1, 6, 1, 20, 1];
pub const OKI_TONER_LEVEL: &[u32] = &[1, 3, 6, 1, 4, 1, 2001, 1, 1, 1, 1, 100, 3, 1, 1, 3, 1];

/// Printer families with vendor-specific identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vendor {
    Xerox,
    Oki,
    Hp,
}

impl Vendor {
    pub fn detected_status(self) -> DeviceStatus {
        match self {
            Vendor::Xerox => DeviceStatus::XeroxDetected,
            Vendor::Oki => DeviceStatus::OkiDetected,
            Vendor::Hp => DeviceStatus::HpDetected,
        }
    }

    /// Vendor consumable-level OID, for the families that publish one.
    pub fn consumable_level_oid(self) -> Option<&'static [u32]> {
        match self {
            Vendor::Xerox => Some(XEROX_TONER_LEVEL),
            Vendor::Oki => Some(OKI_TONER_LEVEL),
            Vendor::Hp => None,
        }
    }
}

/// Keywords matched against the lower-cased sysDescr, first match wins.
const VENDOR_KEYWORDS: &[(&str, Vendor)] = &[
    ("xerox", Vendor::Xerox),
    ("oki", Vendor::Oki),
    ("hp", Vendor::Hp),
    ("hewlett", Vendor::Hp),
];

pub fn detect_vendor(sys_descr: &str) -> Option<Vendor> {
    let descr = sys_descr.to_lowercase();
    VENDOR_KEYWORDS
        .iter()
        .find(|(keyword, _)| descr.contains(keyword))
        .map(|(_, vendor)| *vendor)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldMeaning {
    SystemDescription,
    Uptime,
    DeviceStatus,
    PrinterStatus,
    DetectedErrorState,
    ConsumableType,
    ConsumableDescription,
    ConsumableMaxCapacity,
    ConsumableLevel,
    VendorConsumableLevel(Vendor),
    Unknown,
}

const REGISTRY: &[(&[u32], FieldMeaning)] = &[
    (SYS_DESCR, FieldMeaning::SystemDescription),
    (SYS_UPTIME, FieldMeaning::Uptime),
    (HR_DEVICE_STATUS, FieldMeaning::DeviceStatus),
    (HR_PRINTER_STATUS, FieldMeaning::PrinterStatus),
    (HR_PRINTER_DETECTED_ERROR_STATE, FieldMeaning::DetectedErrorState),
    (PRT_MARKER_SUPPLIES_TYPE, FieldMeaning::ConsumableType),
    (PRT_MARKER_SUPPLIES_DESCRIPTION, FieldMeaning::ConsumableDescription),
    (PRT_MARKER_SUPPLIES_MAX_CAPACITY, FieldMeaning::ConsumableMaxCapacity),
    (PRT_MARKER_SUPPLIES_LEVEL, FieldMeaning::ConsumableLevel),
    (XEROX_TONER_LEVEL, FieldMeaning::VendorConsumableLevel(Vendor::Xerox)),
    (OKI_TONER_LEVEL, FieldMeaning::VendorConsumableLevel(Vendor::Oki)),
];

pub fn describe(oid: &Oid) -> FieldMeaning {
    REGISTRY
        .iter()
        .find(|(arcs, _)| *arcs == oid.as_slice())
        .map(|(_, meaning)| *meaning)
        .unwrap_or(FieldMeaning::Unknown)
}

pub fn oids(arcs: &[&[u32]]) -> Vec<Oid> {
    arcs.iter().map(|a| Oid::from_slice(a)).collect()
}

/// hrDeviceStatus reduced to what the health record distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostDeviceState {
    Functioning,
    Inoperative,
    Other,
}

pub fn decode_device_status(code: i64) -> HostDeviceState {
    match code {
        // running(2), warning(3)
        2 | 3 => HostDeviceState::Functioning,
        // down(5)
        5 => HostDeviceState::Inoperative,
        _ => HostDeviceState::Other,
    }
}

/// hrPrinterStatus; `None` leaves the caller's status untouched.
pub fn decode_printer_status(code: i64) -> Option<DeviceStatus> {
    match code {
        1 => Some(DeviceStatus::Other),
        2 => Some(DeviceStatus::Unknown),
        3 => Some(DeviceStatus::Awaiting),
        4 => Some(DeviceStatus::Printing),
        5 => Some(DeviceStatus::WarmingUp),
        6 => Some(DeviceStatus::Stopped),
        7 => Some(DeviceStatus::Offline),
        _ => None,
    }
}

struct ErrorBit {
    bit: i64,
    error: &'static str,
    severity: Severity,
    action: &'static str,
    description: &'static str,
}

/// Ascending bit order; decode output follows this order.
const ERROR_BITS: [ErrorBit; 8] = [
    ErrorBit {
        bit: 1,
        error: "low paper",
        severity: Severity::Warning,
        action: "Refill the paper tray soon",
        description: "Paper level is low",
    },
    ErrorBit {
        bit: 2,
        error: "no paper",
        severity: Severity::Error,
        action: "Load paper into the empty tray",
        description: "A paper tray is empty",
    },
    ErrorBit {
        bit: 4,
        error: "low toner",
        severity: Severity::Warning,
        action: "Order a replacement toner cartridge",
        description: "Toner level is low",
    },
    ErrorBit {
        bit: 8,
        error: "no toner",
        severity: Severity::Error,
        action: "Replace the toner cartridge",
        description: "Toner is empty",
    },
    ErrorBit {
        bit: 16,
        error: "cover open",
        severity: Severity::Error,
        action: "Close the printer covers and doors",
        description: "A cover or door is open",
    },
    ErrorBit {
        bit: 32,
        error: "paper jam",
        severity: Severity::Error,
        action: "Remove the jammed paper following the panel instructions",
        description: "Paper is jammed in the printer",
    },
    ErrorBit {
        bit: 64,
        error: "offline",
        severity: Severity::Error,
        action: "Put the printer back online from its control panel",
        description: "The printer reports itself offline",
    },
    ErrorBit {
        bit: 128,
        error: "service needed",
        severity: Severity::Critical,
        action: "Call technical support",
        description: "The printer requires technical service",
    },
];

pub fn decode_error_bitmask(code: i64) -> Vec<ErrorDetail> {
    ERROR_BITS
        .iter()
        .filter(|entry| code & entry.bit != 0)
        .map(|entry| ErrorDetail::new(entry.error, entry.severity, entry.action, entry.description))
        .collect()
}

/// prtMarkerSuppliesType names, indexed by code - 1.
const SUPPLY_KINDS: &[&str] = &[
    "other",
    "unknown",
    "toner",
    "waste toner",
    "ink",
    "ink cartridge",
    "ink ribbon",
    "waste ink",
    "opc",
    "developer",
    "fuser oil",
    "solid wax",
    "ribbon wax",
    "waste wax",
    "fuser",
    "corona wire",
    "fuser oil wick",
    "cleaner unit",
    "fuser cleaning pad",
    "transfer unit",
    "toner cartridge",
    "fuser oiler",
];

pub fn decode_supply_kind(code: i64) -> Option<&'static str> {
    usize::try_from(code)
        .ok()
        .and_then(|c| c.checked_sub(1))
        .and_then(|i| SUPPLY_KINDS.get(i).copied())
}
